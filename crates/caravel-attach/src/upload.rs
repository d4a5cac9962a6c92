//! File and directory uploads to a one-off before it starts.
//!
//! Directories are packaged as gzip-compressed tar archives staged in a
//! fresh temporary directory; plain files are sent as-is. Uploads run
//! sequentially so a failure is attributable to a specific file and
//! aborts the remaining ones.
//!
//! The staging directory is left on disk after the upload, like the
//! platform CLI lineage does. Build with the `cleanup-archives` feature
//! to remove it once the upload succeeds.

use std::fs::File;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use ignore::WalkBuilder;
use tempfile::TempDir;
use tracing::debug;

use caravel_api::ApiClient;

use crate::error::AttachError;
use crate::progress::{SharedWriter, write_progress};

/// One requested upload, resolved and (for directories) packaged.
#[derive(Debug)]
pub struct UploadItem {
    /// Path as given on the command line.
    pub source: String,
    /// Resolved absolute path.
    pub resolved: PathBuf,
    /// Whether the source is a directory.
    pub is_dir: bool,
    /// Archive derived from a directory source, set once packaged.
    pub archive: Option<PathBuf>,
}

impl UploadItem {
    /// Resolve a requested path.
    ///
    /// # Errors
    ///
    /// Returns [`AttachError::Resolve`] when the path cannot be
    /// canonicalized.
    pub fn prepare(source: &str) -> Result<Self, AttachError> {
        let resolved = std::fs::canonicalize(source).map_err(|e| AttachError::Resolve {
            path: source.to_string(),
            source: e,
        })?;
        let is_dir = resolved.is_dir();
        Ok(Self {
            source: source.to_string(),
            resolved,
            is_dir,
            archive: None,
        })
    }
}

/// Check that every requested upload path exists locally.
///
/// Runs before any network call so a typo costs nothing remote.
///
/// # Errors
///
/// Returns [`AttachError::MissingUploadFile`] naming the first missing
/// path.
pub fn validate_upload_paths(paths: &[String]) -> Result<(), AttachError> {
    for path in paths {
        if std::fs::metadata(path).is_err() {
            return Err(AttachError::MissingUploadFile(path.clone()));
        }
    }
    Ok(())
}

/// Upload every requested path to `endpoint`, in order.
///
/// # Errors
///
/// Fatal on the first resolution, packaging or upload failure; the
/// error names the file it happened on.
pub async fn upload_all(
    api: &ApiClient,
    endpoint: &str,
    paths: &[String],
    output: &SharedWriter,
) -> Result<(), AttachError> {
    for source in paths {
        let mut item = UploadItem::prepare(source)?;
        let staging = if item.is_dir {
            let (archive, staging) = package_directory(&item.resolved, output)?;
            item.archive = Some(archive);
            staging
        } else {
            None
        };
        let upload_path = item
            .archive
            .clone()
            .unwrap_or_else(|| item.resolved.clone());

        write_progress(
            output,
            &format!("Upload {} to container.\n", upload_path.display()),
        );
        api.upload_file(endpoint, &upload_path)
            .await
            .map_err(|e| AttachError::Upload {
                path: upload_path.display().to_string(),
                source: e,
            })?;

        // With cleanup-archives enabled the staging directory is
        // dropped (and deleted) here, after a successful upload.
        drop(staging);
    }
    Ok(())
}

/// Package a directory into a gzip-compressed tar archive.
///
/// The artifact lands in a fresh temporary directory and its name embeds
/// the directory's base name (`<base>.tar.gz`). Returns the archive path
/// and, when `cleanup-archives` is enabled, the staging directory guard.
///
/// # Errors
///
/// Fails if any entry cannot be read or written into the archive.
pub fn package_directory(
    dir: &Path,
    output: &SharedWriter,
) -> Result<(PathBuf, Option<TempDir>), AttachError> {
    let staging = tempfile::Builder::new()
        .prefix("caravel-upload-")
        .tempdir()
        .map_err(|e| archive_error(dir, format!("create staging directory: {e}")))?;

    let base = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| archive_error(dir, "directory has no base name".to_string()))?;
    let tar_path = staging.path().join(format!("{base}.tar"));

    write_progress(
        output,
        &format!(
            "Compressing directory {} to {}.gz\n",
            dir.display(),
            tar_path.display()
        ),
    );

    create_tar_archive(dir, &tar_path)?;
    let archive = compress_to_gzip(&tar_path)?;
    debug!(archive = %archive.display(), "directory packaged");

    if cfg!(feature = "cleanup-archives") {
        Ok((archive, Some(staging)))
    } else {
        let _persisted = staging.keep();
        Ok((archive, None))
    }
}

/// Write the directory tree into a tar container with relative entry
/// paths.
fn create_tar_archive(dir: &Path, tar_path: &Path) -> Result<(), AttachError> {
    let file =
        File::create(tar_path).map_err(|e| archive_error(dir, format!("create tar file: {e}")))?;
    let mut builder = tar::Builder::new(file);

    // Everything goes in: no hidden-file or ignore-file filtering.
    let walker = WalkBuilder::new(dir)
        .hidden(false)
        .standard_filters(false)
        .build();
    for entry in walker {
        let entry = entry.map_err(|e| archive_error(dir, e.to_string()))?;
        let path = entry.path();
        if path == dir {
            continue;
        }
        let relative = path
            .strip_prefix(dir)
            .map_err(|e| archive_error(dir, e.to_string()))?;
        let file_type = entry.file_type();
        if file_type.is_some_and(|t| t.is_dir()) {
            builder
                .append_dir(relative, path)
                .map_err(|e| archive_error(dir, format!("{}: {e}", relative.display())))?;
        } else if file_type.is_some_and(|t| t.is_file()) {
            builder
                .append_path_with_name(path, relative)
                .map_err(|e| archive_error(dir, format!("{}: {e}", relative.display())))?;
        }
    }
    builder
        .finish()
        .map_err(|e| archive_error(dir, format!("finish tar: {e}")))?;
    Ok(())
}

/// Compress `tar_path` to `<tar_path>.gz` next to it.
fn compress_to_gzip(tar_path: &Path) -> Result<PathBuf, AttachError> {
    let gz_path = PathBuf::from(format!("{}.gz", tar_path.display()));
    let mut source =
        File::open(tar_path).map_err(|e| archive_error(tar_path, format!("open tar: {e}")))?;
    let dest = File::create(&gz_path)
        .map_err(|e| archive_error(tar_path, format!("create archive: {e}")))?;
    let mut encoder = GzEncoder::new(dest, Compression::default());
    std::io::copy(&mut source, &mut encoder)
        .map_err(|e| archive_error(tar_path, format!("compress: {e}")))?;
    encoder
        .finish()
        .map_err(|e| archive_error(tar_path, format!("finish gzip: {e}")))?;
    Ok(gz_path)
}

fn archive_error(path: &Path, reason: String) -> AttachError {
    AttachError::Archive {
        path: path.display().to_string(),
        reason,
    }
}
