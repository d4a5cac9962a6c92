//! One-off session orchestration.
//!
//! Drives the whole run: environment, upload validation, run creation,
//! uploads, tunnel, terminal mode, signal relay, the two copy loops and
//! the final exit-code wait. The ordering invariants live here:
//!
//! - nothing touches the network before local validation passes;
//! - raw mode is entered only after the tunnel is confirmed open;
//! - the relay is stopped and the terminal restored after the main copy
//!   loop exits, whether it succeeded or failed.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::debug;

use caravel_api::{ApiClient, RunParams, WaitOutcome};

use crate::env::build_session_env;
use crate::error::AttachError;
use crate::progress::{SharedWriter, Spinner, buffer_writer, stderr_writer, write_progress};
use crate::signals::{SignalRelay, SignalSubscription};
use crate::terminal::TerminalMode;
use crate::tls::TlsOptions;
use crate::tunnel::{self, TunnelConnection};
use crate::upload::{upload_all, validate_upload_paths};

/// EOT, sent when local stdin reaches end of file.
const END_OF_TRANSMISSION: u8 = 0x04;

/// A one-off run to execute and attach to.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Target application name.
    pub app: String,
    /// Command argument vector.
    pub command: Vec<String>,
    /// Command string shown in progress text instead of the joined
    /// argument vector.
    pub display_command: Option<String>,
    /// `KEY=VALUE` environment overrides, in command-line order.
    pub env: Vec<String>,
    /// Local files or directories to upload before the process starts.
    pub files: Vec<String>,
    /// Container size.
    pub size: String,
    /// Buffer progress text instead of printing it.
    pub silent: bool,
    /// Start the one-off without attaching.
    pub detached: bool,
}

impl RunRequest {
    /// A request with default size and no extras.
    #[must_use]
    pub fn new(app: impl Into<String>, command: Vec<String>) -> Self {
        Self {
            app: app.into(),
            command,
            display_command: None,
            env: Vec::new(),
            files: Vec::new(),
            size: "M".to_string(),
            silent: false,
            detached: false,
        }
    }

    fn display_command(&self) -> String {
        self.display_command
            .clone()
            .unwrap_or_else(|| self.command.join(" "))
    }
}

/// Run a one-off and attach the process's real stdin/stdout to it.
///
/// Returns the remote exit code.
///
/// # Errors
///
/// Fails on configuration errors (before any network call), remote
/// rejections and transport errors; the terminal is back in canonical
/// mode on every error path.
pub async fn run_one_off(
    api: &Arc<ApiClient>,
    tls: &TlsOptions,
    request: &RunRequest,
) -> Result<i32, AttachError> {
    run_one_off_with_io(api, tls, request, tokio::io::stdin(), tokio::io::stdout()).await
}

/// [`run_one_off`] with caller-supplied local streams.
///
/// The copy endpoints are a seam: the session logic is identical
/// whether the local side is a real terminal or a test harness.
///
/// # Errors
///
/// See [`run_one_off`].
pub async fn run_one_off_with_io<I, O>(
    api: &Arc<ApiClient>,
    tls: &TlsOptions,
    request: &RunRequest,
    stdin: I,
    stdout: O,
) -> Result<i32, AttachError>
where
    I: AsyncRead + Unpin + Send + 'static,
    O: AsyncWrite + Unpin + Send,
{
    let env = build_session_env(&request.env)?;
    validate_upload_paths(&request.files)?;

    let params = RunParams {
        command: request.command.clone(),
        env,
        size: request.size.clone(),
        detached: request.detached,
        has_uploads: !request.files.is_empty(),
    };
    let created = api.create_run(&request.app, &params).await?;

    if request.detached {
        println!(
            "Starting one-off '{}' for app '{}'.",
            request.display_command(),
            request.app
        );
        println!(
            "Run `caravel logs --app {} --filter {}` to get the output",
            request.app,
            created.container.label()
        );
        return Ok(0);
    }

    let output: SharedWriter = if request.silent {
        buffer_writer().0
    } else {
        stderr_writer()
    };

    if !request.files.is_empty() {
        let endpoint = format!("{}/files", created.attach_url);
        upload_all(api, &endpoint, &request.files, &output).await?;
    }

    write_progress(
        &output,
        &format!(
            "-----> Connecting to container [{}]...  ",
            created.container.label()
        ),
    );
    let spinner = Spinner::start(Arc::clone(&output));
    let tunnel_result = tunnel::connect(&created.attach_url, api.credential(), tls).await;
    spinner.stop().await;
    let conn = tunnel_result?;
    write_progress(
        &output,
        &format!(
            "\n-----> Process '{}' is starting...\n\n",
            request.display_command()
        ),
    );

    let mut term = TerminalMode::new();
    term.enter_raw().map_err(|e| AttachError::Terminal {
        operation: "make stdin raw",
        source: e,
    })?;

    let session_result = attach_streams(api, &created.attach_url, conn, stdin, stdout).await;

    // Restore runs before the session result is inspected so the
    // terminal is sane on every exit path.
    let restore_result = term.restore();
    session_result?;
    restore_result.map_err(|e| AttachError::Terminal {
        operation: "restore stdin",
        source: e,
    })?;

    match api.wait_exit_code(&created.attach_url).await? {
        WaitOutcome::Exited(code) => Ok(code),
        WaitOutcome::InactivityTimeout => {
            write_progress(
                &output,
                "\nConnection timed out due to inactivity, one-off aborted.\n\
                 Data should be sent to/from the container regularly to avoid such timeout.\n\
                 If you need to run long background tasks, use --detached; the output\n\
                 will then be available in the application logs.\n",
            );
            Ok(127)
        }
    }
}

/// Run the attached phase: signal relay plus the two copy loops.
///
/// The remote→stdout copy is the session's backbone; its end (remote
/// EOF or stream error) ends the session. The stdin→remote copy is
/// spawned fire-and-forget so a still-open local stdin cannot keep a
/// finished session alive.
async fn attach_streams<I, O>(
    api: &Arc<ApiClient>,
    attach_url: &str,
    conn: TunnelConnection,
    stdin: I,
    mut stdout: O,
) -> Result<(), AttachError>
where
    I: AsyncRead + Unpin + Send + 'static,
    O: AsyncWrite + Unpin + Send,
{
    let (mut reader, writer) = tokio::io::split(conn.into_stream());
    let writer = Arc::new(Mutex::new(writer));

    let relay = SignalRelay::spawn(
        SignalSubscription::subscribe(),
        Arc::clone(api),
        attach_url.to_string(),
        Arc::clone(&writer),
    );

    let stdin_writer = Arc::clone(&writer);
    tokio::spawn(async move {
        forward_stdin(stdin, stdin_writer).await;
    });

    let copy_result = tokio::io::copy(&mut reader, &mut stdout).await;
    let _ = stdout.flush().await;

    relay.stop().await;
    match copy_result {
        Ok(bytes) => {
            debug!(bytes, "remote stream closed");
            Ok(())
        }
        Err(e) => Err(AttachError::Io(e)),
    }
}

/// Copy local stdin into the tunnel, sharing the write half with the
/// signal relay. Sends one EOT on local end-of-file so `caravel run <
/// file` terminates the remote input stream.
async fn forward_stdin<I, W>(mut stdin: I, writer: Arc<Mutex<W>>)
where
    I: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = [0u8; 4096];
    loop {
        match stdin.read(&mut buf).await {
            Ok(0) => {
                let mut w = writer.lock().await;
                let _ = w.write_all(&[END_OF_TRANSMISSION]).await;
                let _ = w.flush().await;
                break;
            }
            Ok(n) => {
                let mut w = writer.lock().await;
                if w.write_all(&buf[..n]).await.is_err() {
                    break;
                }
                let _ = w.flush().await;
            }
            Err(e) => {
                debug!(error = %e, "stdin read ended");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use caravel_api::Credential;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::timeout;

    async fn read_head(socket: &mut TcpStream) -> String {
        let mut head = Vec::new();
        let mut byte = [0u8; 1];
        while !head.ends_with(b"\r\n\r\n") {
            match socket.read(&mut byte).await {
                Ok(n) if n > 0 => head.push(byte[0]),
                _ => break,
            }
        }
        String::from_utf8_lossy(&head).into_owned()
    }

    async fn drain(socket: &mut TcpStream) {
        let mut buf = [0u8; 4096];
        loop {
            match timeout(Duration::from_millis(100), socket.read(&mut buf)).await {
                Ok(Ok(n)) if n > 0 => {}
                _ => break,
            }
        }
    }

    async fn respond(socket: &mut TcpStream, status: &str, body: &str) {
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = socket.write_all(response.as_bytes()).await;
    }

    /// A platform that creates runs, accepts attaches with
    /// `attach_status`, takes resizes, and reports `exit_code`.
    async fn platform_fixture(attach_status: &'static str, exit_code: i32) -> String {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fixture listener");
        let addr = listener.local_addr().expect("fixture addr");
        let base = format!("http://{addr}");
        let attach_url = format!("{base}/sessions/one");
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let attach_url = attach_url.clone();
                tokio::spawn(async move {
                    let head = read_head(&mut socket).await;
                    if head.starts_with("CONNECT ") {
                        let _ = socket.write_all(attach_status.as_bytes()).await;
                        // Half-close: the FIN is the remote EOF that
                        // ends the session, while the read side stays
                        // open for the client's trailing EOT byte.
                        let _ = socket.shutdown().await;
                        drain(&mut socket).await;
                    } else if head.starts_with("POST ") {
                        drain(&mut socket).await;
                        let body = format!(
                            r#"{{"attach_url":"{attach_url}","container":{{"type":"one-off","type_index":1}}}}"#
                        );
                        respond(&mut socket, "200 OK", &body).await;
                    } else if head.starts_with("PUT ") {
                        drain(&mut socket).await;
                        respond(&mut socket, "200 OK", "").await;
                    } else if head.starts_with("GET ") {
                        let body = format!(r#"{{"exit_code":{exit_code}}}"#);
                        respond(&mut socket, "200 OK", &body).await;
                    }
                });
            }
        });
        base
    }

    fn api_for(base: &str) -> Arc<ApiClient> {
        Arc::new(ApiClient::new(base, Credential::new("tk")).expect("client should build"))
    }

    fn silent_request() -> RunRequest {
        let mut request = RunRequest::new("myapp", vec!["echo".into(), "hi".into()]);
        request.silent = true;
        request
    }

    #[tokio::test]
    async fn full_session_runs_to_remote_exit_code() {
        let base = platform_fixture("HTTP/1.1 200 OK\r\n\r\n", 3).await;
        let api = api_for(&base);

        let code = timeout(
            Duration::from_secs(10),
            run_one_off_with_io(
                &api,
                &TlsOptions::default(),
                &silent_request(),
                tokio::io::empty(),
                tokio::io::sink(),
            ),
        )
        .await
        .expect("session should not hang")
        .expect("session should complete");
        assert_eq!(code, 3);
    }

    #[tokio::test]
    async fn remote_output_reaches_local_stdout() {
        let base = platform_fixture("HTTP/1.1 200 OK\r\n\r\nhello from remote", 0).await;
        let api = api_for(&base);

        let (stdout, mut capture) = tokio::io::duplex(256);
        let code = timeout(
            Duration::from_secs(10),
            run_one_off_with_io(
                &api,
                &TlsOptions::default(),
                &silent_request(),
                tokio::io::empty(),
                stdout,
            ),
        )
        .await
        .expect("session should not hang")
        .expect("session should complete");
        assert_eq!(code, 0);

        let mut seen = vec![0u8; b"hello from remote".len()];
        capture.read_exact(&mut seen).await.expect("stdout bytes");
        assert_eq!(&seen, b"hello from remote");
    }

    #[tokio::test]
    async fn attach_rejection_is_fatal_after_run_creation() {
        let base = platform_fixture(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n\r\n",
            0,
        )
        .await;
        let api = api_for(&base);

        let result = timeout(
            Duration::from_secs(10),
            run_one_off_with_io(
                &api,
                &TlsOptions::default(),
                &silent_request(),
                tokio::io::empty(),
                tokio::io::sink(),
            ),
        )
        .await
        .expect("session should not hang");
        match result {
            Err(AttachError::AttachRejected { status }) => assert_eq!(status, 500),
            other => panic!("expected AttachRejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_upload_file_fails_before_any_network_call() {
        // Port 1 would refuse instantly; a connection attempt would
        // surface as an Api error, not MissingUploadFile.
        let api = api_for("http://127.0.0.1:1");
        let mut request = silent_request();
        request.files = vec!["/tmp/missing-caravel-upload".into()];

        let result = run_one_off_with_io(
            &api,
            &TlsOptions::default(),
            &request,
            tokio::io::empty(),
            tokio::io::sink(),
        )
        .await;
        match result {
            Err(AttachError::MissingUploadFile(path)) => {
                assert_eq!(path, "/tmp/missing-caravel-upload");
            }
            other => panic!("expected MissingUploadFile, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_env_fails_before_any_network_call() {
        let api = api_for("http://127.0.0.1:1");
        let mut request = silent_request();
        request.env = vec!["NOEQUALS".into()];

        let result = run_one_off_with_io(
            &api,
            &TlsOptions::default(),
            &request,
            tokio::io::empty(),
            tokio::io::sink(),
        )
        .await;
        assert!(matches!(result, Err(AttachError::EnvFormat(_))));
    }

    #[tokio::test]
    async fn app_not_found_propagates() {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fixture listener");
        let addr = listener.local_addr().expect("fixture addr");
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let _ = read_head(&mut socket).await;
                drain(&mut socket).await;
                respond(&mut socket, "404 Not Found", "").await;
            }
        });
        let api = api_for(&format!("http://{addr}"));

        let result = run_one_off_with_io(
            &api,
            &TlsOptions::default(),
            &silent_request(),
            tokio::io::empty(),
            tokio::io::sink(),
        )
        .await;
        match result {
            Err(AttachError::Api(caravel_api::ApiError::AppNotFound(app))) => {
                assert_eq!(app, "myapp");
            }
            other => panic!("expected AppNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn detached_run_skips_the_attach_entirely() {
        // The fixture would answer an attach, but none must arrive:
        // rejecting CONNECT loudly would fail the test if it did.
        let base = platform_fixture("HTTP/1.1 500 Internal Server Error\r\n\r\n", 0).await;
        let api = api_for(&base);
        let mut request = silent_request();
        request.detached = true;

        let code = run_one_off_with_io(
            &api,
            &TlsOptions::default(),
            &request,
            tokio::io::empty(),
            tokio::io::sink(),
        )
        .await
        .expect("detached run should succeed");
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn stdin_eof_sends_eot() {
        let (mut local, remote) = tokio::io::duplex(64);
        let writer = Arc::new(Mutex::new(remote));
        forward_stdin(tokio::io::empty(), writer).await;

        let mut byte = [0u8; 1];
        local.read_exact(&mut byte).await.expect("eot byte");
        assert_eq!(byte[0], END_OF_TRANSMISSION);
    }
}
