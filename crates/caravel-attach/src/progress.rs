//! Waiting-text output and the attach spinner.
//!
//! Human-readable progress goes to a shared writer: stderr normally, an
//! in-memory buffer in silent mode. The spinner is purely cosmetic and
//! never blocks session work.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Shared destination for progress text.
pub type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// Progress writer backed by stderr.
#[must_use]
pub fn stderr_writer() -> SharedWriter {
    Arc::new(Mutex::new(Box::new(std::io::stderr())))
}

/// Progress writer backed by an in-memory buffer (silent mode).
///
/// Returns the writer and a handle to the captured bytes.
#[must_use]
pub fn buffer_writer() -> (SharedWriter, Arc<Mutex<Vec<u8>>>) {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&buffer);
    let writer: SharedWriter = Arc::new(Mutex::new(Box::new(BufferSink { sink })));
    (writer, buffer)
}

struct BufferSink {
    sink: Arc<Mutex<Vec<u8>>>,
}

impl Write for BufferSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Ok(mut sink) = self.sink.lock() {
            sink.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Write a line of progress text, ignoring a poisoned or failed writer.
pub fn write_progress(writer: &SharedWriter, text: &str) {
    if let Ok(mut w) = writer.lock() {
        let _ = w.write_all(text.as_bytes());
        let _ = w.flush();
    }
}

/// Animation frames, overwritten in place with a backspace.
const FRAMES: [u8; 4] = [b'|', b'/', b'-', b'\\'];

/// Frame interval.
const TICK: Duration = Duration::from_millis(100);

/// A spinner running as a background task.
pub struct Spinner {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl Spinner {
    /// Start spinning on `writer` until [`stop`](Self::stop) is called.
    #[must_use]
    pub fn start(writer: SharedWriter) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK);
            let mut frame = 0usize;
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = interval.tick() => {
                        if let Ok(mut w) = writer.lock() {
                            let _ = w.write_all(&[FRAMES[frame % FRAMES.len()], 0x08]);
                            let _ = w.flush();
                        }
                        frame += 1;
                    }
                }
            }
        });
        Self {
            stop: stop_tx,
            handle,
        }
    }

    /// Stop the animation and wait for the task to finish.
    pub async fn stop(self) {
        let _ = self.stop.send(());
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_writer_captures_progress_text() {
        let (writer, buffer) = buffer_writer();
        write_progress(&writer, "-----> Connecting...");
        let captured = buffer.lock().expect("buffer lock");
        assert_eq!(&captured[..], b"-----> Connecting...");
    }

    #[tokio::test]
    async fn spinner_animates_then_stops() {
        let (writer, buffer) = buffer_writer();
        let spinner = Spinner::start(writer);
        tokio::time::sleep(Duration::from_millis(250)).await;
        spinner.stop().await;

        let drawn = buffer.lock().expect("buffer lock").len();
        assert!(drawn >= 2, "expected at least one frame, got {drawn} bytes");
    }
}
