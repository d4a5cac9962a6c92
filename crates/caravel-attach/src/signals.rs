//! Local signal subscription and the remote signal relay.
//!
//! While a session is attached, local process-control signals are not
//! acted on locally; their semantic equivalent is forwarded to the
//! remote process. Interrupt, quit and suspend become single control
//! bytes on the tunnel; terminal resizes become authenticated API calls
//! carrying the new dimensions.
//!
//! Subscription is a platform seam: the unix backend listens on real
//! signals, every other platform gets a backend that never yields but
//! still satisfies the interface, keeping the relay platform-agnostic.

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use caravel_api::{ApiClient, TtySize};

use crate::terminal;

/// ETX, what a tty would send for Ctrl-C.
const CONTROL_INTERRUPT: u8 = 0x03;
/// FS, what a tty would send for Ctrl-\.
const CONTROL_QUIT: u8 = 0x1C;
/// SUB, what a tty would send for Ctrl-Z.
const CONTROL_SUSPEND: u8 = 0x1A;

/// Abstract local signals relevant to an attached session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSignal {
    /// Interrupt request (SIGINT).
    Interrupt,
    /// Quit request (SIGQUIT).
    Quit,
    /// Terminal stop request (SIGTSTP).
    Suspend,
    /// The local terminal changed size (SIGWINCH).
    Resize,
}

/// The control byte a signal maps to on the tunnel, if any.
#[must_use]
pub const fn control_byte(signal: SessionSignal) -> Option<u8> {
    match signal {
        SessionSignal::Interrupt => Some(CONTROL_INTERRUPT),
        SessionSignal::Quit => Some(CONTROL_QUIT),
        SessionSignal::Suspend => Some(CONTROL_SUSPEND),
        SessionSignal::Resize => None,
    }
}

/// A subscription to local session signals.
///
/// Dropping the subscription unsubscribes: the platform backend notices
/// the closed channel and stops listening.
#[derive(Debug)]
pub struct SignalSubscription {
    rx: mpsc::Receiver<SessionSignal>,
}

impl SignalSubscription {
    /// Subscribe to the platform's signal delivery.
    #[must_use]
    pub fn subscribe() -> Self {
        let (tx, rx) = mpsc::channel(16);
        spawn_backend(tx);
        Self { rx }
    }

    /// Build a subscription from an explicit channel.
    ///
    /// Used by tests to feed synthetic signals.
    #[must_use]
    pub fn from_receiver(rx: mpsc::Receiver<SessionSignal>) -> Self {
        Self { rx }
    }

    /// Next signal, or `None` once the backend is gone.
    pub async fn next(&mut self) -> Option<SessionSignal> {
        self.rx.recv().await
    }
}

#[cfg(unix)]
fn spawn_backend(tx: mpsc::Sender<SessionSignal>) {
    use tokio::signal::unix::{SignalKind, signal};

    tokio::spawn(async move {
        let Ok(mut interrupt) = signal(SignalKind::interrupt()) else {
            return;
        };
        let Ok(mut quit) = signal(SignalKind::quit()) else {
            return;
        };
        let Ok(mut suspend) = signal(SignalKind::from_raw(libc::SIGTSTP)) else {
            return;
        };
        let Ok(mut resize) = signal(SignalKind::window_change()) else {
            return;
        };
        loop {
            let event = tokio::select! {
                _ = interrupt.recv() => SessionSignal::Interrupt,
                _ = quit.recv() => SessionSignal::Quit,
                _ = suspend.recv() => SessionSignal::Suspend,
                _ = resize.recv() => SessionSignal::Resize,
                () = tx.closed() => return,
            };
            if tx.send(event).await.is_err() {
                return;
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_backend(tx: mpsc::Sender<SessionSignal>) {
    // No native signal facility: hold the sender so the subscription
    // stays open, deliver nothing.
    tokio::spawn(async move {
        tx.closed().await;
    });
}

/// Background worker forwarding local signals to the remote session.
pub struct SignalRelay {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl SignalRelay {
    /// Spawn the relay.
    ///
    /// Fires one resize update immediately so the remote side learns
    /// the initial terminal size, then forwards signals until stopped
    /// or the subscription ends.
    #[must_use]
    pub fn spawn<W>(
        mut subscription: SignalSubscription,
        api: Arc<ApiClient>,
        attach_url: String,
        tunnel_writer: Arc<Mutex<W>>,
    ) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            push_tty_size(&api, &attach_url).await;
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    signal = subscription.next() => {
                        let Some(signal) = signal else { break };
                        match control_byte(signal) {
                            Some(byte) => {
                                let mut writer = tunnel_writer.lock().await;
                                if let Err(e) = writer.write_all(&[byte]).await {
                                    debug!(error = %e, ?signal, "control byte write failed");
                                } else {
                                    let _ = writer.flush().await;
                                }
                            }
                            None => push_tty_size(&api, &attach_url).await,
                        }
                    }
                }
            }
        });
        Self {
            stop: stop_tx,
            handle,
        }
    }

    /// Stop the relay and wait for the worker to unsubscribe and exit.
    pub async fn stop(self) {
        let _ = self.stop.send(());
        let _ = self.handle.await;
    }
}

/// Send the current terminal size to the run's resize endpoint.
///
/// Best-effort: failures are logged and never abort the session.
async fn push_tty_size(api: &ApiClient, attach_url: &str) {
    let (cols, rows) = terminal::size_or_default();
    let size = TtySize::new(cols, rows);
    if let Err(e) = api.update_tty_size(attach_url, &size).await {
        warn!(error = %e, "fail to update remote terminal size");
    }
}
