//! Local terminal mode control.
//!
//! The attached byte stream only makes sense with local line buffering
//! and echo disabled, so the controller flips the terminal to raw mode
//! for the session and back afterwards. Restoration on every exit path
//! is the subsystem's core invariant; the controller tracks whether raw
//! mode was actually entered so `restore` is safe to call at any time,
//! any number of times.

use std::io::IsTerminal;

use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

/// Default dimensions reported when the terminal cannot be queried.
const FALLBACK_SIZE: (u16, u16) = (80, 24);

/// Tracks and switches the terminal mode of the process's stdin.
#[derive(Debug, Default)]
pub struct TerminalMode {
    raw: bool,
}

impl TerminalMode {
    /// Create a controller; the terminal starts in canonical mode.
    #[must_use]
    pub const fn new() -> Self {
        Self { raw: false }
    }

    /// Switch the terminal to raw mode.
    ///
    /// Returns `false` without touching the terminal when stdin is not a
    /// TTY (e.g. `caravel run < file`).
    ///
    /// # Errors
    ///
    /// Returns the underlying terminal error if raw mode cannot be
    /// enabled on a real TTY.
    pub fn enter_raw(&mut self) -> std::io::Result<bool> {
        if !std::io::stdin().is_terminal() {
            return Ok(false);
        }
        enable_raw_mode()?;
        self.raw = true;
        Ok(true)
    }

    /// Restore canonical mode.
    ///
    /// Harmless when raw mode was never entered, and idempotent.
    ///
    /// # Errors
    ///
    /// Returns the underlying terminal error; callers must still treat
    /// the session as ended.
    pub fn restore(&mut self) -> std::io::Result<()> {
        if self.raw {
            disable_raw_mode()?;
            self.raw = false;
        }
        Ok(())
    }

    /// Whether the terminal is currently in raw mode.
    #[must_use]
    pub const fn is_raw(&self) -> bool {
        self.raw
    }
}

// Backstop only: the orchestrator restores explicitly on every path so
// restore failures can surface.
impl Drop for TerminalMode {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

/// Current terminal dimensions as (columns, rows).
///
/// Falls back to 80x24 when the terminal cannot be queried, so resize
/// updates always carry a usable size.
#[must_use]
pub fn size_or_default() -> (u16, u16) {
    crossterm::terminal::size().unwrap_or(FALLBACK_SIZE)
}
