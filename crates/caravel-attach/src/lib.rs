//! # caravel-attach
//!
//! Interactive attachment to Caravel one-off processes.
//!
//! The session lifecycle, leaf components first:
//!
//! - [`env`] builds the one-off's environment from fixed session keys and
//!   user overrides.
//! - [`upload`] packages directories into compressed archives and uploads
//!   them before the process starts.
//! - [`tunnel`] opens the bidirectional byte stream by hijacking an HTTP
//!   connection to the attach URL.
//! - [`terminal`] switches the local terminal to raw mode and guarantees
//!   restoration.
//! - [`signals`] forwards interrupt/quit/suspend as control bytes and
//!   terminal resizes as API calls.
//! - [`session`] orchestrates all of the above and reports the remote
//!   exit code.
//!
//! ```text
//! stdin  ──────────────┐                  ┌────────────────┐
//!                      ├──► tunnel ──────►│ remote one-off │
//! signals (0x03/…) ────┘       ▲          └───────┬────────┘
//!                              │                  │
//! stdout ◄─────────────────────┴──────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod env;
pub mod error;
pub mod progress;
pub mod session;
pub mod signals;
pub mod terminal;
pub mod tls;
pub mod tunnel;
pub mod upload;

pub use error::AttachError;
pub use session::{RunRequest, run_one_off, run_one_off_with_io};
pub use tls::TlsOptions;
