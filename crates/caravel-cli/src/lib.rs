//! # caravel-cli
//!
//! Caravel command-line interface.
//!
//! Runs one-off commands on a platform application's containers and
//! attaches the local terminal to them.
//!
//! # Architecture
//!
//! Argument parsing and dispatch live here; the platform API surface is
//! `caravel-api` and the whole interactive session machinery is
//! `caravel-attach`.
//!
//! ```text
//! ┌─────────────┐   REST + CONNECT    ┌──────────────────┐
//! │ caravel-cli │◄───────────────────►│ Caravel platform │
//! └─────────────┘                     └──────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;

pub use cli::{Cli, Commands, RunArgs};
pub use error::CliError;
