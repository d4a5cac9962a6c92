//! # caravel-api
//!
//! Caravel platform API client.
//!
//! Covers the operations the one-off run subsystem needs:
//! - Run creation (`POST /apps/{app}/run`)
//! - File upload to a running one-off (`POST {attach_url}/files`)
//! - TTY size updates (`PUT {attach_url}`)
//! - Exit code retrieval (`GET {attach_url}/wait`)
//!
//! # Architecture
//!
//! Every call takes the credential from the [`ApiClient`] it was built
//! with; there is no ambient or global token state. The attach tunnel
//! itself is not handled here — it hijacks a raw connection and lives in
//! `caravel-attach`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod client;
pub mod error;
pub mod types;

pub use auth::Credential;
pub use client::{ApiClient, WaitOutcome};
pub use error::ApiError;
pub use types::{ContainerDescriptor, RunCreated, RunParams, TtySize};
