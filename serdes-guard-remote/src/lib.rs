//! # serdes-guard-remote
//!
//! Delegation of whole guard calls to a hosted validation service.
//!
//! The service runs generation, validation and reasks on its side and
//! answers with a result plus the rounds it ran. [`merge_response`] folds
//! those rounds into the local [`Call`](serdes_guard_core::Call) so history
//! looks the same whichever side did the work.
//!
//! ## Example
//!
//! ```ignore
//! use serdes_guard_remote::{HttpRemoteClient, RemoteConfig};
//!
//! let client = HttpRemoteClient::new(
//!     RemoteConfig::new("my-key").with_base_url("https://guards.example.com"),
//! );
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod merge;
pub mod payload;

pub use client::{HttpRemoteClient, RemoteService, DEFAULT_SUPPORTED_PROVIDERS, PROVIDER_KEY_HEADER};
pub use config::RemoteConfig;
pub use error::RemoteError;
pub use merge::{delegate, empty_response_outcome, merge_response, EMPTY_RESPONSE_MESSAGE};
pub use payload::{
    GuardDescriptor, RemoteCall, RemotePrompt, RemoteReask, RemoteRound, ValidatePayload,
    ValidationResponse, API_KEY_KWARG,
};
