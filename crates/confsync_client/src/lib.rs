//! # confsync Client
//!
//! Device-side client for a remote configuration-delivery service.
//!
//! This crate provides:
//! - A transport abstraction over the configuration service
//! - Version comparison between fetched and cached manifests
//! - A sync engine with all-or-nothing cache commits
//! - Lifecycle state reporting (applied / upvote / downvote)
//! - The [`Client`] facade tying the pieces together
//!
//! ## Key Invariants
//!
//! - The committed cache always holds a complete manifest+bodies set
//! - A failed download cycle leaves the previous cache untouched
//! - Unchanged entries are carried over, never re-fetched
//! - State reporting is best-effort; the local record never rolls back
//!
//! ## Concurrency
//!
//! Operations are synchronous and expected to be invoked one at a time
//! per client; the cache store itself enforces single-writer,
//! multi-reader access so readers never observe a half-written set.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod engine;
mod error;
mod identity;
mod plan;
mod transport;

pub use client::Client;
pub use config::{ApiKey, ClientConfig};
pub use engine::{SyncEngine, SyncStats, SyncStatus};
pub use error::{ClientError, ClientResult, SyncPhase};
pub use plan::SyncPlan;
pub use transport::{ConfigTransport, MockTransport};
