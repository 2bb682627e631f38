//! # confsync Store
//!
//! Local cache store for the confsync device client.
//!
//! This crate persists the last fully synced configuration set (a
//! manifest plus every body it names) and replaces it atomically.
//!
//! ## Design Principles
//!
//! - A [`CachedState`] is complete by construction: its body key set
//!   equals exactly its manifest's name set
//! - `commit` either makes the whole new state visible or leaves the
//!   previous state fully visible; partial writes are never observable
//! - Single-writer, multi-reader discipline at the store layer
//!
//! ## Available Stores
//!
//! - [`DirStore`] - durable, directory-backed, generation-switch commit
//! - [`MemoryStore`] - for testing and ephemeral use

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod dir;
mod error;
mod memory;
mod state;
mod store;

pub use dir::DirStore;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use state::{body_digest, CachedState};
pub use store::CacheStore;
