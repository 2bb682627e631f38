//! # confsync Protocol
//!
//! Manifest and state-report types for the confsync device client.
//!
//! This crate provides:
//! - [`Manifest`] / [`ConfigEntry`] - the server's description of the
//!   configuration set available to a device
//! - [`DeviceState`] / [`StateReport`] - lifecycle reporting payloads
//! - JSON wire parsing with validation
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod manifest;
mod report;

pub use error::{ProtocolError, ProtocolResult};
pub use manifest::{ConfigEntry, Manifest};
pub use report::{DeviceState, StateReport};
