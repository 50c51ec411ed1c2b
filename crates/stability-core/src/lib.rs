//! # stability-core
//!
//! Core types and utilities for working with the Stability AI REST API.
//!
//! This crate provides the shared error taxonomy, client configuration and
//! request-body helpers used by `stability-api`.
//!
//! ## Modules
//!
//! - [`error`] - Error types and error-envelope mapping
//! - [`config`] - Credential and endpoint configuration
//! - [`client`] - HTTP transport settings
//! - [`form`] - Ordered multipart form builder

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod form;

// Re-export commonly used types
pub use config::StabilityConfig;
pub use error::{Error, Result};
pub use form::{FormFields, FormValue};
