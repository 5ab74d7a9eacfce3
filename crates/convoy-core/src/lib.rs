//! Shared configuration and error types for the convoy workspace.

pub mod config;
pub mod error;

pub use config::ConvoyConfig;
pub use error::{ConvoyError, Result};
