//! # voxplay Common Library
//!
//! Shared code for the voxplay crates:
//! - Configuration file resolution and loading
//! - Tracing subscriber setup
//! - Common error type

pub mod config;
pub mod error;
pub mod logging;

pub use config::{AudioConfig, ConfigResolver, LoggingConfig, TomlConfig};
pub use error::{Error, Result};
