//! Tessera Core - Foundational Types
//!
//! Error taxonomy and resolved settings shared by the client library and
//! the CLI.

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{Overrides, Settings, SettingsFile};
pub use error::{Result, TesseraError};

/// Tessera version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
