//! Tessera client engine.
//!
//! Everything with coordination logic lives here: the authenticated service
//! session, scoped S3 transfer, file discovery and naming, tile validation,
//! and the import/export orchestrators. The CLI crate is a thin shell over
//! this library.

pub mod auth;
pub mod export;
pub mod fileutils;
pub mod import;
pub mod models;
pub mod progress;
pub mod s3;
pub mod service;
pub mod session;
pub mod tile;
pub mod validate;
pub mod zarr;

// Re-export commonly used types
pub use auth::{authenticate, BearerToken};
pub use export::{ExportFormat, Exporter};
pub use import::{BatchReport, DirectImportRequest, ImportOutcome, Importer};
pub use models::RawStoragePolicy;
pub use s3::{ObjectStore, S3ObjectStore};
pub use service::ImageService;
pub use session::Session;

/// File extensions accepted for batch import.
pub const BATCH_IMPORT_EXTENSIONS: &[&str] = &[".tif", ".tiff", ".rcpnl", ".dv"];
