//! The image service API surface.
//!
//! The orchestrators talk to the service through this trait so protocol
//! tests can substitute an in-memory implementation; [`crate::session::Session`]
//! is the HTTP implementation.

use async_trait::async_trait;
use tessera_core::error::Result;

use crate::models::{
    Fileset, ImageDimensions, ImageRecord, ImportRecord, IncompleteImports, RawStoragePolicy,
    RepositoryListing, StorageCredentials,
};

/// Operations the client consumes from the image service.
#[async_trait]
pub trait ImageService: Send + Sync {
    /// List repositories visible to the caller, with access grants.
    async fn list_repositories(&self) -> Result<RepositoryListing>;

    /// Create a repository with the given raw-storage policy.
    async fn create_repository(
        &self,
        name: &str,
        raw_storage: RawStoragePolicy,
    ) -> Result<crate::models::Repository>;

    /// Create an import job under a repository.
    async fn create_import(&self, name: &str, repository_uuid: &str) -> Result<ImportRecord>;

    /// Fetch scoped upload credentials for an import job.
    async fn get_import_credentials(&self, import_uuid: &str) -> Result<StorageCredentials>;

    /// Tell the service the job is finished uploading.
    async fn mark_import_complete(&self, import_uuid: &str) -> Result<()>;

    /// List the filesets the service has derived from an import job.
    async fn list_filesets_in_import(&self, import_uuid: &str) -> Result<Vec<Fileset>>;

    /// List the images belonging to a fileset.
    async fn list_images_in_fileset(&self, fileset_uuid: &str) -> Result<Vec<ImageRecord>>;

    /// List the images stored in a repository.
    async fn list_images_in_repository(&self, repository_uuid: &str) -> Result<Vec<ImageRecord>>;

    /// List import jobs that have not completed processing.
    async fn list_incomplete_imports(&self) -> Result<IncompleteImports>;

    /// Create an image record directly (direct import path, no import job).
    async fn create_image(
        &self,
        name: &str,
        repository_uuid: &str,
        pyramid_levels: u32,
    ) -> Result<ImageRecord>;

    /// Fetch scoped tile-storage credentials for an image.
    async fn get_image_credentials(&self, image_uuid: &str) -> Result<StorageCredentials>;

    /// Fetch pyramid geometry for an image.
    async fn get_image_dimensions(&self, image_uuid: &str) -> Result<ImageDimensions>;
}
