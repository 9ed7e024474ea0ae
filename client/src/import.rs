//! Import orchestration.
//!
//! Batch imports drive the full protocol against the image service: resolve
//! the repository, create a job, fetch scoped credentials, fan the uploads
//! out across a bounded worker pool, mark the job complete, then poll the
//! derived filesets until they finish processing. Direct imports skip the
//! job machinery and push pre-tiled pyramids straight to image storage.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use regex::Regex;
use tessera_core::error::{Result, TesseraError};
use tokio::sync::Semaphore;

use crate::fileutils::{derive_key, validate_name};
use crate::models::{
    Fileset, ImageRecord, RawStoragePolicy, ScopedCredentials, StorageCredentials,
};
use crate::progress::{ByteProgress, UnitProgress};
use crate::s3::ObjectStore;
use crate::service::ImageService;
use crate::tile::{self, TileCoord, TILE_FILENAME_PATTERN};
use crate::validate::validate_tile;

/// Default interval between fileset polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default wall-clock bound on waiting for fileset processing.
const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// One failed file in a batch.
#[derive(Debug, Clone)]
pub struct FailedUpload {
    pub path: PathBuf,
    pub reason: String,
}

/// Per-file outcome of a batch upload. Failures never abort siblings; the
/// report is how callers find out a "successful" command lost files.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<PathBuf>,
    pub failed: Vec<FailedUpload>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    /// Human-readable summary, e.g. `2/3 files uploaded`.
    pub fn summary(&self) -> String {
        format!("{}/{} files uploaded", self.succeeded.len(), self.total())
    }
}

/// Result of a batch import invocation.
#[derive(Debug)]
pub struct ImportOutcome {
    pub import_uuid: String,
    pub repository_uuid: String,
    pub report: BatchReport,
}

/// Result of a direct (pre-tiled) import invocation.
#[derive(Debug)]
pub struct DirectImportOutcome {
    pub image_uuid: String,
    pub report: BatchReport,
}

/// Inputs for a direct import of an already-tiled pyramid directory.
#[derive(Debug, Clone)]
pub struct DirectImportRequest {
    pub directory: PathBuf,
    pub image_name: String,
    pub repository: String,
    pub raw_storage: RawStoragePolicy,
    /// OME-XML sidecar; defaults to `<directory>/metadata.xml`.
    pub metadata: Option<PathBuf>,
}

/// Drives imports against the image service.
pub struct Importer {
    service: Arc<dyn ImageService>,
    store: Arc<dyn ObjectStore>,
    name_source: Box<dyn Fn() -> String + Send + Sync>,
    poll_interval: Duration,
    poll_timeout: Duration,
    concurrency: usize,
}

impl Importer {
    pub fn new(service: Arc<dyn ImageService>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            service,
            store,
            name_source: Box::new(random_import_name),
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            concurrency: default_concurrency(),
        }
    }

    /// Override the import-job name source (tests).
    pub fn with_name_source(
        mut self,
        source: impl Fn() -> String + Send + Sync + 'static,
    ) -> Self {
        self.name_source = Box::new(source);
        self
    }

    /// Override poll cadence and bound.
    pub fn with_poll(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.poll_timeout = timeout;
        self
    }

    /// Override upload/download worker-pool size.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Batch import: upload `files` under a repository and hand them to the
    /// service for processing.
    ///
    /// Returns `Ok(None)` without touching the network when `files` is
    /// empty. The job is marked complete even if some (or all) uploads
    /// failed — the report carries the per-file outcomes.
    pub async fn import_files(
        &self,
        files: &[PathBuf],
        repository: &str,
        raw_storage: RawStoragePolicy,
        on_progress: UnitProgress,
    ) -> Result<Option<ImportOutcome>> {
        validate_name(repository, "repository")?;

        if files.is_empty() {
            tracing::info!("No files to import");
            return Ok(None);
        }

        let repository_uuid = self.resolve_repository(repository, raw_storage).await?;

        let import_name = (self.name_source)();
        let import = self
            .service
            .create_import(&import_name, &repository_uuid)
            .await?;
        tracing::info!(name = %import_name, uuid = %import.uuid, "Created import");

        let credentials = self.service.get_import_credentials(&import.uuid).await?;
        tracing::info!(
            bucket = %credentials.target.bucket,
            prefix = %credentials.target.prefix,
            "Acquired upload credentials"
        );

        let items: Vec<(PathBuf, String)> = files
            .iter()
            .map(|path| {
                let key = format!(
                    "{}{}",
                    credentials.target.prefix,
                    derive_key(&path.to_string_lossy())
                );
                (path.clone(), key)
            })
            .collect();

        let report = self.upload_batch(items, &credentials, on_progress).await;
        if !report.all_succeeded() {
            tracing::warn!(
                failed = report.failed.len(),
                total = report.total(),
                "Some uploads failed; the job will still be marked complete"
            );
        }

        self.service.mark_import_complete(&import.uuid).await?;

        Ok(Some(ImportOutcome {
            import_uuid: import.uuid,
            repository_uuid,
            report,
        }))
    }

    /// Direct import: push a directory of pre-tiled pyramid files as a
    /// single image, skipping the import job entirely.
    ///
    /// Every tile is validated (16-bit grayscale) and the metadata sidecar
    /// must exist before a single byte is uploaded.
    pub async fn import_tiled_image(
        &self,
        request: &DirectImportRequest,
        on_progress: UnitProgress,
    ) -> Result<Option<DirectImportOutcome>> {
        validate_name(&request.image_name, "image")?;
        validate_name(&request.repository, "repository")?;

        let pattern = Regex::new(&format!("^{}$", TILE_FILENAME_PATTERN))
            .map_err(|e| TesseraError::Other(e.to_string()))?;
        let tiles = crate::fileutils::list_by_pattern(&request.directory, &pattern);
        if tiles.is_empty() {
            tracing::info!(dir = %request.directory.display(), "No tile files to import");
            return Ok(None);
        }

        let coords: Vec<TileCoord> = tiles
            .iter()
            .filter_map(|path| {
                path.file_name()
                    .and_then(|s| s.to_str())
                    .and_then(TileCoord::parse)
            })
            .collect();

        let sidecar = request
            .metadata
            .clone()
            .unwrap_or_else(|| request.directory.join("metadata.xml"));
        if !sidecar.is_file() {
            return Err(TesseraError::MissingSidecar(sidecar.display().to_string()));
        }

        // Fail fast: all tiles checked before any upload starts.
        for path in &tiles {
            validate_tile(path)?;
        }

        let levels = tile::pyramid_levels(&coords);
        let repository_uuid = self
            .resolve_repository(&request.repository, request.raw_storage)
            .await?;
        let image = self
            .service
            .create_image(&request.image_name, &repository_uuid, levels)
            .await?;
        tracing::info!(uuid = %image.uuid, levels, "Created image");

        let credentials = self.service.get_image_credentials(&image.uuid).await?;

        let items: Vec<(PathBuf, String)> = tiles
            .iter()
            .zip(coords.iter())
            .map(|(path, coord)| {
                (
                    path.clone(),
                    format!("{}{}", credentials.target.prefix, coord.key()),
                )
            })
            .collect();

        let report = self.upload_batch(items, &credentials, on_progress).await;

        let metadata_key = format!("{}metadata.xml", credentials.target.prefix);
        self.store
            .upload(
                &sidecar,
                &credentials.target.bucket,
                &metadata_key,
                &credentials.credentials,
                &ByteProgress::new(0),
            )
            .await?;

        Ok(Some(DirectImportOutcome {
            image_uuid: image.uuid,
            report,
        }))
    }

    /// Reuse a repository by name, or create it with the requested policy.
    /// The policy is immutable once created; asking for `Archive` on an
    /// existing repository is a no-op with a warning.
    async fn resolve_repository(
        &self,
        name: &str,
        raw_storage: RawStoragePolicy,
    ) -> Result<String> {
        let listing = self.service.list_repositories().await?;

        if let Some(existing) = listing.find_by_name(name) {
            if raw_storage == RawStoragePolicy::Archive {
                tracing::warn!(
                    repository = name,
                    "Repository already exists; ignoring archive request (storage policy is immutable)"
                );
            }
            tracing::info!(uuid = %existing.uuid, "Using existing repository");
            return Ok(existing.uuid.clone());
        }

        let created = self.service.create_repository(name, raw_storage).await?;
        tracing::info!(uuid = %created.uuid, "Created new repository");
        Ok(created.uuid)
    }

    /// Upload every item through the bounded worker pool and collect the
    /// per-file outcomes. All tasks are awaited before this returns; the
    /// caller may then safely mark the job complete.
    async fn upload_batch(
        &self,
        items: Vec<(PathBuf, String)>,
        credentials: &StorageCredentials,
        on_progress: UnitProgress,
    ) -> BatchReport {
        let total = items.len() as u64;
        let total_bytes: u64 = items
            .iter()
            .map(|(path, _)| std::fs::metadata(path).map(|m| m.len()).unwrap_or(0))
            .sum();

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let bytes = Arc::new(ByteProgress::new(total_bytes));
        let processed = Arc::new(AtomicU64::new(0));
        let bucket = Arc::new(credentials.target.bucket.clone());
        let creds: Arc<ScopedCredentials> = Arc::new(credentials.credentials.clone());

        let mut handles = Vec::with_capacity(items.len());
        for (path, key) in items {
            let semaphore = Arc::clone(&semaphore);
            let store = Arc::clone(&self.store);
            let bucket = Arc::clone(&bucket);
            let creds = Arc::clone(&creds);
            let bytes = Arc::clone(&bytes);
            let processed = Arc::clone(&processed);
            let on_progress = Arc::clone(&on_progress);

            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore never closed");
                let result = store
                    .upload(&path, &bucket, &key, &creds, &bytes)
                    .await
                    .map_err(|e| e.to_string());
                let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                on_progress(done, total);
                (path, result)
            }));
        }

        let mut report = BatchReport::default();
        for handle in futures::future::join_all(handles).await {
            match handle {
                Ok((path, Ok(()))) => report.succeeded.push(path),
                Ok((path, Err(reason))) => {
                    tracing::error!(file = %path.display(), "Upload failed: {}", reason);
                    report.failed.push(FailedUpload { path, reason });
                }
                Err(join_error) => {
                    tracing::error!("Upload task panicked: {}", join_error);
                    report.failed.push(FailedUpload {
                        path: PathBuf::new(),
                        reason: format!("task panicked: {}", join_error),
                    });
                }
            }
        }
        report
    }

    /// Poll fileset processing until every fileset is complete or the
    /// wall-clock bound expires.
    ///
    /// Returns `Ok(true)` when processing finished, `Ok(false)` on timeout —
    /// the timeout only stops waiting, it is not a failure and does not
    /// cancel server-side work.
    pub async fn poll_import_progress(
        &self,
        import_uuid: &str,
        on_progress: &(dyn Fn(&[Fileset]) + Send + Sync),
    ) -> Result<bool> {
        tracing::info!("Waiting for filesets...");
        let deadline = tokio::time::Instant::now() + self.poll_timeout;

        loop {
            let filesets = self.service.list_filesets_in_import(import_uuid).await?;
            if !filesets.is_empty() {
                on_progress(&filesets);
                if filesets.iter().all(|f| f.complete) {
                    return Ok(true);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(
                    import_uuid,
                    "Timed out waiting for fileset processing; the import may still finish server-side"
                );
                return Ok(false);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// List each completed fileset with its resulting images.
    pub async fn collect_results(
        &self,
        import_uuid: &str,
    ) -> Result<Vec<(Fileset, Vec<ImageRecord>)>> {
        let filesets = self.service.list_filesets_in_import(import_uuid).await?;
        let mut results = Vec::with_capacity(filesets.len());
        for fileset in filesets {
            let images = self.service.list_images_in_fileset(&fileset.uuid).await?;
            results.push((fileset, images));
        }
        Ok(results)
    }
}

/// Client-generated import job name: `I` + 9 random base-36 uppercase chars.
fn random_import_name() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();
    format!("I{}", suffix)
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ImageDimensions, ImportRecord, IncompleteImports, Repository, RepositoryGrant,
        RepositoryListing, StorageTarget,
    };
    use crate::progress;
    use crate::service::ImageService;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    const REPO_UUID: &str = "4fa9e42c-3591-40e7-923a-6cbd24ba8260";
    const IMPORT_UUID: &str = "d362cb3d-7ea2-4301-be25-9b425cc868dc";
    const IMAGE_UUID: &str = "8d8cbd1f-55a3-42ae-a547-3f8331b43c0e";

    fn fake_credentials() -> StorageCredentials {
        StorageCredentials {
            target: StorageTarget {
                bucket: "raw-bucket".to_string(),
                prefix: "633de874-31a6-4a13-b09f-2928a8491b9a/".to_string(),
            },
            credentials: ScopedCredentials {
                access_key_id: "FakeAccessKeyId".to_string(),
                secret_access_key: "FakeSecretAccessKey".to_string(),
                session_token: "FakeSessionToken".to_string(),
                expiration: None,
            },
        }
    }

    /// In-memory service recording every call.
    #[derive(Default)]
    struct MockService {
        repositories: Vec<Repository>,
        filesets: Vec<Fileset>,
        list_repository_calls: AtomicUsize,
        create_repository_calls: AtomicUsize,
        create_import_calls: AtomicUsize,
        credentials_calls: AtomicUsize,
        mark_complete_calls: AtomicUsize,
        fileset_list_calls: AtomicUsize,
        create_image_calls: AtomicUsize,
        created_names: Mutex<Vec<String>>,
    }

    impl MockService {
        fn with_filesets(filesets: Vec<Fileset>) -> Self {
            Self {
                filesets,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl ImageService for MockService {
        async fn list_repositories(&self) -> Result<RepositoryListing> {
            self.list_repository_calls.fetch_add(1, Ordering::SeqCst);
            Ok(RepositoryListing {
                repositories: self.repositories.clone(),
                grants: Vec::new(),
            })
        }

        async fn create_repository(
            &self,
            name: &str,
            _raw_storage: RawStoragePolicy,
        ) -> Result<Repository> {
            self.create_repository_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Repository {
                uuid: REPO_UUID.to_string(),
                name: name.to_string(),
                raw_storage: None,
            })
        }

        async fn create_import(&self, name: &str, _repository_uuid: &str) -> Result<ImportRecord> {
            self.create_import_calls.fetch_add(1, Ordering::SeqCst);
            self.created_names.lock().unwrap().push(name.to_string());
            Ok(ImportRecord {
                uuid: IMPORT_UUID.to_string(),
                name: Some(name.to_string()),
                repository_uuid: None,
                complete: None,
            })
        }

        async fn get_import_credentials(&self, _import_uuid: &str) -> Result<StorageCredentials> {
            self.credentials_calls.fetch_add(1, Ordering::SeqCst);
            Ok(fake_credentials())
        }

        async fn mark_import_complete(&self, _import_uuid: &str) -> Result<()> {
            self.mark_complete_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn list_filesets_in_import(&self, _import_uuid: &str) -> Result<Vec<Fileset>> {
            self.fileset_list_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.filesets.clone())
        }

        async fn list_images_in_fileset(&self, _fileset_uuid: &str) -> Result<Vec<ImageRecord>> {
            Ok(Vec::new())
        }

        async fn list_images_in_repository(
            &self,
            _repository_uuid: &str,
        ) -> Result<Vec<ImageRecord>> {
            Ok(Vec::new())
        }

        async fn list_incomplete_imports(&self) -> Result<IncompleteImports> {
            Ok(IncompleteImports {
                imports: Vec::new(),
                filesets: Vec::new(),
            })
        }

        async fn create_image(
            &self,
            _name: &str,
            _repository_uuid: &str,
            _pyramid_levels: u32,
        ) -> Result<ImageRecord> {
            self.create_image_calls.fetch_add(1, Ordering::SeqCst);
            Ok(ImageRecord {
                uuid: IMAGE_UUID.to_string(),
                name: None,
                pyramid_levels: None,
            })
        }

        async fn get_image_credentials(&self, _image_uuid: &str) -> Result<StorageCredentials> {
            self.credentials_calls.fetch_add(1, Ordering::SeqCst);
            Ok(fake_credentials())
        }

        async fn get_image_dimensions(&self, _image_uuid: &str) -> Result<ImageDimensions> {
            unimplemented!("not used by import tests")
        }
    }

    /// Object store that records keys and optionally fails some of them.
    #[derive(Default)]
    struct MockStore {
        uploads: Mutex<Vec<String>>,
        fail_keys: HashSet<String>,
    }

    #[async_trait]
    impl ObjectStore for MockStore {
        async fn upload(
            &self,
            _local: &Path,
            _bucket: &str,
            key: &str,
            _credentials: &ScopedCredentials,
            _progress: &ByteProgress,
        ) -> Result<()> {
            if self.fail_keys.contains(key) {
                return Err(TesseraError::Storage {
                    key: key.to_string(),
                    message: "simulated failure".to_string(),
                });
            }
            self.uploads.lock().unwrap().push(key.to_string());
            Ok(())
        }

        async fn download(
            &self,
            _bucket: &str,
            _key: &str,
            _credentials: &ScopedCredentials,
        ) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    fn complete_fileset() -> Fileset {
        Fileset {
            uuid: "776d35d5-d33e-4fc9-bb67-9b9696a29736".to_string(),
            name: "Fakename".to_string(),
            complete: true,
            progress: Some(100),
        }
    }

    fn importer(service: Arc<MockService>, store: Arc<MockStore>) -> Importer {
        Importer::new(service, store)
            .with_name_source(|| "ITESTNAME1".to_string())
            .with_poll(Duration::from_millis(1), Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_end_to_end_batch_import() {
        let service = Arc::new(MockService::with_filesets(vec![complete_fileset()]));
        let store = Arc::new(MockStore::default());
        let importer = importer(Arc::clone(&service), Arc::clone(&store));

        let files = vec![PathBuf::from("/a/img1.tif"), PathBuf::from("/a/img2.rcpnl")];
        let outcome = importer
            .import_files(&files, "slides", RawStoragePolicy::Destroy, progress::silent())
            .await
            .unwrap()
            .expect("non-empty import");

        assert_eq!(outcome.import_uuid, IMPORT_UUID);
        assert_eq!(outcome.repository_uuid, REPO_UUID);
        assert!(outcome.report.all_succeeded());
        assert_eq!(outcome.report.summary(), "2/2 files uploaded");

        // Exactly one call per protocol step.
        assert_eq!(service.create_repository_calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.create_import_calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.credentials_calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.mark_complete_calls.load(Ordering::SeqCst), 1);

        // Keys are prefix + derive_key(path).
        let mut uploads = store.uploads.lock().unwrap().clone();
        uploads.sort();
        assert_eq!(
            uploads,
            vec![
                "633de874-31a6-4a13-b09f-2928a8491b9a//a/img1.tif".to_string(),
                "633de874-31a6-4a13-b09f-2928a8491b9a//a/img2.rcpnl".to_string(),
            ]
        );

        // Polling terminates on the first all-complete response.
        let completed = importer
            .poll_import_progress(IMPORT_UUID, &|_| {})
            .await
            .unwrap();
        assert!(completed);
        assert_eq!(service.fileset_list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_import_name_comes_from_name_source() {
        let service = Arc::new(MockService::default());
        let store = Arc::new(MockStore::default());
        let importer = importer(Arc::clone(&service), store);

        importer
            .import_files(
                &[PathBuf::from("/a/img1.tif")],
                "slides",
                RawStoragePolicy::Destroy,
                progress::silent(),
            )
            .await
            .unwrap();

        assert_eq!(
            service.created_names.lock().unwrap().as_slice(),
            &["ITESTNAME1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_existing_repository_is_reused() {
        let mut service = MockService::default();
        service.repositories = vec![Repository {
            uuid: REPO_UUID.to_string(),
            name: "slides".to_string(),
            raw_storage: Some("Destroy".to_string()),
        }];
        let service = Arc::new(service);
        let store = Arc::new(MockStore::default());
        let importer = importer(Arc::clone(&service), store);

        let outcome = importer
            .import_files(
                &[PathBuf::from("/a/img1.tif")],
                "slides",
                RawStoragePolicy::Archive,
                progress::silent(),
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.repository_uuid, REPO_UUID);
        assert_eq!(service.create_repository_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_file_list_is_clean_noop() {
        let service = Arc::new(MockService::default());
        let store = Arc::new(MockStore::default());
        let importer = importer(Arc::clone(&service), store);

        let outcome = importer
            .import_files(&[], "slides", RawStoragePolicy::Destroy, progress::silent())
            .await
            .unwrap();

        assert!(outcome.is_none());
        // No network activity at all.
        assert_eq!(service.list_repository_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_repository_name_fails_before_network() {
        let service = Arc::new(MockService::default());
        let store = Arc::new(MockStore::default());
        let importer = importer(Arc::clone(&service), store);

        let err = importer
            .import_files(
                &[PathBuf::from("/a/img1.tif")],
                "9lives",
                RawStoragePolicy::Destroy,
                progress::silent(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, TesseraError::InvalidName { .. }));
        assert_eq!(service.list_repository_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_upload_lands_in_report_and_job_still_completes() {
        let service = Arc::new(MockService::default());
        let mut store = MockStore::default();
        store
            .fail_keys
            .insert("633de874-31a6-4a13-b09f-2928a8491b9a//a/img2.rcpnl".to_string());
        let store = Arc::new(store);
        let importer = importer(Arc::clone(&service), Arc::clone(&store));

        let files = vec![PathBuf::from("/a/img1.tif"), PathBuf::from("/a/img2.rcpnl")];
        let outcome = importer
            .import_files(&files, "slides", RawStoragePolicy::Destroy, progress::silent())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.report.summary(), "1/2 files uploaded");
        assert_eq!(outcome.report.failed.len(), 1);
        assert!(outcome.report.failed[0]
            .reason
            .contains("simulated failure"));
        // Deliberate legacy contract: complete is marked regardless.
        assert_eq!(service.mark_complete_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_poll_times_out_without_error() {
        let incomplete = Fileset {
            complete: false,
            progress: Some(40),
            ..complete_fileset()
        };
        let service = Arc::new(MockService::with_filesets(vec![incomplete]));
        let store = Arc::new(MockStore::default());
        let importer = importer(Arc::clone(&service), store)
            .with_poll(Duration::from_millis(1), Duration::from_millis(10));

        let completed = importer
            .poll_import_progress(IMPORT_UUID, &|_| {})
            .await
            .unwrap();

        assert!(!completed);
        assert!(service.fileset_list_calls.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_upload_progress_counts_files() {
        let service = Arc::new(MockService::default());
        let store = Arc::new(MockStore::default());
        let importer = importer(Arc::clone(&service), store);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            Arc::new(move |done: u64, total: u64| {
                seen.lock().unwrap().push((done, total));
            })
        };

        importer
            .import_files(
                &[PathBuf::from("/a/1.tif"), PathBuf::from("/a/2.tif")],
                "slides",
                RawStoragePolicy::Destroy,
                sink,
            )
            .await
            .unwrap();

        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec![(1, 2), (2, 2)]);
    }

    mod direct {
        use super::*;
        use std::io::Write;

        fn png_tile(bit_depth: u8, color_type: u8) -> Vec<u8> {
            let mut data = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
            data.extend_from_slice(&13u32.to_be_bytes());
            data.extend_from_slice(b"IHDR");
            data.extend_from_slice(&256u32.to_be_bytes());
            data.extend_from_slice(&256u32.to_be_bytes());
            data.push(bit_depth);
            data.push(color_type);
            data.extend_from_slice(&[0, 0, 0]);
            data
        }

        fn write_tile_dir(valid: bool) -> tempfile::TempDir {
            let dir = tempfile::tempdir().unwrap();
            let bit_depth = if valid { 16 } else { 8 };
            for name in [
                "C0-T0-Z0-L0-Y0-X0.png",
                "C0-T0-Z0-L0-Y0-X1.png",
                "C0-T0-Z0-L1-Y0-X0.png",
            ] {
                let mut file = std::fs::File::create(dir.path().join(name)).unwrap();
                file.write_all(&png_tile(bit_depth, 0)).unwrap();
            }
            std::fs::write(dir.path().join("metadata.xml"), "<OME/>").unwrap();
            dir
        }

        fn request(dir: &tempfile::TempDir) -> DirectImportRequest {
            DirectImportRequest {
                directory: dir.path().to_path_buf(),
                image_name: "directtest".to_string(),
                repository: "slides".to_string(),
                raw_storage: RawStoragePolicy::Destroy,
                metadata: None,
            }
        }

        #[tokio::test]
        async fn test_direct_import_uploads_tiles_and_sidecar() {
            let dir = write_tile_dir(true);
            let service = Arc::new(MockService::default());
            let store = Arc::new(MockStore::default());
            let importer = importer(Arc::clone(&service), Arc::clone(&store));

            let outcome = importer
                .import_tiled_image(&request(&dir), progress::silent())
                .await
                .unwrap()
                .unwrap();

            assert_eq!(outcome.image_uuid, IMAGE_UUID);
            assert_eq!(outcome.report.summary(), "3/3 files uploaded");
            assert_eq!(service.create_image_calls.load(Ordering::SeqCst), 1);
            // No import job machinery on the direct path.
            assert_eq!(service.create_import_calls.load(Ordering::SeqCst), 0);
            assert_eq!(service.mark_complete_calls.load(Ordering::SeqCst), 0);

            let uploads = store.uploads.lock().unwrap();
            assert_eq!(uploads.len(), 4); // 3 tiles + sidecar
            assert!(uploads
                .iter()
                .any(|k| k.ends_with("C0-T0-Z0-L1-Y0-X0.png")));
            assert!(uploads.iter().any(|k| k.ends_with("metadata.xml")));
        }

        #[tokio::test]
        async fn test_invalid_tile_aborts_with_zero_uploads() {
            let dir = write_tile_dir(false);
            let service = Arc::new(MockService::default());
            let store = Arc::new(MockStore::default());
            let importer = importer(Arc::clone(&service), Arc::clone(&store));

            let err = importer
                .import_tiled_image(&request(&dir), progress::silent())
                .await
                .unwrap_err();

            assert!(matches!(err, TesseraError::InvalidFormat { .. }));
            assert!(store.uploads.lock().unwrap().is_empty());
            assert_eq!(service.create_image_calls.load(Ordering::SeqCst), 0);
        }

        #[tokio::test]
        async fn test_missing_sidecar_is_fatal_before_upload() {
            let dir = write_tile_dir(true);
            std::fs::remove_file(dir.path().join("metadata.xml")).unwrap();
            let service = Arc::new(MockService::default());
            let store = Arc::new(MockStore::default());
            let importer = importer(Arc::clone(&service), Arc::clone(&store));

            let err = importer
                .import_tiled_image(&request(&dir), progress::silent())
                .await
                .unwrap_err();

            assert!(matches!(err, TesseraError::MissingSidecar(_)));
            assert!(store.uploads.lock().unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_empty_tile_dir_is_clean_noop() {
            let dir = tempfile::tempdir().unwrap();
            let service = Arc::new(MockService::default());
            let store = Arc::new(MockStore::default());
            let importer = importer(Arc::clone(&service), store);

            let outcome = importer
                .import_tiled_image(&request(&dir), progress::silent())
                .await
                .unwrap();
            assert!(outcome.is_none());
            assert_eq!(service.list_repository_calls.load(Ordering::SeqCst), 0);
        }
    }

    #[test]
    fn test_random_import_name_shape() {
        for _ in 0..32 {
            let name = random_import_name();
            assert_eq!(name.len(), 10);
            assert!(name.starts_with('I'));
            assert!(name[1..]
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }
}
