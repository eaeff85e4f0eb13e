//! Five-stage upload that adds an asset file and registers it in the catalog.
//!
//! Stages run strictly in order: analyze locally, create the asset file,
//! read the catalog, inject the new record, write the catalog back guarded
//! by the fingerprint from the read. Nothing is rolled back; a failure
//! after the asset file exists carries a [`PendingRegistration`] so only
//! the catalog half has to be repeated.

mod analyze;
mod inject;
mod job;

use std::fmt;
use std::path::Path;

pub use analyze::{PreparedAsset, format_duration, prepare, probe_duration, sanitize_filename};
pub use inject::{inject_after_marker, inject_record};
pub use job::{JobEvent, SharedRepository, UploadJob, UploadWork};

use crate::catalog::{AssetId, AssetRecord, Category, DEFAULT_MARKER};
use crate::remote::{CommitReceipt, RemoteError, RepoConfig, RepositoryApi};

/// Where assets and the catalog live inside the repository.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogLayout {
    pub asset_dir: String,
    pub catalog_path: String,
    pub marker: String,
}

impl Default for CatalogLayout {
    fn default() -> Self {
        Self {
            asset_dir: "public/sounds".into(),
            catalog_path: "constants.ts".into(),
            marker: DEFAULT_MARKER.into(),
        }
    }
}

impl CatalogLayout {
    pub fn asset_path(&self, filename: &str) -> String {
        let dir = self.asset_dir.trim_matches('/');
        if dir.is_empty() {
            filename.to_string()
        } else {
            format!("{dir}/{filename}")
        }
    }
}

/// Selected file plus the metadata typed by the curator.
#[derive(Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub title: String,
    pub category: Category,
    pub description: String,
}

impl UploadRequest {
    /// Read `path` from disk, keeping its file name for the remote path.
    pub fn from_path(
        path: &Path,
        title: &str,
        category: Category,
        description: &str,
    ) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            file_name,
            bytes,
            title: title.to_string(),
            category,
            description: description.to_string(),
        })
    }
}

impl fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRequest")
            .field("file_name", &self.file_name)
            .field("bytes", &self.bytes.len())
            .field("title", &self.title)
            .field("category", &self.category)
            .finish()
    }
}

/// Stage currently in flight, reported before each stage starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadStage {
    Analyzing,
    UploadingAsset { path: String },
    ReadingCatalog { path: String },
    InjectingRecord,
    WritingCatalog { path: String },
}

impl UploadStage {
    /// 1-based position in the pipeline.
    pub fn number(&self) -> u8 {
        match self {
            Self::Analyzing => 1,
            Self::UploadingAsset { .. } => 2,
            Self::ReadingCatalog { .. } => 3,
            Self::InjectingRecord => 4,
            Self::WritingCatalog { .. } => 5,
        }
    }
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Analyzing => f.write_str("Analyzing audio file..."),
            Self::UploadingAsset { path } => write!(f, "Uploading {path}..."),
            Self::ReadingCatalog { path } => write!(f, "Reading {path}..."),
            Self::InjectingRecord => f.write_str("Adding catalog entry..."),
            Self::WritingCatalog { path } => write!(f, "Saving {path}..."),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("Asset upload failed: {0}")]
    AssetUpload(RemoteError),
    #[error("Catalog could not be read: {0}")]
    CatalogNotFound(RemoteError),
    #[error("Catalog {path} does not contain the record list marker `{marker}`")]
    MalformedCatalog { path: String, marker: String },
    #[error("Catalog changed while updating; retry to register against the latest version ({0})")]
    CatalogConflict(RemoteError),
    #[error("Catalog update failed: {0}")]
    CatalogWrite(RemoteError),
    #[error("Upload worker stopped unexpectedly")]
    Interrupted,
}

/// Error plus whatever survived of the run.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct WorkflowFailure {
    pub error: WorkflowError,
    /// Set once the asset file exists remotely but the catalog does not list it.
    pub pending: Option<PendingRegistration>,
}

impl WorkflowFailure {
    fn before_upload(error: WorkflowError) -> Self {
        Self {
            error,
            pending: None,
        }
    }

    fn after_upload(error: WorkflowError, pending: &PendingRegistration) -> Self {
        Self {
            error,
            pending: Some(pending.clone()),
        }
    }
}

/// An uploaded asset whose catalog record still has to be committed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingRegistration {
    pub record: AssetRecord,
    pub asset_path: String,
}

#[derive(Clone, Debug)]
pub struct UploadOutcome {
    pub record: AssetRecord,
    pub asset_path: String,
    /// `None` when only the registration half was run.
    pub asset_commit: Option<CommitReceipt>,
    pub catalog_commit: CommitReceipt,
}

/// Drives the stages against one repository with one set of credentials.
pub struct CatalogUpdateWorkflow<'a, R: RepositoryApi + ?Sized> {
    repo: &'a R,
    config: &'a RepoConfig,
    layout: &'a CatalogLayout,
}

impl<'a, R: RepositoryApi + ?Sized> CatalogUpdateWorkflow<'a, R> {
    pub fn new(repo: &'a R, config: &'a RepoConfig, layout: &'a CatalogLayout) -> Self {
        Self {
            repo,
            config,
            layout,
        }
    }

    /// Run all five stages with a freshly generated asset id.
    pub fn run(
        &self,
        request: &UploadRequest,
        progress: impl FnMut(&UploadStage),
    ) -> Result<UploadOutcome, WorkflowFailure> {
        self.run_with_id(request, AssetId::generate(), progress)
    }

    pub fn run_with_id(
        &self,
        request: &UploadRequest,
        id: AssetId,
        mut progress: impl FnMut(&UploadStage),
    ) -> Result<UploadOutcome, WorkflowFailure> {
        progress(&UploadStage::Analyzing);
        let prepared = prepare(request, self.layout, id).map_err(WorkflowFailure::before_upload)?;
        tracing::info!(
            file = %prepared.record.filename,
            duration = prepared.record.duration.as_deref().unwrap_or("0:00"),
            "Analyzed upload"
        );

        progress(&UploadStage::UploadingAsset {
            path: prepared.asset_path.clone(),
        });
        let asset_commit = self
            .repo
            .write_new_file(
                self.config,
                &prepared.asset_path,
                &prepared.content_base64,
                &format!("Add sound: {}", prepared.record.title),
            )
            .map_err(|err| {
                tracing::warn!(path = %prepared.asset_path, error = %err, "Asset upload failed");
                WorkflowFailure::before_upload(WorkflowError::AssetUpload(err))
            })?;
        tracing::info!(path = %prepared.asset_path, "Asset uploaded");

        let pending = PendingRegistration {
            record: prepared.record,
            asset_path: prepared.asset_path,
        };
        let catalog_commit = self.register_catalog(&pending, &mut progress)?;
        Ok(UploadOutcome {
            record: pending.record,
            asset_path: pending.asset_path,
            asset_commit: Some(asset_commit),
            catalog_commit,
        })
    }

    /// Repeat stages 3 to 5 for an asset that is already uploaded.
    pub fn register(
        &self,
        pending: &PendingRegistration,
        mut progress: impl FnMut(&UploadStage),
    ) -> Result<UploadOutcome, WorkflowFailure> {
        let catalog_commit = self.register_catalog(pending, &mut progress)?;
        Ok(UploadOutcome {
            record: pending.record.clone(),
            asset_path: pending.asset_path.clone(),
            asset_commit: None,
            catalog_commit,
        })
    }

    fn register_catalog(
        &self,
        pending: &PendingRegistration,
        progress: &mut impl FnMut(&UploadStage),
    ) -> Result<CommitReceipt, WorkflowFailure> {
        let path = &self.layout.catalog_path;
        progress(&UploadStage::ReadingCatalog { path: path.clone() });
        let snapshot = self.repo.read_file(self.config, path).map_err(|err| {
            tracing::warn!(path = %path, error = %err, "Catalog read failed");
            WorkflowFailure::after_upload(WorkflowError::CatalogNotFound(err), pending)
        })?;

        progress(&UploadStage::InjectingRecord);
        let updated = inject_record(&snapshot.content, &self.layout.marker, &pending.record)
            .map_err(|_| {
                tracing::warn!(path = %path, "Catalog marker missing");
                WorkflowFailure::after_upload(
                    WorkflowError::MalformedCatalog {
                        path: path.clone(),
                        marker: self.layout.marker.clone(),
                    },
                    pending,
                )
            })?;

        progress(&UploadStage::WritingCatalog { path: path.clone() });
        let receipt = self
            .repo
            .update_file(
                self.config,
                path,
                &updated,
                &snapshot.fingerprint,
                &format!("Register sound: {}", pending.record.title),
            )
            .map_err(|err| {
                tracing::warn!(path = %path, error = %err, "Catalog write failed");
                let error = if err.is_conflict() {
                    WorkflowError::CatalogConflict(err)
                } else {
                    WorkflowError::CatalogWrite(err)
                };
                WorkflowFailure::after_upload(error, pending)
            })?;
        tracing::info!(id = %pending.record.id, title = %pending.record.title, "Catalog updated");
        Ok(receipt)
    }
}
