use std::path::Path;

use crate::remote::{RepoConfig, RepositoryApi};

use super::{AssetId, AssetRecord, CatalogError, parse_catalog};

/// Ordered, read-only list of asset records.
///
/// Order is the catalog's own order; nothing here sorts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogStore {
    records: Vec<AssetRecord>,
}

impl CatalogStore {
    pub fn new(records: Vec<AssetRecord>) -> Self {
        Self { records }
    }

    /// Build the store from catalog text containing `marker`.
    pub fn from_catalog_text(text: &str, marker: &str) -> Result<Self, CatalogError> {
        parse_catalog(text, marker).map(Self::new)
    }

    /// Load a local copy of the catalog text.
    pub fn load_file(path: &Path, marker: &str) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::from_catalog_text(&text, marker)?;
        tracing::debug!(path = %path.display(), count = store.len(), "Loaded catalog");
        Ok(store)
    }

    /// Fetch the catalog text from the remote repository and parse it.
    pub fn fetch_remote<R: RepositoryApi + ?Sized>(
        repo: &R,
        config: &RepoConfig,
        catalog_path: &str,
        marker: &str,
    ) -> Result<Self, CatalogError> {
        let snapshot = repo.read_file(config, catalog_path)?;
        Self::from_catalog_text(&snapshot.content, marker)
    }

    pub fn records(&self) -> &[AssetRecord] {
        &self.records
    }

    pub fn get(&self, id: &AssetId) -> Option<&AssetRecord> {
        self.records.iter().find(|record| &record.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
