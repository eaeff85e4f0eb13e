//! Access to the versioned file-hosting API that stores assets and the catalog.
//!
//! [`RepositoryApi`] is the seam between the upload workflow and the network:
//! [`github::GitHubClient`] talks to the GitHub contents API and
//! [`memory::InMemoryRepository`] keeps files in memory with the same
//! compare-and-swap rules.

mod credentials;
pub mod github;
pub mod memory;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use credentials::{
    CredentialProvider, CredentialStore, CredentialStoreError, MemoryCredentials,
};

/// Credentials and coordinates of the target repository.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    pub token: String,
    pub owner: String,
    pub repo: String,
}

impl RepoConfig {
    pub fn new(
        token: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// True when every field is filled in.
    pub fn is_complete(&self) -> bool {
        [&self.token, &self.owner, &self.repo]
            .iter()
            .all(|value| !value.trim().is_empty())
    }

    /// `OWNER/REPO` slug.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl fmt::Debug for RepoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepoConfig")
            .field("token", &"<redacted>")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .finish()
    }
}

/// Opaque version token of a remote file (the provider's blob sha).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decoded content of a remote file plus the fingerprint it was read at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileSnapshot {
    pub content: String,
    pub fingerprint: Fingerprint,
}

/// Result of a successful write.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommitReceipt {
    /// Fingerprint of the file as written, when the provider reports it.
    pub fingerprint: Option<Fingerprint>,
    /// Commit created by the write, when the provider reports it.
    pub commit_sha: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },
    #[error("Failed to write {path}: {message}")]
    Write { path: String, message: String },
    /// The fingerprint no longer matches the file's current version.
    #[error("{path} changed since it was read: {message}")]
    Conflict { path: String, message: String },
}

impl RemoteError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// The four operations the catalog workflow needs from the hosting API.
///
/// Implementations block the calling thread; callers that must stay
/// responsive run them on a worker (see `workflow::UploadJob`).
pub trait RepositoryApi {
    /// True only when the repository metadata request succeeds. Never errors.
    fn check_access(&self, config: &RepoConfig) -> bool;

    /// Fetch a text file and its current fingerprint.
    fn read_file(&self, config: &RepoConfig, path: &str) -> Result<FileSnapshot, RemoteError>;

    /// Create a file that does not exist yet from base64-encoded content.
    fn write_new_file(
        &self,
        config: &RepoConfig,
        path: &str,
        content_base64: &str,
        message: &str,
    ) -> Result<CommitReceipt, RemoteError>;

    /// Replace a text file, only if `fingerprint` still matches its current version.
    fn update_file(
        &self,
        config: &RepoConfig,
        path: &str,
        content: &str,
        fingerprint: &Fingerprint,
        message: &str,
    ) -> Result<CommitReceipt, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_token() {
        let config = RepoConfig::new("ghp_secret", "owner", "vault");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("ghp_secret"));
        assert!(rendered.contains("vault"));
    }

    #[test]
    fn completeness_requires_all_fields() {
        assert!(RepoConfig::new("t", "o", "r").is_complete());
        assert!(!RepoConfig::new("t", " ", "r").is_complete());
        assert!(!RepoConfig::default().is_complete());
    }
}
