//! In-memory repository with the same compare-and-swap rules as the hosting API.
//!
//! Used by the test suite and by `--dry-run` uploads. Every call is recorded
//! so callers can assert on ordering.

use std::collections::HashMap;
use std::sync::Mutex;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

use super::{CommitReceipt, FileSnapshot, Fingerprint, RemoteError, RepoConfig, RepositoryApi};

/// One recorded call against the repository.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteCall {
    CheckAccess,
    Read(String),
    WriteNew(String),
    Update(String),
}

/// Operation that should fail on its next invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailPoint {
    Read,
    WriteNew,
    Update,
}

#[derive(Default)]
struct State {
    files: HashMap<String, Vec<u8>>,
    calls: Vec<RemoteCall>,
    fail_next: Vec<FailPoint>,
    commits: u64,
}

/// Files keyed by repository path, guarded by one mutex.
pub struct InMemoryRepository {
    owner: String,
    repo: String,
    token: String,
    state: Mutex<State>,
}

impl InMemoryRepository {
    pub fn new(owner: &str, repo: &str, token: &str) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            token: token.to_string(),
            state: Mutex::new(State::default()),
        }
    }

    /// Credentials that this repository accepts.
    pub fn config(&self) -> RepoConfig {
        RepoConfig::new(&self.token, &self.owner, &self.repo)
    }

    pub fn seed_text(&self, path: &str, content: &str) {
        self.lock().files.insert(path.to_string(), content.as_bytes().to_vec());
    }

    /// Simulate another writer changing a file behind the caller's back.
    pub fn overwrite_text(&self, path: &str, content: &str) {
        self.seed_text(path, content);
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().files.get(path).cloned()
    }

    pub fn text(&self, path: &str) -> Option<String> {
        self.file(path)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    pub fn fail_next(&self, point: FailPoint) {
        self.lock().fail_next.push(point);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn authorized(&self, config: &RepoConfig) -> bool {
        config.owner == self.owner && config.repo == self.repo && config.token == self.token
    }
}

impl State {
    fn take_failure(&mut self, point: FailPoint) -> bool {
        match self.fail_next.iter().position(|pending| *pending == point) {
            Some(index) => {
                self.fail_next.remove(index);
                true
            }
            None => false,
        }
    }

    fn commit(&mut self, path: &str, bytes: Vec<u8>) -> CommitReceipt {
        self.commits += 1;
        let fingerprint = fingerprint_of(&bytes);
        self.files.insert(path.to_string(), bytes);
        CommitReceipt {
            fingerprint: Some(fingerprint),
            commit_sha: Some(format!("commit-{}", self.commits)),
        }
    }
}

impl RepositoryApi for InMemoryRepository {
    fn check_access(&self, config: &RepoConfig) -> bool {
        self.lock().calls.push(RemoteCall::CheckAccess);
        self.authorized(config)
    }

    fn read_file(&self, config: &RepoConfig, path: &str) -> Result<FileSnapshot, RemoteError> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::Read(path.to_string()));
        let read_error = |message: &str| RemoteError::Read {
            path: path.to_string(),
            message: message.to_string(),
        };
        if !self.authorized(config) {
            return Err(read_error("HTTP 404: Not Found"));
        }
        if state.take_failure(FailPoint::Read) {
            return Err(read_error("HTTP 503: Service Unavailable"));
        }
        let bytes = state
            .files
            .get(path)
            .ok_or_else(|| read_error("HTTP 404: Not Found"))?;
        let content = String::from_utf8(bytes.clone())
            .map_err(|err| read_error(&format!("Content is not UTF-8: {err}")))?;
        Ok(FileSnapshot {
            fingerprint: fingerprint_of(bytes),
            content,
        })
    }

    fn write_new_file(
        &self,
        config: &RepoConfig,
        path: &str,
        content_base64: &str,
        _message: &str,
    ) -> Result<CommitReceipt, RemoteError> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::WriteNew(path.to_string()));
        let write_error = |message: String| RemoteError::Write {
            path: path.to_string(),
            message,
        };
        if !self.authorized(config) {
            return Err(write_error("HTTP 404: Not Found".into()));
        }
        if state.take_failure(FailPoint::WriteNew) {
            return Err(write_error("HTTP 503: Service Unavailable".into()));
        }
        if state.files.contains_key(path) {
            return Err(write_error(
                "HTTP 422: Invalid request. \"sha\" wasn't supplied.".into(),
            ));
        }
        let bytes = STANDARD
            .decode(content_base64)
            .map_err(|err| write_error(format!("HTTP 422: content is not valid Base64: {err}")))?;
        Ok(state.commit(path, bytes))
    }

    fn update_file(
        &self,
        config: &RepoConfig,
        path: &str,
        content: &str,
        fingerprint: &Fingerprint,
        _message: &str,
    ) -> Result<CommitReceipt, RemoteError> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::Update(path.to_string()));
        if !self.authorized(config) {
            return Err(RemoteError::Write {
                path: path.to_string(),
                message: "HTTP 404: Not Found".into(),
            });
        }
        if state.take_failure(FailPoint::Update) {
            return Err(RemoteError::Write {
                path: path.to_string(),
                message: "HTTP 503: Service Unavailable".into(),
            });
        }
        let current = state.files.get(path).map(|bytes| fingerprint_of(bytes));
        if current.as_ref() != Some(fingerprint) {
            return Err(RemoteError::Conflict {
                path: path.to_string(),
                message: format!("HTTP 409: {path} does not match {fingerprint}"),
            });
        }
        Ok(state.commit(path, content.as_bytes().to_vec()))
    }
}

fn fingerprint_of(bytes: &[u8]) -> Fingerprint {
    let digest = Sha256::digest(bytes);
    Fingerprint::new(digest.iter().map(|byte| format!("{byte:02x}")).collect::<String>())
}
