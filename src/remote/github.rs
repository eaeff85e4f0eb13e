//! GitHub contents API client.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::http_client;

use super::{CommitReceipt, FileSnapshot, Fingerprint, RemoteError, RepoConfig, RepositoryApi};

/// Public GitHub REST endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const MAX_METADATA_BYTES: usize = 256 * 1024;
const MAX_CONTENTS_BYTES: usize = 16 * 1024 * 1024;
const MAX_ERROR_BODY_BYTES: usize = 64 * 1024;

/// Blocking client for the four contents operations.
#[derive(Clone, Debug)]
pub struct GitHubClient {
    base_url: Url,
}

impl Default for GitHubClient {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_API_BASE).expect("default API base parses"),
        }
    }
}

impl GitHubClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the client at another API root (GitHub Enterprise or a test server).
    pub fn with_base_url(base_url: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url, String> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| format!("API base {} cannot carry a path", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn repo_url(&self, config: &RepoConfig) -> Result<Url, String> {
        self.endpoint(["repos", config.owner.as_str(), config.repo.as_str()])
    }

    fn contents_url(&self, config: &RepoConfig, path: &str) -> Result<Url, String> {
        let segments = ["repos", config.owner.as_str(), config.repo.as_str(), "contents"]
            .into_iter()
            .chain(path.split('/').filter(|segment| !segment.is_empty()));
        self.endpoint(segments)
    }

    fn put_contents(
        &self,
        config: &RepoConfig,
        path: &str,
        body: &PutContentsRequest<'_>,
    ) -> Result<CommitReceipt, PutFailure> {
        let url = self
            .contents_url(config, path)
            .map_err(PutFailure::Transport)?;
        let response = match authorized(http_client::agent().put(url.as_str()), config)
            .send_json(body)
        {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                return Err(PutFailure::Status(code, provider_message(code, response)));
            }
            Err(ureq::Error::Transport(err)) => return Err(PutFailure::Transport(err.to_string())),
        };
        let text = http_client::read_response_text(response, MAX_METADATA_BYTES)
            .map_err(|err| PutFailure::Transport(err.to_string()))?;
        let parsed: PutContentsResponse = serde_json::from_str(&text)
            .map_err(|err| PutFailure::Transport(format!("Invalid response: {err}")))?;
        Ok(CommitReceipt {
            fingerprint: parsed.content.map(|content| Fingerprint::new(content.sha)),
            commit_sha: parsed.commit.map(|commit| commit.sha),
        })
    }
}

impl RepositoryApi for GitHubClient {
    fn check_access(&self, config: &RepoConfig) -> bool {
        let Ok(url) = self.repo_url(config) else {
            return false;
        };
        match authorized(http_client::agent().get(url.as_str()), config).call() {
            Ok(response) => (200..300).contains(&response.status()),
            Err(ureq::Error::Status(code, _)) => {
                tracing::debug!(code, repo = %config.slug(), "Repository access denied");
                false
            }
            Err(ureq::Error::Transport(err)) => {
                tracing::debug!(error = %err, repo = %config.slug(), "Repository access check failed");
                false
            }
        }
    }

    fn read_file(&self, config: &RepoConfig, path: &str) -> Result<FileSnapshot, RemoteError> {
        let read_error = |message: String| RemoteError::Read {
            path: path.to_string(),
            message,
        };
        let url = self.contents_url(config, path).map_err(read_error)?;
        let response = match authorized(http_client::agent().get(url.as_str()), config).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                return Err(read_error(provider_message(code, response)));
            }
            Err(ureq::Error::Transport(err)) => return Err(read_error(err.to_string())),
        };
        let text = http_client::read_response_text(response, MAX_CONTENTS_BYTES)
            .map_err(|err| read_error(err.to_string()))?;
        let parsed: ContentsResponse = serde_json::from_str(&text)
            .map_err(|err| read_error(format!("Invalid response: {err}")))?;
        let content = decode_content(&parsed).map_err(read_error)?;
        Ok(FileSnapshot {
            content,
            fingerprint: Fingerprint::new(parsed.sha),
        })
    }

    fn write_new_file(
        &self,
        config: &RepoConfig,
        path: &str,
        content_base64: &str,
        message: &str,
    ) -> Result<CommitReceipt, RemoteError> {
        let body = PutContentsRequest {
            message,
            content: content_base64,
            sha: None,
        };
        self.put_contents(config, path, &body)
            .map_err(|failure| RemoteError::Write {
                path: path.to_string(),
                message: failure.into_message(),
            })
    }

    fn update_file(
        &self,
        config: &RepoConfig,
        path: &str,
        content: &str,
        fingerprint: &Fingerprint,
        message: &str,
    ) -> Result<CommitReceipt, RemoteError> {
        let encoded = STANDARD.encode(content.as_bytes());
        let body = PutContentsRequest {
            message,
            content: &encoded,
            sha: Some(fingerprint.as_str()),
        };
        self.put_contents(config, path, &body)
            .map_err(|failure| match failure {
                PutFailure::Status(409, message) => RemoteError::Conflict {
                    path: path.to_string(),
                    message,
                },
                other => RemoteError::Write {
                    path: path.to_string(),
                    message: other.into_message(),
                },
            })
    }
}

enum PutFailure {
    Status(u16, String),
    Transport(String),
}

impl PutFailure {
    fn into_message(self) -> String {
        match self {
            Self::Status(_, message) | Self::Transport(message) => message,
        }
    }
}

#[derive(Serialize)]
struct PutContentsRequest<'a> {
    message: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Deserialize)]
struct PutContentsResponse {
    content: Option<ShaOnly>,
    commit: Option<ShaOnly>,
}

#[derive(Deserialize)]
struct ShaOnly {
    sha: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

fn authorized(request: ureq::Request, config: &RepoConfig) -> ureq::Request {
    request
        .set("Accept", "application/vnd.github+json")
        .set("X-GitHub-Api-Version", "2022-11-28")
        .set("Authorization", &format!("Bearer {}", config.token.trim()))
}

/// Prefer the provider's `message` field; fall back to the raw body.
fn provider_message(code: u16, response: ureq::Response) -> String {
    let body = http_client::read_response_text(response, MAX_ERROR_BODY_BYTES).unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|parsed| parsed.message)
        .unwrap_or_else(|| body.trim().to_string());
    if message.is_empty() {
        format!("HTTP {code}")
    } else {
        format!("HTTP {code}: {message}")
    }
}

fn decode_content(response: &ContentsResponse) -> Result<String, String> {
    match response.encoding.as_deref() {
        None | Some("base64") => {}
        Some(other) => {
            return Err(format!(
                "Unsupported content encoding '{other}' (file may be too large for the contents API)"
            ));
        }
    }
    let packed: String = response
        .content
        .as_deref()
        .unwrap_or_default()
        .chars()
        .filter(|ch| !ch.is_ascii_whitespace())
        .collect();
    let bytes = STANDARD
        .decode(packed)
        .map_err(|err| format!("Invalid base64 content: {err}"))?;
    String::from_utf8(bytes).map_err(|err| format!("Content is not UTF-8: {err}"))
}
