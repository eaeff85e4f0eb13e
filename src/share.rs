//! Link, copy, download and open actions for published assets.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::catalog::AssetRecord;
use crate::config::SiteSettings;
use crate::http_client;
use crate::notify::NotificationCenter;

/// Upper bound for a single downloaded or streamed asset.
pub const MAX_ASSET_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    #[error("Invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("Clipboard unavailable: {0}")]
    Clipboard(String),
    #[error("Download of {url} failed: {message}")]
    Download { url: String, message: String },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Refusing to use {0:?} as a local file name")]
    UnsafeFilename(String),
    #[error("Could not open {url}: {source}")]
    Open {
        url: String,
        source: std::io::Error,
    },
}

/// Resolves the public address of each asset.
#[derive(Clone, Debug)]
pub struct AssetLinks {
    origin: Url,
    sound_base_path: String,
    overrides: BTreeMap<String, String>,
}

impl AssetLinks {
    pub fn new(
        site_base_url: &str,
        sound_base_path: &str,
        overrides: BTreeMap<String, String>,
    ) -> Result<Self, ShareError> {
        let origin = Url::parse(site_base_url).map_err(|source| ShareError::InvalidUrl {
            url: site_base_url.to_string(),
            source,
        })?;
        Ok(Self {
            origin,
            sound_base_path: sound_base_path.to_string(),
            overrides,
        })
    }

    pub fn from_settings(site: &SiteSettings) -> Result<Self, ShareError> {
        Self::new(&site.base_url, &site.sound_base_path, site.url_overrides.clone())
    }

    /// Override for the filename if configured, else origin + base path + filename.
    pub fn asset_url(&self, filename: &str) -> Result<Url, ShareError> {
        let raw = match self.overrides.get(filename) {
            Some(url) => return parse_url(url),
            None => format!("{}{}", self.sound_base_path, filename),
        };
        self.origin
            .join(&raw)
            .map_err(|source| ShareError::InvalidUrl { url: raw, source })
    }
}

fn parse_url(raw: &str) -> Result<Url, ShareError> {
    Url::parse(raw).map_err(|source| ShareError::InvalidUrl {
        url: raw.to_string(),
        source,
    })
}

/// Destination for copied links.
pub trait ClipboardSink {
    fn set_text(&mut self, text: &str) -> Result<(), ShareError>;
}

/// The OS clipboard.
pub struct SystemClipboard;

impl ClipboardSink for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), ShareError> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|err| ShareError::Clipboard(err.to_string()))?;
        clipboard
            .set_text(text.to_owned())
            .map_err(|err| ShareError::Clipboard(err.to_string()))
    }
}

/// Copy the asset's public URL and report the outcome as a notification.
pub fn copy_link(
    links: &AssetLinks,
    record: &AssetRecord,
    clipboard: &mut dyn ClipboardSink,
    notifications: &mut NotificationCenter,
) -> Result<Url, ShareError> {
    let result = links
        .asset_url(&record.filename)
        .and_then(|url| clipboard.set_text(url.as_str()).map(|()| url));
    match &result {
        Ok(_) => {
            notifications.success("Direct link copied to clipboard!");
        }
        Err(err) => {
            tracing::warn!(id = %record.id, error = %err, "Copy link failed");
            notifications.error("Failed to copy link.");
        }
    }
    result
}

/// Fetch an asset into memory.
pub fn fetch_asset(url: &Url) -> Result<Vec<u8>, ShareError> {
    let download_error = |message: String| ShareError::Download {
        url: url.to_string(),
        message,
    };
    let response = http_client::agent()
        .get(url.as_str())
        .call()
        .map_err(|err| download_error(err.to_string()))?;
    http_client::read_response_bytes(response, MAX_ASSET_BYTES)
        .map_err(|err| download_error(err.to_string()))
}

/// Join a catalog filename onto `dir`.
///
/// Catalog text may come from the remote repository, so anything other than a
/// single plain file name (separators, `..`, absolute paths) is rejected.
pub fn local_asset_path(dir: &Path, filename: &str) -> Result<PathBuf, ShareError> {
    let mut components = Path::new(filename).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) if name == filename => Ok(dir.join(name)),
        _ => Err(ShareError::UnsafeFilename(filename.to_string())),
    }
}

/// Stream an asset into `dir` under the record's filename.
///
/// A partially written file is removed on failure.
pub fn download_asset(url: &Url, dir: &Path, filename: &str) -> Result<PathBuf, ShareError> {
    let target = local_asset_path(dir, filename)?;
    let download_error = |message: String| ShareError::Download {
        url: url.to_string(),
        message,
    };
    let response = http_client::agent()
        .get(url.as_str())
        .call()
        .map_err(|err| download_error(err.to_string()))?;
    std::fs::create_dir_all(dir).map_err(|source| ShareError::Write {
        path: dir.to_path_buf(),
        source,
    })?;
    let file = File::create(&target).map_err(|source| ShareError::Write {
        path: target.clone(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    let copied = http_client::copy_response_to_writer(response, &mut writer, MAX_ASSET_BYTES)
        .and_then(|bytes| {
            use std::io::Write;
            writer.flush().map(|()| bytes)
        });
    match copied {
        Ok(bytes) => {
            tracing::info!(path = %target.display(), bytes, "Downloaded asset");
            Ok(target)
        }
        Err(err) => {
            drop(writer);
            let _ = std::fs::remove_file(&target);
            Err(download_error(err.to_string()))
        }
    }
}

/// Hand the URL to the system browser.
pub fn open_in_browser(url: &Url) -> Result<(), ShareError> {
    open::that(url.as_str()).map_err(|source| ShareError::Open {
        url: url.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AssetId, Category};
    use crate::http_client::test_server::serve;
    use crate::notify::NotificationKind;
    use std::time::Instant;
    use tempfile::tempdir;

    fn record(filename: &str) -> AssetRecord {
        AssetRecord {
            id: AssetId::new("1"),
            filename: filename.into(),
            title: "Click".into(),
            category: Category::UiEffects,
            description: String::new(),
            duration: None,
        }
    }

    fn links() -> AssetLinks {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "demo.mp3".to_string(),
            "https://cdn.example.com/files/demo.mp3".to_string(),
        );
        AssetLinks::new("https://vault.example.com", "/sounds/", overrides).unwrap()
    }

    struct RecordingClipboard {
        text: Option<String>,
        fail: bool,
    }

    impl ClipboardSink for RecordingClipboard {
        fn set_text(&mut self, text: &str) -> Result<(), ShareError> {
            if self.fail {
                return Err(ShareError::Clipboard("no display".into()));
            }
            self.text = Some(text.to_string());
            Ok(())
        }
    }

    #[test]
    fn derives_url_from_origin_and_base_path() {
        assert_eq!(
            links().asset_url("click.mp3").unwrap().as_str(),
            "https://vault.example.com/sounds/click.mp3"
        );
    }

    #[test]
    fn override_wins_over_derived_url() {
        assert_eq!(
            links().asset_url("demo.mp3").unwrap().as_str(),
            "https://cdn.example.com/files/demo.mp3"
        );
    }

    #[test]
    fn spaces_in_hand_written_filenames_are_encoded() {
        assert_eq!(
            links().asset_url("door slam.wav").unwrap().as_str(),
            "https://vault.example.com/sounds/door%20slam.wav"
        );
    }

    #[test]
    fn copy_link_notifies_success() {
        let mut clipboard = RecordingClipboard {
            text: None,
            fail: false,
        };
        let mut notifications = NotificationCenter::default();
        copy_link(&links(), &record("click.mp3"), &mut clipboard, &mut notifications).unwrap();
        assert_eq!(
            clipboard.text.as_deref(),
            Some("https://vault.example.com/sounds/click.mp3")
        );
        let active = notifications.active(Instant::now());
        assert_eq!(active[0].kind, NotificationKind::Success);
    }

    #[test]
    fn copy_failure_becomes_error_notification() {
        let mut clipboard = RecordingClipboard {
            text: None,
            fail: true,
        };
        let mut notifications = NotificationCenter::default();
        let err = copy_link(&links(), &record("click.mp3"), &mut clipboard, &mut notifications)
            .unwrap_err();
        assert!(matches!(err, ShareError::Clipboard(_)));
        let active = notifications.active(Instant::now());
        assert_eq!(active[0].text, "Failed to copy link.");
        assert_eq!(active[0].kind, NotificationKind::Error);
    }

    #[test]
    fn download_writes_file_under_record_name() {
        let body = "RIFFdata";
        let (base, _requests) = serve(vec![format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        )]);
        let url = Url::parse(&format!("{base}/sounds/click.wav")).unwrap();
        let dir = tempdir().unwrap();
        let path = download_asset(&url, dir.path(), "click.wav").unwrap();
        assert_eq!(path, dir.path().join("click.wav"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), body);
    }

    #[test]
    fn catalog_filenames_cannot_leave_the_target_dir() {
        let root = tempdir().unwrap();
        let dir = root.path().join("downloads");
        for filename in ["../escaped.mp3", "/tmp/escaped.mp3", "nested/escaped.mp3", "..", "", "./x.mp3"] {
            let err = local_asset_path(&dir, filename).unwrap_err();
            assert!(matches!(err, ShareError::UnsafeFilename(_)), "{filename}");
        }
        assert_eq!(local_asset_path(&dir, "click.mp3").unwrap(), dir.join("click.mp3"));
    }

    #[test]
    fn traversing_download_is_refused_before_any_request() {
        let root = tempdir().unwrap();
        let dir = root.path().join("downloads");
        let url = Url::parse("http://127.0.0.1:9/sounds/escaped.mp3").unwrap();
        let err = download_asset(&url, &dir, "../escaped.mp3").unwrap_err();
        assert!(matches!(err, ShareError::UnsafeFilename(_)));
        assert!(!root.path().join("escaped.mp3").exists());
        assert!(!dir.exists());
    }

    #[test]
    fn failed_download_leaves_no_file() {
        let (base, _requests) = serve(vec!["HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n".into()]);
        let url = Url::parse(&format!("{base}/sounds/missing.wav")).unwrap();
        let dir = tempdir().unwrap();
        let err = download_asset(&url, dir.path(), "missing.wav").unwrap_err();
        assert!(matches!(err, ShareError::Download { .. }));
        assert!(!dir.path().join("missing.wav").exists());
    }
}
