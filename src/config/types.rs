use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::DEFAULT_MARKER;
use crate::remote::github::DEFAULT_API_BASE;
use crate::workflow::CatalogLayout;

pub(super) const MIN_NOTIFICATION_TTL_MS: u64 = 500;
pub(super) const MAX_NOTIFICATION_TTL_MS: u64 = 60_000;

/// Settings stored in `settings.toml`.
///
/// Config tables: `site`, `library`, `repository`, `admin`, `notifications`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub site: SiteSettings,
    #[serde(default)]
    pub library: LibrarySettings,
    #[serde(default)]
    pub repository: RepositorySettings,
    #[serde(default)]
    pub admin: AdminSettings,
    #[serde(default)]
    pub notifications: NotificationSettings,
}

impl AppSettings {
    pub fn normalized(mut self) -> Self {
        self.notifications.ttl_ms = self
            .notifications
            .ttl_ms
            .clamp(MIN_NOTIFICATION_TTL_MS, MAX_NOTIFICATION_TTL_MS);
        if !self.site.sound_base_path.starts_with('/') {
            self.site.sound_base_path.insert(0, '/');
        }
        if !self.site.sound_base_path.ends_with('/') {
            self.site.sound_base_path.push('/');
        }
        self
    }
}

/// Where published assets are served from.
///
/// Config keys: `base_url`, `sound_base_path`, `url_overrides`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSettings {
    #[serde(default = "default_site_base_url")]
    pub base_url: String,
    #[serde(default = "default_sound_base_path")]
    pub sound_base_path: String,
    /// Filename to absolute URL, used instead of the derived address.
    #[serde(default)]
    pub url_overrides: BTreeMap<String, String>,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            base_url: default_site_base_url(),
            sound_base_path: default_sound_base_path(),
            url_overrides: BTreeMap::new(),
        }
    }
}

/// Local checkout of the site, when one is available.
///
/// Config keys: `sounds_dir`, `catalog_path`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrarySettings {
    #[serde(default)]
    pub sounds_dir: Option<PathBuf>,
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
}

/// Config keys: `api_base_url`, `asset_dir`, `catalog_path`, `marker`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySettings {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_asset_dir")]
    pub asset_dir: String,
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,
    #[serde(default = "default_marker")]
    pub marker: String,
}

impl Default for RepositorySettings {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            asset_dir: default_asset_dir(),
            catalog_path: default_catalog_path(),
            marker: default_marker(),
        }
    }
}

impl RepositorySettings {
    pub fn layout(&self) -> CatalogLayout {
        CatalogLayout {
            asset_dir: self.asset_dir.clone(),
            catalog_path: self.catalog_path.clone(),
            marker: self.marker.clone(),
        }
    }
}

/// Config keys: `password`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSettings {
    /// Shared gate in front of the admin flow. Not an authentication boundary.
    #[serde(default = "default_admin_password")]
    pub password: String,
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            password: default_admin_password(),
        }
    }
}

impl std::fmt::Debug for AdminSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSettings")
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Config keys: `ttl_ms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(default = "default_notification_ttl_ms")]
    pub ttl_ms: u64,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            ttl_ms: default_notification_ttl_ms(),
        }
    }
}

impl NotificationSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

fn default_site_base_url() -> String {
    "http://localhost:3000".into()
}

fn default_sound_base_path() -> String {
    "/sounds/".into()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE.into()
}

fn default_asset_dir() -> String {
    "public/sounds".into()
}

fn default_catalog_path() -> String {
    "constants.ts".into()
}

fn default_marker() -> String {
    DEFAULT_MARKER.into()
}

fn default_admin_password() -> String {
    "sounds".into()
}

fn default_notification_ttl_ms() -> u64 {
    3_000
}
