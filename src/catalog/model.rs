use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Opaque record identifier, unique within the catalog and never reused.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Derive an id from the given instant, in milliseconds since the Unix epoch.
    fn from_timestamp(at: SystemTime) -> Self {
        let millis = at
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        Self(millis.to_string())
    }

    /// Derive an id from the current time.
    pub fn generate() -> Self {
        Self::from_timestamp(SystemTime::now())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closed set of asset categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "UI Effects")]
    UiEffects,
    Ambience,
    Notifications,
    #[serde(rename = "Game FX")]
    GameFx,
    Miscellaneous,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::UiEffects,
        Category::Ambience,
        Category::Notifications,
        Category::GameFx,
        Category::Miscellaneous,
    ];

    /// Human-facing label.
    pub fn label(self) -> &'static str {
        match self {
            Self::UiEffects => "UI Effects",
            Self::Ambience => "Ambience",
            Self::Notifications => "Notifications",
            Self::GameFx => "Game FX",
            Self::Miscellaneous => "Miscellaneous",
        }
    }

    /// Enumerator key used in the catalog text (`SoundCategory.<KEY>`).
    pub fn catalog_key(self) -> &'static str {
        match self {
            Self::UiEffects => "UI",
            Self::Ambience => "AMBIENCE",
            Self::Notifications => "NOTIFICATION",
            Self::GameFx => "GAME",
            Self::Miscellaneous => "MISC",
        }
    }

    pub fn from_catalog_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.catalog_key() == key)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown category '{0}' (expected one of: UI Effects, Ambience, Notifications, Game FX, Miscellaneous)")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    /// Accepts either the label or the catalog key, case-insensitively.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim();
        Self::ALL
            .into_iter()
            .find(|category| {
                category.label().eq_ignore_ascii_case(wanted)
                    || category.catalog_key().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| UnknownCategory(value.to_string()))
    }
}

/// One catalog entry describing a playable audio file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub id: AssetId,
    /// Name of the blob stored under the remote asset directory.
    pub filename: String,
    pub title: String,
    pub category: Category,
    pub description: String,
    /// Playable length as `M:SS`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}
