//! Query and category filtering over the catalog.

use std::fmt;
use std::str::FromStr;

use crate::catalog::{AssetRecord, Category, UnknownCategory};

/// Category selector; `All` matches every record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn accepts(self, category: Category) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => wanted == category,
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::Only(category) => category.fmt(f),
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = UnknownCategory;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        value.parse().map(Self::Only)
    }
}

/// Search box text plus category selector.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterQuery {
    pub text: String,
    pub category: CategoryFilter,
}

impl FilterQuery {
    pub fn new(text: impl Into<String>, category: CategoryFilter) -> Self {
        Self {
            text: text.into(),
            category,
        }
    }
}

/// Return the records matching `query`, in catalog order.
pub fn filter_assets<'a>(catalog: &'a [AssetRecord], query: &FilterQuery) -> Vec<&'a AssetRecord> {
    let needle = query.text.to_lowercase();
    catalog
        .iter()
        .filter(|record| query.category.accepts(record.category))
        .filter(|record| needle.is_empty() || text_matches(record, &needle))
        .collect()
}

fn text_matches(record: &AssetRecord, needle: &str) -> bool {
    [&record.title, &record.description, &record.filename]
        .into_iter()
        .any(|field| field.to_lowercase().contains(needle))
}

/// What the listing shows: still loading, or a (possibly empty) result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CatalogView<'a> {
    Loading,
    Ready(Vec<&'a AssetRecord>),
}

impl<'a> CatalogView<'a> {
    /// Apply `query` when the catalog is available.
    pub fn compute(catalog: Option<&'a [AssetRecord]>, query: &FilterQuery) -> Self {
        match catalog {
            Some(records) => Self::Ready(filter_assets(records, query)),
            None => Self::Loading,
        }
    }

    /// True only for a loaded catalog with no matches.
    pub fn is_empty_result(&self) -> bool {
        matches!(self, Self::Ready(rows) if rows.is_empty())
    }
}
