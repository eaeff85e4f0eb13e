//! Asset records, their text encoding, and the in-memory catalog store.

mod codec;
mod model;
mod store;

pub use codec::{encode_record, escape_literal, parse_catalog, unescape_literal};
pub use model::{AssetId, AssetRecord, Category, UnknownCategory};
pub use store::CatalogStore;

/// Literal that opens the record array in the catalog text.
pub const DEFAULT_MARKER: &str = "export const SOUND_LIBRARY: Sound[] = [";

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Catalog marker not found: {marker}")]
    MissingMarker { marker: String },
    #[error("Failed to read catalog {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to fetch remote catalog: {0}")]
    Remote(#[from] crate::remote::RemoteError),
}
