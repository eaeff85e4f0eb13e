use crate::catalog::{AssetRecord, CatalogError, encode_record};

/// Splice `fragment` directly after the first occurrence of `marker`.
///
/// Every byte outside the inserted fragment is preserved.
pub fn inject_after_marker(text: &str, marker: &str, fragment: &str) -> Result<String, CatalogError> {
    let at = text
        .find(marker)
        .map(|index| index + marker.len())
        .ok_or_else(|| CatalogError::MissingMarker {
            marker: marker.to_string(),
        })?;
    let mut out = String::with_capacity(text.len() + fragment.len());
    out.push_str(&text[..at]);
    out.push_str(fragment);
    out.push_str(&text[at..]);
    Ok(out)
}

/// Encode `record` and inject it after `marker`.
pub fn inject_record(text: &str, marker: &str, record: &AssetRecord) -> Result<String, CatalogError> {
    inject_after_marker(text, marker, &encode_record(record))
}
