//! Local analysis of a selected audio file before anything is uploaded.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rodio::{Decoder, Source};

use crate::catalog::{AssetId, AssetRecord};

use super::{CatalogLayout, UploadRequest, WorkflowError};

/// Everything stage 2 onwards needs, derived from the request.
#[derive(Clone, Debug)]
pub struct PreparedAsset {
    pub record: AssetRecord,
    pub asset_path: String,
    pub content_base64: String,
}

/// Validate the request and derive the record, remote path and encoded payload.
pub fn prepare(
    request: &UploadRequest,
    layout: &CatalogLayout,
    id: AssetId,
) -> Result<PreparedAsset, WorkflowError> {
    if request.title.trim().is_empty() {
        return Err(WorkflowError::InvalidRequest("Title is required".into()));
    }
    if request.bytes.is_empty() {
        return Err(WorkflowError::InvalidRequest(format!(
            "{} is empty",
            request.file_name
        )));
    }
    let filename = sanitize_filename(&request.file_name);
    if filename.is_empty() || filename == "." || filename == ".." {
        return Err(WorkflowError::InvalidRequest(format!(
            "Cannot derive a file name from '{}'",
            request.file_name
        )));
    }
    let duration = probe_duration(&request.bytes, extension_hint(&filename));
    let record = AssetRecord {
        id,
        filename: filename.clone(),
        title: request.title.clone(),
        category: request.category,
        description: request.description.clone(),
        duration: Some(format_duration(duration)),
    };
    Ok(PreparedAsset {
        asset_path: layout.asset_path(&filename),
        content_base64: STANDARD.encode(&request.bytes),
        record,
    })
}

/// Lowercase the base name and collapse each whitespace run into one hyphen.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let mut out = String::with_capacity(base.len());
    let mut in_whitespace = false;
    for ch in base.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                out.push('-');
            }
            in_whitespace = true;
        } else {
            out.extend(ch.to_lowercase());
            in_whitespace = false;
        }
    }
    out
}

/// Playable length as reported by a transient decoder.
///
/// When the container does not carry a total duration the samples are
/// counted instead. Undecodable input yields `None`.
pub fn probe_duration(bytes: &[u8], hint: Option<&str>) -> Option<Duration> {
    let owned: Arc<[u8]> = Arc::from(bytes);
    let byte_len = owned.len() as u64;
    let mut builder = Decoder::builder()
        .with_data(Cursor::new(owned))
        .with_byte_len(byte_len)
        .with_seekable(true);
    if let Some(hint) = hint {
        builder = builder.with_hint(hint);
    }
    let decoder = match builder.build() {
        Ok(decoder) => decoder,
        Err(err) => {
            tracing::debug!(error = %err, "Audio metadata unavailable");
            return None;
        }
    };
    if let Some(total) = decoder.total_duration() {
        return Some(total);
    }
    let samples_per_second = decoder.sample_rate() as f64 * decoder.channels().max(1) as f64;
    if samples_per_second <= 0.0 {
        return None;
    }
    let samples = decoder.count();
    Some(Duration::from_secs_f64(samples as f64 / samples_per_second))
}

/// `M:SS`, rounding down; unknown durations render as `0:00`.
pub fn format_duration(duration: Option<Duration>) -> String {
    let total = duration.map(|duration| duration.as_secs()).unwrap_or(0);
    format!("{}:{:02}", total / 60, total % 60)
}

fn extension_hint(filename: &str) -> Option<&str> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
}
