//! Shared HTTP plumbing for backend client adapters.
//!
//! Transport errors and response bodies are condensed here so no raw
//! `reqwest` error ever crosses a client boundary.

use reqwest::Url;

use crate::domain::BackendRef;
use crate::domain::ports::ClientError;

const PREVIEW_CHAR_LIMIT: usize = 160;

/// Join an API path onto a configured base endpoint.
///
/// Plain string concatenation on purpose: `Url::join` drops the last path
/// segment of bases without a trailing slash, which configured endpoints
/// frequently lack.
pub(crate) fn api_url(base: &Url, path: &str) -> String {
    let base = base.as_str().trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

/// Map a transport-level failure into a [`ClientError`].
pub(crate) fn transport_error(
    operation: &'static str,
    backend: &BackendRef,
    error: &reqwest::Error,
) -> ClientError {
    let cause = if error.is_timeout() {
        format!("request timed out: {error}")
    } else {
        error.to_string()
    };
    ClientError::connection(operation, backend.clone(), cause)
}

/// Condense a response body into a short single-line preview for causes.
pub(crate) fn body_preview(body: &[u8]) -> String {
    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}
