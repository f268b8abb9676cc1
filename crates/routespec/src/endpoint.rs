//! # Document endpoint
//!
//! Serves the published specification bytes with cache headers and
//! conditional request handling.

use crate::{error::AssemblyError, specification::SpecificationDocument};
use arc_swap::ArcSwapOption;
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Content type of the served document
pub const DOCUMENT_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Cache hint sent with the document
pub const DOCUMENT_CACHE_CONTROL: &str = "public, max-age=3600";

/// Immutable, pre-serialized document
#[derive(Debug)]
pub struct SpecSnapshot {
    document: SpecificationDocument,
    bytes: Bytes,
    etag: String,
}

impl SpecSnapshot {
    /// Serialize the document and compute its entity tag
    pub fn new(document: SpecificationDocument) -> Result<Self, AssemblyError> {
        let bytes = Bytes::from(serde_json::to_vec_pretty(&document)?);
        let etag = format!("\"{}\"", hex::encode(Sha256::digest(&bytes)));
        Ok(Self {
            document,
            bytes,
            etag,
        })
    }

    pub fn document(&self) -> &SpecificationDocument {
        &self.document
    }

    /// Pretty JSON, two-space indented
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Quoted SHA-256 hex digest of the bytes
    pub fn etag(&self) -> &str {
        &self.etag
    }
}

/// Shared slot holding the latest published snapshot
pub type SnapshotSlot = Arc<ArcSwapOption<SpecSnapshot>>;

/// Handler state serving whatever snapshot is currently published
#[derive(Clone, Debug, Default)]
pub struct SpecEndpoint {
    slot: SnapshotSlot,
}

impl SpecEndpoint {
    pub fn new(slot: SnapshotSlot) -> Self {
        Self { slot }
    }

    pub fn snapshot(&self) -> Option<Arc<SpecSnapshot>> {
        self.slot.load_full()
    }

    /// Build the response for a request carrying `if_none_match`
    pub fn respond(&self, if_none_match: Option<&str>) -> Response {
        let Some(snapshot) = self.slot.load_full() else {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Swagger documentation not available",
                    "message": "Documentation was not generated at startup",
                })),
            )
                .into_response();
        };

        let etag = HeaderValue::from_str(snapshot.etag())
            .unwrap_or_else(|_| HeaderValue::from_static("\"\""));
        let cache_control = HeaderValue::from_static(DOCUMENT_CACHE_CONTROL);

        if if_none_match.is_some_and(|value| etag_matches(value, snapshot.etag())) {
            return (
                StatusCode::NOT_MODIFIED,
                [(header::ETAG, etag), (header::CACHE_CONTROL, cache_control)],
            )
                .into_response();
        }

        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, HeaderValue::from_static(DOCUMENT_CONTENT_TYPE)),
                (header::CACHE_CONTROL, cache_control),
                (header::ETAG, etag),
            ],
            Body::from(snapshot.bytes().clone()),
        )
            .into_response()
    }
}

/// Axum handler for the document route
pub async fn serve_spec(State(endpoint): State<SpecEndpoint>, headers: HeaderMap) -> Response {
    let if_none_match = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok());
    endpoint.respond(if_none_match)
}

/// Weak comparison of a comma separated `If-None-Match` list against `etag`
fn etag_matches(header_value: &str, etag: &str) -> bool {
    if header_value.trim() == "*" {
        return true;
    }
    let current = opaque_tag(etag);
    header_value
        .split(',')
        .filter_map(|candidate| {
            let candidate = candidate.trim();
            let candidate = candidate.strip_prefix("W/").unwrap_or(candidate);
            (candidate.len() >= 2 && candidate.starts_with('"') && candidate.ends_with('"'))
                .then(|| opaque_tag(candidate))
        })
        .any(|candidate| candidate == current)
}

fn opaque_tag(quoted: &str) -> &str {
    quoted.trim_matches('"')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn published() -> SpecEndpoint {
        let slot: SnapshotSlot = Arc::default();
        let snapshot = SpecSnapshot::new(SpecificationDocument::new("Test API", "1.0.0")).unwrap();
        slot.store(Some(Arc::new(snapshot)));
        SpecEndpoint::new(slot)
    }

    #[test]
    fn test_snapshot_etag_is_quoted_sha256() {
        let snapshot = SpecSnapshot::new(SpecificationDocument::new("Test API", "1.0.0")).unwrap();
        let expected = hex::encode(Sha256::digest(snapshot.bytes()));
        assert_eq!(snapshot.etag(), format!("\"{}\"", expected));
        assert_eq!(snapshot.etag().len(), 66);
    }

    #[test]
    fn test_unpublished_returns_500() {
        let response = SpecEndpoint::default().respond(None);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_published_headers() {
        let endpoint = published();
        let response = endpoint.respond(None);
        assert_eq!(response.status(), StatusCode::OK);

        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], DOCUMENT_CONTENT_TYPE);
        assert_eq!(headers[header::CACHE_CONTROL], DOCUMENT_CACHE_CONTROL);
        assert_eq!(
            headers[header::ETAG].to_str().unwrap(),
            endpoint.snapshot().unwrap().etag()
        );
    }

    #[test]
    fn test_if_none_match() {
        let endpoint = published();
        let etag = endpoint.snapshot().unwrap().etag().to_string();

        assert_eq!(endpoint.respond(Some(&etag)).status(), StatusCode::NOT_MODIFIED);
        assert_eq!(
            endpoint.respond(Some(&format!("\"other\", W/{}", etag))).status(),
            StatusCode::NOT_MODIFIED
        );
        assert_eq!(endpoint.respond(Some("*")).status(), StatusCode::NOT_MODIFIED);
        assert_eq!(endpoint.respond(Some("\"stale\"")).status(), StatusCode::OK);
        assert_eq!(endpoint.respond(Some("garbage")).status(), StatusCode::OK);
    }
}
