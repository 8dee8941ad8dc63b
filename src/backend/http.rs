//! Shared HTTP client and status mapping.

use std::sync::OnceLock;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::error::DroverError;

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
///
/// The client-side ceiling is generous; the real per-attempt deadline
/// is enforced one layer up in the attempt loop.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .pool_max_idle_per_host(10)
            .build()
            .expect("Failed to build HTTP client")
    })
}

/// Build default headers for a Bearer-token API.
pub fn bearer_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
        headers.insert(AUTHORIZATION, val);
    }
    headers
}

/// Map a non-success HTTP status to a typed error.
pub fn status_to_error(status: u16, body: &str) -> DroverError {
    match status {
        401 | 403 => DroverError::Authentication(body.to_string()),
        404 => DroverError::ModelNotFound(body.to_string()),
        429 => DroverError::RateLimited {
            retry_after_ms: extract_retry_after(body),
        },
        _ => DroverError::api(status, body),
    }
}

fn extract_retry_after(body: &str) -> Option<u64> {
    // Try to parse retry-after from JSON error body
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("retry_after"))
                .and_then(|r| r.as_f64())
                .map(|s| (s * 1000.0) as u64)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    #[test]
    fn status_mapping() {
        assert!(matches!(
            status_to_error(401, "bad key"),
            DroverError::Authentication(_)
        ));
        assert!(matches!(
            status_to_error(404, "no such model"),
            DroverError::ModelNotFound(_)
        ));
        assert!(matches!(
            status_to_error(429, "{}"),
            DroverError::RateLimited { .. }
        ));
        assert_eq!(
            status_to_error(503, "busy").category(),
            ErrorCategory::Server
        );
    }

    #[test]
    fn retry_after_extracted_from_error_body() {
        let err = status_to_error(429, r#"{"error": {"retry_after": 2.5}}"#);
        assert_eq!(err.retry_after_hint(), Some(2500));
    }

    #[test]
    fn retry_after_absent_when_body_opaque() {
        let err = status_to_error(429, "slow down");
        assert_eq!(err.retry_after_hint(), None);
    }
}
