//! Uniform success envelope.
//!
//! Every successful handler returns [`ApiOk`], which serializes to the same
//! outer shape the error path uses: `{success, data, message?, timestamp,
//! requestId?}`. Success and failure are distinct types rather than one
//! bag of optional fields, so a handler cannot produce a half-filled
//! envelope.

use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Successful API response carrying `data`.
#[derive(Debug, Clone)]
pub struct ApiOk<T> {
    data: T,
    message: Option<String>,
    request_id: Option<String>,
    no_store: bool,
}

impl<T: Serialize> ApiOk<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            message: None,
            request_id: None,
            no_store: false,
        }
    }

    /// Attach a human-readable note (e.g. "view recorded recently").
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach the request id for client-side correlation.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Mark the response as non-cacheable (mutating endpoints).
    pub fn no_store(mut self) -> Self {
        self.no_store = true;
        self
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SuccessEnvelope<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
}

impl<T: Serialize> IntoResponse for ApiOk<T> {
    fn into_response(self) -> Response {
        let body = SuccessEnvelope {
            success: true,
            data: self.data,
            message: self.message,
            timestamp: Utc::now(),
            request_id: self.request_id,
        };

        let mut response = Json(body).into_response();
        if self.no_store {
            let headers = response.headers_mut();
            headers.insert(
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-store, no-cache, must-revalidate"),
            );
            headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn envelope_shape() {
        let response = ApiOk::new(serde_json::json!({"views": 3}))
            .with_message("recorded")
            .with_request_id("req-1")
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn no_store_sets_cache_headers() {
        let response = ApiOk::new(serde_json::json!({})).no_store().into_response();
        let cache_control = response.headers()[header::CACHE_CONTROL].to_str().unwrap();
        assert!(cache_control.contains("no-store"));
    }

    #[test]
    fn serialized_fields_are_camel_case() {
        let envelope = SuccessEnvelope {
            success: true,
            data: 7,
            message: None,
            timestamp: Utc::now(),
            request_id: Some("abc".to_string()),
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"], 7);
        assert_eq!(json["requestId"], "abc");
        assert!(json.get("message").is_none());
    }
}
