use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

// ── Error codes ─────────────────────────────────────────────────────
//
// Stable, machine-readable identifiers. Clients match on these,
// never on the human-readable message string.

/// Stable error code constants.
///
/// Clients should match on `code` from `{"code": "NOT_FOUND", "message": "..."}`.
/// Codes never change; messages may be reworded.
pub mod error_code {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const ALREADY_EXISTS: &str = "ALREADY_EXISTS";
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const INVALID_TRANSITION: &str = "INVALID_TRANSITION";
    pub const SHORTFALL: &str = "SHORTFALL";
    pub const REFERENTIAL: &str = "REFERENTIAL";
    pub const INTERNAL: &str = "INTERNAL";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
}

// ── Shortfall detail ────────────────────────────────────────────────

/// One component that cannot be covered by on-hand stock.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortfallLine {
    pub product_id: String,
    pub required: f64,
    pub on_hand: f64,
    pub missing: f64,
}

fn shortfall_message(lines: &[ShortfallLine]) -> String {
    let parts: Vec<String> = lines
        .iter()
        .map(|l| format!("{} (required {}, on hand {})", l.product_id, l.required, l.on_hand))
        .collect();
    format!("insufficient stock: {}", parts.join(", "))
}

// ── ServiceError ────────────────────────────────────────────────────

/// Unified service error type used across all modules.
///
/// Each variant maps to a stable error code (see [`error_code`]) and an
/// HTTP status code. The JSON response always includes both:
///
/// ```json
/// {"code": "NOT_FOUND", "message": "manufacturing_orders/abc"}
/// ```
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Resource does not exist. HTTP 404.
    #[error("{0}")]
    NotFound(String),

    /// Duplicate key, or the resource is locked by another record. HTTP 409.
    #[error("{0}")]
    Conflict(String),

    /// Input data is invalid. HTTP 400.
    #[error("{0}")]
    Validation(String),

    /// Lifecycle guard violated; the record was not modified. HTTP 409.
    #[error("{0}")]
    InvalidTransition(String),

    /// Not enough stock to cover every component. HTTP 409.
    #[error("{}", shortfall_message(.0))]
    Shortfall(Vec<ShortfallLine>),

    /// A referenced record exists but does not belong where it was used. HTTP 422.
    #[error("{0}")]
    Referential(String),

    /// Storage backend failure. HTTP 500.
    #[error("{0}")]
    Storage(String),

    /// Unexpected internal error. HTTP 500.
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable, machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => error_code::NOT_FOUND,
            ServiceError::Conflict(_) => error_code::ALREADY_EXISTS,
            ServiceError::Validation(_) => error_code::VALIDATION_FAILED,
            ServiceError::InvalidTransition(_) => error_code::INVALID_TRANSITION,
            ServiceError::Shortfall(_) => error_code::SHORTFALL,
            ServiceError::Referential(_) => error_code::REFERENTIAL,
            ServiceError::Storage(_) => error_code::STORAGE_ERROR,
            ServiceError::Internal(_) => error_code::INTERNAL,
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::InvalidTransition(_) => StatusCode::CONFLICT,
            ServiceError::Shortfall(_) => StatusCode::CONFLICT,
            ServiceError::Referential(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut body = serde_json::json!({
            "code": self.error_code(),
            "message": self.to_string(),
        });
        if let ServiceError::Shortfall(lines) = &self {
            body["shortfalls"] = serde_json::json!(lines);
        }
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: &str, required: f64, on_hand: f64) -> ShortfallLine {
        ShortfallLine {
            product_id: id.into(),
            required,
            on_hand,
            missing: required - on_hand,
        }
    }

    #[test]
    fn status_code_mapping() {
        assert_eq!(ServiceError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ServiceError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(ServiceError::Validation("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ServiceError::InvalidTransition("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(ServiceError::Shortfall(vec![]).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ServiceError::Referential("x".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ServiceError::Storage("x".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ServiceError::Internal("x".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn error_code_mapping() {
        assert_eq!(ServiceError::NotFound("x".into()).error_code(), "NOT_FOUND");
        assert_eq!(ServiceError::Conflict("x".into()).error_code(), "ALREADY_EXISTS");
        assert_eq!(ServiceError::Validation("x".into()).error_code(), "VALIDATION_FAILED");
        assert_eq!(ServiceError::InvalidTransition("x".into()).error_code(), "INVALID_TRANSITION");
        assert_eq!(ServiceError::Shortfall(vec![]).error_code(), "SHORTFALL");
        assert_eq!(ServiceError::Referential("x".into()).error_code(), "REFERENTIAL");
        assert_eq!(ServiceError::Storage("x".into()).error_code(), "STORAGE_ERROR");
        assert_eq!(ServiceError::Internal("x".into()).error_code(), "INTERNAL");
    }

    #[tokio::test]
    async fn shortfall_response_lists_components() {
        let err = ServiceError::Shortfall(vec![line("steel", 5.0, 3.0)]);
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let bytes = axum::body::to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["code"], "SHORTFALL");
        assert_eq!(json["shortfalls"][0]["productId"], "steel");
        assert_eq!(json["shortfalls"][0]["missing"], 2.0);
    }

    #[test]
    fn shortfall_message_names_every_component() {
        let err = ServiceError::Shortfall(vec![line("steel", 5.0, 3.0), line("paint", 1.0, 0.0)]);
        let msg = err.to_string();
        assert!(msg.contains("steel"));
        assert!(msg.contains("paint"));
    }

    #[test]
    fn error_display_is_just_message() {
        assert_eq!(ServiceError::NotFound("work_orders/123".into()).to_string(), "work_orders/123");
        assert_eq!(ServiceError::Conflict("dup key".into()).to_string(), "dup key");
        assert_eq!(ServiceError::Validation("bad input".into()).to_string(), "bad input");
        assert_eq!(
            ServiceError::InvalidTransition("cannot confirm".into()).to_string(),
            "cannot confirm"
        );
    }
}
