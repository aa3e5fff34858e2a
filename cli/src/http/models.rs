//! Response shapes for the HTTP API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub const SERVICE_NAME: &str = "procrelay";

/// GET /health
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    /// Installed-skill count as reported by the engine, `-1` when the probe
    /// fails. Health stays 200 either way.
    pub skills_installed: i64,
}

/// GET /api/skills
#[derive(Debug, Serialize)]
pub struct SkillsResponse {
    pub status: bool,
    pub skills: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: bool,
    pub error: String,
}

/// POST /api/query/sync, success body.
#[derive(Debug, Serialize)]
pub struct SyncSuccessResponse {
    pub status: bool,
    pub text: String,
    pub user_id: String,
    pub elapsed_ms: u64,
}

/// POST /api/query/sync, failure and timeout bodies.
#[derive(Debug, Serialize)]
pub struct SyncFailureResponse {
    pub status: bool,
    pub error: String,
    pub user_id: String,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returncode: Option<i64>,
    /// Partial stdout, present only when the engine died without emitting
    /// any structured events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
}

/// Handler-level failures that map straight to an HTTP status.
#[derive(Debug)]
pub enum ApiError {
    /// Request rejected before any process was spawned.
    InvalidRequest(String),
    /// The engine could not be started or its pipes could not be read.
    Engine(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::InvalidRequest(m) | ApiError::Engine(m) => m,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            status: false,
            error: self.message().to_string(),
        });
        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_request_maps_to_400() {
        let resp = ApiError::InvalidRequest("prompt is required".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn engine_error_maps_to_500() {
        let resp = ApiError::Engine("spawn failed".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn sync_failure_omits_absent_fields() {
        let body = SyncFailureResponse {
            status: false,
            error: "Exit code 1".into(),
            user_id: "api-anonymous".into(),
            elapsed_ms: 12,
            returncode: None,
            stdout: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("returncode").is_none());
        assert!(json.get("stdout").is_none());
    }
}
