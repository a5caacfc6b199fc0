/**
 * Error Conversion
 *
 * Backend errors implement `IntoResponse` so handlers can return them
 * directly. The body is JSON:
 *
 * ```json
 * {
 *   "error": "No route for /api/nope",
 *   "status": 404
 * }
 * ```
 */

use crate::backend::error::types::BackendError;
use axum::{
    response::{IntoResponse, Response},
    Json,
};

impl IntoResponse for BackendError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("[Error] {}", self);
        } else {
            tracing::debug!("[Error] {}", self);
        }

        let body = serde_json::json!({
            "error": self.public_message(),
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}
