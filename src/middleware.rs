//! Middlewares for routes.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::AppState;
use crate::error::{Result, ServerError};

/// Header carrying the shared API secret.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Middleware rejecting calls without the configured API key.
///
/// The header value must equal the configured secret exactly; the
/// compare is plain equality, not constant-time.
pub async fn require_api_key(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response> {
    let presented = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|header| header.to_str().ok());

    match presented {
        Some(key) if key == state.config.api_key => Ok(next.run(req).await),
        _ => Err(ServerError::Unauthorized),
    }
}
