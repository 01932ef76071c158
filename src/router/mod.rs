//! HTTP routes.

pub mod contact;
pub mod newsletter;
pub mod status;

use axum::Json;
use axum::extract::{FromRequest, Request};
use axum::http::Uri;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use validator::Validate;

use crate::error::{Result, ServerError};
use crate::mail::SendResult;

/// JSON extractor running field validation before the handler.
///
/// Malformed bodies and field violations are both rejected with 400;
/// every violated field is reported, not only the first.
pub struct Valid<T>(pub T);

impl<T, S> FromRequest<S> for Valid<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Valid(value))
    }
}

/// Body returned by every successful dispatch route.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sent {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_url: Option<String>,
    pub timestamp: String,
}

/// Map a dispatch outcome onto the HTTP response.
///
/// A failed send stays a 500 so existing callers keep their error
/// handling.
pub(crate) fn reply(result: SendResult, message: &str) -> Result<Json<Sent>> {
    if result.success {
        Ok(Json(Sent {
            success: true,
            message: message.to_owned(),
            message_id: result.message_id,
            verification_url: result.verification_url,
            timestamp: Utc::now().to_rfc3339(),
        }))
    } else {
        Err(ServerError::Send(result.error.unwrap_or_else(|| {
            "unknown transport failure".to_owned()
        })))
    }
}

/// Fallback for unmatched routes.
pub async fn not_found(uri: Uri) -> ServerError {
    ServerError::NotFound(uri.path().to_owned())
}

#[cfg(test)]
pub(crate) fn state_with(transport: crate::mail::Transport) -> crate::AppState {
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    let config = Arc::new(crate::config::tests::base());
    let mailer = crate::mail::Mailer::new(transport, &config);
    let limiter = Arc::new(Mutex::new(crate::ratelimit::RateLimiter::new(
        config.rate_limit_window_secs,
        config.rate_limit_max_requests,
    )));

    crate::AppState {
        config,
        mailer,
        limiter,
        started: Instant::now(),
    }
}

/// Test state backed by an accepting transport double.
#[cfg(test)]
pub(crate) fn state() -> crate::AppState {
    state_with(crate::mail::Transport::stub_ok())
}

#[cfg(test)]
mod tests {
    use crate::*;
    use axum::body::Body;
    use axum::extract::Request;
    use axum::http::{Method, StatusCode, header};
    use http_body_util::BodyExt;
    use tower::util::ServiceExt;

    #[tokio::test]
    async fn unknown_route_is_a_404_naming_the_path() {
        let state = router::state();
        let app = app(state.clone());

        let response = make_request(
            Some(&state),
            app,
            Method::GET,
            "/api/v1/does-not-exist",
            String::new(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Not Found");
        assert!(
            body["message"]
                .as_str()
                .unwrap()
                .contains("/api/v1/does-not-exist")
        );
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn missing_api_key_is_unauthorized() {
        let state = router::state();
        let app = app(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/v1/newsletter/welcome")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"email":"a@b.com"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn wrong_api_key_is_unauthorized() {
        let state = router::state();
        let app = app(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/v1/newsletter/welcome")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(middleware::API_KEY_HEADER, "not-the-secret")
                    .body(Body::from(r#"{"email":"a@b.com"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_json_is_a_400() {
        let state = router::state();
        let app = app(state.clone());

        let response = make_request(
            Some(&state),
            app,
            Method::POST,
            "/api/v1/newsletter/welcome",
            "{not json".to_owned(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn budget_exhaustion_is_a_429() {
        let mut config = config::tests::base();
        config.rate_limit_max_requests = 1;
        let state = router::state();
        let state = AppState {
            limiter: std::sync::Arc::new(std::sync::Mutex::new(
                ratelimit::RateLimiter::new(60, 1),
            )),
            config: std::sync::Arc::new(config),
            ..state
        };
        let app = app(state.clone());

        let first = make_request(
            Some(&state),
            app.clone(),
            Method::POST,
            "/api/v1/newsletter/welcome",
            r#"{"email":"a@b.com"}"#.to_owned(),
        )
        .await;
        assert_eq!(first.status(), StatusCode::OK);

        let second = make_request(
            Some(&state),
            app,
            Method::POST,
            "/api/v1/newsletter/welcome",
            r#"{"email":"a@b.com"}"#.to_owned(),
        )
        .await;
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
