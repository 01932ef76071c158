//! Courier is a lightweight dispatch API for transactional email.

#[forbid(unsafe_code)]
#[deny(missing_docs, unused_mut)]
mod mail;
mod middleware;
mod ratelimit;
mod router;

pub mod config;
pub mod error;
pub mod telemetry;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::http::{HeaderName, Method};
use axum::routing::{get, post};
use axum::{Router, middleware as AxumMiddleware};
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    state: Option<&AppState>,
    app: Router,
    method: Method,
    path: &str,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use axum::http::header;
    use tower::util::ServiceExt;

    let api_key = match state {
        Some(state) => state.config.api_key.clone(),
        None => String::default(),
    };

    app.oneshot(
        Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .header(middleware::API_KEY_HEADER, api_key)
            .body(axum::body::Body::from(body))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub mailer: mail::Mailer,
    pub limiter: Arc<Mutex<ratelimit::RateLimiter>>,
    pub started: Instant,
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout.
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        // Remove the API secret from traces.
        .layer(SetSensitiveHeadersLayer::new([HeaderName::from_static(
            middleware::API_KEY_HEADER,
        )]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers(Any),
        );

    let api = Router::new()
        // `POST /contact/welcome` goes to `contact::welcome`.
        .route("/contact/welcome", post(router::contact::welcome))
        // `POST /contact/admin` goes to `contact::admin`.
        .route("/contact/admin", post(router::contact::admin))
        // `POST /newsletter/verification` goes to `newsletter::verification`.
        .route(
            "/newsletter/verification",
            post(router::newsletter::verification),
        )
        // `POST /newsletter/welcome` goes to `newsletter::welcome`.
        .route("/newsletter/welcome", post(router::newsletter::welcome))
        .route_layer(AxumMiddleware::from_fn_with_state(
            state.clone(),
            middleware::require_api_key,
        ))
        .route_layer(AxumMiddleware::from_fn_with_state(
            state.clone(),
            ratelimit::limit,
        ));

    Router::new()
        // `GET /health` goes to `status::health`.
        .route("/health", get(router::status::health))
        .route("/health/detailed", get(router::status::health_detailed))
        .nest("/api/v1", api)
        .fallback(router::not_found)
        .with_state(state)
        .layer(middleware)
}

/// Initialize the application state.
pub fn initialize_state(
    config: Arc<config::Configuration>,
) -> Result<AppState, Box<dyn std::error::Error>> {
    // build the one transport handle for the process lifetime.
    let transport = mail::Transport::from_config(&config)?;
    let mailer = mail::Mailer::new(transport, &config);

    let limiter = Arc::new(Mutex::new(ratelimit::RateLimiter::new(
        config.rate_limit_window_secs,
        config.rate_limit_max_requests,
    )));

    Ok(AppState {
        config,
        mailer,
        limiter,
        started: Instant::now(),
    })
}
