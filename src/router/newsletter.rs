//! Newsletter dispatch routes.

use axum::Json;
use axum::extract::State;

use crate::AppState;
use crate::error::Result;
use crate::mail::{NewsletterSignup, NewsletterSubscriber};
use crate::router::{Sent, Valid, reply};

/// Handler sending the double-opt-in verification email.
pub async fn verification(
    State(state): State<AppState>,
    Valid(body): Valid<NewsletterSignup>,
) -> Result<Json<Sent>> {
    let result = state.mailer.send_newsletter_verification(&body).await;
    reply(result, "Verification email sent.")
}

/// Handler sending the post-verification welcome email.
pub async fn welcome(
    State(state): State<AppState>,
    Valid(body): Valid<NewsletterSubscriber>,
) -> Result<Json<Sent>> {
    let result = state.mailer.send_newsletter_welcome(&body).await;
    reply(result, "Welcome email sent.")
}

#[cfg(test)]
mod tests {
    use crate::*;
    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::json;

    async fn post(path: &str, body: String) -> (StatusCode, serde_json::Value) {
        let state = router::state();
        let app = app(state.clone());

        let response =
            make_request(Some(&state), app, Method::POST, path, body).await;
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn signup(token: &str, source: &str) -> String {
        json!({
            "email": "a@b.com",
            "verificationToken": token,
            "source": source,
        })
        .to_string()
    }

    #[tokio::test]
    async fn verification_returns_the_exact_url() {
        let token = "x".repeat(32);
        let (status, body) = post(
            "/api/v1/newsletter/verification",
            signup(&token, "homepage"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let url = body["verificationUrl"].as_str().unwrap();
        assert_eq!(
            url,
            format!("https://example.com/verify-email?token={token}")
        );
        assert!(url.ends_with(&format!("?token={token}")));
    }

    #[tokio::test]
    async fn token_must_be_at_least_32_characters() {
        let (status, body) = post(
            "/api/v1/newsletter/verification",
            signup(&"t".repeat(31), "homepage"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["field"], "verification_token");

        let (status, _) = post(
            "/api/v1/newsletter/verification",
            signup(&"t".repeat(32), "homepage"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn source_boundaries_are_enforced() {
        let (status, body) = post(
            "/api/v1/newsletter/verification",
            signup(&"t".repeat(32), ""),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["field"], "source");

        let (status, _) = post(
            "/api/v1/newsletter/verification",
            signup(&"t".repeat(32), &"s".repeat(50)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = post(
            "/api/v1/newsletter/verification",
            signup(&"t".repeat(32), &"s".repeat(51)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn source_url_must_parse() {
        let (status, body) = post(
            "/api/v1/newsletter/verification",
            json!({
                "email": "a@b.com",
                "verificationToken": "t".repeat(32),
                "source": "homepage",
                "sourceUrl": "not a url",
            })
            .to_string(),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["field"], "source_url");
    }

    #[tokio::test]
    async fn welcome_accepts_a_bare_subscriber() {
        let (status, body) = post(
            "/api/v1/newsletter/welcome",
            json!({"email": "a@b.com"}).to_string(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert!(body["messageId"].is_string());
        assert!(body.get("verificationUrl").is_none());
    }

    #[tokio::test]
    async fn welcome_rejects_a_malformed_email() {
        let (status, body) = post(
            "/api/v1/newsletter/welcome",
            json!({"email": "not-an-email"}).to_string(),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["field"], "email");
    }
}
