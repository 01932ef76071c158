//! Contact-form dispatch routes.

use axum::Json;
use axum::extract::State;

use crate::AppState;
use crate::error::Result;
use crate::mail::ContactMessage;
use crate::router::{Sent, Valid, reply};

/// Handler sending the submitter a confirmation copy.
pub async fn welcome(
    State(state): State<AppState>,
    Valid(body): Valid<ContactMessage>,
) -> Result<Json<Sent>> {
    let result = state.mailer.send_contact_welcome(&body).await;
    reply(result, "Contact confirmation email sent.")
}

/// Handler notifying staff of a new submission.
pub async fn admin(
    State(state): State<AppState>,
    Valid(body): Valid<ContactMessage>,
) -> Result<Json<Sent>> {
    let result = state.mailer.send_contact_admin_notice(&body).await;
    reply(result, "Contact notification email sent.")
}
