use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing, Json, Router,
};
use portfolio_core_contact_contracts::{ContactSendMessageError, ContactService};
use portfolio_shared_contracts::rate_limit::RateLimitService;
use portfolio_utils::Apply;

use super::error;
use crate::{extractors::contact_payload::ContactPayload, middlewares, models::ApiMessage};

const SEND_FAILED: &str = "Failed to send message. Please try again later.";

pub fn router(
    service: Arc<impl ContactService>,
    rate_limit: Arc<impl RateLimitService>,
) -> Router<()> {
    Router::new()
        .route("/contact", routing::post(send_message))
        .with_state(service)
        .pipe(middlewares::rate_limit::add(rate_limit))
}

async fn send_message(
    service: State<Arc<impl ContactService>>,
    ContactPayload(submission): ContactPayload,
) -> Response {
    match service.send_message(submission).await {
        Ok(()) => Json(ApiMessage {
            ok: true,
            message: "Your message has been sent successfully.",
        })
        .into_response(),
        Err(ContactSendMessageError::Invalid(err)) => {
            error(StatusCode::BAD_REQUEST, err.to_string())
        }
        Err(ContactSendMessageError::Send) => {
            tracing::error!("Smtp server rejected contact message");
            error(StatusCode::INTERNAL_SERVER_ERROR, SEND_FAILED)
        }
        Err(ContactSendMessageError::Other(err)) => {
            tracing::error!("Failed to send contact message: {err:#}");
            error(StatusCode::INTERNAL_SERVER_ERROR, SEND_FAILED)
        }
    }
}
