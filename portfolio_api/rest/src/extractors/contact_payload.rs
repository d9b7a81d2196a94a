use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::Response,
    Form, Json,
};
use portfolio_models::contact::ContactSubmission;
use serde_json::Value;

use crate::{models::contact::ApiContactSubmission, routes::error};

/// A contact form submission sent either as json or as an url encoded form.
///
/// Bodies of any other content type are not read and result in an empty
/// submission. Only json objects carry fields: an array is an empty
/// submission and any other json value is rejected.
pub struct ContactPayload(pub ContactSubmission);

#[async_trait]
impl<S: Send + Sync> FromRequest<S> for ContactPayload {
    type Rejection = Response;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let submission = match PayloadKind::from_headers(request.headers()) {
            Some(PayloadKind::Json) => {
                let body = Bytes::from_request(request, state)
                    .await
                    .map_err(|err| rejection(err.status()))?;
                if body.is_empty() {
                    ApiContactSubmission::default()
                } else {
                    from_json(&body)?
                }
            }
            Some(PayloadKind::Form) => {
                Form::<ApiContactSubmission>::from_request(request, state)
                    .await
                    .map_err(|err| rejection(err.status()))?
                    .0
            }
            None => ApiContactSubmission::default(),
        };

        Ok(Self(submission.into()))
    }
}

fn from_json(body: &[u8]) -> Result<ApiContactSubmission, Response> {
    let Json(value) = Json::<Value>::from_bytes(body).map_err(|err| rejection(err.status()))?;
    match value {
        value @ Value::Object(_) => {
            serde_json::from_value(value).map_err(|_| rejection(StatusCode::BAD_REQUEST))
        }
        Value::Array(_) => Ok(ApiContactSubmission::default()),
        _ => Err(rejection(StatusCode::BAD_REQUEST)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PayloadKind {
    Json,
    Form,
}

impl PayloadKind {
    fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
        let essence = content_type.split(';').next()?.trim();

        if essence.eq_ignore_ascii_case("application/json") {
            Some(Self::Json)
        } else if essence.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
            Some(Self::Form)
        } else {
            None
        }
    }
}

fn rejection(status: StatusCode) -> Response {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        error(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large.")
    } else {
        error(StatusCode::BAD_REQUEST, "Invalid request body.")
    }
}
