use std::{sync::Arc, time::Duration};

use axum::{
    extract::{Request, State},
    http::{header::RETRY_AFTER, HeaderName, StatusCode},
    middleware::{from_fn_with_state, Next},
    response::{IntoResponse, Response},
    Extension, Router,
};
use portfolio_shared_contracts::rate_limit::{RateLimitService, RateLimitStatus};
use tracing::info;

use super::client_ip::ClientIp;
use crate::routes::error;

const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Limit the routes of `router` by client address. Only applies to routes
/// which exist, so unmatched requests are never counted.
pub fn add<S: Clone + Send + Sync + 'static, R: RateLimitService>(
    service: Arc<R>,
) -> impl FnOnce(Router<S>) -> Router<S> {
    |router| router.route_layer(from_fn_with_state(service, middleware::<R>))
}

async fn middleware<R: RateLimitService>(
    State(service): State<Arc<R>>,
    Extension(ClientIp(client_ip)): Extension<ClientIp>,
    request: Request,
    next: Next,
) -> Response {
    match service.hit(client_ip).await {
        RateLimitStatus::Allowed {
            limit,
            remaining,
            reset_in,
        } => (
            rate_limit_headers(limit, remaining, reset_in),
            next.run(request).await,
        )
            .into_response(),
        RateLimitStatus::Exceeded { limit, retry_after } => {
            info!(%client_ip, ?retry_after, "rate limit exceeded");
            (
                rate_limit_headers(limit, 0, retry_after),
                [(RETRY_AFTER, whole_seconds(retry_after).to_string())],
                error(
                    StatusCode::TOO_MANY_REQUESTS,
                    "Too many requests, please try again later.",
                ),
            )
                .into_response()
        }
    }
}

/// `X-RateLimit-Reset` is the number of seconds until the window ends.
fn rate_limit_headers(
    limit: u32,
    remaining: u32,
    reset_in: Duration,
) -> [(HeaderName, String); 3] {
    [
        (RATE_LIMIT_LIMIT, limit.to_string()),
        (RATE_LIMIT_REMAINING, remaining.to_string()),
        (RATE_LIMIT_RESET, whole_seconds(reset_in).to_string()),
    ]
}

fn whole_seconds(duration: Duration) -> u64 {
    let seconds = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
    seconds.max(1)
}
