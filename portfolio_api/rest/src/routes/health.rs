use axum::{routing, Json, Router};

use crate::models::ApiStatus;

pub fn router() -> Router<()> {
    Router::new().route("/health", routing::get(health))
}

async fn health() -> Json<ApiStatus> {
    Json(ApiStatus {
        ok: true,
        status: "healthy",
    })
}
