use std::borrow::Cow;

use serde::Serialize;

pub mod contact;

#[derive(Serialize)]
pub struct ApiError {
    pub ok: bool,
    pub error: Cow<'static, str>,
}

#[derive(Serialize)]
pub struct ApiMessage {
    pub ok: bool,
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct ApiStatus {
    pub ok: bool,
    pub status: &'static str,
}
