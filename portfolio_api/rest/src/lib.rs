use std::{
    future::Future,
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    Router,
};
use portfolio_core_contact_contracts::ContactService;
use portfolio_shared_contracts::rate_limit::RateLimitService;
use portfolio_utils::Apply;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
};
use tracing::info;

mod extractors;
mod middlewares;
mod models;
mod routes;

#[derive(Debug, Clone)]
pub struct RestServer<Contact, RateLimit> {
    contact: Contact,
    rate_limit: RateLimit,
    config: RestServerConfig,
}

#[derive(Debug, Clone)]
pub struct RestServerConfig {
    pub addr: SocketAddr,
    pub real_ip_config: Option<Arc<RestServerRealIpConfig>>,
    /// The only origin allowed to make cross origin requests.
    pub allowed_origin: String,
    /// Maximum size of a request body in bytes.
    pub body_limit: usize,
    /// Directory containing the frontend. Requests that match neither an api
    /// route nor a file in this directory are answered with its `index.html`.
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug)]
pub struct RestServerRealIpConfig {
    pub header: String,
    pub set_from: IpAddr,
}

type RealIpConfig = RestServerRealIpConfig;

impl<Contact, RateLimit> RestServer<Contact, RateLimit>
where
    Contact: ContactService,
    RateLimit: RateLimitService,
{
    pub fn new(contact: Contact, rate_limit: RateLimit, config: RestServerConfig) -> Self {
        Self {
            contact,
            rate_limit,
            config,
        }
    }

    /// Serve until `shutdown` resolves, then wait for in-flight requests to
    /// finish.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let addr = self.config.addr;
        let router = self.router()?;

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind to {addr}"))?;
        info!("Listening on http://{}", listener.local_addr()?);

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(Into::into)
    }

    /// Build the complete router including all middlewares.
    pub fn router(self) -> anyhow::Result<Router<()>> {
        let RestServerConfig {
            real_ip_config,
            allowed_origin,
            body_limit,
            static_dir,
            ..
        } = self.config;

        let allowed_origin = HeaderValue::from_str(&allowed_origin)
            .with_context(|| format!("Invalid allowed origin {allowed_origin:?}"))?;
        let cors = CorsLayer::new()
            .allow_origin(allowed_origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([CONTENT_TYPE]);

        let api = Router::new()
            .merge(routes::health::router())
            .merge(routes::contact::router(
                self.contact.into(),
                self.rate_limit.into(),
            ));

        let router = Router::new()
            .nest("/api", api)
            .apply_map(static_dir, |router, static_dir| {
                let index = ServeFile::new(static_dir.join("index.html"));
                router.fallback_service(ServeDir::new(static_dir).fallback(index))
            })
            .layer(DefaultBodyLimit::max(body_limit))
            .layer(cors)
            .pipe(middlewares::security_headers::add)
            .pipe(middlewares::trace::add)
            .pipe(middlewares::request_id::add)
            .pipe(middlewares::client_ip::add(real_ip_config))
            .pipe(middlewares::panic_handler::add);

        Ok(router)
    }
}
