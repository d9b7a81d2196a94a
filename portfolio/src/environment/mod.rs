use std::{net::SocketAddr, sync::Arc};

use portfolio_api_rest::{RestServerConfig, RestServerRealIpConfig};
use portfolio_config::Config;
use portfolio_core_contact_impl::ContactFeatureConfig;
use portfolio_shared_impl::rate_limit::RateLimitServiceConfig;
use tokio_util::task::TaskTracker;
use types::{ContactFeature, Email, RateLimit, RestServer, Template, Time};

pub mod types;

/// Wires the services of the http server together.
pub struct Provider {
    email: Email,
    background: TaskTracker,
    config: ConfigProvider,
}

impl Provider {
    /// Auto replies are spawned on `background`.
    pub fn new(config: ConfigProvider, email: Email, background: TaskTracker) -> Self {
        Self {
            email,
            background,
            config,
        }
    }

    pub fn provide(self) -> anyhow::Result<RestServer> {
        let template = Template::new()?;

        let contact = ContactFeature::new(
            self.email,
            template,
            self.config.contact_feature_config,
            self.background,
        );
        let rate_limit = RateLimit::new(Time::default(), self.config.rate_limit_service_config);

        Ok(RestServer::new(
            contact,
            rate_limit,
            self.config.rest_server_config,
        ))
    }
}

/// Service configurations derived from the [`Config`].
#[derive(Debug, Clone)]
pub struct ConfigProvider {
    // API
    rest_server_config: RestServerConfig,

    // Shared
    rate_limit_service_config: RateLimitServiceConfig,

    // Core
    contact_feature_config: ContactFeatureConfig,
}

impl ConfigProvider {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        // API
        let rest_server_config = RestServerConfig {
            addr: SocketAddr::new(config.http.host, config.http.port),
            real_ip_config: config.http.real_ip.as_ref().map(|real_ip_config| {
                Arc::new(RestServerRealIpConfig {
                    header: real_ip_config.header.clone(),
                    set_from: real_ip_config.set_from,
                })
            }),
            allowed_origin: config.http.origin(),
            body_limit: config.http.body_limit,
            static_dir: config.http.static_dir.clone(),
        };

        // Shared
        let rate_limit_service_config = RateLimitServiceConfig {
            window: config.contact.rate_limit.window.0,
            max_requests: config.contact.rate_limit.max_requests,
        };

        // Core
        let contact_feature_config = ContactFeatureConfig {
            recipient: config.contact_recipient()?.into(),
            sender_name: config.email.sender_name.clone().into(),
            owner_name: config.contact.owner_name.clone().into(),
        };

        Ok(Self {
            rest_server_config,
            rate_limit_service_config,
            contact_feature_config,
        })
    }
}
