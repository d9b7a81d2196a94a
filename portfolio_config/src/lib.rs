use std::{
    net::IpAddr,
    path::{Path, PathBuf},
};

use anyhow::{ensure, Context};
use config::{File, FileFormat};
pub use duration::Duration;
use portfolio_models::{email_address::EmailAddress, Sensitive};
use serde::Deserialize;

mod duration;

pub const DEFAULT_CONFIG: &str = include_str!("../../config.toml");
pub const DEV_CONFIG_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../config.dev.toml");

/// Environment variable containing a `:` separated list of additional config
/// files.
pub const CONFIG_PATHS_VAR: &str = "PORTFOLIO_CONFIG";

/// Upper bound for the length of a rate limit window.
pub const MAX_RATE_LIMIT_WINDOW: std::time::Duration =
    std::time::Duration::from_secs(30 * 24 * 60 * 60);

/// Environment variables which override single config options.
pub const ENVIRONMENT_OVERRIDES: &[(&str, &str)] = &[
    ("HOST", "http.host"),
    ("PORT", "http.port"),
    ("ORIGIN", "http.origin"),
    ("STATIC_DIR", "http.static_dir"),
    ("SMTP_URL", "email.smtp_url"),
    ("GMAIL_USER", "email.username"),
    ("GMAIL_PASS", "email.password"),
    ("TO_EMAIL", "contact.recipient"),
];

/// Load the configuration from the default config, the files listed in
/// [`CONFIG_PATHS_VAR`] and the process environment.
pub fn load() -> anyhow::Result<Config> {
    let paths = std::env::var(CONFIG_PATHS_VAR)
        .ok()
        .into_iter()
        .flat_map(|paths| {
            paths
                .split(':')
                .filter(|path| !path.is_empty())
                .map(PathBuf::from)
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    load_from(&paths, |var| std::env::var(var).ok())
}

pub fn load_dev_config() -> anyhow::Result<Config> {
    load_from(&[Path::new(DEV_CONFIG_PATH)], |_| None)
}

pub fn load_from(
    paths: &[impl AsRef<Path>],
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Config> {
    let builder =
        config::Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

    let builder = paths.iter().try_fold(builder, |builder, path| {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        let source = File::from_str(&content, FileFormat::Toml);
        anyhow::Ok(builder.add_source(source))
    })?;

    // empty variables are treated as unset
    let builder = ENVIRONMENT_OVERRIDES
        .iter()
        .try_fold(builder, |builder, &(var, key)| {
            builder.set_override_option(key, env(var).filter(|value| !value.is_empty()))
        })?;

    let config = builder
        .build()?
        .try_deserialize::<Config>()
        .context("Failed to load config")?;

    config.validate()?;

    Ok(config)
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub http: HttpConfig,
    pub email: EmailConfig,
    pub contact: ContactConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub host: IpAddr,
    pub port: u16,
    pub origin: Option<String>,
    pub body_limit: usize,
    pub static_dir: Option<PathBuf>,
    pub real_ip: Option<RealIpConfig>,
}

#[derive(Debug, Deserialize)]
pub struct RealIpConfig {
    pub header: String,
    pub set_from: IpAddr,
}

#[derive(Debug, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub username: Option<EmailAddress>,
    pub password: Option<Sensitive<String>>,
    pub sender_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ContactConfig {
    pub recipient: Option<EmailAddress>,
    pub owner_name: String,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Deserialize)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
}

impl HttpConfig {
    /// The origin allowed to make cross-origin requests.
    pub fn origin(&self) -> String {
        self.origin
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.port))
    }
}

impl EmailConfig {
    /// The mail account used to send all emails.
    pub fn sender(&self) -> anyhow::Result<&EmailAddress> {
        self.username
            .as_ref()
            .context("No mail account configured, set GMAIL_USER or email.username")
    }
}

impl Config {
    fn validate(&self) -> anyhow::Result<()> {
        let window = *self.contact.rate_limit.window;
        ensure!(
            !window.is_zero(),
            "contact.rate_limit.window must not be zero"
        );
        ensure!(
            window <= MAX_RATE_LIMIT_WINDOW,
            "contact.rate_limit.window must not be longer than {} days",
            MAX_RATE_LIMIT_WINDOW.as_secs() / (24 * 60 * 60)
        );
        Ok(())
    }

    /// The address contact notifications are delivered to, defaults to the
    /// sending mail account.
    pub fn contact_recipient(&self) -> anyhow::Result<EmailAddress> {
        match &self.contact.recipient {
            Some(recipient) => Ok(recipient.clone()),
            None => self.email.sender().cloned(),
        }
    }
}
