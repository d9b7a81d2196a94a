use anyhow::Context;
use portfolio_config::EmailConfig;
use portfolio_email_impl::EmailServiceImpl;

/// Set up the smtp transport for the configured mail account. The connection
/// itself is only established when the first email is sent.
pub fn connect(config: &EmailConfig) -> anyhow::Result<EmailServiceImpl> {
    let credentials = config
        .username
        .as_ref()
        .zip(config.password.as_ref())
        .map(|(username, password)| (username.as_str().to_owned(), (**password).clone()));

    EmailServiceImpl::new(&config.smtp_url, credentials, config.sender()?.clone())
        .context("Failed to connect to SMTP server")
}
