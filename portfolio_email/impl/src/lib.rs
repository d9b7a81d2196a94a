use anyhow::anyhow;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use portfolio_email_contracts::{Email, EmailBody, EmailService};
use portfolio_models::email_address::EmailAddress;
use portfolio_utils::Apply;

#[derive(Debug, Clone)]
pub struct EmailServiceImpl {
    from: EmailAddress,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailServiceImpl {
    /// Create a pooled smtp transport. No connection is established until the
    /// first email is sent (or [`EmailService::ping`] is called).
    ///
    /// Must be called from within a tokio runtime, as the connection pool
    /// spawns a background task.
    pub fn new(
        url: &str,
        credentials: Option<(String, String)>,
        from: EmailAddress,
    ) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::from_url(url)?
            .apply_map(credentials, |builder, (username, password)| {
                builder.credentials(Credentials::new(username, password))
            })
            .build();

        Ok(Self { from, transport })
    }

    #[cfg(feature = "dummy")]
    pub fn dummy() -> Self {
        Self::new("smtp://dummy", None, "dummy@example.com".parse().unwrap()).unwrap()
    }

    fn build_message(&self, email: Email) -> anyhow::Result<Message> {
        let builder = Message::builder()
            .from(Mailbox::new(email.sender_name, self.from.0.clone()))
            .to(email.recipient.0)
            .apply_map(email.reply_to, |builder, reply_to| {
                builder.reply_to(reply_to.0)
            })
            .subject(email.subject);

        let message = match email.body {
            EmailBody::Text(body) => builder.header(ContentType::TEXT_PLAIN).body(body)?,
            EmailBody::Html(body) => builder.header(ContentType::TEXT_HTML).body(body)?,
            EmailBody::Alternative { text, html } => {
                builder.multipart(MultiPart::alternative_plain_html(text, html))?
            }
        };

        Ok(message)
    }
}

impl EmailService for EmailServiceImpl {
    #[tracing::instrument(skip_all, fields(recipient = %email.recipient, subject = %email.subject))]
    async fn send(&self, email: Email) -> anyhow::Result<bool> {
        let message = self.build_message(email)?;

        self.transport
            .send(message)
            .await
            .map(|response| response.is_positive())
            .map_err(Into::into)
    }

    async fn ping(&self) -> anyhow::Result<()> {
        self.transport
            .test_connection()
            .await?
            .then_some(())
            .ok_or_else(|| anyhow!("Failed to ping smtp server"))
    }
}
