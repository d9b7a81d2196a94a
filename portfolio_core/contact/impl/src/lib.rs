use std::sync::Arc;

use portfolio_core_contact_contracts::{ContactSendMessageError, ContactService};
use portfolio_email_contracts::{Email, EmailBody, EmailService};
use portfolio_models::{
    contact::{ContactMessage, ContactSubmission},
    email_address::EmailAddress,
};
use portfolio_templates_contracts::{
    ContactAutoReplyTemplate, ContactNotificationTemplate, TemplateService,
};
use tokio_util::task::TaskTracker;
use tracing::{debug, warn, Instrument};

#[derive(Debug, Clone)]
pub struct ContactFeatureServiceImpl<Email, Template> {
    email: Arc<Email>,
    template: Template,
    config: ContactFeatureConfig,
    background: TaskTracker,
}

#[derive(Debug, Clone)]
pub struct ContactFeatureConfig {
    /// Where contact notifications are delivered to.
    pub recipient: Arc<EmailAddress>,
    /// Display name used for contact notifications.
    pub sender_name: Arc<String>,
    /// Name of the site owner, used to sign auto replies.
    pub owner_name: Arc<String>,
}

impl<EmailS, TemplateS> ContactFeatureServiceImpl<EmailS, TemplateS> {
    /// Auto replies are spawned on `background`, which should be awaited
    /// before shutting down.
    pub fn new(
        email: EmailS,
        template: TemplateS,
        config: ContactFeatureConfig,
        background: TaskTracker,
    ) -> Self {
        Self {
            email: Arc::new(email),
            template,
            config,
            background,
        }
    }
}

impl<EmailS, TemplateS> ContactService for ContactFeatureServiceImpl<EmailS, TemplateS>
where
    EmailS: EmailService,
    TemplateS: TemplateService,
{
    #[tracing::instrument(skip_all)]
    async fn send_message(&self, submission: ContactSubmission) -> Result<(), ContactSendMessageError> {
        let message = ContactMessage::try_from(submission)?;

        let notification = self.notification_email(&message)?;
        if !self.email.send(notification).await? {
            return Err(ContactSendMessageError::Send);
        }

        match self.auto_reply_email(&message) {
            Ok(auto_reply) => self.send_auto_reply(auto_reply),
            Err(err) => warn!("Failed to render auto reply: {err}"),
        }

        Ok(())
    }
}

impl<EmailS, TemplateS> ContactFeatureServiceImpl<EmailS, TemplateS>
where
    EmailS: EmailService,
    TemplateS: TemplateService,
{
    fn notification_email(&self, message: &ContactMessage) -> anyhow::Result<Email> {
        let name = &*message.author.name;
        let email = &message.author.email;
        let content = &*message.content;

        let html = self.template.render(&ContactNotificationTemplate {
            name: name.clone(),
            email: email.as_str().into(),
            message: content.clone(),
        })?;

        Ok(Email {
            sender_name: Some((*self.config.sender_name).clone()),
            recipient: (*self.config.recipient).clone().into(),
            subject: format!("New message from {name}"),
            body: EmailBody::Alternative {
                text: format!("From: {name} <{email}>\n\n{content}"),
                html,
            },
            reply_to: Some(email.clone().with_name(name.clone())),
        })
    }

    fn auto_reply_email(&self, message: &ContactMessage) -> anyhow::Result<Email> {
        let name = &*message.author.name;
        let owner_name = &*self.config.owner_name;

        let html = self.template.render(&ContactAutoReplyTemplate {
            name: name.clone(),
            owner_name: owner_name.clone(),
        })?;

        Ok(Email {
            sender_name: Some(owner_name.clone()),
            recipient: message.author.email.clone().with_name(name.clone()),
            subject: "We received your message".into(),
            body: EmailBody::Alternative {
                text: format!(
                    "Hi {name},\n\nThanks for reaching out! This is to confirm we've received \
                     your message and will get back to you shortly.\n\n\u{2014} {owner_name}"
                ),
                html,
            },
            reply_to: Some((*self.config.recipient).clone().into()),
        })
    }

    /// Sends the auto reply in a detached task. Its outcome is only logged and
    /// never retried, so a failed auto reply is lost.
    fn send_auto_reply(&self, auto_reply: Email) {
        let email = Arc::clone(&self.email);
        self.background.spawn(
            async move {
                match email.send(auto_reply).await {
                    Ok(true) => debug!("Sent auto reply"),
                    Ok(false) => warn!("Smtp server rejected auto reply"),
                    Err(err) => warn!("Failed to send auto reply: {err}"),
                }
            }
            .in_current_span(),
        );
    }
}
