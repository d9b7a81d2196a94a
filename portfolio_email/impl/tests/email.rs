//! Delivery tests against a local smtp4dev instance.
//!
//! Start smtp4dev with its smtp server on port 2525 and run with
//! `SMTP4DEV_URL=http://localhost:5000/ cargo test -- --ignored`.

use std::time::{Duration, Instant};

use anyhow::Context;
use portfolio_email_contracts::{Email, EmailBody, EmailService};
use portfolio_email_impl::EmailServiceImpl;
use portfolio_models::email_address::EmailAddress;
use serde::Deserialize;
use url::Url;
use uuid::Uuid;

#[tokio::test]
#[ignore = "requires smtp4dev"]
async fn send_email() {
    let client = setup().await;

    let result = client
        .email
        .send(Email {
            sender_name: Some("Portfolio Contact".into()),
            recipient: "test@example.com".parse().unwrap(),
            subject: "The Subject".into(),
            body: EmailBody::Alternative {
                text: "Hello World!".into(),
                html: "<h1>Hello World!</h1>".into(),
            },
            reply_to: Some("replyto@example.com".parse().unwrap()),
        })
        .await
        .unwrap();

    assert!(result);

    let mail = client.wait_for_mail().await;
    assert!(mail.from.contains(client.from.as_str()));
    assert_eq!(mail.to, "test@example.com");
    assert_eq!(mail.subject, "The Subject");

    let details = client.fetch_email_details(mail.id).await;
    assert!(details.plain_text);
    assert!(details.html);
    let reply_to = details
        .headers
        .into_iter()
        .find(|h| h.name == "Reply-To")
        .unwrap();
    assert_eq!(reply_to.value, "replyto@example.com");
}

#[tokio::test]
#[ignore = "requires smtp4dev"]
async fn ping() {
    let client = setup().await;

    client.email.ping().await.unwrap();
}

struct TestClient {
    email: EmailServiceImpl,
    from: EmailAddress,
    smtp4dev_url: Url,
}

impl TestClient {
    async fn reset(&self) {
        reqwest::Client::new()
            .delete(self.smtp4dev_url.join("api/Messages/*").unwrap())
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap();
    }

    async fn wait_for_mail(&self) -> EmailSummary {
        let now = Instant::now();
        while now.elapsed() < Duration::from_secs(2) {
            let mut mailbox = self.fetch_mailbox().await;
            if let Some(mail) = mailbox.pop() {
                return mail;
            }
        }
        panic!("No email received");
    }

    async fn fetch_mailbox(&self) -> Vec<EmailSummary> {
        reqwest::Client::new()
            .get(self.smtp4dev_url.join("api/Messages").unwrap())
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap()
            .json::<PaginationResponse<_>>()
            .await
            .unwrap()
            .results
    }

    async fn fetch_email_details(&self, id: Uuid) -> EmailDetails {
        reqwest::Client::new()
            .get(
                self.smtp4dev_url
                    .join(&format!("api/Messages/{id}"))
                    .unwrap(),
            )
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap()
            .json()
            .await
            .unwrap()
    }
}

async fn setup() -> TestClient {
    let config = portfolio_config::load_dev_config().unwrap();
    let from = config.email.sender().unwrap().clone();

    let email = EmailServiceImpl::new(&config.email.smtp_url, None, from.clone()).unwrap();

    let smtp4dev_url = std::env::var("SMTP4DEV_URL")
        .context("Failed to read SMTP4DEV_URL environment variable")
        .unwrap()
        .parse()
        .context("Failed to parse SMTP4DEV_URL environment variable")
        .unwrap();

    let client = TestClient {
        email,
        from,
        smtp4dev_url,
    };

    client.reset().await;

    client
}

#[derive(Debug, Deserialize)]
struct PaginationResponse<T> {
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct EmailSummary {
    id: Uuid,
    from: String,
    to: String,
    subject: String,
}

#[derive(Debug, Deserialize)]
struct EmailDetails {
    headers: Vec<EmailHeader>,
    #[serde(rename = "hasPlainTextBody")]
    plain_text: bool,
    #[serde(rename = "hasHtmlBody")]
    html: bool,
}

#[derive(Debug, Deserialize)]
struct EmailHeader {
    name: String,
    value: String,
}
