use nutype::nutype;
use thiserror::Error;

use crate::email_address::EmailAddress;

/// A contact form submission exactly as it was received. Every field may be
/// missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactSubmission {
    pub name: Option<String>,
    pub email: Option<String>,
    pub message: Option<String>,
}

/// A contact form submission which passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactMessage {
    pub author: ContactMessageAuthor,
    pub content: ContactMessageContent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactMessageAuthor {
    pub name: ContactMessageAuthorName,
    pub email: EmailAddress,
}

#[nutype(
    validate(not_empty),
    derive(Debug, Clone, PartialEq, Eq, TryFrom, Deref, Serialize, Deserialize)
)]
pub struct ContactMessageAuthorName(String);

#[nutype(
    validate(len_char_min = 10, len_char_max = 2000),
    derive(Debug, Clone, PartialEq, Eq, TryFrom, Deref, Serialize, Deserialize)
)]
pub struct ContactMessageContent(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContactValidationError {
    #[error("All fields are required.")]
    MissingField,
    #[error("Please enter a valid email address.")]
    InvalidEmail,
    #[error("Message must be between 10 and 2000 characters.")]
    InvalidMessageLength,
}

impl TryFrom<ContactSubmission> for ContactMessage {
    type Error = ContactValidationError;

    /// Validates the submission, reporting only the first rule that fails.
    fn try_from(value: ContactSubmission) -> Result<Self, Self::Error> {
        let (Some(name), Some(email), Some(message)) = (
            value
                .name
                .and_then(|x| ContactMessageAuthorName::try_new(x).ok()),
            value.email.filter(|x| !x.is_empty()),
            value.message.filter(|x| !x.is_empty()),
        ) else {
            return Err(ContactValidationError::MissingField);
        };

        let email = parse_email(&email).ok_or(ContactValidationError::InvalidEmail)?;

        let content = ContactMessageContent::try_new(message)
            .map_err(|_| ContactValidationError::InvalidMessageLength)?;

        Ok(Self {
            author: ContactMessageAuthor { name, email },
            content,
        })
    }
}

/// Parses an email address and additionally requires the domain to end in a
/// top level domain, so that addresses like `user@localhost` or
/// `user@[127.0.0.1]` are rejected.
fn parse_email(email: &str) -> Option<EmailAddress> {
    email
        .parse::<EmailAddress>()
        .ok()
        .filter(|address| has_top_level_domain(address.domain()))
}

fn has_top_level_domain(domain: &str) -> bool {
    let Some((_, tld)) = domain.rsplit_once('.') else {
        return false;
    };

    let tld = tld.to_lowercase();
    let alphabetic = tld.chars().count() >= 2 && tld.chars().all(char::is_alphabetic);
    let punycode = tld.len() >= 4
        && tld.starts_with("xn")
        && tld
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-');

    alphabetic || punycode
}

#[cfg(test)]
mod tests {
    use portfolio_utils::assert_matches;

    use super::*;

    fn submission(name: &str, email: &str, message: &str) -> ContactSubmission {
        ContactSubmission {
            name: Some(name.into()),
            email: Some(email.into()),
            message: Some(message.into()),
        }
    }

    #[test]
    fn valid() {
        let result =
            ContactMessage::try_from(submission("Ada", "ada@example.com", "Hello, this is a test message."))
                .unwrap();

        assert_eq!(*result.author.name, "Ada");
        assert_eq!(result.author.email.as_str(), "ada@example.com");
        assert_eq!(*result.content, "Hello, this is a test message.");
    }

    #[test]
    fn missing_fields() {
        for input in [
            ContactSubmission::default(),
            ContactSubmission {
                name: None,
                ..submission("Ada", "ada@example.com", "Hello, this is a test message.")
            },
            ContactSubmission {
                email: None,
                ..submission("Ada", "ada@example.com", "Hello, this is a test message.")
            },
            ContactSubmission {
                message: None,
                ..submission("Ada", "ada@example.com", "Hello, this is a test message.")
            },
            submission("", "ada@example.com", "Hello, this is a test message."),
            submission("Ada", "", "Hello, this is a test message."),
            submission("Ada", "ada@example.com", ""),
        ] {
            assert_eq!(
                ContactMessage::try_from(input),
                Err(ContactValidationError::MissingField)
            );
        }
    }

    #[test]
    fn missing_field_takes_precedence() {
        // invalid email and too short message, but the name is missing
        let result = ContactMessage::try_from(submission("", "not-an-email", "short"));
        assert_eq!(result, Err(ContactValidationError::MissingField));
    }

    #[test]
    fn whitespace_name_is_present() {
        let result = ContactMessage::try_from(submission(
            "  ",
            "ada@example.com",
            "Hello, this is a test message.",
        ))
        .unwrap();
        assert_eq!(*result.author.name, "  ");
    }

    #[test]
    fn invalid_email() {
        for email in [
            "not-an-email",
            "ada@",
            "@example.com",
            "ada@localhost",
            "ada@example.c",
            "ada@@example.com",
            "ada example@example.com",
        ] {
            let result =
                ContactMessage::try_from(submission("Ada", email, "Hello, this is a test message."));
            assert_eq!(result, Err(ContactValidationError::InvalidEmail), "{email}");
        }
    }

    #[test]
    fn invalid_email_takes_precedence_over_length() {
        let result = ContactMessage::try_from(submission("Ada", "not-an-email", "short"));
        assert_eq!(result, Err(ContactValidationError::InvalidEmail));
    }

    #[test]
    fn message_length_bounds() {
        for (len, ok) in [(1, false), (9, false), (10, true), (2000, true), (2001, false)] {
            let message = "x".repeat(len);
            let result = ContactMessage::try_from(submission("Ada", "ada@example.com", &message));
            if ok {
                assert_matches!(result, Ok(_));
            } else {
                assert_eq!(result, Err(ContactValidationError::InvalidMessageLength), "{len}");
            }
        }
    }

    #[test]
    fn message_length_counts_characters() {
        // 10 characters, but 30 bytes
        let message = "€".repeat(10);
        assert_eq!(message.len(), 30);

        let result = ContactMessage::try_from(submission("Ada", "ada@example.com", &message));

        assert_matches!(result, Ok(_));
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            ContactValidationError::MissingField.to_string(),
            "All fields are required."
        );
        assert_eq!(
            ContactValidationError::InvalidEmail.to_string(),
            "Please enter a valid email address."
        );
        assert_eq!(
            ContactValidationError::InvalidMessageLength.to_string(),
            "Message must be between 10 and 2000 characters."
        );
    }

    #[test]
    fn top_level_domain() {
        assert!(has_top_level_domain("example.com"));
        assert!(has_top_level_domain("example.xn--p1ai"));
        assert!(!has_top_level_domain("localhost"));
        assert!(!has_top_level_domain("[127.0.0.1]"));
        assert!(!has_top_level_domain("example.c0m"));
    }
}
