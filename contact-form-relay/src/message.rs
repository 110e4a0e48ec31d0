use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use thiserror::Error;

const MAX_NAME_LENGTH: usize = 150;
const MIN_SUBJECT_LENGTH: usize = 10;
const MIN_MESSAGE_LENGTH: usize = 10;

static EMAIL_PATTERN: OnceLock<Regex> = OnceLock::new();

/// A submission exactly as the browser sent it. Fields may be missing or of any JSON type until
/// [`ContactFormMessage::validate`] has checked them.
#[derive(Debug)]
pub struct ContactFormMessage(Map<String, Value>);

impl ContactFormMessage {
    pub fn from_json(body: &[u8]) -> Result<Self, serde_json::Error> {
        let fields = match serde_json::from_slice(body)? {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        Ok(Self(fields))
    }

    /// Checks name, email, subject and message in that order, reporting only the first failure.
    pub fn validate(&self) -> Result<ValidatedContactFormMessage, ValidationError> {
        let name = match self.text_field("name") {
            None | Some("") => return Err(ValidationError::MissingName),
            Some(name) if name.chars().count() > MAX_NAME_LENGTH => {
                return Err(ValidationError::NameTooLong)
            }
            Some(name) => name,
        };
        let email = self
            .text_field("email")
            .filter(|email| email_pattern().is_match(email))
            .ok_or(ValidationError::InvalidEmail)?;
        let subject = self
            .text_field("subject")
            .filter(|subject| subject.chars().count() > MIN_SUBJECT_LENGTH)
            .ok_or(ValidationError::SubjectTooShort)?;
        let message = self
            .text_field("message")
            .filter(|message| message.chars().count() > MIN_MESSAGE_LENGTH)
            .ok_or(ValidationError::MessageTooShort)?;

        Ok(ValidatedContactFormMessage {
            name,
            email,
            subject,
            message,
        })
    }

    fn text_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

fn email_pattern() -> &'static Regex {
    EMAIL_PATTERN
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedContactFormMessage<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub subject: &'a str,
    pub message: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid name.")]
    MissingName,
    #[error("Invalid name.")]
    NameTooLong,
    #[error("Invalid email format.")]
    InvalidEmail,
    #[error("Subject must be longer than 10 characters.")]
    SubjectTooShort,
    #[error("Message must be longer than 10 characters.")]
    MessageTooShort,
}
