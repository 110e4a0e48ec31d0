use super::{EmailTransport, TransportError};
use crate::{envelope::Envelope, secrets::SecretRepository};
use async_trait::async_trait;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::{Credentials, Mechanism},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::info;

pub const SMTP_CREDENTIALS_NAME: &str = "smtp-credentials";

/// Delivers over SMTP as a `multipart/alternative` message carrying both bodies.
pub struct SmtpTransport<SecretRepositoryT: SecretRepository> {
    smtp_url: String,
    secrets_repository: SecretRepositoryT,
    mailer: OnceCell<AsyncSmtpTransport<Tokio1Executor>>,
}

#[derive(Deserialize)]
struct SmtpCredentials {
    #[serde(rename = "SMTP_USERNAME")]
    username: String,
    #[serde(rename = "SMTP_PASSWORD")]
    password: String,
}

impl<SecretRepositoryT: SecretRepository> SmtpTransport<SecretRepositoryT> {
    pub fn new(smtp_url: impl Into<String>, secrets_repository: SecretRepositoryT) -> Self {
        Self {
            smtp_url: smtp_url.into(),
            secrets_repository,
            mailer: OnceCell::new(),
        }
    }

    async fn initialise_mailer(&self) -> anyhow::Result<AsyncSmtpTransport<Tokio1Executor>> {
        info!("initialise_mailer: Connecting to {}", self.smtp_url);
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::from_url(&self.smtp_url)?
            .authentication(vec![Mechanism::Plain]);

        // Credentials are only ever sent over TLS. A misconfigured plain-text URL makes the
        // server reject the message instead.
        if self.smtp_url.starts_with("smtps://") {
            let credentials: SmtpCredentials = self
                .secrets_repository
                .get_secret(SMTP_CREDENTIALS_NAME)
                .await?;
            builder = builder.credentials(Credentials::new(
                credentials.username,
                credentials.password,
            ));
        }

        Ok(builder.build())
    }

    fn build_message(envelope: &Envelope) -> Result<Message, TransportError> {
        Message::builder()
            .from(parse_mailbox("sender", &envelope.from)?)
            .reply_to(parse_mailbox("reply-to", &envelope.reply_to)?)
            .to(parse_mailbox("recipient", &envelope.to)?)
            .subject(&envelope.subject)
            .multipart(MultiPart::alternative_plain_html(
                envelope.text.clone(),
                envelope.html.clone(),
            ))
            .map_err(|error| TransportError::new(format!("Error building message: {error}")))
    }
}

fn parse_mailbox(role: &str, address: &str) -> Result<Mailbox, TransportError> {
    address
        .parse()
        .map_err(|error| TransportError::new(format!("Invalid {role} address {address}: {error}")))
}

#[async_trait]
impl<SecretRepositoryT: SecretRepository> EmailTransport for SmtpTransport<SecretRepositoryT> {
    async fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let message = Self::build_message(envelope)?;
        let mailer = self
            .mailer
            .get_or_try_init(|| self.initialise_mailer())
            .await
            .map_err(|error| {
                TransportError::new(format!("Unable to connect to SMTP server: {error:#}"))
            })?;
        mailer
            .send(message)
            .await
            .map(|_| ())
            .map_err(|error| TransportError::new(format!("Error sending message: {error}")))
    }
}
