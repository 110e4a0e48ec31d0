use super::{EmailTransport, TransportError};
use crate::{envelope::Envelope, secrets::SecretRepository};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

pub const RESEND_API_KEY_NAME: &str = "resend-api-key";

/// Delivers through the Resend transactional email HTTP API.
pub struct ResendTransport<SecretRepositoryT: SecretRepository> {
    client: Client,
    api_url: String,
    secrets_repository: SecretRepositoryT,
    credentials: OnceCell<ResendCredentials>,
}

#[derive(Deserialize)]
struct ResendCredentials {
    #[serde(rename = "RESEND_API_KEY")]
    api_key: String,
}

impl<SecretRepositoryT: SecretRepository> ResendTransport<SecretRepositoryT> {
    pub fn new(api_url: impl Into<String>, secrets_repository: SecretRepositoryT) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.into(),
            secrets_repository,
            credentials: OnceCell::new(),
        }
    }

    async fn credentials(&self) -> Result<&ResendCredentials, TransportError> {
        self.credentials
            .get_or_try_init(|| self.secrets_repository.get_secret(RESEND_API_KEY_NAME))
            .await
            .map_err(|error| {
                TransportError::new(format!(
                    "Could not retrieve Resend credentials {RESEND_API_KEY_NAME}: {error:#}"
                ))
            })
    }
}

#[async_trait]
impl<SecretRepositoryT: SecretRepository> EmailTransport for ResendTransport<SecretRepositoryT> {
    async fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let credentials = self.credentials().await?;
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&credentials.api_key)
            .json(envelope)
            .send()
            .await
            .map_err(|error| TransportError::new(format!("Error calling Resend API: {error}")))?;

        let status = response.status();
        if status.is_success() {
            debug!("Resend accepted message with status {status}");
            return Ok(());
        }
        let payload = match response.text().await {
            Ok(body) => Some(serde_json::from_str(&body).unwrap_or(Value::String(body))),
            Err(error) => {
                warn!("Could not read error response from Resend: {error}");
                None
            }
        };
        Err(TransportError::rejected(status, payload))
    }
}
