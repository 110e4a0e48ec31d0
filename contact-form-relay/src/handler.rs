use crate::{
    config::Config,
    envelope::Envelope,
    message::{ContactFormMessage, ValidationError},
    transport::{EmailTransport, TransportError},
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{error, info, warn};

const HEALTH_MESSAGE: &str = "Hello from the contact form relay";
const SEND_FAILURE_MESSAGE: &str = "Failed to send email";
const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred";

/// Validates contact form submissions and hands them to the configured [`EmailTransport`].
pub struct ContactFormMessageHandler {
    config: Arc<Config>,
    transport: Arc<dyn EmailTransport>,
}

impl ContactFormMessageHandler {
    pub fn new(config: Arc<Config>, transport: Arc<dyn EmailTransport>) -> Self {
        Self { config, transport }
    }

    pub fn handle_health_check(&self) -> Json<HealthResponse> {
        Json(HealthResponse {
            msg: HEALTH_MESSAGE,
            status: "ok",
        })
    }

    pub async fn handle_contact(&self, body: &[u8]) -> Response {
        match self.process_message(body).await {
            Ok(()) => {
                info!("Contact form message delivered");
                (StatusCode::OK, Json(ContactResponse::success())).into_response()
            }
            Err(error) => {
                error.log();
                error.into_response()
            }
        }
    }

    async fn process_message(&self, body: &[u8]) -> Result<(), ContactFormError> {
        let message = ContactFormMessage::from_json(body)
            .map_err(|error| ContactFormError::Unexpected(error.to_string()))?;
        let validated_message = message.validate()?;
        let envelope = Envelope::new(&validated_message, &self.config).map_err(|error| {
            ContactFormError::Unexpected(format!("Error rendering email: {error}"))
        })?;
        self.send_email(&envelope).await
    }

    async fn send_email(&self, envelope: &Envelope) -> Result<(), ContactFormError> {
        let send_timeout = self.config.send_timeout;
        timeout(send_timeout, self.transport.send(envelope))
            .await
            .map_err(|_| TransportError::timed_out(send_timeout))??;
        Ok(())
    }
}

#[derive(Serialize, Debug)]
pub struct HealthResponse {
    msg: &'static str,
    status: &'static str,
}

#[derive(Serialize, Debug)]
struct ContactResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<Value>,
}

impl ContactResponse {
    fn success() -> Self {
        Self {
            success: true,
            message: None,
            error: None,
        }
    }

    fn failure(message: impl Into<String>, error: Option<Value>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            error,
        }
    }
}

#[derive(Debug, Error)]
enum ContactFormError {
    #[error("Client error: {0}")]
    Validation(#[from] ValidationError),
    #[error("Error sending mail: {0}")]
    Transport(#[from] TransportError),
    #[error("Internal error: {0}")]
    Unexpected(String),
}

impl ContactFormError {
    fn log(&self) {
        match self {
            ContactFormError::Validation(error) => {
                warn!("Rejected contact form submission: {error}");
            }
            ContactFormError::Transport(TransportError {
                status,
                payload,
                description,
            }) => {
                error!(?status, ?payload, "Error sending contact form email: {description}");
            }
            ContactFormError::Unexpected(description) => {
                error!("Internal error handling contact form submission: {description}");
            }
        }
    }

    fn into_response(self) -> Response {
        match self {
            ContactFormError::Validation(error) => (
                StatusCode::BAD_REQUEST,
                Json(ContactResponse::failure(error.to_string(), None)),
            )
                .into_response(),
            ContactFormError::Transport(TransportError {
                status,
                payload,
                description,
            }) => (
                status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                Json(ContactResponse::failure(
                    SEND_FAILURE_MESSAGE,
                    Some(payload.unwrap_or(Value::String(description))),
                )),
            )
                .into_response(),
            ContactFormError::Unexpected(description) => {
                let message = if description.is_empty() {
                    UNKNOWN_ERROR_MESSAGE.into()
                } else {
                    description
                };
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ContactResponse::failure(message, None)),
                )
                    .into_response()
            }
        }
    }
}
