pub mod resend;
pub mod smtp;

use crate::envelope::Envelope;
use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Something which can attempt to deliver an [`Envelope`]. Implementations make exactly one
/// attempt per call.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, envelope: &Envelope) -> Result<(), TransportError>;
}

/// A failed delivery. `status` and `payload` are set when the provider answered with an error
/// response, and are forwarded to the visitor verbatim.
#[derive(Debug, Error)]
#[error("{description}")]
pub struct TransportError {
    pub status: Option<StatusCode>,
    pub payload: Option<Value>,
    pub description: String,
}

impl TransportError {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            status: None,
            payload: None,
            description: description.into(),
        }
    }

    pub fn rejected(status: StatusCode, payload: Option<Value>) -> Self {
        Self {
            status: Some(status),
            payload,
            description: format!("Email provider rejected message with status {status}"),
        }
    }

    pub fn timed_out(timeout: Duration) -> Self {
        Self::new(format!(
            "Email provider did not respond within {} seconds",
            timeout.as_secs_f32()
        ))
    }
}
