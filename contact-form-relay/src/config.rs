use anyhow::Context;
use axum::http::HeaderValue;
use clap::{Parser, ValueEnum};
use lettre::message::Mailbox;
use std::{net::IpAddr, num::ParseIntError, time::Duration};

pub const DEFAULT_ALLOWED_ORIGIN: &str = "https://patrick-patoski.vercel.app";
pub const DEFAULT_SENDER: &str = "Portfolio Contact Form <onboarding@resend.dev>";
pub const DEFAULT_RECIPIENT: &str = "codesbypatrick@gmail.com";
pub const RESEND_API_URL: &str = "https://api.resend.com/emails";
pub const SMTP_URL: &str = "smtps://smtp.gmail.com";

/// Process-wide settings, parsed once at startup from the command line and the environment.
#[derive(Parser, Debug, Clone)]
#[command(version, about = "Relays portfolio contact form submissions by email")]
pub struct Config {
    /// Address to listen on when running as a standalone server.
    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0")]
    pub host: IpAddr,

    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Origins allowed to call `/api/*` with credentials.
    #[arg(
        long,
        env = "ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_value = DEFAULT_ALLOWED_ORIGIN
    )]
    pub allowed_origins: Vec<String>,

    #[arg(long, env = "SENDER_EMAIL", default_value = DEFAULT_SENDER)]
    pub sender: String,

    #[arg(long, env = "RECIPIENT_EMAIL", default_value = DEFAULT_RECIPIENT)]
    pub recipient: String,

    #[arg(long, env = "EMAIL_TRANSPORT", value_enum, default_value_t = TransportKind::Resend)]
    pub transport: TransportKind,

    #[arg(long, env = "RESEND_API_URL", default_value = RESEND_API_URL)]
    pub resend_api_url: String,

    #[arg(long, env = "SMTP_URL", default_value = SMTP_URL)]
    pub smtp_url: String,

    /// Upper bound on a single delivery attempt, in seconds.
    #[arg(
        long = "send-timeout-secs",
        env = "SEND_TIMEOUT_SECS",
        default_value = "10",
        value_parser = parse_seconds
    )]
    pub send_timeout: Duration,

    #[arg(long, env = "SECRETS_BACKEND", value_enum, default_value_t = SecretsBackend::Environment)]
    pub secrets_backend: SecretsBackend,

    #[arg(long, env = "RUNTIME_MODE", value_enum, default_value_t = RuntimeMode::Auto)]
    pub runtime_mode: RuntimeMode,

    /// Set by the Lambda execution environment.
    #[arg(long, env = "AWS_LAMBDA_RUNTIME_API", hide = true)]
    pub lambda_runtime_api: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Resend,
    Smtp,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretsBackend {
    Environment,
    AwsSecretsManager,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeMode {
    Auto,
    Server,
    Lambda,
}

impl Config {
    /// Rejects settings which would only fail later, on the first request.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.sender
            .parse::<Mailbox>()
            .with_context(|| format!("Invalid sender address {}", self.sender))?;
        self.recipient
            .parse::<Mailbox>()
            .with_context(|| format!("Invalid recipient address {}", self.recipient))?;
        self.cors_origins()?;
        Ok(())
    }

    pub fn cors_origins(&self) -> anyhow::Result<Vec<HeaderValue>> {
        self.allowed_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin.trim())
                    .with_context(|| format!("Invalid allowed origin {origin}"))
            })
            .collect()
    }

    pub fn use_lambda(&self) -> bool {
        match self.runtime_mode {
            RuntimeMode::Auto => self.lambda_runtime_api.is_some(),
            RuntimeMode::Server => false,
            RuntimeMode::Lambda => true,
        }
    }
}

fn parse_seconds(value: &str) -> Result<Duration, ParseIntError> {
    Ok(Duration::from_secs(value.parse()?))
}
