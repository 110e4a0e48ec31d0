mod config;
mod envelope;
mod handler;
mod message;
mod router;
mod secrets;
mod transport;

use anyhow::anyhow;
use clap::Parser;
use config::{Config, SecretsBackend, TransportKind};
use handler::ContactFormMessageHandler;
use router::router;
use secrets::{AwsSecretsManagerSecretRepository, EnvironmentSecretRepository, SecretRepository};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};
use transport::{resend::ResendTransport, smtp::SmtpTransport, EmailTransport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_target(false)
        .without_time()
        .init();

    let config = Arc::new(Config::parse());
    config.validate()?;

    let transport = match config.secrets_backend {
        SecretsBackend::Environment => {
            build_transport(&config, EnvironmentSecretRepository::open().await)
        }
        SecretsBackend::AwsSecretsManager => {
            build_transport(&config, AwsSecretsManagerSecretRepository::open().await)
        }
    };
    let handler = Arc::new(ContactFormMessageHandler::new(config.clone(), transport));
    let app = router(handler, config.cors_origins()?);

    if config.use_lambda() {
        info!("Starting Lambda runtime");
        lambda_http::run(app)
            .await
            .map_err(|error| anyhow!("Lambda runtime failed: {error}"))
    } else {
        let listener = TcpListener::bind((config.host, config.port)).await?;
        info!("Listening on {}", listener.local_addr()?);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

fn build_transport<SecretRepositoryT: SecretRepository + 'static>(
    config: &Config,
    secrets_repository: SecretRepositoryT,
) -> Arc<dyn EmailTransport> {
    match config.transport {
        TransportKind::Resend => {
            info!("Delivering through Resend at {}", config.resend_api_url);
            Arc::new(ResendTransport::new(
                config.resend_api_url.as_str(),
                secrets_repository,
            ))
        }
        TransportKind::Smtp => {
            info!("Delivering over SMTP");
            Arc::new(SmtpTransport::new(config.smtp_url.as_str(), secrets_repository))
        }
    }
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!("Could not listen for shutdown signal: {error}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
