use googletest::prelude::*;
use reqwest::{header, Client, StatusCode};
use serde_json::{json, Value};
use std::{
    process::{Child, Command, Stdio},
    time::Duration,
};
use test_support::{
    fake_resend::FakeResend,
    fake_smtp::FakeSmtpServer,
    setup_logging,
};
use tokio::time::{sleep, timeout};

const FAKE_RESEND_API_KEY: &str = "re_integration_test_key";
const ALLOWED_ORIGIN: &str = "https://portfolio.example.com";

/// The relay binary running in server mode. The process is killed on drop.
struct RelayProcess {
    child: Child,
    port: u16,
}

impl RelayProcess {
    async fn start(port: u16, environment: &[(&str, String)]) -> Self {
        let child = Command::new(env!("CARGO_BIN_EXE_contact-form-relay"))
            .env_clear()
            .env("BIND_ADDRESS", "127.0.0.1")
            .env("PORT", port.to_string())
            .env("RUNTIME_MODE", "server")
            .env("SECRETS_BACKEND", "environment")
            .env("ALLOWED_ORIGINS", ALLOWED_ORIGIN)
            .env("SENDER_EMAIL", "Contact Form <form@example.com>")
            .env("RECIPIENT_EMAIL", "owner@example.com")
            .env("SEND_TIMEOUT_SECS", "5")
            .envs(environment.iter().map(|(key, value)| (*key, value)))
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .unwrap();
        let process = Self { child, port };
        process.wait_until_healthy().await;
        process
    }

    fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{path}", self.port)
    }

    async fn wait_until_healthy(&self) {
        let client = Client::new();
        timeout(Duration::from_secs(30), async {
            loop {
                if let Ok(response) = client.get(self.url("/health")).send().await {
                    if response.status().is_success() {
                        return;
                    }
                }
                sleep(Duration::from_millis(100)).await;
            }
        })
        .await
        .expect("Relay did not become healthy in time");
    }

    async fn submit(&self, payload: &Value) -> reqwest::Response {
        Client::new()
            .post(self.url("/api/contact"))
            .header(header::ORIGIN, ALLOWED_ORIGIN)
            .json(payload)
            .send()
            .await
            .unwrap()
    }
}

impl Drop for RelayProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn valid_payload() -> Value {
    json!({
        "name": "Arbitrary sender",
        "email": "sender@example.com",
        "subject": "Question about your work",
        "message": "I would like to hear more about <b>this</b> project.",
    })
}

#[tokio::test]
async fn relays_submission_through_resend() -> Result<()> {
    setup_logging();
    let fake_resend = FakeResend::new(FAKE_RESEND_API_KEY);
    let address = fake_resend.clone().serve().await;
    let relay = RelayProcess::start(
        18431,
        &[
            ("EMAIL_TRANSPORT", "resend".into()),
            ("RESEND_API_URL", FakeResend::emails_url(address)),
            ("RESEND_API_KEY", FAKE_RESEND_API_KEY.into()),
        ],
    )
    .await;

    let response = relay.submit(&valid_payload()).await;

    verify_that!(response.status(), eq(StatusCode::OK))?;
    verify_that!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|value| value.to_str().ok()),
        some(eq(ALLOWED_ORIGIN))
    )?;
    verify_that!(
        response.json::<Value>().await.unwrap(),
        eq(json!({"success": true}))
    )?;
    let emails = fake_resend.received_emails();
    verify_that!(emails, len(eq(1)))?;
    verify_that!(emails[0]["to"], eq(json!("owner@example.com")))?;
    verify_that!(emails[0]["reply_to"], eq(json!("sender@example.com")))?;
    verify_that!(
        emails[0]["subject"],
        eq(json!("Portfolio Contact: Question about your work"))
    )?;
    verify_that!(
        emails[0]["html"].as_str(),
        some(contains_substring("&lt;b&gt;this&lt;/b&gt;"))
    )
}

#[tokio::test]
async fn forwards_provider_rejection_to_caller() -> Result<()> {
    setup_logging();
    let fake_resend = FakeResend::new("a key the relay does not have");
    let address = fake_resend.clone().serve().await;
    let relay = RelayProcess::start(
        18432,
        &[
            ("EMAIL_TRANSPORT", "resend".into()),
            ("RESEND_API_URL", FakeResend::emails_url(address)),
            ("RESEND_API_KEY", FAKE_RESEND_API_KEY.into()),
        ],
    )
    .await;

    let response = relay.submit(&valid_payload()).await;

    verify_that!(response.status(), eq(StatusCode::UNAUTHORIZED))?;
    verify_that!(
        response.json::<Value>().await.unwrap(),
        eq(json!({
            "success": false,
            "message": "Failed to send email",
            "error": {"message": "Invalid API Key"}
        }))
    )
}

#[tokio::test]
async fn rejects_invalid_submission_without_sending() -> Result<()> {
    setup_logging();
    let fake_resend = FakeResend::new(FAKE_RESEND_API_KEY);
    let address = fake_resend.clone().serve().await;
    let relay = RelayProcess::start(
        18433,
        &[
            ("EMAIL_TRANSPORT", "resend".into()),
            ("RESEND_API_URL", FakeResend::emails_url(address)),
            ("RESEND_API_KEY", FAKE_RESEND_API_KEY.into()),
        ],
    )
    .await;
    let mut payload = valid_payload();
    payload["email"] = json!("sender at example dot com");

    let response = relay.submit(&payload).await;

    verify_that!(response.status(), eq(StatusCode::BAD_REQUEST))?;
    verify_that!(
        response.json::<Value>().await.unwrap(),
        eq(json!({"success": false, "message": "Invalid email format."}))
    )?;
    verify_that!(fake_resend.received_emails(), empty())
}

#[tokio::test]
async fn relays_submission_over_smtp() -> Result<()> {
    setup_logging();
    let fake_smtp = FakeSmtpServer::start();
    let relay = RelayProcess::start(
        18434,
        &[
            ("EMAIL_TRANSPORT", "smtp".into()),
            ("SMTP_URL", fake_smtp.url()),
        ],
    )
    .await;

    let response = relay.submit(&valid_payload()).await;

    verify_that!(response.status(), eq(StatusCode::OK))?;
    verify_that!(
        timeout(Duration::from_secs(10), fake_smtp.next_mail()).await,
        ok(some(all!(
            contains_substring("To: owner@example.com"),
            contains_substring("Reply-To: sender@example.com"),
            contains_substring("Subject: Portfolio Contact: Question about your work"),
            contains_substring("I would like to hear more about <b>this</b> project.")
        )))
    )
}
