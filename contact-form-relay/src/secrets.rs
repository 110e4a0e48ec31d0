use anyhow::{anyhow, Context};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Source of provider credentials. Each secret is a JSON object whose keys are the credential
/// names, e.g. `{"SMTP_USERNAME": "...", "SMTP_PASSWORD": "..."}`.
#[async_trait]
pub trait SecretRepository: Send + Sync {
    async fn open() -> Self
    where
        Self: Sized;

    async fn get_secret<T: DeserializeOwned>(&self, name: &'static str) -> anyhow::Result<T>;
}

/// Reads credentials straight from the process environment. The secret name is only used in
/// error messages; the keys of `T` are the variable names.
#[derive(Clone, Default)]
pub struct EnvironmentSecretRepository;

#[async_trait]
impl SecretRepository for EnvironmentSecretRepository {
    async fn open() -> Self {
        Self
    }

    async fn get_secret<T: DeserializeOwned>(&self, name: &'static str) -> anyhow::Result<T> {
        // Variables which are not valid UTF-8 cannot name or hold a credential.
        let variables: Map<String, Value> = std::env::vars_os()
            .filter_map(|(key, value)| {
                Some((key.into_string().ok()?, Value::String(value.into_string().ok()?)))
            })
            .collect();
        serde_json::from_value(Value::Object(variables))
            .with_context(|| format!("Secret {name} is not available in the environment"))
    }
}

pub struct AwsSecretsManagerSecretRepository(aws_sdk_secretsmanager::Client);

#[async_trait]
impl SecretRepository for AwsSecretsManagerSecretRepository {
    async fn open() -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Ok(url) = std::env::var("AWS_ENDPOINT_URL") {
            loader = loader.endpoint_url(url);
        }
        let config = loader.load().await;
        Self(aws_sdk_secretsmanager::Client::new(&config))
    }

    async fn get_secret<T: DeserializeOwned>(&self, name: &'static str) -> anyhow::Result<T> {
        let secret = self
            .0
            .get_secret_value()
            .secret_id(name)
            .send()
            .await
            .with_context(|| format!("Could not retrieve secret {name}"))?;
        let Some(secret_value) = secret.secret_string() else {
            return Err(anyhow!("Missing secret {name}"));
        };
        serde_json::from_str(secret_value).with_context(|| format!("Malformed secret {name}"))
    }
}

#[cfg(test)]
pub mod test_support {
    use super::SecretRepository;
    use crate::transport::{resend::RESEND_API_KEY_NAME, smtp::SMTP_CREDENTIALS_NAME};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde::de::DeserializeOwned;
    use std::{collections::HashMap, sync::Mutex};

    pub const FAKE_RESEND_API_KEY: &str = "re_arbitrary_api_key";

    pub struct FakeSecretRepository(Mutex<HashMap<&'static str, String>>);

    impl FakeSecretRepository {
        pub fn remove_secret(&self, name: &'static str) {
            self.0.lock().unwrap().remove(name);
        }

        pub fn add_secret(&self, name: &'static str, value: impl Into<String>) {
            self.0.lock().unwrap().insert(name, value.into());
        }
    }

    #[async_trait]
    impl SecretRepository for FakeSecretRepository {
        async fn open() -> Self {
            Self(Mutex::new(HashMap::from([
                (
                    SMTP_CREDENTIALS_NAME,
                    r#"{
                        "SMTP_USERNAME": "fake SMTP username",
                        "SMTP_PASSWORD": "fake SMTP password"
                    }"#
                    .into(),
                ),
                (
                    RESEND_API_KEY_NAME,
                    format!(r#"{{"RESEND_API_KEY": "{FAKE_RESEND_API_KEY}"}}"#),
                ),
            ])))
        }

        async fn get_secret<T: DeserializeOwned>(&self, name: &'static str) -> anyhow::Result<T> {
            let string_value = self
                .0
                .lock()
                .unwrap()
                .get(name)
                .cloned()
                .ok_or_else(|| anyhow!("No such secret {name}"))?;
            Ok(serde_json::from_str(&string_value)?)
        }
    }
}
