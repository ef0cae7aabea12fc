use std::path::PathBuf;

use aws_sdk_secretsmanager::config::Region;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use aws_sdk_secretsmanager::operation::get_secret_value::GetSecretValueOutput;
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::error::{IngestError, Result};

pub const DEFAULT_SECRET_NAME: &str = "algotrader-secret-credentials";
pub const DEFAULT_REGION: &str = "us-east-1";

/// Name and region of the secret holding the database credentials.
#[derive(Debug, Clone)]
pub struct SecretRef {
    pub name: String,
    pub region: String,
}

impl SecretRef {
    fn error(&self, reason: impl ToString) -> IngestError {
        IngestError::SecretRetrieval {
            name: self.name.clone(),
            region: self.region.clone(),
            reason: reason.to_string(),
        }
    }
}

impl Default for SecretRef {
    fn default() -> Self {
        Self {
            name: DEFAULT_SECRET_NAME.to_string(),
            region: DEFAULT_REGION.to_string(),
        }
    }
}

/// Connection parameters for the destination database.
#[derive(Deserialize)]
pub struct DbCredentials {
    pub host: String,
    #[serde(deserialize_with = "de_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    #[serde(rename = "dbInstanceIdentifier")]
    pub database: String,
}

// keep the password out of logs
impl std::fmt::Debug for DbCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

/// Secret stores hand back the raw `SecretString`; callers decode it.
pub trait SecretStore {
    async fn secret_string(&self, secret: &SecretRef) -> Result<String>;
}

/// AWS Secrets Manager, queried in the secret's region.
pub struct AwsSecretStore {
    client: aws_sdk_secretsmanager::Client,
}

impl AwsSecretStore {
    /// Client for `secret.region`, with credentials from the usual AWS provider chain.
    pub async fn connect(secret: &SecretRef) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(secret.region.clone()))
            .load()
            .await;
        Self::from_client(aws_sdk_secretsmanager::Client::new(&config))
    }

    pub fn from_client(client: aws_sdk_secretsmanager::Client) -> Self {
        Self { client }
    }
}

impl SecretStore for AwsSecretStore {
    /// Single `GetSecretValue`, no retry beyond the SDK's own.
    async fn secret_string(&self, secret: &SecretRef) -> Result<String> {
        debug!("GetSecretValue {} in {}", secret.name, secret.region);
        let output = self
            .client
            .get_secret_value()
            .secret_id(&secret.name)
            .send()
            .await
            .map_err(|e| secret.error(DisplayErrorContext(&e)))?;
        secret_string_of(secret, output)
    }
}

fn secret_string_of(secret: &SecretRef, output: GetSecretValueOutput) -> Result<String> {
    output
        .secret_string()
        .map(str::to_string)
        .ok_or_else(|| secret.error("secret has no SecretString (binary secrets are not supported)"))
}

/// Secrets injected into the process environment (or a `.env` file), keyed by
/// the upper-snake-cased secret name.
pub struct EnvSecretStore;

impl EnvSecretStore {
    pub fn var_name(secret_name: &str) -> String {
        secret_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl SecretStore for EnvSecretStore {
    async fn secret_string(&self, secret: &SecretRef) -> Result<String> {
        let key = Self::var_name(&secret.name);
        debug!("reading secret {} from ${}", secret.name, key);
        dotenv::var(&key).map_err(|e| secret.error(format!("${key}: {e}")))
    }
}

/// Secret JSON kept in a file on disk.
pub struct FileSecretStore {
    pub path: PathBuf,
}

impl SecretStore for FileSecretStore {
    async fn secret_string(&self, secret: &SecretRef) -> Result<String> {
        debug!("reading secret {} from {:?}", secret.name, self.path);
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| secret.error(format!("{}: {e}", self.path.display())))
    }
}

/// Fetch and decode the database credentials. No retry.
pub async fn load_credentials(
    store: &impl SecretStore,
    secret: &SecretRef,
) -> Result<DbCredentials> {
    let raw = store.secret_string(secret).await?;
    serde_json::from_str(&raw).map_err(|e| secret.error(e))
}

fn de_port<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Num(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Num(n) => Ok(n),
        Port::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
