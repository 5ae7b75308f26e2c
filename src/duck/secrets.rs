//! Credential registration as engine secrets.
//!
//! Secrets are created with `CREATE SECRET IF NOT EXISTS`, so registering the
//! same credentials twice on one connection is a no-op.

use tracing::info;

use crate::error::DrDuckError;

use super::query::quote_literal;
use super::Session;

pub const HF_SECRET_NAME: &str = "hf_token";
pub const S3_SECRET_NAME: &str = "s3_secret";
pub const DEFAULT_S3_REGION: &str = "us-east-1";

/// Object storage credentials for the engine's S3 secret.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct S3Credentials {
    pub key_id: String,
    pub secret: String,
    /// Defaults to `us-east-1`.
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores (MinIO, R2, ...).
    pub endpoint: Option<String>,
    /// `path` or `vhost`.
    pub url_style: Option<String>,
}

impl std::fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Credentials")
            .field("key_id", &self.key_id)
            .field("secret", &"<redacted>")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("url_style", &self.url_style)
            .finish()
    }
}

/// `CREATE SECRET` statement for the Hugging Face token.
pub fn hf_secret_sql(token: &str) -> Result<String, DrDuckError> {
    if token.trim().is_empty() {
        return Err(DrDuckError::Config("HF_TOKEN is empty".to_string()));
    }
    Ok(format!(
        "CREATE SECRET IF NOT EXISTS {HF_SECRET_NAME} (TYPE HUGGINGFACE, TOKEN {})",
        quote_literal(token)
    ))
}

/// `CREATE SECRET` statement for S3 credentials.
pub fn s3_secret_sql(credentials: &S3Credentials) -> Result<String, DrDuckError> {
    if credentials.key_id.trim().is_empty() {
        return Err(DrDuckError::Config(
            "AWS_ACCESS_KEY_ID not found in environment".to_string(),
        ));
    }
    if credentials.secret.trim().is_empty() {
        return Err(DrDuckError::Config(
            "AWS_SECRET_ACCESS_KEY not found in environment".to_string(),
        ));
    }

    let region = credentials.region.as_deref().unwrap_or(DEFAULT_S3_REGION);
    let mut parts = vec![
        "TYPE S3".to_string(),
        format!("KEY_ID {}", quote_literal(&credentials.key_id)),
        format!("SECRET {}", quote_literal(&credentials.secret)),
        format!("REGION {}", quote_literal(region)),
    ];
    if let Some(endpoint) = credentials.endpoint.as_deref() {
        parts.push(format!("ENDPOINT {}", quote_literal(endpoint)));
    }
    if let Some(url_style) = credentials.url_style.as_deref() {
        if !matches!(url_style, "path" | "vhost") {
            return Err(DrDuckError::Config(format!(
                "S3 url style must be 'path' or 'vhost', got '{url_style}'"
            )));
        }
        parts.push(format!("URL_STYLE {}", quote_literal(url_style)));
    }

    Ok(format!(
        "CREATE SECRET IF NOT EXISTS {S3_SECRET_NAME} ({})",
        parts.join(", ")
    ))
}

pub fn setup_hf_secret(session: &Session, token: &str) -> Result<(), DrDuckError> {
    let sql = hf_secret_sql(token)?;
    session
        .connection()
        .execute_batch(&sql)
        .map_err(|source| DrDuckError::query("CREATE SECRET hf_token (...)", source))?;
    info!(secret = HF_SECRET_NAME, "registered hub secret");
    Ok(())
}

pub fn setup_s3_secret(session: &Session, credentials: &S3Credentials) -> Result<(), DrDuckError> {
    let sql = s3_secret_sql(credentials)?;
    session
        .connection()
        .execute_batch(&sql)
        .map_err(|source| DrDuckError::query("CREATE SECRET s3_secret (...)", source))?;
    info!(
        secret = S3_SECRET_NAME,
        region = credentials.region.as_deref().unwrap_or(DEFAULT_S3_REGION),
        "registered object storage secret"
    );
    Ok(())
}
