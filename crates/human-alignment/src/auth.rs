//! OAuth access tokens for Google Cloud APIs

use crate::command::run_checked;
use crate::error::AlignmentError;
use crate::Result;
use async_trait::async_trait;

/// Supplies bearer tokens for platform requests
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// A fixed token, typically from `GOOGLE_OAUTH_ACCESS_TOKEN`
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: &str) -> Self {
        StaticToken(token.to_string())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(<redacted>)")
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Tokens from `gcloud auth print-access-token`
#[derive(Debug, Clone, Default)]
pub struct GcloudToken;

#[async_trait]
impl TokenSource for GcloudToken {
    async fn access_token(&self) -> Result<String> {
        let output = run_checked("gcloud", &["auth", "print-access-token"])
            .await
            .map_err(|e| AlignmentError::Auth(e.to_string()))?;
        let token = output.stdout_lossy().trim().to_string();
        if token.is_empty() {
            return Err(AlignmentError::Auth("gcloud returned an empty token".into()));
        }
        Ok(token)
    }
}

/// Prefer `GOOGLE_OAUTH_ACCESS_TOKEN`, falling back to the gcloud CLI.
pub fn token_source_from_env() -> Box<dyn TokenSource> {
    match std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN") {
        Ok(token) if !token.is_empty() => Box::new(StaticToken::new(&token)),
        _ => Box::new(GcloudToken),
    }
}
