//! Cloudflare v4 API client.
//!
//! Implements [`WorkersPlatform`] over HTTP with `reqwest`. Every call goes
//! through the standard Cloudflare response envelope (`success`, `errors`,
//! `result`); non-2xx answers still carry that envelope, so bodies are parsed
//! regardless of status and API-reported errors surface as
//! [`PlatformError::Api`] with their original codes and messages.

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::PlatformConfig;
use crate::platform::{
    Account, ApiMessage, CreatedDatabase, D1QueryResult, PlatformError, Result, ScriptMetadata, WorkersPlatform,
};
use async_trait::async_trait;

/// HTTP client for the Cloudflare v4 API
pub struct CloudflareApi {
    http: reqwest::Client,
    base_url: Url,
}

/// Standard Cloudflare response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TokenVerification {
    status: String,
}

#[derive(Debug, Deserialize)]
struct WorkersSubdomain {
    subdomain: String,
}

impl CloudflareApi {
    pub fn new(config: &PlatformConfig) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url: config.api_base_url.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    /// Parse a response through the envelope, requiring a `result` body.
    async fn read_result<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let envelope = Self::read_envelope::<T>(response).await?;
        envelope
            .result
            .ok_or_else(|| PlatformError::UnexpectedResponse("envelope is missing a result body".to_string()))
    }

    /// Parse a response through the envelope, tolerating a missing `result`.
    async fn read_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<Envelope<T>> {
        let status = response.status();
        let body = response.text().await?;

        let envelope: Envelope<T> = serde_json::from_str(&body)
            .map_err(|e| PlatformError::UnexpectedResponse(format!("HTTP {status}: {e}: {body}")))?;

        if !envelope.success {
            return Err(PlatformError::Api {
                errors: envelope.errors,
            });
        }
        Ok(envelope)
    }
}

#[async_trait]
impl WorkersPlatform for CloudflareApi {
    async fn verify_token(&self, token: &str) -> Result<bool> {
        let response = self
            .http
            .get(self.endpoint("user/tokens/verify"))
            .bearer_auth(token)
            .send()
            .await?;

        let verification: TokenVerification = Self::read_result(response).await?;
        Ok(verification.status == "active")
    }

    async fn get_account(&self, token: &str, account_id: &str) -> Result<Option<Account>> {
        let response = self
            .http
            .get(self.endpoint(&format!("accounts/{account_id}")))
            .bearer_auth(token)
            .send()
            .await?;

        let envelope = Self::read_envelope::<Account>(response).await?;
        Ok(envelope.result)
    }

    async fn create_d1_database(&self, token: &str, account_id: &str, name: &str) -> Result<CreatedDatabase> {
        let response = self
            .http
            .post(self.endpoint(&format!("accounts/{account_id}/d1/database")))
            .bearer_auth(token)
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await?;

        Self::read_result(response).await
    }

    async fn query_d1_database(&self, token: &str, account_id: &str, database_id: &str, sql: &str) -> Result<Vec<D1QueryResult>> {
        let response = self
            .http
            .post(self.endpoint(&format!("accounts/{account_id}/d1/database/{database_id}/query")))
            .bearer_auth(token)
            .json(&serde_json::json!({ "sql": sql }))
            .send()
            .await?;

        Self::read_result(response).await
    }

    async fn upload_worker_script(
        &self,
        token: &str,
        account_id: &str,
        script_name: &str,
        source: &str,
        metadata: &ScriptMetadata,
    ) -> Result<()> {
        let metadata_json = serde_json::to_string(metadata)
            .map_err(|e| PlatformError::UnexpectedResponse(format!("failed to serialize script metadata: {e}")))?;

        let form = Form::new()
            .part(
                "metadata",
                Part::text(metadata_json).file_name("metadata.json").mime_str("application/json")?,
            )
            .part(
                "index.js",
                Part::text(source.to_owned())
                    .file_name("index.js")
                    .mime_str("application/javascript+module")?,
            );

        let response = self
            .http
            .put(self.endpoint(&format!("accounts/{account_id}/workers/scripts/{script_name}")))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;

        Self::read_envelope::<serde_json::Value>(response).await?;
        Ok(())
    }

    async fn enable_workers_subdomain(&self, token: &str, account_id: &str, script_name: &str) -> Result<()> {
        let response = self
            .http
            .post(self.endpoint(&format!("accounts/{account_id}/workers/scripts/{script_name}/subdomain")))
            .bearer_auth(token)
            .json(&serde_json::json!({ "enabled": true }))
            .send()
            .await?;

        let envelope = Self::read_envelope::<serde_json::Value>(response).await?;
        tracing::debug!(script_name, result = ?envelope.result, "enabled workers.dev route");
        Ok(())
    }

    async fn get_workers_subdomain(&self, token: &str, account_id: &str) -> Result<Option<String>> {
        let response = self
            .http
            .get(self.endpoint(&format!("accounts/{account_id}/workers/subdomain")))
            .bearer_auth(token)
            .send()
            .await?;

        let envelope = Self::read_envelope::<WorkersSubdomain>(response).await?;
        Ok(envelope.result.map(|r| r.subdomain))
    }
}
