//! Cloudflare platform abstraction layer.
//!
//! This module defines the [`WorkersPlatform`] trait, the set of remote
//! capabilities the deployment pipeline consumes: token verification, account
//! lookup, D1 database provisioning, worker script upload, and workers.dev
//! subdomain management. The orchestrator depends on this trait rather than a
//! concrete client, so it can be swapped for a test double without touching
//! orchestration logic.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod cloudflare;

pub use cloudflare::CloudflareApi;

/// Result type for platform operations
pub type Result<T> = std::result::Result<T, PlatformError>;

/// Cloudflare error code reported when an account has reached its D1 database
/// limit. The pipeline surfaces the accompanying message verbatim.
pub const D1_DATABASE_LIMIT_CODE: i64 = 7406;

/// Errors that can occur while talking to the platform
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// The API answered but reported one or more errors in its envelope.
    #[error("cloudflare api error: {}", format_api_messages(.errors))]
    Api { errors: Vec<ApiMessage> },

    /// The request never completed (connection, TLS, timeout, decode).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with something we could not interpret.
    #[error("unexpected platform response: {0}")]
    UnexpectedResponse(String),
}

impl PlatformError {
    /// Returns the message of the API error with the given code, if present.
    pub fn message_for_code(&self, code: i64) -> Option<&str> {
        match self {
            PlatformError::Api { errors } => errors.iter().find(|e| e.code == code).map(|e| e.message.as_str()),
            _ => None,
        }
    }
}

fn format_api_messages(errors: &[ApiMessage]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.code, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// A single `{code, message}` entry from the Cloudflare response envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMessage {
    pub code: i64,
    pub message: String,
}

/// A Cloudflare account as returned by the account lookup
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// A freshly created D1 database
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedDatabase {
    /// Remote-assigned database identifier
    pub uuid: String,
    /// The name the database was created under
    pub name: String,
}

/// Per-statement outcome of a D1 SQL batch execution. Everything except the
/// success flag is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct D1QueryResult {
    pub success: bool,
}

/// Upload metadata for a worker script.
///
/// Serialized as the `metadata.json` part of the script upload. The shape must
/// match Cloudflare's script-settings contract exactly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptMetadata {
    pub bindings: Vec<Binding>,
    pub tags: Vec<String>,
    pub main_module: String,
    pub placement: Placement,
}

/// Classification tag attached to every script published by this service.
pub const SCRIPT_TAG: &str = "hanabi";

/// Entry module name declared in the upload metadata.
pub const MAIN_MODULE: &str = "index.js";

impl ScriptMetadata {
    /// Metadata for an ES-module worker with the given resource bindings.
    pub fn module_worker(bindings: Vec<Binding>) -> Self {
        Self {
            bindings,
            tags: vec![SCRIPT_TAG.to_string()],
            main_module: MAIN_MODULE.to_string(),
            placement: Placement {
                mode: PlacementMode::Smart,
            },
        }
    }

    /// The D1 binding declared in this metadata, if any, as
    /// `(database_name, id)`.
    pub fn d1_binding(&self) -> Option<(&str, &str)> {
        self.bindings
            .first()
            .map(|Binding::D1 { database_name, id, .. }| (database_name.as_str(), id.as_str()))
    }
}

/// A declared attachment of a remote resource to a script
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Binding {
    D1 {
        /// Name the resource is exposed under at runtime
        name: String,
        database_name: String,
        /// Remote-assigned database identifier
        id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placement {
    pub mode: PlacementMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementMode {
    Smart,
}

/// Remote platform capability interface consumed by the deployment pipeline.
///
/// Every operation is a single remote call; implementations do not retry.
#[async_trait]
pub trait WorkersPlatform: Send + Sync {
    /// Check whether the bearer token is usable against the API.
    async fn verify_token(&self, token: &str) -> Result<bool>;

    /// Look up an account by id. Returns `None` if the API reports success but
    /// no account body.
    async fn get_account(&self, token: &str, account_id: &str) -> Result<Option<Account>>;

    /// Create a D1 database under the account with the given name.
    async fn create_d1_database(&self, token: &str, account_id: &str, name: &str) -> Result<CreatedDatabase>;

    /// Execute a SQL batch against a D1 database, returning per-statement
    /// outcomes.
    async fn query_d1_database(&self, token: &str, account_id: &str, database_id: &str, sql: &str) -> Result<Vec<D1QueryResult>>;

    /// Publish (or overwrite) a worker script with the given source and
    /// metadata.
    async fn upload_worker_script(
        &self,
        token: &str,
        account_id: &str,
        script_name: &str,
        source: &str,
        metadata: &ScriptMetadata,
    ) -> Result<()>;

    /// Enable the workers.dev route for a published script.
    async fn enable_workers_subdomain(&self, token: &str, account_id: &str, script_name: &str) -> Result<()>;

    /// Fetch the account-level workers.dev subdomain, if one is configured.
    async fn get_workers_subdomain(&self, token: &str, account_id: &str) -> Result<Option<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_serializes_to_upload_contract() {
        let metadata = ScriptMetadata::module_worker(vec![Binding::D1 {
            name: "DB".to_string(),
            database_name: "demo-d1-abc12".to_string(),
            id: "xxxx-uuid".to_string(),
        }]);

        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "bindings": [{
                    "type": "d1",
                    "name": "DB",
                    "database_name": "demo-d1-abc12",
                    "id": "xxxx-uuid",
                }],
                "tags": ["hanabi"],
                "main_module": "index.js",
                "placement": { "mode": "smart" },
            })
        );
    }

    #[test]
    fn metadata_without_database_has_empty_bindings() {
        let metadata = ScriptMetadata::module_worker(Vec::new());
        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["bindings"], serde_json::json!([]));
        assert_eq!(metadata.d1_binding(), None);
    }

    #[test]
    fn quota_message_is_recoverable_by_code() {
        let error = PlatformError::Api {
            errors: vec![
                ApiMessage {
                    code: 10000,
                    message: "something else".to_string(),
                },
                ApiMessage {
                    code: D1_DATABASE_LIMIT_CODE,
                    message: "You have reached your D1 database limit".to_string(),
                },
            ],
        };

        assert_eq!(
            error.message_for_code(D1_DATABASE_LIMIT_CODE),
            Some("You have reached your D1 database limit")
        );
        assert_eq!(error.message_for_code(9999), None);
    }
}
