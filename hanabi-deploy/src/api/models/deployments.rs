use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::deploy::{DeploymentRequest, DeploymentResult};
use crate::errors::Error;

/// Maximum length of the user-supplied base name.
pub const MAX_NAME_LENGTH: usize = 50;

/// Request payload for deploying a worker.
///
/// Field names follow the playground's JSON contract (camelCase).
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeployWorkerRequest {
    /// Cloudflare account to deploy into
    pub account_id: String,
    /// Base name for the worker and database (alphanumeric + hyphen, max 50
    /// characters); random suffixes are appended server-side
    pub name: String,
    /// Whether to provision a D1 database and load `sql` into it
    #[serde(default, rename = "isDeploySql")]
    pub deploy_sql: bool,
    /// Abort the deployment when any SQL statement fails
    #[serde(default = "default_strict")]
    pub strict_sql_execution: bool,
    /// SQL batch to load into the provisioned database
    #[serde(default)]
    pub sql: Option<String>,
    /// Worker module source (an ES module with a default export)
    #[serde(rename = "javascript")]
    pub script: String,
    /// Cloudflare API bearer token; used for this deployment only
    pub token: String,
}

fn default_strict() -> bool {
    true
}

impl DeployWorkerRequest {
    /// Validate the request shape before it reaches the pipeline.
    pub fn validate(&self) -> Result<(), Error> {
        if self.name.is_empty() || !self.name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(Error::BadRequest {
                message: "Only alphanumeric and hyphen allowed".to_string(),
            });
        }
        if self.name.len() > MAX_NAME_LENGTH {
            return Err(Error::BadRequest {
                message: "name is too long".to_string(),
            });
        }
        if self.account_id.is_empty() {
            return Err(Error::BadRequest {
                message: "accountId is required".to_string(),
            });
        }
        Ok(())
    }
}

impl From<DeployWorkerRequest> for DeploymentRequest {
    fn from(request: DeployWorkerRequest) -> Self {
        DeploymentRequest {
            account_id: request.account_id,
            base_name: request.name,
            deploy_sql: request.deploy_sql,
            strict_sql_execution: request.strict_sql_execution,
            sql: request.sql,
            source: request.script,
            token: request.token,
        }
    }
}

/// Response payload for a completed deployment
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeployWorkerResponse {
    /// Name the worker was published under
    pub worker_name: String,
    /// Name of the provisioned D1 database, when one was created
    pub d1_name: Option<String>,
    /// Remote id of the provisioned D1 database, when one was created
    pub d1_id: Option<String>,
    /// Public URL the worker is reachable at
    pub publish_url: String,
}

impl From<DeploymentResult> for DeployWorkerResponse {
    fn from(result: DeploymentResult) -> Self {
        Self {
            worker_name: result.script_name,
            d1_name: result.database_name,
            d1_id: result.database_id,
            publish_url: result.publish_url,
        }
    }
}
