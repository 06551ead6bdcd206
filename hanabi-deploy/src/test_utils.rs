//! Test utilities (available with the `test-utils` feature).
//!
//! [`MockPlatform`] is a scripted stand-in for the Cloudflare API: each
//! operation's outcome is configured up front through plain fields, and every
//! call is recorded so tests can assert ordering and absence.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::platform::{
    Account, ApiMessage, CreatedDatabase, D1QueryResult, PlatformError, Result, ScriptMetadata, WorkersPlatform,
};

/// One recorded call against the mock platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    VerifyToken,
    GetAccount(String),
    CreateDatabase(String),
    QueryDatabase {
        database_id: String,
        sql: String,
    },
    UploadScript {
        script_name: String,
        /// `(database_name, id)` of the D1 binding, when present
        d1_binding: Option<(String, String)>,
    },
    EnableSubdomain(String),
    GetSubdomain,
}

/// Scripted [`WorkersPlatform`] double.
///
/// The defaults describe a fully healthy platform: an active token, an
/// existing account, a database that provisions as `11aa-22bb`, SQL that
/// executes cleanly, and an `example` workers.dev subdomain. Tests override
/// individual fields with struct-update syntax.
pub struct MockPlatform {
    pub token_usable: bool,
    /// Fail the verification call itself instead of answering it
    pub verify_error: bool,
    pub account_found: bool,
    pub account_error: bool,
    /// When set, database creation fails with these API errors
    pub create_database_errors: Option<Vec<ApiMessage>>,
    /// Remote id assigned to a successfully created database
    pub database_id: String,
    pub query_error: bool,
    pub query_results: Vec<D1QueryResult>,
    pub publish_error: bool,
    pub subdomain_route_error: bool,
    pub subdomain: Option<String>,
    /// Calls recorded so far; read through [`MockPlatform::calls`]
    pub recorded: Mutex<Vec<PlatformCall>>,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self {
            token_usable: true,
            verify_error: false,
            account_found: true,
            account_error: false,
            create_database_errors: None,
            database_id: "11aa-22bb".to_string(),
            query_error: false,
            query_results: vec![D1QueryResult { success: true }],
            publish_error: false,
            subdomain_route_error: false,
            subdomain: Some("example".to_string()),
            recorded: Mutex::new(Vec::new()),
        }
    }
}

impl MockPlatform {
    /// All calls made so far, in order.
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.recorded.lock().unwrap().clone()
    }

    fn record(&self, call: PlatformCall) {
        self.recorded.lock().unwrap().push(call);
    }

    fn failure(context: &str) -> PlatformError {
        PlatformError::UnexpectedResponse(format!("mock failure: {context}"))
    }
}

#[async_trait]
impl WorkersPlatform for MockPlatform {
    async fn verify_token(&self, _token: &str) -> Result<bool> {
        self.record(PlatformCall::VerifyToken);
        if self.verify_error {
            return Err(Self::failure("verify_token"));
        }
        Ok(self.token_usable)
    }

    async fn get_account(&self, _token: &str, account_id: &str) -> Result<Option<Account>> {
        self.record(PlatformCall::GetAccount(account_id.to_string()));
        if self.account_error {
            return Err(Self::failure("get_account"));
        }
        Ok(self.account_found.then(|| Account {
            id: account_id.to_string(),
            name: "Test Account".to_string(),
        }))
    }

    async fn create_d1_database(&self, _token: &str, _account_id: &str, name: &str) -> Result<CreatedDatabase> {
        self.record(PlatformCall::CreateDatabase(name.to_string()));
        if let Some(errors) = &self.create_database_errors {
            return Err(PlatformError::Api {
                errors: errors.clone(),
            });
        }
        Ok(CreatedDatabase {
            uuid: self.database_id.clone(),
            name: name.to_string(),
        })
    }

    async fn query_d1_database(&self, _token: &str, _account_id: &str, database_id: &str, sql: &str) -> Result<Vec<D1QueryResult>> {
        self.record(PlatformCall::QueryDatabase {
            database_id: database_id.to_string(),
            sql: sql.to_string(),
        });
        if self.query_error {
            return Err(Self::failure("query_d1_database"));
        }
        Ok(self.query_results.clone())
    }

    async fn upload_worker_script(
        &self,
        _token: &str,
        _account_id: &str,
        script_name: &str,
        _source: &str,
        metadata: &ScriptMetadata,
    ) -> Result<()> {
        self.record(PlatformCall::UploadScript {
            script_name: script_name.to_string(),
            d1_binding: metadata.d1_binding().map(|(name, id)| (name.to_string(), id.to_string())),
        });
        if self.publish_error {
            return Err(Self::failure("upload_worker_script"));
        }
        Ok(())
    }

    async fn enable_workers_subdomain(&self, _token: &str, _account_id: &str, script_name: &str) -> Result<()> {
        self.record(PlatformCall::EnableSubdomain(script_name.to_string()));
        if self.subdomain_route_error {
            return Err(Self::failure("enable_workers_subdomain"));
        }
        Ok(())
    }

    async fn get_workers_subdomain(&self, _token: &str, _account_id: &str) -> Result<Option<String>> {
        self.record(PlatformCall::GetSubdomain);
        Ok(self.subdomain.clone())
    }
}
