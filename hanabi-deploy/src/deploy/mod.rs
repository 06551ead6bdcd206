//! Deployment orchestration pipeline.
//!
//! [`deploy`] runs the strictly sequential pipeline against the platform
//! capability interface:
//!
//! verify credential → resolve account → generate names → \[provision
//! database\] → publish script → enable subdomain.
//!
//! Every step's remote call must complete before the next begins. Any step's
//! failure halts the pipeline and maps to exactly one [`Error`] variant; no
//! step is retried and no partial result is returned. A database created
//! before a later failure is left in place on the platform; its id is logged
//! for manual reconciliation.

use rand::Rng;

use crate::errors::{Error, Result};
use crate::platform::{Binding, D1_DATABASE_LIMIT_CODE, ScriptMetadata, WorkersPlatform};

pub mod names;

pub use names::GeneratedNames;

/// Runtime name the database binding is exposed under inside the worker.
pub const DATABASE_BINDING_NAME: &str = "DB";

/// A pre-validated deployment request.
///
/// `base_name` is alphanumeric + hyphen, at most 50 characters; the HTTP
/// surface enforces this before the request reaches the pipeline.
#[derive(Debug, Clone)]
pub struct DeploymentRequest {
    pub account_id: String,
    pub base_name: String,
    pub deploy_sql: bool,
    pub strict_sql_execution: bool,
    pub sql: Option<String>,
    /// Worker module source (JavaScript)
    pub source: String,
    /// Opaque bearer token, scoped to this invocation and never persisted
    pub token: String,
}

/// The outcome of a completed deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentResult {
    pub script_name: String,
    pub database_name: Option<String>,
    pub database_id: Option<String>,
    pub publish_url: String,
}

/// A D1 database provisioned during this deployment
#[derive(Debug, Clone)]
struct ProvisionedDatabase {
    id: String,
    name: String,
}

/// Run the full deployment pipeline.
///
/// The random generator drives suffix generation for resource names; tests
/// inject a seeded [`rand::rngs::StdRng`] to make names deterministic.
pub async fn deploy<R: Rng>(platform: &dyn WorkersPlatform, request: &DeploymentRequest, rng: &mut R) -> Result<DeploymentResult> {
    if request.token.is_empty() {
        return Err(Error::MissingCredential);
    }

    if !credential_is_usable(platform, &request.token).await {
        return Err(Error::Auth);
    }

    resolve_account(platform, request).await?;

    let names = GeneratedNames::generate(&request.base_name, rng);

    let database = match request.sql.as_deref().filter(|sql| request.deploy_sql && !sql.is_empty()) {
        Some(sql) => Some(provision_database(platform, request, &names, sql).await?),
        None => None,
    };

    publish_script(platform, request, &names, database.as_ref()).await?;

    let subdomain = expose_on_subdomain(platform, request, &names, database.as_ref()).await?;

    let publish_url = format!("https://{}.{subdomain}.workers.dev", names.script_name);
    tracing::info!(script_name = %names.script_name, %publish_url, "deployment complete");

    Ok(DeploymentResult {
        script_name: names.script_name,
        database_name: database.as_ref().map(|db| db.name.clone()),
        database_id: database.map(|db| db.id),
        publish_url,
    })
}

/// Check the credential against the platform. Transport and platform errors
/// are treated as "not usable"; nothing propagates past this boundary.
async fn credential_is_usable(platform: &dyn WorkersPlatform, token: &str) -> bool {
    match platform.verify_token(token).await {
        Ok(usable) => usable,
        Err(e) => {
            tracing::error!("token verification failed: {e}");
            false
        }
    }
}

/// Confirm the target account exists and is visible to the credential.
async fn resolve_account(platform: &dyn WorkersPlatform, request: &DeploymentRequest) -> Result<()> {
    match platform.get_account(&request.token, &request.account_id).await {
        Ok(Some(_)) => Ok(()),
        Ok(None) => {
            tracing::warn!(account_id = %request.account_id, "account lookup returned no account");
            Err(Error::Account)
        }
        Err(e) => {
            tracing::error!(account_id = %request.account_id, "account lookup failed: {e}");
            Err(Error::Account)
        }
    }
}

/// Create the D1 database and load the SQL batch into it.
///
/// Quota failures (code 7406) surface Cloudflare's original message verbatim.
/// Under strict execution any failing statement aborts the deployment; the
/// database itself is not deleted.
async fn provision_database(
    platform: &dyn WorkersPlatform,
    request: &DeploymentRequest,
    names: &GeneratedNames,
    sql: &str,
) -> Result<ProvisionedDatabase> {
    let created = platform
        .create_d1_database(&request.token, &request.account_id, &names.database_name)
        .await
        .map_err(|e| {
            tracing::error!(database_name = %names.database_name, "failed to create d1 database: {e}");
            match e.message_for_code(D1_DATABASE_LIMIT_CODE) {
                Some(message) => Error::Quota {
                    message: message.to_string(),
                },
                None => Error::Provisioning,
            }
        })?;

    let database = ProvisionedDatabase {
        id: created.uuid,
        name: names.database_name.clone(),
    };

    let results = match platform
        .query_d1_database(&request.token, &request.account_id, &database.id, sql)
        .await
    {
        Ok(results) => results,
        Err(e) => {
            tracing::error!(database_id = %database.id, "failed to execute SQL batch: {e}");
            log_orphaned_database(&database);
            return Err(Error::SqlExecution);
        }
    };

    let failed = results.iter().filter(|r| !r.success).count();
    if failed > 0 {
        if request.strict_sql_execution {
            tracing::error!(database_id = %database.id, failed, "SQL batch reported failing statements under strict execution");
            log_orphaned_database(&database);
            return Err(Error::SqlExecution);
        }
        tracing::warn!(database_id = %database.id, failed, "ignoring failing SQL statements (strict execution disabled)");
    }

    Ok(database)
}

/// Upload the worker script, binding the database (if any) under
/// [`DATABASE_BINDING_NAME`].
async fn publish_script(
    platform: &dyn WorkersPlatform,
    request: &DeploymentRequest,
    names: &GeneratedNames,
    database: Option<&ProvisionedDatabase>,
) -> Result<()> {
    let bindings = database
        .map(|db| {
            vec![Binding::D1 {
                name: DATABASE_BINDING_NAME.to_string(),
                database_name: db.name.clone(),
                id: db.id.clone(),
            }]
        })
        .unwrap_or_default();

    let metadata = ScriptMetadata::module_worker(bindings);

    platform
        .upload_worker_script(&request.token, &request.account_id, &names.script_name, &request.source, &metadata)
        .await
        .map_err(|e| {
            tracing::error!(script_name = %names.script_name, "failed to upload worker script: {e}");
            if let Some(db) = database {
                log_orphaned_database(db);
            }
            Error::Publish
        })
}

/// Enable the workers.dev route and resolve the account subdomain.
///
/// Route enablement is fire-and-forget: its failure is logged but does not
/// abort the pipeline. A missing subdomain is terminal, since no publish URL
/// can be constructed without it.
async fn expose_on_subdomain(
    platform: &dyn WorkersPlatform,
    request: &DeploymentRequest,
    names: &GeneratedNames,
    database: Option<&ProvisionedDatabase>,
) -> Result<String> {
    if let Err(e) = platform
        .enable_workers_subdomain(&request.token, &request.account_id, &names.script_name)
        .await
    {
        tracing::warn!(script_name = %names.script_name, "failed to enable workers.dev route: {e}");
    }

    let subdomain = match platform.get_workers_subdomain(&request.token, &request.account_id).await {
        Ok(Some(subdomain)) if !subdomain.is_empty() => subdomain,
        Ok(_) => {
            tracing::error!(account_id = %request.account_id, "account has no workers.dev subdomain");
            if let Some(db) = database {
                log_orphaned_database(db);
            }
            return Err(Error::Subdomain);
        }
        Err(e) => {
            tracing::error!(account_id = %request.account_id, "failed to fetch workers.dev subdomain: {e}");
            if let Some(db) = database {
                log_orphaned_database(db);
            }
            return Err(Error::Subdomain);
        }
    };

    Ok(subdomain)
}

/// The pipeline never deletes a database it created, even when a later step
/// fails. Record the id so the resource can be reconciled manually.
fn log_orphaned_database(database: &ProvisionedDatabase) {
    tracing::warn!(
        database_id = %database.id,
        database_name = %database.name,
        "deployment failed after database creation; the database is left in place",
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{ApiMessage, D1QueryResult};
    use crate::test_utils::{MockPlatform, PlatformCall};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn request() -> DeploymentRequest {
        DeploymentRequest {
            account_id: "acc1".to_string(),
            base_name: "demo".to_string(),
            deploy_sql: false,
            strict_sql_execution: true,
            sql: None,
            source: "export default {}".to_string(),
            token: "tok-1".to_string(),
        }
    }

    fn sql_request() -> DeploymentRequest {
        DeploymentRequest {
            deploy_sql: true,
            sql: Some("CREATE TABLE t(id INT)".to_string()),
            ..request()
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[tokio::test]
    async fn deploy_without_sql_never_touches_d1() {
        let platform = MockPlatform::default();
        let result = deploy(&platform, &request(), &mut rng()).await.unwrap();

        assert!(result.script_name.starts_with("demo-"));
        assert_eq!(result.database_name, None);
        assert_eq!(result.database_id, None);
        assert_eq!(result.publish_url, format!("https://{}.example.workers.dev", result.script_name));

        let calls = platform.calls();
        assert!(!calls.iter().any(|c| matches!(c, PlatformCall::CreateDatabase(_))));
        assert!(!calls.iter().any(|c| matches!(c, PlatformCall::QueryDatabase { .. })));
        assert!(matches!(
            calls.as_slice(),
            [
                PlatformCall::VerifyToken,
                PlatformCall::GetAccount(_),
                PlatformCall::UploadScript { d1_binding: None, .. },
                PlatformCall::EnableSubdomain(_),
                PlatformCall::GetSubdomain,
            ]
        ));
    }

    #[tokio::test]
    async fn deploy_with_sql_binds_the_created_database() {
        let platform = MockPlatform::default();
        let result = deploy(&platform, &sql_request(), &mut rng()).await.unwrap();

        assert_eq!(result.database_id.as_deref(), Some("11aa-22bb"));
        let database_name = result.database_name.expect("database should be provisioned");
        assert!(database_name.starts_with("demo-d1-"));

        // The name bound into the script metadata matches the create call.
        let calls = platform.calls();
        let created_name = calls
            .iter()
            .find_map(|c| match c {
                PlatformCall::CreateDatabase(name) => Some(name.clone()),
                _ => None,
            })
            .expect("create call missing");
        let bound = calls
            .iter()
            .find_map(|c| match c {
                PlatformCall::UploadScript { d1_binding, .. } => d1_binding.clone(),
                _ => None,
            })
            .expect("upload should carry a binding");

        assert_eq!(created_name, database_name);
        assert_eq!(bound, (database_name, "11aa-22bb".to_string()));
    }

    #[tokio::test]
    async fn empty_sql_skips_provisioning() {
        let platform = MockPlatform::default();
        let request = DeploymentRequest {
            sql: Some(String::new()),
            ..sql_request()
        };

        let result = deploy(&platform, &request, &mut rng()).await.unwrap();
        assert_eq!(result.database_id, None);
        assert!(!platform.calls().iter().any(|c| matches!(c, PlatformCall::CreateDatabase(_))));
    }

    #[tokio::test]
    async fn missing_token_fails_before_any_remote_call() {
        let platform = MockPlatform::default();
        let request = DeploymentRequest {
            token: String::new(),
            ..request()
        };

        let error = deploy(&platform, &request, &mut rng()).await.unwrap_err();
        assert!(matches!(error, Error::MissingCredential));
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn unusable_token_stops_the_pipeline() {
        let platform = MockPlatform {
            token_usable: false,
            ..Default::default()
        };

        let error = deploy(&platform, &request(), &mut rng()).await.unwrap_err();
        assert!(matches!(error, Error::Auth));
        assert_eq!(platform.calls(), vec![PlatformCall::VerifyToken]);
    }

    #[tokio::test]
    async fn verification_errors_are_treated_as_unusable() {
        let platform = MockPlatform {
            verify_error: true,
            ..Default::default()
        };

        let error = deploy(&platform, &request(), &mut rng()).await.unwrap_err();
        assert!(matches!(error, Error::Auth));
        assert_eq!(platform.calls(), vec![PlatformCall::VerifyToken]);
    }

    #[tokio::test]
    async fn missing_account_stops_the_pipeline() {
        let platform = MockPlatform {
            account_found: false,
            ..Default::default()
        };

        let error = deploy(&platform, &request(), &mut rng()).await.unwrap_err();
        assert!(matches!(error, Error::Account));
        assert_eq!(
            platform.calls(),
            vec![PlatformCall::VerifyToken, PlatformCall::GetAccount("acc1".to_string())]
        );
    }

    #[tokio::test]
    async fn account_lookup_errors_stop_the_pipeline() {
        let platform = MockPlatform {
            account_error: true,
            ..Default::default()
        };

        let error = deploy(&platform, &sql_request(), &mut rng()).await.unwrap_err();
        assert!(matches!(error, Error::Account));
        assert_eq!(
            platform.calls(),
            vec![PlatformCall::VerifyToken, PlatformCall::GetAccount("acc1".to_string())]
        );
    }

    #[tokio::test]
    async fn quota_errors_surface_the_platform_message_verbatim() {
        let platform = MockPlatform {
            create_database_errors: Some(vec![ApiMessage {
                code: D1_DATABASE_LIMIT_CODE,
                message: "You have reached your D1 database limit (10)".to_string(),
            }]),
            ..Default::default()
        };

        let error = deploy(&platform, &sql_request(), &mut rng()).await.unwrap_err();
        match error {
            Error::Quota { message } => assert_eq!(message, "You have reached your D1 database limit (10)"),
            other => panic!("expected quota error, got {other:?}"),
        }
        assert!(!platform.calls().iter().any(|c| matches!(c, PlatformCall::UploadScript { .. })));
    }

    #[tokio::test]
    async fn generic_creation_failures_are_provisioning_errors() {
        let platform = MockPlatform {
            create_database_errors: Some(vec![ApiMessage {
                code: 7500,
                message: "internal error".to_string(),
            }]),
            ..Default::default()
        };

        let error = deploy(&platform, &sql_request(), &mut rng()).await.unwrap_err();
        assert!(matches!(error, Error::Provisioning));
    }

    #[tokio::test]
    async fn strict_sql_failure_aborts_before_publish() {
        let platform = MockPlatform {
            query_results: vec![D1QueryResult { success: true }, D1QueryResult { success: false }],
            ..Default::default()
        };

        let error = deploy(&platform, &sql_request(), &mut rng()).await.unwrap_err();
        assert!(matches!(error, Error::SqlExecution));
        assert!(!platform.calls().iter().any(|c| matches!(c, PlatformCall::UploadScript { .. })));
    }

    #[tokio::test]
    async fn lenient_sql_failures_still_reach_publish() {
        let platform = MockPlatform {
            query_results: vec![D1QueryResult { success: false }],
            ..Default::default()
        };
        let request = DeploymentRequest {
            strict_sql_execution: false,
            ..sql_request()
        };

        let result = deploy(&platform, &request, &mut rng()).await.unwrap();
        assert!(result.database_id.is_some());
        assert!(platform.calls().iter().any(|c| matches!(c, PlatformCall::UploadScript { .. })));
    }

    #[tokio::test]
    async fn query_transport_errors_fail_regardless_of_strictness() {
        let platform = MockPlatform {
            query_error: true,
            ..Default::default()
        };
        let request = DeploymentRequest {
            strict_sql_execution: false,
            ..sql_request()
        };

        let error = deploy(&platform, &request, &mut rng()).await.unwrap_err();
        assert!(matches!(error, Error::SqlExecution));
    }

    #[tokio::test]
    async fn publish_failure_stops_before_subdomain() {
        let platform = MockPlatform {
            publish_error: true,
            ..Default::default()
        };

        let error = deploy(&platform, &request(), &mut rng()).await.unwrap_err();
        assert!(matches!(error, Error::Publish));
        assert!(!platform.calls().iter().any(|c| matches!(c, PlatformCall::EnableSubdomain(_))));
    }

    #[tokio::test]
    async fn route_enable_failure_is_tolerated() {
        let platform = MockPlatform {
            subdomain_route_error: true,
            ..Default::default()
        };

        let result = deploy(&platform, &request(), &mut rng()).await.unwrap();
        assert!(result.publish_url.ends_with(".example.workers.dev"));
    }

    #[tokio::test]
    async fn missing_subdomain_is_terminal() {
        let platform = MockPlatform {
            subdomain: None,
            ..Default::default()
        };

        let error = deploy(&platform, &request(), &mut rng()).await.unwrap_err();
        assert!(matches!(error, Error::Subdomain));
    }
}
