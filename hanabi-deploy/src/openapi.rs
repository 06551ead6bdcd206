//! OpenAPI documentation for the deployment API.

use utoipa::OpenApi;

use crate::api::models::deployments::{DeployWorkerRequest, DeployWorkerResponse};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "hanabi-deploy",
        description = "Publishes user-supplied workers (and optional D1 databases) to Cloudflare."
    ),
    paths(crate::api::handlers::deployments::deploy_worker),
    components(schemas(DeployWorkerRequest, DeployWorkerResponse)),
    tags((name = "deploy", description = "Worker deployment"))
)]
pub struct ApiDoc;
