use axum::{extract::State, response::Json};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::{
    AppState,
    api::models::deployments::{DeployWorkerRequest, DeployWorkerResponse},
    deploy,
    errors::Result,
};

#[utoipa::path(
    post,
    path = "/deploy/cloudflare",
    tag = "deploy",
    summary = "Deploy a worker",
    description = "Publish the supplied worker script to the account, optionally provisioning a D1 \
                   database from the supplied SQL and binding it as `DB`. The worker is exposed on \
                   the account's workers.dev subdomain.",
    request_body = DeployWorkerRequest,
    responses(
        (status = 200, description = "Deployment completed", body = DeployWorkerResponse),
        (status = 400, description = "Invalid request, or a deployment step failed"),
        (status = 404, description = "No API token supplied"),
    )
)]
#[tracing::instrument(skip_all, fields(account_id = %request.account_id, name = %request.name))]
pub async fn deploy_worker(State(state): State<AppState>, Json(request): Json<DeployWorkerRequest>) -> Result<Json<DeployWorkerResponse>> {
    request.validate()?;

    let mut rng = StdRng::from_os_rng();
    let result = deploy::deploy(state.platform.as_ref(), &request.into(), &mut rng).await?;

    Ok(Json(result.into()))
}
