//! # hanabi-deploy: one-shot Cloudflare Worker deployments
//!
//! `hanabi-deploy` publishes user-supplied worker scripts to a Cloudflare
//! account, optionally provisioning a D1 database from user-supplied SQL and
//! binding it to the worker. It exposes a single HTTP route,
//! `POST /deploy/cloudflare`, which runs the whole deployment in one request
//! using the caller's own API token.
//!
//! ## Pipeline
//!
//! Each deployment is a strictly sequential pipeline of remote calls against
//! the Cloudflare v4 API:
//!
//! 1. verify the bearer token is usable
//! 2. confirm the target account exists and is visible to the token
//! 3. derive collision-resistant script and database names (random suffixes)
//! 4. optionally create a D1 database and load the SQL batch into it
//! 5. upload the worker script with its resource bindings
//! 6. enable the workers.dev route and resolve the account subdomain
//!
//! Any step's failure halts the pipeline and maps to a single user-facing
//! error ([`errors::Error`]). Nothing is retried, and remote resources created
//! before a failure are left in place (their ids are logged). The service
//! holds no state of its own; everything lives in the Cloudflare account.
//!
//! The pipeline depends on the platform through the
//! [`platform::WorkersPlatform`] trait, so tests drive it against a scripted
//! mock instead of the real API.

pub mod api;
pub mod config;
pub mod deploy;
pub mod errors;
mod openapi;
pub mod platform;
pub mod telemetry;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use std::sync::Arc;

use axum::{Router, routing::post};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use config::Config;
use openapi::ApiDoc;
use platform::{CloudflareApi, WorkersPlatform};

/// Application state shared across request handlers
#[derive(Clone)]
pub struct AppState {
    /// Remote platform the deployment pipeline runs against
    pub platform: Arc<dyn WorkersPlatform>,
}

/// The deployment service: configuration plus the assembled router.
pub struct Application {
    config: Config,
    router: Router,
}

impl Application {
    /// Create the application with the real Cloudflare API client.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let platform = Arc::new(CloudflareApi::new(&config.platform)?);
        Ok(Self::with_platform(config, platform))
    }

    /// Create the application with an externally supplied platform
    /// implementation. Tests use this to inject a mock.
    pub fn with_platform(config: Config, platform: Arc<dyn WorkersPlatform>) -> Self {
        let state = AppState { platform };

        let router = Router::new()
            .route("/deploy/cloudflare", post(api::handlers::deployments::deploy_worker))
            .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        Self { config, router }
    }

    #[cfg(test)]
    pub(crate) fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("Deployment service listening on http://{bind_addr}");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}
