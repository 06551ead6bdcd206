use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

/// Deployment pipeline errors surfaced to the caller.
///
/// Each variant corresponds to exactly one pipeline step. Remote-call failures
/// are caught at their originating step, logged there, and converted into one
/// of these before leaving the orchestrator; raw transport errors never reach
/// the caller.
#[derive(ThisError, Debug)]
pub enum Error {
    /// No bearer token was supplied with the request.
    #[error("Token not found")]
    MissingCredential,

    /// The Cloudflare API token could not be verified.
    #[error("Token verification failed")]
    Auth,

    /// The targeted account does not exist or is not visible to the token.
    #[error("Account not found")]
    Account,

    /// D1 database creation failed for a reason other than the account quota.
    #[error("Failed to create d1 database")]
    Provisioning,

    /// D1 database creation hit the account limit. Cloudflare's original
    /// message is passed through verbatim so the caller sees the real quota.
    #[error("{message}")]
    Quota { message: String },

    /// The SQL batch failed under strict execution, or the query call itself
    /// failed.
    #[error("Failed to execute SQL code")]
    SqlExecution,

    /// Uploading the worker script failed.
    #[error("Failed to deploy worker")]
    Publish,

    /// The account's workers.dev subdomain could not be resolved.
    #[error("Failed to enable subdomain")]
    Subdomain,

    /// Invalid request data at the HTTP surface.
    #[error("{message}")]
    BadRequest { message: String },
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::MissingCredential => StatusCode::NOT_FOUND,
            Error::Auth
            | Error::Account
            | Error::Provisioning
            | Error::Quota { .. }
            | Error::SqlExecution
            | Error::Publish
            | Error::Subdomain
            | Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Full details were already logged at the failing step; here we only
        // record the outcome at a level matching its severity.
        match &self {
            Error::BadRequest { .. } | Error::MissingCredential => {
                tracing::debug!("Client error: {}", self);
            }
            Error::Auth | Error::Account => {
                tracing::info!("Authorization error: {}", self);
            }
            _ => {
                tracing::warn!("Deployment error: {}", self);
            }
        }

        (self.status_code(), self.to_string()).into_response()
    }
}

/// Type alias for deployment operation results
pub type Result<T> = std::result::Result<T, Error>;
