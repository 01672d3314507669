use thiserror::Error;

/// Failure taxonomy for the engagement subsystem. `Unauthorized` and
/// `Validation` are caller mistakes and are never retried; `Database`
/// preserves the backend message end-to-end so no failure is swallowed.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Action requires a signed-in, profile-complete user.
    #[error("authentication required")]
    Unauthorized,

    #[error("{0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    #[error("backend error: {0}")]
    Database(#[from] anyhow::Error),
}
