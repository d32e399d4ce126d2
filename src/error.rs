/// Domain errors shared by the stores, the token issuer and the liveness
/// evaluator. Every variant is terminal for the request that raised it.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Malformed or insufficient input.
    #[error("{0}")]
    Validation(String),

    #[error("username {0:?} is already registered")]
    DuplicateUsername(String),

    /// Unknown username or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Missing, malformed, badly signed or expired bearer token.
    #[error("invalid token")]
    InvalidToken,

    #[error("{0}")]
    NotFound(String),

    #[error("unknown sensor field {0:?}")]
    UnknownField(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}
