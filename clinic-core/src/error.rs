use thiserror::Error;

/// Why a caller could not be identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("Authentication token is required")]
    MissingToken,
    #[error("Token has expired. Please login again.")]
    TokenExpired,
    #[error("Invalid authentication token")]
    InvalidToken,
    #[error("User not found")]
    UnknownUser,
    #[error("Incorrect password")]
    BadCredentials,
    #[error("Please login with your external identity provider")]
    ExternalAuthRequired,
}

#[derive(Debug, Error)]
pub enum ClinicError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthenticated(AuthFailure),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ClinicError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ClinicError::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ClinicError::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ClinicError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ClinicError::Conflict(msg.into())
    }

    /// Machine-readable discriminator sent to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            ClinicError::Validation(_) => "validation",
            ClinicError::Unauthenticated(AuthFailure::TokenExpired) => "token_expired",
            ClinicError::Unauthenticated(_) => "unauthenticated",
            ClinicError::Forbidden(_) => "forbidden",
            ClinicError::NotFound(_) => "not_found",
            ClinicError::Conflict(_) => "conflict",
            ClinicError::Internal(_) => "internal",
        }
    }
}

impl From<AuthFailure> for ClinicError {
    fn from(failure: AuthFailure) -> Self {
        ClinicError::Unauthenticated(failure)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness rule rejected the write.
    #[error("write conflicts with an existing record")]
    Conflict,

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("query error: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for ClinicError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => ClinicError::Conflict("Conflicting record already exists".to_string()),
            other => ClinicError::Internal(anyhow::Error::new(other)),
        }
    }
}

pub type ClinicResult<T> = Result<T, ClinicError>;
