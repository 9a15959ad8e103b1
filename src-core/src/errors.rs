use thiserror::Error;

/// Main error type for the core crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Store-layer failures. All of them are safe to retry because nothing is
/// written before the commit point.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(#[from] diesel::ConnectionError),

    #[error("Database query failed: {0}")]
    QueryFailed(#[from] diesel::result::Error),

    #[error("Database pool error: {0}")]
    PoolCreationFailed(#[from] r2d2::Error),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Concurrent modification: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Business-rule and input violations
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid amount for {field}: {reason}")]
    InvalidAmount { field: String, reason: String },

    #[error("Month {month} is already finalized (at {finalized_at})")]
    MonthAlreadyFinalized {
        month: String,
        finalized_at: chrono::NaiveDateTime,
    },

    #[error("Decimal conversion error: {0}")]
    DecimalConversion(#[from] rust_decimal::Error),
}

impl Error {
    /// True for store failures, where the caller may simply try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Database(_))
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        Error::NotFound(format!("{} '{}'", entity, id))
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Error::Validation(ValidationError::InvalidInput(message.into()))
    }

    pub fn invalid_amount(field: &str, reason: impl Into<String>) -> Self {
        Error::Validation(ValidationError::InvalidAmount {
            field: field.to_string(),
            reason: reason.into(),
        })
    }
}

impl From<diesel::result::Error> for Error {
    fn from(err: diesel::result::Error) -> Self {
        Error::Database(DatabaseError::QueryFailed(err))
    }
}

impl From<r2d2::Error> for Error {
    fn from(err: r2d2::Error) -> Self {
        Error::Database(DatabaseError::PoolCreationFailed(err))
    }
}

impl From<rust_decimal::Error> for Error {
    fn from(err: rust_decimal::Error) -> Self {
        Error::Validation(ValidationError::DecimalConversion(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
