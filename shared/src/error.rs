use thiserror::Error;

pub type OrderResult<T> = Result<T, OrderError>;

/// Failures surfaced by order placement, cancellation and status updates.
#[derive(Error, Debug)]
pub enum OrderError {
    /// Malformed request: empty cart, bad address, unknown payment method.
    #[error("{0}")]
    Validation(String),

    #[error("Insufficient stock for \"{title}\" (book {book_id}): {available} available")]
    InsufficientStock {
        book_id: i64,
        title: String,
        available: i32,
    },

    #[error("{0}")]
    NotFound(String),

    /// Duplicate order number. Retried internally before it reaches a caller.
    #[error("{0}")]
    Conflict(String),

    /// Illegal transition for the order's current status or the actor's role.
    #[error("{0}")]
    State(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl OrderError {
    pub fn kind(&self) -> &'static str {
        match self {
            OrderError::Validation(_) => "validation_error",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::NotFound(_) => "not_found",
            OrderError::Conflict(_) => "conflict",
            OrderError::State(_) => "invalid_state",
            OrderError::Forbidden(_) => "forbidden",
            OrderError::Storage(_) => "storage_error",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, OrderError::Conflict(_) | OrderError::Storage(_))
    }
}

impl From<diesel::result::Error> for OrderError {
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};

        match err {
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                OrderError::Conflict(info.message().to_string())
            }
            other => OrderError::Storage(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for OrderError {
    fn from(err: serde_json::Error) -> Self {
        OrderError::Storage(format!("malformed stored value: {}", err))
    }
}
