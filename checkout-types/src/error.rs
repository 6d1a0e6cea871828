//! Error types for the checkout service.

use rust_decimal::Decimal;

use crate::domain::{Currency, ProductId, TransactionId, TransactionStatus};

/// Convenience alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level errors (business rule violations).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    #[error("Invalid amount: {0} (amounts cannot be negative)")]
    InvalidAmount(Decimal),

    #[error("Currency mismatch: expected {expected}, got {got}")]
    CurrencyMismatch { expected: Currency, got: Currency },

    #[error(
        "Insufficient stock for product {product_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    #[error("Cannot {attempted_action} a transaction in state {current_state}")]
    InvalidTransactionState {
        current_state: TransactionStatus,
        attempted_action: String,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid {kind} value: {value}")]
    InvalidEnumValue { kind: &'static str, value: String },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Repository-level errors (data access failures).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Entity not found")]
    NotFound,

    /// The stored entity changed since it was loaded (optimistic lock miss).
    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Failures reported by the payment gateway port.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Gateway HTTP error: {0}")]
    Http(String),

    #[error("Gateway call timed out")]
    Timeout,

    /// The gateway answered with a non-success status. The raw body is kept
    /// for diagnostics.
    #[error("Gateway rejected the request with status {status}")]
    Rejected {
        status: u16,
        body: Option<serde_json::Value>,
    },

    #[error("Invalid gateway response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// Raw gateway payload attached to this error, if any.
    pub fn raw_body(&self) -> Option<&serde_json::Value> {
        match self {
            GatewayError::Rejected { body, .. } => body.as_ref(),
            _ => None,
        }
    }
}

/// Application-level errors (for HTTP responses).
///
/// Maps cleanly to HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    #[error("Insufficient stock: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    #[error("Cannot {attempted_action} a transaction in state {current_state}")]
    InvalidTransactionState {
        current_state: TransactionStatus,
        attempted_action: String,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payment processing failed: {message}")]
    PaymentProcessing {
        message: String,
        gateway_error: Option<serde_json::Value>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InsufficientStock {
                product_id,
                requested,
                available,
            } => AppError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            DomainError::InvalidTransactionState {
                current_state,
                attempted_action,
            } => AppError::InvalidTransactionState {
                current_state,
                attempted_action,
            },
            DomainError::InvalidEnumValue { .. } => AppError::Internal(err.to_string()),
            e => AppError::BadRequest(e.to_string()),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Domain(e) => e.into(),
            // Lookups map absence themselves; reaching here means a record vanished mid-operation.
            RepoError::NotFound => AppError::Internal("Record disappeared during update".into()),
            RepoError::Database(e) => AppError::Internal(e),
            RepoError::Conflict(e) => AppError::Conflict(e),
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        AppError::PaymentProcessing {
            message: err.to_string(),
            gateway_error: err.raw_body().cloned(),
        }
    }
}
