//! MCP and domain error taxonomy (§7 of the specification).
//!
//! `McpError` is the single source of truth for the JSON-RPC error codes
//! this server ever returns. Domain failures are raised as `DomainError`
//! inside repositories and services, then mapped onto `McpError` at the
//! tool/resource boundary so every handler ends at the same fixed table.

use serde_json::Value;
use thiserror::Error;

/// Errors raised by the domain/store layer, independent of JSON-RPC.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("book not found: {0}")]
    BookNotFound(String),

    #[error("author not found: {0}")]
    AuthorNotFound(String),

    #[error("patron not found: {0}")]
    PatronNotFound(String),

    #[error("checkout not found: {0}")]
    CheckoutNotFound(String),

    #[error("reservation not found: {0}")]
    ReservationNotFound(String),

    #[error("duplicate isbn: {0}")]
    DuplicateIsbn(String),

    #[error("duplicate patron id: {0}")]
    DuplicatePatronId(String),

    #[error("invalid isbn-13 checksum: {0}")]
    InvalidIsbn(String),

    #[error("patron {patron_id} is not active ({status})")]
    PatronNotActive { patron_id: String, status: String },

    #[error("no copies available for {isbn}")]
    NoCopiesAvailable { isbn: String },

    #[error("book has available copies, reservation not permitted: {isbn}")]
    CopiesAvailable { isbn: String },

    #[error("duplicate active checkout for ({isbn}, {patron_id})")]
    DuplicateCheckout { isbn: String, patron_id: String },

    #[error("duplicate active reservation for ({isbn}, {patron_id})")]
    DuplicateReservation { isbn: String, patron_id: String },

    #[error("checkout {0} already returned")]
    AlreadyReturned(String),

    #[error("due date out of range: {0}")]
    DueDateOutOfRange(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("author {0} still referenced by at least one book")]
    AuthorInUse(String),

    #[error(transparent)]
    Storage(#[from] sqlx::Error),
}

impl DomainError {
    /// Machine-readable reason string, used as `data.reason` on `-32003` responses.
    pub fn reason(&self) -> &'static str {
        match self {
            DomainError::NoCopiesAvailable { .. } => "no_copies",
            DomainError::CopiesAvailable { .. } => "copies_available",
            DomainError::DuplicateCheckout { .. } => "duplicate_checkout",
            DomainError::DuplicateReservation { .. } => "duplicate_reservation",
            DomainError::PatronNotActive { .. } => "patron_not_active",
            DomainError::AlreadyReturned(_) => "already_returned",
            DomainError::DueDateOutOfRange(_) => "due_date_out_of_range",
            DomainError::AuthorInUse(_) => "author_in_use",
            _ => "domain_error",
        }
    }

    /// Whether this error belongs in the invalid-params bucket (bad input) rather
    /// than the tool-execution-failed bucket (valid input, rule violation).
    pub fn is_invalid_params(&self) -> bool {
        matches!(
            self,
            DomainError::InvalidIsbn(_)
                | DomainError::InvalidArgument(_)
                | DomainError::BookNotFound(_)
                | DomainError::AuthorNotFound(_)
                | DomainError::PatronNotFound(_)
                | DomainError::CheckoutNotFound(_)
                | DomainError::ReservationNotFound(_)
        )
    }
}

/// The fixed JSON-RPC / MCP error table from spec §7.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("internal error")]
    Internal { message: String, trace_id: String },

    #[error("server not initialized")]
    NotInitialized,

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("prompt not found: {0}")]
    PromptNotFound(String),

    #[error("tool execution failed: {reason}")]
    ToolExecutionFailed { reason: String, detail: Value },

    #[error("request cancelled")]
    Cancelled { data: Value },
}

impl McpError {
    pub fn code(&self) -> i32 {
        match self {
            McpError::Parse(_) => -32700,
            McpError::InvalidRequest(_) => -32600,
            McpError::MethodNotFound(_) => -32601,
            McpError::InvalidParams(_) => -32602,
            McpError::Internal { .. } => -32603,
            McpError::NotInitialized => -32002,
            McpError::ResourceNotFound(_) => -32001,
            McpError::PromptNotFound(_) => -32005,
            McpError::ToolExecutionFailed { .. } => -32003,
            McpError::Cancelled { .. } => -32800,
        }
    }

    pub fn data(&self) -> Option<Value> {
        match self {
            McpError::Internal { trace_id, .. } => Some(serde_json::json!({ "trace": trace_id })),
            McpError::ToolExecutionFailed { detail, .. } => Some(detail.clone()),
            McpError::Cancelled { data } => Some(data.clone()),
            _ => None,
        }
    }

    pub fn internal(err: impl std::fmt::Display, trace_id: impl Into<String>) -> Self {
        McpError::Internal {
            message: err.to_string(),
            trace_id: trace_id.into(),
        }
    }

    pub fn cancelled(imported: u64, remaining: u64) -> Self {
        McpError::Cancelled {
            data: serde_json::json!({ "imported": imported, "remaining": remaining }),
        }
    }

    /// Map a domain error onto its fixed JSON-RPC counterpart.
    pub fn from_domain(err: DomainError) -> Self {
        if err.is_invalid_params() {
            return McpError::InvalidParams(err.to_string());
        }
        if let DomainError::Storage(ref e) = err {
            return McpError::internal(e, uuid::Uuid::new_v4().to_string());
        }
        let reason = err.reason();
        McpError::ToolExecutionFailed {
            reason: reason.to_string(),
            detail: serde_json::json!({ "reason": reason, "message": err.to_string() }),
        }
    }
}

impl From<DomainError> for McpError {
    fn from(err: DomainError) -> Self {
        McpError::from_domain(err)
    }
}
