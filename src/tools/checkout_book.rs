//! `checkout_book` tool (spec §4.3). Side effects: decrements
//! `available_copies`; creates a Checkout. Not idempotent — callers must
//! deduplicate at the application level.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::domain::Checkout;
use crate::error::{DomainError, McpError};
use crate::protocol::ToolCallResult;
use crate::store::book_repo::BookRepo;
use crate::store::circulation_repo::CirculationRepo;
use crate::store::patron_repo::PatronRepo;

use super::{optional_str, require_str, McpTool, ToolContext, ToolFuture};

pub struct CheckoutBook;

impl McpTool for CheckoutBook {
    fn name(&self) -> &'static str {
        "checkout_book"
    }

    fn description(&self) -> &'static str {
        "Check out a book to a patron, creating a Checkout record."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "isbn": {"type": "string"},
                "patron_id": {"type": "string"},
                "due_date": {"type": "string", "format": "date-time"}
            },
            "required": ["isbn", "patron_id"],
            "additionalProperties": false
        })
    }

    fn call<'a>(&'a self, ctx: &'a ToolContext, arguments: Value) -> ToolFuture<'a> {
        Box::pin(async move {
            let isbn = require_str(&arguments, "isbn")?;
            let patron_id = require_str(&arguments, "patron_id")?;
            let due_date_arg = optional_str(&arguments, "due_date");

            let checkout = checkout_book(ctx, isbn, patron_id, due_date_arg).await?;
            Ok(ToolCallResult::ok(json!(checkout)))
        })
    }
}

async fn checkout_book(
    ctx: &ToolContext,
    isbn: &str,
    patron_id: &str,
    due_date_arg: Option<&str>,
) -> Result<Checkout, McpError> {
    let mut tx = ctx.store.begin().await.map_err(McpError::from)?;

    let patron = PatronRepo::get(&mut *tx, patron_id)
        .await
        .map_err(McpError::from)?
        .ok_or_else(|| McpError::from(DomainError::PatronNotFound(patron_id.to_string())))?;
    patron.require_active().map_err(McpError::from)?;

    BookRepo::get_by_isbn(&mut *tx, isbn)
        .await
        .map_err(McpError::from)?
        .ok_or_else(|| McpError::from(DomainError::BookNotFound(isbn.to_string())))?;

    let checkout_date = Utc::now();
    let due_date = match due_date_arg {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| McpError::InvalidParams(format!("invalid due_date: {raw}")))?,
        None => checkout_date + chrono::Duration::days(ctx.config.loan_default_days),
    };
    Checkout::validate_due_date(checkout_date, due_date, ctx.config.loan_max_days).map_err(McpError::from)?;

    BookRepo::adjust_available_copies(&mut tx, isbn, -1)
        .await
        .map_err(McpError::from)?;

    let checkout_id = uuid::Uuid::new_v4().to_string();
    let checkout = CirculationRepo::create_checkout(&mut tx, &checkout_id, isbn, patron_id, checkout_date, due_date)
        .await
        .map_err(McpError::from)?;

    tx.commit().await.map_err(DomainError::from).map_err(McpError::from)?;

    Ok(checkout)
}
