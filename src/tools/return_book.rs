//! `return_book` tool (spec §4.3). Side effects: sets `return_date`,
//! increments `available_copies`, assesses a late fee if overdue, and
//! advances the reservation queue if one exists.

use chrono::Utc;
use serde_json::{json, Value};

use crate::domain::Checkout;
use crate::error::{DomainError, McpError};
use crate::protocol::ToolCallResult;
use crate::store::book_repo::BookRepo;
use crate::store::circulation_repo::CirculationRepo;
use crate::store::patron_repo::PatronRepo;

use super::{optional_str, require_str, McpTool, ToolContext, ToolFuture};

pub struct ReturnBook;

impl McpTool for ReturnBook {
    fn name(&self) -> &'static str {
        "return_book"
    }

    fn description(&self) -> &'static str {
        "Return a checked-out book, assessing a late fee if overdue."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "checkout_id": {"type": "string"},
                "condition": {"type": "string"}
            },
            "required": ["checkout_id"],
            "additionalProperties": false
        })
    }

    fn call<'a>(&'a self, ctx: &'a ToolContext, arguments: Value) -> ToolFuture<'a> {
        Box::pin(async move {
            let checkout_id = require_str(&arguments, "checkout_id")?;
            let condition = optional_str(&arguments, "condition");
            let checkout = return_book(ctx, checkout_id, condition).await?;
            Ok(ToolCallResult::ok(json!(checkout)))
        })
    }
}

async fn return_book(ctx: &ToolContext, checkout_id: &str, condition: Option<&str>) -> Result<Checkout, McpError> {
    let mut tx = ctx.store.begin().await.map_err(McpError::from)?;

    let existing = CirculationRepo::get_checkout(&mut *tx, checkout_id)
        .await
        .map_err(McpError::from)?
        .ok_or_else(|| McpError::from(DomainError::CheckoutNotFound(checkout_id.to_string())))?;

    let return_date = Utc::now();
    let late_fee = existing.compute_late_fee(return_date, ctx.config.late_fee_per_day, ctx.config.late_fee_max_fee);

    let checkout =
        CirculationRepo::mark_returned(&mut tx, checkout_id, return_date, condition, late_fee)
            .await
            .map_err(McpError::from)?;

    BookRepo::adjust_available_copies(&mut tx, &checkout.isbn, 1)
        .await
        .map_err(McpError::from)?;

    if late_fee > 0.0 {
        PatronRepo::add_fine(&mut *tx, &checkout.patron_id, late_fee)
            .await
            .map_err(McpError::from)?;
    }

    let fulfilled = CirculationRepo::advance_queue(&mut tx, &checkout.isbn)
        .await
        .map_err(McpError::from)?;

    let book = BookRepo::get_by_isbn(&mut *tx, &checkout.isbn)
        .await
        .map_err(McpError::from)?;

    tx.commit().await.map_err(DomainError::from).map_err(McpError::from)?;

    if let Some(book) = book {
        ctx.subscriptions.notify_isbn_changed(
            &ctx.outbound,
            &checkout.isbn,
            &book.author_id,
            book.genre.as_str(),
            json!({
                "isbn": checkout.isbn,
                "available_copies": book.available_copies,
                "fulfilled_reservation": fulfilled.map(|r| r.reservation_id),
            }),
        );
    }

    Ok(checkout)
}
