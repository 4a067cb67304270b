//! `reserve_book` tool (spec §4.3). Side effect: appends to the reservation
//! queue. Not idempotent — callers must deduplicate at the application
//! level.

use chrono::Utc;
use serde_json::{json, Value};

use crate::domain::Reservation;
use crate::error::{DomainError, McpError};
use crate::protocol::ToolCallResult;
use crate::store::book_repo::BookRepo;
use crate::store::circulation_repo::CirculationRepo;
use crate::store::patron_repo::PatronRepo;

use super::{require_str, McpTool, ToolContext, ToolFuture};

pub struct ReserveBook;

impl McpTool for ReserveBook {
    fn name(&self) -> &'static str {
        "reserve_book"
    }

    fn description(&self) -> &'static str {
        "Reserve a book that is currently fully checked out, joining the hold queue."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "isbn": {"type": "string"},
                "patron_id": {"type": "string"}
            },
            "required": ["isbn", "patron_id"],
            "additionalProperties": false
        })
    }

    fn call<'a>(&'a self, ctx: &'a ToolContext, arguments: Value) -> ToolFuture<'a> {
        Box::pin(async move {
            let isbn = require_str(&arguments, "isbn")?;
            let patron_id = require_str(&arguments, "patron_id")?;
            let reservation = reserve_book(ctx, isbn, patron_id).await?;
            Ok(ToolCallResult::ok(json!(reservation)))
        })
    }
}

async fn reserve_book(ctx: &ToolContext, isbn: &str, patron_id: &str) -> Result<Reservation, McpError> {
    let mut tx = ctx.store.begin().await.map_err(McpError::from)?;

    let patron = PatronRepo::get(&mut *tx, patron_id)
        .await
        .map_err(McpError::from)?
        .ok_or_else(|| McpError::from(DomainError::PatronNotFound(patron_id.to_string())))?;
    patron.require_active().map_err(McpError::from)?;

    let book = BookRepo::get_by_isbn(&mut *tx, isbn)
        .await
        .map_err(McpError::from)?
        .ok_or_else(|| McpError::from(DomainError::BookNotFound(isbn.to_string())))?;
    if book.available_copies > 0 {
        return Err(McpError::from(DomainError::CopiesAvailable { isbn: isbn.to_string() }));
    }

    let reservation_id = uuid::Uuid::new_v4().to_string();
    let reservation = CirculationRepo::create_reservation(&mut tx, &reservation_id, isbn, patron_id, Utc::now())
        .await
        .map_err(McpError::from)?;

    tx.commit().await.map_err(DomainError::from).map_err(McpError::from)?;
    Ok(reservation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationRegistry;
    use crate::config::Config;
    use crate::domain::{Author, Book, Genre, Isbn13, MembershipStatus, Patron};
    use crate::observability::recorder_for;
    use crate::outbound::OutboundQueue;
    use crate::resources::subscriptions::SubscriptionRegistry;
    use crate::sampling::SamplingClient;
    use crate::store::author_repo::AuthorRepo;
    use crate::store::Store;
    use std::sync::Arc;

    async fn test_ctx() -> ToolContext {
        let store = Store::in_memory().await.unwrap();
        let (outbound, _writer) = OutboundQueue::spawn(tokio::io::sink());
        ToolContext {
            store,
            config: Arc::new(Config::default()),
            outbound: outbound.clone(),
            subscriptions: Arc::new(SubscriptionRegistry::new()),
            sampling: SamplingClient::new(outbound, false, 30),
            recorder: Arc::from(recorder_for(false)),
            cancellation: CancellationRegistry::new().register(crate::protocol::RequestId::Number(1)),
            progress_token: None,
        }
    }

    async fn seed(ctx: &ToolContext, available: i64) {
        AuthorRepo::upsert(
            ctx.store.pool(),
            &Author {
                author_id: "a1".to_string(),
                name: "Author".to_string(),
                biography: None,
            },
        )
        .await
        .unwrap();
        BookRepo::upsert(
            ctx.store.pool(),
            &Book {
                isbn: Isbn13::parse("9780134190440").unwrap(),
                title: "Sample".to_string(),
                author_id: "a1".to_string(),
                genre: Genre::Fiction,
                publication_year: 2020,
                description: "".to_string(),
                total_copies: 1,
                available_copies: available,
            },
        )
        .await
        .unwrap();
        for id in ["p_b", "p_c"] {
            PatronRepo::upsert(
                ctx.store.pool(),
                &Patron {
                    patron_id: id.to_string(),
                    name: "Reader".to_string(),
                    email: format!("{id}@example.com"),
                    membership_status: MembershipStatus::Active,
                    outstanding_fines: 0.0,
                },
            )
            .await
            .unwrap();
        }
    }

    #[tokio::test]
    async fn queue_positions_are_assigned_in_order() {
        let ctx = test_ctx().await;
        seed(&ctx, 0).await;
        let r1 = reserve_book(&ctx, "9780134190440", "p_b").await.unwrap();
        let r2 = reserve_book(&ctx, "9780134190440", "p_c").await.unwrap();
        assert_eq!(r1.queue_position, 1);
        assert_eq!(r2.queue_position, 2);
    }

    #[tokio::test]
    async fn reserving_a_book_with_copies_available_is_rejected() {
        let ctx = test_ctx().await;
        seed(&ctx, 1).await;
        let err = reserve_book(&ctx, "9780134190440", "p_b").await.unwrap_err();
        assert_eq!(err.code(), -32003);
    }
}
