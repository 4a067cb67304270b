//! `review_generator` prompt (spec §4.4): asks the client's model to draft
//! a review of a specific book, in a chosen style, for a chosen audience.

use serde_json::Value;

use crate::error::{DomainError, McpError};
use crate::protocol::{ContentBlock, PromptArgumentDefinition, PromptMessage, PromptsGetResult};
use crate::store::author_repo::AuthorRepo;
use crate::store::book_repo::BookRepo;
use crate::store::Store;

use super::{optional_str, require_str, PromptFuture, PromptTemplate};

const STYLES: &[&str] = &["academic", "casual", "critical"];

pub struct ReviewGenerator;

impl PromptTemplate for ReviewGenerator {
    fn name(&self) -> &'static str {
        "review_generator"
    }

    fn description(&self) -> &'static str {
        "Draft a review of a specific book in a chosen style, for a chosen audience."
    }

    fn arguments(&self) -> Vec<PromptArgumentDefinition> {
        vec![
            PromptArgumentDefinition {
                name: "isbn".to_string(),
                description: "ISBN-13 of the book to review".to_string(),
                required: true,
            },
            PromptArgumentDefinition {
                name: "style".to_string(),
                description: "Review style: academic, casual, or critical".to_string(),
                required: true,
            },
            PromptArgumentDefinition {
                name: "audience".to_string(),
                description: "Intended audience for the review".to_string(),
                required: false,
            },
        ]
    }

    fn get<'a>(&'a self, store: &'a Store, arguments: Value) -> PromptFuture<'a> {
        Box::pin(async move {
            let isbn = require_str(&arguments, "isbn")?;
            let style = require_str(&arguments, "style")?;
            if !STYLES.contains(&style) {
                return Err(McpError::InvalidParams(format!("unknown style: {style}")));
            }
            let audience = optional_str(&arguments, "audience").unwrap_or("general readers");

            let book = BookRepo::get_by_isbn(store.pool(), isbn)
                .await
                .map_err(McpError::from)?
                .ok_or_else(|| McpError::from(DomainError::BookNotFound(isbn.to_string())))?;
            let author = AuthorRepo::get(store.pool(), &book.author_id)
                .await
                .map_err(McpError::from)?;
            let author_name = author.map(|a| a.name).unwrap_or_else(|| "an unknown author".to_string());

            let text = format!(
                "Write a {style} review of \"{}\" by {author_name} ({}, {}), for {audience}. \
                 Ground the review in the book's description: {}",
                book.title, book.genre, book.publication_year, book.description
            );

            Ok(PromptsGetResult {
                description: format!("{style} review of \"{}\"", book.title),
                messages: vec![PromptMessage {
                    role: "user".to_string(),
                    content: ContentBlock::text(text),
                }],
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Author, Book, Genre, Isbn13};
    use serde_json::json;

    async fn seed(store: &Store) {
        AuthorRepo::upsert(
            store.pool(),
            &Author {
                author_id: "a1".to_string(),
                name: "Jane Doe".to_string(),
                biography: None,
            },
        )
        .await
        .unwrap();
        BookRepo::upsert(
            store.pool(),
            &Book {
                isbn: Isbn13::parse("9780134190440").unwrap(),
                title: "Effective Rust".to_string(),
                author_id: "a1".to_string(),
                genre: Genre::Science,
                publication_year: 2021,
                description: "A guide to idiomatic Rust.".to_string(),
                total_copies: 1,
                available_copies: 1,
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn builds_review_prompt_with_author_name() {
        let store = Store::in_memory().await.unwrap();
        seed(&store).await;
        let prompt = ReviewGenerator;
        let result = prompt
            .get(&store, json!({"isbn": "9780134190440", "style": "academic"}))
            .await
            .unwrap();
        let text = match &result.messages[0].content {
            ContentBlock::Text { text } => text,
        };
        assert!(text.contains("Jane Doe"));
    }

    #[tokio::test]
    async fn unknown_isbn_is_invalid_params() {
        let store = Store::in_memory().await.unwrap();
        let prompt = ReviewGenerator;
        let err = prompt
            .get(&store, json!({"isbn": "9780136291558", "style": "casual"}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), -32602);
    }

    #[tokio::test]
    async fn rejects_unknown_style() {
        let store = Store::in_memory().await.unwrap();
        seed(&store).await;
        let err = prompt_err(&store).await;
        assert_eq!(err.code(), -32602);
    }

    async fn prompt_err(store: &Store) -> McpError {
        let prompt = ReviewGenerator;
        prompt
            .get(store, json!({"isbn": "9780134190440", "style": "snarky"}))
            .await
            .unwrap_err()
    }
}
