//! `generate_book_insights` tool (spec §4.3): issues a sampling request
//! (§4.5) and caches the result by `(isbn, insight_type)`; falls back to a
//! deterministic templated summary when sampling is unsupported or fails.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::{json, Value};

use crate::domain::Book;
use crate::error::{DomainError, McpError};
use crate::protocol::ToolCallResult;
use crate::sampling::SamplingPriorities;
use crate::store::book_repo::BookRepo;

use super::{require_str, McpTool, ToolContext, ToolFuture};

#[derive(Default)]
pub struct GenerateBookInsights {
    cache: Mutex<HashMap<(String, String), Value>>,
}

impl McpTool for GenerateBookInsights {
    fn name(&self) -> &'static str {
        "generate_book_insights"
    }

    fn description(&self) -> &'static str {
        "Generate AI-assisted insights about a book (summary, themes, discussion questions, or similar books)."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "isbn": {"type": "string"},
                "insight_type": {
                    "type": "string",
                    "enum": ["summary", "themes", "discussion_questions", "similar_books"]
                }
            },
            "required": ["isbn", "insight_type"],
            "additionalProperties": false
        })
    }

    fn call<'a>(&'a self, ctx: &'a ToolContext, arguments: Value) -> ToolFuture<'a> {
        Box::pin(async move {
            let isbn = require_str(&arguments, "isbn")?;
            let insight_type = require_str(&arguments, "insight_type")?;
            if !["summary", "themes", "discussion_questions", "similar_books"].contains(&insight_type) {
                return Err(McpError::InvalidParams(format!("unknown insight_type: {insight_type}")));
            }

            let cache_key = (isbn.to_string(), insight_type.to_string());
            if let Some(cached) = self.cache.lock().unwrap().get(&cache_key).cloned() {
                return Ok(ToolCallResult::ok(cached));
            }

            let book = BookRepo::get_by_isbn(ctx.store.pool(), isbn)
                .await
                .map_err(McpError::from)?
                .ok_or_else(|| McpError::from(DomainError::BookNotFound(isbn.to_string())))?;

            let result = generate(ctx, &book, insight_type).await;
            self.cache.lock().unwrap().insert(cache_key, result.clone());
            Ok(ToolCallResult::ok(result))
        })
    }
}

async fn generate(ctx: &ToolContext, book: &Book, insight_type: &str) -> Value {
    let prompt = format!(
        "Provide {insight_type} for the book \"{}\" ({}), published {}.",
        book.title, book.genre, book.publication_year
    );
    let outcome = ctx
        .sampling
        .request_ai_generation(&prompt, None, 500, Some(0.7), SamplingPriorities {
            intelligence: 0.7,
            speed: 0.3,
            cost: 0.3,
        })
        .await;

    match outcome.text {
        Some(text) => json!({ "isbn": book.isbn.to_string(), "insight_type": insight_type, "content": text }),
        None => json!({
            "isbn": book.isbn.to_string(),
            "insight_type": insight_type,
            "content": deterministic_fallback(book, insight_type),
            "data": { "fallback_reason": outcome.fallback_reason.unwrap_or("unknown") },
        }),
    }
}

fn deterministic_fallback(book: &Book, insight_type: &str) -> String {
    match insight_type {
        "summary" => format!(
            "\"{}\" is a {} work published in {}. {}",
            book.title, book.genre, book.publication_year, book.description
        ),
        "themes" => format!("Themes commonly associated with {} titles such as \"{}\".", book.genre, book.title),
        "discussion_questions" => format!(
            "What motivated the central conflict in \"{}\"? How does it reflect {} conventions?",
            book.title, book.genre
        ),
        "similar_books" => format!("Other {} titles by the same author or in the same genre as \"{}\".", book.genre, book.title),
        _ => unreachable!(),
    }
}
