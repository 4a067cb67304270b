//! `search_catalog` tool (spec §4.3): ordered list of book summaries plus
//! total count. No side effects.

use serde_json::{json, Value};

use crate::domain::Genre;
use crate::error::McpError;
use crate::protocol::ToolCallResult;
use crate::resources::pagination::Pagination;
use crate::store::book_repo::{BookFilters, BookRepo};

use super::{optional_bool, optional_str, optional_u32, McpTool, ToolContext, ToolFuture};

pub struct SearchCatalog;

impl McpTool for SearchCatalog {
    fn name(&self) -> &'static str {
        "search_catalog"
    }

    fn description(&self) -> &'static str {
        "Search the book catalog by free text, genre, author, and availability."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "genre": {"type": "string", "enum": Genre::ALL.iter().map(Genre::as_str).collect::<Vec<_>>()},
                "author_id": {"type": "string"},
                "available_only": {"type": "boolean", "default": false},
                "published_after": {"type": "integer"},
                "page": {"type": "integer", "minimum": 1},
                "page_size": {"type": "integer", "minimum": 1}
            },
            "additionalProperties": false
        })
    }

    fn call<'a>(&'a self, ctx: &'a ToolContext, arguments: Value) -> ToolFuture<'a> {
        Box::pin(async move {
            let genre = match optional_str(&arguments, "genre") {
                Some(raw) => Some(Genre::parse(raw)?),
                None => None,
            };
            let filters = BookFilters {
                query: optional_str(&arguments, "query").map(str::to_string),
                genre,
                author_id: optional_str(&arguments, "author_id").map(str::to_string),
                available_only: optional_bool(&arguments, "available_only"),
                published_after: optional_u32(&arguments, "published_after").map(|y| y as i32),
            };
            let pagination = Pagination::parse(
                optional_u32(&arguments, "page"),
                optional_u32(&arguments, "page_size"),
                ctx.config.pagination_default_page_size,
                ctx.config.pagination_max_page_size,
            )?;

            let (books, total) =
                BookRepo::list(ctx.store.pool(), &filters, pagination.page, pagination.page_size)
                    .await
                    .map_err(McpError::from)?;
            let (books, truncated) = ctx.config.output_budget().enforce_rows(books);

            Ok(ToolCallResult::ok(json!({
                "books": books,
                "total": total,
                "page": pagination.page,
                "page_size": pagination.page_size,
                "truncated": truncated,
            })))
        })
    }
}
