//! `book_recommendations` prompt (spec §4.4): a message asking the client's
//! model to turn a ranked candidate list into a friendly recommendation
//! pitch. Ranking itself is delegated to `recommendations::recommend_for_patron`
//! so the prompt and the `library://recommendations` resource never disagree.

use serde_json::Value;

use crate::domain::Genre;
use crate::error::McpError;
use crate::protocol::{ContentBlock, PromptArgumentDefinition, PromptMessage, PromptsGetResult};
use crate::recommendations::recommend_for_patron;
use crate::store::book_repo::{BookFilters, BookRepo};
use crate::store::Store;

use super::{optional_str, optional_u32, PromptFuture, PromptTemplate};

pub struct BookRecommendations;

impl PromptTemplate for BookRecommendations {
    fn name(&self) -> &'static str {
        "book_recommendations"
    }

    fn description(&self) -> &'static str {
        "Recommend books for a patron, optionally narrowed to a genre."
    }

    fn arguments(&self) -> Vec<PromptArgumentDefinition> {
        vec![
            PromptArgumentDefinition {
                name: "patron_id".to_string(),
                description: "Patron to base recommendations on; omit for genre-only picks".to_string(),
                required: false,
            },
            PromptArgumentDefinition {
                name: "genre".to_string(),
                description: "Restrict candidates to this genre".to_string(),
                required: false,
            },
            PromptArgumentDefinition {
                name: "count".to_string(),
                description: "Number of books to recommend (default 5)".to_string(),
                required: false,
            },
        ]
    }

    fn get<'a>(&'a self, store: &'a Store, arguments: Value) -> PromptFuture<'a> {
        Box::pin(async move {
            let patron_id = optional_str(&arguments, "patron_id");
            let genre = optional_str(&arguments, "genre")
                .map(Genre::parse)
                .transpose()
                .map_err(McpError::from)?;
            let count = optional_u32(&arguments, "count").unwrap_or(5) as usize;

            let candidates = if let Some(patron_id) = patron_id {
                let mut recs = recommend_for_patron(store, patron_id, count).await.map_err(McpError::from)?;
                if let Some(genre) = genre {
                    recs.retain(|b| b.genre == genre);
                }
                recs
            } else {
                let filters = BookFilters {
                    genre,
                    available_only: true,
                    ..Default::default()
                };
                let (books, _total) = BookRepo::list(store.pool(), &filters, 1, count as u32)
                    .await
                    .map_err(McpError::from)?;
                books
            };

            let candidate_list = candidates
                .iter()
                .map(|b| format!("- {} ({}, {}) ISBN {}", b.title, b.genre, b.publication_year, b.isbn))
                .collect::<Vec<_>>()
                .join("\n");

            let scope = match (patron_id, genre) {
                (Some(p), Some(g)) => format!("for patron {p} within the {g} genre"),
                (Some(p), None) => format!("for patron {p}"),
                (None, Some(g)) => format!("within the {g} genre"),
                (None, None) => "for a general reader".to_string(),
            };

            let text = format!(
                "Recommend up to {count} books {scope}, drawing only from this candidate list:\n\n{candidate_list}\n\nWrite a short, friendly pitch for each pick explaining why it fits."
            );

            Ok(PromptsGetResult {
                description: format!("Book recommendations {scope}"),
                messages: vec![PromptMessage {
                    role: "user".to_string(),
                    content: ContentBlock::text(text),
                }],
            })
        })
    }
}
