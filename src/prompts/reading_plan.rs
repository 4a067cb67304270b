//! `reading_plan` prompt (spec §4.4): asks the client's model to draft a
//! themed, leveled reading plan spanning a number of months.

use serde_json::Value;

use crate::error::McpError;
use crate::protocol::{ContentBlock, PromptArgumentDefinition, PromptMessage, PromptsGetResult};
use crate::store::Store;

use super::{optional_u32, require_str, PromptFuture, PromptTemplate};

const LEVELS: &[&str] = &["beginner", "intermediate", "advanced"];

pub struct ReadingPlan;

impl PromptTemplate for ReadingPlan {
    fn name(&self) -> &'static str {
        "reading_plan"
    }

    fn description(&self) -> &'static str {
        "Draft a themed reading plan spanning a number of months, scaled to the reader's level."
    }

    fn arguments(&self) -> Vec<PromptArgumentDefinition> {
        vec![
            PromptArgumentDefinition {
                name: "theme".to_string(),
                description: "Subject or theme to build the plan around".to_string(),
                required: true,
            },
            PromptArgumentDefinition {
                name: "duration_months".to_string(),
                description: "How many months the plan should span".to_string(),
                required: true,
            },
            PromptArgumentDefinition {
                name: "level".to_string(),
                description: "Reader level: beginner, intermediate, or advanced".to_string(),
                required: true,
            },
            PromptArgumentDefinition {
                name: "hours_per_week".to_string(),
                description: "Reading hours available per week".to_string(),
                required: false,
            },
        ]
    }

    fn get<'a>(&'a self, _store: &'a Store, arguments: Value) -> PromptFuture<'a> {
        Box::pin(async move {
            let theme = require_str(&arguments, "theme")?;
            let duration_months = arguments
                .get("duration_months")
                .and_then(Value::as_u64)
                .ok_or_else(|| McpError::InvalidParams("missing or non-numeric field: duration_months".to_string()))?;
            if duration_months == 0 {
                return Err(McpError::InvalidParams("duration_months must be at least 1".to_string()));
            }
            let level = require_str(&arguments, "level")?;
            if !LEVELS.contains(&level) {
                return Err(McpError::InvalidParams(format!("unknown level: {level}")));
            }
            let hours_per_week = optional_u32(&arguments, "hours_per_week");
            let hours_clause = hours_per_week
                .map(|h| format!(" assuming about {h} reading hours per week"))
                .unwrap_or_default();

            let text = format!(
                "Build a {duration_months}-month reading plan on the theme of \"{theme}\" for a {level} reader{hours_clause}. \
                 Break it into monthly milestones, recommend a small number of books per month, and note what skill or \
                 understanding each milestone builds toward."
            );

            Ok(PromptsGetResult {
                description: format!("{duration_months}-month {level} reading plan on {theme}"),
                messages: vec![PromptMessage {
                    role: "user".to_string(),
                    content: ContentBlock::text(text),
                }],
            })
        })
    }
}
