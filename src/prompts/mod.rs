//! Prompt registry (spec §4.4): parameterised message templates returning
//! structured message sequences. Prompts never call the LLM themselves.

pub mod book_recommendations;
pub mod reading_plan;
pub mod review_generator;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::error::McpError;
use crate::protocol::{PromptArgumentDefinition, PromptDefinition, PromptsGetResult, PromptsListResult};
use crate::store::Store;

pub type PromptFuture<'a> = Pin<Box<dyn Future<Output = Result<PromptsGetResult, McpError>> + Send + 'a>>;

pub trait PromptTemplate: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn arguments(&self) -> Vec<PromptArgumentDefinition>;
    fn get<'a>(&'a self, store: &'a Store, arguments: Value) -> PromptFuture<'a>;
}

#[derive(Default)]
pub struct PromptRegistry {
    prompts: HashMap<&'static str, Box<dyn PromptTemplate>>,
}

impl PromptRegistry {
    pub fn new() -> Self {
        let mut registry = Self::default();
        registry.register(Box::new(book_recommendations::BookRecommendations));
        registry.register(Box::new(reading_plan::ReadingPlan));
        registry.register(Box::new(review_generator::ReviewGenerator));
        registry
    }

    fn register(&mut self, prompt: Box<dyn PromptTemplate>) {
        self.prompts.insert(prompt.name(), prompt);
    }

    pub fn list(&self) -> PromptsListResult {
        let mut prompts: Vec<PromptDefinition> = self
            .prompts
            .values()
            .map(|p| PromptDefinition {
                name: p.name().to_string(),
                description: p.description().to_string(),
                arguments: p.arguments(),
            })
            .collect();
        prompts.sort_by(|a, b| a.name.cmp(&b.name));
        PromptsListResult { prompts }
    }

    pub async fn get(&self, store: &Store, name: &str, arguments: Value) -> Result<PromptsGetResult, McpError> {
        let prompt = self
            .prompts
            .get(name)
            .ok_or_else(|| McpError::PromptNotFound(name.to_string()))?;
        prompt.get(store, arguments).await
    }
}

pub fn require_str<'a>(arguments: &'a Value, field: &str) -> Result<&'a str, McpError> {
    arguments
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| McpError::InvalidParams(format!("missing or non-string field: {field}")))
}

pub fn optional_str<'a>(arguments: &'a Value, field: &str) -> Option<&'a str> {
    arguments.get(field).and_then(Value::as_str)
}

pub fn optional_u32(arguments: &Value, field: &str) -> Option<u32> {
    arguments.get(field).and_then(Value::as_u64).map(|n| n as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_lists_all_three_prompts() {
        let registry = PromptRegistry::new();
        assert_eq!(registry.list().prompts.len(), 3);
    }

    #[tokio::test]
    async fn unknown_prompt_name_is_prompt_not_found() {
        let registry = PromptRegistry::new();
        let store = Store::in_memory().await.unwrap();
        let err = registry.get(&store, "does_not_exist", Value::Null).await.unwrap_err();
        assert_eq!(err.code(), -32005);
    }
}
