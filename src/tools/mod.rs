//! Tool dispatcher (spec §4.3): named, schema-validated operations with
//! side effects. Grounded on the teacher's static `McpTool` trait +
//! `ToolRegistry` dispatch table, generalized from sync calls to async ones
//! since the session engine now runs on `tokio`.

pub mod bulk_import_books;
pub mod catalog_maintenance;
pub mod checkout_book;
pub mod generate_book_insights;
pub mod reserve_book;
pub mod return_book;
pub mod search_catalog;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;

use crate::cancellation::CancellationToken;
use crate::config::Config;
use crate::error::McpError;
use crate::observability::Recorder;
use crate::outbound::OutboundQueue;
use crate::protocol::{ProgressNotification, RequestId, ToolCallParams, ToolCallResult, ToolDefinition};
use crate::resources::subscriptions::SubscriptionRegistry;
use crate::sampling::SamplingClient;
use crate::store::Store;

/// Everything a tool implementation needs, threaded through by the
/// dispatcher. Cheap to clone; every field is itself a handle.
#[derive(Clone)]
pub struct ToolContext {
    pub store: Store,
    pub config: Arc<Config>,
    pub outbound: OutboundQueue,
    pub subscriptions: Arc<SubscriptionRegistry>,
    pub sampling: SamplingClient,
    pub recorder: Arc<dyn Recorder>,
    pub cancellation: CancellationToken,
    pub progress_token: Option<RequestId>,
}

impl ToolContext {
    pub fn progress_reporter(&self) -> ProgressReporter {
        ProgressReporter::new(self.outbound.clone(), self.progress_token.clone())
    }
}

/// Thin adapter over the outbound queue that obeys the monotonicity rule
/// (spec §4.1: "a single handler's progress notifications are emitted in
/// monotonic order"). A no-op when the caller supplied no progress token.
pub struct ProgressReporter {
    outbound: OutboundQueue,
    token: Option<RequestId>,
    last_progress: AtomicU64,
}

impl ProgressReporter {
    fn new(outbound: OutboundQueue, token: Option<RequestId>) -> Self {
        Self {
            outbound,
            token,
            last_progress: AtomicU64::new(0),
        }
    }

    pub fn report(&self, progress: u64, total: Option<u64>, message: impl Into<String>) {
        let Some(token) = &self.token else { return };
        let previous = self.last_progress.fetch_max(progress, Ordering::SeqCst);
        if progress < previous {
            return;
        }
        self.outbound.send_notification(crate::protocol::JsonRpcNotification::new(
            crate::protocol::methods::NOTIFICATIONS_PROGRESS,
            serde_json::to_value(ProgressNotification {
                progress_token: token.clone(),
                progress,
                total,
                message: Some(message.into()),
            })
            .unwrap_or(Value::Null),
        ));
    }
}

pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<ToolCallResult, McpError>> + Send + 'a>>;

/// A single named tool. Mirrors the teacher's `McpTool` trait, generalized
/// to return a boxed future so the registry stays dyn-dispatchable.
pub trait McpTool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn input_schema(&self) -> Value;
    fn call<'a>(&'a self, ctx: &'a ToolContext, arguments: Value) -> ToolFuture<'a>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<&'static str, Box<dyn McpTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        let mut registry = Self::default();
        registry.register(Box::new(search_catalog::SearchCatalog));
        registry.register(Box::new(checkout_book::CheckoutBook));
        registry.register(Box::new(return_book::ReturnBook));
        registry.register(Box::new(reserve_book::ReserveBook));
        registry.register(Box::new(bulk_import_books::BulkImportBooks));
        registry.register(Box::new(catalog_maintenance::CatalogMaintenance));
        registry.register(Box::new(generate_book_insights::GenerateBookInsights::default()));
        registry
    }

    fn register(&mut self, tool: Box<dyn McpTool>) {
        self.tools.insert(tool.name(), tool);
    }

    pub fn list(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub async fn call(&self, ctx: &ToolContext, params: ToolCallParams) -> Result<ToolCallResult, McpError> {
        let tool = self
            .tools
            .get(params.name.as_str())
            .ok_or_else(|| McpError::InvalidParams(format!("unknown tool: {}", params.name)))?;
        tool.call(ctx, params.arguments).await
    }
}

/// Common helper: extract a required string field from tool arguments.
pub fn require_str<'a>(arguments: &'a Value, field: &str) -> Result<&'a str, McpError> {
    arguments
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| McpError::InvalidParams(format!("missing or non-string field: {field}")))
}

pub fn optional_str<'a>(arguments: &'a Value, field: &str) -> Option<&'a str> {
    arguments.get(field).and_then(Value::as_str)
}

pub fn optional_bool(arguments: &Value, field: &str) -> bool {
    arguments.get(field).and_then(Value::as_bool).unwrap_or(false)
}

pub fn optional_u32(arguments: &Value, field: &str) -> Option<u32> {
    arguments.get(field).and_then(Value::as_u64).map(|n| n as u32)
}

pub fn optional_i64(arguments: &Value, field: &str) -> Option<i64> {
    arguments.get(field).and_then(Value::as_i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_lists_all_seven_tools_sorted_by_name() {
        let registry = ToolRegistry::new();
        let names: Vec<String> = registry.list().into_iter().map(|t| t.name).collect();
        assert_eq!(names.len(), 7);
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn require_str_rejects_missing_field() {
        let args = serde_json::json!({});
        assert!(require_str(&args, "isbn").is_err());
    }
}
