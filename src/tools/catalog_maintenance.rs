//! `catalog_maintenance` tool (spec §4.3): recomputes derived fields,
//! rebuilds search indexes, repairs I1 violations by recounting. No
//! condition is fatal; violations found are reported.

use serde_json::{json, Value};

use crate::error::McpError;
use crate::protocol::ToolCallResult;
use crate::store::book_repo::BookRepo;

use super::{require_str, McpTool, ToolContext, ToolFuture};

pub struct CatalogMaintenance;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Integrity,
    Indexes,
    Stats,
    All,
}

impl Scope {
    fn parse(raw: &str) -> Result<Self, McpError> {
        match raw {
            "integrity" => Ok(Scope::Integrity),
            "indexes" => Ok(Scope::Indexes),
            "stats" => Ok(Scope::Stats),
            "all" => Ok(Scope::All),
            other => Err(McpError::InvalidParams(format!("unknown scope: {other}"))),
        }
    }
}

impl McpTool for CatalogMaintenance {
    fn name(&self) -> &'static str {
        "catalog_maintenance"
    }

    fn description(&self) -> &'static str {
        "Repair integrity violations, rebuild search indexes, and recompute aggregate stats."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "scope": {"type": "string", "enum": ["integrity", "indexes", "stats", "all"]}
            },
            "required": ["scope"],
            "additionalProperties": false
        })
    }

    fn call<'a>(&'a self, ctx: &'a ToolContext, arguments: Value) -> ToolFuture<'a> {
        Box::pin(async move {
            let scope = Scope::parse(require_str(&arguments, "scope")?)?;
            run_maintenance(ctx, scope).await
        })
    }
}

async fn run_maintenance(ctx: &ToolContext, scope: Scope) -> Result<ToolCallResult, McpError> {
    let reporter = ctx.progress_reporter();
    let steps: Vec<&str> = match scope {
        Scope::Integrity => vec!["integrity"],
        Scope::Indexes => vec!["indexes"],
        Scope::Stats => vec!["stats"],
        Scope::All => vec!["integrity", "indexes", "stats"],
    };
    let total = steps.len() as u64;

    let mut repaired: Vec<String> = Vec::new();
    let mut index_rebuilt = false;
    let mut stats: Option<Value> = None;

    for (i, step) in steps.iter().enumerate() {
        if ctx.cancellation.is_cancelled() {
            return Err(McpError::cancelled(i as u64, total - i as u64));
        }
        match *step {
            "integrity" => {
                let mut tx = ctx.store.begin().await.map_err(McpError::from)?;
                repaired = BookRepo::repair_availability(&mut tx).await.map_err(McpError::from)?;
                tx.commit().await.map_err(crate::error::DomainError::from).map_err(McpError::from)?;
            }
            "indexes" => {
                sqlx::query("REINDEX").execute(ctx.store.pool()).await.map_err(crate::error::DomainError::from).map_err(McpError::from)?;
                index_rebuilt = true;
            }
            "stats" => {
                let (_, total_books) =
                    BookRepo::list(ctx.store.pool(), &Default::default(), 1, 1).await.map_err(McpError::from)?;
                stats = Some(json!({ "total_books": total_books }));
            }
            _ => unreachable!(),
        }
        reporter.report((i + 1) as u64, Some(total), format!("completed {step}"));
    }

    Ok(ToolCallResult::ok(json!({
        "scope": match scope {
            Scope::Integrity => "integrity",
            Scope::Indexes => "indexes",
            Scope::Stats => "stats",
            Scope::All => "all",
        },
        "repaired": repaired,
        "index_rebuilt": index_rebuilt,
        "stats": stats,
    })))
}
