//! `bulk_import_books` tool (spec §4.3). Upserts Books and Authors in
//! batches, each batch one transaction; idempotent per-record (upsert by
//! ISBN); emits progress per batch and honours cancellation between
//! batches, committing completed work before unwinding (spec §5, S5).
//!
//! `source` is either an inline `records` array or a `path` to a JSON file
//! of records; a whole-file parse error on the latter fails the call
//! (spec §4.3) rather than skipping individual records.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{json, Value};

use crate::domain::{Author, Book, Genre, Isbn13};
use crate::error::McpError;
use crate::protocol::ToolCallResult;
use crate::store::author_repo::AuthorRepo;
use crate::store::book_repo::BookRepo;

use super::{optional_u32, McpTool, ToolContext, ToolFuture};

pub struct BulkImportBooks;

#[derive(Debug, Deserialize)]
struct ImportRecord {
    isbn: String,
    title: String,
    author_id: String,
    #[serde(default)]
    author_name: Option<String>,
    genre: String,
    publication_year: i32,
    #[serde(default = "default_copies")]
    total_copies: i64,
    #[serde(default)]
    description: String,
}

fn default_copies() -> i64 {
    1
}

#[derive(Debug, serde::Serialize, Default)]
struct ImportError {
    index: usize,
    isbn: Option<String>,
    reason: String,
}

impl McpTool for BulkImportBooks {
    fn name(&self) -> &'static str {
        "bulk_import_books"
    }

    fn description(&self) -> &'static str {
        "Bulk import or update books (and their authors) from an inline record list."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "source": {
                    "type": "object",
                    "properties": {
                        "records": {"type": "array", "items": {"type": "object"}},
                        "path": {"type": "string"}
                    }
                },
                "batch_size": {"type": "integer", "minimum": 1, "maximum": 500}
            },
            "required": ["source"],
            "additionalProperties": false
        })
    }

    fn call<'a>(&'a self, ctx: &'a ToolContext, arguments: Value) -> ToolFuture<'a> {
        Box::pin(async move {
            let batch_size = optional_u32(&arguments, "batch_size").unwrap_or(50).clamp(1, 500) as usize;
            let source = arguments
                .get("source")
                .ok_or_else(|| McpError::InvalidParams("source is required".to_string()))?;

            let loaded;
            let records_raw: &[Value] = match source.get("path").and_then(Value::as_str) {
                Some(path) => {
                    loaded = load_records_from_path(&ctx.config.import_root, path).await?;
                    &loaded
                }
                None => source
                    .get("records")
                    .and_then(Value::as_array)
                    .ok_or_else(|| McpError::InvalidParams("source must set records or path".to_string()))?,
            };
            ctx.config.output_budget().check_rows(records_raw.len())?;

            run_import(ctx, records_raw, batch_size).await
        })
    }
}

/// Resolves `raw_path` under `import_root`, rejecting traversal outside it,
/// reads the file, and parses it as a JSON array of import records. A
/// malformed file fails the whole call rather than being skipped record by
/// record, per spec.
async fn load_records_from_path(import_root: &str, raw_path: &str) -> Result<Vec<Value>, McpError> {
    let root = Path::new(import_root)
        .canonicalize()
        .map_err(|e| McpError::InvalidParams(format!("import root {import_root} is not accessible: {e}")))?;
    let candidate: PathBuf = root.join(raw_path);
    let resolved = candidate
        .canonicalize()
        .map_err(|e| McpError::InvalidParams(format!("source.path {raw_path} is not accessible: {e}")))?;
    if !resolved.starts_with(&root) {
        return Err(McpError::InvalidParams(format!(
            "source.path {raw_path} escapes the configured import root"
        )));
    }

    let text = tokio::fs::read_to_string(&resolved)
        .await
        .map_err(|e| McpError::InvalidParams(format!("failed to read {raw_path}: {e}")))?;
    let records: Vec<Value> = serde_json::from_str(&text)
        .map_err(|e| McpError::InvalidParams(format!("{raw_path} is not a valid JSON record array: {e}")))?;
    Ok(records)
}

async fn run_import(ctx: &ToolContext, records_raw: &[Value], batch_size: usize) -> Result<ToolCallResult, McpError> {
    let total = records_raw.len() as u64;
    let reporter = ctx.progress_reporter();

    let mut imported = 0u64;
    let mut updated = 0u64;
    let mut skipped = 0u64;
    let mut errors: Vec<ImportError> = Vec::new();
    let mut processed = 0u64;

    for (batch_index, chunk) in records_raw.chunks(batch_size).enumerate() {
        let mut tx = ctx.store.begin().await.map_err(McpError::from)?;

        for (offset, raw) in chunk.iter().enumerate() {
            let index = batch_index * batch_size + offset;
            match apply_record(&mut tx, raw).await {
                Ok(true) => updated += 1,
                Ok(false) => imported += 1,
                Err(reason) => {
                    skipped += 1;
                    errors.push(ImportError {
                        index,
                        isbn: raw.get("isbn").and_then(Value::as_str).map(str::to_string),
                        reason,
                    });
                }
            }
        }

        tx.commit().await.map_err(crate::error::DomainError::from).map_err(McpError::from)?;
        processed += chunk.len() as u64;

        reporter.report(processed, Some(total), format!("imported batch {}", batch_index + 1));

        if ctx.cancellation.is_cancelled() {
            return Err(McpError::cancelled(imported + updated, total - processed));
        }
    }

    Ok(ToolCallResult::ok(json!({
        "imported": imported,
        "updated": updated,
        "skipped": skipped,
        "errors": errors,
    })))
}

/// Returns `Ok(true)` if the record updated an existing book, `Ok(false)`
/// if it created one, or `Err(reason)` if the record is malformed (the
/// record is skipped, not the whole batch).
async fn apply_record(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>, raw: &Value) -> Result<bool, String> {
    let record: ImportRecord = serde_json::from_value(raw.clone()).map_err(|e| e.to_string())?;

    let isbn = Isbn13::parse(&record.isbn).map_err(|e| e.to_string())?;
    let genre = Genre::parse(&record.genre).map_err(|e| e.to_string())?;
    Book::validate_new(&record.isbn, &record.title, &record.author_id, record.publication_year, record.total_copies)
        .map_err(|e| e.to_string())?;

    if let Some(name) = &record.author_name {
        Author::validate_new(&record.author_id, name).map_err(|e| e.to_string())?;
        AuthorRepo::upsert(
            &mut **tx,
            &Author {
                author_id: record.author_id.clone(),
                name: name.clone(),
                biography: None,
            },
        )
        .await
        .map_err(|e| e.to_string())?;
    } else if !AuthorRepo::get(&mut **tx, &record.author_id)
        .await
        .map_err(|e| e.to_string())?
        .is_some()
    {
        return Err(format!("author_id {} not found and no author_name provided", record.author_id));
    }

    let book = Book {
        isbn,
        title: record.title,
        author_id: record.author_id,
        genre,
        publication_year: record.publication_year,
        description: record.description,
        total_copies: record.total_copies,
        available_copies: record.total_copies,
    };
    BookRepo::upsert(&mut **tx, &book).await.map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationRegistry;
    use crate::config::Config;
    use crate::observability::recorder_for;
    use crate::outbound::OutboundQueue;
    use crate::resources::subscriptions::SubscriptionRegistry;
    use crate::sampling::SamplingClient;
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

    fn record(isbn: &str) -> Value {
        json!({
            "isbn": isbn,
            "title": "Title",
            "author_id": "a1",
            "author_name": "Author Name",
            "genre": "fiction",
            "publication_year": 2020,
            "total_copies": 2,
        })
    }

    #[tokio::test]
    async fn imports_valid_records_and_skips_malformed_ones() {
        let ctx = test_ctx().await;
        let records = vec![record("9780134190440"), json!({"isbn": "bad"})];
        let result = BulkImportBooks.call(&ctx, json!({"source": {"records": records}})).await.unwrap();
        let text = match &result.content[0] {
            crate::protocol::ContentBlock::Text { text } => text.clone(),
        };
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["imported"], 1);
        assert_eq!(value["skipped"], 1);
    }

    #[tokio::test]
    async fn reimporting_same_record_counts_as_updated() {
        let ctx = test_ctx().await;
        let records = vec![record("9780134190440")];
        BulkImportBooks
            .call(&ctx, json!({"source": {"records": records.clone()}}))
            .await
            .unwrap();
        let result = BulkImportBooks.call(&ctx, json!({"source": {"records": records}})).await.unwrap();
        let text = match &result.content[0] {
            crate::protocol::ContentBlock::Text { text } => text.clone(),
        };
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["updated"], 1);
        assert_eq!(value["imported"], 0);
    }

    #[tokio::test]
    async fn import_exceeding_the_output_budget_is_rejected_outright() {
        let mut ctx = test_ctx().await;
        ctx.config = Arc::new(Config {
            output_budget_max_rows: 2,
            ..Config::default()
        });
        let records = vec![record("9780134190440"), record("9780136291558"), record("9780132350884")];
        let err = BulkImportBooks
            .call(&ctx, json!({"source": {"records": records}}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), -32602);
    }

    #[tokio::test]
    async fn imports_records_from_a_file_under_the_import_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("batch.json"), json!([record("9780134190440")]).to_string()).unwrap();

        let mut ctx = test_ctx().await;
        ctx.config = Arc::new(Config {
            import_root: dir.path().to_str().unwrap().to_string(),
            ..Config::default()
        });

        let result = BulkImportBooks
            .call(&ctx, json!({"source": {"path": "batch.json"}}))
            .await
            .unwrap();
        let text = match &result.content[0] {
            crate::protocol::ContentBlock::Text { text } => text.clone(),
        };
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["imported"], 1);
    }

    #[tokio::test]
    async fn malformed_import_file_fails_the_whole_call() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "not json").unwrap();

        let mut ctx = test_ctx().await;
        ctx.config = Arc::new(Config {
            import_root: dir.path().to_str().unwrap().to_string(),
            ..Config::default()
        });

        let err = BulkImportBooks
            .call(&ctx, json!({"source": {"path": "bad.json"}}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), -32602);
    }

    #[tokio::test]
    async fn import_path_escaping_the_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = test_ctx().await;
        ctx.config = Arc::new(Config {
            import_root: dir.path().to_str().unwrap().to_string(),
            ..Config::default()
        });

        let err = BulkImportBooks
            .call(&ctx, json!({"source": {"path": "../../etc/passwd"}}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), -32602);
    }

    #[tokio::test]
    async fn cancellation_mid_import_commits_completed_batches() {
        let ctx = test_ctx().await;
        ctx.cancellation.cancel();
        let records: Vec<Value> = (0..10)
            .map(|i| record(&format!("978013419044{}", i % 10)))
            .collect();
        let err = run_import(&ctx, &records, 2).await.unwrap_err();
        assert_eq!(err.code(), -32800);
    }
}
