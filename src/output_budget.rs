//! Output budget (spec §11): a size/row-count safety net wrapped around
//! `resources/read` and the `search_catalog`/`bulk_import_books` tools,
//! belt to pagination's suspenders. Grounded on the teacher's
//! `security::OutputBudget`, carried over with the same two knobs
//! (max response bytes, max rows) and the same truncate-don't-fail posture
//! for read paths.

use crate::error::McpError;

#[derive(Debug, Clone, Copy)]
pub struct OutputBudget {
    max_bytes: usize,
    max_rows: usize,
}

impl OutputBudget {
    pub fn new(max_bytes: usize, max_rows: usize) -> Self {
        Self { max_bytes, max_rows }
    }

    /// Default budget (1MB, 10K rows), matching the teacher's defaults.
    pub fn default_budget() -> Self {
        Self {
            max_bytes: 1024 * 1024,
            max_rows: 10_000,
        }
    }

    /// Truncates a row list to `max_rows`, reporting whether it did.
    pub fn enforce_rows<T>(&self, rows: Vec<T>) -> (Vec<T>, bool) {
        if rows.len() <= self.max_rows {
            (rows, false)
        } else {
            (rows.into_iter().take(self.max_rows).collect(), true)
        }
    }

    /// Truncates a serialized body to `max_bytes` at a char boundary,
    /// reporting whether it did.
    pub fn enforce_size(&self, content: String) -> (String, bool) {
        if content.len() <= self.max_bytes {
            (content, false)
        } else {
            let truncated = content
                .char_indices()
                .take_while(|(i, _)| *i < self.max_bytes)
                .map(|(_, c)| c)
                .collect();
            (truncated, true)
        }
    }

    /// Rejects an oversized input outright rather than truncating it —
    /// used on the input side of `bulk_import_books`, where silently
    /// dropping records would corrupt the caller's intent.
    pub fn check_rows(&self, count: usize) -> Result<(), McpError> {
        if count > self.max_rows {
            Err(McpError::InvalidParams(format!(
                "request of {count} rows exceeds the output budget of {}",
                self.max_rows
            )))
        } else {
            Ok(())
        }
    }
}

impl Default for OutputBudget {
    fn default() -> Self {
        Self::default_budget()
    }
}
