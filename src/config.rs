//! Server configuration (spec §6), loaded from CLI flags or environment.
//!
//! Mirrors the teacher's `McpServerConfig` convention: a plain struct with
//! sensible defaults, consumed directly by services rather than re-parsed
//! from a config file. Loading config files, if any, is an external concern.

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "library-mcp", about = "Educational MCP library reference server")]
pub struct Config {
    /// Path to the SQLite database file.
    #[arg(long, env = "LIBRARY_MCP_DATABASE_PATH", default_value = "library.db")]
    pub database_path: String,

    /// Default loan period in days, used when a checkout omits `due_date`.
    #[arg(long, env = "LIBRARY_MCP_LOAN_DEFAULT_DAYS", default_value_t = 21)]
    pub loan_default_days: i64,

    /// Maximum allowed offset between checkout_date and due_date.
    #[arg(long, env = "LIBRARY_MCP_LOAN_MAX_DAYS", default_value_t = 60)]
    pub loan_max_days: i64,

    /// Late fee charged per day overdue.
    #[arg(long, env = "LIBRARY_MCP_LATE_FEE_PER_DAY", default_value_t = 0.25)]
    pub late_fee_per_day: f64,

    /// Cap on a single checkout's assessed late fee.
    #[arg(long, env = "LIBRARY_MCP_LATE_FEE_MAX_FEE", default_value_t = 15.0)]
    pub late_fee_max_fee: f64,

    /// Timeout for a `sampling/createMessage` round trip.
    #[arg(long, env = "LIBRARY_MCP_SAMPLING_TIMEOUT_SECONDS", default_value_t = 30)]
    pub sampling_timeout_seconds: u64,

    /// Default page size for paginated listings.
    #[arg(long, env = "LIBRARY_MCP_PAGINATION_DEFAULT_PAGE_SIZE", default_value_t = 20)]
    pub pagination_default_page_size: u32,

    /// Maximum page size a caller may request.
    #[arg(long, env = "LIBRARY_MCP_PAGINATION_MAX_PAGE_SIZE", default_value_t = 100)]
    pub pagination_max_page_size: u32,

    /// Enable span/counter emission. A null recorder is used when false.
    #[arg(long, env = "LIBRARY_MCP_OBSERVABILITY_ENABLED", default_value_t = true)]
    pub observability_enabled: bool,

    /// Fraction of requests sampled for detailed span attributes, in [0,1].
    #[arg(long, env = "LIBRARY_MCP_OBSERVABILITY_SAMPLE_RATE", default_value_t = 1.0)]
    pub observability_sample_rate: f64,

    /// Output budget: maximum serialized response size, in bytes.
    #[arg(long, env = "LIBRARY_MCP_OUTPUT_BUDGET_MAX_BYTES", default_value_t = 1_048_576)]
    pub output_budget_max_bytes: usize,

    /// Output budget: maximum rows returned from a single read or import.
    #[arg(long, env = "LIBRARY_MCP_OUTPUT_BUDGET_MAX_ROWS", default_value_t = 10_000)]
    pub output_budget_max_rows: usize,

    /// Root directory `bulk_import_books`'s `source.path` must resolve
    /// under; rejects traversal outside it.
    #[arg(long, env = "LIBRARY_MCP_IMPORT_ROOT", default_value = ".")]
    pub import_root: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "library.db".to_string(),
            loan_default_days: 21,
            loan_max_days: 60,
            late_fee_per_day: 0.25,
            late_fee_max_fee: 15.0,
            sampling_timeout_seconds: 30,
            pagination_default_page_size: 20,
            pagination_max_page_size: 100,
            observability_enabled: true,
            observability_sample_rate: 1.0,
            output_budget_max_bytes: 1_048_576,
            output_budget_max_rows: 10_000,
            import_root: ".".to_string(),
        }
    }
}

impl Config {
    pub fn sqlite_url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.database_path)
    }

    pub fn output_budget(&self) -> crate::output_budget::OutputBudget {
        crate::output_budget::OutputBudget::new(self.output_budget_max_bytes, self.output_budget_max_rows)
    }
}
