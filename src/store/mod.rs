//! Persistence layer (spec §4.6): a relational store exposing a
//! transactional session and per-entity repositories.
//!
//! Grounded on the teacher's `casparian_db` pattern of a pool-backed store
//! with scoped session acquisition, adapted from DuckDB-via-sync-handle to
//! `sqlx`'s async `SqlitePool` since the session engine itself is async.
//! Each mutating tool call acquires one transaction via [`Store::begin`]
//! and commits or rolls back on every exit path, including cancellation.

pub mod author_repo;
pub mod book_repo;
pub mod circulation_repo;
pub mod patron_repo;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::str::FromStr;

use crate::error::DomainError;

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn connect(database_path: &str) -> Result<Self, DomainError> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{database_path}"))
            .map_err(|e| DomainError::Storage(sqlx::Error::Configuration(Box::new(e))))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// In-memory store for tests; never touches disk.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self, DomainError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), DomainError> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Scoped transaction acquisition: each mutating tool call runs exactly
    /// one of these, committed on success and rolled back on every other
    /// exit path (error, cancellation) by simply dropping it unconsumed.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, DomainError> {
        Ok(self.pool.begin().await?)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS authors (
    author_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    biography TEXT
);

CREATE TABLE IF NOT EXISTS books (
    isbn TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    author_id TEXT NOT NULL REFERENCES authors(author_id),
    genre TEXT NOT NULL,
    publication_year INTEGER NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    total_copies INTEGER NOT NULL,
    available_copies INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS patrons (
    patron_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    membership_status TEXT NOT NULL,
    outstanding_fines REAL NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS checkouts (
    checkout_id TEXT PRIMARY KEY,
    isbn TEXT NOT NULL REFERENCES books(isbn),
    patron_id TEXT NOT NULL REFERENCES patrons(patron_id),
    checkout_date TEXT NOT NULL,
    due_date TEXT NOT NULL,
    return_date TEXT,
    condition_on_return TEXT,
    late_fee_assessed REAL NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS reservations (
    reservation_id TEXT PRIMARY KEY,
    isbn TEXT NOT NULL REFERENCES books(isbn),
    patron_id TEXT NOT NULL REFERENCES patrons(patron_id),
    created_at TEXT NOT NULL,
    queue_position INTEGER NOT NULL,
    status TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_checkouts_isbn_open ON checkouts(isbn, return_date);
CREATE INDEX IF NOT EXISTS idx_reservations_isbn_status ON reservations(isbn, status);
CREATE INDEX IF NOT EXISTS idx_books_search ON books(title, description);
"#;
