//! Book entity (spec §3).

use chrono::Datelike;
use serde::Serialize;

use super::genre::Genre;
use super::isbn::Isbn13;
use crate::error::DomainError;

#[derive(Debug, Clone, Serialize)]
pub struct Book {
    pub isbn: Isbn13,
    pub title: String,
    pub author_id: String,
    pub genre: Genre,
    pub publication_year: i32,
    pub description: String,
    pub total_copies: i64,
    pub available_copies: i64,
}

impl Book {
    /// Validates the fields that are checked at construction time,
    /// independent of store-level uniqueness/referential checks.
    pub fn validate_new(
        isbn: &str,
        title: &str,
        author_id: &str,
        publication_year: i32,
        total_copies: i64,
    ) -> Result<(), DomainError> {
        Isbn13::parse(isbn)?;
        if title.trim().is_empty() {
            return Err(DomainError::InvalidArgument("title must not be empty".to_string()));
        }
        if author_id.trim().is_empty() {
            return Err(DomainError::InvalidArgument("author_id must not be empty".to_string()));
        }
        let current_year = chrono::Utc::now().year();
        if publication_year > current_year {
            return Err(DomainError::InvalidArgument(format!(
                "publication_year {publication_year} is in the future"
            )));
        }
        if total_copies < 0 {
            return Err(DomainError::InvalidArgument("total_copies must be >= 0".to_string()));
        }
        Ok(())
    }
}

/// Lightweight projection used in list results (spec §4.2, §4.3).
#[derive(Debug, Clone, Serialize)]
pub struct BookSummary {
    pub isbn: String,
    pub title: String,
    pub author_id: String,
    pub genre: Genre,
    pub publication_year: i32,
    pub available_copies: i64,
    pub total_copies: i64,
}

impl From<&Book> for BookSummary {
    fn from(b: &Book) -> Self {
        Self {
            isbn: b.isbn.to_string(),
            title: b.title.clone(),
            author_id: b.author_id.clone(),
            genre: b.genre,
            publication_year: b.publication_year,
            available_copies: b.available_copies,
            total_copies: b.total_copies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_future_publication_year() {
        let err = Book::validate_new("9780134190440", "Title", "a1", 9999, 1).unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[test]
    fn rejects_empty_title() {
        assert!(Book::validate_new("9780134190440", "  ", "a1", 2020, 1).is_err());
    }

    #[test]
    fn accepts_well_formed_book() {
        assert!(Book::validate_new("9780134190440", "Effective Rust", "a1", 2021, 3).is_ok());
    }
}
