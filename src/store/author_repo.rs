//! AuthorRepo (spec §4.6): get, upsert, list_for_books.

use sqlx::{Row, Sqlite};

use crate::domain::Author;
use crate::error::DomainError;

pub struct AuthorRepo;

impl AuthorRepo {
    pub async fn get<'c, E>(executor: E, author_id: &str) -> Result<Option<Author>, DomainError>
    where
        E: sqlx::Executor<'c, Database = Sqlite>,
    {
        let row = sqlx::query("SELECT * FROM authors WHERE author_id = ?")
            .bind(author_id)
            .fetch_optional(executor)
            .await?;
        row.map(|r| -> Result<Author, DomainError> {
            Ok(Author {
                author_id: r.try_get("author_id")?,
                name: r.try_get("name")?,
                biography: r.try_get("biography")?,
            })
        })
        .transpose()
    }

    pub async fn upsert<'c, E>(executor: E, author: &Author) -> Result<(), DomainError>
    where
        E: sqlx::Executor<'c, Database = Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO authors (author_id, name, biography) VALUES (?, ?, ?)
            ON CONFLICT(author_id) DO UPDATE SET name = excluded.name, biography = excluded.biography
            "#,
        )
        .bind(&author.author_id)
        .bind(&author.name)
        .bind(&author.biography)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Returns authors keyed by `author_id` for the given ids, used when
    /// assembling book detail views that embed author name (spec §4.2).
    pub async fn list_for_books<'c, E>(
        executor: E,
        author_ids: &[String],
    ) -> Result<Vec<Author>, DomainError>
    where
        E: sqlx::Executor<'c, Database = Sqlite>,
    {
        if author_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = author_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!("SELECT * FROM authors WHERE author_id IN ({placeholders})");
        let mut query = sqlx::query(&sql);
        for id in author_ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(executor).await?;
        rows.iter()
            .map(|r| -> Result<Author, DomainError> {
                Ok(Author {
                    author_id: r.try_get("author_id")?,
                    name: r.try_get("name")?,
                    biography: r.try_get("biography")?,
                })
            })
            .collect()
    }

    /// Used by `AuthorInUse` enforcement before any future author-removal
    /// operation; the spec forbids removal while referenced, so callers
    /// check this before attempting a delete (no delete method is exposed
    /// here because nothing in the tool/resource surface deletes authors).
    pub async fn is_referenced<'c, E>(executor: E, author_id: &str) -> Result<bool, DomainError>
    where
        E: sqlx::Executor<'c, Database = Sqlite>,
    {
        let row = sqlx::query("SELECT 1 FROM books WHERE author_id = ? LIMIT 1")
            .bind(author_id)
            .fetch_optional(executor)
            .await?;
        Ok(row.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let store = Store::in_memory().await.unwrap();
        let author = Author {
            author_id: "a1".to_string(),
            name: "Jane Doe".to_string(),
            biography: Some("bio".to_string()),
        };
        AuthorRepo::upsert(store.pool(), &author).await.unwrap();
        let fetched = AuthorRepo::get(store.pool(), "a1").await.unwrap().unwrap();
        assert_eq!(fetched.name, "Jane Doe");
    }

    #[tokio::test]
    async fn get_unknown_author_is_none() {
        let store = Store::in_memory().await.unwrap();
        assert!(AuthorRepo::get(store.pool(), "missing").await.unwrap().is_none());
    }
}
