//! BookRepo (spec §4.6): get_by_isbn, list(filters, page), upsert,
//! adjust_available_copies(delta), exists.

use sqlx::{Row, Sqlite};

use crate::domain::{Book, BookSummary, Genre, Isbn13};
use crate::error::DomainError;

/// Search/listing filters shared by `search_catalog` and resource URIs.
#[derive(Debug, Clone, Default)]
pub struct BookFilters {
    pub query: Option<String>,
    pub genre: Option<Genre>,
    pub author_id: Option<String>,
    pub available_only: bool,
    pub published_after: Option<i32>,
}

fn row_to_book(row: &sqlx::sqlite::SqliteRow) -> Result<Book, DomainError> {
    let isbn: String = row.try_get("isbn")?;
    let genre: String = row.try_get("genre")?;
    Ok(Book {
        isbn: Isbn13::parse(&isbn)?,
        title: row.try_get("title")?,
        author_id: row.try_get("author_id")?,
        genre: Genre::parse(&genre)?,
        publication_year: row.try_get("publication_year")?,
        description: row.try_get("description")?,
        total_copies: row.try_get("total_copies")?,
        available_copies: row.try_get("available_copies")?,
    })
}

pub struct BookRepo;

impl BookRepo {
    pub async fn get_by_isbn<'c, E>(executor: E, isbn: &str) -> Result<Option<Book>, DomainError>
    where
        E: sqlx::Executor<'c, Database = Sqlite>,
    {
        let row = sqlx::query("SELECT * FROM books WHERE isbn = ?")
            .bind(isbn)
            .fetch_optional(executor)
            .await?;
        row.map(|r| row_to_book(&r)).transpose()
    }

    pub async fn exists<'c, E>(executor: E, isbn: &str) -> Result<bool, DomainError>
    where
        E: sqlx::Executor<'c, Database = Sqlite>,
    {
        let row = sqlx::query("SELECT 1 FROM books WHERE isbn = ?")
            .bind(isbn)
            .fetch_optional(executor)
            .await?;
        Ok(row.is_some())
    }

    /// Lists books matching `filters`, ordered `(publication_year desc, isbn
    /// asc)` (spec §4.2), returning the page plus the total matching count.
    pub async fn list<'c, E>(
        executor: E,
        filters: &BookFilters,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<BookSummary>, u64), DomainError>
    where
        E: sqlx::Executor<'c, Database = Sqlite> + Copy,
    {
        let mut clauses: Vec<String> = Vec::new();
        if filters.query.is_some() {
            clauses.push("(title LIKE '%' || ? || '%' OR description LIKE '%' || ? || '%')".to_string());
        }
        if filters.genre.is_some() {
            clauses.push("genre = ?".to_string());
        }
        if filters.author_id.is_some() {
            clauses.push("author_id = ?".to_string());
        }
        if filters.available_only {
            clauses.push("available_copies > 0".to_string());
        }
        if filters.published_after.is_some() {
            clauses.push("publication_year > ?".to_string());
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) as n FROM books{where_sql}");
        let list_sql = format!(
            "SELECT * FROM books{where_sql} ORDER BY publication_year DESC, isbn ASC LIMIT ? OFFSET ?"
        );

        let mut count_query = sqlx::query(&count_sql);
        count_query = bind_filters(count_query, filters);
        let total: i64 = count_query.fetch_one(executor).await?.try_get("n")?;

        let mut list_query = sqlx::query(&list_sql);
        list_query = bind_filters(list_query, filters);
        let offset = (page.saturating_sub(1)) as i64 * page_size as i64;
        list_query = list_query.bind(page_size as i64).bind(offset);

        let rows = list_query.fetch_all(executor).await?;
        let books = rows
            .iter()
            .map(row_to_book)
            .collect::<Result<Vec<_>, _>>()?;
        let summaries = books.iter().map(BookSummary::from).collect();
        Ok((summaries, total.max(0) as u64))
    }

    /// Upserts by ISBN (spec §4.3: `bulk_import_books` is idempotent
    /// per-record). Returns `true` if an existing row was updated.
    pub async fn upsert<'c, E>(executor: E, book: &Book) -> Result<bool, DomainError>
    where
        E: sqlx::Executor<'c, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"
            INSERT INTO books (isbn, title, author_id, genre, publication_year, description, total_copies, available_copies)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(isbn) DO UPDATE SET
                title = excluded.title,
                author_id = excluded.author_id,
                genre = excluded.genre,
                publication_year = excluded.publication_year,
                description = excluded.description,
                total_copies = excluded.total_copies
            "#,
        )
        .bind(book.isbn.as_str())
        .bind(&book.title)
        .bind(&book.author_id)
        .bind(book.genre.as_str())
        .bind(book.publication_year)
        .bind(&book.description)
        .bind(book.total_copies)
        .bind(book.available_copies)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 0)
    }

    /// Adjusts `available_copies` by `delta` within the caller's
    /// transaction, upholding I1. Negative deltas (checkout) fail if they
    /// would drive availability below zero.
    pub async fn adjust_available_copies(
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        isbn: &str,
        delta: i64,
    ) -> Result<i64, DomainError> {
        let row = sqlx::query("SELECT available_copies, total_copies FROM books WHERE isbn = ?")
            .bind(isbn)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| DomainError::BookNotFound(isbn.to_string()))?;
        let available: i64 = row.try_get("available_copies")?;
        let total: i64 = row.try_get("total_copies")?;
        let new_available = available + delta;
        if new_available < 0 || new_available > total {
            return Err(DomainError::NoCopiesAvailable { isbn: isbn.to_string() });
        }
        sqlx::query("UPDATE books SET available_copies = ? WHERE isbn = ?")
            .bind(new_available)
            .bind(isbn)
            .execute(&mut **tx)
            .await?;
        Ok(new_available)
    }

    pub async fn count_for_genre<'c, E>(executor: E, genre: Genre) -> Result<u64, DomainError>
    where
        E: sqlx::Executor<'c, Database = Sqlite>,
    {
        let row = sqlx::query("SELECT COUNT(*) as n FROM books WHERE genre = ?")
            .bind(genre.as_str())
            .fetch_one(executor)
            .await?;
        let n: i64 = row.try_get("n")?;
        Ok(n.max(0) as u64)
    }

    /// Recomputes `available_copies` from open checkouts (I1), used by
    /// `catalog_maintenance(scope=integrity)`. Returns the ISBNs repaired.
    pub async fn repair_availability(
        tx: &mut sqlx::Transaction<'_, Sqlite>,
    ) -> Result<Vec<String>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT b.isbn as isbn, b.total_copies as total_copies, b.available_copies as available_copies,
                   (SELECT COUNT(*) FROM checkouts c WHERE c.isbn = b.isbn AND c.return_date IS NULL) as open_count
            FROM books b
            "#,
        )
        .fetch_all(&mut **tx)
        .await?;

        let mut repaired = Vec::new();
        for row in rows {
            let isbn: String = row.try_get("isbn")?;
            let total: i64 = row.try_get("total_copies")?;
            let available: i64 = row.try_get("available_copies")?;
            let open_count: i64 = row.try_get("open_count")?;
            let correct = total - open_count;
            if correct != available {
                sqlx::query("UPDATE books SET available_copies = ? WHERE isbn = ?")
                    .bind(correct)
                    .bind(&isbn)
                    .execute(&mut **tx)
                    .await?;
                repaired.push(isbn);
            }
        }
        Ok(repaired)
    }
}

fn bind_filters<'q>(
    mut query: sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    filters: &'q BookFilters,
) -> sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    if let Some(q) = &filters.query {
        query = query.bind(q).bind(q);
    }
    if let Some(g) = &filters.genre {
        query = query.bind(g.as_str());
    }
    if let Some(a) = &filters.author_id {
        query = query.bind(a);
    }
    if let Some(y) = &filters.published_after {
        query = query.bind(y);
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    fn sample_book(isbn: &str, year: i32, copies: i64) -> Book {
        Book {
            isbn: Isbn13::parse(isbn).unwrap(),
            title: "Sample".to_string(),
            author_id: "a1".to_string(),
            genre: Genre::Fiction,
            publication_year: year,
            description: "desc".to_string(),
            total_copies: copies,
            available_copies: copies,
        }
    }

    async fn seed_author(store: &Store) {
        sqlx::query("INSERT INTO authors (author_id, name, biography) VALUES ('a1', 'Author', NULL)")
            .execute(store.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let store = Store::in_memory().await.unwrap();
        seed_author(&store).await;
        let book = sample_book("9780134190440", 2020, 3);
        BookRepo::upsert(store.pool(), &book).await.unwrap();
        let fetched = BookRepo::get_by_isbn(store.pool(), "9780134190440").await.unwrap().unwrap();
        assert_eq!(fetched.title, "Sample");
        assert_eq!(fetched.available_copies, 3);
    }

    #[tokio::test]
    async fn list_orders_by_year_desc_then_isbn_asc() {
        let store = Store::in_memory().await.unwrap();
        seed_author(&store).await;
        BookRepo::upsert(store.pool(), &sample_book("9780134190440", 2020, 1)).await.unwrap();
        BookRepo::upsert(store.pool(), &sample_book("9780136291558", 2022, 1)).await.unwrap();
        let (results, total) = BookRepo::list(store.pool(), &BookFilters::default(), 1, 20).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(results[0].isbn, "9780136291558");
        assert_eq!(results[1].isbn, "9780134190440");
    }

    #[tokio::test]
    async fn adjust_available_copies_rejects_overdraw() {
        let store = Store::in_memory().await.unwrap();
        seed_author(&store).await;
        BookRepo::upsert(store.pool(), &sample_book("9780134190440", 2020, 1)).await.unwrap();
        let mut tx = store.begin().await.unwrap();
        BookRepo::adjust_available_copies(&mut tx, "9780134190440", -1).await.unwrap();
        let err = BookRepo::adjust_available_copies(&mut tx, "9780134190440", -1).await.unwrap_err();
        assert!(matches!(err, DomainError::NoCopiesAvailable { .. }));
    }
}
