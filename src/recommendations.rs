//! Deterministic recommendation ranking (spec §4.2, Open Question decision
//! recorded in SPEC_FULL.md §12), shared by the `library://recommendations`
//! resource and the `book_recommendations` prompt.
//!
//! Ranking: books in genres the patron has checked out more than once,
//! ordered by (checkout count in that genre desc, publication_year desc,
//! isbn asc), excluding books the patron currently holds or has already
//! borrowed, backfilled with the globally most-checked-out books if short.

use std::collections::{HashMap, HashSet};

use sqlx::Row;

use crate::domain::BookSummary;
use crate::error::DomainError;
use crate::store::Store;

pub async fn recommend_for_patron(
    store: &Store,
    patron_id: &str,
    count: usize,
) -> Result<Vec<BookSummary>, DomainError> {
    let history_rows = sqlx::query(
        r#"
        SELECT b.genre as genre, COUNT(*) as n
        FROM checkouts c JOIN books b ON b.isbn = c.isbn
        WHERE c.patron_id = ?
        GROUP BY b.genre
        HAVING COUNT(*) > 1
        ORDER BY n DESC
        "#,
    )
    .bind(patron_id)
    .fetch_all(store.pool())
    .await?;

    let favored_genres: Vec<(String, i64)> = history_rows
        .iter()
        .map(|r| -> Result<(String, i64), DomainError> { Ok((r.try_get("genre")?, r.try_get("n")?)) })
        .collect::<Result<_, _>>()?;

    let held_or_seen: HashSet<String> = sqlx::query("SELECT DISTINCT isbn FROM checkouts WHERE patron_id = ?")
        .bind(patron_id)
        .fetch_all(store.pool())
        .await?
        .iter()
        .map(|r| r.try_get::<String, _>("isbn"))
        .collect::<Result<_, _>>()?;

    let mut ranked: Vec<BookSummary> = Vec::new();
    let genre_rank: HashMap<String, i64> = favored_genres.into_iter().collect();

    for (genre, _n) in genre_rank.iter() {
        let rows = sqlx::query("SELECT * FROM books WHERE genre = ? ORDER BY publication_year DESC, isbn ASC")
            .bind(genre)
            .fetch_all(store.pool())
            .await?;
        for row in rows {
            let isbn: String = row.try_get("isbn")?;
            if held_or_seen.contains(&isbn) {
                continue;
            }
            ranked.push(BookSummary {
                isbn,
                title: row.try_get("title")?,
                author_id: row.try_get("author_id")?,
                genre: crate::domain::Genre::parse(&row.try_get::<String, _>("genre")?)?,
                publication_year: row.try_get("publication_year")?,
                available_copies: row.try_get("available_copies")?,
                total_copies: row.try_get("total_copies")?,
            });
        }
    }
    ranked.sort_by(|a, b| {
        let rank_a = genre_rank.get(a.genre.as_str()).copied().unwrap_or(0);
        let rank_b = genre_rank.get(b.genre.as_str()).copied().unwrap_or(0);
        rank_b
            .cmp(&rank_a)
            .then_with(|| b.publication_year.cmp(&a.publication_year))
            .then_with(|| a.isbn.cmp(&b.isbn))
    });
    ranked.dedup_by(|a, b| a.isbn == b.isbn);

    if ranked.len() < count {
        let backfill_rows = sqlx::query(
            r#"
            SELECT b.*, COUNT(c.checkout_id) as checkout_count
            FROM books b LEFT JOIN checkouts c ON c.isbn = b.isbn
            GROUP BY b.isbn
            ORDER BY checkout_count DESC, b.publication_year DESC, b.isbn ASC
            "#,
        )
        .fetch_all(store.pool())
        .await?;
        let seen: HashSet<String> = ranked.iter().map(|b| b.isbn.clone()).collect();
        for row in backfill_rows {
            if ranked.len() >= count {
                break;
            }
            let isbn: String = row.try_get("isbn")?;
            if seen.contains(&isbn) || held_or_seen.contains(&isbn) {
                continue;
            }
            ranked.push(BookSummary {
                isbn,
                title: row.try_get("title")?,
                author_id: row.try_get("author_id")?,
                genre: crate::domain::Genre::parse(&row.try_get::<String, _>("genre")?)?,
                publication_year: row.try_get("publication_year")?,
                available_copies: row.try_get("available_copies")?,
                total_copies: row.try_get("total_copies")?,
            });
        }
    }

    ranked.truncate(count);
    Ok(ranked)
}
