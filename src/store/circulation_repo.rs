//! CirculationRepo (spec §4.6): create_checkout, mark_returned,
//! list_active_for_patron, list_overdue, create_reservation,
//! next_queue_position(isbn), advance_queue(isbn).
//!
//! Availability decrements and queue appends happen within the caller's
//! transaction alongside `BookRepo::adjust_available_copies`, so I1 and I2
//! hold even under concurrent tool calls (spec §4.6) — SQLite's own
//! transaction serialization is the "row-level lock or equivalent".

use chrono::{DateTime, Utc};
use sqlx::{Row, Sqlite, Transaction};

use crate::domain::{Checkout, Reservation, ReservationStatus};
use crate::error::DomainError;

fn row_to_checkout(row: &sqlx::sqlite::SqliteRow) -> Result<Checkout, DomainError> {
    Ok(Checkout {
        checkout_id: row.try_get("checkout_id")?,
        isbn: row.try_get("isbn")?,
        patron_id: row.try_get("patron_id")?,
        checkout_date: parse_ts(row.try_get("checkout_date")?)?,
        due_date: parse_ts(row.try_get("due_date")?)?,
        return_date: row
            .try_get::<Option<String>, _>("return_date")?
            .map(|s| parse_ts(s))
            .transpose()?,
        condition_on_return: row.try_get("condition_on_return")?,
        late_fee_assessed: row.try_get("late_fee_assessed")?,
    })
}

fn parse_ts(raw: String) -> Result<DateTime<Utc>, DomainError> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DomainError::InvalidArgument(format!("bad timestamp {raw}: {e}")))
}

fn parse_reservation_status(raw: &str) -> Result<ReservationStatus, DomainError> {
    match raw {
        "active" => Ok(ReservationStatus::Active),
        "fulfilled" => Ok(ReservationStatus::Fulfilled),
        "cancelled" => Ok(ReservationStatus::Cancelled),
        "expired" => Ok(ReservationStatus::Expired),
        other => Err(DomainError::InvalidArgument(format!("unknown reservation status: {other}"))),
    }
}

fn row_to_reservation(row: &sqlx::sqlite::SqliteRow) -> Result<Reservation, DomainError> {
    let status: String = row.try_get("status")?;
    Ok(Reservation {
        reservation_id: row.try_get("reservation_id")?,
        isbn: row.try_get("isbn")?,
        patron_id: row.try_get("patron_id")?,
        created_at: parse_ts(row.try_get("created_at")?)?,
        queue_position: row.try_get("queue_position")?,
        status: parse_reservation_status(&status)?,
    })
}

pub struct CirculationRepo;

impl CirculationRepo {
    /// Fails with `DuplicateCheckout` (I4) if an open checkout already
    /// exists for `(isbn, patron_id)`.
    pub async fn create_checkout(
        tx: &mut Transaction<'_, Sqlite>,
        checkout_id: &str,
        isbn: &str,
        patron_id: &str,
        checkout_date: DateTime<Utc>,
        due_date: DateTime<Utc>,
    ) -> Result<Checkout, DomainError> {
        let existing = sqlx::query(
            "SELECT 1 FROM checkouts WHERE isbn = ? AND patron_id = ? AND return_date IS NULL",
        )
        .bind(isbn)
        .bind(patron_id)
        .fetch_optional(&mut **tx)
        .await?;
        if existing.is_some() {
            return Err(DomainError::DuplicateCheckout {
                isbn: isbn.to_string(),
                patron_id: patron_id.to_string(),
            });
        }

        sqlx::query(
            r#"
            INSERT INTO checkouts (checkout_id, isbn, patron_id, checkout_date, due_date, return_date, condition_on_return, late_fee_assessed)
            VALUES (?, ?, ?, ?, ?, NULL, NULL, 0)
            "#,
        )
        .bind(checkout_id)
        .bind(isbn)
        .bind(patron_id)
        .bind(checkout_date.to_rfc3339())
        .bind(due_date.to_rfc3339())
        .execute(&mut **tx)
        .await?;

        Ok(Checkout {
            checkout_id: checkout_id.to_string(),
            isbn: isbn.to_string(),
            patron_id: patron_id.to_string(),
            checkout_date,
            due_date,
            return_date: None,
            condition_on_return: None,
            late_fee_assessed: 0.0,
        })
    }

    pub async fn get_checkout<'c, E>(executor: E, checkout_id: &str) -> Result<Option<Checkout>, DomainError>
    where
        E: sqlx::Executor<'c, Database = Sqlite>,
    {
        let row = sqlx::query("SELECT * FROM checkouts WHERE checkout_id = ?")
            .bind(checkout_id)
            .fetch_optional(executor)
            .await?;
        row.as_ref().map(row_to_checkout).transpose()
    }

    pub async fn mark_returned(
        tx: &mut Transaction<'_, Sqlite>,
        checkout_id: &str,
        return_date: DateTime<Utc>,
        condition: Option<&str>,
        late_fee_assessed: f64,
    ) -> Result<Checkout, DomainError> {
        let existing = Self::get_checkout(&mut **tx, checkout_id)
            .await?
            .ok_or_else(|| DomainError::CheckoutNotFound(checkout_id.to_string()))?;
        if !existing.is_open() {
            return Err(DomainError::AlreadyReturned(checkout_id.to_string()));
        }

        sqlx::query(
            "UPDATE checkouts SET return_date = ?, condition_on_return = ?, late_fee_assessed = ? WHERE checkout_id = ?",
        )
        .bind(return_date.to_rfc3339())
        .bind(condition)
        .bind(late_fee_assessed)
        .bind(checkout_id)
        .execute(&mut **tx)
        .await?;

        Ok(Checkout {
            return_date: Some(return_date),
            condition_on_return: condition.map(str::to_string),
            late_fee_assessed,
            ..existing
        })
    }

    pub async fn list_active_for_patron<'c, E>(
        executor: E,
        patron_id: &str,
    ) -> Result<Vec<Checkout>, DomainError>
    where
        E: sqlx::Executor<'c, Database = Sqlite>,
    {
        let rows = sqlx::query(
            "SELECT * FROM checkouts WHERE patron_id = ? AND return_date IS NULL ORDER BY checkout_date ASC",
        )
        .bind(patron_id)
        .fetch_all(executor)
        .await?;
        rows.iter().map(row_to_checkout).collect()
    }

    pub async fn list_overdue<'c, E>(executor: E, as_of: DateTime<Utc>) -> Result<Vec<Checkout>, DomainError>
    where
        E: sqlx::Executor<'c, Database = Sqlite>,
    {
        let rows = sqlx::query("SELECT * FROM checkouts WHERE return_date IS NULL AND due_date < ?")
            .bind(as_of.to_rfc3339())
            .fetch_all(executor)
            .await?;
        rows.iter().map(row_to_checkout).collect()
    }

    /// Dense 1..N position for the next reservation on `isbn` (I2).
    pub async fn next_queue_position<'c, E>(executor: E, isbn: &str) -> Result<i64, DomainError>
    where
        E: sqlx::Executor<'c, Database = Sqlite>,
    {
        let row = sqlx::query(
            "SELECT COALESCE(MAX(queue_position), 0) as max_pos FROM reservations WHERE isbn = ? AND status = 'active'",
        )
        .bind(isbn)
        .fetch_one(executor)
        .await?;
        let max_pos: i64 = row.try_get("max_pos")?;
        Ok(max_pos + 1)
    }

    /// Fails with `DuplicateReservation` if an active reservation already
    /// exists for `(isbn, patron_id)`.
    pub async fn create_reservation(
        tx: &mut Transaction<'_, Sqlite>,
        reservation_id: &str,
        isbn: &str,
        patron_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Reservation, DomainError> {
        let existing = sqlx::query(
            "SELECT 1 FROM reservations WHERE isbn = ? AND patron_id = ? AND status = 'active'",
        )
        .bind(isbn)
        .bind(patron_id)
        .fetch_optional(&mut **tx)
        .await?;
        if existing.is_some() {
            return Err(DomainError::DuplicateReservation {
                isbn: isbn.to_string(),
                patron_id: patron_id.to_string(),
            });
        }

        let queue_position = Self::next_queue_position(&mut **tx, isbn).await?;
        sqlx::query(
            "INSERT INTO reservations (reservation_id, isbn, patron_id, created_at, queue_position, status) VALUES (?, ?, ?, ?, ?, 'active')",
        )
        .bind(reservation_id)
        .bind(isbn)
        .bind(patron_id)
        .bind(created_at.to_rfc3339())
        .bind(queue_position)
        .execute(&mut **tx)
        .await?;

        Ok(Reservation {
            reservation_id: reservation_id.to_string(),
            isbn: isbn.to_string(),
            patron_id: patron_id.to_string(),
            created_at,
            queue_position,
            status: ReservationStatus::Active,
        })
    }

    /// Fulfils the head of the active queue for `isbn` (a copy just became
    /// available, typically via `return_book`) and re-denses remaining
    /// queue positions (I2). Returns the fulfilled reservation, if any.
    pub async fn advance_queue(
        tx: &mut Transaction<'_, Sqlite>,
        isbn: &str,
    ) -> Result<Option<Reservation>, DomainError> {
        let row = sqlx::query(
            "SELECT * FROM reservations WHERE isbn = ? AND status = 'active' ORDER BY queue_position ASC LIMIT 1",
        )
        .bind(isbn)
        .fetch_optional(&mut **tx)
        .await?;
        let Some(row) = row else { return Ok(None) };
        let head = row_to_reservation(&row)?;

        sqlx::query("UPDATE reservations SET status = 'fulfilled' WHERE reservation_id = ?")
            .bind(&head.reservation_id)
            .execute(&mut **tx)
            .await?;
        sqlx::query(
            "UPDATE reservations SET queue_position = queue_position - 1 WHERE isbn = ? AND status = 'active'",
        )
        .bind(isbn)
        .execute(&mut **tx)
        .await?;

        Ok(Some(Reservation {
            status: ReservationStatus::Fulfilled,
            ..head
        }))
    }

    pub async fn list_active_reservations<'c, E>(
        executor: E,
        isbn: &str,
    ) -> Result<Vec<Reservation>, DomainError>
    where
        E: sqlx::Executor<'c, Database = Sqlite>,
    {
        let rows = sqlx::query(
            "SELECT * FROM reservations WHERE isbn = ? AND status = 'active' ORDER BY queue_position ASC",
        )
        .bind(isbn)
        .fetch_all(executor)
        .await?;
        rows.iter().map(row_to_reservation).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Book, Genre, Isbn13, MembershipStatus, Patron};
    use crate::store::book_repo::BookRepo;
    use crate::store::patron_repo::PatronRepo;
    use crate::store::Store;

    async fn seed(store: &Store, isbn: &str, copies: i64) {
        sqlx::query("INSERT INTO authors (author_id, name, biography) VALUES ('a1', 'Author', NULL)")
            .execute(store.pool())
            .await
            .unwrap();
        let book = Book {
            isbn: Isbn13::parse(isbn).unwrap(),
            title: "Sample".to_string(),
            author_id: "a1".to_string(),
            genre: Genre::Fiction,
            publication_year: 2020,
            description: "".to_string(),
            total_copies: copies,
            available_copies: copies,
        };
        BookRepo::upsert(store.pool(), &book).await.unwrap();
        for id in ["p1", "p2"] {
            PatronRepo::upsert(
                store.pool(),
                &Patron {
                    patron_id: id.to_string(),
                    name: "Name".to_string(),
                    email: format!("{id}@example.com"),
                    membership_status: MembershipStatus::Active,
                    outstanding_fines: 0.0,
                },
            )
            .await
            .unwrap();
        }
    }

    #[tokio::test]
    async fn duplicate_active_checkout_is_rejected() {
        let store = Store::in_memory().await.unwrap();
        seed(&store, "9780134190440", 2).await;
        let mut tx = store.begin().await.unwrap();
        let now = Utc::now();
        CirculationRepo::create_checkout(&mut tx, "c1", "9780134190440", "p1", now, now + chrono::Duration::days(14))
            .await
            .unwrap();
        let err = CirculationRepo::create_checkout(&mut tx, "c2", "9780134190440", "p1", now, now + chrono::Duration::days(14))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::DuplicateCheckout { .. }));
    }

    #[tokio::test]
    async fn reservation_queue_positions_are_dense() {
        let store = Store::in_memory().await.unwrap();
        seed(&store, "9780134190440", 0).await;
        let mut tx = store.begin().await.unwrap();
        let now = Utc::now();
        let r1 = CirculationRepo::create_reservation(&mut tx, "r1", "9780134190440", "p1", now)
            .await
            .unwrap();
        let r2 = CirculationRepo::create_reservation(&mut tx, "r2", "9780134190440", "p2", now)
            .await
            .unwrap();
        assert_eq!(r1.queue_position, 1);
        assert_eq!(r2.queue_position, 2);

        let fulfilled = CirculationRepo::advance_queue(&mut tx, "9780134190440").await.unwrap().unwrap();
        assert_eq!(fulfilled.reservation_id, "r1");

        let remaining = CirculationRepo::list_active_reservations(&mut tx, "9780134190440").await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].queue_position, 1);
    }

    #[tokio::test]
    async fn mark_returned_twice_fails() {
        let store = Store::in_memory().await.unwrap();
        seed(&store, "9780134190440", 1).await;
        let mut tx = store.begin().await.unwrap();
        let now = Utc::now();
        CirculationRepo::create_checkout(&mut tx, "c1", "9780134190440", "p1", now, now + chrono::Duration::days(14))
            .await
            .unwrap();
        CirculationRepo::mark_returned(&mut tx, "c1", now, None, 0.0).await.unwrap();
        let err = CirculationRepo::mark_returned(&mut tx, "c1", now, None, 0.0).await.unwrap_err();
        assert!(matches!(err, DomainError::AlreadyReturned(_)));
    }
}
