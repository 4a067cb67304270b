//! PatronRepo (spec §4.6): get, list, update_membership, add_fine.

use sqlx::{Row, Sqlite};

use crate::domain::{MembershipStatus, Patron};
use crate::error::DomainError;

fn parse_status(raw: &str) -> Result<MembershipStatus, DomainError> {
    match raw {
        "active" => Ok(MembershipStatus::Active),
        "suspended" => Ok(MembershipStatus::Suspended),
        "expired" => Ok(MembershipStatus::Expired),
        other => Err(DomainError::InvalidArgument(format!("unknown membership_status: {other}"))),
    }
}

fn row_to_patron(row: &sqlx::sqlite::SqliteRow) -> Result<Patron, DomainError> {
    let status: String = row.try_get("membership_status")?;
    Ok(Patron {
        patron_id: row.try_get("patron_id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        membership_status: parse_status(&status)?,
        outstanding_fines: row.try_get("outstanding_fines")?,
    })
}

pub struct PatronRepo;

impl PatronRepo {
    pub async fn get<'c, E>(executor: E, patron_id: &str) -> Result<Option<Patron>, DomainError>
    where
        E: sqlx::Executor<'c, Database = Sqlite>,
    {
        let row = sqlx::query("SELECT * FROM patrons WHERE patron_id = ?")
            .bind(patron_id)
            .fetch_optional(executor)
            .await?;
        row.as_ref().map(row_to_patron).transpose()
    }

    pub async fn list<'c, E>(executor: E, page: u32, page_size: u32) -> Result<Vec<Patron>, DomainError>
    where
        E: sqlx::Executor<'c, Database = Sqlite>,
    {
        let offset = (page.saturating_sub(1)) as i64 * page_size as i64;
        let rows = sqlx::query("SELECT * FROM patrons ORDER BY patron_id ASC LIMIT ? OFFSET ?")
            .bind(page_size as i64)
            .bind(offset)
            .fetch_all(executor)
            .await?;
        rows.iter().map(row_to_patron).collect()
    }

    pub async fn upsert<'c, E>(executor: E, patron: &Patron) -> Result<(), DomainError>
    where
        E: sqlx::Executor<'c, Database = Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO patrons (patron_id, name, email, membership_status, outstanding_fines)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(patron_id) DO UPDATE SET
                name = excluded.name, email = excluded.email, membership_status = excluded.membership_status
            "#,
        )
        .bind(&patron.patron_id)
        .bind(&patron.name)
        .bind(&patron.email)
        .bind(patron.membership_status.as_str())
        .bind(patron.outstanding_fines)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn update_membership<'c, E>(
        executor: E,
        patron_id: &str,
        status: MembershipStatus,
    ) -> Result<(), DomainError>
    where
        E: sqlx::Executor<'c, Database = Sqlite>,
    {
        let result = sqlx::query("UPDATE patrons SET membership_status = ? WHERE patron_id = ?")
            .bind(status.as_str())
            .bind(patron_id)
            .execute(executor)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::PatronNotFound(patron_id.to_string()));
        }
        Ok(())
    }

    /// Adds `amount` to the patron's outstanding fines (late fee assessment
    /// or manual adjustment, spec §3's Fine definition).
    pub async fn add_fine<'c, E>(executor: E, patron_id: &str, amount: f64) -> Result<(), DomainError>
    where
        E: sqlx::Executor<'c, Database = Sqlite>,
    {
        let result = sqlx::query("UPDATE patrons SET outstanding_fines = outstanding_fines + ? WHERE patron_id = ?")
            .bind(amount)
            .bind(patron_id)
            .execute(executor)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::PatronNotFound(patron_id.to_string()));
        }
        Ok(())
    }
}
