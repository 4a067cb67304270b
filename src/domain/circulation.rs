//! Circulation entities: Checkout, Reservation, Fine (spec §3).

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::DomainError;

#[derive(Debug, Clone, Serialize)]
pub struct Checkout {
    pub checkout_id: String,
    pub isbn: String,
    pub patron_id: String,
    pub checkout_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub condition_on_return: Option<String>,
    pub late_fee_assessed: f64,
}

impl Checkout {
    pub fn is_open(&self) -> bool {
        self.return_date.is_none()
    }

    /// Validates `due_date` against I5: `checkout_date + 1 day <= due_date
    /// <= checkout_date + loan.max_days`.
    pub fn validate_due_date(
        checkout_date: DateTime<Utc>,
        due_date: DateTime<Utc>,
        max_days: i64,
    ) -> Result<(), DomainError> {
        let min = checkout_date + chrono::Duration::days(1);
        let max = checkout_date + chrono::Duration::days(max_days);
        if due_date < min || due_date > max {
            return Err(DomainError::DueDateOutOfRange(due_date.to_rfc3339()));
        }
        Ok(())
    }

    /// Late fee for this checkout given a return timestamp, rate, and cap
    /// (spec §9: rate/cap are configuration, never hardcoded).
    pub fn compute_late_fee(&self, returned_at: DateTime<Utc>, per_day: f64, max_fee: f64) -> f64 {
        if returned_at <= self.due_date {
            return 0.0;
        }
        let overdue_days = (returned_at - self.due_date).num_days().max(0) as f64;
        (overdue_days * per_day).min(max_fee)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Active,
    Fulfilled,
    Cancelled,
    Expired,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Active => "active",
            ReservationStatus::Fulfilled => "fulfilled",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Reservation {
    pub reservation_id: String,
    pub isbn: String,
    pub patron_id: String,
    pub created_at: DateTime<Utc>,
    pub queue_position: i64,
    pub status: ReservationStatus,
}

/// Derived view over a patron's unpaid late fees (spec §3).
#[derive(Debug, Clone, Serialize)]
pub struct Fine {
    pub patron_id: String,
    pub total: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_checkout(due_offset_days: i64) -> Checkout {
        let checkout_date = Utc::now();
        Checkout {
            checkout_id: "c1".to_string(),
            isbn: "9780134190440".to_string(),
            patron_id: "p1".to_string(),
            checkout_date,
            due_date: checkout_date + chrono::Duration::days(due_offset_days),
            return_date: None,
            condition_on_return: None,
            late_fee_assessed: 0.0,
        }
    }

    #[test]
    fn no_fee_when_returned_on_time() {
        let c = sample_checkout(14);
        let fee = c.compute_late_fee(c.due_date, 0.25, 15.0);
        assert_eq!(fee, 0.0);
    }

    #[test]
    fn fee_accrues_per_day_overdue_and_is_capped() {
        let c = sample_checkout(14);
        let returned = c.due_date + chrono::Duration::days(100);
        let fee = c.compute_late_fee(returned, 0.25, 15.0);
        assert_eq!(fee, 15.0);
    }

    #[test]
    fn due_date_must_be_at_least_one_day_out() {
        let checkout_date = Utc::now();
        let due_date = checkout_date;
        let err = Checkout::validate_due_date(checkout_date, due_date, 60).unwrap_err();
        assert!(matches!(err, DomainError::DueDateOutOfRange(_)));
    }

    #[test]
    fn due_date_must_not_exceed_max_days() {
        let checkout_date = Utc::now();
        let due_date = checkout_date + chrono::Duration::days(90);
        assert!(Checkout::validate_due_date(checkout_date, due_date, 60).is_err());
    }
}
