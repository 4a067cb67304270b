//! Patron entity and membership status (spec §3).

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Active,
    Suspended,
    Expired,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Active => "active",
            MembershipStatus::Suspended => "suspended",
            MembershipStatus::Expired => "expired",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, MembershipStatus::Active)
    }
}

impl std::fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Patron {
    pub patron_id: String,
    pub name: String,
    pub email: String,
    pub membership_status: MembershipStatus,
    pub outstanding_fines: f64,
}

impl Patron {
    pub fn validate_new(patron_id: &str, name: &str, email: &str) -> Result<(), DomainError> {
        if patron_id.trim().is_empty() {
            return Err(DomainError::InvalidArgument("patron_id must not be empty".to_string()));
        }
        if name.trim().is_empty() {
            return Err(DomainError::InvalidArgument("name must not be empty".to_string()));
        }
        if !email.contains('@') {
            return Err(DomainError::InvalidArgument(format!("invalid email: {email}")));
        }
        Ok(())
    }

    /// Checkouts/reservations may only be created while this holds (I3).
    pub fn require_active(&self) -> Result<(), DomainError> {
        if self.membership_status.is_active() {
            Ok(())
        } else {
            Err(DomainError::PatronNotActive {
                patron_id: self.patron_id.clone(),
                status: self.membership_status.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_patron() -> Patron {
        Patron {
            patron_id: "p1".to_string(),
            name: "Anderson".to_string(),
            email: "a@example.com".to_string(),
            membership_status: MembershipStatus::Active,
            outstanding_fines: 0.0,
        }
    }

    #[test]
    fn require_active_passes_for_active_patron() {
        assert!(active_patron().require_active().is_ok());
    }

    #[test]
    fn require_active_fails_for_suspended_patron() {
        let mut p = active_patron();
        p.membership_status = MembershipStatus::Suspended;
        let err = p.require_active().unwrap_err();
        assert!(matches!(err, DomainError::PatronNotActive { .. }));
    }

    #[test]
    fn rejects_email_without_at_sign() {
        assert!(Patron::validate_new("p1", "Anderson", "not-an-email").is_err());
    }
}
