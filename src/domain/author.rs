//! Author entity (spec §3).

use serde::Serialize;

use crate::error::DomainError;

#[derive(Debug, Clone, Serialize)]
pub struct Author {
    pub author_id: String,
    pub name: String,
    pub biography: Option<String>,
}

impl Author {
    pub fn validate_new(author_id: &str, name: &str) -> Result<(), DomainError> {
        if author_id.trim().is_empty() {
            return Err(DomainError::InvalidArgument("author_id must not be empty".to_string()));
        }
        if name.trim().is_empty() {
            return Err(DomainError::InvalidArgument("name must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_name() {
        assert!(Author::validate_new("a1", "   ").is_err());
    }

    #[test]
    fn accepts_well_formed_author() {
        assert!(Author::validate_new("a1", "Jane Doe").is_ok());
    }
}
