//! Genre: closed-set enum (spec §3).

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Genre {
    Fiction,
    NonFiction,
    Mystery,
    ScienceFiction,
    Fantasy,
    Biography,
    History,
    Science,
    Romance,
    Poetry,
    Thriller,
    Children,
}

impl Genre {
    pub const ALL: &'static [Genre] = &[
        Genre::Fiction,
        Genre::NonFiction,
        Genre::Mystery,
        Genre::ScienceFiction,
        Genre::Fantasy,
        Genre::Biography,
        Genre::History,
        Genre::Science,
        Genre::Romance,
        Genre::Poetry,
        Genre::Thriller,
        Genre::Children,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Genre::Fiction => "fiction",
            Genre::NonFiction => "non_fiction",
            Genre::Mystery => "mystery",
            Genre::ScienceFiction => "science_fiction",
            Genre::Fantasy => "fantasy",
            Genre::Biography => "biography",
            Genre::History => "history",
            Genre::Science => "science",
            Genre::Romance => "romance",
            Genre::Poetry => "poetry",
            Genre::Thriller => "thriller",
            Genre::Children => "children",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        Self::ALL
            .iter()
            .copied()
            .find(|g| g.as_str() == raw)
            .ok_or_else(|| DomainError::InvalidArgument(format!("unknown genre: {raw}")))
    }
}

impl std::fmt::Display for Genre {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
