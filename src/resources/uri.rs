//! Resource URI grammar (spec §4.2): the closed set of `library://` URIs
//! and their query parameters.

use std::collections::HashMap;

use crate::domain::{Genre, Isbn13};
use crate::error::McpError;

#[derive(Debug, Clone, PartialEq)]
pub enum ResourceUri {
    Books,
    Book { isbn: Isbn13 },
    AuthorBooks { author_id: String },
    GenreBooks { genre: Genre },
    Patron { patron_id: String },
    Stats,
    Recommendations { patron_id: String },
}

impl ResourceUri {
    /// Parses `uri` including its query string, returning the resource
    /// variant and the raw query parameters for pagination parsing.
    pub fn parse(uri: &str) -> Result<(Self, HashMap<String, String>), McpError> {
        let rest = uri
            .strip_prefix("library://")
            .ok_or_else(|| McpError::InvalidParams(format!("unrecognized URI scheme: {uri}")))?;

        let (path, query) = match rest.split_once('?') {
            Some((p, q)) => (p, q),
            None => (rest, ""),
        };
        let params = parse_query(query);

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let resource = match segments.as_slice() {
            ["books"] => ResourceUri::Books,
            ["books", isbn] => ResourceUri::Book {
                isbn: Isbn13::parse(isbn).map_err(|e| McpError::InvalidParams(e.to_string()))?,
            },
            ["authors", author_id, "books"] => ResourceUri::AuthorBooks {
                author_id: author_id.to_string(),
            },
            ["genres", genre, "books"] => ResourceUri::GenreBooks {
                genre: Genre::parse(genre).map_err(|e| McpError::InvalidParams(e.to_string()))?,
            },
            ["patrons", patron_id] => ResourceUri::Patron {
                patron_id: patron_id.to_string(),
            },
            ["stats"] => ResourceUri::Stats,
            ["recommendations", patron_id] => ResourceUri::Recommendations {
                patron_id: patron_id.to_string(),
            },
            _ => return Err(McpError::InvalidParams(format!("unrecognized URI path: {uri}"))),
        };
        Ok((resource, params))
    }

    /// Whether `resources/subscribe` is allowed on this URI (spec §4.2:
    /// "allowed only on list URIs").
    pub fn is_subscribable(&self) -> bool {
        matches!(
            self,
            ResourceUri::Books | ResourceUri::AuthorBooks { .. } | ResourceUri::GenreBooks { .. }
        )
    }
}

fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .filter_map(|kv| kv.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn parse_u32_param(params: &HashMap<String, String>, key: &str) -> Result<Option<u32>, McpError> {
    match params.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u32>()
            .map(Some)
            .map_err(|_| McpError::InvalidParams(format!("{key} must be a positive integer"))),
    }
}
