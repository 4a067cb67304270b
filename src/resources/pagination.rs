//! Pagination parameters shared by resource reads and search (spec §4.2).

use crate::error::McpError;

#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Pagination {
    /// Parses `page`/`page_size` query parameters, defaulting and bounding
    /// against the server's configured page size limits. `page_size` above
    /// `max_page_size` is `-32602` per spec §8's boundary behaviour.
    pub fn parse(
        page: Option<u32>,
        page_size: Option<u32>,
        default_page_size: u32,
        max_page_size: u32,
    ) -> Result<Self, McpError> {
        let page = page.unwrap_or(1);
        if page < 1 {
            return Err(McpError::InvalidParams("page must be >= 1".to_string()));
        }
        let page_size = page_size.unwrap_or(default_page_size);
        if page_size < 1 || page_size > max_page_size {
            return Err(McpError::InvalidParams(format!(
                "page_size must be between 1 and {max_page_size}"
            )));
        }
        Ok(Self { page, page_size })
    }

    /// `None` once `page * page_size >= total`, else the next page number.
    pub fn next_page(&self, total: u64) -> Option<u32> {
        let consumed = self.page as u64 * self.page_size as u64;
        if consumed >= total {
            None
        } else {
            Some(self.page + 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let p = Pagination::parse(None, None, 20, 100).unwrap();
        assert_eq!(p.page, 1);
        assert_eq!(p.page_size, 20);
    }

    #[test]
    fn page_size_over_max_is_invalid_params() {
        let err = Pagination::parse(Some(1), Some(101), 20, 100).unwrap_err();
        assert_eq!(err.code(), -32602);
    }

    #[test]
    fn next_page_is_none_past_total() {
        let p = Pagination { page: 2, page_size: 10 };
        assert_eq!(p.next_page(15), None);
        assert_eq!(p.next_page(25), Some(3));
    }
}
