//! Resource catalog (spec §4.2): read-only views over the store, addressable
//! by URI templates, returning paginated, content-typed payloads.

pub mod pagination;
pub mod subscriptions;
pub mod uri;

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use crate::config::Config;
use crate::domain::Genre;
use crate::error::McpError;
use crate::protocol::{ResourceContents, ResourceDefinition, ResourcesListResult};
use crate::store::author_repo::AuthorRepo;
use crate::store::book_repo::{BookFilters, BookRepo};
use crate::store::circulation_repo::CirculationRepo;
use crate::store::patron_repo::PatronRepo;
use crate::store::Store;

use pagination::Pagination;
use subscriptions::SubscriptionRegistry;
use uri::{parse_u32_param, ResourceUri};

pub struct ResourceCatalog {
    store: Store,
    config: Arc<Config>,
    pub subscriptions: Arc<SubscriptionRegistry>,
}

impl ResourceCatalog {
    pub fn new(store: Store, config: Arc<Config>) -> Self {
        Self::with_subscriptions(store, config, Arc::new(SubscriptionRegistry::new()))
    }

    /// Used by the session engine, which shares one registry between the
    /// resource catalog (subscribe/unsubscribe) and tools (notify-on-write).
    pub fn with_subscriptions(store: Store, config: Arc<Config>, subscriptions: Arc<SubscriptionRegistry>) -> Self {
        Self {
            store,
            config,
            subscriptions,
        }
    }

    pub fn list(&self) -> ResourcesListResult {
        let def = |uri: &str, name: &str, description: &str, template: bool| ResourceDefinition {
            uri: uri.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            mime_type: "application/json".to_string(),
            template,
        };
        ResourcesListResult {
            resources: vec![
                def("library://books", "books", "Paginated book listing", false),
                def("library://books/{isbn}", "book", "Single book with extended details", true),
                def(
                    "library://authors/{author_id}/books",
                    "author_books",
                    "Books by author",
                    true,
                ),
                def("library://genres/{genre}/books", "genre_books", "Books by genre", true),
                def(
                    "library://patrons/{patron_id}",
                    "patron",
                    "Patron detail including active checkouts",
                    true,
                ),
                def("library://stats", "stats", "Aggregate library statistics", false),
                def(
                    "library://recommendations/{patron_id}",
                    "recommendations",
                    "Ranked recommendation list for a patron",
                    true,
                ),
            ],
        }
    }

    pub async fn read(&self, uri: &str) -> Result<ResourcesReadOutcome, McpError> {
        let (resource, params) = ResourceUri::parse(uri)?;
        let page = parse_u32_param(&params, "page")?;
        let page_size = parse_u32_param(&params, "page_size")?;
        let pagination = Pagination::parse(
            page,
            page_size,
            self.config.pagination_default_page_size,
            self.config.pagination_max_page_size,
        )?;

        let text = match &resource {
            ResourceUri::Books => self.read_book_list(BookFilters::default(), pagination).await?,
            ResourceUri::Book { isbn } => self.read_book_detail(isbn.as_str()).await?,
            ResourceUri::AuthorBooks { author_id } => {
                let filters = BookFilters {
                    author_id: Some(author_id.clone()),
                    ..Default::default()
                };
                self.read_book_list(filters, pagination).await?
            }
            ResourceUri::GenreBooks { genre } => {
                let filters = BookFilters {
                    genre: Some(*genre),
                    ..Default::default()
                };
                self.read_book_list(filters, pagination).await?
            }
            ResourceUri::Patron { patron_id } => self.read_patron_detail(patron_id).await?,
            ResourceUri::Stats => self.read_stats().await?,
            ResourceUri::Recommendations { patron_id } => self.read_recommendations(patron_id).await?,
        };

        Ok(ResourcesReadOutcome {
            contents: ResourceContents {
                uri: uri.to_string(),
                mime_type: "application/json".to_string(),
                text,
            },
            resource,
        })
    }

    pub fn subscribe(&self, uri: &str, resource: ResourceUri) -> Result<String, McpError> {
        if !resource.is_subscribable() {
            return Err(McpError::InvalidParams(format!(
                "{uri} is not a subscribable list resource"
            )));
        }
        Ok(self.subscriptions.subscribe(uri, resource))
    }

    pub fn unsubscribe(&self, subscription_id: &str) {
        self.subscriptions.unsubscribe(subscription_id)
    }

    async fn read_book_list(&self, filters: BookFilters, pagination: Pagination) -> Result<String, McpError> {
        let (books, total) = BookRepo::list(self.store.pool(), &filters, pagination.page, pagination.page_size)
            .await
            .map_err(McpError::from)?;
        let budget = self.config.output_budget();
        let (books, rows_truncated) = budget.enforce_rows(books);
        let body = json!({
            "books": books,
            "total": total,
            "page": pagination.page,
            "page_size": pagination.page_size,
            "next_page": pagination.next_page(total),
            "truncated": rows_truncated,
        })
        .to_string();
        Ok(budget.enforce_size(body).0)
    }

    async fn read_book_detail(&self, isbn: &str) -> Result<String, McpError> {
        let book = BookRepo::get_by_isbn(self.store.pool(), isbn)
            .await
            .map_err(McpError::from)?
            .ok_or_else(|| McpError::ResourceNotFound(format!("book {isbn}")))?;
        let author = AuthorRepo::get(self.store.pool(), &book.author_id)
            .await
            .map_err(McpError::from)?;
        let reservations = CirculationRepo::list_active_reservations(self.store.pool(), isbn)
            .await
            .map_err(McpError::from)?;
        let body = json!({
            "book": book,
            "author": author,
            "active_reservations": reservations.len(),
        })
        .to_string();
        Ok(self.config.output_budget().enforce_size(body).0)
    }

    async fn read_patron_detail(&self, patron_id: &str) -> Result<String, McpError> {
        let patron = PatronRepo::get(self.store.pool(), patron_id)
            .await
            .map_err(McpError::from)?
            .ok_or_else(|| McpError::ResourceNotFound(format!("patron {patron_id}")))?;
        let checkouts = CirculationRepo::list_active_for_patron(self.store.pool(), patron_id)
            .await
            .map_err(McpError::from)?;
        Ok(json!({
            "patron": patron,
            "active_checkouts": checkouts,
        })
        .to_string())
    }

    async fn read_stats(&self) -> Result<String, McpError> {
        let (all_books, total_books) = BookRepo::list(self.store.pool(), &BookFilters::default(), 1, 1)
            .await
            .map_err(McpError::from)?;
        let _ = all_books;
        let overdue = CirculationRepo::list_overdue(self.store.pool(), Utc::now())
            .await
            .map_err(McpError::from)?;

        let mut by_genre = Vec::new();
        for genre in Genre::ALL {
            let count = BookRepo::count_for_genre(self.store.pool(), *genre)
                .await
                .map_err(McpError::from)?;
            if count > 0 {
                by_genre.push(json!({ "genre": genre.as_str(), "count": count }));
            }
        }
        by_genre.sort_by(|a, b| {
            b["count"]
                .as_u64()
                .cmp(&a["count"].as_u64())
                .then_with(|| a["genre"].as_str().cmp(&b["genre"].as_str()))
        });

        Ok(json!({
            "total_books": total_books,
            "popular_genres": by_genre,
            "overdue_count": overdue.len(),
        })
        .to_string())
    }

    async fn read_recommendations(&self, patron_id: &str) -> Result<String, McpError> {
        let recommendations = crate::recommendations::recommend_for_patron(&self.store, patron_id, 10)
            .await
            .map_err(McpError::from)?;
        Ok(json!({ "patron_id": patron_id, "recommendations": recommendations }).to_string())
    }
}

pub struct ResourcesReadOutcome {
    pub contents: ResourceContents,
    pub resource: ResourceUri,
}
