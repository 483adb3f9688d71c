//! Upstream content source: the Notion database holding the blog.

pub mod client;
pub mod model;

use async_trait::async_trait;

use crate::error::Result;
use model::{Block, DatabaseInfo, Page};

pub use client::{parse_page_id, NotionClient};

/// Read access to the blog database. Ingestion depends on this trait, never
/// on HTTP details, so tests can feed pages from memory.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Every page of the database, sorted by `sort_property` descending.
    async fn query_pages(&self, sort_property: &str) -> Result<Vec<Page>>;

    async fn retrieve_page(&self, page_id: &str) -> Result<Page>;

    /// All direct children of a block or page, following pagination.
    async fn list_children(&self, block_id: &str) -> Result<Vec<Block>>;

    async fn retrieve_database(&self) -> Result<DatabaseInfo>;
}
