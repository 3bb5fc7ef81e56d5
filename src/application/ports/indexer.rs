use async_trait::async_trait;
use uuid::Uuid;

use crate::application::ports::cursor::DocumentIterator;
use crate::domain::Result;
use crate::domain::textindex::{Document, Query};

/// Full-text index over crawled pages.
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Insert or update the searchable fields of `doc`. The rank of an already
    /// indexed document is never touched; `doc.page_rank` is ignored for it.
    async fn index(&self, doc: &Document) -> Result<()>;

    async fn find_by_id(&self, link_id: Uuid) -> Result<Document>;

    /// Results ordered by rank, then relevance, both descending.
    async fn search(&self, query: &Query) -> Result<DocumentIterator>;

    /// Set the rank of a document, creating a rank-only stub if needed.
    async fn update_score(&self, link_id: Uuid, score: f64) -> Result<()>;
}
