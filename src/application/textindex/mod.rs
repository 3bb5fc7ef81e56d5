use crate::application::ports::indexer::Indexer;
use crate::domain::Result;
use crate::domain::textindex::{Document, Query};

#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub total: u64,
    pub documents: Vec<Document>,
}

pub struct SearchPages<'a, I: Indexer + ?Sized> {
    pub indexer: &'a I,
}

impl<'a, I: Indexer + ?Sized> SearchPages<'a, I> {
    /// Collect at most `limit` results. The cursor is closed on every path.
    pub async fn execute(&self, query: &Query, limit: usize) -> Result<SearchResults> {
        let mut it = self.indexer.search(query).await?;
        let mut documents = Vec::new();
        while documents.len() < limit && it.next().await {
            if let Some(doc) = it.current() {
                documents.push(doc.clone());
            }
        }
        let latched = it.error().cloned();
        let total = it.total_count();
        it.close()?;
        if let Some(err) = latched {
            return Err(err);
        }
        Ok(SearchResults { total, documents })
    }
}
