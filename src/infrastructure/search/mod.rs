pub mod elasticsearch;
pub mod paging;
pub mod tantivy_indexer;

pub use elasticsearch::ElasticsearchIndexer;
pub use tantivy_indexer::TantivyIndexer;

/// Results requested from a search engine per round trip.
pub const DEFAULT_PAGE_SIZE: usize = 10;
