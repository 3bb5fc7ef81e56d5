// Module layout (Clean Architecture style)
// - domain: links, edges, documents, partitions and the error taxonomy
// - application: the Graph / Indexer / Cursor ports and the use cases on top
// - infrastructure: Postgres, in-memory, Tantivy and Elasticsearch adapters
// - bootstrap: configuration, tracing and store construction

pub mod application;
pub mod bootstrap;
pub mod domain;
pub mod infrastructure;

pub use application::ports::cursor::{
    Cursor, DocumentIterator, EdgeIterator, LinkIterator, SearchCursor,
};
pub use application::ports::graph::Graph;
pub use application::ports::indexer::Indexer;
pub use domain::{Error, ErrorKind, Result};
