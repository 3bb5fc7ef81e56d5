pub mod cursor;
pub mod graph;
pub mod indexer;
