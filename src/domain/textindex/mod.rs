pub mod document;

pub use document::{Document, Query, QueryType};
