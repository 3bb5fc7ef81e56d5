use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A crawled page, keyed by URL. The id is assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub id: Uuid,
    pub url: String,
    pub retrieved_at: DateTime<Utc>,
}

/// A directed reference from one link to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub id: Uuid,
    pub src: Uuid,
    pub dst: Uuid,
    pub updated_at: DateTime<Utc>,
}
