use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::application::ports::cursor::{EdgeIterator, LinkIterator};
use crate::domain::Result;
use crate::domain::linkgraph::{Edge, Link};

/// Link graph store.
///
/// Scans take a half-open id range `[from, to)` and a timestamp cutoff; only
/// rows strictly older than the cutoff are returned. Workers may split the
/// keyspace (see `domain::partition`) and scan disjoint ranges concurrently.
#[async_trait]
pub trait Graph: Send + Sync {
    /// Create the link for `url` or advance its timestamp to
    /// `max(stored, observed_at)`. Returns the stored link.
    async fn upsert_link(&self, url: &str, observed_at: DateTime<Utc>) -> Result<Link>;

    async fn find_link(&self, id: Uuid) -> Result<Link>;

    async fn links(
        &self,
        from: Uuid,
        to: Uuid,
        retrieved_before: DateTime<Utc>,
    ) -> Result<LinkIterator>;

    /// Create the `src -> dst` edge or refresh its timestamp. Fails with
    /// `UnknownEdgeLinks` when either endpoint does not exist.
    async fn upsert_edge(&self, src: Uuid, dst: Uuid) -> Result<Edge>;

    /// Edges whose *source* lies in `[from, to)`.
    async fn edges(
        &self,
        from: Uuid,
        to: Uuid,
        updated_before: DateTime<Utc>,
    ) -> Result<EdgeIterator>;

    /// Delete edges originating at `src` that were last updated before the cutoff.
    async fn remove_stale_edges(&self, src: Uuid, updated_before: DateTime<Utc>) -> Result<()>;
}
