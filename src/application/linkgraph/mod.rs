use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::application::ports::graph::Graph;
use crate::domain::Result;

/// Outcome of refreshing the outgoing edges of one crawled page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeRefresh {
    pub source_id: Uuid,
    pub upserted: usize,
    pub skipped: usize,
}

/// Record that `source_url` was crawled at `crawled_at` and links to
/// `destinations`, then evict edges the crawl no longer confirms.
///
/// Edges failing with an unknown endpoint are skipped rather than aborting the
/// batch; any other error is returned as-is.
///
/// The eviction cutoff is the earliest timestamp the store gave an edge during
/// this pass, so it is measured on the store's clock, not ours.
pub async fn refresh_outgoing_edges<G: Graph + ?Sized>(
    graph: &G,
    source_url: &str,
    destinations: &[String],
    crawled_at: DateTime<Utc>,
) -> Result<EdgeRefresh> {
    let pass_started = Utc::now();
    let source = graph.upsert_link(source_url, crawled_at).await?;
    let mut cutoff: Option<DateTime<Utc>> = None;
    let mut out = EdgeRefresh {
        source_id: source.id,
        ..EdgeRefresh::default()
    };

    for url in destinations {
        if url == source_url {
            continue;
        }
        // Destinations are discovered, not fetched: the epoch keeps them due for a crawl.
        let dst = graph.upsert_link(url, DateTime::<Utc>::UNIX_EPOCH).await?;
        match graph.upsert_edge(source.id, dst.id).await {
            Ok(edge) => {
                out.upserted += 1;
                cutoff = Some(cutoff.map_or(edge.updated_at, |c| c.min(edge.updated_at)));
            }
            Err(e) if e.is_unknown_edge_links() => {
                tracing::warn!(src = %source.id, dst = %dst.id, error = %e, "edge_skipped");
                out.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    // Nothing refreshed: every existing edge of the source is stale.
    let cutoff = cutoff.unwrap_or(pass_started);
    graph.remove_stale_edges(source.id, cutoff).await?;
    Ok(out)
}
