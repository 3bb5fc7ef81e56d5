use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::application::ports::cursor::{EdgeIterator, LinkIterator, VecCursor};
use crate::application::ports::graph::Graph;
use crate::domain::linkgraph::{Edge, Link};
use crate::domain::partition::Partition;
use crate::domain::{Error, ErrorKind, Result};

#[derive(Default)]
struct GraphState {
    links: HashMap<Uuid, Link>,
    link_url_index: HashMap<String, Uuid>,
    edges: HashMap<Uuid, Edge>,
    /// Edge ids keyed by source link id.
    link_edges: HashMap<Uuid, Vec<Uuid>>,
}

impl GraphState {
    fn fresh_id<V>(map: &HashMap<Uuid, V>) -> Uuid {
        loop {
            let id = Uuid::new_v4();
            if !map.contains_key(&id) {
                return id;
            }
        }
    }
}

/// In-process link graph with the same observable semantics as the
/// relational store. Scans return copies taken under the read lock.
#[derive(Clone, Default)]
pub struct InMemoryGraph {
    inner: Arc<RwLock<GraphState>>,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Graph for InMemoryGraph {
    async fn upsert_link(&self, url: &str, observed_at: DateTime<Utc>) -> Result<Link> {
        let mut state = self.inner.write().await;
        if let Some(id) = state.link_url_index.get(url).copied() {
            if let Some(existing) = state.links.get_mut(&id) {
                if observed_at > existing.retrieved_at {
                    existing.retrieved_at = observed_at;
                }
                return Ok(existing.clone());
            }
        }

        let id = GraphState::fresh_id(&state.links);
        let link = Link {
            id,
            url: url.to_string(),
            retrieved_at: observed_at,
        };
        state.link_url_index.insert(link.url.clone(), id);
        state.links.insert(id, link.clone());
        tracing::debug!(link_id = %id, %url, "upsert_link");
        Ok(link)
    }

    async fn find_link(&self, id: Uuid) -> Result<Link> {
        self.inner
            .read()
            .await
            .links
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found("find link"))
    }

    async fn links(
        &self,
        from: Uuid,
        to: Uuid,
        retrieved_before: DateTime<Utc>,
    ) -> Result<LinkIterator> {
        let range = Partition::new(from, to);
        let state = self.inner.read().await;
        let mut out: Vec<Link> = state
            .links
            .values()
            .filter(|l| range.contains(&l.id) && l.retrieved_at < retrieved_before)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(Box::new(VecCursor::new(out)))
    }

    async fn upsert_edge(&self, src: Uuid, dst: Uuid) -> Result<Edge> {
        let mut state = self.inner.write().await;
        if !state.links.contains_key(&src) || !state.links.contains_key(&dst) {
            return Err(Error::new("upsert edge", ErrorKind::UnknownEdgeLinks));
        }

        let now = Utc::now();
        let existing = state.link_edges.get(&src).and_then(|ids| {
            ids.iter()
                .copied()
                .find(|id| state.edges.get(id).is_some_and(|e| e.dst == dst))
        });
        if let Some(edge_id) = existing {
            if let Some(edge) = state.edges.get_mut(&edge_id) {
                edge.updated_at = now;
                return Ok(edge.clone());
            }
        }

        let id = GraphState::fresh_id(&state.edges);
        let edge = Edge {
            id,
            src,
            dst,
            updated_at: now,
        };
        state.link_edges.entry(src).or_default().push(id);
        state.edges.insert(id, edge.clone());
        tracing::debug!(edge_id = %id, %src, %dst, "upsert_edge");
        Ok(edge)
    }

    async fn edges(
        &self,
        from: Uuid,
        to: Uuid,
        updated_before: DateTime<Utc>,
    ) -> Result<EdgeIterator> {
        let range = Partition::new(from, to);
        let state = self.inner.read().await;
        let edges = &state.edges;
        let mut out: Vec<Edge> = state
            .link_edges
            .iter()
            .filter(|(src, _)| range.contains(src))
            .flat_map(|(_, ids)| ids.iter().filter_map(move |id| edges.get(id)))
            .filter(|e| e.updated_at < updated_before)
            .cloned()
            .collect();
        out.sort_by(|a, b| (a.src, a.id).cmp(&(b.src, b.id)));
        Ok(Box::new(VecCursor::new(out)))
    }

    async fn remove_stale_edges(&self, src: Uuid, updated_before: DateTime<Utc>) -> Result<()> {
        let mut guard = self.inner.write().await;
        let state = &mut *guard;
        let Some(ids) = state.link_edges.get_mut(&src) else {
            return Ok(());
        };
        let edges = &mut state.edges;
        let before = ids.len();
        ids.retain(|id| match edges.get(id).map(|e| e.updated_at < updated_before) {
            Some(true) => {
                edges.remove(id);
                false
            }
            Some(false) => true,
            None => false,
        });
        tracing::debug!(%src, removed = before - ids.len(), "remove_stale_edges");
        Ok(())
    }
}
