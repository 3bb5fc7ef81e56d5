use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::application::ports::cursor::{EdgeIterator, LinkIterator};
use crate::application::ports::graph::Graph;
use crate::domain::linkgraph::{Edge, Link};
use crate::domain::{Error, Result};
use crate::infrastructure::db::PgPool;
use crate::infrastructure::db::cursor::RowCursor;

const UPSERT_LINK: &str = r#"INSERT INTO links (url, retrieved_at) VALUES ($1, $2)
    ON CONFLICT (url) DO UPDATE SET retrieved_at = GREATEST(links.retrieved_at, EXCLUDED.retrieved_at)
    RETURNING id, url, retrieved_at"#;
const FIND_LINK: &str = "SELECT id, url, retrieved_at FROM links WHERE id = $1";
const LINKS_IN_PARTITION: &str = r#"SELECT id, url, retrieved_at FROM links
    WHERE id >= $1 AND id < $2 AND retrieved_at < $3
    ORDER BY id"#;

const UPSERT_EDGE: &str = r#"INSERT INTO edges (src, dst, updated_at) VALUES ($1, $2, now())
    ON CONFLICT (src, dst) DO UPDATE SET updated_at = now()
    RETURNING id, src, dst, updated_at"#;
const EDGES_IN_PARTITION: &str = r#"SELECT id, src, dst, updated_at FROM edges
    WHERE src >= $1 AND src < $2 AND updated_at < $3
    ORDER BY src, id"#;
const REMOVE_STALE_EDGES: &str = "DELETE FROM edges WHERE src = $1 AND updated_at < $2";

/// Postgres/CockroachDB backed link graph. Upserts are single
/// `INSERT .. ON CONFLICT` statements, so concurrent writers need no locking.
pub struct SqlxGraph {
    pub pool: PgPool,
}

impl SqlxGraph {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn link_from_row(r: &PgRow) -> sqlx::Result<Link> {
    Ok(Link {
        id: r.try_get("id")?,
        url: r.try_get("url")?,
        retrieved_at: r.try_get("retrieved_at")?,
    })
}

fn edge_from_row(r: &PgRow) -> sqlx::Result<Edge> {
    Ok(Edge {
        id: r.try_get("id")?,
        src: r.try_get("src")?,
        dst: r.try_get("dst")?,
        updated_at: r.try_get("updated_at")?,
    })
}

#[async_trait]
impl Graph for SqlxGraph {
    async fn upsert_link(&self, url: &str, observed_at: DateTime<Utc>) -> Result<Link> {
        let row = sqlx::query(UPSERT_LINK)
            .bind(url)
            .bind(observed_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::new("upsert link", e.into()))?;
        let link = link_from_row(&row).map_err(|e| Error::new("upsert link", e.into()))?;
        tracing::debug!(link_id = %link.id, url = %link.url, "upsert_link");
        Ok(link)
    }

    async fn find_link(&self, id: Uuid) -> Result<Link> {
        let row = sqlx::query(FIND_LINK)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::new("find link", e.into()))?
            .ok_or_else(|| Error::not_found("find link"))?;
        link_from_row(&row).map_err(|e| Error::new("find link", e.into()))
    }

    async fn links(
        &self,
        from: Uuid,
        to: Uuid,
        retrieved_before: DateTime<Utc>,
    ) -> Result<LinkIterator> {
        let query = sqlx::query(LINKS_IN_PARTITION)
            .bind(from)
            .bind(to)
            .bind(retrieved_before);
        Ok(Box::new(RowCursor::spawn(
            "links",
            self.pool.clone(),
            query,
            link_from_row,
        )))
    }

    async fn upsert_edge(&self, src: Uuid, dst: Uuid) -> Result<Edge> {
        let row = sqlx::query(UPSERT_EDGE)
            .bind(src)
            .bind(dst)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::new("upsert edge", e.into()))?;
        let edge = edge_from_row(&row).map_err(|e| Error::new("upsert edge", e.into()))?;
        tracing::debug!(edge_id = %edge.id, %src, %dst, "upsert_edge");
        Ok(edge)
    }

    async fn edges(
        &self,
        from: Uuid,
        to: Uuid,
        updated_before: DateTime<Utc>,
    ) -> Result<EdgeIterator> {
        let query = sqlx::query(EDGES_IN_PARTITION)
            .bind(from)
            .bind(to)
            .bind(updated_before);
        Ok(Box::new(RowCursor::spawn(
            "edges",
            self.pool.clone(),
            query,
            edge_from_row,
        )))
    }

    async fn remove_stale_edges(&self, src: Uuid, updated_before: DateTime<Utc>) -> Result<()> {
        let res = sqlx::query(REMOVE_STALE_EDGES)
            .bind(src)
            .bind(updated_before)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::new("remove stale edges", e.into()))?;
        tracing::debug!(%src, removed = res.rows_affected(), "remove_stale_edges");
        Ok(())
    }
}
