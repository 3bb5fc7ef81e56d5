use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::application::ports::cursor::DocumentIterator;
use crate::application::ports::indexer::Indexer;
use crate::domain::textindex::{Document, Query, QueryType};
use crate::domain::{Error, Result};
use crate::infrastructure::search::DEFAULT_PAGE_SIZE;
use crate::infrastructure::search::paging::{Page, PageSource, PagedCursor};

pub const DEFAULT_INDEX_NAME: &str = "textindexer";

fn index_mappings() -> Value {
    json!({
        "mappings": {
            "properties": {
                "LinkID": {"type": "keyword"},
                "URL": {"type": "keyword"},
                "Content": {"type": "text"},
                "Title": {"type": "text"},
                "IndexedAt": {"type": "date"},
                "PageRank": {"type": "double"}
            }
        }
    })
}

/// Stored document shape. Field names are the wire names used by the index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct EsDoc {
    #[serde(rename = "LinkID")]
    link_id: String,
    #[serde(rename = "URL", default)]
    url: String,
    #[serde(rename = "Title", default)]
    title: String,
    #[serde(rename = "Content", default)]
    content: String,
    #[serde(rename = "IndexedAt", default, skip_serializing_if = "Option::is_none")]
    indexed_at: Option<DateTime<Utc>>,
    #[serde(rename = "PageRank", default)]
    page_rank: f64,
}

/// Partial update written by `index`; leaves `PageRank` alone.
#[derive(Debug, Serialize)]
struct EsContentUpdate<'a> {
    #[serde(rename = "LinkID")]
    link_id: String,
    #[serde(rename = "URL")]
    url: &'a str,
    #[serde(rename = "Title")]
    title: &'a str,
    #[serde(rename = "Content")]
    content: &'a str,
    #[serde(rename = "IndexedAt")]
    indexed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct EsScoreUpdate {
    #[serde(rename = "LinkID")]
    link_id: String,
    #[serde(rename = "PageRank")]
    page_rank: f64,
}

#[derive(Debug, Serialize)]
struct EsUpsert<T> {
    doc: T,
    doc_as_upsert: bool,
}

#[derive(Debug, Deserialize)]
struct EsGetRes {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source")]
    source: Option<EsDoc>,
}

#[derive(Debug, Deserialize)]
struct EsSearchRes {
    hits: EsSearchResHits,
}

#[derive(Debug, Deserialize)]
struct EsSearchResHits {
    total: EsTotal,
    #[serde(rename = "hits", default)]
    hit_list: Vec<EsHitWrapper>,
}

#[derive(Debug, Deserialize)]
struct EsTotal {
    #[serde(rename = "value")]
    count: u64,
}

#[derive(Debug, Deserialize)]
struct EsHitWrapper {
    #[serde(rename = "_source")]
    source: EsDoc,
}

#[derive(Debug, Deserialize)]
struct EsErrorRes {
    error: EsError,
}

#[derive(Debug, Deserialize)]
struct EsError {
    #[serde(rename = "type")]
    kind: String,
    reason: String,
}

impl EsDoc {
    fn into_document(self, op: &'static str) -> Result<Document> {
        let link_id = Uuid::parse_str(&self.link_id)
            .map_err(|e| Error::protocol(op, "malformed_document", e.to_string()))?;
        Ok(Document {
            link_id,
            url: self.url,
            title: self.title,
            content: self.content,
            indexed_at: self.indexed_at,
            page_rank: self.page_rank,
        })
    }
}

/// Thin HTTP client over one or more cluster nodes, rotated round-robin.
struct EsClient {
    http: reqwest::Client,
    nodes: Vec<String>,
    next_node: AtomicUsize,
    index: String,
}

impl EsClient {
    fn url(&self, path: &str) -> String {
        let i = self.next_node.fetch_add(1, Ordering::Relaxed) % self.nodes.len();
        format!("{}/{}{}", self.nodes[i], self.index, path)
    }

    async fn send(
        &self,
        op: &'static str,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<(StatusCode, Vec<u8>)> {
        let mut req = self.http.request(method, self.url(path));
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await.map_err(|e| Error::new(op, e.into()))?;
        let status = resp.status();
        let bytes = resp.bytes().await.map_err(|e| Error::new(op, e.into()))?;
        Ok((status, bytes.to_vec()))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        op: &'static str,
        method: Method,
        path: &str,
        body: &Value,
    ) -> Result<T> {
        let (status, bytes) = self.send(op, method, path, Some(body)).await?;
        if !status.is_success() {
            return Err(decode_error(op, status, &bytes));
        }
        decode_body(op, &bytes)
    }
}

fn decode_body<T: DeserializeOwned>(op: &'static str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| Error::protocol(op, "malformed_response", e.to_string()))
}

/// Turn a non-2xx response into a typed error, using `{error: {type, reason}}`
/// when the engine sent one.
fn decode_error(op: &'static str, status: StatusCode, body: &[u8]) -> Error {
    match serde_json::from_slice::<EsErrorRes>(body) {
        Ok(res) => Error::protocol(op, res.error.kind, res.error.reason),
        Err(_) => Error::protocol(
            op,
            format!("http_{}", status.as_u16()),
            String::from_utf8_lossy(body).into_owned(),
        ),
    }
}

/// Indexer backed by an Elasticsearch-compatible HTTP API.
pub struct ElasticsearchIndexer {
    client: Arc<EsClient>,
    refresh: &'static str,
    page_size: usize,
}

impl ElasticsearchIndexer {
    /// Connect and make sure the index exists. `sync_updates` makes every write
    /// visible to searches before it returns.
    pub async fn new(nodes: Vec<String>, sync_updates: bool) -> Result<Self> {
        Self::builder(nodes).sync_updates(sync_updates).build().await
    }

    pub fn builder(nodes: Vec<String>) -> ElasticsearchIndexerBuilder {
        ElasticsearchIndexerBuilder {
            nodes,
            index: DEFAULT_INDEX_NAME.to_string(),
            sync_updates: false,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    async fn ensure_index(client: &EsClient) -> Result<()> {
        let (status, body) = client
            .send("ensure index", Method::PUT, "", Some(&index_mappings()))
            .await?;
        if status.is_success() {
            tracing::info!(index = %client.index, "es_index_created");
            return Ok(());
        }
        let err = decode_error("ensure index", status, &body);
        if let crate::domain::ErrorKind::Protocol { kind, .. } = err.kind() {
            if kind == "resource_already_exists_exception" {
                tracing::debug!(index = %client.index, "es_index_exists");
                return Ok(());
            }
        }
        Err(err)
    }

    async fn upsert<T: Serialize>(&self, op: &'static str, id: Uuid, doc: T) -> Result<()> {
        let path = format!("/_update/{}?refresh={}", id, self.refresh);
        let body = serde_json::to_value(EsUpsert {
            doc,
            doc_as_upsert: true,
        })
        .map_err(|e| Error::protocol(op, "malformed_request", e.to_string()))?;
        let _: Value = self.client.call(op, Method::POST, &path, &body).await?;
        Ok(())
    }
}

pub struct ElasticsearchIndexerBuilder {
    nodes: Vec<String>,
    index: String,
    sync_updates: bool,
    page_size: usize,
}

impl ElasticsearchIndexerBuilder {
    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.index = name.into();
        self
    }

    pub fn sync_updates(mut self, sync: bool) -> Self {
        self.sync_updates = sync;
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = size.max(1);
        self
    }

    pub async fn build(self) -> Result<ElasticsearchIndexer> {
        let nodes: Vec<String> = self
            .nodes
            .into_iter()
            .map(|n| n.trim().trim_end_matches('/').to_string())
            .filter(|n| !n.is_empty())
            .collect();
        if nodes.is_empty() {
            return Err(Error::protocol(
                "connect",
                "configuration",
                "at least one node address is required",
            ));
        }
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::new("connect", e.into()))?;
        let client = Arc::new(EsClient {
            http,
            nodes,
            next_node: AtomicUsize::new(0),
            index: self.index,
        });
        ElasticsearchIndexer::ensure_index(&client).await?;
        Ok(ElasticsearchIndexer {
            client,
            refresh: if self.sync_updates { "true" } else { "false" },
            page_size: self.page_size,
        })
    }
}

fn search_body(query: &Query, from: u64, size: usize) -> Value {
    let multi_match = match query.kind {
        QueryType::Match => json!({
            "type": "cross_fields",
            "operator": "and",
            "query": query.expression,
            "fields": ["Title", "Content"],
        }),
        QueryType::Phrase => json!({
            "type": "phrase",
            "query": query.expression,
            "fields": ["Title", "Content"],
        }),
    };
    json!({
        "query": {"multi_match": multi_match},
        "from": from,
        "size": size,
        "track_total_hits": true,
        "sort": [
            {"PageRank": {"order": "desc"}},
            {"_score": {"order": "desc"}}
        ]
    })
}

#[async_trait]
impl Indexer for ElasticsearchIndexer {
    async fn index(&self, doc: &Document) -> Result<()> {
        if doc.link_id.is_nil() {
            return Err(Error::missing_link_id("index"));
        }
        let update = EsContentUpdate {
            link_id: doc.link_id.to_string(),
            url: &doc.url,
            title: &doc.title,
            content: &doc.content,
            indexed_at: doc.indexed_at.unwrap_or_else(Utc::now),
        };
        self.upsert("index", doc.link_id, update).await?;
        tracing::debug!(link_id = %doc.link_id, "index_document");
        Ok(())
    }

    async fn find_by_id(&self, link_id: Uuid) -> Result<Document> {
        let op = "find by ID";
        let path = format!("/_doc/{}", link_id);
        let (status, body) = self.client.send(op, Method::GET, &path, None).await?;
        if status == StatusCode::NOT_FOUND {
            if let Ok(EsGetRes { found: false, .. }) = decode_body::<EsGetRes>(op, &body) {
                return Err(Error::not_found(op));
            }
        }
        if !status.is_success() {
            return Err(decode_error(op, status, &body));
        }
        match decode_body::<EsGetRes>(op, &body)? {
            EsGetRes {
                found: true,
                source: Some(source),
            } => source.into_document(op),
            _ => Err(Error::not_found(op)),
        }
    }

    async fn search(&self, query: &Query) -> Result<DocumentIterator> {
        let source = EsPages {
            client: self.client.clone(),
            query: query.clone(),
        };
        let cursor = PagedCursor::start(source, query.offset, self.page_size).await?;
        Ok(Box::new(cursor))
    }

    async fn update_score(&self, link_id: Uuid, score: f64) -> Result<()> {
        if link_id.is_nil() {
            return Err(Error::missing_link_id("update score"));
        }
        let update = EsScoreUpdate {
            link_id: link_id.to_string(),
            page_rank: score,
        };
        self.upsert("update score", link_id, update).await?;
        tracing::debug!(%link_id, score, "update_score");
        Ok(())
    }
}

struct EsPages {
    client: Arc<EsClient>,
    query: Query,
}

#[async_trait]
impl PageSource for EsPages {
    async fn fetch(&mut self, from: u64, size: usize) -> Result<Page> {
        let body = search_body(&self.query, from, size);
        let res: EsSearchRes = self
            .client
            .call("search", Method::POST, "/_search", &body)
            .await?;
        let docs = res
            .hits
            .hit_list
            .into_iter()
            .map(|hit| hit.source.into_document("search"))
            .collect::<Result<Vec<_>>>()?;
        Ok(Page {
            total: res.hits.total.count,
            docs,
        })
    }
}
