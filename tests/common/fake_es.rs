//! Minimal in-process stand-in for the parts of the Elasticsearch HTTP API the
//! indexer uses: index creation, partial-update upserts, get and search.

use std::collections::{BTreeMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{Map, Value, json};

/// Search expression that makes the fake answer with a structured error.
pub const BROKEN_QUERY: &str = "trigger parsing failure";

#[derive(Default)]
struct FakeState {
    indices: HashSet<String>,
    docs: BTreeMap<String, Map<String, Value>>,
    search_requests: usize,
}

#[derive(Clone, Default)]
pub struct FakeEs {
    state: Arc<Mutex<FakeState>>,
}

impl FakeEs {
    /// Serve on an ephemeral port and return the node base URL.
    pub async fn spawn() -> (Self, String) {
        let fake = FakeEs::default();
        let app = Router::new()
            .route("/:index", put(create_index))
            .route("/:index/_update/:id", post(update_doc))
            .route("/:index/_doc/:id", get(get_doc))
            .route("/:index/_search", post(search))
            .with_state(fake.clone());
        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (fake, format!("http://{addr}"))
    }

    pub fn search_requests(&self) -> usize {
        self.state.lock().unwrap().search_requests
    }

    pub fn stored(&self, id: &str) -> Option<Map<String, Value>> {
        self.state.lock().unwrap().docs.get(id).cloned()
    }
}

fn es_error(status: StatusCode, kind: &str, reason: &str) -> Response {
    (
        status,
        Json(json!({"error": {"type": kind, "reason": reason}, "status": status.as_u16()})),
    )
        .into_response()
}

async fn create_index(State(fake): State<FakeEs>, Path(index): Path<String>) -> Response {
    let mut state = fake.state.lock().unwrap();
    if !state.indices.insert(index.clone()) {
        return es_error(
            StatusCode::BAD_REQUEST,
            "resource_already_exists_exception",
            &format!("index [{index}] already exists"),
        );
    }
    Json(json!({"acknowledged": true, "index": index})).into_response()
}

async fn update_doc(
    State(fake): State<FakeEs>,
    Path((_index, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    let Some(partial) = body.get("doc").and_then(|d| d.as_object()).cloned() else {
        return es_error(StatusCode::BAD_REQUEST, "action_request_validation_exception", "doc is missing");
    };
    if body.get("doc_as_upsert") != Some(&Value::Bool(true)) {
        return es_error(StatusCode::BAD_REQUEST, "unsupported", "doc_as_upsert required");
    }
    let mut state = fake.state.lock().unwrap();
    let created = !state.docs.contains_key(&id);
    let stored = state.docs.entry(id.clone()).or_default();
    for (k, v) in partial {
        stored.insert(k, v);
    }
    let result = if created { "created" } else { "updated" };
    Json(json!({"_id": id, "result": result})).into_response()
}

async fn get_doc(State(fake): State<FakeEs>, Path((_index, id)): Path<(String, String)>) -> Response {
    let state = fake.state.lock().unwrap();
    match state.docs.get(&id) {
        Some(doc) => Json(json!({"_id": id, "found": true, "_source": doc})).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"_id": id, "found": false}))).into_response(),
    }
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn field_tokens(doc: &Map<String, Value>, field: &str) -> Vec<String> {
    tokens(doc.get(field).and_then(|v| v.as_str()).unwrap_or_default())
}

fn matches(doc: &Map<String, Value>, kind: &str, expression: &str) -> bool {
    let wanted = tokens(expression);
    if wanted.is_empty() {
        return false;
    }
    let title = field_tokens(doc, "Title");
    let content = field_tokens(doc, "Content");
    match kind {
        "phrase" => [title, content]
            .iter()
            .any(|field| field.windows(wanted.len()).any(|w| w == wanted.as_slice())),
        _ => wanted
            .iter()
            .all(|t| title.contains(t) || content.contains(t)),
    }
}

fn rank(doc: &Map<String, Value>) -> f64 {
    doc.get("PageRank").and_then(|v| v.as_f64()).unwrap_or(0.0)
}

async fn search(State(fake): State<FakeEs>, Json(body): Json<Value>) -> Response {
    let mm = &body["query"]["multi_match"];
    let kind = mm["type"].as_str().unwrap_or("best_fields");
    let expression = mm["query"].as_str().unwrap_or_default();
    if expression == BROKEN_QUERY {
        return es_error(StatusCode::BAD_REQUEST, "parsing_exception", "unknown query");
    }
    let from = body["from"].as_u64().unwrap_or(0) as usize;
    let size = body["size"].as_u64().unwrap_or(10) as usize;

    let mut state = fake.state.lock().unwrap();
    state.search_requests += 1;
    let mut hits: Vec<(&String, &Map<String, Value>)> = state
        .docs
        .iter()
        .filter(|(_, doc)| matches(doc, kind, expression))
        .collect();
    hits.sort_by(|a, b| rank(b.1).total_cmp(&rank(a.1)).then_with(|| a.0.cmp(b.0)));
    let total = hits.len();
    let page: Vec<Value> = hits
        .into_iter()
        .skip(from)
        .take(size)
        .map(|(id, doc)| json!({"_id": id, "_source": doc}))
        .collect();
    Json(json!({
        "hits": {
            "total": {"value": total, "relation": "eq"},
            "hits": page
        }
    }))
    .into_response()
}
