use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tantivy::collector::{Count, TopDocs};
use tantivy::query::{
    BooleanQuery, EmptyQuery, Occur, PhraseQuery, Query as TantivyQuery, TermQuery,
};
use tantivy::schema::{FAST, Field, IndexRecordOption, STORED, STRING, Schema, TEXT, Value};
use tantivy::tokenizer::TokenStream;
use tantivy::{
    DocAddress, DocId, Index, IndexReader, IndexWriter, ReloadPolicy, Score, SegmentReader,
    TantivyDocument, Term, doc,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::application::ports::cursor::DocumentIterator;
use crate::application::ports::indexer::Indexer;
use crate::domain::textindex::{Document, Query, QueryType};
use crate::domain::{Error, Result};
use crate::infrastructure::search::DEFAULT_PAGE_SIZE;
use crate::infrastructure::search::paging::{Page, PageSource, PagedCursor};

const WRITER_MEMORY_BYTES: usize = 50_000_000;
const RANK_FIELD: &str = "PageRank";

#[derive(Clone, Copy)]
struct Fields {
    link_id: Field,
    title: Field,
    content: Field,
    page_rank: Field,
}

impl Fields {
    fn schema() -> (Schema, Self) {
        let mut builder = Schema::builder();
        let fields = Self {
            link_id: builder.add_text_field("LinkID", STRING | STORED),
            title: builder.add_text_field("Title", TEXT),
            content: builder.add_text_field("Content", TEXT),
            page_rank: builder.add_f64_field(RANK_FIELD, FAST),
        };
        (builder.build(), fields)
    }
}

fn term_query(term: Term) -> Box<dyn TantivyQuery> {
    Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs))
}

/// Phrase over consecutive terms of one field; a single term is a plain term query.
fn phrase_query(mut terms: Vec<Term>) -> Box<dyn TantivyQuery> {
    if terms.len() == 1 {
        if let Some(term) = terms.pop() {
            return term_query(term);
        }
    }
    Box::new(PhraseQuery::new(terms))
}

/// The authoritative document map and the inverted index it feeds. Always
/// accessed as one unit so rank and searchable fields never tear.
struct IndexState {
    docs: HashMap<Uuid, Document>,
    index: Index,
    writer: IndexWriter,
    reader: IndexReader,
    fields: Fields,
}

impl IndexState {
    /// Replace the searchable projection of `doc` and make it visible.
    fn reindex(&mut self, doc: &Document) -> tantivy::Result<()> {
        let key = doc.link_id.to_string();
        let f = self.fields;
        self.writer.delete_term(Term::from_field_text(f.link_id, &key));
        let written = self
            .writer
            .add_document(doc!(
                f.link_id => key,
                f.title => doc.title.clone(),
                f.content => doc.content.clone(),
                f.page_rank => doc.page_rank,
            ))
            .and_then(|_| self.writer.commit());
        if let Err(err) = written {
            if let Err(rollback) = self.writer.rollback() {
                tracing::warn!(error = %rollback, "tantivy_rollback_failed");
            }
            return Err(err);
        }
        self.reader.reload()
    }

    /// Split `text` into index terms the same way field values were split.
    fn terms(&self, field: Field, text: &str) -> tantivy::Result<Vec<Term>> {
        let mut analyzer = self.index.tokenizer_for_field(field)?;
        let mut stream = analyzer.token_stream(text);
        let mut terms = Vec::new();
        while stream.advance() {
            terms.push(Term::from_field_text(field, &stream.token().text));
        }
        Ok(terms)
    }

    /// Build the engine query from plain terms. The expression is never handed
    /// to a query parser, so operators and field prefixes are ordinary words.
    fn parse(&self, query: &Query) -> tantivy::Result<Box<dyn TantivyQuery>> {
        let f = self.fields;
        let title = self.terms(f.title, &query.expression)?;
        let content = self.terms(f.content, &query.expression)?;
        if title.is_empty() {
            return Ok(Box::new(EmptyQuery));
        }
        let parsed: Box<dyn TantivyQuery> = match query.kind {
            QueryType::Match => {
                let clauses = title
                    .into_iter()
                    .zip(content)
                    .map(|(t, c)| {
                        let either = BooleanQuery::new(vec![
                            (Occur::Should, term_query(t)),
                            (Occur::Should, term_query(c)),
                        ]);
                        (Occur::Must, Box::new(either) as Box<dyn TantivyQuery>)
                    })
                    .collect();
                Box::new(BooleanQuery::new(clauses))
            }
            QueryType::Phrase => Box::new(BooleanQuery::new(vec![
                (Occur::Should, phrase_query(title)),
                (Occur::Should, phrase_query(content)),
            ])),
        };
        Ok(parsed)
    }

    /// Run `query` for the window `[from, from + size)`, ordered by rank then
    /// relevance, and hydrate hits from the document map.
    fn page(&self, query: &dyn TantivyQuery, from: u64, size: usize) -> Result<Page> {
        let searcher = self.reader.searcher();
        let top = TopDocs::with_limit(size)
            .and_offset(from as usize)
            .tweak_score(move |segment: &SegmentReader| {
                let ranks = segment.fast_fields().f64(RANK_FIELD).ok();
                move |doc: DocId, score: Score| {
                    let rank = ranks.as_ref().and_then(|c| c.first(doc)).unwrap_or(0.0);
                    (rank, score)
                }
            });
        let (hits, total): (Vec<((f64, Score), DocAddress)>, usize) = searcher
            .search(query, &(top, Count))
            .map_err(|e| Error::new("search", e.into()))?;

        let mut docs = Vec::with_capacity(hits.len());
        for (_, address) in hits {
            let stored: TantivyDocument = searcher
                .doc(address)
                .map_err(|e| Error::new("search", e.into()))?;
            let link_id = stored
                .get_first(self.fields.link_id)
                .and_then(|v| v.as_str())
                .and_then(|s| Uuid::parse_str(s).ok())
                .ok_or_else(|| Error::protocol("search", "corrupt_index", "hit without link ID"))?;
            let doc = self
                .docs
                .get(&link_id)
                .cloned()
                .ok_or_else(|| Error::not_found("search"))?;
            docs.push(doc);
        }
        Ok(Page {
            total: total as u64,
            docs,
        })
    }
}

/// In-process indexer: a Tantivy RAM index for matching plus a document map
/// that is the source of truth for lookups and rank preservation.
#[derive(Clone)]
pub struct TantivyIndexer {
    inner: Arc<RwLock<IndexState>>,
    page_size: usize,
}

impl TantivyIndexer {
    pub fn new() -> Result<Self> {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Result<Self> {
        let (schema, fields) = Fields::schema();
        let index = Index::create_in_ram(schema);
        let writer: IndexWriter = index
            .writer_with_num_threads(1, WRITER_MEMORY_BYTES)
            .map_err(|e| Error::new("open index", e.into()))?;
        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e: tantivy::TantivyError| Error::new("open index", e.into()))?;
        Ok(Self {
            inner: Arc::new(RwLock::new(IndexState {
                docs: HashMap::new(),
                index,
                writer,
                reader,
                fields,
            })),
            page_size: page_size.max(1),
        })
    }
}

/// Run blocking index work on the blocking pool while the caller keeps `guard`.
async fn blocking<G, T, F>(op: &'static str, guard: G, work: F) -> Result<T>
where
    G: Send + 'static,
    T: Send + 'static,
    F: FnOnce(G) -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || work(guard))
        .await
        .map_err(|e| Error::backend(op, e))?
}

#[async_trait]
impl Indexer for TantivyIndexer {
    async fn index(&self, doc: &Document) -> Result<()> {
        if doc.link_id.is_nil() {
            return Err(Error::missing_link_id("index"));
        }
        let mut stored = doc.clone();
        stored.indexed_at = Some(doc.indexed_at.unwrap_or_else(Utc::now));

        let guard = self.inner.clone().write_owned().await;
        blocking("index", guard, move |mut state| {
            // Rank only changes through update_score.
            stored.page_rank = state
                .docs
                .get(&stored.link_id)
                .map_or(0.0, |existing| existing.page_rank);
            state
                .reindex(&stored)
                .map_err(|e| Error::new("index", e.into()))?;
            tracing::debug!(link_id = %stored.link_id, "index_document");
            state.docs.insert(stored.link_id, stored);
            Ok(())
        })
        .await
    }

    async fn find_by_id(&self, link_id: Uuid) -> Result<Document> {
        self.inner
            .read()
            .await
            .docs
            .get(&link_id)
            .cloned()
            .ok_or_else(|| Error::not_found("find by ID"))
    }

    async fn search(&self, query: &Query) -> Result<DocumentIterator> {
        let parsed = self
            .inner
            .read()
            .await
            .parse(query)
            .map_err(|e| Error::new("search", e.into()))?;
        let source = TantivyPages {
            state: self.inner.clone(),
            query: Arc::from(parsed),
        };
        let cursor = PagedCursor::start(source, query.offset, self.page_size).await?;
        Ok(Box::new(cursor))
    }

    async fn update_score(&self, link_id: Uuid, score: f64) -> Result<()> {
        if link_id.is_nil() {
            return Err(Error::missing_link_id("update score"));
        }
        let guard = self.inner.clone().write_owned().await;
        blocking("update score", guard, move |mut state| {
            let mut updated = state
                .docs
                .get(&link_id)
                .cloned()
                .unwrap_or_else(|| Document::stub(link_id, score));
            updated.page_rank = score;
            state
                .reindex(&updated)
                .map_err(|e| Error::new("update score", e.into()))?;
            tracing::debug!(%link_id, score, "update_score");
            state.docs.insert(link_id, updated);
            Ok(())
        })
        .await
    }
}

struct TantivyPages {
    state: Arc<RwLock<IndexState>>,
    query: Arc<dyn TantivyQuery>,
}

#[async_trait]
impl PageSource for TantivyPages {
    async fn fetch(&mut self, from: u64, size: usize) -> Result<Page> {
        let guard = self.state.clone().read_owned().await;
        let query = self.query.clone();
        blocking("search", guard, move |state| {
            state.page(query.as_ref(), from, size)
        })
        .await
    }
}
