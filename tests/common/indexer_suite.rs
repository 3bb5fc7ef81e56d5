//! Behaviour every `Indexer` backend must share.

use std::collections::HashSet;

use linkstore::application::ports::cursor::collect;
use linkstore::domain::textindex::{Document, Query};
use linkstore::{Cursor, Indexer, SearchCursor};
use pretty_assertions::assert_eq;
use uuid::Uuid;

use super::now;

fn page(title: &str, content: &str) -> Document {
    let link_id = Uuid::new_v4();
    Document {
        link_id,
        url: format!("https://example.com/{link_id}"),
        title: title.into(),
        content: content.into(),
        indexed_at: Some(now()),
        page_rank: 0.0,
    }
}

async fn ids(idx: &dyn Indexer, query: Query) -> Vec<Uuid> {
    let mut it = idx.search(&query).await.unwrap();
    collect(it.as_mut())
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.link_id)
        .collect()
}

pub async fn rejects_missing_link_id(idx: &dyn Indexer) {
    let doc = Document {
        title: "no id".into(),
        ..Document::default()
    };
    assert!(idx.index(&doc).await.unwrap_err().is_missing_link_id());
    assert!(idx.update_score(Uuid::nil(), 1.0).await.unwrap_err().is_missing_link_id());
}

pub async fn index_then_find(idx: &dyn Indexer) {
    let doc = page("Ferris the crab", "Ferris is the unofficial mascot");
    idx.index(&doc).await.unwrap();
    let got = idx.find_by_id(doc.link_id).await.unwrap();
    assert_eq!(got, doc);

    let mut updated = doc.clone();
    updated.title = "Ferris, renamed".into();
    idx.index(&updated).await.unwrap();
    assert_eq!(idx.find_by_id(doc.link_id).await.unwrap().title, "Ferris, renamed");

    let err = idx.find_by_id(Uuid::new_v4()).await.unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");
}

pub async fn reindex_preserves_rank(idx: &dyn Indexer) {
    let mut doc = page("rank keeper", "content stays searchable");
    idx.index(&doc).await.unwrap();
    idx.update_score(doc.link_id, 0.75).await.unwrap();

    doc.content = "content changed after ranking".into();
    doc.page_rank = 0.0;
    idx.index(&doc).await.unwrap();

    let got = idx.find_by_id(doc.link_id).await.unwrap();
    assert_eq!(got.page_rank, 0.75);
    assert_eq!(got.content, "content changed after ranking");
}

pub async fn score_before_content(idx: &dyn Indexer) {
    let doc = page("late arrival", "content indexed after its score");
    idx.update_score(doc.link_id, 0.4).await.unwrap();
    assert_eq!(idx.find_by_id(doc.link_id).await.unwrap().page_rank, 0.4);

    idx.index(&doc).await.unwrap();
    let got = idx.find_by_id(doc.link_id).await.unwrap();
    assert_eq!(got.page_rank, 0.4);
    assert_eq!(got.title, "late arrival");
    assert_eq!(ids(idx, Query::matching("arrival")).await, vec![doc.link_id]);
}

pub async fn match_and_phrase_queries(idx: &dyn Indexer) {
    let ordered = page("quick brown fox", "jumps over the lazy dog");
    let shuffled = page("brown quick fox", "naps under a tree");
    let unrelated = page("slow turtle", "never jumps");
    for d in [&ordered, &shuffled, &unrelated] {
        idx.index(d).await.unwrap();
    }

    let matched: HashSet<Uuid> = ids(idx, Query::matching("quick brown")).await.into_iter().collect();
    assert_eq!(matched, HashSet::from([ordered.link_id, shuffled.link_id]));

    assert_eq!(ids(idx, Query::phrase("quick brown")).await, vec![ordered.link_id]);
    assert_eq!(ids(idx, Query::matching("lazy dog")).await, vec![ordered.link_id]);
    assert!(ids(idx, Query::matching("quick turtle")).await.is_empty());
}

pub async fn results_follow_rank_across_pages(idx: &dyn Indexer) {
    let mut want = Vec::new();
    for i in 0..25 {
        let doc = page(&format!("common title {i}"), "shared body text");
        idx.index(&doc).await.unwrap();
        idx.update_score(doc.link_id, i as f64 / 100.0).await.unwrap();
        want.push(doc.link_id);
    }
    want.reverse();

    let mut it = idx.search(&Query::matching("common")).await.unwrap();
    assert_eq!(it.total_count(), 25);
    let mut got = Vec::new();
    while it.next().await {
        got.push(it.current().unwrap().link_id);
    }
    assert!(it.error().is_none());
    it.close().unwrap();
    assert_eq!(got, want);

    let offset = ids(idx, Query::matching("common").with_offset(20)).await;
    assert_eq!(offset, want[20..].to_vec());

    let past_end = ids(idx, Query::matching("common").with_offset(40)).await;
    assert!(past_end.is_empty());
}

pub async fn search_cursor_close(idx: &dyn Indexer) {
    for i in 0..3 {
        idx.index(&page(&format!("closing {i}"), "body")).await.unwrap();
    }
    let mut it = idx.search(&Query::matching("closing")).await.unwrap();
    it.close().unwrap();
    it.close().unwrap();
    assert!(!it.next().await);
    assert!(it.error().is_none());

    let mut it = idx.search(&Query::matching("closing")).await.unwrap();
    assert!(it.next().await);
    it.close().unwrap();
    assert!(!it.next().await);

    let mut it = idx.search(&Query::matching("zebra")).await.unwrap();
    assert_eq!(it.total_count(), 0);
    assert!(!it.next().await);
    it.close().unwrap();
}

pub async fn query_syntax_is_plain_text(idx: &dyn Indexer) {
    let rust = page("rust tips", "borrowing explained");
    let python = page("python tips", "decorators explained");
    for d in [&rust, &python] {
        idx.index(d).await.unwrap();
    }

    assert!(ids(idx, Query::matching("rust OR python")).await.is_empty());
    assert!(ids(idx, Query::matching("Title:rust")).await.is_empty());
    assert!(ids(idx, Query::matching("+rust -python")).await.is_empty());
    assert_eq!(ids(idx, Query::matching("rust tips")).await, vec![rust.link_id]);
    assert_eq!(ids(idx, Query::phrase("python tips")).await, vec![python.link_id]);
    assert_eq!(ids(idx, Query::phrase("tips")).await.len(), 2);
}

pub async fn first_index_ignores_incoming_rank(idx: &dyn Indexer) {
    let mut doc = page("fresh page", "never scored");
    doc.page_rank = 0.5;
    idx.index(&doc).await.unwrap();
    assert_eq!(idx.find_by_id(doc.link_id).await.unwrap().page_rank, 0.0);
}
