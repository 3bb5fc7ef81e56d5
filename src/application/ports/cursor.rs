use async_trait::async_trait;

use crate::domain::{Error, Result};
use crate::domain::linkgraph::{Edge, Link};
use crate::domain::textindex::Document;

/// Pull-based cursor shared by graph scans and search results.
///
/// `next` returns `false` on exhaustion or on the first error; the error stays
/// latched and `next` keeps returning `false` afterwards. `current` is only
/// meaningful after `next` returned `true`. `close` releases backend resources,
/// is idempotent and may be called at any point.
#[async_trait]
pub trait Cursor: Send {
    type Item: Send;

    async fn next(&mut self) -> bool;

    fn error(&self) -> Option<&Error>;

    fn current(&self) -> Option<&Self::Item>;

    fn close(&mut self) -> Result<()>;
}

/// Search results additionally expose the backend's approximate match count.
pub trait SearchCursor: Cursor<Item = Document> {
    fn total_count(&self) -> u64;
}

pub type LinkIterator = Box<dyn Cursor<Item = Link>>;
pub type EdgeIterator = Box<dyn Cursor<Item = Edge>>;
pub type DocumentIterator = Box<dyn SearchCursor>;

/// Drain a cursor into a vector, closing it on every path.
pub async fn collect<C>(cursor: &mut C) -> Result<Vec<C::Item>>
where
    C: Cursor + ?Sized,
    C::Item: Clone,
{
    let mut out = Vec::new();
    while cursor.next().await {
        if let Some(item) = cursor.current() {
            out.push(item.clone());
        }
    }
    let latched = cursor.error().cloned();
    cursor.close()?;
    match latched {
        Some(err) => Err(err),
        None => Ok(out),
    }
}

/// Cursor over an already materialised snapshot.
pub struct VecCursor<T> {
    items: std::vec::IntoIter<T>,
    current: Option<T>,
    closed: bool,
}

impl<T> VecCursor<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: items.into_iter(),
            current: None,
            closed: false,
        }
    }
}

#[async_trait]
impl<T: Send> Cursor for VecCursor<T> {
    type Item = T;

    async fn next(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.current = self.items.next();
        if self.current.is_none() {
            self.closed = true;
        }
        self.current.is_some()
    }

    fn error(&self) -> Option<&Error> {
        None
    }

    fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.items = Vec::new().into_iter();
        Ok(())
    }
}
