use async_trait::async_trait;

use crate::application::ports::cursor::{Cursor, SearchCursor};
use crate::domain::textindex::Document;
use crate::domain::{Error, Result};

/// One backend result page together with the engine's current total.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub total: u64,
    pub docs: Vec<Document>,
}

/// Something that can return the results `[from, from + size)` of a fixed query.
#[async_trait]
pub trait PageSource: Send {
    async fn fetch(&mut self, from: u64, size: usize) -> Result<Page>;
}

enum State {
    Idle,
    Yielding,
    Exhausted,
    Errored(Error),
}

/// Hides backend pagination behind a single cursor.
///
/// `total` counts matches from the start of the result list, so the cursor
/// stops once `offset + yielded` reaches it. The total is refreshed from every
/// page; an empty page ends iteration even if the engine still claims more.
pub struct PagedCursor<S> {
    source: Option<S>,
    state: State,
    page: std::vec::IntoIter<Document>,
    next_from: u64,
    position: u64,
    page_size: usize,
    total: u64,
    current: Option<Document>,
}

impl<S: PageSource> PagedCursor<S> {
    /// Fetch the first page eagerly so that query errors surface here and
    /// the total is known before any result is consumed.
    pub async fn start(mut source: S, offset: u64, page_size: usize) -> Result<Self> {
        let page_size = page_size.max(1);
        let first = source.fetch(offset, page_size).await?;
        let mut cursor = Self {
            source: Some(source),
            state: State::Idle,
            page: Vec::new().into_iter(),
            next_from: offset,
            position: offset,
            page_size,
            total: 0,
            current: None,
        };
        cursor.accept(first);
        Ok(cursor)
    }

    fn accept(&mut self, page: Page) {
        self.total = page.total;
        self.next_from += page.docs.len() as u64;
        self.state = if page.docs.is_empty() {
            State::Exhausted
        } else {
            State::Yielding
        };
        self.page = page.docs.into_iter();
    }

    async fn refill(&mut self) -> bool {
        let Some(source) = self.source.as_mut() else {
            self.state = State::Exhausted;
            return false;
        };
        match source.fetch(self.next_from, self.page_size).await {
            Ok(page) => {
                self.accept(page);
                matches!(self.state, State::Yielding)
            }
            Err(err) => {
                tracing::debug!(error = %err, from = self.next_from, "search_page_fetch_failed");
                self.state = State::Errored(err);
                false
            }
        }
    }
}

#[async_trait]
impl<S: PageSource> Cursor for PagedCursor<S> {
    type Item = Document;

    async fn next(&mut self) -> bool {
        loop {
            match self.state {
                State::Exhausted | State::Errored(_) => {
                    self.current = None;
                    return false;
                }
                State::Idle => {
                    if !self.refill().await {
                        self.current = None;
                        return false;
                    }
                }
                State::Yielding => {
                    if self.position >= self.total {
                        self.state = State::Exhausted;
                        continue;
                    }
                    match self.page.next() {
                        Some(doc) => {
                            self.position += 1;
                            self.current = Some(doc);
                            return true;
                        }
                        None => self.state = State::Idle,
                    }
                }
            }
        }
    }

    fn error(&self) -> Option<&Error> {
        match &self.state {
            State::Errored(err) => Some(err),
            _ => None,
        }
    }

    fn current(&self) -> Option<&Document> {
        self.current.as_ref()
    }

    fn close(&mut self) -> Result<()> {
        self.source = None;
        self.page = Vec::new().into_iter();
        if !matches!(self.state, State::Errored(_)) {
            self.state = State::Exhausted;
        }
        Ok(())
    }
}

impl<S: PageSource> SearchCursor for PagedCursor<S> {
    fn total_count(&self) -> u64 {
        self.total
    }
}
