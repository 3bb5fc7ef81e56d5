use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A page as seen by the text index. `link_id` doubles as the document key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub link_id: Uuid,
    pub url: String,
    pub title: String,
    pub content: String,
    pub indexed_at: Option<DateTime<Utc>>,
    pub page_rank: f64,
}

impl Document {
    /// Rank-only placeholder, created when a score arrives before the content.
    pub fn stub(link_id: Uuid, page_rank: f64) -> Self {
        Self {
            link_id,
            page_rank,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryType {
    /// Every term must appear, in any order, in the title or the content.
    #[default]
    Match,
    /// The expression must appear verbatim as a phrase.
    Phrase,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Query {
    pub kind: QueryType,
    pub expression: String,
    /// Number of leading results to skip.
    pub offset: u64,
}

impl Query {
    pub fn matching(expression: impl Into<String>) -> Self {
        Self {
            kind: QueryType::Match,
            expression: expression.into(),
            offset: 0,
        }
    }

    pub fn phrase(expression: impl Into<String>) -> Self {
        Self {
            kind: QueryType::Phrase,
            expression: expression.into(),
            offset: 0,
        }
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }
}
