use std::sync::Arc;

use thiserror::Error as ThisError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;
type SharedError = Arc<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, Error>;

/// What went wrong, independent of which backend reported it.
#[derive(Debug, Clone, ThisError)]
pub enum ErrorKind {
    #[error("not found")]
    NotFound,
    #[error("unknown source and/or destination for edge")]
    UnknownEdgeLinks,
    #[error("document does not provide a valid link ID")]
    MissingLinkId,
    #[error("backend unavailable: {0}")]
    Unavailable(#[source] SharedError),
    #[error("{kind}: {reason}")]
    Protocol { kind: String, reason: String },
    #[error("backend error: {0}")]
    Backend(#[source] SharedError),
}

/// Store error tagged with the operation that produced it.
#[derive(Debug, Clone, ThisError)]
#[error("{op}: {kind}")]
pub struct Error {
    op: &'static str,
    #[source]
    kind: ErrorKind,
}

impl Error {
    pub fn new(op: &'static str, kind: ErrorKind) -> Self {
        Self { op, kind }
    }

    pub fn not_found(op: &'static str) -> Self {
        Self::new(op, ErrorKind::NotFound)
    }

    pub fn missing_link_id(op: &'static str) -> Self {
        Self::new(op, ErrorKind::MissingLinkId)
    }

    pub fn unavailable(op: &'static str, source: impl Into<BoxError>) -> Self {
        Self::new(op, ErrorKind::Unavailable(Arc::from(source.into())))
    }

    pub fn protocol(op: &'static str, kind: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(
            op,
            ErrorKind::Protocol {
                kind: kind.into(),
                reason: reason.into(),
            },
        )
    }

    pub fn backend(op: &'static str, source: impl Into<BoxError>) -> Self {
        Self::new(op, ErrorKind::Backend(Arc::from(source.into())))
    }

    pub fn op(&self) -> &'static str {
        self.op
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound)
    }

    pub fn is_unknown_edge_links(&self) -> bool {
        matches!(self.kind, ErrorKind::UnknownEdgeLinks)
    }

    pub fn is_missing_link_id(&self) -> bool {
        matches!(self.kind, ErrorKind::MissingLinkId)
    }

    /// Connectivity-style failures that are worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self.kind, ErrorKind::Unavailable(_))
    }

    /// Errors a batch job should skip the offending item on instead of aborting.
    pub fn is_item_error(&self) -> bool {
        self.is_not_found() || self.is_unknown_edge_links() || self.is_missing_link_id()
    }

    /// Re-tag an error with an outer operation name, keeping its kind.
    pub fn within(self, op: &'static str) -> Self {
        Self { op, kind: self.kind }
    }
}

impl From<sqlx::Error> for ErrorKind {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ErrorKind::NotFound,
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                ErrorKind::UnknownEdgeLinks
            }
            e @ (sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed) => ErrorKind::Unavailable(Arc::new(e)),
            e => ErrorKind::Backend(Arc::new(e)),
        }
    }
}

impl From<reqwest::Error> for ErrorKind {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ErrorKind::Protocol {
                kind: "malformed_response".into(),
                reason: err.to_string(),
            }
        } else if err.is_connect() || err.is_timeout() || err.is_request() {
            ErrorKind::Unavailable(Arc::new(err))
        } else {
            ErrorKind::Backend(Arc::new(err))
        }
    }
}

impl From<tantivy::TantivyError> for ErrorKind {
    fn from(err: tantivy::TantivyError) -> Self {
        ErrorKind::Backend(Arc::new(err))
    }
}
