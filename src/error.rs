use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Which of the four upstream collections a fetch was reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Votes,
    Categories,
    Nominees,
    Users,
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Collection::Votes => "votes",
            Collection::Categories => "categories",
            Collection::Nominees => "nominees",
            Collection::Users => "users",
        };
        f.write_str(name)
    }
}

/// Failure of a single read against an upstream source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed timestamp {value:?}: {reason}")]
    Timestamp { value: String, reason: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Error)]
pub enum TallyError {
    #[error("failed to fetch {collection}: {source}")]
    Fetch {
        collection: Collection,
        #[source]
        source: SourceError,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl TallyError {
    pub fn fetch(collection: Collection, source: SourceError) -> Self {
        TallyError::Fetch { collection, source }
    }
}

pub type SourceResult<T> = Result<T, SourceError>;
