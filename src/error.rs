use std::fmt;

/// Errors surfaced by the cache layer and its collaborators.
///
/// The enum is `Clone` because a single in-flight fetch can have many
/// coalesced waiters, and every one of them receives the same terminal
/// outcome. Underlying causes (I/O, HTTP) are therefore captured as
/// messages rather than as the source error values themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// A resource identifier was not in the `spotify:<kind>:<id>` form.
    /// Never retried.
    Format(String),
    /// The Connection failed to complete an HTTP exchange. Retry policy,
    /// if any, lives in the Connection; the cache only propagates.
    Transport {
        status: Option<u16>,
        message: String,
    },
    /// A payload was missing an expected key or held the wrong shape.
    /// The entity being loaded is left untouched.
    MalformedResponse { key: String },
    /// The resource's version token did not match the one the caller
    /// required. Recoverable: the caller may re-issue the load with the
    /// version the server actually reported.
    Staleness {
        expected: String,
        found: Option<String>,
    },
    /// The persistent store failed to read or write a snapshot. Reads
    /// degrade to a cache miss; writes are logged and never fail a load.
    Store(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Format(msg) => write!(f, "invalid resource identifier: {msg}"),
            CacheError::Transport { status, message } => match status {
                Some(status) => write!(f, "transport error (status {status}): {message}"),
                None => write!(f, "transport error: {message}"),
            },
            CacheError::MalformedResponse { key } => {
                write!(f, "malformed response: missing or invalid key '{key}'")
            }
            CacheError::Staleness { expected, found } => match found {
                Some(found) => write!(
                    f,
                    "stale resource: expected version '{expected}', server reports '{found}'"
                ),
                None => write!(
                    f,
                    "stale resource: expected version '{expected}', none available"
                ),
            },
            CacheError::Store(msg) => write!(f, "persistent store error: {msg}"),
        }
    }
}

impl std::error::Error for CacheError {}

impl From<reqwest::Error> for CacheError {
    fn from(err: reqwest::Error) -> Self {
        CacheError::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}
