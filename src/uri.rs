use std::fmt;

use crate::{Res, error::CacheError};

/// A Spotify resource identifier in the canonical `spotify:<kind>:<id>` form.
///
/// A `Uri` addresses exactly one remote resource and is the key under which
/// the cache registers the resource's single local instance. Identifiers are
/// immutable; equality and hashing consider the `(kind, id)` pair only, and
/// `to_string` reproduces the exact text `parse` accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Uri {
    kind: String,
    id: String,
}

impl Uri {
    /// Parses a canonical identifier string.
    ///
    /// The text must consist of exactly three colon-separated segments with
    /// the literal namespace `spotify` in front, e.g. `spotify:track:abc123`.
    /// Anything else yields [`CacheError::Format`].
    pub fn parse(text: &str) -> Res<Self> {
        let segments: Vec<&str> = text.split(':').collect();
        if segments.len() != 3 {
            return Err(CacheError::Format(format!(
                "'{text}' is not in the form spotify:<kind>:<id>"
            )));
        }
        if segments[0] != "spotify" {
            return Err(CacheError::Format(format!(
                "'{text}' does not use the 'spotify' namespace"
            )));
        }
        Ok(Self {
            kind: segments[1].to_string(),
            id: segments[2].to_string(),
        })
    }

    /// Builds an identifier directly from its kind and id parts.
    pub fn from_parts(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// The well-known identifier of the current session's user.
    ///
    /// Resolved through the same cache path as every other resource; the
    /// `@me` id makes the entity fetch the `me` endpoints instead of
    /// `users/{id}`.
    pub fn me() -> Self {
        Self::from_parts("user", "@me")
    }

    /// The well-known identifier of the current user's saved tracks.
    pub fn saved_tracks() -> Self {
        Self::from_parts("collection", "@saved")
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "spotify:{}:{}", self.kind, self.id)
    }
}
