//! Persistent snapshot store backed by the local filesystem.
//!
//! One JSON file per resource, grouped by kind:
//! `<root>/<kind>/<id>.json`. The store knows nothing about freshness;
//! the cache decides when a stored snapshot may be trusted.

use std::path::PathBuf;

use serde_json::Value;

use crate::{Res, error::CacheError, uri::Uri};

/// A simple blob store keyed by resource identifier.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Reads the stored snapshot for the given identifier.
    ///
    /// A missing file is a plain miss (`Ok(None)`); an unreadable or
    /// unparsable file is [`CacheError::Store`], which the cache degrades
    /// to a miss as well.
    pub async fn read(&self, uri: &Uri) -> Res<Option<Value>> {
        let path = self.path_for(uri);
        let content = match async_fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(CacheError::Store(err.to_string())),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| CacheError::Store(e.to_string()))
    }

    /// Writes a snapshot for the given identifier, creating directories as
    /// needed.
    pub async fn write(&self, uri: &Uri, payload: &Value) -> Res<()> {
        let path = self.path_for(uri);
        if let Some(parent) = path.parent() {
            async_fs::create_dir_all(parent)
                .await
                .map_err(|e| CacheError::Store(e.to_string()))?;
        }

        let json =
            serde_json::to_string_pretty(payload).map_err(|e| CacheError::Store(e.to_string()))?;
        async_fs::write(&path, json)
            .await
            .map_err(|e| CacheError::Store(e.to_string()))
    }

    fn path_for(&self, uri: &Uri) -> PathBuf {
        self.root
            .join(uri.kind())
            .join(format!("{id}.json", id = uri.id()))
    }
}
