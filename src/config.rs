//! Configuration management for the Spotify object cache.
//!
//! This module handles loading and accessing configuration values from
//! environment variables and `.env` files, and defines the [`CacheConfig`]
//! handed to [`crate::Client::new`].
//!
//! The configuration system follows a hierarchical approach:
//! 1. Values set explicitly on [`CacheConfig`] (highest priority)
//! 2. Environment variables
//! 3. Application defaults

use std::{env, path::PathBuf};

use crate::{Res, error::CacheError};

/// Loads environment variables from a `.env` file in the local data directory.
///
/// Looks for the file in the platform-specific local data directory under
/// `spotidex/.env`:
/// - Linux: `~/.local/share/spotidex/.env`
/// - macOS: `~/Library/Application Support/spotidex/.env`
/// - Windows: `%LOCALAPPDATA%/spotidex/.env`
///
/// Creates the directory if it does not exist yet. Fails with
/// [`CacheError::Store`] if the directory cannot be created or the file
/// cannot be parsed.
pub async fn load_env() -> Res<()> {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("spotidex/.env");
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|e| CacheError::Store(e.to_string()))?;
    }

    dotenv::from_path(path).map_err(|e| CacheError::Store(e.to_string()))?;
    Ok(())
}

/// Returns the Spotify Web API base URL.
///
/// Reads the `SPOTIFY_API_URL` environment variable and falls back to the
/// public production endpoint when it is unset.
pub fn api_url() -> String {
    env::var("SPOTIFY_API_URL").unwrap_or_else(|_| "https://api.spotify.com/v1".to_string())
}

/// Returns the default directory for persisted resource snapshots.
///
/// Honors the `SPOTIDEX_CACHE_DIR` environment variable, otherwise uses
/// `spotidex/cache` inside the platform-specific local data directory.
pub fn default_cache_dir() -> PathBuf {
    if let Ok(dir) = env::var("SPOTIDEX_CACHE_DIR") {
        return PathBuf::from(dir);
    }
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("spotidex/cache");
    path
}

/// Settings for a [`crate::Client`]'s cache behavior.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory for persisted snapshots. `None` disables persistence
    /// entirely, in which case every load goes to the network.
    pub cache_dir: Option<PathBuf>,
    /// Override for the API base URL. `None` falls back to [`api_url`].
    pub api_url: Option<String>,
    /// Whether kinds without a version token (everything except playlists)
    /// may be served from the persistent store without revalidation. Such
    /// snapshots are refreshed by explicit invalidation, not by TTL.
    pub unversioned_from_store: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: Some(default_cache_dir()),
            api_url: None,
            unversioned_from_store: true,
        }
    }
}

impl CacheConfig {
    /// A configuration with persistence disabled.
    pub fn ephemeral() -> Self {
        Self {
            cache_dir: None,
            ..Self::default()
        }
    }
}
