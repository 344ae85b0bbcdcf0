//! Spotify Object Cache Library
//!
//! This library exposes the Spotify Web API catalog (tracks, albums, artists,
//! playlists, users) as lazily-populated local objects. Every remote resource
//! is addressed by a [`Uri`] and mapped to exactly one in-process instance;
//! reading an attribute that has not been fetched yet triggers a coordinated
//! load through the shared [`Cache`], which coalesces concurrent fetches of
//! the same resource, serves snapshots from a local store when possible, and
//! detects stale playlist data via snapshot ids.
//!
//! # Modules
//!
//! - `cache` - Identity-preserving object cache and fetch coordination
//! - `client` - High-level client facade (typed getters, playback, search)
//! - `config` - Configuration management and environment variables
//! - `connection` - Authenticated HTTP access to the Spotify Web API
//! - `entity` - Entity kinds and their lazy-attribute protocol
//! - `error` - Error taxonomy shared across the crate
//! - `store` - Persistent snapshot store backed by the local filesystem
//! - `uri` - Resource identifiers in the `spotify:<kind>:<id>` form
//!
//! # Example
//!
//! ```
//! use spotidex::{CacheConfig, Client, Uri};
//!
//! #[tokio::main]
//! async fn main() -> spotidex::Res<()> {
//!     let client = Client::new("access-token", CacheConfig::default());
//!     let track = client.get_track(&Uri::parse("spotify:track:abc123")?)?;
//!     println!("{}", track.name().await?);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod connection;
pub mod entity;
pub mod error;
pub mod store;
pub mod uri;

pub use cache::Cache;
pub use client::Client;
pub use config::CacheConfig;
pub use connection::Connection;
pub use entity::{Album, Artist, Hints, Image, Playlist, SavedTracks, Track, User};
pub use error::CacheError;
pub use store::Store;
pub use uri::Uri;

/// A convenient Result type alias for operations that may fail.
///
/// Every fallible operation in this crate reports a [`CacheError`], so the
/// alias keeps signatures short throughout the library and in application
/// code built on top of it.
pub type Res<T> = std::result::Result<T, CacheError>;

/// Prints an informational message with a blue bullet point.
///
/// Creates a formatted output line with a distinctive blue "o" indicator
/// followed by the provided message. Used for general information and
/// status updates.
///
/// # Example
///
/// ```
/// info!("Loaded {} playlists", count);
/// ```
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a warning message with a yellow exclamation mark.
///
/// Creates a formatted output line with a yellow "!" indicator to highlight
/// potential issues that don't require aborting the operation. The cache
/// layer uses this to report persistence failures it degrades gracefully
/// around.
///
/// # Example
///
/// ```
/// warning!("Cache file not found, will create new one");
/// ```
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
