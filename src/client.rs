//! High-level client facade over the connection and the object cache.
//!
//! Typed getters hand out cached entity handles; the playback and search
//! verbs are one-shot API calls with no caching concern, forwarded straight
//! to the [`Connection`].

use reqwest::Method;
use serde_json::{Value, json};

use crate::{
    Res,
    cache::Cache,
    config::{self, CacheConfig},
    connection::Connection,
    entity::{Album, Artist, Hints, Playlist, SavedTracks, Track, User},
    error::CacheError,
    store::Store,
    uri::Uri,
};

/// A Spotify Web API client with a lazy, identity-preserving object cache.
pub struct Client {
    connection: Connection,
    cache: Cache,
}

impl Client {
    /// Builds a client from an access token and cache settings.
    ///
    /// Token acquisition and refresh are the application's concern; the
    /// client only carries the token into its requests.
    pub fn new(token: impl Into<String>, config: CacheConfig) -> Self {
        let api_url = config.api_url.clone().unwrap_or_else(config::api_url);
        let connection = Connection::new(api_url, token);
        let store = config.cache_dir.clone().map(Store::new);
        let cache = Cache::new(connection.clone(), store, config.unversioned_from_store);
        Self { connection, cache }
    }

    /// The cache backing this client's entity handles.
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn get_track(&self, uri: &Uri) -> Res<Track> {
        self.checked_handle(uri, "track")?;
        Ok(Track::handle(self.cache.clone(), uri.clone()))
    }

    pub fn get_album(&self, uri: &Uri) -> Res<Album> {
        self.checked_handle(uri, "album")?;
        Ok(Album::handle(self.cache.clone(), uri.clone()))
    }

    pub fn get_artist(&self, uri: &Uri) -> Res<Artist> {
        self.checked_handle(uri, "artist")?;
        Ok(Artist::handle(self.cache.clone(), uri.clone()))
    }

    pub fn get_playlist(&self, uri: &Uri) -> Res<Playlist> {
        self.checked_handle(uri, "playlist")?;
        Ok(Playlist::handle(self.cache.clone(), uri.clone()))
    }

    pub fn get_user(&self, uri: &Uri) -> Res<User> {
        self.checked_handle(uri, "user")?;
        Ok(User::handle(self.cache.clone(), uri.clone()))
    }

    /// The current session's user, addressed by the well-known `@me`
    /// identifier and cached like any other resource.
    pub fn me(&self) -> Res<User> {
        self.get_user(&Uri::me())
    }

    /// The current user's saved track collection.
    pub fn saved_tracks(&self) -> Res<SavedTracks> {
        let uri = Uri::saved_tracks();
        self.cache.get_or_create(&uri, Hints::default())?;
        Ok(SavedTracks::handle(self.cache.clone(), uri))
    }

    /// The playlists saved in the current user's profile.
    pub async fn user_playlists(&self) -> Res<Vec<Playlist>> {
        self.me()?.playlists().await
    }

    /// Resumes playback, or starts playing the given context (album or
    /// playlist) at an optional offset and position.
    pub async fn play(
        &self,
        context: Option<&Uri>,
        offset: Option<u64>,
        position_ms: Option<u64>,
        device_id: Option<&str>,
    ) -> Res<()> {
        let endpoint = device_endpoint("me/player/play", device_id);
        let mut data = json!({});
        if let Some(offset) = offset {
            data["offset"] = json!({ "position": offset });
        }
        if let Some(position_ms) = position_ms {
            data["position_ms"] = json!(position_ms);
        }

        match context {
            None => {
                // resume whatever was playing
                self.connection.execute(Method::PUT, &endpoint, None).await?;
            }
            Some(context) => {
                data["context_uri"] = json!(context.to_string());
                self.connection
                    .execute(Method::PUT, &endpoint, Some(data))
                    .await?;
            }
        }
        Ok(())
    }

    /// Plays the given tracks or episodes in order.
    pub async fn play_elements(&self, elements: &[Uri], device_id: Option<&str>) -> Res<()> {
        let endpoint = device_endpoint("me/player/play", device_id);
        let uris: Vec<String> = elements.iter().map(|uri| uri.to_string()).collect();
        self.connection
            .execute(Method::PUT, &endpoint, Some(json!({ "uris": uris })))
            .await?;
        Ok(())
    }

    pub async fn pause(&self, device_id: Option<&str>) -> Res<()> {
        let endpoint = device_endpoint("me/player/pause", device_id);
        self.connection.execute(Method::PUT, &endpoint, None).await?;
        Ok(())
    }

    /// Skips to the next track in the queue.
    pub async fn next_track(&self, device_id: Option<&str>) -> Res<()> {
        let endpoint = device_endpoint("me/player/next", device_id);
        self.connection
            .execute(Method::POST, &endpoint, None)
            .await?;
        Ok(())
    }

    /// Skips to the previous track in the queue.
    pub async fn previous_track(&self, device_id: Option<&str>) -> Res<()> {
        let endpoint = device_endpoint("me/player/previous", device_id);
        self.connection
            .execute(Method::POST, &endpoint, None)
            .await?;
        Ok(())
    }

    pub async fn set_shuffle(&self, state: bool, device_id: Option<&str>) -> Res<()> {
        let mut params = vec![("state", state.to_string())];
        if let Some(device_id) = device_id {
            params.push(("device_id", device_id.to_string()));
        }
        let endpoint = Connection::add_query_parameters("me/player/shuffle", &params);
        self.connection.execute(Method::PUT, &endpoint, None).await?;
        Ok(())
    }

    /// Adds the given track or episode to the playback queue.
    pub async fn add_to_queue(&self, element: &Uri, device_id: Option<&str>) -> Res<()> {
        let mut params = vec![("uri", element.to_string())];
        if let Some(device_id) = device_id {
            params.push(("device_id", device_id.to_string()));
        }
        let endpoint = Connection::add_query_parameters("me/player/queue", &params);
        self.connection
            .execute(Method::POST, &endpoint, None)
            .await?;
        Ok(())
    }

    /// All devices registered in Spotify Connect for the current user.
    pub async fn get_devices(&self) -> Res<Vec<Value>> {
        let data = self
            .connection
            .execute(Method::GET, "me/player/devices", None)
            .await?;
        data.get("devices")
            .and_then(Value::as_array)
            .cloned()
            .ok_or(CacheError::MalformedResponse {
                key: "devices".to_string(),
            })
    }

    /// The current playback state: device, context, item and actions.
    pub async fn get_playing(&self) -> Res<Value> {
        self.connection.execute(Method::GET, "me/player", None).await
    }

    /// Transfers playback to another device.
    pub async fn transfer_playback(&self, device_id: &str, play: bool) -> Res<()> {
        self.connection
            .execute(
                Method::PUT,
                "me/player",
                Some(json!({ "device_ids": [device_id], "play": play })),
            )
            .await?;
        Ok(())
    }

    /// Searches the catalog for tracks. Results are cached handles seeded
    /// with the names the search reported.
    pub async fn search_tracks(&self, query: &str, limit: u64, offset: u64) -> Res<Vec<Track>> {
        let uris = self.search_kind(query, "track", limit, offset).await?;
        Ok(uris
            .into_iter()
            .map(|uri| Track::handle(self.cache.clone(), uri))
            .collect())
    }

    /// Searches the catalog for albums.
    pub async fn search_albums(&self, query: &str, limit: u64, offset: u64) -> Res<Vec<Album>> {
        let uris = self.search_kind(query, "album", limit, offset).await?;
        Ok(uris
            .into_iter()
            .map(|uri| Album::handle(self.cache.clone(), uri))
            .collect())
    }

    /// Searches the catalog for artists.
    pub async fn search_artists(&self, query: &str, limit: u64, offset: u64) -> Res<Vec<Artist>> {
        let uris = self.search_kind(query, "artist", limit, offset).await?;
        Ok(uris
            .into_iter()
            .map(|uri| Artist::handle(self.cache.clone(), uri))
            .collect())
    }

    /// Searches the catalog for playlists.
    pub async fn search_playlists(
        &self,
        query: &str,
        limit: u64,
        offset: u64,
    ) -> Res<Vec<Playlist>> {
        let uris = self.search_kind(query, "playlist", limit, offset).await?;
        Ok(uris
            .into_iter()
            .map(|uri| Playlist::handle(self.cache.clone(), uri))
            .collect())
    }

    /// Searches the catalog for users.
    pub async fn search_users(&self, query: &str, limit: u64, offset: u64) -> Res<Vec<User>> {
        let uris = self.search_kind(query, "user", limit, offset).await?;
        Ok(uris
            .into_iter()
            .map(|uri| User::handle(self.cache.clone(), uri))
            .collect())
    }

    async fn search_kind(
        &self,
        query: &str,
        kind: &str,
        limit: u64,
        offset: u64,
    ) -> Res<Vec<Uri>> {
        let endpoint = Connection::add_query_parameters(
            "search",
            &[
                ("q", query.to_string()),
                ("type", kind.to_string()),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
            ],
        );
        let data = self.connection.execute(Method::GET, &endpoint, None).await?;

        let section = format!("{kind}s");
        let items = data
            .get(&section)
            .and_then(|s| s.get("items"))
            .and_then(Value::as_array)
            .ok_or(CacheError::MalformedResponse {
                key: "items".to_string(),
            })?;

        let mut uris = Vec::new();
        for item in items {
            uris.push(crate::entity::reference(item, &self.cache)?);
        }
        Ok(uris)
    }

    fn checked_handle(&self, uri: &Uri, kind: &str) -> Res<()> {
        if uri.kind() != kind {
            return Err(CacheError::Format(format!(
                "expected a {kind} identifier, got '{uri}'"
            )));
        }
        self.cache.get_or_create(uri, Hints::default())
    }
}

fn device_endpoint(endpoint: &str, device_id: Option<&str>) -> String {
    match device_id {
        Some(device_id) => {
            Connection::add_query_parameters(endpoint, &[("device_id", device_id.to_string())])
        }
        None => endpoint.to_string(),
    }
}
