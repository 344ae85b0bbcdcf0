//! Entity kinds and their lazy-attribute protocol.
//!
//! An [`Entity`] is the single local representation of one remote resource.
//! Entities are created unpopulated by the cache and mutated in place when a
//! load completes; a load either fills every field its parser defines or
//! fails and leaves the entity untouched. Cross-references between entities
//! (a playlist's tracks, a user's playlists) are stored as identifiers and
//! materialized into handles at accessor time, so a track appearing in two
//! playlists resolves to the same cached instance.
//!
//! Each kind contributes four capabilities, dispatched over [`ResourceKind`]:
//! request descriptors ([`requests`]), payload parsing ([`parse`]), the
//! inverse serialization used for persistence ([`serialize`]) and the
//! per-kind staleness signal ([`Entity::is_expired`]).

mod album;
mod artist;
mod playlist;
mod saved;
mod track;
mod user;

use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::{Res, cache::Cache, error::CacheError, uri::Uri};

pub use album::Album;
pub use artist::Artist;
pub use playlist::{Image, Playlist};
pub use saved::SavedTracks;
pub use track::Track;
pub use user::User;

pub(crate) use album::AlbumData;
pub(crate) use artist::ArtistData;
pub(crate) use playlist::PlaylistData;
pub(crate) use saved::SavedTracksData;
pub(crate) use track::TrackData;
pub(crate) use user::UserData;

/// The entity kinds the cache knows how to fetch and parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Track,
    Album,
    Artist,
    Playlist,
    User,
    SavedTracks,
}

impl ResourceKind {
    /// Derives the kind from an identifier's kind segment.
    pub(crate) fn from_uri(uri: &Uri) -> Res<Self> {
        match uri.kind() {
            "track" => Ok(ResourceKind::Track),
            "album" => Ok(ResourceKind::Album),
            "artist" => Ok(ResourceKind::Artist),
            "playlist" => Ok(ResourceKind::Playlist),
            "user" => Ok(ResourceKind::User),
            "collection" => Ok(ResourceKind::SavedTracks),
            other => Err(CacheError::Format(format!(
                "unknown resource kind '{other}' in '{uri}'"
            ))),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ResourceKind::Track => "track",
            ResourceKind::Album => "album",
            ResourceKind::Artist => "artist",
            ResourceKind::Playlist => "playlist",
            ResourceKind::User => "user",
            ResourceKind::SavedTracks => "collection",
        };
        write!(f, "{text}")
    }
}

/// Cheap attributes already known before a resource is loaded, usually
/// discovered while parsing a parent object.
#[derive(Debug, Clone, Default)]
pub struct Hints {
    pub name: Option<String>,
    pub snapshot_id: Option<String>,
}

/// One locally cached resource. Lives inside the cache map for the cache's
/// whole lifetime; the identifier never changes after construction.
#[derive(Debug)]
pub(crate) struct Entity {
    pub(crate) uri: Uri,
    pub(crate) name: Option<String>,
    pub(crate) fetched_at: Option<DateTime<Utc>>,
    pub(crate) data: EntityData,
}

/// Kind-specific fields, each optional until a load populates them.
#[derive(Debug)]
pub(crate) enum EntityData {
    Track(TrackData),
    Album(AlbumData),
    Artist(ArtistData),
    Playlist(PlaylistData),
    User(UserData),
    SavedTracks(SavedTracksData),
}

impl EntityData {
    pub(crate) fn empty(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Track => EntityData::Track(TrackData::default()),
            ResourceKind::Album => EntityData::Album(AlbumData::default()),
            ResourceKind::Artist => EntityData::Artist(ArtistData::default()),
            ResourceKind::Playlist => EntityData::Playlist(PlaylistData::default()),
            ResourceKind::User => EntityData::User(UserData::default()),
            ResourceKind::SavedTracks => EntityData::SavedTracks(SavedTracksData::default()),
        }
    }

    pub(crate) fn kind(&self) -> ResourceKind {
        match self {
            EntityData::Track(_) => ResourceKind::Track,
            EntityData::Album(_) => ResourceKind::Album,
            EntityData::Artist(_) => ResourceKind::Artist,
            EntityData::Playlist(_) => ResourceKind::Playlist,
            EntityData::User(_) => ResourceKind::User,
            EntityData::SavedTracks(_) => ResourceKind::SavedTracks,
        }
    }

    pub(crate) fn as_track(&self) -> Option<&TrackData> {
        match self {
            EntityData::Track(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn as_album(&self) -> Option<&AlbumData> {
        match self {
            EntityData::Album(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn as_artist(&self) -> Option<&ArtistData> {
        match self {
            EntityData::Artist(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn as_playlist(&self) -> Option<&PlaylistData> {
        match self {
            EntityData::Playlist(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn as_user(&self) -> Option<&UserData> {
        match self {
            EntityData::User(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn as_saved_tracks(&self) -> Option<&SavedTracksData> {
        match self {
            EntityData::SavedTracks(data) => Some(data),
            _ => None,
        }
    }
}

impl Entity {
    pub(crate) fn new(uri: Uri, kind: ResourceKind, hints: Hints) -> Self {
        let mut data = EntityData::empty(kind);
        if let (EntityData::Playlist(playlist), Some(snapshot_id)) =
            (&mut data, hints.snapshot_id)
        {
            playlist.snapshot_id = Some(snapshot_id);
        }
        Self {
            uri,
            name: hints.name,
            fetched_at: None,
            data,
        }
    }

    /// Whether a stored snapshot of this entity may be trusted without a
    /// network round-trip. Versioned kinds (playlists) are always store
    /// candidates, validated against the caller's expected version by the
    /// cache; unversioned kinds follow the configured policy.
    pub(crate) fn is_expired(&self, unversioned_from_store: bool) -> bool {
        match self.data {
            EntityData::Playlist(_) => false,
            _ => !unversioned_from_store,
        }
    }

    /// The entity's current version token, if its kind carries one.
    pub(crate) fn version(&self) -> Option<String> {
        match &self.data {
            EntityData::Playlist(playlist) => playlist.snapshot_id.clone(),
            _ => None,
        }
    }

    /// Drops every populated field so the next attribute read triggers a
    /// fresh load.
    pub(crate) fn clear(&mut self) {
        self.name = None;
        self.fetched_at = None;
        self.data = EntityData::empty(self.data.kind());
    }
}

/// A single HTTP request descriptor produced by a kind's request builder.
/// Pure data; the cache performs the I/O.
#[derive(Debug, Clone)]
pub(crate) struct RequestSpec {
    pub(crate) endpoint: String,
    pub(crate) params: Vec<(&'static str, String)>,
    /// Merge the response under this key of the assembled payload instead of
    /// using it as the payload base.
    pub(crate) merge_key: Option<&'static str>,
    pub(crate) paging: Option<Paging>,
}

/// Continuation descriptor for server-paginated collections. The page size
/// is fixed per endpoint, matching the remote API's maximum.
#[derive(Debug, Clone)]
pub(crate) struct Paging {
    pub(crate) limit: u64,
    pub(crate) items_endpoint: String,
    pub(crate) items_params: Vec<(&'static str, String)>,
    /// Path of the paged collection inside the response this spec produced.
    pub(crate) items_path: &'static [&'static str],
}

/// Field values produced by a successful parse, applied to the entity in one
/// step.
pub(crate) struct Parsed {
    pub(crate) name: Option<String>,
    pub(crate) data: EntityData,
}

/// Request descriptors for fetching the given resource.
pub(crate) fn requests(kind: ResourceKind, uri: &Uri) -> Vec<RequestSpec> {
    match kind {
        ResourceKind::Track => track::requests(uri),
        ResourceKind::Album => album::requests(uri),
        ResourceKind::Artist => artist::requests(uri),
        ResourceKind::Playlist => playlist::requests(uri),
        ResourceKind::User => user::requests(uri),
        ResourceKind::SavedTracks => saved::requests(uri),
    }
}

/// Parses an assembled payload into field values, registering referenced
/// entities with the cache along the way. Fails without touching anything.
pub(crate) fn parse(kind: ResourceKind, uri: &Uri, payload: &Value, cache: &Cache) -> Res<Parsed> {
    match kind {
        ResourceKind::Track => track::parse(uri, payload, cache),
        ResourceKind::Album => album::parse(uri, payload, cache),
        ResourceKind::Artist => artist::parse(uri, payload, cache),
        ResourceKind::Playlist => playlist::parse(uri, payload, cache),
        ResourceKind::User => user::parse(uri, payload, cache),
        ResourceKind::SavedTracks => saved::parse(uri, payload, cache),
    }
}

/// Serializes a populated entity back into the payload shape its parser
/// expects, for persistence.
pub(crate) fn serialize(entity: &Entity, cache: &Cache) -> Value {
    match &entity.data {
        EntityData::Track(data) => track::serialize(entity, data, cache),
        EntityData::Album(data) => album::serialize(entity, data, cache),
        EntityData::Artist(data) => artist::serialize(entity, data),
        EntityData::Playlist(data) => playlist::serialize(entity, data, cache),
        EntityData::User(data) => user::serialize(entity, data, cache),
        EntityData::SavedTracks(data) => saved::serialize(data, cache),
    }
}

/// Extracts the version token a payload carries for the given kind, if any.
pub(crate) fn version_token(kind: ResourceKind, payload: &Value) -> Option<String> {
    match kind {
        ResourceKind::Playlist => payload
            .get("snapshot_id")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

// --- payload access helpers shared by the kind parsers ---

pub(crate) fn str_field(value: &Value, key: &'static str) -> Res<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(CacheError::MalformedResponse {
            key: key.to_string(),
        })
}

pub(crate) fn opt_str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

pub(crate) fn object_field<'a>(value: &'a Value, key: &'static str) -> Res<&'a Value> {
    match value.get(key) {
        Some(field) if field.is_object() => Ok(field),
        _ => Err(CacheError::MalformedResponse {
            key: key.to_string(),
        }),
    }
}

pub(crate) fn array_field<'a>(value: &'a Value, key: &'static str) -> Res<&'a Vec<Value>> {
    value
        .get(key)
        .and_then(Value::as_array)
        .ok_or(CacheError::MalformedResponse {
            key: key.to_string(),
        })
}

/// Validates that a payload describes the entity it is being applied to.
/// Skipped for well-known ids (`@me`, `@saved`) whose fetch endpoints report
/// the real identifier of the session's user.
pub(crate) fn check_uri(uri: &Uri, payload: &Value) -> Res<()> {
    if uri.id().starts_with('@') {
        return Ok(());
    }
    let text = str_field(payload, "uri")?;
    if text != uri.to_string() {
        return Err(CacheError::MalformedResponse {
            key: "uri".to_string(),
        });
    }
    Ok(())
}

/// Resolves an embedded `{ "uri": ..., "name": ... }` reference object:
/// registers the referenced entity (seeding name and snapshot hints) and
/// returns its identifier.
pub(crate) fn reference(value: &Value, cache: &Cache) -> Res<Uri> {
    let uri = Uri::parse(&str_field(value, "uri")?)?;
    let hints = Hints {
        name: opt_str_field(value, "name").or_else(|| opt_str_field(value, "display_name")),
        snapshot_id: opt_str_field(value, "snapshot_id"),
    };
    cache.get_or_create(&uri, hints)?;
    Ok(uri)
}

/// The inverse of [`reference`]: renders an identifier back into a reference
/// object, pulling the display name (and snapshot id, for playlists) from
/// the cache.
pub(crate) fn reference_value(uri: &Uri, cache: &Cache) -> Value {
    let mut object = serde_json::Map::new();
    object.insert("uri".to_string(), Value::String(uri.to_string()));
    object.insert(
        "name".to_string(),
        match cache.peek_name(uri) {
            Some(name) => Value::String(name),
            None => Value::Null,
        },
    );
    if let Some(snapshot_id) = cache.peek_version(uri) {
        object.insert("snapshot_id".to_string(), Value::String(snapshot_id));
    }
    Value::Object(object)
}
