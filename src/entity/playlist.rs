use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    Res,
    cache::Cache,
    entity::{
        Entity, EntityData, Paging, Parsed, RequestSpec, Track, User, array_field, check_uri,
        object_field, opt_str_field, reference, reference_value, str_field,
    },
    error::CacheError,
    uri::Uri,
};

// the API caps playlist track pages at 100 items
const TRACK_PAGE_LIMIT: u64 = 100;

/// One image registered with Spotify, in one of several sizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    pub height: Option<u64>,
    pub width: Option<u64>,
}

#[derive(Debug, Clone)]
pub(crate) struct PlaylistEntry {
    pub(crate) added_at: String,
    pub(crate) track: Uri,
}

#[derive(Debug, Default)]
pub(crate) struct PlaylistData {
    pub(crate) snapshot_id: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) public: Option<bool>,
    pub(crate) owner: Option<Uri>,
    pub(crate) images: Option<Vec<Image>>,
    pub(crate) items: Option<Vec<PlaylistEntry>>,
}

pub(crate) fn requests(uri: &Uri) -> Vec<RequestSpec> {
    vec![RequestSpec {
        endpoint: format!("playlists/{id}", id = uri.id()),
        params: vec![
            (
                "fields",
                "uri,description,name,images,owner(uri,display_name),snapshot_id,public,\
                 tracks(next,items(added_at,track(name,uri)))"
                    .to_string(),
            ),
            ("offset", "0".to_string()),
            ("limit", TRACK_PAGE_LIMIT.to_string()),
        ],
        merge_key: None,
        paging: Some(Paging {
            limit: TRACK_PAGE_LIMIT,
            items_endpoint: format!("playlists/{id}/tracks", id = uri.id()),
            items_params: vec![("fields", "next,items(added_at,track(name,uri))".to_string())],
            items_path: &["tracks"],
        }),
    }]
}

pub(crate) fn parse(uri: &Uri, payload: &Value, cache: &Cache) -> Res<Parsed> {
    check_uri(uri, payload)?;
    let name = str_field(payload, "name")?;
    let snapshot_id = str_field(payload, "snapshot_id")?;
    let description = opt_str_field(payload, "description").unwrap_or_default();
    let public = payload
        .get("public")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let owner = reference(object_field(payload, "owner")?, cache)?;

    let images: Vec<Image> = match payload.get("images") {
        None => Vec::new(),
        Some(images) => serde_json::from_value(images.clone()).map_err(|_| {
            CacheError::MalformedResponse {
                key: "images".to_string(),
            }
        })?,
    };

    let track_section = object_field(payload, "tracks")?;
    let mut items = Vec::new();
    for item in array_field(track_section, "items")? {
        // local files and removed tracks come back as null entries
        let track = match item.get("track") {
            Some(track) if track.is_object() => track,
            _ => continue,
        };
        items.push(PlaylistEntry {
            added_at: opt_str_field(item, "added_at").unwrap_or_default(),
            track: reference(track, cache)?,
        });
    }

    Ok(Parsed {
        name: Some(name),
        data: EntityData::Playlist(PlaylistData {
            snapshot_id: Some(snapshot_id),
            description: Some(description),
            public: Some(public),
            owner: Some(owner),
            images: Some(images),
            items: Some(items),
        }),
    })
}

pub(crate) fn serialize(entity: &Entity, data: &PlaylistData, cache: &Cache) -> Value {
    let items: Vec<Value> = data
        .items
        .iter()
        .flatten()
        .map(|entry| {
            json!({
                "added_at": entry.added_at,
                "track": reference_value(&entry.track, cache),
            })
        })
        .collect();
    json!({
        "uri": entity.uri.to_string(),
        "name": entity.name,
        "snapshot_id": data.snapshot_id,
        "description": data.description,
        "public": data.public,
        "owner": data.owner.as_ref().map(|owner| reference_value(owner, cache)),
        "images": data.images.clone().unwrap_or_default(),
        "tracks": { "items": items },
    })
}

/// A handle to one cached playlist.
#[derive(Debug, Clone)]
pub struct Playlist {
    cache: Cache,
    uri: Uri,
}

impl Playlist {
    pub(crate) fn handle(cache: Cache, uri: Uri) -> Self {
        Self { cache, uri }
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub async fn name(&self) -> Res<String> {
        self.cache
            .field(&self.uri, "name", |entity| entity.name.clone())
            .await
    }

    pub async fn description(&self) -> Res<String> {
        self.cache
            .field(&self.uri, "description", |entity| {
                entity
                    .data
                    .as_playlist()
                    .and_then(|playlist| playlist.description.clone())
            })
            .await
    }

    pub async fn public(&self) -> Res<bool> {
        self.cache
            .field(&self.uri, "public", |entity| {
                entity
                    .data
                    .as_playlist()
                    .and_then(|playlist| playlist.public)
            })
            .await
    }

    /// The playlist's current version token.
    pub async fn snapshot_id(&self) -> Res<String> {
        self.cache
            .field(&self.uri, "snapshot_id", |entity| {
                entity
                    .data
                    .as_playlist()
                    .and_then(|playlist| playlist.snapshot_id.clone())
            })
            .await
    }

    pub async fn owner(&self) -> Res<User> {
        let uri = self
            .cache
            .field(&self.uri, "owner", |entity| {
                entity
                    .data
                    .as_playlist()
                    .and_then(|playlist| playlist.owner.clone())
            })
            .await?;
        Ok(User::handle(self.cache.clone(), uri))
    }

    pub async fn images(&self) -> Res<Vec<Image>> {
        self.cache
            .field(&self.uri, "images", |entity| {
                entity
                    .data
                    .as_playlist()
                    .and_then(|playlist| playlist.images.clone())
            })
            .await
    }

    /// The playlist's tracks in server order, paginated transparently.
    pub async fn items(&self) -> Res<Vec<Track>> {
        let entries = self
            .cache
            .field(&self.uri, "tracks", |entity| {
                entity
                    .data
                    .as_playlist()
                    .and_then(|playlist| playlist.items.clone())
            })
            .await?;
        Ok(entries
            .into_iter()
            .map(|entry| Track::handle(self.cache.clone(), entry.track))
            .collect())
    }

    /// Searches the playlist's track titles. Only tracks whose title
    /// contains every given string (case-insensitive) are returned.
    pub async fn search(&self, strings: &[&str]) -> Res<Vec<Track>> {
        let needles: Vec<String> = strings.iter().map(|s| s.to_lowercase()).collect();
        let mut results = Vec::new();
        for track in self.items().await? {
            let title = track.name().await?.to_lowercase();
            if needles.iter().all(|needle| title.contains(needle)) {
                results.push(track);
            }
        }
        Ok(results)
    }
}
