use serde_json::{Value, json};

use crate::{
    Res,
    cache::Cache,
    entity::{
        EntityData, Paging, Parsed, RequestSpec, Track, array_field, object_field, opt_str_field,
        reference, reference_value,
    },
    uri::Uri,
};

// the API caps saved track pages at 50 items
const TRACK_PAGE_LIMIT: u64 = 50;

#[derive(Debug, Clone)]
pub(crate) struct SavedEntry {
    pub(crate) added_at: String,
    pub(crate) track: Uri,
}

#[derive(Debug, Default)]
pub(crate) struct SavedTracksData {
    pub(crate) items: Option<Vec<SavedEntry>>,
}

pub(crate) fn requests(_uri: &Uri) -> Vec<RequestSpec> {
    vec![RequestSpec {
        endpoint: "me/tracks".to_string(),
        params: vec![
            ("fields", "next,items(added_at,track(uri,name))".to_string()),
            ("offset", "0".to_string()),
            ("limit", TRACK_PAGE_LIMIT.to_string()),
        ],
        merge_key: Some("tracks"),
        paging: Some(Paging {
            limit: TRACK_PAGE_LIMIT,
            items_endpoint: "me/tracks".to_string(),
            items_params: vec![("fields", "next,items(added_at,track(uri,name))".to_string())],
            items_path: &[],
        }),
    }]
}

pub(crate) fn parse(_uri: &Uri, payload: &Value, cache: &Cache) -> Res<Parsed> {
    let track_section = object_field(payload, "tracks")?;
    let mut items = Vec::new();
    for item in array_field(track_section, "items")? {
        let track = match item.get("track") {
            Some(track) if track.is_object() => track,
            _ => continue,
        };
        items.push(SavedEntry {
            added_at: opt_str_field(item, "added_at").unwrap_or_default(),
            track: reference(track, cache)?,
        });
    }
    Ok(Parsed {
        name: Some("Saved Tracks".to_string()),
        data: EntityData::SavedTracks(SavedTracksData { items: Some(items) }),
    })
}

pub(crate) fn serialize(data: &SavedTracksData, cache: &Cache) -> Value {
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
    json!({ "tracks": { "items": items } })
}

/// A handle to the current user's saved track collection. Addressed by the
/// well-known identifier [`Uri::saved_tracks`] and cached like any other
/// resource.
#[derive(Debug, Clone)]
pub struct SavedTracks {
    cache: Cache,
    uri: Uri,
}

impl SavedTracks {
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

    /// The saved tracks in server order, paginated transparently.
    pub async fn items(&self) -> Res<Vec<Track>> {
        let entries = self
            .cache
            .field(&self.uri, "tracks", |entity| {
                entity
                    .data
                    .as_saved_tracks()
                    .and_then(|saved| saved.items.clone())
            })
            .await?;
        Ok(entries
            .into_iter()
            .map(|entry| Track::handle(self.cache.clone(), entry.track))
            .collect())
    }
}
