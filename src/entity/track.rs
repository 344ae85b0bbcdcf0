use serde_json::{Value, json};

use crate::{
    Res,
    cache::Cache,
    entity::{
        Album, Artist, Entity, EntityData, Parsed, RequestSpec, array_field, check_uri,
        object_field, reference, reference_value, str_field,
    },
    uri::Uri,
};

#[derive(Debug, Default)]
pub(crate) struct TrackData {
    pub(crate) album: Option<Uri>,
    pub(crate) artists: Option<Vec<Uri>>,
}

pub(crate) fn requests(uri: &Uri) -> Vec<RequestSpec> {
    vec![RequestSpec {
        endpoint: format!("tracks/{id}", id = uri.id()),
        params: vec![(
            "fields",
            "uri,name,album(uri,name),artists(uri,name)".to_string(),
        )],
        merge_key: None,
        paging: None,
    }]
}

pub(crate) fn parse(uri: &Uri, payload: &Value, cache: &Cache) -> Res<Parsed> {
    check_uri(uri, payload)?;
    let name = str_field(payload, "name")?;
    let album = reference(object_field(payload, "album")?, cache)?;
    let mut artists = Vec::new();
    for artist in array_field(payload, "artists")? {
        artists.push(reference(artist, cache)?);
    }
    Ok(Parsed {
        name: Some(name),
        data: EntityData::Track(TrackData {
            album: Some(album),
            artists: Some(artists),
        }),
    })
}

pub(crate) fn serialize(entity: &Entity, data: &TrackData, cache: &Cache) -> Value {
    let artists: Vec<Value> = data
        .artists
        .iter()
        .flatten()
        .map(|artist| reference_value(artist, cache))
        .collect();
    json!({
        "uri": entity.uri.to_string(),
        "name": entity.name,
        "album": data.album.as_ref().map(|album| reference_value(album, cache)),
        "artists": artists,
    })
}

/// A handle to one cached track. Cloning the handle never duplicates the
/// underlying entity.
#[derive(Debug, Clone)]
pub struct Track {
    cache: Cache,
    uri: Uri,
}

impl Track {
    pub(crate) fn handle(cache: Cache, uri: Uri) -> Self {
        Self { cache, uri }
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The track's title, fetched on first access.
    pub async fn name(&self) -> Res<String> {
        self.cache
            .field(&self.uri, "name", |entity| entity.name.clone())
            .await
    }

    pub async fn album(&self) -> Res<Album> {
        let uri = self
            .cache
            .field(&self.uri, "album", |entity| {
                entity.data.as_track().and_then(|track| track.album.clone())
            })
            .await?;
        Ok(Album::handle(self.cache.clone(), uri))
    }

    pub async fn artists(&self) -> Res<Vec<Artist>> {
        let uris = self
            .cache
            .field(&self.uri, "artists", |entity| {
                entity
                    .data
                    .as_track()
                    .and_then(|track| track.artists.clone())
            })
            .await?;
        Ok(uris
            .into_iter()
            .map(|uri| Artist::handle(self.cache.clone(), uri))
            .collect())
    }
}
