use serde_json::{Value, json};

use crate::{
    Res,
    cache::Cache,
    entity::{
        Artist, Entity, EntityData, Paging, Parsed, RequestSpec, Track, array_field, check_uri,
        object_field, reference, reference_value, str_field,
    },
    uri::Uri,
};

// the API caps album track pages at 50 items
const TRACK_PAGE_LIMIT: u64 = 50;

#[derive(Debug, Default)]
pub(crate) struct AlbumData {
    pub(crate) release_date: Option<String>,
    pub(crate) album_type: Option<String>,
    pub(crate) artists: Option<Vec<Uri>>,
    pub(crate) tracks: Option<Vec<Uri>>,
}

pub(crate) fn requests(uri: &Uri) -> Vec<RequestSpec> {
    vec![RequestSpec {
        endpoint: format!("albums/{id}", id = uri.id()),
        params: vec![
            (
                "fields",
                "uri,name,release_date,album_type,artists(uri,name),tracks(next,items(uri,name))"
                    .to_string(),
            ),
            ("offset", "0".to_string()),
            ("limit", TRACK_PAGE_LIMIT.to_string()),
        ],
        merge_key: None,
        paging: Some(Paging {
            limit: TRACK_PAGE_LIMIT,
            items_endpoint: format!("albums/{id}/tracks", id = uri.id()),
            items_params: vec![("fields", "next,items(uri,name)".to_string())],
            items_path: &["tracks"],
        }),
    }]
}

pub(crate) fn parse(uri: &Uri, payload: &Value, cache: &Cache) -> Res<Parsed> {
    check_uri(uri, payload)?;
    let name = str_field(payload, "name")?;
    let release_date = str_field(payload, "release_date")?;
    let album_type = str_field(payload, "album_type")?;

    let mut artists = Vec::new();
    for artist in array_field(payload, "artists")? {
        artists.push(reference(artist, cache)?);
    }

    let track_section = object_field(payload, "tracks")?;
    let mut tracks = Vec::new();
    for track in array_field(track_section, "items")? {
        tracks.push(reference(track, cache)?);
    }

    Ok(Parsed {
        name: Some(name),
        data: EntityData::Album(AlbumData {
            release_date: Some(release_date),
            album_type: Some(album_type),
            artists: Some(artists),
            tracks: Some(tracks),
        }),
    })
}

pub(crate) fn serialize(entity: &Entity, data: &AlbumData, cache: &Cache) -> Value {
    let artists: Vec<Value> = data
        .artists
        .iter()
        .flatten()
        .map(|artist| reference_value(artist, cache))
        .collect();
    let tracks: Vec<Value> = data
        .tracks
        .iter()
        .flatten()
        .map(|track| reference_value(track, cache))
        .collect();
    json!({
        "uri": entity.uri.to_string(),
        "name": entity.name,
        "release_date": data.release_date,
        "album_type": data.album_type,
        "artists": artists,
        "tracks": { "items": tracks },
    })
}

/// A handle to one cached album.
#[derive(Debug, Clone)]
pub struct Album {
    cache: Cache,
    uri: Uri,
}

impl Album {
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

    pub async fn release_date(&self) -> Res<String> {
        self.cache
            .field(&self.uri, "release_date", |entity| {
                entity
                    .data
                    .as_album()
                    .and_then(|album| album.release_date.clone())
            })
            .await
    }

    pub async fn album_type(&self) -> Res<String> {
        self.cache
            .field(&self.uri, "album_type", |entity| {
                entity
                    .data
                    .as_album()
                    .and_then(|album| album.album_type.clone())
            })
            .await
    }

    pub async fn artists(&self) -> Res<Vec<Artist>> {
        let uris = self
            .cache
            .field(&self.uri, "artists", |entity| {
                entity
                    .data
                    .as_album()
                    .and_then(|album| album.artists.clone())
            })
            .await?;
        Ok(uris
            .into_iter()
            .map(|uri| Artist::handle(self.cache.clone(), uri))
            .collect())
    }

    /// The album's tracks in server order, paginated transparently.
    pub async fn tracks(&self) -> Res<Vec<Track>> {
        let uris = self
            .cache
            .field(&self.uri, "tracks", |entity| {
                entity.data.as_album().and_then(|album| album.tracks.clone())
            })
            .await?;
        Ok(uris
            .into_iter()
            .map(|uri| Track::handle(self.cache.clone(), uri))
            .collect())
    }
}
