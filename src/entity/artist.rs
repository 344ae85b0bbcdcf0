use serde_json::{Value, json};

use crate::{
    Res,
    cache::Cache,
    entity::{Entity, EntityData, Parsed, RequestSpec, check_uri, str_field},
    error::CacheError,
    uri::Uri,
};

#[derive(Debug, Default)]
pub(crate) struct ArtistData {
    pub(crate) genres: Option<Vec<String>>,
}

pub(crate) fn requests(uri: &Uri) -> Vec<RequestSpec> {
    vec![RequestSpec {
        endpoint: format!("artists/{id}", id = uri.id()),
        params: vec![("fields", "uri,name,genres".to_string())],
        merge_key: None,
        paging: None,
    }]
}

pub(crate) fn parse(uri: &Uri, payload: &Value, _cache: &Cache) -> Res<Parsed> {
    check_uri(uri, payload)?;
    let name = str_field(payload, "name")?;
    let genres = match payload.get("genres") {
        None => Vec::new(),
        Some(genres) => serde_json::from_value(genres.clone()).map_err(|_| {
            CacheError::MalformedResponse {
                key: "genres".to_string(),
            }
        })?,
    };
    Ok(Parsed {
        name: Some(name),
        data: EntityData::Artist(ArtistData {
            genres: Some(genres),
        }),
    })
}

pub(crate) fn serialize(entity: &Entity, data: &ArtistData) -> Value {
    json!({
        "uri": entity.uri.to_string(),
        "name": entity.name,
        "genres": data.genres.clone().unwrap_or_default(),
    })
}

/// A handle to one cached artist.
#[derive(Debug, Clone)]
pub struct Artist {
    cache: Cache,
    uri: Uri,
}

impl Artist {
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

    pub async fn genres(&self) -> Res<Vec<String>> {
        self.cache
            .field(&self.uri, "genres", |entity| {
                entity
                    .data
                    .as_artist()
                    .and_then(|artist| artist.genres.clone())
            })
            .await
    }
}
