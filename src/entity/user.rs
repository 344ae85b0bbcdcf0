use serde_json::{Value, json};

use crate::{
    Res,
    cache::Cache,
    entity::{
        Entity, EntityData, Paging, Parsed, Playlist, RequestSpec, array_field, check_uri,
        object_field, reference, reference_value, str_field,
    },
    uri::Uri,
};

// the API caps playlist listing pages at 50 items
const PLAYLIST_PAGE_LIMIT: u64 = 50;

#[derive(Debug, Default)]
pub(crate) struct UserData {
    pub(crate) playlists: Option<Vec<Uri>>,
}

pub(crate) fn requests(uri: &Uri) -> Vec<RequestSpec> {
    // the session's own user is fetched through the `me` endpoints
    let (profile, playlists) = if uri.id() == "@me" {
        ("me".to_string(), "me/playlists".to_string())
    } else {
        (
            format!("users/{id}", id = uri.id()),
            format!("users/{id}/playlists", id = uri.id()),
        )
    };
    vec![
        RequestSpec {
            endpoint: profile,
            params: vec![("fields", "display_name,uri".to_string())],
            merge_key: None,
            paging: None,
        },
        RequestSpec {
            endpoint: playlists.clone(),
            params: vec![
                ("fields", "next,items(uri,name,snapshot_id)".to_string()),
                ("offset", "0".to_string()),
                ("limit", PLAYLIST_PAGE_LIMIT.to_string()),
            ],
            merge_key: Some("playlists"),
            paging: Some(Paging {
                limit: PLAYLIST_PAGE_LIMIT,
                items_endpoint: playlists,
                items_params: vec![("fields", "next,items(uri,name,snapshot_id)".to_string())],
                items_path: &[],
            }),
        },
    ]
}

pub(crate) fn parse(uri: &Uri, payload: &Value, cache: &Cache) -> Res<Parsed> {
    check_uri(uri, payload)?;
    let name = str_field(payload, "display_name")?;

    let playlist_section = object_field(payload, "playlists")?;
    let mut playlists = Vec::new();
    for playlist in array_field(playlist_section, "items")? {
        playlists.push(reference(playlist, cache)?);
    }

    Ok(Parsed {
        name: Some(name),
        data: EntityData::User(UserData {
            playlists: Some(playlists),
        }),
    })
}

pub(crate) fn serialize(entity: &Entity, data: &UserData, cache: &Cache) -> Value {
    let items: Vec<Value> = data
        .playlists
        .iter()
        .flatten()
        .map(|playlist| reference_value(playlist, cache))
        .collect();
    json!({
        "uri": entity.uri.to_string(),
        "display_name": entity.name,
        "playlists": { "items": items },
    })
}

/// A handle to one cached user profile.
#[derive(Debug, Clone)]
pub struct User {
    cache: Cache,
    uri: Uri,
}

impl User {
    pub(crate) fn handle(cache: Cache, uri: Uri) -> Self {
        Self { cache, uri }
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub async fn display_name(&self) -> Res<String> {
        self.cache
            .field(&self.uri, "display_name", |entity| entity.name.clone())
            .await
    }

    /// The playlists saved in this user's profile, paginated transparently.
    pub async fn playlists(&self) -> Res<Vec<Playlist>> {
        let uris = self
            .cache
            .field(&self.uri, "playlists", |entity| {
                entity.data.as_user().and_then(|user| user.playlists.clone())
            })
            .await?;
        Ok(uris
            .into_iter()
            .map(|uri| Playlist::handle(self.cache.clone(), uri))
            .collect())
    }
}
