use std::collections::HashMap;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use axum::{Json, Router, extract::Query, routing::get};
use serde_json::{Value, json};

use spotidex::{CacheConfig, CacheError, Client, Uri};

/// Binds a mock API server on an ephemeral port and returns its base URL.
async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn test_config(base: String) -> CacheConfig {
    CacheConfig {
        cache_dir: None,
        api_url: Some(base),
        unversioned_from_store: true,
    }
}

fn track_payload() -> Value {
    json!({
        "uri": "spotify:track:abc123",
        "name": "Song",
        "album": { "uri": "spotify:album:alb1", "name": "Album One" },
        "artists": [{ "uri": "spotify:artist:art1", "name": "Artist One" }],
    })
}

fn track_entries(range: std::ops::Range<usize>) -> Vec<Value> {
    range
        .map(|i| {
            json!({
                "added_at": "2024-01-01T00:00:00Z",
                "track": { "uri": format!("spotify:track:t{i}"), "name": format!("Track {i}") },
            })
        })
        .collect()
}

#[tokio::test]
async fn test_track_loads_once_and_reads_are_local() {
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    let app = Router::new().route(
        "/tracks/abc123",
        get(move || {
            let h = h.clone();
            async move {
                h.fetch_add(1, Ordering::SeqCst);
                Json(track_payload())
            }
        }),
    );
    let base = serve(app).await;
    let client = Client::new("token", test_config(base));

    let uri = Uri::parse("spotify:track:abc123").unwrap();
    let track = client.get_track(&uri).unwrap();
    assert_eq!(track.name().await.unwrap(), "Song");
    assert_eq!(track.album().await.unwrap().uri().to_string(), "spotify:album:alb1");

    // the artist name was seeded from the reference; no artist route exists,
    // so an accidental fetch would fail loudly here
    let artists = track.artists().await.unwrap();
    assert_eq!(artists.len(), 1);
    assert_eq!(artists[0].name().await.unwrap(), "Artist One");

    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_loads_share_one_fetch() {
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    let app = Router::new().route(
        "/tracks/abc123",
        get(move || {
            let h = h.clone();
            async move {
                h.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                Json(track_payload())
            }
        }),
    );
    let base = serve(app).await;
    let client = Client::new("token", test_config(base));

    let uri = Uri::parse("spotify:track:abc123").unwrap();
    let track = client.get_track(&uri).unwrap();
    let mut tasks = Vec::new();
    for _ in 0..8 {
        let track = track.clone();
        tasks.push(tokio::spawn(async move { track.name().await }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), "Song");
    }
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_references_resolve_without_extra_fetches() {
    let app = Router::new().route(
        "/playlists/pl1",
        get(|| async {
            Json(json!({
                "uri": "spotify:playlist:pl1",
                "name": "Mix",
                "snapshot_id": "v1",
                "description": "daily mix",
                "public": true,
                "owner": { "uri": "spotify:user:alice", "display_name": "Alice" },
                "images": [],
                "tracks": {
                    "next": null,
                    "items": [
                        { "added_at": "2024-01-01T00:00:00Z",
                          "track": { "uri": "spotify:track:t1", "name": "One" } },
                        { "added_at": "2024-01-02T00:00:00Z",
                          "track": { "uri": "spotify:track:t1", "name": "One" } },
                    ],
                },
            }))
        }),
    );
    let base = serve(app).await;
    let client = Client::new("token", test_config(base));

    let playlist = client
        .get_playlist(&Uri::parse("spotify:playlist:pl1").unwrap())
        .unwrap();
    let items = playlist.items().await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].uri(), items[1].uri());

    // no track or user routes exist; these reads must come from the
    // name hints the playlist payload carried
    assert_eq!(items[0].name().await.unwrap(), "One");
    assert_eq!(items[1].name().await.unwrap(), "One");
    assert_eq!(playlist.owner().await.unwrap().display_name().await.unwrap(), "Alice");
}

#[tokio::test]
async fn test_pagination_assembles_pages_in_order() {
    let hits = Arc::new(AtomicUsize::new(0));
    let h1 = hits.clone();
    let h2 = hits.clone();
    let app = Router::new()
        .route(
            "/playlists/pl1",
            get(move || {
                let h = h1.clone();
                async move {
                    h.fetch_add(1, Ordering::SeqCst);
                    Json(json!({
                        "uri": "spotify:playlist:pl1",
                        "name": "Big",
                        "snapshot_id": "v1",
                        "description": "",
                        "public": false,
                        "owner": { "uri": "spotify:user:alice", "display_name": "Alice" },
                        "images": [],
                        "tracks": { "next": "page2", "items": track_entries(0..100) },
                    }))
                }
            }),
        )
        .route(
            "/playlists/pl1/tracks",
            get(move |Query(params): Query<HashMap<String, String>>| {
                let h = h2.clone();
                async move {
                    h.fetch_add(1, Ordering::SeqCst);
                    let offset: usize = params["offset"].parse().unwrap();
                    match offset {
                        100 => Json(json!({ "next": "page3", "items": track_entries(100..200) })),
                        200 => Json(json!({ "next": null, "items": track_entries(200..250) })),
                        other => panic!("unexpected offset {other}"),
                    }
                }
            }),
        );
    let base = serve(app).await;
    let client = Client::new("token", test_config(base));

    let playlist = client
        .get_playlist(&Uri::parse("spotify:playlist:pl1").unwrap())
        .unwrap();
    let items = playlist.items().await.unwrap();
    assert_eq!(items.len(), 250);
    assert_eq!(items[0].name().await.unwrap(), "Track 0");
    assert_eq!(items[249].name().await.unwrap(), "Track 249");
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_version_mismatch_fails_without_mutation() {
    let app = Router::new().route(
        "/playlists/pl1",
        get(|| async {
            Json(json!({
                "uri": "spotify:playlist:pl1",
                "name": "Mix",
                "snapshot_id": "v1",
                "description": "",
                "public": false,
                "owner": { "uri": "spotify:user:alice", "display_name": "Alice" },
                "images": [],
                "tracks": { "next": null, "items": [] },
            }))
        }),
    );
    let base = serve(app).await;
    let client = Client::new("token", test_config(base));

    let uri = Uri::parse("spotify:playlist:pl1").unwrap();
    let playlist = client.get_playlist(&uri).unwrap();
    client.cache().load(&uri, Some("v1")).await.unwrap();
    assert_eq!(playlist.name().await.unwrap(), "Mix");

    let err = client.cache().load(&uri, Some("v2")).await.unwrap_err();
    assert_eq!(
        err,
        CacheError::Staleness {
            expected: "v2".to_string(),
            found: Some("v1".to_string()),
        }
    );

    // the failed load left the loaded fields alone
    assert_eq!(playlist.name().await.unwrap(), "Mix");
    assert_eq!(playlist.snapshot_id().await.unwrap(), "v1");
}

#[tokio::test]
async fn test_store_round_trip_skips_network() {
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    let app = Router::new().route(
        "/tracks/abc123",
        get(move || {
            let h = h.clone();
            async move {
                h.fetch_add(1, Ordering::SeqCst);
                Json(track_payload())
            }
        }),
    );
    let base = serve(app).await;
    let dir = tempfile::tempdir().unwrap();

    let uri = Uri::parse("spotify:track:abc123").unwrap();
    {
        let config = CacheConfig {
            cache_dir: Some(dir.path().to_path_buf()),
            api_url: Some(base.clone()),
            unversioned_from_store: true,
        };
        let client = Client::new("token", config);
        let track = client.get_track(&uri).unwrap();
        assert_eq!(track.name().await.unwrap(), "Song");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
    assert!(dir.path().join("track/abc123.json").is_file());

    // a fresh client serves the snapshot without touching the network
    let config = CacheConfig {
        cache_dir: Some(dir.path().to_path_buf()),
        api_url: Some(base),
        unversioned_from_store: true,
    };
    let client = Client::new("token", config);
    let track = client.get_track(&uri).unwrap();
    assert_eq!(track.name().await.unwrap(), "Song");
    assert_eq!(track.album().await.unwrap().uri().to_string(), "spotify:album:alb1");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_matching_version_is_served_from_store() {
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    let app = Router::new().route(
        "/playlists/pl1",
        get(move || {
            let h = h.clone();
            async move {
                h.fetch_add(1, Ordering::SeqCst);
                Json(json!({
                    "uri": "spotify:playlist:pl1",
                    "name": "Mix",
                    "snapshot_id": "v1",
                    "description": "",
                    "public": false,
                    "owner": { "uri": "spotify:user:alice", "display_name": "Alice" },
                    "images": [],
                    "tracks": { "next": null, "items": track_entries(0..2) },
                }))
            }
        }),
    );
    let base = serve(app).await;
    let dir = tempfile::tempdir().unwrap();

    let uri = Uri::parse("spotify:playlist:pl1").unwrap();
    {
        let config = CacheConfig {
            cache_dir: Some(dir.path().to_path_buf()),
            api_url: Some(base.clone()),
            unversioned_from_store: true,
        };
        let client = Client::new("token", config);
        let playlist = client.get_playlist(&uri).unwrap();
        assert_eq!(playlist.name().await.unwrap(), "Mix");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
    assert!(dir.path().join("playlist/pl1.json").is_file());

    // the caller's expected version matches the snapshot, so a fresh client
    // answers entirely from the store
    let config = CacheConfig {
        cache_dir: Some(dir.path().to_path_buf()),
        api_url: Some(base),
        unversioned_from_store: true,
    };
    let client = Client::new("token", config);
    let playlist = client.get_playlist(&uri).unwrap();
    client.cache().load(&uri, Some("v1")).await.unwrap();
    assert_eq!(playlist.name().await.unwrap(), "Mix");
    assert_eq!(playlist.snapshot_id().await.unwrap(), "v1");
    assert_eq!(playlist.items().await.unwrap().len(), 2);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_store_write_failure_is_not_fatal() {
    let app = Router::new().route("/tracks/abc123", get(|| async { Json(track_payload()) }));
    let base = serve(app).await;

    // a plain file where the store root should be makes every write fail
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();

    let config = CacheConfig {
        cache_dir: Some(blocker),
        api_url: Some(base),
        unversioned_from_store: true,
    };
    let client = Client::new("token", config);
    let track = client
        .get_track(&Uri::parse("spotify:track:abc123").unwrap())
        .unwrap();
    assert_eq!(track.name().await.unwrap(), "Song");
}

#[tokio::test]
async fn test_me_routes_through_me_endpoints() {
    let app = Router::new()
        .route(
            "/me",
            get(|| async {
                Json(json!({ "uri": "spotify:user:alice123", "display_name": "Alice" }))
            }),
        )
        .route(
            "/me/playlists",
            get(|| async {
                Json(json!({
                    "next": null,
                    "items": [
                        { "uri": "spotify:playlist:pl1", "name": "Mix", "snapshot_id": "v1" },
                    ],
                }))
            }),
        );
    let base = serve(app).await;
    let client = Client::new("token", test_config(base));

    let me = client.me().unwrap();
    assert_eq!(me.display_name().await.unwrap(), "Alice");

    let playlists = me.playlists().await.unwrap();
    assert_eq!(playlists.len(), 1);
    // name and version come from the listing's hints, not a playlist fetch
    assert_eq!(playlists[0].name().await.unwrap(), "Mix");
    assert_eq!(client.cache().peek_version(playlists[0].uri()), Some("v1".to_string()));
}

#[tokio::test]
async fn test_saved_tracks_collection() {
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    let app = Router::new().route(
        "/me/tracks",
        get(move || {
            let h = h.clone();
            async move {
                h.fetch_add(1, Ordering::SeqCst);
                Json(json!({ "next": null, "items": track_entries(0..3) }))
            }
        }),
    );
    let base = serve(app).await;
    let client = Client::new("token", test_config(base));

    let saved = client.saved_tracks().unwrap();
    let items = saved.items().await.unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[2].name().await.unwrap(), "Track 2");
    assert_eq!(saved.name().await.unwrap(), "Saved Tracks");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_parse_failure_preserves_loaded_fields() {
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    let app = Router::new().route(
        "/tracks/abc123",
        get(move || {
            let h = h.clone();
            async move {
                if h.fetch_add(1, Ordering::SeqCst) == 0 {
                    Json(track_payload())
                } else {
                    // later fetches drop the mandatory name field
                    Json(json!({
                        "uri": "spotify:track:abc123",
                        "album": { "uri": "spotify:album:alb1", "name": "Album One" },
                        "artists": [],
                    }))
                }
            }
        }),
    );
    let base = serve(app).await;
    let client = Client::new("token", test_config(base));

    let uri = Uri::parse("spotify:track:abc123").unwrap();
    let track = client.get_track(&uri).unwrap();
    assert_eq!(track.name().await.unwrap(), "Song");

    let err = client.cache().load(&uri, None).await.unwrap_err();
    assert_eq!(err, CacheError::MalformedResponse { key: "name".to_string() });

    // the bad payload was discarded wholesale
    assert_eq!(track.name().await.unwrap(), "Song");
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_invalidate_forces_a_fresh_load() {
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    let app = Router::new().route(
        "/tracks/abc123",
        get(move || {
            let h = h.clone();
            async move {
                let name = if h.fetch_add(1, Ordering::SeqCst) == 0 {
                    "Song"
                } else {
                    "Song (Remastered)"
                };
                Json(json!({
                    "uri": "spotify:track:abc123",
                    "name": name,
                    "album": { "uri": "spotify:album:alb1", "name": "Album One" },
                    "artists": [{ "uri": "spotify:artist:art1", "name": "Artist One" }],
                }))
            }
        }),
    );
    let base = serve(app).await;
    let client = Client::new("token", test_config(base));

    let uri = Uri::parse("spotify:track:abc123").unwrap();
    let track = client.get_track(&uri).unwrap();
    assert!(client.cache().peek_fetched_at(&uri).is_none());
    assert_eq!(track.name().await.unwrap(), "Song");
    assert_eq!(track.name().await.unwrap(), "Song");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    let first_load = client.cache().peek_fetched_at(&uri).unwrap();

    client.cache().invalidate(&uri);
    assert!(client.cache().peek_fetched_at(&uri).is_none());
    assert_eq!(track.name().await.unwrap(), "Song (Remastered)");
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert!(client.cache().peek_fetched_at(&uri).unwrap() >= first_load);
}
