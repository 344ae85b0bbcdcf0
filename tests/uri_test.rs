use spotidex::{CacheError, Uri};

#[test]
fn test_parse_roundtrip() {
    let uri = Uri::parse("spotify:track:6rqhFgbbKwnb9MLmUQDhG6").unwrap();
    assert_eq!(uri.kind(), "track");
    assert_eq!(uri.id(), "6rqhFgbbKwnb9MLmUQDhG6");
    assert_eq!(uri.to_string(), "spotify:track:6rqhFgbbKwnb9MLmUQDhG6");
}

#[test]
fn test_from_parts() {
    let uri = Uri::from_parts("playlist", "37i9dQZF1DXcBWIGoYBM5M");
    assert_eq!(uri.to_string(), "spotify:playlist:37i9dQZF1DXcBWIGoYBM5M");
    assert_eq!(uri, Uri::parse("spotify:playlist:37i9dQZF1DXcBWIGoYBM5M").unwrap());
}

#[test]
fn test_parse_rejects_wrong_segment_count() {
    assert!(matches!(Uri::parse("spotify:track"), Err(CacheError::Format(_))));
    assert!(matches!(
        Uri::parse("spotify:track:abc:extra"),
        Err(CacheError::Format(_))
    ));
    assert!(matches!(Uri::parse(""), Err(CacheError::Format(_))));
}

#[test]
fn test_parse_rejects_wrong_namespace() {
    assert!(matches!(
        Uri::parse("deezer:track:abc123"),
        Err(CacheError::Format(_))
    ));
}

#[test]
fn test_equality_and_hashing() {
    use std::collections::HashMap;

    let a = Uri::parse("spotify:album:abc123").unwrap();
    let b = Uri::from_parts("album", "abc123");
    assert_eq!(a, b);

    let mut map = HashMap::new();
    map.insert(a, 1);
    assert_eq!(map.get(&b), Some(&1));
}

#[test]
fn test_well_known_identifiers() {
    assert_eq!(Uri::me().to_string(), "spotify:user:@me");
    assert_eq!(Uri::saved_tracks().to_string(), "spotify:collection:@saved");
    assert_eq!(Uri::me().kind(), "user");
    assert_eq!(Uri::saved_tracks().kind(), "collection");
}
