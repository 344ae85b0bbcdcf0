//! Identity-preserving object cache and fetch coordination.
//!
//! The [`Cache`] is the single authority mapping a [`Uri`] to the one local
//! [`Entity`](crate::entity) instance for that resource. It owns three
//! responsibilities:
//!
//! - **Identity**: [`Cache::get_or_create`] is the only constructor path for
//!   entities, so two lookups of the same identifier always observe the same
//!   instance.
//! - **Single-flight loads**: concurrent [`Cache::load`] calls for one
//!   identifier share one underlying fetch. The fetch runs on a detached
//!   task, so a cancelled waiter never cancels the work other waiters are
//!   blocked on.
//! - **Freshness**: loads prefer the persistent store when the kind's
//!   staleness policy allows it and the stored version satisfies the
//!   caller's expectation; otherwise they go to the network, with server
//!   pagination assembled transparently before parsing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::Value;
use tokio::sync::watch;

use crate::{
    Res,
    connection::Connection,
    entity::{self, Entity, Hints, Paging, ResourceKind},
    error::CacheError,
    store::Store,
    uri::Uri,
    warning,
};

type SharedEntity = Arc<RwLock<Entity>>;
type LoadOutcome = Option<Res<()>>;

struct CacheInner {
    connection: Connection,
    store: Option<Store>,
    unversioned_from_store: bool,
    entities: Mutex<HashMap<Uri, SharedEntity>>,
    in_flight: Mutex<HashMap<Uri, watch::Receiver<LoadOutcome>>>,
}

/// A cheap-clone handle to the shared cache state. Entity handles carry one
/// of these instead of owning references back into the cache.
#[derive(Clone)]
pub struct Cache {
    inner: Arc<CacheInner>,
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache").finish_non_exhaustive()
    }
}

impl Cache {
    pub fn new(connection: Connection, store: Option<Store>, unversioned_from_store: bool) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                connection,
                store,
                unversioned_from_store,
                entities: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Registers the resource under its identifier, creating an unpopulated
    /// entity if this is the first reference. Hints seed cheap attributes
    /// (name, playlist snapshot id) without marking the entity loaded, and
    /// never overwrite values that are already present.
    pub fn get_or_create(&self, uri: &Uri, hints: Hints) -> Res<()> {
        let kind = ResourceKind::from_uri(uri)?;
        let entry = {
            let mut entities = self.inner.entities.lock().unwrap();
            entities
                .entry(uri.clone())
                .or_insert_with(|| {
                    Arc::new(RwLock::new(Entity::new(uri.clone(), kind, Hints::default())))
                })
                .clone()
        };

        let mut entity = entry.write().unwrap();
        if entity.name.is_none() {
            entity.name = hints.name;
        }
        if let (entity::EntityData::Playlist(playlist), Some(snapshot_id)) =
            (&mut entity.data, hints.snapshot_id)
        {
            if playlist.snapshot_id.is_none() {
                playlist.snapshot_id = Some(snapshot_id);
            }
        }
        Ok(())
    }

    /// Loads the resource's fields, coalescing with any fetch already in
    /// flight for the same identifier.
    ///
    /// With `expected_version` set, the load only succeeds if the resource's
    /// version token ends up matching: a stored snapshot with a different
    /// version is bypassed, and a fetch that still reports a different
    /// version fails with [`CacheError::Staleness`] without touching the
    /// entity.
    pub async fn load(&self, uri: &Uri, expected_version: Option<&str>) -> Res<()> {
        self.get_or_create(uri, Hints::default())?;

        let mut rx = {
            let mut in_flight = self.inner.in_flight.lock().unwrap();
            match in_flight.get(uri) {
                Some(rx) => rx.clone(),
                None => {
                    let (tx, rx) = watch::channel(None);
                    in_flight.insert(uri.clone(), rx.clone());

                    // The fetch must survive cancellation of the waiter that
                    // started it, so it runs on its own task.
                    let cache = self.clone();
                    let uri = uri.clone();
                    let expected = expected_version.map(str::to_owned);
                    tokio::spawn(async move {
                        let result = cache.perform_load(&uri, expected.as_deref()).await;
                        cache.inner.in_flight.lock().unwrap().remove(&uri);
                        let _ = tx.send(Some(result));
                    });
                    rx
                }
            }
        };

        let result = loop {
            if let Some(result) = rx.borrow_and_update().clone() {
                break result;
            }
            if rx.changed().await.is_err() {
                break Err(CacheError::Transport {
                    status: None,
                    message: "load task ended before reporting a result".to_string(),
                });
            }
        };
        result?;

        // A coalesced waiter may require a different version than the flight
        // it joined was asked for; revalidate against the loaded state.
        if let Some(expected) = expected_version {
            let found = self.peek_version(uri);
            if found.as_deref() != Some(expected) {
                return Err(CacheError::Staleness {
                    expected: expected.to_string(),
                    found,
                });
            }
        }
        Ok(())
    }

    /// Drops the entity's populated fields so the next attribute read loads
    /// fresh data. The identity of the instance is preserved.
    pub fn invalidate(&self, uri: &Uri) {
        if let Some(entity) = self.entity(uri) {
            entity.write().unwrap().clear();
        }
    }

    /// The resource's display name, if already known. Never triggers a load.
    pub fn peek_name(&self, uri: &Uri) -> Option<String> {
        self.peek_with(uri, |entity| entity.name.clone())
    }

    /// The resource's current version token, if its kind carries one.
    /// Never triggers a load.
    pub fn peek_version(&self, uri: &Uri) -> Option<String> {
        self.peek_with(uri, |entity| entity.version())
    }

    /// When the resource's fields were last applied from a load, or `None`
    /// for an entity that is unpopulated or has been invalidated. Never
    /// triggers a load.
    pub fn peek_fetched_at(&self, uri: &Uri) -> Option<DateTime<Utc>> {
        self.peek_with(uri, |entity| entity.fetched_at)
    }

    /// Serializes the resource's populated fields into the payload shape its
    /// parser expects. This is the snapshot format written to the persistent
    /// store.
    pub fn serialize(&self, uri: &Uri) -> Res<Value> {
        let entity = self.entity(uri).ok_or_else(|| CacheError::Format(format!(
            "'{uri}' is not registered in this cache"
        )))?;
        let guard = entity.read().unwrap();
        Ok(entity::serialize(&guard, self))
    }

    /// The shared implicit-load accessor rule: return the field if its
    /// backing value is set, otherwise run one coordinated load and read it
    /// again. Reads of already-populated fields never reach the network.
    pub(crate) async fn field<T>(
        &self,
        uri: &Uri,
        name: &'static str,
        get: impl Fn(&Entity) -> Option<T>,
    ) -> Res<T> {
        if let Some(value) = self.peek_with(uri, &get) {
            return Ok(value);
        }
        self.load(uri, None).await?;
        self.peek_with(uri, &get)
            .ok_or(CacheError::MalformedResponse {
                key: name.to_string(),
            })
    }

    fn entity(&self, uri: &Uri) -> Option<SharedEntity> {
        self.inner.entities.lock().unwrap().get(uri).cloned()
    }

    fn peek_with<T>(&self, uri: &Uri, get: impl FnOnce(&Entity) -> Option<T>) -> Option<T> {
        let entity = self.entity(uri)?;
        let guard = entity.read().unwrap();
        get(&guard)
    }

    /// One load generation: store first when policy and version allow,
    /// otherwise network fetch, parse, persist.
    async fn perform_load(&self, uri: &Uri, expected_version: Option<&str>) -> Res<()> {
        let kind = ResourceKind::from_uri(uri)?;

        if let Some(store) = &self.inner.store {
            let expired = self
                .peek_with(uri, |entity| {
                    Some(entity.is_expired(self.inner.unversioned_from_store))
                })
                .unwrap_or(true);
            if !expired {
                match store.read(uri).await {
                    Ok(Some(payload)) => {
                        let stored_version = entity::version_token(kind, &payload);
                        let acceptable = match expected_version {
                            None => true,
                            Some(expected) => stored_version.as_deref() == Some(expected),
                        };
                        if acceptable {
                            match self.apply(uri, kind, &payload) {
                                Ok(()) => return Ok(()),
                                Err(err) => {
                                    warning!("Stored snapshot for {} is unusable: {}", uri, err)
                                }
                            }
                        }
                    }
                    Ok(None) => {}
                    Err(err) => {
                        warning!("Cache read for {} failed, treating as miss: {}", uri, err)
                    }
                }
            }
        }

        let payload = self.fetch_assembled(kind, uri).await?;
        if let Some(expected) = expected_version {
            let found = entity::version_token(kind, &payload);
            if found.as_deref() != Some(expected) {
                return Err(CacheError::Staleness {
                    expected: expected.to_string(),
                    found,
                });
            }
        }
        self.apply(uri, kind, &payload)?;

        if let Some(store) = &self.inner.store {
            let snapshot = self.serialize(uri)?;
            if let Err(err) = store.write(uri, &snapshot).await {
                warning!("Cache write for {} failed: {}", uri, err);
            }
        }
        Ok(())
    }

    /// Parses a payload and applies the result to the entity in one step.
    /// A parse failure leaves every previously populated field intact.
    fn apply(&self, uri: &Uri, kind: ResourceKind, payload: &Value) -> Res<()> {
        let parsed = entity::parse(kind, uri, payload, self)?;
        let entity = self.entity(uri).ok_or_else(|| CacheError::Format(format!(
            "'{uri}' is not registered in this cache"
        )))?;
        let mut guard = entity.write().unwrap();
        if let Some(name) = parsed.name {
            guard.name = Some(name);
        }
        guard.data = parsed.data;
        guard.fetched_at = Some(Utc::now());
        Ok(())
    }

    /// Executes a kind's request descriptors and assembles one payload,
    /// following server pagination until no further page is reported. The
    /// parser receives the merged result as if pagination did not exist.
    async fn fetch_assembled(&self, kind: ResourceKind, uri: &Uri) -> Res<Value> {
        let mut payload = Value::Null;

        for spec in entity::requests(kind, uri) {
            let endpoint = Connection::add_query_parameters(&spec.endpoint, &spec.params);
            let mut data = self
                .inner
                .connection
                .execute(Method::GET, &endpoint, None)
                .await?;

            if let Some(paging) = &spec.paging {
                self.follow_pages(&mut data, paging).await?;
            }

            payload = match spec.merge_key {
                None => data,
                Some(key) => {
                    let mut base = match payload {
                        Value::Null => Value::Object(serde_json::Map::new()),
                        other => other,
                    };
                    if let Some(object) = base.as_object_mut() {
                        object.insert(key.to_string(), data);
                    }
                    base
                }
            };
        }
        Ok(payload)
    }

    /// Fetches continuation pages for one paged collection, concatenating
    /// the items in server-returned order.
    async fn follow_pages(&self, data: &mut Value, paging: &Paging) -> Res<()> {
        let mut offset = paging.limit;
        loop {
            let has_next = section_at(data, paging.items_path)
                .and_then(|section| section.get("next"))
                .is_some_and(|next| !next.is_null());
            if !has_next {
                return Ok(());
            }

            let mut params = paging.items_params.clone();
            params.push(("offset", offset.to_string()));
            params.push(("limit", paging.limit.to_string()));
            let endpoint = Connection::add_query_parameters(&paging.items_endpoint, &params);
            let extra = self
                .inner
                .connection
                .execute(Method::GET, &endpoint, None)
                .await?;

            let section = section_at_mut(data, paging.items_path).ok_or(
                CacheError::MalformedResponse {
                    key: "items".to_string(),
                },
            )?;
            let extra_items = extra
                .get("items")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            match section.get_mut("items").and_then(Value::as_array_mut) {
                Some(items) => items.extend(extra_items),
                None => {
                    return Err(CacheError::MalformedResponse {
                        key: "items".to_string(),
                    });
                }
            }
            if let Some(object) = section.as_object_mut() {
                object.insert(
                    "next".to_string(),
                    extra.get("next").cloned().unwrap_or(Value::Null),
                );
            }
            offset += paging.limit;
        }
    }
}

fn section_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for key in path {
        current = current.get(*key)?;
    }
    Some(current)
}

fn section_at_mut<'a>(value: &'a mut Value, path: &[&str]) -> Option<&'a mut Value> {
    let mut current = value;
    for key in path {
        current = current.get_mut(*key)?;
    }
    Some(current)
}
