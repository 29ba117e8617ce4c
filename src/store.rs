use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::graph::Graph;

pub const CREDENTIAL_KEY: &str = "lexigraph.credential";

#[derive(Debug)]
pub struct StoreChange<'a> {
    pub graph: Option<&'a Graph>,
    pub revision: u64,
}

type Callback = Arc<dyn Fn(&StoreChange<'_>) + Send + Sync>;

struct Subscriber {
    id: u64,
    key: String,
    callback: Callback,
}

#[derive(Default)]
struct StoreState {
    graphs: BTreeMap<String, Graph>,
    credential: Option<String>,
    revision: u64,
}

/// Keys are used verbatim: two URLs differing only in their query string are different entries.
pub struct GraphStore {
    path: Option<PathBuf>,
    state: Mutex<StoreState>,
    subscribers: Mutex<Vec<Subscriber>>,
    next_subscriber: AtomicU64,
}

pub struct Subscription {
    store: Weak<GraphStore>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.remove_subscriber(self.id);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl GraphStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = match fs::read_to_string(&path) {
            Ok(raw) => parse_store(&raw)
                .with_context(|| format!("failed to parse graph store {}", path.display()))?,
            Err(error) if error.kind() == ErrorKind::NotFound => StoreState::default(),
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("failed to read graph store {}", path.display()));
            }
        };

        debug!(
            path = %path.display(),
            entries = state.graphs.len(),
            "opened graph store"
        );
        Ok(Self::with_state(Some(path), state))
    }

    pub fn in_memory() -> Self {
        Self::with_state(None, StoreState::default())
    }

    fn with_state(path: Option<PathBuf>, state: StoreState) -> Self {
        Self {
            path,
            state: Mutex::new(state),
            subscribers: Mutex::new(Vec::new()),
            next_subscriber: AtomicU64::new(1),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<Graph> {
        lock(&self.state).graphs.get(key).cloned()
    }

    pub fn set(&self, key: &str, graph: &Graph) -> Result<u64> {
        if key == CREDENTIAL_KEY {
            bail!("{CREDENTIAL_KEY:?} is reserved and cannot be used as a source key");
        }

        let revision = {
            let mut state = lock(&self.state);
            let previous = state.graphs.insert(key.to_owned(), graph.clone());
            if let Err(error) = self.persist(&state) {
                match previous {
                    Some(previous) => state.graphs.insert(key.to_owned(), previous),
                    None => state.graphs.remove(key),
                };
                return Err(error);
            }
            state.revision += 1;
            state.revision
        };

        self.notify(key, Some(graph), revision);
        Ok(revision)
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        let revision = {
            let mut state = lock(&self.state);
            let Some(previous) = state.graphs.remove(key) else {
                return Ok(false);
            };
            if let Err(error) = self.persist(&state) {
                state.graphs.insert(key.to_owned(), previous);
                return Err(error);
            }
            state.revision += 1;
            state.revision
        };

        self.notify(key, None, revision);
        Ok(true)
    }

    pub fn credential(&self) -> Option<String> {
        lock(&self.state).credential.clone()
    }

    pub fn set_credential(&self, credential: &str) -> Result<()> {
        let mut state = lock(&self.state);
        let previous = state.credential.replace(credential.to_owned());
        if let Err(error) = self.persist(&state) {
            state.credential = previous;
            return Err(error);
        }
        Ok(())
    }

    pub fn subscribe<F>(self: &Arc<Self>, key: &str, callback: F) -> Subscription
    where
        F: Fn(&StoreChange<'_>) + Send + Sync + 'static,
    {
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        lock(&self.subscribers).push(Subscriber {
            id,
            key: key.to_owned(),
            callback: Arc::new(callback),
        });
        Subscription {
            store: Arc::downgrade(self),
            id,
        }
    }

    fn remove_subscriber(&self, id: u64) {
        lock(&self.subscribers).retain(|subscriber| subscriber.id != id);
    }

    fn notify(&self, key: &str, graph: Option<&Graph>, revision: u64) {
        let callbacks = lock(&self.subscribers)
            .iter()
            .filter(|subscriber| subscriber.key == key)
            .map(|subscriber| Arc::clone(&subscriber.callback))
            .collect::<Vec<_>>();

        let change = StoreChange {
            graph,
            revision,
        };
        for callback in callbacks {
            (*callback)(&change);
        }
    }

    fn persist(&self, state: &StoreState) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut object = Map::with_capacity(state.graphs.len() + 1);
        if let Some(credential) = &state.credential {
            object.insert(CREDENTIAL_KEY.to_owned(), Value::String(credential.clone()));
        }
        for (key, graph) in &state.graphs {
            let value = serde_json::to_value(graph)
                .with_context(|| format!("failed to serialize graph for {key}"))?;
            object.insert(key.clone(), value);
        }

        let bytes = serde_json::to_vec_pretty(&Value::Object(object))
            .context("failed to serialize graph store")?;
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, bytes)
            .with_context(|| format!("failed to write {}", temp_path.display()))?;
        fs::rename(&temp_path, path)
            .with_context(|| format!("failed to replace {}", path.display()))?;
        Ok(())
    }
}

fn parse_store(raw: &str) -> Result<StoreState> {
    if raw.trim().is_empty() {
        return Ok(StoreState::default());
    }

    let parsed: Value = serde_json::from_str(raw).context("invalid JSON in graph store")?;
    let object = parsed
        .as_object()
        .ok_or_else(|| anyhow!("graph store root is not a JSON object"))?;

    let mut state = StoreState::default();
    for (key, value) in object {
        if key == CREDENTIAL_KEY {
            state.credential = value.as_str().map(str::to_owned);
            continue;
        }

        match Graph::deserialize(value) {
            Ok(graph) => {
                state.graphs.insert(key.clone(), graph);
            }
            Err(error) => warn!(key = key.as_str(), %error, "skipping unreadable stored graph"),
        }
    }

    Ok(state)
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::graph::{Link, Node};

    fn sample_graph() -> Graph {
        let mut root = Node::new("root", "Root", 0);
        root.x = Some(0.0);
        root.fx = Some(0.0);
        root.fy = Some(0.0);
        Graph {
            nodes: vec![root, Node::new("a", "A", 1), Node::new("b", "B", 2)],
            links: vec![Link::new("a", "root", "r1"), Link::new("b", "a", "r2")],
        }
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = GraphStore::open(&path).unwrap();
        store.set("https://example.com/a", &sample_graph()).unwrap();
        store.set_credential("secret").unwrap();
        drop(store);

        let reopened = GraphStore::open(&path).unwrap();
        assert_eq!(reopened.get("https://example.com/a"), Some(sample_graph()));
        assert_eq!(reopened.credential().as_deref(), Some("secret"));
    }

    #[test]
    fn stored_links_hold_plain_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = GraphStore::open(&path).unwrap();
        store.set("key", &sample_graph()).unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let link = &raw["key"]["links"][0];
        assert_eq!(link["source"], Value::String("a".to_owned()));
        assert_eq!(link["target"], Value::String("root".to_owned()));
        assert_eq!(raw["key"]["nodes"][0]["fx"], 0.0);
    }

    #[test]
    fn keys_are_not_normalized() {
        let store = GraphStore::in_memory();
        store.set("https://example.com/a?page=1", &sample_graph()).unwrap();
        assert!(store.get("https://example.com/a?page=2").is_none());
        assert!(store.get("https://example.com/a").is_none());
    }

    #[test]
    fn credential_key_is_reserved() {
        let store = GraphStore::in_memory();
        assert!(store.set(CREDENTIAL_KEY, &sample_graph()).is_err());
    }

    #[test]
    fn missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::open(dir.path().join("absent.json")).unwrap();
        assert!(store.get("anything").is_none());
        assert!(store.credential().is_none());
    }

    #[test]
    fn unreadable_entries_are_skipped() {
        let state = parse_store(
            r#"{"good": {"nodes": [], "links": []}, "bad": {"nodes": 3}, "lexigraph.credential": "k"}"#,
        )
        .unwrap();
        assert!(state.graphs.contains_key("good"));
        assert!(!state.graphs.contains_key("bad"));
        assert_eq!(state.credential.as_deref(), Some("k"));
    }

    #[test]
    fn subscribers_see_writes_for_their_key_until_dropped() {
        let store = Arc::new(GraphStore::in_memory());
        let (tx, rx) = mpsc::channel();
        let subscription = store.subscribe("watched", move |change| {
            let _ = tx.send((change.graph.map(|graph| graph.nodes.len()), change.revision));
        });

        let revision = store.set("watched", &sample_graph()).unwrap();
        store.set("other", &sample_graph()).unwrap();
        assert!(store.remove("watched").unwrap());

        assert_eq!(rx.try_recv().unwrap(), (Some(3), revision));
        assert_eq!(rx.try_recv().unwrap().0, None);
        assert!(rx.try_recv().is_err());

        drop(subscription);
        store.set("watched", &sample_graph()).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn removing_absent_key_is_a_no_op() {
        let store = GraphStore::in_memory();
        assert!(!store.remove("nothing").unwrap());
    }
}
