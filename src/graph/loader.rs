//! DataLoader - builds snapshots from the backing store
//!
//! Two entry points:
//! - `load_initial(scope)`: every node of the scope, plus only those edges
//!   whose *both* endpoints lie in the scope.
//! - `expand(node_id)`: the closed neighborhood of one node, as a new snapshot
//!   that fully replaces the current one.
//!
//! Both calls take their in-flight ticket synchronously and hand back a
//! future that owns it, so a second request for the same trigger is rejected
//! at call time instead of racing the first.

use super::types::{EdgeRecord, NodeId, NodeRecord, ProgramMeta, Snapshot};
use crate::error::LoadError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

// =============================================================================
// SCOPE
// =============================================================================

/// What the initial snapshot covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scope {
    /// A user's saved MindMesh items (courses, degrees, specialisations)
    UserItemSet { user_id: String, mesh_id: String },
    /// A named program's course list
    NamedProgram { code: String, courses: Vec<String> },
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::UserItemSet { mesh_id, .. } => write!(f, "mesh {mesh_id}"),
            Scope::NamedProgram { code, .. } => write!(f, "program {code}"),
        }
    }
}

/// Node keys a scope covers, with whatever rows came along while resolving it.
///
/// A user item set carries its own item rows and its own edge table; a
/// program only names course codes and reads the global tables.
#[derive(Debug, Clone, Default)]
pub struct ResolvedScope {
    pub keys: Vec<String>,
    pub records: Vec<NodeRecord>,
    pub edges: Option<Vec<EdgeRecord>>,
}

impl ResolvedScope {
    pub fn keys(keys: Vec<String>) -> Self {
        Self {
            keys,
            ..Self::default()
        }
    }
}

// =============================================================================
// BACKING STORE
// =============================================================================

/// Narrow read interface onto the hosted data service
#[async_trait]
pub trait BackingStore: Send + Sync {
    async fn resolve_scope(&self, scope: &Scope) -> Result<ResolvedScope, LoadError>;

    async fn fetch_nodes_by_keys(&self, keys: &[String]) -> Result<Vec<NodeRecord>, LoadError>;

    /// Edges whose source and target are both in `keys`
    async fn fetch_edges_both_endpoints_in(
        &self,
        keys: &[String],
    ) -> Result<Vec<EdgeRecord>, LoadError>;

    /// Edges with either endpoint in `keys`
    async fn fetch_edges_touching(&self, keys: &[String]) -> Result<Vec<EdgeRecord>, LoadError>;

    /// Degree row for a program code, if the store has one
    async fn fetch_program_meta(&self, code: &str) -> Result<Option<ProgramMeta>, LoadError>;
}

// =============================================================================
// IN-FLIGHT GUARD
// =============================================================================

/// Trigger identity for the duplicate-request guard
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequestKey {
    Initial,
    Expand(NodeId),
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKey::Initial => write!(f, "initial load"),
            RequestKey::Expand(id) => write!(f, "expand {id}"),
        }
    }
}

type InFlightSet = Arc<Mutex<HashSet<RequestKey>>>;

/// Held while a request runs; releases its key on drop
#[derive(Debug)]
pub struct InFlight {
    key: RequestKey,
    set: InFlightSet,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.key);
        }
    }
}

pub type LoadFuture<T> = Pin<Box<dyn Future<Output = Result<T, LoadError>> + Send + 'static>>;

/// Result of an initial load
#[derive(Debug, Clone, Default)]
pub struct InitialLoad {
    pub snapshot: Snapshot,
    /// Keys the scope asked for, including any the store did not return
    pub scope_keys: Vec<String>,
    /// Degree row of a named program
    pub program: Option<ProgramMeta>,
}

// =============================================================================
// DATA LOADER
// =============================================================================

#[derive(Clone)]
pub struct DataLoader {
    backend: Arc<dyn BackingStore>,
    in_flight: InFlightSet,
}

impl fmt::Debug for DataLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataLoader")
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

impl DataLoader {
    pub fn new(backend: Arc<dyn BackingStore>) -> Self {
        Self {
            backend,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Claim a trigger. Fails with `Duplicate` if it is already claimed.
    pub fn begin(&self, key: RequestKey) -> Result<InFlight, LoadError> {
        let mut set = self
            .in_flight
            .lock()
            .map_err(|_| LoadError::Backend("in-flight registry poisoned".into()))?;
        if !set.insert(key.clone()) {
            tracing::debug!(%key, "dropping duplicate request");
            return Err(LoadError::Duplicate(key.to_string()));
        }
        Ok(InFlight {
            key,
            set: Arc::clone(&self.in_flight),
        })
    }

    pub fn is_in_flight(&self, key: &RequestKey) -> bool {
        self.in_flight
            .lock()
            .map(|set| set.contains(key))
            .unwrap_or(false)
    }

    pub fn load_initial(&self, scope: Scope) -> Result<LoadFuture<InitialLoad>, LoadError> {
        let ticket = self.begin(RequestKey::Initial)?;
        let backend = Arc::clone(&self.backend);
        Ok(Box::pin(async move {
            let _ticket = ticket;
            load_scope(backend.as_ref(), &scope).await
        }))
    }

    /// Resolves to `Ok(None)` when the node has no edges at all
    pub fn expand(&self, node_id: impl Into<String>) -> Result<LoadFuture<Option<Snapshot>>, LoadError> {
        let node_id = node_id.into();
        let ticket = self.begin(RequestKey::Expand(node_id.clone()))?;
        let backend = Arc::clone(&self.backend);
        Ok(Box::pin(async move {
            let _ticket = ticket;
            expand_neighborhood(backend.as_ref(), &node_id).await
        }))
    }
}

async fn load_scope(backend: &dyn BackingStore, scope: &Scope) -> Result<InitialLoad, LoadError> {
    let resolved = backend.resolve_scope(scope).await?;
    let keys: Vec<String> = dedup_keys(resolved.keys);
    if keys.is_empty() {
        return Err(LoadError::EmptyScope(scope.to_string()));
    }
    let allowed: HashSet<&str> = keys.iter().map(String::as_str).collect();

    let mut records: Vec<NodeRecord> = resolved
        .records
        .into_iter()
        .filter(|r| allowed.contains(r.key.as_str()))
        .collect();
    let have: HashSet<String> = records.iter().map(|r| r.key.clone()).collect();
    let missing: Vec<String> = keys.iter().filter(|k| !have.contains(*k)).cloned().collect();
    if !missing.is_empty() {
        records.extend(backend.fetch_nodes_by_keys(&missing).await?);
    }

    let edges = match resolved.edges {
        Some(edges) => edges,
        None => backend.fetch_edges_both_endpoints_in(&keys).await?,
    };
    let edges: Vec<EdgeRecord> = edges
        .into_iter()
        .filter(|e| allowed.contains(e.from.as_str()) && allowed.contains(e.to.as_str()))
        .collect();

    // Program details decorate the summary; the graph loads without them
    let program = match scope {
        Scope::NamedProgram { code, .. } => match backend.fetch_program_meta(code).await {
            Ok(meta) => meta,
            Err(err) => {
                tracing::warn!(%scope, error = %err, "program details unavailable");
                None
            }
        },
        Scope::UserItemSet { .. } => None,
    };

    let snapshot = Snapshot::ingest(records, edges);
    tracing::info!(
        %scope,
        nodes = snapshot.nodes.len(),
        links = snapshot.links.len(),
        "loaded initial snapshot"
    );
    Ok(InitialLoad {
        snapshot,
        scope_keys: keys,
        program,
    })
}

async fn expand_neighborhood(
    backend: &dyn BackingStore,
    node_id: &str,
) -> Result<Option<Snapshot>, LoadError> {
    let edges: Vec<EdgeRecord> = backend
        .fetch_edges_touching(&[node_id.to_string()])
        .await?
        .into_iter()
        .filter(|e| e.touches(node_id))
        .collect();
    if edges.is_empty() {
        tracing::info!(node_id, "no edges found, expand is a no-op");
        return Ok(None);
    }

    let mut keys = BTreeSet::new();
    keys.insert(node_id.to_string());
    for edge in &edges {
        keys.insert(edge.from.clone());
        keys.insert(edge.to.clone());
    }
    let keys: Vec<String> = keys.into_iter().collect();

    let records = backend.fetch_nodes_by_keys(&keys).await?;
    let snapshot = Snapshot::ingest(records, edges);
    tracing::info!(
        node_id,
        nodes = snapshot.nodes.len(),
        links = snapshot.links.len(),
        "expanded neighborhood"
    );
    Ok(Some(snapshot))
}

fn dedup_keys(keys: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    keys.into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty() && seen.insert(k.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::memory::InMemoryStore;
    use pretty_assertions::assert_eq;

    fn loader() -> (Arc<InMemoryStore>, DataLoader) {
        let store = Arc::new(
            InMemoryStore::new()
                .with_nodes([
                    NodeRecord::course("COMP1511", "Programming Fundamentals"),
                    NodeRecord::course("COMP2521", "Data Structures"),
                    NodeRecord::course("COMP3121", "Algorithms"),
                    NodeRecord::course("MATH1081", "Discrete Maths"),
                ])
                .with_edges([
                    EdgeRecord::prereq("COMP1511", "COMP2521"),
                    EdgeRecord::prereq("COMP2521", "COMP3121"),
                    EdgeRecord::prereq("MATH1081", "COMP3121"),
                ])
                .with_program("3778", ["COMP1511", "COMP2521"])
                .with_program_meta(ProgramMeta::new("3778", "Computer Science")),
        );
        let loader = DataLoader::new(store.clone());
        (store, loader)
    }

    #[test]
    fn load_initial_uses_strict_containment() {
        let (_, loader) = loader();
        let scope = Scope::NamedProgram {
            code: "3778".into(),
            courses: vec![],
        };
        let load = pollster::block_on(loader.load_initial(scope).unwrap()).unwrap();

        assert_eq!(load.snapshot.node_ids().len(), 2);
        assert_eq!(load.snapshot.links.len(), 1);
        assert_eq!(load.snapshot.links[0].target, "COMP2521");
        assert_eq!(
            load.program.as_ref().map(ProgramMeta::display_name),
            Some("Computer Science")
        );
    }

    #[test]
    fn program_without_degree_row_still_loads() {
        let (_, loader) = loader();
        let scope = Scope::NamedProgram {
            code: "3707".into(),
            courses: vec!["COMP1511".into(), "COMP3121".into()],
        };
        let load = pollster::block_on(loader.load_initial(scope).unwrap()).unwrap();
        assert_eq!(load.snapshot.nodes.len(), 2);
        assert!(load.program.is_none());
    }

    #[test]
    fn expand_returns_closed_neighborhood() {
        let (_, loader) = loader();
        let snapshot = pollster::block_on(loader.expand("COMP3121").unwrap())
            .unwrap()
            .unwrap();

        let ids: Vec<_> = snapshot.node_ids().into_iter().collect();
        assert_eq!(ids, vec!["COMP2521", "COMP3121", "MATH1081"]);
        assert_eq!(snapshot.links.len(), 2);
    }

    #[test]
    fn expand_without_edges_is_noop() {
        let (store, loader) = loader();
        store.add_node(NodeRecord::course("ARTS1000", "Lonely"));
        let result = pollster::block_on(loader.expand("ARTS1000").unwrap()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn duplicate_expand_is_dropped() {
        let (store, loader) = loader();
        let first = loader.expand("COMP2521").unwrap();
        let second = loader.expand("COMP2521");
        assert!(matches!(second, Err(LoadError::Duplicate(_))));

        // A different node is a different trigger
        assert!(loader.expand("COMP1511").is_ok());

        pollster::block_on(first).unwrap();
        assert!(!loader.is_in_flight(&RequestKey::Expand("COMP2521".into())));
        assert!(loader.expand("COMP2521").is_ok());
        assert_eq!(store.touching_calls(), 1);
    }

    #[test]
    fn backend_failure_is_recoverable_error() {
        let (store, loader) = loader();
        store.set_failing(true);
        let err = pollster::block_on(loader.expand("COMP2521").unwrap()).unwrap_err();
        assert!(err.is_recoverable());
        assert!(!loader.is_in_flight(&RequestKey::Expand("COMP2521".into())));
    }

    #[test]
    fn empty_scope_is_an_error() {
        let (_, loader) = loader();
        let scope = Scope::NamedProgram {
            code: "0000".into(),
            courses: vec![],
        };
        let err = pollster::block_on(loader.load_initial(scope).unwrap()).unwrap_err();
        assert!(matches!(err, LoadError::EmptyScope(_)));
    }
}
