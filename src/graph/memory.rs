//! In-process backing store, used by tests and the viewer's `--demo` mode

use super::loader::{BackingStore, ResolvedScope, Scope};
use super::types::{EdgeRecord, NodeRecord, ProgramMeta};
use crate::error::LoadError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    nodes: Vec<NodeRecord>,
    edges: Vec<EdgeRecord>,
    programs: HashMap<String, Vec<String>>,
    program_meta: HashMap<String, ProgramMeta>,
    /// mesh id -> (items, edges)
    meshes: HashMap<String, (Vec<NodeRecord>, Vec<EdgeRecord>)>,
}

/// Global node/edge tables plus program and saved-item lookups
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    failing: AtomicBool,
    touching_calls: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(self, nodes: impl IntoIterator<Item = NodeRecord>) -> Self {
        if let Ok(mut t) = self.tables.write() {
            t.nodes.extend(nodes);
        }
        self
    }

    pub fn with_edges(self, edges: impl IntoIterator<Item = EdgeRecord>) -> Self {
        if let Ok(mut t) = self.tables.write() {
            t.edges.extend(edges);
        }
        self
    }

    pub fn with_program<S: Into<String>>(
        self,
        code: impl Into<String>,
        courses: impl IntoIterator<Item = S>,
    ) -> Self {
        if let Ok(mut t) = self.tables.write() {
            t.programs
                .insert(code.into(), courses.into_iter().map(Into::into).collect());
        }
        self
    }

    pub fn with_program_meta(self, meta: ProgramMeta) -> Self {
        if let Ok(mut t) = self.tables.write() {
            t.program_meta.insert(meta.degree_code.clone(), meta);
        }
        self
    }

    pub fn with_mesh(
        self,
        mesh_id: impl Into<String>,
        items: Vec<NodeRecord>,
        edges: Vec<EdgeRecord>,
    ) -> Self {
        if let Ok(mut t) = self.tables.write() {
            t.meshes.insert(mesh_id.into(), (items, edges));
        }
        self
    }

    pub fn add_node(&self, node: NodeRecord) {
        if let Ok(mut t) = self.tables.write() {
            t.nodes.push(node);
        }
    }

    /// Make every subsequent request fail with a backend error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `fetch_edges_touching` calls served
    pub fn touching_calls(&self) -> usize {
        self.touching_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), LoadError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(LoadError::Backend("in-memory store set to fail".into()))
        } else {
            Ok(())
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, LoadError> {
        self.tables
            .read()
            .map_err(|_| LoadError::Backend("in-memory tables poisoned".into()))
    }

    /// A small computer-science program for the viewer demo
    pub fn demo() -> Self {
        let course = |code: &str, title: &str| NodeRecord::course(code, title).with_uoc(6);
        Self::new()
            .with_nodes([
                course("COMP1511", "Programming Fundamentals"),
                course("COMP1521", "Computer Systems Fundamentals"),
                course("COMP1531", "Software Engineering Fundamentals"),
                course("COMP2521", "Data Structures and Algorithms"),
                course("COMP3121", "Algorithm Design and Analysis"),
                course("COMP3311", "Database Systems"),
                course("COMP3231", "Operating Systems"),
                course("COMP4128", "Programming Challenges"),
                course("MATH1081", "Discrete Mathematics"),
                course("MATH1131", "Mathematics 1A"),
                course("ARTS1090", "Media, Society, Politics"),
                NodeRecord::course("3778", "Computer Science").with_type("degree"),
            ])
            .with_edges([
                EdgeRecord::prereq("COMP1511", "COMP1521"),
                EdgeRecord::prereq("COMP1511", "COMP1531"),
                EdgeRecord::prereq("COMP1511", "COMP2521"),
                EdgeRecord::prereq("COMP2521", "COMP3121"),
                EdgeRecord::prereq("MATH1081", "COMP3121").or_group("g1"),
                EdgeRecord::prereq("MATH1131", "COMP3121").or_group("g1"),
                EdgeRecord::prereq("COMP2521", "COMP3311"),
                EdgeRecord::prereq("COMP1521", "COMP3231"),
                EdgeRecord::prereq("COMP2521", "COMP3231"),
                EdgeRecord::prereq("COMP3121", "COMP4128"),
            ])
            .with_program(
                "3778",
                [
                    "COMP1511", "COMP1521", "COMP1531", "COMP2521", "COMP3121", "COMP3311",
                    "MATH1081", "ARTS1090", "COMP6991",
                ],
            )
            .with_program_meta(ProgramMeta {
                faculty: Some("Faculty of Engineering".into()),
                uac_code: Some("423600".into()),
                duration: Some("3 years".into()),
                ..ProgramMeta::new("3778", "Computer Science")
            })
    }
}

#[async_trait]
impl BackingStore for InMemoryStore {
    async fn resolve_scope(&self, scope: &Scope) -> Result<ResolvedScope, LoadError> {
        self.check()?;
        let tables = self.read()?;
        match scope {
            Scope::NamedProgram { code, courses } => {
                let keys = if courses.is_empty() {
                    tables.programs.get(code).cloned().unwrap_or_default()
                } else {
                    courses.clone()
                };
                Ok(ResolvedScope::keys(keys))
            }
            Scope::UserItemSet { mesh_id, .. } => {
                let (items, edges) = tables.meshes.get(mesh_id).cloned().unwrap_or_default();
                Ok(ResolvedScope {
                    keys: items.iter().map(|i| i.key.clone()).collect(),
                    records: items,
                    edges: Some(edges),
                })
            }
        }
    }

    async fn fetch_nodes_by_keys(&self, keys: &[String]) -> Result<Vec<NodeRecord>, LoadError> {
        self.check()?;
        let wanted: HashSet<&str> = keys.iter().map(String::as_str).collect();
        Ok(self
            .read()?
            .nodes
            .iter()
            .filter(|n| wanted.contains(n.key.as_str()))
            .cloned()
            .collect())
    }

    async fn fetch_edges_both_endpoints_in(
        &self,
        keys: &[String],
    ) -> Result<Vec<EdgeRecord>, LoadError> {
        self.check()?;
        let wanted: HashSet<&str> = keys.iter().map(String::as_str).collect();
        Ok(self
            .read()?
            .edges
            .iter()
            .filter(|e| wanted.contains(e.from.as_str()) && wanted.contains(e.to.as_str()))
            .cloned()
            .collect())
    }

    async fn fetch_edges_touching(&self, keys: &[String]) -> Result<Vec<EdgeRecord>, LoadError> {
        self.touching_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let wanted: HashSet<&str> = keys.iter().map(String::as_str).collect();
        Ok(self
            .read()?
            .edges
            .iter()
            .filter(|e| wanted.contains(e.from.as_str()) || wanted.contains(e.to.as_str()))
            .cloned()
            .collect())
    }

    async fn fetch_program_meta(&self, code: &str) -> Result<Option<ProgramMeta>, LoadError> {
        self.check()?;
        Ok(self.read()?.program_meta.get(code).cloned())
    }
}
