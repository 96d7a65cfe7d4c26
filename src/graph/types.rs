//! Graph data model - nodes, links and the snapshot that holds them
//!
//! Backing-store rows arrive as loosely-typed records (`NodeRecord`,
//! `EdgeRecord`). They are resolved exactly once, at ingestion, into the
//! strongly-typed `Node` / `Link` values the rest of the crate works with.
//! `Snapshot::from_parts` is the only way links enter a snapshot, and it drops
//! any link whose endpoint is missing.

use egui::Pos2;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::str::FromStr;

/// Node key (course code, degree code, specialisation code)
pub type NodeId = String;

// =============================================================================
// ENUMS
// =============================================================================

/// Kind of academic entity a node represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    #[default]
    Course,
    Degree,
    Specialisation,
}

impl FromStr for EntityType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "course" => Ok(Self::Course),
            "degree" | "program" => Ok(Self::Degree),
            "specialisation" | "specialization" | "major" | "minor" => Ok(Self::Specialisation),
            _ => Err(()),
        }
    }
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Course => "course",
            Self::Degree => "degree",
            Self::Specialisation => "specialisation",
        }
    }
}

/// Relation carried by a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Source must be completed before target
    Prereq,
    /// Course belongs to a program / specialisation
    BelongsTo,
}

impl FromStr for EdgeKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prereq" | "prerequisite" | "co_req" | "coreq" | "ai_inferred" => Ok(Self::Prereq),
            "belongs_to" | "belongsto" | "member" => Ok(Self::BelongsTo),
            _ => Err(()),
        }
    }
}

/// How a link combines with its siblings on the same target
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "logic", content = "group")]
pub enum LogicType {
    /// All AND links into a target are required
    #[default]
    And,
    /// Any one link of the `(target, group)` set satisfies the requirement
    Or(Option<String>),
}

impl LogicType {
    /// Resolve the optional `logic_type` / `group_id` pair of a raw edge row
    pub fn resolve(logic: Option<&str>, group: Option<String>) -> Self {
        match logic.map(|l| l.trim().to_ascii_lowercase()) {
            Some(l) if l == "or" || l == "or_group" => Self::Or(group),
            _ => Self::And,
        }
    }

    pub fn is_or(&self) -> bool {
        matches!(self, Self::Or(_))
    }

    pub fn group(&self) -> Option<&str> {
        match self {
            Self::Or(group) => group.as_deref(),
            Self::And => None,
        }
    }
}

// =============================================================================
// NODE / LINK
// =============================================================================

/// Descriptive metadata shown on and around a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub uoc: Option<u32>,
    pub faculty: Option<String>,
    pub school: Option<String>,
    pub level: Option<u8>,
}

/// A graph node. `fx`/`fy` present means the position is pinned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub label: String,
    pub entity_type: EntityType,
    pub metadata: NodeMetadata,
    pub x: f32,
    pub y: f32,
    pub fx: Option<f32>,
    pub fy: Option<f32>,
}

impl Node {
    pub fn new(id: impl Into<String>, label: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            entity_type,
            metadata: NodeMetadata::default(),
            x: 0.0,
            y: 0.0,
            fx: None,
            fy: None,
        }
    }

    pub fn with_metadata(mut self, metadata: NodeMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn position(&self) -> Pos2 {
        Pos2::new(self.x, self.y)
    }

    pub fn is_pinned(&self) -> bool {
        self.fx.is_some() && self.fy.is_some()
    }

    /// Place the node and pin it there
    pub fn pin_at(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
        self.fx = Some(x);
        self.fy = Some(y);
    }

    pub fn unpin(&mut self) {
        self.fx = None;
        self.fy = None;
    }

    /// Secondary line drawn under the label, e.g. "6 UOC"
    pub fn subtitle(&self) -> Option<String> {
        self.metadata.uoc.map(|uoc| format!("{uoc} UOC"))
    }
}

/// A directed relation between two nodes of the same snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub source: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,
    pub confidence: Option<f32>,
    pub logic: LogicType,
}

impl Link {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
            confidence: None,
            logic: LogicType::And,
        }
    }

    pub fn with_logic(mut self, logic: LogicType) -> Self {
        self.logic = logic;
        self
    }

    pub fn touches(&self, id: &str) -> bool {
        self.source == id || self.target == id
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }

    /// Identity used for set comparisons (position-independent)
    pub fn key(&self) -> (NodeId, NodeId, EdgeKind, LogicType) {
        (
            self.source.clone(),
            self.target.clone(),
            self.kind,
            self.logic.clone(),
        )
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Internally consistent node + link set at one point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot, keeping the first node per id and dropping links
    /// whose source or target is absent.
    pub fn from_parts(nodes: Vec<Node>, links: Vec<Link>) -> Self {
        let mut seen = HashSet::new();
        let nodes: Vec<Node> = nodes
            .into_iter()
            .filter(|n| seen.insert(n.id.clone()))
            .collect();

        let total = links.len();
        let links: Vec<Link> = links
            .into_iter()
            .filter(|l| seen.contains(&l.source) && seen.contains(&l.target))
            .collect();

        let pruned = total - links.len();
        if pruned > 0 {
            tracing::warn!(pruned, "pruned orphan link(s) with missing nodes");
        }

        Self { nodes, links }
    }

    /// Resolve raw backing-store rows into a snapshot
    pub fn ingest(nodes: Vec<NodeRecord>, edges: Vec<EdgeRecord>) -> Self {
        let nodes = nodes.into_iter().map(NodeRecord::into_node).collect();
        let links = edges.into_iter().filter_map(EdgeRecord::into_link).collect();
        Self::from_parts(nodes, links)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// id -> index into `nodes`
    pub fn index(&self) -> HashMap<&str, usize> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect()
    }

    pub fn node_ids(&self) -> BTreeSet<NodeId> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }

    pub fn link_keys(&self) -> BTreeSet<(NodeId, NodeId, EdgeKind, LogicType)> {
        self.links.iter().map(Link::key).collect()
    }

    /// Direct neighbors of `id` in either direction
    pub fn neighbors(&self, id: &str) -> HashSet<&str> {
        self.links
            .iter()
            .filter_map(|l| {
                if l.source == id {
                    Some(l.target.as_str())
                } else if l.target == id {
                    Some(l.source.as_str())
                } else {
                    None
                }
            })
            .collect()
    }

    /// Ids of nodes with at least one incident link (self-loops count)
    pub fn connected_ids(&self) -> HashSet<&str> {
        self.links
            .iter()
            .flat_map(|l| [l.source.as_str(), l.target.as_str()])
            .collect()
    }

    pub fn unpin_all(&mut self) {
        for node in &mut self.nodes {
            node.unpin();
        }
    }

    /// World-space bounding box of node centers
    pub fn bounds(&self) -> Option<egui::Rect> {
        let mut iter = self.nodes.iter().map(Node::position);
        let first = iter.next()?;
        Some(iter.fold(egui::Rect::from_min_max(first, first), |r, p| {
            r.union(egui::Rect::from_min_max(p, p))
        }))
    }
}

// =============================================================================
// RAW RECORDS (backing store rows)
// =============================================================================

/// Node row as returned by the backing store.
///
/// Accepts both the global node table shape (`key`, `label`, `uoc`, ...) and
/// the saved-item shape (`item_key`, `title`, `item_type`, `metadata`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    #[serde(alias = "item_key", alias = "code")]
    pub key: String,
    #[serde(default, alias = "title")]
    pub label: Option<String>,
    #[serde(default, alias = "item_type", alias = "type")]
    pub entity_type: Option<String>,
    #[serde(default, deserialize_with = "de_opt_u32")]
    pub uoc: Option<u32>,
    #[serde(default)]
    pub faculty: Option<String>,
    #[serde(default)]
    pub school: Option<String>,
    #[serde(default, deserialize_with = "de_opt_u8")]
    pub level: Option<u8>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl NodeRecord {
    pub fn course(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: Some(label.into()),
            entity_type: Some("course".into()),
            ..Self::default()
        }
    }

    pub fn with_uoc(mut self, uoc: u32) -> Self {
        self.uoc = Some(uoc);
        self
    }

    pub fn with_type(mut self, entity_type: &str) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    pub fn into_node(self) -> Node {
        let meta = self.metadata.as_ref();
        let meta_u64 = |field: &str| meta.and_then(|m| m.get(field)).and_then(value_as_u64);
        let meta_str = |field: &str| {
            meta.and_then(|m| m.get(field))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };

        let entity_type = self
            .entity_type
            .as_deref()
            .and_then(|t| t.parse().ok())
            .unwrap_or_default();

        let metadata = NodeMetadata {
            uoc: self
                .uoc
                .or_else(|| meta_u64("uoc").and_then(|v| u32::try_from(v).ok())),
            faculty: self.faculty.or_else(|| meta_str("faculty")),
            school: self.school.or_else(|| meta_str("school")),
            level: self
                .level
                .or_else(|| meta_u64("level").and_then(|v| u8::try_from(v).ok())),
        };

        let label = self
            .label
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| self.key.clone());

        Node::new(self.key, label, entity_type).with_metadata(metadata)
    }
}

/// Edge row as returned by the backing store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    #[serde(alias = "from_key", alias = "source")]
    pub from: String,
    #[serde(alias = "to_key", alias = "target")]
    pub to: String,
    #[serde(default, alias = "edge_type", alias = "link_type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub logic_type: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub group_id: Option<String>,
}

impl EdgeRecord {
    pub fn prereq(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            kind: Some("prereq".into()),
            ..Self::default()
        }
    }

    pub fn or_group(mut self, group: impl Into<String>) -> Self {
        self.logic_type = Some("or".into());
        self.group_id = Some(group.into());
        self
    }

    pub fn touches(&self, key: &str) -> bool {
        self.from == key || self.to == key
    }

    /// Resolve into a typed link. Rows of an unrecognised relation
    /// (e.g. `theme`) carry no ordering meaning and are skipped.
    pub fn into_link(self) -> Option<Link> {
        let kind = match self.kind.as_deref() {
            None => EdgeKind::Prereq,
            Some(k) => match k.parse() {
                Ok(kind) => kind,
                Err(()) => {
                    tracing::debug!(from = %self.from, to = %self.to, kind = k, "skipping edge of unknown kind");
                    return None;
                }
            },
        };
        let logic = LogicType::resolve(self.logic_type.as_deref(), self.group_id);
        Some(Link {
            source: self.from,
            target: self.to,
            kind,
            confidence: self.confidence,
            logic,
        })
    }
}

/// Degree row describing a named program
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramMeta {
    #[serde(alias = "code")]
    pub degree_code: String,
    #[serde(default)]
    pub program_name: Option<String>,
    #[serde(default)]
    pub faculty: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub uac_code: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub cricos_code: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub duration: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
}

impl ProgramMeta {
    pub fn new(degree_code: impl Into<String>, program_name: impl Into<String>) -> Self {
        Self {
            degree_code: degree_code.into(),
            program_name: Some(program_name.into()),
            ..Self::default()
        }
    }

    /// Program name, or the code when the row has none
    pub fn display_name(&self) -> &str {
        self.program_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(self.degree_code.as_str())
    }
}

/// `sections` column of a degree row: course lists per structure section
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProgramStructure {
    #[serde(default, deserialize_with = "de_sections")]
    pub sections: Vec<ProgramSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProgramSection {
    #[serde(default)]
    pub courses: Vec<SectionCourse>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SectionCourse {
    #[serde(default)]
    pub code: Option<String>,
}

impl ProgramStructure {
    /// Distinct course codes across every section, in section order
    pub fn course_codes(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.sections
            .iter()
            .flat_map(|s| &s.courses)
            .filter_map(|c| c.code.as_deref())
            .map(str::trim)
            .filter(|c| !c.is_empty() && seen.insert(c.to_string()))
            .map(str::to_string)
            .collect()
    }
}

fn value_as_u64(v: &serde_json::Value) -> Option<u64> {
    match v {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn de_opt_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(d)?;
    Ok(value.as_ref().and_then(value_as_u64))
}

fn de_opt_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    Ok(de_opt_u64(d)?.and_then(|v| u32::try_from(v).ok()))
}

fn de_opt_u8<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u8>, D::Error> {
    Ok(de_opt_u64(d)?.and_then(|v| u8::try_from(v).ok()))
}

fn de_opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(d)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Sections arrive either as a JSON array or as a JSON-encoded string
fn de_sections<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<ProgramSection>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(d)?;
    let value = match value {
        Some(serde_json::Value::String(raw)) => {
            serde_json::from_str(&raw).map_err(serde::de::Error::custom)?
        }
        Some(v) => v,
        None => return Ok(Vec::new()),
    };
    if value.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(value).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn dangling_links_are_dropped() {
        let snapshot = Snapshot::ingest(
            vec![NodeRecord::course("COMP1511", "Programming Fundamentals")],
            vec![
                EdgeRecord::prereq("COMP1511", "COMP2521"),
                EdgeRecord::prereq("MATH1131", "COMP1511"),
            ],
        );
        assert_eq!(snapshot.nodes.len(), 1);
        assert!(snapshot.links.is_empty());
    }

    #[test]
    fn duplicate_node_ids_keep_first() {
        let snapshot = Snapshot::from_parts(
            vec![
                Node::new("A", "first", EntityType::Course),
                Node::new("A", "second", EntityType::Course),
            ],
            vec![],
        );
        assert_eq!(snapshot.nodes.len(), 1);
        assert_eq!(snapshot.nodes[0].label, "first");
    }

    #[test]
    fn logic_defaults_to_and() {
        let link = EdgeRecord::prereq("A", "B").into_link().unwrap();
        assert_eq!(link.logic, LogicType::And);

        let link = EdgeRecord::prereq("A", "B").or_group("g1").into_link().unwrap();
        assert_eq!(link.logic, LogicType::Or(Some("g1".into())));
    }

    #[test]
    fn link_keys_tell_logic_groups_apart() {
        let snapshot = Snapshot::ingest(
            vec![
                NodeRecord::course("COMP1511", "Programming Fundamentals"),
                NodeRecord::course("COMP1911", "Computing 1A"),
                NodeRecord::course("COMP2521", "Data Structures and Algorithms"),
            ],
            vec![
                EdgeRecord::prereq("COMP1911", "COMP2521").or_group("g2"),
                EdgeRecord::prereq("COMP1511", "COMP2521").or_group("g1"),
                EdgeRecord::prereq("COMP1511", "COMP2521"),
            ],
        );

        let keys: Vec<_> = snapshot.link_keys().into_iter().collect();
        assert_eq!(
            keys,
            vec![
                ("COMP1511".into(), "COMP2521".into(), EdgeKind::Prereq, LogicType::And),
                (
                    "COMP1511".into(),
                    "COMP2521".into(),
                    EdgeKind::Prereq,
                    LogicType::Or(Some("g1".into()))
                ),
                (
                    "COMP1911".into(),
                    "COMP2521".into(),
                    EdgeKind::Prereq,
                    LogicType::Or(Some("g2".into()))
                ),
            ]
        );
    }

    #[test]
    fn unknown_edge_kind_is_skipped() {
        let mut edge = EdgeRecord::prereq("A", "B");
        edge.kind = Some("theme".into());
        assert!(edge.into_link().is_none());

        let mut edge = EdgeRecord::prereq("A", "B");
        edge.kind = Some("belongs_to".into());
        assert_eq!(edge.into_link().unwrap().kind, EdgeKind::BelongsTo);
    }

    #[test]
    fn node_record_accepts_item_shape() {
        let json = serde_json::json!({
            "item_key": "COMPA1",
            "title": "Computer Science",
            "item_type": "specialisation",
            "metadata": { "uoc": "144", "level": 2 }
        });
        let record: NodeRecord = serde_json::from_value(json).unwrap();
        let node = record.into_node();
        assert_eq!(node.id, "COMPA1");
        assert_eq!(node.entity_type, EntityType::Specialisation);
        assert_eq!(node.metadata.uoc, Some(144));
        assert_eq!(node.metadata.level, Some(2));
    }

    #[test]
    fn edge_record_accepts_numeric_group() {
        let json = serde_json::json!({
            "from_key": "A", "to_key": "B", "logic_type": "or", "group_id": 7
        });
        let record: EdgeRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.group_id.as_deref(), Some("7"));
    }

    #[test]
    fn program_structure_flattens_section_courses() {
        let json = serde_json::json!({
            "sections": [
                { "title": "Core", "courses": [{ "code": "COMP1511" }, { "code": "COMP2521" }] },
                { "title": "Electives", "courses": [{ "code": "COMP1511" }, { "code": null }] },
                { "title": "Free", "notes": "Any course" }
            ]
        });
        let structure: ProgramStructure = serde_json::from_value(json).unwrap();
        assert_eq!(structure.course_codes(), vec!["COMP1511", "COMP2521"]);

        let encoded = serde_json::json!({ "sections": "[{\"courses\":[{\"code\":\"MATH1081\"}]}]" });
        let structure: ProgramStructure = serde_json::from_value(encoded).unwrap();
        assert_eq!(structure.course_codes(), vec!["MATH1081"]);
    }

    #[test]
    fn program_meta_accepts_numeric_codes() {
        let json = serde_json::json!({
            "degree_code": "3778",
            "program_name": "Computer Science",
            "uac_code": 423600,
            "duration": 3
        });
        let meta: ProgramMeta = serde_json::from_value(json).unwrap();
        assert_eq!(meta.uac_code.as_deref(), Some("423600"));
        assert_eq!(meta.duration.as_deref(), Some("3"));
        assert_eq!(meta.display_name(), "Computer Science");
        assert_eq!(ProgramMeta::default().display_name(), "");
    }

    #[test]
    fn missing_label_falls_back_to_key() {
        let node = NodeRecord {
            key: "COMP3121".into(),
            ..NodeRecord::default()
        }
        .into_node();
        assert_eq!(node.label, "COMP3121");
        assert_eq!(node.entity_type, EntityType::Course);
    }
}
