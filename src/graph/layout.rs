//! Structured layout - constraint leveling into horizontal rows
//!
//! Prerequisite and membership edges are ordering constraints: a target sits
//! at least one row below each of its sources. Levels start from a base taken
//! from the node itself (degree = 0, course = year digit of its code) and are
//! raised by longest-path propagation over a Kahn topological walk.
//!
//! Nodes without any incident edge do not take part. They are packed into a
//! grid of their own at the bottom-left of the leveled area.
//!
//! Every node this strategy places is pinned.

use super::types::{EntityType, Node, NodeId, Snapshot};
use crate::config::StructuredLayoutConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// Size of the drawing surface the layout targets
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280.0, 800.0)
    }
}

// =============================================================================
// LEVELS
// =============================================================================

/// Year digit embedded in a course code: first digit of the first run of
/// four digits ("COMP2521" -> 2).
pub fn level_from_code(code: &str) -> Option<u8> {
    let bytes = code.as_bytes();
    bytes
        .windows(4)
        .find(|w| w.iter().all(u8::is_ascii_digit))
        .map(|w| w[0] - b'0')
}

/// Starting level of a node before constraint propagation
pub fn base_level(node: &Node, max_course_level: u8) -> u32 {
    let max = max_course_level.max(1);
    match node.entity_type {
        EntityType::Degree => 0,
        EntityType::Course => level_from_code(&node.id)
            .or(node.metadata.level)
            .map(|l| l.clamp(1, max))
            .unwrap_or(1) as u32,
        EntityType::Specialisation => node.metadata.level.map(|l| l.max(1)).unwrap_or(1) as u32,
    }
}

/// Final level per connected node, plus the isolated remainder
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelAssignment {
    pub levels: HashMap<NodeId, u32>,
    /// Sorted by id
    pub isolated: Vec<NodeId>,
}

pub fn compute_levels(snapshot: &Snapshot, config: &StructuredLayoutConfig) -> LevelAssignment {
    let connected: HashSet<&str> = snapshot.connected_ids();

    let mut isolated: Vec<NodeId> = snapshot
        .nodes
        .iter()
        .filter(|n| !connected.contains(n.id.as_str()))
        .map(|n| n.id.clone())
        .collect();
    isolated.sort();

    let base: HashMap<&str, u32> = snapshot
        .nodes
        .iter()
        .filter(|n| connected.contains(n.id.as_str()))
        .map(|n| (n.id.as_str(), base_level(n, config.max_course_level)))
        .collect();

    let mut level: HashMap<&str, u32> = base.clone();
    let mut in_degree: HashMap<&str, usize> = base.keys().map(|&id| (id, 0)).collect();
    let mut outgoing: HashMap<&str, Vec<&str>> = HashMap::new();

    for link in snapshot.links.iter().filter(|l| !l.is_self_loop()) {
        outgoing
            .entry(link.source.as_str())
            .or_default()
            .push(link.target.as_str());
        if let Some(d) = in_degree.get_mut(link.target.as_str()) {
            *d += 1;
        }
    }

    let mut roots: Vec<&str> = in_degree
        .iter()
        .filter(|(_, &d)| d == 0)
        .map(|(&id, _)| id)
        .collect();
    roots.sort_unstable();
    let mut queue: VecDeque<&str> = roots.into();

    let mut visited = 0usize;
    while let Some(u) = queue.pop_front() {
        visited += 1;
        let lu = level.get(u).copied().unwrap_or(0);
        let Some(targets) = outgoing.get(u) else {
            continue;
        };
        for &v in targets {
            let bv = base.get(v).copied().unwrap_or(0);
            if let Some(lv) = level.get_mut(v) {
                *lv = (*lv).max(lu + 1).max(bv);
            }
            if let Some(d) = in_degree.get_mut(v) {
                *d = d.saturating_sub(1);
                if *d == 0 {
                    queue.push_back(v);
                }
            }
        }
    }

    if visited < base.len() {
        tracing::warn!(
            unresolved = base.len() - visited,
            "constraint cycle detected, cycle members keep partial levels"
        );
    }

    LevelAssignment {
        levels: level
            .into_iter()
            .map(|(id, l)| (id.to_string(), l))
            .collect(),
        isolated,
    }
}

// =============================================================================
// ROW PLAN
// =============================================================================

/// Row membership before coordinates are assigned
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowPlan {
    /// (level, ordered node ids), shallowest level first
    pub rows: Vec<(u32, Vec<NodeId>)>,
    pub isolated: Vec<NodeId>,
}

impl RowPlan {
    pub fn row_of(&self, id: &str) -> Option<usize> {
        self.rows
            .iter()
            .position(|(_, ids)| ids.iter().any(|n| n == id))
    }
}

pub fn plan_rows(snapshot: &Snapshot, config: &StructuredLayoutConfig) -> RowPlan {
    let assignment = compute_levels(snapshot, config);
    let types: HashMap<&str, EntityType> = snapshot
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), n.entity_type))
        .collect();

    let mut buckets: BTreeMap<u32, Vec<NodeId>> = BTreeMap::new();
    for (id, level) in assignment.levels {
        buckets.entry(level).or_default().push(id);
    }

    let rows = buckets
        .into_iter()
        .map(|(level, mut ids)| {
            ids.sort_by(|a, b| {
                let da = types.get(a.as_str()) != Some(&EntityType::Degree);
                let db = types.get(b.as_str()) != Some(&EntityType::Degree);
                da.cmp(&db).then_with(|| a.cmp(b))
            });
            (level, ids)
        })
        .collect();

    RowPlan {
        rows,
        isolated: assignment.isolated,
    }
}

// =============================================================================
// AUTO LAYOUT
// =============================================================================

/// Horizontal step for a row of `count` nodes in `usable_width`
pub fn row_spacing(count: usize, usable_width: f32, config: &StructuredLayoutConfig) -> f32 {
    let max_fit = ((usable_width / config.node_width).floor() as usize).max(1);
    let scaling = if count > max_fit {
        count as f32 / max_fit as f32
    } else {
        1.0
    };
    (usable_width / (count as f32 + 1.0) * scaling).max(config.min_x_spacing)
}

pub fn row_gap(row_count: usize, viewport: Viewport, config: &StructuredLayoutConfig) -> f32 {
    (viewport.height / (row_count as f32 + 1.0)).max(config.min_row_gap)
}

/// Lay the snapshot out in level rows and pin every node
pub fn auto_layout(
    snapshot: &Snapshot,
    config: &StructuredLayoutConfig,
    viewport: Viewport,
) -> Snapshot {
    let plan = plan_rows(snapshot, config);
    let mut out = snapshot.clone();
    if out.nodes.is_empty() {
        return out;
    }

    let index: HashMap<String, usize> = out
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.clone(), i))
        .collect();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let jitter = config.jitter.max(0.0);
    let jittered = |rng: &mut StdRng, v: f32| {
        if jitter > 0.0 {
            v + rng.gen_range(-jitter..=jitter)
        } else {
            v
        }
    };

    let usable = (viewport.width - 2.0 * config.margin_side).max(config.min_width);
    let center_x = viewport.width / 2.0;
    let gap = row_gap(plan.rows.len(), viewport, config);

    for (row, (_, ids)) in plan.rows.iter().enumerate() {
        let y = config.margin_top + row as f32 * gap;
        let spacing = row_spacing(ids.len(), usable, config);
        let start_x = center_x - (ids.len() as f32 - 1.0) * spacing / 2.0;
        for (i, id) in ids.iter().enumerate() {
            if let Some(&n) = index.get(id) {
                let x = jittered(&mut rng, start_x + i as f32 * spacing);
                let y = jittered(&mut rng, y);
                out.nodes[n].pin_at(x, y);
            }
        }
    }

    // Bottom-left corner of the viewport, pushed down past the last row when
    // the rows reach that far
    let columns = config.isolated_columns.max(1);
    let grid_rows = plan.isolated.len().div_ceil(columns).max(1);
    let origin_x = config.margin_side;
    let corner_y = viewport.height
        - config.margin_bottom
        - (grid_rows - 1) as f32 * config.isolated_cell_height;
    let below_rows = config.margin_top + plan.rows.len() as f32 * gap;
    let origin_y = corner_y.max(below_rows);
    for (i, id) in plan.isolated.iter().enumerate() {
        if let Some(&n) = index.get(id) {
            let x = origin_x + (i % columns) as f32 * config.isolated_cell_width;
            let y = origin_y + (i / columns) as f32 * config.isolated_cell_height;
            out.nodes[n].pin_at(x, y);
        }
    }

    tracing::debug!(
        rows = plan.rows.len(),
        isolated = plan.isolated.len(),
        row_gap = gap,
        "structured layout applied"
    );
    out
}
