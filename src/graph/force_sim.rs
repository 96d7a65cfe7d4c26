//! Free force-directed layout
//!
//! Used where no hierarchy should be imposed, such as an expanded
//! neighborhood. The same `ForceSimulation` backs two uses:
//! - `free_layout`: a bounded, deterministic number of relaxation steps,
//!   returning a new snapshot (pure strategy).
//! - the live view: one step per frame while `running`, so the graph keeps
//!   settling on screen until it comes to rest or is frozen.
//!
//! Forces per step:
//! - linear attraction along each edge (undirected, deduplicated, no self-loops)
//! - pairwise repulsion scaled by the product of node masses
//! - collision push when two nodes' size circles overlap
//! - gravity toward the origin, proportional to distance
//!
//! Node size is `base_size + label_len * size_per_char` and doubles as mass,
//! so long labels behave as heavier bodies.
//!
//! # Usage
//! ```ignore
//! let laid_out = free_layout(&snapshot, &config.force);
//!
//! // Live view, each frame:
//! sim.tick();
//! store.update_positions(sim.positions());
//! ```

use super::types::Snapshot;
use crate::config::ForceLayoutConfig;
use crate::error::LayoutError;
use egui::{Pos2, Vec2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};

/// Collision push multiplier relative to ordinary repulsion
const COLLISION_FACTOR: f32 = 100.0;

/// Lower bound on heat while relaxing, so late steps still resolve overlap
const MIN_HEAT: f32 = 0.05;

pub fn node_size(label: &str, config: &ForceLayoutConfig) -> f32 {
    config.base_size + label.chars().count() as f32 * config.size_per_char
}

// =============================================================================
// SIM NODE
// =============================================================================

#[derive(Debug, Clone)]
pub struct SimNode {
    pub id: String,
    pub position: Pos2,
    /// Radius for collision and mass for force scaling
    pub size: f32,
    /// Pinned nodes exert forces but never move
    pub pinned: bool,
}

// =============================================================================
// FORCE SIMULATION
// =============================================================================

#[derive(Debug, Clone)]
pub struct ForceSimulation {
    nodes: Vec<SimNode>,
    node_index: HashMap<String, usize>,
    /// Undirected simple edges as (low, high) index pairs
    edges: Vec<(usize, usize)>,
    pub config: ForceLayoutConfig,
    /// Cleared by freeze; the live view only ticks while set
    pub running: bool,
    heat: f32,
    stabilized: bool,
    last_displacement: f32,
}

impl ForceSimulation {
    /// Build a simulation from a snapshot's nodes and links.
    ///
    /// Starting positions: pinned nodes at `fx/fy`; otherwise the snapshot's
    /// coordinates when any node has been placed before, else a seeded scatter.
    pub fn from_snapshot(snapshot: &Snapshot, config: &ForceLayoutConfig) -> Self {
        let has_prior = snapshot.nodes.iter().any(|n| n.x != 0.0 || n.y != 0.0);
        let mut rng = StdRng::seed_from_u64(config.seed);
        let scatter = config.scatter.max(1.0);

        let nodes: Vec<SimNode> = snapshot
            .nodes
            .iter()
            .map(|n| {
                let position = match (n.fx, n.fy) {
                    (Some(x), Some(y)) => Pos2::new(x, y),
                    _ if has_prior => n.position(),
                    _ => Pos2::new(rng.gen_range(0.0..scatter), rng.gen_range(0.0..scatter)),
                };
                SimNode {
                    id: n.id.clone(),
                    position,
                    size: node_size(&n.label, config),
                    pinned: n.is_pinned(),
                }
            })
            .collect();

        let node_index: HashMap<String, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();

        let mut seen = HashSet::new();
        let mut edges = Vec::new();
        for link in &snapshot.links {
            let (Some(&a), Some(&b)) = (node_index.get(&link.source), node_index.get(&link.target))
            else {
                continue;
            };
            if a == b {
                continue;
            }
            let pair = (a.min(b), a.max(b));
            if seen.insert(pair) {
                edges.push(pair);
            }
        }

        Self {
            nodes,
            node_index,
            edges,
            config: config.clone(),
            running: true,
            heat: 1.0,
            stabilized: false,
            last_displacement: f32::MAX,
        }
    }

    // =========================================================================
    // ACCESS
    // =========================================================================

    pub fn nodes(&self) -> &[SimNode] {
        &self.nodes
    }

    pub fn get_node(&self, id: &str) -> Option<&SimNode> {
        self.node_index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Current positions of unpinned nodes
    pub fn positions(&self) -> impl Iterator<Item = (&str, f32, f32)> + '_ {
        self.nodes
            .iter()
            .filter(|n| !n.pinned)
            .map(|n| (n.id.as_str(), n.position.x, n.position.y))
    }

    // =========================================================================
    // SIMULATION
    // =========================================================================

    /// One relaxation step at the given heat. Returns mean node displacement.
    ///
    /// Positions change only when every moved node lands on finite
    /// coordinates; a diverged step leaves the simulation as it was.
    pub fn step(&mut self, heat: f32, iteration: usize) -> Result<f32, LayoutError> {
        if self.nodes.is_empty() {
            return Ok(0.0);
        }
        let forces = self.calculate_forces();
        let max_step = self.config.max_step * heat;
        let slow_down = self.config.slow_down.max(0.01);

        let mut moves = Vec::with_capacity(self.nodes.len());
        for (i, (node, force)) in self.nodes.iter().zip(forces).enumerate() {
            if node.pinned {
                continue;
            }
            let mut delta = force / (slow_down * node.size.max(1.0));
            let len = delta.length();
            if len > max_step {
                delta = delta / len * max_step;
            }
            let next = node.position + delta;
            if !next.x.is_finite() || !next.y.is_finite() {
                return Err(LayoutError::Diverged(iteration));
            }
            moves.push((i, next, delta.length()));
        }

        let mut total = 0.0;
        for &(i, next, moved_by) in &moves {
            self.nodes[i].position = next;
            total += moved_by;
        }

        let mean = if moves.is_empty() { 0.0 } else { total / moves.len() as f32 };
        self.last_displacement = mean;
        Ok(mean)
    }

    /// Run `iterations` steps with linearly falling heat
    pub fn relax(&mut self, iterations: usize) -> Result<(), LayoutError> {
        for i in 0..iterations {
            let heat = (1.0 - i as f32 / iterations as f32).max(MIN_HEAT);
            self.step(heat, i)?;
        }
        Ok(())
    }

    /// Live step for the current frame. Returns true when positions moved.
    pub fn tick(&mut self) -> bool {
        if !self.running || self.stabilized || self.nodes.is_empty() {
            return false;
        }
        match self.step(self.heat, 0) {
            Ok(mean) => {
                self.heat = (self.heat * self.config.cooling).max(MIN_HEAT);
                self.stabilized = mean < self.config.rest_speed;
                true
            }
            Err(err) => {
                tracing::warn!(%err, "live simulation diverged, stopping");
                self.running = false;
                false
            }
        }
    }

    fn calculate_forces(&self) -> Vec<Vec2> {
        let n = self.nodes.len();
        let mut forces = vec![Vec2::ZERO; n];
        let kr = self.config.scaling_ratio;

        // Repulsion and collision between all pairs
        for i in 0..n {
            for j in (i + 1)..n {
                let (a, b) = (&self.nodes[i], &self.nodes[j]);
                let delta = a.position - b.position;
                let dist = delta.length();
                let dir = if dist > f32::EPSILON {
                    delta / dist
                } else {
                    Vec2::angled(i as f32 * 2.39996)
                };
                let gap = dist - a.size - b.size;
                let mass = a.size * b.size;
                let magnitude = if gap > 0.0 {
                    kr * mass / gap
                } else {
                    COLLISION_FACTOR * kr * mass / a.size.max(b.size)
                };
                forces[i] += dir * magnitude;
                forces[j] -= dir * magnitude;
            }
        }

        // Linear attraction along edges, switched off while overlapping
        for &(i, j) in &self.edges {
            let (a, b) = (&self.nodes[i], &self.nodes[j]);
            let delta = b.position - a.position;
            let dist = delta.length();
            let gap = dist - a.size - b.size;
            if gap > 0.0 && dist > f32::EPSILON {
                let pull = delta / dist * gap;
                forces[i] += pull;
                forces[j] -= pull;
            }
        }

        // Gravity toward the origin
        for (i, node) in self.nodes.iter().enumerate() {
            let to_center = Pos2::ZERO - node.position;
            forces[i] += to_center * self.config.gravity * node.size;
        }

        forces
    }

    pub fn is_stable(&self) -> bool {
        self.stabilized
    }

    pub fn last_displacement(&self) -> f32 {
        self.last_displacement
    }

    // =========================================================================
    // FREEZE / REHEAT
    // =========================================================================

    pub fn freeze(&mut self) {
        self.running = false;
    }

    pub fn unfreeze(&mut self) {
        self.running = true;
        self.reheat();
    }

    /// Restart settling from full heat
    pub fn reheat(&mut self) {
        self.heat = 1.0;
        self.stabilized = false;
    }

    /// Write positions into a snapshot, leaving pinned nodes alone
    pub fn write_back(&self, snapshot: &mut Snapshot) {
        for node in &mut snapshot.nodes {
            if node.is_pinned() {
                continue;
            }
            if let Some(sim) = self.get_node(&node.id) {
                node.x = sim.position.x;
                node.y = sim.position.y;
            }
        }
    }
}

// =============================================================================
// PURE STRATEGIES
// =============================================================================

/// Relax the snapshot for a bounded number of iterations.
///
/// Never fails: if relaxation diverges, the input comes back with its prior
/// coordinates (or a scatter when it had none).
pub fn free_layout(snapshot: &Snapshot, config: &ForceLayoutConfig) -> Snapshot {
    let mut out = snapshot.clone();
    if out.nodes.is_empty() {
        return out;
    }

    let mut sim = ForceSimulation::from_snapshot(snapshot, config);
    match sim.relax(config.iterations) {
        Ok(()) => {
            sim.write_back(&mut out);
            tracing::debug!(
                nodes = sim.len(),
                edges = sim.edge_count(),
                "free layout converged"
            );
        }
        Err(err) => {
            tracing::warn!(%err, "free layout failed, keeping prior positions");
            // A fresh simulation holds the starting positions only
            ForceSimulation::from_snapshot(snapshot, config).write_back(&mut out);
        }
    }
    out
}

/// Unpin every node and hand the snapshot to `free_layout`
pub fn reset_layout(snapshot: &Snapshot, config: &ForceLayoutConfig) -> Snapshot {
    let mut unpinned = snapshot.clone();
    unpinned.unpin_all();
    free_layout(&unpinned, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{EdgeKind, EntityType, Link, Node};

    fn cfg() -> ForceLayoutConfig {
        ForceLayoutConfig::default()
    }

    fn node(id: &str) -> Node {
        Node::new(id, id, EntityType::Course)
    }

    fn triangle() -> Snapshot {
        Snapshot::from_parts(
            vec![node("A"), node("B"), node("C"), node("D")],
            vec![
                Link::new("A", "B", EdgeKind::Prereq),
                Link::new("B", "A", EdgeKind::Prereq),
                Link::new("B", "C", EdgeKind::Prereq),
                Link::new("C", "C", EdgeKind::Prereq),
            ],
        )
    }

    #[test]
    fn test_edges_deduplicated_and_self_loops_dropped() {
        let sim = ForceSimulation::from_snapshot(&triangle(), &cfg());
        assert_eq!(sim.len(), 4);
        assert_eq!(sim.edge_count(), 2);
    }

    #[test]
    fn test_size_grows_with_label() {
        let c = cfg();
        assert_eq!(node_size("", &c), 10.0);
        assert!(node_size("Data Structures and Algorithms", &c) > node_size("Maths", &c));
    }

    #[test]
    fn test_free_layout_keeps_nodes_and_links() {
        let input = triangle();
        let out = free_layout(&input, &cfg());
        assert_eq!(out.node_ids(), input.node_ids());
        assert_eq!(out.links, input.links);
        assert!(out.nodes.iter().all(|n| n.x.is_finite() && n.y.is_finite()));
    }

    #[test]
    fn test_free_layout_is_deterministic() {
        let a = free_layout(&triangle(), &cfg());
        let b = free_layout(&triangle(), &cfg());
        assert_eq!(a, b);
    }

    #[test]
    fn test_overlapping_nodes_separate() {
        let mut a = node("A");
        let mut b = node("B");
        a.x = 100.0;
        b.x = 100.5;
        let out = free_layout(&Snapshot::from_parts(vec![a, b], vec![]), &cfg());
        let dist = (out.nodes[0].position() - out.nodes[1].position()).length();
        let min = node_size("A", &cfg()) + node_size("B", &cfg());
        assert!(dist >= min * 0.9, "dist {dist} < {min}");
    }

    #[test]
    fn test_pinned_nodes_do_not_move() {
        let mut a = node("A");
        a.pin_at(10.0, 20.0);
        let snap = Snapshot::from_parts(vec![a, node("B")], vec![Link::new("A", "B", EdgeKind::Prereq)]);
        let out = free_layout(&snap, &cfg());
        assert_eq!(out.node("A").unwrap().position(), Pos2::new(10.0, 20.0));
    }

    #[test]
    fn test_empty_snapshot() {
        assert!(free_layout(&Snapshot::empty(), &cfg()).is_empty());
    }

    #[test]
    fn test_divergence_falls_back_to_prior_positions() {
        let mut config = cfg();
        config.scaling_ratio = f32::INFINITY;
        let mut a = node("A");
        let mut b = node("B");
        a.x = 5.0;
        b.x = 500.0;
        let snap = Snapshot::from_parts(vec![a, b], vec![]);
        let out = free_layout(&snap, &config);
        assert_eq!(out.node("A").unwrap().x, 5.0);
        assert_eq!(out.node("B").unwrap().x, 500.0);
    }

    #[test]
    fn test_diverged_tick_keeps_last_positions() {
        let mut config = cfg();
        config.scaling_ratio = f32::INFINITY;
        let mut a = node("A");
        let mut b = node("B");
        a.x = 5.0;
        b.x = 500.0;
        let snap = Snapshot::from_parts(vec![a, b], vec![]);
        let mut store = crate::graph::store::GraphStore::new(snap.clone());
        let mut sim = ForceSimulation::from_snapshot(&snap, &config);

        assert!(!sim.tick());
        assert!(!sim.running);
        store.update_positions(sim.positions());

        let coords: Vec<(f32, f32)> = store.current().nodes.iter().map(|n| (n.x, n.y)).collect();
        assert_eq!(coords, vec![(5.0, 0.0), (500.0, 0.0)]);
    }

    #[test]
    fn test_reset_layout_clears_pins() {
        let mut a = node("A");
        a.pin_at(1.0, 1.0);
        let mut b = node("B");
        b.pin_at(2.0, 2.0);
        let out = reset_layout(&Snapshot::from_parts(vec![a, b], vec![]), &cfg());
        assert!(out.nodes.iter().all(|n| n.fx.is_none() && n.fy.is_none()));
    }

    #[test]
    fn test_freeze_stops_ticks() {
        let mut sim = ForceSimulation::from_snapshot(&triangle(), &cfg());
        let before: Vec<Pos2> = sim.nodes().iter().map(|n| n.position).collect();
        sim.freeze();
        for _ in 0..10 {
            sim.tick();
        }
        let after: Vec<Pos2> = sim.nodes().iter().map(|n| n.position).collect();
        assert_eq!(before, after);

        sim.unfreeze();
        sim.tick();
        let moved: Vec<Pos2> = sim.nodes().iter().map(|n| n.position).collect();
        assert_ne!(before, moved);
    }
}
