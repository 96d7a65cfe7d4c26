//! GraphStore - the single read/write point for the current snapshot

use super::types::Snapshot;

/// Holds the current snapshot.
///
/// Every change is a whole-value replacement, so readers never observe a half
/// updated node list. `generation` bumps on each change so views can tell when
/// derived state (spatial index, simulation) must be rebuilt.
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    snapshot: Snapshot,
    generation: u64,
}

impl GraphStore {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            generation: 0,
        }
    }

    pub fn current(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Swap in a new snapshot, returning the one it replaces
    pub fn replace(&mut self, snapshot: Snapshot) -> Snapshot {
        self.generation += 1;
        std::mem::replace(&mut self.snapshot, snapshot)
    }

    /// Replace the snapshot with a layout of itself
    pub fn apply(&mut self, layout: impl FnOnce(&Snapshot) -> Snapshot) {
        let next = layout(&self.snapshot);
        self.replace(next);
    }

    /// Write simulated positions back in place. Only coordinates change, so
    /// the generation is left alone.
    pub fn update_positions<'a>(&mut self, positions: impl IntoIterator<Item = (&'a str, f32, f32)>) {
        let index = self
            .snapshot
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect::<std::collections::HashMap<_, _>>();
        for (id, x, y) in positions {
            if let Some(&i) = index.get(id) {
                let node = &mut self.snapshot.nodes[i];
                if !node.is_pinned() {
                    node.x = x;
                    node.y = y;
                }
            }
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
