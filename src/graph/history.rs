//! History stack for expand navigation.
//!
//! Each expand pushes the snapshot being replaced. `back` pops one entry;
//! `home` jumps to the first-ever entry and empties the stack. Depth is bounded
//! only by how far the user navigates.

use super::types::Snapshot;

/// LIFO stack of prior snapshots.
#[derive(Debug, Clone, Default)]
pub struct HistoryStack {
    entries: Vec<Snapshot>,
}

impl HistoryStack {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Push the snapshot that is about to be replaced.
    pub fn push(&mut self, snapshot: Snapshot) {
        self.entries.push(snapshot);
    }

    /// Pop the most recent snapshot.
    pub fn pop(&mut self) -> Option<Snapshot> {
        self.entries.pop()
    }

    /// Remove every entry and return the first one.
    pub fn take_first(&mut self) -> Option<Snapshot> {
        if self.entries.is_empty() {
            return None;
        }
        self.entries.drain(..).next()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{EntityType, Node};

    fn snap(id: &str) -> Snapshot {
        Snapshot::from_parts(vec![Node::new(id, id, EntityType::Course)], vec![])
    }

    #[test]
    fn test_push_pop() {
        let mut stack = HistoryStack::new();
        stack.push(snap("A"));
        stack.push(snap("B"));

        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.pop().unwrap().nodes[0].id, "B");
        assert_eq!(stack.pop().unwrap().nodes[0].id, "A");
        assert!(stack.pop().is_none());
    }

    #[test]
    fn test_take_first_clears() {
        let mut stack = HistoryStack::new();
        stack.push(snap("A"));
        stack.push(snap("B"));
        stack.push(snap("C"));

        let first = stack.take_first().unwrap();
        assert_eq!(first.nodes[0].id, "A");
        assert!(stack.is_empty());
        assert!(stack.take_first().is_none());
    }
}
