//! Program coverage summary
//!
//! For a named program: which of its courses made it into the current
//! snapshot and which are missing, bucketed by year level.

use super::layout::level_from_code;
use super::types::{ProgramMeta, Snapshot};
use serde::Serialize;
use std::collections::BTreeMap;

/// Year bucket of a course code. Levels 4-6 share one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum LevelBucket {
    One,
    Two,
    Three,
    Advanced,
    Other,
}

impl LevelBucket {
    pub fn of_code(code: &str) -> Self {
        match level_from_code(code) {
            Some(1) => Self::One,
            Some(2) => Self::Two,
            Some(3) => Self::Three,
            Some(4..=6) => Self::Advanced,
            _ => Self::Other,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::One => "Level 1",
            Self::Two => "Level 2",
            Self::Three => "Level 3",
            Self::Advanced => "Level 4+",
            Self::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgramSummary {
    /// Degree row, when the store has one
    pub program: Option<ProgramMeta>,
    pub loaded: BTreeMap<LevelBucket, Vec<String>>,
    pub missing: BTreeMap<LevelBucket, Vec<String>>,
    pub node_count: usize,
    pub edge_count: usize,
}

impl ProgramSummary {
    /// Summarize `snapshot` against the program's course list
    pub fn compute(program_courses: &[String], snapshot: &Snapshot) -> Self {
        let mut summary = Self {
            node_count: snapshot.nodes.len(),
            edge_count: snapshot.links.len(),
            ..Self::default()
        };

        let mut seen = std::collections::HashSet::new();
        for code in program_courses {
            if !seen.insert(code.as_str()) {
                continue;
            }
            let target = if snapshot.node(code).is_some() {
                &mut summary.loaded
            } else {
                &mut summary.missing
            };
            target
                .entry(LevelBucket::of_code(code))
                .or_default()
                .push(code.clone());
        }
        summary
    }

    pub fn with_program(mut self, program: Option<ProgramMeta>) -> Self {
        self.program = program;
        self
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded.values().map(Vec::len).sum()
    }

    pub fn missing_count(&self) -> usize {
        self.missing.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{EntityType, Node};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_level_buckets() {
        assert_eq!(LevelBucket::of_code("COMP1511"), LevelBucket::One);
        assert_eq!(LevelBucket::of_code("COMP3121"), LevelBucket::Three);
        assert_eq!(LevelBucket::of_code("COMP4920"), LevelBucket::Advanced);
        assert_eq!(LevelBucket::of_code("COMP6991"), LevelBucket::Advanced);
        assert_eq!(LevelBucket::of_code("COMP9021"), LevelBucket::Other);
        assert_eq!(LevelBucket::of_code("ELECTIVE"), LevelBucket::Other);
    }

    #[test]
    fn test_loaded_and_missing_by_level() {
        let snapshot = Snapshot::from_parts(
            vec![
                Node::new("COMP1511", "Programming Fundamentals", EntityType::Course),
                Node::new("COMP2521", "Data Structures", EntityType::Course),
            ],
            vec![],
        );
        let courses: Vec<String> = ["COMP1511", "COMP2521", "COMP6991", "COMP1511"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let summary = ProgramSummary::compute(&courses, &snapshot);

        assert_eq!(summary.loaded_count(), 2);
        assert_eq!(summary.missing_count(), 1);
        assert_eq!(summary.loaded[&LevelBucket::One], vec!["COMP1511".to_string()]);
        assert_eq!(summary.missing[&LevelBucket::Advanced], vec!["COMP6991".to_string()]);
        assert_eq!(summary.node_count, 2);
        assert_eq!(summary.edge_count, 0);
    }
}
