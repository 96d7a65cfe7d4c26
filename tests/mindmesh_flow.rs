//! End-to-end flows: load a scope, lay it out, expand, navigate.

use mindmesh_graph::config::MindMeshConfig;
use mindmesh_graph::graph::interaction::{InteractionController, ViewRequest};
use mindmesh_graph::graph::layout::plan_rows;
use mindmesh_graph::graph::store::GraphStore;
use mindmesh_graph::graph::types::{EdgeRecord, NodeRecord};
use mindmesh_graph::{
    auto_layout, free_layout, reset_layout, DataLoader, InMemoryStore, LoadError, Scope, Snapshot,
    Viewport,
};
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::Arc;

fn program_store() -> InMemoryStore {
    InMemoryStore::new()
        .with_nodes([
            NodeRecord::course("COMP1511", "Programming Fundamentals").with_uoc(6),
            NodeRecord::course("COMP1521", "Computer Systems Fundamentals").with_uoc(6),
            NodeRecord::course("COMP2521", "Data Structures and Algorithms").with_uoc(6),
            NodeRecord::course("COMP3121", "Algorithm Design and Analysis").with_uoc(6),
            NodeRecord::course("ARTS1090", "Media, Society, Politics").with_uoc(6),
            NodeRecord::course("COMP6991", "Solving Modern Programming Problems with Rust"),
            NodeRecord::course("COMP4128", "Programming Challenges"),
        ])
        .with_edges([
            EdgeRecord::prereq("COMP1511", "COMP2521"),
            EdgeRecord::prereq("COMP1521", "COMP2521"),
            EdgeRecord::prereq("COMP2521", "COMP3121"),
            EdgeRecord::prereq("COMP1511", "COMP3121"),
            // Leave the program; must not survive the initial load
            EdgeRecord::prereq("COMP2521", "COMP6991"),
            EdgeRecord::prereq("COMP3121", "COMP4128"),
        ])
        .with_program(
            "3778",
            ["COMP1511", "COMP1521", "COMP2521", "COMP3121", "ARTS1090"],
        )
}

fn program_scope() -> Scope {
    Scope::NamedProgram {
        code: "3778".into(),
        courses: Vec::new(),
    }
}

fn assert_no_dangling(snapshot: &Snapshot) {
    let ids: HashSet<&str> = snapshot.nodes.iter().map(|n| n.id.as_str()).collect();
    for link in &snapshot.links {
        assert!(ids.contains(link.source.as_str()), "dangling source {}", link.source);
        assert!(ids.contains(link.target.as_str()), "dangling target {}", link.target);
    }
}

#[test]
fn program_load_levels_chain_and_isolates_elective() {
    let config = MindMeshConfig::default();
    let loader = DataLoader::new(Arc::new(program_store()));

    let load = pollster::block_on(loader.load_initial(program_scope()).unwrap()).unwrap();
    assert_eq!(load.snapshot.nodes.len(), 5);
    assert_eq!(load.snapshot.links.len(), 4);
    assert_no_dangling(&load.snapshot);

    let plan = plan_rows(&load.snapshot, &config.structured);
    assert_eq!(plan.rows.len(), 3);
    let chained: usize = plan.rows.iter().map(|(_, ids)| ids.len()).sum();
    assert_eq!(chained, 4);
    assert_eq!(plan.isolated, vec!["ARTS1090".to_string()]);
    assert_eq!(
        plan.rows[0].1,
        vec!["COMP1511".to_string(), "COMP1521".to_string()]
    );

    let laid_out = auto_layout(&load.snapshot, &config.structured, Viewport::default());
    assert!(laid_out.nodes.iter().all(|n| n.is_pinned()));
    let lone = laid_out.node("ARTS1090").unwrap();
    let deepest_row = laid_out.node("COMP3121").unwrap();
    assert!(lone.y > deepest_row.y);
}

#[test]
fn home_restores_initial_snapshot_after_any_number_of_expands() {
    let config = MindMeshConfig::default();

    for expands in [0usize, 1, 3] {
        let loader = DataLoader::new(Arc::new(program_store()));
        let load = pollster::block_on(loader.load_initial(program_scope()).unwrap()).unwrap();
        let initial = free_layout(&load.snapshot, &config.force);

        let mut store = GraphStore::new(Snapshot::empty());
        let mut controller = InteractionController::new(config.interaction.clone());
        controller.reset(&mut store, initial.clone());

        for node_id in ["COMP2521", "COMP3121", "COMP1511"].iter().take(expands) {
            let expanded = pollster::block_on(loader.expand(*node_id).unwrap())
                .unwrap()
                .expect("node has edges");
            assert_no_dangling(&expanded);
            controller.apply_expansion(&mut store, free_layout(&expanded, &config.force));
        }
        assert_eq!(controller.history().depth(), expands);

        let moved = controller.home(&mut store);
        assert_eq!(moved, expands > 0);
        assert_eq!(store.current().node_ids(), initial.node_ids());
        assert_eq!(store.current().link_keys(), initial.link_keys());
        assert!(controller.history().is_empty());
        assert!(controller.focused().is_none());
    }
}

#[test]
fn reset_layout_clears_every_pin() {
    let config = MindMeshConfig::default();
    let loader = DataLoader::new(Arc::new(program_store()));
    let load = pollster::block_on(loader.load_initial(program_scope()).unwrap()).unwrap();

    let pinned = auto_layout(&load.snapshot, &config.structured, Viewport::default());
    assert!(pinned.nodes.iter().all(|n| n.fx.is_some() && n.fy.is_some()));

    let free = reset_layout(&pinned, &config.force);
    assert!(free.nodes.iter().all(|n| n.fx.is_none() && n.fy.is_none()));
    assert!(free.nodes.iter().all(|n| n.x.is_finite() && n.y.is_finite()));
}

#[test]
fn double_click_triggers_exactly_one_expand() {
    let config = MindMeshConfig::default();
    let backend = Arc::new(program_store());
    let loader = DataLoader::new(backend.clone());
    let mut controller = InteractionController::new(config.interaction.clone());

    controller.on_node_click("COMP2521", 1_000);
    controller.on_node_click("COMP2521", 1_120);

    let expands: Vec<String> = controller
        .drain_requests()
        .into_iter()
        .filter_map(|r| match r {
            ViewRequest::Expand(id) => Some(id),
            _ => None,
        })
        .collect();
    assert_eq!(expands, vec!["COMP2521".to_string()]);
    assert!(controller.focused().is_none());

    // A second trigger while the first is pending is dropped, not queued
    let first = loader.expand(&expands[0]).unwrap();
    assert!(matches!(
        loader.expand("COMP2521"),
        Err(LoadError::Duplicate(_))
    ));
    let snapshot = pollster::block_on(first).unwrap().unwrap();
    assert!(snapshot.node("COMP6991").is_some());
    assert_eq!(backend.touching_calls(), 1);

    // Slow clicks toggle focus instead
    controller.on_node_click("COMP3121", 5_000);
    assert_eq!(controller.focused(), Some("COMP3121"));
    controller.on_node_click("COMP3121", 5_400);
    assert!(controller.focused().is_none());
    assert!(controller
        .drain_requests()
        .iter()
        .all(|r| !matches!(r, ViewRequest::Expand(_))));
}

#[test]
fn failed_expand_leaves_snapshot_untouched() {
    let config = MindMeshConfig::default();
    let backend = Arc::new(program_store());
    let loader = DataLoader::new(backend.clone());
    let load = pollster::block_on(loader.load_initial(program_scope()).unwrap()).unwrap();

    let mut store = GraphStore::new(Snapshot::empty());
    let mut controller = InteractionController::new(config.interaction);
    controller.reset(&mut store, load.snapshot.clone());

    backend.set_failing(true);
    let err = pollster::block_on(loader.expand("COMP2521").unwrap()).unwrap_err();
    assert!(err.is_recoverable());
    assert!(err.should_surface());
    assert_eq!(store.current().node_ids(), load.snapshot.node_ids());
    assert!(controller.history().is_empty());

    // The ticket was released, so a retry is accepted
    backend.set_failing(false);
    assert!(pollster::block_on(loader.expand("COMP2521").unwrap())
        .unwrap()
        .is_some());
}
