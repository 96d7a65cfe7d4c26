//! MindMesh Graph Widget
//!
//! Course prerequisite graph for egui: loading from a backing store, two
//! layout strategies, focus/expand/history interaction and rendering.
//! The viewer binary (`mindmesh-viewer`) is a thin eframe host around it.

pub mod api;
pub mod config;
pub mod error;
pub mod graph;

pub use api::{ApiClient, HttpBackingStore};
pub use config::MindMeshConfig;
pub use error::{ConfigError, LayoutError, LoadError};

pub use graph::{
    auto_layout,
    free_layout,
    reset_layout,
    // Data loading
    BackingStore,
    DataLoader,
    // Core graph types
    EdgeKind,
    EntityType,
    InMemoryStore,
    Link,
    LogicType,
    MindMeshWidget,
    Node,
    ProgramMeta,
    ProgramSummary,
    Scope,
    Snapshot,
    Viewport,
};
