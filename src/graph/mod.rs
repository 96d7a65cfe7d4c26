//! MindMesh prerequisite graph widget
//!
//! # Architecture
//!
//! ```text
//! BackingStore (HTTP or in-memory)
//!        │
//!        ▼
//! DataLoader ──► Snapshot ──► GraphStore ◄── layout strategies
//!                                 │            (auto_layout / free_layout)
//!                                 │
//!                                 ├──► GraphRenderer (draws to egui::Painter)
//!                                 │
//!                                 └──► SpatialIndex (pill hit-testing)
//!                                           │
//!                                           ▼
//!                       InputHandler ──► InteractionController
//!                                           │
//!                                           ▼
//!                                  ViewRequest (expand, fit, ...)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let backend = Arc::new(InMemoryStore::demo());
//! let mut widget = MindMeshWidget::new(scope, backend, MindMeshConfig::embedded())?;
//! widget.set_on_node_focused(|node| println!("details for {}", node.id));
//! // each frame:
//! widget.ui(ui);
//! if let Some(err) = widget.take_error() { /* toast */ }
//! ```

pub mod animation;
pub mod anchor;
pub mod camera;
pub mod colors;
pub mod force_sim;
pub mod history;
pub mod input;
pub mod interaction;
pub mod layout;
pub mod loader;
pub mod memory;
pub mod render;
pub mod spatial;
pub mod store;
pub mod summary;
pub mod tasks;
pub mod types;

pub use anchor::FocusAnchor;
pub use camera::Camera2D;
pub use force_sim::{free_layout, reset_layout, ForceSimulation};
pub use input::{InputHandler, InputState, KeyCommand};
pub use interaction::{ClickOutcome, InteractionController, ViewRequest};
pub use layout::{auto_layout, Viewport};
pub use loader::{BackingStore, DataLoader, InitialLoad, RequestKey, ResolvedScope, Scope};
pub use memory::InMemoryStore;
pub use render::GraphRenderer;
pub use spatial::SpatialIndex;
pub use store::GraphStore;
pub use summary::{LevelBucket, ProgramSummary};
pub use types::*;

use crate::config::MindMeshConfig;
use crate::error::LoadError;
use egui::{Color32, Rect, Sense, Vec2};
use std::sync::Arc;
use std::time::Duration;
use tasks::{load_runtime, spawn_load, PendingSlot};

/// Gap between the focused pill and the anchored action button
const ANCHOR_OFFSET: f32 = 8.0;

type FocusCallback = Box<dyn FnMut(&Node)>;

// =============================================================================
// GRAPH WIDGET
// =============================================================================

pub struct MindMeshWidget {
    config: MindMeshConfig,
    scope: Scope,
    store: GraphStore,
    controller: InteractionController,
    loader: DataLoader,
    /// Live simulation over the current snapshot
    sim: Option<ForceSimulation>,
    spatial: SpatialIndex,
    spatial_dirty: bool,
    camera: Camera2D,
    input_state: InputState,
    renderer: GraphRenderer,
    anchor: FocusAnchor,
    /// Shared by every background load of this widget
    runtime: Arc<tokio::runtime::Runtime>,
    pending_initial: PendingSlot<InitialLoad>,
    pending_expands: Vec<(NodeId, PendingSlot<Option<Snapshot>>)>,
    needs_load: bool,
    needs_fit: bool,
    /// Snap the camera instead of animating on the next fit
    snap_fit: bool,
    last_screen_rect: Option<Rect>,
    program_courses: Vec<String>,
    program_meta: Option<ProgramMeta>,
    last_error: Option<LoadError>,
    on_node_focused: Option<FocusCallback>,
}

impl MindMeshWidget {
    /// The initial load starts on the first frame. Fails only when the load
    /// runtime cannot be started.
    pub fn new(
        scope: Scope,
        backend: Arc<dyn BackingStore>,
        config: MindMeshConfig,
    ) -> std::io::Result<Self> {
        Ok(Self::with_runtime(scope, backend, config, load_runtime()?))
    }

    /// Run background loads on a runtime owned by the host
    pub fn with_runtime(
        scope: Scope,
        backend: Arc<dyn BackingStore>,
        config: MindMeshConfig,
        runtime: Arc<tokio::runtime::Runtime>,
    ) -> Self {
        let program_courses = match &scope {
            Scope::NamedProgram { courses, .. } => courses.clone(),
            Scope::UserItemSet { .. } => Vec::new(),
        };
        Self {
            controller: InteractionController::new(config.interaction.clone()),
            camera: Camera2D::new(config.view.min_zoom, config.view.max_zoom),
            renderer: GraphRenderer::new(config.render.clone()),
            anchor: FocusAnchor::new(config.interaction.anchor_interval_ms),
            loader: DataLoader::new(backend),
            store: GraphStore::default(),
            sim: None,
            spatial: SpatialIndex::new(),
            spatial_dirty: true,
            input_state: InputState::default(),
            runtime,
            pending_initial: PendingSlot::new(),
            pending_expands: Vec::new(),
            needs_load: true,
            needs_fit: false,
            snap_fit: true,
            last_screen_rect: None,
            program_courses,
            program_meta: None,
            last_error: None,
            on_node_focused: None,
            scope,
            config,
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn snapshot(&self) -> &Snapshot {
        self.store.current()
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn focused_node(&self) -> Option<&str> {
        self.controller.focused()
    }

    pub fn history_depth(&self) -> usize {
        self.controller.history().depth()
    }

    pub fn is_loading(&self) -> bool {
        self.pending_initial.is_in_progress() || !self.pending_expands.is_empty()
    }

    pub fn is_frozen(&self) -> bool {
        self.sim.as_ref().map_or(true, |sim| !sim.running)
    }

    /// Last surfaced load failure, for a host toast
    pub fn take_error(&mut self) -> Option<LoadError> {
        self.last_error.take()
    }

    /// Coverage of a named program; `None` for a user item set
    pub fn summary(&self) -> Option<ProgramSummary> {
        match self.scope {
            Scope::NamedProgram { .. } => Some(
                ProgramSummary::compute(&self.program_courses, self.store.current())
                    .with_program(self.program_meta.clone()),
            ),
            Scope::UserItemSet { .. } => None,
        }
    }

    /// Called with the focused node when its "View details" action is used
    pub fn set_on_node_focused(&mut self, callback: impl FnMut(&Node) + 'static) {
        self.on_node_focused = Some(Box::new(callback));
    }

    // =========================================================================
    // COMMANDS
    // =========================================================================

    /// Load the scope again on the next frame
    pub fn reload(&mut self) {
        self.needs_load = true;
    }

    pub fn back(&mut self) -> bool {
        self.controller.back(&mut self.store)
    }

    pub fn home(&mut self) -> bool {
        self.controller.home(&mut self.store)
    }

    pub fn fit(&mut self) {
        self.controller.fit();
    }

    pub fn freeze(&mut self) {
        self.controller.freeze();
    }

    pub fn unfreeze(&mut self) {
        self.controller.unfreeze();
    }

    pub fn toggle_freeze(&mut self) {
        if self.is_frozen() {
            self.unfreeze();
        } else {
            self.freeze();
        }
    }

    pub fn clear_focus(&mut self) {
        self.controller.on_background_click();
    }

    /// Level rows sized to the last drawn area; leaves the simulation frozen
    pub fn auto_layout(&mut self) {
        let viewport = self
            .last_screen_rect
            .map(|r| Viewport::new(r.width(), r.height()))
            .unwrap_or_default();
        let config = &self.config.structured;
        self.store.apply(|s| auto_layout(s, config, viewport));
        self.rebuild_view();
        if let Some(sim) = self.sim.as_mut() {
            sim.freeze();
        }
        self.needs_fit = true;
        tracing::info!(nodes = self.store.current().nodes.len(), "auto layout");
    }

    /// Unpin everything and relax from the current positions
    pub fn reset_layout(&mut self) {
        let config = &self.config.force;
        self.store.apply(|s| reset_layout(s, config));
        self.rebuild_view();
        if let Some(sim) = self.sim.as_mut() {
            sim.unfreeze();
        }
        self.needs_fit = true;
        tracing::info!(nodes = self.store.current().nodes.len(), "layout reset");
    }

    /// Load the neighborhood of `node_id`, as a double click would
    pub fn expand(&mut self, node_id: &str, ctx: &egui::Context) {
        match self.loader.expand(node_id) {
            Ok(future) => {
                let slot = PendingSlot::new();
                let ctx = ctx.clone();
                spawn_load(self.runtime.handle(), &slot, future, move || ctx.request_repaint());
                self.pending_expands.push((node_id.to_string(), slot));
                tracing::debug!(node_id, "expand started");
            }
            Err(err) => self.report(err),
        }
    }

    // =========================================================================
    // FRAME
    // =========================================================================

    pub fn ui(&mut self, ui: &mut egui::Ui) {
        let ctx = ui.ctx().clone();
        let now_ms = ui.input(|i| (i.time * 1000.0) as u64);

        if self.needs_load {
            self.needs_load = false;
            self.start_initial_load(&ctx);
        }
        self.poll_tasks();

        let (response, painter) = ui.allocate_painter(ui.available_size(), Sense::click_and_drag());
        let screen_rect = response.rect;
        self.last_screen_rect = Some(screen_rect);

        let dt = ui.input(|i| i.stable_dt);
        self.camera.update(dt);

        let outcome = InputHandler::handle_input(
            &response,
            &mut self.camera,
            &mut self.input_state,
            &self.spatial,
            &mut self.controller,
            &self.config.view,
            screen_rect,
            now_ms,
        );
        for command in outcome.commands {
            self.run_key_command(command);
        }
        self.process_requests(&ctx);

        if let Some(sim) = self.sim.as_mut() {
            if sim.running && !sim.is_stable() && sim.tick() {
                self.store.update_positions(sim.positions());
                self.spatial_dirty = true;
            }
        }
        if self.spatial_dirty {
            self.spatial
                .rebuild(render::pick_regions(self.store.current(), &self.renderer.config));
            self.spatial_dirty = false;
        }

        if self.needs_fit {
            self.apply_fit(screen_rect);
        }

        ctx.set_cursor_icon(input::cursor_for_state(&self.input_state));

        if self.store.current().is_empty() {
            self.render_empty_state(&painter, screen_rect);
        } else {
            self.renderer.render(
                &painter,
                self.store.current(),
                &self.camera,
                screen_rect,
                self.controller.focused(),
            );
            self.render_chrome(&painter, screen_rect);
        }

        self.render_anchor(&ctx, screen_rect, now_ms);

        let simulating = self
            .sim
            .as_ref()
            .is_some_and(|sim| sim.running && !sim.is_stable());
        if outcome.needs_repaint || simulating || self.camera.is_animating() {
            ctx.request_repaint();
        } else if let Some(wait) = self.anchor.next_due_in(now_ms) {
            ctx.request_repaint_after(Duration::from_millis(wait.max(1)));
        }
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn start_initial_load(&mut self, ctx: &egui::Context) {
        match self.loader.load_initial(self.scope.clone()) {
            Ok(future) => {
                let ctx = ctx.clone();
                spawn_load(
                    self.runtime.handle(),
                    &self.pending_initial,
                    future,
                    move || ctx.request_repaint(),
                );
                tracing::info!(scope = %self.scope, "initial load started");
            }
            Err(err) => self.report(err),
        }
    }

    fn poll_tasks(&mut self) {
        if let Some(result) = self.pending_initial.poll() {
            match result {
                Ok(load) => self.apply_initial(load),
                Err(err) => self.report(err),
            }
        }

        let mut finished = Vec::new();
        self.pending_expands.retain(|(id, slot)| match slot.poll() {
            Some(result) => {
                finished.push((id.clone(), result));
                false
            }
            None => true,
        });

        for (node_id, result) in finished {
            match result {
                Ok(Some(snapshot)) => {
                    let laid_out = free_layout(&snapshot, &self.config.force);
                    tracing::info!(
                        node_id = %node_id,
                        nodes = laid_out.nodes.len(),
                        links = laid_out.links.len(),
                        "expanded"
                    );
                    self.controller.apply_expansion(&mut self.store, laid_out);
                }
                Ok(None) => tracing::info!(node_id = %node_id, "no edges to expand"),
                Err(err) => self.report(err),
            }
        }
    }

    fn apply_initial(&mut self, load: InitialLoad) {
        if let Scope::NamedProgram { courses, .. } = &self.scope {
            self.program_courses = if courses.is_empty() {
                load.scope_keys
            } else {
                courses.clone()
            };
        }
        self.program_meta = load.program;
        let laid_out = free_layout(&load.snapshot, &self.config.force);
        tracing::info!(
            nodes = laid_out.nodes.len(),
            links = laid_out.links.len(),
            "initial snapshot ready"
        );
        self.controller.reset(&mut self.store, laid_out);
        self.snap_fit = true;
    }

    fn process_requests(&mut self, ctx: &egui::Context) {
        for request in self.controller.drain_requests() {
            match request {
                ViewRequest::Expand(node_id) => self.expand(&node_id, ctx),
                ViewRequest::Fit => self.needs_fit = true,
                ViewRequest::Rebuild => self.rebuild_view(),
                ViewRequest::Freeze => {
                    if let Some(sim) = self.sim.as_mut() {
                        sim.freeze();
                    }
                }
                ViewRequest::Unfreeze => {
                    if let Some(sim) = self.sim.as_mut() {
                        sim.unfreeze();
                    }
                }
            }
        }
    }

    fn run_key_command(&mut self, command: KeyCommand) {
        match command {
            KeyCommand::Fit => self.fit(),
            KeyCommand::Back => {
                self.back();
            }
            KeyCommand::Home => {
                self.home();
            }
            KeyCommand::ToggleFreeze => self.toggle_freeze(),
            KeyCommand::ClearFocus => self.clear_focus(),
        }
    }

    /// Derived state after the snapshot was replaced
    fn rebuild_view(&mut self) {
        let snapshot = self.store.current();
        self.sim = (!snapshot.is_empty())
            .then(|| ForceSimulation::from_snapshot(snapshot, &self.config.force));
        self.controller.retain_focus(snapshot);
        self.spatial_dirty = true;
    }

    fn apply_fit(&mut self, screen_rect: Rect) {
        let config = &self.renderer.config;
        let bounds = self
            .store
            .current()
            .nodes
            .iter()
            .map(|n| render::pill_rect(n, config))
            .reduce(|a, b| a.union(b));
        let Some(bounds) = bounds else {
            return;
        };
        self.camera
            .fit_to_bounds(bounds, screen_rect, self.config.view.fit_padding);
        if self.snap_fit {
            self.camera.snap_to_target();
            self.snap_fit = false;
        }
        self.needs_fit = false;
    }

    fn report(&mut self, err: LoadError) {
        if err.should_surface() {
            tracing::warn!(error = %err, "load failed, keeping current snapshot");
            self.last_error = Some(err);
        } else {
            tracing::debug!(error = %err, "load request dropped");
        }
    }

    /// "View details" button pinned under the focused pill
    fn render_anchor(&mut self, ctx: &egui::Context, screen_rect: Rect, now_ms: u64) {
        let store = &self.store;
        let camera = &self.camera;
        let config = &self.renderer.config;
        self.anchor.poll(now_ms, self.controller.focused(), |id| {
            let node = store.current().node(id)?;
            let rect = camera.world_rect_to_screen(render::pill_rect(node, config), screen_rect);
            Some(rect.center_bottom() + Vec2::new(0.0, ANCHOR_OFFSET))
        });

        let (Some(pos), Some(id)) = (self.anchor.position(), self.anchor.node_id()) else {
            return;
        };
        if !screen_rect.contains(pos) {
            return;
        }

        let mut clicked = false;
        egui::Area::new(egui::Id::new("mindmesh_focus_anchor"))
            .fixed_pos(pos)
            .pivot(egui::Align2::CENTER_TOP)
            .order(egui::Order::Foreground)
            .show(ctx, |ui| {
                clicked = ui.button("View details").clicked();
            });

        if clicked {
            if let (Some(node), Some(callback)) =
                (self.store.current().node(id), self.on_node_focused.as_mut())
            {
                tracing::debug!(node_id = %node.id, "view details");
                callback(node);
            }
        }
    }

    fn render_empty_state(&self, painter: &egui::Painter, screen_rect: Rect) {
        let text = if self.is_loading() {
            "Loading graph..."
        } else {
            "Nothing to show for this scope"
        };
        painter.text(
            screen_rect.center(),
            egui::Align2::CENTER_CENTER,
            text,
            egui::FontId::proportional(14.0),
            Color32::from_rgb(150, 150, 150),
        );
    }

    fn render_chrome(&self, painter: &egui::Painter, screen_rect: Rect) {
        let snapshot = self.store.current();
        let stats_text = format!(
            "{} nodes | {} links | depth {}",
            snapshot.nodes.len(),
            snapshot.links.len(),
            self.controller.history().depth()
        );
        painter.text(
            screen_rect.left_top() + Vec2::new(10.0, 20.0),
            egui::Align2::LEFT_TOP,
            stats_text,
            egui::FontId::proportional(12.0),
            Color32::from_rgb(150, 150, 150),
        );

        let zoom_text = format!("Zoom: {:.0}%", self.camera.zoom() * 100.0);
        painter.text(
            screen_rect.left_bottom() + Vec2::new(10.0, -30.0),
            egui::Align2::LEFT_BOTTOM,
            zoom_text,
            egui::FontId::proportional(11.0),
            Color32::from_rgb(120, 120, 120),
        );

        let hints = "Drag: Pan | Scroll: Zoom | Click: Focus | Double-click: Expand | F: Fit | Backspace: Back | H: Home | Space: Freeze";
        painter.text(
            screen_rect.left_bottom() + Vec2::new(10.0, -10.0),
            egui::Align2::LEFT_BOTTOM,
            hints,
            egui::FontId::proportional(10.0),
            Color32::from_rgb(100, 100, 100),
        );

        if let Some(node) = self.controller.focused().and_then(|id| snapshot.node(id)) {
            painter.text(
                screen_rect.right_top() + Vec2::new(-10.0, 20.0),
                egui::Align2::RIGHT_TOP,
                format!("Focus: {} ({})", node.label, node.id),
                egui::FontId::proportional(12.0),
                Color32::from_rgb(96, 165, 250),
            );
        }
    }
}

impl Drop for MindMeshWidget {
    fn drop(&mut self) {
        if let Some(sim) = self.sim.as_mut() {
            sim.freeze();
        }
        self.anchor.stop();
    }
}
