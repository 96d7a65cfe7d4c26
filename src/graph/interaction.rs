//! InteractionController - focus, double-click expand and history navigation
//!
//! One controller per graph view. It owns the focus state, the click tracker
//! and the history stack, and never talks to the network: an expand comes out
//! of `on_node_click` as a request, and the loaded snapshot goes back in
//! through `apply_expansion`.
//!
//! Timestamps are caller-supplied milliseconds so the click window can be
//! exercised deterministically.

use super::history::HistoryStack;
use super::store::GraphStore;
use super::types::{NodeId, Snapshot};
use crate::config::InteractionConfig;

// =============================================================================
// REQUESTS
// =============================================================================

/// Work the controller asks the view to carry out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewRequest {
    /// Load the neighborhood of a node
    Expand(NodeId),
    /// Frame all current nodes
    Fit,
    /// Pause the live simulation
    Freeze,
    /// Resume the live simulation from full heat
    Unfreeze,
    /// Derived view state (simulation, hit index) must be rebuilt
    Rebuild,
}

/// What a node click turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    Expand(NodeId),
    Focused(NodeId),
    Unfocused,
}

// =============================================================================
// CLICK TRACKER
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
struct LastClick {
    id: NodeId,
    at_ms: u64,
}

/// Detects a second click on the same node inside the window
#[derive(Debug, Clone, Default)]
pub struct ClickTracker {
    last: Option<LastClick>,
}

impl ClickTracker {
    /// Record a click. Returns true when it completes a double click.
    pub fn register(&mut self, id: &str, now_ms: u64, window_ms: u64) -> bool {
        let is_double = self
            .last
            .as_ref()
            .is_some_and(|last| last.id == id && now_ms.saturating_sub(last.at_ms) < window_ms);
        if is_double {
            self.last = None;
        } else {
            self.last = Some(LastClick {
                id: id.to_string(),
                at_ms: now_ms,
            });
        }
        is_double
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

// =============================================================================
// CONTROLLER
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct InteractionController {
    config: InteractionConfig,
    focused: Option<NodeId>,
    clicks: ClickTracker,
    history: HistoryStack,
    requests: Vec<ViewRequest>,
}

impl InteractionController {
    pub fn new(config: InteractionConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn focused(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    /// Take queued requests in the order they were raised
    pub fn drain_requests(&mut self) -> Vec<ViewRequest> {
        std::mem::take(&mut self.requests)
    }

    // =========================================================================
    // POINTER
    // =========================================================================

    pub fn on_node_click(&mut self, id: &str, now_ms: u64) -> ClickOutcome {
        if self.clicks.register(id, now_ms, self.config.double_click_ms) {
            self.focused = None;
            self.clicks.reset();
            self.requests.push(ViewRequest::Expand(id.to_string()));
            tracing::debug!(node_id = id, "double click, expanding");
            return ClickOutcome::Expand(id.to_string());
        }

        if self.focused.as_deref() == Some(id) {
            self.focused = None;
            ClickOutcome::Unfocused
        } else {
            self.focused = Some(id.to_string());
            ClickOutcome::Focused(id.to_string())
        }
    }

    pub fn on_background_click(&mut self) {
        self.focused = None;
    }

    /// Drop focus if the node is not in the snapshot any more
    pub fn retain_focus(&mut self, snapshot: &Snapshot) {
        if let Some(id) = &self.focused {
            if snapshot.node(id).is_none() {
                self.focused = None;
            }
        }
    }

    // =========================================================================
    // HISTORY
    // =========================================================================

    /// Install an expanded snapshot, remembering the one it replaces
    pub fn apply_expansion(&mut self, store: &mut GraphStore, snapshot: Snapshot) {
        let previous = store.replace(snapshot);
        self.history.push(previous);
        self.focused = None;
        self.clicks.reset();
        self.requests
            .extend([ViewRequest::Rebuild, ViewRequest::Unfreeze, ViewRequest::Fit]);
    }

    /// Step back one expansion. Returns false when there is nothing to go back to.
    pub fn back(&mut self, store: &mut GraphStore) -> bool {
        let Some(mut previous) = self.history.pop() else {
            return false;
        };
        previous.unpin_all();
        store.replace(previous);
        self.focused = None;
        self.clicks.reset();
        self.requests
            .extend([ViewRequest::Rebuild, ViewRequest::Unfreeze, ViewRequest::Fit]);
        tracing::info!(depth = self.history.depth(), "navigated back");
        true
    }

    /// Return to the initial snapshot and forget all history
    pub fn home(&mut self, store: &mut GraphStore) -> bool {
        let Some(first) = self.history.take_first() else {
            return false;
        };
        store.replace(first);
        self.focused = None;
        self.clicks.reset();
        self.requests
            .extend([ViewRequest::Rebuild, ViewRequest::Unfreeze, ViewRequest::Fit]);
        tracing::info!("navigated home");
        true
    }

    /// Start over from a freshly loaded snapshot
    pub fn reset(&mut self, store: &mut GraphStore, snapshot: Snapshot) {
        store.replace(snapshot);
        self.history.clear();
        self.focused = None;
        self.clicks.reset();
        self.requests.extend([ViewRequest::Rebuild, ViewRequest::Fit]);
    }

    // =========================================================================
    // VIEW COMMANDS
    // =========================================================================

    pub fn fit(&mut self) {
        self.requests.push(ViewRequest::Fit);
    }

    pub fn freeze(&mut self) {
        self.requests.push(ViewRequest::Freeze);
    }

    pub fn unfreeze(&mut self) {
        self.requests.push(ViewRequest::Unfreeze);
    }
}
