//! Focus anchor - screen position of the focused node, sampled on a timer
//!
//! Focus-anchored UI (the "View details" action) follows the node through
//! pans, zooms and simulation movement. The projection is recomputed at a
//! fixed interval rather than every frame.

use egui::Pos2;

#[derive(Debug, Clone)]
pub struct FocusAnchor {
    interval_ms: u64,
    last_sample_ms: Option<u64>,
    node_id: Option<String>,
    screen_pos: Option<Pos2>,
}

impl FocusAnchor {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms: interval_ms.max(1),
            last_sample_ms: None,
            node_id: None,
            screen_pos: None,
        }
    }

    /// Resample if the interval elapsed or the focused node changed.
    ///
    /// Returns true when a new sample was taken. With no focus the anchor is
    /// cleared and the timer stops.
    pub fn poll(
        &mut self,
        now_ms: u64,
        focused: Option<&str>,
        project: impl FnOnce(&str) -> Option<Pos2>,
    ) -> bool {
        let Some(id) = focused else {
            self.stop();
            return false;
        };

        let changed = self.node_id.as_deref() != Some(id);
        let due = self
            .last_sample_ms
            .map_or(true, |t| now_ms.saturating_sub(t) >= self.interval_ms);
        if !changed && !due {
            return false;
        }

        self.node_id = Some(id.to_string());
        self.screen_pos = project(id);
        self.last_sample_ms = Some(now_ms);
        true
    }

    pub fn position(&self) -> Option<Pos2> {
        self.screen_pos
    }

    /// Node the current sample belongs to
    pub fn node_id(&self) -> Option<&str> {
        self.node_id.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.node_id.is_some()
    }

    /// Milliseconds until the next sample is due
    pub fn next_due_in(&self, now_ms: u64) -> Option<u64> {
        let last = self.last_sample_ms?;
        Some(self.interval_ms.saturating_sub(now_ms.saturating_sub(last)))
    }

    pub fn stop(&mut self) {
        self.last_sample_ms = None;
        self.node_id = None;
        self.screen_pos = None;
    }
}
