//! Input handling - pointer and keyboard interaction with the graph
//!
//! Clicks are hit-tested against the pick index and forwarded to the
//! `InteractionController`; drag pans and scroll zooms the camera. Keyboard
//! shortcuts come back as `KeyCommand`s because several of them (back, home)
//! need the graph store, which the widget owns.

use super::camera::Camera2D;
use super::interaction::{ClickOutcome, InteractionController};
use super::spatial::SpatialIndex;
use crate::config::ViewConfig;
use egui::{Key, Rect, Response};

// =============================================================================
// INPUT STATE
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct InputState {
    pub hovered_node: Option<String>,
    pub is_panning: bool,
}

/// Shortcut raised by the keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    Fit,
    Back,
    Home,
    ToggleFreeze,
    ClearFocus,
}

impl KeyCommand {
    pub const BINDINGS: [(Key, KeyCommand); 5] = [
        (Key::F, KeyCommand::Fit),
        (Key::Backspace, KeyCommand::Back),
        (Key::H, KeyCommand::Home),
        (Key::Space, KeyCommand::ToggleFreeze),
        (Key::Escape, KeyCommand::ClearFocus),
    ];

    pub fn for_key(key: Key) -> Option<Self> {
        Self::BINDINGS
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, cmd)| *cmd)
    }
}

#[derive(Debug, Default)]
pub struct InputOutcome {
    pub needs_repaint: bool,
    pub click: Option<ClickOutcome>,
    pub commands: Vec<KeyCommand>,
}

// =============================================================================
// INPUT HANDLER
// =============================================================================

pub struct InputHandler;

impl InputHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn handle_input(
        response: &Response,
        camera: &mut Camera2D,
        state: &mut InputState,
        spatial: &SpatialIndex,
        controller: &mut InteractionController,
        view: &ViewConfig,
        screen_rect: Rect,
        now_ms: u64,
    ) -> InputOutcome {
        let mut outcome = InputOutcome::default();
        let pointer_pos = response.hover_pos();

        state.hovered_node = pointer_pos.and_then(|pos| {
            let world = camera.screen_to_world(pos, screen_rect);
            spatial.hit_test(world).map(|r| r.id.clone())
        });

        if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos().or(pointer_pos) {
                let world = camera.screen_to_world(pos, screen_rect);
                match spatial.hit_test(world) {
                    Some(region) => {
                        outcome.click = Some(controller.on_node_click(&region.id, now_ms));
                    }
                    None => controller.on_background_click(),
                }
                outcome.needs_repaint = true;
            }
        }

        if response.dragged() {
            let delta = response.drag_delta();
            if delta.length() > 0.0 {
                camera.pan(delta);
                state.is_panning = true;
                outcome.needs_repaint = true;
            }
        } else {
            state.is_panning = false;
        }

        if response.hovered() {
            let scroll = response.ctx.input(|i| i.raw_scroll_delta);
            if scroll.y != 0.0 {
                if let Some(pos) = pointer_pos {
                    camera.zoom_at(1.0 + scroll.y * view.scroll_zoom_speed, pos, screen_rect);
                    outcome.needs_repaint = true;
                }
            }
        }

        outcome.commands = Self::handle_keyboard(response);
        outcome.needs_repaint |= !outcome.commands.is_empty();
        outcome
    }

    fn handle_keyboard(response: &Response) -> Vec<KeyCommand> {
        if response.ctx.wants_keyboard_input() {
            return Vec::new();
        }
        response.ctx.input(|i| {
            KeyCommand::BINDINGS
                .iter()
                .filter(|(key, _)| i.key_pressed(*key))
                .map(|(_, cmd)| *cmd)
                .collect()
        })
    }
}

/// Cursor icon for the current input state
pub fn cursor_for_state(state: &InputState) -> egui::CursorIcon {
    if state.is_panning {
        egui::CursorIcon::Grabbing
    } else if state.hovered_node.is_some() {
        egui::CursorIcon::PointingHand
    } else {
        egui::CursorIcon::Default
    }
}
