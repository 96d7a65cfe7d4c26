//! Camera2D - pan/zoom with spring interpolation
//!
//! World-to-screen and screen-to-world transforms for the graph canvas.
//! Call `update(dt)` at the start of a frame, then use the transforms.

use super::animation::{SpringConfig, SpringF32, SpringVec2};
use egui::{Pos2, Rect, Vec2};

#[derive(Debug, Clone)]
pub struct Camera2D {
    /// Center of the view in world coordinates
    position: SpringVec2,
    /// 1.0 = 100%
    zoom: SpringF32,
    pub min_zoom: f32,
    pub max_zoom: f32,
}

impl Default for Camera2D {
    fn default() -> Self {
        Self::new(0.1, 5.0)
    }
}

impl Camera2D {
    pub fn new(min_zoom: f32, max_zoom: f32) -> Self {
        Self {
            position: SpringVec2::new(Pos2::ZERO, SpringConfig::MEDIUM),
            zoom: SpringF32::new(1.0, SpringConfig::FAST),
            min_zoom,
            max_zoom,
        }
    }

    pub fn center(&self) -> Pos2 {
        self.position.get()
    }

    pub fn zoom(&self) -> f32 {
        self.zoom.get()
    }

    pub fn update(&mut self, dt: f32) {
        self.position.tick(dt);
        self.zoom.tick(dt);
    }

    pub fn is_animating(&self) -> bool {
        self.position.is_animating() || self.zoom.is_animating()
    }

    // =========================================================================
    // CONTROLS
    // =========================================================================

    /// Pan by a screen-space delta (drag)
    pub fn pan(&mut self, screen_delta: Vec2) {
        let world_delta = screen_delta / self.zoom.get();
        let target = self.position.target() - world_delta;
        // Dragging tracks the pointer without spring lag
        self.position.set_immediate(target);
    }

    /// Zoom by factor, keeping `screen_pos` fixed in view
    pub fn zoom_at(&mut self, factor: f32, screen_pos: Pos2, screen_rect: Rect) {
        let old_zoom = self.zoom.target();
        let new_zoom = (old_zoom * factor).clamp(self.min_zoom, self.max_zoom);
        if (new_zoom - old_zoom).abs() <= 0.001 {
            return;
        }

        let offset = screen_pos - screen_rect.center();
        let shift = offset / old_zoom - offset / new_zoom;
        self.position.set_target(self.position.target() + shift);
        self.zoom.set_target(new_zoom);
    }

    /// Animate to frame `bounds` inside `screen_rect` with `padding` on each side
    pub fn fit_to_bounds(&mut self, bounds: Rect, screen_rect: Rect, padding: f32) {
        if bounds.is_negative() || screen_rect.width() < 1.0 || screen_rect.height() < 1.0 {
            return;
        }

        self.position.set_target(bounds.center());

        let avail = (screen_rect.size() - Vec2::splat(padding * 2.0)).max(Vec2::splat(1.0));
        let zoom_x = avail.x / bounds.width().max(1.0);
        let zoom_y = avail.y / bounds.height().max(1.0);
        self.zoom
            .set_target(zoom_x.min(zoom_y).clamp(self.min_zoom, self.max_zoom));
    }

    /// Jump to the animation target
    pub fn snap_to_target(&mut self) {
        self.position.set_immediate(self.position.target());
        self.zoom.set_immediate(self.zoom.target());
    }

    // =========================================================================
    // TRANSFORMS
    // =========================================================================

    pub fn world_to_screen(&self, world_pos: Pos2, screen_rect: Rect) -> Pos2 {
        screen_rect.center() + (world_pos - self.center()) * self.zoom()
    }

    pub fn screen_to_world(&self, screen_pos: Pos2, screen_rect: Rect) -> Pos2 {
        self.center() + (screen_pos - screen_rect.center()) / self.zoom()
    }

    pub fn world_rect_to_screen(&self, world: Rect, screen_rect: Rect) -> Rect {
        Rect::from_min_max(
            self.world_to_screen(world.min, screen_rect),
            self.world_to_screen(world.max, screen_rect),
        )
    }

    pub fn visible_bounds(&self, screen_rect: Rect) -> Rect {
        Rect::from_center_size(self.center(), screen_rect.size() / self.zoom())
    }
}
