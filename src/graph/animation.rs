//! Spring-based camera animation
//!
//! Critically damped springs so fit/zoom transitions converge without
//! overshoot. Values are polled each frame; call `tick(dt)` first.

/// Spring configuration parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringConfig {
    /// Higher responds faster. Typical: 80-300
    pub stiffness: f32,
    /// 1.0 = critically damped
    pub damping: f32,
}

impl SpringConfig {
    pub const FAST: Self = Self {
        stiffness: 300.0,
        damping: 1.0,
    };
    pub const MEDIUM: Self = Self {
        stiffness: 150.0,
        damping: 1.0,
    };
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self::MEDIUM
    }
}

// =============================================================================
// SPRING F32
// =============================================================================

#[derive(Debug, Clone)]
pub struct SpringF32 {
    current: f32,
    target: f32,
    velocity: f32,
    config: SpringConfig,
}

impl SpringF32 {
    pub fn new(initial: f32, config: SpringConfig) -> Self {
        Self {
            current: initial,
            target: initial,
            velocity: 0.0,
            config,
        }
    }

    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn get(&self) -> f32 {
        self.current
    }

    /// Jump to value with no animation
    pub fn set_immediate(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.velocity = 0.0;
    }

    /// F = -k*x - c*v, c = damping * 2 * sqrt(k)
    pub fn tick(&mut self, dt: f32) {
        let dt = dt.min(0.1);
        let displacement = self.current - self.target;
        let spring = -self.config.stiffness * displacement;
        let damping = -self.config.damping * 2.0 * self.config.stiffness.sqrt() * self.velocity;
        self.velocity += (spring + damping) * dt;
        self.current += self.velocity * dt;

        if !self.is_animating() {
            self.current = self.target;
            self.velocity = 0.0;
        }
    }

    pub fn is_animating(&self) -> bool {
        (self.current - self.target).abs() > 0.0001 || self.velocity.abs() > 0.001
    }
}

// =============================================================================
// SPRING VEC2
// =============================================================================

#[derive(Debug, Clone)]
pub struct SpringVec2 {
    x: SpringF32,
    y: SpringF32,
}

impl SpringVec2 {
    pub fn new(pos: egui::Pos2, config: SpringConfig) -> Self {
        Self {
            x: SpringF32::new(pos.x, config),
            y: SpringF32::new(pos.y, config),
        }
    }

    pub fn set_target(&mut self, pos: egui::Pos2) {
        self.x.set_target(pos.x);
        self.y.set_target(pos.y);
    }

    pub fn target(&self) -> egui::Pos2 {
        egui::Pos2::new(self.x.target(), self.y.target())
    }

    pub fn get(&self) -> egui::Pos2 {
        egui::Pos2::new(self.x.get(), self.y.get())
    }

    pub fn set_immediate(&mut self, pos: egui::Pos2) {
        self.x.set_immediate(pos.x);
        self.y.set_immediate(pos.y);
    }

    pub fn tick(&mut self, dt: f32) {
        self.x.tick(dt);
        self.y.tick(dt);
    }

    pub fn is_animating(&self) -> bool {
        self.x.is_animating() || self.y.is_animating()
    }
}
