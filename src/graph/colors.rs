//! Color palettes for the MindMesh graph
//!
//! Nodes use a study-level palette with an entity-type fallback. Links use a
//! paler level palette keyed on their source node.

use egui::Color32;

use super::layout::level_from_code;
use super::types::{EntityType, Node};

// =============================================================================
// NODE COLORS
// =============================================================================

/// Level shown on a node: explicit metadata, else the year digit of a course code
pub fn display_level(node: &Node) -> Option<u32> {
    node.metadata
        .level
        .or_else(|| match node.entity_type {
            EntityType::Course => level_from_code(&node.id),
            _ => None,
        })
        .filter(|&l| l > 0)
        .map(u32::from)
}

pub fn entity_color(entity_type: EntityType) -> Color32 {
    match entity_type {
        EntityType::Degree => Color32::from_rgb(0x25, 0x63, 0xeb), // Blue
        EntityType::Specialisation => Color32::from_rgb(0x7c, 0x3a, 0xed), // Violet
        EntityType::Course => Color32::from_rgb(0x0e, 0xa5, 0xe9), // Sky
    }
}

pub fn level_color(level: u32) -> Color32 {
    match level {
        1 => Color32::from_rgb(0x2f, 0x8d, 0xdb),
        2 => Color32::from_rgb(0x25, 0x63, 0xeb),
        3 => Color32::from_rgb(0x17, 0x87, 0x56),
        _ => Color32::from_rgb(0x8a, 0x4f, 0xf7),
    }
}

/// Base fill for a node before gradient and focus adjustments
pub fn node_color(node: &Node) -> Color32 {
    display_level(node)
        .map(level_color)
        .unwrap_or_else(|| entity_color(node.entity_type))
}

// =============================================================================
// LINK COLORS
// =============================================================================

pub fn link_level_color(level: Option<u32>) -> Color32 {
    match level {
        Some(1) => Color32::from_rgb(0x70, 0xbe, 0xe9),
        Some(2) => Color32::from_rgb(0x86, 0xa7, 0xf7),
        Some(3) => Color32::from_rgb(0x6d, 0xd8, 0xa4),
        Some(l) if l >= 4 => Color32::from_rgb(0xb5, 0x8c, 0xfa),
        _ => Color32::from_rgb(0xa1, 0xa1, 0xaa), // Zinc
    }
}

/// Stroke width, thinner for deeper levels
pub fn link_width(level: Option<u32>) -> f32 {
    let level = level.unwrap_or(1).max(1) as f32;
    (2.0 - (level - 1.0) * 0.3).max(0.5)
}

pub const OR_PRIMARY: Color32 = Color32::from_rgb(0x3b, 0x82, 0xf6);

/// Distinguishes OR groups when a target has more than one
pub const OR_GROUP_PALETTE: [Color32; 4] = [
    Color32::from_rgb(0x3b, 0x82, 0xf6),
    Color32::from_rgb(0x10, 0xb9, 0x81),
    Color32::from_rgb(0x8b, 0x5c, 0xf6),
    Color32::from_rgb(0xf5, 0x9e, 0x0b),
];

pub fn or_group_color(group: &str) -> Color32 {
    let hash = group
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));
    OR_GROUP_PALETTE[(hash as usize) % OR_GROUP_PALETTE.len()]
}

pub fn faded_or_color() -> Color32 {
    Color32::from_rgba_unmultiplied(59, 130, 246, 102)
}

pub fn faded_and_color() -> Color32 {
    Color32::from_rgba_unmultiplied(148, 163, 184, 89)
}

// =============================================================================
// ADJUSTMENTS
// =============================================================================

/// Mix toward white by `percent` (0-100)
pub fn lighten(color: Color32, percent: f32) -> Color32 {
    mix(color, Color32::WHITE, percent / 100.0)
}

/// Mix toward black by `percent` (0-100)
pub fn darken(color: Color32, percent: f32) -> Color32 {
    mix(color, Color32::BLACK, percent / 100.0)
}

fn mix(from: Color32, to: Color32, t: f32) -> Color32 {
    let t = t.clamp(0.0, 1.0);
    let channel = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
    Color32::from_rgba_unmultiplied(
        channel(from.r(), to.r()),
        channel(from.g(), to.g()),
        channel(from.b(), to.b()),
        from.a(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_width_decreases_with_level() {
        assert_eq!(link_width(Some(1)), 2.0);
        assert!(link_width(Some(2)) < link_width(Some(1)));
        assert!(link_width(Some(3)) < link_width(Some(2)));
        assert_eq!(link_width(Some(8)), 0.5);
        assert_eq!(link_width(None), 2.0);
    }

    #[test]
    fn test_node_color_falls_back_to_entity() {
        let degree = Node::new("3778", "Computer Science", EntityType::Degree);
        assert_eq!(node_color(&degree), entity_color(EntityType::Degree));

        let course = Node::new("COMP3121", "Algorithms", EntityType::Course);
        assert_eq!(node_color(&course), level_color(3));
    }

    #[test]
    fn test_or_group_color_is_stable() {
        assert_eq!(or_group_color("g1"), or_group_color("g1"));
        assert!(OR_GROUP_PALETTE.contains(&or_group_color("anything")));
    }

    #[test]
    fn test_lighten_darken() {
        let c = Color32::from_rgb(100, 100, 100);
        assert!(lighten(c, 10.0).r() > c.r());
        assert!(darken(c, 10.0).r() < c.r());
        assert_eq!(lighten(c, 100.0), Color32::WHITE);
    }
}
