//! Rendering - draws links and node pills using egui::Painter
//!
//! Visual state (colors, opacity, shadow strength, dash pattern) is computed in
//! world space by `node_visuals` / `link_visuals`, independent of the painter,
//! then transformed by the camera at draw time. `pill_rect` is the single
//! source of node geometry: drawing and the pick index both use it.

use super::camera::Camera2D;
use super::colors::{
    darken, display_level, faded_and_color, faded_or_color, lighten, link_level_color, link_width,
    node_color, or_group_color, OR_PRIMARY,
};
use super::spatial::PickRegion;
use super::types::{Node, Snapshot};
use crate::config::RenderConfig;
use egui::epaint::{Mesh, Shadow};
use egui::{Align2, Color32, FontId, Pos2, Rect, Rounding, Shape, Stroke, Vec2};
use std::collections::{HashMap, HashSet};

/// Segments per rounded corner in the pill mesh
const CORNER_SEGMENTS: usize = 6;

const FOCUSED_LIGHTEN: f32 = 18.0;
const NEIGHBOR_LIGHTEN: f32 = 10.0;
const GRADIENT_SHIFT: f32 = 10.0;

const TEXT_COLOR: Color32 = Color32::WHITE;
const SUBTITLE_COLOR: Color32 = Color32::from_rgb(0xe0, 0xf2, 0xfe);

// =============================================================================
// GEOMETRY
// =============================================================================

/// World-space pill size: label width (and subtitle line, if any) plus padding
pub fn pill_size(node: &Node, config: &RenderConfig) -> Vec2 {
    let text_width = |text: &str, font: f32| text.chars().count() as f32 * font * config.char_width;

    let mut width = text_width(&node.label, config.title_size);
    let mut height = config.title_size;
    if let Some(subtitle) = node.subtitle() {
        width = width.max(text_width(&subtitle, config.subtitle_size));
        height += config.gap_y + config.subtitle_size;
    }

    Vec2::new(width + config.pad_x * 2.0, height + config.pad_y * 2.0)
}

pub fn pill_rect(node: &Node, config: &RenderConfig) -> Rect {
    Rect::from_center_size(node.position(), pill_size(node, config))
}

/// Pick regions in draw order, one per node
pub fn pick_regions<'a>(
    snapshot: &'a Snapshot,
    config: &'a RenderConfig,
) -> impl Iterator<Item = PickRegion> + 'a {
    snapshot
        .nodes
        .iter()
        .enumerate()
        .map(move |(order, node)| PickRegion::new(node.id.clone(), pill_rect(node, config), order))
}

// =============================================================================
// VISUAL STATE
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct NodeVisual {
    pub id: String,
    pub rect: Rect,
    pub title: String,
    pub subtitle: Option<String>,
    /// Gradient endpoints, top to bottom
    pub top: Color32,
    pub bottom: Color32,
    pub shadow_blur: f32,
    pub shadow_color: Color32,
    pub opacity: f32,
    pub focused: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkVisual {
    pub from: Pos2,
    pub to: Pos2,
    pub color: Color32,
    pub width: f32,
    pub dashed: bool,
}

/// Focused node and its direct neighbors
struct FocusSet<'a> {
    focused: Option<&'a str>,
    neighbors: HashSet<&'a str>,
}

impl<'a> FocusSet<'a> {
    fn new(snapshot: &'a Snapshot, focused: Option<&'a str>) -> Self {
        let neighbors = focused.map(|id| snapshot.neighbors(id)).unwrap_or_default();
        Self { focused, neighbors }
    }

    fn contains(&self, id: &str) -> bool {
        match self.focused {
            None => true,
            Some(f) => f == id || self.neighbors.contains(id),
        }
    }
}

pub fn node_visuals(
    snapshot: &Snapshot,
    focused: Option<&str>,
    config: &RenderConfig,
) -> Vec<NodeVisual> {
    let focus = FocusSet::new(snapshot, focused);

    snapshot
        .nodes
        .iter()
        .map(|node| {
            let is_focused = focused == Some(node.id.as_str());
            let is_neighbor = !is_focused && focus.neighbors.contains(node.id.as_str());

            let base = match (is_focused, is_neighbor) {
                (true, _) => lighten(node_color(node), FOCUSED_LIGHTEN),
                (_, true) => lighten(node_color(node), NEIGHBOR_LIGHTEN),
                _ => node_color(node),
            };
            let shadow_blur = if is_focused || is_neighbor {
                config.shadow_blur_focused
            } else {
                config.shadow_blur
            };
            let opacity = if focus.contains(&node.id) {
                1.0
            } else {
                config.blur_opacity
            };

            NodeVisual {
                id: node.id.clone(),
                rect: pill_rect(node, config),
                title: node.label.clone(),
                subtitle: node.subtitle(),
                top: lighten(base, GRADIENT_SHIFT),
                bottom: darken(base, GRADIENT_SHIFT),
                shadow_blur,
                shadow_color: with_alpha(base, 0.45),
                opacity,
                focused: is_focused,
            }
        })
        .collect()
}

pub fn link_visuals(
    snapshot: &Snapshot,
    focused: Option<&str>,
    config: &RenderConfig,
) -> Vec<LinkVisual> {
    let index = snapshot.index();

    // Distinct OR groups feeding each target
    let mut or_groups: HashMap<&str, HashSet<&str>> = HashMap::new();
    for link in &snapshot.links {
        if let Some(group) = link.logic.group() {
            or_groups
                .entry(link.target.as_str())
                .or_default()
                .insert(group);
        }
    }

    snapshot
        .links
        .iter()
        .filter_map(|link| {
            let source = &snapshot.nodes[*index.get(link.source.as_str())?];
            let target = &snapshot.nodes[*index.get(link.target.as_str())?];

            let emphasized = focused.map_or(true, |id| link.touches(id));
            let level = display_level(source);

            let color = if link.logic.is_or() {
                let multi_group = or_groups
                    .get(link.target.as_str())
                    .is_some_and(|groups| groups.len() > 1);
                match (multi_group, link.logic.group(), emphasized) {
                    (true, Some(group), true) => or_group_color(group),
                    (true, Some(group), false) => with_alpha(or_group_color(group), 0.4),
                    (_, _, true) => OR_PRIMARY,
                    (_, _, false) => faded_or_color(),
                }
            } else if emphasized {
                link_level_color(level)
            } else {
                faded_and_color()
            };

            let mut width = link_width(level);
            if emphasized {
                width += config.link_focus_boost;
            }

            Some(LinkVisual {
                from: source.position(),
                to: target.position(),
                color,
                width,
                dashed: link.logic.is_or(),
            })
        })
        .collect()
}

// =============================================================================
// GRAPH RENDERER
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct GraphRenderer {
    pub config: RenderConfig,
}

impl GraphRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Render links below nodes, both culled against the visible area
    pub fn render(
        &self,
        painter: &egui::Painter,
        snapshot: &Snapshot,
        camera: &Camera2D,
        screen_rect: Rect,
        focused: Option<&str>,
    ) {
        let visible = camera.visible_bounds(screen_rect);

        for link in link_visuals(snapshot, focused, &self.config) {
            let link_bounds = Rect::from_two_pos(link.from, link.to);
            if !visible.intersects(link_bounds.expand(1.0)) {
                continue;
            }
            self.render_link(painter, &link, camera, screen_rect);
        }

        for node in node_visuals(snapshot, focused, &self.config) {
            if !visible.intersects(node.rect.expand(node.shadow_blur)) {
                continue;
            }
            self.render_node(painter, &node, camera, screen_rect);
        }
    }

    fn render_link(
        &self,
        painter: &egui::Painter,
        link: &LinkVisual,
        camera: &Camera2D,
        screen_rect: Rect,
    ) {
        let from = camera.world_to_screen(link.from, screen_rect);
        let to = camera.world_to_screen(link.to, screen_rect);
        let stroke = Stroke::new(link.width * camera.zoom().max(0.5), link.color);

        if link.dashed {
            painter.extend(Shape::dashed_line(
                &[from, to],
                stroke,
                self.config.dash_length,
                self.config.gap_length,
            ));
        } else {
            painter.line_segment([from, to], stroke);
        }
    }

    fn render_node(
        &self,
        painter: &egui::Painter,
        node: &NodeVisual,
        camera: &Camera2D,
        screen_rect: Rect,
    ) {
        let zoom = camera.zoom();
        let rect = camera.world_rect_to_screen(node.rect, screen_rect);
        let radius = (self.config.corner_radius * zoom).min(rect.height() / 2.0);

        let shadow = Shadow {
            offset: Vec2::new(0.0, 2.0 * zoom),
            blur: node.shadow_blur * zoom,
            spread: 0.0,
            color: with_alpha(node.shadow_color, node.opacity),
        };
        painter.add(shadow.as_shape(rect, Rounding::same(radius)));

        painter.add(Shape::mesh(gradient_pill(
            rect,
            radius,
            with_alpha(node.top, node.opacity),
            with_alpha(node.bottom, node.opacity),
        )));

        if node.focused {
            painter.rect_stroke(
                rect,
                Rounding::same(radius),
                Stroke::new(1.5 * zoom, with_alpha(Color32::WHITE, 0.8)),
            );
        }

        let title_size = self.config.title_size * zoom;
        let text_color = with_alpha(TEXT_COLOR, node.opacity);
        match &node.subtitle {
            Some(subtitle) => {
                let subtitle_size = self.config.subtitle_size * zoom;
                let block = title_size + self.config.gap_y * zoom + subtitle_size;
                let top = rect.center().y - block / 2.0;
                painter.text(
                    Pos2::new(rect.center().x, top),
                    Align2::CENTER_TOP,
                    &node.title,
                    FontId::proportional(title_size),
                    text_color,
                );
                painter.text(
                    Pos2::new(rect.center().x, top + block),
                    Align2::CENTER_BOTTOM,
                    subtitle,
                    FontId::proportional(subtitle_size),
                    with_alpha(SUBTITLE_COLOR, node.opacity),
                );
            }
            None => {
                painter.text(
                    rect.center(),
                    Align2::CENTER_CENTER,
                    &node.title,
                    FontId::proportional(title_size),
                    text_color,
                );
            }
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Outline of a rounded rect, clockwise from the top-left arc
fn rounded_outline(rect: Rect, radius: f32) -> Vec<Pos2> {
    use std::f32::consts::{FRAC_PI_2, PI};

    let corners = [
        (Pos2::new(rect.min.x + radius, rect.min.y + radius), PI),
        (Pos2::new(rect.max.x - radius, rect.min.y + radius), PI + FRAC_PI_2),
        (Pos2::new(rect.max.x - radius, rect.max.y - radius), 0.0),
        (Pos2::new(rect.min.x + radius, rect.max.y - radius), FRAC_PI_2),
    ];

    let mut points = Vec::with_capacity(corners.len() * (CORNER_SEGMENTS + 1));
    for (center, start) in corners {
        for i in 0..=CORNER_SEGMENTS {
            let angle = start + FRAC_PI_2 * i as f32 / CORNER_SEGMENTS as f32;
            points.push(center + Vec2::angled(angle) * radius);
        }
    }
    points
}

/// Triangle fan over the pill outline with a vertical color gradient
fn gradient_pill(rect: Rect, radius: f32, top: Color32, bottom: Color32) -> Mesh {
    let height = rect.height().max(f32::EPSILON);
    let shade = |y: f32| lerp_color(top, bottom, (y - rect.min.y) / height);

    let mut mesh = Mesh::default();
    mesh.colored_vertex(rect.center(), shade(rect.center().y));

    let outline = rounded_outline(rect, radius);
    for p in &outline {
        mesh.colored_vertex(*p, shade(p.y));
    }

    let n = outline.len() as u32;
    for i in 0..n {
        mesh.add_triangle(0, 1 + i, 1 + (i + 1) % n);
    }
    mesh
}

fn lerp_color(a: Color32, b: Color32, t: f32) -> Color32 {
    let t = t.clamp(0.0, 1.0);
    let [ar, ag, ab, aa] = a.to_srgba_unmultiplied();
    let [br, bg, bb, ba] = b.to_srgba_unmultiplied();
    let channel = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
    Color32::from_rgba_unmultiplied(
        channel(ar, br),
        channel(ag, bg),
        channel(ab, bb),
        channel(aa, ba),
    )
}

fn with_alpha(color: Color32, opacity: f32) -> Color32 {
    let [r, g, b, a] = color.to_srgba_unmultiplied();
    Color32::from_rgba_unmultiplied(r, g, b, (a as f32 * opacity.clamp(0.0, 1.0)) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{EdgeKind, EntityType, Link, LogicType, NodeMetadata};

    fn course(id: &str, x: f32, uoc: Option<u32>) -> Node {
        let mut node = Node::new(id, id, EntityType::Course).with_metadata(NodeMetadata {
            uoc,
            ..NodeMetadata::default()
        });
        node.x = x;
        node
    }

    fn snapshot() -> Snapshot {
        Snapshot::from_parts(
            vec![
                course("COMP1511", 0.0, Some(6)),
                course("COMP2521", 200.0, Some(6)),
                course("COMP3121", 400.0, None),
                course("MATH1081", 600.0, None),
            ],
            vec![
                Link::new("COMP1511", "COMP2521", EdgeKind::Prereq),
                Link::new("COMP2521", "COMP3121", EdgeKind::Prereq),
            ],
        )
    }

    #[test]
    fn test_pill_grows_with_label_and_subtitle() {
        let config = RenderConfig::default();
        let short = Node::new("A", "A", EntityType::Course);
        let long = Node::new("B", "Data Structures and Algorithms", EntityType::Course);
        assert!(pill_size(&long, &config).x > pill_size(&short, &config).x);

        let with_uoc = course("C", 0.0, Some(6));
        let without = course("C", 0.0, None);
        let diff = pill_size(&with_uoc, &config).y - pill_size(&without, &config).y;
        assert!((diff - (config.gap_y + config.subtitle_size)).abs() < 1e-4);
    }

    #[test]
    fn test_pick_regions_match_drawn_rects() {
        let config = RenderConfig::default();
        let snap = snapshot();
        let regions: Vec<_> = pick_regions(&snap, &config).collect();
        let visuals = node_visuals(&snap, None, &config);
        assert_eq!(regions.len(), visuals.len());
        for (region, visual) in regions.iter().zip(&visuals) {
            assert_eq!(region.id, visual.id);
            assert_eq!(region.rect(), visual.rect);
        }
    }

    #[test]
    fn test_focus_dims_outside_neighborhood() {
        let config = RenderConfig::default();
        let visuals = node_visuals(&snapshot(), Some("COMP2521"), &config);
        let by_id: HashMap<_, _> = visuals.iter().map(|v| (v.id.as_str(), v)).collect();

        assert_eq!(by_id["COMP2521"].opacity, 1.0);
        assert!(by_id["COMP2521"].focused);
        assert_eq!(by_id["COMP1511"].opacity, 1.0);
        assert_eq!(by_id["COMP3121"].opacity, 1.0);
        assert_eq!(by_id["MATH1081"].opacity, config.blur_opacity);
        assert_eq!(by_id["COMP1511"].shadow_blur, config.shadow_blur_focused);
        assert_eq!(by_id["MATH1081"].shadow_blur, config.shadow_blur);
    }

    #[test]
    fn test_no_focus_keeps_everything_opaque() {
        let config = RenderConfig::default();
        assert!(node_visuals(&snapshot(), None, &config)
            .iter()
            .all(|v| v.opacity == 1.0 && !v.focused));
    }

    #[test]
    fn test_link_style_follows_source_level_and_focus() {
        let config = RenderConfig::default();
        let snap = snapshot();

        let all = link_visuals(&snap, None, &config);
        assert_eq!(all[0].color, link_level_color(Some(1)));
        assert_eq!(all[0].width, link_width(Some(1)) + config.link_focus_boost);
        assert_eq!(all[1].color, link_level_color(Some(2)));

        let focused = link_visuals(&snap, Some("COMP1511"), &config);
        assert_eq!(focused[0].color, link_level_color(Some(1)));
        assert_eq!(focused[1].color, faded_and_color());
        assert_eq!(focused[1].width, link_width(Some(2)));
    }

    #[test]
    fn test_or_links_dashed_and_group_colored() {
        let config = RenderConfig::default();
        let or = |g: &str| LogicType::Or(Some(g.to_string()));
        let snap = Snapshot::from_parts(
            vec![
                course("COMP1511", 0.0, None),
                course("COMP1521", 100.0, None),
                course("MATH1081", 200.0, None),
                course("COMP3121", 300.0, None),
                course("COMP2521", 400.0, None),
            ],
            vec![
                Link::new("COMP1511", "COMP3121", EdgeKind::Prereq).with_logic(or("g1")),
                Link::new("MATH1081", "COMP3121", EdgeKind::Prereq).with_logic(or("g2")),
                Link::new("COMP1521", "COMP2521", EdgeKind::Prereq).with_logic(or("g3")),
            ],
        );

        let visuals = link_visuals(&snap, Some("COMP3121"), &config);
        assert!(visuals.iter().all(|v| v.dashed));
        assert_eq!(visuals[0].color, or_group_color("g1"));
        assert_eq!(visuals[1].color, or_group_color("g2"));
        // Single group into COMP2521, not touching focus
        assert_eq!(visuals[2].color, faded_or_color());

        let unfocused = link_visuals(&snap, None, &config);
        assert_eq!(unfocused[2].color, OR_PRIMARY);
    }

    #[test]
    fn test_gradient_mesh_is_closed_fan() {
        let rect = Rect::from_min_size(Pos2::ZERO, Vec2::new(100.0, 30.0));
        let mesh = gradient_pill(rect, 10.0, Color32::WHITE, Color32::BLACK);
        let outline = 4 * (CORNER_SEGMENTS + 1);
        assert_eq!(mesh.vertices.len(), outline + 1);
        assert_eq!(mesh.indices.len(), outline * 3);
        assert!(mesh.is_valid());
    }
}
