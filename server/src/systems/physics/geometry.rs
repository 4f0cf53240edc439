// polypong/server/src/systems/physics/geometry.rs
// Stateless 2D helpers shared by the server simulation and the offline client.

use crate::core::types::Vec2;
use crate::entities::Paddle;

/// Parametric intersection of segment `prev -> curr` with segment `edge_start -> edge_end`.
/// Parallel segments and hits outside either segment's [0, 1] range return `None`.
pub fn segment_intersection(prev: Vec2, curr: Vec2, edge_start: Vec2, edge_end: Vec2) -> Option<Vec2> {
    let denom = (edge_end.y - edge_start.y) * (curr.x - prev.x)
        - (edge_end.x - edge_start.x) * (curr.y - prev.y);
    if denom == 0.0 {
        return None;
    }

    let ua = ((edge_end.x - edge_start.x) * (prev.y - edge_start.y)
        - (edge_end.y - edge_start.y) * (prev.x - edge_start.x))
        / denom;
    let ub = ((curr.x - prev.x) * (prev.y - edge_start.y) - (curr.y - prev.y) * (prev.x - edge_start.x)) / denom;

    if (0.0..=1.0).contains(&ua) && (0.0..=1.0).contains(&ub) {
        Some(Vec2::new(prev.x + ua * (curr.x - prev.x), prev.y + ua * (curr.y - prev.y)))
    } else {
        None
    }
}

/// Unclamped normalized projection of `p` onto the line through `a` and `b`.
/// `None` when the segment is degenerate.
fn projection_param(a: Vec2, b: Vec2, p: Vec2) -> Option<f32> {
    let edge = b - a;
    let len2 = edge.dot(edge);
    if len2 == 0.0 {
        return None;
    }
    Some((p - a).dot(edge) / len2)
}

pub fn closest_point_on_segment(a: Vec2, b: Vec2, p: Vec2) -> Vec2 {
    match projection_param(a, b, p) {
        Some(t) => a + (b - a) * t.clamp(0.0, 1.0),
        None => a,
    }
}

pub fn distance_point_to_segment(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    p.distance(closest_point_on_segment(a, b, p))
}

/// Unit normal of edge `a -> b` oriented toward the polygon centre (the origin).
pub fn inward_normal(a: Vec2, b: Vec2) -> Vec2 {
    let mut normal = Vec2::new(-(b.y - a.y), b.x - a.x);
    let len = normal.length();
    if len > 0.0 {
        normal = normal * (1.0 / len);
    }
    let midpoint = (a + b) * 0.5;
    if normal.dot(midpoint * -1.0) < 0.0 {
        normal = normal * -1.0;
    }
    normal
}

/// Whether the projection of `point` onto the edge falls inside the paddle's
/// covered range, widened by `grace`.
pub fn paddle_covers_point(point: Vec2, edge_start: Vec2, edge_end: Vec2, paddle: &Paddle, grace: f32) -> bool {
    let Some(t) = projection_param(edge_start, edge_end, point) else {
        return false;
    };
    let (start, end) = paddle.covered_range(grace);
    t >= start && t <= end
}
