// polypong/server/src/systems/physics/collision.rs
// Continuous collision resolution of the ball against the polygon edges.

use super::geometry::{
    closest_point_on_segment, distance_point_to_segment, inward_normal, paddle_covers_point,
    segment_intersection,
};
use crate::core::config::GameConfig;
use crate::core::types::{EdgeIndex, Vec2};
use crate::entities::{Ball, Paddle, Polygon};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionOutcome {
    PaddleHit(EdgeIndex),
    WallBounce(EdgeIndex),
    /// Ball reached a paddle-bound edge outside the paddle. The ball is left untouched.
    Goal(EdgeIndex),
}

/// Checks the edges in index order and resolves the first collision found.
///
/// `prev_position` is the ball position before this tick's integration; the
/// `prev_position -> ball.position` ray is what catches fast balls that would otherwise
/// tunnel through an edge. Only one edge is resolved per call, so a ball reaching a
/// corner is handled by whichever of the two edges has the lower index.
pub fn resolve_collisions(
    ball: &mut Ball,
    polygon: &Polygon,
    paddles: &[Paddle],
    prev_position: Vec2,
    config: &GameConfig,
) -> Option<CollisionOutcome> {
    for (edge_index, edge_start, edge_end) in polygon.edges() {
        let intersection = segment_intersection(prev_position, ball.position, edge_start, edge_end);
        let distance = distance_point_to_segment(ball.position, edge_start, edge_end);
        let glancing = distance < ball.radius + config.glancing_margin;

        if intersection.is_none() && !glancing {
            continue;
        }

        let contact = match intersection {
            Some(point) => {
                // Snap back onto the edge so the reflection starts inside the arena.
                ball.position = point;
                point
            }
            None => closest_point_on_segment(edge_start, edge_end, ball.position),
        };

        let normal = inward_normal(edge_start, edge_end);
        if ball.velocity.dot(normal) >= 0.0 {
            // Already heading inward, e.g. reflected on the previous tick.
            continue;
        }

        return match paddles.iter().find(|p| p.edge_index == edge_index) {
            Some(paddle) if paddle_covers_point(contact, edge_start, edge_end, paddle, config.collision_grace) => {
                reflect(ball, normal, config);
                trace!("Paddle hit on edge {} at ({:.1}, {:.1})", edge_index, contact.x, contact.y);
                Some(CollisionOutcome::PaddleHit(edge_index))
            }
            Some(_) => Some(CollisionOutcome::Goal(edge_index)),
            None => {
                reflect(ball, normal, config);
                Some(CollisionOutcome::WallBounce(edge_index))
            }
        };
    }
    None
}

/// Mirrors the velocity across `normal`, nudges the ball off the edge and applies the
/// per-bounce speed-up.
pub fn reflect(ball: &mut Ball, normal: Vec2, config: &GameConfig) {
    let dot = ball.velocity.dot(normal);
    ball.velocity = ball.velocity - normal * (2.0 * dot);
    ball.position = ball.position + normal * config.reflection_push;
    ball.velocity = ball.velocity * config.ball_speed_increase;
}
