// polypong/server/src/client/interpolation.rs
//! Render-behind interpolation of authoritative snapshots.
//!
//! Snapshots are stamped with the client clock when they arrive. Rendering samples the
//! buffer [`INTERPOLATION_DELAY_MS`] in the past so there is usually a snapshot on either
//! side of the render time.

use crate::core::constants::{
    INTERPOLATION_DELAY_MS, PADDLE_DRIFT_EPSILON, PADDLE_DRIFT_GAIN, PADDLE_MAX_BLEND,
    SNAPSHOT_BUFFER_CAPACITY,
};
use crate::core::types::{lerp, EdgeIndex, Vec2};
use crate::entities::Paddle;
use crate::network::protocol::GameStatePayload;
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Client receipt time, Unix millis.
    pub received_at: u64,
    pub state: GameStatePayload,
}

#[derive(Debug, Clone)]
pub struct SnapshotBuffer {
    snapshots: VecDeque<Snapshot>,
    capacity: usize,
}

impl Default for SnapshotBuffer {
    fn default() -> Self {
        Self::new(SNAPSHOT_BUFFER_CAPACITY)
    }
}

/// Two snapshots bracketing a render time and the fraction between them.
#[derive(Debug, Clone, Copy)]
pub struct Bracket<'a> {
    pub older: &'a GameStatePayload,
    pub newer: &'a GameStatePayload,
    /// In [0, 1].
    pub t: f32,
}

impl SnapshotBuffer {
    pub fn new(capacity: usize) -> Self {
        SnapshotBuffer {
            snapshots: VecDeque::with_capacity(capacity + 1),
            capacity: capacity.max(1),
        }
    }

    /// Appends, evicting the oldest entry beyond capacity.
    pub fn push(&mut self, state: GameStatePayload, received_at: u64) {
        self.snapshots.push_back(Snapshot { received_at, state });
        while self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.iter()
    }

    /// Pair to render at `now - INTERPOLATION_DELAY_MS`. Needs at least two snapshots.
    pub fn sample(&self, now: u64) -> Option<Bracket<'_>> {
        self.bracket(now.saturating_sub(INTERPOLATION_DELAY_MS))
    }

    /// Outside the buffered span the nearest end snapshot is used on both sides.
    pub fn bracket(&self, render_time: u64) -> Option<Bracket<'_>> {
        if self.snapshots.len() < 2 {
            return None;
        }

        let mut cursor = 0;
        while cursor + 1 < self.snapshots.len() && self.snapshots[cursor + 1].received_at <= render_time {
            cursor += 1;
        }

        let older = &self.snapshots[cursor];
        let Some(newer) = self.snapshots.get(cursor + 1) else {
            return Some(Bracket::at(&older.state));
        };
        if render_time < older.received_at {
            return Some(Bracket::at(&older.state));
        }
        if newer.received_at <= older.received_at {
            return Some(Bracket::at(&newer.state));
        }

        let span = (newer.received_at - older.received_at) as f32;
        let t = ((render_time - older.received_at) as f32 / span).clamp(0.0, 1.0);
        Some(Bracket { older: &older.state, newer: &newer.state, t })
    }
}

impl<'a> Bracket<'a> {
    fn at(state: &'a GameStatePayload) -> Self {
        Bracket { older: state, newer: state, t: 0.0 }
    }

    pub fn ball(&self) -> Vec2 {
        self.older.ball.lerp(self.newer.ball, self.t)
    }

    pub fn rotation(&self) -> f32 {
        lerp(self.older.rotation, self.newer.rotation, self.t)
    }

    /// Rebuilds the paddle list from the newer snapshot.
    ///
    /// The paddle on `own_edge` keeps its locally predicted position and is only pulled
    /// toward the server's; remote paddles are interpolated, or snapped when they have
    /// no counterpart in the older snapshot.
    pub fn paddles(&self, current: &[Paddle], own_edge: Option<EdgeIndex>) -> Vec<Paddle> {
        self.newer
            .paddles
            .iter()
            .map(|target| {
                let mut paddle = Paddle::new(target.edge_index, target.width);
                if own_edge == Some(target.edge_index) {
                    if let Some(local) = current.iter().find(|p| p.edge_index == target.edge_index) {
                        paddle.position = local.position;
                        paddle.move_direction = local.move_direction;
                    }
                    paddle.position = blend_toward(paddle.position, target.position);
                    return paddle;
                }

                paddle.position = match self.older.paddles.iter().find(|p| p.edge_index == target.edge_index) {
                    Some(previous) => lerp(previous.position, target.position, self.t),
                    None => target.position,
                };
                paddle
            })
            .collect()
    }
}

/// Pulls a locally predicted position toward the authoritative one, harder the larger the
/// drift. Drift at or below the epsilon is left alone.
pub fn blend_toward(local: f32, authoritative: f32) -> f32 {
    let drift = (local - authoritative).abs();
    if drift <= PADDLE_DRIFT_EPSILON {
        return local;
    }
    let blend = (drift * PADDLE_DRIFT_GAIN).min(PADDLE_MAX_BLEND);
    local + (authoritative - local) * blend
}
