// polypong/server/src/entities/paddle.rs
use crate::core::constants::PADDLE_START_POSITION;
use crate::core::types::{EdgeIndex, MoveDirection};

#[derive(Clone, Debug, PartialEq)]
pub struct Paddle {
    pub edge_index: EdgeIndex,
    /// Normalized centre along the edge, kept within [width/2, 1 - width/2].
    pub position: f32,
    pub width: f32,
    pub move_direction: MoveDirection,
}

impl Paddle {
    pub fn new(edge_index: EdgeIndex, width: f32) -> Self {
        Paddle {
            edge_index,
            position: PADDLE_START_POSITION,
            width,
            move_direction: MoveDirection::Stop,
        }
    }

    pub fn step(&mut self, speed: f32, dt: f32) {
        if self.move_direction == MoveDirection::Stop {
            return;
        }
        self.position += self.move_direction.as_f32() * speed * dt;
        self.clamp();
    }

    pub fn clamp(&mut self) {
        let half = self.width / 2.0;
        self.position = self.position.max(half).min(1.0 - half);
    }

    /// Covered range along the edge, widened by `grace`.
    pub fn covered_range(&self, grace: f32) -> (f32, f32) {
        let half = self.width * grace / 2.0;
        (self.position - half, self.position + half)
    }
}
