// polypong/server/src/entities/ball.rs
use crate::core::types::Vec2;
use rand::Rng;
use std::collections::VecDeque;
use std::f32::consts::TAU;

#[derive(Clone, Debug, PartialEq)]
pub struct Ball {
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    /// Past positions, most recent first. Rendering only.
    pub trail: VecDeque<Vec2>,
    trail_capacity: usize,
}

impl Ball {
    pub fn new(radius: f32, trail_capacity: usize) -> Self {
        Ball {
            position: Vec2::zero(),
            velocity: Vec2::zero(),
            radius,
            trail: VecDeque::with_capacity(trail_capacity + 1),
            trail_capacity,
        }
    }

    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    /// Re-centre with a uniformly random heading at `speed`, dropping the old trail.
    pub fn reset<R: Rng + ?Sized>(&mut self, speed: f32, rng: &mut R) {
        let angle = rng.gen_range(0.0..TAU);
        self.position = Vec2::zero();
        self.velocity = Vec2::new(angle.cos() * speed, angle.sin() * speed);
        self.trail.clear();
    }

    pub fn integrate(&mut self, dt: f32) {
        self.position = self.position + self.velocity * dt;
        self.record_trail();
    }

    pub fn record_trail(&mut self) {
        self.trail.push_front(self.position);
        while self.trail.len() > self.trail_capacity {
            self.trail.pop_back();
        }
    }

    /// Scales velocity up (never down) so the speed reaches at least `floor`,
    /// keeping the heading. A stationary ball is launched along +x.
    pub fn enforce_speed_floor(&mut self, floor: f32) {
        let speed = self.speed();
        if speed >= floor {
            return;
        }
        if speed > 0.0 {
            self.velocity = self.velocity * (floor / speed);
        } else {
            self.velocity = Vec2::new(floor, 0.0);
        }
    }
}
