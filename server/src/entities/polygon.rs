// polypong/server/src/entities/polygon.rs
use crate::core::constants::MIN_POLYGON_SIDES;
use crate::core::types::Vec2;
use std::f32::consts::TAU;

/// Regular polygon centred on the origin. `vertices` is derived state and is rebuilt
/// whenever `rotation` or `sides` change.
#[derive(Clone, Debug, PartialEq)]
pub struct Polygon {
    pub radius: f32,
    sides: usize,
    /// Radians, unbounded.
    pub rotation: f32,
    /// Signed rad/s.
    pub rotation_speed: f32,
    vertices: Vec<Vec2>,
}

impl Polygon {
    pub fn new(radius: f32, sides: usize) -> Self {
        let mut polygon = Polygon {
            radius,
            sides: sides.max(MIN_POLYGON_SIDES),
            rotation: 0.0,
            rotation_speed: 0.0,
            vertices: Vec::new(),
        };
        polygon.update_vertices();
        polygon
    }

    pub fn sides(&self) -> usize {
        self.sides
    }

    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    /// Start and end vertex of edge `index` (edge i runs from vertex i to vertex i+1).
    pub fn edge(&self, index: usize) -> Option<(Vec2, Vec2)> {
        if index >= self.sides {
            return None;
        }
        Some((self.vertices[index], self.vertices[(index + 1) % self.sides]))
    }

    pub fn edges(&self) -> impl Iterator<Item = (usize, Vec2, Vec2)> + '_ {
        (0..self.sides).map(move |i| (i, self.vertices[i], self.vertices[(i + 1) % self.sides]))
    }

    pub fn set_sides(&mut self, sides: usize) {
        self.sides = sides.max(MIN_POLYGON_SIDES);
        self.update_vertices();
    }

    pub fn set_rotation(&mut self, rotation: f32) {
        self.rotation = rotation;
        self.update_vertices();
    }

    pub fn update(&mut self, dt: f32) {
        self.rotation += self.rotation_speed * dt;
        self.update_vertices();
    }

    fn update_vertices(&mut self) {
        self.vertices.clear();
        for i in 0..self.sides {
            let angle = TAU * i as f32 / self.sides as f32 + self.rotation;
            self.vertices.push(Vec2::new(angle.cos() * self.radius, angle.sin() * self.radius));
        }
    }
}
