// polypong/server/src/core/types.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Connection identity. Shared between the connection task and the room it joined.
pub type SocketId = Arc<String>;
pub type EdgeIndex = usize;

// --- Basic Geometric Types ---
#[derive(Clone, Debug, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self { Vec2 { x, y } }
    pub fn zero() -> Self { Vec2 { x: 0.0, y: 0.0 } }

    pub fn dot(self, other: Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn distance(self, other: Vec2) -> f32 {
        (self - other).length()
    }

    pub fn lerp(self, other: Vec2, t: f32) -> Vec2 {
        Vec2::new(lerp(self.x, other.x, t), lerp(self.y, other.y, t))
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 { Vec2::new(self.x + rhs.x, self.y + rhs.y) }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 { Vec2::new(self.x - rhs.x, self.y - rhs.y) }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f32) -> Vec2 { Vec2::new(self.x * rhs, self.y * rhs) }
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

// --- Round state machine ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameState {
    /// Client-side only: connected but no authoritative snapshot seen yet.
    Waiting,
    Scoring,
    Countdown,
    Playing,
    Terminated,
}

impl GameState {
    pub fn is_frozen(self) -> bool {
        matches!(self, GameState::Waiting | GameState::Scoring | GameState::Terminated)
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GameState::Waiting => "WAITING",
            GameState::Scoring => "SCORING",
            GameState::Countdown => "COUNTDOWN",
            GameState::Playing => "PLAYING",
            GameState::Terminated => "TERMINATED",
        };
        f.write_str(label)
    }
}

/// Latched paddle input. Stays in effect until the client sends `Stop` explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MoveDirection {
    Backward,
    #[default]
    Stop,
    Forward,
}

impl MoveDirection {
    pub fn as_f32(self) -> f32 {
        match self {
            MoveDirection::Backward => -1.0,
            MoveDirection::Stop => 0.0,
            MoveDirection::Forward => 1.0,
        }
    }

    pub fn as_i8(self) -> i8 {
        match self {
            MoveDirection::Backward => -1,
            MoveDirection::Stop => 0,
            MoveDirection::Forward => 1,
        }
    }
}

impl TryFrom<i64> for MoveDirection {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(MoveDirection::Backward),
            0 => Ok(MoveDirection::Stop),
            1 => Ok(MoveDirection::Forward),
            other => Err(other),
        }
    }
}

/// Milliseconds since the Unix epoch, as carried in `gameState.timestamp`.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
