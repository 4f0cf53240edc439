// polypong/server/src/core/constants.rs
use std::time::Duration;

pub const SERVER_TICK_RATE: u64 = 60;
/// A tick slower than its nominal duration plus this is logged.
pub const SLOW_TICK_SLACK: Duration = Duration::from_millis(5);

// Network
pub const DEFAULT_PORT: u16 = 12122;
pub const LOCAL_INSTANCE_ID: &str = "local";

// Arena
pub const POLYGON_RADIUS: f32 = 250.0;
pub const POLYGON_SIDES: usize = 5;
pub const MIN_POLYGON_SIDES: usize = 3;

// Ball
pub const BALL_RADIUS: f32 = 8.0;
pub const BALL_SPEED_BASE: f32 = 200.0;
pub const BALL_SPEED_INCREASE: f32 = 1.0125; // per bounce, compounds with the difficulty floor
pub const BALL_TRAIL_LENGTH: usize = 20;

// Difficulty / rotation
pub const DIFFICULTY_RAMP_SECS: f32 = 90.0;
pub const ROTATION_SPEED_BASE: f32 = 0.125; // rad/s at difficulty 1

// Paddles (normalized along the edge)
pub const PADDLE_WIDTH_BASE: f32 = 0.4;
pub const PADDLE_WIDTH_MIN: f32 = 0.1;
pub const PADDLE_WIDTH_DIFFICULTY_FACTOR: f32 = 0.8;
pub const PADDLE_WIDTH_DEFAULT: f32 = 0.5;
pub const PADDLE_SPEED: f32 = 1.0;
pub const PADDLE_START_POSITION: f32 = 0.5;

// Collision
pub const COLLISION_GRACE: f32 = 1.1;
pub const GLANCING_MARGIN: f32 = 2.0;
pub const REFLECTION_PUSH: f32 = 4.0;

// Round flow
pub const COUNTDOWN_DURATION_SECS: f32 = 3.0;
pub const LOCAL_SCORE_DISPLAY_SECS: f32 = 5.0;

// Client reconciliation
pub const SNAPSHOT_BUFFER_CAPACITY: usize = 30;
pub const INTERPOLATION_DELAY_MS: u64 = 100;
pub const PADDLE_DRIFT_EPSILON: f32 = 0.01;
pub const PADDLE_MAX_BLEND: f32 = 0.3;
pub const PADDLE_DRIFT_GAIN: f32 = 2.0;

pub const TERMINATION_REASON_PLAYER_LEFT: &str = "A player left the game";
