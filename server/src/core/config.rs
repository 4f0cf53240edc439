// polypong/server/src/core/config.rs
use super::constants::*;
use super::error::{ServerError, ServerResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Tunables for one simulation instance. Every field has a default, so a YAML override
/// file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct GameConfig {
    pub polygon_radius: f32,
    pub sides: usize,
    pub ball_radius: f32,
    pub ball_speed_base: f32,
    pub ball_speed_increase: f32,
    pub difficulty_ramp: f32,
    pub rotation_speed_base: f32,
    pub paddle_width_base: f32,
    pub paddle_width_min: f32,
    pub paddle_width_difficulty_factor: f32,
    pub paddle_width_default: f32,
    pub paddle_speed: f32,
    pub collision_grace: f32,
    pub glancing_margin: f32,
    pub reflection_push: f32,
    pub countdown_secs: f32,
    pub trail_length: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            polygon_radius: POLYGON_RADIUS,
            sides: POLYGON_SIDES,
            ball_radius: BALL_RADIUS,
            ball_speed_base: BALL_SPEED_BASE,
            ball_speed_increase: BALL_SPEED_INCREASE,
            difficulty_ramp: DIFFICULTY_RAMP_SECS,
            rotation_speed_base: ROTATION_SPEED_BASE,
            paddle_width_base: PADDLE_WIDTH_BASE,
            paddle_width_min: PADDLE_WIDTH_MIN,
            paddle_width_difficulty_factor: PADDLE_WIDTH_DIFFICULTY_FACTOR,
            paddle_width_default: PADDLE_WIDTH_DEFAULT,
            paddle_speed: PADDLE_SPEED,
            collision_grace: COLLISION_GRACE,
            glancing_margin: GLANCING_MARGIN,
            reflection_push: REFLECTION_PUSH,
            countdown_secs: COUNTDOWN_DURATION_SECS,
            trail_length: BALL_TRAIL_LENGTH,
        }
    }
}

impl GameConfig {
    pub fn validate(&self) -> ServerResult<()> {
        if self.sides < MIN_POLYGON_SIDES {
            return Err(ServerError::ConfigError(format!(
                "sides must be at least {}, got {}", MIN_POLYGON_SIDES, self.sides
            )));
        }
        if !(self.difficulty_ramp > 0.0) {
            return Err(ServerError::ConfigError("difficulty_ramp must be positive".into()));
        }
        if !(self.ball_speed_base > 0.0) || !(self.polygon_radius > 0.0) {
            return Err(ServerError::ConfigError("ball speed and polygon radius must be positive".into()));
        }
        if !(self.paddle_width_min > 0.0) || self.paddle_width_min > 1.0 {
            return Err(ServerError::ConfigError("paddle_width_min must be in (0, 1]".into()));
        }
        if !(self.paddle_width_difficulty_factor > 0.0) {
            return Err(ServerError::ConfigError("paddle_width_difficulty_factor must be positive".into()));
        }
        Ok(())
    }

    pub fn from_yaml_str(raw: &str) -> ServerResult<Self> {
        let config: GameConfig = serde_yaml::from_str(raw)
            .map_err(|e| ServerError::ConfigError(format!("invalid game config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> ServerResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub tick_rate: u64,
    /// Identity reported on `/api/instance` and checked against `joinRoom.instance`.
    pub instance_id: String,
    /// True when running as one machine of a multi-instance deployment.
    pub is_distributed: bool,
    pub game: GameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: DEFAULT_PORT,
            tick_rate: SERVER_TICK_RATE,
            instance_id: LOCAL_INSTANCE_ID.to_string(),
            is_distributed: false,
            game: GameConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> ServerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source so tests don't have to
    /// mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> ServerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = resolve_port(lookup("PORT").or_else(|| lookup("FLY_INTERNAL_PORT")).as_deref());

        let (instance_id, is_distributed) = match lookup("FLY_MACHINE_ID").filter(|id| !id.is_empty()) {
            Some(id) => (id, true),
            None => (LOCAL_INSTANCE_ID.to_string(), false),
        };

        let game = match lookup("POLYPONG_CONFIG") {
            Some(path) => {
                info!("Loading game config overrides from {}", path);
                GameConfig::from_yaml_file(Path::new(&path))?
            }
            None => GameConfig::default(),
        };

        Ok(ServerConfig {
            port,
            tick_rate: SERVER_TICK_RATE,
            instance_id,
            is_distributed,
            game,
        })
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.tick_rate.max(1))
    }
}

/// Invalid or missing values fall back to the default port.
pub fn resolve_port(candidate: Option<&str>) -> u16 {
    match candidate.map(str::trim) {
        None => DEFAULT_PORT,
        Some(raw) => match raw.parse::<u16>() {
            Ok(port) if port > 0 => port,
            _ => {
                warn!("Ignoring invalid port value '{}', using {}", raw, DEFAULT_PORT);
                DEFAULT_PORT
            }
        },
    }
}
