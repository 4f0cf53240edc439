// polypong/server/src/systems/simulation.rs
//! Host-agnostic simulation engine.
//!
//! The engine owns the entity model for one arena and advances it with [`Simulation::update`].
//! It never reaches outward except through the [`SimulationHooks`] table handed to it at
//! construction: the server room turns hook calls into broadcasts, the offline client uses
//! them for local effects.

use crate::core::config::GameConfig;
use crate::core::constants::PADDLE_START_POSITION;
use crate::core::error::SimulationError;
use crate::core::types::{EdgeIndex, GameState, MoveDirection};
use crate::entities::{Ball, Paddle, Polygon};
use crate::systems::physics::collision::{resolve_collisions, CollisionOutcome};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;

/// Payload handed to the goal hook. `time` is whole seconds of play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoalEvent {
    pub edge_index: EdgeIndex,
    pub score: u32,
    pub time: u32,
}

pub type EdgeHook = Box<dyn FnMut(EdgeIndex) + Send>;
pub type GoalHook = Box<dyn FnMut(GoalEvent) + Send>;

#[derive(Default)]
pub struct SimulationHooks {
    on_paddle_hit: Option<EdgeHook>,
    on_wall_bounce: Option<EdgeHook>,
    on_goal: Option<GoalHook>,
}

impl SimulationHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_paddle_hit<F>(mut self, hook: F) -> Self
    where
        F: FnMut(EdgeIndex) + Send + 'static,
    {
        self.on_paddle_hit = Some(Box::new(hook));
        self
    }

    pub fn on_wall_bounce<F>(mut self, hook: F) -> Self
    where
        F: FnMut(EdgeIndex) + Send + 'static,
    {
        self.on_wall_bounce = Some(Box::new(hook));
        self
    }

    pub fn on_goal<F>(mut self, hook: F) -> Self
    where
        F: FnMut(GoalEvent) + Send + 'static,
    {
        self.on_goal = Some(Box::new(hook));
        self
    }
}

impl fmt::Debug for SimulationHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationHooks")
            .field("on_paddle_hit", &self.on_paddle_hit.is_some())
            .field("on_wall_bounce", &self.on_wall_bounce.is_some())
            .field("on_goal", &self.on_goal.is_some())
            .finish()
    }
}

#[derive(Debug)]
pub struct Simulation {
    pub config: GameConfig,
    pub polygon: Polygon,
    pub ball: Ball,
    /// Sorted by nothing in particular; at most one paddle per edge.
    pub paddles: Vec<Paddle>,
    pub game_state: GameState,
    /// Paddle hits in the current round.
    pub score: u32,
    pub last_score: u32,
    pub final_time: u32,
    pub time_elapsed: f32,
    pub difficulty: f32,
    /// +1 or -1.
    pub rotation_direction: f32,
    pub countdown_timer: f32,
    /// Owned by the host; the engine only zeroes it on a goal.
    pub score_display_timer: f32,
    hooks: SimulationHooks,
    rng: StdRng,
}

impl Simulation {
    pub fn new(config: GameConfig, hooks: SimulationHooks) -> Self {
        Self::with_rng(config, hooks, StdRng::from_entropy())
    }

    /// Deterministic engine for tests and replays.
    pub fn with_seed(config: GameConfig, hooks: SimulationHooks, seed: u64) -> Self {
        Self::with_rng(config, hooks, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: GameConfig, hooks: SimulationHooks, mut rng: StdRng) -> Self {
        let mut ball = Ball::new(config.ball_radius, config.trail_length);
        ball.reset(config.ball_speed_base, &mut rng);
        let polygon = Polygon::new(config.polygon_radius, config.sides);

        Simulation {
            polygon,
            ball,
            paddles: Vec::new(),
            game_state: GameState::Scoring,
            score: 0,
            last_score: 0,
            final_time: 0,
            time_elapsed: 0.0,
            difficulty: 1.0,
            rotation_direction: 1.0,
            countdown_timer: 0.0,
            score_display_timer: 0.0,
            hooks,
            rng,
            config,
        }
    }

    pub fn paddle(&self, edge_index: EdgeIndex) -> Option<&Paddle> {
        self.paddles.iter().find(|p| p.edge_index == edge_index)
    }

    pub fn paddle_mut(&mut self, edge_index: EdgeIndex) -> Option<&mut Paddle> {
        self.paddles.iter_mut().find(|p| p.edge_index == edge_index)
    }

    /// Binds a new paddle to `edge_index`. Returns false if the edge is out of range or
    /// already has one.
    pub fn add_paddle(&mut self, edge_index: EdgeIndex) -> bool {
        if edge_index >= self.polygon.sides() || self.paddle(edge_index).is_some() {
            return false;
        }
        self.paddles.push(Paddle::new(edge_index, self.config.paddle_width_default));
        true
    }

    /// The edge reverts to a plain wall.
    pub fn remove_paddle(&mut self, edge_index: EdgeIndex) -> Option<Paddle> {
        let idx = self.paddles.iter().position(|p| p.edge_index == edge_index)?;
        Some(self.paddles.remove(idx))
    }

    pub fn set_paddle_direction(&mut self, edge_index: EdgeIndex, direction: MoveDirection) -> bool {
        match self.paddle_mut(edge_index) {
            Some(paddle) => {
                paddle.move_direction = direction;
                true
            }
            None => false,
        }
    }

    /// Starts a fresh round: countdown, re-centred ball at base speed, difficulty and
    /// score cleared, new rotation direction, paddles back to default width and centre.
    pub fn reset_round(&mut self) {
        self.game_state = GameState::Countdown;
        self.countdown_timer = self.config.countdown_secs;
        self.ball.reset(self.config.ball_speed_base, &mut self.rng);
        self.difficulty = 1.0;
        self.score = 0;
        self.time_elapsed = 0.0;
        self.rotation_direction = if self.rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        self.polygon.rotation_speed = self.config.rotation_speed_base * self.rotation_direction;

        let width = self.config.paddle_width_default;
        for paddle in &mut self.paddles {
            paddle.width = width;
            paddle.position = PADDLE_START_POSITION;
            paddle.move_direction = MoveDirection::Stop;
        }
    }

    pub fn terminate(&mut self) {
        self.game_state = GameState::Terminated;
    }

    /// Advances the arena by `dt` seconds.
    ///
    /// Frozen states return before anything is touched, so the call is a strict no-op
    /// for any `dt`. During the countdown only the timer and the paddles advance; the tick
    /// that reaches zero switches to `Playing` without moving the ball.
    pub fn update(&mut self, dt: f32) -> Result<(), SimulationError> {
        if self.game_state.is_frozen() {
            return Ok(());
        }
        if !dt.is_finite() || dt < 0.0 {
            return Err(SimulationError::InvalidTimestep(dt));
        }

        if self.game_state == GameState::Countdown {
            self.countdown_timer -= dt;
            if self.countdown_timer <= 0.0 {
                self.countdown_timer = 0.0;
                self.game_state = GameState::Playing;
            }
            self.move_paddles(dt);
            return Ok(());
        }

        let prev_position = self.ball.position;
        self.apply_difficulty(dt);
        self.ball.integrate(dt);
        self.move_paddles(dt);

        let outcome = resolve_collisions(
            &mut self.ball,
            &self.polygon,
            &self.paddles,
            prev_position,
            &self.config,
        );
        if let Some(outcome) = outcome {
            self.dispatch(outcome);
        }

        if !self.ball.position.is_finite() || !self.ball.velocity.is_finite() {
            return Err(SimulationError::NonFiniteBall {
                x: self.ball.position.x,
                y: self.ball.position.y,
            });
        }
        Ok(())
    }

    fn apply_difficulty(&mut self, dt: f32) {
        let cfg = &self.config;
        self.time_elapsed += dt;
        self.difficulty = 1.0 + self.time_elapsed / cfg.difficulty_ramp;

        self.polygon.rotation_speed = cfg.rotation_speed_base * self.difficulty * self.rotation_direction;
        self.polygon.update(dt);

        self.ball.enforce_speed_floor(cfg.ball_speed_base * self.difficulty.sqrt());

        let width = (cfg.paddle_width_base / (self.difficulty * cfg.paddle_width_difficulty_factor))
            .max(cfg.paddle_width_min);
        for paddle in &mut self.paddles {
            paddle.width = width;
        }
    }

    fn move_paddles(&mut self, dt: f32) {
        let speed = self.config.paddle_speed;
        for paddle in &mut self.paddles {
            paddle.step(speed, dt);
        }
    }

    fn dispatch(&mut self, outcome: CollisionOutcome) {
        match outcome {
            CollisionOutcome::PaddleHit(edge) => {
                self.score += 1;
                if let Some(hook) = self.hooks.on_paddle_hit.as_mut() {
                    hook(edge);
                }
            }
            CollisionOutcome::WallBounce(edge) => {
                if let Some(hook) = self.hooks.on_wall_bounce.as_mut() {
                    hook(edge);
                }
            }
            CollisionOutcome::Goal(edge) => self.trigger_goal(edge),
        }
    }

    /// Ends the round on a miss at `edge_index`.
    pub fn trigger_goal(&mut self, edge_index: EdgeIndex) {
        self.game_state = GameState::Scoring;
        self.last_score = self.score;
        self.final_time = self.time_elapsed.floor() as u32;
        self.score_display_timer = 0.0;

        let event = GoalEvent {
            edge_index,
            score: self.last_score,
            time: self.final_time,
        };
        if let Some(hook) = self.hooks.on_goal.as_mut() {
            hook(event);
        }
    }
}
