// polypong/server/src/client/session.rs
use super::interpolation::SnapshotBuffer;
use crate::core::config::GameConfig;
use crate::core::constants::LOCAL_SCORE_DISPLAY_SECS;
use crate::core::error::SimulationError;
use crate::core::types::{GameState, MoveDirection};
use crate::network::protocol::{
    ClientMessage, ErrorPayload, GameEventPayload, InputPayload, JoinRoomPayload, ServerMessage,
    ToggleReadyPayload,
};
use crate::systems::simulation::{Simulation, SimulationHooks};
use std::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Offline play against the walls with a local engine.
    Local,
    /// Rendering a server's room.
    Online,
}

/// Client-side game host. In local mode it drives its own [`Simulation`]; online it keeps
/// the same entity model as a render target fed by the reconciliation layer.
#[derive(Debug)]
pub struct ClientSession {
    pub mode: SessionMode,
    pub simulation: Simulation,
    /// -1 while spectating or not yet seated.
    pub player_index: i32,
    pub buffer: SnapshotBuffer,
    pub room_id: Option<String>,
    pub instance_id: Option<String>,
    pub termination_reason: Option<String>,
    pub last_error: Option<ErrorPayload>,
    pub has_played: bool,
    last_sent_direction: MoveDirection,
    events_rx: mpsc::Receiver<GameEventPayload>,
}

impl ClientSession {
    fn with_mode(mode: SessionMode, config: GameConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        let hit_tx = events_tx.clone();
        let wall_tx = events_tx.clone();
        let hooks = SimulationHooks::new()
            .on_paddle_hit(move |edge_index| {
                let _ = hit_tx.send(GameEventPayload::Bounce { edge_index });
            })
            .on_wall_bounce(move |edge_index| {
                let _ = wall_tx.send(GameEventPayload::Bounce { edge_index });
            })
            .on_goal(move |goal| {
                let _ = events_tx.send(GameEventPayload::Goal {
                    edge_index: goal.edge_index,
                    score: goal.score,
                    time: goal.time,
                });
            });

        ClientSession {
            mode,
            simulation: Simulation::new(config, hooks),
            player_index: -1,
            buffer: SnapshotBuffer::default(),
            room_id: None,
            instance_id: None,
            termination_reason: None,
            last_error: None,
            has_played: false,
            last_sent_direction: MoveDirection::Stop,
            events_rx,
        }
    }

    /// Offline session: one paddle on edge 0, waiting for the player to start.
    pub fn local(config: GameConfig) -> Self {
        let mut session = Self::with_mode(SessionMode::Local, config);
        session.simulation.add_paddle(0);
        session.player_index = 0;
        session
    }

    pub fn online(config: GameConfig, room_id: impl Into<String>, instance_id: Option<String>) -> Self {
        let mut session = Self::with_mode(SessionMode::Online, config);
        session.simulation.game_state = GameState::Waiting;
        session.room_id = Some(room_id.into());
        session.instance_id = instance_id;
        session
    }

    pub fn game_state(&self) -> GameState {
        self.simulation.game_state
    }

    pub fn is_spectator(&self) -> bool {
        self.player_index < 0
    }

    fn own_edge(&self) -> Option<usize> {
        usize::try_from(self.player_index).ok()
    }

    /// Object form when an instance is pinned, bare room id otherwise.
    pub fn join_message(&self) -> Option<ClientMessage> {
        let room_id = self.room_id.clone()?;
        let payload = match &self.instance_id {
            Some(instance) => JoinRoomPayload::Detailed {
                room_id,
                instance: Some(instance.clone()),
            },
            None => JoinRoomPayload::Legacy(room_id),
        };
        Some(ClientMessage::JoinRoom(payload))
    }

    pub fn ready_message(&self, is_ready: bool) -> ClientMessage {
        ClientMessage::ToggleReady(ToggleReadyPayload { is_ready })
    }

    /// Local: starts the next round from SCORING. Online: the message to send.
    pub fn request_ready(&mut self, is_ready: bool) -> Option<ClientMessage> {
        match self.mode {
            SessionMode::Local => {
                if is_ready && self.simulation.game_state == GameState::Scoring {
                    self.simulation.reset_round();
                }
                None
            }
            SessionMode::Online => Some(self.ready_message(is_ready)),
        }
    }

    /// Starts over after the server terminated the room.
    pub fn rejoin(&mut self) -> Option<ClientMessage> {
        if self.mode != SessionMode::Online || self.simulation.game_state != GameState::Terminated {
            return None;
        }
        info!("Rejoining room {:?}.", self.room_id);
        self.player_index = -1;
        self.simulation.game_state = GameState::Scoring;
        self.termination_reason = None;
        self.buffer.clear();
        self.last_sent_direction = MoveDirection::Stop;
        self.join_message()
    }

    /// Applies one inbound message. `received_at` is the client clock in Unix millis.
    pub fn handle_server_message(&mut self, message: ServerMessage, received_at: u64) {
        match message {
            ServerMessage::Init(init) => {
                self.player_index = init.player_index;
                if self.simulation.polygon.sides() != init.sides {
                    self.simulation.polygon.set_sides(init.sides);
                }
                if !init.instance_id.is_empty() {
                    debug!("Connected to instance {}.", init.instance_id);
                }
            }
            ServerMessage::GameState(state) => {
                let sim = &mut self.simulation;
                sim.difficulty = state.difficulty;
                sim.game_state = state.game_state;
                sim.score = state.score;
                sim.last_score = state.last_score;
                sim.final_time = state.final_time;
                sim.time_elapsed = state.time_elapsed;
                sim.countdown_timer = state.countdown_timer;
                sim.score_display_timer = state.score_display_timer;
                if state.last_score > 0 || state.final_time > 0 {
                    self.has_played = true;
                }
                self.buffer.push(state, received_at);
            }
            ServerMessage::GameEvent(event) => {
                if let GameEventPayload::Goal { score, time, .. } = event {
                    self.buffer.clear();
                    self.simulation.last_score = score;
                    self.simulation.final_time = time;
                    self.has_played = true;
                }
            }
            ServerMessage::GameTerminated(terminated) => {
                self.simulation.game_state = GameState::Terminated;
                self.simulation.last_score = terminated.last_score;
                self.simulation.final_time = terminated.final_time;
                self.termination_reason = Some(terminated.reason);
                self.buffer.clear();
            }
            ServerMessage::Error(error) => {
                warn!("Server error: {}", error.message);
                self.last_error = Some(error);
            }
        }
    }

    /// Per-frame callback. `held` is the direction currently held by the player.
    /// Online, returns an `input` message when the held direction changed.
    pub fn frame(&mut self, dt: f32, held: MoveDirection, now: u64) -> Result<Option<ClientMessage>, SimulationError> {
        match self.mode {
            SessionMode::Local => {
                self.local_frame(dt, held)?;
                Ok(None)
            }
            SessionMode::Online => Ok(self.online_frame(dt, held, now)),
        }
    }

    fn local_frame(&mut self, dt: f32, held: MoveDirection) -> Result<(), SimulationError> {
        if self.simulation.game_state == GameState::Scoring {
            self.simulation.score_display_timer = (self.simulation.score_display_timer - dt).max(0.0);
            return Ok(());
        }
        self.simulation.set_paddle_direction(0, held);
        self.simulation.update(dt)?;

        let goal_scored = self.simulation.game_state == GameState::Scoring;
        if goal_scored {
            let sim = &mut self.simulation;
            sim.score_display_timer = LOCAL_SCORE_DISPLAY_SECS;
            sim.difficulty = 1.0;
            sim.score = 0;
            sim.time_elapsed = 0.0;
            self.has_played = true;
        }
        Ok(())
    }

    fn online_frame(&mut self, dt: f32, held: MoveDirection, now: u64) -> Option<ClientMessage> {
        if matches!(self.simulation.game_state, GameState::Scoring | GameState::Waiting) {
            return None;
        }

        self.apply_interpolation(now);

        if let Some(edge) = self.own_edge() {
            let speed = self.simulation.config.paddle_speed;
            if let Some(paddle) = self.simulation.paddle_mut(edge) {
                paddle.move_direction = held;
                paddle.step(speed, dt);
            }
        }

        if held != self.last_sent_direction {
            self.last_sent_direction = held;
            return Some(ClientMessage::Input(InputPayload { dir: held.as_i8() as i64 }));
        }
        None
    }

    /// Moves the render model to the buffered state 100 ms behind `now`.
    pub fn apply_interpolation(&mut self, now: u64) {
        let own_edge = self.own_edge();
        let Some(bracket) = self.buffer.sample(now) else {
            return;
        };
        let ball = bracket.ball();
        let rotation = bracket.rotation();
        let paddles = bracket.paddles(&self.simulation.paddles, own_edge);

        let sim = &mut self.simulation;
        sim.ball.position = ball;
        sim.ball.record_trail();
        sim.polygon.set_rotation(rotation);
        sim.paddles = paddles;
    }

    /// Bounce and goal events raised by the local engine since the last call.
    pub fn drain_events(&mut self) -> Vec<GameEventPayload> {
        self.events_rx.try_iter().collect()
    }
}
