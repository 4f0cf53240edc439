// polypong/server/src/server/room.rs
use crate::core::config::GameConfig;
use crate::core::constants::TERMINATION_REASON_PLAYER_LEFT;
use crate::core::error::SimulationError;
use crate::core::types::{now_millis, EdgeIndex, GameState, MoveDirection, SocketId};
use crate::network::protocol::{
    GameEventPayload, GameStatePayload, PaddleState, ServerMessage, TerminatedPayload,
};
use crate::systems::simulation::{Simulation, SimulationHooks};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

/// One arena and its members. Owned by exactly one room task; everything here is
/// synchronous and publishes outbound traffic on `events`.
#[derive(Debug)]
pub struct Room {
    pub room_id: String,
    pub simulation: Simulation,
    players: HashMap<SocketId, EdgeIndex>,
    ready_edges: BTreeSet<EdgeIndex>,
    running: bool,
    events: broadcast::Sender<ServerMessage>,
}

impl Room {
    pub fn new(room_id: impl Into<String>, config: GameConfig, events: broadcast::Sender<ServerMessage>) -> Self {
        let room_id = room_id.into();
        let simulation = Simulation::new(config, Self::hooks(&room_id, &events));
        Self::with_simulation(room_id, simulation, events)
    }

    /// Same as [`Room::new`] but with a seeded engine.
    pub fn with_seed(
        room_id: impl Into<String>,
        config: GameConfig,
        events: broadcast::Sender<ServerMessage>,
        seed: u64,
    ) -> Self {
        let room_id = room_id.into();
        let simulation = Simulation::with_seed(config, Self::hooks(&room_id, &events), seed);
        Self::with_simulation(room_id, simulation, events)
    }

    fn with_simulation(room_id: String, simulation: Simulation, events: broadcast::Sender<ServerMessage>) -> Self {
        Room {
            room_id,
            simulation,
            players: HashMap::new(),
            ready_edges: BTreeSet::new(),
            running: true,
            events,
        }
    }

    fn hooks(room_id: &str, events: &broadcast::Sender<ServerMessage>) -> SimulationHooks {
        let hit_tx = events.clone();
        let wall_tx = events.clone();
        let goal_tx = events.clone();
        let goal_room = room_id.to_string();

        SimulationHooks::new()
            .on_paddle_hit(move |edge_index| {
                let _ = hit_tx.send(ServerMessage::GameEvent(GameEventPayload::Bounce { edge_index }));
            })
            .on_wall_bounce(move |edge_index| {
                let _ = wall_tx.send(ServerMessage::GameEvent(GameEventPayload::Bounce { edge_index }));
            })
            .on_goal(move |goal| {
                info!(
                    "[{}]: Goal on edge {} after {} hits in {}s.",
                    goal_room, goal.edge_index, goal.score, goal.time
                );
                let _ = goal_tx.send(ServerMessage::GameEvent(GameEventPayload::Goal {
                    edge_index: goal.edge_index,
                    score: goal.score,
                    time: goal.time,
                }));
            })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.events.subscribe()
    }

    pub fn sides(&self) -> usize {
        self.simulation.polygon.sides()
    }

    pub fn game_state(&self) -> GameState {
        self.simulation.game_state
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn edge_of(&self, socket_id: &SocketId) -> Option<EdgeIndex> {
        self.players.get(socket_id).copied()
    }

    pub fn ready_edges(&self) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.ready_edges.iter().copied()
    }

    /// Seats the socket on the lowest free edge. Returns -1 when every edge is taken;
    /// the caller is then a spectator.
    pub fn add_player(&mut self, socket_id: SocketId) -> i32 {
        if let Some(edge) = self.edge_of(&socket_id) {
            return edge as i32;
        }

        let free_edge = (0..self.sides()).find(|edge| !self.players.values().any(|taken| taken == edge));
        let Some(edge) = free_edge else {
            info!("[{}]: Room full, {} joins as spectator.", self.room_id, socket_id);
            return -1;
        };

        self.players.insert(socket_id.clone(), edge);
        self.simulation.add_paddle(edge);
        info!(
            "[{}]: Player {} took edge {} ({} players).",
            self.room_id,
            socket_id,
            edge,
            self.players.len()
        );
        self.broadcast_state();
        edge as i32
    }

    /// Frees the socket's edge. Leaving mid-round terminates the room.
    pub fn remove_player(&mut self, socket_id: &SocketId) {
        let Some(edge) = self.players.remove(socket_id) else {
            return;
        };
        self.ready_edges.remove(&edge);
        self.simulation.remove_paddle(edge);
        info!(
            "[{}]: Player {} left edge {} ({} players remain).",
            self.room_id,
            socket_id,
            edge,
            self.players.len()
        );

        self.broadcast_state();
        self.check_all_ready();

        if self.running && self.simulation.game_state == GameState::Playing {
            self.terminate(TERMINATION_REASON_PLAYER_LEFT);
        }
    }

    pub fn toggle_ready(&mut self, socket_id: &SocketId, is_ready: bool) {
        if self.simulation.game_state != GameState::Scoring {
            debug!("[{}]: Ignoring ready toggle outside SCORING.", self.room_id);
            return;
        }
        let Some(edge) = self.edge_of(socket_id) else {
            debug!("[{}]: Ignoring ready toggle from spectator {}.", self.room_id, socket_id);
            return;
        };

        if is_ready {
            self.ready_edges.insert(edge);
        } else {
            self.ready_edges.remove(&edge);
        }
        self.broadcast_state();
        self.check_all_ready();
    }

    /// Starts a round once every seated player is ready.
    pub fn check_all_ready(&mut self) -> bool {
        if self.simulation.game_state != GameState::Scoring || self.players.is_empty() {
            return false;
        }
        if !self.players.values().all(|edge| self.ready_edges.contains(edge)) {
            return false;
        }

        self.ready_edges.clear();
        self.simulation.reset_round();
        info!(
            "[{}]: All {} players ready, countdown started.",
            self.room_id,
            self.players.len()
        );
        true
    }

    /// Latches `direction` on the socket's paddle until the next input.
    pub fn handle_input(&mut self, socket_id: &SocketId, direction: MoveDirection) {
        if self.simulation.game_state == GameState::Scoring {
            return;
        }
        if let Some(edge) = self.edge_of(socket_id) {
            self.simulation.set_paddle_direction(edge, direction);
            trace!("[{}]: Edge {} direction {:?}.", self.room_id, edge, direction);
        }
    }

    /// One step of the room: simulate, then publish the authoritative state.
    pub fn tick(&mut self, dt: f32) -> Result<(), SimulationError> {
        if !self.running {
            return Ok(());
        }
        self.simulation.update(dt)?;
        self.broadcast_state();
        Ok(())
    }

    pub fn snapshot(&self) -> GameStatePayload {
        let sim = &self.simulation;
        GameStatePayload {
            ball: sim.ball.position,
            rotation: sim.polygon.rotation,
            paddles: sim
                .paddles
                .iter()
                .map(|p| PaddleState {
                    edge_index: p.edge_index,
                    position: p.position,
                    width: p.width,
                })
                .collect(),
            ready_edges: self.ready_edges.iter().copied().collect(),
            difficulty: sim.difficulty,
            game_state: sim.game_state,
            score: sim.score,
            last_score: sim.last_score,
            final_time: sim.final_time,
            time_elapsed: sim.time_elapsed,
            score_display_timer: sim.score_display_timer,
            countdown_timer: sim.countdown_timer,
            timestamp: now_millis(),
        }
    }

    pub fn broadcast_state(&self) {
        // No receivers is fine: nobody is listening yet or everyone already left.
        let _ = self.events.send(ServerMessage::GameState(self.snapshot()));
    }

    pub fn terminate(&mut self, reason: &str) {
        self.simulation.terminate();
        self.running = false;
        warn!(
            "[{}]: Room terminated: {} (score {}, {}s).",
            self.room_id, reason, self.simulation.score, self.simulation.time_elapsed as u32
        );
        let _ = self.events.send(ServerMessage::GameTerminated(TerminatedPayload {
            reason: reason.to_string(),
            last_score: self.simulation.score,
            final_time: self.simulation.time_elapsed.floor() as u32,
        }));
    }

    /// Leaves the room inert after a tick fault. State is kept for inspection.
    pub fn halt(&mut self) {
        self.running = false;
    }
}
