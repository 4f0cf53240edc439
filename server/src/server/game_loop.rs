// polypong/server/src/server/game_loop.rs
use super::instance::{PolyPongServer, RoomsMap};
use super::room::Room;
use crate::core::constants::SLOW_TICK_SLACK;
use crate::core::types::{GameState, MoveDirection, SocketId};
use crate::network::protocol::ServerMessage;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

const ROOM_EVENT_BUFFER: usize = 256;

/// Everything a connection may ask of a room. Processed in order by the room task.
#[derive(Debug)]
pub enum RoomCommand {
    Join {
        socket_id: SocketId,
        reply: oneshot::Sender<JoinOutcome>,
    },
    Leave {
        socket_id: SocketId,
    },
    Input {
        socket_id: SocketId,
        direction: MoveDirection,
    },
    ToggleReady {
        socket_id: SocketId,
        is_ready: bool,
    },
}

#[derive(Debug)]
pub struct JoinOutcome {
    /// -1 for spectators.
    pub player_index: i32,
    pub sides: usize,
    /// Subscribed before the join was applied, so the first state broadcast is included.
    pub events: broadcast::Receiver<ServerMessage>,
}

/// Cheap, cloneable address of a running room task.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    pub room_id: Arc<String>,
    /// Distinguishes successive rooms registered under the same id.
    pub generation: u64,
    commands: mpsc::UnboundedSender<RoomCommand>,
}

impl RoomHandle {
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    pub(crate) fn request_join(&self, socket_id: SocketId) -> Option<oneshot::Receiver<JoinOutcome>> {
        let (reply, outcome) = oneshot::channel();
        self.commands.send(RoomCommand::Join { socket_id, reply }).ok()?;
        Some(outcome)
    }

    pub fn leave(&self, socket_id: SocketId) {
        self.dispatch(RoomCommand::Leave { socket_id });
    }

    pub fn input(&self, socket_id: SocketId, direction: MoveDirection) {
        self.dispatch(RoomCommand::Input { socket_id, direction });
    }

    pub fn toggle_ready(&self, socket_id: SocketId, is_ready: bool) {
        self.dispatch(RoomCommand::ToggleReady { socket_id, is_ready });
    }

    fn dispatch(&self, command: RoomCommand) {
        if let Err(e) = self.commands.send(command) {
            debug!("[{}]: Room task gone, dropping {:?}.", self.room_id, e.0);
        }
    }
}

impl PolyPongServer {
    /// Creates a room and starts its task. The caller is responsible for registering the
    /// returned handle.
    pub(crate) fn spawn_room(&self, room_id: &str, generation: u64) -> RoomHandle {
        let (events, _) = broadcast::channel(ROOM_EVENT_BUFFER);
        let room = Room::new(room_id, self.config.game.clone(), events);
        let (commands, command_rx) = mpsc::unbounded_channel();
        let handle = RoomHandle {
            room_id: Arc::new(room_id.to_string()),
            generation,
            commands,
        };

        info!("[{}]: Room created (generation {}).", room_id, generation);
        tokio::spawn(run_room_loop(
            room,
            command_rx,
            self.rooms.clone(),
            generation,
            self.config.tick_duration(),
        ));
        handle
    }
}

/// The room's task: single owner of `room`. Ticks at `tick_duration` using the measured
/// elapsed time, interleaved with inbound commands. Exits once the last member leaves.
pub async fn run_room_loop(
    mut room: Room,
    mut commands: mpsc::UnboundedReceiver<RoomCommand>,
    rooms: RoomsMap,
    generation: u64,
    tick_duration: Duration,
) {
    let mut tick_timer = interval(tick_duration);
    tick_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_tick_time = Instant::now();
    let mut registered = true;
    let mut frame: u64 = 0;

    info!("[{}]: Room loop started. Tick: {}ms", room.room_id, tick_duration.as_millis());

    loop {
        tokio::select! {
            _ = tick_timer.tick() => {
                let now = Instant::now();
                let dt = now.duration_since(last_tick_time).as_secs_f32();
                last_tick_time = now;
                if room.is_running() {
                    run_tick(&mut room, dt, frame, tick_duration);
                    frame += 1;
                }
            }
            command = commands.recv() => {
                let Some(command) = command else {
                    debug!("[{}]: Command channel closed.", room.room_id);
                    break;
                };
                let departed = apply_command(&mut room, command);
                if departed && room.is_empty() {
                    break;
                }
            }
        }

        if registered && room.game_state() == GameState::Terminated {
            unregister(&rooms, &room.room_id, generation);
            registered = false;
        }
    }

    if registered {
        unregister(&rooms, &room.room_id, generation);
    }
    info!("[{}]: Room destroyed after {} frames.", room.room_id, frame);
}

fn run_tick(room: &mut Room, dt: f32, frame: u64, tick_duration: Duration) {
    let tick_start = Instant::now();

    match catch_unwind(AssertUnwindSafe(|| room.tick(dt))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!("[{}]: Tick {} failed: {}. Room halted.", room.room_id, frame, e);
            room.halt();
        }
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!("[{}]: Tick {} panicked: {}. Room halted.", room.room_id, frame, reason);
            room.halt();
        }
    }

    let tick_time = tick_start.elapsed();
    if tick_time > tick_duration + SLOW_TICK_SLACK {
        warn!("[{}]: Tick {} took too long: {:?}", room.room_id, frame, tick_time);
    }
}

/// Returns true when the command removed a member.
fn apply_command(room: &mut Room, command: RoomCommand) -> bool {
    match command {
        RoomCommand::Join { socket_id, reply } => {
            if room.game_state() == GameState::Terminated {
                // Dropping `reply` sends the joiner on to a fresh room.
                debug!("[{}]: Refusing {} after termination.", room.room_id, socket_id);
                return false;
            }
            let events = room.subscribe();
            let player_index = room.add_player(socket_id.clone());
            let outcome = JoinOutcome {
                player_index,
                sides: room.sides(),
                events,
            };
            if reply.send(outcome).is_err() {
                // Connection went away while waiting; undo the seat.
                warn!("[{}]: {} vanished during join.", room.room_id, socket_id);
                room.remove_player(&socket_id);
                return true;
            }
            false
        }
        RoomCommand::Leave { socket_id } => {
            room.remove_player(&socket_id);
            true
        }
        RoomCommand::Input { socket_id, direction } => {
            room.handle_input(&socket_id, direction);
            false
        }
        RoomCommand::ToggleReady { socket_id, is_ready } => {
            room.toggle_ready(&socket_id, is_ready);
            false
        }
    }
}

fn unregister(rooms: &RoomsMap, room_id: &str, generation: u64) {
    if rooms.remove_if(room_id, |_, handle| handle.generation == generation).is_some() {
        info!("[{}]: Room unregistered.", room_id);
    }
}
