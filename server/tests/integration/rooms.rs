// polypong/server/tests/integration/rooms.rs

use polypong_server_core::core::config::{GameConfig, ServerConfig};
use polypong_server_core::core::constants::TERMINATION_REASON_PLAYER_LEFT;
use polypong_server_core::core::types::{GameState, MoveDirection, SocketId, Vec2};
use polypong_server_core::network::protocol::{GameEventPayload, ServerMessage};
use polypong_server_core::server::instance::PolyPongServer;
use polypong_server_core::server::room::Room;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout, Instant};

const DT: f32 = 1.0 / 60.0;

fn socket(name: &str) -> SocketId {
    Arc::new(name.to_string())
}

fn setup_room(config: GameConfig) -> (Room, broadcast::Receiver<ServerMessage>) {
    let (events, rx) = broadcast::channel(4096);
    (Room::with_seed("test-room", config, events, 42), rx)
}

fn drain(rx: &mut broadcast::Receiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Ok(message) = rx.try_recv() {
        out.push(message);
    }
    out
}

fn start_round(room: &mut Room, players: &[SocketId]) {
    for p in players {
        room.toggle_ready(p, true);
    }
    assert_eq!(room.game_state(), GameState::Countdown);
    while room.game_state() == GameState::Countdown {
        room.tick(0.5).unwrap();
    }
    assert_eq!(room.game_state(), GameState::Playing);
}

#[test]
fn test_pentagon_fills_edges_in_order() {
    let (mut room, _rx) = setup_room(GameConfig::default());
    let indices: Vec<i32> = (0..6).map(|i| room.add_player(socket(&format!("p{}", i)))).collect();

    assert_eq!(indices, vec![0, 1, 2, 3, 4, -1]);
    assert_eq!(room.simulation.paddles.len(), 5);
    assert_eq!(room.player_count(), 5);
}

#[test]
fn test_vacated_edge_is_reused_first() {
    let (mut room, _rx) = setup_room(GameConfig::default());
    let players: Vec<SocketId> = (0..3).map(|i| socket(&format!("p{}", i))).collect();
    for p in &players {
        room.add_player(p.clone());
    }

    room.remove_player(&players[1]);
    assert!(room.simulation.paddle(1).is_none(), "edge 1 should be a wall again");
    assert_eq!(room.add_player(socket("late")), 1);
}

#[test]
fn test_ready_gate_waits_for_everyone() {
    let (mut room, _rx) = setup_room(GameConfig::default());
    let players: Vec<SocketId> = (0..3).map(|i| socket(&format!("p{}", i))).collect();
    for p in &players {
        room.add_player(p.clone());
    }

    room.toggle_ready(&players[0], true);
    room.toggle_ready(&players[1], true);
    assert_eq!(room.game_state(), GameState::Scoring);

    room.toggle_ready(&players[1], false);
    room.toggle_ready(&players[2], true);
    assert_eq!(room.game_state(), GameState::Scoring);
    assert_eq!(room.ready_edges().collect::<Vec<_>>(), vec![0, 2]);

    room.toggle_ready(&players[1], true);
    assert_eq!(room.game_state(), GameState::Countdown);
    assert_eq!(room.ready_edges().count(), 0);
}

#[test]
fn test_ready_toggle_is_broadcast_immediately() {
    let (mut room, mut rx) = setup_room(GameConfig::default());
    let (a, b) = (socket("a"), socket("b"));
    room.add_player(a.clone());
    room.add_player(b.clone());
    drain(&mut rx);

    room.toggle_ready(&a, true);
    let ready: Vec<Vec<usize>> = drain(&mut rx)
        .into_iter()
        .filter_map(|m| match m {
            ServerMessage::GameState(state) => Some(state.ready_edges),
            _ => None,
        })
        .collect();
    assert_eq!(ready, vec![vec![0]]);

    // A halted room never ticks again, so the toggle is its only broadcast.
    room.halt();
    room.toggle_ready(&a, false);
    assert!(matches!(
        drain(&mut rx).as_slice(),
        [ServerMessage::GameState(state)] if state.ready_edges.is_empty()
    ));
}

#[test]
fn test_spectator_cannot_ready_or_steer() {
    let mut config = GameConfig::default();
    config.sides = 3;
    let (mut room, _rx) = setup_room(config);
    let players: Vec<SocketId> = (0..3).map(|i| socket(&format!("p{}", i))).collect();
    for p in &players {
        room.add_player(p.clone());
    }
    let spectator = socket("watcher");
    assert_eq!(room.add_player(spectator.clone()), -1);

    room.toggle_ready(&spectator, true);
    assert_eq!(room.ready_edges().count(), 0);

    start_round(&mut room, &players);
    room.handle_input(&spectator, MoveDirection::Forward);
    assert!(room.simulation.paddles.iter().all(|p| p.move_direction == MoveDirection::Stop));
}

#[test]
fn test_disconnect_releases_ready_requirement() {
    let (mut room, _rx) = setup_room(GameConfig::default());
    let (a, b) = (socket("a"), socket("b"));
    room.add_player(a.clone());
    room.add_player(b.clone());

    room.toggle_ready(&a, true);
    assert_eq!(room.game_state(), GameState::Scoring);

    room.remove_player(&b);
    assert_eq!(room.game_state(), GameState::Countdown);
    assert!(room.is_running());
}

#[test]
fn test_disconnect_while_scoring_keeps_state() {
    let (mut room, _rx) = setup_room(GameConfig::default());
    let (a, b) = (socket("a"), socket("b"));
    room.add_player(a.clone());
    room.add_player(b.clone());

    room.remove_player(&b);
    assert_eq!(room.game_state(), GameState::Scoring);
    assert!(room.is_running());

    room.remove_player(&socket("unknown"));
    assert_eq!(room.player_count(), 1);
}

#[test]
fn test_disconnect_while_playing_terminates() {
    let (mut room, mut rx) = setup_room(GameConfig::default());
    let (a, b) = (socket("a"), socket("b"));
    room.add_player(a.clone());
    room.add_player(b.clone());
    start_round(&mut room, &[a.clone(), b.clone()]);
    room.simulation.score = 3;
    room.simulation.time_elapsed = 12.7;
    drain(&mut rx);

    room.remove_player(&b);

    assert_eq!(room.game_state(), GameState::Terminated);
    assert!(!room.is_running());
    let terminated = drain(&mut rx).into_iter().find_map(|m| match m {
        ServerMessage::GameTerminated(payload) => Some(payload),
        _ => None,
    });
    let terminated = terminated.expect("termination should be broadcast");
    assert_eq!(terminated.reason, TERMINATION_REASON_PLAYER_LEFT);
    assert_eq!((terminated.last_score, terminated.final_time), (3, 12));

    // Halted: ticks neither move nor broadcast.
    let ball = room.simulation.ball.position;
    room.tick(DT).unwrap();
    assert_eq!(room.simulation.ball.position, ball);
    assert!(drain(&mut rx).is_empty());
}

#[test]
fn test_input_is_latched_and_ignored_while_scoring() {
    let (mut room, _rx) = setup_room(GameConfig::default());
    let a = socket("a");
    room.add_player(a.clone());

    room.handle_input(&a, MoveDirection::Forward);
    assert_eq!(room.simulation.paddle(0).unwrap().move_direction, MoveDirection::Stop);

    room.toggle_ready(&a, true);
    room.handle_input(&a, MoveDirection::Backward);
    for _ in 0..10 {
        room.tick(DT).unwrap();
    }
    let paddle = room.simulation.paddle(0).unwrap();
    assert_eq!(paddle.move_direction, MoveDirection::Backward);
    assert!(paddle.position < 0.5);
}

#[test]
fn test_round_ends_with_goal_event() {
    let (mut room, mut rx) = setup_room(GameConfig::default());
    let (a, b) = (socket("a"), socket("b"));
    assert_eq!(room.add_player(a.clone()), 0);
    assert_eq!(room.add_player(b.clone()), 1);

    room.toggle_ready(&a, true);
    room.toggle_ready(&b, true);
    assert_eq!(room.game_state(), GameState::Countdown);
    start_round(&mut room, &[]);

    // Aim at 10% along edge 0, well outside paddle 0's range.
    let (start, end) = room.simulation.polygon.edge(0).unwrap();
    let target = start + (end - start) * 0.1;
    let heading = target * (1.0 / target.length());
    room.simulation.ball.position = target * 0.9;
    room.simulation.ball.velocity = heading * 300.0;
    room.simulation.score = 7;
    room.simulation.time_elapsed = 42.3;
    drain(&mut rx);

    for _ in 0..120 {
        room.tick(DT).unwrap();
        if room.game_state() == GameState::Scoring {
            break;
        }
    }

    assert_eq!(room.game_state(), GameState::Scoring);
    let goal = drain(&mut rx).into_iter().find_map(|m| match m {
        ServerMessage::GameEvent(event @ GameEventPayload::Goal { .. }) => Some(event),
        _ => None,
    });
    assert_eq!(
        goal,
        Some(GameEventPayload::Goal { edge_index: 0, score: 7, time: 42 })
    );
    assert_eq!(room.simulation.last_score, 7);
    assert_eq!(room.simulation.final_time, 42);
}

#[test]
fn test_every_tick_broadcasts_state() {
    let (mut room, mut rx) = setup_room(GameConfig::default());
    room.add_player(socket("a"));
    drain(&mut rx);

    for _ in 0..3 {
        room.tick(DT).unwrap();
    }
    let states: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter_map(|m| match m {
            ServerMessage::GameState(state) => Some(state),
            _ => None,
        })
        .collect();
    assert_eq!(states.len(), 3);
    assert_eq!(states[0].game_state, GameState::Scoring);
    assert_eq!(states[0].paddles.len(), 1);
    assert_eq!(states[0].ball, room.simulation.ball.position);
}

#[test]
fn test_non_finite_ball_is_a_tick_fault() {
    let (mut room, _rx) = setup_room(GameConfig::default());
    room.add_player(socket("a"));
    room.simulation.game_state = GameState::Playing;
    room.simulation.ball.position = Vec2::new(f32::NAN, 0.0);

    assert!(room.tick(DT).is_err());
}

// --- Registry and room tasks ---

fn fast_server(sides: usize) -> Arc<PolyPongServer> {
    let mut config = ServerConfig::default();
    config.game.sides = sides;
    config.game.countdown_secs = 0.05;
    Arc::new(PolyPongServer::new(config))
}

async fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    condition()
}

async fn wait_for_state(rx: &mut broadcast::Receiver<ServerMessage>, wanted: GameState) -> bool {
    timeout(Duration::from_secs(2), async {
        loop {
            match rx.recv().await {
                Ok(ServerMessage::GameState(state)) if state.game_state == wanted => return true,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return false,
            }
        }
    })
    .await
    .unwrap_or(false)
}

#[tokio::test]
async fn test_registry_seats_then_spectates() {
    let server = fast_server(3);
    let mut indices = Vec::new();
    for i in 0..4 {
        let joined = server.join_room("lobby", socket(&format!("s{}", i))).await.unwrap();
        assert_eq!(joined.outcome.sides, 3);
        indices.push(joined.outcome.player_index);
    }
    assert_eq!(indices, vec![0, 1, 2, -1]);
    assert_eq!(server.room_count(), 1);

    server.join_room("other", socket("x")).await.unwrap();
    assert_eq!(server.room_count(), 2);
}

#[tokio::test]
async fn test_empty_room_is_destroyed() {
    let server = fast_server(5);
    let a = socket("a");
    let joined = server.join_room("solo", a.clone()).await.unwrap();

    joined.handle.leave(a);

    assert!(wait_until(|| server.room("solo").is_none()).await);
    assert!(wait_until(|| joined.handle.is_closed()).await);
}

#[tokio::test]
async fn test_terminated_room_is_replaced_on_next_join() {
    let server = fast_server(5);
    let (a, b) = (socket("a"), socket("b"));
    let first = server.join_room("arena", a.clone()).await.unwrap();
    let mut second = server.join_room("arena", b.clone()).await.unwrap();
    let generation = first.handle.generation;

    first.handle.toggle_ready(a.clone(), true);
    first.handle.toggle_ready(b.clone(), true);
    assert!(wait_for_state(&mut second.outcome.events, GameState::Playing).await);

    first.handle.leave(a);

    let terminated = timeout(Duration::from_secs(2), async {
        loop {
            match second.outcome.events.recv().await {
                Ok(ServerMessage::GameTerminated(payload)) => return Some(payload),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .await
    .unwrap_or(None);
    assert_eq!(terminated.map(|t| t.reason), Some(TERMINATION_REASON_PLAYER_LEFT.to_string()));

    assert!(wait_until(|| server.room("arena").is_none()).await);
    let fresh = server.join_room("arena", socket("c")).await.unwrap();
    assert_ne!(fresh.handle.generation, generation);
    assert_eq!(fresh.outcome.player_index, 0);
}

#[tokio::test]
async fn test_join_queued_behind_termination_gets_fresh_room() {
    let server = fast_server(5);
    let (a, b) = (socket("a"), socket("b"));
    let first = server.join_room("race", a.clone()).await.unwrap();
    let mut second = server.join_room("race", b.clone()).await.unwrap();
    first.handle.toggle_ready(a.clone(), true);
    first.handle.toggle_ready(b.clone(), true);
    assert!(wait_for_state(&mut second.outcome.events, GameState::Playing).await);

    // The join reads the registry before the room task sees the leave.
    first.handle.leave(a);
    let late = server.join_room("race", socket("c")).await.unwrap();

    assert_ne!(late.handle.generation, first.handle.generation);
    assert_eq!(late.outcome.player_index, 0);
    assert_eq!(server.room("race").map(|h| h.generation), Some(late.handle.generation));
}

async fn next_state_within(rx: &mut broadcast::Receiver<ServerMessage>, window: Duration) -> bool {
    timeout(window, async {
        loop {
            match rx.recv().await {
                Ok(ServerMessage::GameState(_)) => return true,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return false,
            }
        }
    })
    .await
    .unwrap_or(false)
}

#[tokio::test]
async fn test_tick_fault_halts_only_that_room() {
    let mut config = ServerConfig::default();
    config.game.countdown_secs = 0.05;
    // Any round that starts launches a non-finite ball.
    config.game.ball_speed_base = f32::INFINITY;
    let server = Arc::new(PolyPongServer::new(config));

    let a = socket("a");
    let mut faulty = server.join_room("faulty", a.clone()).await.unwrap();
    let mut healthy = server.join_room("healthy", socket("h")).await.unwrap();

    faulty.handle.toggle_ready(a.clone(), true);
    assert!(wait_for_state(&mut faulty.outcome.events, GameState::Playing).await);

    // The first PLAYING step faults; nothing is published afterwards.
    sleep(Duration::from_millis(100)).await;
    while faulty.outcome.events.try_recv().is_ok() {}
    assert!(!next_state_within(&mut faulty.outcome.events, Duration::from_millis(300)).await);

    assert!(next_state_within(&mut healthy.outcome.events, Duration::from_millis(300)).await);

    // Still registered and still serving commands.
    assert_eq!(server.room("faulty").map(|h| h.generation), Some(faulty.handle.generation));
    let watcher = server.join_room("faulty", socket("w")).await.unwrap();
    assert_eq!(watcher.handle.generation, faulty.handle.generation);
    assert_eq!(watcher.outcome.player_index, 1);
}
