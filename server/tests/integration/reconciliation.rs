// polypong/server/tests/integration/reconciliation.rs

use polypong_server_core::client::session::{ClientSession, SessionMode};
use polypong_server_core::core::config::GameConfig;
use polypong_server_core::core::constants::LOCAL_SCORE_DISPLAY_SECS;
use polypong_server_core::core::types::{GameState, MoveDirection, Vec2};
use polypong_server_core::network::protocol::{
    parse_server_message, ClientMessage, GameEventPayload, GameStatePayload, InitPayload, InputPayload,
    JoinRoomPayload, PaddleState, ServerMessage, TerminatedPayload, ToggleReadyPayload,
};

const DT: f32 = 1.0 / 60.0;

fn snapshot(state: GameState, ball: Vec2, paddles: &[(usize, f32)]) -> ServerMessage {
    ServerMessage::GameState(GameStatePayload {
        ball,
        rotation: 0.0,
        paddles: paddles
            .iter()
            .map(|&(edge_index, position)| PaddleState { edge_index, position, width: 0.5 })
            .collect(),
        ready_edges: Vec::new(),
        difficulty: 1.0,
        game_state: state,
        score: 0,
        last_score: 0,
        final_time: 0,
        time_elapsed: 0.0,
        score_display_timer: 0.0,
        countdown_timer: 0.0,
        timestamp: 0,
    })
}

fn seated_session(player_index: i32) -> ClientSession {
    let mut session = ClientSession::online(GameConfig::default(), "room", None);
    session.handle_server_message(
        ServerMessage::Init(InitPayload { player_index, sides: 5, instance_id: "local".into() }),
        0,
    );
    session
}

#[test]
fn test_local_session_plays_offline() {
    let mut session = ClientSession::local(GameConfig::default());
    assert_eq!(session.mode, SessionMode::Local);
    assert_eq!(session.game_state(), GameState::Scoring);
    assert_eq!(session.simulation.paddles.len(), 1);
    assert_eq!(session.simulation.paddle(0).unwrap().width, 0.5);

    assert!(session.request_ready(true).is_none());
    assert_eq!(session.game_state(), GameState::Countdown);

    session.frame(0.5, MoveDirection::Forward, 0).unwrap();
    assert!(session.simulation.paddle(0).unwrap().position > 0.5);

    for _ in 0..10 {
        session.frame(0.5, MoveDirection::Stop, 0).unwrap();
    }
    assert_ne!(session.game_state(), GameState::Countdown);
}

#[test]
fn test_local_goal_shows_score() {
    let mut session = ClientSession::local(GameConfig::default());
    session.request_ready(true);
    {
        let sim = &mut session.simulation;
        sim.game_state = GameState::Playing;
        sim.score = 4;
        let (start, end) = sim.polygon.edge(0).unwrap();
        let target = start + (end - start) * 0.05;
        sim.ball.position = target * 0.97;
        sim.ball.velocity = target * (400.0 / target.length());
    }

    for _ in 0..60 {
        session.frame(DT, MoveDirection::Stop, 0).unwrap();
        if session.game_state() == GameState::Scoring {
            break;
        }
    }

    assert_eq!(session.game_state(), GameState::Scoring);
    assert_eq!(session.simulation.score_display_timer, LOCAL_SCORE_DISPLAY_SECS);
    assert_eq!(session.simulation.last_score, 4);
    assert_eq!(session.simulation.score, 0);
    assert!(session.has_played);
    let events = session.drain_events();
    assert!(events.iter().any(|e| matches!(e, GameEventPayload::Goal { edge_index: 0, score: 4, .. })));

    session.frame(1.0, MoveDirection::Stop, 0).unwrap();
    assert_eq!(session.simulation.score_display_timer, LOCAL_SCORE_DISPLAY_SECS - 1.0);
}

#[test]
fn test_join_message_forms() {
    let legacy = ClientSession::online(GameConfig::default(), "abc", None);
    assert_eq!(
        legacy.join_message(),
        Some(ClientMessage::JoinRoom(JoinRoomPayload::Legacy("abc".into())))
    );

    let pinned = ClientSession::online(GameConfig::default(), "abc", Some("m-3".into()));
    assert_eq!(
        pinned.join_message(),
        Some(ClientMessage::JoinRoom(JoinRoomPayload::Detailed {
            room_id: "abc".into(),
            instance: Some("m-3".into())
        }))
    );
    assert_eq!(
        pinned.ready_message(true),
        ClientMessage::ToggleReady(ToggleReadyPayload { is_ready: true })
    );
    assert!(ClientSession::local(GameConfig::default()).join_message().is_none());
}

#[test]
fn test_init_sets_seat_and_polygon() {
    let mut session = ClientSession::online(GameConfig::default(), "room", None);
    assert_eq!(session.game_state(), GameState::Waiting);

    session.handle_server_message(
        ServerMessage::Init(InitPayload { player_index: -1, sides: 4, instance_id: String::new() }),
        0,
    );
    assert!(session.is_spectator());
    assert_eq!(session.simulation.polygon.sides(), 4);
    assert_eq!(session.simulation.polygon.vertices().len(), 4);
}

#[test]
fn test_input_sent_only_on_change() {
    let mut session = seated_session(0);
    session.handle_server_message(snapshot(GameState::Playing, Vec2::zero(), &[(0, 0.5)]), 1000);

    let sent: Vec<Option<ClientMessage>> = [
        MoveDirection::Forward,
        MoveDirection::Forward,
        MoveDirection::Stop,
        MoveDirection::Stop,
    ]
    .into_iter()
    .map(|dir| session.frame(DT, dir, 1000).unwrap())
    .collect();

    assert_eq!(
        sent,
        vec![
            Some(ClientMessage::Input(InputPayload { dir: 1 })),
            None,
            Some(ClientMessage::Input(InputPayload { dir: 0 })),
            None,
        ]
    );
}

#[test]
fn test_no_input_while_scoring() {
    let mut session = seated_session(0);
    session.handle_server_message(snapshot(GameState::Scoring, Vec2::zero(), &[(0, 0.5)]), 1000);
    assert_eq!(session.frame(DT, MoveDirection::Backward, 1000).unwrap(), None);
}

#[test]
fn test_interpolation_renders_behind_and_blends_own_paddle() {
    let mut session = seated_session(0);
    session.handle_server_message(
        snapshot(GameState::Playing, Vec2::new(0.0, 0.0), &[(0, 0.5), (1, 0.2)]),
        1000,
    );
    session.handle_server_message(
        snapshot(GameState::Playing, Vec2::new(20.0, 10.0), &[(0, 0.9), (1, 0.6)]),
        1100,
    );

    // Render time 1150 - 100 = 1050: halfway between the snapshots.
    session.apply_interpolation(1150);

    assert_eq!(session.simulation.ball.position, Vec2::new(10.0, 5.0));
    assert_eq!(session.simulation.ball.trail.front(), Some(&Vec2::new(10.0, 5.0)));
    let own = session.simulation.paddle(0).unwrap().position;
    let remote = session.simulation.paddle(1).unwrap().position;
    // Own paddle had no local prediction yet: starts at 0.5 and moves 30% toward 0.9.
    assert!((own - 0.62).abs() < 1e-5, "own paddle at {}", own);
    assert!((remote - 0.4).abs() < 1e-5, "remote paddle at {}", remote);
}

#[test]
fn test_goal_and_termination_reset_buffer() {
    let mut session = seated_session(1);
    session.handle_server_message(snapshot(GameState::Playing, Vec2::zero(), &[]), 1000);
    session.handle_server_message(snapshot(GameState::Playing, Vec2::zero(), &[]), 1016);
    assert_eq!(session.buffer.len(), 2);

    session.handle_server_message(
        ServerMessage::GameEvent(GameEventPayload::Goal { edge_index: 1, score: 6, time: 31 }),
        1020,
    );
    assert!(session.buffer.is_empty());
    assert_eq!((session.simulation.last_score, session.simulation.final_time), (6, 31));

    session.handle_server_message(snapshot(GameState::Playing, Vec2::zero(), &[]), 1040);
    session.handle_server_message(
        ServerMessage::GameTerminated(TerminatedPayload {
            reason: "A player left the game".into(),
            last_score: 2,
            final_time: 9,
        }),
        1050,
    );
    assert!(session.buffer.is_empty());
    assert_eq!(session.game_state(), GameState::Terminated);
    assert_eq!(session.termination_reason.as_deref(), Some("A player left the game"));
}

#[test]
fn test_rejoin_only_after_termination() {
    let mut session = seated_session(2);
    assert!(session.rejoin().is_none());

    session.handle_server_message(
        ServerMessage::GameTerminated(TerminatedPayload { reason: "gone".into(), last_score: 0, final_time: 0 }),
        0,
    );
    let message = session.rejoin();

    assert_eq!(message, Some(ClientMessage::JoinRoom(JoinRoomPayload::Legacy("room".into()))));
    assert_eq!(session.player_index, -1);
    assert_eq!(session.game_state(), GameState::Scoring);
    assert!(session.termination_reason.is_none());
}

#[test]
fn test_server_error_is_recorded() {
    let mut session = seated_session(0);
    session.handle_server_message(ServerMessage::wrong_instance("a", "b"), 0);
    let error = session.last_error.as_ref().unwrap();
    assert_eq!(error.message, "Connected to wrong instance");
    assert_eq!(error.expected_instance.as_deref(), Some("a"));
}

#[test]
fn test_wire_frames_feed_the_buffer() {
    let mut session = ClientSession::online(GameConfig::default(), "room", None);
    let init = parse_server_message(r#"{"event":"init","data":{"playerIndex":2,"sides":6,"instanceId":"m-1"}}"#)
        .unwrap();
    session.handle_server_message(init, 0);
    assert_eq!(session.player_index, 2);
    assert_eq!(session.simulation.polygon.sides(), 6);

    let frame = r#"{"event":"gameState","data":{
        "ball":{"x":12.5,"y":-3.0},"rotation":0.25,
        "paddles":[{"edgeIndex":2,"position":0.4,"width":0.5}],
        "readyEdges":[],"difficulty":1.5,"gameState":"PLAYING",
        "score":3,"lastScore":0,"finalTime":0,"timeElapsed":9.5,
        "scoreDisplayTimer":0.0,"countdownTimer":0.0,"timestamp":1700000000000}}"#;
    session.handle_server_message(parse_server_message(frame).unwrap(), 1_000);

    assert_eq!(session.game_state(), GameState::Playing);
    assert_eq!(session.simulation.score, 3);
    let latest = session.buffer.latest().expect("snapshot buffered");
    assert_eq!(latest.received_at, 1_000);
    assert_eq!(latest.state.ball, Vec2::new(12.5, -3.0));
    assert_eq!(latest.state.paddles[0].edge_index, 2);

    assert!(parse_server_message(r#"{"event":"gameState","data":{"ball":1}}"#).is_err());
}
