#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Integration-style client tests for the Connect Four client.
//!
//! Drives a real `GameClient` against the in-memory server from
//! `tests/common` on a paused clock, covering session persistence, rejoin
//! recovery, the manual reconnect prompt and every countdown.

mod common;

use std::sync::Arc;
use std::time::Duration;

use connect_four_client::protocol::{LeaderboardEntry, Outcome, PlayerColor};
use connect_four_client::state::Screen;
use connect_four_client::{
    ClientConfig, ClientError, ClientEvent, ClientMessage, MemoryStore, SessionRecord,
    SessionStore,
};
use tokio::time::Instant;

use common::{
    board_with_disc, error_json, game_start_json, leaderboard_message, move_message,
    opponent_disconnected_json, opponent_left_json, rejoin_success_json, settle, start_game,
    waiting_json, Harness,
};

fn store_with_record(game_id: &str, username: &str) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.save_record(&SessionRecord::new(game_id, username));
    store
}

fn drain_events(harness: &mut Harness) {
    while harness.events.try_recv().is_ok() {}
}

// ════════════════════════════════════════════════════════════════════
// Matchmaking and game start
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn waiting_clears_session_and_starts_countdown() {
    let mut harness = Harness::start();
    let server = start_game(&mut harness, "alice", "g1").await;
    assert!(harness.store.load_record().is_some());

    server.push(waiting_json(10));
    let snapshot = harness.wait_for(|s| s.screen() == Screen::Waiting).await;

    assert_eq!(snapshot.matchmaking_time_left, 10);
    assert_eq!(harness.store.load_record(), None);
}

#[tokio::test(start_paused = true)]
async fn matchmaking_countdown_ticks_to_zero_and_stops() {
    let mut harness = Harness::start();
    let mut server = harness.server.accept().await;
    harness.wait_for(|s| s.phase.is_connected()).await;
    harness.client.join("alice").unwrap();
    server.next_sent().await;

    server.push(waiting_json(3));
    harness.wait_for(|s| s.screen() == Screen::Waiting).await;

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(harness.snapshot().await.matchmaking_time_left, 2);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(harness.snapshot().await.matchmaking_time_left, 0);
}

#[tokio::test(start_paused = true)]
async fn game_start_persists_session_record() {
    let mut harness = Harness::start();
    let mut server = harness.server.accept().await;
    harness.wait_for(|s| s.phase.is_connected()).await;

    harness.client.join("  alice  ").unwrap();
    assert_eq!(
        server.next_sent().await,
        ClientMessage::Join {
            username: "alice".into()
        }
    );
    let joining = harness.snapshot().await;
    assert!(joining.app.joining);

    server.push(game_start_json("g1", "red", "red", "bot"));
    let snapshot = harness.wait_for(|s| s.screen() == Screen::Playing).await;

    let game = snapshot.game().unwrap();
    assert_eq!(game.game_id, "g1");
    assert_eq!(game.your_color, PlayerColor::Red);
    assert_eq!(game.opponent_name(), "Bot");
    assert!(game.is_my_turn());
    assert!(!snapshot.app.joining);
    assert_eq!(
        harness.store.load_record(),
        Some(SessionRecord::new("g1", "alice"))
    );
}

#[tokio::test(start_paused = true)]
async fn game_start_clears_matchmaking_countdown() {
    let mut harness = Harness::start();
    let mut server = harness.server.accept().await;
    harness.wait_for(|s| s.phase.is_connected()).await;
    harness.client.join("alice").unwrap();
    server.next_sent().await;

    server.push(waiting_json(10));
    harness.wait_for(|s| s.screen() == Screen::Waiting).await;
    tokio::time::sleep(Duration::from_millis(4500)).await;
    assert_eq!(harness.snapshot().await.matchmaking_time_left, 6);

    server.push(game_start_json("g1", "yellow", "red", "bob"));
    harness.wait_for(|s| s.screen() == Screen::Playing).await;
    drain_events(&mut harness);

    // No tick may fire into the new screen.
    tokio::time::sleep(Duration::from_secs(15)).await;
    assert!(harness.events.try_recv().is_err());
    assert_eq!(harness.snapshot().await.matchmaking_time_left, 10);
}

#[tokio::test(start_paused = true)]
async fn join_is_single_flight() {
    let mut harness = Harness::start();
    let mut server = harness.server.accept().await;
    harness.wait_for(|s| s.phase.is_connected()).await;

    harness.client.join("alice").unwrap();
    harness.client.join("alice").unwrap();
    settle().await;

    assert_eq!(server.drain_sent().len(), 1);
    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.app.error_message(), Some("Already joining a game..."));

    // The brief notice clears after three seconds.
    tokio::time::sleep(Duration::from_millis(3100)).await;
    assert_eq!(harness.snapshot().await.app.error, None);
}

#[tokio::test(start_paused = true)]
async fn join_without_connection_shows_notice() {
    let mut harness = Harness::start();
    // Set before the session task first runs, so the startup dial is refused.
    harness.server.set_refusing(true);
    harness
        .wait_for(|s| s.app.error_message() == Some("Failed to connect to game server"))
        .await;
    assert!(!harness.client.is_connected());

    harness.client.join("alice").unwrap();
    let snapshot = harness
        .wait_for(|s| s.app.error_message() == Some("Not connected to server"))
        .await;
    assert!(!snapshot.app.joining);
}

#[tokio::test(start_paused = true)]
async fn invalid_username_is_rejected_locally() {
    let mut harness = Harness::start();
    let mut server = harness.server.accept().await;
    harness.wait_for(|s| s.phase.is_connected()).await;

    let err = harness.client.join("a").unwrap_err();
    assert!(matches!(err, ClientError::InvalidUsername(_)));
    let err = harness.client.join("x".repeat(21)).unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid username: Username must be less than 20 characters"
    );

    settle().await;
    assert!(server.drain_sent().is_empty());
}

// ════════════════════════════════════════════════════════════════════
// Moves and game end
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn moves_apply_in_arrival_order() {
    let mut harness = Harness::start();
    let server = start_game(&mut harness, "alice", "g1").await;

    let boards = [
        board_with_disc(0, PlayerColor::Red),
        board_with_disc(3, PlayerColor::Yellow),
        board_with_disc(6, PlayerColor::Red),
    ];
    for (i, board) in boards.iter().enumerate() {
        let current = if i % 2 == 0 {
            PlayerColor::Yellow
        } else {
            PlayerColor::Red
        };
        server.push_message(&move_message(board.clone(), current, None));
    }

    let snapshot = harness
        .wait_for(|s| s.game().is_some_and(|g| g.board == boards[2]))
        .await;
    let game = snapshot.game().unwrap();
    assert_eq!(game.current_player, PlayerColor::Yellow);
    assert_eq!(snapshot.screen(), Screen::Playing);
    assert!(harness.store.load_record().is_some());
}

#[tokio::test(start_paused = true)]
async fn winning_move_finishes_and_clears_everything() {
    let mut harness = Harness::start();
    let server = start_game(&mut harness, "alice", "g1").await;

    server.push(opponent_disconnected_json());
    harness.wait_for(|s| s.opponent_disconnected).await;

    server.push_message(&move_message(
        board_with_disc(2, PlayerColor::Red),
        PlayerColor::Yellow,
        Some(Outcome::Red),
    ));
    let snapshot = harness.wait_for(|s| s.screen() == Screen::Finished).await;

    assert!(!snapshot.opponent_disconnected);
    assert_eq!(snapshot.result_message(), Some("You Win!"));
    assert_eq!(harness.store.load_record(), None);

    // Moves after the outcome are ignored.
    server.push_message(&move_message(
        board_with_disc(5, PlayerColor::Yellow),
        PlayerColor::Red,
        None,
    ));
    settle().await;
    let after = harness.snapshot().await;
    assert_eq!(after.game(), snapshot.game());
}

#[tokio::test(start_paused = true)]
async fn opponent_left_is_a_forfeit_win() {
    let mut harness = Harness::start();
    let server = start_game(&mut harness, "alice", "g1").await;

    server.push(opponent_left_json("red"));
    let snapshot = harness.wait_for(|s| s.screen() == Screen::Finished).await;

    assert_eq!(snapshot.result_message(), Some("You Win!"));
    assert_eq!(harness.store.load_record(), None);
}

#[tokio::test(start_paused = true)]
async fn make_move_sends_only_when_playable() {
    let mut harness = Harness::start();
    let mut server = start_game(&mut harness, "alice", "g1").await;

    harness.client.make_move(3).unwrap();
    assert_eq!(
        server.next_sent().await,
        ClientMessage::Move {
            game_id: "g1".into(),
            column: 3
        }
    );

    // Now yellow's turn.
    server.push_message(&move_message(
        board_with_disc(3, PlayerColor::Red),
        PlayerColor::Yellow,
        None,
    ));
    harness
        .wait_for(|s| s.game().is_some_and(|g| !g.is_my_turn()))
        .await;
    harness.client.make_move(4).unwrap();
    settle().await;
    assert!(server.drain_sent().is_empty());

    assert!(matches!(
        harness.client.make_move(7),
        Err(ClientError::InvalidColumn(7))
    ));
}

#[tokio::test(start_paused = true)]
async fn duplicate_game_start_and_rejoin_success_are_idempotent() {
    let mut harness = Harness::start();
    let server = start_game(&mut harness, "alice", "g1").await;
    let first = harness.snapshot().await;

    server.push(game_start_json("g1", "red", "red", "bot"));
    settle().await;
    assert_eq!(harness.snapshot().await, first);

    server.push(rejoin_success_json("g1", "red", "red"));
    settle().await;
    let rejoined = harness.snapshot().await;
    server.push(rejoin_success_json("g1", "red", "red"));
    settle().await;
    assert_eq!(harness.snapshot().await, rejoined);
    assert_eq!(
        harness.store.load_record(),
        Some(SessionRecord::new("g1", "alice"))
    );
}

// ════════════════════════════════════════════════════════════════════
// Server notices and malformed input
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn server_error_expires_and_clears_joining() {
    let mut harness = Harness::start();
    let mut server = harness.server.accept().await;
    harness.wait_for(|s| s.phase.is_connected()).await;
    harness.client.join("alice").unwrap();
    server.next_sent().await;

    server.push(error_json("Username already in a game"));
    let snapshot = harness
        .wait_for(|s| s.app.error_message().is_some())
        .await;
    assert_eq!(
        snapshot.app.error_message(),
        Some("Username already in a game")
    );
    assert!(!snapshot.app.joining);

    tokio::time::sleep(Duration::from_millis(4900)).await;
    assert!(harness.snapshot().await.app.error.is_some());
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(harness.snapshot().await.app.error, None);
}

#[tokio::test(start_paused = true)]
async fn malformed_and_unknown_messages_are_ignored() {
    let mut harness = Harness::start();
    let server = start_game(&mut harness, "alice", "g1").await;
    let before = harness.snapshot().await;

    server.push("{not json");
    server.push(r#"{"type":"spectate","gameId":"g1"}"#);
    server.push(r#"{"type":"move","board":[[null]],"currentPlayer":"yellow"}"#);
    settle().await;
    assert_eq!(harness.snapshot().await, before);

    // The stream is still alive.
    server.push(opponent_disconnected_json());
    harness.wait_for(|s| s.opponent_disconnected).await;
}

#[tokio::test(start_paused = true)]
async fn leaderboard_toggle_fetches_rows() {
    let mut harness = Harness::start();
    let mut server = harness.server.accept().await;
    harness.wait_for(|s| s.phase.is_connected()).await;

    harness.client.toggle_leaderboard().unwrap();
    assert_eq!(server.next_sent().await, ClientMessage::GetLeaderboard);

    server.push_message(&leaderboard_message(vec![LeaderboardEntry {
        username: "alice".into(),
        wins: 3,
        losses: 1,
        draws: 0,
        total_games: 4,
    }]));
    let snapshot = harness.wait_for(|s| !s.app.leaderboard.is_empty()).await;
    assert!(snapshot.app.leaderboard_visible);
    assert_eq!(snapshot.app.leaderboard[0].win_rate(), 75.0);

    // Closing does not fetch.
    harness.client.toggle_leaderboard().unwrap();
    harness.wait_for(|s| !s.app.leaderboard_visible).await;
    assert!(server.drain_sent().is_empty());
}

// ════════════════════════════════════════════════════════════════════
// Opponent liveness
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn opponent_window_counts_down_and_resets() {
    let mut harness = Harness::start();
    let mut server = start_game(&mut harness, "alice", "g1").await;

    server.push(opponent_disconnected_json());
    let snapshot = harness.wait_for(|s| s.opponent_disconnected).await;
    assert_eq!(snapshot.opponent_time_left, 30);

    tokio::time::sleep(Duration::from_millis(12_500)).await;
    assert_eq!(harness.snapshot().await.opponent_time_left, 18);

    // Moves are refused while the opponent is away.
    harness.client.make_move(0).unwrap();
    settle().await;
    assert!(server.drain_sent().is_empty());
    assert_eq!(
        harness.snapshot().await.app.error_message(),
        Some("Cannot make moves while opponent is disconnected")
    );

    // A second drop restarts the window at full length.
    server.push(opponent_disconnected_json());
    settle().await;
    assert_eq!(harness.snapshot().await.opponent_time_left, 30);

    // Never below zero.
    tokio::time::sleep(Duration::from_secs(45)).await;
    let snapshot = harness.snapshot().await;
    assert!(snapshot.opponent_disconnected);
    assert_eq!(snapshot.opponent_time_left, 0);

    // Any move proves the opponent is back.
    server.push_message(&move_message(
        board_with_disc(1, PlayerColor::Yellow),
        PlayerColor::Red,
        None,
    ));
    let snapshot = harness.wait_for(|s| !s.opponent_disconnected).await;
    assert_eq!(snapshot.opponent_time_left, 30);
}

#[tokio::test(start_paused = true)]
async fn rejoin_success_clears_opponent_window() {
    let mut harness = Harness::start();
    let server = start_game(&mut harness, "alice", "g1").await;

    server.push(opponent_disconnected_json());
    harness.wait_for(|s| s.opponent_disconnected).await;

    server.push(rejoin_success_json("g1", "red", "red"));
    harness.wait_for(|s| !s.opponent_disconnected).await;
}

// ════════════════════════════════════════════════════════════════════
// Session recovery
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn drop_during_game_shows_prompt_after_debounce() {
    let mut harness = Harness::start();
    let server = start_game(&mut harness, "alice", "g1").await;

    harness.server.set_refusing(true);
    let dropped_at = Instant::now();
    drop(server);

    let snapshot = harness.wait_for(|s| s.reconnect_prompt_visible).await;
    let elapsed = dropped_at.elapsed();
    assert!(
        elapsed >= Duration::from_millis(3000) && elapsed < Duration::from_millis(3100),
        "prompt shown after {elapsed:?}"
    );
    assert!(!snapshot.phase.is_connected());
    assert_eq!(snapshot.screen(), Screen::Playing);
    assert!(harness.store.load_record().is_some());
}

#[tokio::test(start_paused = true)]
async fn reopen_after_drop_rejoins_and_hides_prompt() {
    let mut harness = Harness::start();
    let server = start_game(&mut harness, "alice", "g1").await;

    harness.server.set_refusing(true);
    drop(server);
    harness.wait_for(|s| s.reconnect_prompt_visible).await;

    // The next scheduled redial succeeds.
    harness.server.set_refusing(false);
    let mut server = harness.server.accept().await;
    assert_eq!(
        server.next_sent().await,
        ClientMessage::Rejoin {
            username: "alice".into(),
            game_id: "g1".into()
        }
    );
    assert_eq!(harness.snapshot().await.rejoin_attempts, 1);

    server.push(rejoin_success_json("g1", "red", "red"));
    let snapshot = harness
        .wait_for(|s| !s.reconnect_prompt_visible && s.rejoin_attempts == 0)
        .await;
    assert_eq!(snapshot.screen(), Screen::Playing);
    assert!(snapshot.phase.is_connected());

    // The episode is over: no further rejoins.
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert!(server.drain_sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn momentary_drop_does_not_show_prompt() {
    let config = ClientConfig::default().with_reconnect_base_delay(Duration::from_millis(500));
    let mut harness = Harness::start_with(Arc::new(MemoryStore::new()), config);
    let server = start_game(&mut harness, "alice", "g1").await;

    drop(server);
    let mut server = harness.server.accept().await;
    assert!(matches!(
        server.next_sent().await,
        ClientMessage::Rejoin { .. }
    ));
    server.push(rejoin_success_json("g1", "red", "red"));
    harness.wait_for(|s| s.rejoin_attempts == 0).await;

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(!harness.snapshot().await.reconnect_prompt_visible);
}

#[tokio::test(start_paused = true)]
async fn reconnect_without_active_game_sends_no_rejoin() {
    let config = ClientConfig::default().with_reconnect_base_delay(Duration::from_millis(100));
    let mut harness = Harness::start_with(Arc::new(MemoryStore::new()), config);
    let server = harness.server.accept().await;
    harness.wait_for(|s| s.phase.is_connected()).await;

    drop(server);
    let mut server = harness.server.accept().await;
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert!(server.drain_sent().is_empty());
    assert!(!harness.snapshot().await.reconnect_prompt_visible);
}

#[tokio::test(start_paused = true)]
async fn restart_with_saved_session_rejoins_on_open() {
    let store = store_with_record("g7", "carol");
    let mut harness = Harness::start_with(store, ClientConfig::default());

    let mut server = harness.server.accept().await;
    assert_eq!(
        server.next_sent().await,
        ClientMessage::Rejoin {
            username: "carol".into(),
            game_id: "g7".into()
        }
    );
    server.push(rejoin_success_json("g7", "yellow", "red"));
    let snapshot = harness.wait_for(|s| s.screen() == Screen::Playing).await;

    assert_eq!(snapshot.app.username.as_deref(), Some("carol"));
    assert_eq!(snapshot.result_message(), None);
    assert_eq!(snapshot.rejoin_attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn rejoin_gives_up_after_five_attempts() {
    let store = store_with_record("g1", "alice");
    let mut harness = Harness::start_with(store, ClientConfig::default());
    let mut server = harness.server.accept().await;

    let started = Instant::now();
    for _ in 0..5 {
        assert!(matches!(
            server.next_sent().await,
            ClientMessage::Rejoin { .. }
        ));
    }
    assert!(started.elapsed() >= Duration::from_millis(8000));

    let snapshot = harness.wait_for(|s| s.reconnect_prompt_visible).await;
    assert_eq!(snapshot.rejoin_attempts, 5);

    // No sixth automatic attempt, and the prompt is raised once.
    drain_events(&mut harness);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(server.drain_sent().is_empty());
    assert!(harness.events.try_recv().is_err());
    assert!(harness.snapshot().await.reconnect_prompt_visible);
}

#[tokio::test(start_paused = true)]
async fn manual_reconnect_on_open_transport_rejoins_immediately() {
    let store = store_with_record("g1", "alice");
    let mut harness = Harness::start_with(store, ClientConfig::default());
    let mut server = harness.server.accept().await;
    for _ in 0..5 {
        server.next_sent().await;
    }
    harness.wait_for(|s| s.reconnect_prompt_visible).await;

    harness.client.manual_reconnect().unwrap();
    assert_eq!(
        server.next_sent().await,
        ClientMessage::Rejoin {
            username: "alice".into(),
            game_id: "g1".into()
        }
    );
    let snapshot = harness.snapshot().await;
    assert!(!snapshot.reconnect_prompt_visible);
    assert_eq!(snapshot.rejoin_attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn manual_reconnect_reopens_transport_first() {
    let config = ClientConfig::default().with_max_reconnect_attempts(1);
    let mut harness = Harness::start_with(Arc::new(MemoryStore::new()), config);
    let server = start_game(&mut harness, "alice", "g1").await;

    // Exhaust transport retries so only the manual path can reopen.
    harness.server.set_refusing(true);
    drop(server);
    harness.wait_for(|s| s.reconnect_prompt_visible).await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    let dials = harness.server.dial_count();

    harness.server.set_refusing(false);
    harness.client.manual_reconnect().unwrap();
    let mut server = harness.server.accept().await;
    assert_eq!(harness.server.dial_count(), dials + 1);
    assert!(matches!(
        server.next_sent().await,
        ClientMessage::Rejoin { .. }
    ));
    assert!(!harness.snapshot().await.reconnect_prompt_visible);
}

#[tokio::test(start_paused = true)]
async fn failed_manual_reopen_reshows_prompt() {
    let config = ClientConfig::default().with_max_reconnect_attempts(1);
    let mut harness = Harness::start_with(Arc::new(MemoryStore::new()), config);
    let server = start_game(&mut harness, "alice", "g1").await;

    harness.server.set_refusing(true);
    drop(server);
    harness.wait_for(|s| s.reconnect_prompt_visible).await;

    harness.client.manual_reconnect().unwrap();
    let snapshot = harness
        .wait_for(|s| s.app.error_message() == Some("Failed to reconnect to server"))
        .await;
    assert!(snapshot.reconnect_prompt_visible);
    assert_eq!(snapshot.rejoin_attempts, 0);
}

// ════════════════════════════════════════════════════════════════════
// Leaving and teardown
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn exit_game_sends_leave_and_forgets_session() {
    let mut harness = Harness::start();
    let mut server = start_game(&mut harness, "alice", "g1").await;

    harness.client.request_exit().unwrap();
    harness.wait_for(|s| s.app.exit_confirm_visible).await;
    harness.client.cancel_exit().unwrap();
    harness.wait_for(|s| !s.app.exit_confirm_visible).await;

    harness.client.request_exit().unwrap();
    harness.client.exit_game().unwrap();
    assert_eq!(
        server.next_sent().await,
        ClientMessage::Leave {
            username: "alice".into()
        }
    );
    let snapshot = harness.wait_for(|s| s.screen() == Screen::Login).await;
    assert_eq!(snapshot.app.username, None);
    assert_eq!(snapshot.game(), None);
    assert!(!snapshot.app.exit_confirm_visible);
    assert_eq!(harness.store.load_record(), None);

    // A later drop is not a recovery event.
    harness.server.set_refusing(true);
    drop(server);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(!harness.snapshot().await.reconnect_prompt_visible);
}

#[tokio::test(start_paused = true)]
async fn exit_from_matchmaking_stops_countdown() {
    let mut harness = Harness::start();
    let mut server = harness.server.accept().await;
    harness.wait_for(|s| s.phase.is_connected()).await;
    harness.client.join("alice").unwrap();
    server.next_sent().await;
    server.push(waiting_json(10));
    harness.wait_for(|s| s.screen() == Screen::Waiting).await;

    harness.client.exit_game().unwrap();
    harness.wait_for(|s| s.screen() == Screen::Login).await;
    drain_events(&mut harness);

    tokio::time::sleep(Duration::from_secs(15)).await;
    assert!(harness.events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn play_again_rejoins_queue_with_same_name() {
    let mut harness = Harness::start();
    let mut server = start_game(&mut harness, "alice", "g1").await;

    server.push(opponent_left_json("red"));
    harness.wait_for(|s| s.screen() == Screen::Finished).await;

    harness.client.play_again().unwrap();
    assert_eq!(
        server.next_sent().await,
        ClientMessage::Join {
            username: "alice".into()
        }
    );
    let snapshot = harness.wait_for(|s| s.game().is_none()).await;
    assert!(snapshot.app.joining);

    server.push(waiting_json(10));
    harness.wait_for(|s| s.screen() == Screen::Waiting).await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_every_timer() {
    let mut harness = Harness::start();
    let server = start_game(&mut harness, "alice", "g1").await;

    server.push(opponent_disconnected_json());
    harness.wait_for(|s| s.opponent_disconnected).await;
    harness.server.set_refusing(true);
    drop(server);
    settle().await;

    harness.client.shutdown().await;
    let dials = harness.server.dial_count();

    let mut last = None;
    while let Some(event) = harness.events.recv().await {
        last = Some(event);
    }
    assert_eq!(last, Some(ClientEvent::Stopped));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(harness.server.dial_count(), dials);
    assert!(matches!(
        harness.client.make_move(0),
        Err(ClientError::NotConnected)
    ));
}
