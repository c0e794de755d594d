#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Protocol serialization tests for the Connect Four client.
//!
//! Verifies that every message matches the JSON the game server actually
//! sends and accepts, using fixtures written out by hand.

use connect_four_client::protocol::{
    Board, ClientMessage, LeaderboardEntry, Opponent, Outcome, PlayerColor, ServerMessage,
    BOARD_COLS, BOARD_ROWS,
};
use serde_json::json;

// ════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════

fn parse(text: &str) -> ServerMessage {
    serde_json::from_str(text).expect("fixture should parse")
}

/// A mid-game board: red in the bottom-left corner, yellow on top of it.
const MID_GAME_BOARD: &str = r#"[
    [null, null, null, null, null, null, null],
    [null, null, null, null, null, null, null],
    [null, null, null, null, null, null, null],
    [null, null, null, null, null, null, null],
    ["yellow", null, null, null, null, null, null],
    ["red", null, null, null, null, null, null]
]"#;

// ════════════════════════════════════════════════════════════════════
// Outbound intents
// ════════════════════════════════════════════════════════════════════

#[test]
fn outbound_intents_match_server_contract() {
    let cases = [
        (
            ClientMessage::Join {
                username: "alice".into(),
            },
            json!({"type": "join", "username": "alice"}),
        ),
        (
            ClientMessage::Move {
                game_id: "g1".into(),
                column: 6,
            },
            json!({"type": "move", "gameId": "g1", "column": 6}),
        ),
        (
            ClientMessage::GetLeaderboard,
            json!({"type": "getLeaderboard"}),
        ),
        (
            ClientMessage::Rejoin {
                username: "alice".into(),
                game_id: "g1".into(),
            },
            json!({"type": "rejoin", "username": "alice", "gameId": "g1"}),
        ),
        (
            ClientMessage::Leave {
                username: "alice".into(),
            },
            json!({"type": "leave", "username": "alice"}),
        ),
    ];

    for (message, expected) in cases {
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            expected,
            "{} serialized wrongly",
            message.kind()
        );
    }
}

// ════════════════════════════════════════════════════════════════════
// Inbound events
// ════════════════════════════════════════════════════════════════════

#[test]
fn game_start_fixture() {
    let text = format!(
        r#"{{"type":"gameStart","gameId":"g1","yourColor":"red","currentPlayer":"red","board":{MID_GAME_BOARD},"opponent":"bot"}}"#
    );
    let ServerMessage::GameStart {
        game_id,
        your_color,
        current_player,
        board,
        opponent,
    } = parse(&text)
    else {
        panic!("expected gameStart");
    };

    assert_eq!(game_id, "g1");
    assert_eq!(your_color, PlayerColor::Red);
    assert_eq!(current_player, PlayerColor::Red);
    assert_eq!(opponent, Opponent::Bot);
    assert_eq!(board.cell(5, 0), Some(Some(PlayerColor::Red)));
    assert_eq!(board.cell(4, 0), Some(Some(PlayerColor::Yellow)));
    assert_eq!(board.cell(0, 0), Some(None));
    assert_eq!(board.disc_count(), 2);
}

#[test]
fn human_opponent_keeps_their_name() {
    let text = format!(
        r#"{{"type":"gameStart","gameId":"g2","yourColor":"yellow","currentPlayer":"red","board":{MID_GAME_BOARD},"opponent":"bob"}}"#
    );
    let ServerMessage::GameStart { opponent, .. } = parse(&text) else {
        panic!("expected gameStart");
    };
    assert_eq!(opponent, Opponent::Player("bob".into()));
    assert_eq!(opponent.display_name(), "bob");
    assert!(!opponent.is_bot());
}

#[test]
fn move_with_and_without_winner() {
    let ongoing = parse(&format!(
        r#"{{"type":"move","board":{MID_GAME_BOARD},"currentPlayer":"red","winner":null}}"#
    ));
    assert!(matches!(
        ongoing,
        ServerMessage::Move {
            current_player: PlayerColor::Red,
            winner: None,
            ..
        }
    ));

    // Servers omit `winner` on ordinary moves too.
    let omitted = parse(&format!(
        r#"{{"type":"move","board":{MID_GAME_BOARD},"currentPlayer":"red"}}"#
    ));
    assert_eq!(omitted, ongoing);

    let draw = parse(&format!(
        r#"{{"type":"move","board":{MID_GAME_BOARD},"currentPlayer":"yellow","winner":"draw"}}"#
    ));
    let ServerMessage::Move { winner, .. } = draw else {
        panic!("expected move");
    };
    assert_eq!(winner, Some(Outcome::Draw));
    assert_eq!(winner.and_then(Outcome::winner), None);
}

#[test]
fn rejoin_success_opponent_is_optional() {
    let text = format!(
        r#"{{"type":"rejoinSuccess","gameId":"g1","yourColor":"yellow","currentPlayer":"red","board":{MID_GAME_BOARD}}}"#
    );
    let ServerMessage::RejoinSuccess {
        opponent,
        your_color,
        ..
    } = parse(&text)
    else {
        panic!("expected rejoinSuccess");
    };
    assert_eq!(opponent, None);
    assert_eq!(your_color, PlayerColor::Yellow);
}

#[test]
fn leaderboard_rows_use_snake_case_totals() {
    let message = parse(
        r#"{"type":"leaderboard","data":[
            {"username":"alice","wins":7,"losses":2,"draws":1,"total_games":10},
            {"username":"bob","wins":0,"losses":0,"draws":0,"total_games":0}
        ]}"#,
    );
    let ServerMessage::Leaderboard { data } = message else {
        panic!("expected leaderboard");
    };
    assert_eq!(
        data[0],
        LeaderboardEntry {
            username: "alice".into(),
            wins: 7,
            losses: 2,
            draws: 1,
            total_games: 10,
        }
    );
    assert!((data[0].win_rate() - 70.0).abs() < f64::EPSILON);
    assert_eq!(data[1].win_rate(), 0.0);
}

#[test]
fn small_events() {
    assert_eq!(
        parse(r#"{"type":"waiting","timeLeft":10}"#),
        ServerMessage::Waiting { time_left: 10 }
    );
    assert_eq!(
        parse(r#"{"type":"error","message":"Game not found"}"#),
        ServerMessage::Error {
            message: "Game not found".into()
        }
    );
    assert_eq!(
        parse(r#"{"type":"opponentDisconnected"}"#),
        ServerMessage::OpponentDisconnected
    );
    assert_eq!(
        parse(r#"{"type":"opponentLeft","winner":"yellow"}"#),
        ServerMessage::OpponentLeft {
            winner: Some(Outcome::Yellow)
        }
    );
}

#[test]
fn unknown_types_parse_as_unknown() {
    let message = parse(r#"{"type":"chat","text":"gg"}"#);
    assert_eq!(message, ServerMessage::Unknown);
    assert_eq!(message.kind(), "unknown");
}

// ════════════════════════════════════════════════════════════════════
// Malformed input
// ════════════════════════════════════════════════════════════════════

#[test]
fn malformed_frames_are_errors_not_panics() {
    let bad = [
        "",
        "{",
        "[]",
        r#"{"timeLeft":10}"#,
        r#"{"type":"waiting","timeLeft":-1}"#,
        r#"{"type":"move","board":[],"currentPlayer":"red"}"#,
        r#"{"type":"move","board":[[null,null,null,null,null,null,null]],"currentPlayer":"red"}"#,
        r#"{"type":"gameStart","gameId":"g1","yourColor":"green","currentPlayer":"red","board":[],"opponent":"bot"}"#,
    ];
    for text in bad {
        assert!(
            serde_json::from_str::<ServerMessage>(text).is_err(),
            "expected {text:?} to be rejected"
        );
    }
}

#[test]
fn board_shape_is_fixed() {
    let mut rows = vec![vec![serde_json::Value::Null; BOARD_COLS]; BOARD_ROWS];
    assert!(serde_json::from_value::<Board>(json!(rows)).is_ok());

    rows[0].push(serde_json::Value::Null);
    assert!(serde_json::from_value::<Board>(json!(rows)).is_err());
}

#[test]
fn column_accepts_checks_top_row_only() {
    let mut cells = [[None; BOARD_COLS]; BOARD_ROWS];
    cells[0][3] = Some(PlayerColor::Yellow);
    let board = Board::from_rows(cells);

    assert!(!board.column_accepts(3));
    assert!(board.column_accepts(2));
    assert!(!board.column_accepts(BOARD_COLS));
}
