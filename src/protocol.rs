//! Wire-compatible protocol types for the Connect Four game server.
//!
//! Messages are JSON objects discriminated by a camelCase `type` field.
//! Field names follow the server's camelCase convention, except inside
//! leaderboard rows which the server emits in snake_case.

use serde::{Deserialize, Serialize};

/// Number of rows on the board. Row 0 is the top row.
pub const BOARD_ROWS: usize = 6;

/// Number of columns on the board.
pub const BOARD_COLS: usize = 7;

/// Opponent identity the server uses when a bot was assigned.
pub const BOT_OPPONENT: &str = "bot";

// ── Enums ───────────────────────────────────────────────────────────

/// One of the two disc colors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PlayerColor {
    Red,
    Yellow,
}

impl PlayerColor {
    /// The other player's color.
    pub fn opposite(self) -> Self {
        match self {
            Self::Red => Self::Yellow,
            Self::Yellow => Self::Red,
        }
    }
}

/// A board cell: empty, or occupied by one color.
pub type Cell = Option<PlayerColor>;

/// How a game ended. Serialized as the server's `winner` field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Red,
    Yellow,
    Draw,
}

impl Outcome {
    /// The winning color, or `None` for a draw.
    pub fn winner(self) -> Option<PlayerColor> {
        match self {
            Self::Red => Some(PlayerColor::Red),
            Self::Yellow => Some(PlayerColor::Yellow),
            Self::Draw => None,
        }
    }
}

impl From<PlayerColor> for Outcome {
    fn from(color: PlayerColor) -> Self {
        match color {
            PlayerColor::Red => Self::Red,
            PlayerColor::Yellow => Self::Yellow,
        }
    }
}

/// The opponent's display identity: a username, or the bot sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Opponent {
    Bot,
    Player(String),
}

impl Opponent {
    /// Name suitable for display next to the board.
    pub fn display_name(&self) -> &str {
        match self {
            Self::Bot => "Bot",
            Self::Player(name) => name,
        }
    }

    pub fn is_bot(&self) -> bool {
        matches!(self, Self::Bot)
    }
}

impl From<String> for Opponent {
    fn from(value: String) -> Self {
        if value == BOT_OPPONENT {
            Self::Bot
        } else {
            Self::Player(value)
        }
    }
}

impl From<Opponent> for String {
    fn from(value: Opponent) -> Self {
        match value {
            Opponent::Bot => BOT_OPPONENT.to_string(),
            Opponent::Player(name) => name,
        }
    }
}

// ── Board ───────────────────────────────────────────────────────────

/// The 6×7 grid handed down by the server.
///
/// Serialized as a JSON array of rows. A grid of any other shape fails to
/// deserialize, so the whole enclosing message is treated as malformed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    cells: [[Cell; BOARD_COLS]; BOARD_ROWS],
}

impl Board {
    /// An empty board.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a board from explicit rows, top row first.
    pub fn from_rows(cells: [[Cell; BOARD_COLS]; BOARD_ROWS]) -> Self {
        Self { cells }
    }

    /// The cell at `(row, column)`, or `None` when out of range.
    pub fn cell(&self, row: usize, column: usize) -> Option<Cell> {
        self.cells.get(row).and_then(|r| r.get(column)).copied()
    }

    /// Rows from top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[Cell; BOARD_COLS]> {
        self.cells.iter()
    }

    /// Whether a disc may still be dropped into `column`: its top cell is empty.
    pub fn column_accepts(&self, column: usize) -> bool {
        matches!(self.cell(0, column), Some(None))
    }

    /// Number of occupied cells.
    pub fn disc_count(&self) -> usize {
        self.cells.iter().flatten().filter(|c| c.is_some()).count()
    }
}

// ── Structs ─────────────────────────────────────────────────────────

/// One row of the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub username: String,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub total_games: u32,
}

impl LeaderboardEntry {
    /// Win percentage in `0.0..=100.0`; zero when no games were played.
    pub fn win_rate(&self) -> f64 {
        if self.total_games == 0 {
            return 0.0;
        }
        f64::from(self.wins) / f64::from(self.total_games) * 100.0
    }
}

// ── Messages ────────────────────────────────────────────────────────

/// Intents sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Enter matchmaking under a username.
    Join { username: String },
    /// Drop a disc into `column` of game `game_id`.
    Move { game_id: String, column: usize },
    /// Ask for the current leaderboard.
    GetLeaderboard,
    /// Resume an in-flight game after a connection gap.
    Rejoin { username: String, game_id: String },
    /// Abandon the current game or matchmaking.
    Leave { username: String },
}

impl ClientMessage {
    /// The wire `type` tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Move { .. } => "move",
            Self::GetLeaderboard => "getLeaderboard",
            Self::Rejoin { .. } => "rejoin",
            Self::Leave { .. } => "leave",
        }
    }
}

/// Events pushed from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Matchmaking in progress; `time_left` seconds until a bot is assigned.
    Waiting { time_left: u32 },
    /// A game started.
    GameStart {
        game_id: String,
        your_color: PlayerColor,
        current_player: PlayerColor,
        board: Board,
        opponent: Opponent,
    },
    /// A disc was dropped by either player.
    Move {
        board: Board,
        current_player: PlayerColor,
        #[serde(default)]
        winner: Option<Outcome>,
    },
    /// Leaderboard rows.
    Leaderboard {
        #[serde(default)]
        data: Vec<LeaderboardEntry>,
    },
    /// The server rejected an intent.
    Error { message: String },
    /// The rejoin handshake succeeded; full game snapshot.
    RejoinSuccess {
        game_id: String,
        your_color: PlayerColor,
        current_player: PlayerColor,
        board: Board,
        #[serde(default)]
        opponent: Option<Opponent>,
    },
    /// The opponent dropped; the forfeit window is running on the server.
    OpponentDisconnected,
    /// The opponent did not come back (or left); the game is over.
    OpponentLeft {
        #[serde(default)]
        winner: Option<Outcome>,
    },
    /// Any `type` this client does not understand.
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    /// The wire `type` tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Waiting { .. } => "waiting",
            Self::GameStart { .. } => "gameStart",
            Self::Move { .. } => "move",
            Self::Leaderboard { .. } => "leaderboard",
            Self::Error { .. } => "error",
            Self::RejoinSuccess { .. } => "rejoinSuccess",
            Self::OpponentDisconnected => "opponentDisconnected",
            Self::OpponentLeft { .. } => "opponentLeft",
            Self::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use serde_json::json;

    fn empty_grid() -> serde_json::Value {
        json!(vec![vec![serde_json::Value::Null; BOARD_COLS]; BOARD_ROWS])
    }

    #[test]
    fn client_messages_use_server_field_names() {
        let json = serde_json::to_value(ClientMessage::Move {
            game_id: "g1".into(),
            column: 3,
        })
        .unwrap();
        assert_eq!(json, json!({"type": "move", "gameId": "g1", "column": 3}));

        let json = serde_json::to_value(ClientMessage::Rejoin {
            username: "alice".into(),
            game_id: "g1".into(),
        })
        .unwrap();
        assert_eq!(
            json,
            json!({"type": "rejoin", "username": "alice", "gameId": "g1"})
        );

        let json = serde_json::to_value(ClientMessage::GetLeaderboard).unwrap();
        assert_eq!(json, json!({"type": "getLeaderboard"}));
    }

    #[test]
    fn parses_game_start_with_bot_opponent() {
        let raw = json!({
            "type": "gameStart",
            "gameId": "g1",
            "yourColor": "red",
            "currentPlayer": "yellow",
            "board": empty_grid(),
            "opponent": "bot"
        });
        let msg: ServerMessage = serde_json::from_value(raw).unwrap();
        match msg {
            ServerMessage::GameStart {
                game_id,
                your_color,
                current_player,
                board,
                opponent,
            } => {
                assert_eq!(game_id, "g1");
                assert_eq!(your_color, PlayerColor::Red);
                assert_eq!(current_player, PlayerColor::Yellow);
                assert_eq!(board, Board::empty());
                assert!(opponent.is_bot());
            }
            other => panic!("expected GameStart, got {other:?}"),
        }
    }

    #[test]
    fn move_with_null_winner_parses_as_unset() {
        let raw = json!({
            "type": "move",
            "board": empty_grid(),
            "currentPlayer": "red",
            "winner": null
        });
        let msg: ServerMessage = serde_json::from_value(raw).unwrap();
        assert!(matches!(msg, ServerMessage::Move { winner: None, .. }));
    }

    #[test]
    fn rejoin_success_without_opponent() {
        let raw = json!({
            "type": "rejoinSuccess",
            "gameId": "g9",
            "yourColor": "yellow",
            "currentPlayer": "yellow",
            "board": empty_grid()
        });
        let msg: ServerMessage = serde_json::from_value(raw).unwrap();
        assert!(matches!(
            msg,
            ServerMessage::RejoinSuccess { opponent: None, .. }
        ));
    }

    #[test]
    fn opponent_disconnected_ignores_empty_body() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"type":"opponentDisconnected"}"#).unwrap();
        assert_eq!(msg, ServerMessage::OpponentDisconnected);
    }

    #[test]
    fn unknown_type_maps_to_unknown() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"type":"spectatorJoined","who":"bob"}"#).unwrap();
        assert_eq!(msg, ServerMessage::Unknown);
    }

    #[test]
    fn wrongly_sized_board_is_rejected() {
        let raw = json!({
            "type": "move",
            "board": [[null, null], [null, null]],
            "currentPlayer": "red",
            "winner": null
        });
        assert!(serde_json::from_value::<ServerMessage>(raw).is_err());
    }

    #[test]
    fn column_accepts_checks_top_row_only() {
        let mut rows = [[None; BOARD_COLS]; BOARD_ROWS];
        for row in rows.iter_mut() {
            row[2] = Some(PlayerColor::Red);
        }
        rows[5][4] = Some(PlayerColor::Yellow);
        let board = Board::from_rows(rows);

        assert!(!board.column_accepts(2));
        assert!(board.column_accepts(4));
        assert!(!board.column_accepts(BOARD_COLS));
        assert_eq!(board.disc_count(), 7);
    }

    #[test]
    fn leaderboard_win_rate() {
        let entry: LeaderboardEntry = serde_json::from_value(json!({
            "username": "alice", "wins": 3, "losses": 1, "draws": 0, "total_games": 4
        }))
        .unwrap();
        assert!((entry.win_rate() - 75.0).abs() < f64::EPSILON);

        let fresh = LeaderboardEntry {
            total_games: 0,
            wins: 0,
            ..entry
        };
        assert_eq!(fresh.win_rate(), 0.0);
    }

    #[test]
    fn outcome_winner_and_opposite_color() {
        assert_eq!(Outcome::Draw.winner(), None);
        assert_eq!(Outcome::from(PlayerColor::Yellow), Outcome::Yellow);
        assert_eq!(PlayerColor::Red.opposite(), PlayerColor::Yellow);
    }
}
