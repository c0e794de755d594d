//! Inbound message dispatcher.
//!
//! [`dispatch`] is a pure function from the current [`AppState`] and one
//! [`ServerMessage`] to the next state plus the [`Effect`]s the session
//! driver must apply to the parts of the client it owns (session store,
//! recovery controller, countdowns, error expiry).

use tracing::debug;

use crate::protocol::ServerMessage;
use crate::state::{AppState, GameState, NoticeLifetime, Screen};
use crate::store::SessionRecord;

/// A side effect requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    SaveSession(SessionRecord),
    ClearSession,
    ClearDisconnectFlag,
    /// A fresh game started: zero the rejoin counter and hide the prompt.
    ResetRecovery,
    /// The rejoin handshake succeeded.
    RejoinSucceeded,
    StartOpponentWindow,
    ClearOpponentWindow,
    StartMatchmakingCountdown(u32),
    StopMatchmakingCountdown,
    /// Clear the current error once its lifetime elapses.
    ExpireError(NoticeLifetime),
}

/// Result of applying one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: AppState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn unchanged(state: &AppState) -> Self {
        Self {
            state: state.clone(),
            effects: Vec::new(),
        }
    }
}

/// Apply `message` to `state`.
pub fn dispatch(state: &AppState, message: &ServerMessage) -> Transition {
    let mut next = state.clone();
    let mut effects = Vec::new();

    match message {
        ServerMessage::Waiting { time_left } => {
            effects.push(Effect::ClearSession);
            effects.push(Effect::ClearDisconnectFlag);
            next.screen = Screen::Waiting;
            next.joining = false;
            effects.push(Effect::StartMatchmakingCountdown(*time_left));
        }

        ServerMessage::GameStart {
            game_id,
            your_color,
            current_player,
            board,
            opponent,
        } => {
            next.game = Some(GameState {
                game_id: game_id.clone(),
                your_color: *your_color,
                current_player: *current_player,
                board: board.clone(),
                opponent: Some(opponent.clone()),
                outcome: None,
            });
            next.screen = Screen::Playing;
            next.joining = false;
            effects.extend([
                Effect::ResetRecovery,
                Effect::ClearOpponentWindow,
                Effect::ClearDisconnectFlag,
                Effect::StopMatchmakingCountdown,
            ]);
            match &next.username {
                Some(username) => {
                    effects.push(Effect::SaveSession(SessionRecord::new(
                        game_id.clone(),
                        username.clone(),
                    )));
                }
                None => debug!(game_id = %game_id, "game started without a username, not persisting session"),
            }
        }

        ServerMessage::Move {
            board,
            current_player,
            winner,
        } => {
            let Some(game) = next.game.as_mut() else {
                debug!("move without an active game, ignoring");
                return Transition::unchanged(state);
            };
            if game.is_over() {
                debug!("move after game over, ignoring");
                return Transition::unchanged(state);
            }
            game.board = board.clone();
            game.current_player = *current_player;
            game.outcome = *winner;
            effects.push(Effect::ClearOpponentWindow);
            if winner.is_some() {
                next.screen = Screen::Finished;
                effects.push(Effect::ClearDisconnectFlag);
                effects.push(Effect::ClearSession);
            }
        }

        ServerMessage::RejoinSuccess {
            game_id,
            your_color,
            current_player,
            board,
            opponent,
        } => {
            next.game = Some(GameState {
                game_id: game_id.clone(),
                your_color: *your_color,
                current_player: *current_player,
                board: board.clone(),
                opponent: opponent.clone(),
                outcome: None,
            });
            next.screen = Screen::Playing;
            next.clear_error();
            effects.push(Effect::RejoinSucceeded);
            effects.push(Effect::ClearOpponentWindow);
        }

        ServerMessage::Leaderboard { data } => {
            next.leaderboard = data.clone();
        }

        ServerMessage::Error { message } => {
            next.set_error(message.clone());
            next.joining = false;
            effects.push(Effect::ExpireError(NoticeLifetime::Standard));
        }

        ServerMessage::OpponentDisconnected => {
            next.clear_error();
            effects.push(Effect::StartOpponentWindow);
        }

        ServerMessage::OpponentLeft { winner } => {
            if let Some(game) = next.game.as_mut() {
                game.outcome = *winner;
            }
            next.screen = Screen::Finished;
            effects.extend([
                Effect::ClearOpponentWindow,
                Effect::ClearDisconnectFlag,
                Effect::ClearSession,
            ]);
        }

        ServerMessage::Unknown => {
            debug!("ignoring unknown server message");
            return Transition::unchanged(state);
        }
    }

    Transition {
        state: next,
        effects,
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
    use crate::protocol::{Board, LeaderboardEntry, Opponent, Outcome, PlayerColor, BOARD_COLS, BOARD_ROWS};

    fn game_start(game_id: &str) -> ServerMessage {
        ServerMessage::GameStart {
            game_id: game_id.into(),
            your_color: PlayerColor::Red,
            current_player: PlayerColor::Red,
            board: Board::empty(),
            opponent: Opponent::Bot,
        }
    }

    fn board_with(column: usize, color: PlayerColor) -> Board {
        let mut rows = [[None; BOARD_COLS]; BOARD_ROWS];
        rows[BOARD_ROWS - 1][column] = Some(color);
        Board::from_rows(rows)
    }

    fn playing(username: &str) -> AppState {
        let state = AppState {
            username: Some(username.into()),
            joining: true,
            ..AppState::default()
        };
        dispatch(&state, &game_start("g1")).state
    }

    #[test]
    fn waiting_moves_to_matchmaking_and_clears_session() {
        let state = AppState {
            joining: true,
            ..AppState::default()
        };
        let t = dispatch(&state, &ServerMessage::Waiting { time_left: 10 });

        assert_eq!(t.state.screen, Screen::Waiting);
        assert!(!t.state.joining);
        assert!(t.effects.contains(&Effect::ClearSession));
        assert!(t.effects.contains(&Effect::ClearDisconnectFlag));
        assert!(t.effects.contains(&Effect::StartMatchmakingCountdown(10)));
    }

    #[test]
    fn game_start_replaces_game_and_persists_session() {
        let state = AppState {
            username: Some("alice".into()),
            joining: true,
            ..AppState::default()
        };
        let t = dispatch(&state, &game_start("g1"));

        assert_eq!(t.state.screen, Screen::Playing);
        assert!(!t.state.joining);
        let game = t.state.game.as_ref().unwrap();
        assert_eq!(game.game_id, "g1");
        assert_eq!(game.outcome, None);
        assert_eq!(game.opponent, Some(Opponent::Bot));
        assert!(t
            .effects
            .contains(&Effect::SaveSession(SessionRecord::new("g1", "alice"))));
        assert!(t.effects.contains(&Effect::ResetRecovery));
        assert!(t.effects.contains(&Effect::StopMatchmakingCountdown));
    }

    #[test]
    fn game_start_without_username_skips_persistence() {
        let t = dispatch(&AppState::default(), &game_start("g1"));
        assert!(!t
            .effects
            .iter()
            .any(|e| matches!(e, Effect::SaveSession(_))));
    }

    #[test]
    fn duplicate_game_start_is_stable() {
        let first = playing("alice");
        let second = dispatch(&first, &game_start("g1"));
        assert_eq!(second.state, first);
    }

    #[test]
    fn moves_track_latest_event() {
        let mut state = playing("alice");
        let moves = [
            (board_with(0, PlayerColor::Red), PlayerColor::Yellow),
            (board_with(3, PlayerColor::Yellow), PlayerColor::Red),
            (board_with(6, PlayerColor::Red), PlayerColor::Yellow),
        ];
        for (board, current_player) in moves.iter().cloned() {
            state = dispatch(
                &state,
                &ServerMessage::Move {
                    board: board.clone(),
                    current_player,
                    winner: None,
                },
            )
            .state;
            let game = state.game.as_ref().unwrap();
            assert_eq!(game.board, board);
            assert_eq!(game.current_player, current_player);
        }
        assert_eq!(state.screen, Screen::Playing);
    }

    #[test]
    fn winning_move_finishes_and_clears_session() {
        let state = playing("alice");
        let t = dispatch(
            &state,
            &ServerMessage::Move {
                board: board_with(0, PlayerColor::Red),
                current_player: PlayerColor::Yellow,
                winner: Some(Outcome::Red),
            },
        );

        assert_eq!(t.state.screen, Screen::Finished);
        assert_eq!(t.state.game.as_ref().unwrap().outcome, Some(Outcome::Red));
        assert!(t.effects.contains(&Effect::ClearSession));
        assert!(t.effects.contains(&Effect::ClearOpponentWindow));
        assert!(t.effects.contains(&Effect::ClearDisconnectFlag));
    }

    #[test]
    fn move_after_outcome_is_ignored() {
        let finished = dispatch(
            &playing("alice"),
            &ServerMessage::Move {
                board: board_with(0, PlayerColor::Red),
                current_player: PlayerColor::Yellow,
                winner: Some(Outcome::Red),
            },
        )
        .state;

        let t = dispatch(
            &finished,
            &ServerMessage::Move {
                board: Board::empty(),
                current_player: PlayerColor::Red,
                winner: None,
            },
        );
        assert_eq!(t.state, finished);
        assert!(t.effects.is_empty());
    }

    #[test]
    fn move_without_game_is_ignored() {
        let t = dispatch(
            &AppState::default(),
            &ServerMessage::Move {
                board: Board::empty(),
                current_player: PlayerColor::Red,
                winner: None,
            },
        );
        assert_eq!(t.state, AppState::default());
        assert!(t.effects.is_empty());
    }

    #[test]
    fn rejoin_success_restores_play_and_clears_error() {
        let mut state = AppState::default();
        state.set_error("Failed to reconnect to server");
        let message = ServerMessage::RejoinSuccess {
            game_id: "g1".into(),
            your_color: PlayerColor::Yellow,
            current_player: PlayerColor::Red,
            board: board_with(2, PlayerColor::Red),
            opponent: None,
        };
        let t = dispatch(&state, &message);

        assert_eq!(t.state.screen, Screen::Playing);
        assert_eq!(t.state.error, None);
        assert!(t.effects.contains(&Effect::RejoinSucceeded));
        assert!(t.effects.contains(&Effect::ClearOpponentWindow));

        let again = dispatch(&t.state, &message);
        assert_eq!(again.state, t.state);
    }

    #[test]
    fn server_error_is_transient_and_ends_join() {
        let state = AppState {
            joining: true,
            ..AppState::default()
        };
        let t = dispatch(
            &state,
            &ServerMessage::Error {
                message: "Username taken".into(),
            },
        );
        assert_eq!(t.state.error_message(), Some("Username taken"));
        assert!(!t.state.joining);
        assert_eq!(t.effects, vec![Effect::ExpireError(NoticeLifetime::Standard)]);
    }

    #[test]
    fn opponent_disconnect_and_leave() {
        let state = playing("alice");
        let t = dispatch(&state, &ServerMessage::OpponentDisconnected);
        assert_eq!(t.effects, vec![Effect::StartOpponentWindow]);

        let t = dispatch(
            &t.state,
            &ServerMessage::OpponentLeft {
                winner: Some(Outcome::Red),
            },
        );
        assert_eq!(t.state.screen, Screen::Finished);
        assert_eq!(t.state.game.as_ref().unwrap().outcome, Some(Outcome::Red));
        assert!(t.effects.contains(&Effect::ClearOpponentWindow));
        assert!(t.effects.contains(&Effect::ClearSession));
    }

    #[test]
    fn leaderboard_is_stored() {
        let entry = LeaderboardEntry {
            username: "alice".into(),
            wins: 2,
            losses: 1,
            draws: 0,
            total_games: 3,
        };
        let t = dispatch(
            &AppState::default(),
            &ServerMessage::Leaderboard {
                data: vec![entry.clone()],
            },
        );
        assert_eq!(t.state.leaderboard, vec![entry]);
        assert!(t.effects.is_empty());
    }

    #[test]
    fn unknown_is_ignored() {
        let state = playing("alice");
        let t = dispatch(&state, &ServerMessage::Unknown);
        assert_eq!(t.state, state);
        assert!(t.effects.is_empty());
    }
}
