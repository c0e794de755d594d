//! User intents as pure transitions.
//!
//! Each function takes the current [`AppState`] plus whatever the session
//! driver knows about the connection and returns an [`IntentOutcome`]: the
//! next state, an optional outbound message, and the same [`Effect`]s the
//! dispatcher emits. Nothing here touches the network or a timer.

use tracing::debug;

use crate::dispatcher::Effect;
use crate::error::{ClientError, Result};
use crate::protocol::{ClientMessage, BOARD_COLS};
use crate::state::{AppState, NoticeLifetime, Screen};

/// Shortest accepted username, in characters, after trimming.
pub const MIN_USERNAME_LEN: usize = 2;

/// Longest accepted username, in characters, after trimming.
pub const MAX_USERNAME_LEN: usize = 20;

const JOIN_IN_FLIGHT: &str = "Already joining a game...";
const NOT_CONNECTED: &str = "Not connected to server";
const OPPONENT_AWAY: &str = "Cannot make moves while opponent is disconnected";

/// What an intent changed and what it wants sent.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentOutcome {
    pub state: AppState,
    pub send: Option<ClientMessage>,
    pub effects: Vec<Effect>,
}

impl IntentOutcome {
    fn new(state: AppState) -> Self {
        Self {
            state,
            send: None,
            effects: Vec::new(),
        }
    }

    fn notice(mut state: AppState, message: &str, lifetime: NoticeLifetime) -> Self {
        state.set_error(message);
        Self {
            state,
            send: None,
            effects: vec![Effect::ExpireError(lifetime)],
        }
    }
}

/// Trim `raw` and check its length.
///
/// # Errors
///
/// Returns [`ClientError::InvalidUsername`] with a user-facing message when
/// the trimmed name is empty, shorter than [`MIN_USERNAME_LEN`] or longer
/// than [`MAX_USERNAME_LEN`].
pub fn validate_username(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    if len == 0 {
        return Err(ClientError::InvalidUsername(
            "Please enter a username".into(),
        ));
    }
    if len < MIN_USERNAME_LEN {
        return Err(ClientError::InvalidUsername(format!(
            "Username must be at least {MIN_USERNAME_LEN} characters"
        )));
    }
    if len > MAX_USERNAME_LEN {
        return Err(ClientError::InvalidUsername(format!(
            "Username must be less than {MAX_USERNAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_owned())
}

/// Enter matchmaking.
///
/// # Errors
///
/// Returns [`ClientError::InvalidUsername`] if `raw_username` fails
/// [`validate_username`].
pub fn join(state: &AppState, raw_username: &str, connected: bool) -> Result<IntentOutcome> {
    if state.joining {
        return Ok(IntentOutcome::notice(
            state.clone(),
            JOIN_IN_FLIGHT,
            NoticeLifetime::Brief,
        ));
    }
    let username = validate_username(raw_username)?;
    if !connected {
        return Ok(IntentOutcome::notice(
            state.clone(),
            NOT_CONNECTED,
            NoticeLifetime::Standard,
        ));
    }

    let mut next = state.clone();
    next.username = Some(username.clone());
    next.joining = true;
    Ok(IntentOutcome {
        state: next,
        send: Some(ClientMessage::Join { username }),
        effects: Vec::new(),
    })
}

/// Drop a disc into `column`.
///
/// Moves that are not currently legal for the local player are ignored;
/// the server stays the judge of the rules.
///
/// # Errors
///
/// Returns [`ClientError::InvalidColumn`] if `column` is off the board.
pub fn make_move(state: &AppState, column: usize, opponent_disconnected: bool) -> Result<IntentOutcome> {
    if column >= BOARD_COLS {
        return Err(ClientError::InvalidColumn(column));
    }
    if opponent_disconnected {
        return Ok(IntentOutcome::notice(
            state.clone(),
            OPPONENT_AWAY,
            NoticeLifetime::Brief,
        ));
    }

    let mut outcome = IntentOutcome::new(state.clone());
    match &state.game {
        Some(game)
            if state.screen == Screen::Playing
                && game.is_my_turn()
                && game.board.column_accepts(column) =>
        {
            outcome.send = Some(ClientMessage::Move {
                game_id: game.game_id.clone(),
                column,
            });
        }
        _ => debug!(column, "move not playable right now, ignoring"),
    }
    Ok(outcome)
}

/// Ask the server for the leaderboard.
pub fn request_leaderboard(state: &AppState) -> IntentOutcome {
    IntentOutcome {
        send: Some(ClientMessage::GetLeaderboard),
        ..IntentOutcome::new(state.clone())
    }
}

/// Show or hide the leaderboard, fetching fresh rows when opening it.
pub fn toggle_leaderboard(state: &AppState) -> IntentOutcome {
    let mut next = state.clone();
    next.leaderboard_visible = !state.leaderboard_visible;
    IntentOutcome {
        send: next
            .leaderboard_visible
            .then_some(ClientMessage::GetLeaderboard),
        ..IntentOutcome::new(next)
    }
}

/// Queue for another game under the same username.
pub fn play_again(state: &AppState, connected: bool) -> IntentOutcome {
    let mut next = state.clone();
    next.game = None;
    next.joining = true;

    let send = match (&state.username, connected) {
        (Some(username), true) => Some(ClientMessage::Join {
            username: username.clone(),
        }),
        _ => None,
    };
    IntentOutcome {
        state: next,
        send,
        effects: vec![
            Effect::ClearSession,
            Effect::ResetRecovery,
            Effect::ClearOpponentWindow,
        ],
    }
}

/// Leave the game and return to the login screen.
///
/// The server is told with `leave` but not waited for.
pub fn exit_game(state: &AppState) -> IntentOutcome {
    let send = state.username.as_ref().map(|username| ClientMessage::Leave {
        username: username.clone(),
    });
    let next = AppState {
        screen: Screen::Login,
        username: None,
        game: None,
        joining: false,
        exit_confirm_visible: false,
        ..state.clone()
    };
    IntentOutcome {
        state: next,
        send,
        effects: vec![
            Effect::ClearSession,
            Effect::ClearDisconnectFlag,
            Effect::ResetRecovery,
            Effect::ClearOpponentWindow,
            Effect::StopMatchmakingCountdown,
        ],
    }
}

/// Ask before leaving a game or matchmaking; leave at once otherwise.
pub fn request_exit(state: &AppState) -> IntentOutcome {
    match state.screen {
        Screen::Waiting | Screen::Playing => {
            let mut next = state.clone();
            next.exit_confirm_visible = true;
            IntentOutcome::new(next)
        }
        Screen::Login | Screen::Finished => exit_game(state),
    }
}

pub fn cancel_exit(state: &AppState) -> IntentOutcome {
    let mut next = state.clone();
    next.exit_confirm_visible = false;
    IntentOutcome::new(next)
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
    use crate::protocol::{Board, Opponent, Outcome, PlayerColor, BOARD_ROWS};
    use crate::state::GameState;

    fn playing(your_color: PlayerColor, current_player: PlayerColor) -> AppState {
        AppState {
            screen: Screen::Playing,
            username: Some("alice".into()),
            game: Some(GameState {
                game_id: "g1".into(),
                your_color,
                current_player,
                board: Board::empty(),
                opponent: Some(Opponent::Bot),
                outcome: None,
            }),
            ..AppState::default()
        }
    }

    #[test]
    fn username_bounds_are_inclusive_after_trim() {
        assert_eq!(validate_username("  al ").unwrap(), "al");
        assert_eq!(validate_username(&"x".repeat(20)).unwrap().len(), 20);

        let err = |raw: &str| match validate_username(raw) {
            Err(ClientError::InvalidUsername(msg)) => msg,
            other => panic!("expected InvalidUsername, got {other:?}"),
        };
        assert_eq!(err("   "), "Please enter a username");
        assert_eq!(err(" a "), "Username must be at least 2 characters");
        assert_eq!(err(&"x".repeat(21)), "Username must be less than 20 characters");
    }

    #[test]
    fn username_length_counts_characters() {
        assert!(validate_username("éé").is_ok());
        assert!(validate_username(&"ü".repeat(20)).is_ok());
    }

    #[test]
    fn join_sends_trimmed_name_and_sets_joining() {
        let outcome = join(&AppState::default(), " alice ", true).unwrap();
        assert_eq!(
            outcome.send,
            Some(ClientMessage::Join {
                username: "alice".into()
            })
        );
        assert!(outcome.state.joining);
        assert_eq!(outcome.state.username.as_deref(), Some("alice"));
    }

    #[test]
    fn join_is_single_flight() {
        let state = AppState {
            joining: true,
            ..AppState::default()
        };
        let outcome = join(&state, "alice", true).unwrap();
        assert_eq!(outcome.send, None);
        assert_eq!(outcome.state.error_message(), Some(JOIN_IN_FLIGHT));
        assert_eq!(outcome.effects, vec![Effect::ExpireError(NoticeLifetime::Brief)]);
    }

    #[test]
    fn join_requires_connection() {
        let outcome = join(&AppState::default(), "alice", false).unwrap();
        assert_eq!(outcome.send, None);
        assert!(!outcome.state.joining);
        assert_eq!(outcome.state.error_message(), Some(NOT_CONNECTED));
    }

    #[test]
    fn join_rejects_bad_username() {
        assert!(matches!(
            join(&AppState::default(), "a", true),
            Err(ClientError::InvalidUsername(_))
        ));
    }

    #[test]
    fn move_is_sent_on_own_turn() {
        let state = playing(PlayerColor::Red, PlayerColor::Red);
        let outcome = make_move(&state, 3, false).unwrap();
        assert_eq!(
            outcome.send,
            Some(ClientMessage::Move {
                game_id: "g1".into(),
                column: 3
            })
        );
    }

    #[test]
    fn move_out_of_turn_or_after_outcome_is_ignored() {
        let state = playing(PlayerColor::Red, PlayerColor::Yellow);
        assert_eq!(make_move(&state, 3, false).unwrap().send, None);

        let mut over = playing(PlayerColor::Red, PlayerColor::Red);
        if let Some(game) = over.game.as_mut() {
            game.outcome = Some(Outcome::Yellow);
        }
        assert_eq!(make_move(&over, 3, false).unwrap().send, None);
    }

    #[test]
    fn move_into_full_column_is_ignored() {
        let mut state = playing(PlayerColor::Red, PlayerColor::Red);
        let mut rows = [[None; BOARD_COLS]; BOARD_ROWS];
        for row in rows.iter_mut() {
            row[1] = Some(PlayerColor::Yellow);
        }
        if let Some(game) = state.game.as_mut() {
            game.board = Board::from_rows(rows);
        }
        assert_eq!(make_move(&state, 1, false).unwrap().send, None);
        assert!(make_move(&state, 2, false).unwrap().send.is_some());
    }

    #[test]
    fn move_off_board_is_an_error() {
        let state = playing(PlayerColor::Red, PlayerColor::Red);
        assert!(matches!(
            make_move(&state, BOARD_COLS, false),
            Err(ClientError::InvalidColumn(7))
        ));
    }

    #[test]
    fn move_while_opponent_away_shows_notice() {
        let state = playing(PlayerColor::Red, PlayerColor::Red);
        let outcome = make_move(&state, 0, true).unwrap();
        assert_eq!(outcome.send, None);
        assert_eq!(outcome.state.error_message(), Some(OPPONENT_AWAY));
    }

    #[test]
    fn toggle_leaderboard_fetches_only_when_opening() {
        let open = toggle_leaderboard(&AppState::default());
        assert!(open.state.leaderboard_visible);
        assert_eq!(open.send, Some(ClientMessage::GetLeaderboard));

        let closed = toggle_leaderboard(&open.state);
        assert!(!closed.state.leaderboard_visible);
        assert_eq!(closed.send, None);

        assert_eq!(
            request_leaderboard(&AppState::default()).send,
            Some(ClientMessage::GetLeaderboard)
        );
    }

    #[test]
    fn play_again_rejoins_matchmaking() {
        let mut state = playing(PlayerColor::Red, PlayerColor::Red);
        state.screen = Screen::Finished;
        let outcome = play_again(&state, true);

        assert_eq!(outcome.state.game, None);
        assert!(outcome.state.joining);
        assert_eq!(
            outcome.send,
            Some(ClientMessage::Join {
                username: "alice".into()
            })
        );
        assert!(outcome.effects.contains(&Effect::ClearSession));
        assert!(outcome.effects.contains(&Effect::ResetRecovery));

        assert_eq!(play_again(&state, false).send, None);
    }

    #[test]
    fn exit_game_leaves_and_forgets_everything() {
        let mut state = playing(PlayerColor::Red, PlayerColor::Red);
        state.exit_confirm_visible = true;
        let outcome = exit_game(&state);

        assert_eq!(
            outcome.send,
            Some(ClientMessage::Leave {
                username: "alice".into()
            })
        );
        assert_eq!(outcome.state.screen, Screen::Login);
        assert_eq!(outcome.state.username, None);
        assert_eq!(outcome.state.game, None);
        assert!(!outcome.state.exit_confirm_visible);
        assert!(outcome.effects.contains(&Effect::ClearSession));
        assert!(outcome.effects.contains(&Effect::ClearDisconnectFlag));
    }

    #[test]
    fn exit_without_username_sends_nothing() {
        assert_eq!(exit_game(&AppState::default()).send, None);
    }

    #[test]
    fn request_exit_confirms_only_mid_game() {
        let state = playing(PlayerColor::Red, PlayerColor::Red);
        let outcome = request_exit(&state);
        assert!(outcome.state.exit_confirm_visible);
        assert_eq!(outcome.send, None);
        assert!(!cancel_exit(&outcome.state).state.exit_confirm_visible);

        let mut finished = state.clone();
        finished.screen = Screen::Finished;
        let outcome = request_exit(&finished);
        assert_eq!(outcome.state.screen, Screen::Login);
        assert!(matches!(outcome.send, Some(ClientMessage::Leave { .. })));
    }
}
