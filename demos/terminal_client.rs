//! # Terminal Client Example
//!
//! Plays Connect Four from a terminal:
//!
//! 1. Connect to the game server via WebSocket
//! 2. Join matchmaking under a username
//! 3. Drop discs by typing a column number
//! 4. Survive network drops and restarts (the session is kept in a file)
//! 5. Shut down gracefully on `quit`, Ctrl+C or end of input
//!
//! ## Running
//!
//! ```sh
//! # Start the game server on localhost:3001, then:
//! cargo run --example terminal_client
//!
//! # Override the server URL:
//! CONNECT_FOUR_WS_URL=ws://my-server:3001 cargo run --example terminal_client
//! ```
//!
//! ## Commands
//!
//! `join <name>`, `1`-`7` to drop a disc, `board`, `leaders`, `again`,
//! `reconnect`, `exit`, `quit`.

use std::sync::Arc;

use connect_four_client::protocol::PlayerColor;
use connect_four_client::state::Screen;
use connect_four_client::{ClientConfig, ClientEvent, FileStore, GameClient, Snapshot};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Where the session record is kept between runs.
const SESSION_FILE: &str = "connect-four-session.json";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Initialize tracing. Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let config = ClientConfig::from_env()?;
    println!("Connecting to {}", config.server_url);

    let store = Arc::new(FileStore::new(SESSION_FILE));
    let (mut client, mut event_rx) = GameClient::start_websocket(store, config);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last: Option<Snapshot> = None;

    // ── Event loop ──────────────────────────────────────────────────
    loop {
        tokio::select! {
            event = event_rx.recv() => {
                match event {
                    Some(ClientEvent::StateChanged(snapshot)) => {
                        render(last.as_ref(), &snapshot);
                        last = Some(*snapshot);
                    }
                    Some(ClientEvent::Stopped) | None => break,
                }
            }

            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match handle_command(&client, line.trim(), last.as_ref()) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => println!("! {e}"),
                }
            }

            _ = tokio::signal::ctrl_c() => {
                println!("Shutting down...");
                break;
            }
        }
    }

    // ── Cleanup ─────────────────────────────────────────────────────
    client.shutdown().await;
    Ok(())
}

/// Returns `Ok(false)` when the user asked to quit.
fn handle_command(
    client: &GameClient,
    line: &str,
    last: Option<&Snapshot>,
) -> connect_four_client::Result<bool> {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    match command {
        "" => {}
        "join" => client.join(rest)?,
        "board" => {
            if let Some(snapshot) = last {
                print_board(snapshot);
            }
        }
        "leaders" => client.toggle_leaderboard()?,
        "again" => client.play_again()?,
        "reconnect" => client.manual_reconnect()?,
        "exit" => client.exit_game()?,
        "quit" => return Ok(false),
        other => match other.parse::<usize>() {
            Ok(column @ 1..=7) => client.make_move(column - 1)?,
            _ => println!("unknown command: {other}"),
        },
    }
    Ok(true)
}

fn render(previous: Option<&Snapshot>, snapshot: &Snapshot) {
    let changed = |f: fn(&Snapshot) -> String| previous.map(f) != Some(f(snapshot));

    if changed(|s| format!("{:?}", s.phase)) {
        println!("[connection: {:?}]", snapshot.phase);
    }
    if let Some(message) = snapshot.app.error_message() {
        if changed(|s| s.app.error_message().unwrap_or_default().to_owned()) {
            println!("! {message}");
        }
    }
    if snapshot.reconnect_prompt_visible && changed(|s| s.reconnect_prompt_visible.to_string()) {
        println!("Connection to the game was lost. Type `reconnect` to try again.");
    }

    match snapshot.screen() {
        Screen::Login => {
            if changed(|s| format!("{:?}", s.screen())) {
                println!("Type `join <name>` to find a game.");
            }
        }
        Screen::Waiting => {
            if changed(|s| s.matchmaking_time_left.to_string()) {
                println!(
                    "Waiting for an opponent... bot joins in {}s",
                    snapshot.matchmaking_time_left
                );
            }
        }
        Screen::Playing | Screen::Finished => {
            if changed(|s| format!("{:?}", s.game())) {
                print_board(snapshot);
            }
            if snapshot.opponent_disconnected
                && changed(|s| s.opponent_time_left.to_string())
            {
                println!(
                    "Opponent disconnected, {}s left to return",
                    snapshot.opponent_time_left
                );
            }
        }
    }

    if snapshot.app.leaderboard_visible && changed(|s| format!("{:?}", s.app.leaderboard)) {
        println!("── Leaderboard ──");
        for entry in &snapshot.app.leaderboard {
            println!(
                "{:<20} {:>3}W {:>3}L {:>3}D  {:>5.1}%",
                entry.username,
                entry.wins,
                entry.losses,
                entry.draws,
                entry.win_rate()
            );
        }
    }
}

fn print_board(snapshot: &Snapshot) {
    let Some(game) = snapshot.game() else {
        return;
    };
    println!("You: {:?}  vs  {}", game.your_color, game.opponent_name());
    for row in game.board.rows() {
        let line: String = row
            .iter()
            .map(|cell| match cell {
                Some(PlayerColor::Red) => " R",
                Some(PlayerColor::Yellow) => " Y",
                None => " .",
            })
            .collect();
        println!("{line}");
    }
    println!(" 1 2 3 4 5 6 7");

    match snapshot.result_message() {
        Some(message) => println!("{message}  (type `again` or `exit`)"),
        None if game.is_my_turn() => println!("Your turn."),
        None => println!("Waiting for {}...", game.opponent_name()),
    }
}
