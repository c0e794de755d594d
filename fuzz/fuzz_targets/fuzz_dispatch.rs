#![no_main]

use connect_four_client::dispatcher::dispatch;
use connect_four_client::protocol::ServerMessage;
use connect_four_client::state::AppState;
use libfuzzer_sys::fuzz_target;

// Feed a stream of newline-separated frames through the dispatcher, the way
// the session task applies them: malformed frames are skipped.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let mut state = AppState {
        username: Some("fuzz".into()),
        ..AppState::new()
    };
    for line in text.lines() {
        if let Ok(message) = serde_json::from_str::<ServerMessage>(line) {
            state = dispatch(&state, &message).state;
        }
    }
});
