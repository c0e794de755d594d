//! Events emitted to the presentation layer.

use crate::state::Snapshot;

/// Everything a [`GameClient`](crate::GameClient) reports on its event channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Something visible changed; render this snapshot.
    StateChanged(Box<Snapshot>),
    /// The client shut down. Always the last event.
    Stopped,
}

impl ClientEvent {
    /// The snapshot carried by a `StateChanged` event.
    pub fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            Self::StateChanged(snapshot) => Some(snapshot),
            Self::Stopped => None,
        }
    }
}
