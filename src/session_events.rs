//! Session-to-collaborator notifications.
//!
//! Emitted by the session controller when observable state changes and
//! consumed by the owning surface (UI, shell loop) to refresh controls.

use crate::session::SessionState;
use crossbeam_channel::Sender;
use std::path::PathBuf;

/// Notifications published by the playback session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The state machine moved to a new state
    StateChanged(SessionState),

    /// A different file became current
    FileChanged {
        path: PathBuf,
        index: Option<usize>,
    },

    /// Playback clock advanced
    PositionChanged { position: f64, duration: f64 },

    /// Total duration became known or changed
    DurationChanged(f64),

    /// Playback resumed from a previously saved position
    ProgressRestored { percent: f64 },

    /// `previous()` was called at the first playlist entry
    AtPlaylistStart,

    /// `next()` was called at the last playlist entry
    AtPlaylistEnd,

    /// The last playlist entry finished playing
    PlaylistFinished,
}

/// Event sender wrapper held by the session.
#[derive(Clone, Debug)]
pub struct SessionEventSender {
    sender: Option<Sender<SessionEvent>>,
}

impl SessionEventSender {
    /// Create event sender (connected to channel)
    pub fn new(sender: Sender<SessionEvent>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// Create dummy sender (for tests or when events not needed)
    pub fn dummy() -> Self {
        Self { sender: None }
    }

    /// Emit event (silent if no receiver)
    pub fn emit(&self, event: SessionEvent) {
        if let Some(ref tx) = self.sender {
            let _ = tx.send(event); // Ignore send errors (receiver might be dropped)
        }
    }
}

impl Default for SessionEventSender {
    fn default() -> Self {
        Self::dummy()
    }
}
