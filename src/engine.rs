//! Command/event contract for the native media engine.
//!
//! **Why**: The session controller must stay decoupled from any concrete
//! playback backend (libmpv, GStreamer, the in-tree simulator). Everything
//! the controller needs is captured here as a trait plus an event channel.
//!
//! **Used by**: Session controller (commands + property reads), engine
//! implementations (event emission).
//!
//! # Event Model
//!
//! Engines produce events on their own execution context (usually a
//! background clock or callback thread). They are never handled there:
//! the controller drains the channel on its own thread via `Session::pump()`.
//!
//! # Load Generations
//!
//! Every `load()` bumps a monotonically increasing generation counter and
//! every outgoing event is stamped with the generation it belongs to.
//! Events from a superseded load are unambiguously stale and get dropped
//! by the consumer, no matter how late they arrive.

use crossbeam_channel::Sender;
use std::path::Path;
use thiserror::Error;

/// Errors at the engine boundary. Construction failure is the only
/// condition surfaced as a hard error to callers.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("media engine unavailable: {0}")]
    Unavailable(String),
}

/// Seek addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    /// Target is an absolute offset in seconds from the start of the file.
    Absolute,
    /// Target is a signed offset in seconds from the current position.
    Relative,
}

/// What happened inside the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEventKind {
    /// The file issued by the matching `load()` is open and playable.
    /// Emitted exactly once per successful load.
    FileLoaded,
    /// Playback clock advanced to this position (seconds).
    Position(f64),
    /// Total duration became known or changed (seconds).
    Duration(f64),
    /// Natural end of stream. Never emitted as a consequence of `stop()`.
    EndOfFile,
}

/// An engine event stamped with the load generation that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineEvent {
    pub generation: u64,
    pub kind: EngineEventKind,
}

/// One selectable audio track.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    pub id: i64,
    pub title: String,
    pub lang: String,
    pub selected: bool,
}

/// One selectable subtitle track. Track id 0 means "subtitles off".
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleTrack {
    pub id: i64,
    pub title: String,
    pub lang: String,
    pub selected: bool,
    pub external: bool,
}

/// Event sender wrapper handed to engine implementations.
///
/// Engines hold this sender to emit events when playback state changes.
#[derive(Clone, Debug)]
pub struct EngineEventSender {
    sender: Option<Sender<EngineEvent>>,
}

impl EngineEventSender {
    /// Create event sender (connected to channel)
    pub fn new(sender: Sender<EngineEvent>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// Create dummy sender (for tests or when events not needed)
    pub fn dummy() -> Self {
        Self { sender: None }
    }

    /// Emit event (silent if no receiver)
    pub fn emit(&self, generation: u64, kind: EngineEventKind) {
        if let Some(ref tx) = self.sender {
            let _ = tx.send(EngineEvent { generation, kind }); // Ignore send errors (receiver might be dropped)
        }
    }
}

impl Default for EngineEventSender {
    fn default() -> Self {
        Self::dummy()
    }
}

/// Command and property surface of a playback engine.
///
/// Commands are fire-and-forget: completion is observed through the event
/// channel, never awaited. `seek()` performs no clamping of its own; the
/// caller is responsible for keeping targets inside the valid range.
pub trait MediaEngine: Send {
    /// Begin opening `path`. Returns the new load generation. Success is
    /// signalled later by exactly one `FileLoaded` event carrying that
    /// generation; a bad file simply never produces one.
    fn load(&mut self, path: &Path) -> u64;

    fn play(&mut self);
    fn pause(&mut self);
    fn toggle_pause(&mut self);

    /// Terminate current playback. Must not emit `EndOfFile` as a result.
    fn stop(&mut self);

    fn seek(&mut self, target: f64, mode: SeekMode);

    fn set_speed(&mut self, speed: f64);
    fn set_volume(&mut self, volume: i64);
    fn set_muted(&mut self, muted: bool);
    fn select_audio_track(&mut self, id: i64);
    fn select_subtitle_track(&mut self, id: i64);

    /// Current position in seconds, 0.0 when nothing is loaded.
    fn position(&self) -> f64;
    /// Total duration in seconds, 0.0 until known.
    fn duration(&self) -> f64;
    fn paused(&self) -> bool;
    fn volume(&self) -> i64;
    fn muted(&self) -> bool;
    fn speed(&self) -> f64;
    fn audio_tracks(&self) -> Vec<AudioTrack>;
    fn current_audio_track(&self) -> i64;
    fn subtitle_tracks(&self) -> Vec<SubtitleTrack>;
    fn current_subtitle_track(&self) -> i64;

    /// Release engine resources. Further commands are no-ops.
    fn terminate(&mut self);
}
