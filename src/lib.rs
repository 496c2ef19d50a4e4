//! TELLY - Folder-based video playback session core
//!
//! Re-exports all modules for use by binary targets.

pub mod cli;
pub mod engine;
pub mod paths;
pub mod playlist;
pub mod session;
pub mod session_events;
pub mod settings;
pub mod sim_engine;

// Re-export commonly used types
pub use engine::{
    EngineError, EngineEvent, EngineEventKind, EngineEventSender, MediaEngine, SeekMode,
};
pub use playlist::Playlist;
pub use session::{Session, SessionState};
pub use session_events::{SessionEvent, SessionEventSender};
pub use settings::{FolderSettings, GlobalSettings, PlayerPrefs, SettingsStore};
pub use sim_engine::SimEngine;
