//! Playback session controller.
//!
//! **Why**: Engine events arrive on the engine's own context, while
//! skip/resume/auto-advance policy must run against a single coherent
//! session state. This module owns that state machine: events are drained
//! from the channel on the session thread via `pump()`, stale-generation
//! events are discarded, and all engine commands are issued from here.
//!
//! **Used by**: The binary's pump loop; any embedding UI surface.
//!
//! # State Machine
//!
//! `Idle → Loading → Playing ⇄ Paused`, with a transient `Seeking` overlay
//! during user scrubs, and `Ended` on the outro boundary or natural end of
//! file. From `Ended` the controller auto-advances the playlist or reports
//! the playlist finished.
//!
//! # Stale Events
//!
//! Every event carries the load generation that produced it. Events from
//! a superseded load are dropped before inspection, and the loading guard
//! additionally suppresses position/end-of-file noise of the current
//! generation until the file is actually open. An end-of-file observed in
//! `Ended` or `Idle` is ignored, so a stop echo can never advance the
//! playlist twice.

use crate::engine::{EngineEvent, EngineEventKind, MediaEngine, SeekMode};
use crate::playlist::{self, Playlist};
use crate::session_events::{SessionEvent, SessionEventSender};
use crate::settings::SettingsStore;
use crossbeam_channel::Receiver;
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Upper bound for skip-intro/skip-outro (seconds)
pub const MAX_SKIP_SECS: u32 = 600;

/// Valid range for the seek step (seconds)
pub const SEEK_STEP_RANGE: (u32, u32) = (1, 300);

/// Valid range for the playback speed multiplier
pub const SPEED_RANGE: (f64, f64) = (0.25, 3.0);

/// Saved progress is only restored when strictly inside this window (%).
/// Below it the file was barely opened; above it the file counts as
/// watched and restarts from the beginning.
const RESUME_WINDOW: (f64, f64) = (1.0, 95.0);

/// A resume seek never lands closer than this to the outro cut (seconds)
const RESUME_OUTRO_MARGIN: f64 = 5.0;

/// The outro boundary only triggers after this much playback, whichever
/// of the two is larger, so a fresh load or seek cannot false-trigger it.
const OUTRO_MIN_PLAYED_SECS: f64 = 10.0;
const OUTRO_MIN_PLAYED_FRACTION: f64 = 0.10;

/// Session controller states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No file loaded
    Idle,
    /// Load issued, file-loaded not yet observed
    Loading,
    Playing,
    Paused,
    /// User scrub in flight; returns to the prior state on the next
    /// position event
    Seeking,
    /// Outro boundary reached or natural end of file
    Ended,
}

pub(crate) fn clamp_speed(speed: f64) -> f64 {
    speed.clamp(SPEED_RANGE.0, SPEED_RANGE.1)
}

pub(crate) fn clamp_seek_step(step: u32) -> u32 {
    step.clamp(SEEK_STEP_RANGE.0, SEEK_STEP_RANGE.1)
}

/// Where to resume a file with `saved_percent` watched, or `None` when the
/// saved value is outside the resume window or the clamped target would
/// not move playback forward. The target stays clear of the outro window.
pub fn resume_target(duration: f64, saved_percent: f64, skip_outro: u32) -> Option<f64> {
    if duration <= 0.0 {
        return None;
    }
    if saved_percent <= RESUME_WINDOW.0 || saved_percent >= RESUME_WINDOW.1 {
        return None;
    }
    let mut target = saved_percent / 100.0 * duration;
    if skip_outro > 0 {
        target = target.min(duration - f64::from(skip_outro) - RESUME_OUTRO_MARGIN);
    }
    (target > 0.0).then_some(target)
}

/// One playback session bound to one engine instance.
pub struct Session {
    engine: Box<dyn MediaEngine>,
    engine_events: Receiver<EngineEvent>,
    notices: SessionEventSender,
    store: Arc<SettingsStore>,
    playlist: Playlist,

    state: SessionState,
    current_file: Option<PathBuf>,
    load_gen: u64,
    is_loading: bool,
    seek_return: Option<SessionState>,

    position: f64,
    duration: f64,
    skip_intro: u32,
    skip_outro: u32,
    speed: f64,
    seek_step: u32,
    volume: i64,
    muted: bool,
}

impl Session {
    pub fn new(
        engine: Box<dyn MediaEngine>,
        engine_events: Receiver<EngineEvent>,
        store: Arc<SettingsStore>,
        notices: SessionEventSender,
    ) -> Self {
        let global = store.load_global();
        Self {
            engine,
            engine_events,
            notices,
            store,
            playlist: Playlist::empty(),
            state: SessionState::Idle,
            current_file: None,
            load_gen: 0,
            is_loading: false,
            seek_return: None,
            position: 0.0,
            duration: 0.0,
            skip_intro: 0,
            skip_outro: 0,
            speed: clamp_speed(global.speed),
            seek_step: clamp_seek_step(global.seek_step),
            volume: 100,
            muted: false,
        }
    }

    // ========== Event intake ==========

    /// Drain pending engine events and apply them to the state machine.
    /// Must be called from the session's own thread; this is the only
    /// place engine events touch session state.
    pub fn pump(&mut self) {
        while let Ok(event) = self.engine_events.try_recv() {
            self.handle_event(event);
        }
    }

    fn handle_event(&mut self, event: EngineEvent) {
        if event.generation != self.load_gen {
            debug!(
                "Dropping stale engine event (generation {} != {}): {:?}",
                event.generation, self.load_gen, event.kind
            );
            return;
        }

        match event.kind {
            EngineEventKind::FileLoaded => self.on_file_loaded(),
            EngineEventKind::Duration(duration) => {
                self.duration = duration;
                self.notices.emit(SessionEvent::DurationChanged(duration));
            }
            EngineEventKind::Position(position) => self.on_position(position),
            EngineEventKind::EndOfFile => self.on_end_of_file(),
        }
    }

    fn on_file_loaded(&mut self) {
        self.is_loading = false;
        if self.duration <= 0.0 {
            self.duration = self.engine.duration();
        }

        if self.skip_intro > 0 {
            debug!("Skipping {}s intro", self.skip_intro);
            self.engine
                .seek(f64::from(self.skip_intro), SeekMode::Absolute);
        }
        self.engine.play();
        self.set_state(SessionState::Playing);
        self.restore_progress();
    }

    fn restore_progress(&mut self) {
        let Some(file) = self.current_file.clone() else {
            return;
        };
        let saved = self.store.get_progress(&file);
        if let Some(target) = resume_target(self.duration, saved, self.skip_outro) {
            info!("Resuming {} at {saved:.0}%", file.display());
            self.engine.seek(target, SeekMode::Absolute);
            self.notices
                .emit(SessionEvent::ProgressRestored { percent: saved });
        }
    }

    fn on_position(&mut self, position: f64) {
        if self.is_loading {
            return;
        }
        self.position = position;

        if self.state == SessionState::Seeking {
            let back = self.seek_return.take().unwrap_or(SessionState::Playing);
            self.set_state(back);
        }

        if self.state == SessionState::Playing && self.outro_reached(position) {
            debug!("Outro boundary at {position:.1}s / {:.1}s", self.duration);
            self.engine.stop();
            self.finish_current();
            return;
        }

        self.notices.emit(SessionEvent::PositionChanged {
            position,
            duration: self.duration,
        });
    }

    fn outro_reached(&self, position: f64) -> bool {
        if self.skip_outro == 0 || self.duration <= 0.0 {
            return false;
        }
        let min_played = (self.duration * OUTRO_MIN_PLAYED_FRACTION).max(OUTRO_MIN_PLAYED_SECS);
        position >= min_played && position >= self.duration - f64::from(self.skip_outro)
    }

    fn on_end_of_file(&mut self) {
        if self.is_loading {
            debug!("Suppressing end-of-file during load");
            return;
        }
        match self.state {
            SessionState::Playing | SessionState::Paused | SessionState::Seeking => {
                self.finish_current();
            }
            // An echo after a stop or in an already-ended session must not
            // advance the playlist again.
            SessionState::Idle | SessionState::Loading | SessionState::Ended => {
                debug!("Ignoring end-of-file in {:?}", self.state);
            }
        }
    }

    /// Shared tail of the outro trigger and natural end of file.
    fn finish_current(&mut self) {
        self.set_state(SessionState::Ended);
        let had_playlist = self.playlist.current_index().is_some();
        match self.playlist.next().map(Path::to_path_buf) {
            Some(next) => {
                info!("Auto-advancing to {}", next.display());
                self.load_file(&next);
            }
            None => {
                if had_playlist {
                    self.notices.emit(SessionEvent::PlaylistFinished);
                }
            }
        }
    }

    // ========== File and playlist control ==========

    /// Open a single file, dropping any folder context.
    pub fn open(&mut self, path: &Path) {
        self.playlist.clear();
        self.load_file(path);
    }

    /// Open a folder and start its first video. Returns the number of
    /// files found; an empty folder is an error and changes no state.
    pub fn open_folder(&mut self, folder: &Path) -> anyhow::Result<usize> {
        let files = playlist::scan_folder(folder)?;
        if files.is_empty() {
            anyhow::bail!("No video files found in {}", folder.display());
        }
        let count = files.len();
        let first = files[0].clone();
        self.playlist = Playlist::from_folder(folder.to_path_buf(), files);
        self.load_file(&first);
        Ok(count)
    }

    /// Play the next playlist entry. Returns false at the end of the
    /// playlist (or without a folder context).
    pub fn next(&mut self) -> bool {
        if self.playlist.is_empty() {
            debug!("next: no folder context");
            return false;
        }
        match self.playlist.next().map(Path::to_path_buf) {
            Some(path) => {
                self.load_file(&path);
                true
            }
            None => {
                self.notices.emit(SessionEvent::AtPlaylistEnd);
                false
            }
        }
    }

    /// Play the previous playlist entry. Returns false at the start.
    pub fn previous(&mut self) -> bool {
        if self.playlist.is_empty() {
            debug!("previous: no folder context");
            return false;
        }
        match self.playlist.previous().map(Path::to_path_buf) {
            Some(path) => {
                self.load_file(&path);
                true
            }
            None => {
                self.notices.emit(SessionEvent::AtPlaylistStart);
                false
            }
        }
    }

    /// Jump to a playlist index. Returns false when out of range.
    pub fn jump(&mut self, index: usize) -> bool {
        match self.playlist.jump(index).map(Path::to_path_buf) {
            Some(path) => {
                self.load_file(&path);
                true
            }
            None => false,
        }
    }

    fn load_file(&mut self, path: &Path) {
        self.persist_progress();

        let global = self.store.load_global();
        self.speed = clamp_speed(global.speed);
        self.seek_step = clamp_seek_step(global.seek_step);
        self.engine.set_speed(self.speed);

        let folder = self.store.load_settings(path);
        self.skip_intro = folder.skip_intro.min(MAX_SKIP_SECS);
        self.skip_outro = folder.skip_outro.min(MAX_SKIP_SECS);

        self.current_file = Some(path.to_path_buf());
        self.position = 0.0;
        self.duration = 0.0;
        self.seek_return = None;

        // The guard must be up before the engine takes the command: events
        // of the outgoing file can arrive at any point after this.
        self.is_loading = true;
        self.set_state(SessionState::Loading);
        self.load_gen = self.engine.load(path);

        self.notices.emit(SessionEvent::FileChanged {
            path: path.to_path_buf(),
            index: self.playlist.current_index(),
        });
    }

    /// Persist the watched percentage of the current file, if meaningful.
    fn persist_progress(&self) {
        let Some(file) = &self.current_file else {
            return;
        };
        if self.duration <= 0.0 {
            return;
        }
        let percent = self.position / self.duration * 100.0;
        if percent > RESUME_WINDOW.0 {
            self.store.save_progress(file, percent);
        }
    }

    // ========== Transport ==========

    /// Flip between playing and paused.
    pub fn toggle_pause(&mut self) {
        match self.state {
            SessionState::Playing | SessionState::Paused => {
                self.engine.toggle_pause();
                let state = if self.engine.paused() {
                    SessionState::Paused
                } else {
                    SessionState::Playing
                };
                self.set_state(state);
            }
            _ => {}
        }
    }

    /// Scrub to an absolute position, clamped to the file's range.
    pub fn seek(&mut self, target: f64) {
        match self.state {
            SessionState::Playing | SessionState::Paused | SessionState::Seeking => {}
            _ => return,
        }
        let clamped = target.clamp(0.0, self.duration.max(0.0));
        if self.state != SessionState::Seeking {
            self.seek_return = Some(self.state);
            self.set_state(SessionState::Seeking);
        }
        self.engine.seek(clamped, SeekMode::Absolute);
    }

    /// Step forward by the configured seek step.
    pub fn seek_forward(&mut self) {
        self.seek(self.position + f64::from(self.seek_step));
    }

    /// Step back by the configured seek step.
    pub fn seek_backward(&mut self) {
        self.seek(self.position - f64::from(self.seek_step));
    }

    /// Restart the current file from the beginning (past the intro).
    pub fn replay(&mut self) {
        let Some(file) = self.current_file.clone() else {
            return;
        };
        match self.state {
            SessionState::Playing | SessionState::Paused | SessionState::Seeking => {
                let start = f64::from(self.skip_intro);
                self.engine.seek(start, SeekMode::Absolute);
                self.engine.play();
                self.set_state(SessionState::Playing);
            }
            // The engine already dropped the file; reload it.
            SessionState::Ended => self.load_file(&file),
            SessionState::Idle | SessionState::Loading => {}
        }
    }

    /// User stop: persist progress and put the session back to idle.
    /// The playlist context is retained.
    pub fn stop(&mut self) {
        if self.state == SessionState::Idle {
            return;
        }
        self.persist_progress();
        self.engine.stop();
        self.position = 0.0;
        self.set_state(SessionState::Idle);
    }

    /// Stop and drop both the current file and the folder context.
    pub fn close(&mut self) {
        self.stop();
        self.current_file = None;
        self.playlist.clear();
    }

    // ========== Configuration ==========

    /// Set the intro skip for the current file's folder and persist it.
    pub fn set_skip_intro(&mut self, secs: u32) {
        let Some(file) = self.current_file.clone() else {
            return;
        };
        self.skip_intro = secs.min(MAX_SKIP_SECS);
        let mut settings = self.store.load_settings(&file);
        settings.skip_intro = self.skip_intro;
        self.store.save_settings(&file, settings);
    }

    /// Set the outro cut for the current file's folder and persist it.
    pub fn set_skip_outro(&mut self, secs: u32) {
        let Some(file) = self.current_file.clone() else {
            return;
        };
        self.skip_outro = secs.min(MAX_SKIP_SECS);
        let mut settings = self.store.load_settings(&file);
        settings.skip_outro = self.skip_outro;
        self.store.save_settings(&file, settings);
    }

    /// Set the playback speed (clamped) and persist it as the global
    /// default. No-op while idle.
    pub fn set_speed(&mut self, speed: f64) {
        if self.state == SessionState::Idle {
            return;
        }
        let speed = clamp_speed(speed);
        self.speed = speed;
        self.engine.set_speed(speed);
        self.store.update_global(|g| g.speed = speed);
    }

    /// Set the seek step (clamped) and persist it as the global default.
    pub fn set_seek_step(&mut self, step: u32) {
        let step = clamp_seek_step(step);
        self.seek_step = step;
        self.store.update_global(|g| g.seek_step = step);
    }

    /// Set the output volume (clamped to 0-100). No-op while idle.
    pub fn set_volume(&mut self, volume: i64) {
        if self.state == SessionState::Idle {
            return;
        }
        self.volume = volume.clamp(0, 100);
        self.engine.set_volume(self.volume);
    }

    /// Toggle mute. No-op while idle.
    pub fn toggle_mute(&mut self) {
        if self.state == SessionState::Idle {
            return;
        }
        self.muted = !self.muted;
        self.engine.set_muted(self.muted);
    }

    /// Switch the audio track. No-op while idle.
    pub fn select_audio_track(&mut self, id: i64) {
        if self.state == SessionState::Idle {
            return;
        }
        self.engine.select_audio_track(id);
    }

    /// Switch the subtitle track (0 turns subtitles off). No-op while idle.
    pub fn select_subtitle_track(&mut self, id: i64) {
        if self.state == SessionState::Idle {
            return;
        }
        self.engine.select_subtitle_track(id);
    }

    // ========== Queries ==========

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn current_file(&self) -> Option<&Path> {
        self.current_file.as_deref()
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Watched percentage of the current file, 0 when unknown.
    pub fn progress_percent(&self) -> f64 {
        if self.duration > 0.0 {
            self.position / self.duration * 100.0
        } else {
            0.0
        }
    }

    pub fn skip_intro(&self) -> u32 {
        self.skip_intro
    }

    pub fn skip_outro(&self) -> u32 {
        self.skip_outro
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn seek_step(&self) -> u32 {
        self.seek_step
    }

    pub fn volume(&self) -> i64 {
        self.volume
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    pub fn engine(&self) -> &dyn MediaEngine {
        self.engine.as_ref()
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            debug!("Session state: {:?} -> {state:?}", self.state);
            self.state = state;
            self.notices.emit(SessionEvent::StateChanged(state));
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.persist_progress();
        self.engine.terminate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineEventSender;
    use crate::sim_engine::SimEngine;
    use crate::settings::FolderSettings;
    use crossbeam_channel::Receiver;
    use std::fs;

    struct Fixture {
        session: Session,
        engine: SimEngine,
        notices: Receiver<SessionEvent>,
        store: Arc<SettingsStore>,
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("telly_tests").join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn fixture(name: &str) -> Fixture {
        let (engine_tx, engine_rx) = crossbeam_channel::unbounded();
        let engine = SimEngine::new(EngineEventSender::new(engine_tx));
        let store = Arc::new(SettingsStore::new(scratch_dir(name)));
        let (notice_tx, notice_rx) = crossbeam_channel::unbounded();
        let session = Session::new(
            Box::new(engine.clone()),
            engine_rx,
            Arc::clone(&store),
            SessionEventSender::new(notice_tx),
        );
        Fixture {
            session,
            engine,
            notices: notice_rx,
            store,
        }
    }

    /// Create a real folder of dummy video files and return their paths.
    fn video_folder(name: &str, files: &[&str]) -> (PathBuf, Vec<PathBuf>) {
        let dir = std::env::temp_dir().join("telly_tests").join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        let mut paths = Vec::new();
        for f in files {
            let p = dir.join(f);
            fs::write(&p, b"x").unwrap();
            paths.push(p);
        }
        (dir, paths)
    }

    fn settle(fx: &mut Fixture) {
        // One tick resolves a pending load, a second pump applies it.
        fx.engine.tick(0.01);
        fx.session.pump();
    }

    #[test]
    fn test_open_moves_through_loading_to_playing() {
        let mut fx = fixture("open_states");
        let file = Path::new("/telly_vids/ep1.mp4");

        fx.session.open(file);
        assert_eq!(fx.session.state(), SessionState::Loading);

        settle(&mut fx);
        assert_eq!(fx.session.state(), SessionState::Playing);
        assert!(!fx.engine.paused());
        assert_eq!(fx.session.current_file(), Some(file));
    }

    #[test]
    fn test_skip_intro_seeks_on_load() {
        let mut fx = fixture("skip_intro");
        let file = Path::new("/telly_vids/ep1.mp4");
        fx.engine.set_duration_for(file, 1200.0);
        fx.store.save_settings(
            file,
            FolderSettings {
                skip_intro: 85,
                ..FolderSettings::default()
            },
        );

        fx.session.open(file);
        settle(&mut fx);
        assert_eq!(fx.session.position(), 85.0);
    }

    #[test]
    fn test_resume_target_in_window() {
        assert_eq!(resume_target(1000.0, 90.0, 0), Some(900.0));
        // With a 30s outro the target must stay at least 35s from the end.
        let clamped = resume_target(1000.0, 90.0, 30).unwrap();
        assert!(clamped <= 965.0);
    }

    #[test]
    fn test_resume_target_rejects_outside_window() {
        assert_eq!(resume_target(1000.0, 0.5, 0), None);
        assert_eq!(resume_target(1000.0, 1.0, 0), None);
        assert_eq!(resume_target(1000.0, 95.0, 0), None);
        assert_eq!(resume_target(1000.0, 99.0, 0), None);
        assert_eq!(resume_target(0.0, 50.0, 0), None);
    }

    #[test]
    fn test_resume_target_clamps_out_of_short_file() {
        // 100s file, 30s outro: 90% would land at 90s, clamp pulls it to 65s.
        assert_eq!(resume_target(100.0, 90.0, 30), Some(65.0));
    }

    #[test]
    fn test_saved_progress_restored_on_load() {
        let mut fx = fixture("resume_seek");
        let file = Path::new("/telly_vids/ep1.mp4");
        fx.engine.set_duration_for(file, 1000.0);
        fx.store.save_progress(file, 40.0);

        fx.session.open(file);
        settle(&mut fx);
        assert_eq!(fx.session.position(), 400.0);
        assert!(fx
            .notices
            .try_iter()
            .any(|e| matches!(e, SessionEvent::ProgressRestored { .. })));
    }

    #[test]
    fn test_watched_file_restarts_from_beginning() {
        let mut fx = fixture("watched_restart");
        let file = Path::new("/telly_vids/ep1.mp4");
        fx.engine.set_duration_for(file, 1000.0);
        fx.store.save_progress(file, 97.0);

        fx.session.open(file);
        settle(&mut fx);
        assert_eq!(fx.session.position(), 0.0);
    }

    #[test]
    fn test_outro_minimum_played_guard() {
        let mut fx = fixture("outro_guard");
        let file = Path::new("/telly_vids/short.mp4");
        fx.engine.set_duration_for(file, 20.0);
        fx.store.save_settings(
            file,
            FolderSettings {
                skip_outro: 15,
                ..FolderSettings::default()
            },
        );

        fx.session.open(file);
        settle(&mut fx);

        // Position 6s: past the 5s outro boundary but under the 10s
        // minimum-played floor, so nothing may trigger.
        fx.engine.tick(6.0);
        fx.session.pump();
        assert_eq!(fx.session.state(), SessionState::Playing);

        // Crossing 10s arms the trigger.
        fx.engine.tick(5.0);
        fx.session.pump();
        assert_eq!(fx.session.state(), SessionState::Ended);
    }

    #[test]
    fn test_outro_trigger_ends_playback() {
        let mut fx = fixture("outro_trigger");
        let file = Path::new("/telly_vids/ep1.mp4");
        fx.engine.set_duration_for(file, 100.0);
        fx.store.save_settings(
            file,
            FolderSettings {
                skip_outro: 20,
                ..FolderSettings::default()
            },
        );

        fx.session.open(file);
        settle(&mut fx);

        fx.engine.tick(79.0);
        fx.session.pump();
        assert_eq!(fx.session.state(), SessionState::Playing);

        fx.engine.tick(2.0);
        fx.session.pump();
        assert_eq!(fx.session.state(), SessionState::Ended);
    }

    #[test]
    fn test_natural_eof_auto_advances_once() {
        let mut fx = fixture("auto_advance");
        let (dir, files) = video_folder("auto_advance_vids", &["e1.mp4", "e2.mp4", "e3.mp4"]);
        for f in &files {
            fx.engine.set_duration_for(f, 30.0);
        }

        fx.session.open_folder(&dir).unwrap();
        settle(&mut fx);
        assert!(fx.session.jump(1));
        settle(&mut fx);
        assert_eq!(fx.session.playlist().current_index(), Some(1));
        let loads_before = fx.engine.load_count();

        // Run file 1 to its natural end.
        fx.engine.tick(31.0);
        fx.session.pump();

        assert_eq!(fx.session.playlist().current_index(), Some(2));
        assert_eq!(fx.engine.load_count(), loads_before + 1);
        assert_eq!(fx.session.state(), SessionState::Loading);

        settle(&mut fx);
        assert_eq!(fx.session.state(), SessionState::Playing);
        assert_eq!(fx.session.current_file(), Some(files[2].as_path()));
    }

    #[test]
    fn test_playlist_finished_at_last_file() {
        let mut fx = fixture("playlist_finished");
        let (dir, files) = video_folder("playlist_finished_vids", &["e1.mp4"]);
        fx.engine.set_duration_for(&files[0], 30.0);

        fx.session.open_folder(&dir).unwrap();
        settle(&mut fx);
        fx.engine.tick(31.0);
        fx.session.pump();

        assert_eq!(fx.session.state(), SessionState::Ended);
        assert!(fx
            .notices
            .try_iter()
            .any(|e| e == SessionEvent::PlaylistFinished));
    }

    #[test]
    fn test_next_at_end_reports_boundary() {
        let mut fx = fixture("next_boundary");
        let (dir, _files) = video_folder("next_boundary_vids", &["e1.mp4", "e2.mp4"]);

        fx.session.open_folder(&dir).unwrap();
        assert!(fx.session.next());
        assert!(!fx.session.next());
        assert_eq!(fx.session.playlist().current_index(), Some(1));
        assert!(fx
            .notices
            .try_iter()
            .any(|e| e == SessionEvent::AtPlaylistEnd));
    }

    #[test]
    fn test_open_folder_without_videos_fails() {
        let mut fx = fixture("empty_folder");
        let (dir, _files) = video_folder("empty_folder_vids", &["readme.txt"]);
        assert!(fx.session.open_folder(&dir).is_err());
        assert_eq!(fx.session.state(), SessionState::Idle);
    }

    #[test]
    fn test_progress_persisted_on_switch() {
        let mut fx = fixture("persist_switch");
        let file = Path::new("/telly_vids/ep1.mp4");
        fx.engine.set_duration_for(file, 1000.0);

        fx.session.open(file);
        settle(&mut fx);
        fx.engine.tick(300.0);
        fx.session.pump();
        fx.session.stop();

        assert_eq!(fx.store.get_progress(file), 30.0);
    }

    #[test]
    fn test_tiny_progress_never_persisted() {
        let mut fx = fixture("tiny_progress");
        let file = Path::new("/telly_vids/ep1.mp4");
        fx.engine.set_duration_for(file, 1000.0);

        fx.session.open(file);
        settle(&mut fx);
        fx.engine.tick(5.0);
        fx.session.pump();
        fx.session.stop();

        assert_eq!(fx.store.get_progress(file), 0.0);
    }

    #[test]
    fn test_stop_echo_does_not_advance() {
        let mut fx = fixture("stop_echo");
        let (dir, files) = video_folder("stop_echo_vids", &["e1.mp4", "e2.mp4"]);
        for f in &files {
            fx.engine.set_duration_for(f, 100.0);
        }

        fx.session.open_folder(&dir).unwrap();
        settle(&mut fx);
        let loads_before = fx.engine.load_count();

        fx.session.stop();
        // A hypothetical engine that echoes a stop as end-of-file: the
        // event carries the current generation but must still be ignored.
        fx.engine
            .emit_with_gen(loads_before, EngineEventKind::EndOfFile);
        fx.session.pump();

        assert_eq!(fx.session.state(), SessionState::Idle);
        assert_eq!(fx.session.playlist().current_index(), Some(0));
        assert_eq!(fx.engine.load_count(), loads_before);
    }

    #[test]
    fn test_stale_generation_events_dropped() {
        let mut fx = fixture("stale_gen");
        let a = Path::new("/telly_vids/a.mp4");
        let b = Path::new("/telly_vids/b.mp4");
        fx.engine.set_duration_for(a, 100.0);
        fx.engine.set_duration_for(b, 100.0);

        fx.session.open(a);
        settle(&mut fx);
        fx.session.open(b);
        settle(&mut fx);

        // Late events of the superseded load change nothing.
        fx.engine.emit_with_gen(1, EngineEventKind::Position(50.0));
        fx.engine.emit_with_gen(1, EngineEventKind::EndOfFile);
        fx.session.pump();

        assert_eq!(fx.session.position(), 0.0);
        assert_eq!(fx.session.state(), SessionState::Playing);
    }

    #[test]
    fn test_eof_suppressed_while_loading() {
        let mut fx = fixture("eof_loading");
        let file = Path::new("/telly_vids/ep1.mp4");

        fx.session.open(file);
        let generation = fx.engine.load_count();
        fx.engine.emit_with_gen(generation, EngineEventKind::EndOfFile);
        fx.session.pump();

        assert_eq!(fx.session.state(), SessionState::Loading);
    }

    #[test]
    fn test_unloadable_file_stays_loading() {
        let mut fx = fixture("unloadable");
        let file = Path::new("/telly_vids/broken.mp4");
        fx.engine.set_unloadable(file);

        fx.session.open(file);
        fx.engine.tick(1.0);
        fx.engine.tick(1.0);
        fx.session.pump();
        assert_eq!(fx.session.state(), SessionState::Loading);
    }

    #[test]
    fn test_seek_returns_to_prior_state() {
        let mut fx = fixture("seek_restore");
        let file = Path::new("/telly_vids/ep1.mp4");
        fx.engine.set_duration_for(file, 1000.0);

        fx.session.open(file);
        settle(&mut fx);

        fx.session.seek(200.0);
        assert_eq!(fx.session.state(), SessionState::Seeking);
        fx.session.pump();
        assert_eq!(fx.session.state(), SessionState::Playing);
        assert_eq!(fx.session.position(), 200.0);

        fx.session.toggle_pause();
        fx.session.seek(100.0);
        fx.session.pump();
        assert_eq!(fx.session.state(), SessionState::Paused);
    }

    #[test]
    fn test_seek_clamps_to_duration() {
        let mut fx = fixture("seek_clamp");
        let file = Path::new("/telly_vids/ep1.mp4");
        fx.engine.set_duration_for(file, 100.0);

        fx.session.open(file);
        settle(&mut fx);

        fx.session.seek(5000.0);
        fx.session.pump();
        assert_eq!(fx.session.position(), 100.0);

        fx.session.seek(-50.0);
        fx.session.pump();
        assert_eq!(fx.session.position(), 0.0);
    }

    #[test]
    fn test_seek_step_moves_relative(){
        let mut fx = fixture("seek_step");
        let file = Path::new("/telly_vids/ep1.mp4");
        fx.engine.set_duration_for(file, 1000.0);

        fx.session.open(file);
        settle(&mut fx);
        fx.session.seek(100.0);
        fx.session.pump();

        fx.session.seek_forward();
        fx.session.pump();
        assert_eq!(fx.session.position(), 110.0);

        fx.session.seek_backward();
        fx.session.pump();
        assert_eq!(fx.session.position(), 100.0);
    }

    #[test]
    fn test_toggle_pause_round_trip() {
        let mut fx = fixture("toggle_pause");
        let file = Path::new("/telly_vids/ep1.mp4");

        fx.session.open(file);
        settle(&mut fx);
        assert_eq!(fx.session.state(), SessionState::Playing);

        fx.session.toggle_pause();
        assert_eq!(fx.session.state(), SessionState::Paused);
        assert!(fx.engine.paused());

        fx.session.toggle_pause();
        assert_eq!(fx.session.state(), SessionState::Playing);
    }

    #[test]
    fn test_config_commands_rejected_when_idle() {
        let mut fx = fixture("idle_rejects");
        fx.session.set_speed(2.0);
        fx.session.set_volume(10);
        fx.session.toggle_mute();

        assert_eq!(fx.session.speed(), 1.0);
        assert_eq!(fx.session.volume(), 100);
        assert!(!fx.session.muted());
        assert_eq!(fx.store.load_global().speed, 1.0);
    }

    #[test]
    fn test_speed_clamped_and_persisted() {
        let mut fx = fixture("speed_clamp");
        let file = Path::new("/telly_vids/ep1.mp4");
        fx.session.open(file);
        settle(&mut fx);

        fx.session.set_speed(10.0);
        assert_eq!(fx.session.speed(), 3.0);
        assert_eq!(fx.store.load_global().speed, 3.0);

        fx.session.set_speed(0.01);
        assert_eq!(fx.session.speed(), 0.25);
    }

    #[test]
    fn test_skip_values_clamped_and_persisted() {
        let mut fx = fixture("skip_clamp");
        let file = Path::new("/telly_vids/ep1.mp4");
        fx.session.open(file);
        settle(&mut fx);

        fx.session.set_skip_intro(10_000);
        fx.session.set_skip_outro(90);
        assert_eq!(fx.session.skip_intro(), 600);
        assert_eq!(fx.session.skip_outro(), 90);

        let settings = fx.store.load_settings(file);
        assert_eq!(settings.skip_intro, 600);
        assert_eq!(settings.skip_outro, 90);
    }

    #[test]
    fn test_replay_after_ended_reloads() {
        let mut fx = fixture("replay_ended");
        let file = Path::new("/telly_vids/ep1.mp4");
        fx.engine.set_duration_for(file, 30.0);

        fx.session.open(file);
        settle(&mut fx);
        fx.engine.tick(31.0);
        fx.session.pump();
        assert_eq!(fx.session.state(), SessionState::Ended);

        fx.session.replay();
        assert_eq!(fx.session.state(), SessionState::Loading);
        settle(&mut fx);
        assert_eq!(fx.session.state(), SessionState::Playing);
    }
}
