//! Simulated playback engine driven by a clock.
//!
//! **Why**: The session controller needs a real `MediaEngine` to run
//! against: in tests (deterministic, manually ticked) and in the headless
//! binary (realtime, ticked by a background thread). The realtime driver
//! thread also reproduces the defining property of native engines:
//! events arrive on a context the controller does not own.
//!
//! **Used by**: Session controller tests, `main.rs` pump loop.
//!
//! # Timing Model
//!
//! `tick(dt)` advances the playback clock by `dt * speed` seconds and
//! emits a `Position` event. A pending load resolves on the first tick
//! after `load()`, emitting `Duration` then `FileLoaded`. Reaching the end
//! of the media emits `EndOfFile` exactly once. `stop()` emits nothing.

use crate::engine::{
    AudioTrack, EngineError, EngineEvent, EngineEventKind, EngineEventSender, MediaEngine,
    SeekMode, SubtitleTrack,
};
use log::{debug, trace};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Realtime driver tick interval
const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Duration assumed for files without a probe entry (seconds)
const DEFAULT_DURATION: f64 = 60.0;

struct Inner {
    events: EngineEventSender,
    generation: u64,
    media: Option<PathBuf>,
    pending_load: bool,
    eof_sent: bool,
    position: f64,
    duration: f64,
    paused: bool,
    speed: f64,
    volume: i64,
    muted: bool,
    audio_track: i64,
    subtitle_track: i64,
    durations: HashMap<PathBuf, f64>,
    unloadable: HashSet<PathBuf>,
    default_duration: f64,
    terminated: bool,
}

impl Inner {
    fn emit(&self, kind: EngineEventKind) {
        self.events.emit(self.generation, kind);
    }

    fn tick(&mut self, dt: f64) {
        if self.terminated {
            return;
        }
        let Some(path) = self.media.clone() else {
            return;
        };
        if self.unloadable.contains(&path) {
            // A corrupt file: the load never completes and no event is emitted.
            return;
        }
        if self.pending_load {
            self.pending_load = false;
            self.emit(EngineEventKind::Duration(self.duration));
            self.emit(EngineEventKind::FileLoaded);
            return;
        }
        if self.paused {
            return;
        }

        let next = self.position + dt * self.speed;
        if next >= self.duration {
            self.position = self.duration;
            self.emit(EngineEventKind::Position(self.position));
            if !self.eof_sent {
                self.eof_sent = true;
                trace!("sim: end of {}", path.display());
                self.emit(EngineEventKind::EndOfFile);
            }
        } else {
            self.position = next;
            self.emit(EngineEventKind::Position(self.position));
        }
    }
}

/// Clock-driven engine shim. Cloning yields another handle onto the same
/// engine, so tests can keep one handle for ticking and inspection while
/// the session owns the other.
#[derive(Clone)]
pub struct SimEngine {
    inner: Arc<Mutex<Inner>>,
    shutdown: Arc<AtomicBool>,
    clock: Arc<Mutex<Option<thread::JoinHandle<()>>>>,
}

impl SimEngine {
    /// Create an engine in manual mode: time advances only through `tick()`.
    pub fn new(events: EngineEventSender) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                events,
                generation: 0,
                media: None,
                pending_load: false,
                eof_sent: false,
                position: 0.0,
                duration: 0.0,
                paused: false,
                speed: 1.0,
                volume: 100,
                muted: false,
                audio_track: 1,
                subtitle_track: 0,
                durations: HashMap::new(),
                unloadable: HashSet::new(),
                default_duration: DEFAULT_DURATION,
                terminated: false,
            })),
            shutdown: Arc::new(AtomicBool::new(false)),
            clock: Arc::new(Mutex::new(None)),
        }
    }

    /// Create an engine ticked by a background clock thread, the way a
    /// native engine would deliver events from its own context.
    pub fn spawn_realtime(events: EngineEventSender) -> Result<Self, EngineError> {
        let engine = Self::new(events);

        let inner = Arc::clone(&engine.inner);
        let shutdown = Arc::clone(&engine.shutdown);
        let handle = thread::Builder::new()
            .name("telly-engine-clock".to_string())
            .spawn(move || {
                let mut last = Instant::now();
                while !shutdown.load(Ordering::Relaxed) {
                    thread::sleep(TICK_INTERVAL);
                    let now = Instant::now();
                    let dt = now.duration_since(last).as_secs_f64();
                    last = now;
                    inner.lock().unwrap_or_else(|e| e.into_inner()).tick(dt);
                }
                trace!("engine clock stopped");
            })
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;

        *engine
            .clock
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(handle);
        Ok(engine)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Advance the playback clock by `dt` seconds (manual mode).
    pub fn tick(&self, dt: f64) {
        self.lock().tick(dt);
    }

    /// Register the probed duration of a file.
    pub fn set_duration_for(&self, path: &Path, secs: f64) {
        self.lock().durations.insert(path.to_path_buf(), secs);
    }

    /// Override the duration assumed for unprobed files.
    pub fn set_default_duration(&self, secs: f64) {
        self.lock().default_duration = secs;
    }

    /// Mark a file as unloadable: `load()` for it never completes.
    pub fn set_unloadable(&self, path: &Path) {
        self.lock().unloadable.insert(path.to_path_buf());
    }

    /// Number of `load()` calls issued so far.
    pub fn load_count(&self) -> u64 {
        self.lock().generation
    }

    /// Inject a raw event with an arbitrary generation stamp.
    #[cfg(test)]
    pub fn emit_with_gen(&self, generation: u64, kind: EngineEventKind) {
        self.lock().events.emit(generation, kind);
    }
}

impl MediaEngine for SimEngine {
    fn load(&mut self, path: &Path) -> u64 {
        let mut g = self.lock();
        g.generation += 1;
        g.media = Some(path.to_path_buf());
        g.pending_load = true;
        g.eof_sent = false;
        g.paused = false;
        g.position = 0.0;
        let duration = g.durations.get(path).copied();
        g.duration = duration.unwrap_or(g.default_duration);
        debug!("sim load #{}: {}", g.generation, path.display());
        g.generation
    }

    fn play(&mut self) {
        self.lock().paused = false;
    }

    fn pause(&mut self) {
        self.lock().paused = true;
    }

    fn toggle_pause(&mut self) {
        let mut g = self.lock();
        g.paused = !g.paused;
    }

    fn stop(&mut self) {
        let mut g = self.lock();
        g.media = None;
        g.pending_load = false;
        g.position = 0.0;
        g.duration = 0.0;
        debug!("sim stop");
    }

    fn seek(&mut self, target: f64, mode: SeekMode) {
        let mut g = self.lock();
        if g.media.is_none() || g.terminated {
            return;
        }
        let target = match mode {
            SeekMode::Absolute => target,
            SeekMode::Relative => g.position + target,
        };
        g.position = target.clamp(0.0, g.duration.max(0.0));
        g.eof_sent = false;
        let pos = g.position;
        g.emit(EngineEventKind::Position(pos));
    }

    fn set_speed(&mut self, speed: f64) {
        self.lock().speed = speed;
    }

    fn set_volume(&mut self, volume: i64) {
        self.lock().volume = volume;
    }

    fn set_muted(&mut self, muted: bool) {
        self.lock().muted = muted;
    }

    fn select_audio_track(&mut self, id: i64) {
        self.lock().audio_track = id;
    }

    fn select_subtitle_track(&mut self, id: i64) {
        self.lock().subtitle_track = id;
    }

    fn position(&self) -> f64 {
        self.lock().position
    }

    fn duration(&self) -> f64 {
        self.lock().duration
    }

    fn paused(&self) -> bool {
        self.lock().paused
    }

    fn volume(&self) -> i64 {
        self.lock().volume
    }

    fn muted(&self) -> bool {
        self.lock().muted
    }

    fn speed(&self) -> f64 {
        self.lock().speed
    }

    fn audio_tracks(&self) -> Vec<AudioTrack> {
        let g = self.lock();
        if g.media.is_none() {
            return Vec::new();
        }
        vec![
            AudioTrack {
                id: 1,
                title: "Main".to_string(),
                lang: "und".to_string(),
                selected: g.audio_track == 1,
            },
            AudioTrack {
                id: 2,
                title: "Commentary".to_string(),
                lang: "und".to_string(),
                selected: g.audio_track == 2,
            },
        ]
    }

    fn current_audio_track(&self) -> i64 {
        self.lock().audio_track
    }

    fn subtitle_tracks(&self) -> Vec<SubtitleTrack> {
        let g = self.lock();
        if g.media.is_none() {
            return Vec::new();
        }
        vec![SubtitleTrack {
            id: 1,
            title: "Embedded".to_string(),
            lang: "und".to_string(),
            selected: g.subtitle_track == 1,
            external: false,
        }]
    }

    fn current_subtitle_track(&self) -> i64 {
        self.lock().subtitle_track
    }

    fn terminate(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self
            .clock
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            let _ = handle.join();
        }
        let mut g = self.lock();
        g.media = None;
        g.terminated = true;
    }
}
