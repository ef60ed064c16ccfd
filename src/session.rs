use crate::audio::AudioEngine;
use crate::error::{PlayerError, Result};
use crate::model::MAX_VOLUME;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub const VOLUME_STEP: u8 = 5;

/// Now playing, play history and the running counters for one session.
#[derive(Debug)]
pub struct PlaybackSession {
    now_playing: Option<PathBuf>,
    last_played: Option<PathBuf>,
    history: Vec<PathBuf>,
    song_count: u64,
    skip_count: u64,
    started_at: Instant,
    paused: bool,
    volume: u8,
}

impl PlaybackSession {
    pub fn new(volume: u8, last_played: Option<PathBuf>) -> Self {
        Self {
            now_playing: None,
            last_played,
            history: Vec::new(),
            song_count: 0,
            skip_count: 0,
            started_at: Instant::now(),
            paused: false,
            volume: volume.min(MAX_VOLUME),
        }
    }

    pub fn now_playing(&self) -> Option<&Path> {
        self.now_playing.as_deref()
    }

    /// The most recent track that started, surviving restarts via settings.
    pub fn last_played(&self) -> Option<&Path> {
        self.last_played.as_deref()
    }

    pub fn history(&self) -> &[PathBuf] {
        &self.history
    }

    pub fn song_count(&self) -> u64 {
        self.song_count
    }

    pub fn skip_count(&self) -> u64 {
        self.skip_count
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn record_skip(&mut self) {
        self.skip_count += 1;
    }

    pub fn reset_counters(&mut self) {
        self.song_count = 0;
        self.skip_count = 0;
        self.started_at = Instant::now();
    }

    /// Loads and starts `track`. Nothing changes when the engine refuses it.
    pub fn play(&mut self, engine: &mut dyn AudioEngine, track: &Path) -> Result<()> {
        self.start(engine, track)?;
        self.history.push(track.to_path_buf());
        self.song_count += 1;
        Ok(())
    }

    fn start(&mut self, engine: &mut dyn AudioEngine, track: &Path) -> Result<()> {
        engine.load(track).map_err(PlayerError::engine)?;
        engine.play().map_err(PlayerError::engine)?;
        self.now_playing = Some(track.to_path_buf());
        self.last_played = Some(track.to_path_buf());
        self.paused = false;
        Ok(())
    }

    /// Pauses the loaded track. Returns `false` when nothing is loaded, in
    /// which case the paused flag is left clear.
    pub fn pause(&mut self, engine: &mut dyn AudioEngine) -> bool {
        if self.now_playing.is_none() {
            return false;
        }
        engine.pause();
        self.paused = true;
        true
    }

    pub fn resume(&mut self, engine: &mut dyn AudioEngine) -> bool {
        if self.now_playing.is_none() {
            self.paused = false;
            return false;
        }
        engine.unpause();
        self.paused = false;
        true
    }

    /// Steps back one entry in the history and replays it without pushing it
    /// again. Returns `Ok(None)` when there is nothing to go back to.
    pub fn previous(&mut self, engine: &mut dyn AudioEngine) -> Result<Option<PathBuf>> {
        if self.history.len() < 2 {
            return Ok(None);
        }

        let target = self.history[self.history.len() - 2].clone();
        self.start(engine, &target)?;
        self.history.pop();
        Ok(Some(target))
    }

    pub fn set_volume(&mut self, engine: &mut dyn AudioEngine, percent: u8) -> u8 {
        self.volume = percent.min(MAX_VOLUME);
        engine.set_volume(f32::from(self.volume) / 100.0);
        self.volume
    }

    pub fn volume_up(&mut self, engine: &mut dyn AudioEngine) -> u8 {
        let next = self.volume.saturating_add(VOLUME_STEP).min(MAX_VOLUME);
        self.set_volume(engine, next)
    }

    pub fn volume_down(&mut self, engine: &mut dyn AudioEngine) -> u8 {
        let next = self.volume.saturating_sub(VOLUME_STEP);
        self.set_volume(engine, next)
    }

    pub fn stop(&mut self, engine: &mut dyn AudioEngine) {
        engine.stop();
        self.now_playing = None;
        self.paused = false;
    }
}
