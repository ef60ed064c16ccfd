use anyhow::{Context, Result};
use rodio::Source;
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
#[cfg(unix)]
use std::ffi::CString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Highest gain handed to an output sink (120%).
const MAX_GAIN: f32 = 1.2;

/// Playback backend. `load` prepares a track without starting it; `play`
/// starts whatever is loaded.
pub trait AudioEngine {
    fn load(&mut self, path: &Path) -> Result<()>;
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self);
    fn unpause(&mut self);
    fn stop(&mut self);
    /// `volume` is a gain in `0.0..=1.2`.
    fn set_volume(&mut self, volume: f32);
    /// True while a loaded track still has audio left to render.
    fn is_busy(&self) -> bool;
}

pub struct RodioAudioEngine {
    stream: OutputStream,
    sink: Sink,
    loaded: Option<PathBuf>,
    volume: f32,
}

impl RodioAudioEngine {
    pub fn new() -> Result<Self> {
        let stream = Self::open_output_stream()?;
        let sink = Sink::connect_new(stream.mixer());

        Ok(Self {
            stream,
            sink,
            loaded: None,
            volume: 1.0,
        })
    }

    fn open_output_stream() -> Result<OutputStream> {
        let mut stream = with_silenced_stderr(|| {
            match OutputStreamBuilder::from_default_device()
                .context("failed to open default system output stream")
                .and_then(|builder| {
                    builder
                        .with_error_callback(|_| {})
                        .open_stream_or_fallback()
                        .context("failed to start default output stream")
                }) {
                Ok(stream) => Ok(stream),
                Err(default_err) => open_any_output_device()
                    .with_context(|| format!("no audio output after default failed: {default_err:#}")),
            }
        })?;
        stream.log_on_drop(false);
        Ok(stream)
    }
}

fn open_any_output_device() -> Result<OutputStream> {
    let host = rodio::cpal::default_host();
    let mut candidates: Vec<String> = host
        .output_devices()
        .context("failed to enumerate output devices")?
        .filter_map(|device| device.name().ok())
        .collect();
    candidates.sort_by_cached_key(|name| {
        let lower = name.to_ascii_lowercase();
        let rank = if lower.contains("pulse") {
            0_u8
        } else if lower.contains("pipewire") {
            1_u8
        } else if lower.contains("default") {
            2_u8
        } else {
            3_u8
        };
        (rank, lower)
    });
    candidates.dedup();

    for candidate in candidates {
        let Some(device) = host
            .output_devices()
            .ok()
            .into_iter()
            .flatten()
            .find(|entry| entry.name().ok().as_deref() == Some(candidate.as_str()))
        else {
            continue;
        };
        let opened = OutputStreamBuilder::from_device(device)
            .context("failed to open fallback output device")
            .and_then(|builder| {
                builder
                    .with_error_callback(|_| {})
                    .open_stream_or_fallback()
                    .context("failed to start fallback output stream")
            });
        if let Ok(stream) = opened {
            return Ok(stream);
        }
    }

    anyhow::bail!("no output device could be started")
}

impl AudioEngine for RodioAudioEngine {
    fn load(&mut self, path: &Path) -> Result<()> {
        let file =
            File::open(path).with_context(|| format!("failed to open track {}", path.display()))?;
        let source = Decoder::try_from(file)
            .with_context(|| format!("failed to decode {}", path.display()))?;

        self.sink.stop();
        self.sink = Sink::connect_new(self.stream.mixer());
        self.sink.set_volume(self.volume);
        self.sink.pause();
        self.sink.append(source);
        self.loaded = Some(path.to_path_buf());
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        if self.loaded.is_none() {
            anyhow::bail!("no track loaded");
        }
        self.sink.play();
        Ok(())
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn unpause(&mut self) {
        self.sink.play();
    }

    fn stop(&mut self) {
        self.sink.stop();
        self.loaded = None;
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, MAX_GAIN);
        self.sink.set_volume(self.volume);
    }

    fn is_busy(&self) -> bool {
        self.loaded.is_some() && !self.sink.empty()
    }
}

#[cfg(unix)]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    let saved = unsafe { libc::dup(libc::STDERR_FILENO) };
    if saved < 0 {
        return operation();
    }

    let devnull = CString::new("/dev/null")
        .ok()
        .map(|path| unsafe { libc::open(path.as_ptr(), libc::O_WRONLY) })
        .unwrap_or(-1);

    if devnull >= 0 {
        unsafe {
            libc::dup2(devnull, libc::STDERR_FILENO);
            libc::close(devnull);
        }
    }

    let result = operation();

    unsafe {
        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);
    }

    result
}

#[cfg(not(unix))]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    operation()
}

/// Silent engine that keeps time. A track counts as busy until its decoded
/// duration has elapsed; tracks that cannot be decoded stay busy until stopped.
#[derive(Debug, Default)]
pub struct NullAudioEngine {
    loaded: Option<PathBuf>,
    playing: bool,
    started_at: Option<Instant>,
    position_offset: Duration,
    track_duration: Option<Duration>,
    volume: f32,
}

impl NullAudioEngine {
    pub fn new() -> Self {
        Self {
            volume: 1.0,
            ..Self::default()
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    fn estimate_duration(path: &Path) -> Option<Duration> {
        let file = File::open(path).ok()?;
        let source = Decoder::try_from(file).ok()?;
        source
            .total_duration()
            .filter(|duration| !duration.is_zero())
    }

    fn position(&self) -> Duration {
        let mut position = self.position_offset;
        if self.playing
            && let Some(started_at) = self.started_at
        {
            position = position.saturating_add(started_at.elapsed());
        }
        position
    }
}

impl AudioEngine for NullAudioEngine {
    fn load(&mut self, path: &Path) -> Result<()> {
        self.loaded = Some(path.to_path_buf());
        self.playing = false;
        self.started_at = None;
        self.position_offset = Duration::ZERO;
        self.track_duration = Self::estimate_duration(path);
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        if self.loaded.is_none() {
            anyhow::bail!("no track loaded");
        }
        self.playing = true;
        self.started_at = Some(Instant::now());
        Ok(())
    }

    fn pause(&mut self) {
        self.position_offset = self.position();
        self.started_at = None;
        self.playing = false;
    }

    fn unpause(&mut self) {
        if self.loaded.is_some() && !self.playing {
            self.playing = true;
            self.started_at = Some(Instant::now());
        }
    }

    fn stop(&mut self) {
        self.loaded = None;
        self.playing = false;
        self.started_at = None;
        self.position_offset = Duration::ZERO;
        self.track_duration = None;
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, MAX_GAIN);
    }

    fn is_busy(&self) -> bool {
        if self.loaded.is_none() {
            return false;
        }
        match self.track_duration {
            Some(duration) => self.position() < duration,
            None => true,
        }
    }
}
