use crate::audio::AudioEngine;
use crate::config::{self, StorePaths};
use crate::error::PlayerError;
use crate::library::{self, SongLookup};
use crate::model::{Mode, ModeFlags, Settings};
use crate::playlist::{PlaylistManager, SearchResult};
use crate::scan::{ScanOutcome, ScanPool, ScanPurpose};
use crate::scheduler::{Scheduler, Timer};
use crate::selector::{self, Pools};
use crate::session::PlaybackSession;
use crate::status::StatusBoard;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const AUTO_EXPORT_INTERVAL: Duration = Duration::from_secs(30);

/// Outcome of handing a batch of dropped paths to the player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropSummary {
    pub appended: usize,
    pub directories: usize,
    pub ignored: usize,
}

/// The single owner of all player state. Every operation runs on the
/// interactive thread; errors end up on the status board, never as panics.
pub struct PlayerCore {
    paths: StorePaths,
    session: PlaybackSession,
    playlist: PlaylistManager,
    directory_pool: Vec<PathBuf>,
    library_root: Option<PathBuf>,
    flags: ModeFlags,
    status: StatusBoard,
    scheduler: Scheduler,
    rng: SmallRng,
    scans: ScanPool,
    pending_library: Option<u64>,
    search_term: String,
    info: String,
    pub needs_redraw: bool,
}

impl PlayerCore {
    pub fn new(paths: StorePaths, settings: Settings, rng: SmallRng, scans: ScanPool) -> Self {
        let Settings {
            volume,
            last_played,
            playlist,
        } = settings;

        Self {
            paths,
            session: PlaybackSession::new(volume, last_played),
            playlist: PlaylistManager::from_tracks(playlist),
            directory_pool: Vec::new(),
            library_root: None,
            flags: ModeFlags::default(),
            status: StatusBoard::default(),
            scheduler: Scheduler::default(),
            rng,
            scans,
            pending_library: None,
            search_term: String::new(),
            info: String::new(),
            needs_redraw: true,
        }
    }

    /// Loads settings from disk. A broken settings file is reported and the
    /// session starts from defaults.
    pub fn open(paths: StorePaths) -> Self {
        let (settings, load_error) = match config::load_settings(&paths) {
            Ok(settings) => (settings, None),
            Err(err) => (Settings::default(), Some(err)),
        };

        let mut core = Self::new(
            paths,
            settings,
            SmallRng::from_os_rng(),
            ScanPool::with_default_workers(),
        );
        if let Some(err) = load_error {
            core.notify_error(&err);
        }
        core
    }

    /// Applies the restored volume, arms the poll timer and starts scanning
    /// the initial library.
    pub fn startup(&mut self, engine: &mut dyn AudioEngine, root: PathBuf, now: Instant) {
        let volume = self.session.volume();
        self.session.set_volume(engine, volume);
        self.scheduler.schedule(Timer::Poll, POLL_INTERVAL, now);
        info!(volume, playlist = self.playlist.len(), "session restored");
        self.change_dir(root);
    }

    pub fn shutdown(&mut self, engine: &mut dyn AudioEngine) {
        self.scheduler.cancel_all();
        self.session.stop(engine);
        self.scans.shutdown();
        if let Err(err) = config::save_settings(&self.paths, &self.settings()) {
            warn!("final settings save failed: {err}");
        }
        info!("shut down");
    }

    pub fn settings(&self) -> Settings {
        Settings {
            volume: self.session.volume(),
            last_played: self.session.last_played().map(Path::to_path_buf),
            playlist: self.playlist.tracks().to_vec(),
        }
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn playlist(&self) -> &PlaylistManager {
        &self.playlist
    }

    pub fn directory_pool(&self) -> &[PathBuf] {
        &self.directory_pool
    }

    pub fn library_root(&self) -> Option<&Path> {
        self.library_root.as_deref()
    }

    pub fn flags(&self) -> ModeFlags {
        self.flags
    }

    pub fn status(&self) -> &StatusBoard {
        &self.status
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn info(&self) -> &str {
        &self.info
    }

    pub fn is_scanning(&self) -> bool {
        self.pending_library.is_some()
    }

    pub fn notify(&mut self, text: impl Into<String>) {
        self.status.set_status(text, Instant::now());
        self.arm_status_reset();
        self.needs_redraw = true;
    }

    pub fn notify_error(&mut self, err: &PlayerError) {
        self.status.set_error(err.to_string(), Instant::now());
        self.arm_status_reset();
        self.needs_redraw = true;
    }

    fn arm_status_reset(&mut self) {
        if let Some(deadline) = self.status.next_expiry() {
            self.scheduler.schedule_at(Timer::StatusReset, deadline);
        }
    }

    fn save_settings(&mut self) -> bool {
        match config::save_settings(&self.paths, &self.settings()) {
            Ok(()) => true,
            Err(err) => {
                self.notify_error(&err);
                false
            }
        }
    }

    /// Picks the next track by the active modes and plays it.
    pub fn skip(&mut self, engine: &mut dyn AudioEngine) -> bool {
        if self.session.is_paused() {
            self.notify_error(&PlayerError::Paused);
            return false;
        }

        let pools = Pools {
            directory: &self.directory_pool,
            playlist: self.playlist.tracks(),
        };
        let selection =
            match selector::select_next(&self.flags, pools, self.session.skip_count(), &mut self.rng)
            {
                Ok(selection) => selection,
                Err(err) => {
                    self.notify_error(&err);
                    return false;
                }
            };

        debug!(pool = ?selection.pool, index = selection.index, "selected next track");
        self.session.record_skip();
        self.play_track(engine, &selection.track)
    }

    pub fn play_track(&mut self, engine: &mut dyn AudioEngine, track: &Path) -> bool {
        match self.session.play(engine, track) {
            Ok(()) => {
                self.save_settings();
                self.notify(format!("Playing: {}", display_name(track)));
                true
            }
            Err(err) => {
                self.notify_error(&err);
                false
            }
        }
    }

    pub fn pause(&mut self, engine: &mut dyn AudioEngine) -> bool {
        let paused = self.session.pause(engine);
        if paused {
            self.notify("Music Paused");
        }
        paused
    }

    pub fn resume(&mut self, engine: &mut dyn AudioEngine) -> bool {
        let resumed = self.session.resume(engine);
        if resumed {
            self.notify("Music Resumed");
        }
        resumed
    }

    pub fn previous(&mut self, engine: &mut dyn AudioEngine) -> bool {
        match self.session.previous(engine) {
            Ok(Some(track)) => {
                self.save_settings();
                self.notify(format!("Playing: {}", display_name(&track)));
                true
            }
            Ok(None) => {
                self.notify("No previous song");
                false
            }
            Err(err) => {
                self.notify_error(&err);
                false
            }
        }
    }

    pub fn volume_up(&mut self, engine: &mut dyn AudioEngine) -> u8 {
        let volume = self.session.volume_up(engine);
        self.volume_changed(volume)
    }

    pub fn volume_down(&mut self, engine: &mut dyn AudioEngine) -> u8 {
        let volume = self.session.volume_down(engine);
        self.volume_changed(volume)
    }

    pub fn set_volume(&mut self, engine: &mut dyn AudioEngine, percent: u8) -> u8 {
        let volume = self.session.set_volume(engine, percent);
        self.volume_changed(volume)
    }

    fn volume_changed(&mut self, volume: u8) -> u8 {
        self.save_settings();
        self.notify(format!("Volume: {volume}%"));
        volume
    }

    /// Flips one mode and returns its new state. Sequential playlist mode
    /// also drives the periodic playlist export.
    pub fn toggle(&mut self, mode: Mode, now: Instant) -> bool {
        let enabled = self.flags.toggle(mode);
        if mode == Mode::PlaylistOnlyNotRandom {
            if enabled {
                self.auto_export(now);
            } else {
                self.scheduler.cancel(Timer::PlaylistAutoExport);
            }
        }
        let state = if enabled { "Enabled" } else { "Disabled" };
        self.notify(format!("{} {state}", mode.label()));
        enabled
    }

    fn auto_export(&mut self, now: Instant) {
        self.export_playlist_file();
        self.scheduler
            .schedule(Timer::PlaylistAutoExport, AUTO_EXPORT_INTERVAL, now);
    }

    pub fn save_current_song(&mut self) -> bool {
        let Some(track) = self.session.now_playing().map(Path::to_path_buf) else {
            self.notify("No song is playing");
            return false;
        };
        self.playlist.append(track);
        self.save_settings();
        self.notify("Song Saved");
        true
    }

    pub fn clear_playlist(&mut self) {
        self.playlist.clear();
        self.search_term.clear();
        self.save_settings();
        self.notify("Playlist Cleared");
    }

    pub fn shuffle_playlist(&mut self) {
        self.playlist.shuffle(&mut self.rng);
        self.save_settings();
        self.notify("Playlist Shuffled");
    }

    /// Writes the playlist file when there are unsaved changes; returns
    /// whether anything was written.
    pub fn export_playlist_file(&mut self) -> bool {
        if !self.playlist.is_dirty() {
            return false;
        }
        match config::export_playlist(&self.paths, self.playlist.tracks()) {
            Ok(()) => {
                self.playlist.mark_saved();
                self.notify("Playlist saved to file");
                true
            }
            Err(err) => {
                self.notify_error(&err);
                false
            }
        }
    }

    pub fn import_playlist_file(&mut self) -> bool {
        match config::import_playlist(&self.paths) {
            Ok(tracks) => {
                self.playlist.replace_from_file(tracks);
                self.search_term.clear();
                self.save_settings();
                self.notify("Playlist loaded from file");
                true
            }
            Err(err) => {
                self.notify_error(&err);
                false
            }
        }
    }

    pub fn search(&mut self, term: &str) -> SearchResult {
        self.search_term = term.to_string();
        self.needs_redraw = true;
        self.playlist.search(term)
    }

    pub fn focus_next(&mut self) {
        let next = match self.playlist.focus() {
            Some(index) => (index + 1).min(self.playlist.len().saturating_sub(1)),
            None => 0,
        };
        self.playlist.set_focus(Some(next));
        self.needs_redraw = true;
    }

    pub fn focus_prev(&mut self) {
        let prev = self.playlist.focus().map_or(0, |index| index.saturating_sub(1));
        self.playlist.set_focus(Some(prev));
        self.needs_redraw = true;
    }

    pub fn play_first(&mut self, engine: &mut dyn AudioEngine) -> bool {
        self.play_selected(engine, 0)
    }

    pub fn play_selected(&mut self, engine: &mut dyn AudioEngine, index: usize) -> bool {
        let Some(track) = self.playlist.get(index).map(Path::to_path_buf) else {
            return false;
        };
        self.play_track(engine, &track)
    }

    pub fn play_focused(&mut self, engine: &mut dyn AudioEngine) -> bool {
        match self.playlist.focus() {
            Some(index) => self.play_selected(engine, index),
            None => false,
        }
    }

    /// Audio files are appended right away; directories are scanned in the
    /// background and appended when their scan completes.
    pub fn drop_paths(&mut self, paths: &[PathBuf]) -> DropSummary {
        let mut summary = DropSummary::default();
        let mut files = Vec::new();

        for path in paths {
            if path.is_dir() {
                self.scans.submit(ScanPurpose::PlaylistImport, path.clone());
                summary.directories += 1;
            } else if library::is_audio(path) {
                files.push(path.clone());
            } else {
                summary.ignored += 1;
            }
        }

        summary.appended = self.playlist.append_many(files);
        if summary.appended > 0 {
            self.playlist.sort();
        }
        self.save_settings();

        if summary.appended > 0 {
            self.notify(format!("Added {} songs to playlist", summary.appended));
        } else if summary.directories > 0 {
            self.notify("Importing dropped folders");
        }
        debug!(?summary, "paths dropped");
        summary
    }

    /// Starts a background scan of a new library root. The current pool stays
    /// in place until the scan completes.
    pub fn change_dir(&mut self, root: PathBuf) {
        self.notify(format!("Loading {}", root.display()));
        self.pending_library = Some(self.scans.submit(ScanPurpose::Library, root));
    }

    /// Applies every finished scan without blocking. Returns how many were seen.
    pub fn pump_scans(&mut self, engine: &mut dyn AudioEngine) -> usize {
        let mut seen = 0;
        while let Some(outcome) = self.scans.try_next() {
            self.apply_scan(engine, outcome);
            seen += 1;
        }
        seen
    }

    /// Blocks up to `timeout` for one scan to finish and applies it.
    pub fn wait_for_scan(&mut self, engine: &mut dyn AudioEngine, timeout: Duration) -> bool {
        match self.scans.next_timeout(timeout) {
            Some(outcome) => {
                self.apply_scan(engine, outcome);
                true
            }
            None => false,
        }
    }

    pub fn apply_scan(&mut self, engine: &mut dyn AudioEngine, outcome: ScanOutcome) {
        let ScanOutcome {
            ticket,
            purpose,
            root,
            result,
        } = outcome;

        match purpose {
            ScanPurpose::Library => {
                if self.pending_library != Some(ticket) {
                    debug!(ticket, root = %root.display(), "discarding superseded library scan");
                    return;
                }
                self.pending_library = None;
                match result {
                    Ok(tracks) => self.install_library(engine, root, tracks),
                    Err(err) => self.notify_error(&err),
                }
            }
            ScanPurpose::PlaylistImport => match result {
                Ok(tracks) => self.import_dropped(tracks),
                Err(err) => self.notify_error(&err),
            },
        }
    }

    fn install_library(&mut self, engine: &mut dyn AudioEngine, root: PathBuf, tracks: Vec<PathBuf>) {
        info!(root = %root.display(), tracks = tracks.len(), "library loaded");
        self.directory_pool = tracks;
        self.library_root = Some(root);
        self.needs_redraw = true;

        if self.directory_pool.is_empty() {
            self.notify(PlayerError::NoTracks.to_string());
            return;
        }
        self.session.reset_counters();
        self.skip(engine);
    }

    fn import_dropped(&mut self, tracks: Vec<PathBuf>) {
        if tracks.is_empty() {
            self.notify("No songs found in the dropped folder");
            return;
        }
        if let Err(err) = config::export_dropped_playlist(&self.paths, &tracks) {
            self.notify_error(&err);
        }
        let added = self.playlist.append_many(tracks);
        self.playlist.sort();
        self.save_settings();
        self.notify(format!("Added {added} songs to playlist"));
    }

    /// Runs every timer that is due at `now`.
    pub fn tick(&mut self, engine: &mut dyn AudioEngine, now: Instant) {
        for timer in self.scheduler.due(now) {
            self.handle_timer(engine, timer, now);
        }
    }

    pub fn handle_timer(&mut self, engine: &mut dyn AudioEngine, timer: Timer, now: Instant) {
        match timer {
            Timer::Poll => {
                if engine.is_busy() {
                    self.refresh_info(local_now());
                } else {
                    self.auto_advance(engine);
                }
                self.scheduler.schedule(Timer::Poll, POLL_INTERVAL, now);
            }
            Timer::StatusReset => {
                self.status.expire(now);
                self.arm_status_reset();
                self.needs_redraw = true;
            }
            Timer::PlaylistAutoExport => {
                if self.flags.playlist_only_not_random {
                    self.auto_export(now);
                }
            }
        }
    }

    /// Moves on when the engine has gone quiet on its own.
    pub fn auto_advance(&mut self, engine: &mut dyn AudioEngine) -> bool {
        if self.session.is_paused() || engine.is_busy() {
            return false;
        }
        let pools = Pools {
            directory: &self.directory_pool,
            playlist: self.playlist.tracks(),
        };
        if pools.is_empty() {
            return false;
        }
        self.skip(engine)
    }

    pub fn refresh_info(&mut self, wall_clock: OffsetDateTime) {
        self.info = self.info_line(wall_clock);
        self.needs_redraw = true;
    }

    pub fn info_line(&self, wall_clock: OffsetDateTime) -> String {
        let hour = wall_clock.hour();
        let twelve_hour = match hour % 12 {
            0 => 12,
            other => other,
        };
        let meridiem = if hour < 12 { "AM" } else { "PM" };
        format!(
            "Song Count: {}, Skip Count: {}, Current Time: {twelve_hour:02}:{:02} {meridiem}, Date: {:02}/{:02}/{}, Running Time: {}",
            self.session.song_count(),
            self.session.skip_count(),
            wall_clock.minute(),
            u8::from(wall_clock.month()),
            wall_clock.day(),
            wall_clock.year(),
            format_running_time(self.session.elapsed()),
        )
    }

    pub fn now_playing_breadcrumb(&self) -> Option<String> {
        self.session
            .now_playing()
            .map(|track| breadcrumb(self.library_root.as_deref(), track))
    }

    /// Builds the web search for the current track. Unreadable tags are
    /// reported but still produce a file-name based query.
    pub fn lookup_current(&mut self) -> Option<SongLookup> {
        let Some(track) = self.session.now_playing().map(Path::to_path_buf) else {
            self.notify("No song is playing");
            return None;
        };
        let (lookup, error) = library::lookup_song(&track);
        if let Some(err) = error {
            self.notify_error(&err);
        }
        info!(query = %lookup.query(), "song lookup");
        Some(lookup)
    }
}

pub fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

fn display_name(track: &Path) -> String {
    track
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| track.display().to_string())
}

fn format_running_time(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Path of `track` below `root` as `dir > dir > title`.
pub fn breadcrumb(root: Option<&Path>, track: &Path) -> String {
    let relative = root
        .and_then(|root| track.strip_prefix(root).ok())
        .unwrap_or(track);

    let mut parts: Vec<String> = relative
        .parent()
        .into_iter()
        .flat_map(Path::components)
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    parts.push(
        track
            .file_stem()
            .map(OsStr::to_string_lossy)
            .unwrap_or_default()
            .into_owned(),
    );
    parts.join(" > ")
}
