use crate::audio::{AudioEngine, NullAudioEngine, RodioAudioEngine};
use crate::config::StorePaths;
use crate::core::PlayerCore;
use crate::model::Mode;
use crate::ui::{self, PromptView};
use crate::video::VideoLauncher;
use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::{Stdout, stdout};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{info, warn};

const FRAME_INTERVAL: Duration = Duration::from_millis(250);
const INPUT_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct AppOptions {
    pub paths: StorePaths,
    pub library: PathBuf,
    pub null_audio: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputMode {
    Normal,
    Search,
    Command,
}

struct AppState {
    input_mode: InputMode,
    buffer: String,
    show_help: bool,
    video: VideoLauncher,
    quit: bool,
}

impl AppState {
    fn new() -> Self {
        Self {
            input_mode: InputMode::Normal,
            buffer: String::new(),
            show_help: false,
            video: VideoLauncher::default(),
            quit: false,
        }
    }
}

pub fn run(options: AppOptions) -> Result<()> {
    let mut audio: Box<dyn AudioEngine> = if options.null_audio {
        Box::new(NullAudioEngine::new())
    } else {
        Box::new(
            RodioAudioEngine::new()
                .context("no audio output is available (use --null-audio to run silently)")?,
        )
    };

    let mut core = PlayerCore::open(options.paths);
    core.startup(&mut *audio, options.library, Instant::now());

    let mut terminal = match setup_terminal() {
        Ok(terminal) => terminal,
        Err(err) => {
            let _ = disable_raw_mode();
            core.shutdown(&mut *audio);
            return Err(err);
        }
    };

    let mut state = AppState::new();
    let result = event_loop(&mut terminal, &mut state, &mut core, &mut *audio);

    let restored = restore_terminal(&mut terminal);
    finish(result.and(restored), &mut state, &mut core, &mut *audio)
}

/// Stops the video player and shuts the core down whatever the loop returned.
fn finish(
    result: Result<()>,
    state: &mut AppState,
    core: &mut PlayerCore,
    audio: &mut dyn AudioEngine,
) -> Result<()> {
    if let Err(err) = &result {
        warn!("terminal loop ended with an error: {err:#}");
    }
    state.video.terminate();
    core.shutdown(audio);
    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    state: &mut AppState,
    core: &mut PlayerCore,
    audio: &mut dyn AudioEngine,
) -> Result<()> {
    let mut last_frame = Instant::now();

    while !state.quit {
        core.pump_scans(audio);
        core.tick(audio, Instant::now());

        if core.needs_redraw || last_frame.elapsed() > FRAME_INTERVAL {
            let prompt = prompt_view(state);
            let view = &*core;
            terminal.draw(|frame| ui::draw(frame, view, prompt.as_ref(), state.show_help))?;
            core.needs_redraw = false;
            last_frame = Instant::now();
        }

        if !event::poll(INPUT_POLL)? {
            continue;
        }

        match event::read()? {
            Event::Paste(text) => {
                core.drop_paths(&split_dropped_paths(&text));
            }
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                handle_key(state, core, audio, key);
            }
            Event::Resize(_, _) => core.needs_redraw = true,
            _ => {}
        }
    }
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen, EnableBracketedPaste)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(out))?;
    terminal.clear()?;
    Ok(terminal)
}

/// Leaves raw mode and the alternate screen. Every step runs even if an
/// earlier one fails; the first error is returned.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    let raw = disable_raw_mode();
    let screen = execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableBracketedPaste
    );
    let cursor = terminal.show_cursor();
    raw?;
    screen?;
    cursor?;
    Ok(())
}

fn prompt_view(state: &AppState) -> Option<PromptView<'_>> {
    let label = match state.input_mode {
        InputMode::Normal => return None,
        InputMode::Search => "Search: ",
        InputMode::Command => ":",
    };
    Some(PromptView {
        label,
        buffer: &state.buffer,
    })
}

fn handle_key(state: &mut AppState, core: &mut PlayerCore, audio: &mut dyn AudioEngine, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        state.quit = true;
        return;
    }

    match state.input_mode {
        InputMode::Search => handle_search_key(state, core, key),
        InputMode::Command => handle_command_key(state, core, audio, key),
        InputMode::Normal => handle_normal_key(state, core, audio, key),
    }
}

fn handle_search_key(state: &mut AppState, core: &mut PlayerCore, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            state.input_mode = InputMode::Normal;
            state.buffer.clear();
            core.search("");
        }
        KeyCode::Enter => state.input_mode = InputMode::Normal,
        KeyCode::Backspace => {
            state.buffer.pop();
            core.search(&state.buffer);
        }
        KeyCode::Char(ch) => {
            state.buffer.push(ch);
            core.search(&state.buffer);
        }
        _ => {}
    }
}

fn handle_command_key(
    state: &mut AppState,
    core: &mut PlayerCore,
    audio: &mut dyn AudioEngine,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Esc => {
            state.input_mode = InputMode::Normal;
            state.buffer.clear();
            core.needs_redraw = true;
        }
        KeyCode::Enter => {
            let raw = std::mem::take(&mut state.buffer);
            state.input_mode = InputMode::Normal;
            run_command(state, core, audio, &raw);
        }
        KeyCode::Backspace => {
            state.buffer.pop();
            core.needs_redraw = true;
        }
        KeyCode::Char(ch) => {
            state.buffer.push(ch);
            core.needs_redraw = true;
        }
        _ => {}
    }
}

fn handle_normal_key(
    state: &mut AppState,
    core: &mut PlayerCore,
    audio: &mut dyn AudioEngine,
    key: KeyEvent,
) {
    if state.show_help {
        state.show_help = false;
        core.needs_redraw = true;
        return;
    }

    let now = Instant::now();
    match key.code {
        KeyCode::Char('q') => state.quit = true,
        KeyCode::Char('p') => {
            core.pause(audio);
        }
        KeyCode::Char('u') => {
            core.resume(audio);
        }
        KeyCode::Char('n') => {
            core.skip(audio);
        }
        KeyCode::Char('b') => {
            core.previous(audio);
        }
        KeyCode::Char('s') => {
            core.save_current_song();
        }
        KeyCode::Char('c') => core.clear_playlist(),
        KeyCode::Char('x') => core.shuffle_playlist(),
        KeyCode::Char('r') => {
            core.toggle(Mode::Repeat, now);
        }
        KeyCode::Char('o') => {
            core.toggle(Mode::PlaylistOnly, now);
        }
        KeyCode::Char('O') => {
            core.toggle(Mode::PlaylistOnlyNotRandom, now);
        }
        KeyCode::Char('d') => {
            core.toggle(Mode::DirSelectNotRandom, now);
        }
        KeyCode::Char('w') => {
            if core.playlist().is_dirty() {
                core.export_playlist_file();
            } else {
                core.notify("Playlist has no unsaved changes");
            }
        }
        KeyCode::Char('l') => {
            core.import_playlist_file();
        }
        KeyCode::Char('P') => {
            core.play_first(audio);
        }
        KeyCode::Char('+') | KeyCode::Char('=') => {
            core.volume_up(audio);
        }
        KeyCode::Char('-') => {
            core.volume_down(audio);
        }
        KeyCode::Char('i') => {
            if let Some(lookup) = core.lookup_current() {
                match open_in_browser(&lookup.url) {
                    Ok(()) => core.notify(format!("Looking up: {}", lookup.query())),
                    Err(err) => {
                        warn!("failed to open browser: {err}");
                        core.notify(lookup.url);
                    }
                }
            }
        }
        KeyCode::Char('/') => {
            state.input_mode = InputMode::Search;
            state.buffer = core.search_term().to_string();
            core.needs_redraw = true;
        }
        KeyCode::Char(':') => {
            state.input_mode = InputMode::Command;
            state.buffer.clear();
            core.needs_redraw = true;
        }
        KeyCode::Char('?') | KeyCode::Char('h') => {
            state.show_help = true;
            core.needs_redraw = true;
        }
        KeyCode::Down => core.focus_next(),
        KeyCode::Up => core.focus_prev(),
        KeyCode::Enter if key.modifiers.contains(KeyModifiers::CONTROL) => {
            if let Err(err) = state.video.restart_windowed() {
                core.notify_error(&err);
            }
        }
        KeyCode::Enter => {
            core.play_focused(audio);
        }
        KeyCode::Esc => {
            if state.video.terminate() {
                core.notify("Video stopped");
            } else if !core.search_term().is_empty() {
                core.search("");
            }
        }
        _ => {}
    }
}

fn run_command(state: &mut AppState, core: &mut PlayerCore, audio: &mut dyn AudioEngine, raw: &str) {
    let input = raw.trim();
    if input.is_empty() {
        core.needs_redraw = true;
        return;
    }

    let mut command_split = input.splitn(2, char::is_whitespace);
    let command = command_split.next().unwrap_or_default();
    let rest = command_split.next().unwrap_or("").trim();

    match command {
        "help" => {
            state.show_help = true;
            core.needs_redraw = true;
        }
        "cd" => {
            if rest.is_empty() {
                core.notify("Usage: cd <directory>");
            } else {
                core.change_dir(expand_home(rest, &core.paths().home));
            }
        }
        "add" => {
            if rest.is_empty() {
                core.notify("Usage: add <path>");
            } else {
                let dropped = split_dropped_paths(rest);
                let dropped: Vec<PathBuf> = dropped
                    .iter()
                    .map(|path| expand_home(&path.to_string_lossy(), &core.paths().home))
                    .collect();
                core.drop_paths(&dropped);
            }
        }
        "video" => {
            if rest.is_empty() {
                core.notify("Usage: video <file>");
                return;
            }
            let path = expand_home(rest, &core.paths().home);
            match state.video.start(&path) {
                Ok(()) => core.notify(format!("Playing video: {}", path.display())),
                Err(err) => core.notify_error(&err),
            }
        }
        "volume" => match rest.parse::<u8>() {
            Ok(percent) => {
                core.set_volume(audio, percent);
            }
            Err(_) => core.notify("Usage: volume <0-120>"),
        },
        _ => core.notify("Unknown command. Press ? for help"),
    }
}

fn expand_home(raw: &str, home: &Path) -> PathBuf {
    match raw.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None if raw == "~" => home.to_path_buf(),
        None => PathBuf::from(raw),
    }
}

/// Turns pasted text into paths. Terminals deliver drops either one path per
/// line or as shell-quoted words on a single line.
pub fn split_dropped_paths(text: &str) -> Vec<PathBuf> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if lines.len() > 1 {
        return lines
            .into_iter()
            .map(|line| dropped_path(unquote(line)))
            .collect();
    }

    let Some(line) = lines.first() else {
        return Vec::new();
    };
    let whole = dropped_path(line);
    if whole.exists() {
        return vec![whole];
    }
    shell_words(line)
        .iter()
        .map(|word| dropped_path(word))
        .collect()
}

fn dropped_path(raw: &str) -> PathBuf {
    PathBuf::from(raw.strip_prefix("file://").unwrap_or(raw))
}

fn unquote(raw: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = raw
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    raw
}

fn shell_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(ch) = chars.next() {
        match (quote, ch) {
            (Some(open), c) if c == open => quote = None,
            (Some('"'), '\\') | (None, '\\') => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
                in_word = true;
            }
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => {
                quote = Some(ch);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

fn open_in_browser(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    let mut command = Command::new("open");
    #[cfg(windows)]
    let mut command = {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", ""]);
        command
    };
    #[cfg(all(unix, not(target_os = "macos")))]
    let mut command = Command::new("xdg-open");

    command
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    info!(url, "opened song lookup");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Settings;
    use crate::scan::ScanPool;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use tempfile::{TempDir, tempdir};

    fn core_in(dir: &TempDir) -> PlayerCore {
        PlayerCore::new(
            StorePaths::rooted_at(dir.path()),
            Settings::default(),
            SmallRng::seed_from_u64(3),
            ScanPool::new(1),
        )
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn pasted_lines_become_paths() {
        let paths = split_dropped_paths("/m/a.mp3\n\n  '/m/b c.flac'  \n/m/d e.ogg\n");
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/m/a.mp3"),
                PathBuf::from("/m/b c.flac"),
                PathBuf::from("/m/d e.ogg"),
            ]
        );
    }

    #[test]
    fn shell_quoted_drops_are_unquoted() {
        let paths = split_dropped_paths(r#"'/m/Blue Monday.mp3' /m/It\'s\ Fine.ogg "/m/x y.wav""#);
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/m/Blue Monday.mp3"),
                PathBuf::from("/m/It's Fine.ogg"),
                PathBuf::from("/m/x y.wav"),
            ]
        );
    }

    #[test]
    fn existing_path_with_spaces_is_kept_whole() {
        let dir = tempdir().expect("tempdir");
        let track = dir.path().join("two words.mp3");
        std::fs::write(&track, b"x").expect("write");
        let pasted = format!("file://{}", track.display());
        assert_eq!(split_dropped_paths(&pasted), vec![track]);
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = Path::new("/home/u");
        assert_eq!(expand_home("~/Music", home), PathBuf::from("/home/u/Music"));
        assert_eq!(expand_home("~", home), PathBuf::from("/home/u"));
        assert_eq!(expand_home("/srv/a", home), PathBuf::from("/srv/a"));
    }

    #[test]
    fn terminal_failure_still_saves_the_session() {
        let dir = tempdir().expect("tempdir");
        let mut core = core_in(&dir);
        let mut audio = NullAudioEngine::new();
        let mut state = AppState::new();
        core.set_volume(&mut audio, 65);

        let result = finish(
            Err(anyhow::anyhow!("terminal went away")),
            &mut state,
            &mut core,
            &mut audio,
        );

        assert!(result.is_err());
        assert_eq!(core.scheduler().next_deadline(), None);
        let saved = crate::config::load_settings(core.paths()).expect("saved");
        assert_eq!(saved.volume, 65);
    }

    #[test]
    fn unknown_command_is_reported() {
        let dir = tempdir().expect("tempdir");
        let mut core = core_in(&dir);
        let mut audio = NullAudioEngine::new();
        let mut state = AppState::new();
        run_command(&mut state, &mut core, &mut audio, "wat");
        assert!(core.status().status().contains("Unknown command"));
    }

    #[test]
    fn volume_command_clamps() {
        let dir = tempdir().expect("tempdir");
        let mut core = core_in(&dir);
        let mut audio = NullAudioEngine::new();
        let mut state = AppState::new();
        run_command(&mut state, &mut core, &mut audio, "volume 200");
        assert_eq!(core.session().volume(), 120);
        run_command(&mut state, &mut core, &mut audio, "volume loud");
        assert_eq!(core.status().status(), "Usage: volume <0-120>");
    }

    #[test]
    fn search_mode_updates_focus_live() {
        let dir = tempdir().expect("tempdir");
        let mut core = core_in(&dir);
        let mut audio = NullAudioEngine::new();
        let mut state = AppState::new();
        core.drop_paths(&[PathBuf::from("/m/alpha.mp3"), PathBuf::from("/m/beta.mp3")]);

        handle_key(&mut state, &mut core, &mut audio, press(KeyCode::Char('/')));
        for ch in "bet".chars() {
            handle_key(&mut state, &mut core, &mut audio, press(KeyCode::Char(ch)));
        }
        assert_eq!(core.search_term(), "bet");
        assert_eq!(core.playlist().focus(), Some(1));

        handle_key(&mut state, &mut core, &mut audio, press(KeyCode::Esc));
        assert_eq!(state.input_mode, InputMode::Normal);
        assert_eq!(core.search_term(), "");
        assert_eq!(core.playlist().focus(), None);
    }

    #[test]
    fn mode_keys_toggle_flags() {
        let dir = tempdir().expect("tempdir");
        let mut core = core_in(&dir);
        let mut audio = NullAudioEngine::new();
        let mut state = AppState::new();

        handle_key(&mut state, &mut core, &mut audio, press(KeyCode::Char('d')));
        handle_key(&mut state, &mut core, &mut audio, press(KeyCode::Char('o')));
        assert!(core.flags().dir_select_not_random);
        assert!(core.flags().playlist_only);
        assert_eq!(core.status().status(), "Playlist Only Enabled");
    }

    #[test]
    fn quit_keys_stop_the_loop() {
        let dir = tempdir().expect("tempdir");
        let mut core = core_in(&dir);
        let mut audio = NullAudioEngine::new();
        let mut state = AppState::new();
        handle_key(
            &mut state,
            &mut core,
            &mut audio,
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
        );
        assert!(state.quit);
    }
}
