use crate::core::PlayerCore;
use crate::model::{MAX_VOLUME, Mode};
use crate::playlist::match_span;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};

const APP_TITLE: &str = "Shufflebox  ";

pub struct PromptView<'a> {
    pub label: &'a str,
    pub buffer: &'a str,
}

#[derive(Clone, Copy)]
struct Palette {
    bg: Color,
    panel_bg: Color,
    border: Color,
    text: Color,
    muted: Color,
    accent: Color,
    error: Color,
    on: Color,
    off: Color,
    selected_bg: Color,
    popup_bg: Color,
}

const COLORS: Palette = Palette {
    bg: Color::Rgb(30, 30, 30),
    panel_bg: Color::Rgb(36, 36, 36),
    border: Color::Rgb(90, 90, 90),
    text: Color::Rgb(211, 211, 211),
    muted: Color::Rgb(150, 150, 150),
    accent: Color::Rgb(100, 203, 184),
    error: Color::Yellow,
    on: Color::Green,
    off: Color::Red,
    selected_bg: Color::Rgb(58, 58, 58),
    popup_bg: Color::Rgb(24, 24, 24),
};

const HELP_LINES: &[(&str, &str)] = &[
    ("p / u", "Pause and unpause playback."),
    ("n", "Skip to the next song from the playlist or directory."),
    ("b", "Go back to the previous song."),
    ("s", "Save the current song to the playlist."),
    ("c", "Clear the playlist. This cannot be undone."),
    ("x", "Shuffle the playlist order."),
    ("r", "Toggle repeat."),
    ("o", "Toggle playlist only: play songs from the playlist only."),
    ("O", "Toggle playlist only not random: play the playlist in order and save it every 30 seconds."),
    ("d", "Toggle dir select not random: play the directory in order."),
    ("w / l", "Write the playlist file, or load it back."),
    ("P", "Play the first playlist entry."),
    ("Enter", "Play the highlighted playlist entry."),
    ("+ / -", "Volume up or down by 5%."),
    ("i", "Look up the current song on the web."),
    ("/", "Search the playlist."),
    (":", "Commands: cd <dir>, add <path>, video <file>, volume <0-120>."),
    ("Esc", "Stop the video player. Ctrl+Enter reopens it windowed."),
    ("paste", "Pasting or dropping paths adds songs and folders to the playlist."),
    ("q", "Quit."),
];

pub fn draw(frame: &mut Frame, core: &PlayerCore, prompt: Option<&PromptView<'_>>, show_help: bool) {
    frame.render_widget(
        Block::default().style(Style::default().bg(COLORS.bg)),
        frame.area(),
    );

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(3),
        ])
        .split(frame.area());

    draw_status(frame, core, vertical[0]);
    draw_now_playing(frame, core, vertical[1]);
    draw_modes(frame, core, vertical[2]);
    draw_playlist(frame, core, vertical[3]);
    draw_footer(frame, core, prompt, vertical[4]);

    if show_help {
        draw_help(frame);
    }
}

fn draw_status(frame: &mut Frame, core: &PlayerCore, area: Rect) {
    let mut spans = vec![
        Span::styled(
            APP_TITLE,
            Style::default()
                .fg(COLORS.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(core.status().status(), Style::default().fg(COLORS.text)),
    ];
    if let Some(error) = core.status().error() {
        spans.push(Span::styled("  |  ", Style::default().fg(COLORS.muted)));
        spans.push(Span::styled(
            error,
            Style::default()
                .fg(COLORS.error)
                .add_modifier(Modifier::BOLD),
        ));
    }
    frame.render_widget(
        Paragraph::new(Line::from(spans)).block(panel_block("Status")),
        area,
    );
}

fn draw_now_playing(frame: &mut Frame, core: &PlayerCore, area: Rect) {
    let crumb = core
        .now_playing_breadcrumb()
        .unwrap_or_else(|| String::from("-"));
    let lines = vec![Line::from(vec![
        Span::styled(crumb, Style::default().fg(COLORS.text)),
        Span::styled("  |  ", Style::default().fg(COLORS.muted)),
        Span::styled(core.info(), Style::default().fg(COLORS.muted)),
    ])];
    frame.render_widget(
        Paragraph::new(lines)
            .block(panel_block("Now Playing"))
            .wrap(Wrap { trim: true }),
        area,
    );
}

fn draw_modes(frame: &mut Frame, core: &PlayerCore, area: Rect) {
    let flags = core.flags();
    let mut spans = vec![switch_span("Pause", core.session().is_paused())];
    for mode in Mode::ALL {
        spans.push(Span::styled("  ", Style::default()));
        spans.push(switch_span(mode.label(), flags.get(mode)));
    }
    if core.is_scanning() {
        spans.push(Span::styled("  scanning...", Style::default().fg(COLORS.muted)));
    }
    frame.render_widget(
        Paragraph::new(Line::from(spans)).block(panel_block("Modes")),
        area,
    );
}

fn switch_span(label: &str, on: bool) -> Span<'static> {
    let (state, color) = if on { ("On", COLORS.on) } else { ("Off", COLORS.off) };
    Span::styled(format!("{label}: {state}"), Style::default().fg(color))
}

fn draw_playlist(frame: &mut Frame, core: &PlayerCore, area: Rect) {
    let playing = core.session().now_playing();
    let items: Vec<ListItem> = core
        .playlist()
        .tracks()
        .iter()
        .map(|track| {
            let marker = if playing == Some(track.as_path()) {
                "> "
            } else {
                "  "
            };
            let display = track.to_string_lossy().into_owned();
            let mut spans = vec![Span::styled(marker, Style::default().fg(COLORS.accent))];
            spans.extend(highlighted(display, core.search_term()));
            ListItem::new(Line::from(spans))
        })
        .collect();

    let mut state = ListState::default();
    state.select(core.playlist().focus());

    let title = if core.playlist().is_dirty() {
        format!("Playlist ({}) *", core.playlist().len())
    } else {
        format!("Playlist ({})", core.playlist().len())
    };
    let list = List::new(items)
        .block(panel_block(&title))
        .highlight_style(
            Style::default()
                .bg(COLORS.selected_bg)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("-> ");
    frame.render_stateful_widget(list, area, &mut state);
}

fn highlighted(display: String, term: &str) -> Vec<Span<'static>> {
    let text = Style::default().fg(COLORS.text);
    let Some(span) = match_span(&display, term) else {
        return vec![Span::styled(display, text)];
    };
    vec![
        Span::styled(display[..span.start].to_string(), text),
        Span::styled(
            display[span.clone()].to_string(),
            Style::default()
                .fg(COLORS.error)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        ),
        Span::styled(display[span.end..].to_string(), text),
    ]
}

fn draw_footer(frame: &mut Frame, core: &PlayerCore, prompt: Option<&PromptView<'_>>, area: Rect) {
    let line = match prompt {
        Some(prompt) => Line::from(vec![
            Span::styled(
                prompt.label,
                Style::default()
                    .fg(COLORS.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(prompt.buffer, Style::default().fg(COLORS.text)),
            Span::styled("_", Style::default().fg(COLORS.muted)),
        ]),
        None => {
            let volume = core.session().volume();
            Line::from(vec![
                Span::styled(
                    format!(
                        "Vol {} {volume:>3}%",
                        progress_bar(f64::from(volume) / f64::from(MAX_VOLUME), 12)
                    ),
                    Style::default().fg(COLORS.text),
                ),
                Span::styled(
                    "  |  n skip, b prev, p/u pause, s save, / search, : command, ? help, q quit",
                    Style::default().fg(COLORS.muted),
                ),
            ])
        }
    };
    frame.render_widget(Paragraph::new(line).block(panel_block("Controls")), area);
}

fn draw_help(frame: &mut Frame) {
    let popup = centered_rect(frame.area(), 70, 80);
    frame.render_widget(Clear, popup);

    let lines: Vec<Line> = HELP_LINES
        .iter()
        .map(|(key, description)| {
            Line::from(vec![
                Span::styled(
                    format!("{key:>6}  "),
                    Style::default().fg(COLORS.off).add_modifier(Modifier::BOLD),
                ),
                Span::styled(*description, Style::default().fg(COLORS.text)),
            ])
        })
        .collect();

    frame.render_widget(
        Paragraph::new(lines)
            .block(panel_block("Help").style(Style::default().bg(COLORS.popup_bg)))
            .wrap(Wrap { trim: true }),
        popup,
    );
}

fn panel_block(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(COLORS.text).add_modifier(Modifier::BOLD),
        ))
        .border_style(Style::default().fg(COLORS.border))
        .style(Style::default().bg(COLORS.panel_bg))
}

fn centered_rect(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}

fn progress_bar(ratio: f64, width: usize) -> String {
    let clamped = ratio.clamp(0.0, 1.0);
    let filled = (clamped * width as f64).round() as usize;
    let mut bar = String::with_capacity(width + 2);
    bar.push('[');
    bar.push_str(&"#".repeat(filled));
    bar.push_str(&"-".repeat(width.saturating_sub(filled)));
    bar.push(']');
    bar
}
