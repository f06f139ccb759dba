//! Editor panels: transport, recordings, layers and the waveform.

use super::canvas_view::canvas_lines;
use crate::app::App;
use crate::audio::playback::AudioOutput;
use crate::render::canvas::rgb;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use ratatui::Frame;

/// Panel background the waveform is composited over.
const WAVEFORM_BACKGROUND: u32 = rgb(0x101418);

/// Returns the display color for a volume value.
#[inline]
fn volume_color(volume: f32) -> Color {
    if volume >= 0.95 {
        Color::Yellow
    } else {
        Color::Green
    }
}

fn panel(title: &str, focused: bool) -> Block<'_> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused { Color::Cyan } else { Color::Gray }))
}

/// Renders the transport bar at the top of the editor.
///
/// # Arguments
///
/// * `frame` - The frame to render to
/// * `area` - The area to render in
/// * `app` - Application state
pub fn render_transport<O: AudioOutput>(frame: &mut Frame, area: Rect, app: &App<O>) {
    let block = panel(" Transport ", false);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(12), // Play state
            Constraint::Length(22), // Position
            Constraint::Length(24), // Selection
            Constraint::Length(12), // Master
            Constraint::Min(20),    // Status
        ])
        .split(inner);

    let play_status = if app.is_playing() {
        Span::styled(
            " [>] PLAY ",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )
    } else {
        Span::styled(
            " [.] STOP ",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )
    };
    frame.render_widget(Paragraph::new(Line::from(play_status)), chunks[0]);

    let position = format!("{:.2} / {:.2}s", app.store.playhead(), app.store.duration());
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("Pos: ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                position,
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
        ])),
        chunks[1],
    );

    let selection = match app.store.selection() {
        Some(s) => format!("{:.2}-{:.2}s", s.start, s.end),
        None => "none".to_string(),
    };
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("Sel: ", Style::default().fg(Color::DarkGray)),
            Span::styled(selection, Style::default().fg(Color::Magenta)),
        ])),
        chunks[2],
    );

    let master = app.store.master_volume();
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("Vol ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                format!("{:3.0}%", master * 100.0),
                Style::default().fg(volume_color(master)),
            ),
        ])),
        chunks[3],
    );

    let status_line = if let Some((msg, _)) = &app.status_message {
        Line::from(Span::styled(
            msg.as_str(),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::ITALIC),
        ))
    } else if app.pending_loads > 0 {
        Line::from(Span::styled(
            format!("loading {}...", app.pending_loads),
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Line::from(Span::styled(
            app.store.main_name().unwrap_or("no audio loaded").to_string(),
            Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
        ))
    };
    frame.render_widget(Paragraph::new(status_line), chunks[4]);
}

/// Renders the list of recordings available from the source.
pub fn render_recordings<O: AudioOutput>(frame: &mut Frame, area: Rect, app: &App<O>, focused: bool) {
    let block = panel(" Recordings ", focused);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if app.recordings.is_empty() {
        frame.render_widget(
            Paragraph::new(Span::styled(
                "[r] refresh",
                Style::default().fg(Color::DarkGray),
            )),
            inner,
        );
        return;
    }

    let max_name_len = inner.width.saturating_sub(10) as usize;
    let items: Vec<ListItem> = app
        .recordings
        .iter()
        .map(|recording| {
            let loaded = app.store.main_name() == Some(recording.filename.as_str());
            let name = if recording.filename.chars().count() > max_name_len {
                let head: String = recording
                    .filename
                    .chars()
                    .take(max_name_len.saturating_sub(3))
                    .collect();
                format!("{head}...")
            } else {
                recording.filename.clone()
            };
            let name_style = if loaded {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(Line::from(vec![
                Span::styled(name, name_style),
                Span::raw(" "),
                Span::styled(
                    format!("{}k", recording.size / 1024),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();

    let list = List::new(items)
        .highlight_style(
            Style::default()
                .bg(Color::Rgb(40, 40, 40))
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(Some(app.selected_recording));
    frame.render_stateful_widget(list, inner, &mut state);
}

/// Renders the layer list with mute and volume indicators.
pub fn render_layers<O: AudioOutput>(frame: &mut Frame, area: Rect, app: &App<O>, focused: bool) {
    let block = panel(" Layers ", focused);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(inner);

    let items: Vec<ListItem> = app
        .store
        .layers()
        .iter()
        .map(|layer| {
            let mute_indicator = if layer.muted {
                Span::styled("M", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD))
            } else {
                Span::styled("-", Style::default().fg(Color::DarkGray))
            };
            ListItem::new(Line::from(vec![
                mute_indicator,
                Span::raw(" "),
                Span::styled(
                    format!("V{:3.0}", layer.volume * 100.0),
                    Style::default().fg(volume_color(layer.volume)),
                ),
                Span::raw(" "),
                Span::styled(
                    format!("{:.1}s", layer.buffer.duration()),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::raw(" "),
                Span::raw(layer.name.clone()),
            ]))
        })
        .collect();

    let list = List::new(items)
        .highlight_style(
            Style::default()
                .bg(Color::Rgb(40, 40, 40))
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");
    let mut state = ListState::default();
    if !app.store.layers().is_empty() {
        state.select(Some(app.selected_layer));
    }
    frame.render_stateful_widget(list, chunks[0], &mut state);

    let key_style = Style::default().fg(Color::Yellow);
    let desc_style = Style::default().fg(Color::DarkGray);
    let controls = Line::from(vec![
        Span::styled("[", desc_style),
        Span::styled("m", key_style),
        Span::styled("]Mute ", desc_style),
        Span::styled("[", desc_style),
        Span::styled("-/+", key_style),
        Span::styled("]Vol ", desc_style),
        Span::styled("[", desc_style),
        Span::styled("x", key_style),
        Span::styled("]Del", desc_style),
    ]);
    frame.render_widget(Paragraph::new(controls), chunks[1]);
}

/// Renders the waveform surface, which must already be up to date.
pub fn render_waveform<O: AudioOutput>(frame: &mut Frame, area: Rect, app: &App<O>) {
    let title = match app.store.main_name() {
        Some(name) => format!(" Waveform: {name} "),
        None => " Waveform ".to_string(),
    };
    let block = panel(&title, false);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if app.store.main().is_none() {
        frame.render_widget(
            Paragraph::new(Span::styled(
                "Load a recording with Enter",
                Style::default().fg(Color::DarkGray),
            )),
            inner,
        );
        return;
    }

    let lines = canvas_lines(
        app.waveform.canvas(),
        inner.width,
        inner.height,
        WAVEFORM_BACKGROUND,
    );
    frame.render_widget(Paragraph::new(lines), inner);
}
