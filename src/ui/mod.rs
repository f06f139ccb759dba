//! Terminal user interface components.
//!
//! This module provides the visual components: the editor panels, the
//! gesture view and the help overlay.

mod canvas_view;
mod editor;
mod gesture;
mod help;

use crate::app::{App, FocusedPanel, LayoutRegions, ViewMode};
use crate::audio::playback::AudioOutput;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

pub use canvas_view::canvas_lines;
pub use editor::{render_layers, render_recordings, render_transport, render_waveform};
pub use gesture::render_gesture;
pub use help::render_help;

/// Calculates the editor layout regions for the given terminal size.
///
/// Returns the regions used for mouse hit testing along with the
/// transport and hint rows.
fn calculate_layout(size: Rect) -> (LayoutRegions, Rect, Rect) {
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Transport
            Constraint::Min(8),    // Content area
            Constraint::Length(1), // Hints
        ])
        .split(size);

    let content_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(34), Constraint::Min(20)])
        .split(main_chunks[1]);

    let list_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(content_chunks[0]);

    let waveform_panel = content_chunks[1];
    let layout = LayoutRegions {
        recordings: list_chunks[0],
        layers: list_chunks[1],
        waveform: Rect {
            x: waveform_panel.x + 1,
            y: waveform_panel.y + 1,
            width: waveform_panel.width.saturating_sub(2),
            height: waveform_panel.height.saturating_sub(2),
        },
    };

    (layout, main_chunks[0], main_chunks[2])
}

/// Renders the complete UI and updates layout regions.
pub fn render<O: AudioOutput>(frame: &mut Frame, app: &mut App<O>) {
    let size = frame.area();

    if app.view_mode == ViewMode::Gesture && app.pipeline.is_some() {
        if let Some(pipeline) = &app.pipeline {
            let message = app.status_message.as_ref().map(|(m, _)| m.as_str());
            render_gesture(frame, size, pipeline, app.recording, message);
        }
    } else {
        render_editor(frame, size, app);
    }

    if app.show_help {
        render_help(frame);
    }
}

fn render_editor<O: AudioOutput>(frame: &mut Frame, size: Rect, app: &mut App<O>) {
    let (layout, transport, hints) = calculate_layout(size);
    let waveform = layout.waveform;
    app.update_layout(layout);

    // One logical pixel per column, two per row.
    app.refresh_waveform(waveform.width as usize, waveform.height as usize * 2);

    render_transport(frame, transport, app);
    render_recordings(
        frame,
        app.layout.recordings,
        app,
        app.focused_panel == FocusedPanel::Recordings,
    );
    render_layers(
        frame,
        app.layout.layers,
        app,
        app.focused_panel == FocusedPanel::Layers,
    );
    let waveform_panel = Rect {
        x: waveform.x.saturating_sub(1),
        y: waveform.y.saturating_sub(1),
        width: waveform.width + 2,
        height: waveform.height + 2,
    };
    render_waveform(frame, waveform_panel, app);

    let key_style = Style::default().fg(Color::Yellow);
    let desc_style = Style::default().fg(Color::DarkGray);
    let mut spans = Vec::new();
    for (key, desc) in [
        ("Space", "Play"),
        ("Enter", "Load"),
        ("a", "Layer"),
        ("t", "Trim"),
        ("e", "Export"),
        ("g", "View"),
        ("?", "Help"),
    ] {
        spans.push(Span::styled("[", desc_style));
        spans.push(Span::styled(key, key_style));
        spans.push(Span::styled(format!("]{desc} "), desc_style));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), hints);
}

/// Helper function to center a rectangle within another rectangle.
pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
