//! Gesture view: connection info and the live hand skeleton.

use super::canvas_view::canvas_lines;
use crate::gesture::{ConnectionStatus, GesturePipeline};
use crate::render::canvas::rgb;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

const SKELETON_BACKGROUND: u32 = rgb(0x000000);

fn status_color(status: ConnectionStatus) -> Color {
    match status {
        ConnectionStatus::Connected => Color::Green,
        ConnectionStatus::Disconnected => Color::DarkGray,
        ConnectionStatus::Error => Color::Red,
    }
}

/// Renders the pipeline status panel and the skeleton view side by side.
///
/// # Arguments
///
/// * `frame` - The frame to render to
/// * `area` - The area to render in
/// * `pipeline` - Gesture pipeline to display
/// * `recording` - Whether the backend is recording
/// * `status_message` - Transient message shown under the stats
pub fn render_gesture(
    frame: &mut Frame,
    area: Rect,
    pipeline: &GesturePipeline,
    recording: bool,
    status_message: Option<&str>,
) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(32), Constraint::Min(20)])
        .split(area);

    render_info(frame, chunks[0], pipeline, recording, status_message);

    let block = Block::default()
        .title(" Hands ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(chunks[1]);
    frame.render_widget(block, chunks[1]);
    let lines = canvas_lines(
        pipeline.renderer().canvas(),
        inner.width,
        inner.height,
        SKELETON_BACKGROUND,
    );
    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_info(
    frame: &mut Frame,
    area: Rect,
    pipeline: &GesturePipeline,
    recording: bool,
    status_message: Option<&str>,
) {
    let block = Block::default()
        .title(" Gesture ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let label = Style::default().fg(Color::DarkGray);
    let value = Style::default().fg(Color::White);
    let status = pipeline.status();
    let stats = pipeline.stats();

    let mut lines = vec![
        Line::from(vec![
            Span::styled("Link:       ", label),
            Span::styled(
                status.label(),
                Style::default()
                    .fg(status_color(status))
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            Span::styled("Instrument: ", label),
            Span::styled(
                pipeline.instrument().to_string(),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            Span::styled("Recording:  ", label),
            if recording {
                Span::styled(
                    "● REC",
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )
            } else {
                Span::styled("off", value)
            },
        ]),
        Line::from(""),
    ];

    match pipeline.last_event() {
        Some(event) => {
            lines.push(Line::from(vec![
                Span::styled("Last:       ", label),
                Span::styled(
                    event.gesture.clone(),
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ),
            ]));
            lines.push(Line::from(vec![
                Span::styled("            ", label),
                Span::styled(
                    format!(
                        "{} ({:.1}s ago)",
                        event.instrument,
                        event.timestamp.elapsed().as_secs_f32()
                    ),
                    value,
                ),
            ]));
        }
        None => lines.push(Line::from(Span::styled("No gesture yet", label))),
    }

    lines.push(Line::from(""));
    for (name, count) in [
        ("frames in", stats.frames_received),
        ("frames out", stats.frames_sent),
        ("triggers", stats.triggers),
        ("failed", stats.failed_triggers),
        ("draws", stats.draws),
        ("skipped", stats.cancelled_draws),
        ("dropped", stats.dropped_frames),
    ] {
        lines.push(Line::from(vec![
            Span::styled(format!("{name:12}"), label),
            Span::styled(count.to_string(), value),
        ]));
    }

    if let Some(message) = status_message {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            message.to_string(),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::ITALIC),
        )));
    }

    frame.render_widget(Paragraph::new(lines), inner);
}
