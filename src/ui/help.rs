//! Help overlay rendering.
//!
//! Displays keyboard shortcuts and mouse controls in a modal overlay.

use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

use super::centered_rect;

/// Key binding entry for the help display.
struct KeyBinding {
    key: &'static str,
    description: &'static str,
}

const GENERAL_BINDINGS: &[KeyBinding] = &[
    KeyBinding {
        key: "?",
        description: "Toggle this help",
    },
    KeyBinding {
        key: "q / Esc",
        description: "Quit",
    },
    KeyBinding {
        key: "Ctrl+C",
        description: "Force quit",
    },
    KeyBinding {
        key: "g",
        description: "Switch between gesture and editor views",
    },
    KeyBinding {
        key: "Tab",
        description: "Cycle focus between recordings and layers",
    },
];

const EDITOR_BINDINGS: &[KeyBinding] = &[
    KeyBinding {
        key: "Space",
        description: "Play / Stop",
    },
    KeyBinding {
        key: "Home / 0",
        description: "Stop and rewind, clearing the selection",
    },
    KeyBinding {
        key: "j / k",
        description: "Move through the focused list",
    },
    KeyBinding {
        key: "Enter",
        description: "Load recording as the main buffer",
    },
    KeyBinding {
        key: "a",
        description: "Add recording as a layer",
    },
    KeyBinding {
        key: "r",
        description: "Refresh the recording list",
    },
    KeyBinding {
        key: "t",
        description: "Trim to the selection",
    },
    KeyBinding {
        key: "e",
        description: "Export the main buffer as WAV",
    },
];

const LAYER_BINDINGS: &[KeyBinding] = &[
    KeyBinding {
        key: "m",
        description: "Mute / unmute layer",
    },
    KeyBinding {
        key: "x / Delete",
        description: "Remove layer",
    },
    KeyBinding {
        key: "- / +",
        description: "Layer volume (master when recordings focused)",
    },
];

const GESTURE_BINDINGS: &[KeyBinding] = &[
    KeyBinding {
        key: "i",
        description: "Next instrument (launches it on the backend)",
    },
    KeyBinding {
        key: "c",
        description: "Reconnect to the landmark service",
    },
    KeyBinding {
        key: "s",
        description: "Start / stop a backend recording",
    },
];

const MOUSE_BINDINGS: &[KeyBinding] = &[
    KeyBinding {
        key: "Click",
        description: "Move the playhead",
    },
    KeyBinding {
        key: "Ctrl+Click",
        description: "Start a selection",
    },
    KeyBinding {
        key: "Shift+Click",
        description: "Extend the selection",
    },
];

/// Renders the help overlay.
pub fn render_help(frame: &mut Frame) {
    let area = centered_rect(70, 80, frame.area());

    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(" Help - Keyboard Shortcuts ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(inner);

    let section_style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
    let key_style = Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD);
    let desc_style = Style::default().fg(Color::White);

    let mut lines: Vec<Line<'static>> = Vec::new();
    for (title, bindings) in [
        ("General", GENERAL_BINDINGS),
        ("Editor", EDITOR_BINDINGS),
        ("Layers", LAYER_BINDINGS),
        ("Gesture", GESTURE_BINDINGS),
        ("Waveform Mouse", MOUSE_BINDINGS),
    ] {
        lines.push(Line::from(Span::styled(title, section_style)));
        for binding in bindings {
            lines.push(Line::from(vec![
                Span::styled(format!("{:15}", binding.key), key_style),
                Span::styled(binding.description, desc_style),
            ]));
        }
        lines.push(Line::from(""));
    }
    frame.render_widget(Paragraph::new(lines), chunks[0]);

    let footer = Paragraph::new(Line::from(Span::styled(
        "Close: ?/Esc",
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC),
    )));
    frame.render_widget(footer, chunks[1]);
}
