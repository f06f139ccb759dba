//! vibevirtuoso - Play instruments with hand gestures from the terminal.
//!
//! The `gesture` command connects to a landmark service and turns recognised
//! hand gestures into sound triggers, drawing the tracked hands live. The
//! `edit` command opens a layered audio editor for the resulting recordings,
//! and `export` trims and writes a recording without a terminal UI.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- gesture                 # Gesture view plus editor
//! cargo run -- edit take.wav           # Open a recording in the editor
//! cargo run -- export take.wav --start 1.0 --end 3.5
//! ```
//!
//! Press `?` for help with keyboard shortcuts.

use vibevirtuoso::app::{App, FocusedPanel, ViewMode, VOLUME_STEP};
use vibevirtuoso::audio::edit::{self, DownloadDir};
use vibevirtuoso::audio::playback::{AudioOutput, RodioOutput};
use vibevirtuoso::audio::source::{DirRecordingSource, HttpRecordingSource, RecordingSource};
use vibevirtuoso::audio::store::{BufferStore, ClickModifier, Selection};
use vibevirtuoso::config::Config;
use vibevirtuoso::gesture::trigger::HttpSoundTrigger;
use vibevirtuoso::gesture::{BackendClient, BackendControl, GesturePipeline, SystemClock};
use vibevirtuoso::ui;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers,
    MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Command-line options for the application.
#[derive(Parser, Debug)]
#[command(name = "vibevirtuoso", version, about)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Backend base URL for sound triggers and recordings
    #[arg(long, global = true)]
    backend_url: Option<String>,

    /// Read recordings from a local directory instead of the backend
    #[arg(long, global = true)]
    recordings_dir: Option<PathBuf>,

    /// Directory exported files are written to
    #[arg(long, global = true)]
    download_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect to the landmark service and play with gestures
    Gesture {
        /// Landmark service address (host:port)
        #[arg(long)]
        addr: Option<String>,

        /// Directory of JPEG frames to stream as the video feed
        #[arg(long)]
        frames: Option<PathBuf>,

        /// Starting instrument
        #[arg(long)]
        instrument: Option<String>,

        /// Debounce window for repeated gestures, in milliseconds
        #[arg(long)]
        debounce_ms: Option<u64>,
    },
    /// Open the layered audio editor
    Edit {
        /// Recording to load as the main buffer
        recording: Option<String>,
    },
    /// Trim a recording and export it as WAV without the UI
    Export {
        recording: String,

        /// Selection start in seconds
        #[arg(long, requires = "end")]
        start: Option<f64>,

        /// Selection end in seconds
        #[arg(long, requires = "start")]
        end: Option<f64>,
    },
}

impl Cli {
    /// Loads the configuration file, if any, and applies flag overrides.
    fn config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(url) = &self.backend_url {
            config.backend_url = url.clone();
        }
        if let Some(dir) = &self.recordings_dir {
            config.recordings_dir = Some(dir.clone());
        }
        if let Some(dir) = &self.download_dir {
            config.download_dir = dir.clone();
        }
        if let Command::Gesture {
            addr,
            frames,
            instrument,
            debounce_ms,
        } = &self.command
        {
            if let Some(addr) = addr {
                config.transport_addr = addr.clone();
            }
            if let Some(dir) = frames {
                config.frames_dir = Some(dir.clone());
            }
            if let Some(instrument) = instrument {
                config.instrument = instrument.clone();
            }
            if let Some(ms) = debounce_ms {
                config.debounce_ms = *ms;
            }
        }
        Ok(config.normalized())
    }
}

fn init_logging(log_file: Option<&PathBuf>) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn recording_source(config: &Config) -> Result<Arc<dyn RecordingSource>> {
    Ok(match &config.recordings_dir {
        Some(dir) => Arc::new(DirRecordingSource::new(dir)),
        None => Arc::new(
            HttpRecordingSource::new(config.backend_url.clone())
                .context("Failed to create recording client")?,
        ),
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_ref())?;
    let config = cli.config().context("Failed to load configuration")?;
    let source = recording_source(&config)?;

    match &cli.command {
        Command::Export {
            recording,
            start,
            end,
        } => export_headless(&config, source.as_ref(), recording, start.zip(*end)),
        Command::Gesture { .. } => {
            let trigger = HttpSoundTrigger::spawn(&config.backend_url)
                .context("Failed to start sound trigger")?;
            let pipeline = GesturePipeline::new(&config, Box::new(trigger), SystemClock);
            let client = BackendClient::new(&config.backend_url)
                .context("Failed to create backend client")?;
            let control =
                BackendControl::spawn(client).context("Failed to start backend control")?;
            let output = RodioOutput::open_default().context("Failed to open audio output")?;
            let mut app = App::new(config, source, output)
                .with_pipeline(pipeline)
                .with_control(control);
            app.connect_gesture();
            app.refresh_recordings();
            run(&mut app)
        }
        Command::Edit { recording } => {
            let output = RodioOutput::open_default().context("Failed to open audio output")?;
            let mut app = App::new(config, source, output);
            app.refresh_recordings();
            if let Some(name) = recording {
                app.request_load(name, false);
            }
            run(&mut app)
        }
    }
}

/// Loads, optionally trims, and exports one recording.
fn export_headless(
    config: &Config,
    source: &dyn RecordingSource,
    recording: &str,
    range: Option<(f64, f64)>,
) -> Result<()> {
    let mut store = BufferStore::from_config(config);
    store
        .load(source, recording, false)
        .with_context(|| format!("Failed to load {recording}"))?;

    if let Some((start, end)) = range {
        store.set_selection(Some(Selection::new(start, end)));
        edit::trim(&mut store).context("Failed to trim")?;
    }
    if store.duration() <= 0.0 {
        bail!("{recording} is empty after trimming");
    }

    let mut sink = DownloadDir::new(&config.download_dir);
    let file =
        edit::export(&store, &mut sink, None::<fn(&[u8], &str)>).context("Failed to export")?;
    println!("{} ({} bytes)", file.path.display(), file.size);
    Ok(())
}

fn run<O: AudioOutput>(app: &mut App<O>) -> Result<()> {
    app.set_export_notifier(Box::new(|bytes: &[u8], filename: &str| {
        tracing::info!(filename, bytes = bytes.len(), "export delivered");
    }));
    let mut terminal = setup_terminal().context("Failed to setup terminal")?;
    let result = run_app(&mut terminal, app);
    restore_terminal(&mut terminal).context("Failed to restore terminal")?;
    result
}

/// Sets up the terminal for TUI rendering.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("Failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("Failed to create terminal")?;
    Ok(terminal)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;
    Ok(())
}

/// Main application loop.
fn run_app<O: AudioOutput>(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App<O>,
) -> Result<()> {
    loop {
        app.poll_loads();
        app.poll_control();
        app.update_playback(Instant::now());
        app.update_gesture();
        app.clear_expired_status();

        terminal.draw(|frame| ui::render(frame, app))?;

        // Short timeout keeps the playhead and skeleton animating.
        if event::poll(Duration::from_millis(16))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if app.show_help {
                        if matches!(key.code, KeyCode::Char('?') | KeyCode::Esc) {
                            app.show_help = false;
                        }
                        continue;
                    }
                    if handle_key(app, key.code, key.modifiers)? {
                        return Ok(());
                    }
                }
                Event::Mouse(mouse) => handle_mouse(app, mouse),
                _ => {}
            }
        }
    }
}

fn handle_mouse<O: AudioOutput>(app: &mut App<O>, mouse: MouseEvent) {
    if app.view_mode != ViewMode::Editor {
        return;
    }
    let modifier = if mouse.modifiers.contains(KeyModifiers::SHIFT) {
        ClickModifier::Extend
    } else if mouse.modifiers.contains(KeyModifiers::CONTROL)
        || mouse.modifiers.contains(KeyModifiers::ALT)
        || mouse.modifiers.contains(KeyModifiers::SUPER)
    {
        ClickModifier::Select
    } else {
        ClickModifier::None
    };

    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            let (x, y) = (mouse.column, mouse.row);
            let hit = |r: ratatui::layout::Rect| {
                x >= r.x && x < r.x + r.width && y >= r.y && y < r.y + r.height
            };
            if hit(app.layout.waveform) {
                app.click_waveform(x, modifier);
            } else if hit(app.layout.recordings) {
                app.focused_panel = FocusedPanel::Recordings;
            } else if hit(app.layout.layers) {
                app.focused_panel = FocusedPanel::Layers;
            }
        }
        MouseEventKind::ScrollUp => app.move_selection(false),
        MouseEventKind::ScrollDown => app.move_selection(true),
        _ => {}
    }
}

/// Handles a key press event.
///
/// # Returns
///
/// `true` if the application should quit
fn handle_key<O: AudioOutput>(
    app: &mut App<O>,
    code: KeyCode,
    modifiers: KeyModifiers,
) -> Result<bool> {
    match code {
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => return Ok(true),
        KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
        KeyCode::Char('?') => {
            app.show_help = true;
            return Ok(false);
        }
        KeyCode::Char('g') => {
            app.toggle_view();
            return Ok(false);
        }
        _ => {}
    }

    match app.view_mode {
        ViewMode::Gesture => handle_gesture_key(app, code),
        ViewMode::Editor => handle_editor_key(app, code),
    }
    Ok(false)
}

fn handle_gesture_key<O: AudioOutput>(app: &mut App<O>, code: KeyCode) {
    match code {
        KeyCode::Char('i') => app.cycle_instrument(),
        KeyCode::Char('c') => app.connect_gesture(),
        KeyCode::Char('s') => app.toggle_recording(),
        _ => {}
    }
}

fn handle_editor_key<O: AudioOutput>(app: &mut App<O>, code: KeyCode) {
    match code {
        KeyCode::Tab => app.focused_panel = app.focused_panel.next(),
        KeyCode::Char(' ') => app.toggle_playback(Instant::now()),
        KeyCode::Home | KeyCode::Char('0') => app.rewind(),
        KeyCode::Up | KeyCode::Char('k') => app.move_selection(false),
        KeyCode::Down | KeyCode::Char('j') => app.move_selection(true),
        KeyCode::Enter => app.load_selected(false),
        KeyCode::Char('a') => app.load_selected(true),
        KeyCode::Char('r') => app.refresh_recordings(),
        KeyCode::Char('t') => app.trim(),
        KeyCode::Char('e') => app.export(),
        KeyCode::Char('m') => app.toggle_selected_mute(),
        KeyCode::Char('x') | KeyCode::Delete => app.remove_selected_layer(),
        KeyCode::Char('-') => app.adjust_volume(-VOLUME_STEP),
        KeyCode::Char('+') | KeyCode::Char('=') => app.adjust_volume(VOLUME_STEP),
        _ => {}
    }
}
