//! Globe Atlas - interactive orthographic globe with a choropleth and a ranking chart.

mod chart;
mod color;
mod config;
mod error;
mod feature;
mod loader;
mod map_draw;
mod projection;
mod rotation;
mod scene;
mod state;
mod svg;
mod topology;
mod ui;
mod zoom;

use std::{fs::File, io, path::PathBuf, sync::Mutex, time::Duration};

use clap::Parser;
use color_eyre::eyre::{WrapErr, bail};
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind, KeyModifiers, MouseButton,
        MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend, layout::Rect};

use crate::{
    config::Config,
    scene::Viewport,
    state::{AppState, PointerEvent, Status},
};

/// Share of the snapshot height given to the chart below the globe.
const SVG_CHART_RATIO: f64 = 0.4;
/// Scale ratio per ctrl+scroll notch.
const PINCH_RATIO: f64 = 1.25;

#[derive(Parser)]
#[command(name = "globe-atlas")]
#[command(about = "Rotatable orthographic globe with a choropleth and a ranking bar chart")]
#[command(version)]
struct Cli {
    /// URL or file path of the topology document
    source: Option<String>,

    /// Object key inside the topology
    #[arg(long)]
    object: Option<String>,

    /// Project config file (default: globe-atlas.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write an SVG snapshot to this file and exit
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Snapshot width
    #[arg(long, default_value_t = 960.0)]
    width: f64,

    /// Snapshot globe height
    #[arg(long, default_value_t = 960.0)]
    height: f64,

    /// Run in verbose mode
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(source) = cli.source {
        config.source = source;
    }
    if let Some(object) = cli.object {
        config.object = object;
    }
    config.validate()?;

    // The terminal belongs to the UI, so logs go to a file
    let log = File::create(&config.log_file)
        .wrap_err_with(|| format!("cannot open log file {}", config.log_file.display()))?;
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(log))
        .with_ansi(false)
        .init();

    tracing::info!(source = %config.source, object = %config.object, "starting globe-atlas");

    match cli.svg {
        Some(out) => snapshot(config, out, cli.width, cli.height),
        None => run(config),
    }
}

/// Loads synchronously, renders once and writes the SVG document.
fn snapshot(config: Config, out: PathBuf, width: f64, height: f64) -> color_eyre::Result<()> {
    let mut state = AppState::new(config);
    let chart_height = height * SVG_CHART_RATIO;
    state.resize(Viewport::new(width, height), Viewport::new(width, chart_height));
    if let Status::Failure(reason) = state.load_now() {
        bail!("load json failed: {reason}");
    }
    state.frame();
    let document = svg::render(state.scene(), width, height, chart_height);
    std::fs::write(&out, document).wrap_err_with(|| format!("cannot write {}", out.display()))?;
    tracing::info!(path = %out.display(), "snapshot written");
    Ok(())
}

fn run(config: Config) -> color_eyre::Result<()> {
    let mut state = AppState::new(config);
    state.request_load();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, &mut state);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;
    result
}

fn event_loop(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, state: &mut AppState) -> color_eyre::Result<()> {
    loop {
        state.poll_loads();

        let size = terminal.size()?;
        let areas = ui::areas(Rect::new(0, 0, size.width, size.height));
        let (globe, chart) = ui::viewports(&areas);
        state.resize(globe, chart);
        state.frame();
        terminal.draw(|f| ui::draw(f, state))?;

        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if state.handle_input(key) {
                    return Ok(());
                }
            }
            Event::Mouse(mouse) => {
                let inner = areas.map_inner;
                let at = map_draw::to_screen(inner, mouse.column, mouse.row);
                // Drags keep going when the pointer leaves the panel
                let clamped = || {
                    let column = mouse.column.clamp(inner.x, inner.x + inner.width.saturating_sub(1));
                    let row = mouse.row.clamp(inner.y, inner.y + inner.height.saturating_sub(1));
                    map_draw::to_screen(inner, column, row)
                };
                let pinch = mouse.modifiers.contains(KeyModifiers::CONTROL);
                let pointer = match mouse.kind {
                    MouseEventKind::Down(MouseButton::Left) => at.map(PointerEvent::Down),
                    MouseEventKind::Drag(MouseButton::Left) => clamped().map(PointerEvent::Drag),
                    MouseEventKind::Up(MouseButton::Left) => clamped().map(PointerEvent::Up),
                    MouseEventKind::ScrollUp if pinch => at.map(|at| PointerEvent::Pinch { at, ratio: PINCH_RATIO }),
                    MouseEventKind::ScrollDown if pinch => {
                        at.map(|at| PointerEvent::Pinch { at, ratio: 1.0 / PINCH_RATIO })
                    }
                    MouseEventKind::ScrollUp => at.map(|at| PointerEvent::Wheel { at, delta: -1.0 }),
                    MouseEventKind::ScrollDown => at.map(|at| PointerEvent::Wheel { at, delta: 1.0 }),
                    _ => None,
                };
                if let Some(pointer) = pointer {
                    state.dispatch(pointer);
                }
            }
            // picked up by the next layout pass
            Event::Resize(..) => {}
            _ => {}
        }
    }
}
