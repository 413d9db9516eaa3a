mod app;
mod cmd;
mod config;
mod export;
mod filter;
mod highlight;
mod parser;
mod record;
mod signal;
mod store;
mod tailer;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::Parser;
use crossterm::event::{self as crossterm_event, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use record::FilterOptions;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use ui::keymap::{Action, KeyMap};

/// Upper bound on tailer events drained per loop iteration, so rendering
/// stays responsive under fire-hose input.
const EVENT_BUDGET: usize = 5000;

#[derive(Parser, Debug)]
#[command(name = "traceace")]
#[command(version)]
#[command(about = "Blazing fast terminal log analyzer")]
#[command(long_about = "TraceAce is a terminal user interface for analyzing and monitoring log \
files. It provides real-time tailing with rotation detection, an advanced \
filter query language, syntax highlighting, and support for structured \
(JSON / key-value) and unstructured logs.

Examples:
  traceace /var/log/app.log                    Tail a log file
  traceace /var/log/app.log /var/log/sys.log   Tail multiple files
  traceace --theme=light /var/log/app.log      Use the light theme
  traceace --query=errors /var/log/app.log     Start with a saved query")]
struct Cli {
    /// Log files to tail (at least one)
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Config file (default: $XDG_CONFIG_HOME/traceace/config.yaml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Color theme (dark, light, monochrome)
    #[arg(long, value_name = "THEME")]
    theme: Option<String>,

    /// Follow files as they grow (use --tail=false to read once)
    #[arg(
        short = 'f',
        long = "tail",
        default_value_t = true,
        num_args = 0..=1,
        default_missing_value = "true",
        action = clap::ArgAction::Set,
        value_name = "BOOL"
    )]
    tail: bool,

    /// Read the entire file from the beginning
    #[arg(short = 'F', long = "from-beginning")]
    from_beginning: bool,

    /// Context lines around matches
    #[arg(short = 'C', long = "context", value_name = "N")]
    context: Option<usize>,

    /// Start with a saved query by name
    #[arg(long, value_name = "NAME")]
    query: Option<String>,

    /// Verbose startup output
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Debug mode (keeps stderr diagnostics on)
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<cmd::Commands>,
}

fn main() {
    let cli = Cli::parse();

    if let Some(command) = cli.command {
        let result = match command {
            cmd::Commands::Version => {
                println!("traceace {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
            cmd::Commands::Config { action } => match action {
                cmd::ConfigAction::Show => cmd::config::show(cli.config.as_deref()),
                cmd::ConfigAction::Edit => cmd::config::edit(cli.config.as_deref()),
            },
            cmd::Commands::Benchmark(args) => cmd::benchmark::run(args),
            cmd::Commands::Validate(args) => cmd::validate::run(args, cli.config.as_deref()),
        };
        if let Err(code) = result {
            std::process::exit(code);
        }
        return;
    }

    if cli.files.is_empty() {
        eprintln!("Error: at least one log file is required (see --help)");
        std::process::exit(2);
    }

    if let Err(code) = run(cli) {
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> Result<(), i32> {
    let (mut config, config_path) = config::load(cli.config.as_deref()).map_err(|e| {
        eprintln!("Failed to load config: {}", e);
        1
    })?;
    if let Some(theme) = &cli.theme {
        config.ui.theme = theme.clone();
    }
    if let Some(context) = cli.context {
        config.ui.context_lines = context;
    }
    if cli.verbose {
        eprintln!("[config] loaded from {}", config_path.display());
    }
    if cli.debug {
        eprintln!(
            "[debug] refresh {} ms, rotation check {} ms, buffer {} lines",
            config.ui.refresh_rate_ms,
            config.general.file_rotation_check_ms,
            config.ui.max_buffer_lines
        );
    }

    let saved_query = match &cli.query {
        Some(name) => match config.saved_query(name) {
            Some(query) => Some(query.clone()),
            None => {
                eprintln!("Error: no saved query named '{}'", name);
                return Err(2);
            }
        },
        None => None,
    };

    let mut app = App::new(config);
    app.follow = cli.tail;

    for file in &cli.files {
        let added = if cli.from_beginning {
            app.tail_from_start(file)
        } else {
            app.add_file(file)
        };
        if let Err(e) = added {
            eprintln!("Failed to add file {}: {}", file.display(), e);
            return Err(1);
        }
        if cli.verbose {
            eprintln!("[tailer] watching {}", file.display());
        }
    }

    if let Some(query) = saved_query {
        let installed = if query.is_regex {
            app.set_simple_filter(&FilterOptions {
                query: query.query.clone(),
                is_regex: true,
                ..FilterOptions::default()
            })
        } else {
            app.set_filter(&query.query)
        };
        if let Err(e) = installed {
            eprintln!("Saved query '{}' failed to compile: {}", query.name, e);
            return Err(1);
        }
    }

    run_tui(app).map_err(|e| {
        eprintln!("Error: {:?}", e);
        1
    })
}

/// Best-effort session snapshot next to the config file, written on exit.
fn save_session(app: &App) {
    let Ok(dir) = config::config_dir() else {
        return;
    };
    let session = app.session_state();
    if let Err(e) = export::export_session(&dir.join("session.json"), &session) {
        eprintln!("Failed to save session: {}", e);
    }
}

fn run_tui(mut app: App) -> Result<()> {
    let shutdown = signal::shutdown_flag().context("Failed to install signal handlers")?;

    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, &mut app, &shutdown);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    save_session(&app);
    app.stop();
    result
}

fn run_loop<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    shutdown: &Arc<AtomicBool>,
) -> Result<()> {
    let keymap = KeyMap::from_config(&app.config);
    let poll_timeout = Duration::from_millis(app.config.ui.refresh_rate_ms.clamp(10, 250));

    loop {
        terminal.draw(|f| ui::render(f, app))?;

        // Drain a bounded slice of tailer events, then run the batch tick.
        app.pump_events(EVENT_BUDGET);

        if crossterm_event::poll(poll_timeout)? {
            if let Event::Key(key) = crossterm_event::read()? {
                if key.kind != KeyEventKind::Release {
                    handle_key(app, &keymap, key);
                }
            }
        }

        if shutdown.load(Ordering::SeqCst) {
            app.should_quit = true;
        }
        if app.should_quit {
            return Ok(());
        }
    }
}

fn handle_key(app: &mut App, keymap: &KeyMap, key: KeyEvent) {
    // Ctrl+C always quits, whatever the mode.
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if app.search_active {
        handle_search_key(app, key);
        return;
    }

    match keymap.action(&key) {
        Some(Action::Search) => {
            app.search_active = true;
            app.search_input.clear();
        }
        Some(Action::Escape) => {
            app.show_help = false;
        }
        Some(Action::Help) => app.show_help = !app.show_help,
        Some(Action::Quit) => app.should_quit = true,
        Some(Action::ToggleView) => app.toggle_pane(),
        Some(Action::PauseResume) => app.toggle_pause(),
        Some(Action::ClearFilter) => app.clear_filter(),
        Some(Action::ScrollUp) => app.scroll_up(1),
        Some(Action::ScrollDown) => app.scroll_down(1),
        Some(Action::PageUp) => app.page_up(),
        Some(Action::PageDown) => app.page_down(),
        Some(Action::GotoTop) => app.scroll_top(),
        Some(Action::GotoBottom) => app.scroll_bottom(),
        Some(Action::NextMatch) => app.next_match(),
        Some(Action::PrevMatch) => app.prev_match(),
        Some(Action::Bookmark) => app.add_bookmark(None),
        Some(Action::Export) => {
            let path = PathBuf::from(format!("traceace-export.{}", export::ExportFormat::Text.extension()));
            match app.export_active_pane(&path, export::ExportFormat::Text) {
                Ok(written) => {
                    app.set_status(format!("Exported {} lines to {}", written, path.display()))
                }
                Err(e) => app.set_status(format!("Export failed: {}", e)),
            }
        }
        None => {}
    }
}

fn handle_search_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.search_active = false;
            app.search_input.clear();
        }
        KeyCode::Enter => {
            let query = app.search_input.clone();
            app.search_active = false;
            match app.set_filter(&query) {
                Ok(()) => {
                    if app.filter.has_filter() {
                        app.active_pane = record::PaneKind::Filtered;
                    }
                }
                Err(e) => app.set_status(format!("{}", e)),
            }
        }
        KeyCode::Backspace => {
            app.search_input.pop();
        }
        KeyCode::Char(c) => app.search_input.push(c),
        _ => {}
    }
}
