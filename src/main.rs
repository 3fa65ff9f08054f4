use archtype::{
    app_dirs::AppDirs,
    catalog::CommandCatalog,
    config::{Config, ConfigStore, FileConfigStore},
    error::ArchtypeError,
    game::{Game, RunSummary},
    highscore::{FileHighScoreStore, HighScoreStore},
    interrupt::InterruptGuard,
    logging,
    runtime::{CrosstermInput, FixedTicker, Runner, SystemClock},
    ui::TerminalPresenter,
};
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    cursor::{Hide, Show},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
};
use tracing::{error, info, warn};

/// typing trainer for shell commands with a shrinking timer and letter ranks
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Type shell commands against a timer that scales with their length. Fast entries earn S to D ranks and points; the best score is kept between runs."
)]
pub struct Cli {
    /// file with one command per line; blank lines and `#` comments are ignored
    #[clap(short = 'c', long)]
    commands: Option<PathBuf>,

    /// play commands in file order instead of shuffling them
    #[clap(long)]
    no_shuffle: bool,

    /// milliseconds between loop ticks, clamped to 1-100
    #[clap(long)]
    tick_ms: Option<u64>,

    /// where the high score is stored
    #[clap(long)]
    high_score_file: Option<PathBuf>,

    /// where logs are written
    #[clap(long)]
    log_file: Option<PathBuf>,

    /// reset the stored high score to 0 before playing
    #[clap(long)]
    reset_high_score: bool,

    /// write the effective settings to the config file and exit
    #[clap(long)]
    save_config: bool,
}

impl Cli {
    /// Layer the flags that were given over the persisted config.
    fn apply(&self, mut config: Config) -> Config {
        if let Some(path) = &self.commands {
            config.commands_path = Some(path.clone());
        }
        if self.no_shuffle {
            config.shuffle = false;
        }
        if let Some(ms) = self.tick_ms {
            config.tick_ms = ms;
        }
        if let Some(path) = &self.high_score_file {
            config.high_score_path = Some(path.clone());
        }
        if let Some(path) = &self.log_file {
            config.log_path = Some(path.clone());
        }
        config
    }
}

fn load_catalog(config: &Config) -> archtype::error::Result<CommandCatalog> {
    let catalog = match &config.commands_path {
        Some(path) => CommandCatalog::from_path(path)?,
        None => CommandCatalog::builtin()?,
    };
    Ok(if config.shuffle {
        catalog.shuffle()
    } else {
        catalog
    })
}

fn high_score_store(config: &Config) -> FileHighScoreStore {
    match &config.high_score_path {
        Some(path) => FileHighScoreStore::with_path(path),
        None => FileHighScoreStore::new(),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config_store = FileConfigStore::new();
    let config = cli.apply(config_store.load());

    if cli.save_config {
        config_store.save(&config)?;
        println!("saved settings to {}", config_store.path().display());
        return Ok(());
    }

    if let Some(path) = config.log_path.clone().or_else(AppDirs::log_path) {
        logging::init_global(&path);
    }

    let catalog = match load_catalog(&config) {
        Ok(catalog) => catalog,
        Err(err) => {
            error!(%err, "cannot start without commands");
            let mut cmd = Cli::command();
            cmd.error(ErrorKind::Io, err.to_string()).exit();
        }
    };

    let store = high_score_store(&config);
    if cli.reset_high_score {
        match store.reset() {
            Ok(()) => info!(path = %store.path().display(), "high score reset"),
            Err(err) => report(err)?,
        }
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let interrupt = InterruptGuard::install()?;
    enable_raw_mode()?;
    let outcome = run_tui(catalog, store, &config, &interrupt);
    restore_terminal()?;
    if interrupt.raised() {
        info!("run ended by signal");
    }

    match outcome {
        Ok(summary) => println!("{summary}"),
        Err(err) => report(err)?,
    }

    Ok(())
}

/// Log a failure and stop only if it cannot be recovered from.
fn report(err: ArchtypeError) -> Result<(), Box<dyn Error>> {
    if err.is_fatal() {
        error!(%err, "aborting");
        return Err(err.into());
    }
    warn!(%err, "continuing");
    eprintln!("archtype: {err}");
    Ok(())
}

fn run_tui<S: HighScoreStore>(
    catalog: CommandCatalog,
    store: S,
    config: &Config,
    interrupt: &InterruptGuard,
) -> archtype::error::Result<RunSummary> {
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, Hide)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;

    let runner = Runner::new(
        CrosstermInput::with_interrupt(interrupt.flag()),
        FixedTicker::new(config.tick_interval()),
        SystemClock,
    );
    Ok(Game::new(catalog, runner, TerminalPresenter::new(terminal), store).run())
}

fn restore_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen, Show)
}
