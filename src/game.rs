use std::fmt;

use tracing::{info, warn};

use crate::catalog::CommandCatalog;
use crate::highscore::HighScoreStore;
use crate::runtime::{Clock, InputSource, LevelOutcome, RankChoice, Runner, Ticker, TimeoutChoice};
use crate::session::{Ending, Phase, SessionState};
use crate::ui::Presenter;

/// What the player walks away with; printed once the terminal is restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub ending: Ending,
    pub score: u64,
    pub high_score: u64,
    pub completed: u32,
    pub skipped: u32,
    pub level: u32,
    pub catalog_len: usize,
}

impl RunSummary {
    fn from_state(state: &SessionState, ending: Ending) -> Self {
        Self {
            ending,
            score: state.score,
            high_score: state.high_score,
            completed: state.completed,
            skipped: state.skipped,
            level: state.level,
            catalog_len: state.catalog_len,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headline = match self.ending {
            Ending::Victory => "You completed all commands!",
            Ending::Quit => "Game over.",
        };
        writeln!(f, "{headline}")?;
        writeln!(
            f,
            "Score: {}  High Score: {}  Level: {}",
            self.score, self.high_score, self.level
        )?;
        write!(
            f,
            "Completed: {}/{}  Skipped: {}",
            self.completed, self.catalog_len, self.skipped
        )
    }
}

/// One full run: intro, the command loop and the game-over screen.
pub struct Game<I: InputSource, T: Ticker, C: Clock, P: Presenter, S: HighScoreStore> {
    catalog: CommandCatalog,
    state: SessionState,
    runner: Runner<I, T, C>,
    presenter: P,
    store: S,
    unsaved: bool,
}

impl<I, T, C, P, S> Game<I, T, C, P, S>
where
    I: InputSource,
    T: Ticker,
    C: Clock,
    P: Presenter,
    S: HighScoreStore,
{
    pub fn new(catalog: CommandCatalog, runner: Runner<I, T, C>, presenter: P, store: S) -> Self {
        let high_score = store.load();
        let state = SessionState::new(catalog.len(), high_score);
        Self {
            catalog,
            state,
            runner,
            presenter,
            store,
            unsaved: false,
        }
    }

    pub fn run(mut self) -> RunSummary {
        info!(commands = self.catalog.len(), high_score = self.state.high_score, "starting run");

        if self.runner.await_start(&self.state, &mut self.presenter) {
            let now = self.runner.now();
            if self.state.begin(&self.catalog, now) {
                self.play();
            } else {
                self.state.finish();
            }
        } else {
            self.state.quit();
        }

        if self.unsaved {
            self.persist();
        }

        let ending = match self.state.phase {
            Phase::GameOver(ending) => ending,
            _ => Ending::Quit,
        };
        let summary = RunSummary::from_state(&self.state, ending);
        info!(
            %ending,
            score = summary.score,
            completed = summary.completed,
            skipped = summary.skipped,
            render_failures = self.runner.render_failures(),
            "run finished"
        );

        self.runner.await_event(&self.state, &mut self.presenter);
        summary
    }

    fn play(&mut self) {
        loop {
            match self.runner.run_level(&mut self.state, &mut self.presenter) {
                LevelOutcome::Quit => {
                    self.state.quit();
                    return;
                }
                LevelOutcome::Timeout => {
                    match self.runner.timeout_choice(&self.state, &mut self.presenter) {
                        TimeoutChoice::Retry => {
                            let now = self.runner.now();
                            self.state.retry(now);
                        }
                        TimeoutChoice::Skip => {
                            let now = self.runner.now();
                            if !self.state.skip(&self.catalog, now) {
                                return;
                            }
                        }
                        TimeoutChoice::Quit => {
                            self.state.quit();
                            return;
                        }
                    }
                }
                LevelOutcome::Correct { time_used } => {
                    let award = self.state.award(time_used);
                    if award.new_high_score {
                        self.persist();
                    }
                    match self.runner.rank_choice(&self.state, &mut self.presenter) {
                        RankChoice::Continue => {
                            let now = self.runner.now();
                            if !self.state.advance(&self.catalog, now) {
                                return;
                            }
                        }
                        RankChoice::Quit => {
                            self.state.quit();
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Failures are logged and retried once more at the end of the run.
    fn persist(&mut self) {
        match self.store.save(self.state.high_score) {
            Ok(()) => self.unsaved = false,
            Err(err) => {
                warn!(%err, high_score = self.state.high_score, "could not save high score");
                self.unsaved = true;
            }
        }
    }
}
