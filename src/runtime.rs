use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tracing::{debug, warn};

use crate::session::{is_printable, Phase, SessionState, Submission};
use crate::ui::Presenter;

pub const DEFAULT_TICK_MS: u64 = 10;

/// Input the core understands; key codes stay in [`key_to_event`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputEvent {
    Confirm,
    Backspace,
    Char(char),
    PauseToggle,
    Quit,
}

/// Maps a terminal key press onto an [`InputEvent`].
pub fn key_to_event(key: KeyEvent) -> Option<InputEvent> {
    if key.kind != KeyEventKind::Press {
        return None;
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') | KeyCode::Char('d') => Some(InputEvent::Quit),
            _ => None,
        };
    }
    if key.modifiers.contains(KeyModifiers::ALT) {
        return None;
    }

    match key.code {
        KeyCode::Enter => Some(InputEvent::Confirm),
        KeyCode::Backspace => Some(InputEvent::Backspace),
        KeyCode::Esc => Some(InputEvent::PauseToggle),
        KeyCode::Char(c) if is_printable(c) => Some(InputEvent::Char(c)),
        _ => None,
    }
}

/// Non-blocking source of input events.
pub trait InputSource {
    /// Returns at most one pending event; never waits.
    fn poll_input(&mut self) -> Option<InputEvent>;
}

/// Production input source reading the crossterm event queue.
#[derive(Debug, Default)]
pub struct CrosstermInput {
    interrupted: Arc<AtomicBool>,
}

impl CrosstermInput {
    /// Once `interrupted` is raised every poll yields [`InputEvent::Quit`].
    pub fn with_interrupt(interrupted: Arc<AtomicBool>) -> Self {
        Self { interrupted }
    }
}

impl InputSource for CrosstermInput {
    fn poll_input(&mut self) -> Option<InputEvent> {
        if self.interrupted.load(Ordering::SeqCst) {
            return Some(InputEvent::Quit);
        }
        match event::poll(Duration::ZERO) {
            Ok(true) => match event::read() {
                Ok(CtEvent::Key(key)) => key_to_event(key),
                Ok(_) => None,
                Err(err) => {
                    warn!(%err, "failed to read terminal event");
                    None
                }
            },
            Ok(false) => None,
            Err(err) => {
                warn!(%err, "failed to poll terminal events");
                None
            }
        }
    }
}

/// Scripted input for headless runs. Each entry is what is pending on one
/// poll; `None` entries are idle ticks. Once the script runs out every poll
/// yields [`InputEvent::Quit`], so a headless run always terminates.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    script: VecDeque<Option<InputEvent>>,
}

impl ScriptedInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(mut self, event: InputEvent) -> Self {
        self.script.push_back(Some(event));
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.script.extend(text.chars().map(|c| Some(InputEvent::Char(c))));
        self
    }

    pub fn idle(mut self, polls: usize) -> Self {
        self.script.extend(std::iter::repeat(None).take(polls));
        self
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl InputSource for ScriptedInput {
    fn poll_input(&mut self) -> Option<InputEvent> {
        match self.script.pop_front() {
            Some(entry) => entry,
            None => Some(InputEvent::Quit),
        }
    }
}

/// Source of the current instant.
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Clone, Debug)]
pub struct ManualClock {
    origin: Instant,
    offset_nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_nanos: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.offset_nanos.fetch_add(nanos, Ordering::SeqCst);
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }
}

/// Paces the loop between ticks.
pub trait Ticker {
    fn interval(&self) -> Duration;

    /// Yields for one interval.
    fn wait(&self) {
        thread::sleep(self.interval());
    }
}

/// Fixed interval ticker that sleeps the thread.
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for FixedTicker {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_TICK_MS))
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Ticker that advances a [`ManualClock`] instead of sleeping.
#[derive(Clone, Debug)]
pub struct SimulatedTicker {
    interval: Duration,
    clock: ManualClock,
}

impl SimulatedTicker {
    pub fn new(interval: Duration, clock: ManualClock) -> Self {
        Self { interval, clock }
    }
}

impl Ticker for SimulatedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }

    fn wait(&self) {
        self.clock.advance(self.interval);
    }
}

/// How one command attempt ended.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LevelOutcome {
    Correct { time_used: f64 },
    Timeout,
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeoutChoice {
    Retry,
    Skip,
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RankChoice {
    Continue,
    Quit,
}

/// Cooperative single-threaded loop: one render, at most one input event
/// and one tick of waiting per iteration.
pub struct Runner<I: InputSource, T: Ticker, C: Clock> {
    input: I,
    ticker: T,
    clock: C,
    render_failures: u64,
}

impl<I: InputSource, T: Ticker, C: Clock> Runner<I, T, C> {
    pub fn new(input: I, ticker: T, clock: C) -> Self {
        Self {
            input,
            ticker,
            clock,
            render_failures: 0,
        }
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    pub fn render_failures(&self) -> u64 {
        self.render_failures
    }

    fn render<P: Presenter>(&mut self, state: &SessionState, presenter: &mut P) {
        if let Err(err) = presenter.render(state) {
            self.render_failures += 1;
            if self.render_failures == 1 {
                warn!(%err, "render failed; skipping frame");
            } else {
                debug!(%err, failures = self.render_failures, "render failed");
            }
        }
    }

    /// Drives one command attempt until it is typed, times out or the
    /// player quits.
    ///
    /// The countdown is checked before input is read, so a submission
    /// pending on the tick the limit runs out is discarded.
    pub fn run_level<P: Presenter>(
        &mut self,
        state: &mut SessionState,
        presenter: &mut P,
    ) -> LevelOutcome {
        loop {
            let now = self.clock.now();

            if state.phase == Phase::Paused {
                self.render(state, presenter);
                match self.input.poll_input() {
                    Some(InputEvent::PauseToggle) => state.resume(self.clock.now()),
                    Some(InputEvent::Quit) => return LevelOutcome::Quit,
                    _ => {}
                }
                self.ticker.wait();
                continue;
            }

            state.refresh(now);
            if state.is_expired() {
                state.expire();
                if let Some(dropped) = self.input.poll_input() {
                    debug!(?dropped, "input discarded on expiry tick");
                }
                return LevelOutcome::Timeout;
            }

            self.render(state, presenter);

            if let Some(event) = self.input.poll_input() {
                match event {
                    InputEvent::Char(c) => {
                        state.push_char(c);
                    }
                    InputEvent::Backspace => {
                        state.backspace();
                    }
                    InputEvent::PauseToggle => state.pause(now),
                    InputEvent::Quit => return LevelOutcome::Quit,
                    InputEvent::Confirm => {
                        let submitted_at = self.clock.now();
                        if state.submit(submitted_at) == Submission::Correct {
                            return LevelOutcome::Correct {
                                time_used: state.time_used(submitted_at),
                            };
                        }
                    }
                }
            }

            self.ticker.wait();
        }
    }

    /// Renders `state` each tick until any event arrives.
    pub fn await_event<P: Presenter>(
        &mut self,
        state: &SessionState,
        presenter: &mut P,
    ) -> InputEvent {
        loop {
            self.render(state, presenter);
            if let Some(event) = self.input.poll_input() {
                return event;
            }
            self.ticker.wait();
        }
    }

    /// Intro screen: true once the player confirms, false on quit.
    pub fn await_start<P: Presenter>(&mut self, state: &SessionState, presenter: &mut P) -> bool {
        loop {
            match self.await_event(state, presenter) {
                InputEvent::Confirm => return true,
                InputEvent::Quit => return false,
                _ => {}
            }
        }
    }

    pub fn timeout_choice<P: Presenter>(
        &mut self,
        state: &SessionState,
        presenter: &mut P,
    ) -> TimeoutChoice {
        match self.await_event(state, presenter) {
            InputEvent::Char('r') | InputEvent::Char('R') => TimeoutChoice::Retry,
            InputEvent::Char('q') | InputEvent::Char('Q') | InputEvent::Quit => TimeoutChoice::Quit,
            _ => TimeoutChoice::Skip,
        }
    }

    pub fn rank_choice<P: Presenter>(
        &mut self,
        state: &SessionState,
        presenter: &mut P,
    ) -> RankChoice {
        match self.await_event(state, presenter) {
            InputEvent::Char('q') | InputEvent::Char('Q') | InputEvent::Quit => RankChoice::Quit,
            _ => RankChoice::Continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CommandCatalog;
    use crate::error::{ArchtypeError, Result};
    use assert_matches::assert_matches;

    #[derive(Default)]
    struct CountingPresenter {
        frames: usize,
        fail: bool,
    }

    impl Presenter for CountingPresenter {
        fn render(&mut self, _state: &SessionState) -> Result<()> {
            self.frames += 1;
            if self.fail {
                Err(ArchtypeError::RenderFailure(std::io::Error::other("too small")))
            } else {
                Ok(())
            }
        }
    }

    type SimRunner = Runner<ScriptedInput, SimulatedTicker, ManualClock>;

    fn simulated(input: ScriptedInput) -> (SimRunner, ManualClock) {
        let clock = ManualClock::new();
        let ticker = SimulatedTicker::new(Duration::from_millis(DEFAULT_TICK_MS), clock.clone());
        (Runner::new(input, ticker, clock.clone()), clock)
    }

    fn started(runner: &SimRunner, commands: &[&str]) -> SessionState {
        let catalog = CommandCatalog::from_commands(
            "test",
            commands.iter().map(|c| c.to_string()).collect(),
        )
        .unwrap();
        let mut state = SessionState::new(catalog.len(), 0);
        state.begin(&catalog, runner.now());
        state
    }

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_key_mapping() {
        assert_eq!(key_to_event(key(KeyCode::Enter, KeyModifiers::NONE)), Some(InputEvent::Confirm));
        assert_eq!(
            key_to_event(key(KeyCode::Backspace, KeyModifiers::NONE)),
            Some(InputEvent::Backspace)
        );
        assert_eq!(key_to_event(key(KeyCode::Esc, KeyModifiers::NONE)), Some(InputEvent::PauseToggle));
        assert_eq!(
            key_to_event(key(KeyCode::Char('p'), KeyModifiers::NONE)),
            Some(InputEvent::Char('p'))
        );
        assert_eq!(
            key_to_event(key(KeyCode::Char('S'), KeyModifiers::SHIFT)),
            Some(InputEvent::Char('S'))
        );
        assert_eq!(
            key_to_event(key(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(InputEvent::Quit)
        );
        assert_eq!(
            key_to_event(key(KeyCode::Char('d'), KeyModifiers::CONTROL)),
            Some(InputEvent::Quit)
        );
    }

    #[test]
    fn test_key_mapping_ignores_other_keys() {
        assert_eq!(key_to_event(key(KeyCode::Tab, KeyModifiers::NONE)), None);
        assert_eq!(key_to_event(key(KeyCode::Left, KeyModifiers::NONE)), None);
        assert_eq!(key_to_event(key(KeyCode::Char('a'), KeyModifiers::CONTROL)), None);
        assert_eq!(key_to_event(key(KeyCode::Char('x'), KeyModifiers::ALT)), None);
        assert_eq!(key_to_event(key(KeyCode::Char('ß'), KeyModifiers::NONE)), None);

        let mut release = key(KeyCode::Char('a'), KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert_eq!(key_to_event(release), None);
    }

    #[test]
    fn test_scripted_input_yields_quit_when_exhausted() {
        let mut input = ScriptedInput::new().text("ab").idle(1);
        assert_eq!(input.poll_input(), Some(InputEvent::Char('a')));
        assert_eq!(input.poll_input(), Some(InputEvent::Char('b')));
        assert_eq!(input.poll_input(), None);
        assert_eq!(input.poll_input(), Some(InputEvent::Quit));
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn test_raised_interrupt_reads_as_quit() {
        let interrupted = Arc::new(AtomicBool::new(true));
        let mut input = CrosstermInput::with_interrupt(Arc::clone(&interrupted));
        assert_eq!(input.poll_input(), Some(InputEvent::Quit));
        assert_eq!(input.poll_input(), Some(InputEvent::Quit));
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new();
        let other = clock.clone();
        let before = clock.now();
        other.advance(Duration::from_millis(250));
        assert_eq!(clock.now() - before, Duration::from_millis(250));
    }

    #[test]
    fn test_simulated_ticker_advances_clock() {
        let clock = ManualClock::new();
        let ticker = SimulatedTicker::new(Duration::from_millis(10), clock.clone());
        ticker.wait();
        ticker.wait();
        assert_eq!(clock.elapsed(), Duration::from_millis(20));
    }

    #[test]
    fn test_run_level_correct() {
        let input = ScriptedInput::new().text("ls").key(InputEvent::Confirm);
        let (mut runner, _) = simulated(input);
        let mut state = started(&runner, &["ls"]);
        let mut presenter = CountingPresenter::default();

        let outcome = runner.run_level(&mut state, &mut presenter);

        assert_matches!(outcome, LevelOutcome::Correct { time_used } if (time_used - 0.02).abs() < 1e-9);
        assert_eq!(state.phase, Phase::Correct);
        assert_eq!(presenter.frames, 3);
    }

    #[test]
    fn test_run_level_incorrect_then_correct() {
        let input = ScriptedInput::new()
            .text("sl")
            .key(InputEvent::Confirm)
            .text("ls")
            .key(InputEvent::Confirm);
        let (mut runner, _) = simulated(input);
        let mut state = started(&runner, &["ls"]);

        let outcome = runner.run_level(&mut state, &mut CountingPresenter::default());

        assert_matches!(outcome, LevelOutcome::Correct { .. });
        assert_eq!(state.misses, 1);
    }

    #[test]
    fn test_run_level_timeout() {
        let (mut runner, clock) = simulated(ScriptedInput::new().idle(10_000));
        let mut state = started(&runner, &["ls"]);

        let outcome = runner.run_level(&mut state, &mut CountingPresenter::default());

        assert_eq!(outcome, LevelOutcome::Timeout);
        assert_eq!(state.phase, Phase::Timeout);
        assert_eq!(clock.elapsed(), Duration::from_secs(5));
    }

    #[test]
    fn test_submission_on_expiry_tick_is_a_timeout() {
        // Polls happen at t = 0, 10ms, 20ms, ...; the 501st poll is at 5.00s.
        let input = ScriptedInput::new()
            .text("ls")
            .idle(498)
            .key(InputEvent::Confirm)
            .key(InputEvent::Char('r'));
        let (mut runner, _) = simulated(input);
        let mut state = started(&runner, &["ls"]);
        let mut presenter = CountingPresenter::default();

        assert_eq!(runner.run_level(&mut state, &mut presenter), LevelOutcome::Timeout);
        // A replayed confirm would read as Skip at the prompt.
        assert_eq!(runner.timeout_choice(&state, &mut presenter), TimeoutChoice::Retry);
    }

    #[test]
    fn test_submission_one_tick_before_expiry_counts() {
        let input = ScriptedInput::new()
            .text("ls")
            .idle(497)
            .key(InputEvent::Confirm);
        let (mut runner, _) = simulated(input);
        let mut state = started(&runner, &["ls"]);

        let outcome = runner.run_level(&mut state, &mut CountingPresenter::default());
        assert_matches!(outcome, LevelOutcome::Correct { time_used } if time_used < 5.0);
    }

    #[test]
    fn test_pause_holds_countdown() {
        let input = ScriptedInput::new()
            .idle(99)
            .key(InputEvent::PauseToggle)
            .idle(2_000)
            .key(InputEvent::PauseToggle)
            .key(InputEvent::Quit);
        let (mut runner, clock) = simulated(input);
        let mut state = started(&runner, &["ls"]);

        let outcome = runner.run_level(&mut state, &mut CountingPresenter::default());

        assert_eq!(outcome, LevelOutcome::Quit);
        assert!(clock.elapsed() > Duration::from_secs(20));
        // paused at 0.99s, then one tick of play after resuming
        assert!((state.time_remaining - 4.0).abs() < 1e-9, "{}", state.time_remaining);
    }

    #[test]
    fn test_quit_while_paused() {
        let input = ScriptedInput::new()
            .key(InputEvent::PauseToggle)
            .key(InputEvent::Quit);
        let (mut runner, _) = simulated(input);
        let mut state = started(&runner, &["ls"]);

        assert_eq!(
            runner.run_level(&mut state, &mut CountingPresenter::default()),
            LevelOutcome::Quit
        );
        assert_eq!(state.phase, Phase::Paused);
    }

    #[test]
    fn test_render_failures_are_not_fatal() {
        let input = ScriptedInput::new().text("ls").key(InputEvent::Confirm);
        let (mut runner, _) = simulated(input);
        let mut state = started(&runner, &["ls"]);
        let mut presenter = CountingPresenter {
            fail: true,
            ..Default::default()
        };

        let outcome = runner.run_level(&mut state, &mut presenter);

        assert_matches!(outcome, LevelOutcome::Correct { .. });
        assert_eq!(runner.render_failures(), 3);
    }

    #[test]
    fn test_prompt_choices() {
        let input = ScriptedInput::new()
            .idle(3)
            .key(InputEvent::Char('r'))
            .key(InputEvent::Char('q'))
            .key(InputEvent::Backspace)
            .key(InputEvent::Char('x'))
            .key(InputEvent::Quit);
        let (mut runner, _) = simulated(input);
        let state = started(&runner, &["ls"]);
        let mut presenter = CountingPresenter::default();

        assert_eq!(runner.timeout_choice(&state, &mut presenter), TimeoutChoice::Retry);
        assert_eq!(runner.timeout_choice(&state, &mut presenter), TimeoutChoice::Quit);
        assert_eq!(runner.timeout_choice(&state, &mut presenter), TimeoutChoice::Skip);
        assert_eq!(runner.rank_choice(&state, &mut presenter), RankChoice::Continue);
        assert_eq!(runner.rank_choice(&state, &mut presenter), RankChoice::Quit);
    }

    #[test]
    fn test_await_start_ignores_typing() {
        let input = ScriptedInput::new().text("go").key(InputEvent::Confirm);
        let (mut runner, _) = simulated(input);
        let state = SessionState::new(1, 0);
        assert!(runner.await_start(&state, &mut CountingPresenter::default()));

        let (mut runner, _) = simulated(ScriptedInput::new().key(InputEvent::Quit));
        assert!(!runner.await_start(&state, &mut CountingPresenter::default()));
    }
}
