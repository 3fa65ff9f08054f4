use std::time::{Duration, Instant};

use tracing::debug;

use crate::catalog::CommandCatalog;
use crate::scoring::{self, Rank};

/// How long the incorrect-submission flash stays up if no key is pressed.
pub const INCORRECT_FLASH: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Ending {
    /// Every command in the catalog was typed or skipped.
    Victory,
    /// The player quit from a prompt or interrupted the run.
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Intro,
    Awaiting,
    Paused,
    Correct,
    Incorrect,
    Timeout,
    GameOver(Ending),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Correct,
    Incorrect,
}

/// Result of scoring one correct entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Award {
    pub rank: Rank,
    pub points: u32,
    pub time_used: f64,
    pub time_limit: f64,
    pub new_high_score: bool,
}

/// The single mutable aggregate for a run.
///
/// Owned by the driver and lent to the loop; every transition takes the
/// current instant explicitly so the state never reads a clock itself.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub phase: Phase,
    pub catalog_len: usize,
    /// Next unused catalog position.
    pub command_index: usize,
    pub score: u64,
    pub level: u32,
    pub completed: u32,
    pub skipped: u32,
    pub high_score: u64,
    pub current_command: String,
    pub user_input: String,
    pub time_limit: f64,
    /// Unclamped; goes negative once the limit has passed.
    pub time_remaining: f64,
    /// Incorrect submissions against the current command.
    pub misses: u32,
    pub last_award: Option<Award>,
    start_time: Option<Instant>,
    paused_elapsed: Option<Duration>,
    flash_until: Option<Instant>,
}

impl SessionState {
    pub fn new(catalog_len: usize, high_score: u64) -> Self {
        Self {
            phase: Phase::Intro,
            catalog_len,
            command_index: 0,
            score: 0,
            level: 1,
            completed: 0,
            skipped: 0,
            high_score,
            current_command: String::new(),
            user_input: String::new(),
            time_limit: 0.0,
            time_remaining: 0.0,
            misses: 0,
            last_award: None,
            start_time: None,
            paused_elapsed: None,
            flash_until: None,
        }
    }

    /// Intro -> Awaiting with the first catalog entry.
    pub fn begin(&mut self, catalog: &CommandCatalog, now: Instant) -> bool {
        if self.phase != Phase::Intro {
            return false;
        }
        self.command_index = 0;
        self.load_next(catalog, now)
    }

    /// Draws the command at `command_index` and starts its timer.
    /// Returns false, leaving the state untouched, when the catalog is used up.
    pub fn load_next(&mut self, catalog: &CommandCatalog, now: Instant) -> bool {
        let Some(command) = catalog.get(self.command_index) else {
            return false;
        };
        self.current_command = command.to_owned();
        self.command_index += 1;
        self.misses = 0;
        self.restart_timer(now);
        debug!(
            index = self.command_index,
            command = %self.current_command,
            limit = self.time_limit,
            "loaded command"
        );
        true
    }

    /// Timeout -> Awaiting on the same command with a fresh timer.
    pub fn retry(&mut self, now: Instant) {
        debug!(command = %self.current_command, "retrying command");
        self.restart_timer(now);
    }

    /// Timeout -> Awaiting on the next command, or GameOver if none remain.
    /// A skipped command counts as completed but scores nothing.
    pub fn skip(&mut self, catalog: &CommandCatalog, now: Instant) -> bool {
        self.skipped += 1;
        self.completed += 1;
        self.level = scoring::level_for(self.completed);
        debug!(command = %self.current_command, skipped = self.skipped, "skipped command");
        self.advance(catalog, now)
    }

    /// Moves on after a scored command; finishes the run when nothing is left.
    pub fn advance(&mut self, catalog: &CommandCatalog, now: Instant) -> bool {
        if self.load_next(catalog, now) {
            true
        } else {
            self.finish();
            false
        }
    }

    pub fn finish(&mut self) {
        debug!(completed = self.completed, total = self.catalog_len, "catalog finished");
        self.phase = Phase::GameOver(Ending::Victory);
    }

    pub fn quit(&mut self) {
        self.phase = Phase::GameOver(Ending::Quit);
    }

    fn restart_timer(&mut self, now: Instant) {
        self.time_limit = scoring::time_limit(&self.current_command);
        self.time_remaining = self.time_limit;
        self.user_input.clear();
        self.start_time = Some(now);
        self.paused_elapsed = None;
        self.flash_until = None;
        self.phase = Phase::Awaiting;
    }

    /// Time spent on the current attempt, frozen while paused.
    pub fn elapsed(&self, now: Instant) -> Duration {
        match (self.paused_elapsed, self.start_time) {
            (Some(frozen), _) => frozen,
            (None, Some(start)) => now.saturating_duration_since(start),
            (None, None) => Duration::ZERO,
        }
    }

    pub fn time_used(&self, now: Instant) -> f64 {
        self.elapsed(now).as_secs_f64()
    }

    /// Recomputes `time_remaining` and ends an expired incorrect flash.
    pub fn refresh(&mut self, now: Instant) -> f64 {
        if self.start_time.is_some() {
            self.time_remaining = self.time_limit - self.time_used(now);
        }
        if self.phase == Phase::Incorrect && self.flash_until.is_some_and(|until| now >= until) {
            self.phase = Phase::Awaiting;
            self.flash_until = None;
        }
        self.time_remaining
    }

    pub fn is_expired(&self) -> bool {
        self.time_remaining <= 0.0
    }

    pub fn expire(&mut self) {
        debug!(command = %self.current_command, "command timed out");
        self.phase = Phase::Timeout;
        self.flash_until = None;
    }

    /// Typing is accepted while awaiting and during the incorrect flash.
    pub fn is_typing(&self) -> bool {
        matches!(self.phase, Phase::Awaiting | Phase::Incorrect)
    }

    pub fn is_over(&self) -> bool {
        matches!(self.phase, Phase::GameOver(_))
    }

    /// Appends printable ASCII; everything else is ignored.
    pub fn push_char(&mut self, c: char) -> bool {
        if !self.is_typing() || !is_printable(c) {
            return false;
        }
        self.clear_flash();
        self.user_input.push(c);
        true
    }

    /// No-op on an empty buffer.
    pub fn backspace(&mut self) -> bool {
        if !self.is_typing() {
            return false;
        }
        self.clear_flash();
        self.user_input.pop().is_some()
    }

    fn clear_flash(&mut self) {
        if self.phase == Phase::Incorrect {
            self.phase = Phase::Awaiting;
            self.flash_until = None;
        }
    }

    /// Exact byte comparison against the current command. A miss clears
    /// the buffer but keeps the timer running.
    pub fn submit(&mut self, now: Instant) -> Submission {
        if self.user_input == self.current_command {
            self.phase = Phase::Correct;
            self.flash_until = None;
            Submission::Correct
        } else {
            debug!(
                expected = %self.current_command,
                typed = %self.user_input,
                "incorrect submission"
            );
            self.user_input.clear();
            self.misses += 1;
            self.phase = Phase::Incorrect;
            self.flash_until = Some(now + INCORRECT_FLASH);
            Submission::Incorrect
        }
    }

    pub fn pause(&mut self, now: Instant) {
        if !self.is_typing() {
            return;
        }
        self.paused_elapsed = Some(self.elapsed(now));
        self.flash_until = None;
        self.phase = Phase::Paused;
        debug!(elapsed = ?self.paused_elapsed, "paused");
    }

    /// Re-anchors the start so the countdown continues where it stopped.
    pub fn resume(&mut self, now: Instant) {
        if self.phase != Phase::Paused {
            return;
        }
        if let Some(frozen) = self.paused_elapsed.take() {
            self.start_time = Some(now.checked_sub(frozen).unwrap_or(now));
        }
        self.phase = Phase::Awaiting;
        self.refresh(now);
        debug!(remaining = self.time_remaining, "resumed");
    }

    /// Scores a correct entry. Points are granted even if the limit passed
    /// between the last tick and the submission.
    pub fn award(&mut self, time_used: f64) -> Award {
        let rank = scoring::rank(time_used, self.time_limit);
        let points = rank.points();

        self.score += u64::from(points);
        self.completed += 1;
        self.level = scoring::level_for(self.completed);

        let new_high_score = self.score > self.high_score;
        if new_high_score {
            self.high_score = self.score;
        }

        let award = Award {
            rank,
            points,
            time_used,
            time_limit: self.time_limit,
            new_high_score,
        };
        self.last_award = Some(award);
        debug!(?rank, points, score = self.score, level = self.level, "awarded");
        award
    }

    /// Remaining share of the limit, clamped to `[0, 1]`.
    pub fn time_fraction(&self) -> f64 {
        if self.time_limit <= 0.0 {
            return 0.0;
        }
        (self.time_remaining / self.time_limit).clamp(0.0, 1.0)
    }
}

pub fn is_printable(c: char) -> bool {
    c == ' ' || c.is_ascii_graphic()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(commands: &[&str]) -> CommandCatalog {
        CommandCatalog::from_commands("test", commands.iter().map(|c| c.to_string()).collect())
            .unwrap()
    }

    fn started(commands: &[&str]) -> (SessionState, CommandCatalog, Instant) {
        let catalog = catalog(commands);
        let now = Instant::now();
        let mut state = SessionState::new(catalog.len(), 0);
        assert!(state.begin(&catalog, now));
        (state, catalog, now)
    }

    fn type_str(state: &mut SessionState, s: &str) {
        for c in s.chars() {
            state.push_char(c);
        }
    }

    #[test]
    fn test_new_state_is_intro() {
        let state = SessionState::new(3, 42);

        assert_eq!(state.phase, Phase::Intro);
        assert_eq!(state.level, 1);
        assert_eq!(state.score, 0);
        assert_eq!(state.high_score, 42);
        assert!(state.current_command.is_empty());
    }

    #[test]
    fn test_begin_loads_first_command() {
        let (state, _, _) = started(&["ls -la", "df -h"]);

        assert_eq!(state.phase, Phase::Awaiting);
        assert_eq!(state.current_command, "ls -la");
        assert_eq!(state.command_index, 1);
        assert_eq!(state.time_limit, 5.0);
        assert_eq!(state.time_remaining, 5.0);
    }

    #[test]
    fn test_begin_only_from_intro() {
        let (mut state, catalog, now) = started(&["ls", "df"]);
        assert!(!state.begin(&catalog, now));
        assert_eq!(state.command_index, 1);
    }

    #[test]
    fn test_push_char_ignores_control_characters() {
        let (mut state, _, _) = started(&["ls"]);

        assert!(state.push_char('l'));
        assert!(!state.push_char('\u{7}'));
        assert!(!state.push_char('\t'));
        assert!(!state.push_char('é'));
        assert!(state.push_char(' '));
        assert_eq!(state.user_input, "l ");
    }

    #[test]
    fn test_backspace_on_empty_is_noop() {
        let (mut state, _, _) = started(&["ls"]);

        assert!(!state.backspace());
        assert_eq!(state.user_input, "");

        state.push_char('x');
        assert!(state.backspace());
        assert!(!state.backspace());
    }

    #[test]
    fn test_correct_submission() {
        let (mut state, _, now) = started(&["ls -la"]);
        type_str(&mut state, "ls -la");

        assert_eq!(state.submit(now), Submission::Correct);
        assert_eq!(state.phase, Phase::Correct);
    }

    #[test]
    fn test_incorrect_submission_clears_input_keeps_timer() {
        let (mut state, _, start) = started(&["ls -la"]);
        type_str(&mut state, "ls -al");

        let later = start + Duration::from_secs(2);
        assert_eq!(state.submit(later), Submission::Incorrect);
        assert_eq!(state.phase, Phase::Incorrect);
        assert_eq!(state.user_input, "");
        assert_eq!(state.misses, 1);
        assert_eq!(state.current_command, "ls -la");

        let remaining = state.refresh(later + INCORRECT_FLASH);
        assert!((remaining - (5.0 - 2.3)).abs() < 1e-6);
        assert_eq!(state.phase, Phase::Awaiting);
    }

    #[test]
    fn test_overlong_input_is_incorrect() {
        let (mut state, _, now) = started(&["ls"]);
        type_str(&mut state, "ls -la");
        assert_eq!(state.submit(now), Submission::Incorrect);
    }

    #[test]
    fn test_typing_during_flash_returns_to_awaiting() {
        let (mut state, _, now) = started(&["ls"]);
        state.submit(now);
        assert_eq!(state.phase, Phase::Incorrect);

        state.push_char('l');
        assert_eq!(state.phase, Phase::Awaiting);
        assert_eq!(state.user_input, "l");
    }

    #[test]
    fn test_refresh_and_expiry() {
        let (mut state, _, start) = started(&["ls"]);

        state.refresh(start + Duration::from_millis(4_900));
        assert!(!state.is_expired());

        let remaining = state.refresh(start + Duration::from_millis(5_250));
        assert!(state.is_expired());
        assert!(remaining < 0.0, "remaining is reported unclamped");
        assert_eq!(state.time_fraction(), 0.0);

        state.expire();
        assert_eq!(state.phase, Phase::Timeout);
    }

    #[test]
    fn test_retry_keeps_command_and_index() {
        let (mut state, _, start) = started(&["ls", "df"]);
        type_str(&mut state, "l");
        state.refresh(start + Duration::from_secs(6));
        state.expire();

        let again = start + Duration::from_secs(10);
        state.retry(again);

        assert_eq!(state.phase, Phase::Awaiting);
        assert_eq!(state.current_command, "ls");
        assert_eq!(state.command_index, 1);
        assert_eq!(state.user_input, "");
        assert_eq!(state.refresh(again), 5.0);
    }

    #[test]
    fn test_skip_completes_without_scoring() {
        let (mut state, catalog, start) = started(&["ls", "df"]);
        state.expire();

        assert!(state.skip(&catalog, start));
        assert_eq!(state.current_command, "df");
        assert_eq!(state.command_index, 2);
        assert_eq!(state.skipped, 1);
        assert_eq!(state.completed, 1);
        assert_eq!(state.score, 0);
        assert!(state.last_award.is_none());

        state.expire();
        assert!(!state.skip(&catalog, start));
        assert_eq!(state.completed as usize, state.catalog_len);
        assert_eq!(state.phase, Phase::GameOver(Ending::Victory));
    }

    #[test]
    fn test_skips_count_towards_level() {
        let commands: Vec<String> = (0..11).map(|i| format!("cmd{i}")).collect();
        let catalog = CommandCatalog::from_commands("test", commands).unwrap();
        let start = Instant::now();
        let mut state = SessionState::new(catalog.len(), 0);
        assert!(state.begin(&catalog, start));

        for _ in 0..10 {
            state.expire();
            assert!(state.skip(&catalog, start));
        }
        assert_eq!(state.completed, 10);
        assert_eq!(state.level, 2);
        assert_eq!(state.score, 0);
    }

    #[test]
    fn test_pause_freezes_and_resume_continues() {
        let (mut state, _, start) = started(&["a"]);
        let paused_at = start + Duration::from_secs(1);
        state.refresh(paused_at);
        state.pause(paused_at);
        assert_eq!(state.phase, Phase::Paused);

        let much_later = paused_at + Duration::from_secs(120);
        assert!((state.refresh(much_later) - 4.0).abs() < 1e-9);

        state.resume(much_later);
        assert_eq!(state.phase, Phase::Awaiting);
        assert!((state.time_remaining - 4.0).abs() < 1e-9);

        let after = much_later + Duration::from_millis(500);
        assert!((state.refresh(after) - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_pause_ignored_outside_typing() {
        let mut state = SessionState::new(1, 0);
        state.pause(Instant::now());
        assert_eq!(state.phase, Phase::Intro);
        state.resume(Instant::now());
        assert_eq!(state.phase, Phase::Intro);
    }

    #[test]
    fn test_input_ignored_while_paused() {
        let (mut state, _, now) = started(&["ls"]);
        state.pause(now);
        assert!(!state.push_char('l'));
        assert!(!state.backspace());
        assert_eq!(state.user_input, "");
    }

    #[test]
    fn test_award_updates_score_level_and_high_score() {
        let (mut state, _, _) = started(&["ls -la"]);
        state.high_score = 50;

        let award = state.award(1.0);
        assert_eq!(award.rank, Rank::S);
        assert_eq!(award.points, 100);
        assert!(award.new_high_score);
        assert_eq!(state.score, 100);
        assert_eq!(state.completed, 1);
        assert_eq!(state.high_score, 100);
        assert_eq!(state.last_award, Some(award));
    }

    #[test]
    fn test_award_granted_even_past_limit() {
        let (mut state, _, _) = started(&["ls"]);
        let award = state.award(5.4);
        assert_eq!(award.rank, Rank::D);
        assert_eq!(state.score, 10);
    }

    #[test]
    fn test_high_score_never_decreases() {
        let (mut state, _, _) = started(&["ls"]);
        state.high_score = 1_000;
        let award = state.award(1.0);
        assert!(!award.new_high_score);
        assert_eq!(state.high_score, 1_000);
    }

    #[test]
    fn test_level_increments_every_ten() {
        let commands: Vec<String> = (0..25).map(|i| format!("cmd{i}")).collect();
        let refs: Vec<&str> = commands.iter().map(String::as_str).collect();
        let (mut state, _, _) = started(&refs);

        for expected_completed in 1..=20u32 {
            state.award(1.0);
            assert_eq!(state.completed, expected_completed);
            let expected_level = match expected_completed {
                0..=9 => 1,
                10..=19 => 2,
                _ => 3,
            };
            assert_eq!(state.level, expected_level);
        }
    }

    #[test]
    fn test_finish_with_all_completed_is_victory() {
        let (mut state, catalog, now) = started(&["ls"]);
        state.award(1.0);
        assert!(!state.advance(&catalog, now));
        assert_eq!(state.phase, Phase::GameOver(Ending::Victory));
    }

    #[test]
    fn test_quit() {
        let (mut state, _, _) = started(&["ls"]);
        state.quit();
        assert!(state.is_over());
        assert_eq!(state.phase, Phase::GameOver(Ending::Quit));
    }
}
