use itertools::{EitherOrBoth, Itertools};
use ratatui::{
    backend::Backend,
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget},
    Terminal,
};
use unicode_width::UnicodeWidthStr;

use crate::error::{ArchtypeError, Result};
use crate::scoring::Rank;
use crate::session::{Award, Ending, Phase, SessionState};

const MAX_BAR_WIDTH: u16 = 60;
const BAR_MARGIN: u16 = 20;

const PAUSE_TITLE: &str = "PAUSED";
const PAUSE_HINT: &str = "Press Esc to resume";

/// Draws one frame of the session. The loop never touches the terminal
/// directly, so tests can swap in a recording presenter.
pub trait Presenter {
    fn render(&mut self, state: &SessionState) -> Result<()>;
}

pub struct TerminalPresenter<B: Backend> {
    terminal: Terminal<B>,
}

impl<B: Backend> TerminalPresenter<B> {
    pub fn new(terminal: Terminal<B>) -> Self {
        Self { terminal }
    }
}

impl<B: Backend> Presenter for TerminalPresenter<B> {
    fn render(&mut self, state: &SessionState) -> Result<()> {
        self.terminal
            .draw(|f| f.render_widget(state, f.area()))
            .map(|_| ())
            .map_err(ArchtypeError::RenderFailure)
    }
}

impl Widget for &SessionState {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.phase {
            Phase::Intro => render_intro(self, area, buf),
            Phase::Awaiting | Phase::Incorrect => render_typing(self, area, buf),
            Phase::Paused => {
                render_typing(self, area, buf);
                render_pause_overlay(area, buf);
            }
            Phase::Correct => match self.last_award {
                Some(award) => render_rank(self, &award, area, buf),
                None => render_typing(self, area, buf),
            },
            Phase::Timeout => render_timeout(self, area, buf),
            Phase::GameOver(ending) => render_game_over(self, ending, area, buf),
        }
    }
}

pub fn rank_color(rank: Rank) -> Color {
    match rank {
        Rank::S => Color::Magenta,
        Rank::A => Color::Cyan,
        Rank::B => Color::Green,
        Rank::C => Color::Yellow,
        Rank::D => Color::Red,
    }
}

/// Green above half the limit, yellow down to 30%, red below.
pub fn timer_color(fraction: f64) -> Color {
    if fraction < 0.3 {
        Color::Red
    } else if fraction < 0.5 {
        Color::Yellow
    } else {
        Color::Green
    }
}

pub fn timer_bar(fraction: f64, width: usize) -> String {
    let filled = ((fraction.clamp(0.0, 1.0) * width as f64).floor() as usize).min(width);
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

/// Colours each typed character against the command it should match.
/// Characters past the end of the command are always wrong.
pub fn diff_spans(expected: &str, typed: &str) -> Vec<Span<'static>> {
    let good = Style::default().fg(Color::Green).add_modifier(Modifier::BOLD);
    let bad = Style::default().fg(Color::Red).add_modifier(Modifier::BOLD);

    expected
        .chars()
        .zip_longest(typed.chars())
        .filter_map(|pair| match pair {
            EitherOrBoth::Both(e, t) if e == t => Some(Span::styled(t.to_string(), good)),
            EitherOrBoth::Both(_, ' ') | EitherOrBoth::Right(' ') => {
                Some(Span::styled("·".to_owned(), bad))
            }
            EitherOrBoth::Both(_, t) | EitherOrBoth::Right(t) => {
                Some(Span::styled(t.to_string(), bad))
            }
            EitherOrBoth::Left(_) => None,
        })
        .collect()
}

fn bold(color: Color) -> Style {
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

fn hint(text: impl Into<String>) -> Line<'static> {
    Line::from(Span::styled(text.into(), Style::default().fg(Color::Gray)))
}

fn title() -> Line<'static> {
    Line::from(Span::styled("ARCHTYPE", bold(Color::Cyan)))
}

/// Stacks `lines` in the middle of `area`, each centred horizontally.
fn render_centered(lines: Vec<Line<'static>>, area: Rect, buf: &mut Buffer) {
    let height = u16::try_from(lines.len()).unwrap_or(u16::MAX).min(area.height);
    let top = area.y + (area.height - height) / 2;
    let target = Rect::new(area.x, top, area.width, height);
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(target, buf);
}

fn render_intro(state: &SessionState, area: Rect, buf: &mut Buffer) {
    let frame = bold(Color::Blue);
    let body = Style::default().fg(Color::White);
    let lines = vec![
        Line::from(Span::styled("╔═══════════════════════════════════════╗", frame)),
        Line::from(vec![
            Span::styled("║", frame),
            Span::styled("               ARCHTYPE                ", bold(Color::Cyan)),
            Span::styled("║", frame),
        ]),
        Line::from(Span::styled("╚═══════════════════════════════════════╝", frame)),
        Line::default(),
        Line::from(Span::styled("Type shell commands as fast as you can", body)),
        Line::from(Span::styled("Each command has a time limit based on its length", body)),
        Line::from(Span::styled("Get ranked: S, A, B, C, or D", body)),
        Line::from(Span::styled(format!("{} commands to master", state.catalog_len), body)),
        Line::default(),
        hint("Press Esc to pause."),
        hint("Press Ctrl+C to quit."),
        Line::default(),
        Line::from(Span::styled("Press ENTER to start...", bold(Color::White))),
    ];
    render_centered(lines, area, buf);
}

fn stats_line(state: &SessionState) -> String {
    format!(
        "Level {}  |  Score: {}  |  High Score: {}  |  Completed: {}/{}",
        state.level, state.score, state.high_score, state.completed, state.catalog_len
    )
}

fn render_typing(state: &SessionState, area: Rect, buf: &mut Buffer) {
    let fraction = state.time_fraction();
    let timer_style = Style::default().fg(timer_color(fraction));
    let bar_width = MAX_BAR_WIDTH.min(area.width.saturating_sub(BAR_MARGIN));

    let mut input = vec![Span::styled("> ", Style::default().fg(Color::White))];
    input.extend(diff_spans(&state.current_command, &state.user_input));
    input.push(Span::styled(
        "_",
        Style::default().add_modifier(Modifier::SLOW_BLINK),
    ));

    let footer = if state.phase == Phase::Incorrect {
        Line::from(Span::styled("Incorrect! Try again.", bold(Color::Red)))
    } else {
        hint("Enter to submit  |  Esc to pause  |  Ctrl+C to quit")
    };

    let lines = vec![
        title(),
        Line::default(),
        hint(stats_line(state)),
        Line::default(),
        Line::from(Span::styled("Type this command:", bold(Color::White))),
        Line::default(),
        Line::from(Span::styled(
            format!(" {} ", state.current_command),
            Style::default()
                .fg(Color::White)
                .bg(Color::Blue)
                .add_modifier(Modifier::BOLD),
        )),
        Line::default(),
        Line::from(input),
        Line::default(),
        Line::from(Span::styled(
            format!(
                "Time: {:.1}s / {:.1}s",
                state.time_remaining.max(0.0),
                state.time_limit
            ),
            timer_style,
        )),
        Line::from(Span::styled(
            timer_bar(fraction, bar_width as usize),
            timer_style,
        )),
        Line::default(),
        footer,
    ];
    render_centered(lines, area, buf);
}

fn render_pause_overlay(area: Rect, buf: &mut Buffer) {
    let inner_width = PAUSE_TITLE.width().max(PAUSE_HINT.width()) as u16;
    let width = (inner_width + 4).min(area.width);
    let height = 4.min(area.height);
    let popup = Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    );

    Clear.render(popup, buf);
    Paragraph::new(vec![
        Line::from(Span::styled(PAUSE_TITLE, bold(Color::Yellow))),
        hint(PAUSE_HINT),
    ])
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL))
    .render(popup, buf);
}

fn render_timeout(state: &SessionState, area: Rect, buf: &mut Buffer) {
    let lines = vec![
        Line::from(Span::styled("TIME'S UP!", bold(Color::Red))),
        Line::default(),
        Line::from(Span::styled(
            state.current_command.clone(),
            Style::default().fg(Color::White),
        )),
        Line::default(),
        hint("Press 'r' to retry, 'q' to quit, or any other key to skip."),
    ];
    render_centered(lines, area, buf);
}

fn render_rank(state: &SessionState, award: &Award, area: Rect, buf: &mut Buffer) {
    let mut lines = vec![
        Line::from(Span::styled(
            format!("{} RANK - {}", award.rank, award.rank.message()),
            bold(rank_color(award.rank)),
        )),
        Line::default(),
        Line::from(Span::styled(
            format!("Time: {:.2}s / {:.2}s", award.time_used, award.time_limit),
            Style::default().fg(Color::White),
        )),
        Line::from(Span::styled(
            format!("+{} points", award.points),
            bold(Color::Yellow),
        )),
        hint(stats_line(state)),
    ];
    if award.new_high_score {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled("NEW HIGH SCORE!", bold(Color::Magenta))));
    }
    lines.push(Line::default());
    lines.push(hint("Press 'q' to quit or any other key to continue."));
    render_centered(lines, area, buf);
}

fn render_game_over(state: &SessionState, ending: Ending, area: Rect, buf: &mut Buffer) {
    let headline = bold(Color::Green);
    let mut lines = match ending {
        Ending::Victory => vec![
            Line::from(Span::styled("CONGRATULATIONS!", headline)),
            Line::from(Span::styled("You completed all commands!", headline)),
            Line::default(),
            Line::from(format!("Final Score: {}", state.score)),
        ],
        Ending::Quit => vec![
            Line::from(Span::styled("GAME OVER", bold(Color::Red))),
            Line::default(),
            Line::from(format!("Your Score: {}", state.score)),
        ],
    };
    if state.skipped > 0 {
        lines.push(Line::from(format!(
            "Skipped {} of {}",
            state.skipped, state.catalog_len
        )));
    }
    lines.push(Line::from(format!("High Score: {}", state.high_score)));
    lines.push(Line::default());
    lines.push(hint("Press any key to exit..."));
    render_centered(lines, area, buf);
}
