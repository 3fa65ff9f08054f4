//! Time limits, letter ranks and points.
//!
//! Everything here is a pure function of the command text or of the
//! measured time, so the session state machine can stay free of policy.

/// Seconds granted regardless of length.
pub const BASE_SECS: f64 = 3.0;
/// Extra seconds granted per character of the command.
pub const SECS_PER_CHAR: f64 = 0.15;
/// No command is ever given less than this.
pub const MIN_TIME_LIMIT_SECS: f64 = 5.0;

/// Completions needed to advance one level.
pub const COMPLETIONS_PER_LEVEL: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum Rank {
    S,
    A,
    B,
    C,
    D,
}

/// One row of the rank table: any percentage up to and including
/// `upper_pct` lands in `rank`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankBand {
    pub upper_pct: f64,
    pub rank: Rank,
    pub points: u32,
    pub message: &'static str,
}

/// Ordered by `upper_pct`; the last band catches everything.
pub const RANK_BANDS: [RankBand; 5] = [
    RankBand {
        upper_pct: 30.0,
        rank: Rank::S,
        points: 100,
        message: "LEGENDARY!",
    },
    RankBand {
        upper_pct: 50.0,
        rank: Rank::A,
        points: 75,
        message: "AMAZING!",
    },
    RankBand {
        upper_pct: 70.0,
        rank: Rank::B,
        points: 50,
        message: "GOOD!",
    },
    RankBand {
        upper_pct: 90.0,
        rank: Rank::C,
        points: 25,
        message: "DECENT!",
    },
    RankBand {
        upper_pct: f64::INFINITY,
        rank: Rank::D,
        points: 10,
        message: "TOO SLOW!",
    },
];

impl Rank {
    fn band(self) -> &'static RankBand {
        match self {
            Rank::S => &RANK_BANDS[0],
            Rank::A => &RANK_BANDS[1],
            Rank::B => &RANK_BANDS[2],
            Rank::C => &RANK_BANDS[3],
            Rank::D => &RANK_BANDS[4],
        }
    }

    pub fn points(self) -> u32 {
        self.band().points
    }

    pub fn message(self) -> &'static str {
        self.band().message
    }
}

/// `max(5.0, 3.0 + 0.15 * chars)` seconds.
pub fn time_limit(command: &str) -> f64 {
    let chars = command.chars().count() as f64;
    (BASE_SECS + SECS_PER_CHAR * chars).max(MIN_TIME_LIMIT_SECS)
}

/// Share of the limit used, in percent.
pub fn percent_used(time_used: f64, time_limit: f64) -> f64 {
    time_used * 100.0 / time_limit
}

/// Band for a percentage; thresholds are inclusive upper bounds.
/// NaN falls through to the last band.
pub fn band_for_percent(pct: f64) -> &'static RankBand {
    RANK_BANDS
        .iter()
        .find(|band| pct <= band.upper_pct)
        .unwrap_or(&RANK_BANDS[RANK_BANDS.len() - 1])
}

pub fn rank(time_used: f64, time_limit: f64) -> Rank {
    band_for_percent(percent_used(time_used, time_limit)).rank
}

/// Level reached after `completed` correct entries, starting at 1.
pub fn level_for(completed: u32) -> u32 {
    completed / COMPLETIONS_PER_LEVEL + 1
}
