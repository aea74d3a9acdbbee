use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};

use crate::calibrate::Objective;
use crate::rating::Mode;

/// NBA point-spread and game-total rating model with hyperparameter calibration
#[derive(Parser, Debug, Clone)]
#[command(name = "nba-melo", version, about)]
pub struct Config {
    /// SQLite path for the game store
    #[arg(long, env = "NBA_MELO_DB", default_value = "nba-games.db")]
    pub database_path: String,

    /// Flat-text cache of calibrated hyperparameters
    #[arg(long, env = "NBA_MELO_CACHE", default_value = "model-params.txt")]
    pub cache_path: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Fetch one season of final scores into the game store
    Ingest {
        /// Season start year (the 2023-24 season is 2023)
        #[arg(long, env = "NBA_SEASON")]
        season: i32,

        /// balldontlie API key (free tier works without one)
        #[arg(long, env = "BALLDONTLIE_API_KEY")]
        api_key: Option<String>,
    },

    /// Search the hyperparameter box and write the winners to the cache
    Calibrate {
        #[arg(long, value_enum, default_value = "both")]
        mode: ModeSelect,

        /// Restrict the fit to one season (default: every stored game)
        #[arg(long)]
        season: Option<i32>,

        /// Latin-hypercube design points
        #[arg(long, default_value_t = 50)]
        points: usize,

        /// Refinement evaluations after the design stage
        #[arg(long, default_value_t = 25)]
        refine: usize,

        #[arg(long, value_enum, default_value = "std")]
        objective: Objective,

        /// RNG seed for reproducible searches
        #[arg(long, default_value_t = 1720)]
        seed: u64,
    },

    /// Print team rankings from cached parameters
    Rank {
        #[arg(long, value_enum, default_value = "fermi")]
        mode: ModeSelect,

        /// Ranking date (defaults to the day after the last stored game)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Forecast one matchup's spread and total from cached parameters
    Predict {
        /// Home team abbreviation
        #[arg(long)]
        home: String,

        /// Away team abbreviation
        #[arg(long)]
        away: String,

        /// Game date (defaults to the day after the last stored game)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

/// Which rating mode(s) a command applies to.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeSelect {
    /// Point spreads
    #[value(alias = "minus", alias = "spread")]
    Fermi,
    /// Game totals
    #[value(alias = "plus", alias = "total")]
    Bose,
    Both,
}

impl ModeSelect {
    pub fn modes(self) -> Vec<Mode> {
        match self {
            ModeSelect::Fermi => vec![Mode::Fermi],
            ModeSelect::Bose => vec![Mode::Bose],
            ModeSelect::Both => vec![Mode::Fermi, Mode::Bose],
        }
    }
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        match &self.command {
            Command::Ingest { season, .. } => {
                if !(1946..=2100).contains(season) {
                    anyhow::bail!("season {} is not a plausible NBA season start year", season);
                }
            }
            Command::Calibrate { points, .. } => {
                if *points == 0 {
                    anyhow::bail!("--points must be at least 1");
                }
            }
            Command::Rank { mode, .. } => {
                if *mode == ModeSelect::Both {
                    anyhow::bail!("rank needs a single mode: --mode fermi or --mode bose");
                }
            }
            Command::Predict { home, away, .. } => {
                if home.eq_ignore_ascii_case(away) {
                    anyhow::bail!("home and away must be different teams");
                }
            }
        }
        Ok(())
    }
}
