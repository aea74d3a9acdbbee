use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::rating::{Comparison, Mode};

/// A completed NBA game as stored locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    /// External game id from the data provider.
    pub game_id: String,
    pub date: NaiveDate,
    /// Season start year (the 2023-24 season is 2023).
    pub season: i32,
    pub home_team: String,
    pub away_team: String,
    pub home_points: i32,
    pub away_points: i32,
    pub postseason: bool,
}

impl GameRecord {
    /// Home margin of victory (negative when the road team won).
    pub fn spread(&self) -> f64 {
        (self.home_points - self.away_points) as f64
    }

    /// Combined score.
    pub fn total(&self) -> f64 {
        (self.home_points + self.away_points) as f64
    }

    fn value(&self, mode: Mode) -> f64 {
        match mode {
            Mode::Fermi => self.spread(),
            Mode::Bose => self.total(),
        }
    }
}

/// Reshape game records into the rating model's input: one dated
/// home-vs-away comparison per game, valued by spread or total.
pub fn comparisons(games: &[GameRecord], mode: Mode) -> Vec<Comparison> {
    games
        .iter()
        .map(|g| Comparison {
            date: g.date,
            label1: g.home_team.clone(),
            label2: g.away_team.clone(),
            value: g.value(mode),
        })
        .collect()
}
