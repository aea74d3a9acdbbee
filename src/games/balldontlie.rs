use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::models::GameRecord;
use super::provider::GameProvider;

/// Game provider backed by the balldontlie NBA API.
/// Docs: <https://www.balldontlie.io>
pub struct BallDontLie {
    http: Client,
    /// API key sent as the Authorization header; the free tier works without
    /// one at a reduced rate limit.
    api_key: Option<String>,
    /// Base URL for overriding in tests
    base_url: String,
}

/// Page size for the games endpoint (the API maximum).
const PER_PAGE: u32 = 100;
/// Hard stop on pagination; a full NBA season is ~14 pages.
const MAX_PAGES: u32 = 100;

impl BallDontLie {
    pub fn new(api_key: Option<&str>, base_url: Option<&str>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(BallDontLie {
            http,
            api_key: api_key.map(str::to_string),
            base_url: base_url
                .unwrap_or("https://api.balldontlie.io/v1")
                .to_string(),
        })
    }
}

#[async_trait]
impl GameProvider for BallDontLie {
    fn name(&self) -> &str {
        "balldontlie"
    }

    async fn fetch_season(&self, season: i32) -> Result<Vec<GameRecord>> {
        let mut games = Vec::new();
        let mut cursor: Option<i64> = None;

        for page in 0..MAX_PAGES {
            let mut url = format!(
                "{}/games?seasons[]={}&per_page={}",
                self.base_url, season, PER_PAGE
            );
            if let Some(c) = cursor {
                url.push_str(&format!("&cursor={}", c));
            }
            debug!("Fetching games page {} from {}", page, url);

            let mut req = self.http.get(&url);
            if let Some(key) = &self.api_key {
                req = req.header("Authorization", key);
            }
            let resp = req.send().await.context("balldontlie request failed")?;
            if !resp.status().is_success() {
                anyhow::bail!("balldontlie error: {}", resp.status());
            }
            let body: GamesPage = resp
                .json()
                .await
                .context("Failed to parse balldontlie response")?;

            for api_game in &body.data {
                if let Some(record) = api_game.to_record() {
                    games.push(record);
                }
            }

            cursor = body.meta.next_cursor;
            if cursor.is_none() {
                break;
            }
        }

        debug!("Fetched {} completed games for season {}", games.len(), season);
        Ok(games)
    }
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GamesPage {
    data: Vec<ApiGame>,
    #[serde(default)]
    meta: PageMeta,
}

#[derive(Debug, Default, Deserialize)]
struct PageMeta {
    next_cursor: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ApiGame {
    id: i64,
    date: String,
    season: i32,
    status: String,
    #[serde(default)]
    postseason: bool,
    home_team: ApiTeam,
    visitor_team: ApiTeam,
    home_team_score: i32,
    visitor_team_score: i32,
}

#[derive(Debug, Deserialize)]
struct ApiTeam {
    abbreviation: String,
}

impl ApiGame {
    /// Convert to a stored record, dropping anything that isn't a completed
    /// game with a plausible box score.
    fn to_record(&self) -> Option<GameRecord> {
        if self.status != "Final" {
            return None;
        }
        if self.home_team_score <= 0 || self.visitor_team_score <= 0 {
            return None;
        }
        // Dates arrive as "2023-10-24" or ISO datetimes; the day prefix is
        // all we keep.
        let day = self.date.get(..10)?;
        let date = NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()?;
        Some(GameRecord {
            game_id: format!("bdl-{}", self.id),
            date,
            season: self.season,
            home_team: self.home_team.abbreviation.clone(),
            away_team: self.visitor_team.abbreviation.clone(),
            home_points: self.home_team_score,
            away_points: self.visitor_team_score,
            postseason: self.postseason,
        })
    }
}
