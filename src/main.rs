use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use clap::Parser;
use std::path::Path;
use tracing::{info, warn};

mod calibrate;
mod config;
mod games;
mod rating;

use calibrate::cache::ParamCache;
use calibrate::CalibrationOptions;
use config::{Command, Config, ModeSelect};
use games::models::{self, GameRecord};
use games::{BallDontLie, GameProvider, GameStore};
use rating::{Melo, Mode};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let store = GameStore::open(&config.database_path)?;
    info!("Game store opened: {}", config.database_path);

    match config.command.clone() {
        Command::Ingest { season, api_key } => {
            run_ingest(&store, season, api_key.as_deref()).await?;
        }
        Command::Calibrate {
            mode,
            season,
            points,
            refine,
            objective,
            seed,
        } => {
            let opts = CalibrationOptions {
                objective,
                design_points: points,
                refine_points: refine,
                seed,
            };
            run_calibrate(&store, Path::new(&config.cache_path), mode, season, &opts)?;
        }
        Command::Rank { mode, date } => {
            run_rank(&store, Path::new(&config.cache_path), mode, date)?;
        }
        Command::Predict { home, away, date } => {
            run_predict(&store, Path::new(&config.cache_path), &home, &away, date)?;
        }
    }

    Ok(())
}

async fn run_ingest(store: &GameStore, season: i32, api_key: Option<&str>) -> Result<()> {
    let provider = BallDontLie::new(api_key, None)?;
    info!("Fetching season {} from {}", season, provider.name());

    let games = provider
        .fetch_season(season)
        .await
        .with_context(|| format!("failed to fetch season {}", season))?;

    let mut stored = 0usize;
    for game in &games {
        match store.upsert_game(game) {
            Ok(()) => stored += 1,
            Err(e) => warn!("Failed to store game {}: {}", game.game_id, e),
        }
    }
    info!(
        "Ingested {} of {} games for season {} ({} total in store)",
        stored,
        games.len(),
        season,
        store.count_games()?
    );
    Ok(())
}

fn run_calibrate(
    store: &GameStore,
    cache_path: &Path,
    mode: ModeSelect,
    season: Option<i32>,
    opts: &CalibrationOptions,
) -> Result<()> {
    let games = match season {
        Some(year) => {
            let games = store.list_season(year)?;
            if games.is_empty() {
                anyhow::bail!(
                    "no stored games for season {}; run `nba-melo ingest --season {}` first",
                    year,
                    year
                );
            }
            games
        }
        None => loaded_games(store)?,
    };
    let mut cache = ParamCache::load_or_default(cache_path)?;

    for mode in mode.modes() {
        let comparisons = models::comparisons(&games, mode);
        let outcome = calibrate::calibrate_mode(&comparisons, mode, opts)?;
        let p = outcome.params;
        info!(
            "mode={}: k={:.2}, bias={:.2}, regress={:.2}, smooth={:.2}",
            mode.label(),
            p.k,
            p.bias,
            p.regress,
            p.smooth
        );
        info!(
            "mode={}: std dev={:.2}, mae={:.2} ({} evaluations)",
            mode.label(),
            outcome.metrics.std_dev,
            outcome.metrics.mean_abs_err,
            outcome.evaluations
        );
        cache.set_mode(mode, p);
    }

    cache.store(cache_path)?;
    info!("Cached calibrated parameters to {}", cache_path.display());
    Ok(())
}

fn run_rank(
    store: &GameStore,
    cache_path: &Path,
    mode: ModeSelect,
    date: Option<NaiveDate>,
) -> Result<()> {
    let games = loaded_games(store)?;
    let cache = ParamCache::load_or_default(cache_path)?;
    // validate() already rejected Both for rank.
    let mode = mode.modes()[0];
    let at = date.unwrap_or_else(|| day_after_last(&games));

    let model = fitted_model(&games, mode, &cache);
    let what = match mode {
        Mode::Fermi => "margin",
        Mode::Bose => "total",
    };
    println!("Expected {} vs average opponent, {}", what, at);
    for (i, (team, mean)) in model.rank(at).iter().enumerate() {
        println!("{:>3}. {:<4} {:+7.2}", i + 1, team, mean);
    }
    Ok(())
}

fn run_predict(
    store: &GameStore,
    cache_path: &Path,
    home: &str,
    away: &str,
    date: Option<NaiveDate>,
) -> Result<()> {
    let games = loaded_games(store)?;
    let cache = ParamCache::load_or_default(cache_path)?;
    let at = date.unwrap_or_else(|| day_after_last(&games));

    let spreads = fitted_model(&games, Mode::Fermi, &cache);
    let totals = fitted_model(&games, Mode::Bose, &cache);
    let spread = spreads.forecast(at, home, away);
    let total = totals.forecast(at, home, away);

    println!("{} vs {}, {}", home, away, at);
    println!(
        "  spread: mean {:+.1}, median {:+.1}",
        spread.mean, spread.median
    );
    println!("  total:  mean {:.1}, median {:.1}", total.mean, total.median);
    println!(
        "  home win probability: {:.1}%",
        100.0 * spread.prob_above(0.0)
    );
    Ok(())
}

fn loaded_games(store: &GameStore) -> Result<Vec<GameRecord>> {
    let games = store.list_games()?;
    if games.is_empty() {
        anyhow::bail!("game store is empty; run `nba-melo ingest --season <year>` first");
    }
    Ok(games)
}

/// Fit a model for one mode using that mode's cached hyperparameters.
fn fitted_model(games: &[GameRecord], mode: Mode, cache: &ParamCache) -> Melo {
    let comparisons = models::comparisons(games, mode);
    let mut model = Melo::new(mode, cache.for_mode(mode));
    model.fit(&comparisons);
    model
}

/// Games are listed chronologically, so the last record carries the latest date.
fn day_after_last(games: &[GameRecord]) -> NaiveDate {
    games
        .last()
        .map(|g| g.date + Duration::days(1))
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default())
}
