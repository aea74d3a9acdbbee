use anyhow::Result;
use async_trait::async_trait;

use super::models::GameRecord;

/// A source of completed NBA games.
///
/// Implementations fetch one season at a time and return only games with a
/// final score; in-progress and scheduled games are dropped at the provider
/// boundary so the store never sees partial box scores.
#[async_trait]
pub trait GameProvider: Send + Sync {
    /// Human-readable provider name for logging
    fn name(&self) -> &str;

    /// Fetch every completed game of the given season (start year).
    async fn fetch_season(&self, season: i32) -> Result<Vec<GameRecord>>;
}
