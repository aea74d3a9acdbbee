use anyhow::Result;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

pub mod balldontlie;
pub mod models;
pub mod provider;

pub use balldontlie::BallDontLie;
pub use models::GameRecord;
pub use provider::GameProvider;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS games (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    game_id     TEXT NOT NULL UNIQUE,
    date        TEXT NOT NULL,
    season      INTEGER NOT NULL,
    home_team   TEXT NOT NULL,
    away_team   TEXT NOT NULL,
    home_points INTEGER NOT NULL,
    away_points INTEGER NOT NULL,
    postseason  INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_games_date ON games(date);
CREATE INDEX IF NOT EXISTS idx_games_season ON games(season);
";

/// Thread-safe SQLite game store (single connection with mutex)
#[derive(Clone)]
pub struct GameStore {
    conn: Arc<Mutex<Connection>>,
}

impl GameStore {
    /// Open (or create) the store at the given path
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let store = GameStore {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.run_migrations()?;
        Ok(store)
    }

    /// In-memory store for tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = GameStore {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.run_migrations()?;
        Ok(store)
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    /// Insert a game, replacing any existing row with the same external id.
    /// Re-ingesting a season is therefore idempotent.
    pub fn upsert_game(&self, game: &GameRecord) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO games (
                game_id, date, season, home_team, away_team,
                home_points, away_points, postseason
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)
             ON CONFLICT(game_id) DO UPDATE SET
                date=excluded.date, season=excluded.season,
                home_team=excluded.home_team, away_team=excluded.away_team,
                home_points=excluded.home_points, away_points=excluded.away_points,
                postseason=excluded.postseason",
            params![
                game.game_id,
                game.date,
                game.season,
                game.home_team,
                game.away_team,
                game.home_points,
                game.away_points,
                game.postseason,
            ],
        )?;
        Ok(())
    }

    /// All games in chronological order (fitting is sequential in time).
    pub fn list_games(&self) -> Result<Vec<GameRecord>> {
        self.query_games("SELECT game_id, date, season, home_team, away_team,
                    home_points, away_points, postseason
             FROM games ORDER BY date, game_id", None)
    }

    /// One season's games in chronological order.
    pub fn list_season(&self, season: i32) -> Result<Vec<GameRecord>> {
        self.query_games("SELECT game_id, date, season, home_team, away_team,
                    home_points, away_points, postseason
             FROM games WHERE season=?1 ORDER BY date, game_id", Some(season))
    }

    fn query_games(&self, sql: &str, season: Option<i32>) -> Result<Vec<GameRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(sql)?;
        let map = |row: &rusqlite::Row| -> rusqlite::Result<GameRecord> {
            Ok(GameRecord {
                game_id: row.get(0)?,
                date: row.get(1)?,
                season: row.get(2)?,
                home_team: row.get(3)?,
                away_team: row.get(4)?,
                home_points: row.get(5)?,
                away_points: row.get(6)?,
                postseason: row.get(7)?,
            })
        };
        let games = match season {
            Some(s) => stmt.query_map(params![s], map)?.collect::<rusqlite::Result<Vec<_>>>()?,
            None => stmt.query_map([], map)?.collect::<rusqlite::Result<Vec<_>>>()?,
        };
        Ok(games)
    }

    pub fn count_games(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM games", [], |row| row.get(0))?;
        Ok(count)
    }
}
