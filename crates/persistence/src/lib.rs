#![deny(warnings)]

//! Persistence layer: section registry and save games in SQLite, the
//! YAML-backed workbook and the chart/ranking exporters.

use lab_core::LabError;
use lab_runtime::SessionSnapshot;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

mod export;
mod workbook;

pub use export::{export_rankings, SeriesExporter};
pub use sqlx::SqlitePool;
pub use workbook::{
    SheetRow, Workbook, GAME_RESULTS, MARKET_SHARES, PRICING, PROFITS, RIVAL_PRICES,
};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("snapshot encoding error: {0}")]
    Snapshot(#[from] bincode::Error),
    #[error("invalid workbook: {0}")]
    InvalidWorkbook(String),
}

impl From<PersistenceError> for LabError {
    fn from(e: PersistenceError) -> Self {
        LabError::ExternalIo(e.to_string())
    }
}

/// A registered section and the workbook it reads from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub sheet_id: String,
}

/// Returns the default SQLite URL used for local saves.
pub fn default_sqlite_url() -> &'static str {
    "sqlite://./saves/pricing_lab.db"
}

/// Create the parent directory of a file-backed SQLite URL.
pub fn ensure_db_dir(url: &str) -> Result<(), PersistenceError> {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"));
    match path {
        Some(path) if !path.starts_with(":memory:") => {
            if let Some(parent) = Path::new(path).parent() {
                std::fs::create_dir_all(parent)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Open (creating when missing) the database and apply migrations.
pub async fn init_db(url: &str) -> Result<SqlitePool, PersistenceError> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    debug!(url, "database ready");
    Ok(pool)
}

/// Register a section, replacing the sheet of an existing one.
pub async fn register_section(
    pool: &SqlitePool,
    name: &str,
    sheet_id: &str,
) -> Result<(), PersistenceError> {
    sqlx::query(
        "INSERT INTO sections (name, sheet_id) VALUES (?, ?) \
         ON CONFLICT(name) DO UPDATE SET sheet_id = excluded.sheet_id",
    )
    .bind(name)
    .bind(sheet_id)
    .execute(pool)
    .await?;
    info!(section = name, sheet_id, "section registered");
    Ok(())
}

/// All sections, by name.
pub async fn list_sections(pool: &SqlitePool) -> Result<Vec<Section>, PersistenceError> {
    let rows = sqlx::query("SELECT name, sheet_id FROM sections ORDER BY name")
        .fetch_all(pool)
        .await?;
    rows.iter()
        .map(|r| {
            Ok(Section {
                name: r.try_get("name")?,
                sheet_id: r.try_get("sheet_id")?,
            })
        })
        .collect()
}

pub async fn lookup_section(
    pool: &SqlitePool,
    name: &str,
) -> Result<Option<String>, PersistenceError> {
    let row = sqlx::query("SELECT sheet_id FROM sections WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(match row {
        Some(r) => Some(r.try_get("sheet_id")?),
        None => None,
    })
}

/// Store a save game and return its id.
pub async fn save_snapshot(
    pool: &SqlitePool,
    snapshot: &SessionSnapshot,
    note: Option<&str>,
) -> Result<i64, PersistenceError> {
    let blob = bincode::serialize(snapshot)?;
    let created_at = chrono::Utc::now().to_rfc3339();
    let res = sqlx::query(
        "INSERT INTO saves (section, created_at, note, snapshot) VALUES (?, ?, ?, ?)",
    )
    .bind(snapshot.section.as_str())
    .bind(created_at)
    .bind(note)
    .bind(blob)
    .execute(pool)
    .await?;
    let id = res.last_insert_rowid();
    debug!(id, section = %snapshot.section, ticks = snapshot.ticks, "session saved");
    Ok(id)
}

/// Most recent save game of a section.
pub async fn load_latest_snapshot(
    pool: &SqlitePool,
    section: &str,
) -> Result<Option<SessionSnapshot>, PersistenceError> {
    let row = sqlx::query("SELECT snapshot FROM saves WHERE section = ? ORDER BY id DESC LIMIT 1")
        .bind(section)
        .fetch_optional(pool)
        .await?;
    match row {
        Some(r) => {
            let blob: Vec<u8> = r.try_get("snapshot")?;
            Ok(Some(bincode::deserialize(&blob)?))
        }
        None => Ok(None),
    }
}
