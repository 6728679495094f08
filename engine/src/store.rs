use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Schema, one statement per entry. Timestamps are RFC 3339 UTC text;
/// calendar dates are `YYYY-MM-DD` text.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        telegram_id INTEGER UNIQUE NOT NULL,
        username TEXT,
        first_name TEXT,
        last_name TEXT,
        created_at TEXT NOT NULL,
        total_bonuses INTEGER NOT NULL DEFAULT 0,
        total_games INTEGER NOT NULL DEFAULT 0,
        best_score INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS games (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id),
        mode TEXT NOT NULL,
        score INTEGER NOT NULL,
        floors INTEGER NOT NULL,
        bonuses_earned INTEGER NOT NULL DEFAULT 0,
        played_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS bonus_attempts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id),
        last_attempt TEXT NOT NULL,
        UNIQUE(user_id)
    )",
    "CREATE TABLE IF NOT EXISTS promo_codes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        code TEXT UNIQUE NOT NULL,
        user_id INTEGER NOT NULL REFERENCES users(id),
        bonuses_amount INTEGER NOT NULL,
        required_deposit INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        created_at TEXT NOT NULL,
        expires_at TEXT NOT NULL,
        used_at TEXT,
        used_by_admin_id INTEGER
    )",
    "CREATE TABLE IF NOT EXISTS daily_activity (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id),
        date TEXT NOT NULL,
        first_seen_at TEXT NOT NULL,
        last_seen_at TEXT NOT NULL,
        games_played INTEGER NOT NULL DEFAULT 0,
        UNIQUE(user_id, date)
    )",
    "CREATE TABLE IF NOT EXISTS advertisements (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        message TEXT NOT NULL,
        created_at TEXT NOT NULL,
        sent_at TEXT,
        sent_count INTEGER NOT NULL DEFAULT 0,
        target_all_users INTEGER NOT NULL DEFAULT 1,
        min_games INTEGER NOT NULL DEFAULT 0,
        min_bonuses INTEGER NOT NULL DEFAULT 0,
        is_active INTEGER NOT NULL DEFAULT 1
    )",
    "CREATE TABLE IF NOT EXISTS advertisement_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        advertisement_id INTEGER NOT NULL REFERENCES advertisements(id),
        user_id INTEGER NOT NULL REFERENCES users(id),
        sent_at TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'sent',
        error_message TEXT
    )",
];

/// Open (creating if missing) the on-disk database and apply the schema.
pub async fn open_pool(path: &Path) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    apply_schema(&pool).await?;
    info!(path = %path.display(), "database ready");
    Ok(pool)
}

/// In-memory database for tests. A single connection keeps every query on
/// the same (private) memory store.
pub async fn open_memory_pool() -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    apply_schema(&pool).await?;
    Ok(pool)
}

async fn apply_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
