use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS posts (
            id         INTEGER PRIMARY KEY,
            cid        TEXT UNIQUE NOT NULL,
            nr         INTEGER,
            subject    TEXT,
            visited    BOOLEAN NOT NULL DEFAULT 0,
            visited_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_posts_visited ON posts(visited);

        CREATE TABLE IF NOT EXISTS post_data (
            id         INTEGER PRIMARY KEY,
            post_id    INTEGER NOT NULL REFERENCES posts(id),
            cid        TEXT NOT NULL,
            raw_json   TEXT,
            error      TEXT,
            latency_ms INTEGER,
            fetched_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_post_data_post ON post_data(post_id);
        ",
    )?;
    Ok(())
}

// ── Feed queue ──

/// One entry of the course feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    pub cid: String,
    pub nr: Option<i64>,
    pub subject: Option<String>,
}

/// Queue feed items in feed order; already-known posts are left alone.
pub fn insert_feed(conn: &Connection, items: &[FeedItem]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt =
            tx.prepare("INSERT OR IGNORE INTO posts (cid, nr, subject) VALUES (?1, ?2, ?3)")?;
        for item in items {
            count += stmt.execute(rusqlite::params![item.cid, item.nr, item.subject])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

/// Unvisited `(post id, cid)` pairs in feed order.
pub fn fetch_unvisited(conn: &Connection, limit: Option<usize>) -> Result<Vec<(i64, String)>> {
    let sql = match limit {
        Some(n) => format!(
            "SELECT id, cid FROM posts WHERE visited = 0 ORDER BY id LIMIT {}",
            n
        ),
        None => "SELECT id, cid FROM posts WHERE visited = 0 ORDER BY id".to_string(),
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct FetchRow {
    pub post_id: i64,
    pub cid: String,
    pub raw_json: Option<String>,
    pub error: Option<String>,
    pub latency_ms: Option<i64>,
}

/// Prepared statements for saving fetch results as they stream in.
pub struct FetchWriter<'c> {
    insert: rusqlite::Statement<'c>,
    update: rusqlite::Statement<'c>,
}

impl<'c> FetchWriter<'c> {
    pub fn new(conn: &'c Connection) -> Result<Self> {
        Ok(Self {
            insert: conn.prepare(
                "INSERT INTO post_data (post_id, cid, raw_json, error, latency_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?,
            update: conn.prepare(
                "UPDATE posts SET visited = 1, visited_at = datetime('now') WHERE id = ?1",
            )?,
        })
    }

    pub fn save(&mut self, row: &FetchRow) -> Result<()> {
        self.insert.execute(rusqlite::params![
            row.post_id, row.cid, row.raw_json, row.error, row.latency_ms,
        ])?;
        self.update.execute(rusqlite::params![row.post_id])?;
        Ok(())
    }
}

// ── Processing ──

pub struct RawPost {
    pub post_id: i64,
    pub cid: String,
    pub raw_json: String,
}

/// Latest successful payload per post, in feed order.
pub fn fetch_raw_posts(conn: &Connection, limit: Option<usize>) -> Result<Vec<RawPost>> {
    let sql = format!(
        "SELECT p.id, p.cid, pd.raw_json
         FROM posts p
         JOIN post_data pd ON pd.id = (
             SELECT MAX(id) FROM post_data
             WHERE post_id = p.id AND raw_json IS NOT NULL
         )
         ORDER BY p.id{}",
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(RawPost {
                post_id: row.get(0)?,
                cid: row.get(1)?,
                raw_json: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub total: usize,
    pub visited: usize,
    pub unvisited: usize,
    pub fetched: usize,
    pub errors: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let total: usize = conn.query_row("SELECT COUNT(*) FROM posts", [], |r| r.get(0))?;
    let visited: usize =
        conn.query_row("SELECT COUNT(*) FROM posts WHERE visited = 1", [], |r| r.get(0))?;
    let fetched: usize = conn.query_row(
        "SELECT COUNT(DISTINCT post_id) FROM post_data WHERE raw_json IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let errors: usize = conn.query_row(
        "SELECT COUNT(*) FROM post_data WHERE error IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    Ok(Stats {
        total,
        visited,
        unvisited: total.saturating_sub(visited),
        fetched,
        errors,
    })
}
