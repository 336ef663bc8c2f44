use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};

use crate::app::{HeraldError, Result};
use crate::domain::{FilterConfig, Source};
use crate::store::Store;

const SOURCE_COLUMNS: &str = "name, url, quality, uploaders, created_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    /// Open the database at `path`, starting over with an empty one if the
    /// existing file is not a readable SQLite database.
    ///
    /// The unreadable file is kept next to the original as
    /// `<name>.corrupt-<timestamp>`.
    pub fn open_or_recover<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match Self::new(path) {
            Err(HeraldError::Database(rusqlite::Error::SqliteFailure(err, _)))
                if matches!(err.code, ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt) =>
            {
                let backup = Self::corrupt_backup_path(path);
                tracing::warn!(
                    "Database at {} is unreadable ({}), moving it to {} and starting fresh",
                    path.display(),
                    err,
                    backup.display()
                );
                std::fs::rename(path, &backup)?;
                Self::new(path)
            }
            other => other,
        }
    }

    fn corrupt_backup_path(path: &Path) -> PathBuf {
        let mut name = OsString::from(path.as_os_str());
        name.push(format!(".corrupt-{}", Utc::now().format("%Y%m%d%H%M%S")));
        PathBuf::from(name)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            HeraldError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.lock()?;

        // Surfaces NotADatabase before the migration layer wraps it.
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        })?;

        migrations
            .to_latest(&mut conn)
            .map_err(|e| HeraldError::Migration(e.to_string()))?;

        Ok(())
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<DateTime<Utc>>().ok())
    }

    fn row_to_source(row: &Row<'_>) -> rusqlite::Result<Source> {
        let uploaders_json: String = row.get(3)?;
        let uploaders: BTreeSet<String> = serde_json::from_str(&uploaders_json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;

        Ok(Source {
            name: row.get(0)?,
            url: row.get(1)?,
            filters: FilterConfig {
                quality: row.get(2)?,
                uploaders,
            },
            created_at: row
                .get::<_, String>(4)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_else(Utc::now),
        })
    }
}

impl Store for SqliteStore {
    fn add_source(&self, source: &Source) -> Result<()> {
        let uploaders = serde_json::to_string(&source.filters.uploaders)?;
        let conn = self.lock()?;

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO sources (name, url, quality, uploaders, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                source.name,
                source.url,
                source.filters.quality,
                uploaders,
                source.created_at.to_rfc3339()
            ],
        )?;

        if inserted == 0 {
            return Err(HeraldError::SourceExists(source.name.clone()));
        }
        Ok(())
    }

    fn get_source(&self, name: &str) -> Result<Option<Source>> {
        let conn = self.lock()?;

        let result = conn
            .query_row(
                &format!("SELECT {} FROM sources WHERE name = ?1", SOURCE_COLUMNS),
                params![name],
                Self::row_to_source,
            )
            .optional()?;

        Ok(result)
    }

    fn get_all_sources(&self) -> Result<Vec<Source>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sources ORDER BY name",
            SOURCE_COLUMNS
        ))?;

        let sources = stmt
            .query_map([], Self::row_to_source)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(sources)
    }

    fn set_quality(&self, name: &str, quality: Option<&str>) -> Result<bool> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE sources SET quality = ?1 WHERE name = ?2",
            params![quality, name],
        )?;
        Ok(updated > 0)
    }

    fn set_uploaders(&self, name: &str, uploaders: &BTreeSet<String>) -> Result<bool> {
        let uploaders = serde_json::to_string(uploaders)?;
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE sources SET uploaders = ?1 WHERE name = ?2",
            params![uploaders, name],
        )?;
        Ok(updated > 0)
    }

    fn delete_source(&self, name: &str) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM sources WHERE name = ?1", params![name])?;
        Ok(deleted > 0)
    }

    fn is_delivered(&self, id: &str) -> Result<bool> {
        let conn = self.lock()?;

        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM delivered WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )?;

        Ok(exists)
    }

    fn mark_delivered(&self, id: &str, retain: Option<usize>) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT OR IGNORE INTO delivered (id, delivered_at) VALUES (?1, ?2)",
            params![id, Utc::now().to_rfc3339()],
        )?;

        let pruned = match retain {
            Some(keep) => tx.execute(
                "DELETE FROM delivered WHERE rowid <=
                 (SELECT rowid FROM delivered ORDER BY rowid DESC LIMIT 1 OFFSET ?1)",
                params![keep as i64],
            )?,
            None => 0,
        };

        tx.commit()?;
        Ok(pruned)
    }

    fn delivered_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM delivered", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;

        let value = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        Ok(value)
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;

        Ok(())
    }
}
