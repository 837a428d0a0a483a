//! Durable cache backend on SQLite.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, ErrorCode, OptionalExtension, params};

use super::{CachedAsset, FaviconCacheRecord, Slot, SlotStore, SlotValue};
use crate::error::CacheError;
use crate::icon::{SourceImage, Tier};

impl From<rusqlite::Error> for CacheError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::DiskFull => {
                CacheError::QuotaExceeded
            }
            _ => CacheError::Storage(err.to_string()),
        }
    }
}

/// Stores both slots in a SQLite database, binaries as BLOBs.
///
/// Tables:
/// - `images`: the source-image slot
/// - `favicons`: the generation snapshot, including its embedded source
/// - `favicon_assets`: one row per asset of a snapshot, in order
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        }
        let conn =
            Connection::open(path).map_err(|e| CacheError::Unavailable(e.to_string()))?;
        tracing::info!(path = %path.display(), "cache database opened");
        Self::init(conn)
    }

    /// A database that lives only as long as the store.
    pub fn open_in_memory() -> Result<Self, CacheError> {
        let conn =
            Connection::open_in_memory().map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Self::init(conn)
    }

    /// Caps the database file size. Writes past the cap fail with
    /// [`CacheError::QuotaExceeded`].
    pub fn with_quota(self, quota_bytes: u64) -> Result<Self, CacheError> {
        {
            let conn = self.conn()?;
            let page_size: i64 = conn.pragma_query_value(None, "page_size", |row| row.get(0))?;
            let pages = (quota_bytes / page_size.max(1) as u64).clamp(1, i64::MAX as u64) as i64;
            let applied: i64 =
                conn.pragma_update_and_check(None, "max_page_count", pages, |row| row.get(0))?;
            tracing::debug!(quota_bytes, pages = applied, "cache quota applied");
        }
        Ok(self)
    }

    fn init(conn: Connection) -> Result<Self, CacheError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS images (
                id          TEXT PRIMARY KEY,
                data        BLOB NOT NULL,
                filename    TEXT NOT NULL,
                mime_type   TEXT NOT NULL,
                timestamp   INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS favicons (
                id                  TEXT PRIMARY KEY,
                manifest            TEXT,
                browser_config      TEXT,
                html_snippet        TEXT NOT NULL,
                source_data         BLOB NOT NULL,
                source_filename     TEXT NOT NULL,
                source_mime         TEXT NOT NULL,
                source_captured_at  INTEGER NOT NULL,
                timestamp           INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS favicon_assets (
                cache_id    TEXT NOT NULL,
                position    INTEGER NOT NULL,
                name        TEXT NOT NULL,
                data        BLOB NOT NULL,
                path        TEXT NOT NULL,
                size        INTEGER NOT NULL,
                tier        TEXT NOT NULL,
                mime_type   TEXT NOT NULL,
                PRIMARY KEY (cache_id, position)
            );",
        )
        .map_err(|e| CacheError::Unavailable(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, CacheError> {
        self.conn
            .lock()
            .map_err(|_| CacheError::Storage("cache connection lock poisoned".to_string()))
    }

    fn read_source(conn: &Connection) -> Result<Option<SourceImage>, CacheError> {
        let source = conn
            .query_row(
                "SELECT data, mime_type, filename, timestamp FROM images WHERE id = ?1",
                [Slot::SourceImage.key()],
                |row| {
                    Ok(SourceImage {
                        bytes: row.get(0)?,
                        mime_type: row.get(1)?,
                        filename: row.get(2)?,
                        captured_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(source)
    }

    fn read_favicons(conn: &Connection) -> Result<Option<FaviconCacheRecord>, CacheError> {
        let key = Slot::FaviconCache.key();
        let record = conn
            .query_row(
                "SELECT manifest, browser_config, html_snippet,
                        source_data, source_mime, source_filename, source_captured_at,
                        timestamp
                 FROM favicons WHERE id = ?1",
                [key],
                |row| {
                    Ok(FaviconCacheRecord {
                        assets: Vec::new(),
                        manifest_text: row.get(0)?,
                        browser_config_text: row.get(1)?,
                        html_snippet_text: row.get(2)?,
                        source: SourceImage {
                            bytes: row.get(3)?,
                            mime_type: row.get(4)?,
                            filename: row.get(5)?,
                            captured_at: row.get(6)?,
                        },
                        timestamp: row.get(7)?,
                    })
                },
            )
            .optional()?;

        let Some(mut record) = record else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT name, data, path, size, tier, mime_type
             FROM favicon_assets WHERE cache_id = ?1 ORDER BY position",
        )?;
        let rows = stmt.query_map([key], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        for row in rows {
            let (name, bytes, path, size, tier, mime_type) = row?;
            let tier = Tier::parse(&tier)
                .ok_or_else(|| CacheError::Corrupt(format!("unknown tier {tier:?} for {name}")))?;
            record.assets.push(CachedAsset {
                name,
                bytes,
                path,
                size,
                tier,
                mime_type,
            });
        }

        Ok(Some(record))
    }

    fn write_source(conn: &Connection, source: &SourceImage) -> Result<(), CacheError> {
        conn.execute(
            "INSERT OR REPLACE INTO images (id, data, filename, mime_type, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                Slot::SourceImage.key(),
                source.bytes,
                source.filename,
                source.mime_type,
                source.captured_at,
            ],
        )?;
        Ok(())
    }

    fn write_favicons(conn: &mut Connection, record: &FaviconCacheRecord) -> Result<(), CacheError> {
        let key = Slot::FaviconCache.key();
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM favicon_assets WHERE cache_id = ?1", [key])?;
        tx.execute(
            "INSERT OR REPLACE INTO favicons (
                id, manifest, browser_config, html_snippet,
                source_data, source_filename, source_mime, source_captured_at,
                timestamp
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                key,
                record.manifest_text,
                record.browser_config_text,
                record.html_snippet_text,
                record.source.bytes,
                record.source.filename,
                record.source.mime_type,
                record.source.captured_at,
                record.timestamp,
            ],
        )?;

        {
            let mut insert = tx.prepare(
                "INSERT INTO favicon_assets (cache_id, position, name, data, path, size, tier, mime_type)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for (position, asset) in record.assets.iter().enumerate() {
                insert.execute(params![
                    key,
                    position as i64,
                    asset.name,
                    asset.bytes,
                    asset.path,
                    asset.size,
                    asset.tier.as_str(),
                    asset.mime_type,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }
}

impl SlotStore for SqliteStore {
    fn get(&self, slot: Slot) -> Result<Option<SlotValue>, CacheError> {
        let conn = self.conn()?;
        let value = match slot {
            Slot::SourceImage => Self::read_source(&conn)?.map(SlotValue::SourceImage),
            Slot::FaviconCache => Self::read_favicons(&conn)?.map(SlotValue::FaviconCache),
        };
        tracing::debug!(slot = slot.key(), hit = value.is_some(), "cache read");
        Ok(value)
    }

    fn set(&self, value: SlotValue) -> Result<(), CacheError> {
        let mut conn = self.conn()?;
        match &value {
            SlotValue::SourceImage(source) => Self::write_source(&conn, source),
            SlotValue::FaviconCache(record) => Self::write_favicons(&mut conn, record),
        }
    }

    fn clear(&self, slot: Slot) -> Result<(), CacheError> {
        let mut conn = self.conn()?;
        let key = slot.key();
        match slot {
            Slot::SourceImage => {
                conn.execute("DELETE FROM images WHERE id = ?1", [key])?;
            }
            Slot::FaviconCache => {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM favicon_assets WHERE cache_id = ?1", [key])?;
                tx.execute("DELETE FROM favicons WHERE id = ?1", [key])?;
                tx.commit()?;
            }
        }
        Ok(())
    }
}
