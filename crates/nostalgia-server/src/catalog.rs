//! SQLite catalog for albums and tracks.
//!
//! Provides pooled connections, schema bootstrap, and the upsert
//! operations the scan engine relies on. A track's file path is the sole
//! uniqueness key; albums are keyed by (title, album_artist).

use std::path::Path;

use anyhow::{Context, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};

const SCHEMA_VERSION: i32 = 1;

#[derive(Clone)]
pub struct CatalogDb {
    pool: Pool<SqliteConnectionManager>,
}

/// Album row as stored in the catalog.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct AlbumRecord {
    pub id: i64,
    pub title: String,
    pub album_artist: Option<String>,
    pub year: Option<i64>,
    pub genre: Option<String>,
    pub cover_url: Option<String>,
}

/// Track row as stored in the catalog.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct TrackRecord {
    pub id: i64,
    pub title: Option<String>,
    pub track_artist: Option<String>,
    pub track_no: Option<i64>,
    pub disc_no: Option<i64>,
    pub duration_sec: Option<i64>,
    pub file_path: String,
    pub format: Option<String>,
    pub sample_rate: Option<i64>,
    pub bit_rate: Option<i64>,
    pub cover_url: Option<String>,
    pub album_id: i64,
}

/// Field values for a track upsert; everything except the cover, which is
/// applied separately with first-write-wins semantics.
#[derive(Debug, Clone, Default)]
pub struct TrackFields {
    pub title: Option<String>,
    pub track_artist: Option<String>,
    pub track_no: Option<i64>,
    pub disc_no: Option<i64>,
    pub duration_sec: Option<i64>,
    pub format: Option<String>,
    pub sample_rate: Option<i64>,
    pub bit_rate: Option<i64>,
    pub album_id: i64,
}

/// Outcome of a track upsert.
#[derive(Debug, Clone)]
pub struct TrackUpsert {
    pub id: i64,
    /// Row was inserted on this call.
    pub created: bool,
    /// At least one field differed and was written.
    pub changed: bool,
}

fn map_album_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AlbumRecord> {
    Ok(AlbumRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        album_artist: row.get(2)?,
        year: row.get(3)?,
        genre: row.get(4)?,
        cover_url: row.get(5)?,
    })
}

const ALBUM_COLUMNS: &str = "id, title, album_artist, year, genre, cover_url";

fn map_track_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TrackRecord> {
    Ok(TrackRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        track_artist: row.get(2)?,
        track_no: row.get(3)?,
        disc_no: row.get(4)?,
        duration_sec: row.get(5)?,
        file_path: row.get(6)?,
        format: row.get(7)?,
        sample_rate: row.get(8)?,
        bit_rate: row.get(9)?,
        cover_url: row.get(10)?,
        album_id: row.get(11)?,
    })
}

const TRACK_COLUMNS: &str = "id, title, track_artist, track_no, disc_no, duration_sec, \
     file_path, format, sample_rate, bit_rate, cover_url, album_id";

impl CatalogDb {
    /// Open (or create) the catalog database at the given path.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create catalog dir {:?}", parent))?;
        }

        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(())
        });
        let pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .context("create catalog db pool")?;

        {
            let conn = pool.get().context("open catalog db")?;
            init_schema(&conn)?;
        }

        Ok(Self { pool })
    }

    /// Find an album by (title, album_artist), creating it when missing.
    ///
    /// NULL album artists compare equal, so repeated calls for the same
    /// key never create duplicate rows.
    pub fn find_or_create_album(
        &self,
        title: &str,
        album_artist: Option<&str>,
        year: Option<i64>,
    ) -> Result<AlbumRecord> {
        let conn = self.pool.get().context("open catalog db")?;

        let existing = conn
            .query_row(
                &format!(
                    "SELECT {ALBUM_COLUMNS} FROM albums \
                     WHERE title = ?1 AND album_artist IS ?2"
                ),
                params![title, album_artist],
                map_album_row,
            )
            .optional()
            .context("lookup album")?;
        if let Some(album) = existing {
            return Ok(album);
        }

        conn.execute(
            "INSERT INTO albums (title, album_artist, year) VALUES (?1, ?2, ?3)",
            params![title, album_artist, year],
        )
        .context("insert album")?;
        let id = conn.last_insert_rowid();

        Ok(AlbumRecord {
            id,
            title: title.to_string(),
            album_artist: album_artist.map(str::to_string),
            year,
            genre: None,
            cover_url: None,
        })
    }

    /// Backfill an album year; the first writer wins and later values are
    /// ignored.
    pub fn set_album_year_if_missing(&self, album_id: i64, year: i64) -> Result<bool> {
        let conn = self.pool.get().context("open catalog db")?;
        let updated = conn
            .execute(
                "UPDATE albums SET year = ?1 WHERE id = ?2 AND year IS NULL",
                params![year, album_id],
            )
            .context("backfill album year")?;
        Ok(updated > 0)
    }

    /// Backfill an album genre, first writer wins.
    pub fn set_album_genre_if_missing(&self, album_id: i64, genre: &str) -> Result<bool> {
        let conn = self.pool.get().context("open catalog db")?;
        let updated = conn
            .execute(
                "UPDATE albums SET genre = ?1 WHERE id = ?2 AND genre IS NULL",
                params![genre, album_id],
            )
            .context("backfill album genre")?;
        Ok(updated > 0)
    }

    /// Set an album cover reference unless one is already present.
    pub fn set_album_cover_if_missing(&self, album_id: i64, cover_url: &str) -> Result<bool> {
        let conn = self.pool.get().context("open catalog db")?;
        let updated = conn
            .execute(
                "UPDATE albums SET cover_url = ?1 WHERE id = ?2 AND cover_url IS NULL",
                params![cover_url, album_id],
            )
            .context("set album cover")?;
        Ok(updated > 0)
    }

    /// Set a track cover reference unless one is already present.
    pub fn set_track_cover_if_missing(&self, track_id: i64, cover_url: &str) -> Result<bool> {
        let conn = self.pool.get().context("open catalog db")?;
        let updated = conn
            .execute(
                "UPDATE tracks SET cover_url = ?1 WHERE id = ?2 AND cover_url IS NULL",
                params![cover_url, track_id],
            )
            .context("set track cover")?;
        Ok(updated > 0)
    }

    /// Upsert a track by file path.
    ///
    /// On first sight the row is created with all fields. On subsequent
    /// sight fields are diffed one by one and a write is issued only when
    /// something actually changed, so a no-change re-scan performs zero
    /// writes against existing rows.
    pub fn upsert_track(&self, file_path: &str, fields: &TrackFields) -> Result<TrackUpsert> {
        let mut conn = self.pool.get().context("open catalog db")?;
        let tx = conn.transaction().context("begin catalog tx")?;

        let existing = tx
            .query_row(
                &format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE file_path = ?1"),
                params![file_path],
                map_track_row,
            )
            .optional()
            .context("lookup existing track")?;

        let outcome = match existing {
            None => {
                tx.execute(
                    "INSERT INTO tracks (
                        title, track_artist, track_no, disc_no, duration_sec,
                        file_path, format, sample_rate, bit_rate, album_id
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    params![
                        fields.title,
                        fields.track_artist,
                        fields.track_no,
                        fields.disc_no,
                        fields.duration_sec,
                        file_path,
                        fields.format,
                        fields.sample_rate,
                        fields.bit_rate,
                        fields.album_id,
                    ],
                )
                .context("insert track")?;
                TrackUpsert {
                    id: tx.last_insert_rowid(),
                    created: true,
                    changed: true,
                }
            }
            Some(current) => {
                let changed = current.title != fields.title
                    || current.track_artist != fields.track_artist
                    || current.track_no != fields.track_no
                    || current.disc_no != fields.disc_no
                    || current.duration_sec != fields.duration_sec
                    || current.format != fields.format
                    || current.sample_rate != fields.sample_rate
                    || current.bit_rate != fields.bit_rate
                    || current.album_id != fields.album_id;
                if changed {
                    tx.execute(
                        "UPDATE tracks SET
                            title = ?1, track_artist = ?2, track_no = ?3, disc_no = ?4,
                            duration_sec = ?5, format = ?6, sample_rate = ?7,
                            bit_rate = ?8, album_id = ?9
                         WHERE id = ?10",
                        params![
                            fields.title,
                            fields.track_artist,
                            fields.track_no,
                            fields.disc_no,
                            fields.duration_sec,
                            fields.format,
                            fields.sample_rate,
                            fields.bit_rate,
                            fields.album_id,
                            current.id,
                        ],
                    )
                    .context("update track")?;
                }
                TrackUpsert {
                    id: current.id,
                    created: false,
                    changed,
                }
            }
        };

        tx.commit().context("commit catalog tx")?;
        Ok(outcome)
    }

    pub fn album_by_id(&self, id: i64) -> Result<Option<AlbumRecord>> {
        let conn = self.pool.get().context("open catalog db")?;
        conn.query_row(
            &format!("SELECT {ALBUM_COLUMNS} FROM albums WHERE id = ?1"),
            params![id],
            map_album_row,
        )
        .optional()
        .context("fetch album")
    }

    pub fn track_by_id(&self, id: i64) -> Result<Option<TrackRecord>> {
        let conn = self.pool.get().context("open catalog db")?;
        conn.query_row(
            &format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE id = ?1"),
            params![id],
            map_track_row,
        )
        .optional()
        .context("fetch track")
    }

    /// Exact lookup by source file path.
    pub fn track_by_path(&self, file_path: &str) -> Result<Option<TrackRecord>> {
        let conn = self.pool.get().context("open catalog db")?;
        conn.query_row(
            &format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE file_path = ?1"),
            params![file_path],
            map_track_row,
        )
        .optional()
        .context("fetch track by path")
    }

    /// List albums, optionally filtered by a case-insensitive substring
    /// match on title or album artist.
    pub fn list_albums(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AlbumRecord>> {
        let conn = self.pool.get().context("open catalog db")?;
        let pattern = search.map(|s| format!("%{s}%"));
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {ALBUM_COLUMNS} FROM albums \
                 WHERE ?1 IS NULL OR title LIKE ?1 OR album_artist LIKE ?1 \
                 ORDER BY id DESC LIMIT ?2 OFFSET ?3"
            ))
            .context("prepare album listing")?;
        let rows = stmt
            .query_map(params![pattern, limit, offset], map_album_row)
            .context("list albums")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("read album rows")
    }

    /// List tracks, optionally filtered on title, artist, or file path.
    pub fn list_tracks(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TrackRecord>> {
        let conn = self.pool.get().context("open catalog db")?;
        let pattern = search.map(|s| format!("%{s}%"));
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {TRACK_COLUMNS} FROM tracks \
                 WHERE ?1 IS NULL OR title LIKE ?1 OR track_artist LIKE ?1 OR file_path LIKE ?1 \
                 ORDER BY id DESC LIMIT ?2 OFFSET ?3"
            ))
            .context("prepare track listing")?;
        let rows = stmt
            .query_map(params![pattern, limit, offset], map_track_row)
            .context("list tracks")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("read track rows")
    }

    /// Tracks belonging to an album, in disc/track order.
    pub fn tracks_for_album(&self, album_id: i64) -> Result<Vec<TrackRecord>> {
        let conn = self.pool.get().context("open catalog db")?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {TRACK_COLUMNS} FROM tracks WHERE album_id = ?1 \
                 ORDER BY COALESCE(disc_no, 0), COALESCE(track_no, 0), id"
            ))
            .context("prepare album tracks")?;
        let rows = stmt
            .query_map(params![album_id], map_track_row)
            .context("list album tracks")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("read album track rows")
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .context("read schema version")?;
    if version >= SCHEMA_VERSION {
        return Ok(());
    }

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS albums (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            album_artist TEXT,
            year INTEGER,
            genre TEXT,
            cover_url TEXT
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_albums_title_artist
            ON albums(title, COALESCE(album_artist, ''));

        CREATE TABLE IF NOT EXISTS tracks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT,
            track_artist TEXT,
            track_no INTEGER,
            disc_no INTEGER,
            duration_sec INTEGER,
            file_path TEXT NOT NULL UNIQUE,
            format TEXT,
            sample_rate INTEGER,
            bit_rate INTEGER,
            cover_url TEXT,
            album_id INTEGER NOT NULL REFERENCES albums(id)
        );
        CREATE INDEX IF NOT EXISTS idx_tracks_title ON tracks(title);
        CREATE INDEX IF NOT EXISTS idx_tracks_artist ON tracks(track_artist);
        CREATE INDEX IF NOT EXISTS idx_tracks_album ON tracks(album_id);
        "#,
    )
    .context("create catalog schema")?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)
        .context("set schema version")?;
    Ok(())
}
