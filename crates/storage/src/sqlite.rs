//! Catalog persisted in SQLite.
//!
//! Identity is enforced by the schema: event names are the primary key of
//! `events` and waveform keys are a UNIQUE constraint of `waveforms`, so a
//! check-and-insert never needs a prior read. Writes go through one gate
//! because SQLite allows a single writer at a time.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, QueryBuilder, Sqlite};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use seis_codec::EventSummary;
use seis_common::{
    ChannelId, Coordinates, ResourceKind, SeisError, SeisResult, StationKey, Tag, WaveformFormat,
    WaveformKey,
};

use crate::catalog::{EventCatalog, FilepathTable, StationRegistry, StationUpdate, WaveformRegistry};
use crate::events::{next_free_name, validate_name, EventRecord};
use crate::filepaths::{FilepathId, FilepathRecord};
use crate::stations::StationRecord;
use crate::waveforms::{
    Registration, StorageMode, WaveformFilter, WaveformMetadata, WaveformRecord,
};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    name TEXT PRIMARY KEY,
    summary TEXT NOT NULL,
    payload BLOB NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS stations (
    network TEXT NOT NULL,
    station TEXT NOT NULL,
    latitude REAL,
    longitude REAL,
    elevation_in_m REAL,
    local_depth_in_m REAL,
    channels TEXT NOT NULL,
    metadata_files TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    PRIMARY KEY (network, station)
);

CREATE TABLE IF NOT EXISTS files (
    id BLOB PRIMARY KEY,
    location TEXT NOT NULL,
    size INTEGER NOT NULL,
    checksum TEXT NOT NULL,
    format TEXT NOT NULL,
    registered_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_files_checksum ON files(checksum);

CREATE TABLE IF NOT EXISTS waveforms (
    id BLOB PRIMARY KEY,
    event TEXT NOT NULL,
    network TEXT NOT NULL,
    station TEXT NOT NULL,
    location TEXT NOT NULL,
    channel TEXT NOT NULL,
    tag TEXT NOT NULL,
    synthetic INTEGER NOT NULL,
    storage_mode TEXT NOT NULL,
    filepath BLOB NOT NULL,
    sampling_rate REAL NOT NULL,
    npts INTEGER NOT NULL,
    starttime TEXT NOT NULL,
    endtime TEXT NOT NULL,
    format TEXT NOT NULL,
    trace_index INTEGER NOT NULL,
    registered_at TEXT NOT NULL,

    UNIQUE (event, network, station, location, channel, tag, synthetic)
);

CREATE INDEX IF NOT EXISTS idx_waveforms_filepath ON waveforms(filepath);
"#;

const EVENT_COLUMNS: &str = "name, summary, payload, created_at, updated_at";

const STATION_COLUMNS: &str = "network, station, latitude, longitude, elevation_in_m, \
     local_depth_in_m, channels, metadata_files, updated_at";

const FILE_COLUMNS: &str = "id, location, size, checksum, format, registered_at";

const WAVEFORM_COLUMNS: &str = "id, event, network, station, location, channel, tag, synthetic, \
     storage_mode, filepath, sampling_rate, npts, starttime, endtime, format, trace_index, \
     registered_at";

/// Listing order of waveform records: event, channel id, tag.
const WAVEFORM_ORDER: &str =
    " ORDER BY event, network, station, location, channel, tag, synthetic";

fn db_error(e: sqlx::Error) -> SeisError {
    SeisError::DatabaseError(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// SQLite backed implementation of every catalog trait.
pub struct SqliteCatalog {
    pool: SqlitePool,
    writes: Mutex<()>,
}

impl SqliteCatalog {
    /// Open or create the catalog database at `path`.
    pub async fn open(path: &Path) -> SeisResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| SeisError::DatabaseError(format!("Failed to open {}: {}", path.display(), e)))?;

        let catalog = Self::with_pool(pool);
        catalog.migrate().await?;
        info!(path = %path.display(), "Opened catalog database");
        Ok(catalog)
    }

    /// A private in-memory database, for tests.
    pub async fn open_memory() -> SeisResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .create_if_missing(true);

        // Every connection to :memory: is its own database; keep exactly one alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(db_error)?;

        let catalog = Self::with_pool(pool);
        catalog.migrate().await?;
        Ok(catalog)
    }

    fn with_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            writes: Mutex::new(()),
        }
    }

    /// Create missing tables and indexes.
    pub async fn migrate(&self) -> SeisResult<()> {
        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| SeisError::DatabaseError(format!("Migration failed: {}", e)))?;
            }
        }
        Ok(())
    }

    async fn scalar_count(&self, table: &str) -> SeisResult<usize> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(count as usize)
    }
}

// === Events ===

#[derive(FromRow)]
struct EventRow {
    name: String,
    summary: String,
    payload: Vec<u8>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for EventRecord {
    type Error = SeisError;

    fn try_from(row: EventRow) -> SeisResult<Self> {
        Ok(Self {
            name: row.name,
            summary: serde_json::from_str(&row.summary)?,
            payload: Bytes::from(row.payload),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl EventCatalog for SqliteCatalog {
    async fn create(&self, name: Option<&str>, summary: EventSummary, payload: Bytes) -> SeisResult<String> {
        let _writes = self.writes.lock().await;

        let name = match name {
            Some(name) => {
                validate_name(name)?;
                name.to_string()
            }
            None => {
                let taken: HashSet<String> = sqlx::query_scalar("SELECT name FROM events")
                    .fetch_all(&self.pool)
                    .await
                    .map_err(db_error)?
                    .into_iter()
                    .collect();
                next_free_name(|candidate| taken.contains(candidate))?
            }
        };

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO events (name, summary, payload, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&name)
        .bind(serde_json::to_string(&summary)?)
        .bind(payload.as_ref())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                info!(event = %name, "Created event");
                Ok(name)
            }
            Err(e) if is_unique_violation(&e) => Err(SeisError::DuplicateEvent(name)),
            Err(e) => Err(db_error(e)),
        }
    }

    async fn get(&self, name: &str) -> SeisResult<EventRecord> {
        sqlx::query_as::<_, EventRow>(&format!("SELECT {} FROM events WHERE name = ?", EVENT_COLUMNS))
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .ok_or_else(|| SeisError::not_found(ResourceKind::Event, name))?
            .try_into()
    }

    async fn exists(&self, name: &str) -> SeisResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(count > 0)
    }

    async fn update(&self, name: &str, summary: EventSummary, payload: Bytes) -> SeisResult<()> {
        let _writes = self.writes.lock().await;
        let done = sqlx::query("UPDATE events SET summary = ?, payload = ?, updated_at = ? WHERE name = ?")
            .bind(serde_json::to_string(&summary)?)
            .bind(payload.as_ref())
            .bind(Utc::now())
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        if done.rows_affected() == 0 {
            return Err(SeisError::not_found(ResourceKind::Event, name));
        }
        debug!(event = %name, "Updated event");
        Ok(())
    }

    async fn delete(&self, name: &str) -> SeisResult<EventRecord> {
        let _writes = self.writes.lock().await;
        let removed: EventRecord = sqlx::query_as::<_, EventRow>(&format!(
            "DELETE FROM events WHERE name = ? RETURNING {}",
            EVENT_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or_else(|| SeisError::not_found(ResourceKind::Event, name))?
        .try_into()?;
        info!(event = %name, "Deleted event");
        Ok(removed)
    }

    async fn list(&self) -> SeisResult<BoxStream<'static, EventRecord>> {
        let records = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {} FROM events ORDER BY name",
            EVENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(EventRecord::try_from)
        .collect::<SeisResult<Vec<_>>>()?;
        Ok(stream::iter(records).boxed())
    }

    async fn count(&self) -> SeisResult<usize> {
        self.scalar_count("events").await
    }
}

// === Stations ===

#[derive(FromRow)]
struct StationRow {
    network: String,
    station: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    elevation_in_m: Option<f64>,
    local_depth_in_m: Option<f64>,
    channels: String,
    metadata_files: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StationRow> for StationRecord {
    type Error = SeisError;

    fn try_from(row: StationRow) -> SeisResult<Self> {
        Ok(Self {
            key: StationKey::new(row.network, row.station),
            coordinates: Coordinates {
                latitude: row.latitude,
                longitude: row.longitude,
                elevation_in_m: row.elevation_in_m,
                local_depth_in_m: row.local_depth_in_m,
            },
            channels: serde_json::from_str(&row.channels)?,
            metadata_files: serde_json::from_str(&row.metadata_files)?,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl StationRegistry for SqliteCatalog {
    async fn get(&self, key: &StationKey) -> SeisResult<StationRecord> {
        sqlx::query_as::<_, StationRow>(&format!(
            "SELECT {} FROM stations WHERE network = ? AND station = ?",
            STATION_COLUMNS
        ))
        .bind(&key.network)
        .bind(&key.station)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or_else(|| SeisError::not_found(ResourceKind::Station, key.to_string()))?
        .try_into()
    }

    async fn coordinates(&self, key: &StationKey) -> SeisResult<Option<Coordinates>> {
        match StationRegistry::get(self, key).await {
            Ok(record) => Ok(Some(record.coordinates)),
            Err(SeisError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn apply(&self, key: &StationKey, update: StationUpdate<'_>) -> SeisResult<()> {
        let _writes = self.writes.lock().await;
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let existing = sqlx::query_as::<_, StationRow>(&format!(
            "SELECT {} FROM stations WHERE network = ? AND station = ?",
            STATION_COLUMNS
        ))
        .bind(&key.network)
        .bind(&key.station)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;

        let mut record = match existing {
            Some(row) => StationRecord::try_from(row)?,
            None => StationRecord::new(key.clone()),
        };
        update(&mut record);
        record.updated_at = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO stations (
                network, station, latitude, longitude, elevation_in_m, local_depth_in_m,
                channels, metadata_files, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (network, station)
            DO UPDATE SET
                latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude,
                elevation_in_m = EXCLUDED.elevation_in_m,
                local_depth_in_m = EXCLUDED.local_depth_in_m,
                channels = EXCLUDED.channels,
                metadata_files = EXCLUDED.metadata_files,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&record.key.network)
        .bind(&record.key.station)
        .bind(record.coordinates.latitude)
        .bind(record.coordinates.longitude)
        .bind(record.coordinates.elevation_in_m)
        .bind(record.coordinates.local_depth_in_m)
        .bind(serde_json::to_string(&record.channels)?)
        .bind(serde_json::to_string(&record.metadata_files)?)
        .bind(record.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)
    }

    async fn list(&self) -> SeisResult<BoxStream<'static, StationRecord>> {
        let records = sqlx::query_as::<_, StationRow>(&format!(
            "SELECT {} FROM stations ORDER BY network, station",
            STATION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(StationRecord::try_from)
        .collect::<SeisResult<Vec<_>>>()?;
        Ok(stream::iter(records).boxed())
    }

    async fn count(&self) -> SeisResult<usize> {
        self.scalar_count("stations").await
    }
}

// === Waveforms ===

fn storage_mode_name(mode: StorageMode) -> &'static str {
    match mode {
        StorageMode::Managed => "managed",
        StorageMode::Indexed => "indexed",
    }
}

#[derive(FromRow)]
struct WaveformRow {
    id: Uuid,
    event: String,
    network: String,
    station: String,
    location: String,
    channel: String,
    tag: String,
    synthetic: bool,
    storage_mode: String,
    filepath: Uuid,
    sampling_rate: f64,
    npts: i64,
    starttime: DateTime<Utc>,
    endtime: DateTime<Utc>,
    format: String,
    trace_index: i64,
    registered_at: DateTime<Utc>,
}

impl TryFrom<WaveformRow> for WaveformRecord {
    type Error = SeisError;

    fn try_from(row: WaveformRow) -> SeisResult<Self> {
        let storage_mode = match row.storage_mode.as_str() {
            "managed" => StorageMode::Managed,
            "indexed" => StorageMode::Indexed,
            other => {
                return Err(SeisError::DatabaseError(format!("unknown storage mode '{}'", other)))
            }
        };
        let format = WaveformFormat::from_name(&row.format)
            .ok_or_else(|| SeisError::DatabaseError(format!("unknown waveform format '{}'", row.format)))?;

        Ok(Self {
            id: row.id,
            key: WaveformKey::new(
                row.event,
                ChannelId::new(row.network, row.station, row.location, row.channel),
                Tag::new(row.tag),
                row.synthetic,
            ),
            storage_mode,
            filepath: FilepathId::from(row.filepath),
            metadata: WaveformMetadata {
                sampling_rate: row.sampling_rate,
                npts: row.npts as usize,
                starttime: row.starttime,
                endtime: row.endtime,
                format,
                trace_index: row.trace_index as usize,
            },
            registered_at: row.registered_at,
        })
    }
}

fn waveform_records(rows: Vec<WaveformRow>) -> SeisResult<Vec<WaveformRecord>> {
    rows.into_iter().map(WaveformRecord::try_from).collect()
}

#[async_trait]
impl WaveformRegistry for SqliteCatalog {
    #[instrument(skip(self, metadata), fields(event = %key.event, channel_id = %key.channel, tag = %key.tag))]
    async fn register(
        &self,
        key: WaveformKey,
        storage_mode: StorageMode,
        filepath: FilepathId,
        metadata: WaveformMetadata,
        replace: bool,
    ) -> SeisResult<Registration> {
        let _writes = self.writes.lock().await;
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let replaced = if replace {
            sqlx::query_as::<_, WaveformRow>(&format!(
                "DELETE FROM waveforms WHERE event = ? AND network = ? AND station = ? \
                 AND location = ? AND channel = ? AND tag = ? AND synthetic = ? RETURNING {}",
                WAVEFORM_COLUMNS
            ))
            .bind(&key.event)
            .bind(&key.channel.network)
            .bind(&key.channel.station)
            .bind(&key.channel.location)
            .bind(&key.channel.channel)
            .bind(key.tag.as_str())
            .bind(key.synthetic)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error)?
            .map(WaveformRecord::try_from)
            .transpose()?
        } else {
            None
        };

        let record = WaveformRecord::new(key.clone(), storage_mode, filepath, metadata);
        // The event check and the insert are one statement.
        let result = sqlx::query(&format!(
            "INSERT INTO waveforms ({}) \
             SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ? \
             WHERE EXISTS (SELECT 1 FROM events WHERE name = ?)",
            WAVEFORM_COLUMNS
        ))
        .bind(record.id)
        .bind(&key.event)
        .bind(&key.channel.network)
        .bind(&key.channel.station)
        .bind(&key.channel.location)
        .bind(&key.channel.channel)
        .bind(key.tag.as_str())
        .bind(key.synthetic)
        .bind(storage_mode_name(storage_mode))
        .bind(Uuid::from(filepath))
        .bind(record.metadata.sampling_rate)
        .bind(record.metadata.npts as i64)
        .bind(record.metadata.starttime)
        .bind(record.metadata.endtime)
        .bind(record.metadata.format.name())
        .bind(record.metadata.trace_index as i64)
        .bind(record.registered_at)
        .bind(&key.event)
        .execute(&mut *tx)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => return Err(SeisError::UnboundEvent(key.event)),
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Err(SeisError::DuplicateKey(key)),
            Err(e) => return Err(db_error(e)),
        }
        tx.commit().await.map_err(db_error)?;

        if replaced.is_some() {
            info!("Replaced waveform");
        } else {
            debug!("Registered waveform");
        }
        Ok(Registration {
            id: record.id,
            replaced,
        })
    }

    async fn find(&self, filter: &WaveformFilter) -> SeisResult<BoxStream<'static, WaveformRecord>> {
        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM waveforms WHERE 1 = 1",
            WAVEFORM_COLUMNS
        ));
        if let Some(event) = &filter.event {
            query.push(" AND event = ").push_bind(event.clone());
        }
        if let Some(channel) = &filter.channel {
            query.push(" AND network = ").push_bind(channel.network.clone());
            query.push(" AND station = ").push_bind(channel.station.clone());
            query.push(" AND location = ").push_bind(channel.location.clone());
            query.push(" AND channel = ").push_bind(channel.channel.clone());
        }
        if let Some(station) = &filter.station {
            query.push(" AND network = ").push_bind(station.network.clone());
            query.push(" AND station = ").push_bind(station.station.clone());
        }
        if let Some(tag) = &filter.tag {
            query.push(" AND tag = ").push_bind(tag.as_str().to_string());
        }
        if let Some(synthetic) = filter.synthetic {
            query.push(" AND synthetic = ").push_bind(synthetic);
        }
        query.push(WAVEFORM_ORDER);

        let rows = query
            .build_query_as::<WaveformRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(stream::iter(waveform_records(rows)?).boxed())
    }

    async fn get_one(&self, key: &WaveformKey) -> SeisResult<WaveformRecord> {
        sqlx::query_as::<_, WaveformRow>(&format!(
            "SELECT {} FROM waveforms WHERE event = ? AND network = ? AND station = ? \
             AND location = ? AND channel = ? AND tag = ? AND synthetic = ?",
            WAVEFORM_COLUMNS
        ))
        .bind(&key.event)
        .bind(&key.channel.network)
        .bind(&key.channel.station)
        .bind(&key.channel.location)
        .bind(&key.channel.channel)
        .bind(key.tag.as_str())
        .bind(key.synthetic)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or_else(|| SeisError::not_found(ResourceKind::Waveform, key.to_string()))?
        .try_into()
    }

    async fn tags(&self, event: &str, channel: &ChannelId) -> SeisResult<Vec<Tag>> {
        let tags: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT tag FROM waveforms WHERE event = ? AND network = ? AND station = ? \
             AND location = ? AND channel = ? ORDER BY tag",
        )
        .bind(event)
        .bind(&channel.network)
        .bind(&channel.station)
        .bind(&channel.location)
        .bind(&channel.channel)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(tags.into_iter().map(Tag::new).collect())
    }

    async fn references(&self, filepath: &FilepathId) -> SeisResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM waveforms WHERE filepath = ?")
            .bind(Uuid::from(*filepath))
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(count > 0)
    }

    async fn bundle(&self, key: &WaveformKey) -> SeisResult<Vec<WaveformRecord>> {
        let rows = sqlx::query_as::<_, WaveformRow>(&format!(
            "SELECT {} FROM waveforms WHERE event = ? AND network = ? AND station = ? \
             AND location = ? AND tag = ? AND synthetic = ?{}",
            WAVEFORM_COLUMNS, WAVEFORM_ORDER
        ))
        .bind(&key.event)
        .bind(&key.channel.network)
        .bind(&key.channel.station)
        .bind(&key.channel.location)
        .bind(key.tag.as_str())
        .bind(key.synthetic)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        waveform_records(rows)
    }

    async fn count(&self) -> SeisResult<usize> {
        self.scalar_count("waveforms").await
    }
}

// === Files ===

#[derive(FromRow)]
struct FileRow {
    id: Uuid,
    location: String,
    size: i64,
    checksum: String,
    format: String,
    registered_at: DateTime<Utc>,
}

impl TryFrom<FileRow> for FilepathRecord {
    type Error = SeisError;

    fn try_from(row: FileRow) -> SeisResult<Self> {
        Ok(Self {
            id: FilepathId::from(row.id),
            location: serde_json::from_str(&row.location)?,
            size: row.size as u64,
            checksum: row.checksum,
            registered_at: row.registered_at,
            format: row.format,
        })
    }
}

#[async_trait]
impl FilepathTable for SqliteCatalog {
    async fn insert(&self, record: FilepathRecord, reject_duplicate_content: bool) -> SeisResult<()> {
        let _writes = self.writes.lock().await;
        let done = sqlx::query(&format!(
            "INSERT INTO files ({}) SELECT ?, ?, ?, ?, ?, ? \
             WHERE ? = 0 OR NOT EXISTS (SELECT 1 FROM files WHERE checksum = ?)",
            FILE_COLUMNS
        ))
        .bind(Uuid::from(record.id))
        .bind(serde_json::to_string(&record.location)?)
        .bind(record.size as i64)
        .bind(&record.checksum)
        .bind(&record.format)
        .bind(record.registered_at)
        .bind(reject_duplicate_content)
        .bind(&record.checksum)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if done.rows_affected() == 0 {
            return Err(SeisError::DuplicateContent(record.checksum));
        }
        Ok(())
    }

    async fn get(&self, id: &FilepathId) -> SeisResult<FilepathRecord> {
        sqlx::query_as::<_, FileRow>(&format!("SELECT {} FROM files WHERE id = ?", FILE_COLUMNS))
            .bind(Uuid::from(*id))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .ok_or_else(|| SeisError::not_found(ResourceKind::File, id.to_string()))?
            .try_into()
    }

    async fn find_by_checksum(&self, checksum: &str) -> SeisResult<Option<FilepathRecord>> {
        sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {} FROM files WHERE checksum = ? LIMIT 1",
            FILE_COLUMNS
        ))
        .bind(checksum)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .map(FilepathRecord::try_from)
        .transpose()
    }

    async fn remove(&self, id: &FilepathId) -> SeisResult<Option<FilepathRecord>> {
        let _writes = self.writes.lock().await;
        sqlx::query_as::<_, FileRow>(&format!(
            "DELETE FROM files WHERE id = ? RETURNING {}",
            FILE_COLUMNS
        ))
        .bind(Uuid::from(*id))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .map(FilepathRecord::try_from)
        .transpose()
    }

    async fn count(&self) -> SeisResult<usize> {
        self.scalar_count("files").await
    }
}
