use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::core::backend::{BackendError, ObservationBackend, ObservationStats};
use crate::core::criteria::SearchCriteria;
use crate::core::observation::{Location, ObsMode, Observation, Satellite};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<DbError> for BackendError {
    fn from(e: DbError) -> Self {
        BackendError::Storage(e.to_string())
    }
}

// SQLite's default host parameter limit is far above this; keep IN lists short anyway.
const ID_CHUNK: usize = 500;

const SELECT_OBSERVATION: &str = "
    SELECT o.id, o.date_added_ms, o.obs_time_ms, o.obs_time_uncert_sec,
           s.sat_name, s.sat_number, s.intl_designator,
           o.apparent_mag, o.apparent_mag_uncert, o.limiting_magnitude,
           l.obs_lat_deg, l.obs_long_deg, l.obs_alt_m,
           o.obs_mode, o.obs_filter, o.instrument, o.obs_orc_id,
           o.sat_ra_deg, o.sat_dec_deg, o.range_to_sat_km, o.range_rate_sat_km_s,
           o.phase_angle, o.illuminated, o.comments, o.data_archive_link, o.mpc_code
    FROM observations o
    JOIN satellites s ON s.id = o.satellite_id
    JOIN locations l ON l.id = o.location_id";

const ORDER_NEWEST_FIRST: &str = " ORDER BY o.date_added_ms DESC, o.id DESC";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn open_or_init(path: &Path) -> Result<Connection, DbError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        CREATE TABLE IF NOT EXISTS satellites (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sat_name TEXT NOT NULL,
            sat_number INTEGER NOT NULL,
            intl_designator TEXT,
            UNIQUE(sat_name, sat_number)
        );
        CREATE TABLE IF NOT EXISTS locations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            obs_lat_deg REAL NOT NULL,
            obs_long_deg REAL NOT NULL,
            obs_alt_m REAL NOT NULL,
            UNIQUE(obs_lat_deg, obs_long_deg, obs_alt_m)
        );
        CREATE TABLE IF NOT EXISTS observations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            satellite_id INTEGER NOT NULL,
            location_id INTEGER NOT NULL,
            date_added_ms INTEGER NOT NULL,
            obs_time_ms INTEGER NOT NULL,
            obs_time_uncert_sec REAL NOT NULL,
            apparent_mag REAL,
            apparent_mag_uncert REAL,
            limiting_magnitude REAL NOT NULL,
            obs_mode TEXT NOT NULL,
            obs_filter TEXT NOT NULL,
            instrument TEXT NOT NULL,
            obs_orc_id TEXT NOT NULL,
            sat_ra_deg REAL,
            sat_dec_deg REAL,
            range_to_sat_km REAL,
            range_rate_sat_km_s REAL,
            phase_angle REAL,
            illuminated INTEGER,
            comments TEXT,
            data_archive_link TEXT,
            mpc_code TEXT,
            FOREIGN KEY(satellite_id) REFERENCES satellites(id),
            FOREIGN KEY(location_id) REFERENCES locations(id)
        );
        CREATE INDEX IF NOT EXISTS observations_date_added ON observations(date_added_ms);
        CREATE INDEX IF NOT EXISTS observations_obs_time ON observations(obs_time_ms);
        "#,
    )?;
    Ok(conn)
}

/// Observation as submitted for storage; the store assigns the id.
#[derive(Debug, Clone, Deserialize)]
pub struct NewObservation {
    /// Defaults to the insertion time.
    #[serde(default)]
    pub date_added: Option<DateTime<Utc>>,
    pub obs_time_utc: DateTime<Utc>,
    #[serde(default)]
    pub obs_time_uncert_sec: f64,
    pub satellite: Satellite,
    #[serde(default)]
    pub apparent_mag: Option<f64>,
    #[serde(default)]
    pub apparent_mag_uncert: Option<f64>,
    pub limiting_magnitude: f64,
    pub location: Location,
    pub obs_mode: ObsMode,
    #[serde(default)]
    pub obs_filter: String,
    #[serde(default)]
    pub instrument: String,
    pub obs_orc_id: Vec<String>,
    #[serde(default)]
    pub sat_ra_deg: Option<f64>,
    #[serde(default)]
    pub sat_dec_deg: Option<f64>,
    #[serde(default)]
    pub range_to_sat_km: Option<f64>,
    #[serde(default)]
    pub range_rate_sat_km_s: Option<f64>,
    #[serde(default)]
    pub phase_angle: Option<f64>,
    #[serde(default)]
    pub illuminated: Option<bool>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub data_archive_link: Option<String>,
    #[serde(default)]
    pub mpc_code: Option<String>,
}

pub fn upsert_satellite(conn: &Connection, satellite: &Satellite) -> Result<i64, DbError> {
    let id = conn.query_row(
        "INSERT INTO satellites (sat_name, sat_number, intl_designator) VALUES (?1, ?2, ?3)
         ON CONFLICT(sat_name, sat_number)
         DO UPDATE SET intl_designator = COALESCE(excluded.intl_designator, satellites.intl_designator)
         RETURNING id",
        params![satellite.sat_name, satellite.sat_number, satellite.intl_designator],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(id)
}

pub fn upsert_location(conn: &Connection, location: &Location) -> Result<i64, DbError> {
    let id = conn.query_row(
        "INSERT INTO locations (obs_lat_deg, obs_long_deg, obs_alt_m) VALUES (?1, ?2, ?3)
         ON CONFLICT(obs_lat_deg, obs_long_deg, obs_alt_m) DO UPDATE SET obs_alt_m = excluded.obs_alt_m
         RETURNING id",
        params![location.obs_lat_deg, location.obs_long_deg, location.obs_alt_m],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(id)
}

pub fn insert_observation(conn: &Connection, obs: &NewObservation) -> Result<i64, DbError> {
    let satellite_id = upsert_satellite(conn, &obs.satellite)?;
    let location_id = upsert_location(conn, &obs.location)?;
    let date_added = obs.date_added.unwrap_or_else(Utc::now);
    let orcids = serde_json::to_string(&obs.obs_orc_id)?;
    conn.execute(
        "INSERT INTO observations (
            satellite_id, location_id, date_added_ms, obs_time_ms, obs_time_uncert_sec,
            apparent_mag, apparent_mag_uncert, limiting_magnitude, obs_mode, obs_filter,
            instrument, obs_orc_id, sat_ra_deg, sat_dec_deg, range_to_sat_km,
            range_rate_sat_km_s, phase_angle, illuminated, comments, data_archive_link, mpc_code)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
        params![
            satellite_id,
            location_id,
            date_added.timestamp_millis(),
            obs.obs_time_utc.timestamp_millis(),
            obs.obs_time_uncert_sec,
            obs.apparent_mag,
            obs.apparent_mag_uncert,
            obs.limiting_magnitude,
            obs.obs_mode.tag(),
            obs.obs_filter,
            obs.instrument,
            orcids,
            obs.sat_ra_deg,
            obs.sat_dec_deg,
            obs.range_to_sat_km,
            obs.range_rate_sat_km_s,
            obs.phase_angle,
            obs.illuminated,
            obs.comments,
            obs.data_archive_link,
            obs.mpc_code,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let ms: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(ms).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms))
}

fn observation_from_row(row: &Row<'_>) -> rusqlite::Result<Observation> {
    let mode: String = row.get(13)?;
    let obs_mode = mode
        .parse::<ObsMode>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(13, Type::Text, Box::new(e)))?;
    let orcids: String = row.get(16)?;
    let obs_orc_id: Vec<String> = serde_json::from_str(&orcids)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(16, Type::Text, Box::new(e)))?;

    Ok(Observation {
        id: row.get(0)?,
        date_added: timestamp_at(row, 1)?,
        obs_time_utc: timestamp_at(row, 2)?,
        obs_time_uncert_sec: row.get(3)?,
        satellite: Satellite {
            sat_name: row.get(4)?,
            sat_number: row.get(5)?,
            intl_designator: row.get(6)?,
        },
        apparent_mag: row.get(7)?,
        apparent_mag_uncert: row.get(8)?,
        limiting_magnitude: row.get(9)?,
        location: Location {
            obs_lat_deg: row.get(10)?,
            obs_long_deg: row.get(11)?,
            obs_alt_m: row.get(12)?,
        },
        obs_mode,
        obs_filter: row.get(14)?,
        instrument: row.get(15)?,
        obs_orc_id,
        sat_ra_deg: row.get(17)?,
        sat_dec_deg: row.get(18)?,
        range_to_sat_km: row.get(19)?,
        range_rate_sat_km_s: row.get(20)?,
        phase_angle: row.get(21)?,
        illuminated: row.get(22)?,
        comments: row.get(23)?,
        data_archive_link: row.get(24)?,
        mpc_code: row.get(25)?,
    })
}

fn start_of_day_ms(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

/// Builds the WHERE clause for `criteria` with positional parameters.
fn filter_clause(criteria: &SearchCriteria) -> (String, Vec<Value>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(name) = &criteria.sat_name {
        clauses.push("s.sat_name = ? COLLATE NOCASE".into());
        values.push(Value::Text(name.clone()));
    }
    if let Some(number) = criteria.sat_number {
        clauses.push("s.sat_number = ?".into());
        values.push(Value::Integer(i64::from(number)));
    }
    if let Some(start) = criteria.start_date {
        clauses.push("o.obs_time_ms >= ?".into());
        values.push(Value::Integer(start_of_day_ms(start)));
    }
    if let Some(next_day) = criteria.end_date.and_then(|d| d.succ_opt()) {
        clauses.push("o.obs_time_ms < ?".into());
        values.push(Value::Integer(start_of_day_ms(next_day)));
    }
    if let Some(mode) = criteria.obs_mode {
        clauses.push("o.obs_mode = ?".into());
        values.push(Value::Text(mode.tag().to_string()));
    }
    if let Some(id) = criteria.observation_id {
        clauses.push("o.id = ?".into());
        values.push(Value::Integer(id));
    }
    if let Some(code) = &criteria.mpc_code {
        clauses.push("o.mpc_code = ? COLLATE NOCASE".into());
        values.push(Value::Text(code.clone()));
    }
    if !criteria.observer_orcids.is_empty() {
        // ORCIDs are stored as a JSON array; match the quoted credential.
        let any = vec!["instr(o.obs_orc_id, ?) > 0"; criteria.observer_orcids.len()].join(" OR ");
        clauses.push(format!("({any})"));
        for orcid in &criteria.observer_orcids {
            values.push(Value::Text(format!("\"{orcid}\"")));
        }
    }

    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), values)
    }
}

pub fn search_observations(conn: &Connection, criteria: &SearchCriteria) -> Result<Vec<Observation>, DbError> {
    let (clause, values) = filter_clause(criteria);
    let sql = format!("{SELECT_OBSERVATION}{clause}{ORDER_NEWEST_FIRST}");
    debug!(filters = values.len(), "Running observation search");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), observation_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn observations_by_ids(conn: &Connection, ids: &[i64]) -> Result<Vec<Observation>, DbError> {
    let mut found: HashMap<i64, Observation> = HashMap::with_capacity(ids.len());
    for chunk in ids.chunks(ID_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!("{SELECT_OBSERVATION} WHERE o.id IN ({placeholders})");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(chunk.iter()), observation_from_row)?;
        for row in rows {
            let obs = row?;
            found.insert(obs.id, obs);
        }
    }
    Ok(ids.iter().filter_map(|id| found.remove(id)).collect())
}

pub fn recent_observations(conn: &Connection, limit: usize) -> Result<Vec<Observation>, DbError> {
    let sql = format!("{SELECT_OBSERVATION}{ORDER_NEWEST_FIRST} LIMIT ?1");
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![limit], observation_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn all_observations(conn: &Connection) -> Result<Vec<Observation>, DbError> {
    let sql = format!("{SELECT_OBSERVATION}{ORDER_NEWEST_FIRST}");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], observation_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn count_rows(conn: &Connection, sql: &str) -> Result<u64, DbError> {
    let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(u64::try_from(n).unwrap_or_default())
}

pub fn count_observations(conn: &Connection) -> Result<u64, DbError> {
    count_rows(conn, "SELECT COUNT(*) FROM observations")
}

/// Landing page numbers. An empty store reports zeros without touching the
/// other tables.
pub fn observation_stats(conn: &Connection, latest: usize) -> Result<ObservationStats, DbError> {
    let observation_count = count_observations(conn)?;
    if observation_count == 0 {
        return Ok(ObservationStats::default());
    }
    Ok(ObservationStats {
        satellite_count: count_rows(conn, "SELECT COUNT(*) FROM satellites")?,
        observation_count,
        observer_count: count_rows(
            conn,
            "SELECT COUNT(*) FROM (SELECT DISTINCT location_id, obs_orc_id FROM observations)",
        )?,
        latest: recent_observations(conn, latest)?,
    })
}

/// Query backend over a SQLite file. The schema is created once by `open`;
/// each call then opens its own plain connection.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    path: PathBuf,
}

impl SqliteBackend {
    /// Opens (and if needed creates) the database so schema errors surface at start-up.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DbError> {
        let path = path.into();
        open_or_init(&path)?;
        Ok(Self { path })
    }

    pub fn connect(&self) -> Result<Connection, DbError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }
}

impl ObservationBackend for SqliteBackend {
    fn search(&self, criteria: &SearchCriteria) -> Result<Vec<Observation>, BackendError> {
        let conn = self.connect()?;
        Ok(search_observations(&conn, criteria)?)
    }

    fn fetch_by_ids(&self, ids: &[i64]) -> Result<Vec<Observation>, BackendError> {
        let conn = self.connect()?;
        Ok(observations_by_ids(&conn, ids)?)
    }

    fn recent(&self, limit: usize) -> Result<Vec<Observation>, BackendError> {
        let conn = self.connect()?;
        Ok(recent_observations(&conn, limit)?)
    }

    fn all(&self) -> Result<Vec<Observation>, BackendError> {
        let conn = self.connect()?;
        Ok(all_observations(&conn)?)
    }

    fn count(&self) -> Result<u64, BackendError> {
        let conn = self.connect()?;
        Ok(count_observations(&conn)?)
    }

    fn stats(&self, latest: usize) -> Result<ObservationStats, BackendError> {
        let conn = self.connect()?;
        Ok(observation_stats(&conn, latest)?)
    }
}
