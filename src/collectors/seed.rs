use std::fs;
use std::path::Path;

use rusqlite::Connection;
use thiserror::Error;
use tracing::{info, warn};

use crate::forms::search::parse_orcids;
use crate::utils::db::{count_observations, insert_observation, DbError, NewObservation};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid seed file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Db(#[from] DbError),
}

impl From<rusqlite::Error> for SeedError {
    fn from(e: rusqlite::Error) -> Self {
        SeedError::Db(DbError::Sql(e))
    }
}

/// Loads a JSON array of observations into an empty store.
/// Returns how many were inserted; a populated store is left untouched.
pub fn load_seed_file(conn: &mut Connection, path: &Path) -> Result<usize, SeedError> {
    let existing = count_observations(conn)?;
    if existing > 0 {
        info!(existing, "Store already populated, skipping seed");
        return Ok(0);
    }

    let content = fs::read_to_string(path)?;
    let observations: Vec<NewObservation> = serde_json::from_str(&content)?;

    let tx = conn.transaction()?;
    let mut inserted = 0usize;
    for (index, obs) in observations.iter().enumerate() {
        if obs.obs_orc_id.is_empty() || parse_orcids(&obs.obs_orc_id.join(",")).is_err() {
            warn!(index, "Skipping seed observation with missing or malformed ORCID");
            continue;
        }
        insert_observation(&tx, obs)?;
        inserted += 1;
    }
    tx.commit()?;

    info!(inserted, path = %path.display(), "Seeded observations");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::load_seed_file;
    use crate::utils::db::{count_observations, open_or_init};
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    const SEED: &str = r#"[
        {
            "date_added": "2024-05-10T12:00:00Z",
            "obs_time_utc": "2024-05-09T03:15:27.120Z",
            "satellite": { "sat_name": "STARLINK-1600", "sat_number": 46161 },
            "apparent_mag": 5.8,
            "limiting_magnitude": 9.0,
            "location": { "obs_lat_deg": 32.2226, "obs_long_deg": -110.9747, "obs_alt_m": 728.0 },
            "obs_mode": "CCD",
            "obs_orc_id": ["0000-0001-2345-6789"]
        },
        {
            "obs_time_utc": "2024-05-09T03:20:00Z",
            "satellite": { "sat_name": "BLUEWALKER 3", "sat_number": 53807 },
            "limiting_magnitude": 6.0,
            "location": { "obs_lat_deg": 32.2226, "obs_long_deg": -110.9747, "obs_alt_m": 728.0 },
            "obs_mode": "VISUAL",
            "obs_orc_id": ["bogus"]
        }
    ]"#;

    #[test]
    fn seeds_empty_store_once() {
        let dir = TempDir::new().unwrap();
        let mut conn = open_or_init(&dir.path().join("obs.sqlite")).unwrap();
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{SEED}").unwrap();

        assert_eq!(load_seed_file(&mut conn, file.path()).unwrap(), 1);
        assert_eq!(count_observations(&conn).unwrap(), 1);
        assert_eq!(load_seed_file(&mut conn, file.path()).unwrap(), 0);
    }

    #[test]
    fn rejects_malformed_file() {
        let dir = TempDir::new().unwrap();
        let mut conn = open_or_init(&dir.path().join("obs.sqlite")).unwrap();
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(load_seed_file(&mut conn, file.path()).is_err());
    }
}
