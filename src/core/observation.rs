use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How an observation was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ObsMode {
    Visual,
    Binoculars,
    Ccd,
    Cmos,
    Other,
}

impl ObsMode {
    pub const ALL: [ObsMode; 5] = [
        ObsMode::Visual,
        ObsMode::Binoculars,
        ObsMode::Ccd,
        ObsMode::Cmos,
        ObsMode::Other,
    ];

    /// Tag stored in the database and shown in the results table.
    pub fn tag(self) -> &'static str {
        match self {
            ObsMode::Visual => "VISUAL",
            ObsMode::Binoculars => "BINOCULARS",
            ObsMode::Ccd => "CCD",
            ObsMode::Cmos => "CMOS",
            ObsMode::Other => "OTHER",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ObsMode::Visual => "Visual",
            ObsMode::Binoculars => "Binoculars",
            ObsMode::Ccd => "CCD",
            ObsMode::Cmos => "CMOS",
            ObsMode::Other => "Other",
        }
    }
}

impl fmt::Display for ObsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown observation mode: {0}")]
pub struct UnknownObsMode(pub String);

impl FromStr for ObsMode {
    type Err = UnknownObsMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ObsMode::ALL
            .into_iter()
            .find(|m| m.tag().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownObsMode(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Satellite {
    pub sat_name: String,
    pub sat_number: u32,
    #[serde(default)]
    pub intl_designator: Option<String>,
}

/// Observer site. Altitude is metres above sea level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub obs_lat_deg: f64,
    pub obs_long_deg: f64,
    pub obs_alt_m: f64,
}

/// A single recorded sighting as read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub id: i64,
    pub date_added: DateTime<Utc>,
    pub obs_time_utc: DateTime<Utc>,
    pub obs_time_uncert_sec: f64,
    pub satellite: Satellite,
    /// Absent when the satellite was not detected.
    pub apparent_mag: Option<f64>,
    pub apparent_mag_uncert: Option<f64>,
    pub limiting_magnitude: f64,
    pub location: Location,
    pub obs_mode: ObsMode,
    pub obs_filter: String,
    pub instrument: String,
    pub obs_orc_id: Vec<String>,
    pub sat_ra_deg: Option<f64>,
    pub sat_dec_deg: Option<f64>,
    pub range_to_sat_km: Option<f64>,
    pub range_rate_sat_km_s: Option<f64>,
    pub phase_angle: Option<f64>,
    pub illuminated: Option<bool>,
    pub comments: Option<String>,
    pub data_archive_link: Option<String>,
    pub mpc_code: Option<String>,
}

impl Observation {
    /// The credential shown in the results table.
    pub fn primary_orcid(&self) -> Option<&str> {
        self.obs_orc_id.first().map(String::as_str)
    }
}
