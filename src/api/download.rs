use thiserror::Error;

use crate::core::observation::Observation;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdListError {
    #[error("no observation ids submitted")]
    Empty,
    #[error("invalid observation id: {0:?}")]
    Invalid(String),
}

pub const RESULTS_FILENAME: &str = "satellite_observations_search_results.csv";

pub const ALL_RESULTS_FILENAME: &str = "satellite_observations_all.csv";

/// Upload column order, minus the submitter's email, with the store id first.
const CSV_HEADER: [&str; 25] = [
    "observation_id",
    "satellite_name",
    "norad_cat_id",
    "observation_time_utc",
    "observation_time_uncertainty_sec",
    "apparent_magnitude",
    "apparent_magnitude_uncertainty",
    "observer_latitude_deg",
    "observer_longitude_deg",
    "observer_altitude_m",
    "limiting_magnitude",
    "instrument",
    "observing_mode",
    "observing_filter",
    "observer_orcid",
    "satellite_right_ascension_deg",
    "satellite_declination_deg",
    "range_to_satellite_km",
    "range_rate_of_satellite_km_per_sec",
    "comments",
    "data_archive_link",
    "mpc_code",
    "phase_angle_deg",
    "illuminated",
    "international_designator",
];

/// Value of the hidden `obs_ids` field: comma-separated, in row order.
pub fn serialize_obs_ids(ids: &[i64]) -> String {
    ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",")
}

/// Parses an `obs_ids` value. Surrounding brackets and whitespace are tolerated
/// so a list pasted as `[1, 2, 3]` is accepted too.
pub fn parse_obs_ids(raw: &str) -> Result<Vec<i64>, IdListError> {
    let inner = raw.trim().trim_start_matches('[').trim_end_matches(']').trim();
    if inner.is_empty() {
        return Err(IdListError::Empty);
    }
    inner
        .split(',')
        .map(str::trim)
        .map(|part| match part.parse::<i64>() {
            Ok(id) if id > 0 => Ok(id),
            _ => Err(IdListError::Invalid(part.to_string())),
        })
        .collect()
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_line(fields: &[String]) -> String {
    let mut line = fields.iter().map(|f| csv_field(f)).collect::<Vec<_>>().join(",");
    line.push_str("\r\n");
    line
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// CSV listing of the given observations, one line per observation.
pub fn observations_csv(observations: &[Observation]) -> String {
    let header: Vec<String> = CSV_HEADER.iter().map(|h| h.to_string()).collect();
    let mut out = csv_line(&header);
    for o in observations {
        let fields = [
            o.id.to_string(),
            o.satellite.sat_name.clone(),
            o.satellite.sat_number.to_string(),
            o.obs_time_utc.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            o.obs_time_uncert_sec.to_string(),
            optional(o.apparent_mag),
            optional(o.apparent_mag_uncert),
            o.location.obs_lat_deg.to_string(),
            o.location.obs_long_deg.to_string(),
            o.location.obs_alt_m.to_string(),
            o.limiting_magnitude.to_string(),
            o.instrument.clone(),
            o.obs_mode.tag().to_string(),
            o.obs_filter.clone(),
            o.obs_orc_id.join(", "),
            optional(o.sat_ra_deg),
            optional(o.sat_dec_deg),
            optional(o.range_to_sat_km),
            optional(o.range_rate_sat_km_s),
            o.comments.clone().unwrap_or_default(),
            o.data_archive_link.clone().unwrap_or_default(),
            o.mpc_code.clone().unwrap_or_default(),
            optional(o.phase_angle),
            optional(o.illuminated),
            o.satellite.intl_designator.clone().unwrap_or_default(),
        ];
        out.push_str(&csv_line(&fields));
    }
    out
}
