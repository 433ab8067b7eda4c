use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::observation::{ObsMode, Observation};
use crate::forms::search::{FormErrors, SearchFormInput};

/// Projection shown in the row detail modal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationDetailDto {
    pub id: i64,
    pub date_added: DateTime<Utc>,
    pub obs_time_utc: DateTime<Utc>,
    pub obs_time_uncert_sec: f64,
    pub sat_name: String,
    pub sat_number: u32,
    pub intl_designator: Option<String>,
    pub apparent_mag: Option<f64>,
    pub apparent_mag_uncert: Option<f64>,
    pub limiting_magnitude: f64,
    pub obs_lat_deg: f64,
    pub obs_long_deg: f64,
    pub obs_alt_m: f64,
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

impl From<&Observation> for ObservationDetailDto {
    fn from(o: &Observation) -> Self {
        Self {
            id: o.id,
            date_added: o.date_added,
            obs_time_utc: o.obs_time_utc,
            obs_time_uncert_sec: o.obs_time_uncert_sec,
            sat_name: o.satellite.sat_name.clone(),
            sat_number: o.satellite.sat_number,
            intl_designator: o.satellite.intl_designator.clone(),
            apparent_mag: o.apparent_mag,
            apparent_mag_uncert: o.apparent_mag_uncert,
            limiting_magnitude: o.limiting_magnitude,
            obs_lat_deg: o.location.obs_lat_deg,
            obs_long_deg: o.location.obs_long_deg,
            obs_alt_m: o.location.obs_alt_m,
            obs_mode: o.obs_mode,
            obs_filter: o.obs_filter.clone(),
            instrument: o.instrument.clone(),
            obs_orc_id: o.obs_orc_id.clone(),
            sat_ra_deg: o.sat_ra_deg,
            sat_dec_deg: o.sat_dec_deg,
            range_to_sat_km: o.range_to_sat_km,
            range_rate_sat_km_s: o.range_rate_sat_km_s,
            phase_angle: o.phase_angle,
            illuminated: o.illuminated,
            comments: o.comments.clone(),
            data_archive_link: o.data_archive_link.clone(),
            mpc_code: o.mpc_code.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResultRow {
    pub observation: Observation,
    pub detail: ObservationDetailDto,
}

/// Rows of one search, in display order.
///
/// The download identifier list is always derived from the rows, so it cannot
/// drift from what was rendered.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    rows: Vec<ResultRow>,
}

impl ResultSet {
    pub fn from_observations(observations: Vec<Observation>) -> Self {
        let rows = observations
            .into_iter()
            .map(|observation| {
                let detail = ObservationDetailDto::from(&observation);
                ResultRow { observation, detail }
            })
            .collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn obs_ids(&self) -> Vec<i64> {
        self.rows.iter().map(|r| r.observation.id).collect()
    }
}

/// Everything the search page template needs for one response.
#[derive(Debug, Clone, Default)]
pub struct SearchContext {
    pub form: SearchFormInput,
    pub errors: FormErrors,
    pub observations: ResultSet,
    /// Page-level failure; suppresses the table and the download form.
    pub error: Option<String>,
    /// Informational message, e.g. when a valid search matched nothing.
    pub notice: Option<String>,
    pub csrf_token: String,
}

impl SearchContext {
    pub fn new(csrf_token: impl Into<String>) -> Self {
        Self {
            csrf_token: csrf_token.into(),
            ..Default::default()
        }
    }
}
