use chrono::NaiveDate;

use crate::core::observation::ObsMode;

/// Validated search filters. `None` means no filter on that dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchCriteria {
    /// Matched case-insensitively against the whole satellite name.
    pub sat_name: Option<String>,
    pub sat_number: Option<u32>,
    /// Inclusive, compared against the observation time in UTC.
    pub start_date: Option<NaiveDate>,
    /// Inclusive: the whole end day is part of the range.
    pub end_date: Option<NaiveDate>,
    pub obs_mode: Option<ObsMode>,
    pub observation_id: Option<i64>,
    pub mpc_code: Option<String>,
    /// An observation matches when it lists any of these ORCIDs.
    pub observer_orcids: Vec<String>,
}

impl SearchCriteria {
    pub fn is_unfiltered(&self) -> bool {
        self == &SearchCriteria::default()
    }
}
