//! Validation for the observation search form.
//!
//! Every field is optional; an empty value means "no filter". Validation either
//! yields [`SearchCriteria`] or per-field messages that are shown under the
//! offending input.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Deserialize;

use crate::core::criteria::SearchCriteria;
use crate::core::observation::ObsMode;

pub const SAT_NAME_MAX_CHARS: usize = 200;
pub const SAT_NUMBER_MAX: i64 = 99_999;

fn orcid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]{4}-[0-9]{4}-[0-9]{4}-[0-9]{4}$").expect("valid ORCID pattern"))
}

fn mpc_code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9]{3}$").expect("valid MPC code pattern"))
}

/// Raw submitted values, exactly as they arrived.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchFormInput {
    #[serde(default)]
    pub sat_name: String,
    #[serde(default)]
    pub sat_number: String,
    #[serde(default)]
    pub start_date_range: String,
    #[serde(default)]
    pub end_date_range: String,
    #[serde(default)]
    pub obs_mode: String,
    #[serde(default)]
    pub observation_id: String,
    #[serde(default)]
    pub mpc_code: String,
    #[serde(default)]
    pub observer_orcid: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    SatName,
    SatNumber,
    StartDateRange,
    EndDateRange,
    ObsMode,
    ObservationId,
    MpcCode,
    ObserverOrcid,
}

impl Field {
    /// Form control name.
    pub fn name(self) -> &'static str {
        match self {
            Field::SatName => "sat_name",
            Field::SatNumber => "sat_number",
            Field::StartDateRange => "start_date_range",
            Field::EndDateRange => "end_date_range",
            Field::ObsMode => "obs_mode",
            Field::ObservationId => "observation_id",
            Field::MpcCode => "mpc_code",
            Field::ObserverOrcid => "observer_orcid",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Field::SatName => "Satellite Name",
            Field::SatNumber => "Satellite Number",
            Field::StartDateRange => "Start Date",
            Field::EndDateRange => "End Date",
            Field::ObsMode => "Observation Mode",
            Field::ObservationId => "Observation ID",
            Field::MpcCode => "MPC Code",
            Field::ObserverOrcid => "Observer ORCID",
        }
    }
}

impl SearchFormInput {
    pub fn value(&self, field: Field) -> &str {
        match field {
            Field::SatName => &self.sat_name,
            Field::SatNumber => &self.sat_number,
            Field::StartDateRange => &self.start_date_range,
            Field::EndDateRange => &self.end_date_range,
            Field::ObsMode => &self.obs_mode,
            Field::ObservationId => &self.observation_id,
            Field::MpcCode => &self.mpc_code,
            Field::ObserverOrcid => &self.observer_orcid,
        }
    }
}

/// Field-level validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: BTreeMap<Field, Vec<String>>,
}

impl FormErrors {
    pub fn add(&mut self, field: Field, message: impl Into<String>) {
        self.fields.entry(field).or_default().push(message.into());
    }

    pub fn for_field(&self, field: Field) -> &[String] {
        self.fields.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, field: Field) -> bool {
        !self.for_field(field).is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.values().map(Vec::len).sum()
    }
}

fn present(raw: &str) -> Option<&str> {
    let v = raw.trim();
    (!v.is_empty()).then_some(v)
}

fn parse_whole_number(raw: &str) -> Result<i64, String> {
    raw.parse::<i64>().map_err(|_| "Enter a whole number.".to_string())
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| "Enter a valid date.".to_string())
}

/// Splits a comma-separated ORCID list; every entry must be a well-formed ORCID.
pub fn parse_orcids(raw: &str) -> Result<Vec<String>, String> {
    raw.split(',')
        .map(str::trim)
        .map(|id| {
            if orcid_pattern().is_match(id) {
                Ok(id.to_string())
            } else {
                Err("Invalid ORCID.".to_string())
            }
        })
        .collect()
}

/// Validates the raw form into search criteria.
pub fn validate(input: &SearchFormInput) -> Result<SearchCriteria, FormErrors> {
    let mut errors = FormErrors::default();
    let mut criteria = SearchCriteria::default();

    if let Some(name) = present(&input.sat_name) {
        let chars = name.chars().count();
        if chars > SAT_NAME_MAX_CHARS {
            errors.add(
                Field::SatName,
                format!("Ensure this value has at most {SAT_NAME_MAX_CHARS} characters (it has {chars})."),
            );
        } else {
            criteria.sat_name = Some(name.to_string());
        }
    }

    if let Some(raw) = present(&input.sat_number) {
        match parse_whole_number(raw) {
            Ok(n) if n < 0 => errors.add(Field::SatNumber, "Ensure this value is greater than or equal to 0."),
            Ok(n) if n > SAT_NUMBER_MAX => errors.add(
                Field::SatNumber,
                format!("Ensure this value is less than or equal to {SAT_NUMBER_MAX}."),
            ),
            Ok(n) => criteria.sat_number = u32::try_from(n).ok(),
            Err(msg) => errors.add(Field::SatNumber, msg),
        }
    }

    if let Some(raw) = present(&input.start_date_range) {
        match parse_date(raw) {
            Ok(d) => criteria.start_date = Some(d),
            Err(msg) => errors.add(Field::StartDateRange, msg),
        }
    }
    if let Some(raw) = present(&input.end_date_range) {
        match parse_date(raw) {
            Ok(d) => criteria.end_date = Some(d),
            Err(msg) => errors.add(Field::EndDateRange, msg),
        }
    }
    if let (Some(start), Some(end)) = (criteria.start_date, criteria.end_date) {
        if start > end {
            errors.add(Field::EndDateRange, "End date must not be before start date.");
        }
    }

    if let Some(raw) = present(&input.obs_mode) {
        match raw.parse::<ObsMode>() {
            Ok(mode) => criteria.obs_mode = Some(mode),
            Err(_) => errors.add(
                Field::ObsMode,
                format!("Select a valid choice. {raw} is not one of the available choices."),
            ),
        }
    }

    if let Some(raw) = present(&input.observation_id) {
        match parse_whole_number(raw) {
            Ok(n) if n < 1 => errors.add(Field::ObservationId, "Ensure this value is greater than or equal to 1."),
            Ok(n) => criteria.observation_id = Some(n),
            Err(msg) => errors.add(Field::ObservationId, msg),
        }
    }

    if let Some(raw) = present(&input.mpc_code) {
        if mpc_code_pattern().is_match(raw) {
            criteria.mpc_code = Some(raw.to_ascii_uppercase());
        } else {
            errors.add(Field::MpcCode, "Enter a valid MPC code (three letters or digits).");
        }
    }

    if let Some(raw) = present(&input.observer_orcid) {
        match parse_orcids(raw) {
            Ok(ids) => criteria.observer_orcids = ids,
            Err(msg) => errors.add(Field::ObserverOrcid, msg),
        }
    }

    if errors.is_empty() {
        Ok(criteria)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> SearchFormInput {
        SearchFormInput::default()
    }

    #[test]
    fn empty_form_is_unfiltered() {
        let criteria = validate(&input()).unwrap();
        assert!(criteria.is_unfiltered());
    }

    #[test]
    fn normalizes_valid_fields() {
        let form = SearchFormInput {
            sat_name: "  STARLINK-1600 ".into(),
            sat_number: "46161".into(),
            start_date_range: "2024-05-01".into(),
            end_date_range: "2024-05-31".into(),
            obs_mode: "ccd".into(),
            observation_id: "42".into(),
            mpc_code: "g37".into(),
            observer_orcid: "0000-0001-2345-6789, 0000-0002-1111-2222".into(),
        };
        let c = validate(&form).unwrap();
        assert_eq!(c.sat_name.as_deref(), Some("STARLINK-1600"));
        assert_eq!(c.sat_number, Some(46161));
        assert_eq!(c.start_date, NaiveDate::from_ymd_opt(2024, 5, 1));
        assert_eq!(c.obs_mode, Some(ObsMode::Ccd));
        assert_eq!(c.observation_id, Some(42));
        assert_eq!(c.mpc_code.as_deref(), Some("G37"));
        assert_eq!(c.observer_orcids, vec!["0000-0001-2345-6789", "0000-0002-1111-2222"]);
    }

    #[test]
    fn malformed_orcid_is_rejected() {
        for raw in ["0000-0001-2345", "0000-0001-2345-678X", "0000-0001-2345-6789,", "abcd"] {
            let form = SearchFormInput {
                observer_orcid: raw.into(),
                ..input()
            };
            let errors = validate(&form).unwrap_err();
            assert_eq!(errors.for_field(Field::ObserverOrcid), ["Invalid ORCID."], "input {raw:?}");
        }
    }

    #[test]
    fn start_after_end_is_reported_on_end_date() {
        let form = SearchFormInput {
            start_date_range: "2024-06-02".into(),
            end_date_range: "2024-06-01".into(),
            ..input()
        };
        let errors = validate(&form).unwrap_err();
        assert!(errors.has(Field::EndDateRange));
        assert!(!errors.has(Field::StartDateRange));

        let same_day = SearchFormInput {
            start_date_range: "2024-06-01".into(),
            end_date_range: "2024-06-01".into(),
            ..input()
        };
        assert!(validate(&same_day).is_ok());
    }

    #[test]
    fn numeric_fields_are_bounded() {
        let form = SearchFormInput {
            sat_number: "100000".into(),
            observation_id: "0".into(),
            start_date_range: "05/01/2024".into(),
            ..input()
        };
        let errors = validate(&form).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(
            errors.for_field(Field::SatNumber),
            ["Ensure this value is less than or equal to 99999."]
        );
        assert_eq!(errors.for_field(Field::StartDateRange), ["Enter a valid date."]);

        let not_a_number = SearchFormInput {
            sat_number: "25544a".into(),
            ..input()
        };
        assert_eq!(
            validate(&not_a_number).unwrap_err().for_field(Field::SatNumber),
            ["Enter a whole number."]
        );
    }

    #[test]
    fn unknown_mode_and_long_name_are_rejected() {
        let form = SearchFormInput {
            sat_name: "X".repeat(201),
            obs_mode: "TELESCOPE".into(),
            mpc_code: "6955".into(),
            ..input()
        };
        let errors = validate(&form).unwrap_err();
        assert!(errors.has(Field::SatName));
        assert!(errors.has(Field::ObsMode));
        assert!(errors.has(Field::MpcCode));
    }
}
