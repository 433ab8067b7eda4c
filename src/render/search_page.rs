use std::fmt::Write as _;

use crate::api::csrf::FORM_FIELD;
use crate::api::download::serialize_obs_ids;
use crate::api::types::{ResultSet, SearchContext};
use crate::core::backend::ObservationStats;
use crate::core::observation::ObsMode;
use crate::forms::search::{Field, FormErrors, SearchFormInput, SAT_NAME_MAX_CHARS, SAT_NUMBER_MAX};
use crate::render::html::{escape, page};
use crate::render::table::{detail_modal, render_table, LATEST_TABLE, OBSERVATION_COLUMNS, OBSERVATION_TABLE};

fn csrf_input(token: &str) -> String {
    format!(r#"<input type="hidden" name="{FORM_FIELD}" value="{}">"#, escape(token))
}

fn field_errors(errors: &FormErrors, field: Field) -> String {
    errors
        .for_field(field)
        .iter()
        .map(|msg| format!(r#"<div class="invalid-feedback d-block">{}</div>"#, escape(msg)))
        .collect()
}

fn control(field: Field, value: &str, invalid: bool) -> String {
    let class = if invalid { "form-control is-invalid" } else { "form-control" };
    let name = field.name();
    let value = escape(value);
    match field {
        Field::SatNumber => format!(
            r#"<input type="number" class="{class} no-arrows" id="id_{name}" name="{name}" min="0" max="{SAT_NUMBER_MAX}" value="{value}">"#
        ),
        Field::ObservationId => format!(
            r#"<input type="number" class="{class} no-arrows" id="id_{name}" name="{name}" min="1" value="{value}">"#
        ),
        Field::StartDateRange | Field::EndDateRange => {
            format!(r#"<input type="date" class="{class}" id="id_{name}" name="{name}" value="{value}">"#)
        }
        Field::SatName => format!(
            r#"<input type="text" class="{class}" id="id_{name}" name="{name}" maxlength="{SAT_NAME_MAX_CHARS}" value="{value}">"#
        ),
        Field::MpcCode => {
            format!(r#"<input type="text" class="{class}" id="id_{name}" name="{name}" maxlength="3" value="{value}">"#)
        }
        Field::ObserverOrcid => {
            format!(r#"<input type="text" class="{class}" id="id_{name}" name="{name}" value="{value}">"#)
        }
        Field::ObsMode => obs_mode_select(&value, invalid),
    }
}

fn obs_mode_select(current: &str, invalid: bool) -> String {
    let class = if invalid { "form-select is-invalid" } else { "form-select" };
    let mut html = format!(r#"<select class="{class}" id="id_obs_mode" name="obs_mode"><option value="">Any</option>"#);
    for mode in ObsMode::ALL {
        let selected = if mode.tag().eq_ignore_ascii_case(current.trim()) { " selected" } else { "" };
        let _ = write!(html, r#"<option value="{}"{selected}>{}</option>"#, mode.tag(), mode.label());
    }
    html.push_str("</select>");
    html
}

const FORM_LAYOUT: [Field; 8] = [
    Field::SatName,
    Field::SatNumber,
    Field::StartDateRange,
    Field::EndDateRange,
    Field::ObsMode,
    Field::ObservationId,
    Field::MpcCode,
    Field::ObserverOrcid,
];

fn search_form(form: &SearchFormInput, errors: &FormErrors, csrf_token: &str) -> String {
    let mut html = String::from(r#"<form method="post" action="/search" class="row g-3 mb-4" id="search-form">"#);
    html.push_str(&csrf_input(csrf_token));
    for field in FORM_LAYOUT {
        let _ = write!(
            html,
            r#"<div class="col-md-3"><label for="id_{name}" class="form-label">{label}</label>{control}{errors}</div>"#,
            name = field.name(),
            label = field.label(),
            control = control(field, form.value(field), errors.has(field)),
            errors = field_errors(errors, field),
        );
    }
    html.push_str(r#"<div class="col-12"><button type="submit" class="btn btn-primary">Search</button></div></form>"#);
    html
}

fn download_form(ids: &[i64], csrf_token: &str) -> String {
    format!(
        r#"<form method="post" action="/download-results" id="download-form" class="mb-3">{csrf}<input type="hidden" name="obs_ids" value="{ids}"><button type="submit" class="btn btn-outline-secondary">Download Results</button></form>"#,
        csrf = csrf_input(csrf_token),
        ids = escape(&serialize_obs_ids(ids)),
    )
}

fn error_message(message: &str) -> String {
    format!(r#"<p class="text-center text-danger" id="search-error">{}</p>"#, escape(message))
}

/// Table, download form and detail modal for a non-empty result set.
fn results_section(results: &ResultSet, csrf_token: Option<&str>) -> String {
    let mut html = String::new();
    let _ = write!(html, r#"<p class="text-muted">{} observation(s) found.</p>"#, results.len());
    let ids = results.obs_ids();
    if let (Some(token), false) = (csrf_token, ids.is_empty()) {
        html.push_str(&download_form(&ids, token));
    }
    html.push_str(&render_table(results, &OBSERVATION_TABLE, OBSERVATION_COLUMNS));
    html.push_str(detail_modal());
    html
}

pub fn render_search_page(ctx: &SearchContext) -> String {
    let mut body = search_form(&ctx.form, &ctx.errors, &ctx.csrf_token);
    if let Some(error) = &ctx.error {
        body.push_str(&error_message(error));
    } else if !ctx.observations.is_empty() {
        body.push_str(&results_section(&ctx.observations, Some(&ctx.csrf_token)));
    } else if let Some(notice) = &ctx.notice {
        let _ = write!(body, r#"<p class="text-center text-muted" id="search-notice">{}</p>"#, escape(notice));
    }
    page("Search Observations", &body)
}

pub fn render_recent_page(results: &ResultSet, error: Option<&str>) -> String {
    let body = match error {
        Some(message) => error_message(message),
        None if results.is_empty() => r#"<p class="text-center text-muted">No observations yet.</p>"#.to_string(),
        None => results_section(results, None),
    };
    page("Recent Observations", &body)
}

fn stat_card(id: &str, label: &str, value: u64) -> String {
    format!(
        r#"<div class="col-md-4"><div class="card text-center"><div class="card-body"><div class="display-6" id="{id}">{value}</div><div class="text-muted">{label}</div></div></div></div>"#
    )
}

/// Landing page: headline counts, the latest observations and the full export link.
pub fn render_index_page(stats: &ObservationStats, latest: &ResultSet, error: Option<&str>) -> String {
    let mut body = String::from(r#"<div class="row g-3 mb-4">"#);
    body.push_str(&stat_card("satellite-count", "Satellites", stats.satellite_count));
    body.push_str(&stat_card("observation-count", "Observations", stats.observation_count));
    body.push_str(&stat_card("observer-count", "Observers", stats.observer_count));
    body.push_str("</div>");
    body.push_str(
        r#"<p><a class="btn btn-primary me-2" href="/search">Search Observations</a><a class="btn btn-outline-secondary me-2" href="/view">View Recent</a><a class="btn btn-outline-secondary" href="/download-all" id="download-all">Download All</a></p>"#,
    );
    body.push_str(r#"<h2 class="h4 mt-4">Latest Observations</h2>"#);
    match error {
        Some(message) => body.push_str(&error_message(message)),
        None if latest.is_empty() => {
            body.push_str(r#"<p class="text-center text-muted">No observations yet.</p>"#)
        }
        None => {
            body.push_str(&render_table(latest, &LATEST_TABLE, OBSERVATION_COLUMNS));
            body.push_str(detail_modal());
        }
    }
    page("Satellite Observations", &body)
}

pub fn render_forbidden(reason: &str) -> String {
    let body = format!(
        r#"<p class="text-center text-danger">Forbidden: {}.</p><p class="text-center"><a href="/search">Back to search</a></p>"#,
        escape(reason)
    );
    page("Request Rejected", &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::search::validate;
    use crate::render::table::tests::{cells, observation};

    const TOKEN: &str = "0123456789abcdef0123456789abcdef";

    fn hidden_obs_ids(html: &str) -> Option<String> {
        let marker = r#"name="obs_ids" value=""#;
        let start = html.find(marker)? + marker.len();
        let end = html[start..].find('"')?;
        Some(html[start..start + end].to_string())
    }

    fn row_ids(html: &str) -> Vec<String> {
        html.split(r#"<tr class="observation-row" data-id=""#)
            .skip(1)
            .map(|s| s[..s.find('"').unwrap()].to_string())
            .collect()
    }

    #[test]
    fn download_ids_match_rendered_rows() {
        let mut ctx = SearchContext::new(TOKEN);
        ctx.observations = ResultSet::from_observations(vec![observation(9), observation(4), observation(12)]);
        let html = render_search_page(&ctx);

        let rendered = row_ids(&html);
        assert_eq!(rendered, vec!["9", "4", "12"]);
        assert_eq!(hidden_obs_ids(&html).unwrap(), rendered.join(","));
        assert_eq!(cells(&html).len(), 3);
        assert_eq!(html.matches(r#"id="download-form""#).count(), 1);
    }

    #[test]
    fn empty_results_omit_table_and_download() {
        let mut ctx = SearchContext::new(TOKEN);
        ctx.notice = Some("No observations found.".into());
        let html = render_search_page(&ctx);
        assert!(!html.contains("<table"));
        assert!(!html.contains("download-form"));
        assert!(hidden_obs_ids(&html).is_none());
        assert!(html.contains("No observations found."));
    }

    #[test]
    fn error_suppresses_table_and_appears_once() {
        let mut ctx = SearchContext::new(TOKEN);
        ctx.observations = ResultSet::from_observations(vec![observation(1)]);
        ctx.error = Some("Search failed. Please try again later.".into());
        let html = render_search_page(&ctx);
        assert_eq!(html.matches("Search failed. Please try again later.").count(), 1);
        assert!(!html.contains("<table"));
        assert!(!html.contains("download-form"));
    }

    #[test]
    fn field_errors_render_under_inputs_with_submitted_values() {
        let form = SearchFormInput {
            observer_orcid: "12-34".into(),
            sat_name: "\"ISS\"".into(),
            ..Default::default()
        };
        let errors = validate(&form).unwrap_err();
        let mut ctx = SearchContext::new(TOKEN);
        ctx.form = form;
        ctx.errors = errors;
        let html = render_search_page(&ctx);

        assert!(html.contains(r#"name="observer_orcid" value="12-34"><div class="invalid-feedback d-block">Invalid ORCID.</div>"#));
        assert!(html.contains(r#"value="&quot;ISS&quot;""#));
        assert!(!html.contains("<table"));
        assert!(html.contains(&format!(r#"name="csrfmiddlewaretoken" value="{TOKEN}""#)));
    }

    #[test]
    fn selected_mode_is_preserved() {
        let mut ctx = SearchContext::new(TOKEN);
        ctx.form.obs_mode = "cmos".into();
        let html = render_search_page(&ctx);
        assert!(html.contains(r#"<option value="CMOS" selected>CMOS</option>"#));
        assert!(html.contains(r#"<option value="">Any</option>"#));
    }

    #[test]
    fn recent_page_has_no_download_form() {
        let results = ResultSet::from_observations(vec![observation(1)]);
        let html = render_recent_page(&results, None);
        assert!(html.contains("<table"));
        assert!(!html.contains("download-form"));
    }

    #[test]
    fn index_page_shows_counts_and_latest_rows() {
        let stats = ObservationStats {
            satellite_count: 2,
            observation_count: 3,
            observer_count: 1,
            latest: Vec::new(),
        };
        let latest = ResultSet::from_observations(vec![observation(3), observation(2)]);
        let html = render_index_page(&stats, &latest, None);
        assert!(html.contains(r#"id="satellite-count">2<"#));
        assert!(html.contains(r#"id="observation-count">3<"#));
        assert!(html.contains(r#"id="observer-count">1<"#));
        assert_eq!(row_ids(&html), vec!["3", "2"]);
        assert!(html.contains(r#"id="observation-modal""#));
        assert!(html.contains(r#"href="/download-all""#));
        assert!(!html.contains("download-form"));
    }

    #[test]
    fn index_page_error_replaces_table() {
        let html = render_index_page(&ObservationStats::default(), &ResultSet::default(), Some("Statistics are unavailable."));
        assert!(html.contains(r#"id="observation-count">0<"#));
        assert_eq!(html.matches("Statistics are unavailable.").count(), 1);
        assert!(!html.contains("<table"));
    }
}
