//! Results table markup for the client-side table widget.
//!
//! Sorting, pagination and free-text search happen in the browser. The server
//! only emits rows plus column metadata as `data-*` attributes the widget reads.

use std::fmt::Write as _;

use tracing::warn;

use crate::api::types::{ResultRow, ResultSet};
use crate::core::format::{display_datetime, optional_decimal, sort_timestamp, trimmed_decimal};
use crate::core::observation::Observation;
use crate::render::html::escape;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    Rows(u32),
    All,
}

pub struct Column {
    pub field: &'static str,
    pub title: &'static str,
    pub sortable: bool,
    pub visible: bool,
    /// Field holding the value this column sorts by, when it differs from the displayed text.
    pub sort_by: Option<&'static str>,
    pub value: fn(&Observation) -> String,
}

pub struct TableOptions {
    pub id: &'static str,
    /// Empty turns pagination off.
    pub page_sizes: &'static [PageSize],
    pub sort_name: &'static str,
    pub sort_descending: bool,
    pub search: bool,
}

pub const OBSERVATION_TABLE: TableOptions = TableOptions {
    id: "results-table",
    page_sizes: &[
        PageSize::Rows(25),
        PageSize::Rows(50),
        PageSize::Rows(100),
        PageSize::Rows(200),
        PageSize::All,
    ],
    sort_name: "date_added",
    sort_descending: true,
    search: true,
};

/// Short newest-first listing on the landing page.
pub const LATEST_TABLE: TableOptions = TableOptions {
    id: "latest-table",
    page_sizes: &[],
    sort_name: "date_added",
    sort_descending: true,
    search: false,
};

fn date_added_ts(o: &Observation) -> String {
    sort_timestamp(&o.date_added).to_string()
}

fn date_added(o: &Observation) -> String {
    display_datetime(&o.date_added)
}

fn sat_name(o: &Observation) -> String {
    o.satellite.sat_name.clone()
}

fn sat_number(o: &Observation) -> String {
    o.satellite.sat_number.to_string()
}

fn obs_time_ts(o: &Observation) -> String {
    sort_timestamp(&o.obs_time_utc).to_string()
}

fn obs_time(o: &Observation) -> String {
    display_datetime(&o.obs_time_utc)
}

fn apparent_mag(o: &Observation) -> String {
    optional_decimal(o.apparent_mag)
}

fn obs_lat(o: &Observation) -> String {
    trimmed_decimal(o.location.obs_lat_deg)
}

fn obs_long(o: &Observation) -> String {
    trimmed_decimal(o.location.obs_long_deg)
}

fn obs_alt(o: &Observation) -> String {
    trimmed_decimal(o.location.obs_alt_m)
}

fn obs_mode(o: &Observation) -> String {
    o.obs_mode.tag().to_string()
}

fn observer_orcid(o: &Observation) -> String {
    o.primary_orcid().unwrap_or_default().to_string()
}

pub const OBSERVATION_COLUMNS: &[Column] = &[
    Column { field: "date_added_ts", title: "Date Added (timestamp)", sortable: false, visible: false, sort_by: None, value: date_added_ts },
    Column { field: "date_added", title: "Date Added", sortable: true, visible: true, sort_by: Some("date_added_ts"), value: date_added },
    Column { field: "sat_name", title: "Satellite Name", sortable: true, visible: true, sort_by: None, value: sat_name },
    Column { field: "sat_number", title: "Satellite Number", sortable: true, visible: true, sort_by: None, value: sat_number },
    Column { field: "obs_time_ts", title: "Date Observed (timestamp)", sortable: false, visible: false, sort_by: None, value: obs_time_ts },
    Column { field: "obs_time", title: "Date Observed", sortable: true, visible: true, sort_by: Some("obs_time_ts"), value: obs_time },
    Column { field: "apparent_mag", title: "Apparent Magnitude", sortable: true, visible: true, sort_by: None, value: apparent_mag },
    Column { field: "obs_lat_deg", title: "Observer Latitude", sortable: true, visible: true, sort_by: None, value: obs_lat },
    Column { field: "obs_long_deg", title: "Observer Longitude", sortable: true, visible: true, sort_by: None, value: obs_long },
    Column { field: "obs_alt_m", title: "Observer Altitude", sortable: true, visible: true, sort_by: None, value: obs_alt },
    Column { field: "obs_mode", title: "Observation Mode", sortable: true, visible: true, sort_by: None, value: obs_mode },
    Column { field: "observer_orcid", title: "Observer ORCID", sortable: true, visible: true, sort_by: None, value: observer_orcid },
];

fn page_list(sizes: &[PageSize]) -> String {
    let items: Vec<String> = sizes
        .iter()
        .map(|s| match s {
            PageSize::Rows(n) => n.to_string(),
            PageSize::All => "All".to_string(),
        })
        .collect();
    format!("[{}]", items.join(", "))
}

fn header_cell(col: &Column) -> String {
    let mut th = format!(r#"<th data-field="{}""#, col.field);
    if col.sortable {
        th.push_str(r#" data-sortable="true""#);
    }
    if !col.visible {
        th.push_str(r#" data-visible="false""#);
    }
    if let Some(sort_by) = col.sort_by {
        let _ = write!(th, r#" data-sort-name="{sort_by}""#);
    }
    let _ = write!(th, ">{}</th>", escape(col.title));
    th
}

fn body_row(row: &ResultRow, columns: &[Column]) -> String {
    // A serialization failure only loses the modal payload, never the row.
    let detail = serde_json::to_string(&row.detail).unwrap_or_else(|e| {
        warn!(error = %e, id = row.observation.id, "Failed to serialize observation detail");
        "{}".to_string()
    });
    let mut tr = format!(
        r##"<tr class="observation-row" data-id="{}" data-observation="{}" data-bs-toggle="modal" data-bs-target="#observation-modal">"##,
        row.observation.id,
        escape(&detail),
    );
    for col in columns {
        let _ = write!(tr, "<td>{}</td>", escape(&(col.value)(&row.observation)));
    }
    tr.push_str("</tr>");
    tr
}

/// Renders the widget-configured table for a non-empty result set.
pub fn render_table(results: &ResultSet, options: &TableOptions, columns: &[Column]) -> String {
    let mut html = format!(
        r#"<table id="{id}" class="table table-striped table-hover" data-toggle="table" data-search="{search}" data-sort-name="{sort}" data-sort-order="{order}""#,
        id = options.id,
        search = options.search,
        sort = options.sort_name,
        order = if options.sort_descending { "desc" } else { "asc" },
    );
    match options.page_sizes.first() {
        None => html.push_str(r#" data-pagination="false""#),
        Some(first) => {
            let first = match first {
                PageSize::Rows(n) => n.to_string(),
                PageSize::All => "All".to_string(),
            };
            let _ = write!(
                html,
                r#" data-pagination="true" data-page-size="{first}" data-page-list="{}""#,
                page_list(options.page_sizes)
            );
        }
    }
    html.push('>');
    html.push_str("\n<thead><tr>");
    for col in columns {
        html.push_str(&header_cell(col));
    }
    html.push_str("</tr></thead>\n<tbody>\n");
    for row in results.rows() {
        html.push_str(&body_row(row, columns));
        html.push('\n');
    }
    html.push_str("</tbody>\n</table>");
    html
}

/// Empty shell filled in by `observation-modal.js` from the activated row.
pub fn detail_modal() -> &'static str {
    r#"<div class="modal fade" id="observation-modal" tabindex="-1" aria-labelledby="observation-modal-title" aria-hidden="true">
    <div class="modal-dialog modal-lg modal-dialog-scrollable">
        <div class="modal-content">
            <div class="modal-header">
                <h5 class="modal-title" id="observation-modal-title">Observation</h5>
                <button type="button" class="btn-close" data-bs-dismiss="modal" aria-label="Close"></button>
            </div>
            <div class="modal-body"><dl class="row" id="observation-detail"></dl></div>
        </div>
    </div>
</div>"#
}
