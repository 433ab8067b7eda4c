use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::extract::{Form, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::api::csrf;
use crate::api::download::{observations_csv, parse_obs_ids, ALL_RESULTS_FILENAME, RESULTS_FILENAME};
use crate::api::types::{ResultSet, SearchContext};
use crate::core::backend::{BackendError, ObservationBackend};
use crate::forms::search::{validate, SearchFormInput};
use crate::render::search_page::{render_forbidden, render_index_page, render_recent_page, render_search_page};

const NO_RESULTS: &str = "No observations found.";
const SEARCH_FAILED: &str = "Search failed. Please try again later.";
const RECENT_FAILED: &str = "Observations could not be loaded. Please try again later.";
const STATS_FAILED: &str = "Statistics could not be loaded. Please try again later.";
const LATEST_COUNT: usize = 7;

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn ObservationBackend>,
    pub recent_limit: usize,
}

#[derive(Debug, Deserialize)]
struct SearchSubmission {
    #[serde(flatten)]
    form: SearchFormInput,
    #[serde(default)]
    csrfmiddlewaretoken: String,
}

#[derive(Debug, Deserialize)]
struct DownloadSubmission {
    #[serde(default)]
    obs_ids: String,
    #[serde(default)]
    csrfmiddlewaretoken: String,
}

pub fn build_router(state: AppState, web_dir: &Path) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/search", get(search_form).post(submit_search))
        .route("/view", get(view_recent))
        .route("/download-all", get(download_all))
        .route("/download-results", post(download_results))
        .nest_service("/static", ServeDir::new(web_dir.join("static")))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_server(state: AppState, addr: SocketAddr, web_dir: &Path) -> std::io::Result<()> {
    let app = build_router(state, web_dir);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Observation search listening");
    axum::serve(listener, app).await
}

/// Runs a backend call off the async executor.
async fn with_backend<T, F>(state: &AppState, f: F) -> Result<T, BackendError>
where
    F: FnOnce(&dyn ObservationBackend) -> Result<T, BackendError> + Send + 'static,
    T: Send + 'static,
{
    let backend = Arc::clone(&state.backend);
    tokio::task::spawn_blocking(move || f(backend.as_ref()))
        .await
        .map_err(|e| BackendError::Task(e.to_string()))?
}

fn html_response(status: StatusCode, body: String, cookie: Option<(HeaderName, HeaderValue)>) -> Response {
    let mut resp = (status, Html(body)).into_response();
    if let Some((name, value)) = cookie {
        resp.headers_mut().insert(name, value);
    }
    resp
}

fn forbidden(e: &csrf::CsrfError) -> Response {
    html_response(StatusCode::FORBIDDEN, render_forbidden(&e.to_string()), None)
}

async fn index(State(state): State<AppState>) -> Response {
    match with_backend(&state, |b| b.stats(LATEST_COUNT)).await {
        Ok(mut stats) => {
            let latest = ResultSet::from_observations(std::mem::take(&mut stats.latest));
            html_response(StatusCode::OK, render_index_page(&stats, &latest, None), None)
        }
        Err(e) => {
            error!(error = %e, "Loading statistics failed");
            let page = render_index_page(&Default::default(), &ResultSet::default(), Some(STATS_FAILED));
            html_response(StatusCode::OK, page, None)
        }
    }
}

fn csv_attachment(filename: &str, body: String) -> Response {
    (
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (CONTENT_DISPOSITION, format!("attachment; filename={filename}")),
        ],
        body,
    )
        .into_response()
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let (count, db_ok) = match with_backend(&state, |b| b.count()).await {
        Ok(n) => (n, true),
        Err(e) => {
            warn!(error = %e, "Health check could not reach the store");
            (0, false)
        }
    };
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok", "observations": count, "db": db_ok })))
}

async fn search_form(headers: HeaderMap) -> Response {
    let (token, cookie) = csrf::issue(&headers);
    let ctx = SearchContext::new(token);
    html_response(StatusCode::OK, render_search_page(&ctx), cookie)
}

async fn submit_search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(submission): Form<SearchSubmission>,
) -> Response {
    if let Err(e) = csrf::verify(&headers, &submission.csrfmiddlewaretoken) {
        warn!(error = %e, "Rejected search submission");
        return forbidden(&e);
    }
    let (token, cookie) = csrf::issue(&headers);
    let mut ctx = SearchContext::new(token);

    match validate(&submission.form) {
        Err(errors) => {
            info!(errors = errors.len(), "Search form rejected");
            ctx.errors = errors;
        }
        Ok(criteria) => {
            let unfiltered = criteria.is_unfiltered();
            match with_backend(&state, move |b| b.search(&criteria)).await {
                Ok(rows) if rows.is_empty() => {
                    info!(unfiltered, "Search matched no observations");
                    ctx.notice = Some(NO_RESULTS.to_string());
                }
                Ok(rows) => {
                    info!(count = rows.len(), unfiltered, "Search completed");
                    ctx.observations = ResultSet::from_observations(rows);
                }
                Err(e) => {
                    error!(error = %e, "Observation search failed");
                    ctx.error = Some(SEARCH_FAILED.to_string());
                }
            }
        }
    }

    ctx.form = submission.form;
    html_response(StatusCode::OK, render_search_page(&ctx), cookie)
}

async fn view_recent(State(state): State<AppState>) -> Response {
    let limit = state.recent_limit;
    match with_backend(&state, move |b| b.recent(limit)).await {
        Ok(rows) => {
            let results = ResultSet::from_observations(rows);
            html_response(StatusCode::OK, render_recent_page(&results, None), None)
        }
        Err(e) => {
            error!(error = %e, "Loading recent observations failed");
            html_response(StatusCode::OK, render_recent_page(&ResultSet::default(), Some(RECENT_FAILED)), None)
        }
    }
}

async fn download_results(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(submission): Form<DownloadSubmission>,
) -> Response {
    if let Err(e) = csrf::verify(&headers, &submission.csrfmiddlewaretoken) {
        warn!(error = %e, "Rejected download submission");
        return forbidden(&e);
    }
    let ids = match parse_obs_ids(&submission.obs_ids) {
        Ok(ids) => ids,
        Err(e) => {
            warn!(error = %e, "Rejected download id list");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let requested = ids.len();
    match with_backend(&state, move |b| b.fetch_by_ids(&ids)).await {
        Ok(rows) => {
            info!(requested, found = rows.len(), "Prepared results download");
            csv_attachment(RESULTS_FILENAME, observations_csv(&rows))
        }
        Err(e) => {
            error!(error = %e, "Results download failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "download failed").into_response()
        }
    }
}

async fn download_all(State(state): State<AppState>) -> Response {
    match with_backend(&state, |b| b.all()).await {
        Ok(rows) => {
            info!(count = rows.len(), "Prepared full download");
            csv_attachment(ALL_RESULTS_FILENAME, observations_csv(&rows))
        }
        Err(e) => {
            error!(error = %e, "Full download failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "download failed").into_response()
        }
    }
}
