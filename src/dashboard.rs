//! ==============================================================================
//! dashboard.rs - web dashboard and json api
//! ==============================================================================
//!
//! purpose:
//!     serves the two views over http and exposes every control:
//!
//!     GET  /                       recorder view (5 rows, status buttons)
//!     GET  /monitor                monitor view (10 rows, fast refresh)
//!     GET  /api/views/:view        view model as json
//!     POST /api/status             record a status (form: status, name?, ip?)
//!     POST /api/refresh?view=      manual refresh
//!     POST /api/detect/name        detected label -> name field
//!     POST /api/detect/ip          public ip -> ip field
//!     POST /api/notices/dismiss    clear alerts
//!
//!     POSTs from the html forms (Accept: text/html) redirect back to the
//!     page; other clients get json.
//!
//! relationships:
//!     - reads: render.rs view slots (filled by poller.rs)
//!     - drives: recorder.rs, poller.rs, identity.rs
//!
//! ==============================================================================

use crate::alert::{Notice, Notices};
use crate::identity::IpLookup;
use crate::poller::Poller;
use crate::recorder::{fill_public_ip, FieldValues, Recorder};
use crate::render::{StatusView, ViewSlot, COLUMNS, NO_DATA};

use anyhow::Result;
use axum::{
    extract::{Form, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Router,
};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

pub struct DashboardState {
    pub collection_url: String,
    pub statuses: Vec<String>,
    pub recorder: Arc<Recorder>,
    pub recorder_poller: Arc<Poller>,
    pub recorder_view: Arc<ViewSlot>,
    pub monitor_poller: Arc<Poller>,
    pub monitor_view: Arc<ViewSlot>,
    pub notices: Arc<Notices>,
    pub ip_lookup: Arc<dyn IpLookup>,
}

type Shared = Arc<DashboardState>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewName {
    Recorder,
    Monitor,
}

impl ViewName {
    fn page(self) -> &'static str {
        match self {
            ViewName::Recorder => "/",
            ViewName::Monitor => "/monitor",
        }
    }
}

impl DashboardState {
    fn view(&self, name: ViewName) -> (&Arc<Poller>, &Arc<ViewSlot>) {
        match name {
            ViewName::Recorder => (&self.recorder_poller, &self.recorder_view),
            ViewName::Monitor => (&self.monitor_poller, &self.monitor_view),
        }
    }
}

pub fn router(state: Shared) -> Router {
    Router::new()
        .route("/", get(recorder_page))
        .route("/monitor", get(monitor_page))
        .route("/api/views/:view", get(view_handler))
        .route("/api/status", post(status_handler))
        .route("/api/refresh", post(refresh_handler))
        .route("/api/detect/name", post(detect_name_handler))
        .route("/api/detect/ip", post(detect_ip_handler))
        .route("/api/notices/dismiss", post(dismiss_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server(state: Shared, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("dashboard live at http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

// ==============================================================================
// json api
// ==============================================================================

#[derive(Debug, Serialize)]
struct ViewResponse {
    view: ViewName,
    window: usize,
    #[serde(flatten)]
    status: StatusView,
    rendered_at: Option<String>,
    saving: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<FieldValues>,
    notices: Vec<Notice>,
    collection_url: String,
}

fn view_response(state: &DashboardState, name: ViewName) -> ViewResponse {
    let (poller, slot) = state.view(name);
    ViewResponse {
        view: name,
        window: poller.window(),
        status: slot.current(),
        rendered_at: slot.rendered_at(),
        saving: state.recorder.is_saving(),
        fields: (name == ViewName::Recorder).then(|| state.recorder.fields().values()),
        notices: state.notices.pending(),
        collection_url: state.collection_url.clone(),
    }
}

async fn view_handler(State(state): State<Shared>, Path(name): Path<ViewName>) -> Json<ViewResponse> {
    Json(view_response(&state, name))
}

#[derive(Debug, Deserialize)]
struct StatusForm {
    status: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    ip: Option<String>,
}

/// record a status; the name/ip values of the form replace the fields first
async fn status_handler(
    State(state): State<Shared>,
    headers: HeaderMap,
    Form(form): Form<StatusForm>,
) -> Response {
    if !state.statuses.iter().any(|s| s == &form.status) {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"status": "error", "message": "unknown status"})),
        )
            .into_response();
    }

    let fields = state.recorder.fields();
    if let Some(name) = &form.name {
        fields.set_name(name);
    }
    if let Some(ip) = &form.ip {
        fields.set_ip(ip);
    }

    let result = state.recorder.record(&form.status).await;
    if wants_html(&headers) {
        return Redirect::to(ViewName::Recorder.page()).into_response();
    }
    match result {
        Ok(created) => Json(serde_json::json!({"status": "ok", "record": created})).into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({"status": "error", "message": e.to_string()})),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct RefreshParams {
    #[serde(default)]
    view: Option<ViewName>,
}

async fn refresh_handler(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<RefreshParams>,
) -> Response {
    let name = params.view.unwrap_or(ViewName::Recorder);
    let (poller, _) = state.view(name);
    poller.refresh().await;
    if wants_html(&headers) {
        return Redirect::to(name.page()).into_response();
    }
    Json(view_response(&state, name)).into_response()
}

async fn detect_name_handler(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let name = state.recorder.detect_name();
    if wants_html(&headers) {
        return Redirect::to(ViewName::Recorder.page()).into_response();
    }
    Json(serde_json::json!({"status": "ok", "name": name})).into_response()
}

async fn detect_ip_handler(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let ip = fill_public_ip(
        state.ip_lookup.as_ref(),
        state.recorder.fields(),
        state.notices.as_ref(),
    )
    .await;
    if wants_html(&headers) {
        return Redirect::to(ViewName::Recorder.page()).into_response();
    }
    match ip {
        Some(ip) => Json(serde_json::json!({"status": "ok", "ip": ip})).into_response(),
        None => (
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({"status": "error", "message": "ip detection failed"})),
        )
            .into_response(),
    }
}

async fn dismiss_handler(State(state): State<Shared>, headers: HeaderMap) -> Response {
    state.notices.dismiss();
    if wants_html(&headers) {
        return Redirect::to(ViewName::Recorder.page()).into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

fn wants_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

// ==============================================================================
// html pages
// ==============================================================================

async fn recorder_page(State(state): State<Shared>) -> Html<String> {
    Html(render_page(&state, ViewName::Recorder))
}

async fn monitor_page(State(state): State<Shared>) -> Html<String> {
    Html(render_page(&state, ViewName::Monitor))
}

fn render_page(state: &DashboardState, name: ViewName) -> String {
    let (poller, slot) = state.view(name);
    let view = slot.current();
    // reloading the recorder page would wipe the name/ip inputs mid-edit
    let refresh_meta = match name {
        ViewName::Recorder => String::new(),
        ViewName::Monitor => format!(
            r#"<meta http-equiv="refresh" content="{}">"#,
            poller.interval_seconds()
        ),
    };
    let year = chrono::Local::now().year();

    let (title, controls) = match name {
        ViewName::Recorder => ("IoT Status Recorder", recorder_controls(state)),
        ViewName::Monitor => ("IoT Status Monitor", String::new()),
    };

    let saving = if state.recorder.is_saving() {
        r#"<span class="saving">Saving…</span>"#
    } else {
        ""
    };

    let last_time = if view.last.date.is_empty() {
        String::new()
    } else {
        format!(r#"<small>{}</small>"#, html_escape(&view.last.date))
    };

    format!(
        r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
{refresh_meta}
<title>{title}</title>
<style>
body {{ font-family: system-ui; padding: 2rem; background: #1a1a2e; color: #eee; }}
table {{ border-collapse: collapse; width: 100%; }}
th, td {{ padding: .4rem .8rem; border-bottom: 1px solid #333; text-align: left; }}
.badge {{ background: #3a5bd9; border-radius: 6px; padding: .1rem .5rem; }}
.center {{ text-align: center; color: #888; }}
.notice {{ background: #5c1f2b; padding: .5rem 1rem; border-radius: 8px; margin-bottom: .5rem; }}
.saving {{ color: #f5c542; margin-left: 1rem; }}
nav a {{ color: #8ab4ff; margin-right: 1rem; }}
</style>
</head>
<body>
<nav><a href="/">Recorder</a><a href="/monitor">Monitor</a></nav>
<h1>{title}{saving}</h1>
{notices}
<section>
  <h2>Last status: <span class="badge">{last_status}</span> {last_time}</h2>
</section>
{controls}
<section>
  <form method="post" action="/api/refresh?view={view_param}"><button type="submit">Refresh</button></form>
  <p>Rows: <span id="rows-count">{count}</span></p>
  <table>
    <thead><tr>{head}</tr></thead>
    <tbody>{body}</tbody>
  </table>
</section>
<footer><p>Collection: <code>{api_url}</code> · {year}</p></footer>
</body>
</html>"#,
        notices = render_notices(&state.notices.pending()),
        last_status = html_escape(&view.last.status),
        view_param = match name {
            ViewName::Recorder => "recorder",
            ViewName::Monitor => "monitor",
        },
        count = view.count,
        head = COLUMNS.iter().map(|c| format!("<th>{c}</th>")).collect::<String>(),
        body = render_rows(&view),
        api_url = html_escape(&state.collection_url),
    )
}

fn recorder_controls(state: &DashboardState) -> String {
    let fields = state.recorder.fields().values();
    let buttons: String = state
        .statuses
        .iter()
        .map(|s| {
            let s = html_escape(s);
            format!(r#"<button type="submit" name="status" value="{s}">{s}</button> "#)
        })
        .collect();

    format!(
        r#"<section>
  <form method="post" action="/api/status">
    <label>Device name <input name="name" value="{name}"></label>
    <label>IP <input name="ip" value="{ip}"></label>
    <div>{buttons}</div>
  </form>
  <form method="post" action="/api/detect/name" style="display:inline"><button type="submit">Detect name</button></form>
  <form method="post" action="/api/detect/ip" style="display:inline"><button type="submit">Detect IP</button></form>
</section>"#,
        name = html_escape(&fields.name),
        ip = html_escape(&fields.ip),
    )
}

fn render_notices(notices: &[Notice]) -> String {
    if notices.is_empty() {
        return String::new();
    }
    let items: String = notices
        .iter()
        .map(|n| format!(r#"<div class="notice">{} <small>{}</small></div>"#, html_escape(&n.message), n.at))
        .collect();
    format!(
        r#"{items}<form method="post" action="/api/notices/dismiss"><button type="submit">Dismiss</button></form>"#
    )
}

fn render_rows(view: &StatusView) -> String {
    if view.is_empty() {
        return format!(r#"<tr><td colspan="{}" class="center">{NO_DATA}</td></tr>"#, COLUMNS.len());
    }
    view.rows
        .iter()
        .map(|row| {
            format!(
                r#"<tr><td>{}</td><td>{}</td><td><span class="badge">{}</span></td><td>{}</td><td>{}</td></tr>"#,
                html_escape(&row.id),
                html_escape(&row.name),
                html_escape(&row.status),
                html_escape(&row.ip),
                html_escape(&row.date),
            )
        })
        .collect()
}

/// escape html special characters to prevent xss
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
