use axum::{
    Json, Router,
    extract::{Multipart, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::WithRejection;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::Local;
use log::{error, info, warn};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use crate::config::AppConfig;
use crate::dataset::Dataset;
use crate::error::PipelineError;
use crate::filter::PlotRequest;
use crate::graph::{GraphOptions, render_scatter_png};
use crate::merge::JOIN_KEY;
use crate::model_config::{SaveRequest, list_model_configs, load_model_config, save_model_config};
use crate::plot::{PlotFigure, build_plot};
use crate::session::{FileRole, SESSION_COOKIE, SessionData, SessionStore};

/// How often expired sessions are dropped
const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Shared state handed to every handler
pub struct AppState {
    pub config: AppConfig,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        AppState {
            config,
            sessions: SessionStore::default(),
        }
    }
}

#[derive(Deserialize)]
struct LoadQuery {
    #[serde(default)]
    filename: Option<String>,
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = match &self {
            PipelineError::ConfigNotFound(_) => StatusCode::NOT_FOUND,
            e if e.is_internal() => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("request failed: {self}");
        }

        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<JsonRejection> for PipelineError {
    fn from(rejection: JsonRejection) -> Self {
        PipelineError::InvalidRequest(rejection.body_text())
    }
}

/// A JSON body whose rejection is reported as a `PipelineError`
type JsonBody<T> = WithRejection<Json<T>, PipelineError>;

/// Build the router over the given state
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(serve_index))
        .route("/upload_csv", post(upload_csv))
        .route("/get_plot_data", post(get_plot_data))
        .route("/plot.png", post(get_plot_png))
        .route("/get_model_table_headers", get(get_model_table_headers))
        .route("/save_model_config", post(save_model))
        .route("/load_model_config", post(load_model))
        .route("/model_configs", get(list_models))
        .with_state(state)
}

/// Start the web server
///
/// # Arguments
/// * `config` - Listen address and data directory
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Returns when the server stops
pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let config = config.prepare()?;
    info!("data directory: {}", config.data_dir.display());

    let listener = TcpListener::bind(&config.addr).await?;
    info!("Listening on http://{}", config.addr);

    let app_state = Arc::new(AppState::new(config));

    // Periodically drop expired sessions
    let purge_state = Arc::clone(&app_state);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            let removed = purge_state.sessions.purge_expired();
            if removed > 0 {
                info!("purged {removed} expired sessions");
            }
        }
    });

    axum::serve(listener, router(app_state)).await?;
    Ok(())
}

/// Find the caller's live session, creating one if needed
///
/// Returns the jar to send back (with a new cookie when a session was made)
/// and the session id.
fn resolve_session(state: &AppState, jar: CookieJar) -> (CookieJar, String) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if state.sessions.is_valid(cookie.value()) {
            let id = cookie.value().to_string();
            return (jar, id);
        }
    }

    let id = state.sessions.create();
    let cookie = Cookie::build((SESSION_COOKIE, id.clone()))
        .path("/")
        .http_only(true);
    (jar.add(cookie), id)
}

fn session_data(state: &AppState, id: &str) -> SessionData {
    state.sessions.get(id).unwrap_or_default()
}

/// Headers shown to the user: everything but the join key
fn visible_headers(headers: &[String]) -> Vec<String> {
    headers
        .iter()
        .filter(|h| !h.eq_ignore_ascii_case(JOIN_KEY))
        .cloned()
        .collect()
}

fn unreadable_field(name: &str, e: axum::extract::multipart::MultipartError) -> Response {
    PipelineError::InvalidUpload(format!("Failed to read upload field '{name}': {e}")).into_response()
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

async fn serve_index() -> Html<&'static str> {
    Html(include_str!("./static/index.html"))
}

/// Handle a CSV upload
///
/// Expects multipart fields `file_type` (`feature` or `target`) and `file`.
/// The file is stored in the session's own uploads directory and its
/// headers, minus `main_id`, are recorded in the session.
async fn upload_csv(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let (jar, id) = resolve_session(&state, jar);

    let mut file_type: Option<String> = None;
    let mut file: Option<(String, Vec<u8>)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                let err = PipelineError::InvalidUpload(format!("Malformed upload: {e}"));
                return (jar, err.into_response());
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file_type" => match field.text().await {
                Ok(text) => file_type = Some(text),
                Err(e) => return (jar, unreadable_field(&name, e)),
            },
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(bytes) => file = Some((filename, bytes.to_vec())),
                    Err(e) => return (jar, unreadable_field(&name, e)),
                }
            }
            _ => {}
        }
    }

    let role = match file_type.as_deref().map(str::parse::<FileRole>) {
        Some(Ok(role)) => role,
        _ => return (jar, bad_request("Invalid file type specified.")),
    };
    let Some((filename, bytes)) = file else {
        return (jar, bad_request("No file part"));
    };
    if filename.is_empty() {
        return (jar, bad_request("No selected file"));
    }
    // Only the final component, so uploads cannot escape the directory
    let filename = match Path::new(&filename).file_name().and_then(|n| n.to_str()) {
        Some(name) if name.ends_with(".csv") => name.to_string(),
        _ => return (jar, bad_request("Invalid file type")),
    };

    // One directory per session
    let session_dir = state.config.uploads_dir().join(&id);
    let filepath = session_dir.join(&filename);
    let written = std::fs::create_dir_all(&session_dir).and_then(|_| std::fs::write(&filepath, &bytes));
    if let Err(e) = written {
        return (jar, PipelineError::Io(e).into_response());
    }
    let filepath = filepath.to_string_lossy().to_string();

    match Dataset::from_csv_path(&filepath) {
        Ok(dataset) => {
            let headers = visible_headers(&dataset.headers());
            state.sessions.update(&id, |data| {
                data.set_dataset(role, filepath.clone(), headers.clone())
            });
            info!("uploaded {role:?} file {filename} ({} rows)", dataset.len());

            let body = Json(serde_json::json!({
                "filename": filename,
                "headers": headers,
                "filepath": filepath,
                "file_type": role,
            }));
            (jar, (StatusCode::OK, body).into_response())
        }
        Err(e) => {
            state.sessions.update(&id, |data| data.clear_dataset(role));
            warn!("upload of {filename} rejected: {e}");
            let body = Json(serde_json::json!({
                "error": format!("Failed to read CSV or extract headers: {e}"),
            }));
            (jar, (StatusCode::INTERNAL_SERVER_ERROR, body).into_response())
        }
    }
}

/// Build the scatter trace and layout for the current selection
async fn get_plot_data(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    WithRejection(Json(request), _): JsonBody<PlotRequest>,
) -> impl IntoResponse {
    let (jar, id) = resolve_session(&state, jar);
    let data = session_data(&state, &id);

    let response = match build_plot(&data, &request) {
        Ok(payload) => Json(PlotFigure::new(payload)).into_response(),
        Err(e) => e.into_response(),
    };
    (jar, response)
}

/// Render the current selection as a PNG image
async fn get_plot_png(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    WithRejection(Json(request), _): JsonBody<PlotRequest>,
) -> impl IntoResponse {
    let (jar, id) = resolve_session(&state, jar);
    let data = session_data(&state, &id);

    let png = build_plot(&data, &request)
        .and_then(|payload| render_scatter_png(&payload, &GraphOptions::default()));
    let response = match png {
        Ok(bytes) => ([(header::CONTENT_TYPE, "image/png")], bytes).into_response(),
        Err(e) => e.into_response(),
    };
    (jar, response)
}

/// Feature and target headers for the model table
async fn get_model_table_headers(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> impl IntoResponse {
    let (jar, id) = resolve_session(&state, jar);
    let data = session_data(&state, &id);

    let feature_headers = visible_headers(&data.feature_headers);
    let target_headers = visible_headers(&data.target_headers);
    if feature_headers.is_empty() || target_headers.is_empty() {
        return (
            jar,
            bad_request("Feature or Target CSV headers not available. Please upload files."),
        );
    }

    let body = Json(serde_json::json!({
        "feature_headers": feature_headers,
        "target_headers": target_headers,
    }));
    (jar, body.into_response())
}

async fn save_model(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    WithRejection(Json(request), _): JsonBody<SaveRequest>,
) -> impl IntoResponse {
    let (jar, id) = resolve_session(&state, jar);
    let data = session_data(&state, &id);

    let response = match save_model_config(&state.config.settings_dir(), &data, request, Local::now())
    {
        Ok((filename, path)) => Json(serde_json::json!({
            "message": format!("Model configuration saved successfully: {filename}"),
            "filepath": path.to_string_lossy(),
        }))
        .into_response(),
        Err(e) => e.into_response(),
    };
    (jar, response)
}

async fn load_model(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    WithRejection(Json(query), _): JsonBody<LoadQuery>,
) -> impl IntoResponse {
    let (jar, id) = resolve_session(&state, jar);
    let data = session_data(&state, &id);
    let filename = query.filename.unwrap_or_default();

    let response = match load_model_config(&state.config.settings_dir(), &data, &filename) {
        Ok(loaded) => Json(serde_json::json!({
            "message": "Configuration loaded successfully.",
            "fitting_config": loaded.fitting_config,
            "fitting_method": loaded.fitting_method,
            "functions": loaded.functions,
        }))
        .into_response(),
        Err(e) => e.into_response(),
    };
    (jar, response)
}

async fn list_models(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match list_model_configs(&state.config.settings_dir()) {
        Ok(files) => Json(serde_json::json!({ "files": files })).into_response(),
        Err(e) => e.into_response(),
    }
}
