use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::collections::HashMap;
use std::sync::Arc;

use crate::mapping::AssignmentTable;
use crate::metrics::RobotMetrics;
use crate::stats::ListenerStatus;

#[derive(Clone)]
pub struct AppState {
    pub table: Arc<AssignmentTable>,
    pub metrics: Arc<RobotMetrics>,
    pub listener: ListenerStatus,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/metrics", get(get_metrics))
        .route("/admin/cfg/quads", get(get_quads))
        .route("/admin/map/current", get(get_current_map))
        .route("/admin/map/immediate", post(post_immediate_map))
        .route("/admin/map/quad/{id}", get(get_quad_team))
        .route("/admin/metrics/reset", post(post_metrics_reset))
        .with_state(app_state)
}

// GET /admin/cfg/quads (configured quadrants, in order)
async fn get_quads(State(app): State<AppState>) -> Json<Vec<String>> {
    Json(app.table.quads().to_vec())
}

// GET /admin/map/current (flat quad -> team object)
async fn get_current_map(State(app): State<AppState>) -> Json<HashMap<String, String>> {
    Json(app.table.current_mapping())
}

// POST /admin/map/immediate (whole-table replace; disruptive)
async fn post_immediate_map(
    State(app): State<AppState>,
    Json(new_map): Json<HashMap<String, String>>,
) -> (StatusCode, Json<serde_json::Value>) {
    match app.table.immediate_remap(new_map) {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "ok": true }))),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "ok": false, "error": e.to_string() })),
        ),
    }
}

// GET /admin/map/quad/:id (team on one quadrant)
async fn get_quad_team(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    match app.table.team_on(&id) {
        Ok(team) => (StatusCode::OK, Json(serde_json::json!({ "quad": id, "team": team }))),
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "ok": false, "error": e.to_string() })),
        ),
    }
}

// POST /admin/metrics/reset (drop all per-team series)
async fn post_metrics_reset(State(app): State<AppState>) -> Json<serde_json::Value> {
    app.metrics.reset();
    Json(serde_json::json!({ "ok": true }))
}

// GET /metrics (Prometheus text exposition)
async fn get_metrics(State(app): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        app.metrics.render(),
    )
}

// GET /health (liveness + event bus status)
async fn get_health(State(app): State<AppState>) -> Json<serde_json::Value> {
    let (mqtt_status, reconnects) = app.listener.snapshot();
    Json(serde_json::json!({
        "mqtt_status": mqtt_status,
        "mqtt_reconnects": reconnects,
        "quads_configured": app.table.quads().len(),
        "quads_assigned": app.table.current_mapping().len(),
    }))
}
