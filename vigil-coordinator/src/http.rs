/**
 * FAÇADE HTTP - Vue JSON du registre + dépôt de commandes
 *
 * RÔLE :
 * Ce module expose l'état du parc aux humains : snapshot JSON cohérent
 * des agents via /status et dépôt de commandes via /command. Sert aussi
 * le dashboard statique embarqué (/ , /app.js , /app.css).
 *
 * FONCTIONNEMENT :
 * - Serveur Axum ; chaque handler tourne sur le pool de workers tokio
 * - GET /status déclenche le balayage de vivacité (recalcul paresseux,
 *   pas de thread timer) et sérialise un snapshot d'un seul instant
 * - POST /command est fire-and-forget : 202 même pour un id inconnu,
 *   la livraison attend le prochain rapport de cet id — s'il vient
 *
 * GARANTIES :
 * - Jamais d'attente d'une réponse agent dans un handler
 * - Erreurs de protocole (params manquants, action inconnue) en 4xx,
 *   sans aucune mutation d'état
 */

use crate::dispatch::SharedCommandDispatcher;
use crate::models::{now_ms, AgentRecord};
use crate::registry::SharedClientRegistry;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Clone)]
pub struct AppState {
    pub registry: SharedClientRegistry,
    pub dispatcher: SharedCommandDispatcher,
}

/// Vue sérialisée d'un agent pour l'API (champs du protocole, camelCase)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientView {
    client_id: String,
    ts: Option<i64>,
    cpu_load: Option<f64>,
    ram_used_mb: Option<i64>,
    ram_total_mb: Option<i64>,
    process_count: u32,
    last_seen: i64,
    online: bool,
    last_change: i64,
    monitoring_allowed: bool,
    pending_command: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    server_time: i64,
    clients: Vec<ClientView>,
}

fn to_view(record: &AgentRecord, pending: Option<String>) -> ClientView {
    ClientView {
        client_id: record.client_id.clone(),
        ts: record.ts,
        cpu_load: record.cpu_load,
        ram_used_mb: record.ram_used_mb,
        ram_total_mb: record.ram_total_mb,
        process_count: record.process_count,
        last_seen: record.last_seen_ms,
        online: record.online,
        last_change: record.last_change_ms,
        monitoring_allowed: record.monitoring_granted,
        pending_command: pending,
    }
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/command", post(post_command))
        .route("/", get(index))
        .route("/app.js", get(app_js))
        .route("/app.css", get(app_css))
        .with_state(app_state)
}

// GET /status : snapshot unique, tous les champs mutuellement cohérents
async fn get_status(State(app): State<AppState>) -> Json<StatusResponse> {
    let now = now_ms();
    let clients = app
        .registry
        .snapshot_all(now)
        .iter()
        .map(|record| to_view(record, app.dispatcher.peek(&record.client_id)))
        .collect();
    Json(StatusResponse { server_time: now, clients })
}

// POST /command?clientId=&action= : 202 / 400 / 404
async fn post_command(
    State(app): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> StatusCode {
    let client_id = params.get("clientId").map(String::as_str).unwrap_or("");
    let action = params.get("action").map(String::as_str).unwrap_or("");
    if client_id.is_empty() || action.is_empty() {
        return StatusCode::BAD_REQUEST;
    }
    // tolère request-monitoring et request_monitoring
    let normalized = action.to_ascii_lowercase().replace('-', "_");
    if normalized == "request_monitoring" {
        app.dispatcher.enqueue(client_id, "REQUEST_MONITORING");
        println!("[http] command queued for {client_id}: REQUEST_MONITORING");
        return StatusCode::ACCEPTED;
    }
    StatusCode::NOT_FOUND
}

async fn index() -> Html<&'static str> {
    Html(include_str!("../web/index.html"))
}

async fn app_js() -> impl axum::response::IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/javascript; charset=utf-8")],
        include_str!("../web/app.js"),
    )
}

async fn app_css() -> impl axum::response::IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        include_str!("../web/app.css"),
    )
}
