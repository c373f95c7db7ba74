/**
 * API REST PRINTLERT - Serveur HTTP principal du kernel
 *
 * RÔLE :
 * Expose les opérations du moteur pour interactions humaines (dashboard,
 * CLI, scripts) : gestion de la flotte, scan manuel, alertes, réglages,
 * export/import de l'état complet.
 *
 * FONCTIONNEMENT :
 * - Serveur Axum avec middleware auth API key
 * - Routes organisées : /health, /system, /printers, /alerts, /settings,
 *   /profiles, /export, /import
 * - Gestion erreurs HTTP standardisée (400, 404, 409, 401...)
 *
 * SÉCURITÉ :
 * - Header x-api-key obligatoire sur toutes routes sauf /health
 * - Validation côté middleware avant traitement métier
 */
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use crate::alerts::Alert;
use crate::health::{HealthTracker, KernelHealth};
use crate::models::{Printer, Snapshot};
use crate::profiles::VendorProfile;
use crate::scan::{ScanEngine, ScanError, ScanSummary};
use crate::settings::Settings;

#[derive(Clone)]
pub struct AppState {
    pub engine: ScanEngine,
    pub health_tracker: HealthTracker,
}

async fn require_api_key(req: Request, next: Next) -> Result<Response, StatusCode> {
    let path = req.uri().path();

    // Health check toujours accessible
    if path.starts_with("/health") {
        return Ok(next.run(req).await);
    }

    let expected = std::env::var("PRINTLERT_API_KEY").unwrap_or_default();
    if expected.is_empty() {
        error!("SECURITY: PRINTLERT_API_KEY not set - API access denied");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let ok = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected)
        .unwrap_or(false);

    if !ok {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/printers", get(list_printers).post(add_printer))
        .route("/printers/{id}", get(get_printer).delete(remove_printer))
        .route("/printers/{id}/scan", post(scan_one))
        .route("/scan", post(scan_all))
        .route("/alerts", get(list_alerts).delete(clear_alerts))
        .route("/alerts/{id}/ack", post(acknowledge_alert))
        .route("/settings", get(get_settings).put(update_settings))
        .route("/profiles", get(list_profiles))
        .route("/export", get(export_snapshot))
        .route("/import", post(import_snapshot))
        .with_state(app_state)
        .layer(middleware::from_fn(require_api_key))
}

fn bad_request(msg: String) -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": msg })))
}

// GET /system/health (état infrastructure + résumé flotte)
async fn get_system_health(State(app): State<AppState>) -> Json<KernelHealth> {
    let health = app
        .health_tracker
        .get_health(app.engine.registry(), app.engine.alerts());
    Json(health)
}

// GET /printers (liste)
async fn list_printers(State(app): State<AppState>) -> Json<Vec<Printer>> {
    Json(app.engine.registry().list())
}

#[derive(Debug, Deserialize)]
struct AddPrinterIn {
    name: String,
    ip: String,
    #[serde(default)]
    community: String,
    model: String,
}

// POST /printers (ajout validé, tout ou rien)
async fn add_printer(
    State(app): State<AppState>,
    Json(input): Json<AddPrinterIn>,
) -> Result<Json<Printer>, (StatusCode, Json<Value>)> {
    app.engine
        .registry()
        .add_printer(
            &input.name,
            &input.ip,
            &input.community,
            &input.model,
            app.engine.catalog(),
        )
        .await
        .map(Json)
        .map_err(|e| bad_request(e.to_string()))
}

// GET /printers/:id (détail)
async fn get_printer(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Printer>, StatusCode> {
    match app.engine.registry().get(&id) {
        Some(printer) => Ok(Json(printer)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

// DELETE /printers/:id
async fn remove_printer(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    if app.engine.registry().remove(&id).await {
        Ok(Json(json!({ "status": "deleted" })))
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

// POST /printers/:id/scan (scan manuel d'une imprimante)
async fn scan_one(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Printer>, StatusCode> {
    match app.engine.scan_one(&id).await {
        Ok(printer) => Ok(Json(printer)),
        Err(ScanError::PrinterNotFound(_)) => Err(StatusCode::NOT_FOUND),
        Err(ScanError::Busy) => Err(StatusCode::CONFLICT),
    }
}

// POST /scan (cycle complet "scan now")
async fn scan_all(
    State(app): State<AppState>,
) -> Result<Json<ScanSummary>, (StatusCode, Json<Value>)> {
    match app.engine.scan_all().await {
        Ok(summary) => Ok(Json(summary)),
        Err(e @ ScanError::Busy) => Err((StatusCode::CONFLICT, Json(json!({ "error": e.to_string() })))),
        Err(e) => Err(bad_request(e.to_string())),
    }
}

// GET /alerts (du plus récent au plus ancien)
async fn list_alerts(State(app): State<AppState>) -> Json<Vec<Alert>> {
    Json(app.engine.alerts().list())
}

// DELETE /alerts (purge inconditionnelle)
async fn clear_alerts(State(app): State<AppState>) -> Json<Value> {
    app.engine.alerts().clear_all();
    if let Err(e) = app.engine.alerts().save().await {
        error!("[http] failed to persist alerts after clear: {e}");
    }
    Json(json!({ "status": "cleared" }))
}

// POST /alerts/:id/ack (no-op si l'alerte a été purgée entre temps)
async fn acknowledge_alert(State(app): State<AppState>, Path(id): Path<String>) -> Json<Value> {
    let found = app.engine.alerts().acknowledge(&id);
    if found {
        if let Err(e) = app.engine.alerts().save().await {
            error!("[http] failed to persist alerts after ack: {e}");
        }
    }
    Json(json!({ "acknowledged": found }))
}

// GET /settings
async fn get_settings(State(app): State<AppState>) -> Json<Settings> {
    Json(app.engine.settings())
}

// PUT /settings (remplacement en bloc, validé)
async fn update_settings(
    State(app): State<AppState>,
    Json(settings): Json<Settings>,
) -> Result<Json<Settings>, (StatusCode, Json<Value>)> {
    app.engine
        .update_settings(settings)
        .await
        .map_err(|e| bad_request(e.to_string()))?;
    Ok(Json(app.engine.settings()))
}

// GET /profiles (catalogue constructeurs)
async fn list_profiles(State(app): State<AppState>) -> Json<Vec<VendorProfile>> {
    Json(app.engine.catalog().list().into_iter().cloned().collect())
}

// GET /export ({printers, alerts, settings})
async fn export_snapshot(State(app): State<AppState>) -> Json<Snapshot> {
    Json(app.engine.export_snapshot())
}

// POST /import (tout ou rien)
async fn import_snapshot(
    State(app): State<AppState>,
    body: String,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    app.engine
        .import_snapshot(&body)
        .await
        .map_err(|e| bad_request(e.to_string()))?;
    Ok(Json(json!({ "status": "imported" })))
}
