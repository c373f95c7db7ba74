/**
 * PRINTLERT KERNEL - Point d'entrée principal du serveur Printlert
 *
 * RÔLE : Orchestration de tous les modules : config, store, registre,
 * alertes, scan scheduler, HTTP. Bootstrap du système complet avec gestion
 * d'erreurs et logging.
 *
 * ARCHITECTURE : Un moteur unique porté par le process (registre + alertes +
 * réglages), un driver de scan périodique, une API REST pour le pilotage.
 */
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use printlert_kernel::alerts::AlertManager;
use printlert_kernel::config::load_config;
use printlert_kernel::health::HealthTracker;
use printlert_kernel::http::{self, AppState};
use printlert_kernel::notify::{HttpGateway, NotificationGateway};
use printlert_kernel::profiles::ProfileCatalog;
use printlert_kernel::registry::PrinterRegistry;
use printlert_kernel::scan::{spawn_scan_scheduler, ScanEngine};
use printlert_kernel::settings::Settings;
use printlert_kernel::snmp::SnmpClient;
use printlert_kernel::state::new_state;
use printlert_kernel::store::{JsonStore, KEY_SETTINGS};

#[tokio::main]
async fn main() {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = load_config().await;
    let store = JsonStore::new(&cfg.data_dir);
    let catalog = Arc::new(ProfileCatalog::builtin());
    info!("[kernel] loaded {} vendor profiles", catalog.list().len());

    // réglages persistés, défauts au premier démarrage
    let settings = match store.load::<Settings>(KEY_SETTINGS).await {
        Ok(Some(s)) => s,
        Ok(None) => Settings::default(),
        Err(e) => {
            warn!("[kernel] failed to load settings, using defaults: {e}");
            Settings::default()
        }
    };
    let settings = new_state(settings);

    let registry = PrinterRegistry::new(store.clone());
    if let Err(e) = registry.load().await {
        error!("[kernel] failed to load printers: {e}");
    }

    let (email_endpoint, sms_endpoint) = cfg
        .notify
        .as_ref()
        .map(|n| (n.email_endpoint.clone(), n.sms_endpoint.clone()))
        .unwrap_or((None, None));
    let gateway: Arc<dyn NotificationGateway> =
        Arc::new(HttpGateway::new(email_endpoint, sms_endpoint));

    let alerts = AlertManager::new(store.clone()).with_gateway(gateway);
    if let Err(e) = alerts.load().await {
        error!("[kernel] failed to load alerts: {e}");
    }

    let device = Arc::new(SnmpClient::new(cfg.snmp.port, cfg.snmp.retries));
    let health_tracker = HealthTracker::new();

    let engine = ScanEngine::new(
        registry,
        alerts,
        catalog,
        device,
        settings,
        store,
        health_tracker.clone(),
    );

    // démarre le driver de scan périodique (intervalle relu à chaque tour)
    spawn_scan_scheduler(engine.clone());

    // fabrique l'état unique pour Axum
    let app_state = AppState {
        engine,
        health_tracker,
    };

    // HTTP
    let app = http::build_router(app_state);

    let addr: SocketAddr = cfg.listen_addr.parse().unwrap_or_else(|e| {
        warn!("[kernel] invalid listen_addr ({e}), falling back to 0.0.0.0:8080");
        SocketAddr::from(([0, 0, 0, 0], 8080))
    });
    info!("[kernel] listening on http://{addr}");
    let listener = TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
