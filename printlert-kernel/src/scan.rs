/**
 * SCAN ENGINE - Orchestration d'un cycle de scan de la flotte
 *
 * RÔLE : Pour chaque imprimante : résolution du profil constructeur,
 * requêtes point par point (groupe de base puis groupe couleur),
 * classification des consommables et remise du snapshot à l'alert manager.
 *
 * FONCTIONNEMENT :
 * - Fan-out une tâche par imprimante, parallélisme borné par sémaphore
 * - Fan-in : on attend tout le monde, aucune panne ne court-circuite le cycle
 * - Les erreurs réseau restent confinées à l'imprimante (offline + alerte)
 * - Un seul cycle à la fois : le tick périodique qui arrive pendant un cycle
 *   est rejeté, pas mis en file
 * - Après le cycle : rétention des alertes puis persistance de l'état
 */
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::alerts::AlertManager;
use crate::health::HealthTracker;
use crate::models::{Printer, Snapshot, Supply};
use crate::profiles::ProfileCatalog;
use crate::registry::PrinterRegistry;
use crate::settings::{Settings, ValidationError};
use crate::snmp::DeviceQuery;
use crate::state::{ScanGuard, Shared};
use crate::store::{JsonStore, KEY_SETTINGS};

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("printer not found: {0}")]
    PrinterNotFound(String),
    #[error("a scan cycle is already in progress")]
    Busy,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid snapshot: {0}")]
pub struct ParseError(String);

impl From<serde_json::Error> for ParseError {
    fn from(e: serde_json::Error) -> Self {
        Self(e.to_string())
    }
}

/// Bilan d'un cycle complet.
#[derive(Debug, Serialize)]
pub struct ScanSummary {
    pub scanned: usize,
    pub online: usize,
    pub offline: usize,
    pub duration_ms: u64,
}

/// Instance unique du moteur, portée par le process : registre, alertes et
/// réglages derrière un cycle de vie explicite, pas de globals ambiants.
#[derive(Clone)]
pub struct ScanEngine {
    registry: PrinterRegistry,
    alerts: AlertManager,
    catalog: Arc<ProfileCatalog>,
    device: Arc<dyn DeviceQuery>,
    settings: Shared<Settings>,
    store: JsonStore,
    health: HealthTracker,
    guard: ScanGuard,
}

impl ScanEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: PrinterRegistry,
        alerts: AlertManager,
        catalog: Arc<ProfileCatalog>,
        device: Arc<dyn DeviceQuery>,
        settings: Shared<Settings>,
        store: JsonStore,
        health: HealthTracker,
    ) -> Self {
        Self {
            registry,
            alerts,
            catalog,
            device,
            settings,
            store,
            health,
            guard: ScanGuard::new(),
        }
    }

    pub fn registry(&self) -> &PrinterRegistry {
        &self.registry
    }

    pub fn alerts(&self) -> &AlertManager {
        &self.alerts
    }

    pub fn catalog(&self) -> &ProfileCatalog {
        &self.catalog
    }

    pub fn settings(&self) -> Settings {
        self.settings.lock().clone()
    }

    /// Remplace les réglages en bloc après validation, puis persiste.
    pub async fn update_settings(&self, new_settings: Settings) -> Result<(), ValidationError> {
        new_settings.validate()?;
        *self.settings.lock() = new_settings.clone();
        if let Err(e) = self.store.save(KEY_SETTINGS, &new_settings).await {
            warn!("[engine] failed to persist settings: {e}");
        }
        Ok(())
    }

    /// Scan manuel d'une seule imprimante.
    pub async fn scan_one(&self, id: &str) -> Result<Printer, ScanError> {
        let printer = self
            .registry
            .get(id)
            .ok_or_else(|| ScanError::PrinterNotFound(id.to_string()))?;
        let settings = self.settings();

        let updated = self.scan_printer(printer, &settings).await;
        self.registry.update(updated.clone());
        if let Err(e) = self.registry.save().await {
            warn!("[scan] failed to persist printers: {e}");
        }
        if let Err(e) = self.alerts.save().await {
            warn!("[scan] failed to persist alerts: {e}");
        }
        Ok(updated)
    }

    /// Un cycle complet sur toute la flotte. N'échoue jamais en bloc :
    /// chaque imprimante a son propre résultat.
    pub async fn scan_all(&self) -> Result<ScanSummary, ScanError> {
        let _permit = self.guard.try_acquire().ok_or(ScanError::Busy)?;
        let started = Instant::now();
        let settings = self.settings();
        let printers = self.registry.list();
        let total = printers.len();
        info!("[scan] cycle started ({total} printers)");

        let semaphore = Arc::new(Semaphore::new(settings.max_parallel_scans.max(1)));
        let mut handles = Vec::with_capacity(total);
        for printer in printers {
            let engine = self.clone();
            let semaphore = semaphore.clone();
            let settings = settings.clone();
            handles.push(tokio::spawn(async move {
                let _slot = semaphore
                    .acquire_owned()
                    .await
                    .expect("scan semaphore closed");
                let updated = engine.scan_printer(printer, &settings).await;
                let online = updated.is_online;
                engine.registry.update(updated);
                online
            }));
        }

        let mut online = 0usize;
        let mut offline = 0usize;
        for handle in handles {
            match handle.await {
                Ok(true) => online += 1,
                Ok(false) => offline += 1,
                Err(e) => {
                    error!("[scan] printer task aborted: {e}");
                    offline += 1;
                }
            }
        }

        self.alerts.run_retention(&settings);
        if let Err(e) = self.registry.save().await {
            warn!("[scan] failed to persist printers: {e}");
        }
        if let Err(e) = self.alerts.save().await {
            warn!("[scan] failed to persist alerts: {e}");
        }

        let duration = started.elapsed();
        self.health.record_cycle(duration);
        info!(
            "[scan] cycle completed in {}ms ({online} online, {offline} offline)",
            duration.as_millis()
        );
        Ok(ScanSummary {
            scanned: total,
            online,
            offline,
            duration_ms: duration.as_millis() as u64,
        })
    }

    /// Protocole de scan d'une imprimante. Retourne toujours le snapshot mis
    /// à jour : les erreurs réseau deviennent un état offline, jamais un Err.
    async fn scan_printer(&self, mut printer: Printer, settings: &Settings) -> Printer {
        let started = Instant::now();
        let timeout = Duration::from_millis(settings.request_timeout_ms);

        let profile = match self.catalog.get(&printer.model) {
            Ok(p) => p.clone(),
            Err(e) => {
                // erreur de configuration, pas une condition réseau
                error!("[scan] printer {} ({}): {e}", printer.name, printer.id);
                finish_offline(&mut printer, e.to_string(), started);
                self.alerts.process(&printer, settings);
                return printer;
            }
        };

        let ip = printer.ip.clone();
        let community = printer.community.clone();

        // groupe de base : tout échec marque l'imprimante offline
        let (sys_name, sys_desc, status, black_level, black_max) = tokio::join!(
            self.device.get(&ip, &community, &profile.system_name, timeout),
            self.device.get(&ip, &community, &profile.system_description, timeout),
            self.device.get(&ip, &community, &profile.printer_status, timeout),
            self.device.get(&ip, &community, &profile.black.level, timeout),
            self.device.get(&ip, &community, &profile.black.max_level, timeout),
        );
        let (sys_name, sys_desc, status, black_level, black_max) =
            match (sys_name, sys_desc, status, black_level, black_max) {
                (Ok(a), Ok(b), Ok(c), Ok(d), Ok(e)) => (a, b, c, d, e),
                (a, b, c, d, e) => {
                    let cause = [a.err(), b.err(), c.err(), d.err(), e.err()]
                        .into_iter()
                        .flatten()
                        .next()
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "device query failed".to_string());
                    warn!("[scan] printer {} ({ip}) offline: {cause}", printer.name);
                    finish_offline(&mut printer, cause, started);
                    self.alerts.process(&printer, settings);
                    return printer;
                }
            };

        let mut supplies = vec![Supply::read(
            "Black Toner",
            black_level.as_i64(),
            black_max.as_i64(),
            settings,
        )];

        // groupe couleur : best-effort en un seul bloc, conditionné au succès
        // du noir. Un échec n'est pas fatal (monochrome ou MIB couleur absente).
        if let Some(pairs) = profile.color_pairs() {
            let [(cyan_name, cyan), (magenta_name, magenta), (yellow_name, yellow)] = pairs;
            let results = tokio::join!(
                self.device.get(&ip, &community, &cyan.level, timeout),
                self.device.get(&ip, &community, &cyan.max_level, timeout),
                self.device.get(&ip, &community, &magenta.level, timeout),
                self.device.get(&ip, &community, &magenta.max_level, timeout),
                self.device.get(&ip, &community, &yellow.level, timeout),
                self.device.get(&ip, &community, &yellow.max_level, timeout),
            );
            match results {
                (Ok(cl), Ok(cm), Ok(ml), Ok(mm), Ok(yl), Ok(ym)) => {
                    supplies.push(Supply::read(cyan_name, cl.as_i64(), cm.as_i64(), settings));
                    supplies.push(Supply::read(magenta_name, ml.as_i64(), mm.as_i64(), settings));
                    supplies.push(Supply::read(yellow_name, yl.as_i64(), ym.as_i64(), settings));
                }
                _ => {
                    debug!("[scan] printer {}: color supplies unavailable, black only", printer.name);
                }
            }
        }

        if let Some(name) = sys_name.as_str().map(str::trim).filter(|s| !s.is_empty()) {
            printer.name = name.to_string();
        }
        printer.description = sys_desc.as_str().map(|s| s.to_string());
        printer.is_online = status.as_i64() == Some(1);
        printer.supplies = supplies;
        printer.last_error = None;
        printer.last_scan = Some(OffsetDateTime::now_utc());
        printer.last_scan_ms = Some(started.elapsed().as_millis() as u64);

        self.alerts.process(&printer, settings);
        printer
    }

    pub fn export_snapshot(&self) -> Snapshot {
        Snapshot {
            printers: self.registry.list(),
            alerts: self.alerts.list(),
            settings: self.settings(),
        }
    }

    /// Import tout ou rien : le blob est entièrement parsé et validé avant
    /// la moindre mutation.
    pub async fn import_snapshot(&self, blob: &str) -> Result<(), ParseError> {
        let snapshot: Snapshot = serde_json::from_str(blob)?;
        snapshot
            .settings
            .validate()
            .map_err(|e| ParseError(e.to_string()))?;

        self.registry.replace_all(snapshot.printers);
        self.alerts.replace_all(snapshot.alerts);
        *self.settings.lock() = snapshot.settings.clone();

        if let Err(e) = self.registry.save().await {
            warn!("[engine] failed to persist printers after import: {e}");
        }
        if let Err(e) = self.alerts.save().await {
            warn!("[engine] failed to persist alerts after import: {e}");
        }
        if let Err(e) = self.store.save(KEY_SETTINGS, &snapshot.settings).await {
            warn!("[engine] failed to persist settings after import: {e}");
        }
        info!("[engine] snapshot imported");
        Ok(())
    }
}

/// Échec non récupérable : les données de consommables précédentes sont
/// écartées, l'erreur est enregistrée sur l'imprimante.
fn finish_offline(printer: &mut Printer, error: String, started: Instant) {
    printer.is_online = false;
    printer.supplies.clear();
    printer.last_error = Some(error);
    printer.last_scan = Some(OffsetDateTime::now_utc());
    printer.last_scan_ms = Some(started.elapsed().as_millis() as u64);
}

/// Driver périodique : relit l'intervalle à chaque tour (0 = désactivé) et
/// déclenche un cycle. Un tick pendant un cycle en cours est sauté.
pub fn spawn_scan_scheduler(engine: ScanEngine) {
    info!("[scheduler] periodic scan driver started");
    tokio::spawn(async move {
        loop {
            let interval = engine.settings.lock().scan_interval_seconds;
            if interval == 0 {
                tokio::time::sleep(Duration::from_secs(5)).await;
                continue;
            }
            tokio::time::sleep(Duration::from_secs(interval)).await;
            match engine.scan_all().await {
                Ok(summary) => debug!(
                    "[scheduler] cycle done ({}/{} online)",
                    summary.online, summary.scanned
                ),
                Err(ScanError::Busy) => debug!("[scheduler] cycle still running, tick skipped"),
                Err(e) => error!("[scheduler] cycle failed: {e}"),
            }
        }
    });
}
