/*!
Test Harness pour le moteur Printlert

Facilite l'écriture de tests de bout en bout avec:
- Moteur complet monté sur un store temporaire
- Flotte SNMP scriptée (aucune imprimante requise)
- Assertions sur les alertes produites par les cycles
*/

use anyhow::Result;
use std::sync::Arc;

use printlert_kernel::alerts::{Alert, AlertKind, AlertManager};
use printlert_kernel::health::HealthTracker;
use printlert_kernel::models::Printer;
use printlert_kernel::profiles::ProfileCatalog;
use printlert_kernel::registry::PrinterRegistry;
use printlert_kernel::scan::ScanEngine;
use printlert_kernel::settings::Settings;
use printlert_kernel::state::new_state;
use printlert_kernel::store::JsonStore;

use crate::snmp_stub::ScriptedFleet;

/// Harness de test complet : moteur + flotte scriptée + store temporaire.
pub struct TestHarness {
    pub engine: ScanEngine,
    pub fleet: ScriptedFleet,
    _data_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        env_logger::try_init().ok(); // Init logging pour tests

        let data_dir = tempfile::tempdir().expect("tempdir");
        let store = JsonStore::new(data_dir.path());
        let fleet = ScriptedFleet::new();

        let engine = ScanEngine::new(
            PrinterRegistry::new(store.clone()),
            AlertManager::new(store.clone()),
            Arc::new(ProfileCatalog::builtin()),
            Arc::new(fleet.clone()),
            new_state(settings),
            store,
            HealthTracker::new(),
        );

        Self {
            engine,
            fleet,
            _data_dir: data_dir,
        }
    }

    /// Enregistre une imprimante couleur et programme le stub en face.
    pub async fn add_color_printer(
        &self,
        name: &str,
        ip: &str,
        model: &str,
        black_pct: i64,
    ) -> Result<Printer> {
        let printer = self
            .engine
            .registry()
            .add_printer(name, ip, "public", model, self.engine.catalog())
            .await?;
        let profile = self.engine.catalog().get(model)?.clone();
        self.fleet
            .program_color_printer(ip, &profile, name, black_pct, 80, 80, 80);
        log::info!("🖨️ Added color printer {name} at {ip}");
        Ok(printer)
    }

    /// Enregistre une imprimante monochrome (MIB couleur absente côté stub).
    pub async fn add_mono_printer(
        &self,
        name: &str,
        ip: &str,
        model: &str,
        black_pct: i64,
    ) -> Result<Printer> {
        let printer = self
            .engine
            .registry()
            .add_printer(name, ip, "public", model, self.engine.catalog())
            .await?;
        let profile = self.engine.catalog().get(model)?.clone();
        self.fleet.program_mono_printer(ip, &profile, name, black_pct);
        Ok(printer)
    }

    /// Enregistre une imprimante sans rien programmer côté stub :
    /// toutes ses requêtes partiront en timeout.
    pub async fn add_dead_printer(&self, name: &str, ip: &str, model: &str) -> Result<Printer> {
        Ok(self
            .engine
            .registry()
            .add_printer(name, ip, "public", model, self.engine.catalog())
            .await?)
    }

    pub fn alerts_of_kind(&self, kind: AlertKind) -> Vec<Alert> {
        self.engine
            .alerts()
            .list()
            .into_iter()
            .filter(|a| a.kind == kind)
            .collect()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use printlert_kernel::scan::ScanError;
    use printlert_kernel::snmp::SnmpValue;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cycle_isolates_the_dead_printer() {
        let harness = TestHarness::new();
        harness.add_color_printer("Accueil", "10.0.0.1", "generic", 80).await.unwrap();
        harness.add_dead_printer("Cave", "10.0.0.2", "generic").await.unwrap();
        harness.add_color_printer("Etage", "10.0.0.3", "canon", 90).await.unwrap();

        let summary = harness.engine.scan_all().await.unwrap();
        assert_eq!(summary.scanned, 3);
        assert_eq!(summary.online, 2);
        assert_eq!(summary.offline, 1);

        // exactement une imprimante offline, et une seule alerte pour elle
        let offline: Vec<_> = harness
            .engine
            .registry()
            .list()
            .into_iter()
            .filter(|p| !p.is_online)
            .collect();
        assert_eq!(offline.len(), 1);
        assert_eq!(offline[0].ip, "10.0.0.2");
        assert_eq!(harness.alerts_of_kind(AlertKind::Error).len(), 1);
        assert_eq!(harness.engine.alerts().list().len(), 1);
    }

    #[tokio::test]
    async fn test_hp_low_black_scenario() {
        // imprimante hp, noir à 8/100, seuils 20/10 -> une alerte critical
        let harness = TestHarness::new();
        harness.add_color_printer("HP LaserJet Pro", "192.168.1.100", "hp", 8).await.unwrap();

        harness.engine.scan_all().await.unwrap();

        let criticals = harness.alerts_of_kind(AlertKind::Critical);
        assert_eq!(criticals.len(), 1);
        assert!(criticals[0].title.contains("Black Toner"));
        assert!(criticals[0].message.contains("8%"));

        let printer = &harness.engine.registry().list()[0];
        assert_eq!(printer.supplies[0].percentage, Some(8));
        assert!(printer.is_online);
    }

    #[tokio::test]
    async fn test_mono_printer_degrades_to_black_only() {
        let harness = TestHarness::new();
        harness.add_mono_printer("Brother Mono", "10.0.0.5", "brother", 60).await.unwrap();

        let summary = harness.engine.scan_all().await.unwrap();
        assert_eq!(summary.online, 1);

        let printer = &harness.engine.registry().list()[0];
        assert!(printer.is_online);
        assert_eq!(printer.supplies.len(), 1);
        assert_eq!(printer.supplies[0].name, "Black Toner");
        assert!(harness.engine.alerts().list().is_empty());
    }

    #[tokio::test]
    async fn test_slow_device_is_bounded_by_timeout() {
        let harness = TestHarness::with_settings(Settings {
            request_timeout_ms: 100,
            ..Settings::default()
        });
        let printer = harness.add_color_printer("Lente", "10.0.0.7", "generic", 80).await.unwrap();

        // le niveau noir répond trop tard : groupe de base en échec -> offline
        let profile = harness.engine.catalog().get("generic").unwrap().clone();
        harness.fleet.program(
            "10.0.0.7",
            &profile.black.level,
            crate::snmp_stub::ScriptedResponse::Slow(
                Duration::from_secs(5),
                SnmpValue::Integer(80),
            ),
        );

        let summary = harness.engine.scan_all().await.unwrap();
        assert_eq!(summary.offline, 1);
        let updated = harness.engine.registry().get(&printer.id).unwrap();
        assert!(!updated.is_online);
        assert!(updated.supplies.is_empty());
    }

    #[tokio::test]
    async fn test_retention_caps_alerts_after_cycle() {
        // plafond à 2 : après un cycle qui émet 3 alertes critical,
        // seules les 2 plus récentes survivent
        let harness = TestHarness::with_settings(Settings {
            max_alerts: 2,
            ..Settings::default()
        });
        harness.add_color_printer("A", "10.0.0.1", "generic", 5).await.unwrap();
        harness.add_color_printer("B", "10.0.0.2", "generic", 5).await.unwrap();
        harness.add_color_printer("C", "10.0.0.3", "generic", 5).await.unwrap();

        harness.engine.scan_all().await.unwrap();
        assert_eq!(harness.engine.alerts().list().len(), 2);
    }

    #[tokio::test]
    async fn test_persisted_state_survives_after_cycle() {
        let harness = TestHarness::new();
        harness.add_color_printer("A", "10.0.0.1", "generic", 8).await.unwrap();
        harness.engine.scan_all().await.unwrap();

        // le cycle persiste imprimantes et alertes dans le store
        let registry = PrinterRegistry::new(JsonStore::new(harness._data_dir.path()));
        registry.load().await.unwrap();
        assert_eq!(registry.list().len(), 1);
        assert!(registry.list()[0].is_online);

        let alerts = AlertManager::new(JsonStore::new(harness._data_dir.path()));
        alerts.load().await.unwrap();
        assert_eq!(alerts.list().len(), 1);
    }

    #[tokio::test]
    async fn test_export_import_roundtrip_identity() {
        let harness = TestHarness::new();
        harness.add_color_printer("A", "10.0.0.1", "hp", 8).await.unwrap();
        harness.add_mono_printer("B", "10.0.0.2", "brother", 90).await.unwrap();
        harness.engine.scan_all().await.unwrap();

        let exported = serde_json::to_string(&harness.engine.export_snapshot()).unwrap();

        let fresh = TestHarness::new();
        fresh.engine.import_snapshot(&exported).await.unwrap();
        let reexported = serde_json::to_string(&fresh.engine.export_snapshot()).unwrap();
        assert_eq!(exported, reexported);
    }

    #[tokio::test]
    async fn test_manual_scan_conflicts_with_running_cycle() {
        let harness = TestHarness::with_settings(Settings {
            request_timeout_ms: 1000,
            ..Settings::default()
        });
        let profile = harness.engine.catalog().get("generic").unwrap().clone();
        harness.add_color_printer("Lente", "10.0.0.9", "generic", 80).await.unwrap();
        harness.fleet.program(
            "10.0.0.9",
            &profile.system_name,
            crate::snmp_stub::ScriptedResponse::Slow(
                Duration::from_millis(300),
                SnmpValue::OctetString("Lente".into()),
            ),
        );

        let engine = harness.engine.clone();
        let running = tokio::spawn(async move { engine.scan_all().await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(matches!(harness.engine.scan_all().await, Err(ScanError::Busy)));
        assert!(running.await.unwrap().is_ok());
    }
}
