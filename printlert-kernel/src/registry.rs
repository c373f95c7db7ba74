/**
 * PRINTER REGISTRY - Gestion de la flotte d'imprimantes
 *
 * RÔLE : Registration, persistance et mise à jour des imprimantes surveillées.
 * Le registre est le propriétaire exclusif des Printer ; le moteur de scan
 * reçoit des copies et réécrit le snapshot complet après chaque scan.
 *
 * ARCHITECTURE : Map id -> Printer derrière un lock, persistance JSON
 * via le store après chaque mutation.
 */
use std::collections::HashMap;
use std::net::Ipv4Addr;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::Printer;
use crate::profiles::ProfileCatalog;
use crate::settings::ValidationError;
use crate::state::{new_state, Shared};
use crate::store::{JsonStore, KEY_PRINTERS};

#[derive(Clone)]
pub struct PrinterRegistry {
    printers: Shared<HashMap<String, Printer>>,
    store: JsonStore,
}

impl PrinterRegistry {
    pub fn new(store: JsonStore) -> Self {
        Self {
            printers: new_state(HashMap::new()),
            store,
        }
    }

    pub async fn load(&self) -> anyhow::Result<()> {
        if let Some(printers) = self.store.load::<Vec<Printer>>(KEY_PRINTERS).await? {
            let mut map = self.printers.lock();
            *map = printers.into_iter().map(|p| (p.id.clone(), p)).collect();
            info!("[registry] loaded {} printers", map.len());
        }
        Ok(())
    }

    pub async fn save(&self) -> anyhow::Result<()> {
        let printers = self.list();
        self.store.save(KEY_PRINTERS, &printers).await
    }

    /// Ajoute une imprimante validée. Tout ou rien : une entrée valide est
    /// ajoutée, sinon rien ne change.
    pub async fn add_printer(
        &self,
        name: &str,
        ip: &str,
        community: &str,
        model: &str,
        catalog: &ProfileCatalog,
    ) -> Result<Printer, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError("printer name must not be empty".into()));
        }
        // quad pointé strict, comme la validation d'origine
        if ip.trim().parse::<Ipv4Addr>().is_err() {
            return Err(ValidationError(format!("invalid IPv4 address: {ip}")));
        }
        if !catalog.contains(model) {
            return Err(ValidationError(format!("unknown printer model: {model}")));
        }
        let community = community.trim();
        let community = if community.is_empty() { "public" } else { community };

        let printer = Printer::new(
            Uuid::now_v7().to_string(),
            name.to_string(),
            ip.trim().to_string(),
            community.to_string(),
            model.to_string(),
        );

        {
            let mut printers = self.printers.lock();
            printers.insert(printer.id.clone(), printer.clone());
        }
        if let Err(e) = self.save().await {
            warn!("[registry] failed to persist after add: {e}");
        }
        info!("[registry] added printer {} ({})", printer.name, printer.ip);
        Ok(printer)
    }

    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.printers.lock().remove(id).is_some();
        if removed {
            if let Err(e) = self.save().await {
                warn!("[registry] failed to persist after remove: {e}");
            }
            info!("[registry] removed printer {id}");
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<Printer> {
        self.printers.lock().get(id).cloned()
    }

    /// Liste stable (ordre d'enregistrement) pour l'API et l'export.
    pub fn list(&self) -> Vec<Printer> {
        let mut printers: Vec<Printer> = self.printers.lock().values().cloned().collect();
        printers.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        printers
    }

    /// Réécrit le snapshot d'une imprimante après scan. Ignoré si elle a été
    /// retirée entre temps.
    pub fn update(&self, printer: Printer) {
        let mut printers = self.printers.lock();
        if printers.contains_key(&printer.id) {
            printers.insert(printer.id.clone(), printer);
        }
    }

    pub fn replace_all(&self, list: Vec<Printer>) {
        *self.printers.lock() = list.into_iter().map(|p| (p.id.clone(), p)).collect();
    }

    /// (en ligne, total) pour le résumé de flotte.
    pub fn counts(&self) -> (usize, usize) {
        let printers = self.printers.lock();
        let online = printers.values().filter(|p| p.is_online).count();
        (online, printers.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (PrinterRegistry, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (PrinterRegistry::new(JsonStore::new(dir.path())), dir)
    }

    #[tokio::test]
    async fn test_add_printer_validates_ip() {
        let (reg, _dir) = registry();
        let catalog = ProfileCatalog::builtin();

        let err = reg
            .add_printer("Front Desk", "999.168.1.10", "public", "hp", &catalog)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("IPv4"));
        // rejet = aucune mutation
        assert!(reg.list().is_empty());

        let printer = reg
            .add_printer("Front Desk", "192.168.1.100", "", "hp", &catalog)
            .await
            .unwrap();
        assert_eq!(printer.community, "public");
        assert_eq!(reg.list().len(), 1);
    }

    #[tokio::test]
    async fn test_add_printer_rejects_unknown_model() {
        let (reg, _dir) = registry();
        let catalog = ProfileCatalog::builtin();
        let err = reg
            .add_printer("Copy Room", "10.0.0.5", "public", "ricoh", &catalog)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("model"));
    }

    #[tokio::test]
    async fn test_remove_and_counts() {
        let (reg, _dir) = registry();
        let catalog = ProfileCatalog::builtin();
        let printer = reg
            .add_printer("A", "10.0.0.1", "public", "generic", &catalog)
            .await
            .unwrap();

        assert_eq!(reg.counts(), (0, 1));
        assert!(reg.remove(&printer.id).await);
        assert!(!reg.remove(&printer.id).await);
        assert_eq!(reg.counts(), (0, 0));
    }

    #[tokio::test]
    async fn test_update_ignores_removed_printer() {
        let (reg, _dir) = registry();
        let catalog = ProfileCatalog::builtin();
        let mut printer = reg
            .add_printer("A", "10.0.0.1", "public", "generic", &catalog)
            .await
            .unwrap();
        reg.remove(&printer.id).await;

        printer.is_online = true;
        reg.update(printer);
        assert!(reg.list().is_empty());
    }

    #[tokio::test]
    async fn test_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        let catalog = ProfileCatalog::builtin();

        let reg = PrinterRegistry::new(store.clone());
        reg.add_printer("A", "10.0.0.1", "public", "hp", &catalog)
            .await
            .unwrap();

        let reloaded = PrinterRegistry::new(store);
        reloaded.load().await.unwrap();
        assert_eq!(reloaded.list().len(), 1);
        assert_eq!(reloaded.list()[0].name, "A");
    }
}
