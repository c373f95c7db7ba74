/**
 * ALERT MANAGER - Cycle de vie des alertes de la flotte
 *
 * RÔLE : Création, acquittement, purge par rétention et escalade des alertes
 * issues des scans. Seul ce module crée des alertes ; le moteur de scan lui
 * remet des snapshots classifiés.
 *
 * ARCHITECTURE : Liste partagée triée du plus récent au plus ancien,
 * persistée en JSON après chaque cycle. Une alerte ré-émise à chaque cycle
 * tant que la condition persiste (pas de dédoublonnage par identité) ;
 * seules la rétention et le plafond bornent la croissance.
 */
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Printer, SupplyStatus};
use crate::notify::NotificationGateway;
use crate::settings::Settings;
use crate::state::{new_state, Shared};
use crate::store::{JsonStore, KEY_ALERTS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Critical,
    Warning,
    Error,
    Info,
}

impl AlertKind {
    /// Rang de sévérité dérivé du type.
    pub fn severity(&self) -> u8 {
        match self {
            AlertKind::Critical => 3,
            AlertKind::Error => 2,
            AlertKind::Warning => 1,
            AlertKind::Info => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Critical => "critical",
            AlertKind::Warning => "warning",
            AlertKind::Error => "error",
            AlertKind::Info => "info",
        }
    }
}

/// Immuable après création, à l'exception du flag d'acquittement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// UUID v7 : ordonné dans le temps et résistant aux collisions
    pub id: String,
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub acknowledged: bool,
}

impl Alert {
    pub fn new(kind: AlertKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            kind,
            title: title.into(),
            message: message.into(),
            timestamp: OffsetDateTime::now_utc(),
            acknowledged: false,
        }
    }
}

#[derive(Clone)]
pub struct AlertManager {
    /// Du plus récent au plus ancien ; l'append est sûr sous tâches concurrentes
    alerts: Shared<Vec<Alert>>,
    store: JsonStore,
    gateway: Option<Arc<dyn NotificationGateway>>,
}

impl AlertManager {
    pub fn new(store: JsonStore) -> Self {
        Self {
            alerts: new_state(Vec::new()),
            store,
            gateway: None,
        }
    }

    pub fn with_gateway(mut self, gateway: Arc<dyn NotificationGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub async fn load(&self) -> anyhow::Result<()> {
        if let Some(alerts) = self.store.load::<Vec<Alert>>(KEY_ALERTS).await? {
            let count = alerts.len();
            *self.alerts.lock() = alerts;
            debug!("[alerts] loaded {count} alerts");
        }
        Ok(())
    }

    pub async fn save(&self) -> anyhow::Result<()> {
        let alerts = self.alerts.lock().clone();
        self.store.save(KEY_ALERTS, &alerts).await
    }

    pub fn list(&self) -> Vec<Alert> {
        self.alerts.lock().clone()
    }

    pub fn replace_all(&self, alerts: Vec<Alert>) {
        *self.alerts.lock() = alerts;
    }

    pub fn unacknowledged_count(&self) -> usize {
        self.alerts.lock().iter().filter(|a| !a.acknowledged).count()
    }

    /// Évalue le snapshot d'une imprimante fraîchement scannée.
    /// Hors ligne : exactement UNE alerte, les consommables ne sont pas
    /// évalués (données absentes ou périmées). En ligne : une alerte par
    /// consommable critical/warning ; healthy et unknown n'émettent rien.
    /// Retourne le nombre d'alertes émises.
    pub fn process(&self, printer: &Printer, settings: &Settings) -> usize {
        let mut emitted = Vec::new();

        if !printer.is_online {
            let message = printer.last_error.clone().unwrap_or_else(|| {
                format!("Printer at {} is not responding to SNMP requests", printer.ip)
            });
            emitted.push(Alert::new(
                AlertKind::Error,
                format!("Printer {} is offline", printer.name),
                message,
            ));
        } else {
            for supply in &printer.supplies {
                let Some(percentage) = supply.percentage else {
                    continue;
                };
                match supply.status {
                    SupplyStatus::Critical => emitted.push(Alert::new(
                        AlertKind::Critical,
                        format!("Critical: {} low on {}", supply.name, printer.name),
                        format!(
                            "{} is at {}% - Immediate attention required",
                            supply.name, percentage
                        ),
                    )),
                    SupplyStatus::Warning => emitted.push(Alert::new(
                        AlertKind::Warning,
                        format!("Warning: {} running low on {}", supply.name, printer.name),
                        format!(
                            "{} is at {}% - Consider ordering replacement",
                            supply.name, percentage
                        ),
                    )),
                    SupplyStatus::Healthy | SupplyStatus::Unknown => {}
                }
            }
        }

        let count = emitted.len();
        for alert in &emitted {
            self.escalate(alert, settings);
        }
        {
            // insertion en tête : la liste reste triée du plus récent au plus ancien
            let mut alerts = self.alerts.lock();
            for alert in emitted {
                alerts.insert(0, alert);
            }
        }
        count
    }

    /// Escalade une alerte critique vers les canaux activés, en tâches
    /// détachées : le chemin de scan n'attend jamais la livraison et les
    /// échecs sont seulement journalisés.
    pub fn escalate(&self, alert: &Alert, settings: &Settings) {
        if alert.kind != AlertKind::Critical || !settings.notifications_enabled {
            return;
        }
        let Some(gateway) = &self.gateway else {
            return;
        };

        if settings.email_enabled && !settings.email_recipients.is_empty() {
            let gateway = gateway.clone();
            let recipients = settings.email_recipients.clone();
            let subject = alert.title.clone();
            let body = alert.message.clone();
            let severity = alert.kind.as_str();
            tokio::spawn(async move {
                if let Err(e) = gateway.send_email(&recipients, &subject, &body, severity).await {
                    warn!("[alerts] email escalation failed: {e}");
                }
            });
        }

        if settings.sms_enabled && !settings.sms_recipients.is_empty() {
            let gateway = gateway.clone();
            let recipients = settings.sms_recipients.clone();
            let message = format!("{}: {}", alert.title, alert.message);
            let severity = alert.kind.as_str();
            tokio::spawn(async move {
                if let Err(e) = gateway.send_sms(&recipients, &message, severity).await {
                    warn!("[alerts] sms escalation failed: {e}");
                }
            });
        }
    }

    /// No-op si l'id est inconnu : l'UI peut croiser une purge.
    pub fn acknowledge(&self, alert_id: &str) -> bool {
        let mut alerts = self.alerts.lock();
        match alerts.iter_mut().find(|a| a.id == alert_id) {
            Some(alert) => {
                alert.acknowledged = true;
                true
            }
            None => false,
        }
    }

    pub fn clear_all(&self) {
        self.alerts.lock().clear();
    }

    /// Purge par âge puis troncature au plafond (les plus récentes survivent).
    /// Tourne après chaque cycle complet, jamais par imprimante.
    pub fn run_retention(&self, settings: &Settings) {
        let cutoff = OffsetDateTime::now_utc() - time::Duration::days(settings.retention_days as i64);
        let mut alerts = self.alerts.lock();
        let before = alerts.len();
        alerts.retain(|a| a.timestamp > cutoff);
        if alerts.len() > settings.max_alerts {
            alerts.truncate(settings.max_alerts);
        }
        let evicted = before - alerts.len();
        if evicted > 0 {
            debug!("[alerts] retention evicted {evicted} alerts");
        }
    }
}
