use serde::{Deserialize, Serialize};

/// Réglages runtime du moteur, modifiables via l'API et persistés en JSON.
/// Distinct de la config bootstrap (kernel.yaml) qui ne change pas en cours de vie.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seuil "warning" : consommable à ou sous ce pourcentage
    pub low_threshold: u8,
    /// Seuil "critical" : doit rester <= low_threshold
    pub critical_threshold: u8,
    /// Intervalle du scan automatique en secondes (0 = désactivé)
    pub scan_interval_seconds: u64,
    /// Timeout par requête SNMP en millisecondes
    pub request_timeout_ms: u64,
    /// Nombre max d'imprimantes scannées en parallèle
    pub max_parallel_scans: usize,
    pub notifications_enabled: bool,
    pub email_enabled: bool,
    pub email_recipients: Vec<String>,
    pub sms_enabled: bool,
    pub sms_recipients: Vec<String>,
    /// Les alertes plus vieilles que ça sont purgées après chaque cycle
    pub retention_days: u32,
    /// Plafond dur du nombre d'alertes retenues
    pub max_alerts: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            low_threshold: 20,
            critical_threshold: 10,
            scan_interval_seconds: 300,
            request_timeout_ms: 3000,
            max_parallel_scans: 8,
            notifications_enabled: false,
            email_enabled: false,
            email_recipients: Vec::new(),
            sms_enabled: false,
            sms_recipients: Vec::new(),
            retention_days: 30,
            max_alerts: 500,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("validation failed: {0}")]
pub struct ValidationError(pub String);

impl Settings {
    /// Valide les invariants avant tout remplacement des réglages courants.
    /// Aucune mutation partielle : on rejette en bloc.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.critical_threshold > self.low_threshold {
            return Err(ValidationError(format!(
                "critical_threshold ({}) must not exceed low_threshold ({})",
                self.critical_threshold, self.low_threshold
            )));
        }
        if self.low_threshold > 100 {
            return Err(ValidationError(
                "low_threshold must be a percentage (0-100)".into(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(ValidationError("request_timeout_ms must be positive".into()));
        }
        if self.max_parallel_scans == 0 {
            return Err(ValidationError("max_parallel_scans must be positive".into()));
        }
        if self.max_alerts == 0 {
            return Err(ValidationError("max_alerts must be positive".into()));
        }
        Ok(())
    }
}
