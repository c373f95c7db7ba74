use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::alerts::Alert;
use crate::settings::Settings;

/// Une imprimante enregistrée dans la flotte. Les champs de scan
/// (is_online, supplies, last_*) sont remplacés en bloc à chaque cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Printer {
    pub id: String,
    /// Nom affiché ; écrasé par le sysName SNMP quand l'appareil en publie un
    pub name: String,
    pub ip: String,
    /// Communauté SNMP ("public" par défaut)
    pub community: String,
    /// Clé du profil constructeur (ex: "hp", "generic")
    pub model: String,
    pub description: Option<String>,
    pub is_online: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_scan: Option<OffsetDateTime>,
    /// Durée du dernier scan de cette imprimante, en millisecondes
    pub last_scan_ms: Option<u64>,
    pub supplies: Vec<Supply>,
    pub last_error: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Printer {
    pub fn new(id: String, name: String, ip: String, community: String, model: String) -> Self {
        Self {
            id,
            name,
            ip,
            community,
            model,
            description: None,
            is_online: false,
            last_scan: None,
            last_scan_ms: None,
            supplies: Vec::new(),
            last_error: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Lecture d'un consommable (toner). level/max_level sont les valeurs brutes
/// SNMP ; None quand l'appareil a répondu autre chose qu'un entier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supply {
    pub name: String,
    pub level: Option<i64>,
    pub max_level: Option<i64>,
    /// round(level / max * 100), borné à 0..=100 ; None si la lecture est inexploitable
    pub percentage: Option<u8>,
    pub status: SupplyStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupplyStatus {
    Critical,
    Warning,
    Healthy,
    /// Capacité nulle ou lecture non numérique : exclu des compteurs et des alertes
    Unknown,
}

/// `critical` si p <= critical_threshold, sinon `warning` si p <= low_threshold,
/// sinon `healthy`. Pur, pas d'état.
pub fn classify_percentage(percentage: u8, settings: &Settings) -> SupplyStatus {
    if percentage <= settings.critical_threshold {
        SupplyStatus::Critical
    } else if percentage <= settings.low_threshold {
        SupplyStatus::Warning
    } else {
        SupplyStatus::Healthy
    }
}

impl Supply {
    /// Construit une lecture classifiée. max <= 0 ou level négatif/non numérique
    /// ne doit jamais faire paniquer : le consommable passe en Unknown.
    pub fn read(
        name: &str,
        level: Option<i64>,
        max_level: Option<i64>,
        settings: &Settings,
    ) -> Self {
        let percentage = match (level, max_level) {
            (Some(l), Some(m)) if m > 0 && l >= 0 => {
                let pct = ((l as f64 / m as f64) * 100.0).round() as i64;
                Some(pct.clamp(0, 100) as u8)
            }
            _ => None,
        };
        let status = match percentage {
            Some(p) => classify_percentage(p, settings),
            None => SupplyStatus::Unknown,
        };
        Self {
            name: name.to_string(),
            level,
            max_level,
            percentage,
            status,
        }
    }
}

/// Export/import complet de l'état : tout ou rien.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub printers: Vec<Printer>,
    pub alerts: Vec<Alert>,
    pub settings: Settings,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(low: u8, crit: u8) -> Settings {
        Settings {
            low_threshold: low,
            critical_threshold: crit,
            ..Settings::default()
        }
    }

    #[test]
    fn test_classify_boundaries() {
        let s = settings(20, 10);
        // critical ssi p <= crit
        assert_eq!(classify_percentage(0, &s), SupplyStatus::Critical);
        assert_eq!(classify_percentage(10, &s), SupplyStatus::Critical);
        // warning ssi crit < p <= low
        assert_eq!(classify_percentage(11, &s), SupplyStatus::Warning);
        assert_eq!(classify_percentage(20, &s), SupplyStatus::Warning);
        // healthy ssi p > low
        assert_eq!(classify_percentage(21, &s), SupplyStatus::Healthy);
        assert_eq!(classify_percentage(100, &s), SupplyStatus::Healthy);
    }

    #[test]
    fn test_equal_thresholds() {
        // crit == low : la bande warning disparaît
        let s = settings(15, 15);
        assert_eq!(classify_percentage(15, &s), SupplyStatus::Critical);
        assert_eq!(classify_percentage(16, &s), SupplyStatus::Healthy);
    }

    #[test]
    fn test_supply_percentage_rounding() {
        let s = settings(20, 10);
        let supply = Supply::read("Black Toner", Some(8), Some(100), &s);
        assert_eq!(supply.percentage, Some(8));
        assert_eq!(supply.status, SupplyStatus::Critical);

        // 1/3 -> 33.33 -> 33
        let supply = Supply::read("Black Toner", Some(1), Some(3), &s);
        assert_eq!(supply.percentage, Some(33));
    }

    #[test]
    fn test_zero_capacity_is_unknown() {
        let s = settings(20, 10);
        let supply = Supply::read("Black Toner", Some(50), Some(0), &s);
        assert_eq!(supply.percentage, None);
        assert_eq!(supply.status, SupplyStatus::Unknown);
    }

    #[test]
    fn test_non_numeric_reading_is_unknown() {
        let s = settings(20, 10);
        let supply = Supply::read("Cyan Toner", None, Some(100), &s);
        assert_eq!(supply.status, SupplyStatus::Unknown);
    }

    #[test]
    fn test_level_above_capacity_clamps() {
        let s = settings(20, 10);
        let supply = Supply::read("Black Toner", Some(150), Some(100), &s);
        assert_eq!(supply.percentage, Some(100));
        assert_eq!(supply.status, SupplyStatus::Healthy);
    }
}
