use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::alerts::AlertManager;
use crate::models::SupplyStatus;
use crate::registry::PrinterRegistry;

#[derive(Debug, Serialize, Deserialize)]
pub struct KernelHealth {
    pub uptime_seconds: u64,
    pub printers_tracked: u32,
    pub printers_online: u32,
    pub scan_cycles_completed: u64,
    pub last_cycle_ms: Option<u64>,
    pub active_alerts: u32,
    pub unacknowledged_alerts: u32,
    pub supplies: SupplySummary,
}

/// Compteurs par tier sur l'ensemble de la flotte. Les lectures Unknown
/// (capacité nulle, valeur non numérique) sont comptées à part et
/// n'apparaissent jamais dans critical/warning.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SupplySummary {
    pub critical: u32,
    pub warning: u32,
    pub healthy: u32,
    pub unknown: u32,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    scan_cycles: Arc<AtomicU64>,
    last_cycle_ms: Arc<AtomicU64>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            scan_cycles: Arc::new(AtomicU64::new(0)),
            last_cycle_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record_cycle(&self, duration: Duration) {
        self.scan_cycles.fetch_add(1, Ordering::Relaxed);
        self.last_cycle_ms
            .store(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn get_health(&self, registry: &PrinterRegistry, alerts: &AlertManager) -> KernelHealth {
        let (online, total) = registry.counts();
        let alert_list = alerts.list();

        let mut supplies = SupplySummary::default();
        for printer in registry.list() {
            for supply in &printer.supplies {
                match supply.status {
                    SupplyStatus::Critical => supplies.critical += 1,
                    SupplyStatus::Warning => supplies.warning += 1,
                    SupplyStatus::Healthy => supplies.healthy += 1,
                    SupplyStatus::Unknown => supplies.unknown += 1,
                }
            }
        }

        let cycles = self.scan_cycles.load(Ordering::Relaxed);
        KernelHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            printers_tracked: total as u32,
            printers_online: online as u32,
            scan_cycles_completed: cycles,
            last_cycle_ms: if cycles > 0 {
                Some(self.last_cycle_ms.load(Ordering::Relaxed))
            } else {
                None
            },
            active_alerts: alert_list.len() as u32,
            unacknowledged_alerts: alerts.unacknowledged_count() as u32,
            supplies,
        }
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}
