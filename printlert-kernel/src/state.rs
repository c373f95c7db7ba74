use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// Garde d'exclusion mutuelle entre le scan périodique et le "scan now" manuel.
/// Un seul cycle complet à la fois : un tick qui arrive pendant un cycle est
/// rejeté, jamais mis en file.
#[derive(Clone, Default)]
pub struct ScanGuard {
    busy: Arc<AtomicBool>,
}

impl ScanGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tente de prendre le verrou de cycle. `None` si un cycle tourne déjà.
    pub fn try_acquire(&self) -> Option<ScanPermit> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Some(ScanPermit {
                busy: self.busy.clone(),
            })
        } else {
            None
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Libère le verrou au drop, même si le cycle panique.
pub struct ScanPermit {
    busy: Arc<AtomicBool>,
}

impl Drop for ScanPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
