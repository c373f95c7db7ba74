use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::warn;

/// Config bootstrap du process (kernel.yaml). Ne change pas en cours de vie,
/// contrairement aux Settings qui sont modifiables via l'API.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct KernelConfig {
    pub listen_addr: String,
    pub data_dir: String,
    pub snmp: SnmpConf,
    pub notify: Option<NotifyConf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SnmpConf {
    pub port: u16,
    pub retries: u8,
}

/// Relais de notification externes (optionnels).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NotifyConf {
    pub email_endpoint: Option<String>,
    pub sms_endpoint: Option<String>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "./data".into(),
            snmp: SnmpConf::default(),
            notify: None,
        }
    }
}

impl Default for SnmpConf {
    fn default() -> Self {
        Self {
            port: 161,
            retries: 3,
        }
    }
}

pub async fn load_config() -> KernelConfig {
    let path = std::env::var("PRINTLERT_KERNEL_CONFIG").unwrap_or_else(|_| "kernel.yaml".into());
    if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        if txt.trim().is_empty() {
            return KernelConfig::default();
        }
        serde_yaml::from_str(&txt).unwrap_or_else(|e| {
            warn!("[kernel] config invalide: {e}");
            KernelConfig::default()
        })
    } else {
        warn!("[kernel] pas de kernel.yaml, usage config par défaut");
        KernelConfig::default()
    }
}
