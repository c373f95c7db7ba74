use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

/// Clés logiques fixes sous lesquelles l'état est persisté.
pub const KEY_PRINTERS: &str = "printers";
pub const KEY_ALERTS: &str = "alerts";
pub const KEY_SETTINGS: &str = "settings";

/// Persistance clé -> blob JSON dans le data dir (un fichier par clé).
/// Le moteur ne connaît que save/load ; le format disque reste son affaire.
#[derive(Debug, Clone)]
pub struct JsonStore {
    data_dir: PathBuf,
}

impl JsonStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{key}.json"))
    }

    pub async fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        tokio::fs::create_dir_all(&self.data_dir).await?;
        let content = serde_json::to_string_pretty(value)?;
        tokio::fs::write(self.path_for(key), content).await?;
        debug!("[store] saved {key}");
        Ok(())
    }

    /// `None` quand la clé n'a jamais été écrite (premier démarrage).
    pub async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = tokio::fs::read_to_string(&path).await?;
        Ok(Some(serde_json::from_str(&content)?))
    }
}
