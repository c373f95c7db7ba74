/*!
Stub SNMP scripté pour développement sans imprimante réelle

Permet de programmer les réponses d'une flotte entière, point de donnée par
point de donnée, et de rejouer les scénarios réseau : appareil sain, MIB
couleur absente, lien lent, appareil injoignable.
*/

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use printlert_kernel::profiles::VendorProfile;
use printlert_kernel::snmp::{DeviceError, DeviceQuery, SnmpValue};

#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    Value(SnmpValue),
    Fail(DeviceError),
    /// Répond après un délai (lien lent) ; le timeout de la requête s'applique
    Slow(Duration, SnmpValue),
}

/// Flotte SNMP simulée, clé (ip, oid) -> réponse scriptée.
///
/// Une OID non programmée sur une IP connue répond "no such object"
/// (appareil joignable mais MIB absente) ; une IP totalement inconnue
/// répond par un timeout (appareil mort).
#[derive(Clone, Default)]
pub struct ScriptedFleet {
    responses: Arc<Mutex<HashMap<(String, String), ScriptedResponse>>>,
    query_log: Arc<Mutex<Vec<(String, String)>>>,
}

impl ScriptedFleet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn program(&self, ip: &str, oid: &str, response: ScriptedResponse) {
        self.responses
            .lock()
            .insert((ip.to_string(), oid.to_string()), response);
    }

    pub fn program_value(&self, ip: &str, oid: &str, value: SnmpValue) {
        self.program(ip, oid, ScriptedResponse::Value(value));
    }

    /// Programme une imprimante couleur complète d'après son profil
    /// constructeur (status en ligne, toner par couleur en %).
    pub fn program_color_printer(
        &self,
        ip: &str,
        profile: &VendorProfile,
        name: &str,
        black_pct: i64,
        cyan_pct: i64,
        magenta_pct: i64,
        yellow_pct: i64,
    ) {
        self.program_basic(ip, profile, name);
        self.program_value(ip, &profile.black.level, SnmpValue::Integer(black_pct));
        self.program_value(ip, &profile.black.max_level, SnmpValue::Integer(100));
        if let Some(pairs) = profile.color_pairs() {
            let levels = [cyan_pct, magenta_pct, yellow_pct];
            for ((_, oids), level) in pairs.iter().zip(levels) {
                self.program_value(ip, &oids.level, SnmpValue::Integer(level));
                self.program_value(ip, &oids.max_level, SnmpValue::Integer(100));
            }
        }
    }

    /// Imprimante monochrome : les OID couleur restent non programmées et
    /// répondront "no such object".
    pub fn program_mono_printer(&self, ip: &str, profile: &VendorProfile, name: &str, black_pct: i64) {
        self.program_basic(ip, profile, name);
        self.program_value(ip, &profile.black.level, SnmpValue::Integer(black_pct));
        self.program_value(ip, &profile.black.max_level, SnmpValue::Integer(100));
    }

    fn program_basic(&self, ip: &str, profile: &VendorProfile, name: &str) {
        self.program_value(ip, &profile.system_name, SnmpValue::OctetString(name.to_string()));
        self.program_value(
            ip,
            &profile.system_description,
            SnmpValue::OctetString(format!("Scripted printer at {ip}")),
        );
        self.program_value(ip, &profile.printer_status, SnmpValue::Integer(1));
    }

    /// Oublie tout ce qui est programmé pour cette IP : l'appareil devient
    /// injoignable (timeout sur toutes les requêtes).
    pub fn mark_dead(&self, ip: &str) {
        self.responses.lock().retain(|(k, _), _| k != ip);
        log::info!("📴 [STUB] {ip} marked dead");
    }

    /// Journal des requêtes reçues (pour assertions de tests).
    pub fn queries(&self) -> Vec<(String, String)> {
        self.query_log.lock().clone()
    }

    pub fn clear_log(&self) {
        self.query_log.lock().clear();
    }
}

#[async_trait]
impl DeviceQuery for ScriptedFleet {
    async fn get(
        &self,
        ip: &str,
        _community: &str,
        oid: &str,
        timeout: Duration,
    ) -> Result<SnmpValue, DeviceError> {
        self.query_log
            .lock()
            .push((ip.to_string(), oid.to_string()));

        let response = {
            let responses = self.responses.lock();
            match responses.get(&(ip.to_string(), oid.to_string())) {
                Some(r) => r.clone(),
                None => {
                    let known_ip = responses.keys().any(|(k, _)| k == ip);
                    if known_ip {
                        ScriptedResponse::Fail(DeviceError::Protocol("no such object".into()))
                    } else {
                        ScriptedResponse::Fail(DeviceError::Timeout)
                    }
                }
            }
        };

        match response {
            ScriptedResponse::Value(v) => Ok(v),
            ScriptedResponse::Fail(e) => Err(e),
            ScriptedResponse::Slow(delay, v) => {
                if delay >= timeout {
                    tokio::time::sleep(timeout).await;
                    Err(DeviceError::Timeout)
                } else {
                    tokio::time::sleep(delay).await;
                    Ok(v)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use printlert_kernel::profiles::ProfileCatalog;

    #[tokio::test]
    async fn test_unknown_ip_times_out() {
        let fleet = ScriptedFleet::new();
        let err = fleet
            .get("10.9.9.9", "public", "1.3.6.1.2.1.1.1.0", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, DeviceError::Timeout));
    }

    #[tokio::test]
    async fn test_known_ip_unprogrammed_oid_is_protocol_error() {
        let catalog = ProfileCatalog::builtin();
        let profile = catalog.get("generic").unwrap();
        let fleet = ScriptedFleet::new();
        fleet.program_mono_printer("10.0.0.1", profile, "Mono", 50);

        // OID couleur jamais programmée : joignable mais MIB absente
        let err = fleet
            .get("10.0.0.1", "public", &profile.cyan.as_ref().unwrap().level, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, DeviceError::Protocol(_)));

        let value = fleet
            .get("10.0.0.1", "public", &profile.black.level, Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(value, SnmpValue::Integer(50));
        assert_eq!(fleet.queries().len(), 2);
    }
}
