/**
 * PROFILS CONSTRUCTEURS - Catalogue des OID par famille d'imprimantes
 *
 * RÔLE : Table clé -> profil (sysName, status, toner par couleur) consultée
 * une fois par scan. Pas de hiérarchie par constructeur : ajouter un vendor
 * = enregistrer un nouveau profil, jamais muter un existant.
 *
 * ARCHITECTURE : Registry en lecture seule après construction, comme le
 * catalogue de contrats du kernel.
 */
use serde::Serialize;
use std::collections::HashMap;

/// Paire d'OID niveau / capacité pour un toner.
#[derive(Debug, Clone, Serialize)]
pub struct TonerOids {
    pub level: String,
    pub max_level: String,
}

impl TonerOids {
    fn new(level: &str, max_level: &str) -> Self {
        Self {
            level: level.to_string(),
            max_level: max_level.to_string(),
        }
    }
}

/// Profil d'une famille d'imprimantes. Invariant : sysName, status et la
/// paire noire sont toujours définis ; les couleurs sont optionnelles
/// (imprimantes monochromes).
#[derive(Debug, Clone, Serialize)]
pub struct VendorProfile {
    pub key: String,
    pub name: String,
    pub system_name: String,
    pub system_description: String,
    pub printer_status: String,
    pub black: TonerOids,
    pub cyan: Option<TonerOids>,
    pub magenta: Option<TonerOids>,
    pub yellow: Option<TonerOids>,
}

impl VendorProfile {
    /// Les trois paires couleur quand le profil en définit.
    pub fn color_pairs(&self) -> Option<[(&'static str, &TonerOids); 3]> {
        match (&self.cyan, &self.magenta, &self.yellow) {
            (Some(c), Some(m), Some(y)) => {
                Some([("Cyan Toner", c), ("Magenta Toner", m), ("Yellow Toner", y)])
            }
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown printer model: {0}")]
pub struct UnknownModel(pub String);

#[derive(Debug, Clone)]
pub struct ProfileCatalog {
    profiles: HashMap<String, VendorProfile>,
}

// OID standard Printer-MIB (prtMarkerSupplies) partagés par la plupart des vendors
const STD_SYSTEM_NAME: &str = "1.3.6.1.2.1.25.3.2.1.3.1";
const STD_SYSTEM_DESCRIPTION: &str = "1.3.6.1.2.1.1.1.0";
const STD_PRINTER_STATUS: &str = "1.3.6.1.2.1.25.3.5.1.1.1";

impl ProfileCatalog {
    pub fn new() -> Self {
        Self {
            profiles: HashMap::new(),
        }
    }

    /// Catalogue embarqué : les sept familles supportées et leurs OID.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();

        // Table prtMarkerSupplies générique (43.10.2.1.4/5, colonnes 1-4)
        for (key, name) in [
            ("generic", "Generic Printer"),
            ("canon", "Canon Printer"),
            ("epson", "Epson Printer"),
            ("brother", "Brother Printer"),
            ("lexmark", "Lexmark Printer"),
            ("xerox", "Xerox Printer"),
        ] {
            catalog.register(VendorProfile {
                key: key.to_string(),
                name: name.to_string(),
                system_name: STD_SYSTEM_NAME.to_string(),
                system_description: STD_SYSTEM_DESCRIPTION.to_string(),
                printer_status: STD_PRINTER_STATUS.to_string(),
                black: TonerOids::new("1.3.6.1.2.1.43.10.2.1.4.1.1", "1.3.6.1.2.1.43.10.2.1.5.1.1"),
                cyan: Some(TonerOids::new(
                    "1.3.6.1.2.1.43.10.2.1.4.1.2",
                    "1.3.6.1.2.1.43.10.2.1.5.1.2",
                )),
                magenta: Some(TonerOids::new(
                    "1.3.6.1.2.1.43.10.2.1.4.1.3",
                    "1.3.6.1.2.1.43.10.2.1.5.1.3",
                )),
                yellow: Some(TonerOids::new(
                    "1.3.6.1.2.1.43.10.2.1.4.1.4",
                    "1.3.6.1.2.1.43.10.2.1.5.1.4",
                )),
            });
        }

        // HP publie les niveaux dans prtMarkerSuppliesTable 43.11.1.1.9/8
        catalog.register(VendorProfile {
            key: "hp".to_string(),
            name: "HP Printer".to_string(),
            system_name: STD_SYSTEM_NAME.to_string(),
            system_description: STD_SYSTEM_DESCRIPTION.to_string(),
            printer_status: STD_PRINTER_STATUS.to_string(),
            black: TonerOids::new("1.3.6.1.2.1.43.11.1.1.9.1.1", "1.3.6.1.2.1.43.11.1.1.8.1.1"),
            cyan: Some(TonerOids::new(
                "1.3.6.1.2.1.43.11.1.1.9.1.2",
                "1.3.6.1.2.1.43.11.1.1.8.1.2",
            )),
            magenta: Some(TonerOids::new(
                "1.3.6.1.2.1.43.11.1.1.9.1.3",
                "1.3.6.1.2.1.43.11.1.1.8.1.3",
            )),
            yellow: Some(TonerOids::new(
                "1.3.6.1.2.1.43.11.1.1.9.1.4",
                "1.3.6.1.2.1.43.11.1.1.8.1.4",
            )),
        });

        catalog
    }

    fn register(&mut self, profile: VendorProfile) {
        self.profiles.insert(profile.key.clone(), profile);
    }

    pub fn get(&self, model: &str) -> Result<&VendorProfile, UnknownModel> {
        self.profiles
            .get(model)
            .ok_or_else(|| UnknownModel(model.to_string()))
    }

    pub fn contains(&self, model: &str) -> bool {
        self.profiles.contains_key(model)
    }

    /// Liste triée par clé pour une sortie API stable.
    pub fn list(&self) -> Vec<&VendorProfile> {
        let mut profiles: Vec<&VendorProfile> = self.profiles.values().collect();
        profiles.sort_by(|a, b| a.key.cmp(&b.key));
        profiles
    }
}

impl Default for ProfileCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
