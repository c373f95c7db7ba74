/*!
# Printlert DevKit - Stubs et Utilitaires pour Développement

Bibliothèque facilitant le développement autour du kernel Printlert avec:
- Stub SNMP scripté pour tester sans imprimante réelle
- Harness de test du moteur complet (scan + alertes + persistance)
- Scénarios de flotte prêts à l'emploi (couleur, monochrome, injoignable)
*/

pub mod snmp_stub;
pub mod test_utils;

pub use snmp_stub::{ScriptedFleet, ScriptedResponse};
pub use test_utils::TestHarness;
