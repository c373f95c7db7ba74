/*!
# Printlert Kernel - Moteur de scan et d'alertes

Surveillance SNMP d'une flotte d'imprimantes : profils OID par constructeur,
cycles de scan à parallélisme borné, classification des consommables,
alertes avec rétention et acquittement, escalade email/SMS et API REST.
*/

pub mod alerts;
pub mod config;
pub mod health;
pub mod http;
pub mod models;
pub mod notify;
pub mod profiles;
pub mod registry;
pub mod scan;
pub mod settings;
pub mod snmp;
pub mod state;
pub mod store;
