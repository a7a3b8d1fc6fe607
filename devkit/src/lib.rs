/*!
# fwsync DevKit - Stubs et Utilitaires pour les tests

Bibliothèque facilitant les tests du moteur de synchronisation avec:
- un Sink en mémoire qui enregistre les écritures et simule des pannes
- une source Discovery scriptée
- des builders de hosts au format de la box
- un harness qui branche le tout sur un vrai SyncScheduler
*/

pub mod discovery_stub;
pub mod host_builders;
pub mod sink_stub;
pub mod test_utils;

#[cfg(test)]
mod scenarios;

pub use discovery_stub::MockDiscovery;
pub use host_builders::HostBuilder;
pub use sink_stub::{MockSink, StoredEntity};
pub use test_utils::TestHarness;
