/*!
# Continuum DevKit - Stubs et utilitaires pour le développement

Bibliothèque facilitant les tests du relais sans Redis ni Pushgateway :
- Sinks de métriques qui enregistrent (ou refusent) les lots
- Clients processor en mémoire ou branchés directement sur un `Processor`
- Builder de payloads producteur
- Harness reliant passerelle et processor en un seul process
*/

pub mod payload_builder;
pub mod processor_stub;
pub mod sink_stub;
pub mod test_utils;

pub use payload_builder::PayloadBuilder;
pub use processor_stub::{InProcessProcessor, RecordingProcessor};
pub use sink_stub::RecordingSink;
pub use test_utils::TestHarness;
