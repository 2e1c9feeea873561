/**
 * CONTINUUM CORE - Pipeline d'ingestion et de traitement des métriques
 *
 * RÔLE : Tout ce qui a un vrai contrat de données ou un invariant temporel.
 * Les crates gateway/processor ne font que brancher ce pipeline sur HTTP.
 *
 * ARCHITECTURE :
 * - payload / validate / normalize / enrich : transformations pures (aucune I/O)
 * - store : capacité "keyed store" (mémoire ou Redis) avec TTL
 * - presence / history : état temporel possédé par la passerelle
 * - export : échantillons jetables par appel, poussés vers un sink (Pushgateway)
 * - forward : remise fire-and-forget vers le processor (file bornée + worker)
 * - coordinator : rôles Gateway et Processor, politique d'échec à chaque étape
 * - telemetry : registres Prometheus propres à chaque rôle
 */

pub mod coordinator;
pub mod enrich;
pub mod export;
pub mod forward;
pub mod history;
pub mod normalize;
pub mod payload;
pub mod presence;
pub mod store;
pub mod telemetry;
pub mod validate;

pub use coordinator::{AcceptAck, Gateway, GatewayError, ProcessError, ProcessedAck, Processor};
pub use enrich::{EnrichedRecord, Enricher, Layer, LayerTable};
pub use export::{ExportError, Exporter, MetricsSink, PushgatewaySink, Sample, SampleBatch};
pub use forward::{ForwardError, ForwardQueue, HttpProcessorClient, ProcessorClient};
pub use history::HistoryRing;
pub use normalize::{normalize, NormalizedRecord, Source};
pub use payload::{MetricPayload, MetricValue, Metrics};
pub use presence::PresenceTracker;
pub use store::{KeyedStore, MemoryStore, RedisStore, StoreError};
pub use telemetry::{GatewayMetrics, ProcessorMetrics};
pub use validate::{validate, ValidationError};

/// Horodatage ISO-8601 "maintenant" (UTC, microsecondes) utilisé dans toutes les réponses.
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
