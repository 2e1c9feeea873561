//! Continuum Edge Agent - simulated edge device
//!
//! Generates one reading per interval for its sensor type and posts it to the
//! gateway ingestion endpoint. Delivery failures are logged and the loop keeps going.

mod config;
mod sensors;

use anyhow::{Context, Result};
use config::AgentConfig;
use continuum_core::MetricPayload;
use sensors::SensorKind;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const PUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
enum PushError {
    #[error("error sending to middleware: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to send metrics: {0}")]
    Status(u16),
}

struct Agent {
    config: AgentConfig,
    sensor: Option<SensorKind>,
    client: reqwest::Client,
}

impl Agent {
    fn new(config: AgentConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(PUSH_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        let sensor = SensorKind::from_agent_type(&config.agent_type);
        if sensor.is_none() {
            warn!(
                "[{}] no data generator for agent type '{}', readings will be skipped",
                config.agent_id, config.agent_type
            );
        }
        Ok(Self { config, sensor, client })
    }

    /// Payload for the next reading, `None` when the agent type has no sensor.
    fn next_payload(&self) -> Option<MetricPayload> {
        let sensor = self.sensor?;
        let metrics = sensor.read(&mut rand::thread_rng());
        Some(MetricPayload {
            agent_id: self.config.agent_id.clone(),
            location: self.config.location.clone(),
            agent_type: self.config.agent_type.clone(),
            timestamp: continuum_core::now_iso(),
            metrics,
        })
    }

    async fn push(&self, payload: &MetricPayload) -> Result<(), PushError> {
        let response = self.client.post(self.config.ingest_url()).json(payload).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(PushError::Status(response.status().as_u16()))
        }
    }

    async fn run(&self) {
        info!(
            "Starting Edge Agent: {} ({}) at {}",
            self.config.agent_id, self.config.agent_type, self.config.location
        );

        // Laisse le temps à la passerelle de démarrer
        tokio::time::sleep(self.config.startup_delay()).await;

        let mut ticker = interval(self.config.push_interval());
        loop {
            ticker.tick().await;
            let Some(payload) = self.next_payload() else {
                continue;
            };
            match self.push(&payload).await {
                Ok(()) => info!("[{}] Metrics sent successfully: {:?}", self.config.agent_id, payload.metrics),
                Err(e) => error!("[{}] {e}", self.config.agent_id),
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("continuum_edge_agent=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let agent = Agent::new(AgentConfig::from_env()).context("Failed to create agent")?;

    tokio::select! {
        _ = agent.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("[{}] Shutting down...", agent.config.agent_id);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(agent_type: &str) -> Agent {
        let config = AgentConfig {
            agent_id: "temp-01".into(),
            location: "lab".into(),
            agent_type: agent_type.into(),
            ..AgentConfig::default()
        };
        Agent::new(config).unwrap()
    }

    #[test]
    fn test_payload_is_valid_for_known_types() {
        for agent_type in ["temperature-sensor", "humidity-sensor", "gateway"] {
            let payload = agent(agent_type).next_payload().unwrap();
            assert_eq!(payload.agent_id, "temp-01");
            assert_eq!(payload.agent_type, agent_type);
            assert!(continuum_core::validate(&payload), "invalid payload for {agent_type}");
        }
    }

    #[test]
    fn test_generic_agent_produces_nothing() {
        assert!(agent("generic").next_payload().is_none());
    }

    #[tokio::test]
    async fn test_push_to_unreachable_gateway_is_transport_error() {
        let config = AgentConfig {
            agent_type: "temperature-sensor".into(),
            middleware_url: "http://127.0.0.1:1".into(),
            ..AgentConfig::default()
        };
        let agent = Agent::new(config).unwrap();
        let payload = agent.next_payload().unwrap();
        assert!(matches!(agent.push(&payload).await, Err(PushError::Transport(_))));
    }
}
