use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use tokio::time::Duration;
use tracing::{info, warn};

// ===== Configuration =====
const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:8000";
const SMOKE_AGENT_ID: &str = "smoke-test-agent";
const SMOKE_AGENT_TYPE: &str = "temperature-sensor";

#[derive(Debug, Deserialize)]
struct AcceptAck {
    status: String,
    agent_id: String,
}

#[derive(Debug, Deserialize)]
struct AgentsView {
    active_agents: BTreeMap<String, Vec<String>>,
    total_count: usize,
}

#[derive(Debug, Deserialize)]
struct HistoryView {
    count: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    let gateway = std::env::var("MIDDLEWARE_URL").unwrap_or_else(|_| DEFAULT_GATEWAY_URL.to_string());
    let gateway = gateway.trim_end_matches('/');
    info!("Starting smoke test against {gateway}");

    let client = reqwest::Client::builder().timeout(Duration::from_secs(5)).build()?;

    let health: serde_json::Value = client
        .get(format!("{gateway}/health"))
        .send()
        .await
        .context("gateway unreachable")?
        .json()
        .await?;
    if health["status"] != "healthy" {
        warn!("gateway reports {}: {}", health["status"], health["components"]);
    }

    let payload = json!({
        "agent_id": SMOKE_AGENT_ID,
        "location": "smoke-lab",
        "agent_type": SMOKE_AGENT_TYPE,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "metrics": { "temperature": 21.5 }
    });
    let ack: AcceptAck = client
        .post(format!("{gateway}/api/v1/metrics"))
        .json(&payload)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    if ack.status != "accepted" || ack.agent_id != SMOKE_AGENT_ID {
        bail!("unexpected acknowledgment: {ack:?}");
    }
    info!("payload accepted");

    let agents: AgentsView = client.get(format!("{gateway}/api/v1/agents")).send().await?.json().await?;
    let active = agents.active_agents.get(SMOKE_AGENT_TYPE).cloned().unwrap_or_default();
    if !active.iter().any(|id| id == SMOKE_AGENT_ID) {
        bail!("{SMOKE_AGENT_ID} missing from active {SMOKE_AGENT_TYPE} agents: {active:?}");
    }
    info!("{} active agents, {SMOKE_AGENT_ID} among them", agents.total_count);

    let history: HistoryView = client
        .get(format!("{gateway}/api/v1/agent/{SMOKE_AGENT_ID}/history?limit=5"))
        .send()
        .await?
        .json()
        .await?;
    if history.count == 0 {
        bail!("history for {SMOKE_AGENT_ID} is empty");
    }

    info!("Smoke test passed");
    Ok(())
}
