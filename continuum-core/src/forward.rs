/**
 * FORWARD - Remise fire-and-forget des payloads de la passerelle vers le processor
 *
 * La passerelle dépose le payload dans une file bornée et répond tout de suite au
 * producteur ; un worker indépendant consomme la file et appelle le processor.
 * File pleine : le payload le plus récent est abandonné (compté et loggé), il reste
 * bufferisé dans l'historique.
 */

use crate::payload::MetricPayload;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("processor unreachable: {0}")]
    Unreachable(String),
    #[error("processor call timed out after {0:?}")]
    Timeout(Duration),
    #[error("processor returned {0}")]
    Status(u16),
}

/// Côté processor vu depuis la passerelle.
#[async_trait]
pub trait ProcessorClient: Send + Sync {
    async fn forward(&self, payload: &MetricPayload) -> Result<(), ForwardError>;

    async fn health(&self) -> Result<(), ForwardError>;
}

/// Client HTTP vers `POST {base_url}/api/v1/process` et `GET {base_url}/health`.
#[derive(Clone)]
pub struct HttpProcessorClient {
    client: reqwest::Client,
    base_url: String,
    forward_timeout: Duration,
    health_timeout: Duration,
}

impl HttpProcessorClient {
    pub fn new(base_url: impl Into<String>, forward_timeout: Duration, health_timeout: Duration) -> Result<Self, ForwardError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ForwardError::Unreachable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            forward_timeout,
            health_timeout,
        })
    }

    fn map_err(err: reqwest::Error, timeout: Duration) -> ForwardError {
        if err.is_timeout() {
            ForwardError::Timeout(timeout)
        } else {
            ForwardError::Unreachable(err.to_string())
        }
    }
}

#[async_trait]
impl ProcessorClient for HttpProcessorClient {
    async fn forward(&self, payload: &MetricPayload) -> Result<(), ForwardError> {
        let resp = self
            .client
            .post(format!("{}/api/v1/process", self.base_url))
            .timeout(self.forward_timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| Self::map_err(e, self.forward_timeout))?;
        if resp.status() != reqwest::StatusCode::OK {
            return Err(ForwardError::Status(resp.status().as_u16()));
        }
        Ok(())
    }

    async fn health(&self) -> Result<(), ForwardError> {
        let resp = self
            .client
            .get(format!("{}/health", self.base_url))
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(|e| Self::map_err(e, self.health_timeout))?;
        if resp.status() != reqwest::StatusCode::OK {
            return Err(ForwardError::Status(resp.status().as_u16()));
        }
        Ok(())
    }
}

/// Extrémité émettrice de la file de remise.
#[derive(Clone)]
pub struct ForwardQueue {
    tx: mpsc::Sender<MetricPayload>,
}

impl ForwardQueue {
    /// File + receveur brut (tests, ou worker personnalisé).
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<MetricPayload>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// File + worker qui remet chaque payload au processor.
    pub fn spawn(client: Arc<dyn ProcessorClient>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (queue, rx) = Self::channel(capacity);
        let worker = tokio::spawn(run_forwarder(rx, client));
        (queue, worker)
    }

    /// Dépose sans jamais bloquer. `false` si le payload a été abandonné.
    pub fn enqueue(&self, payload: MetricPayload) -> bool {
        match self.tx.try_send(payload) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!("forward queue full, dropping payload from {}", dropped.agent_id);
                false
            }
            Err(mpsc::error::TrySendError::Closed(dropped)) => {
                error!("forward worker stopped, dropping payload from {}", dropped.agent_id);
                false
            }
        }
    }
}

/// Boucle du worker : s'arrête quand toutes les files émettrices sont fermées.
pub async fn run_forwarder(mut rx: mpsc::Receiver<MetricPayload>, client: Arc<dyn ProcessorClient>) {
    while let Some(payload) = rx.recv().await {
        match client.forward(&payload).await {
            Ok(()) => debug!("forwarded metrics from {} to processor", payload.agent_id),
            Err(ForwardError::Status(code)) => warn!("Processor returned {code}"),
            Err(e) => error!("Failed to forward to processor: {e}"),
        }
    }
    debug!("forward worker stopped");
}
