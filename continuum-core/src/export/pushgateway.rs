//! Sink Prometheus Pushgateway : un registre jetable par push, encodé au format texte
//! et envoyé en PUT sur `/metrics/job/{job}` (remplace tout le groupe du job).

use super::{ExportError, MetricsSink, SampleBatch};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use std::collections::HashMap;
use std::time::Duration;

const LABEL_NAMES: &[&str] = &["agent_id", "location", "layer"];

#[derive(Clone)]
pub struct PushgatewaySink {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl PushgatewaySink {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ExportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExportError::Unreachable(e.to_string()))?;
        let mut base_url = base_url.into();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            base_url = format!("http://{base_url}");
        }
        let base_url = Url::parse(&base_url).map_err(|e| ExportError::Unreachable(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ExportError::Unreachable(format!("{base_url}: not a base url")));
        }
        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    fn url_with(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// `/metrics/job/{job}`, ou `/metrics/job@base64/{job}` quand le nom contient un `/`
    /// (un `/` brut serait lu comme une paire label/valeur du grouping key).
    pub fn job_url(&self, job: &str) -> Url {
        if job.contains('/') {
            self.url_with(&["metrics", "job@base64", &URL_SAFE.encode(job)])
        } else if job.is_empty() {
            self.url_with(&["metrics", "job@base64", "="])
        } else {
            self.url_with(&["metrics", "job", job])
        }
    }

    fn map_err(&self, err: reqwest::Error) -> ExportError {
        if err.is_timeout() {
            ExportError::Timeout(self.timeout)
        } else if let Some(status) = err.status() {
            ExportError::Rejected(status.as_u16())
        } else {
            ExportError::Unreachable(err.to_string())
        }
    }
}

/// Encode le lot dans un registre créé pour l'occasion.
pub fn encode_batch(batch: &SampleBatch) -> Result<(Vec<u8>, String), ExportError> {
    let registry = Registry::new();
    let mut gauges: HashMap<&str, GaugeVec> = HashMap::new();

    for sample in &batch.samples {
        let gauge = match gauges.get(sample.name.as_str()) {
            Some(gauge) => gauge.clone(),
            None => {
                let gauge = GaugeVec::new(Opts::new(sample.name.clone(), sample.help.clone()), LABEL_NAMES)
                    .map_err(|e| ExportError::Encode(e.to_string()))?;
                registry
                    .register(Box::new(gauge.clone()))
                    .map_err(|e| ExportError::Encode(e.to_string()))?;
                gauges.insert(sample.name.as_str(), gauge.clone());
                gauge
            }
        };
        gauge
            .with_label_values(&[
                sample.labels.agent_id.as_str(),
                sample.labels.location.as_str(),
                sample.labels.layer.as_str(),
            ])
            .set(sample.value);
    }

    let encoder = TextEncoder::new();
    let mut body = Vec::new();
    encoder
        .encode(&registry.gather(), &mut body)
        .map_err(|e| ExportError::Encode(e.to_string()))?;
    Ok((body, encoder.format_type().to_string()))
}

#[async_trait]
impl MetricsSink for PushgatewaySink {
    async fn push(&self, batch: SampleBatch) -> Result<(), ExportError> {
        let (body, content_type) = encode_batch(&batch)?;
        self.client
            .put(self.job_url(&batch.job))
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| self.map_err(e))?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), ExportError> {
        self.client
            .get(self.url_with(&["-", "healthy"]))
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| self.map_err(e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{Sample, SampleLabels};

    fn sample(name: &str, value: f64) -> Sample {
        Sample {
            name: name.into(),
            help: "Metric from temperature-sensor".into(),
            value,
            labels: SampleLabels {
                agent_id: "a1".into(),
                location: "room1".into(),
                layer: "edge".into(),
            },
        }
    }

    #[test]
    fn test_encode_batch_text_format() {
        let batch = SampleBatch {
            job: "edge_agent_temperature-sensor".into(),
            samples: vec![
                sample("temperature_sensor_temperature", 23.0),
                sample("temperature_sensor_temperature_fahrenheit", 73.4),
            ],
        };
        let (body, content_type) = encode_batch(&batch).unwrap();
        let text = String::from_utf8(body).unwrap();
        assert!(content_type.starts_with("text/plain"));
        assert!(text.contains("# TYPE temperature_sensor_temperature gauge"));
        assert!(text.contains(
            r#"temperature_sensor_temperature_fahrenheit{agent_id="a1",layer="edge",location="room1"} 73.4"#
        ));
    }

    #[test]
    fn test_invalid_metric_name_is_encode_error() {
        let batch = SampleBatch {
            job: "edge_agent_x".into(),
            samples: vec![sample("x_bad name", 1.0)],
        };
        assert!(matches!(encode_batch(&batch), Err(ExportError::Encode(_))));
    }

    #[test]
    fn test_job_url() {
        let sink = PushgatewaySink::new("pushgateway:9091/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            sink.job_url("edge_agent_gateway").as_str(),
            "http://pushgateway:9091/metrics/job/edge_agent_gateway"
        );
    }

    #[test]
    fn test_job_with_slash_is_base64_encoded() {
        let sink = PushgatewaySink::new("http://pg:9091", Duration::from_secs(5)).unwrap();
        let url = sink.job_url("edge_agent_sensor/v2");
        assert_eq!(url.path(), "/metrics/job@base64/ZWRnZV9hZ2VudF9zZW5zb3IvdjI=");
        assert_eq!(url.path_segments().unwrap().count(), 3);

        assert_eq!(sink.job_url("").path(), "/metrics/job@base64/=");
        assert_eq!(sink.job_url("edge_agent_cold room").path(), "/metrics/job/edge_agent_cold%20room");
    }

    mod http {
        use super::*;
        use axum::body::Bytes;
        use axum::http::{Method, StatusCode, Uri};
        use axum::Router;
        use parking_lot::Mutex;
        use std::sync::Arc;

        type Seen = Arc<Mutex<Vec<(Method, String, String)>>>;

        /// Pushgateway locale : enregistre chaque requête et répond `status` après `delay`.
        async fn fake_pushgateway(status: StatusCode, delay: Duration) -> (String, Seen) {
            let seen: Seen = Arc::default();
            let recorder = seen.clone();
            let app = Router::new().fallback(move |method: Method, uri: Uri, body: Bytes| {
                let recorder = recorder.clone();
                async move {
                    recorder
                        .lock()
                        .push((method, uri.path().to_string(), String::from_utf8_lossy(&body).into_owned()));
                    tokio::time::sleep(delay).await;
                    status
                }
            });
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            (format!("http://{addr}"), seen)
        }

        fn batch(job: &str) -> SampleBatch {
            SampleBatch {
                job: job.into(),
                samples: vec![sample("temperature_sensor_temperature", 23.0)],
            }
        }

        #[tokio::test]
        async fn test_push_is_put_on_job_path() {
            let (url, seen) = fake_pushgateway(StatusCode::OK, Duration::ZERO).await;
            let sink = PushgatewaySink::new(url, Duration::from_secs(2)).unwrap();

            sink.push(batch("edge_agent_temperature-sensor")).await.unwrap();

            let seen = seen.lock();
            assert_eq!(seen.len(), 1);
            let (method, path, body) = &seen[0];
            assert_eq!(*method, Method::PUT);
            assert_eq!(path, "/metrics/job/edge_agent_temperature-sensor");
            assert!(body.contains(r#"temperature_sensor_temperature{agent_id="a1",layer="edge",location="room1"} 23"#));
        }

        #[tokio::test]
        async fn test_push_rejected_status() {
            let (url, _) = fake_pushgateway(StatusCode::INTERNAL_SERVER_ERROR, Duration::ZERO).await;
            let sink = PushgatewaySink::new(url, Duration::from_secs(2)).unwrap();
            assert!(matches!(sink.push(batch("edge_agent_x")).await, Err(ExportError::Rejected(500))));
            assert!(matches!(sink.ping().await, Err(ExportError::Rejected(500))));
        }

        #[tokio::test]
        async fn test_push_times_out_without_retry() {
            let (url, seen) = fake_pushgateway(StatusCode::OK, Duration::from_secs(2)).await;
            let timeout = Duration::from_millis(100);
            let sink = PushgatewaySink::new(url, timeout).unwrap();

            match sink.push(batch("edge_agent_x")).await {
                Err(ExportError::Timeout(t)) => assert_eq!(t, timeout),
                other => panic!("expected timeout, got {other:?}"),
            }
            assert_eq!(seen.lock().len(), 1);
        }

        #[tokio::test]
        async fn test_ping_healthy_endpoint() {
            let (url, seen) = fake_pushgateway(StatusCode::OK, Duration::ZERO).await;
            let sink = PushgatewaySink::new(url, Duration::from_secs(2)).unwrap();
            sink.ping().await.unwrap();
            assert_eq!(seen.lock()[0].1, "/-/healthy");
        }

        #[tokio::test]
        async fn test_unreachable_pushgateway() {
            let sink = PushgatewaySink::new("http://127.0.0.1:1", Duration::from_secs(2)).unwrap();
            assert!(matches!(sink.push(batch("edge_agent_x")).await, Err(ExportError::Unreachable(_))));
        }
    }
}
