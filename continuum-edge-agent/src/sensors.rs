//! Lectures simulées par type de capteur
//!
//! - temperature-sensor : 23 °C ± 5 (uniforme) + bruit gaussien σ=1
//! - humidity-sensor    : 55 % ± 15 (uniforme) + bruit gaussien σ=3, borné à [0, 100]
//! - gateway            : CPU %, mémoire MB, connexions actives

use continuum_core::enrich::round_2dp as round2;
use continuum_core::{MetricValue, Metrics};
use rand::Rng;
use rand_distr::StandardNormal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Temperature,
    Humidity,
    Gateway,
}

impl SensorKind {
    /// `None` pour les types sans générateur de données.
    pub fn from_agent_type(agent_type: &str) -> Option<Self> {
        match agent_type {
            "temperature-sensor" => Some(SensorKind::Temperature),
            "humidity-sensor" => Some(SensorKind::Humidity),
            "gateway" => Some(SensorKind::Gateway),
            _ => None,
        }
    }

    pub fn read<R: Rng>(&self, rng: &mut R) -> Metrics {
        let mut metrics = Metrics::new();
        match self {
            SensorKind::Temperature => {
                let temp = 23.0 + rng.gen_range(-5.0..=5.0) + gauss(rng, 1.0);
                metrics.insert("temperature".into(), round2(temp).into());
            }
            SensorKind::Humidity => {
                let humidity = (55.0 + rng.gen_range(-15.0..=15.0) + gauss(rng, 3.0)).clamp(0.0, 100.0);
                metrics.insert("humidity".into(), round2(humidity).into());
            }
            SensorKind::Gateway => {
                metrics.insert("cpu_usage".into(), round2(rng.gen_range(10.0..=80.0)).into());
                metrics.insert("memory_mb".into(), round2(rng.gen_range(100.0..=800.0)).into());
                metrics.insert("connections".into(), MetricValue::Integer(rng.gen_range(5..=50)));
            }
        }
        metrics
    }
}

fn gauss<R: Rng>(rng: &mut R, sigma: f64) -> f64 {
    let z: f64 = rng.sample(StandardNormal);
    z * sigma
}
