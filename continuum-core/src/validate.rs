//! Garde-fou du processor : rejette les payloads structurellement ou sémantiquement invalides.
//!
//! La passerelle ne valide rien elle-même : elle bufferise d'abord, le processor filtre.

use crate::payload::MetricPayload;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

/// Raison du rejet d'un payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("agent_id is empty")]
    EmptyAgentId,
    #[error("agent_type is empty")]
    EmptyAgentType,
    #[error("timestamp is not ISO-8601: {0}")]
    BadTimestamp(String),
    #[error("metrics are empty")]
    EmptyMetrics,
}

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Valide un payload : `true` si et seulement si `check` ne trouve rien à redire.
pub fn validate(payload: &MetricPayload) -> bool {
    check(payload).is_ok()
}

/// Comme `validate`, mais renvoie la première raison de rejet.
pub fn check(payload: &MetricPayload) -> Result<(), ValidationError> {
    if payload.agent_id.is_empty() {
        return Err(ValidationError::EmptyAgentId);
    }
    if payload.agent_type.is_empty() {
        return Err(ValidationError::EmptyAgentType);
    }
    if !timestamp_parses(&payload.timestamp) {
        return Err(ValidationError::BadTimestamp(payload.timestamp.clone()));
    }
    if payload.metrics.is_empty() {
        return Err(ValidationError::EmptyMetrics);
    }
    Ok(())
}

/// Parse un horodatage ISO-8601, avec ou sans offset. Un "Z" est d'abord réécrit en "+00:00".
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let text = raw.replace('Z', "+00:00");

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&text, fmt) {
            return Some(dt);
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&text, fmt) {
            return Some(naive.and_utc().fixed_offset());
        }
    }
    NaiveDate::parse_from_str(&text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}

fn timestamp_parses(raw: &str) -> bool {
    parse_timestamp(raw).is_some()
}
