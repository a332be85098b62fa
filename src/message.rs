//! Synthetic message generation.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::report::RunId;

/// Bytes reserved for the non-payload fields of a message.
pub const METADATA_OVERHEAD: usize = 200;

/// Run name recorded when a run has none.
pub const UNNAMED_RUN: &str = "unnamed";

/// Producer tag written into every message.
pub const PRODUCER_TAG: &str = "kload";

const FILLER: char = 'x';

/// A synthetic load-test message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message id.
    pub id: String,
    /// Creation time (serialized as ISO-8601 UTC).
    pub timestamp: DateTime<Utc>,
    /// One-based sequence number within the run.
    pub sequence: u64,
    /// Filler bringing the message close to the requested size.
    pub payload: String,
    /// Identifies the run that produced the message.
    pub metadata: Metadata,
}

/// Run identification carried by each message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Id of the producing run.
    pub run_id: RunId,
    /// Name of the run, or `unnamed`.
    pub run_name: String,
    /// Tag of the producing tool.
    pub producer: String,
}

/// Length of the filler for a requested message size.
pub fn filler_len(payload_size: usize) -> usize {
    payload_size.saturating_sub(METADATA_OVERHEAD).max(1)
}

/// Builds the message for `sequence` of the given run.
pub fn generate(sequence: u64, payload_size: usize, run_id: &RunId, run_name: Option<&str>) -> Message {
    let id = uuid::Uuid::new_v4().simple().to_string();
    Message {
        id: format!("msg-{}", &id[..8]),
        timestamp: Utc::now(),
        sequence,
        payload: FILLER.to_string().repeat(filler_len(payload_size)),
        metadata: Metadata {
            run_id: run_id.clone(),
            run_name: run_name.unwrap_or(UNNAMED_RUN).to_string(),
            producer: PRODUCER_TAG.to_string(),
        },
    }
}

impl Message {
    /// Encodes the message as JSON bytes.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filler_reserves_overhead() {
        assert_eq!(filler_len(100), 1);
        assert_eq!(filler_len(1), 1);
        assert_eq!(filler_len(200), 1);
        assert_eq!(filler_len(201), 1);
        assert_eq!(filler_len(1024), 1024 - METADATA_OVERHEAD);
    }

    #[test]
    fn tiny_payload_keeps_every_field() {
        let run_id = RunId::generate();
        let msg = generate(1, 1, &run_id, None);

        assert_eq!(msg.payload, "x");
        assert_eq!(msg.sequence, 1);
        assert!(msg.id.starts_with("msg-"));
        assert_eq!(msg.id.len(), "msg-".len() + 8);
        assert_eq!(msg.metadata.run_id, run_id);
        assert_eq!(msg.metadata.run_name, UNNAMED_RUN);
        assert_eq!(msg.metadata.producer, PRODUCER_TAG);
    }

    #[test]
    fn large_payload_approximates_requested_size() {
        let run_id = RunId::generate();
        let msg = generate(42, 4096, &run_id, Some("soak"));

        assert_eq!(msg.payload.len(), 4096 - METADATA_OVERHEAD);
        assert_eq!(msg.metadata.run_name, "soak");

        let encoded = msg.to_json().unwrap();
        assert!(encoded.len() > 4096 - METADATA_OVERHEAD);
        assert!(encoded.len() < 4096 + METADATA_OVERHEAD);
    }

    #[test]
    fn ids_are_unique() {
        let run_id = RunId::generate();
        let a = generate(1, 10, &run_id, None);
        let b = generate(2, 10, &run_id, None);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn timestamp_serializes_as_utc() {
        let msg = generate(1, 10, &RunId::generate(), None);
        let json: serde_json::Value = serde_json::from_slice(&msg.to_json().unwrap()).unwrap();
        let ts = json["timestamp"].as_str().unwrap();
        assert!(ts.ends_with('Z'));
        assert!(DateTime::parse_from_rfc3339(ts).is_ok());
    }
}
