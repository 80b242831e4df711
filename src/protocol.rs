//! Records exchanged over the synchronization channel and their wire framing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::ShotResult;
use crate::rules::FiringRule;
use crate::ship::ShipPlacement;

/// Protocol version carried in every frame.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest frame a subscriber will try to decode.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Sub-path under a match key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SyncPath {
    /// Append-only move log.
    Moves,
    /// Presence slot written by the named participant.
    Presence(String),
    /// Surrender / timeout announcements.
    Status,
    /// Agreed firing rule.
    Rule,
    /// Fleet published by the named participant.
    Fleet(String),
}

impl fmt::Display for SyncPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncPath::Moves => f.write_str("moves"),
            SyncPath::Presence(id) => write!(f, "presence/{}", id),
            SyncPath::Status => f.write_str("status"),
            SyncPath::Rule => f.write_str("rule"),
            SyncPath::Fleet(id) => write!(f, "fleet/{}", id),
        }
    }
}

/// A shot broadcast by the client that resolved it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveEvent {
    pub actor: String,
    pub row: u8,
    pub col: u8,
    /// Result as judged by the shooter. Receivers judge their own board and
    /// only compare against this value.
    pub result: ShotResult,
    pub turn_number: u32,
}

/// Parsed form of the status slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// The named participant gave up.
    Surrender(String),
    /// The named participant is presumed disconnected.
    Timeout(String),
}

impl StatusEvent {
    /// Participant the announcement is about.
    pub fn subject(&self) -> &str {
        match self {
            StatusEvent::Surrender(id) | StatusEvent::Timeout(id) => id,
        }
    }

    /// Parse `surrender_<id>` / `timeout_<id>`.
    pub fn parse(raw: &str) -> Option<Self> {
        if let Some(id) = raw.strip_prefix("surrender_") {
            (!id.is_empty()).then(|| StatusEvent::Surrender(id.to_string()))
        } else if let Some(id) = raw.strip_prefix("timeout_") {
            (!id.is_empty()).then(|| StatusEvent::Timeout(id.to_string()))
        } else {
            None
        }
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusEvent::Surrender(id) => write!(f, "surrender_{}", id),
            StatusEvent::Timeout(id) => write!(f, "timeout_{}", id),
        }
    }
}

/// Payload stored under a [`SyncPath`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncRecord {
    Move(MoveEvent),
    /// Writer's wall clock in milliseconds since the Unix epoch.
    Presence { timestamp_ms: u64 },
    /// Raw status string, see [`StatusEvent`].
    Status(String),
    Rule(FiringRule),
    Fleet(Vec<ShipPlacement>),
}

#[derive(Serialize, Deserialize)]
struct Frame {
    version: u32,
    record: SyncRecord,
}

/// Encode a record into a versioned frame.
pub fn encode_record(record: &SyncRecord) -> anyhow::Result<Vec<u8>> {
    let frame = Frame {
        version: PROTOCOL_VERSION,
        record: record.clone(),
    };
    let data = bincode::serialize(&frame)
        .map_err(|e| anyhow::anyhow!("Serialization error: {}", e))?;
    if data.len() > MAX_FRAME_SIZE {
        return Err(anyhow::anyhow!(
            "Frame too large: {} bytes (max: {})",
            data.len(),
            MAX_FRAME_SIZE
        ));
    }
    Ok(data)
}

/// Decode a frame, rejecting oversized input and foreign protocol versions.
pub fn decode_record(data: &[u8]) -> anyhow::Result<SyncRecord> {
    if data.is_empty() {
        return Err(anyhow::anyhow!("Invalid frame length: 0"));
    }
    if data.len() > MAX_FRAME_SIZE {
        return Err(anyhow::anyhow!(
            "Frame too large: {} bytes (max: {})",
            data.len(),
            MAX_FRAME_SIZE
        ));
    }
    let frame: Frame = bincode::deserialize(data)
        .map_err(|e| anyhow::anyhow!("Deserialization error: {}", e))?;
    if frame.version != PROTOCOL_VERSION {
        return Err(anyhow::anyhow!(
            "Protocol version mismatch: expected {}, got {}",
            PROTOCOL_VERSION,
            frame.version
        ));
    }
    Ok(frame.record)
}

/// Current wall clock in milliseconds, for presence records.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_parse_both_kinds() {
        assert_eq!(
            StatusEvent::parse("surrender_alice"),
            Some(StatusEvent::Surrender("alice".into()))
        );
        assert_eq!(
            StatusEvent::parse("timeout_bob_2"),
            Some(StatusEvent::Timeout("bob_2".into()))
        );
        assert_eq!(StatusEvent::parse("timeout_"), None);
        assert_eq!(StatusEvent::parse("draw_alice"), None);
        assert_eq!(StatusEvent::Timeout("bob".into()).to_string(), "timeout_bob");
    }

    #[test]
    fn foreign_version_is_rejected() {
        let frame = Frame {
            version: PROTOCOL_VERSION + 1,
            record: SyncRecord::Status("surrender_x".into()),
        };
        let data = bincode::serialize(&frame).unwrap();
        let err = decode_record(&data).unwrap_err();
        assert!(err.to_string().contains("version mismatch"));
    }

    #[test]
    fn garbage_and_empty_frames_are_rejected() {
        assert!(decode_record(&[]).is_err());
        assert!(decode_record(&[0xff; 3]).is_err());
    }

    #[test]
    fn paths_render_as_sub_keys() {
        assert_eq!(SyncPath::Presence("a".into()).to_string(), "presence/a");
        assert_eq!(SyncPath::Fleet("b".into()).to_string(), "fleet/b");
        assert_eq!(SyncPath::Moves.to_string(), "moves");
    }
}
