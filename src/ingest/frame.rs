use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::kernel::telemetry::RejectReason;

/// One decoded-enough event from the bus collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusFrame {
    pub signal_id: String,
    #[serde(flatten)]
    pub payload: FramePayload,
    /// Only consulted for signals missing from the catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FramePayload {
    /// Already in engineering units.
    Value(f64),
    /// Little-endian packed raw bits, scaled through the catalog.
    Raw(Vec<u8>),
}

impl BusFrame {
    pub fn value(signal_id: &str, value: f64) -> Self {
        Self {
            signal_id: signal_id.to_string(),
            payload: FramePayload::Value(value),
            unit: None,
        }
    }

    pub fn raw(signal_id: &str, bytes: Vec<u8>) -> Self {
        Self {
            signal_id: signal_id.to_string(),
            payload: FramePayload::Raw(bytes),
            unit: None,
        }
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }
}

/// A frame that must be dropped. Never stops ingestion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    #[error("unknown signal '{0}'")]
    UnknownSignal(String),

    #[error("signal '{signal_id}' decoded to a non-finite value")]
    NonFinite { signal_id: String },

    #[error("signal '{signal_id}' value {value} outside [{min}, {max}]")]
    OutOfRange {
        signal_id: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("signal '{signal_id}' could not be decoded: {reason}")]
    Undecodable { signal_id: String, reason: String },
}

impl FrameError {
    pub fn reason(&self) -> RejectReason {
        match self {
            FrameError::UnknownSignal(_) => RejectReason::UnknownSignal,
            FrameError::NonFinite { .. } => RejectReason::NonFinite,
            FrameError::OutOfRange { .. } => RejectReason::OutOfRange,
            FrameError::Undecodable { .. } => RejectReason::Undecodable,
        }
    }
}

/// Failure reported by a bus source.
#[derive(Debug, Error)]
pub enum BusError {
    /// One bad record on an otherwise healthy link.
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("bus i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("bus disconnected: {0}")]
    Disconnected(String),
}

impl BusError {
    /// Fatal errors stop the ingest loop; the supervisor decides what happens next.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, BusError::Malformed(_))
    }
}
