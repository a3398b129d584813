use serde::{Deserialize, Serialize};

use crate::kernel::time::Millis;

// Allowed: timestamps, counts, reasons
// Forbidden: signal values (those live in the TelemetryBuffer only)

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IngestEvent {
    /// A frame was decoded, validated and written to the buffer.
    Forwarded { at: Millis },

    /// A frame was dropped before reaching the buffer.
    Rejected { at: Millis, reason: RejectReason },

    /// The bus source failed hard or ended. Ingestion has stopped.
    LinkDown { at: Millis, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    UnknownSignal,
    NonFinite,
    OutOfRange,
    Undecodable,
}
