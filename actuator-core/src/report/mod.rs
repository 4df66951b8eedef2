//! Status frame encoding.
//!
//! Each report is a JSON document listing relay channels, prefixed with an
//! eight-character uppercase-hex payload length so a receiver can frame the
//! stream. Reports are emitted either for every channel (a full snapshot) or
//! only for channels whose state changed since the last report.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::fmt::Write as _;

use serde::Serialize;

use crate::mapping::{INPUT_MAPPINGS, Mode, RELAY_ROW_COUNT};
use crate::relay::{RelayBank, RelayDriver, TickInstant};

/// Width of the hex length prefix on every frame.
pub const HEADER_SIZE: usize = 8;

/// One relay channel as it appears on the wire. Names come from the const
/// wiring table, so records do not borrow the bank they describe.
#[derive(Debug, Serialize)]
struct ActuatorRecord {
    index: usize,
    active: bool,
    #[serde(rename = "actuatorName")]
    actuator_name: &'static str,
    mode: &'static str,
    position: u64,
    #[serde(rename = "maxDuration")]
    max_duration: u64,
    timestamp: u64,
    #[serde(rename = "forceMode")]
    force_mode: bool,
}

#[derive(Debug, Serialize)]
struct StatusFrame {
    actuators: Vec<ActuatorRecord>,
}

/// Failure to serialize a status frame.
#[derive(Debug)]
pub enum ReportError {
    Serialize(serde_json::Error),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::Serialize(err) => write!(f, "status frame serialization failed: {err}"),
        }
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(err: serde_json::Error) -> Self {
        ReportError::Serialize(err)
    }
}

/// Wire label for a channel's state. An inactive channel always reads
/// `IDLE` regardless of its last direction.
fn mode_label(is_active: bool, mode: Mode) -> &'static str {
    if !is_active {
        return "IDLE";
    }
    match mode {
        Mode::Extending => "EXTENDING",
        Mode::Retracting => "RETRACTING",
        Mode::Paused => "PAUSED",
        Mode::None => "NONE",
    }
}

fn millis(duration: core::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Wraps a serialized payload with the hex length header.
#[must_use]
pub fn frame(payload: &str) -> String {
    let mut framed = String::with_capacity(HEADER_SIZE + payload.len());
    // The write cannot fail on a String.
    let _ = write!(framed, "{:08X}", payload.len());
    framed.push_str(payload);
    framed
}

fn record<D, TInstant>(
    bank: &RelayBank<D, TInstant>,
    row: usize,
    timestamp_ms: u64,
) -> ActuatorRecord
where
    D: RelayDriver,
    TInstant: TickInstant,
{
    let state = bank.state(row);
    ActuatorRecord {
        index: row,
        active: state.is_active,
        actuator_name: INPUT_MAPPINGS[row].name,
        mode: mode_label(state.is_active, state.mode),
        position: millis(state.position),
        max_duration: millis(state.max_duration),
        timestamp: timestamp_ms,
        force_mode: bank.is_forced(),
    }
}

fn encode<D, TInstant>(
    bank: &mut RelayBank<D, TInstant>,
    rows: impl Iterator<Item = usize>,
    timestamp_ms: u64,
) -> Result<String, ReportError>
where
    D: RelayDriver,
    TInstant: TickInstant,
{
    let mut actuators = Vec::new();
    for row in rows {
        actuators.push(record(bank, row, timestamp_ms));
        bank.clear_row_changed(row);
    }
    let payload = serde_json::to_string(&StatusFrame { actuators })?;
    Ok(frame(&payload))
}

/// Encodes a single-channel frame and clears that channel's dirty flag.
///
/// # Errors
///
/// Returns [`ReportError::Serialize`] when JSON encoding fails.
pub fn encode_row<D, TInstant>(
    bank: &mut RelayBank<D, TInstant>,
    row: usize,
    timestamp_ms: u64,
) -> Result<String, ReportError>
where
    D: RelayDriver,
    TInstant: TickInstant,
{
    encode(bank, core::iter::once(row), timestamp_ms)
}

/// Encodes a full snapshot of every channel.
///
/// # Errors
///
/// Returns [`ReportError::Serialize`] when JSON encoding fails.
pub fn encode_all<D, TInstant>(
    bank: &mut RelayBank<D, TInstant>,
    timestamp_ms: u64,
) -> Result<String, ReportError>
where
    D: RelayDriver,
    TInstant: TickInstant,
{
    encode(bank, 0..RELAY_ROW_COUNT, timestamp_ms)
}

/// Encodes a frame covering only the channels that changed since the last
/// report, or `None` when nothing changed.
///
/// # Errors
///
/// Returns [`ReportError::Serialize`] when JSON encoding fails.
pub fn encode_changed<D, TInstant>(
    bank: &mut RelayBank<D, TInstant>,
    timestamp_ms: u64,
) -> Result<Option<String>, ReportError>
where
    D: RelayDriver,
    TInstant: TickInstant,
{
    if !bank.take_changed() {
        return Ok(None);
    }
    let rows: Vec<usize> = (0..RELAY_ROW_COUNT)
        .filter(|&row| bank.row_changed(row))
        .collect();
    if rows.is_empty() {
        return Ok(None);
    }
    encode(bank, rows.into_iter(), timestamp_ms).map(Some)
}
