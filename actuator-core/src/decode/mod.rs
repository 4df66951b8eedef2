//! Receiving side of the status link: frame reassembly and a persistent
//! per-channel merge store.
//!
//! The byte stream arriving from the controller is noisy: frames may be
//! split across reads, interleaved with garbage, or truncated. The
//! reassembler scans for the document markers rather than trusting stream
//! position, so it resynchronizes after any amount of noise. Decoded frames
//! are merged field-by-field into [`ReportStore`], which keeps the last
//! known value of every field so sparse delta frames never erase state.

use alloc::string::String;
use core::fmt;

use serde_json::Value;

use crate::mapping::RELAY_ROW_COUNT;

/// Width of the hex length prefix on every frame.
pub const HEADER_SIZE: usize = crate::report::HEADER_SIZE;

/// Reassembly buffer capacity. Large enough for a full eight-channel
/// snapshot plus its header and some slack.
pub const MAX_PAYLOAD_SIZE: usize = 2_048;

/// Opening marker of a status document (compact JSON, first record).
pub const FRAME_START: &str = "{\"actuators\":[{\"";

/// Closing marker of a status document.
pub const FRAME_END: &str = "}]}";

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Accumulates raw link bytes and extracts complete JSON documents.
pub struct FrameReassembler {
    buffer: heapless::Vec<u8, MAX_PAYLOAD_SIZE>,
    expected_len: Option<u32>,
}

impl FrameReassembler {
    /// Creates an empty reassembler.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: heapless::Vec::new(),
            expected_len: None,
        }
    }

    /// Appends a chunk of link bytes. On overflow the buffer is discarded
    /// and refilled with the newest chunk, favoring fresh data over a stale
    /// partial frame.
    pub fn push(&mut self, chunk: &[u8]) {
        if self.buffer.extend_from_slice(chunk).is_err() {
            log::warn!(
                "reassembly buffer overflow ({} buffered, {} incoming); dropping buffered data",
                self.buffer.len(),
                chunk.len()
            );
            self.buffer.clear();
            self.expected_len = None;
            let tail = &chunk[chunk.len().saturating_sub(MAX_PAYLOAD_SIZE)..];
            // Cannot fail: tail fits by construction.
            let _ = self.buffer.extend_from_slice(tail);
        }
    }

    /// Extracts the next complete document, if the buffer holds one.
    /// Leading noise before the opening marker is discarded. When no marker
    /// is present the buffer is trimmed to the tail that could still hold a
    /// partially received header and marker, so garbage never accumulates.
    pub fn next_frame(&mut self) -> Option<String> {
        let Some(start) = find_subsequence(&self.buffer, FRAME_START.as_bytes()) else {
            let keep = HEADER_SIZE + FRAME_START.len() - 1;
            if self.buffer.len() > keep {
                self.drop_prefix(self.buffer.len() - keep);
            }
            return None;
        };
        if start > 0 {
            self.capture_length_header(start);
            self.drop_prefix(start);
        }

        // The end marker is only meaningful past the document opening.
        let end = FRAME_START.len()
            + find_subsequence(&self.buffer[FRAME_START.len()..], FRAME_END.as_bytes())?;
        let frame_len = end + FRAME_END.len();
        let frame = String::from_utf8_lossy(&self.buffer[..frame_len]).into_owned();
        self.drop_prefix(frame_len);
        self.expected_len = None;
        Some(frame)
    }

    /// Declared payload length from the most recent header, if one was seen.
    /// Informational only; framing relies on the document markers.
    #[must_use]
    pub const fn expected_len(&self) -> Option<u32> {
        self.expected_len
    }

    /// Bytes currently buffered.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Parses the hex length header immediately preceding the document
    /// start, when the discarded prefix ends with one.
    fn capture_length_header(&mut self, start: usize) {
        if start < HEADER_SIZE {
            return;
        }
        let header = &self.buffer[start - HEADER_SIZE..start];
        if let Ok(text) = core::str::from_utf8(header)
            && let Ok(len) = u32::from_str_radix(text, 16)
        {
            self.expected_len = Some(len);
        }
    }

    fn drop_prefix(&mut self, count: usize) {
        let len = self.buffer.len();
        self.buffer.copy_within(count..len, 0);
        self.buffer.truncate(len - count);
    }
}

impl Default for FrameReassembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Last known state of one relay channel, merged across reports.
#[derive(Clone, Debug, Default)]
pub struct StoredActuator {
    /// At least one report has mentioned this channel.
    pub seen: bool,
    pub name: String,
    pub active: bool,
    pub mode: String,
    pub position: u64,
    pub max_duration: u64,
    pub timestamp: u64,
    pub force_mode: bool,
}

/// Failure to decode a status document.
#[derive(Debug)]
pub enum DecodeError {
    /// The document was not valid JSON.
    Json(serde_json::Error),
    /// The document held no `actuators` array.
    MissingActuators,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Json(err) => write!(f, "status document is not valid JSON: {err}"),
            DecodeError::MissingActuators => f.write_str("status document has no actuators array"),
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Json(err)
    }
}

/// Persistent per-channel state built up from decoded reports.
#[derive(Clone, Debug, Default)]
pub struct ReportStore {
    actuators: [StoredActuator; RELAY_ROW_COUNT],
    force_mode: bool,
    last_timestamp: u64,
}

impl ReportStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one decoded document into the store and returns how many
    /// entries were applied. Each field updates only when present, so a
    /// delta report leaves the rest of a channel's state intact. Entries
    /// with a missing or out-of-range index are skipped individually; they
    /// never abort the rest of the document.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the document is not JSON or lacks an
    /// `actuators` array.
    pub fn apply(&mut self, document: &str) -> Result<usize, DecodeError> {
        let value: Value = serde_json::from_str(document)?;
        let Some(entries) = value.get("actuators").and_then(Value::as_array) else {
            return Err(DecodeError::MissingActuators);
        };

        let mut applied = 0;
        for entry in entries {
            let Some(index) = entry.get("index").and_then(Value::as_u64) else {
                log::warn!("skipping status entry without an index");
                continue;
            };
            let Ok(row) = usize::try_from(index) else {
                continue;
            };
            if row >= RELAY_ROW_COUNT {
                log::warn!("skipping status entry with out-of-range index {row}");
                continue;
            }

            let stored = &mut self.actuators[row];
            stored.seen = true;
            if let Some(name) = entry.get("actuatorName").and_then(Value::as_str) {
                stored.name = String::from(name);
            }
            if let Some(active) = entry.get("active").and_then(Value::as_bool) {
                stored.active = active;
            }
            if let Some(mode) = entry.get("mode").and_then(Value::as_str) {
                stored.mode = String::from(mode);
            }
            if let Some(position) = entry.get("position").and_then(Value::as_u64) {
                stored.position = position;
            }
            if let Some(max_duration) = entry.get("maxDuration").and_then(Value::as_u64) {
                stored.max_duration = max_duration;
            }
            if let Some(timestamp) = entry.get("timestamp").and_then(Value::as_u64) {
                stored.timestamp = timestamp;
                if timestamp > self.last_timestamp {
                    self.last_timestamp = timestamp;
                }
            }
            if let Some(force_mode) = entry.get("forceMode").and_then(Value::as_bool) {
                stored.force_mode = force_mode;
                self.force_mode = force_mode;
            }
            applied += 1;
        }
        Ok(applied)
    }

    /// Last known state of one channel.
    #[must_use]
    pub fn actuator(&self, row: usize) -> &StoredActuator {
        &self.actuators[row]
    }

    /// All channels in row order.
    #[must_use]
    pub fn actuators(&self) -> &[StoredActuator; RELAY_ROW_COUNT] {
        &self.actuators
    }

    /// Whether the most recent report had force mode engaged.
    #[must_use]
    pub const fn force_mode(&self) -> bool {
        self.force_mode
    }

    /// Highest timestamp seen across all reports.
    #[must_use]
    pub const fn last_timestamp(&self) -> u64 {
        self.last_timestamp
    }
}

/// Ties the reassembler and store together for a receiving endpoint.
#[derive(Default)]
pub struct StatusMonitor {
    reassembler: FrameReassembler,
    store: ReportStore,
}

impl StatusMonitor {
    /// Creates a monitor with empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw link bytes in, drains every complete document, and merges
    /// each into the store. Undecodable documents are logged and dropped.
    /// Returns the number of documents merged.
    pub fn ingest(&mut self, chunk: &[u8]) -> usize {
        self.reassembler.push(chunk);
        let mut merged = 0;
        while let Some(document) = self.reassembler.next_frame() {
            match self.store.apply(&document) {
                Ok(_) => merged += 1,
                Err(err) => log::warn!("dropping undecodable status document: {err}"),
            }
        }
        merged
    }

    /// Accumulated channel state.
    #[must_use]
    pub fn store(&self) -> &ReportStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;
    use alloc::vec::Vec;

    fn framed(payload: &str) -> String {
        format!("{:08X}{payload}", payload.len())
    }

    fn entry(row: usize, active: bool, position: u64) -> String {
        format!(
            "{{\"index\":{row},\"active\":{active},\"actuatorName\":\"Actuator {}\",\
             \"mode\":\"{}\",\"position\":{position},\"maxDuration\":8000,\
             \"timestamp\":100,\"forceMode\":false}}",
            row % 4 + 1,
            if active { "EXTENDING" } else { "IDLE" },
        )
    }

    fn document(rows: &[(usize, bool, u64)]) -> String {
        let entries: Vec<String> = rows
            .iter()
            .map(|&(row, active, position)| entry(row, active, position))
            .collect();
        format!("{{\"actuators\":[{}]}}", entries.join(","))
    }

    #[test]
    fn reassembles_one_frame_from_single_byte_chunks() {
        let mut monitor = StatusMonitor::new();
        let wire = framed(&document(&[(0, true, 1_500)]));
        let mut merged = 0;
        for byte in wire.as_bytes() {
            merged += monitor.ingest(core::slice::from_ref(byte));
        }
        assert_eq!(merged, 1);
        let stored = monitor.store().actuator(0);
        assert!(stored.seen);
        assert!(stored.active);
        assert_eq!(stored.position, 1_500);
        assert_eq!(stored.mode, "EXTENDING");
    }

    #[test]
    fn resynchronizes_across_noise_between_frames() {
        let mut wire = Vec::new();
        wire.extend_from_slice(b"\x00\xffgarbage!!");
        wire.extend_from_slice(framed(&document(&[(1, true, 300)])).as_bytes());
        wire.extend_from_slice(b"@@@noise@@@");
        wire.extend_from_slice(framed(&document(&[(5, true, 2_000)])).as_bytes());
        wire.extend_from_slice(b"trailing");

        for chunk_size in [1usize, 3, wire.len()] {
            let mut monitor = StatusMonitor::new();
            let mut merged = 0;
            for chunk in wire.chunks(chunk_size) {
                merged += monitor.ingest(chunk);
            }
            assert_eq!(merged, 2, "chunk size {chunk_size}");
            assert_eq!(monitor.store().actuator(1).position, 300);
            assert_eq!(monitor.store().actuator(5).position, 2_000);
        }
    }

    #[test]
    fn sparse_updates_preserve_unmentioned_fields() {
        let mut store = ReportStore::new();
        store
            .apply(&document(&[(2, true, 4_000)]))
            .expect("full entry");

        // A delta naming only position must not clear the other fields.
        store
            .apply("{\"actuators\":[{\"index\":2,\"position\":4500}]}")
            .expect("sparse entry");

        let stored = store.actuator(2);
        assert_eq!(stored.position, 4_500);
        assert!(stored.active);
        assert_eq!(stored.name, "Actuator 3");
        assert_eq!(stored.mode, "EXTENDING");
    }

    #[test]
    fn out_of_range_index_skips_only_that_entry() {
        let mut store = ReportStore::new();
        let doc = "{\"actuators\":[{\"index\":99,\"position\":1},{\"index\":3,\"position\":7}]}";
        assert_eq!(store.apply(doc).expect("apply"), 1);
        assert_eq!(store.actuator(3).position, 7);
    }

    #[test]
    fn document_without_actuators_is_an_error() {
        let mut store = ReportStore::new();
        assert!(matches!(
            store.apply("{\"status\":\"ok\"}"),
            Err(DecodeError::MissingActuators)
        ));
        assert!(matches!(store.apply("not json"), Err(DecodeError::Json(_))));
    }

    #[test]
    fn end_marker_bytes_in_noise_do_not_terminate_framing_early() {
        let mut reassembler = FrameReassembler::new();
        let payload = document(&[(1, true, 42)]);
        reassembler.push(b"}]}");
        reassembler.push(framed(&payload).as_bytes());
        assert_eq!(reassembler.next_frame().as_deref(), Some(payload.as_str()));
        assert_eq!(reassembler.buffered(), 0);
    }

    #[test]
    fn oversized_garbage_does_not_wedge_the_reassembler() {
        let mut monitor = StatusMonitor::new();
        let garbage = [b'x'; MAX_PAYLOAD_SIZE + 500];
        assert_eq!(monitor.ingest(&garbage), 0);

        let wire = framed(&document(&[(4, false, 0)]));
        let merged = monitor.ingest(wire.as_bytes());
        assert_eq!(merged, 1);
        assert!(monitor.store().actuator(4).seen);
    }

    #[test]
    fn length_header_is_captured_while_a_frame_is_pending() {
        let mut reassembler = FrameReassembler::new();
        let payload = document(&[(0, false, 0)]);
        let wire = framed(&payload);
        let (head, tail) = wire.split_at(HEADER_SIZE + FRAME_START.len() + 4);

        reassembler.push(head.as_bytes());
        assert!(reassembler.next_frame().is_none());
        assert_eq!(
            reassembler.expected_len(),
            Some(u32::try_from(payload.len()).expect("length"))
        );

        reassembler.push(tail.as_bytes());
        let frame = reassembler.next_frame().expect("frame");
        assert_eq!(frame, payload);
        assert_eq!(reassembler.buffered(), 0);
        assert_eq!(reassembler.expected_len(), None);
    }
}
