//! Bounded history of diagnostic test outcomes.
//!
//! [`EventRing`] is the fixed-capacity chronological store; [`DiagReport`]
//! adds the "currently running test" bookkeeping and produces the payload
//! appended to the firmware event log.

#![allow(missing_docs)]

use std::collections::VecDeque;

use serde::Serialize;

use crate::core::errors::{Result, RuiError};

/// Event log record type for diagnostics.
pub const ELOG_TYPE_CROS_DIAGNOSTICS: u8 = 0xb6;
/// Subtype byte that prefixes a diagnostics report payload.
pub const ELOG_CROS_DIAGNOSTICS_LOGS: u8 = 0x02;
/// Serialized size of one [`DiagEvent`].
pub const EVENT_RECORD_BYTES: usize = 4;

const MICROS_PER_SEC: u64 = 1_000_000;

/// Which diagnostic produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum DiagTestType {
    None = 0,
    StorageHealth = 1,
    StorageTestShort = 2,
    StorageTestExtended = 3,
    MemoryQuick = 4,
    MemoryFull = 5,
}

impl DiagTestType {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::StorageHealth),
            2 => Some(Self::StorageTestShort),
            3 => Some(Self::StorageTestExtended),
            4 => Some(Self::MemoryQuick),
            5 => Some(Self::MemoryFull),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::StorageHealth => "storage_health",
            Self::StorageTestShort => "storage_test_short",
            Self::StorageTestExtended => "storage_test_extended",
            Self::MemoryQuick => "memory_quick",
            Self::MemoryFull => "memory_full",
        }
    }
}

/// Outcome of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum DiagTestResult {
    Unknown = 0,
    Passed = 1,
    Error = 2,
    Failed = 3,
    Aborted = 4,
}

impl DiagTestResult {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Unknown),
            1 => Some(Self::Passed),
            2 => Some(Self::Error),
            3 => Some(Self::Failed),
            4 => Some(Self::Aborted),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Passed => "passed",
            Self::Error => "error",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
        }
    }
}

/// One recorded outcome: `type u8 | result u8 | elapsed seconds u16 LE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiagEvent {
    pub test: DiagTestType,
    pub result: DiagTestResult,
    pub elapsed_s: u16,
}

impl DiagEvent {
    /// Build an event from an elapsed time in microseconds, saturating at
    /// `u16::MAX` seconds.
    pub fn from_elapsed_us(test: DiagTestType, result: DiagTestResult, elapsed_us: u64) -> Self {
        let secs = elapsed_us / MICROS_PER_SEC;
        Self {
            test,
            result,
            elapsed_s: u16::try_from(secs).unwrap_or(u16::MAX),
        }
    }

    pub fn to_bytes(self) -> [u8; EVENT_RECORD_BYTES] {
        let [lo, hi] = self.elapsed_s.to_le_bytes();
        [self.test.code(), self.result.code(), lo, hi]
    }

    pub fn from_bytes(raw: [u8; EVENT_RECORD_BYTES]) -> Result<Self> {
        let test = DiagTestType::from_code(raw[0]).ok_or(RuiError::InvalidEvent {
            kind: "type",
            value: raw[0],
        })?;
        let result = DiagTestResult::from_code(raw[1]).ok_or(RuiError::InvalidEvent {
            kind: "result",
            value: raw[1],
        })?;
        Ok(Self {
            test,
            result,
            elapsed_s: u16::from_le_bytes([raw[2], raw[3]]),
        })
    }
}

/// Fixed-capacity chronological store; the oldest entry is evicted when full.
#[derive(Debug, Clone)]
pub struct EventRing {
    events: VecDeque<DiagEvent>,
    capacity: usize,
}

impl EventRing {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a raw `(type, result, elapsed)` triple.
    ///
    /// Out-of-range codes are rejected and leave the ring unchanged.
    pub fn push(&mut self, test: u8, result: u8, elapsed_us: u64) -> Result<()> {
        let test = DiagTestType::from_code(test).ok_or(RuiError::InvalidEvent {
            kind: "type",
            value: test,
        })?;
        let result = DiagTestResult::from_code(result).ok_or(RuiError::InvalidEvent {
            kind: "result",
            value: result,
        })?;
        self.push_event(DiagEvent::from_elapsed_us(test, result, elapsed_us));
        Ok(())
    }

    pub fn push_event(&mut self, event: DiagEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn newest_first(&self) -> impl Iterator<Item = &DiagEvent> {
        self.events.iter().rev()
    }

    /// Copy whole records newest-first into `out`; returns bytes written.
    pub fn dump(&self, out: &mut [u8]) -> usize {
        let mut written = 0;
        for (event, slot) in self
            .newest_first()
            .zip(out.chunks_exact_mut(EVENT_RECORD_BYTES))
        {
            slot.copy_from_slice(&event.to_bytes());
            written += EVENT_RECORD_BYTES;
        }
        written
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RunningTest {
    test: DiagTestType,
    started_us: u64,
}

/// Event ring plus the test currently in flight.
#[derive(Debug, Clone)]
pub struct DiagReport {
    ring: EventRing,
    current: Option<RunningTest>,
}

impl DiagReport {
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: EventRing::new(capacity),
            current: None,
        }
    }

    /// Begin timing `test`. A test left unclosed is recorded as an error first.
    pub fn start_test(&mut self, test: DiagTestType, now_us: u64) {
        self.end_test(DiagTestResult::Error, now_us);
        if test != DiagTestType::None {
            self.current = Some(RunningTest {
                test,
                started_us: now_us,
            });
        }
    }

    /// Close the running test with `result`. Returns the recorded event.
    pub fn end_test(&mut self, result: DiagTestResult, now_us: u64) -> Option<DiagEvent> {
        let running = self.current.take()?;
        let event = DiagEvent::from_elapsed_us(
            running.test,
            result,
            now_us.saturating_sub(running.started_us),
        );
        self.ring.push_event(event);
        Some(event)
    }

    pub fn running(&self) -> Option<DiagTestType> {
        self.current.map(|r| r.test)
    }

    /// Close any unfinished test as an error, then dump newest-first.
    pub fn dump(&mut self, out: &mut [u8], now_us: u64) -> usize {
        self.end_test(DiagTestResult::Error, now_us);
        self.ring.dump(out)
    }

    /// Event-log payload: subtype byte followed by at most `capacity` dump bytes.
    pub fn elog_payload(&mut self, capacity: usize, now_us: u64) -> Vec<u8> {
        let mut dump = vec![0; capacity];
        let written = self.dump(&mut dump, now_us);
        let mut payload = Vec::with_capacity(written + 1);
        payload.push(ELOG_CROS_DIAGNOSTICS_LOGS);
        payload.extend_from_slice(&dump[..written]);
        payload
    }

    pub fn events(&self) -> &EventRing {
        &self.ring
    }

    pub fn clear(&mut self) {
        self.current = None;
        self.ring.clear();
    }
}

/// Decode an event-log payload (with or without the subtype byte).
pub fn decode_payload(payload: &[u8]) -> Result<Vec<DiagEvent>> {
    let body = match payload.split_first() {
        Some((&ELOG_CROS_DIAGNOSTICS_LOGS, rest)) if payload.len() % EVENT_RECORD_BYTES == 1 => {
            rest
        }
        _ => payload,
    };
    if body.len() % EVENT_RECORD_BYTES != 0 {
        return Err(RuiError::Serialization {
            context: "diag report",
            details: format!(
                "payload length {} is not a multiple of {EVENT_RECORD_BYTES}",
                body.len()
            ),
        });
    }
    body.chunks_exact(EVENT_RECORD_BYTES)
        .map(|chunk| DiagEvent::from_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SEC: u64 = 1_000_000;

    fn decode(bytes: &[u8]) -> Vec<DiagEvent> {
        decode_payload(bytes).expect("decodes")
    }

    #[test]
    fn dump_is_newest_first() {
        let mut ring = EventRing::new(50);
        ring.push(1, 1, 0).unwrap();
        ring.push(2, 2, 3 * SEC).unwrap();
        ring.push(3, 3, 7 * SEC).unwrap();

        let mut buf = [0u8; 64];
        let written = ring.dump(&mut buf);
        assert_eq!(written, 12);
        let events = decode(&buf[..written]);
        assert_eq!(events[0].test, DiagTestType::StorageTestExtended);
        assert_eq!(events[0].elapsed_s, 7);
        assert_eq!(events[2].test, DiagTestType::StorageHealth);
    }

    #[test]
    fn elapsed_time_saturates() {
        let mut ring = EventRing::new(4);
        ring.push(1, 1, 65_536 * SEC).unwrap();
        ring.push(1, 1, u64::MAX).unwrap();
        assert!(ring.newest_first().all(|e| e.elapsed_s == u16::MAX));
    }

    #[test]
    fn invalid_codes_are_rejected_without_insert() {
        let mut ring = EventRing::new(4);
        ring.push(1, 1, 0).unwrap();
        assert!(matches!(
            ring.push(6, 1, 0),
            Err(RuiError::InvalidEvent { kind: "type", value: 6 })
        ));
        assert!(matches!(
            ring.push(1, 5, 0),
            Err(RuiError::InvalidEvent { kind: "result", value: 5 })
        ));
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn partial_dump_stops_at_whole_records() {
        let mut ring = EventRing::new(8);
        for _ in 0..5 {
            ring.push(4, 1, 0).unwrap();
        }
        let mut buf = [0u8; 10];
        assert_eq!(ring.dump(&mut buf), 8);
        assert_eq!(&buf[8..], &[0, 0]);
    }

    #[test]
    fn start_closes_unfinished_test_as_error() {
        let mut report = DiagReport::new(50);
        report.start_test(DiagTestType::StorageTestShort, 0);
        report.start_test(DiagTestType::MemoryQuick, 2 * SEC);
        let ended = report.end_test(DiagTestResult::Passed, 5 * SEC).unwrap();
        assert_eq!(ended.elapsed_s, 3);

        let mut buf = [0u8; 16];
        let written = report.dump(&mut buf, 6 * SEC);
        let events = decode(&buf[..written]);
        assert_eq!(
            events,
            vec![
                DiagEvent {
                    test: DiagTestType::MemoryQuick,
                    result: DiagTestResult::Passed,
                    elapsed_s: 3
                },
                DiagEvent {
                    test: DiagTestType::StorageTestShort,
                    result: DiagTestResult::Error,
                    elapsed_s: 2
                },
            ]
        );
    }

    #[test]
    fn end_without_running_test_is_a_noop() {
        let mut report = DiagReport::new(50);
        assert!(report.end_test(DiagTestResult::Passed, 0).is_none());
        assert!(report.events().is_empty());
    }

    #[test]
    fn dump_closes_running_test_as_error() {
        let mut report = DiagReport::new(50);
        report.start_test(DiagTestType::MemoryFull, 0);
        let payload = report.elog_payload(117, 61 * SEC);
        assert_eq!(payload[0], ELOG_CROS_DIAGNOSTICS_LOGS);
        let events = decode(&payload);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].result, DiagTestResult::Error);
        assert_eq!(events[0].elapsed_s, 61);
        assert!(report.running().is_none());
    }

    #[test]
    fn elog_payload_is_bounded() {
        let mut report = DiagReport::new(50);
        for i in 0..50 {
            report.start_test(DiagTestType::StorageHealth, i);
            report.end_test(DiagTestResult::Passed, i);
        }
        let payload = report.elog_payload(117, 100);
        assert_eq!(payload.len(), 1 + 116);
    }

    #[test]
    fn clear_resets_everything() {
        let mut report = DiagReport::new(3);
        report.start_test(DiagTestType::StorageHealth, 0);
        report.end_test(DiagTestResult::Passed, 0);
        report.start_test(DiagTestType::MemoryQuick, 0);
        report.clear();
        assert!(report.events().is_empty());
        assert!(report.running().is_none());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// The ring never exceeds capacity and keeps the newest entries.
        #[test]
        fn ring_keeps_most_recent_entries(
            capacity in 1usize..60,
            secs in prop::collection::vec(0u64..1_000, 0..150)
        ) {
            let mut ring = EventRing::new(capacity);
            for s in &secs {
                ring.push(2, 1, s * SEC).unwrap();
                prop_assert!(ring.len() <= capacity);
            }

            let mut buf = vec![0u8; capacity * EVENT_RECORD_BYTES];
            let written = ring.dump(&mut buf);
            let dumped: Vec<u16> = decode(&buf[..written]).iter().map(|e| e.elapsed_s).collect();
            let expected: Vec<u16> = secs
                .iter()
                .rev()
                .take(capacity)
                .map(|s| u16::try_from(*s).unwrap())
                .collect();
            prop_assert_eq!(dumped, expected);
        }
    }
}
