//! Chunked write-then-verify memory test over the unused memory ranges.
//!
//! The test walks `pattern × operation × range × chunk` and advances exactly
//! one chunk per [`MemoryTest::poll`] call so the UI loop stays responsive.

#![allow(missing_docs)]

use std::fmt::Write;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::core::config::DiagnosticsConfig;
use crate::core::errors::{Result, RuiError};
use crate::diag::TextBuffer;
use crate::diag::report::{DiagReport, DiagTestResult, DiagTestType};
use crate::diag::storage_test::PollStatus;
use crate::platform::pal::MemoryBus;

const GIB: u64 = 1 << 30;

/// Words in the cyclic pattern block handed to the memory bus.
pub const PATTERN_CACHE_WORDS: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryTestMode {
    Quick,
    Full,
}

impl MemoryTestMode {
    pub const fn diag_type(self) -> DiagTestType {
        match self {
            Self::Quick => DiagTestType::MemoryQuick,
            Self::Full => DiagTestType::MemoryFull,
        }
    }

    pub fn patterns(self) -> Vec<Pattern> {
        match self {
            Self::Quick => vec![Pattern::fixed("five_a_8", &FIVE_A_8)],
            Self::Full => full_patterns(),
        }
    }
}

/// A named cyclic test pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub name: &'static str,
    pub words: Vec<u32>,
}

impl Pattern {
    fn fixed(name: &'static str, words: &[u32]) -> Self {
        Self {
            name,
            words: words.to_vec(),
        }
    }

    /// The pattern repeated to fill a [`PATTERN_CACHE_WORDS`] block.
    pub fn cyclic_block(&self) -> Vec<u32> {
        self.words
            .iter()
            .copied()
            .cycle()
            .take(PATTERN_CACHE_WORDS)
            .collect()
    }
}

const ONE_ZERO: [u32; 2] = [0x0000_0000, 0xffff_ffff];
const ZERO: [u32; 1] = [0x0000_0000];
const ONE: [u32; 1] = [0xffff_ffff];
const FIVE: [u32; 1] = [0x5555_5555];
const A: [u32; 1] = [0xaaaa_aaaa];
const FIVE_A: [u32; 2] = [0x5555_5555, 0xaaaa_aaaa];
const FIVE_A_8: [u32; 4] = [0x5aa5_a55a, 0xa55a_5aa5, 0xa55a_5aa5, 0x5aa5_a55a];
const LONG_8B10B: [u32; 1] = [0x1616_1616];
const SHORT_8B10B: [u32; 1] = [0xb5b5_b5b5];
const CHECKER_8B10B: [u32; 2] = [0xb5b5_b5b5, 0x4a4a_4a4a];
const FIVE_7: [u32; 2] = [0x5555_5557, 0x5557_5555];
const ZERO2_FD: [u32; 2] = [0x0002_0002, 0xfffd_fffd];

/// A single set bit walking up through all 32 positions and back down,
/// ending with an all-zero word.
fn walking_ones() -> Vec<u32> {
    let mut words = vec![0u32; 64];
    for i in 0..32 {
        words[i] = 1 << i;
        words[62 - i] = 1 << i;
    }
    words
}

fn full_patterns() -> Vec<Pattern> {
    vec![
        Pattern::fixed("one_zero", &ONE_ZERO),
        Pattern::fixed("zero2_fd", &ZERO2_FD),
        Pattern::fixed("five7", &FIVE_7),
        Pattern::fixed("checker8b10b", &CHECKER_8B10B),
        Pattern::fixed("short8b10b", &SHORT_8B10B),
        Pattern::fixed("long8b10b", &LONG_8B10B),
        Pattern::fixed("five_a_8", &FIVE_A_8),
        Pattern::fixed("five_a", &FIVE_A),
        Pattern::fixed("a", &A),
        Pattern::fixed("five", &FIVE),
        Pattern::fixed("one", &ONE),
        Pattern::fixed("zero", &ZERO),
        Pattern::fixed("one_zero", &ONE_ZERO),
        Pattern {
            name: "walking_ones",
            words: walking_ones(),
        },
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Write,
    Check,
}

const OPERATIONS: u64 = 2;

/// Where the test currently is in its nested walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    pattern: usize,
    op: Operation,
    range: usize,
    chunk_start: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryFailure {
    pub pattern: &'static str,
    pub address: u64,
    pub segment: Range<u64>,
}

/// One memory test run. Owns its output text.
#[derive(Debug, Clone)]
pub struct MemoryTest {
    mode: MemoryTestMode,
    patterns: Vec<Pattern>,
    block: Vec<u32>,
    ranges: Vec<Range<u64>>,
    chunk_bytes: u64,
    cursor: Option<Cursor>,
    num_bytes: u64,
    processed: u64,
    percent: u8,
    shown: Option<(u8, usize)>,
    failure: Option<MemoryFailure>,
    last: PollStatus,
    out: TextBuffer,
    committed: usize,
}

impl MemoryTest {
    /// Collect the unused ranges, print the header and record the test start.
    pub fn start<M: MemoryBus + ?Sized>(
        bus: &mut M,
        mode: MemoryTestMode,
        config: &DiagnosticsConfig,
        now_us: u64,
        report: &mut DiagReport,
    ) -> Result<Self> {
        let ranges: Vec<Range<u64>> = bus
            .unused_ranges()?
            .into_iter()
            .filter(|r| !r.is_empty())
            .collect();
        let num_bytes: u64 = ranges.iter().map(|r| r.end - r.start).sum();
        if num_bytes == 0 {
            return Err(RuiError::hardware("memory", -1));
        }

        let patterns = mode.patterns();
        let block = patterns
            .first()
            .map(Pattern::cyclic_block)
            .unwrap_or_default();
        let mut test = Self {
            mode,
            patterns,
            block,
            chunk_bytes: config.memory_chunk_bytes.max(1),
            cursor: Some(Cursor {
                pattern: 0,
                op: Operation::Write,
                range: 0,
                chunk_start: ranges[0].start,
            }),
            ranges,
            num_bytes,
            processed: 0,
            percent: 0,
            shown: None,
            failure: None,
            last: PollStatus::Updated,
            out: TextBuffer::new(config.memory_output_bytes),
            committed: 0,
        };

        let mut header = String::from("This test may take a few minutes\n\n");
        let _ = writeln!(
            header,
            "Free memory (will be tested): {}.{:03} GiB",
            num_bytes / GIB,
            (u128::from(num_bytes) * 1000 / u128::from(GIB)) % 1000
        );
        header.push_str("Loaded test patterns:");
        for pattern in &test.patterns {
            let _ = write!(header, " '{}'", pattern.name);
        }
        header.push_str("\n\n");
        test.commit(&header);

        report.start_test(mode.diag_type(), now_us);
        Ok(test)
    }

    pub fn mode(&self) -> MemoryTestMode {
        self.mode
    }

    pub fn text(&self) -> &str {
        self.out.as_str()
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn failure(&self) -> Option<&MemoryFailure> {
        self.failure.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn last_status(&self) -> PollStatus {
        self.last
    }

    /// Process one chunk and refresh the progress line.
    ///
    /// Returns `Running` when neither the percentage nor the pattern changed,
    /// so the caller can skip a redraw.
    pub fn poll<M: MemoryBus + ?Sized>(
        &mut self,
        bus: &mut M,
        now_us: u64,
        report: &mut DiagReport,
    ) -> PollStatus {
        let Some(cursor) = self.cursor else {
            return self.last;
        };

        let end = self.chunk_end(cursor);
        let chunk = cursor.chunk_start..end;
        let outcome = match cursor.op {
            Operation::Write => bus.write_chunk(chunk.clone(), &self.block).map(|()| None),
            Operation::Check => bus.check_chunk(chunk.clone(), &self.block),
        };
        self.processed += end - cursor.chunk_start;
        self.update_percent();

        match outcome {
            Err(err) => {
                self.commit(&format!("\nMemory test error: {err}\n"));
                return self.finish(PollStatus::Error, now_us, report);
            }
            Ok(Some(address)) => {
                let pattern = self.patterns[cursor.pattern].name;
                self.commit(&format!(
                    "\nMemory test failed:\n    Pattern '{pattern}' failed at {address:#016x}\n    in memory segment [{:#016x}, {:#016x}).\n",
                    chunk.start, chunk.end
                ));
                self.failure = Some(MemoryFailure {
                    pattern,
                    address,
                    segment: chunk,
                });
                return self.finish(PollStatus::Failed, now_us, report);
            }
            Ok(None) => {}
        }

        self.advance(cursor, end);
        let Some(next) = self.cursor else {
            self.commit("\nAll memory tests passed.\n");
            return self.finish(PollStatus::Passed, now_us, report);
        };

        if self.shown == Some((self.percent, next.pattern)) {
            return PollStatus::Running;
        }
        self.shown = Some((self.percent, next.pattern));
        self.out.truncate(self.committed);
        let _ = write!(
            self.out,
            "\n{:3}% completed ... Running pattern '{}' ...\n",
            self.percent, self.patterns[next.pattern].name
        );
        self.last = PollStatus::Updated;
        PollStatus::Updated
    }

    /// Abandon a running test and record it as aborted.
    pub fn cancel(&mut self, now_us: u64, report: &mut DiagReport) {
        if self.cursor.is_some() {
            self.finish(PollStatus::Aborted, now_us, report);
        }
    }

    // ──── internals ────

    fn chunk_end(&self, cursor: Cursor) -> u64 {
        let range_end = self.ranges[cursor.range].end;
        range_end.min(cursor.chunk_start.saturating_add(self.chunk_bytes))
    }

    fn advance(&mut self, cursor: Cursor, chunk_end: u64) {
        let mut next = cursor;
        if chunk_end < self.ranges[cursor.range].end {
            next.chunk_start = chunk_end;
            self.cursor = Some(next);
            return;
        }

        next.range += 1;
        if next.range == self.ranges.len() {
            next.range = 0;
            match next.op {
                Operation::Write => next.op = Operation::Check,
                Operation::Check => {
                    next.op = Operation::Write;
                    next.pattern += 1;
                    match self.patterns.get(next.pattern) {
                        Some(pattern) => self.block = pattern.cyclic_block(),
                        None => {
                            self.cursor = None;
                            return;
                        }
                    }
                }
            }
        }
        next.chunk_start = self.ranges[next.range].start;
        self.cursor = Some(next);
    }

    fn update_percent(&mut self) {
        let total = u128::from(self.num_bytes) * u128::from(OPERATIONS) * self.patterns.len() as u128;
        let pct = u128::from(self.processed) * 100 / total.max(1);
        self.percent = u8::try_from(pct.min(100)).unwrap_or(100);
    }

    fn commit(&mut self, text: &str) {
        self.out.truncate(self.committed);
        self.out.push_str(text);
        self.committed = self.out.len();
    }

    fn finish(&mut self, status: PollStatus, now_us: u64, report: &mut DiagReport) -> PollStatus {
        self.cursor = None;
        self.last = status;
        let result = match status {
            PollStatus::Passed => DiagTestResult::Passed,
            PollStatus::Failed => DiagTestResult::Failed,
            PollStatus::Aborted => DiagTestResult::Aborted,
            _ => DiagTestResult::Error,
        };
        report.end_test(result, now_us);
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Byte-addressed fake with an optional stuck address.
    struct FakeBus {
        ranges: Vec<Range<u64>>,
        stuck_at: Option<u64>,
        written: Vec<(Range<u64>, u32)>,
        checks: usize,
    }

    impl FakeBus {
        fn new(ranges: Vec<Range<u64>>) -> Self {
            Self {
                ranges,
                stuck_at: None,
                written: Vec::new(),
                checks: 0,
            }
        }
    }

    impl MemoryBus for FakeBus {
        fn unused_ranges(&mut self) -> Result<Vec<Range<u64>>> {
            Ok(self.ranges.clone())
        }

        fn write_chunk(&mut self, range: Range<u64>, pattern: &[u32]) -> Result<()> {
            self.written.push((range, pattern[0]));
            Ok(())
        }

        fn check_chunk(&mut self, range: Range<u64>, _pattern: &[u32]) -> Result<Option<u64>> {
            self.checks += 1;
            Ok(self.stuck_at.filter(|addr| range.contains(addr)))
        }
    }

    fn config(chunk: u64) -> DiagnosticsConfig {
        DiagnosticsConfig {
            memory_chunk_bytes: chunk,
            ..DiagnosticsConfig::default()
        }
    }

    fn run_to_end(test: &mut MemoryTest, bus: &mut FakeBus, report: &mut DiagReport) -> PollStatus {
        for _ in 0..10_000 {
            let status = test.poll(bus, 0, report);
            if status.is_terminal() {
                return status;
            }
        }
        panic!("memory test did not finish");
    }

    #[test]
    fn walking_ones_shape() {
        let words = walking_ones();
        assert_eq!(words.len(), 64);
        assert_eq!(words[0], 1);
        assert_eq!(words[31], 0x8000_0000);
        assert_eq!(words[32], 0x4000_0000);
        assert_eq!(words[62], 1);
        assert_eq!(words[63], 0);
    }

    #[test]
    fn pattern_sets() {
        assert_eq!(MemoryTestMode::Quick.patterns().len(), 1);
        let full = MemoryTestMode::Full.patterns();
        assert_eq!(full.len(), 14);
        assert_eq!(full.last().unwrap().name, "walking_ones");
        let block = full[0].cyclic_block();
        assert_eq!(block.len(), PATTERN_CACHE_WORDS);
        assert_eq!(&block[..4], &[0, 0xffff_ffff, 0, 0xffff_ffff]);
    }

    #[test]
    fn header_lists_size_and_patterns() {
        let mut bus = FakeBus::new(vec![0..GIB / 2, GIB..GIB + GIB / 4]);
        let mut report = DiagReport::new(8);
        let test = MemoryTest::start(&mut bus, MemoryTestMode::Quick, &config(GIB), 0, &mut report)
            .unwrap();
        assert_eq!(
            test.text(),
            "This test may take a few minutes\n\n\
             Free memory (will be tested): 0.750 GiB\n\
             Loaded test patterns: 'five_a_8'\n\n"
        );
        assert_eq!(report.running(), Some(DiagTestType::MemoryQuick));
    }

    #[test]
    fn walks_every_chunk_write_then_check() {
        let mut bus = FakeBus::new(vec![0..100, 200..250]);
        let mut report = DiagReport::new(8);
        let mut test =
            MemoryTest::start(&mut bus, MemoryTestMode::Quick, &config(40), 0, &mut report).unwrap();

        let status = run_to_end(&mut test, &mut bus, &mut report);
        assert_eq!(status, PollStatus::Passed);
        let written: Vec<_> = bus.written.iter().map(|(r, _)| r.clone()).collect();
        assert_eq!(written, vec![0..40, 40..80, 80..100, 200..240, 240..250]);
        assert_eq!(bus.checks, 5);
        assert_eq!(test.percent(), 100);
        assert!(test.text().ends_with("\nAll memory tests passed.\n"));
        assert!(!test.text().contains("completed ..."));

        let event = report.events().newest_first().next().copied().unwrap();
        assert_eq!(event.test, DiagTestType::MemoryQuick);
        assert_eq!(event.result, DiagTestResult::Passed);
    }

    #[test]
    fn progress_line_is_rewritten_in_place() {
        let mut bus = FakeBus::new(vec![0..400]);
        let mut report = DiagReport::new(8);
        let mut test =
            MemoryTest::start(&mut bus, MemoryTestMode::Quick, &config(100), 0, &mut report).unwrap();

        assert_eq!(test.poll(&mut bus, 0, &mut report), PollStatus::Updated);
        assert!(test.text().ends_with("\n 12% completed ... Running pattern 'five_a_8' ...\n"));
        assert_eq!(test.poll(&mut bus, 0, &mut report), PollStatus::Updated);
        assert!(test.text().ends_with("\n 25% completed ... Running pattern 'five_a_8' ...\n"));
        assert_eq!(test.text().matches("completed ...").count(), 1);
    }

    #[test]
    fn unchanged_progress_reports_running() {
        let mut bus = FakeBus::new(vec![0..100_000]);
        let mut report = DiagReport::new(8);
        let mut test =
            MemoryTest::start(&mut bus, MemoryTestMode::Quick, &config(100), 0, &mut report).unwrap();
        assert_eq!(test.poll(&mut bus, 0, &mut report), PollStatus::Updated);
        assert_eq!(test.poll(&mut bus, 0, &mut report), PollStatus::Running);
    }

    #[test]
    fn stuck_address_fails_with_segment() {
        let mut bus = FakeBus::new(vec![0x1000..0x3000]);
        bus.stuck_at = Some(0x2345);
        let mut report = DiagReport::new(8);
        let mut test = MemoryTest::start(&mut bus, MemoryTestMode::Full, &config(0x1000), 0, &mut report)
            .unwrap();

        let status = run_to_end(&mut test, &mut bus, &mut report);
        assert_eq!(status, PollStatus::Failed);
        let failure = test.failure().unwrap();
        assert_eq!(failure.pattern, "one_zero");
        assert_eq!(failure.segment, 0x2000..0x3000);
        assert!(test.text().contains(
            "Memory test failed:\n    Pattern 'one_zero' failed at 0x00000000002345\n    in memory segment [0x00000000002000, 0x00000000003000).\n"
        ));
        assert_eq!(test.poll(&mut bus, 0, &mut report), PollStatus::Failed);
        assert_eq!(report.events().len(), 1);
    }

    #[test]
    fn no_free_memory_is_a_hardware_error() {
        let mut bus = FakeBus::new(vec![5..5]);
        let mut report = DiagReport::new(8);
        let err = MemoryTest::start(&mut bus, MemoryTestMode::Quick, &config(64), 0, &mut report)
            .unwrap_err();
        assert_eq!(err.code(), "RUI-2003");
        assert_eq!(report.running(), None);
    }

    #[test]
    fn cancel_records_abort_once() {
        let mut bus = FakeBus::new(vec![0..1000]);
        let mut report = DiagReport::new(8);
        let mut test =
            MemoryTest::start(&mut bus, MemoryTestMode::Quick, &config(10), 0, &mut report).unwrap();
        test.poll(&mut bus, 0, &mut report);
        test.cancel(3_000_000, &mut report);
        test.cancel(4_000_000, &mut report);
        assert!(!test.is_running());
        assert_eq!(report.events().len(), 1);
        let event = report.events().newest_first().next().copied().unwrap();
        assert_eq!(event.result, DiagTestResult::Aborted);
        assert_eq!(event.elapsed_s, 3);
    }
}
