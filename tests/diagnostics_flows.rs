//! Diagnostics boot: storage and memory tests, cancellation, and the event
//! log report written on exit.

mod common;

use common::{boot, diagnostics_profile};
use recovery_ui::diag::report::ELOG_TYPE_CROS_DIAGNOSTICS;
use recovery_ui::diag::storage_test::{TestOp, TestSupport};
use recovery_ui::logger::jsonl::EventType;
use recovery_ui::prelude::*;
use recovery_ui::ui::error::UiError;

fn only_event(events: &[DiagEvent]) -> DiagEvent {
    assert_eq!(events.len(), 1, "events: {events:?}");
    events[0]
}

#[test]
fn short_self_test_passes_and_is_reported() {
    let run = boot(diagnostics_profile(), "down enter", 300);

    assert_eq!(run.report.mode, BootMode::Diagnostics);
    assert_eq!(run.report.outcome, UiOutcome::Shutdown);
    let event = only_event(&run.report.diag_events);
    assert_eq!(event.test, DiagTestType::StorageTestShort);
    assert_eq!(event.result, DiagTestResult::Passed);
    assert!((1..=3).contains(&event.elapsed_s), "{event:?}");

    let payload = run.report.elog_payload.clone().expect("payload built");
    assert_eq!(run.sim.elog, vec![(ELOG_TYPE_CROS_DIAGNOSTICS, payload.clone())]);
    let decoded = decode_payload(&payload).expect("payload decodes");
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].test, DiagTestType::StorageTestShort);
    assert_eq!(decoded[0].result, DiagTestResult::Passed);

    assert_eq!(run.events(EventType::TestStart), 1);
    assert_eq!(run.events(EventType::TestResult), 1);
    assert_eq!(run.events(EventType::ReportDump), 1);
}

#[test]
fn leaving_a_running_test_aborts_it() {
    let run = boot(diagnostics_profile(), "down enter idle esc idle", 20);

    let event = only_event(&run.report.diag_events);
    assert_eq!(event.test, DiagTestType::StorageTestShort);
    assert_eq!(event.result, DiagTestResult::Aborted);
    let dev = run.sim.device(0).expect("fixed device");
    assert_eq!(dev.controls.first(), Some(&TestOp::Short));
    assert!(dev.controls.contains(&TestOp::Stop));
    assert_eq!(
        run.sim.last_frame().map(|f| f.info.screen),
        Some(ScreenId::Diagnostics)
    );
}

#[test]
fn unsupported_self_test_is_disabled() {
    let mut profile = diagnostics_profile();
    profile.storage[0].support = TestSupport::SHORT;

    // Focus lands on the disabled extended test; enter does nothing.
    let run = boot(profile, "down down enter idle", 10);

    let first = run.sim.frames.first().expect("root drawn");
    assert!(!first.info.disabled.contains(2));
    assert!(first.info.disabled.contains(3));
    assert!(!run.saw_screen(ScreenId::StorageTestExtended));
    assert!(run.report.diag_events.is_empty());
}

#[test]
fn quick_memory_check_passes() {
    let run = boot(diagnostics_profile(), "down down down enter", 200);

    let event = only_event(&run.report.diag_events);
    assert_eq!(event.test, DiagTestType::MemoryQuick);
    assert_eq!(event.result, DiagTestResult::Passed);
    let last = run.sim.last_frame().expect("frames drawn");
    assert_eq!(last.info.screen, ScreenId::MemoryQuick);
    assert!(last.texts().any(|t| t.contains("All memory tests passed.")));
}

#[test]
fn stuck_memory_cell_fails_the_check() {
    let mut profile = diagnostics_profile();
    profile.memory.stuck_at = Some(0x1000_0000 + 0x40);

    let run = boot(profile, "down down down enter", 200);

    let event = only_event(&run.report.diag_events);
    assert_eq!(event.test, DiagTestType::MemoryQuick);
    assert_eq!(event.result, DiagTestResult::Failed);
    let last = run.sim.last_frame().expect("frames drawn");
    assert!(last.texts().any(|t| t.contains("Memory test failed")));
}

#[test]
fn storage_health_is_dumped() {
    let run = boot(diagnostics_profile(), "enter", 10);

    let event = only_event(&run.report.diag_events);
    assert_eq!(event.test, DiagTestType::StorageHealth);
    assert_eq!(event.result, DiagTestResult::Passed);
    let health = run
        .sim
        .frames
        .iter()
        .rfind(|f| f.info.screen == ScreenId::StorageHealth)
        .expect("health screen drawn");
    assert!(health.texts().any(|t| t.contains("Block device 'nvme0n1'")));
}

#[test]
fn device_fault_returns_to_the_menu_with_an_error() {
    let mut profile = diagnostics_profile();
    profile.storage[0].fault = Some(-5);

    let run = boot(profile, "down enter idle", 10);

    assert!(run.saw_error(UiError::Diagnostics));
    assert_eq!(
        run.sim.last_frame().map(|f| f.info.screen),
        Some(ScreenId::Diagnostics)
    );
}

#[test]
fn unwritable_event_log_only_warns() {
    let mut profile = diagnostics_profile();
    profile.elog_writable = false;

    let run = boot(profile, "enter", 10);

    assert!(run.sim.elog.is_empty());
    assert!(run.report.elog_payload.is_some());
    assert_eq!(run.report.diag_events.len(), 1);
    assert_eq!(run.events(EventType::Warning), 1);
}

#[test]
fn power_off_still_writes_the_report() {
    // Selection starts on storage health; power off is five below.
    let run = boot(diagnostics_profile(), "down down down down down enter", 50);

    assert_eq!(run.report.outcome, UiOutcome::Shutdown);
    assert_eq!(run.events(EventType::ShutdownRequest), 0);
    assert!(run.report.diag_events.is_empty());
    assert_eq!(run.sim.elog.len(), 1);
}
