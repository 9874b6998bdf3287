//! End-to-end controller behaviour against the mock adapters.

use flowguard::config::SystemConfig;
use flowguard::events::WakeCause;
use flowguard::persist::block::ValvePosition;
use flowguard::power::CycleAction;

use crate::mock_hw::{Rig, entry, rx_frame};

// 2025-06-01 00:00:00 UTC
const JUNE_1: u32 = 1_748_736_000;
// 2025-05-31 23:00:00 UTC
const MAY_31_LATE: u32 = JUNE_1 - 3_600;

const JUNE_LOG: &str = "log_06_25.bin";
const MAY_LOG: &str = "log_05_25.bin";

// ── Commands ──────────────────────────────────────────────────

#[test]
fn open_valve_drives_logs_and_reports() {
    let mut rig = Rig::new(JUNE_1);
    let pins = rig.ctl.config().pins;

    rig.ctl.handle_opcode(0x11);

    assert_eq!(rig.ctl.persist().valve(), ValvePosition::Open);
    assert_eq!(rig.file(JUNE_LOG), Some(entry(0x11, JUNE_1)));
    assert_eq!(rig.sent(), [entry(0x11, JUNE_1)]);

    let hw = rig.ctl.hw();
    assert_eq!(hw.writes[..3], [
        (pins.valve_enable, true),
        (pins.valve_control_1, true),
        (pins.valve_control_2, false),
    ]);
    assert!(!hw.level(pins.valve_enable), "bridge released after settle");
    assert_eq!(hw.delayed_ms, 5_000);
}

#[test]
fn close_then_report_valve() {
    let mut rig = Rig::new(JUNE_1);
    rig.ctl.handle_opcode(0x11);
    rig.advance(30);
    rig.ctl.handle_opcode(0x12);
    rig.advance(30);
    rig.ctl.handle_opcode(0x13);

    assert_eq!(rig.ctl.persist().valve(), ValvePosition::Closed);
    assert_eq!(rig.sent()[1], entry(0x12, JUNE_1 + 30));
    assert_eq!(rig.sent()[2], entry(0x12, JUNE_1 + 60));
    // Reporting the valve does not log.
    assert_eq!(rig.file(JUNE_LOG).map(|f| f.len()), Some(10));
}

#[test]
fn unknown_opcode_is_ignored() {
    let mut rig = Rig::new(JUNE_1);
    rig.ctl.handle_opcode(0x77);
    assert!(rig.sent().is_empty());
    assert!(rig.files.borrow().is_empty());
}

#[test]
fn leak_report_carries_condition() {
    let mut rig = Rig::new(JUNE_1);
    rig.ctl.handle_opcode(0x21);
    assert_eq!(rig.sent(), [entry(0x21, JUNE_1)]);

    rig.ctl.handle_opcode(0x22);
    assert_eq!(rig.sent()[1], entry(0x22, JUNE_1));
    assert_eq!(rig.ctl.persist().leak_condition(), 0);
}

// ── Log reporting ─────────────────────────────────────────────

#[test]
fn empty_log_reports_empty() {
    let mut rig = Rig::new(JUNE_1);
    rig.ctl.handle_opcode(0x01);
    assert_eq!(rig.sent(), [entry(0x03, JUNE_1)]);
}

#[test]
fn long_log_is_split_into_full_frames_then_end_marker() {
    let mut rig = Rig::new(JUNE_1);
    for i in 0..14 {
        rig.ctl.handle_opcode(if i % 2 == 0 { 0x11 } else { 0x12 });
        rig.advance(1);
    }
    let log = rig.file(JUNE_LOG).unwrap();
    assert_eq!(log.len(), 70);

    rig.ctl.handle_opcode(0x01);
    let sent = rig.sent();
    let frames = &sent[14..];
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].len(), 66);
    assert_eq!(frames[0][..], log[..66]);
    assert_eq!(frames[1][..4], log[66..]);
    assert_eq!(frames[1][4], 0x02);
    assert_eq!(rig.ctl.persist().cursor(), 70);

    // Nothing new since: empty report.
    rig.ctl.handle_opcode(0x01);
    assert_eq!(rig.sent().last().unwrap(), &entry(0x03, rig.now()));
}

#[test]
fn report_crosses_month_boundary() {
    let mut rig = Rig::new(MAY_31_LATE);
    rig.ctl.handle_opcode(0x11);
    rig.clock.set(JUNE_1 + 600);
    rig.ctl.handle_opcode(0x12);

    assert_eq!(rig.file(MAY_LOG), Some(entry(0x11, MAY_31_LATE)));
    assert_eq!(rig.file(JUNE_LOG), Some(entry(0x12, JUNE_1 + 600)));

    rig.ctl.handle_opcode(0x01);
    let mut expected = entry(0x11, MAY_31_LATE);
    expected.extend(entry(0x12, JUNE_1 + 600));
    expected.push(0x02);
    assert_eq!(rig.sent()[2], expected);

    let region = rig.ctl.persist().report_region().unwrap();
    assert_eq!((region.month, region.year), (6, 25));
    assert_eq!(rig.ctl.persist().cursor(), 5);
}

#[test]
fn drained_month_is_removed_once_reported() {
    let mut rig = Rig::new(MAY_31_LATE);
    rig.ctl.handle_opcode(0x11);
    rig.clock.set(JUNE_1 + 600);
    rig.ctl.handle_opcode(0x12);

    rig.ctl.handle_opcode(0x01);
    assert_eq!(rig.file(MAY_LOG), None);
    assert!(rig.file(JUNE_LOG).is_some());

    rig.ctl.handle_opcode(0x02);
    assert!(rig.files.borrow().is_empty());
}

#[test]
fn failed_log_report_keeps_cursor() {
    let mut rig = Rig::new(JUNE_1);
    rig.ctl.handle_opcode(0x11);
    let frames = rig.sent().len();

    rig.ctl.radio_mut().transceiver_mut().fail = true;
    rig.ctl.handle_opcode(0x01);
    assert_eq!(rig.ctl.persist().cursor(), 0);
    assert_eq!(rig.sent().len(), frames);

    rig.ctl.radio_mut().transceiver_mut().fail = false;
    rig.ctl.handle_opcode(0x01);
    let mut log_frame = entry(0x11, JUNE_1);
    log_frame.push(0x02);
    assert_eq!(rig.sent()[frames], log_frame);
    assert_eq!(rig.ctl.persist().cursor(), 5);
}

#[test]
fn drained_month_survives_a_failed_report() {
    let mut rig = Rig::new(MAY_31_LATE);
    rig.ctl.handle_opcode(0x11);
    rig.clock.set(JUNE_1 + 600);
    rig.ctl.handle_opcode(0x12);

    rig.ctl.radio_mut().transceiver_mut().fail = true;
    rig.ctl.handle_opcode(0x01);

    assert!(rig.file(MAY_LOG).is_some());
    let region = rig.ctl.persist().report_region().unwrap();
    assert_eq!((region.month, region.year), (5, 25));
}

#[test]
fn clear_log_removes_report_region() {
    let mut rig = Rig::new(JUNE_1);
    rig.ctl.handle_opcode(0x11);
    rig.ctl.handle_opcode(0x02);
    assert_eq!(rig.file(JUNE_LOG), None);
    assert_eq!(rig.sent().last().unwrap(), &entry(0x05, JUNE_1));
    assert_eq!(rig.ctl.persist().cursor(), 0);
}

#[test]
fn missing_medium_still_reports_valve() {
    let mut rig = Rig::new(JUNE_1);
    rig.ctl.bus_mut().medium_mut().present = false;

    rig.ctl.handle_opcode(0x11);

    assert_eq!(rig.ctl.persist().valve(), ValvePosition::Open);
    assert_eq!(rig.sent(), [entry(0x11, JUNE_1)]);
    assert!(rig.files.borrow().is_empty());
}

// ── Wake cycles ───────────────────────────────────────────────

#[test]
fn confirmed_pulse_logs_one_gallon() {
    let mut rig = Rig::new(JUNE_1);
    let pins = rig.ctl.config().pins;
    rig.ctl.hw_mut().set_level(pins.meter_pulse, false);
    rig.wake_by(WakeCause::MeterPulse);

    assert_eq!(rig.ctl.run_cycle(), CycleAction::MeterPulse);

    assert_eq!(rig.file(JUNE_LOG), Some(entry(0x04, JUNE_1)));
    assert_eq!(rig.ctl.persist().block().day_gallons, 1);
    assert_eq!(rig.ctl.hw().naps, [250]);
    assert!(rig.sent().is_empty());
    // Radio put back to sleep.
    assert!(rig.ctl.hw().level(pins.radio_sleep));
}

#[test]
fn held_meter_line_counts_one_gallon() {
    let mut rig = Rig::new(JUNE_1);
    let pins = rig.ctl.config().pins;
    rig.ctl.hw_mut().set_level(pins.meter_pulse, false);

    rig.wake_by(WakeCause::MeterPulse);
    assert_eq!(rig.ctl.run_cycle(), CycleAction::MeterPulse);
    rig.ctl.sleep();
    assert!(rig.ctl.hw().meter_wake_on_release);

    for _ in 0..3 {
        rig.advance(1);
        rig.wake_by(WakeCause::MeterPulse);
        assert_eq!(rig.ctl.run_cycle(), CycleAction::Bounce);
    }
    assert_eq!(rig.file(JUNE_LOG), Some(entry(0x04, JUNE_1)));
    assert_eq!(rig.ctl.persist().block().day_gallons, 1);

    // Release, then a fresh pulse counts again.
    rig.ctl.hw_mut().set_level(pins.meter_pulse, true);
    rig.wake_by(WakeCause::MeterPulse);
    assert_eq!(rig.ctl.run_cycle(), CycleAction::Bounce);
    rig.ctl.sleep();
    assert!(!rig.ctl.hw().meter_wake_on_release);
    assert_eq!(rig.pulse(), CycleAction::MeterPulse);
    assert_eq!(rig.ctl.persist().block().day_gallons, 2);
}

#[test]
fn bounce_touches_nothing() {
    let mut rig = Rig::new(JUNE_1);
    rig.wake_by(WakeCause::MeterPulse);

    assert_eq!(rig.ctl.run_cycle(), CycleAction::Bounce);

    assert!(rig.files.borrow().is_empty());
    assert!(rig.sent().is_empty());
    assert!(rig.ctl.hw().writes.is_empty());
}

#[test]
fn tenth_idle_wake_reports_and_clears() {
    let mut rig = Rig::new(JUNE_1);
    for _ in 0..9 {
        assert_eq!(rig.ctl.run_cycle(), CycleAction::Idle);
        rig.advance(8);
    }
    assert!(rig.sent().is_empty());

    assert_eq!(rig.ctl.run_cycle(), CycleAction::PeriodicReport);
    let t = rig.now();
    assert_eq!(rig.sent(), [entry(0x03, t), entry(0x21, t), entry(0x05, t)]);

    assert_eq!(rig.ctl.run_cycle(), CycleAction::Idle);
}

#[test]
fn periodic_pass_keeps_log_when_report_fails() {
    let mut rig = Rig::new(JUNE_1);
    rig.ctl.radio_mut().transceiver_mut().fail = true;
    rig.ctl.handle_opcode(0x11);
    for _ in 0..9 {
        rig.ctl.run_cycle();
    }
    assert_eq!(rig.ctl.run_cycle(), CycleAction::PeriodicReport);
    assert_eq!(rig.file(JUNE_LOG), Some(entry(0x11, JUNE_1)));

    rig.ctl.radio_mut().transceiver_mut().fail = false;
    rig.ctl.handle_opcode(0x01);
    let mut log_frame = entry(0x11, JUNE_1);
    log_frame.push(0x02);
    assert_eq!(rig.sent(), [log_frame]);
}

#[test]
fn periodic_report_streams_pending_log() {
    let mut rig = Rig::new(JUNE_1);
    rig.ctl.handle_opcode(0x11);
    for _ in 0..9 {
        rig.ctl.run_cycle();
    }
    assert_eq!(rig.ctl.run_cycle(), CycleAction::PeriodicReport);

    let sent = rig.sent();
    let mut log_frame = entry(0x11, JUNE_1);
    log_frame.push(0x02);
    assert_eq!(sent[1], log_frame);
    assert_eq!(rig.file(JUNE_LOG), None, "report region cleared");
}

#[test]
fn radio_frame_dispatches_every_opcode() {
    let mut rig = Rig::new(JUNE_1);
    let pins = rig.ctl.config().pins;
    rig.ctl
        .radio_mut()
        .transceiver_mut()
        .inbound
        .extend(rx_frame(&[0x13, 0x21]));
    rig.wake_by(WakeCause::RadioReady);

    assert_eq!(rig.ctl.run_cycle(), CycleAction::RadioReady);

    assert_eq!(rig.sent(), [entry(0x12, JUNE_1), entry(0x21, JUNE_1)]);
    let writes = &rig.ctl.hw().writes;
    assert!(writes.contains(&(pins.radio_rts, false)));
    assert_eq!(writes.last(), Some(&(pins.radio_sleep, true)));
    assert!(rig.ctl.hw().level(pins.radio_rts), "RTS released");
}

#[test]
fn checksum_equal_to_delimiter_does_not_swallow_next_frame() {
    let mut rig = Rig::new(JUNE_1);
    let mut first = rx_frame(&[0x21]);
    *first.last_mut().unwrap() = 0x7E;
    let inbound = &mut rig.ctl.radio_mut().transceiver_mut().inbound;
    inbound.extend(first);
    inbound.extend(rx_frame(&[0x13]));
    rig.wake_by(WakeCause::RadioReady);

    rig.ctl.run_cycle();

    assert_eq!(rig.sent(), [entry(0x21, JUNE_1), entry(0x12, JUNE_1)]);
}

#[test]
fn non_rx_frames_are_dropped() {
    let mut rig = Rig::new(JUNE_1);
    let mut frame = rx_frame(&[0x11]);
    frame[3] = 0x8B; // transmit status
    rig.ctl.radio_mut().transceiver_mut().inbound.extend(frame);
    rig.wake_by(WakeCause::RadioReady);

    rig.ctl.run_cycle();

    assert!(rig.sent().is_empty());
    assert_eq!(rig.ctl.persist().valve(), ValvePosition::Closed);
}

#[test]
fn at_most_four_frames_per_wake() {
    let mut rig = Rig::new(JUNE_1);
    for _ in 0..5 {
        rig.ctl
            .radio_mut()
            .transceiver_mut()
            .inbound
            .extend(rx_frame(&[0x21]));
    }
    rig.wake_by(WakeCause::RadioReady);
    rig.ctl.run_cycle();
    assert_eq!(rig.sent().len(), 4);

    rig.wake_by(WakeCause::RadioReady);
    rig.ctl.run_cycle();
    assert_eq!(rig.sent().len(), 5);
}

#[test]
fn manual_reset_reopens_and_clears() {
    let mut rig = Rig::new(JUNE_1);
    let pins = rig.ctl.config().pins;
    rig.ctl.handle_opcode(0x12);
    rig.advance(60);
    rig.ctl.hw_mut().set_level(pins.manual_reset, false);

    assert_eq!(rig.ctl.run_cycle(), CycleAction::ManualReset);

    let t = rig.now();
    assert_eq!(rig.ctl.persist().valve(), ValvePosition::Open);
    assert_eq!(
        rig.sent()[1..],
        [entry(0x11, t), entry(0x05, t), entry(0x51, t)]
    );
    assert_eq!(rig.file(JUNE_LOG), Some(entry(0x51, t)));
    let block = rig.ctl.persist().block();
    assert_eq!(block.leak_condition, 0);
    assert_eq!(block.day_gallons, 0);
}

#[test]
fn daily_limit_closes_valve_once() {
    let config = SystemConfig {
        daily_limit_gallons: 3,
        ..SystemConfig::default()
    };
    let mut rig = Rig::with_config(config, JUNE_1);
    rig.ctl.handle_opcode(0x11);
    let opened_frames = rig.sent().len();

    for _ in 0..3 {
        rig.advance(120);
        assert_eq!(rig.pulse(), CycleAction::MeterPulse);
    }

    let t = rig.now();
    assert_eq!(rig.ctl.persist().valve(), ValvePosition::Closed);
    assert_eq!(rig.ctl.persist().leak_condition(), 1);

    let sent = rig.sent();
    let frames = &sent[opened_frames..];
    assert_eq!(frames[0], entry(0x12, t));
    let mut log = entry(0x11, JUNE_1);
    log.extend(entry(0x04, JUNE_1 + 120));
    log.extend(entry(0x04, JUNE_1 + 240));
    log.extend(entry(0x04, t));
    log.extend(entry(0x23, t));
    log.extend(entry(0x12, t));
    log.push(0x02);
    assert_eq!(frames[1], log);
    let mut leak = entry(0x23, t);
    leak.push(0x01);
    assert_eq!(frames[2], leak);
    assert_eq!(frames[3], entry(0x05, t));
    assert_eq!(frames.len(), 4);

    // A fourth pulse neither re-closes nor re-reports.
    rig.advance(120);
    assert_eq!(rig.pulse(), CycleAction::MeterPulse);
    assert_eq!(rig.sent().len(), opened_frames + 4);
}

#[test]
fn failed_send_does_not_stop_the_cycle() {
    let mut rig = Rig::new(JUNE_1);
    rig.ctl.radio_mut().transceiver_mut().fail = true;
    rig.ctl.handle_opcode(0x11);
    assert_eq!(rig.ctl.persist().valve(), ValvePosition::Open);
    assert_eq!(rig.file(JUNE_LOG), Some(entry(0x11, JUNE_1)));
    assert_eq!(rig.ctl.radio().pending(), 0);
}

#[test]
fn sleep_arms_latch_and_halts() {
    let mut rig = Rig::new(JUNE_1);
    rig.ctl.sleep();
    assert!(rig.latch.is_armed());
    assert_eq!(rig.ctl.hw().halts, [8_000]);
}
