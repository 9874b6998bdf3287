//! Block rotation through wake cycles, and the controller over the host
//! builds of the real adapters.

use std::cell::Cell;
use std::rc::Rc;

use flowguard::adapters::fs_storage::FsStorage;
use flowguard::adapters::hardware::HardwareAdapter;
use flowguard::adapters::nvs::NvsAdapter;
use flowguard::adapters::xbee::{XbeeRadio, encode_tx_request, TX_FRAME_MAX};
use flowguard::app::service::Controller;
use flowguard::bus::PeripheralArbiter;
use flowguard::config::SystemConfig;
use flowguard::events::{WakeCause, WakeLatch};
use flowguard::persist::block::{ValvePosition, block_index};
use flowguard::power::CycleAction;

use crate::mock_hw::{MockClock, Rig, entry};

// 2025-05-31 23:59:30 UTC
const MAY_31_LAST_MINUTE: u32 = 1_748_735_970;

#[test]
fn month_change_moves_block_to_new_slot() {
    let mut rig = Rig::new(MAY_31_LAST_MINUTE);
    let pins = rig.ctl.config().pins;
    assert_eq!(rig.ctl.persist().active_index(), block_index(5, 1));

    rig.ctl.handle_opcode(0x11);
    rig.ctl.hw_mut().set_level(pins.meter_pulse, false);
    rig.wake_by(WakeCause::MeterPulse);
    rig.ctl.run_cycle();
    let may_block = rig.ctl.persist().block();
    assert_eq!(may_block.day_gallons, 1);

    rig.advance(60);
    rig.ctl.run_cycle();

    assert_eq!(rig.ctl.persist().active_index(), block_index(6, 1));
    assert_eq!(rig.ctl.persist().block(), may_block);
    assert_eq!(rig.ctl.persist().valve(), ValvePosition::Open);
}

#[test]
fn first_pulse_of_new_day_restarts_daily_total() {
    let mut rig = Rig::new(MAY_31_LAST_MINUTE);

    rig.pulse();
    rig.advance(10);
    rig.pulse();
    assert_eq!(rig.ctl.persist().block().day_gallons, 2);

    rig.advance(60);
    assert_eq!(rig.pulse(), CycleAction::MeterPulse);
    let block = rig.ctl.persist().block();
    assert_eq!(block.day_gallons, 1);
    assert_eq!(block.day_of_month, 1);
    assert_eq!(block.last_pulse_epoch, rig.now());
}

#[test]
fn pulse_cycle_commits_the_block_once() {
    let mut rig = Rig::new(MAY_31_LAST_MINUTE);
    let before = rig.ctl.persist().store().commits;
    let writes = rig.ctl.persist().store().writes;

    assert_eq!(rig.pulse(), CycleAction::MeterPulse);

    assert_eq!(rig.ctl.persist().store().commits, before + 1);
    assert!(rig.ctl.persist().store().writes > writes);
}

#[test]
fn host_adapters_end_to_end() {
    let dir = std::env::temp_dir().join(format!("flowguard-e2e-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);

    let start = 1_748_736_000; // 2025-06-01
    let clock = MockClock {
        epoch: Rc::new(Cell::new(start)),
    };
    let config = SystemConfig {
        coordinator_addr: 0x0013_A200_400A_0127,
        ..SystemConfig::default()
    };
    let latch: &'static WakeLatch = Box::leak(Box::new(WakeLatch::new()));
    let mut ctl = Controller::new(
        config.clone(),
        PeripheralArbiter::new(clock, FsStorage::new(&dir)),
        NvsAdapter::new().unwrap(),
        XbeeRadio::new(),
        HardwareAdapter::new(config.pins),
        latch,
    );
    ctl.start();

    ctl.handle_opcode(0x11);

    let log = std::fs::read(dir.join("log_06_25.bin")).unwrap();
    assert_eq!(log, entry(0x11, start));

    let mut want = [0u8; TX_FRAME_MAX];
    let n = encode_tx_request(1, config.coordinator_addr, &entry(0x11, start), &mut want).unwrap();
    let sent = ctl.radio().transceiver().sent_frames();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0], want[..n]);

    // Inbound command through the same UART loopback.
    let mut rx = vec![0x7E, 0x00, 0x0D, 0x90];
    rx.extend_from_slice(&config.coordinator_addr.to_be_bytes());
    rx.extend_from_slice(&[0xFF, 0xFE, 0x01, 0x12, 0x00]);
    ctl.radio_mut().transceiver_mut().inject(&rx);
    latch.arm();
    latch.record(WakeCause::RadioReady);
    assert_eq!(ctl.run_cycle(), CycleAction::RadioReady);

    assert_eq!(ctl.persist().valve(), ValvePosition::Closed);
    assert_eq!(ctl.radio().transceiver().sent_frames().len(), 2);

    let _ = std::fs::remove_dir_all(&dir);
}
