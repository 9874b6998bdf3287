//! Mock adapters for integration tests.
//!
//! Clock and storage state sit behind `Rc` handles so tests can move the
//! clock and inspect region files after the mocks have been moved into the
//! controller. Everything else is reached through the controller's
//! accessors.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use flowguard::app::ports::{
    ByteStore, ClockDevice, DigitalIo, FileMode, LowPower, StorageError, StorageMedium,
    Transceiver,
};
use flowguard::app::service::Controller;
use flowguard::bus::PeripheralArbiter;
use flowguard::config::SystemConfig;
use flowguard::events::{WakeCause, WakeLatch};
use flowguard::power::CycleAction;
use flowguard::radio::frame::{FRAME_HEADER_LEN, FRAME_TYPE_RX_PACKET, START_DELIMITER};
use flowguard::time::CalendarTime;

// ── Clock ─────────────────────────────────────────────────────

#[derive(Clone)]
pub struct MockClock {
    pub epoch: Rc<Cell<u32>>,
}

impl ClockDevice for MockClock {
    fn init(&mut self) {}

    fn now(&mut self) -> CalendarTime {
        CalendarTime::from_epoch(self.epoch.get())
    }
}

// ── Storage medium ────────────────────────────────────────────

pub type Files = Rc<RefCell<HashMap<String, Vec<u8>>>>;

pub struct MockMedium {
    pub files: Files,
    pub present: bool,
    open: Option<(String, FileMode)>,
    pos: usize,
}

impl MockMedium {
    pub fn new(files: Files) -> Self {
        Self {
            files,
            present: true,
            open: None,
            pos: 0,
        }
    }
}

impl StorageMedium for MockMedium {
    fn begin(&mut self) -> Result<(), StorageError> {
        if self.present {
            Ok(())
        } else {
            Err(StorageError::MediumAbsent)
        }
    }

    fn open(&mut self, name: &str, mode: FileMode) -> Result<(), StorageError> {
        let mut files = self.files.borrow_mut();
        match mode {
            FileMode::Read if !files.contains_key(name) => return Err(StorageError::OpenFailed),
            FileMode::Read => {}
            FileMode::Write => {
                files.entry(name.to_string()).or_default();
            }
        }
        self.open = Some((name.to_string(), mode));
        self.pos = 0;
        Ok(())
    }

    fn read_byte(&mut self) -> Option<u8> {
        let Some((name, FileMode::Read)) = &self.open else {
            return None;
        };
        let b = self.files.borrow().get(name)?.get(self.pos).copied()?;
        self.pos += 1;
        Some(b)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), StorageError> {
        match &self.open {
            Some((name, FileMode::Write)) => {
                self.files
                    .borrow_mut()
                    .get_mut(name)
                    .ok_or(StorageError::WriteFailed)?
                    .push(byte);
                Ok(())
            }
            _ => Err(StorageError::WriteFailed),
        }
    }

    fn seek(&mut self, pos: u32) -> bool {
        let Some((name, FileMode::Read)) = &self.open else {
            return false;
        };
        let len = self.files.borrow().get(name).map_or(0, Vec::len);
        if pos as usize > len {
            return false;
        }
        self.pos = pos as usize;
        true
    }

    fn close(&mut self) {
        self.open = None;
    }

    fn exists(&mut self, name: &str) -> bool {
        self.files.borrow().contains_key(name)
    }

    fn remove(&mut self, name: &str) -> Result<(), StorageError> {
        self.files
            .borrow_mut()
            .remove(name)
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }
}

// ── Byte store ────────────────────────────────────────────────

pub struct MockStore {
    pub bytes: [u8; 256],
    pub writes: usize,
    pub commits: usize,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            bytes: [0; 256],
            writes: 0,
            commits: 0,
        }
    }
}

impl ByteStore for MockStore {
    fn read_byte(&self, addr: u16) -> u8 {
        self.bytes.get(addr as usize).copied().unwrap_or(0)
    }

    fn write_byte(&mut self, addr: u16, value: u8) {
        self.writes += 1;
        self.bytes[addr as usize] = value;
    }

    fn commit(&mut self) {
        self.commits += 1;
    }
}

// ── Radio ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockRadio {
    pub sent: Vec<(u64, Vec<u8>)>,
    pub inbound: VecDeque<u8>,
    pub fail: bool,
}

impl Transceiver for MockRadio {
    type Error = ();

    fn send(&mut self, dest: u64, payload: &[u8]) -> Result<(), ()> {
        if self.fail {
            return Err(());
        }
        self.sent.push((dest, payload.to_vec()));
        Ok(())
    }

    fn poll_byte(&mut self, _wait_ms: u32) -> Option<u8> {
        self.inbound.pop_front()
    }
}

impl MockRadio {
    /// Payloads only, destination dropped.
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.sent.iter().map(|(_, p)| p.clone()).collect()
    }
}

/// A receive-packet frame carrying `payload`, checksum included.
pub fn rx_frame(payload: &[u8]) -> Vec<u8> {
    let len = FRAME_HEADER_LEN + payload.len() as u16;
    let mut f = vec![START_DELIMITER, (len >> 8) as u8, len as u8, FRAME_TYPE_RX_PACKET];
    f.extend_from_slice(&[0x00, 0x13, 0xA2, 0x00, 0x40, 0x0A, 0x01, 0x27]);
    f.extend_from_slice(&[0xFF, 0xFE, 0x01]);
    f.extend_from_slice(payload);
    let sum = f[3..].iter().fold(0u8, |a, &b| a.wrapping_add(b));
    f.push(0xFF - sum);
    f
}

// ── GPIO / sleep / delay ──────────────────────────────────────

pub struct MockHw {
    levels: HashMap<u8, bool>,
    pub writes: Vec<(u8, bool)>,
    pub halts: Vec<u32>,
    pub naps: Vec<u32>,
    pub delayed_ms: u64,
    pub meter_wake_on_release: bool,
}

#[allow(dead_code)]
impl MockHw {
    /// All inputs idle high except CTS, which the radio asserts at once.
    pub fn new() -> Self {
        let mut levels = HashMap::new();
        levels.insert(SystemConfig::default().pins.radio_cts, false);
        Self {
            levels,
            writes: Vec::new(),
            halts: Vec::new(),
            naps: Vec::new(),
            delayed_ms: 0,
            meter_wake_on_release: false,
        }
    }

    pub fn set_level(&mut self, pin: u8, high: bool) {
        self.levels.insert(pin, high);
    }

    pub fn level(&self, pin: u8) -> bool {
        self.levels.get(&pin).copied().unwrap_or(true)
    }
}

impl DigitalIo for MockHw {
    fn read(&mut self, pin: u8) -> bool {
        self.level(pin)
    }

    fn write(&mut self, pin: u8, high: bool) {
        self.writes.push((pin, high));
        self.levels.insert(pin, high);
    }
}

impl LowPower for MockHw {
    fn halt(&mut self, max_ms: u32) {
        self.halts.push(max_ms);
    }

    fn nap(&mut self, ms: u32) {
        self.naps.push(ms);
    }

    fn set_meter_wake(&mut self, on_release: bool) {
        self.meter_wake_on_release = on_release;
    }
}

impl DelayNs for MockHw {
    fn delay_ns(&mut self, ns: u32) {
        self.delayed_ms += u64::from(ns / 1_000_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delayed_ms += u64::from(ms);
    }
}

// ── Rig ───────────────────────────────────────────────────────

pub type TestController = Controller<MockClock, MockMedium, MockStore, MockRadio, MockHw>;

/// A started controller plus handles on the shared mock state.
pub struct Rig {
    pub ctl: TestController,
    pub clock: Rc<Cell<u32>>,
    pub files: Files,
    pub latch: &'static WakeLatch,
}

#[allow(dead_code)]
impl Rig {
    pub fn new(start_epoch: u32) -> Self {
        Self::with_config(SystemConfig::default(), start_epoch)
    }

    pub fn with_config(config: SystemConfig, start_epoch: u32) -> Self {
        let clock = Rc::new(Cell::new(start_epoch));
        let files: Files = Rc::new(RefCell::new(HashMap::new()));
        // Each rig gets its own latch so tests can run in parallel.
        let latch: &'static WakeLatch = Box::leak(Box::new(WakeLatch::new()));
        let bus = PeripheralArbiter::new(
            MockClock {
                epoch: clock.clone(),
            },
            MockMedium::new(files.clone()),
        );
        let mut ctl = Controller::new(
            config,
            bus,
            MockStore::new(),
            MockRadio::default(),
            MockHw::new(),
            latch,
        );
        ctl.start();
        ctl.hw_mut().writes.clear();
        Self {
            ctl,
            clock,
            files,
            latch,
        }
    }

    pub fn advance(&self, secs: u32) {
        self.clock.set(self.clock.get() + secs);
    }

    pub fn now(&self) -> u32 {
        self.clock.get()
    }

    /// Simulate an ISR edge during the halt.
    pub fn wake_by(&self, cause: WakeCause) {
        self.latch.arm();
        self.latch.record(cause);
    }

    /// One full meter pulse: the falling edge, then the release. Returns
    /// what the falling edge's cycle did.
    pub fn pulse(&mut self) -> CycleAction {
        let meter = self.ctl.config().pins.meter_pulse;
        self.ctl.hw_mut().set_level(meter, false);
        self.wake_by(WakeCause::MeterPulse);
        let action = self.ctl.run_cycle();
        self.ctl.hw_mut().set_level(meter, true);
        self.wake_by(WakeCause::MeterPulse);
        self.ctl.run_cycle();
        action
    }

    pub fn file(&self, name: &str) -> Option<Vec<u8>> {
        self.files.borrow().get(name).cloned()
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.ctl.radio().transceiver().payloads()
    }
}

/// `code` followed by the big-endian epoch.
pub fn entry(code: u8, epoch: u32) -> Vec<u8> {
    let mut v = vec![code];
    v.extend_from_slice(&epoch.to_be_bytes());
    v
}
