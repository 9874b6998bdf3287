//! Durable state: the wear-levelled block and the month-partitioned event log.
//!
//! [`PersistentLog`] owns the byte store and reaches the clock and storage
//! medium only through the [`PeripheralArbiter`]. It keeps three things
//! across power loss:
//!
//! - the active [`RotatingBlock`] (valve, leak and flow counters),
//! - the report cursor: how far into the report region the coordinator has
//!   been sent,
//! - the report region itself, which lags behind the current month until a
//!   report drains it.
//!
//! Every public mutation ends with one [`ByteStore::commit`], so a block or
//! header update reaches the store as a unit.

pub mod block;
pub mod event_log;

use log::{debug, info, warn};

use crate::app::ports::{ByteStore, ClockDevice, FileMode, StorageError, StorageMedium};
use crate::bus::PeripheralArbiter;
use crate::time::CalendarTime;

use block::{
    BLOCK_LEN, HDR_ACTIVE_INDEX, HDR_CURSOR, HDR_REPORT_MONTH, HDR_REPORT_YEAR, RotatingBlock,
    ValvePosition, block_index, field_addr, is_valid_index,
};
use event_log::{LogEntry, RegionId};

/// Read position of a report in progress.
///
/// Streaming only moves the mark. [`PersistentLog::commit_report`] makes it
/// durable once the bytes up to it have actually been sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportMark {
    pub region: RegionId,
    pub cursor: u16,
    /// An earlier region that was read to its end on the way here.
    pub drained: Option<RegionId>,
}

pub struct PersistentLog<E> {
    store: E,
    /// Slot of the live block; 0 until [`boot`](Self::boot) has run.
    active: u8,
}

impl<E: ByteStore> PersistentLog<E> {
    pub fn new(store: E) -> Self {
        Self { store, active: 0 }
    }

    pub fn store(&self) -> &E {
        &self.store
    }

    // ── Header / block lifecycle ──────────────────────────────

    /// Load the header, initialising it on first boot.
    ///
    /// A stored index outside `1..=15` means the store was never written:
    /// the block for the current month is zeroed and the cursor reset.
    pub fn boot(&mut self, now: &CalendarTime) {
        let stored = self.store.read_byte(HDR_ACTIVE_INDEX);
        if is_valid_index(stored) {
            self.active = stored;
            debug!("persist: active block {}", stored);
        } else {
            let idx = block_index(now.month, now.year_parity());
            info!("persist: initialising block {} (stored index {})", idx, stored);
            self.active = idx;
            self.write_block(&RotatingBlock::default());
            self.put(HDR_ACTIVE_INDEX, idx);
            self.set_cursor(0);
        }
        if self.report_region().is_none() {
            self.set_report_region(RegionId::of(now));
        }
        self.store.commit();
    }

    /// Move the live block to this month's slot. Returns `true` if it moved.
    pub fn rotate_if_needed(&mut self, now: &CalendarTime) -> bool {
        if !is_valid_index(self.active) {
            self.boot(now);
            return false;
        }
        let idx = block_index(now.month, now.year_parity());
        if idx == self.active {
            return false;
        }
        let block = self.read_raw(self.active);
        info!("persist: rotating block {} -> {}", self.active, idx);
        for (i, &b) in block.iter().enumerate() {
            self.put(field_addr(idx, i), b);
        }
        self.active = idx;
        self.put(HDR_ACTIVE_INDEX, idx);
        self.store.commit();
        true
    }

    pub fn active_index(&self) -> u8 {
        self.active
    }

    pub fn block(&self) -> RotatingBlock {
        RotatingBlock::from_bytes(&self.read_raw(self.active))
    }

    /// Write back `block`, touching only the bytes that changed, as one
    /// commit.
    pub fn store_block(&mut self, block: &RotatingBlock) {
        self.write_block(block);
        self.store.commit();
    }

    fn write_block(&mut self, block: &RotatingBlock) {
        for (i, b) in block.to_bytes().into_iter().enumerate() {
            self.put(field_addr(self.active, i), b);
        }
    }

    pub fn valve(&self) -> ValvePosition {
        self.block().valve()
    }

    pub fn set_valve(&mut self, position: ValvePosition) {
        let mut b = self.block();
        b.valve_position = position.as_u8();
        self.store_block(&b);
    }

    pub fn leak_condition(&self) -> u8 {
        self.block().leak_condition
    }

    pub fn set_leak_condition(&mut self, code: u8) {
        let mut b = self.block();
        b.leak_condition = code;
        self.store_block(&b);
    }

    /// Zero the leak condition and both gallon counters.
    pub fn reset_counters(&mut self) {
        let mut b = self.block();
        b.leak_condition = 0;
        b.day_gallons = 0;
        b.consecutive_gallons = 0;
        self.store_block(&b);
    }

    // ── Report cursor / region ────────────────────────────────

    pub fn cursor(&self) -> u16 {
        u16::from_be_bytes([
            self.store.read_byte(HDR_CURSOR),
            self.store.read_byte(HDR_CURSOR + 1),
        ])
    }

    fn set_cursor(&mut self, cursor: u16) {
        let [hi, lo] = cursor.to_be_bytes();
        self.put(HDR_CURSOR, hi);
        self.put(HDR_CURSOR + 1, lo);
    }

    pub fn report_region(&self) -> Option<RegionId> {
        RegionId::from_header(
            self.store.read_byte(HDR_REPORT_MONTH),
            self.store.read_byte(HDR_REPORT_YEAR),
        )
    }

    fn set_report_region(&mut self, region: RegionId) {
        self.put(HDR_REPORT_MONTH, region.month);
        self.put(HDR_REPORT_YEAR, region.year);
    }

    // ── Event log ─────────────────────────────────────────────

    /// Append `code` stamped with the current time to this month's region.
    /// Returns the epoch written.
    pub fn append<C: ClockDevice, S: StorageMedium>(
        &mut self,
        bus: &mut PeripheralArbiter<C, S>,
        code: u8,
    ) -> Result<u32, StorageError> {
        let now = bus.now();
        let entry = LogEntry {
            code,
            epoch: now.to_epoch(),
        };
        let name = RegionId::of(&now).name();
        let file = bus.storage(&name, FileMode::Write)?;
        for b in entry.encode() {
            file.write_byte(b)?;
        }
        debug!("log: {} <- 0x{:02X} @ {}", name, code, entry.epoch);
        Ok(entry.epoch)
    }

    /// Where the next report starts: the persisted region and cursor.
    pub fn report_mark<C: ClockDevice, S: StorageMedium>(
        &self,
        bus: &mut PeripheralArbiter<C, S>,
    ) -> ReportMark {
        ReportMark {
            region: self
                .report_region()
                .unwrap_or_else(|| RegionId::of(&bus.now())),
            cursor: self.cursor(),
            drained: None,
        }
    }

    /// Hand up to `max` bytes from `mark` to `sink`, moving the mark.
    ///
    /// When the mark's region is drained and lies in an earlier month, the
    /// mark moves to the current month at offset 0 and carries on there.
    /// A missing region streams as empty. Returns the number of bytes
    /// handed out. Nothing is persisted.
    pub fn stream_unreported<C: ClockDevice, S: StorageMedium>(
        &self,
        bus: &mut PeripheralArbiter<C, S>,
        mark: &mut ReportMark,
        max: usize,
        mut sink: impl FnMut(u8),
    ) -> Result<usize, StorageError> {
        let current = RegionId::of(&bus.now());
        let mut sent = 0;
        stream_regions(bus, current, mark, max, &mut sent, &mut sink)?;
        Ok(sent)
    }

    /// Persist `mark` as the new report position and delete the region it
    /// drained, if any.
    pub fn commit_report<C: ClockDevice, S: StorageMedium>(
        &mut self,
        bus: &mut PeripheralArbiter<C, S>,
        mark: &mut ReportMark,
    ) {
        self.set_report_region(mark.region);
        self.set_cursor(mark.cursor);
        self.store.commit();

        if let Some(old) = mark.drained.take() {
            let name = old.name();
            match bus.remove(&name) {
                Ok(()) => info!("log: removed drained {}", name),
                Err(StorageError::NotFound) => {}
                Err(e) => warn!("log: cannot remove drained {}: {}", name, e),
            }
        }
    }

    /// Delete the report region and restart reporting at the current month.
    pub fn clear<C: ClockDevice, S: StorageMedium>(
        &mut self,
        bus: &mut PeripheralArbiter<C, S>,
    ) -> Result<(), StorageError> {
        let current = RegionId::of(&bus.now());
        if let Some(region) = self.report_region() {
            let name = region.name();
            if bus.exists(&name)? {
                bus.remove(&name)?;
                info!("log: removed {}", name);
            }
        }
        self.set_report_region(current);
        self.set_cursor(0);
        self.store.commit();
        Ok(())
    }

    // ── Internal ──────────────────────────────────────────────

    fn read_raw(&self, index: u8) -> [u8; BLOCK_LEN] {
        let mut raw = [0u8; BLOCK_LEN];
        for (i, b) in raw.iter_mut().enumerate() {
            *b = self.store.read_byte(field_addr(index, i));
        }
        raw
    }

    fn put(&mut self, addr: u16, value: u8) {
        if self.store.read_byte(addr) != value {
            self.store.write_byte(addr, value);
        }
    }
}

fn stream_regions<C: ClockDevice, S: StorageMedium>(
    bus: &mut PeripheralArbiter<C, S>,
    current: RegionId,
    mark: &mut ReportMark,
    max: usize,
    sent: &mut usize,
    sink: &mut impl FnMut(u8),
) -> Result<(), StorageError> {
    loop {
        let name = mark.region.name();
        if bus.exists(&name)? {
            let file = bus.storage(&name, FileMode::Read)?;
            if file.seek(u32::from(mark.cursor)) {
                // The cursor saturates; a region past 64 KiB ends there.
                while *sent < max && mark.cursor < u16::MAX {
                    let Some(b) = file.read_byte() else { break };
                    sink(b);
                    *sent += 1;
                    mark.cursor += 1;
                }
            }
            if *sent >= max {
                return Ok(());
            }
        }
        if mark.region == current {
            return Ok(());
        }
        debug!("log: {} drained, reporting from {}", name, current.name());
        mark.drained = Some(mark.region);
        mark.region = current;
        mark.cursor = 0;
    }
}
