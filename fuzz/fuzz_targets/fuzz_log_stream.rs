//! Fuzz target: event log cursor over arbitrary region contents
//!
//! Seeds a region file with arbitrary bytes and a byte store with an
//! arbitrary header, then streams in small chunks. The mark must only
//! move forward, the header must only follow it on commit, and every byte
//! must be handed out exactly once.
//!
//! cargo fuzz run fuzz_log_stream

#![no_main]

use flowguard::app::ports::{ByteStore, ClockDevice, FileMode, StorageError, StorageMedium};
use flowguard::bus::PeripheralArbiter;
use flowguard::persist::PersistentLog;
use flowguard::persist::block::block_index;
use flowguard::time::CalendarTime;
use libfuzzer_sys::fuzz_target;

struct FixedClock;

impl ClockDevice for FixedClock {
    fn init(&mut self) {}
    fn now(&mut self) -> CalendarTime {
        CalendarTime::new(2025, 6, 15, 12, 0, 0)
    }
}

struct OneFile {
    data: Vec<u8>,
    pos: usize,
    present: bool,
}

impl StorageMedium for OneFile {
    fn begin(&mut self) -> Result<(), StorageError> {
        Ok(())
    }
    fn open(&mut self, _name: &str, _mode: FileMode) -> Result<(), StorageError> {
        if !self.present {
            return Err(StorageError::OpenFailed);
        }
        self.pos = 0;
        Ok(())
    }
    fn read_byte(&mut self) -> Option<u8> {
        let b = self.data.get(self.pos).copied()?;
        self.pos += 1;
        Some(b)
    }
    fn write_byte(&mut self, byte: u8) -> Result<(), StorageError> {
        self.data.push(byte);
        Ok(())
    }
    fn seek(&mut self, pos: u32) -> bool {
        if pos as usize > self.data.len() {
            return false;
        }
        self.pos = pos as usize;
        true
    }
    fn close(&mut self) {}
    fn exists(&mut self, name: &str) -> bool {
        self.present && name == "log_06_25.bin"
    }
    fn remove(&mut self, _name: &str) -> Result<(), StorageError> {
        self.present = false;
        Ok(())
    }
}

struct Ram([u8; 256]);

impl ByteStore for Ram {
    fn read_byte(&self, addr: u16) -> u8 {
        self.0.get(addr as usize).copied().unwrap_or(0)
    }
    fn write_byte(&mut self, addr: u16, value: u8) {
        if let Some(cell) = self.0.get_mut(addr as usize) {
            *cell = value;
        }
    }
}

fuzz_target!(|input: (u16, u8, Vec<u8>)| {
    let (cursor, chunk, mut data) = input;
    let chunk = usize::from(chunk.max(1));
    // Stay clear of the saturating end of the cursor.
    data.truncate(60_000);

    let mut store = Ram([0; 256]);
    store.0[0..2].copy_from_slice(&cursor.to_be_bytes());
    store.0[2] = block_index(6, 1);
    store.0[3] = 6;
    store.0[4] = 25;

    let mut bus = PeripheralArbiter::new(
        FixedClock,
        OneFile {
            data: data.clone(),
            pos: 0,
            present: true,
        },
    );
    let mut log = PersistentLog::new(store);
    log.boot(&CalendarTime::new(2025, 6, 15, 12, 0, 0));

    let start = usize::from(log.cursor());
    let mut mark = log.report_mark(&mut bus);
    let mut out = Vec::new();
    loop {
        let before = mark.cursor;
        let Ok(n) = log.stream_unreported(&mut bus, &mut mark, chunk, |b| out.push(b)) else {
            return;
        };
        assert!(mark.cursor >= before);
        assert_eq!(log.cursor(), before, "streaming alone persists nothing");
        log.commit_report(&mut bus, &mut mark);
        assert_eq!(log.cursor(), mark.cursor);
        if n < chunk {
            break;
        }
    }
    if start <= data.len() {
        assert_eq!(out, data[start..]);
    } else {
        assert!(out.is_empty());
    }
});
