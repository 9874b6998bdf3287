//! Shared peripheral bus arbitration.
//!
//! The calendar clock and the storage medium sit on one bus and cannot be
//! driven at the same time. [`PeripheralArbiter`] owns both devices and
//! tracks who holds the bus; every access goes through it, and switching
//! owner closes whatever file is open and re-initialises the new device.
//!
//! ```text
//!           clock()                storage(f, m)
//!   Idle ───────────▶ Clock ◀──────────────────────▶ Storage{f, m}
//!    ▲                                                    │
//!    └──────────────────── any error ─────────────────────┘
//! ```

use heapless::String;
use log::debug;

use crate::app::ports::{ClockDevice, FileMode, StorageError, StorageMedium};
use crate::time::CalendarTime;

/// Region file names are `log_MM_YY.bin`.
pub type FileName = String<16>;

/// Current holder of the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusOwner {
    Idle,
    Clock,
    Storage { file: FileName, mode: FileMode },
}

pub struct PeripheralArbiter<C, S> {
    clock: C,
    storage: S,
    owner: BusOwner,
}

impl<C: ClockDevice, S: StorageMedium> PeripheralArbiter<C, S> {
    pub fn new(clock: C, storage: S) -> Self {
        Self {
            clock,
            storage,
            owner: BusOwner::Idle,
        }
    }

    pub fn owner(&self) -> &BusOwner {
        &self.owner
    }

    /// The storage device itself, bypassing arbitration.
    pub fn medium_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Acquire the bus for the clock.
    pub fn clock(&mut self) -> &mut C {
        if self.owner != BusOwner::Clock {
            if let BusOwner::Storage { file, .. } = &self.owner {
                debug!("bus: {} -> clock", file);
                self.storage.close();
            }
            self.clock.init();
            self.owner = BusOwner::Clock;
        }
        &mut self.clock
    }

    /// Read the calendar time through the bus.
    pub fn now(&mut self) -> CalendarTime {
        self.clock().now()
    }

    /// Acquire the bus for storage with `file` open in `mode`.
    pub fn storage(&mut self, file: &str, mode: FileMode) -> Result<&mut S, StorageError> {
        let held = matches!(
            &self.owner,
            BusOwner::Storage { file: f, mode: m } if f.as_str() == file && *m == mode
        );
        if !held {
            self.begin_storage()?;
            if let Err(e) = self.storage.open(file, mode) {
                self.owner = BusOwner::Idle;
                return Err(e);
            }
            let mut name = FileName::new();
            if name.push_str(file).is_err() {
                self.storage.close();
                self.owner = BusOwner::Idle;
                return Err(StorageError::OpenFailed);
            }
            self.owner = BusOwner::Storage { file: name, mode };
        }
        Ok(&mut self.storage)
    }

    /// Whether `file` exists on the medium. Closes any open file first.
    pub fn exists(&mut self, file: &str) -> Result<bool, StorageError> {
        self.begin_storage()?;
        let found = self.storage.exists(file);
        self.owner = BusOwner::Idle;
        Ok(found)
    }

    /// Delete `file`. Closes any open file first.
    pub fn remove(&mut self, file: &str) -> Result<(), StorageError> {
        self.begin_storage()?;
        let result = self.storage.remove(file);
        self.owner = BusOwner::Idle;
        result
    }

    /// Release the bus, closing any open file.
    pub fn release(&mut self) {
        if matches!(self.owner, BusOwner::Storage { .. }) {
            self.storage.close();
        }
        self.owner = BusOwner::Idle;
    }

    /// Close any open handle and re-initialise the medium.
    fn begin_storage(&mut self) -> Result<(), StorageError> {
        if let BusOwner::Storage { file, .. } = &self.owner {
            debug!("bus: closing {}", file);
            self.storage.close();
        } else {
            debug!("bus: {:?} -> storage", self.owner);
        }
        if let Err(e) = self.storage.begin() {
            self.owner = BusOwner::Idle;
            return Err(e);
        }
        Ok(())
    }
}
