//! File-backed [`StorageMedium`] for the event log.
//!
//! Region files live under a root directory:
//!
//! - **`target_os = "espidf"`**: a wear-levelled FAT partition mounted at
//!   [`MOUNT_POINT`] on the first `begin()`. Region names are longer than
//!   8.3, so the build needs `CONFIG_FATFS_LFN_HEAP`.
//! - **`not(target_os = "espidf")`**: any host directory, for simulation
//!   and tests.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use log::{debug, info, warn};

use crate::app::ports::{FileMode, StorageError, StorageMedium};

/// VFS path of the log partition.
pub const MOUNT_POINT: &str = "/flowguard";

#[cfg(target_os = "espidf")]
const PARTITION_LABEL: &[u8] = b"storage\0";

enum OpenFile {
    Reader(BufReader<File>),
    Writer(File),
}

pub struct FsStorage {
    root: PathBuf,
    file: Option<OpenFile>,
    mounted: bool,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            file: None,
            mounted: false,
        }
    }

    /// Storage on the on-board FAT partition.
    pub fn on_flash() -> Self {
        Self::new(MOUNT_POINT)
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    #[cfg(target_os = "espidf")]
    fn mount(&mut self) -> Result<(), StorageError> {
        use esp_idf_svc::sys::*;

        let mut base = [0u8; 16];
        let len = MOUNT_POINT.len().min(15);
        base[..len].copy_from_slice(&MOUNT_POINT.as_bytes()[..len]);

        // SAFETY: zeroed is a valid mount config; the fields we rely on are
        // set explicitly below.
        let mut cfg: esp_vfs_fat_mount_config_t = unsafe { core::mem::zeroed() };
        cfg.format_if_mount_failed = true;
        cfg.max_files = 2;
        cfg.allocation_unit_size = 4096;

        let mut wl_handle: wl_handle_t = 0;
        // SAFETY: both strings are NUL-terminated and outlive the call;
        // mounting happens once from the main task.
        let ret = unsafe {
            esp_vfs_fat_spiflash_mount_rw_wl(
                base.as_ptr() as *const _,
                PARTITION_LABEL.as_ptr() as *const _,
                &cfg,
                &mut wl_handle,
            )
        };
        if ret != ESP_OK as i32 {
            warn!("FsStorage: FAT mount failed (rc={})", ret);
            return Err(StorageError::MediumAbsent);
        }
        info!("FsStorage: FAT mounted at {}", MOUNT_POINT);
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn mount(&mut self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).map_err(|e| {
            warn!("FsStorage: cannot create {}: {}", self.root.display(), e);
            StorageError::MediumAbsent
        })?;
        info!("FsStorage: using {}", self.root.display());
        Ok(())
    }
}

impl StorageMedium for FsStorage {
    fn begin(&mut self) -> Result<(), StorageError> {
        self.close();
        if !self.mounted {
            self.mount()?;
            self.mounted = true;
        }
        Ok(())
    }

    fn open(&mut self, name: &str, mode: FileMode) -> Result<(), StorageError> {
        self.close();
        let path = self.root.join(name);
        let opened = match mode {
            FileMode::Read => File::open(&path).map(|f| OpenFile::Reader(BufReader::new(f))),
            FileMode::Write => OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map(OpenFile::Writer),
        };
        match opened {
            Ok(file) => {
                debug!("FsStorage: opened {} ({:?})", name, mode);
                self.file = Some(file);
                Ok(())
            }
            Err(e) => {
                warn!("FsStorage: open {} failed: {}", name, e);
                Err(StorageError::OpenFailed)
            }
        }
    }

    fn read_byte(&mut self) -> Option<u8> {
        let Some(OpenFile::Reader(reader)) = &mut self.file else {
            return None;
        };
        let mut byte = [0u8; 1];
        match reader.read(&mut byte) {
            Ok(1) => Some(byte[0]),
            _ => None,
        }
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), StorageError> {
        let Some(OpenFile::Writer(file)) = &mut self.file else {
            return Err(StorageError::WriteFailed);
        };
        file.write_all(&[byte]).map_err(|e| {
            warn!("FsStorage: write failed: {}", e);
            StorageError::WriteFailed
        })
    }

    fn seek(&mut self, pos: u32) -> bool {
        let Some(OpenFile::Reader(reader)) = &mut self.file else {
            return false;
        };
        let len = match reader.get_ref().metadata() {
            Ok(meta) => meta.len(),
            Err(_) => return false,
        };
        if u64::from(pos) > len {
            return false;
        }
        reader.seek(SeekFrom::Start(u64::from(pos))).is_ok()
    }

    fn close(&mut self) {
        if let Some(OpenFile::Writer(mut file)) = self.file.take() {
            if let Err(e) = file.flush() {
                warn!("FsStorage: flush on close failed: {}", e);
            }
        }
    }

    fn exists(&mut self, name: &str) -> bool {
        self.root.join(name).is_file()
    }

    fn remove(&mut self, name: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.root.join(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
            Err(e) => {
                warn!("FsStorage: remove {} failed: {}", name, e);
                Err(StorageError::WriteFailed)
            }
        }
    }
}
