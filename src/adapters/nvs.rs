//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`ByteStore`] for FlowGuard.
//!
//! - The byte store is a 256-byte RAM shadow persisted as a single NVS
//!   blob. Writes only touch the shadow; `commit()` stores the whole blob
//!   once, so a block update lands in flash all at once or not at all.
//! - Config is a postcard blob, range-checked before it is written.
//! - ESP-IDF NVS commits are atomic per `nvs_commit()`.

use crate::app::ports::{ByteStore, ConfigError, ConfigPort};
use crate::config::SystemConfig;
use log::{info, warn};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const NAMESPACE: &str = "flowguard";
const CONFIG_KEY: &str = "syscfg";
const BLOCKS_KEY: &str = "blocks";

/// Size of the byte-addressable shadow. Covers the header slot and all
/// rotating blocks.
pub const BYTE_STORE_LEN: usize = 256;

#[cfg(target_os = "espidf")]
const MAX_BLOB_SIZE: usize = 512;

pub struct NvsAdapter {
    shadow: [u8; BYTE_STORE_LEN],
    dirty: bool,
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Initialise NVS flash and load the byte store shadow.
    ///
    /// On first boot or after a version mismatch the NVS partition is
    /// erased and re-initialised. A missing blob leaves the shadow zeroed.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any other NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES as i32 || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as i32 {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK as i32 {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK as i32 {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK as i32 {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        let mut adapter = Self {
            shadow: [0; BYTE_STORE_LEN],
            dirty: false,
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        };
        adapter.load_shadow();
        Ok(adapter)
    }

    fn load_shadow(&mut self) {
        let mut buf = [0u8; BYTE_STORE_LEN];
        match self.read_blob(BLOCKS_KEY, &mut buf) {
            Ok(Some(n)) => {
                self.shadow[..n].copy_from_slice(&buf[..n]);
                info!("NvsAdapter: loaded {} state bytes", n);
            }
            Ok(None) => info!("NvsAdapter: no stored state, starting blank"),
            Err(e) => warn!("NvsAdapter: state read error {}, starting blank", e),
        }
    }

    /// Whether the shadow holds writes that have not been committed.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    // ── Blob access ───────────────────────────────────────────

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(key: &str) -> String {
        format!("{}::{}", NAMESPACE, key)
    }

    /// Copy the blob `key` into `buf`. `Ok(None)` when it does not exist.
    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self, key: &str, buf: &mut [u8]) -> Result<Option<usize>, i32> {
        Ok(self.store.borrow().get(&Self::composite_key(key)).map(|data| {
            let len = data.len().min(buf.len());
            buf[..len].copy_from_slice(&data[..len]);
            len
        }))
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_blob(&self, key: &str, data: &[u8]) -> Result<(), i32> {
        self.store
            .borrow_mut()
            .insert(Self::composite_key(key), data.to_vec());
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn read_blob(&self, key: &str, buf: &mut [u8]) -> Result<Option<usize>, i32> {
        let key_buf = c_key(key);
        let result = Self::with_nvs_handle(NAMESPACE, false, |handle| {
            let mut size = buf.len();
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    key_buf.as_ptr() as *const _,
                    buf.as_mut_ptr() as *mut _,
                    &mut size,
                )
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            Ok(size)
        });
        match result {
            Ok(size) => Ok(Some(size)),
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND as i32 => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[cfg(target_os = "espidf")]
    fn write_blob(&self, key: &str, data: &[u8]) -> Result<(), i32> {
        let key_buf = c_key(key);
        Self::with_nvs_handle(NAMESPACE, true, |handle| {
            let ret = unsafe {
                nvs_set_blob(
                    handle,
                    key_buf.as_ptr() as *const _,
                    data.as_ptr() as *const _,
                    data.len(),
                )
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            Ok(())
        })
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns_buf = c_key(namespace);
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns_buf.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK as i32 {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }
}

/// NUL-terminated copy of an NVS key (15 chars max).
#[cfg(target_os = "espidf")]
fn c_key(key: &str) -> [u8; 16] {
    let mut buf = [0u8; 16];
    let bytes = key.as_bytes();
    let len = bytes.len().min(15);
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

impl ByteStore for NvsAdapter {
    fn read_byte(&self, addr: u16) -> u8 {
        self.shadow.get(usize::from(addr)).copied().unwrap_or(0)
    }

    fn write_byte(&mut self, addr: u16, value: u8) {
        let Some(cell) = self.shadow.get_mut(usize::from(addr)) else {
            warn!("NvsAdapter: write past end of byte store (addr {})", addr);
            return;
        };
        if *cell != value {
            *cell = value;
            self.dirty = true;
        }
    }

    fn commit(&mut self) {
        if !self.dirty {
            return;
        }
        match self.write_blob(BLOCKS_KEY, &self.shadow) {
            Ok(()) => self.dirty = false,
            // Stays dirty; the next commit retries.
            Err(e) => warn!("NvsAdapter: state write error {}", e),
        }
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        #[cfg(not(target_os = "espidf"))]
        let stored = self.store.borrow().get(&Self::composite_key(CONFIG_KEY)).cloned();

        #[cfg(target_os = "espidf")]
        let stored = {
            let mut buf = vec![0u8; MAX_BLOB_SIZE];
            match self.read_blob(CONFIG_KEY, &mut buf) {
                Ok(Some(n)) => {
                    buf.truncate(n);
                    Some(buf)
                }
                Ok(None) => None,
                Err(e) => {
                    warn!("NvsAdapter: NVS read error {}, using defaults", e);
                    None
                }
            }
        };

        match stored {
            Some(bytes) => {
                let cfg: SystemConfig =
                    postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
                cfg.validate()?;
                info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
                Ok(cfg)
            }
            None => {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(SystemConfig::default())
            }
        }
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        match self.write_blob(CONFIG_KEY, &bytes) {
            Ok(()) => {
                info!("NvsAdapter: config saved ({} bytes)", bytes.len());
                Ok(())
            }
            Err(e) => {
                warn!("NvsAdapter: NVS write error {}", e);
                Err(ConfigError::IoError)
            }
        }
    }
}
