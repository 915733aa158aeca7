//! rsdp-dummy - Emulated boot ROMs for testing
//!
//! This crate provides an in-memory USB "board" on which emulated SDP
//! devices can be plugged, unplugged and re-enumerated. It implements the
//! bus, hotplug and driver traits of `rsdp-core`, so whole runs can be
//! exercised without hardware.
//!
//! A jump makes the emulated device leave the bus; if it was configured
//! with [`DummyConfig::then`], its successor (e.g. the SPL's download
//! gadget) arrives at the same topology path, just like a real board.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use rsdp_core::{Arrival, DeviceStatus, HidBus, HotplugSource, SdpDriver};
use thiserror::Error;

/// HAB mode reported by default (open part)
pub const DEFAULT_HAB: u32 = 0x5678_7856;

/// Status word reported by default
pub const DEFAULT_STATUS: u32 = 0xf0f0_f0f0;

/// Errors of the emulated bus and devices
#[derive(Debug, Error)]
pub enum DummyError {
    #[error("no emulated device at {0}")]
    NotFound(String),
    #[error("device {0} is gone")]
    Disconnected(String),
    #[error("cannot read {}: {source}", .path.display())]
    File {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("write failed with status 0x{0:08x}")]
    WriteFailed(u32),
    #[error("jump rejected with status 0x{0:08x}")]
    JumpRejected(u32),
    #[error("status query failed")]
    StatusFailed,
    #[error("hotplug source not subscribed")]
    NotSubscribed,
}

/// Configuration of one emulated device
#[derive(Debug, Clone)]
pub struct DummyConfig {
    pub vid: u16,
    pub pid: u16,
    /// Topology path, e.g. `1-1`
    pub usb_path: String,
    /// HAB mode returned by status queries
    pub hab: u32,
    /// Status word returned by status queries
    pub status: u32,
    /// Fail status queries
    pub fail_status: bool,
    /// Fail every WRITE_FILE with this status
    pub fail_write: Option<u32>,
    /// Answer jumps with this status instead of jumping
    pub reject_jump: Option<u32>,
    /// Device that shows up after a successful jump
    pub next: Option<Box<DummyConfig>>,
}

impl DummyConfig {
    pub fn new(vid: u16, pid: u16, usb_path: &str) -> Self {
        Self {
            vid,
            pid,
            usb_path: usb_path.to_string(),
            hab: DEFAULT_HAB,
            status: DEFAULT_STATUS,
            fail_status: false,
            fail_write: None,
            reject_jump: None,
            next: None,
        }
    }

    /// Re-enumerate as `next` after jumping
    pub fn then(mut self, next: DummyConfig) -> Self {
        self.next = Some(Box::new(next));
        self
    }
}

/// Something that happened on the emulated board
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Open {
        access_path: String,
    },
    ErrorStatus {
        access_path: String,
    },
    WriteFile {
        access_path: String,
        address: u32,
        data: Vec<u8>,
    },
    Jump {
        access_path: String,
        address: u32,
    },
}

struct Plugged {
    access_path: String,
    config: DummyConfig,
}

#[derive(Default)]
struct BoardState {
    present: Vec<Plugged>,
    /// Devices that appear once something starts waiting
    deferred: VecDeque<DummyConfig>,
    arrivals: VecDeque<Arrival>,
    subscribed: bool,
    next_address: u8,
    operations: Vec<Operation>,
    open_handles: usize,
    max_open_handles: usize,
    open_id_calls: usize,
}

impl BoardState {
    fn plug(&mut self, config: DummyConfig) -> String {
        self.next_address += 1;
        let access_path = format!("1:{:03}", self.next_address);
        log::debug!(
            "Plugged {:04x}:{:04x} at {} ({})",
            config.vid,
            config.pid,
            access_path,
            config.usb_path
        );
        if self.subscribed {
            self.arrivals.push_back(Arrival {
                vid: config.vid,
                pid: config.pid,
                access_path: access_path.clone(),
                usb_path: Some(config.usb_path.clone()),
            });
        }
        self.present.push(Plugged {
            access_path: access_path.clone(),
            config,
        });
        access_path
    }

    fn plug_deferred(&mut self) {
        if let Some(config) = self.deferred.pop_front() {
            self.plug(config);
        }
    }

    fn find(&self, access_path: &str) -> Option<&Plugged> {
        self.present.iter().find(|p| p.access_path == access_path)
    }
}

/// An emulated USB bus with SDP devices on it
///
/// Cloning yields another handle to the same board.
#[derive(Clone, Default)]
pub struct DummyBoard {
    state: Rc<RefCell<BoardState>>,
}

impl DummyBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plug a device in now; returns its access path
    pub fn plug(&self, config: DummyConfig) -> String {
        self.state.borrow_mut().plug(config)
    }

    /// Plug a device in once a wait is in progress
    pub fn plug_later(&self, config: DummyConfig) {
        self.state.borrow_mut().deferred.push_back(config);
    }

    /// Remove a device from the bus
    pub fn unplug(&self, access_path: &str) {
        self.state
            .borrow_mut()
            .present
            .retain(|p| p.access_path != access_path);
    }

    pub fn bus(&self) -> DummyBus {
        DummyBus {
            board: self.clone(),
        }
    }

    pub fn hotplug(&self) -> DummyHotplug {
        DummyHotplug {
            board: self.clone(),
        }
    }

    /// Everything done on the board so far, in order
    pub fn operations(&self) -> Vec<Operation> {
        self.state.borrow().operations.clone()
    }

    /// Highest number of simultaneously open device handles
    pub fn max_open_handles(&self) -> usize {
        self.state.borrow().max_open_handles
    }

    /// Number of open-by-ID attempts
    pub fn open_id_calls(&self) -> usize {
        self.state.borrow().open_id_calls
    }

    fn open(&self, access_path: &str) -> Result<DummyDevice, DummyError> {
        let mut state = self.state.borrow_mut();
        if state.find(access_path).is_none() {
            return Err(DummyError::NotFound(access_path.to_string()));
        }
        state.open_handles += 1;
        state.max_open_handles = state.max_open_handles.max(state.open_handles);
        state.operations.push(Operation::Open {
            access_path: access_path.to_string(),
        });
        Ok(DummyDevice {
            board: self.clone(),
            access_path: access_path.to_string(),
        })
    }
}

/// [`HidBus`] view of a [`DummyBoard`]
pub struct DummyBus {
    board: DummyBoard,
}

impl HidBus for DummyBus {
    type Device = DummyDevice;
    type Error = DummyError;

    fn enumerate(&mut self, vid: u16, pid: u16) -> Result<Vec<String>, DummyError> {
        Ok(self
            .board
            .state
            .borrow()
            .present
            .iter()
            .filter(|p| p.config.vid == vid && p.config.pid == pid)
            .map(|p| p.access_path.clone())
            .collect())
    }

    fn open_path(&mut self, path: &str) -> Result<DummyDevice, DummyError> {
        self.board.open(path)
    }

    fn open_id(&mut self, vid: u16, pid: u16) -> Result<DummyDevice, DummyError> {
        let path = {
            let mut state = self.board.state.borrow_mut();
            state.open_id_calls += 1;
            let found = state
                .present
                .iter()
                .find(|p| p.config.vid == vid && p.config.pid == pid)
                .map(|p| p.access_path.clone());
            if found.is_none() {
                // let a pending device show up for the next attempt
                state.plug_deferred();
            }
            found
        };
        match path {
            Some(path) => self.board.open(&path),
            None => Err(DummyError::NotFound(format!("{:04x}:{:04x}", vid, pid))),
        }
    }
}

/// [`HotplugSource`] view of a [`DummyBoard`]
///
/// Never sleeps: when nothing is pending the timeout is reported at once.
pub struct DummyHotplug {
    board: DummyBoard,
}

impl HotplugSource for DummyHotplug {
    type Error = DummyError;

    fn subscribe(&mut self) -> Result<(), DummyError> {
        let mut state = self.board.state.borrow_mut();
        state.subscribed = true;
        state.arrivals.clear();
        Ok(())
    }

    fn next_arrival(&mut self, _timeout: Duration) -> Result<Option<Arrival>, DummyError> {
        let mut state = self.board.state.borrow_mut();
        if !state.subscribed {
            return Err(DummyError::NotSubscribed);
        }
        if state.arrivals.is_empty() {
            state.plug_deferred();
        }
        Ok(state.arrivals.pop_front())
    }

    fn usb_path(&mut self, access_path: &str) -> Result<Option<String>, DummyError> {
        Ok(self
            .board
            .state
            .borrow()
            .find(access_path)
            .map(|p| p.config.usb_path.clone()))
    }
}

/// Open handle to an emulated device
pub struct DummyDevice {
    board: DummyBoard,
    access_path: String,
}

impl DummyDevice {
    pub fn access_path(&self) -> &str {
        &self.access_path
    }

    fn config(&self) -> Result<DummyConfig, DummyError> {
        self.board
            .state
            .borrow()
            .find(&self.access_path)
            .map(|p| p.config.clone())
            .ok_or_else(|| DummyError::Disconnected(self.access_path.clone()))
    }

    fn record(&self, operation: Operation) {
        self.board.state.borrow_mut().operations.push(operation);
    }
}

impl Drop for DummyDevice {
    fn drop(&mut self) {
        self.board.state.borrow_mut().open_handles -= 1;
    }
}

impl SdpDriver for DummyDevice {
    type Error = DummyError;

    fn error_status(&mut self) -> Result<DeviceStatus, DummyError> {
        let config = self.config()?;
        self.record(Operation::ErrorStatus {
            access_path: self.access_path.clone(),
        });
        if config.fail_status {
            return Err(DummyError::StatusFailed);
        }
        Ok(DeviceStatus {
            hab: config.hab,
            status: config.status,
        })
    }

    fn write_file(&mut self, path: &Path, address: u32) -> Result<(), DummyError> {
        let config = self.config()?;
        let data = std::fs::read(path).map_err(|source| DummyError::File {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(status) = config.fail_write {
            return Err(DummyError::WriteFailed(status));
        }
        self.record(Operation::WriteFile {
            access_path: self.access_path.clone(),
            address,
            data,
        });
        Ok(())
    }

    fn jump_address(&mut self, address: u32) -> Result<(), DummyError> {
        let config = self.config()?;
        if let Some(status) = config.reject_jump {
            return Err(DummyError::JumpRejected(status));
        }
        self.record(Operation::Jump {
            access_path: self.access_path.clone(),
            address,
        });

        // The ROM leaves the bus; whatever it booted takes its place
        self.board.unplug(&self.access_path);
        if let Some(next) = config.next {
            self.board.plug(*next);
        }
        Ok(())
    }
}
