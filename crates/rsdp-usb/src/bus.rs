//! Device enumeration
//!
//! Devices are addressed two ways:
//! - access path `<bus>:<address>` (lsusb style), what [`NusbBus`] opens
//! - topology path `<bus>-<port>[.<port>...]` (sysfs style), stable across
//!   re-enumeration and used for `--path` filtering

use nusb::{DeviceInfo, MaybeFuture};
use rsdp_core::{HidBus, NoProgress, TransferProgress};

use crate::device::SdpDevice;
use crate::error::{Result, UsbError};
use crate::protocol::HID_CLASS;

/// Builds a fresh progress reporter for every opened device
pub type ProgressFactory = Box<dyn Fn() -> Box<dyn TransferProgress>>;

fn format_access_path(bus: &str, address: u8) -> String {
    format!("{}:{:03}", bus, address)
}

fn format_topology_path(bus: &str, ports: &[u8]) -> Option<String> {
    if ports.is_empty() {
        // root hub, no USB parent port
        return None;
    }
    let ports: Vec<String> = ports.iter().map(|p| p.to_string()).collect();
    Some(format!("{}-{}", bus, ports.join(".")))
}

/// Access path of a device, e.g. `3:012`
pub fn access_path(info: &DeviceInfo) -> String {
    format_access_path(info.bus_id(), info.device_address())
}

/// Topology path of a device, e.g. `3-1.1`
pub fn topology_path(info: &DeviceInfo) -> Option<String> {
    format_topology_path(info.bus_id(), info.port_chain())
}

fn is_hid(info: &DeviceInfo) -> bool {
    info.interfaces().any(|iface| iface.class() == HID_CLASS)
}

fn list_hid_devices() -> Result<impl Iterator<Item = DeviceInfo>> {
    Ok(nusb::list_devices().wait()?.filter(is_hid))
}

/// Present device behind an access path
///
/// Not filtered by class: a device that just arrived may not list its
/// interfaces yet. [`SdpDevice::open`] rejects devices without a HID
/// interface.
pub fn find_device(path: &str) -> Result<Option<DeviceInfo>> {
    Ok(nusb::list_devices()
        .wait()?
        .find(|info| access_path(info) == path))
}

/// HID bus backed by nusb
pub struct NusbBus {
    progress: ProgressFactory,
}

fn no_progress() -> Box<dyn TransferProgress> {
    Box::new(NoProgress)
}

impl NusbBus {
    pub fn new() -> Self {
        Self::with_progress(Box::new(no_progress))
    }

    /// Bus whose devices report download progress through `progress`
    pub fn with_progress(progress: ProgressFactory) -> Self {
        Self { progress }
    }

    fn open_info(&self, info: &DeviceInfo) -> Result<SdpDevice> {
        SdpDevice::open(info, (self.progress)())
    }
}

impl Default for NusbBus {
    fn default() -> Self {
        Self::new()
    }
}

impl HidBus for NusbBus {
    type Device = SdpDevice;
    type Error = UsbError;

    fn enumerate(&mut self, vid: u16, pid: u16) -> Result<Vec<String>> {
        let paths: Vec<String> = list_hid_devices()?
            .filter(|info| info.vendor_id() == vid && info.product_id() == pid)
            .map(|info| access_path(&info))
            .collect();
        log::debug!(
            "Found {} device(s) with ID {:04x}:{:04x}",
            paths.len(),
            vid,
            pid
        );
        Ok(paths)
    }

    fn open_path(&mut self, path: &str) -> Result<SdpDevice> {
        let info = find_device(path)?.ok_or_else(|| UsbError::DeviceNotFound(path.to_string()))?;
        self.open_info(&info)
    }

    fn open_id(&mut self, vid: u16, pid: u16) -> Result<SdpDevice> {
        let info = list_hid_devices()?
            .find(|info| info.vendor_id() == vid && info.product_id() == pid)
            .ok_or_else(|| UsbError::DeviceNotFound(format!("{:04x}:{:04x}", vid, pid)))?;
        self.open_info(&info)
    }
}
