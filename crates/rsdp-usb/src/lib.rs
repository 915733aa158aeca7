//! rsdp-usb - nusb transport for the i.MX Serial Download Protocol
//!
//! This crate connects `rsdp-core` to real hardware:
//! - [`NusbBus`] enumerates and opens boot ROMs by VID/PID
//! - [`SdpDevice`] speaks SDP over the ROM's HID interface
//! - [`NusbHotplug`] (feature `hotplug`) reports device arrivals so a stage
//!   can wait for the device the previous stage booted
//!
//! # Example
//!
//! ```ignore
//! use rsdp_core::{Acquirer, DeviceProvider, HotplugWait, SdpDriver, Target};
//! use rsdp_usb::{NusbBus, NusbHotplug};
//!
//! let mut acquirer = Acquirer::new(NusbBus::new(), HotplugWait::new(NusbHotplug::new()?));
//! let mut device = acquirer.acquire(&Target::new(0x15a2, 0x0080, None), true)?;
//! let status = device.error_status()?;
//! println!("HAB mode 0x{:08x}", status.hab);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod bus;
mod device;
mod error;
#[cfg(feature = "hotplug")]
mod hotplug;
pub mod protocol;

pub use bus::{access_path, find_device, topology_path, NusbBus, ProgressFactory};
pub use device::SdpDevice;
pub use error::{Result, UsbError};
#[cfg(feature = "hotplug")]
pub use hotplug::NusbHotplug;
