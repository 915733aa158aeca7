//! Hotplug arrivals from nusb's device watcher
//!
//! The watcher is a `Stream`; it is driven on a current-thread tokio runtime
//! so each wait can be bounded with a timer.

use std::time::{Duration, Instant};

use futures_lite::StreamExt;
use nusb::hotplug::{HotplugEvent, HotplugWatch};
use rsdp_core::{Arrival, HotplugSource};

use crate::bus::{access_path, find_device, topology_path};
use crate::error::{Result, UsbError};

/// Hotplug source backed by [`nusb::watch_devices`]
pub struct NusbHotplug {
    runtime: tokio::runtime::Runtime,
    watch: Option<HotplugWatch>,
}

impl NusbHotplug {
    pub fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(UsbError::Runtime)?;
        Ok(Self {
            runtime,
            watch: None,
        })
    }
}

impl HotplugSource for NusbHotplug {
    type Error = UsbError;

    fn subscribe(&mut self) -> Result<()> {
        // A new watch starts empty, so arrivals from an earlier stage are gone
        self.watch = Some(nusb::watch_devices()?);
        Ok(())
    }

    fn next_arrival(&mut self, timeout: Duration) -> Result<Option<Arrival>> {
        let Self { runtime, watch } = self;
        let watch = watch.as_mut().ok_or(UsbError::NotSubscribed)?;
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let event = match runtime.block_on(tokio::time::timeout(remaining, watch.next())) {
                Err(_elapsed) => return Ok(None),
                Ok(None) => return Err(UsbError::HotplugClosed),
                Ok(Some(event)) => event,
            };

            match event {
                HotplugEvent::Connected(info) => {
                    log::trace!(
                        "Connected {:04x}:{:04x} at {}",
                        info.vendor_id(),
                        info.product_id(),
                        access_path(&info)
                    );
                    return Ok(Some(Arrival {
                        vid: info.vendor_id(),
                        pid: info.product_id(),
                        access_path: access_path(&info),
                        usb_path: topology_path(&info),
                    }));
                }
                HotplugEvent::Disconnected(id) => log::trace!("Disconnected {:?}", id),
            }
        }
    }

    fn usb_path(&mut self, access_path: &str) -> Result<Option<String>> {
        Ok(find_device(access_path)?.and_then(|info| topology_path(&info)))
    }
}
