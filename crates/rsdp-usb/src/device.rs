//! SDP device over nusb
//!
//! Output reports go out as HID SET_REPORT control transfers on the HID
//! interface; input reports arrive on its interrupt IN endpoint.

use std::path::Path;
use std::time::Duration;

use nusb::descriptors::TransferType;
use nusb::transfer::{
    Buffer, ControlOut, ControlType, Direction, In, Interrupt, Recipient, TransferError,
};
use nusb::{DeviceInfo, Endpoint, Interface, MaybeFuture};
use rsdp_core::{DeviceStatus, SdpDriver, TransferProgress};

use crate::error::{Result, UsbError};
use crate::protocol::*;

/// Timeout for control transfers and expected input reports
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait for a rejection after a jump
const JUMP_STATUS_TIMEOUT: Duration = Duration::from_secs(1);

/// An open i.MX boot ROM in serial download mode
pub struct SdpDevice {
    interface: Interface,
    interface_number: u8,
    in_ep: Endpoint<Interrupt, In>,
    progress: Box<dyn TransferProgress>,
}

impl SdpDevice {
    /// Open the device and claim its HID interface
    pub fn open(info: &DeviceInfo, progress: Box<dyn TransferProgress>) -> Result<Self> {
        log::debug!(
            "Opening {:04x}:{:04x} on bus {} address {}",
            info.vendor_id(),
            info.product_id(),
            info.bus_id(),
            info.device_address()
        );

        let device = info
            .open()
            .wait()
            .map_err(|e| UsbError::OpenFailed(e.to_string()))?;

        let config = device
            .active_configuration()
            .map_err(|e| UsbError::OpenFailed(format!("Failed to get config: {}", e)))?;

        // First HID interface with an interrupt IN endpoint
        let mut found = None;
        for iface in config.interface_alt_settings() {
            if iface.class() != HID_CLASS {
                continue;
            }
            let in_ep = iface.endpoints().find(|ep| {
                ep.transfer_type() == TransferType::Interrupt && ep.direction() == Direction::In
            });
            if let Some(ep) = in_ep {
                found = Some((iface.interface_number(), ep.address()));
                break;
            }
        }
        let (interface_number, in_address) = found.ok_or(UsbError::NoHidInterface)?;

        log::debug!(
            "Using interface {}, interrupt IN endpoint 0x{:02x}",
            interface_number,
            in_address
        );

        // The kernel HID driver owns the interface; take it over
        let interface = device
            .detach_and_claim_interface(interface_number)
            .wait()
            .map_err(|e| UsbError::ClaimFailed {
                interface: interface_number,
                message: e.to_string(),
            })?;

        let in_ep = interface
            .endpoint::<Interrupt, In>(in_address)
            .map_err(|e| UsbError::ClaimFailed {
                interface: interface_number,
                message: e.to_string(),
            })?;

        Ok(Self {
            interface,
            interface_number,
            in_ep,
            progress,
        })
    }

    /// HID SET_REPORT with an output report (ID byte first)
    fn send_report(&mut self, report: &[u8]) -> Result<()> {
        log::trace!("OUT report {} ({} bytes)", report[0], report.len());
        self.interface
            .control_out(
                ControlOut {
                    control_type: ControlType::Class,
                    recipient: Recipient::Interface,
                    request: HID_SET_REPORT,
                    value: HID_REPORT_TYPE_OUTPUT | u16::from(report[0]),
                    index: u16::from(self.interface_number),
                    data: report,
                },
                TRANSFER_TIMEOUT,
            )
            .wait()?;
        Ok(())
    }

    /// Read one input report of up to `len` payload bytes
    fn read_report(
        &mut self,
        len: usize,
        timeout: Duration,
    ) -> std::result::Result<Vec<u8>, TransferError> {
        let max_packet_size = self.in_ep.max_packet_size();
        let request_len = (len + 1).div_ceil(max_packet_size) * max_packet_size;
        let mut buf = Buffer::new(request_len);
        buf.set_requested_len(request_len);

        let data = self.in_ep.transfer_blocking(buf, timeout).into_result()?;
        log::trace!(
            "IN report ({} bytes): {:02x?}",
            data.len(),
            &data[..data.len().min(8)]
        );
        Ok(data.to_vec())
    }

    fn read_word(&mut self, id: u8, len: usize) -> Result<u32> {
        let raw = self.read_report(len, TRANSFER_TIMEOUT)?;
        parse_word_report(id, &raw)
    }

    fn read_hab(&mut self) -> Result<u32> {
        let hab = self.read_word(REPORT_HAB, HAB_LEN)?;
        log::debug!("HAB mode 0x{:08x} ({})", hab, hab_mode_name(hab));
        Ok(hab)
    }

    fn send_data(&mut self, data: &[u8]) -> Result<()> {
        self.progress.start(data.len());
        let mut sent = 0;
        for chunk in data.chunks(MAX_DATA_CHUNK) {
            self.send_report(&data_report(chunk))?;
            sent += chunk.len();
            self.progress.advance(sent);
        }
        Ok(())
    }
}

impl SdpDriver for SdpDevice {
    type Error = UsbError;

    fn error_status(&mut self) -> Result<DeviceStatus> {
        self.send_report(&command_report(Command::ErrorStatus, 0, 0))?;
        let hab = self.read_hab()?;
        let status = self.read_word(REPORT_STATUS, STATUS_LEN)?;
        Ok(DeviceStatus { hab, status })
    }

    fn write_file(&mut self, path: &Path, address: u32) -> Result<()> {
        let data = std::fs::read(path).map_err(|source| UsbError::File {
            path: path.to_path_buf(),
            source,
        })?;
        let count = u32::try_from(data.len()).map_err(|_| UsbError::FileTooLarge {
            path: path.to_path_buf(),
            size: data.len(),
        })?;

        log::debug!(
            "Writing {} ({} bytes) to 0x{:08x}",
            path.display(),
            count,
            address
        );

        self.send_report(&command_report(Command::WriteFile, address, count))?;
        self.send_data(&data)?;
        self.read_hab()?;

        let status = self.read_word(REPORT_STATUS, STATUS_LEN)?;
        if status != WRITE_COMPLETE {
            return Err(UsbError::WriteFailed(status));
        }
        self.progress.finish();
        Ok(())
    }

    fn jump_address(&mut self, address: u32) -> Result<()> {
        self.send_report(&command_report(Command::JumpAddress, address, 0))?;
        self.read_hab()?;

        // A status report means the ROM refused to jump. Silence or the device
        // dropping off the bus means it is running the image.
        match self.read_report(STATUS_LEN, JUMP_STATUS_TIMEOUT) {
            Ok(raw) => Err(UsbError::JumpRejected(parse_word_report(REPORT_STATUS, &raw)?)),
            Err(TransferError::Cancelled | TransferError::Disconnected) => {
                log::debug!("Jumped to 0x{:08x}", address);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
