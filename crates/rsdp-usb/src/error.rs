//! Error types for the USB transport

use std::path::PathBuf;

use thiserror::Error;

/// Result type for USB transport operations
pub type Result<T> = std::result::Result<T, UsbError>;

/// Errors from talking to an SDP device over USB
#[derive(Debug, Error)]
pub enum UsbError {
    /// Generic nusb failure (enumeration, hotplug watch)
    #[error("USB error: {0}")]
    Usb(#[from] nusb::Error),

    /// No device at the requested access path or with the requested IDs
    #[error("no SDP device at {0}")]
    DeviceNotFound(String),

    /// Failed to open the device
    #[error("failed to open device: {0}")]
    OpenFailed(String),

    /// Failed to claim the HID interface
    #[error("failed to claim interface {interface}: {message}")]
    ClaimFailed { interface: u8, message: String },

    /// The device exposes no usable HID interface
    #[error("device has no HID interface with an interrupt IN endpoint")]
    NoHidInterface,

    /// USB transfer failed
    #[error("USB transfer failed: {0}")]
    TransferFailed(#[from] nusb::transfer::TransferError),

    /// Input report with an unexpected ID or length
    #[error("invalid response from device: {0}")]
    InvalidResponse(String),

    /// Write did not complete with the expected status
    #[error("write failed with status 0x{0:08x}")]
    WriteFailed(u32),

    /// The ROM answered a jump with a status report instead of jumping
    #[error("jump rejected with status 0x{0:08x}")]
    JumpRejected(u32),

    /// Could not read the file to download
    #[error("cannot read {}: {source}", .path.display())]
    File {
        path: PathBuf,
        source: std::io::Error,
    },

    /// File does not fit the 32-bit byte count of the protocol
    #[error("{} is too large ({size} bytes)", .path.display())]
    FileTooLarge { path: PathBuf, size: usize },

    /// Hotplug wait used before subscribing
    #[error("hotplug source not subscribed")]
    NotSubscribed,

    /// The hotplug event stream ended
    #[error("hotplug event stream closed")]
    HotplugClosed,

    /// Could not start the async runtime used for hotplug waits
    #[error("failed to create runtime: {0}")]
    Runtime(std::io::Error),
}
