//! Serial Download Protocol constants and report encoding
//!
//! The i.MX boot ROM speaks SDP over four HID reports:
//!
//! | ID | Direction | Size | Content |
//! |----|-----------|------|---------|
//! | 1  | out | 16 | command |
//! | 2  | out | ≤1024 | file data |
//! | 3  | in  | 4 | HAB security mode |
//! | 4  | in  | ≤64 | status word + padding |
//!
//! Every report on the wire is prefixed with its report ID byte.

use crate::error::{Result, UsbError};

/// HID interface class
pub const HID_CLASS: u8 = 0x03;

/// HID SET_REPORT request
pub const HID_SET_REPORT: u8 = 0x09;
/// wValue high byte for output reports
pub const HID_REPORT_TYPE_OUTPUT: u16 = 0x0200;

pub const REPORT_COMMAND: u8 = 1;
pub const REPORT_DATA: u8 = 2;
pub const REPORT_HAB: u8 = 3;
pub const REPORT_STATUS: u8 = 4;

/// Command report payload length
pub const COMMAND_LEN: usize = 16;
/// Largest data report payload
pub const MAX_DATA_CHUNK: usize = 1024;
/// HAB report payload length
pub const HAB_LEN: usize = 4;
/// Status report payload length
pub const STATUS_LEN: usize = 64;

/// HAB mode: production part, only signed images run
pub const HAB_CLOSED: u32 = 0x1234_3412;
/// HAB mode: development part
pub const HAB_OPEN: u32 = 0x5678_7856;

/// Status after a completed WRITE_FILE
pub const WRITE_COMPLETE: u32 = 0x8888_8888;

/// SDP command codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Command {
    ErrorStatus = 0x0505,
    WriteFile = 0x0404,
    JumpAddress = 0x0B0B,
}

/// Encode report 1 with its report ID prefix
///
/// Layout: command (BE u16), address (BE u32), format (u8), count (BE u32),
/// data (BE u32), reserved (u8).
pub fn command_report(command: Command, address: u32, count: u32) -> [u8; COMMAND_LEN + 1] {
    let mut report = [0u8; COMMAND_LEN + 1];
    report[0] = REPORT_COMMAND;
    report[1..3].copy_from_slice(&(command as u16).to_be_bytes());
    report[3..7].copy_from_slice(&address.to_be_bytes());
    // format (byte 7), data (12..16) and reserved (16) stay zero
    report[8..12].copy_from_slice(&count.to_be_bytes());
    report
}

/// Prefix a data chunk with report ID 2
pub fn data_report(chunk: &[u8]) -> Vec<u8> {
    debug_assert!(chunk.len() <= MAX_DATA_CHUNK);
    let mut report = Vec::with_capacity(chunk.len() + 1);
    report.push(REPORT_DATA);
    report.extend_from_slice(chunk);
    report
}

/// Extract the leading status word of an input report
///
/// `raw` is the report as read from the interrupt endpoint, ID byte first.
pub fn parse_word_report(id: u8, raw: &[u8]) -> Result<u32> {
    match raw {
        [got, a, b, c, d, ..] if *got == id => Ok(u32::from_le_bytes([*a, *b, *c, *d])),
        [got, ..] if *got != id => Err(UsbError::InvalidResponse(format!(
            "expected report {}, got report {}",
            id, got
        ))),
        _ => Err(UsbError::InvalidResponse(format!(
            "report {} too short ({} bytes)",
            id,
            raw.len()
        ))),
    }
}

/// Human readable HAB mode
pub fn hab_mode_name(hab: u32) -> &'static str {
    match hab {
        HAB_CLOSED => "closed",
        HAB_OPEN => "open",
        _ => "unknown",
    }
}
