//! rsdp-core - Stage model and execution for i.MX serial download
//!
//! This crate holds everything of the loader that does not touch USB:
//! the stage/step model and its command-line token grammar, the YAML spec
//! file reader, the device acquisition protocol, and the driver that runs
//! stages in order against any [`SdpDriver`].
//!
//! Transports plug in through the traits in [`acquire`] and [`driver`]:
//! `rsdp-usb` implements them over nusb, `rsdp-dummy` in memory.
//!
//! # Example
//!
//! ```ignore
//! use rsdp_core::{parse_stages, run_stages};
//!
//! let stages = parse_stages(&["15a2:0080,write_file:spl.bin:00910000,jump_address:00910000"])?;
//! run_stages(&mut acquirer, &stages, false, None)?;
//! ```

#![warn(rust_2018_idioms)]

pub mod acquire;
pub mod driver;
pub mod error;
pub mod number;
pub mod progress;
pub mod spec;
pub mod stage;
pub mod step;

pub use acquire::{
    Acquirer, Arrival, DeviceProvider, HidBus, HotplugSource, HotplugWait, PollingWait, Target,
    WaitStrategy, ARRIVAL_RETRY_INTERVAL, HOTPLUG_TIMEOUT, POLL_INTERVAL,
};
pub use driver::{effective_wait, run_stages, DeviceStatus, SdpDriver};
pub use error::{AcquireError, BoxError, ParseError, RunError, SpecError};
pub use progress::{NoProgress, TransferProgress};
pub use spec::{parse_spec_file, parse_spec_str, SpecDocument};
pub use stage::{parse_stages, Stage};
pub use step::Step;
