//! Execution driver
//!
//! Runs stages strictly in order. For every stage the device is acquired
//! (waiting for it when required), its status is queried, and its steps run
//! one by one. The first failure of any kind ends the whole run; nothing that
//! already happened on the device is undone.

use std::path::Path;

use crate::acquire::{DeviceProvider, Target};
use crate::error::RunError;
use crate::stage::Stage;

/// HAB and generic status reported by the boot ROM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStatus {
    /// High Assurance Boot mode
    pub hab: u32,
    /// Generic status word
    pub status: u32,
}

/// Boot-ROM protocol operations on an open device
pub trait SdpDriver {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Query HAB mode and status
    fn error_status(&mut self) -> Result<DeviceStatus, Self::Error>;

    /// Stream a file's contents to `address`
    fn write_file(&mut self, path: &Path, address: u32) -> Result<(), Self::Error>;

    /// Start executing at `address`
    fn jump_address(&mut self, address: u32) -> Result<(), Self::Error>;
}

impl<D: SdpDriver + ?Sized> SdpDriver for Box<D> {
    type Error = D::Error;

    fn error_status(&mut self) -> Result<DeviceStatus, Self::Error> {
        (**self).error_status()
    }

    fn write_file(&mut self, path: &Path, address: u32) -> Result<(), Self::Error> {
        (**self).write_file(path, address)
    }

    fn jump_address(&mut self, address: u32) -> Result<(), Self::Error> {
        (**self).jump_address(address)
    }
}

/// Whether stage `index` (0-based) waits for its device
///
/// Only the first stage honours the caller's choice; every later stage waits,
/// since the previous stage's jump usually makes the device re-enumerate.
pub fn effective_wait(initial_wait: bool, index: usize) -> bool {
    initial_wait || index > 0
}

/// Run all stages in order, stopping at the first failure
pub fn run_stages<P>(
    provider: &mut P,
    stages: &[Stage],
    initial_wait: bool,
    usb_path: Option<&str>,
) -> Result<(), RunError>
where
    P: DeviceProvider,
    P::Device: SdpDriver,
{
    for (index, stage) in stages.iter().enumerate() {
        let number = index + 1;
        log::info!(
            "[Stage {}] VID=0x{:04x} PID=0x{:04x}",
            number,
            stage.vid(),
            stage.pid()
        );

        let target = Target::new(stage.vid(), stage.pid(), usb_path);
        let mut device = provider
            .acquire(&target, effective_wait(initial_wait, index))
            .map_err(|source| RunError::Acquire {
                stage: number,
                source,
            })?;

        run_stage(&mut device, stage, number)?;
        // device handle released here, before the next stage looks for its device
    }

    log::info!("All stages done");
    Ok(())
}

fn run_stage<D: SdpDriver>(device: &mut D, stage: &Stage, number: usize) -> Result<(), RunError> {
    let status = device.error_status().map_err(|e| RunError::Status {
        stage: number,
        source: Box::new(e),
    })?;
    log::info!(
        "HAB mode 0x{:08x}, status 0x{:08x}",
        status.hab,
        status.status
    );

    for (i, step) in stage.steps().iter().enumerate() {
        log::info!("[Step {}] {}", i + 1, step);
        step.execute(device).map_err(|e| RunError::Step {
            stage: number,
            step: i + 1,
            source: Box::new(e),
        })?;
    }
    Ok(())
}
