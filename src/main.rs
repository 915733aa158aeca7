//! rsdp - i.MX serial download loader
//!
//! Boots i.MX SoCs over USB through the boot ROM's Serial Download Protocol.
//!
//! # Architecture
//!
//! A run is a list of stages, each naming the USB device (VID:PID) to talk
//! to and the steps to perform on it. Stages come from the command line or
//! from a YAML spec file. Usually the first stage loads an SPL into the boot
//! ROM and jumps to it; the SPL then re-enumerates with a new ID and a later
//! stage loads the rest:
//!
//! ```text
//! rsdp 15a2:0080,write_file:SPL:00910000,jump_address:00910000 \
//!      0525:b4a4,write_file:u-boot.img:877ff400,jump_address:877ff400
//! ```
//!
//! Every stage after the first waits for its device to show up.

mod cli;
mod progress;

use clap::Parser;
use cli::Cli;
use progress::IndicatifProgress;
use rsdp_core::{parse_spec_file, parse_stages, run_stages, Acquirer};
use rsdp_usb::NusbBus;

fn main() {
    let cli = Cli::parse();

    // Initialize logger, -v/-vv raise the default level
    let default_level = log_level(cli.verbose);
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if let Err(e) = run(cli) {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}

fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut usb_path = cli.usb_path;

    let stages = match &cli.spec {
        Some(spec) => {
            let doc = parse_spec_file(spec, usb_path.is_some())?;
            if usb_path.is_none() {
                usb_path = doc.usb_path;
            }
            doc.stages
        }
        None => parse_stages(&cli.stages)?,
    };
    log::debug!("Parsed {} stage(s)", stages.len());

    // Relative file paths in steps are resolved against this directory
    if let Some(dir) = &cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            format!("failed to change directory to {}: {}", dir.display(), e)
        })?;
    }

    let bus = NusbBus::with_progress(Box::new(IndicatifProgress::boxed));

    #[cfg(feature = "hotplug")]
    let waiter = rsdp_core::HotplugWait::new(rsdp_usb::NusbHotplug::new()?);
    #[cfg(not(feature = "hotplug"))]
    let waiter = rsdp_core::PollingWait::new();

    let mut acquirer = Acquirer::new(bus, waiter);
    run_stages(&mut acquirer, &stages, cli.wait, usb_path.as_deref())?;
    Ok(())
}
