//! CLI argument parsing

use clap::{ArgGroup, Parser};
use std::path::PathBuf;

const STAGE_HELP: &str = "\
The STAGEs have the following format:

  <VID>:<PID>[,<STEP>...]
    VID  USB Vendor ID as 4-digit hex number
    PID  USB Product ID as 4-digit hex number

The STEPs can be one of the following operations:

  write_file:<FILE>:<ADDRESS>
    Write the contents of FILE to ADDRESS
  jump_address:<ADDRESS>
    Jump to the IMX image located at ADDRESS

Instead of specifying the stages and steps on the command line, they can be
specified in a YAML file instead (--spec option). Providing the spec on the
command line and in a file are mutually exclusive.";

#[derive(Parser, Debug)]
#[command(name = "rsdp")]
#[command(author, version, about = "i.MX serial download loader", long_about = None)]
#[command(after_long_help = STAGE_HELP)]
#[command(group(ArgGroup::new("input").required(true).args(["spec", "stages"])))]
pub struct Cli {
    /// Change working directory, after the spec is read
    #[arg(short = 'C', long, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// USB device path, e.g. 3-1.1
    #[arg(short = 'p', long = "path", value_name = "USB_PATH")]
    pub usb_path: Option<String>,

    /// Stage/step spec file (YAML)
    #[arg(short, long, value_name = "FILE", conflicts_with = "stages")]
    pub spec: Option<PathBuf>,

    /// Wait for the device of the first stage
    #[arg(short, long)]
    pub wait: bool,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Stages to run in order: <VID>:<PID>[,<STEP>...]
    #[arg(value_name = "STAGE")]
    pub stages: Vec<String>,
}
