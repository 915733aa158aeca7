//! Stage/step spec files
//!
//! Instead of command-line stages, the whole run can be described in YAML:
//!
//! ```yaml
//! usb_path: 3-1.1            # optional, the command line takes precedence
//! stages:
//!   - vid: 15a2
//!     pid: 0080
//!     steps:
//!       - op: write_file
//!         file: u-boot-spl.bin
//!         address: 00910000
//!       - op: jump_address
//!         address: 00910000
//!   - vid: 0525
//!     pid: b4a4
//!     steps:
//!       - op: write_file
//!         file: u-boot.img
//!         address: 877ff400
//!       - op: jump_address
//!         address: 877ff400
//! ```
//!
//! The document is read as a stream of events by an explicit state machine
//! ([`SpecParser`]) rather than deserialized into a tree, so errors point at
//! the exact line and column of the offending event.

mod event;
mod fsm;
mod yaml;

use std::fs;
use std::path::Path;

pub use event::{Event, EventSource, Mark};
pub use fsm::SpecParser;
pub use yaml::YamlEvents;

use crate::error::SpecError;
use crate::stage::Stage;

/// A parsed spec file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecDocument {
    /// USB path from the document, unless the command line already set one
    pub usb_path: Option<String>,
    /// Stages in execution order, never empty
    pub stages: Vec<Stage>,
}

/// Parse spec text
///
/// `cli_usb_path` tells whether the command line already supplied a USB path;
/// if so, a `usb_path` in the document is read and discarded with a warning.
pub fn parse_spec_str(source: &str, cli_usb_path: bool) -> Result<SpecDocument, SpecError> {
    SpecParser::new(YamlEvents::new(source), cli_usb_path).parse()
}

/// Read and parse a spec file
pub fn parse_spec_file(path: &Path, cli_usb_path: bool) -> Result<SpecDocument, SpecError> {
    let source = fs::read_to_string(path).map_err(|source| SpecError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!("Read spec file {}", path.display());
    parse_spec_str(&source, cli_usb_path)
}
