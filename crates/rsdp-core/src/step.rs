//! Steps: the atomic operations run against an acquired device
//!
//! A step comes from one of two grammars:
//! - the CLI token form, `write_file:<FILE>:<ADDRESS>` or
//!   `jump_address:<ADDRESS>`
//! - the spec-file field form, `op` / `file` / `address` values collected from
//!   a YAML mapping
//!
//! Both produce the same [`Step`] and share the same required-field rules.

use std::fmt;
use std::path::PathBuf;

use crate::driver::SdpDriver;
use crate::error::{ParseError, Result};
use crate::number::parse_address;

/// Operation name for [`Step::WriteFile`]
pub const OP_WRITE_FILE: &str = "write_file";
/// Operation name for [`Step::JumpAddress`]
pub const OP_JUMP_ADDRESS: &str = "jump_address";

/// One operation within a stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Stream a file's contents to `address`
    WriteFile { file_path: PathBuf, address: u32 },
    /// Start executing the image at `address`
    JumpAddress { address: u32 },
}

impl Step {
    /// Parse the colon-delimited token form
    pub fn parse_token(s: &str) -> Result<Self> {
        let mut fields = s.split(':');
        let op = match fields.next() {
            Some(op) if !op.is_empty() => op,
            _ => return Err(ParseError::MissingStepCommand),
        };
        let args: Vec<&str> = fields.collect();

        match op {
            OP_WRITE_FILE => {
                let &[file, address] = args.as_slice() else {
                    return Err(ParseError::FieldCount {
                        op: OP_WRITE_FILE,
                        expected: 2,
                        found: args.len(),
                    });
                };
                Self::write_file(Some(file), Some(address))
            }
            OP_JUMP_ADDRESS => {
                let &[address] = args.as_slice() else {
                    return Err(ParseError::FieldCount {
                        op: OP_JUMP_ADDRESS,
                        expected: 1,
                        found: args.len(),
                    });
                };
                Self::jump_address(Some(address))
            }
            other => Err(ParseError::UnknownOperation(other.to_string())),
        }
    }

    /// Build a step from discrete field values
    pub fn from_fields(
        op: Option<&str>,
        file: Option<&str>,
        address: Option<&str>,
    ) -> Result<Self> {
        match op {
            None => Err(ParseError::OperationUnset),
            Some(OP_WRITE_FILE) => Self::write_file(file, address),
            Some(OP_JUMP_ADDRESS) => {
                if let Some(file) = file {
                    log::debug!("Ignoring file \"{}\" on {} step", file, OP_JUMP_ADDRESS);
                }
                Self::jump_address(address)
            }
            Some(other) => Err(ParseError::UnknownOperation(other.to_string())),
        }
    }

    fn write_file(file: Option<&str>, address: Option<&str>) -> Result<Self> {
        let file_path = match file {
            Some(f) if !f.is_empty() => PathBuf::from(f),
            _ => {
                return Err(ParseError::MissingField {
                    op: OP_WRITE_FILE,
                    field: "file",
                })
            }
        };
        let address = address.ok_or(ParseError::MissingField {
            op: OP_WRITE_FILE,
            field: "address",
        })?;

        Ok(Step::WriteFile {
            file_path,
            address: parse_address(address)?,
        })
    }

    fn jump_address(address: Option<&str>) -> Result<Self> {
        let address = address.ok_or(ParseError::MissingField {
            op: OP_JUMP_ADDRESS,
            field: "address",
        })?;

        Ok(Step::JumpAddress {
            address: parse_address(address)?,
        })
    }

    /// Operation name as used in both grammars
    pub fn op(&self) -> &'static str {
        match self {
            Step::WriteFile { .. } => OP_WRITE_FILE,
            Step::JumpAddress { .. } => OP_JUMP_ADDRESS,
        }
    }

    /// Target address of the step
    pub fn address(&self) -> u32 {
        match self {
            Step::WriteFile { address, .. } | Step::JumpAddress { address } => *address,
        }
    }

    /// Run this step through the protocol driver
    pub fn execute<D: SdpDriver + ?Sized>(
        &self,
        driver: &mut D,
    ) -> std::result::Result<(), D::Error> {
        match self {
            Step::WriteFile { file_path, address } => driver.write_file(file_path, *address),
            Step::JumpAddress { address } => driver.jump_address(*address),
        }
    }
}

impl fmt::Display for Step {
    /// Formats the step in CLI token form
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::WriteFile { file_path, address } => {
                write!(f, "{}:{}:{:08x}", OP_WRITE_FILE, file_path.display(), address)
            }
            Step::JumpAddress { address } => write!(f, "{}:{:08x}", OP_JUMP_ADDRESS, address),
        }
    }
}
