//! Error types for rsdp-core
//!
//! Parsing, spec-document, device acquisition and execution failures each get
//! their own enum so the binary can report them with full context.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Boxed error used for collaborator (bus, driver, hotplug) failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a numeric field could not be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberProblem {
    /// No hex digits at all
    Empty,
    /// A character that is not a hex digit
    NotHex,
    /// Value does not fit the field width
    OutOfRange,
}

impl std::fmt::Display for NumberProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "no hex digits"),
            Self::NotHex => write!(f, "not a hex number"),
            Self::OutOfRange => write!(f, "value out of range"),
        }
    }
}

/// Errors from building steps and stages
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Step token had no operation name
    #[error("missing step command")]
    MissingStepCommand,

    /// Step operation not recognised
    #[error("unknown step command \"{0}\"")]
    UnknownOperation(String),

    /// Spec step without an `op` key
    #[error("step operation unset")]
    OperationUnset,

    /// A required step field was not supplied
    #[error("invalid {op} step: missing {field}")]
    MissingField {
        op: &'static str,
        field: &'static str,
    },

    /// Wrong number of colon-separated fields in a step token
    #[error("invalid {op} step: expected {expected} fields, found {found}")]
    FieldCount {
        op: &'static str,
        expected: usize,
        found: usize,
    },

    /// Numeric field could not be parsed
    #[error("invalid {field} value \"{value}\": {problem}")]
    InvalidNumber {
        field: &'static str,
        value: String,
        problem: NumberProblem,
    },

    /// First stage token is not `VID:PID`
    #[error("stage didn't contain USB VID/PID: \"{0}\"")]
    InvalidVidPid(String),

    /// Stage given without VID or PID
    #[error("stage VID/PID unset")]
    VidPidUnset,

    /// Stage without any steps
    #[error("stage has no steps")]
    NoSteps,

    /// Empty comma-separated segment
    #[error("empty step in stage")]
    EmptyStep,

    /// Failure inside a particular stage (1-based)
    #[error("failed to parse stage {stage}: {source}")]
    InStage {
        stage: usize,
        #[source]
        source: Box<ParseError>,
    },

    /// Failure inside a particular step (1-based)
    #[error("failed to parse step {step}: {source}")]
    InStep {
        step: usize,
        #[source]
        source: Box<ParseError>,
    },
}

/// Errors from reading a stage/step spec document
#[derive(Debug, Error)]
pub enum SpecError {
    /// Spec file could not be read
    #[error("failed to open {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The YAML lexer rejected the input
    #[error("failed to parse YAML at line {line} (column {column}): {message}")]
    Yaml {
        line: usize,
        column: usize,
        message: String,
    },

    /// Structurally valid YAML, but not where the spec layout allows it
    #[error("unexpected {event} at line {line} (column {column})")]
    UnexpectedEvent {
        event: &'static str,
        line: usize,
        column: usize,
    },

    /// Mapping key that the spec layout does not know
    #[error("unexpected key \"{key}\" at line {line} (column {column})")]
    UnexpectedKey {
        key: String,
        line: usize,
        column: usize,
    },

    /// A stage or step mapping did not validate
    #[error("invalid entry ending at line {line} (column {column}): {source}")]
    Field {
        line: usize,
        column: usize,
        #[source]
        source: ParseError,
    },

    /// Document parsed, but no stage was defined
    #[error("no stages defined")]
    NoStages,
}

/// Device acquisition failures
#[derive(Debug, Error)]
pub enum AcquireError {
    /// No matching device present and waiting was not requested
    #[error("no matching device found (VID={vid:04x} PID={pid:04x})")]
    NotFound { vid: u16, pid: u16 },

    /// Hotplug wait gave up
    #[error("timeout after {}ms waiting for device (VID={vid:04x} PID={pid:04x})", .timeout.as_millis())]
    Timeout {
        vid: u16,
        pid: u16,
        timeout: Duration,
    },

    /// Device matched but could not be opened
    #[error("failed to open device {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: BoxError,
    },

    /// A USB path filter was given but topology cannot be resolved
    #[error("filtering by USB path is only supported with hotplug support")]
    UnsupportedPathFilter,

    /// Device enumeration failed
    #[error("failed to enumerate HID devices: {0}")]
    Enumerate(#[source] BoxError),

    /// The arrival wait itself failed
    #[error("failed waiting for device: {0}")]
    Wait(#[source] BoxError),
}

/// Errors from running stages against devices
#[derive(Debug, Error)]
pub enum RunError {
    /// Device for a stage could not be acquired
    #[error("stage {stage}: {source}")]
    Acquire {
        stage: usize,
        #[source]
        source: AcquireError,
    },

    /// Device did not answer the status query
    #[error("stage {stage}: status query failed: {source}")]
    Status {
        stage: usize,
        #[source]
        source: BoxError,
    },

    /// A step reported failure
    #[error("stage {stage}: failed to execute step {step}: {source}")]
    Step {
        stage: usize,
        step: usize,
        #[source]
        source: BoxError,
    },
}

impl ParseError {
    pub(crate) fn in_stage(self, stage: usize) -> Self {
        ParseError::InStage {
            stage,
            source: Box::new(self),
        }
    }

    pub(crate) fn in_step(self, step: usize) -> Self {
        ParseError::InStep {
            step,
            source: Box::new(self),
        }
    }
}

/// Result type for stage/step parsing
pub type Result<T> = std::result::Result<T, ParseError>;
