//! Structural parse events consumed by the spec state machine

use crate::error::SpecError;

/// Position of an event in the source document (1-based)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mark {
    pub line: usize,
    pub column: usize,
}

impl Mark {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// One structural event of a YAML-like document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    StreamStart,
    StreamEnd,
    DocumentStart,
    DocumentEnd,
    Alias,
    Scalar(String),
    SequenceStart,
    SequenceEnd,
    MappingStart,
    MappingEnd,
}

impl Event {
    /// Event kind as shown in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Event::StreamStart => "STREAM_START_EVENT",
            Event::StreamEnd => "STREAM_END_EVENT",
            Event::DocumentStart => "DOCUMENT_START_EVENT",
            Event::DocumentEnd => "DOCUMENT_END_EVENT",
            Event::Alias => "ALIAS_EVENT",
            Event::Scalar(_) => "SCALAR_EVENT",
            Event::SequenceStart => "SEQUENCE_START_EVENT",
            Event::SequenceEnd => "SEQUENCE_END_EVENT",
            Event::MappingStart => "MAPPING_START_EVENT",
            Event::MappingEnd => "MAPPING_END_EVENT",
        }
    }
}

/// A stream of events with their positions
pub trait EventSource {
    /// Next event; lexer failures are reported as [`SpecError::Yaml`]
    fn next_event(&mut self) -> Result<(Event, Mark), SpecError>;
}

/// Replays a fixed list of events, then keeps yielding `StreamEnd`
impl EventSource for std::vec::IntoIter<(Event, Mark)> {
    fn next_event(&mut self) -> Result<(Event, Mark), SpecError> {
        Ok(self
            .next()
            .unwrap_or((Event::StreamEnd, Mark::default())))
    }
}
