//! Spec document state machine
//!
//! ```text
//! Init ─MappingStart─▶ RootMapping ─"stages"─▶ StagesKey ─SequenceStart─▶ StagesSeq
//!                        │   ▲                                             │   ▲
//!                 MappingEnd └──────────────SequenceEnd────────────────────┘   │
//!                        ▼                                        MappingStart │ MappingEnd
//!                      Done                                                ▼   │
//!                                                                    StagesMapping
//!                                                                     │        ▲
//!                                            "steps"─▶ StepsKey ─SequenceStart─▶ StepsSeq
//!                                                                              │   ▲
//!                                                                 MappingStart │   │ MappingEnd
//!                                                                              ▼   │
//!                                                                         StepsMapping
//! ```
//!
//! `StepsSeq` returns to `StagesMapping` on SequenceEnd. Scalar keys inside the
//! mappings consume the following scalar as their value.

use super::event::{Event, EventSource, Mark};
use super::SpecDocument;
use crate::error::SpecError;
use crate::stage::Stage;
use crate::step::Step;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    RootMapping,
    StagesKey,
    StagesSeq,
    StagesMapping,
    StepsKey,
    StepsSeq,
    StepsMapping,
    Done,
}

/// Fields of the stage currently being read
#[derive(Default)]
struct StageFields {
    vid: Option<String>,
    pid: Option<String>,
    steps: Vec<Step>,
}

/// Fields of the step currently being read
#[derive(Default)]
struct StepFields {
    op: Option<String>,
    file: Option<String>,
    address: Option<String>,
}

/// Builds a [`SpecDocument`] from an event stream
pub struct SpecParser<S> {
    events: S,
    state: State,
    /// A USB path from the command line overrides the document's
    cli_usb_path: bool,
    usb_path: Option<String>,
    stages: Vec<Stage>,
    stage: StageFields,
    step: StepFields,
}

fn unexpected(event: &Event, mark: Mark) -> SpecError {
    SpecError::UnexpectedEvent {
        event: event.kind(),
        line: mark.line,
        column: mark.column,
    }
}

fn unexpected_key(key: String, mark: Mark) -> SpecError {
    SpecError::UnexpectedKey {
        key,
        line: mark.line,
        column: mark.column,
    }
}

impl<S: EventSource> SpecParser<S> {
    /// `cli_usb_path` tells whether a USB path was already given on the
    /// command line
    pub fn new(events: S, cli_usb_path: bool) -> Self {
        Self {
            events,
            state: State::Init,
            cli_usb_path,
            usb_path: None,
            stages: Vec::new(),
            stage: StageFields::default(),
            step: StepFields::default(),
        }
    }

    /// Run the machine to the end of the stream
    ///
    /// Any error abandons everything parsed so far.
    pub fn parse(mut self) -> Result<SpecDocument, SpecError> {
        loop {
            let (event, mark) = self.events.next_event()?;
            let done = event == Event::StreamEnd;
            self.handle(event, mark)?;
            if done {
                break;
            }
        }

        if self.stages.is_empty() {
            return Err(SpecError::NoStages);
        }

        Ok(SpecDocument {
            usb_path: self.usb_path,
            stages: self.stages,
        })
    }

    /// Value scalar following a key
    fn value(&mut self) -> Result<String, SpecError> {
        match self.events.next_event()? {
            (Event::Scalar(value), _) => Ok(value),
            (event, mark) => Err(unexpected(&event, mark)),
        }
    }

    fn handle(&mut self, event: Event, mark: Mark) -> Result<(), SpecError> {
        self.state = match (self.state, event) {
            (State::Init, Event::StreamStart | Event::DocumentStart) => State::Init,
            (State::Init, Event::MappingStart) => State::RootMapping,

            (State::RootMapping, Event::Scalar(key)) => match key.as_str() {
                "usb_path" => {
                    let value = self.value()?;
                    if self.cli_usb_path {
                        log::warn!(
                            "Ignoring USB path from spec file (command line takes precedence)"
                        );
                    } else if value.is_empty() {
                        log::debug!("Empty usb_path in spec file, not filtering by path");
                    } else {
                        self.usb_path = Some(value);
                    }
                    State::RootMapping
                }
                "stages" => State::StagesKey,
                _ => return Err(unexpected_key(key, mark)),
            },
            (State::RootMapping, Event::MappingEnd) => State::Done,

            (State::StagesKey, Event::SequenceStart) => State::StagesSeq,

            (State::StagesSeq, Event::MappingStart) => State::StagesMapping,
            (State::StagesSeq, Event::SequenceEnd) => State::RootMapping,

            (State::StagesMapping, Event::Scalar(key)) => match key.as_str() {
                "vid" => {
                    self.stage.vid = Some(self.value()?);
                    State::StagesMapping
                }
                "pid" => {
                    self.stage.pid = Some(self.value()?);
                    State::StagesMapping
                }
                "steps" => State::StepsKey,
                _ => return Err(unexpected_key(key, mark)),
            },
            (State::StagesMapping, Event::MappingEnd) => {
                let fields = std::mem::take(&mut self.stage);
                let stage =
                    Stage::from_fields(fields.vid.as_deref(), fields.pid.as_deref(), fields.steps)
                        .map_err(|source| SpecError::Field {
                            line: mark.line,
                            column: mark.column,
                            source,
                        })?;
                log::debug!("Parsed stage {}", stage);
                self.stages.push(stage);
                State::StagesSeq
            }

            (State::StepsKey, Event::SequenceStart) => State::StepsSeq,

            (State::StepsSeq, Event::MappingStart) => State::StepsMapping,
            (State::StepsSeq, Event::SequenceEnd) => State::StagesMapping,

            (State::StepsMapping, Event::Scalar(key)) => match key.as_str() {
                "op" => {
                    self.step.op = Some(self.value()?);
                    State::StepsMapping
                }
                "file" => {
                    self.step.file = Some(self.value()?);
                    State::StepsMapping
                }
                "address" => {
                    self.step.address = Some(self.value()?);
                    State::StepsMapping
                }
                _ => return Err(unexpected_key(key, mark)),
            },
            (State::StepsMapping, Event::MappingEnd) => {
                let fields = std::mem::take(&mut self.step);
                let step = Step::from_fields(
                    fields.op.as_deref(),
                    fields.file.as_deref(),
                    fields.address.as_deref(),
                )
                .map_err(|source| SpecError::Field {
                    line: mark.line,
                    column: mark.column,
                    source,
                })?;
                self.stage.steps.push(step);
                State::StepsSeq
            }

            (State::Done, Event::DocumentEnd | Event::StreamEnd) => State::Done,

            (_, event) => return Err(unexpected(&event, mark)),
        };
        Ok(())
    }
}
