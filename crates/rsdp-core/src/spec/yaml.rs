//! YAML event source backed by yaml-rust2's streaming parser

use std::str::Chars;

use yaml_rust2::parser::{Event as YamlEvent, Parser};
use yaml_rust2::scanner::{Marker, TScalarStyle};

use super::event::{Event, EventSource, Mark};
use crate::error::SpecError;

/// Streams events out of a YAML document
pub struct YamlEvents<'a> {
    parser: Parser<Chars<'a>>,
}

impl<'a> YamlEvents<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            parser: Parser::new_from_str(source),
        }
    }
}

// yaml-rust2 lines are 1-based, columns 0-based
fn mark(marker: &Marker) -> Mark {
    Mark::new(marker.line(), marker.col() + 1)
}

impl EventSource for YamlEvents<'_> {
    fn next_event(&mut self) -> Result<(Event, Mark), SpecError> {
        let (event, marker) = self.parser.next_token().map_err(|e| SpecError::Yaml {
            line: e.marker().line(),
            column: e.marker().col() + 1,
            message: e.info().to_string(),
        })?;

        let event = match event {
            YamlEvent::StreamStart => Event::StreamStart,
            YamlEvent::StreamEnd => Event::StreamEnd,
            YamlEvent::DocumentStart => Event::DocumentStart,
            YamlEvent::DocumentEnd => Event::DocumentEnd,
            YamlEvent::Alias(..) => Event::Alias,
            // An absent value (`key:`) comes out as a plain `~`
            YamlEvent::Scalar(value, TScalarStyle::Plain, ..) if value == "~" => {
                Event::Scalar(String::new())
            }
            YamlEvent::Scalar(value, ..) => Event::Scalar(value),
            YamlEvent::SequenceStart(..) => Event::SequenceStart,
            YamlEvent::SequenceEnd => Event::SequenceEnd,
            YamlEvent::MappingStart(..) => Event::MappingStart,
            YamlEvent::MappingEnd => Event::MappingEnd,
            YamlEvent::Nothing => {
                return Err(SpecError::Yaml {
                    line: marker.line(),
                    column: marker.col() + 1,
                    message: "empty event".to_string(),
                })
            }
        };

        log::trace!("{} at {}:{}", event.kind(), marker.line(), marker.col() + 1);
        Ok((event, mark(&marker)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(src: &str) -> Vec<Event> {
        let mut events = YamlEvents::new(src);
        let mut out = Vec::new();
        loop {
            let (event, _) = events.next_event().unwrap();
            let done = event == Event::StreamEnd;
            out.push(event);
            if done {
                return out;
            }
        }
    }

    #[test]
    fn test_event_stream() {
        assert_eq!(
            collect("stages:\n  - vid: 15a2\n"),
            vec![
                Event::StreamStart,
                Event::DocumentStart,
                Event::MappingStart,
                Event::Scalar("stages".into()),
                Event::SequenceStart,
                Event::MappingStart,
                Event::Scalar("vid".into()),
                Event::Scalar("15a2".into()),
                Event::MappingEnd,
                Event::SequenceEnd,
                Event::MappingEnd,
                Event::DocumentEnd,
                Event::StreamEnd,
            ]
        );
    }

    #[test]
    fn test_scalars_stay_text() {
        // Leading zeros must survive: PIDs like 0130 are hex, not octal/decimal
        let events = collect("pid: 0130\n");
        assert!(events.contains(&Event::Scalar("0130".into())));
    }

    #[test]
    fn test_missing_value_is_empty() {
        let events = collect("usb_path:\nother: '~'\n");
        assert!(events.contains(&Event::Scalar(String::new())));
        assert!(events.contains(&Event::Scalar("~".into())));
    }

    #[test]
    fn test_positions() {
        let mut events = YamlEvents::new("a: b\nc: d\n");
        let mut marks = Vec::new();
        loop {
            let (event, mark) = events.next_event().unwrap();
            if let Event::Scalar(value) = &event {
                marks.push((value.clone(), mark));
            }
            if event == Event::StreamEnd {
                break;
            }
        }
        assert_eq!(marks[2], ("c".to_string(), Mark::new(2, 1)));
        assert_eq!(marks[3], ("d".to_string(), Mark::new(2, 4)));
    }

    #[test]
    fn test_lexer_error() {
        let mut events = YamlEvents::new("stages: [\n");
        let err = loop {
            match events.next_event() {
                Ok((Event::StreamEnd, _)) => panic!("expected a YAML error"),
                Ok(_) => continue,
                Err(e) => break e,
            }
        };
        assert!(matches!(err, SpecError::Yaml { .. }));
    }
}
