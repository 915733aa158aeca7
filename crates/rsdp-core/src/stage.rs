//! Stages: one device-targeting session each
//!
//! A stage is a USB VID/PID plus a non-empty, ordered list of steps. On the
//! command line every positional argument is one stage:
//!
//! ```text
//! <VID>:<PID>[,<STEP>]...
//! 1fc9:0130,write_file:u-boot.bin:877ff400,jump_address:877ff400
//! ```
//!
//! Spec files deliver the same information as separate `vid`, `pid` and
//! `steps` values, see [`crate::spec`].

use std::fmt;

use crate::error::{ParseError, Result};
use crate::number::parse_usb_id;
use crate::step::Step;

/// Maximum hex digits for VID/PID in the CLI stage token
const USB_ID_DIGITS: usize = 4;

/// A VID/PID target plus the steps to run against it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    vid: u16,
    pid: u16,
    steps: Vec<Step>,
}

impl Stage {
    /// Create a stage; at least one step is required
    pub fn new(vid: u16, pid: u16, steps: Vec<Step>) -> Result<Self> {
        if steps.is_empty() {
            return Err(ParseError::NoSteps);
        }
        Ok(Self { vid, pid, steps })
    }

    /// Parse one CLI stage argument
    pub fn parse(s: &str) -> Result<Self> {
        let mut tokens = s.split(',');
        let (vid, pid) = parse_vid_pid(tokens.next().unwrap_or_default())?;

        let steps = tokens
            .enumerate()
            .map(|(i, token)| {
                if token.is_empty() {
                    return Err(ParseError::EmptyStep.in_step(i + 1));
                }
                Step::parse_token(token).map_err(|e| e.in_step(i + 1))
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(vid, pid, steps)
    }

    /// Build a stage from spec-file values; takes ownership of `steps`
    pub fn from_fields(vid: Option<&str>, pid: Option<&str>, steps: Vec<Step>) -> Result<Self> {
        let (Some(vid), Some(pid)) = (vid, pid) else {
            return Err(ParseError::VidPidUnset);
        };
        if steps.is_empty() {
            return Err(ParseError::NoSteps);
        }

        Self::new(parse_usb_id("VID", vid)?, parse_usb_id("PID", pid)?, steps)
    }

    pub fn vid(&self) -> u16 {
        self.vid
    }

    pub fn pid(&self) -> u16 {
        self.pid
    }

    /// Steps in execution order
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

impl fmt::Display for Stage {
    /// Formats the stage as a CLI argument
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vid, self.pid)?;
        for step in &self.steps {
            write!(f, ",{}", step)?;
        }
        Ok(())
    }
}

/// Parse the leading `VID:PID` token, each 1 to 4 hex digits
fn parse_vid_pid(token: &str) -> Result<(u16, u16)> {
    let invalid = || ParseError::InvalidVidPid(token.to_string());

    let (vid, pid) = token.split_once(':').ok_or_else(invalid)?;
    let is_id = |s: &str| {
        !s.is_empty() && s.len() <= USB_ID_DIGITS && s.chars().all(|c| c.is_ascii_hexdigit())
    };
    if !is_id(vid) || !is_id(pid) {
        return Err(invalid());
    }

    Ok((parse_usb_id("VID", vid)?, parse_usb_id("PID", pid)?))
}

/// Parse all CLI stage arguments, in order
///
/// Fails on the first invalid stage; nothing parsed before it is returned.
pub fn parse_stages<S: AsRef<str>>(args: &[S]) -> Result<Vec<Stage>> {
    args.iter()
        .enumerate()
        .map(|(i, arg)| Stage::parse(arg.as_ref()).map_err(|e| e.in_stage(i + 1)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_stage() {
        let stage =
            Stage::parse("1fc9:0130,write_file:u-boot.bin:877ff400,jump_address:877ff400").unwrap();
        assert_eq!(stage.vid(), 0x1fc9);
        assert_eq!(stage.pid(), 0x0130);
        assert_eq!(
            stage.steps(),
            &[
                Step::WriteFile {
                    file_path: PathBuf::from("u-boot.bin"),
                    address: 0x877f_f400,
                },
                Step::JumpAddress { address: 0x877f_f400 },
            ]
        );
    }

    #[test]
    fn test_vid_pid_case_insensitive() {
        let lower = Stage::parse("1fc9:0130,jump_address:0").unwrap();
        let upper = Stage::parse("1FC9:0130,jump_address:0").unwrap();
        assert_eq!(lower, upper);
    }

    #[test]
    fn test_invalid_vid_pid() {
        for token in [
            "zzzz:0130,jump_address:0",
            "1fc9,jump_address:0",
            "12345:0130,jump_address:0",
            "1fc9:,jump_address:0",
            ":0130,jump_address:0",
            "1fc9:0130xyz,jump_address:0",
        ] {
            assert!(
                matches!(Stage::parse(token), Err(ParseError::InvalidVidPid(_))),
                "{} should be rejected",
                token
            );
        }
    }

    #[test]
    fn test_stage_without_steps() {
        assert_eq!(Stage::parse("1fc9:0130"), Err(ParseError::NoSteps));
        assert_eq!(Stage::new(1, 2, Vec::new()), Err(ParseError::NoSteps));
    }

    #[test]
    fn test_bad_step_reports_index() {
        let err = Stage::parse("1fc9:0130,jump_address:0,frobnicate:1").unwrap_err();
        assert_eq!(
            err,
            ParseError::InStep {
                step: 2,
                source: Box::new(ParseError::UnknownOperation("frobnicate".into())),
            }
        );
        assert!(matches!(
            Stage::parse("1fc9:0130,,jump_address:0"),
            Err(ParseError::InStep { step: 1, .. })
        ));
    }

    #[test]
    fn test_from_fields() {
        let steps = vec![Step::JumpAddress { address: 0x10 }];
        let stage = Stage::from_fields(Some("15a2"), Some("0080"), steps.clone()).unwrap();
        assert_eq!(stage, Stage::new(0x15a2, 0x0080, steps.clone()).unwrap());

        assert_eq!(
            Stage::from_fields(None, Some("0080"), steps.clone()),
            Err(ParseError::VidPidUnset)
        );
        assert_eq!(
            Stage::from_fields(Some("15a2"), Some("0080"), Vec::new()),
            Err(ParseError::NoSteps)
        );
        assert!(Stage::from_fields(Some("15a2"), Some("10000"), steps).is_err());
    }

    #[test]
    fn test_parse_stages_in_order() {
        let stages = parse_stages(&[
            "15a2:0080,write_file:spl.bin:00910000,jump_address:00910000",
            "0525:b4a4,write_file:u-boot.img:877ff400,jump_address:877ff400",
        ])
        .unwrap();
        assert_eq!(stages.len(), 2);
        assert_eq!((stages[0].vid(), stages[0].pid()), (0x15a2, 0x0080));
        assert_eq!((stages[1].vid(), stages[1].pid()), (0x0525, 0xb4a4));
    }

    #[test]
    fn test_parse_stages_fails_mid_list() {
        let err = parse_stages(&[
            "15a2:0080,jump_address:0",
            "0525:b4a4,jump_address:0",
            "0525:b4a4,write_file:only-a-file",
        ])
        .unwrap_err();
        assert!(matches!(err, ParseError::InStage { stage: 3, .. }));
    }

    #[test]
    fn test_display_round_trip() {
        let arg = "1fc9:0130,write_file:u-boot.bin:877ff400,jump_address:877ff400";
        let stage = Stage::parse(arg).unwrap();
        assert_eq!(stage.to_string(), arg);
        assert_eq!(Stage::parse(&stage.to_string()).unwrap(), stage);
    }
}
