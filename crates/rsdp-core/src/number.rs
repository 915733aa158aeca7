//! Hex field parsing for VID, PID and addresses
//!
//! Values are always hexadecimal. An `0x`/`0X` prefix is tolerated but not
//! required, and the whole field must be consumed: `"1fc9xyz"` is rejected
//! rather than read as `0x1fc9`.

use crate::error::{NumberProblem, ParseError, Result};

fn parse_hex(field: &'static str, s: &str, max: u64) -> Result<u64> {
    let invalid = |problem| ParseError::InvalidNumber {
        field,
        value: s.to_string(),
        problem,
    };

    let trimmed = s.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.is_empty() {
        return Err(invalid(NumberProblem::Empty));
    }

    let mut value: u64 = 0;
    for c in digits.chars() {
        let digit = c.to_digit(16).ok_or_else(|| invalid(NumberProblem::NotHex))?;
        value = value
            .checked_mul(16)
            .and_then(|v| v.checked_add(u64::from(digit)))
            .filter(|v| *v <= max)
            .ok_or_else(|| invalid(NumberProblem::OutOfRange))?;
    }

    Ok(value)
}

/// Parse a 32-bit hex address
pub fn parse_address(s: &str) -> Result<u32> {
    parse_hex("address", s, u64::from(u32::MAX)).map(|v| v as u32)
}

/// Parse a 16-bit hex USB ID (`field` names it in errors)
pub fn parse_usb_id(field: &'static str, s: &str) -> Result<u16> {
    parse_hex(field, s, u64::from(u16::MAX)).map(|v| v as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("877ff400"), Ok(0x877f_f400));
        assert_eq!(parse_address("877FF400"), Ok(0x877f_f400));
        assert_eq!(parse_address("0x10"), Ok(0x10));
        assert_eq!(parse_address("ffffffff"), Ok(u32::MAX));
        assert_eq!(parse_address("0"), Ok(0));
    }

    #[test]
    fn test_parse_address_rejects() {
        assert!(matches!(
            parse_address("100000000"),
            Err(ParseError::InvalidNumber {
                problem: NumberProblem::OutOfRange,
                ..
            })
        ));
        assert!(matches!(
            parse_address(""),
            Err(ParseError::InvalidNumber {
                problem: NumberProblem::Empty,
                ..
            })
        ));
        assert!(matches!(
            parse_address("0x"),
            Err(ParseError::InvalidNumber {
                problem: NumberProblem::Empty,
                ..
            })
        ));
        assert!(matches!(
            parse_address("1fc9xyz"),
            Err(ParseError::InvalidNumber {
                problem: NumberProblem::NotHex,
                ..
            })
        ));
        assert!(parse_address("-1").is_err());
    }

    #[test]
    fn test_parse_usb_id() {
        assert_eq!(parse_usb_id("VID", "1fc9"), Ok(0x1fc9));
        assert_eq!(parse_usb_id("VID", "1FC9"), parse_usb_id("VID", "1fc9"));
        assert_eq!(parse_usb_id("PID", "0130"), Ok(0x0130));
        assert!(parse_usb_id("VID", "zzzz").is_err());
        assert!(parse_usb_id("PID", "10000").is_err());
    }

    #[test]
    fn test_error_names_field() {
        let err = parse_usb_id("PID", "qq").unwrap_err();
        assert_eq!(err.to_string(), "invalid PID value \"qq\": not a hex number");
    }
}
