//! Character literals as they appear in format configuration.
//!
//! Separator and enclosing characters are persisted as C-style character
//! literals so that non-printable characters survive a text config file:
//! `,` `\t` `\x1f` `\x3b` `\073`.

use crate::common::{Error, Result};

/// Parses a single-character literal into its code point.
///
/// Accepted forms:
/// - a single character (`;`)
/// - a simple escape (`\t`, `\n`, `\r`, `\v`, `\f`, `\a`, `\b`, `\0`, `\\`, `\'`, `\"`, `\?`)
/// - a hex escape with one or more digits (`\x9`, `\x2c`)
/// - an octal escape with one to three digits (`\054`)
///
/// # Examples
/// ```
/// use csvtable::common::literal::parse_char_literal;
///
/// assert_eq!(parse_char_literal(";").unwrap(), u32::from(b';'));
/// assert_eq!(parse_char_literal("\\t").unwrap(), u32::from(b'\t'));
/// assert_eq!(parse_char_literal("\\x2c").unwrap(), u32::from(b','));
/// assert!(parse_char_literal("ab").is_err());
/// ```
pub fn parse_char_literal(literal: &str) -> Result<u32> {
    let invalid = || Error::ParseError(format!("Invalid character literal: '{}'", literal));

    let mut chars = literal.chars();
    let first = chars.next().ok_or_else(invalid)?;
    if first != '\\' {
        return match chars.next() {
            None => Ok(u32::from(first)),
            Some(_) => Err(invalid()),
        };
    }

    let rest = chars.as_str();
    let mut rest_chars = rest.chars();
    let kind = rest_chars.next().ok_or_else(invalid)?;
    let tail = rest_chars.as_str();

    let simple = match kind {
        't' => Some(0x09),
        'n' => Some(0x0A),
        'r' => Some(0x0D),
        'v' => Some(0x0B),
        'f' => Some(0x0C),
        'a' => Some(0x07),
        'b' => Some(0x08),
        '\\' => Some(u32::from('\\')),
        '\'' => Some(u32::from('\'')),
        '"' => Some(u32::from('"')),
        '?' => Some(u32::from('?')),
        _ => None,
    };
    if let Some(value) = simple {
        return if tail.is_empty() { Ok(value) } else { Err(invalid()) };
    }

    let (digits, radix, max_digits) = match kind {
        'x' | 'X' => (tail, 16, 8),
        '0'..='7' => (rest, 8, 3),
        _ => return Err(invalid()),
    };
    if digits.is_empty() || digits.len() > max_digits || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(invalid());
    }
    let value = u32::from_str_radix(digits, radix).map_err(|_| invalid())?;
    if char::from_u32(value).is_none() {
        return Err(invalid());
    }
    Ok(value)
}

/// Formats a code point as a hex escape literal, e.g. `\x2c` for `,`.
///
/// The output is always accepted by [`parse_char_literal`].
pub fn format_char_literal(cp: u32) -> String {
    format!("\\x{:x}", cp)
}
