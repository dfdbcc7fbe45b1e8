//! Character encoding utilities for delimited text files.
//!
//! This module provides the text encodings understood by the CSV codec and a
//! single conversion path between them: bytes are decoded into Unicode code
//! points one character at a time ([`decode_next`]) and code points are
//! encoded into bytes ([`encode_codepoint`]). Every transcoding helper in this
//! module is built from those two functions, so there is exactly one place
//! where each encoding is interpreted.
//!
//! # Supported encodings
//!
//! - UTF-8
//! - UTF-16 and UTF-32, little and big endian
//! - UCS-2 and UCS-4, little and big endian
//! - Latin-1 (also used for [`TextEncoding::Unknown`] input)

use phf::phf_map;

/// Largest valid Unicode code point.
pub const MAX_CODE_POINT: u32 = 0x10FFFF;

/// Returned by [`decode_next`] when the input is empty or ends in the middle
/// of a character. Callers treat it as end of input.
pub const INVALID_CODE_POINT: u32 = MAX_CODE_POINT + 1;

/// Substituted for malformed byte sequences while decoding.
pub const REPLACEMENT_CHARACTER: u32 = 0xFFFD;

/// Byte order of multi-byte code units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

/// Text encoding of a byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextEncoding {
    /// Encoding not known; bytes are interpreted as Latin-1.
    #[default]
    Unknown,
    Latin1,
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
    Ucs2Le,
    Ucs2Be,
    Ucs4Le,
    Ucs4Be,
}

/// Canonical encoding identifiers, keyed in upper case.
static ENCODING_IDS: phf::Map<&'static str, TextEncoding> = phf_map! {
    "UTF8" => TextEncoding::Utf8,
    "UTF16LE" => TextEncoding::Utf16Le,
    "UTF16BE" => TextEncoding::Utf16Be,
    "UTF32LE" => TextEncoding::Utf32Le,
    "UTF32BE" => TextEncoding::Utf32Be,
    "UCS2LE" => TextEncoding::Ucs2Le,
    "UCS2BE" => TextEncoding::Ucs2Be,
    "UCS4LE" => TextEncoding::Ucs4Le,
    "UCS4BE" => TextEncoding::Ucs4Be,
    "LATIN1" => TextEncoding::Latin1,
};

impl TextEncoding {
    /// Resolve an encoding identifier.
    ///
    /// Canonical identifiers (`UTF8`, `UTF16LE`, `Latin1`, ...) are matched
    /// case-insensitively. Anything else is looked up as a WHATWG label
    /// through `encoding_rs`, so aliases such as `utf-8`, `utf-16be` or
    /// `iso-8859-1` are accepted as well.
    ///
    /// # Examples
    /// ```
    /// use csvtable::common::encoding::TextEncoding;
    ///
    /// assert_eq!(TextEncoding::from_str_id("UTF8"), Some(TextEncoding::Utf8));
    /// assert_eq!(TextEncoding::from_str_id("utf-16le"), Some(TextEncoding::Utf16Le));
    /// assert_eq!(TextEncoding::from_str_id("latin1"), Some(TextEncoding::Latin1));
    /// assert_eq!(TextEncoding::from_str_id("no-such-encoding"), None);
    /// ```
    pub fn from_str_id(id: &str) -> Option<Self> {
        let id = id.trim();
        if id.is_empty() {
            return None;
        }
        if let Some(encoding) = ENCODING_IDS.get(id.to_ascii_uppercase().as_str()) {
            return Some(*encoding);
        }
        from_whatwg_label(id)
    }

    /// Canonical identifier, empty for [`TextEncoding::Unknown`].
    pub const fn as_str_id(self) -> &'static str {
        match self {
            TextEncoding::Unknown => "",
            TextEncoding::Latin1 => "Latin1",
            TextEncoding::Utf8 => "UTF8",
            TextEncoding::Utf16Le => "UTF16LE",
            TextEncoding::Utf16Be => "UTF16BE",
            TextEncoding::Utf32Le => "UTF32LE",
            TextEncoding::Utf32Be => "UTF32BE",
            TextEncoding::Ucs2Le => "UCS2LE",
            TextEncoding::Ucs2Be => "UCS2BE",
            TextEncoding::Ucs4Le => "UCS4LE",
            TextEncoding::Ucs4Be => "UCS4BE",
        }
    }

    /// Size in bytes of one code unit.
    pub const fn code_unit_size(self) -> usize {
        match self {
            TextEncoding::Unknown | TextEncoding::Latin1 | TextEncoding::Utf8 => 1,
            TextEncoding::Utf16Le
            | TextEncoding::Utf16Be
            | TextEncoding::Ucs2Le
            | TextEncoding::Ucs2Be => 2,
            TextEncoding::Utf32Le
            | TextEncoding::Utf32Be
            | TextEncoding::Ucs4Le
            | TextEncoding::Ucs4Be => 4,
        }
    }

    /// Byte order of the code units, `None` for single-byte encodings.
    pub const fn byte_order(self) -> Option<ByteOrder> {
        match self {
            TextEncoding::Unknown | TextEncoding::Latin1 | TextEncoding::Utf8 => None,
            TextEncoding::Utf16Le
            | TextEncoding::Utf32Le
            | TextEncoding::Ucs2Le
            | TextEncoding::Ucs4Le => Some(ByteOrder::LittleEndian),
            TextEncoding::Utf16Be
            | TextEncoding::Utf32Be
            | TextEncoding::Ucs2Be
            | TextEncoding::Ucs4Be => Some(ByteOrder::BigEndian),
        }
    }

    /// Same encoding with the given byte order. Single-byte encodings are
    /// returned unchanged.
    pub const fn with_byte_order(self, order: ByteOrder) -> Self {
        let little = matches!(order, ByteOrder::LittleEndian);
        match self {
            TextEncoding::Utf16Le | TextEncoding::Utf16Be => {
                if little { TextEncoding::Utf16Le } else { TextEncoding::Utf16Be }
            },
            TextEncoding::Utf32Le | TextEncoding::Utf32Be => {
                if little { TextEncoding::Utf32Le } else { TextEncoding::Utf32Be }
            },
            TextEncoding::Ucs2Le | TextEncoding::Ucs2Be => {
                if little { TextEncoding::Ucs2Le } else { TextEncoding::Ucs2Be }
            },
            TextEncoding::Ucs4Le | TextEncoding::Ucs4Be => {
                if little { TextEncoding::Ucs4Le } else { TextEncoding::Ucs4Be }
            },
            other => other,
        }
    }

    /// Largest code point the encoding can represent.
    pub const fn max_code_point(self) -> u32 {
        match self {
            TextEncoding::Unknown | TextEncoding::Latin1 => 0xFF,
            TextEncoding::Ucs2Le | TextEncoding::Ucs2Be => 0xFFFF,
            _ => MAX_CODE_POINT,
        }
    }

    /// Byte-order mark of the encoding, empty when it has none.
    pub const fn bom(self) -> &'static [u8] {
        crate::common::bom::bom_bytes(self)
    }
}

fn from_whatwg_label(label: &str) -> Option<TextEncoding> {
    let encoding = encoding_rs::Encoding::for_label(label.as_bytes())?;
    // WHATWG folds ISO-8859-1 into windows-1252; both are read as Latin-1 here.
    if encoding == encoding_rs::UTF_8 {
        Some(TextEncoding::Utf8)
    } else if encoding == encoding_rs::UTF_16LE {
        Some(TextEncoding::Utf16Le)
    } else if encoding == encoding_rs::UTF_16BE {
        Some(TextEncoding::Utf16Be)
    } else if encoding == encoding_rs::WINDOWS_1252 {
        Some(TextEncoding::Latin1)
    } else {
        None
    }
}

/// Default handler for code points the target encoding cannot represent.
#[inline]
pub fn default_unconvertible_handler(_cp: u32) -> u32 {
    u32::from(b'?')
}

#[inline]
const fn is_surrogate(cp: u32) -> bool {
    matches!(cp, 0xD800..=0xDFFF)
}

/// Decode one character from the start of `bytes`.
///
/// Returns the code point and the number of bytes consumed. Malformed
/// sequences decode to [`REPLACEMENT_CHARACTER`]. Empty or truncated input
/// (a character that needs more bytes than are available) yields
/// [`INVALID_CODE_POINT`] with all remaining bytes consumed; streaming callers
/// that can fetch more data retry with a longer buffer, everybody else treats
/// it as end of input.
///
/// # Examples
/// ```
/// use csvtable::common::encoding::{decode_next, TextEncoding, INVALID_CODE_POINT};
///
/// assert_eq!(decode_next(TextEncoding::Utf8, "ä,".as_bytes()), (0xE4, 2));
/// assert_eq!(decode_next(TextEncoding::Utf16Le, b"a\x00"), (0x61, 2));
/// assert_eq!(decode_next(TextEncoding::Utf8, b"\xE2\x82"), (INVALID_CODE_POINT, 2));
/// ```
pub fn decode_next(encoding: TextEncoding, bytes: &[u8]) -> (u32, usize) {
    if bytes.is_empty() {
        return (INVALID_CODE_POINT, 0);
    }
    match encoding {
        TextEncoding::Unknown | TextEncoding::Latin1 => (u32::from(bytes[0]), 1),
        TextEncoding::Utf8 => decode_utf8(bytes),
        TextEncoding::Utf16Le => decode_utf16(bytes, ByteOrder::LittleEndian),
        TextEncoding::Utf16Be => decode_utf16(bytes, ByteOrder::BigEndian),
        TextEncoding::Ucs2Le => decode_ucs2(bytes, ByteOrder::LittleEndian),
        TextEncoding::Ucs2Be => decode_ucs2(bytes, ByteOrder::BigEndian),
        TextEncoding::Utf32Le | TextEncoding::Ucs4Le => decode_utf32(bytes, ByteOrder::LittleEndian),
        TextEncoding::Utf32Be | TextEncoding::Ucs4Be => decode_utf32(bytes, ByteOrder::BigEndian),
    }
}

/// Length of the UTF-8 sequence started by `lead`, 0 for bytes that cannot
/// start a sequence.
#[inline]
pub const fn utf8_sequence_length(lead: u8) -> usize {
    if lead < 0x80 {
        1
    } else if lead >> 5 == 0x6 {
        2
    } else if lead >> 4 == 0xE {
        3
    } else if lead >> 3 == 0x1E {
        4
    } else {
        0
    }
}

fn decode_utf8(bytes: &[u8]) -> (u32, usize) {
    let lead = bytes[0];
    let len = utf8_sequence_length(lead);
    match len {
        0 => return (REPLACEMENT_CHARACTER, 1),
        1 => return (u32::from(lead), 1),
        _ => {},
    }

    let available = len.min(bytes.len());
    if bytes[1..available].iter().any(|&b| b & 0xC0 != 0x80) {
        return (REPLACEMENT_CHARACTER, 1);
    }
    if bytes.len() < len {
        return (INVALID_CODE_POINT, bytes.len());
    }

    let mut cp = u32::from(lead & (0x7F >> len));
    for &b in &bytes[1..len] {
        cp = (cp << 6) | u32::from(b & 0x3F);
    }

    let min = match len {
        2 => 0x80,
        3 => 0x800,
        _ => 0x10000,
    };
    if cp < min || cp > MAX_CODE_POINT || is_surrogate(cp) {
        return (REPLACEMENT_CHARACTER, len);
    }
    (cp, len)
}

#[inline]
fn read_u16(bytes: &[u8], order: ByteOrder) -> u32 {
    let pair = [bytes[0], bytes[1]];
    u32::from(match order {
        ByteOrder::LittleEndian => u16::from_le_bytes(pair),
        ByteOrder::BigEndian => u16::from_be_bytes(pair),
    })
}

fn decode_utf16(bytes: &[u8], order: ByteOrder) -> (u32, usize) {
    if bytes.len() < 2 {
        return (INVALID_CODE_POINT, bytes.len());
    }
    let unit = read_u16(bytes, order);
    match unit {
        0xD800..=0xDBFF => {
            if bytes.len() < 4 {
                return (INVALID_CODE_POINT, bytes.len());
            }
            let trail = read_u16(&bytes[2..], order);
            if (0xDC00..=0xDFFF).contains(&trail) {
                (0x10000 + ((unit - 0xD800) << 10) + (trail - 0xDC00), 4)
            } else {
                (REPLACEMENT_CHARACTER, 2)
            }
        },
        0xDC00..=0xDFFF => (REPLACEMENT_CHARACTER, 2),
        _ => (unit, 2),
    }
}

fn decode_ucs2(bytes: &[u8], order: ByteOrder) -> (u32, usize) {
    if bytes.len() < 2 {
        return (INVALID_CODE_POINT, bytes.len());
    }
    let unit = read_u16(bytes, order);
    if is_surrogate(unit) {
        (REPLACEMENT_CHARACTER, 2)
    } else {
        (unit, 2)
    }
}

fn decode_utf32(bytes: &[u8], order: ByteOrder) -> (u32, usize) {
    if bytes.len() < 4 {
        return (INVALID_CODE_POINT, bytes.len());
    }
    let quad = [bytes[0], bytes[1], bytes[2], bytes[3]];
    let cp = match order {
        ByteOrder::LittleEndian => u32::from_le_bytes(quad),
        ByteOrder::BigEndian => u32::from_be_bytes(quad),
    };
    if cp > MAX_CODE_POINT || is_surrogate(cp) {
        (REPLACEMENT_CHARACTER, 4)
    } else {
        (cp, 4)
    }
}

/// Encode a code point, replacing unrepresentable ones with `'?'`.
///
/// See [`encode_codepoint_with`].
#[inline]
pub fn encode_codepoint<E: Extend<u8>>(cp: u32, encoding: TextEncoding, out: &mut E) {
    encode_codepoint_with(cp, encoding, out, default_unconvertible_handler);
}

/// Encode a code point into `out`.
///
/// Code points the target cannot represent (above 0xFF for Latin-1, above
/// 0xFFFF for UCS-2, surrogates, anything above [`MAX_CODE_POINT`]) are passed
/// to `unconvertible` and its result is encoded instead. If the substitute is
/// not representable either, `'?'` is written. Byte order follows the
/// encoding variant; use [`TextEncoding::with_byte_order`] to override it.
///
/// # Examples
/// ```
/// use csvtable::common::encoding::{encode_codepoint, encode_codepoint_with, TextEncoding};
///
/// let mut out = Vec::new();
/// encode_codepoint(0x20AC, TextEncoding::Utf16Be, &mut out);
/// assert_eq!(out, [0x20, 0xAC]);
///
/// let mut out = Vec::new();
/// encode_codepoint_with(0x20AC, TextEncoding::Latin1, &mut out, |_| u32::from(b'E'));
/// assert_eq!(out, b"E");
/// ```
pub fn encode_codepoint_with<E, F>(cp: u32, encoding: TextEncoding, out: &mut E, mut unconvertible: F)
where
    E: Extend<u8>,
    F: FnMut(u32) -> u32,
{
    let max = encoding.max_code_point();
    let cp = if cp > max || is_surrogate(cp) {
        let substitute = unconvertible(cp);
        if substitute > max || is_surrogate(substitute) {
            u32::from(b'?')
        } else {
            substitute
        }
    } else {
        cp
    };

    match encoding {
        TextEncoding::Unknown | TextEncoding::Latin1 => out.extend([cp as u8]),
        TextEncoding::Utf8 => {
            let ch = char::from_u32(cp).unwrap_or(char::REPLACEMENT_CHARACTER);
            let mut buf = [0u8; 4];
            out.extend(ch.encode_utf8(&mut buf).bytes());
        },
        TextEncoding::Utf16Le | TextEncoding::Utf16Be => {
            let ch = char::from_u32(cp).unwrap_or(char::REPLACEMENT_CHARACTER);
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units).iter() {
                push_u16(*unit, encoding, out);
            }
        },
        TextEncoding::Ucs2Le | TextEncoding::Ucs2Be => push_u16(cp as u16, encoding, out),
        TextEncoding::Utf32Le | TextEncoding::Ucs4Le => out.extend(cp.to_le_bytes()),
        TextEncoding::Utf32Be | TextEncoding::Ucs4Be => out.extend(cp.to_be_bytes()),
    }
}

#[inline]
fn push_u16<E: Extend<u8>>(unit: u16, encoding: TextEncoding, out: &mut E) {
    match encoding.byte_order() {
        Some(ByteOrder::BigEndian) => out.extend(unit.to_be_bytes()),
        _ => out.extend(unit.to_le_bytes()),
    }
}

/// Iterator over the code points of an encoded buffer.
///
/// Stops at the end of the buffer or at a truncated trailing character.
#[derive(Debug, Clone)]
pub struct Codepoints<'a> {
    bytes: &'a [u8],
    pos: usize,
    encoding: TextEncoding,
}

impl<'a> Codepoints<'a> {
    pub fn new(bytes: &'a [u8], encoding: TextEncoding) -> Self {
        Self {
            bytes,
            pos: 0,
            encoding,
        }
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl Iterator for Codepoints<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        let (cp, consumed) = decode_next(self.encoding, &self.bytes[self.pos..]);
        self.pos += consumed;
        (cp != INVALID_CODE_POINT).then_some(cp)
    }
}

/// Decode an encoded buffer into a UTF-8 string.
pub fn decode_to_string(bytes: &[u8], encoding: TextEncoding) -> String {
    Codepoints::new(bytes, encoding)
        .map(|cp| char::from_u32(cp).unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Encode a UTF-8 string into `out`.
pub fn encode_str<E, F>(text: &str, encoding: TextEncoding, out: &mut E, mut unconvertible: F)
where
    E: Extend<u8>,
    F: FnMut(u32) -> u32,
{
    if encoding == TextEncoding::Utf8 {
        out.extend(text.bytes());
        return;
    }
    for ch in text.chars() {
        encode_codepoint_with(u32::from(ch), encoding, out, &mut unconvertible);
    }
}

/// Convert bytes between two encodings through their code points.
pub fn transcode<F>(bytes: &[u8], from: TextEncoding, to: TextEncoding, mut unconvertible: F) -> Vec<u8>
where
    F: FnMut(u32) -> u32,
{
    let mut out = Vec::with_capacity(bytes.len());
    for cp in Codepoints::new(bytes, from) {
        encode_codepoint_with(cp, to, &mut out, &mut unconvertible);
    }
    out
}

/// Narrow UTF-8 text to Latin-1.
#[inline]
pub fn utf8_to_latin1<F: FnMut(u32) -> u32>(text: &str, unconvertible: F) -> Vec<u8> {
    transcode(text.as_bytes(), TextEncoding::Utf8, TextEncoding::Latin1, unconvertible)
}

/// Widen Latin-1 bytes to UTF-8 text.
#[inline]
pub fn latin1_to_utf8(bytes: &[u8]) -> String {
    decode_to_string(bytes, TextEncoding::Latin1)
}
