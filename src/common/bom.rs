//! Byte Order Mark (BOM) utilities.
//!
//! Provides detection, stripping, and writing helpers for the Unicode
//! encodings a delimited text file can be stored in.

use crate::common::Result;
use crate::common::encoding::TextEncoding;
use std::io::{Read, Seek, SeekFrom, Write};

/// UTF-8 BOM bytes.
pub const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];
/// UTF-16 little-endian BOM bytes.
pub const UTF16_LE_BOM: [u8; 2] = [0xFF, 0xFE];
/// UTF-16 big-endian BOM bytes.
pub const UTF16_BE_BOM: [u8; 2] = [0xFE, 0xFF];
/// UTF-32 little-endian BOM bytes.
pub const UTF32_LE_BOM: [u8; 4] = [0xFF, 0xFE, 0x00, 0x00];
/// UTF-32 big-endian BOM bytes.
pub const UTF32_BE_BOM: [u8; 4] = [0x00, 0x00, 0xFE, 0xFF];

/// Longest BOM in bytes.
pub const MAX_BOM_LEN: usize = 4;

/// Returns the BOM written for `encoding`.
///
/// UCS-2 and UCS-4 share the marks of UTF-16 and UTF-32. Latin-1 and unknown
/// encodings have no BOM.
#[inline]
pub const fn bom_bytes(encoding: TextEncoding) -> &'static [u8] {
    match encoding {
        TextEncoding::Utf8 => &UTF8_BOM,
        TextEncoding::Utf16Le | TextEncoding::Ucs2Le => &UTF16_LE_BOM,
        TextEncoding::Utf16Be | TextEncoding::Ucs2Be => &UTF16_BE_BOM,
        TextEncoding::Utf32Le | TextEncoding::Ucs4Le => &UTF32_LE_BOM,
        TextEncoding::Utf32Be | TextEncoding::Ucs4Be => &UTF32_BE_BOM,
        TextEncoding::Unknown | TextEncoding::Latin1 => &[],
    }
}

/// Classifies the stream by its leading BOM.
///
/// Returns the encoding announced by the BOM and the BOM length in bytes, or
/// `(TextEncoding::Unknown, 0)` when `bytes` does not start with one. Marks
/// are reported as the UTF variants; UCS-2/UCS-4 cannot be told apart from
/// them by the BOM alone.
pub fn detect_bom(bytes: &[u8]) -> (TextEncoding, usize) {
    // UTF-32LE must be tested before UTF-16LE, it starts with the same two bytes.
    if bytes.starts_with(&UTF32_BE_BOM) {
        return (TextEncoding::Utf32Be, UTF32_BE_BOM.len());
    }
    if bytes.starts_with(&UTF32_LE_BOM) {
        return (TextEncoding::Utf32Le, UTF32_LE_BOM.len());
    }
    if bytes.starts_with(&UTF8_BOM) {
        return (TextEncoding::Utf8, UTF8_BOM.len());
    }
    if bytes.starts_with(&UTF16_BE_BOM) {
        return (TextEncoding::Utf16Be, UTF16_BE_BOM.len());
    }
    if bytes.starts_with(&UTF16_LE_BOM) {
        return (TextEncoding::Utf16Le, UTF16_LE_BOM.len());
    }
    (TextEncoding::Unknown, 0)
}

/// Whether a BOM detected as `detected` is the mark of `encoding`, i.e.
/// whether it should be skipped when decoding as `encoding`.
pub fn is_bom_of(detected: TextEncoding, encoding: TextEncoding) -> bool {
    let bom = bom_bytes(encoding);
    !bom.is_empty() && bom == bom_bytes(detected)
}

/// Detects and consumes a BOM if present.
///
/// Returns the detected encoding and BOM length and leaves the reader
/// positioned after the BOM. When no BOM is found, rewinds the reader to the
/// original position and returns `Ok(None)`.
pub fn strip_bom<R: Read + Seek>(reader: &mut R) -> Result<Option<(TextEncoding, usize)>> {
    let start = reader.stream_position()?;
    let mut buf = [0u8; MAX_BOM_LEN];
    let mut read = 0usize;

    while read < buf.len() {
        match reader.read(&mut buf[read..])? {
            0 => break,
            n => read += n,
        }
    }

    match detect_bom(&buf[..read]) {
        (TextEncoding::Unknown, _) => {
            reader.seek(SeekFrom::Start(start))?;
            Ok(None)
        },
        (encoding, len) => {
            reader.seek(SeekFrom::Start(start + len as u64))?;
            Ok(Some((encoding, len)))
        },
    }
}

/// Writes the BOM of `encoding` to the writer. Does nothing for encodings
/// without a BOM.
pub fn write_bom<W: Write>(writer: &mut W, encoding: TextEncoding) -> Result<()> {
    writer.write_all(bom_bytes(encoding))?;
    Ok(())
}
