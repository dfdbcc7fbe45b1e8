//! Streaming tokenizer for delimited text.
//!
//! The reader pulls decoded code points from a [`CodepointSource`] and runs
//! them through a small state machine. Every completed field is handed to a
//! callback as `(row, col, text)`; the reader itself stores nothing.
//!
//! Line breaks are recognized as `\n`, `\r` or `\r\n` regardless of the
//! configured terminator. The first one seen is reported back so the caller
//! can remember the convention of the file.

use std::convert::Infallible;
use std::io::{self, Read};

use memchr::memchr3;
use tracing::{debug, warn};

use crate::common::TextEncoding;
use crate::common::encoding::{Codepoints, INVALID_CODE_POINT, decode_next};
use crate::sheet::types::{Index, MAX_INDEX};

use super::detect::{DEFAULT_ENCLOSING, detect_enclosing, detect_separator};
use super::format::{CsvFormatDefinition, Dialect, EolType, MetaChar};

/// Code points inspected by auto-detection.
pub const DEFAULT_SAMPLE_SIZE: usize = 64 * 1024;

/// Bytes fetched per read by [`StreamSource`].
pub const STREAM_BUFFER_SIZE: usize = 64 * 1024;

const LF: u32 = 0x0A;
const CR: u32 = 0x0D;

/// Sequential supplier of decoded code points.
pub trait CodepointSource {
    type Error;

    /// Next code point, `Ok(None)` at end of input.
    fn next_codepoint(&mut self) -> Result<Option<u32>, Self::Error>;
}

/// Code points of an in-memory buffer.
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    codepoints: Codepoints<'a>,
}

impl<'a> SliceSource<'a> {
    pub fn new(bytes: &'a [u8], encoding: TextEncoding) -> Self {
        Self {
            codepoints: Codepoints::new(bytes, encoding),
        }
    }
}

impl CodepointSource for SliceSource<'_> {
    type Error = Infallible;

    #[inline]
    fn next_codepoint(&mut self) -> Result<Option<u32>, Infallible> {
        Ok(self.codepoints.next())
    }
}

/// Code points of a byte stream, decoded through a refilling buffer.
///
/// A character split across two reads is decoded once the rest of it has
/// arrived. Truncated input at the very end of the stream ends the source.
pub struct StreamSource<R> {
    reader: R,
    encoding: TextEncoding,
    buf: Box<[u8]>,
    start: usize,
    end: usize,
    eof: bool,
}

impl<R: Read> StreamSource<R> {
    pub fn new(reader: R, encoding: TextEncoding) -> Self {
        Self::with_capacity(reader, encoding, STREAM_BUFFER_SIZE)
    }

    /// `capacity` is clamped to at least 8 bytes so any character fits.
    pub fn with_capacity(reader: R, encoding: TextEncoding, capacity: usize) -> Self {
        Self {
            reader,
            encoding,
            buf: vec![0u8; capacity.max(8)].into_boxed_slice(),
            start: 0,
            end: 0,
            eof: false,
        }
    }

    fn refill(&mut self) -> io::Result<()> {
        self.buf.copy_within(self.start..self.end, 0);
        self.end -= self.start;
        self.start = 0;
        loop {
            match self.reader.read(&mut self.buf[self.end..]) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(());
                },
                Ok(n) => {
                    self.end += n;
                    return Ok(());
                },
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

impl<R: Read> CodepointSource for StreamSource<R> {
    type Error = io::Error;

    fn next_codepoint(&mut self) -> io::Result<Option<u32>> {
        loop {
            let (cp, consumed) = decode_next(self.encoding, &self.buf[self.start..self.end]);
            if cp != INVALID_CODE_POINT {
                self.start += consumed;
                return Ok(Some(cp));
            }
            if self.eof {
                self.start = self.end;
                return Ok(None);
            }
            self.refill()?;
        }
    }
}

/// Replays a sample taken from `inner` before continuing with it.
struct Sampled<S> {
    sample: Vec<u32>,
    pos: usize,
    inner: S,
}

impl<S: CodepointSource> CodepointSource for Sampled<S> {
    type Error = S::Error;

    #[inline]
    fn next_codepoint(&mut self) -> Result<Option<u32>, S::Error> {
        if let Some(&cp) = self.sample.get(self.pos) {
            self.pos += 1;
            return Ok(Some(cp));
        }
        self.inner.next_codepoint()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    FieldStart,
    InUnquotedField,
    InQuotedField,
    /// Enclosing character seen inside a quoted field: either an escaped
    /// enclosing character or the end of the quotes.
    QuoteSeenInQuotedField,
    /// `\r` seen; a following `\n` belongs to the same terminator.
    RowEnd,
    StreamEnd,
}

struct Tokenizer {
    separator: u32,
    enclosing: Option<u32>,
    state: State,
    field: String,
    row: Index,
    col: Index,
    first_eol: Option<EolType>,
    cells: u64,
    truncated: bool,
}

impl Tokenizer {
    fn new(separator: char, enclosing: Option<char>) -> Self {
        Self {
            separator: u32::from(separator),
            enclosing: enclosing.map(u32::from),
            state: State::FieldStart,
            field: String::new(),
            row: 0,
            col: 0,
            first_eol: None,
            cells: 0,
            truncated: false,
        }
    }

    /// Processes one code point. Returns `false` once no further input is
    /// accepted.
    fn feed<F: FnMut(Index, Index, &str)>(&mut self, cp: u32, on_cell: &mut F) -> bool {
        loop {
            match self.state {
                State::FieldStart | State::InUnquotedField => {
                    if self.state == State::FieldStart && Some(cp) == self.enclosing {
                        self.state = State::InQuotedField;
                    } else if cp == self.separator {
                        self.end_field(on_cell);
                    } else if cp == LF || cp == CR {
                        self.end_row(cp, on_cell);
                    } else {
                        self.push(cp);
                        self.state = State::InUnquotedField;
                    }
                },
                State::InQuotedField => {
                    if Some(cp) == self.enclosing {
                        self.state = State::QuoteSeenInQuotedField;
                    } else {
                        self.push(cp);
                    }
                },
                State::QuoteSeenInQuotedField => {
                    if Some(cp) == self.enclosing {
                        self.push(cp);
                        self.state = State::InQuotedField;
                    } else {
                        // Closing quote; reprocess as unquoted content
                        self.state = State::InUnquotedField;
                        continue;
                    }
                },
                State::RowEnd => {
                    self.state = State::FieldStart;
                    if cp == LF {
                        self.first_eol.get_or_insert(EolType::CrLf);
                        return true;
                    }
                    self.first_eol.get_or_insert(EolType::Cr);
                    continue;
                },
                State::StreamEnd => return false,
            }
            return self.state != State::StreamEnd;
        }
    }

    fn finish<F: FnMut(Index, Index, &str)>(&mut self, on_cell: &mut F) {
        match self.state {
            // A trailing separator leaves one more, empty, field
            State::FieldStart if self.col > 0 => self.emit(on_cell),
            State::InUnquotedField | State::InQuotedField | State::QuoteSeenInQuotedField => self.emit(on_cell),
            State::RowEnd => {
                self.first_eol.get_or_insert(EolType::Cr);
            },
            State::FieldStart | State::StreamEnd => {},
        }
        self.state = State::StreamEnd;
    }

    #[inline]
    fn push(&mut self, cp: u32) {
        self.field.push(char::from_u32(cp).unwrap_or(char::REPLACEMENT_CHARACTER));
    }

    fn emit<F: FnMut(Index, Index, &str)>(&mut self, on_cell: &mut F) {
        if self.col <= MAX_INDEX {
            on_cell(self.row, self.col, &self.field);
            self.cells += 1;
        } else {
            self.truncated = true;
        }
        self.field.clear();
    }

    fn end_field<F: FnMut(Index, Index, &str)>(&mut self, on_cell: &mut F) {
        self.emit(on_cell);
        self.col = self.col.saturating_add(1);
        self.state = State::FieldStart;
    }

    fn end_row<F: FnMut(Index, Index, &str)>(&mut self, cp: u32, on_cell: &mut F) {
        self.emit(on_cell);
        if cp == LF {
            self.first_eol.get_or_insert(EolType::Lf);
        }
        if self.row == MAX_INDEX {
            self.truncated = true;
            self.state = State::StreamEnd;
            return;
        }
        self.row += 1;
        self.col = 0;
        self.state = if cp == CR { State::RowEnd } else { State::FieldStart };
    }
}

/// Delimited text reader configured with a separator and enclosing
/// character, either of which may be left to auto-detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelimitedTextReader {
    separator: MetaChar,
    enclosing: MetaChar,
    sample_size: usize,
}

impl Default for DelimitedTextReader {
    fn default() -> Self {
        Self::new(MetaChar::AutoDetect, MetaChar::Char(DEFAULT_ENCLOSING))
    }
}

impl DelimitedTextReader {
    /// `MetaChar::None` as separator is treated like `AutoDetect`.
    pub fn new(separator: MetaChar, enclosing: MetaChar) -> Self {
        Self {
            separator,
            enclosing,
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }

    pub fn from_format(format: &CsvFormatDefinition) -> Self {
        Self::new(format.separator(), format.enclosing())
    }

    /// Number of leading code points inspected by auto-detection.
    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size.max(1);
        self
    }

    fn needs_sample(&self) -> bool {
        self.separator.is_meta() || self.enclosing == MetaChar::AutoDetect
    }

    /// Resolves the sentinels against `sample`.
    fn resolve(&self, sample: &[u32], complete: bool) -> (char, Option<char>) {
        let quote_hint = match self.enclosing {
            MetaChar::Char(c) => Some(c),
            MetaChar::None => None,
            MetaChar::AutoDetect => Some(DEFAULT_ENCLOSING),
        };
        let separator = match self.separator {
            MetaChar::Char(c) => c,
            MetaChar::AutoDetect | MetaChar::None => {
                let detected = detect_separator(sample, quote_hint, complete);
                debug!(separator = ?detected, "auto-detected separator");
                detected
            },
        };
        let enclosing = match self.enclosing {
            MetaChar::Char(c) => Some(c),
            MetaChar::None => None,
            MetaChar::AutoDetect => {
                let detected = detect_enclosing(sample, separator);
                debug!(enclosing = ?detected, "auto-detected enclosing character");
                detected
            },
        };
        (separator, enclosing)
    }

    /// Tokenizes `source`, calling `on_cell(row, col, text)` for each field.
    ///
    /// Returns the separator, enclosing character and first line terminator
    /// that were used. The `encoding` of the result is left `Unknown`.
    pub fn read_source<S, F>(&self, mut source: S, mut on_cell: F) -> Result<Dialect, S::Error>
    where
        S: CodepointSource,
        F: FnMut(Index, Index, &str),
    {
        let mut sample = Vec::new();
        let mut complete = true;
        if self.needs_sample() {
            while sample.len() < self.sample_size {
                match source.next_codepoint()? {
                    Some(cp) => sample.push(cp),
                    None => break,
                }
            }
            complete = sample.len() < self.sample_size;
        }
        let (separator, enclosing) = self.resolve(&sample, complete);

        let mut source = Sampled {
            sample,
            pos: 0,
            inner: source,
        };
        let mut tokenizer = Tokenizer::new(separator, enclosing);
        while let Some(cp) = source.next_codepoint()? {
            if !tokenizer.feed(cp, &mut on_cell) {
                break;
            }
        }
        tokenizer.finish(&mut on_cell);

        if tokenizer.truncated {
            warn!(rows = tokenizer.row, "input exceeds the addressable table size, excess cells dropped");
        }
        debug!(cells = tokenizer.cells, rows = tokenizer.row, "tokenized delimited text");

        Ok(Dialect {
            separator,
            enclosing,
            eol: tokenizer.first_eol,
            encoding: TextEncoding::Unknown,
        })
    }

    /// Tokenizes an in-memory buffer that starts after any BOM.
    ///
    /// UTF-8 input without enclosing character is split on raw bytes without
    /// decoding; everything else goes through the state machine.
    pub fn read_bytes<F>(&self, bytes: &[u8], encoding: TextEncoding, mut on_cell: F) -> Dialect
    where
        F: FnMut(Index, Index, &str),
    {
        let mut reader = *self;
        if encoding == TextEncoding::Utf8 && self.enclosing == MetaChar::None {
            let separator = match self.separator {
                MetaChar::Char(c) => c,
                _ => {
                    let sample: Vec<u32> = Codepoints::new(bytes, encoding).take(self.sample_size).collect();
                    self.resolve(&sample, sample.len() < self.sample_size).0
                },
            };
            if let Ok(byte) = u8::try_from(separator)
                && byte.is_ascii()
            {
                debug!("reading UTF-8 without enclosing character on the byte fast path");
                return read_utf8_unenclosed(bytes, byte, &mut on_cell);
            }
            reader.separator = MetaChar::Char(separator);
        }

        let Ok(dialect) = reader.read_source(SliceSource::new(bytes, encoding), on_cell);
        dialect
    }

    /// Tokenizes a byte stream positioned after any BOM.
    pub fn read_stream<R, F>(&self, reader: R, encoding: TextEncoding, on_cell: F) -> io::Result<Dialect>
    where
        R: Read,
        F: FnMut(Index, Index, &str),
    {
        self.read_source(StreamSource::new(reader, encoding), on_cell)
    }
}

/// Splits UTF-8 `bytes` on `separator` and line breaks. Invalid sequences
/// inside a field are replaced by U+FFFD.
fn read_utf8_unenclosed<F>(bytes: &[u8], separator: u8, on_cell: &mut F) -> Dialect
where
    F: FnMut(Index, Index, &str),
{
    let mut row: Index = 0;
    let mut col: Index = 0;
    let mut first_eol = None;
    let mut field_start = 0usize;
    let mut pos = 0usize;
    let mut truncated = false;
    let mut row_limit_hit = false;

    let mut emit = |row: Index, col: Index, field: &[u8]| {
        if col <= MAX_INDEX {
            on_cell(row, col, &String::from_utf8_lossy(field));
        } else {
            truncated = true;
        }
    };

    while let Some(offset) = memchr3(separator, b'\n', b'\r', &bytes[pos..]) {
        let at = pos + offset;
        emit(row, col, &bytes[field_start..at]);
        pos = at + 1;
        if bytes[at] == separator {
            col = col.saturating_add(1);
        } else {
            let eol = if bytes[at] == b'\n' {
                EolType::Lf
            } else if bytes.get(pos) == Some(&b'\n') {
                pos += 1;
                EolType::CrLf
            } else {
                EolType::Cr
            };
            first_eol.get_or_insert(eol);
            if row == MAX_INDEX {
                field_start = bytes.len();
                col = 0;
                row_limit_hit = true;
                break;
            }
            row += 1;
            col = 0;
        }
        field_start = pos;
    }
    if field_start < bytes.len() || col > 0 {
        emit(row, col, &bytes[field_start..]);
    }

    if truncated || row_limit_hit {
        warn!("input exceeds the addressable table size, excess cells dropped");
    }

    Dialect {
        separator: char::from(separator),
        enclosing: None,
        eol: first_eol,
        encoding: TextEncoding::Unknown,
    }
}
