//! Delimited text writer.
//!
//! [`WritePolicy`] encodes the separator, line terminator and enclosing
//! character once per write session and applies the enclosing policy to
//! each cell. [`write_table`] merges the per-column row streams of a
//! [`SparseTable`] into rows.

use std::io::Write;

use smallvec::SmallVec;

use crate::common::encoding::{default_unconvertible_handler, encode_codepoint, encode_str};
use crate::common::{Result, TextEncoding, write_bom};
use crate::sheet::SparseTable;
use crate::sheet::types::Index;

use super::format::{CsvFormatDefinition, Enclosement};

/// Pre-encoded structural character or terminator.
type Encoded = SmallVec<[u8; 8]>;

fn encode(text: &str, encoding: TextEncoding) -> Encoded {
    let mut out = Encoded::new();
    encode_str(text, encoding, &mut out, default_unconvertible_handler);
    out
}

/// `true` if `value` contains the separator, the enclosing character or a
/// line break and therefore has to be enclosed to survive a re-read.
///
/// # Examples
/// ```
/// use csvtable::sheet::text::writer::needs_enclosing;
///
/// assert!(needs_enclosing("a,b", ',', '"'));
/// assert!(needs_enclosing("say \"hi\"", ',', '"'));
/// assert!(!needs_enclosing("plain", ',', '"'));
/// ```
pub fn needs_enclosing(value: &str, separator: char, enclosing: char) -> bool {
    value
        .chars()
        .any(|c| c == separator || c == enclosing || c == '\n' || c == '\r')
}

/// Encoding state of one write session.
pub struct WritePolicy {
    separator: char,
    enclosing: Option<char>,
    enclosement: Enclosement,
    encoding: TextEncoding,
    bom_writing: bool,
    encoded_separator: Encoded,
    encoded_eol: Encoded,
    encoded_enclosing: Encoded,
    scratch: Vec<u8>,
}

impl WritePolicy {
    /// Validates `format` for writing and pre-encodes its characters.
    ///
    /// An `Unknown` encoding writes Latin-1 bytes.
    pub fn new(format: &CsvFormatDefinition) -> Result<Self> {
        format.validate_for_write()?;

        let encoding = format.encoding();
        let separator = format.separator().as_char().unwrap_or(',');
        let enclosing = format.enclosing().as_char();

        let mut buf = [0u8; 4];
        Ok(Self {
            separator,
            enclosing,
            enclosement: format.enclosement(),
            encoding,
            bom_writing: format.bom_writing(),
            encoded_separator: encode(separator.encode_utf8(&mut buf), encoding),
            encoded_eol: encode(format.eol().as_str(), encoding),
            encoded_enclosing: enclosing.map_or_else(Encoded::new, |c| encode(c.encode_utf8(&mut buf), encoding)),
            scratch: Vec::new(),
        })
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Writes the BOM of the target encoding if BOM writing is enabled.
    pub fn write_bom<W: Write>(&self, writer: &mut W) -> Result<()> {
        if self.bom_writing {
            write_bom(writer, self.encoding)?;
        }
        Ok(())
    }

    #[inline]
    pub fn write_separator<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.encoded_separator)?;
        Ok(())
    }

    #[inline]
    pub fn write_eol<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.encoded_eol)?;
        Ok(())
    }

    /// Whether `value` is wrapped under the session's policy. `sole_field`
    /// marks a cell that is the only field of its row.
    pub fn encloses(&self, value: &str, sole_field: bool) -> bool {
        let Some(enclosing) = self.enclosing else {
            return false;
        };
        match self.enclosement {
            Enclosement::Never => false,
            Enclosement::IfNonEmpty => !value.is_empty(),
            // An empty sole field would otherwise read back as absent
            Enclosement::IfNeeded => {
                (value.is_empty() && sole_field) || needs_enclosing(value, self.separator, enclosing)
            },
        }
    }

    /// Writes one cell value, enclosed and escaped as the policy requires.
    pub fn write_cell<W: Write>(&mut self, writer: &mut W, value: &str, sole_field: bool) -> Result<()> {
        let enclose = self.encloses(value, sole_field);
        if !enclose && self.encoding == TextEncoding::Utf8 {
            writer.write_all(value.as_bytes())?;
            return Ok(());
        }

        self.scratch.clear();
        if enclose {
            self.scratch.extend_from_slice(&self.encoded_enclosing);
        }
        for c in value.chars() {
            if enclose && Some(c) == self.enclosing {
                self.scratch.extend_from_slice(&self.encoded_enclosing);
                self.scratch.extend_from_slice(&self.encoded_enclosing);
            } else {
                encode_codepoint(u32::from(c), self.encoding, &mut self.scratch);
            }
        }
        if enclose {
            self.scratch.extend_from_slice(&self.encoded_enclosing);
        }
        writer.write_all(&self.scratch)?;
        Ok(())
    }

    /// Writes `col_count` fields of one row; absent cells are empty fields.
    pub fn write_row<'a, W, I>(&mut self, writer: &mut W, col_count: Index, cells: I) -> Result<()>
    where
        W: Write,
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let sole_field = col_count == 1;
        for (col, value) in (0..col_count).zip(cells) {
            if col > 0 {
                self.write_separator(writer)?;
            }
            if let Some(value) = value {
                self.write_cell(writer, value, sole_field)?;
            }
        }
        Ok(())
    }
}

/// Writes `table` row by row.
///
/// Each column is walked in ascending row order; a row is assembled by
/// taking the next entry of every column whose pending row is the row being
/// written. Rows are separated by terminators, the last one has none.
/// Without header writing row 0 is skipped.
pub fn write_table<W: Write>(
    table: &SparseTable,
    writer: &mut W,
    policy: &mut WritePolicy,
    header_writing: bool,
) -> Result<()> {
    policy.write_bom(writer)?;

    let col_count = table.col_count();
    let mut remaining = table.cell_count();
    let mut columns: Vec<_> = table
        .ascending_columns()
        .into_iter()
        .map(Iterator::peekable)
        .collect();

    let mut row: Index = 0;
    let mut first_row = true;
    let mut cells: Vec<Option<&str>> = Vec::with_capacity(col_count as usize);
    while remaining > 0 && row < table.row_count() {
        cells.clear();
        for col in 0..col_count as usize {
            let value = columns
                .get_mut(col)
                .and_then(|rows| rows.next_if(|(r, _)| *r == row))
                .map(|(_, value)| value);
            if value.is_some() {
                remaining -= 1;
            }
            cells.push(value);
        }

        if header_writing || row > 0 {
            if !first_row {
                policy.write_eol(writer)?;
            }
            first_row = false;
            policy.write_row(writer, col_count, cells.iter().copied())?;
        }
        row += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::text::format::{EolType, MetaChar};

    fn write(table: &SparseTable, format: &CsvFormatDefinition) -> Vec<u8> {
        let mut policy = WritePolicy::new(format).unwrap();
        let mut out = Vec::new();
        write_table(table, &mut out, &mut policy, format.header_writing()).unwrap();
        out
    }

    fn plain() -> CsvFormatDefinition {
        CsvFormatDefinition::default().with_bom_writing(false)
    }

    #[test]
    fn test_quotes_when_needed() {
        let mut table = SparseTable::new();
        table.set_element(0, 0, "a,b\"c");
        table.set_element(0, 1, "plain");
        table.set_element(0, 2, "two\nlines");
        assert_eq!(write(&table, &plain()), b"\"a,b\"\"c\",plain,\"two\nlines\"");
    }

    #[test]
    fn test_enclosement_policies() {
        let mut table = SparseTable::new();
        table.set_element(0, 0, "x");
        table.set_element(0, 1, "");
        table.set_element(0, 2, "q\"");

        let always = plain().with_enclosement(Enclosement::IfNonEmpty);
        assert_eq!(write(&table, &always), b"\"x\",,\"q\"\"\"");

        let never = plain().with_enclosement(Enclosement::Never);
        assert_eq!(write(&table, &never), b"x,,q\"");

        let no_char = plain().with_enclosing(MetaChar::None);
        assert_eq!(write(&table, &no_char), b"x,,q\"");
    }

    #[test]
    fn test_merges_columns_in_row_order() {
        let mut table = SparseTable::new();
        table.set_element(2, 0, "c0");
        table.set_element(0, 0, "a0");
        table.set_element(1, 1, "b1");
        table.set_element(2, 1, "c1");
        assert_eq!(write(&table, &plain()), b"a0,\n,b1\nc0,c1");
    }

    #[test]
    fn test_absent_rows_are_empty_lines() {
        let mut table = SparseTable::new();
        table.set_element(0, 0, "a");
        table.set_element(3, 1, "d");
        assert_eq!(write(&table, &plain()), b"a,\n,\n,\n,d");
    }

    #[test]
    fn test_single_column_empty_cell_is_enclosed() {
        let mut table = SparseTable::new();
        table.set_element(0, 0, "a");
        table.set_element(1, 0, "");
        table.set_element(2, 0, "c");
        assert_eq!(write(&table, &plain()), b"a\n\"\"\nc");
    }

    #[test]
    fn test_header_skipping() {
        let mut table = SparseTable::new();
        table.set_element(0, 0, "h");
        table.set_element(1, 0, "v1");
        table.set_element(2, 0, "v2");
        assert_eq!(write(&table, &plain().with_header_writing(false)), b"v1\nv2");
    }

    #[test]
    fn test_bom_and_empty_table() {
        let table = SparseTable::new();
        assert_eq!(write(&table, &CsvFormatDefinition::default()), [0xEF, 0xBB, 0xBF]);
        assert!(write(&table, &plain()).is_empty());
    }

    #[test]
    fn test_encodes_structure_once_per_target() {
        let mut table = SparseTable::new();
        table.set_element(0, 0, "a");
        table.set_element(0, 1, "é\"");
        table.set_element(1, 0, "b");

        let format = plain()
            .with_separator(';')
            .with_eol(EolType::CrLf)
            .with_encoding(TextEncoding::Utf16Le);
        let out = write(&table, &format);
        let expected: Vec<u8> = "a;\"é\"\"\"\r\nb;".encode_utf16().flat_map(u16::to_le_bytes).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_latin1_substitutes_unrepresentable() {
        let mut table = SparseTable::new();
        table.set_element(0, 0, "ä€");
        let out = write(&table, &plain().with_encoding(TextEncoding::Latin1));
        assert_eq!(out, [0xE4, b'?']);
    }

    #[test]
    fn test_rejects_unwritable_format() {
        assert!(WritePolicy::new(&CsvFormatDefinition::auto_detect()).is_err());
        assert!(WritePolicy::new(&plain().with_separator('"')).is_err());
    }

    #[test]
    fn test_unencodable_separator_writes_nothing() {
        let mut table = SparseTable::new();
        table.set_element(0, 0, "a?b");
        table.set_element(0, 1, "c");
        let format = plain().with_separator('€').with_encoding(TextEncoding::Latin1);

        let mut out = Vec::new();
        let result = WritePolicy::new(&format)
            .and_then(|mut policy| write_table(&table, &mut out, &mut policy, true));
        assert!(result.is_err());
        assert!(out.is_empty());

        let utf8 = write(&table, &plain().with_separator('€'));
        assert_eq!(utf8, "a?b€c".as_bytes());
    }
}
