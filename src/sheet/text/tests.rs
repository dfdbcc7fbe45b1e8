//! Tests for the delimited text codec

use super::*;
use crate::common::{Error, TextEncoding};
use crate::sheet::SparseTable;
use proptest::prelude::*;
use std::io::Cursor;

fn plain() -> CsvFormatDefinition {
    CsvFormatDefinition::default().with_bom_writing(false)
}

fn write(table: &SparseTable, format: &CsvFormatDefinition) -> Vec<u8> {
    let mut out = Vec::new();
    CsvTable::from_table(table.clone()).write_to_with(&mut out, format).unwrap();
    out
}

fn read(bytes: &[u8], format: &CsvFormatDefinition) -> (SparseTable, CsvFormatDefinition) {
    let mut csv = CsvTable::new();
    let resolved = csv.read_from_memory(bytes, format).unwrap();
    (csv.into_table(), resolved)
}

fn table_of(cells: &[(u32, u32, &str)]) -> SparseTable {
    let mut table = SparseTable::new();
    for &(row, col, value) in cells {
        table.set_element(row, col, value);
    }
    table
}

#[test]
fn test_csv_parsing() {
    let (table, format) = read(b"name,age,city\nJohn,25,New York\nJane,30,London", &plain());
    assert_eq!(table.row_count(), 3);
    assert_eq!(table.col_count(), 3);
    assert_eq!(table.element(0, 0), Some("name"));
    assert_eq!(table.element(1, 1), Some("25"));
    assert_eq!(table.element(2, 2), Some("London"));
    assert_eq!(format, plain());
}

#[test]
fn test_tsv_parsing() {
    let (table, _) = read(b"name\tage\nJohn\t25", &CsvFormatDefinition::tsv());
    assert_eq!(table.col_count(), 2);
    assert_eq!(table.element(1, 0), Some("John"));
}

#[test]
fn test_quoted_fields() {
    let (table, _) = read(b"\"Hello, World\",\"he said \"\"hi\"\"\",\"Normal\"", &plain());
    assert_eq!(table.element(0, 0), Some("Hello, World"));
    assert_eq!(table.element(0, 1), Some("he said \"hi\""));
    assert_eq!(table.element(0, 2), Some("Normal"));
}

#[test]
fn test_empty_cells() {
    let (table, _) = read(b"a,,c\n,,", &plain());
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.col_count(), 3);
    assert_eq!(table.element(0, 1), Some(""));
    assert_eq!(table.element(1, 2), Some(""));
    assert_eq!(table.cell_count(), 6);
}

#[test]
fn test_roundtrip_with_structural_characters() {
    let table = table_of(&[(0, 0, "a,b\"c"), (0, 1, "x")]);
    let bytes = write(&table, &plain());
    assert_eq!(bytes, b"\"a,b\"\"c\",x");

    let (restored, _) = read(&bytes, &plain());
    assert_eq!(restored.element(0, 0), Some("a,b\"c"));
    assert!(restored.is_equivalent_to(&table));
}

#[test]
fn test_absent_cells_read_back_as_empty() {
    let table = table_of(&[(0, 0, "a"), (1, 1, "b")]);
    let (restored, _) = read(&write(&table, &plain()), &plain());

    assert_eq!(restored.element(0, 1), Some(""));
    assert_eq!(table.element(0, 1), None);
    // Strict equality tells them apart, equivalence does not
    assert_ne!(restored, table);
    assert!(restored.is_equivalent_to(&table));
}

#[test]
fn test_idempotent_resave() {
    let table = table_of(&[(0, 0, "h1"), (0, 2, "h,3"), (2, 1, "x\ny"), (3, 0, "")]);
    let format = plain().with_separator(';').with_eol(EolType::CrLf);
    assert_eq!(write(&table, &format), write(&table, &format));
}

#[test]
fn test_eol_change_only_changes_terminators() {
    let table = table_of(&[(0, 0, "a"), (0, 1, "b,c"), (1, 1, "d"), (3, 0, "e")]);
    let lf = write(&table, &plain().with_eol(EolType::Lf));
    let crlf = write(&table, &plain().with_eol(EolType::CrLf));

    let lf_text = String::from_utf8(lf.clone()).unwrap();
    assert_eq!(String::from_utf8(crlf.clone()).unwrap(), lf_text.replace('\n', "\r\n"));

    let (from_lf, _) = read(&lf, &plain());
    let (from_crlf, _) = read(&crlf, &plain());
    assert_eq!(from_lf, from_crlf);
}

#[test]
fn test_bom_toggling() {
    let table = table_of(&[(0, 0, "a"), (0, 1, "b")]);

    let without = write(&table, &plain());
    assert_eq!(without, b"a,b");

    let with = write(&table, &plain().with_bom_writing(true));
    assert_eq!(with, b"\xEF\xBB\xBFa,b");

    let (restored, format) = read(&with, &CsvTable::default_read_format());
    assert_eq!(restored.element(0, 0), Some("a"));
    assert_eq!(format.encoding(), TextEncoding::Utf8);
}

#[test]
fn test_auto_detect_separator() {
    let (table, format) = read(b"a;b;c\n1;2;3", &CsvTable::default_read_format());
    assert_eq!(format.separator(), MetaChar::Char(';'));
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.col_count(), 3);
    assert_eq!(table.element(1, 2), Some("3"));
}

#[test]
fn test_auto_detect_falls_back_to_comma() {
    let (table, format) = read(b"one\ntwo", &CsvTable::default_read_format());
    assert_eq!(format.separator(), MetaChar::Char(','));
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.col_count(), 1);
}

#[test]
fn test_auto_detect_with_quote_inside_field() {
    let (table, format) = read(b"12\" pipe;3;4\nvalve;5;6\nnut;7;8", &CsvTable::default_read_format());
    assert_eq!(format.separator(), MetaChar::Char(';'));
    assert_eq!(table.col_count(), 3);
    assert_eq!(table.element(0, 0), Some("12\" pipe"));
    assert_eq!(table.element(2, 2), Some("8"));
}

#[test]
fn test_sparse_table_semantics() {
    let mut table = SparseTable::new();
    table.set_element(5, 3, "x");
    assert_eq!(table.row_count(), 6);
    assert_eq!(table.col_count(), 4);
    assert_eq!(table.element(0, 0), None);
    assert_eq!(table.element(5, 3), Some("x"));
}

#[test]
fn test_column_merge_ordering() {
    let table = table_of(&[(0, 0, "r0c0"), (2, 0, "r2c0"), (1, 1, "r1c1"), (2, 1, "r2c1")]);
    assert_eq!(write(&table, &plain()), b"r0c0,\n,r1c1\nr2c0,r2c1");
}

#[test]
fn test_unsorted_rows_write_in_order() {
    let mut table = SparseTable::with_row_order(crate::sheet::Sortedness::Unsorted);
    table.set_element(2, 0, "c");
    table.set_element(0, 0, "a");
    table.set_element(1, 0, "b");
    assert_eq!(write(&table, &plain()), b"a\nb\nc");
}

#[test]
fn test_eol_negotiation() {
    let mut csv = CsvTable::new();
    let format = csv
        .read_from_memory(b"a,b\r\nc,d\r\n", &CsvTable::default_read_format())
        .unwrap();
    assert_eq!(format.eol(), EolType::CrLf);
    assert_eq!(csv.save_format().eol(), EolType::CrLf);

    let mut out = Vec::new();
    csv.write_to(&mut out).unwrap();
    assert_eq!(out, b"a,b\r\nc,d");
}

#[test]
fn test_read_clears_previous_content() {
    let mut csv = CsvTable::new();
    csv.read_from_memory(b"a,b,c\nd,e,f", &plain()).unwrap();
    csv.read_from_memory(b"x", &plain()).unwrap();
    assert_eq!(csv.table().row_count(), 1);
    assert_eq!(csv.table().col_count(), 1);
    assert_eq!(csv.table().cell_count(), 1);
}

#[test]
fn test_invalid_format_is_rejected_before_reading() {
    let mut csv = CsvTable::new();
    csv.table_mut().set_element(0, 0, "kept");

    let bad = plain().with_separator('"');
    let result = csv.read_from_memory(b"a,b", &bad);
    assert!(matches!(result, Err(Error::InvalidFormat(_))));
    assert_eq!(csv.table().element(0, 0), Some("kept"));

    let mut out = Vec::new();
    assert!(csv.write_to_with(&mut out, &bad).is_err());
    assert!(out.is_empty());
}

#[test]
fn test_utf16_bom_resolves_encoding() {
    let mut bytes = vec![0xFF, 0xFE];
    bytes.extend("é;€\nß;x".encode_utf16().flat_map(u16::to_le_bytes));

    let (table, format) = read(&bytes, &CsvTable::default_read_format());
    assert_eq!(format.encoding(), TextEncoding::Utf16Le);
    assert_eq!(format.separator(), MetaChar::Char(';'));
    assert_eq!(table.element(0, 0), Some("é"));
    assert_eq!(table.element(0, 1), Some("€"));
    assert_eq!(table.element(1, 0), Some("ß"));
}

#[test]
fn test_explicit_encoding_keeps_foreign_bom() {
    let (table, format) = read(b"\xEF\xBB\xBFa,b", &plain().with_encoding(TextEncoding::Latin1));
    assert_eq!(format.encoding(), TextEncoding::Latin1);
    assert_eq!(table.element(0, 0), Some("\u{EF}\u{BB}\u{BF}a"));
}

#[test]
fn test_unknown_encoding_roundtrips_bytes() {
    let input = "na\u{EF}ve,caf\u{E9}\nx,y".as_bytes().to_vec();
    let mut csv = CsvTable::new();
    let format = csv
        .read_from_memory(&input, &CsvTable::default_read_format())
        .unwrap();
    assert_eq!(format.encoding(), TextEncoding::Unknown);
    // UTF-8 bytes without BOM are taken one byte per character
    assert_eq!(csv.table().element(0, 1), Some("caf\u{C3}\u{A9}"));

    let mut out = Vec::new();
    csv.write_to(&mut out).unwrap();
    assert_eq!(out, input);
}

#[test]
fn test_stream_matches_memory() {
    let mut bytes = vec![0x00, 0x00, 0xFE, 0xFF];
    for c in "k\t\"v\tw\"\r\n\tz".chars() {
        bytes.extend(u32::from(c).to_be_bytes());
    }

    let (from_memory, memory_format) = read(&bytes, &CsvTable::default_read_format());

    let mut csv = CsvTable::new();
    let stream_format = csv
        .read_from_stream(Cursor::new(&bytes), &CsvTable::default_read_format())
        .unwrap();

    assert_eq!(memory_format, stream_format);
    assert_eq!(stream_format.encoding(), TextEncoding::Utf32Be);
    assert_eq!(stream_format.separator(), MetaChar::Char('\t'));
    assert_eq!(csv.table(), &from_memory);
    assert_eq!(from_memory.element(0, 1), Some("v\tw"));
    assert_eq!(from_memory.element(1, 0), Some(""));
}

#[test]
fn test_row_to_string() {
    let mut csv = CsvTable::from_table(table_of(&[(0, 0, "a;b"), (0, 2, "c"), (1, 1, "d")]));
    csv.set_save_format(plain().with_separator(';').with_encoding(TextEncoding::Utf16Le));
    assert_eq!(csv.row_to_string(0).unwrap(), "\"a;b\";;c");
    assert_eq!(csv.row_to_string(1).unwrap(), ";d;");
    assert_eq!(csv.row_to_string(7).unwrap(), ";;");
}

#[test]
fn test_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.csv");

    let table = table_of(&[(0, 0, "id"), (0, 1, "note"), (1, 0, "1"), (1, 1, "multi\nline")]);
    let mut csv = CsvTable::from_table(table.clone());
    csv.set_save_format(CsvFormatDefinition::default().with_separator('\t'));
    csv.write_to_file(&path).unwrap();

    let mut loaded = CsvTable::new();
    let format = loaded.read_from_file(&path).unwrap();
    assert_eq!(format.separator(), MetaChar::Char('\t'));
    assert_eq!(format.encoding(), TextEncoding::Utf8);
    assert_eq!(loaded.table(), &table);
}

#[test]
fn test_stream_fallback_for_large_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("big.csv");
    std::fs::write(&path, "a,b\nc,d").unwrap();

    let mut csv = CsvTable::with_options(ReadOptions::new().with_memory_read_limit(0));
    csv.read_from_file_with(&path, &plain()).unwrap();
    assert_eq!(csv.table().element(1, 1), Some("d"));
}

#[test]
fn test_missing_file_is_source_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let mut csv = CsvTable::from_table(table_of(&[(0, 0, "stale")]));
    let result = csv.read_from_file(dir.path().join("absent.csv"));
    assert!(matches!(result, Err(Error::SourceUnavailable { .. })));
    assert!(csv.table().is_empty());
}

#[test]
fn test_directory_is_source_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let mut csv = CsvTable::from_table(table_of(&[(0, 0, "stale")]));
    let result = csv.read_from_file(dir.path());
    assert!(matches!(result, Err(Error::SourceUnavailable { .. })));
    assert!(csv.table().is_empty());
}

#[test]
fn test_sidecar_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.txt");

    let format = plain()
        .with_separator('|')
        .with_eol(EolType::CrLf)
        .with_encoding(TextEncoding::Utf16Be)
        .with_property("origin", "export");
    let mut csv = CsvTable::from_table(table_of(&[(0, 0, "x"), (0, 1, "y")]));
    csv.set_save_format(format.clone());
    csv.write_to_file(&path).unwrap();
    csv.save_sidecar_format(&path).unwrap();
    assert!(CsvTable::config_path_for(&path).is_file());

    // Without BOM the encoding is only known from the sidecar
    let mut loaded = CsvTable::new();
    let resolved = loaded.read_from_file_with_sidecar(&path).unwrap();
    assert_eq!(resolved.separator(), MetaChar::Char('|'));
    assert_eq!(resolved.encoding(), TextEncoding::Utf16Be);
    assert_eq!(resolved.eol(), EolType::CrLf);
    assert_eq!(resolved.property("origin"), Some("export"));
    assert_eq!(loaded.table().element(0, 1), Some("y"));
}

#[test]
fn test_sidecar_keeps_foreign_entries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.csv");
    let config_path = CsvTable::config_path_for(&path);

    let mut config = CsvConfig::new();
    config.set_value("columnsByIndex/3/width_pixels", "120");
    config.set_value("separator_char", ";");
    config.save(&config_path).unwrap();

    let csv = CsvTable::new();
    csv.save_sidecar_format(&path).unwrap();

    let saved = CsvConfig::load(&config_path).unwrap();
    assert_eq!(saved.value("columnsByIndex/3/width_pixels"), Some("120"));
    assert_eq!(saved.value("separator_char"), Some("\\x2c"));
    assert_eq!(saved.value("bom_writing"), Some("1"));
}

#[test]
fn test_no_sidecar() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain.csv");
    let base = CsvTable::default_read_format();
    assert_eq!(CsvTable::load_sidecar_format(&path, &base).unwrap(), None);
}

fn cell_text() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-c ,;\t\"\r\né€]{0,5}").unwrap()
}

fn arb_table() -> impl Strategy<Value = SparseTable> {
    proptest::collection::vec((0u32..6, 0u32..4, cell_text()), 0..16).prop_map(|cells| {
        let mut table = SparseTable::new();
        for (row, col, value) in &cells {
            table.set_element(*row, *col, value);
        }
        table
    })
}

fn arb_format() -> impl Strategy<Value = CsvFormatDefinition> {
    (
        prop::sample::select(vec![',', ';', '\t']),
        prop::sample::select(vec![EolType::Lf, EolType::CrLf, EolType::Cr]),
        prop::sample::select(vec![
            TextEncoding::Utf8,
            TextEncoding::Utf16Le,
            TextEncoding::Utf16Be,
            TextEncoding::Utf32Le,
        ]),
        any::<bool>(),
    )
        .prop_map(|(separator, eol, encoding, bom)| {
            CsvFormatDefinition::default()
                .with_separator(separator)
                .with_eol(eol)
                .with_encoding(encoding)
                .with_bom_writing(bom)
        })
}

proptest! {
    #[test]
    fn prop_write_read_roundtrip(table in arb_table(), format in arb_format()) {
        let bytes = write(&table, &format);
        let (restored, _) = read(&bytes, &format);
        prop_assert!(restored.is_equivalent_to(&table), "{:?} -> {:?}", table, restored);
    }

    #[test]
    fn prop_resave_reaches_fixpoint(table in arb_table(), format in arb_format()) {
        let first = write(&table, &format);
        prop_assert_eq!(&first, &write(&table, &format));

        let (once, _) = read(&first, &format);
        let second = write(&once, &format);
        let (twice, _) = read(&second, &format);
        prop_assert_eq!(second, write(&twice, &format));
    }

    #[test]
    fn prop_bom_resolves_unknown_encoding(table in arb_table(), separator in prop::sample::select(vec![',', ';', '\t'])) {
        let format = CsvFormatDefinition::default().with_separator(separator);
        let bytes = write(&table, &format);
        let detect = CsvTable::default_read_format().with_separator(separator);
        let (restored, resolved) = read(&bytes, &detect);
        prop_assert!(restored.is_equivalent_to(&table));
        if !table.is_empty() {
            prop_assert_eq!(resolved.encoding(), TextEncoding::Utf8);
        }
    }
}
