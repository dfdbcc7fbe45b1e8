//! Table-CSV façade: a sparse table together with the format it was read
//! with and the format it will be saved with.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::common::bom::is_bom_of;
use crate::common::{Error, Result, TextEncoding, detect_bom, strip_bom};
use crate::sheet::SparseTable;
use crate::sheet::types::Index;

use super::config::CsvConfig;
use super::format::{
    CsvFormatDefinition, Dialect, KEY_BOM_WRITING, KEY_ENCLOSING_CHAR, KEY_ENCODING, KEY_END_OF_LINE_TYPE,
    KEY_SEPARATOR_CHAR, PROPERTIES_PREFIX,
};
use super::parser::{DEFAULT_SAMPLE_SIZE, DelimitedTextReader};
use super::writer::{WritePolicy, write_table};

/// Files up to this size are loaded into memory before parsing.
pub const DEFAULT_MEMORY_READ_LIMIT: u64 = 512 * 1024 * 1024;

/// Tuning knobs of a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Larger files are parsed from a buffered stream instead
    pub memory_read_limit: u64,
    /// Code points inspected when auto-detecting the dialect
    pub sample_size: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            memory_read_limit: DEFAULT_MEMORY_READ_LIMIT,
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_memory_read_limit(mut self, limit: u64) -> Self {
        self.memory_read_limit = limit;
        self
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }
}

/// A [`SparseTable`] with CSV load and save support.
///
/// Every read clears the table first and records the negotiated format as
/// both the read format and the save format, so that a plain
/// [`write_to_file`](Self::write_to_file) reproduces the input dialect.
#[derive(Debug, Clone, Default)]
pub struct CsvTable {
    table: SparseTable,
    read_format: CsvFormatDefinition,
    save_format: CsvFormatDefinition,
    options: ReadOptions,
}

impl CsvTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ReadOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Wraps an existing table; both formats start at the default.
    pub fn from_table(table: SparseTable) -> Self {
        Self {
            table,
            ..Self::default()
        }
    }

    /// Format that detects separator, line terminator and encoding.
    pub fn default_read_format() -> CsvFormatDefinition {
        CsvFormatDefinition::auto_detect()
    }

    pub fn options(&self) -> ReadOptions {
        self.options
    }

    pub fn set_options(&mut self, options: ReadOptions) {
        self.options = options;
    }

    pub fn table(&self) -> &SparseTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut SparseTable {
        &mut self.table
    }

    pub fn into_table(self) -> SparseTable {
        self.table
    }

    /// Format negotiated by the last read.
    pub fn read_format(&self) -> &CsvFormatDefinition {
        &self.read_format
    }

    pub fn save_format(&self) -> &CsvFormatDefinition {
        &self.save_format
    }

    pub fn set_save_format(&mut self, format: CsvFormatDefinition) {
        self.save_format = format;
    }

    fn reader_for(&self, format: &CsvFormatDefinition) -> DelimitedTextReader {
        DelimitedTextReader::from_format(format).with_sample_size(self.options.sample_size)
    }

    fn finish_read(&mut self, format: &CsvFormatDefinition, found: &Dialect) -> CsvFormatDefinition {
        let resolved = format.negotiate(found);
        info!(
            rows = self.table.row_count(),
            cols = self.table.col_count(),
            separator = ?resolved.separator(),
            encoding = ?resolved.encoding(),
            "read delimited text"
        );
        self.read_format = resolved.clone();
        self.save_format = resolved.clone();
        resolved
    }

    /// Reads `path` with [`default_read_format`](Self::default_read_format).
    pub fn read_from_file(&mut self, path: impl AsRef<Path>) -> Result<CsvFormatDefinition> {
        self.read_from_file_with(path, &Self::default_read_format())
    }

    /// Reads `path` with the format stored in its sidecar config, or the
    /// default read format when there is none.
    pub fn read_from_file_with_sidecar(&mut self, path: impl AsRef<Path>) -> Result<CsvFormatDefinition> {
        let path = path.as_ref();
        let format = Self::load_sidecar_format(path, &Self::default_read_format())?
            .unwrap_or_else(Self::default_read_format);
        self.read_from_file_with(path, &format)
    }

    /// Reads `path` and returns the negotiated format.
    ///
    /// The file is loaded into memory when it is below the memory read limit.
    /// If that fails for any reason the read is retried once through a
    /// buffered stream. If the stream cannot be opened either the table is
    /// left empty and [`Error::SourceUnavailable`] is returned; so it is when
    /// reading the stream fails.
    pub fn read_from_file_with(
        &mut self,
        path: impl AsRef<Path>,
        format: &CsvFormatDefinition,
    ) -> Result<CsvFormatDefinition> {
        let path = path.as_ref();
        format.validate_for_read()?;
        self.table.clear();

        match load_file(path, self.options.memory_read_limit) {
            Ok(bytes) => {
                debug!(path = %path.display(), bytes = bytes.len(), "reading from memory");
                return self.read_from_memory(&bytes, format);
            },
            Err(e) => warn!(path = %path.display(), error = %e, "in-memory read failed, falling back to stream"),
        }

        let unavailable = |source: io::Error| Error::SourceUnavailable {
            path: path.display().to_string(),
            source,
        };
        let file = File::open(path).map_err(unavailable)?;
        match self.read_from_stream(file, format) {
            // Opening succeeds for directories on some platforms; reading does not
            Err(Error::Io(source)) => Err(unavailable(source)),
            other => other,
        }
    }

    /// Reads an in-memory buffer and returns the negotiated format.
    ///
    /// A leading BOM decides the encoding when `format` leaves it `Unknown`.
    /// The BOM is skipped only if it belongs to the encoding actually used.
    pub fn read_from_memory(&mut self, bytes: &[u8], format: &CsvFormatDefinition) -> Result<CsvFormatDefinition> {
        format.validate_for_read()?;
        self.table.clear();

        let (bom_encoding, bom_len) = detect_bom(bytes);
        let encoding = resolve_encoding(format.encoding(), bom_encoding);
        let skip = if is_bom_of(bom_encoding, encoding) { bom_len } else { 0 };

        let reader = self.reader_for(format);
        let table = &mut self.table;
        let mut found = reader.read_bytes(&bytes[skip..], encoding, |row, col, value| {
            table.set_element(row, col, value);
        });
        found.encoding = bom_encoding;
        Ok(self.finish_read(format, &found))
    }

    /// Reads a seekable stream from its current position and returns the
    /// negotiated format. On an I/O error the table is left empty.
    pub fn read_from_stream<R: Read + Seek>(
        &mut self,
        mut reader: R,
        format: &CsvFormatDefinition,
    ) -> Result<CsvFormatDefinition> {
        format.validate_for_read()?;
        self.table.clear();

        let start = reader.stream_position()?;
        let bom_encoding = strip_bom(&mut reader)?.map_or(TextEncoding::Unknown, |(found, _)| found);
        let encoding = resolve_encoding(format.encoding(), bom_encoding);
        if bom_encoding != TextEncoding::Unknown && !is_bom_of(bom_encoding, encoding) {
            reader.seek(SeekFrom::Start(start))?;
        }

        let tokenizer = self.reader_for(format);
        let table = &mut self.table;
        let result = tokenizer.read_stream(reader, encoding, |row, col, value| {
            table.set_element(row, col, value);
        });
        let mut found = match result {
            Ok(found) => found,
            Err(e) => {
                self.table.clear();
                return Err(e.into());
            },
        };
        found.encoding = bom_encoding;
        Ok(self.finish_read(format, &found))
    }

    /// Writes the table with the save format.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        self.write_to_with(writer, &self.save_format)
    }

    /// Writes the table with `format`.
    pub fn write_to_with<W: Write>(&self, mut writer: W, format: &CsvFormatDefinition) -> Result<()> {
        let mut policy = WritePolicy::new(format)?;
        write_table(&self.table, &mut writer, &mut policy, format.header_writing())?;
        writer.flush()?;
        Ok(())
    }

    /// Writes the table to `path` with the save format.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        self.write_to_file_with(path, &self.save_format)
    }

    pub fn write_to_file_with(&self, path: impl AsRef<Path>, format: &CsvFormatDefinition) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)?;
        self.write_to_with(BufWriter::new(file), format)?;
        info!(
            path = %path.display(),
            rows = self.table.row_count(),
            cols = self.table.col_count(),
            "wrote delimited text"
        );
        Ok(())
    }

    /// Renders one row with the save format's characters as UTF-8 text,
    /// without BOM or terminator.
    pub fn row_to_string(&self, row: Index) -> Result<String> {
        let format = self
            .save_format
            .clone()
            .with_encoding(TextEncoding::Utf8)
            .with_bom_writing(false);
        let mut policy = WritePolicy::new(&format)?;
        let col_count = self.table.col_count();
        let mut out = Vec::new();
        policy.write_row(&mut out, col_count, (0..col_count).map(|col| self.table.element(row, col)))?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Sidecar config path of a data file.
    pub fn config_path_for(path: impl AsRef<Path>) -> PathBuf {
        CsvFormatDefinition::config_path_for(path)
    }

    /// Applies the sidecar config of `path` on top of `base`. Returns
    /// `Ok(None)` when `path` has no sidecar.
    pub fn load_sidecar_format(
        path: impl AsRef<Path>,
        base: &CsvFormatDefinition,
    ) -> Result<Option<CsvFormatDefinition>> {
        let config_path = Self::config_path_for(path);
        if !config_path.is_file() {
            return Ok(None);
        }
        let config = CsvConfig::load(&config_path)?;
        let mut format = base.clone();
        format.apply_config(&config)?;
        Ok(Some(format))
    }

    /// Stores the save format in the sidecar config of `path`. Entries of an
    /// existing sidecar that do not describe the format are kept.
    pub fn save_sidecar_format(&self, path: impl AsRef<Path>) -> Result<()> {
        let config_path = Self::config_path_for(path);
        let mut config = if config_path.is_file() {
            CsvConfig::load(&config_path)?
        } else {
            CsvConfig::new()
        };
        for key in [
            KEY_ENCODING,
            KEY_ENCLOSING_CHAR,
            KEY_SEPARATOR_CHAR,
            KEY_END_OF_LINE_TYPE,
            KEY_BOM_WRITING,
        ] {
            config.remove(key);
        }
        config.remove_prefix(PROPERTIES_PREFIX);
        self.save_format.append_to_config(&mut config);
        config.save(&config_path)
    }
}

/// Explicit encodings win; `Unknown` takes whatever the BOM announced.
fn resolve_encoding(requested: TextEncoding, bom_encoding: TextEncoding) -> TextEncoding {
    if requested == TextEncoding::Unknown {
        bom_encoding
    } else {
        requested
    }
}

fn load_file(path: &Path, limit: u64) -> io::Result<Vec<u8>> {
    let size = fs::metadata(path)?.len();
    if size > limit {
        return Err(io::Error::other(format!(
            "file size {} exceeds the memory read limit of {} bytes",
            size, limit
        )));
    }
    fs::read(path)
}
