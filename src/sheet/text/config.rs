//! Flat key/value configuration persisted next to a data file.
//!
//! Keys are `/`-segmented paths such as `columnsByIndex/3/width_pixels`.
//! On disk each entry is one `key=value` line, written and parsed by the
//! delimited text codec itself so that values containing `=`, quotes or line
//! breaks survive unchanged.

use std::collections::BTreeMap;
use std::fs;
use std::ops::Bound;
use std::path::Path;

use tracing::debug;

use crate::common::{Error, Result, TextEncoding};
use crate::sheet::SparseTable;

use super::format::{CsvFormatDefinition, EolType, MetaChar};
use super::workbook::CsvTable;

/// Keys starting with this character are comments.
const COMMENT_PREFIX: char = '#';

/// Ordered string key/value store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvConfig {
    entries: BTreeMap<String, String>,
}

impl CsvConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dialect of the config file format itself.
    pub fn file_format() -> CsvFormatDefinition {
        CsvFormatDefinition::new(MetaChar::Char('='), MetaChar::Char('"'), EolType::Lf, TextEncoding::Utf8)
            .with_bom_writing(false)
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set_value(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Entries whose key starts with `prefix`, with the prefix stripped.
    pub fn entries_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.entries
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .map_while(move |(k, v)| k.strip_prefix(prefix).map(|rest| (rest, v.as_str())))
    }

    /// Drops every entry under `prefix`.
    pub fn remove_prefix(&mut self, prefix: &str) {
        self.entries.retain(|k, _| !k.starts_with(prefix));
    }

    /// Parses config file content.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut csv = CsvTable::new();
        csv.read_from_memory(bytes, &Self::file_format())?;

        let table = csv.table();
        let mut config = Self::new();
        for row in 0..table.row_count() {
            let key = table.element(row, 0).unwrap_or_default();
            if key.is_empty() || key.starts_with(COMMENT_PREFIX) {
                continue;
            }
            // An unquoted value containing '=' was split into several cells
            let value = table
                .row_entries(row)
                .filter(|(col, _)| *col > 0)
                .map(|(_, value)| value)
                .collect::<Vec<_>>()
                .join("=");
            config.entries.insert(key.to_string(), value);
        }
        Ok(config)
    }

    /// Serializes the config, one entry per line.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut table = SparseTable::new();
        for (row, (key, value)) in self.entries.iter().enumerate() {
            let row = u32::try_from(row)
                .map_err(|_| Error::Unsupported("Too many config entries".to_string()))?;
            table.set_element(row, 0, key);
            table.set_element(row, 1, value);
        }

        let csv = CsvTable::from_table(table);
        let mut out = Vec::new();
        csv.write_to_with(&mut out, &Self::file_format())?;
        Ok(out)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| Error::SourceUnavailable {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_bytes(&bytes)?;
        debug!(path = %path.display(), entries = config.len(), "loaded config");
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_bytes()?)?;
        debug!(path = %path.display(), entries = self.len(), "saved config");
        Ok(())
    }
}
