//! Delimited text (CSV, TSV, ...) codec for [`SparseTable`](crate::sheet::SparseTable).
//!
//! # Features
//!
//! - **Any dialect**: separator, enclosing character, line terminator and
//!   encoding are parameters; separator and enclosing character can be
//!   auto-detected
//! - **Encodings**: UTF-8, UTF-16, UTF-32, UCS-2, UCS-4 in both byte orders
//!   and Latin-1, with BOM detection and writing
//! - **Streaming**: files above the memory read limit are tokenized through a
//!   refilling buffer
//! - **Sidecar configs**: the format of a file can be stored next to it in
//!   `<path>.conf`
//!
//! # Example
//!
//! ```rust
//! use csvtable::sheet::text::{CsvFormatDefinition, CsvTable, MetaChar};
//!
//! let mut csv = CsvTable::new();
//! let format = csv.read_from_memory(b"name;score\nAda;\"9;5\"", &CsvTable::default_read_format())?;
//! assert_eq!(format.separator(), MetaChar::Char(';'));
//! assert_eq!(csv.table().element(1, 1), Some("9;5"));
//!
//! let mut out = Vec::new();
//! csv.write_to_with(&mut out, &CsvFormatDefinition::default().with_bom_writing(false))?;
//! assert_eq!(out, b"name,score\nAda,9;5");
//! # Ok::<(), csvtable::common::Error>(())
//! ```

pub mod config;
pub mod detect;
pub mod format;
pub mod parser;
pub mod workbook;
pub mod writer;

pub use config::CsvConfig;
pub use format::{CsvFormatDefinition, Dialect, Enclosement, EolType, MetaChar};
pub use parser::{CodepointSource, DelimitedTextReader, SliceSource, StreamSource};
pub use workbook::{CsvTable, ReadOptions};
pub use writer::{WritePolicy, write_table};

#[cfg(test)]
mod tests;
