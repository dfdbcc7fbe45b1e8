//! csvtable - A sparse string table with a streaming CSV codec
//!
//! This library stores tabular text in a sparse, column-major table and
//! reads and writes it as delimited text in any dialect.
//!
//! # Features
//!
//! - **Sparse storage**: absent cells cost nothing and stay distinct from
//!   empty ones
//! - **Dialect detection**: separator, enclosing character, line terminator
//!   and encoding are detected when left open
//! - **Encodings**: UTF-8/16/32, UCS-2/4 and Latin-1, with byte-order marks
//! - **Streaming reads**: large files are tokenized through a refilling buffer
//! - **Sidecar configs**: a file's format can be persisted in `<path>.conf`
//!
//! # Example - Converting a semicolon file to tabs
//!
//! ```no_run
//! use csvtable::{CsvFormatDefinition, CsvTable};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut csv = CsvTable::new();
//! let found = csv.read_from_file("export.csv")?;
//! println!("Detected separator: {:?}", found.separator());
//!
//! csv.write_to_file_with("export.tsv", &CsvFormatDefinition::tsv())?;
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Building a table by hand
//!
//! ```
//! use csvtable::{CsvTable, SparseTable};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut table = SparseTable::new();
//! table.set_element(0, 0, "id");
//! table.set_element(0, 1, "note");
//! table.set_element(1, 0, "1");
//! table.set_element(1, 1, "a, b");
//!
//! let mut out = Vec::new();
//! CsvTable::from_table(table).write_to(&mut out)?;
//! assert_eq!(out, "\u{feff}id,note\n1,\"a, b\"".as_bytes());
//! # Ok(())
//! # }
//! ```

/// Shared error type, text encodings and byte-order marks
pub mod common;

/// Sparse table store and the delimited text codec
pub mod sheet;

// Re-export commonly used types for convenience
pub use common::{Error, Result, TextEncoding};
pub use sheet::SparseTable;
pub use sheet::text::{CsvConfig, CsvFormatDefinition, CsvTable, Enclosement, EolType, MetaChar};
