//! Sparse tabular data store and its delimited text codec.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use csvtable::sheet::text::CsvTable;
//!
//! // Read any CSV dialect; separator and encoding are detected
//! let mut table = CsvTable::new();
//! let format = table.read_from_file("data.csv")?;
//! println!("Separator: {:?}", format.separator());
//!
//! // Cells are addressed by (row, column), both 0-based
//! if let Some(value) = table.table().element(0, 0) {
//!     println!("A1 = {}", value);
//! }
//!
//! // Save with the format that was read
//! table.write_to_file("copy.csv")?;
//! # Ok::<(), csvtable::common::Error>(())
//! ```
//!
//! # Architecture
//!
//! - [`SparseTable`]: column-major sparse storage of owned strings
//! - [`text`]: CSV reader, writer, format definition and sidecar config

// Submodule declarations
pub mod row_map;
pub mod table;
pub mod text;
pub mod types;

// Re-exports
pub use row_map::{RowMap, Sortedness};
pub use table::SparseTable;
pub use types::{Index, MAX_INDEX};
