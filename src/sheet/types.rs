//! Common types for table operations.

/// Row and column index type.
pub type Index = u32;

/// Largest usable row or column index. `Index::MAX` is reserved so that
/// `row_count()`/`col_count()` always fit in [`Index`].
pub const MAX_INDEX: Index = Index::MAX - 1;
