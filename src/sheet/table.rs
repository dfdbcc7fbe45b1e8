//! Sparse two-dimensional string table.

use super::row_map::{AscendingRows, RowMap, Sortedness};
use super::types::{Index, MAX_INDEX};

/// Sparse table of owned UTF-8 strings indexed by (row, column).
///
/// Storage is column-major: one [`RowMap`] per column holding only the rows
/// that were set. An absent cell and a cell holding the empty string are
/// different things; see [`SparseTable::is_equivalent_to`] for the comparison
/// that does not distinguish them.
///
/// `row_count()` is one past the largest row index ever set (not the number
/// of stored cells) and `col_count()` likewise for columns.
#[derive(Debug, Clone, Default)]
pub struct SparseTable {
    columns: Vec<RowMap>,
    row_count: Index,
    col_count: Index,
    row_order: Sortedness,
}

impl SparseTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table whose columns use the given row lookup strategy.
    pub fn with_row_order(row_order: Sortedness) -> Self {
        Self {
            row_order,
            ..Self::default()
        }
    }

    pub fn row_order(&self) -> Sortedness {
        self.row_order
    }

    /// Change the row lookup strategy of every column.
    pub fn set_row_order(&mut self, row_order: Sortedness) {
        self.row_order = row_order;
        for column in &mut self.columns {
            column.set_order(row_order);
        }
    }

    pub fn row_count(&self) -> Index {
        self.row_count
    }

    pub fn col_count(&self) -> Index {
        self.col_count
    }

    /// Number of cells actually stored.
    pub fn cell_count(&self) -> usize {
        self.columns.iter().map(RowMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// Number of positions in the `row_count() x col_count()` grid.
    pub fn grid_size(&self) -> u64 {
        u64::from(self.row_count) * u64::from(self.col_count)
    }

    /// Row-major position of (row, col) in the grid.
    ///
    /// Computed in 64 bits: both factors are below 2^32, so the product
    /// cannot overflow.
    pub fn linear_index(&self, row: Index, col: Index) -> u64 {
        u64::from(row) * u64::from(self.col_count) + u64::from(col)
    }

    /// Store a copy of `value` at (row, col), overwriting any previous value.
    ///
    /// Returns `false` and stores nothing if either index is above
    /// [`MAX_INDEX`].
    ///
    /// Only rows are sparse. Columns are kept in a dense vector, so setting
    /// column `col` allocates an empty row map for every column below it.
    pub fn set_element(&mut self, row: Index, col: Index, value: &str) -> bool {
        if row > MAX_INDEX || col > MAX_INDEX {
            return false;
        }
        let col_idx = col as usize;
        if self.columns.len() <= col_idx {
            let order = self.row_order;
            self.columns.resize_with(col_idx + 1, || RowMap::new(order));
        }
        self.columns[col_idx].insert(row, Box::from(value));
        self.row_count = self.row_count.max(row + 1);
        self.col_count = self.col_count.max(col + 1);
        true
    }

    /// Value at (row, col). `None` for absent cells, `Some("")` for empty ones.
    pub fn element(&self, row: Index, col: Index) -> Option<&str> {
        self.columns.get(col as usize)?.get(row)
    }

    /// Drop all content and reset the counts.
    pub fn clear(&mut self) {
        self.columns.clear();
        self.row_count = 0;
        self.col_count = 0;
    }

    pub fn column(&self, col: Index) -> Option<&RowMap> {
        self.columns.get(col as usize)
    }

    /// Columns in ascending index order, including columns without cells.
    pub fn columns(&self) -> impl Iterator<Item = (Index, &RowMap)> + '_ {
        self.columns.iter().enumerate().map(|(col, rows)| (col as Index, rows))
    }

    pub fn for_each_column_ascending<F: FnMut(Index, &RowMap)>(&self, mut f: F) {
        for (col, rows) in self.columns() {
            f(col, rows);
        }
    }

    /// Cells of one column in ascending row order.
    pub fn column_entries(&self, col: Index) -> impl Iterator<Item = (Index, &str)> + '_ {
        self.column(col).map(RowMap::iter_ascending).into_iter().flatten()
    }

    pub fn for_each_row_entry_in_column_ascending<F: FnMut(Index, &str)>(&self, col: Index, mut f: F) {
        for (row, value) in self.column_entries(col) {
            f(row, value);
        }
    }

    /// Cells of one row in ascending column order.
    pub fn row_entries(&self, row: Index) -> impl Iterator<Item = (Index, &str)> + '_ {
        self.columns
            .iter()
            .enumerate()
            .filter_map(move |(col, rows)| rows.get(row).map(|value| (col as Index, value)))
    }

    /// Ascending per-column iterators, one per column index below
    /// `col_count()`. Used by writers that merge columns into rows.
    pub(crate) fn ascending_columns(&self) -> Vec<AscendingRows<'_>> {
        self.columns.iter().map(RowMap::iter_ascending).collect()
    }

    /// Insert an empty row before `at`, shifting later rows down.
    pub fn insert_row(&mut self, at: Index) {
        if at >= self.row_count {
            return;
        }
        for column in &mut self.columns {
            column.open_row(at, MAX_INDEX);
        }
        self.row_count = self.row_count.saturating_add(1).min(MAX_INDEX + 1);
    }

    /// Remove row `at`, shifting later rows up.
    pub fn remove_row(&mut self, at: Index) {
        if at >= self.row_count {
            return;
        }
        for column in &mut self.columns {
            column.close_row(at);
        }
        self.row_count -= 1;
    }

    /// Insert an empty column before `at`, shifting later columns right.
    pub fn insert_column(&mut self, at: Index) {
        if at >= self.col_count {
            return;
        }
        if self.col_count > MAX_INDEX {
            self.columns.truncate(MAX_INDEX as usize);
            self.col_count = MAX_INDEX;
        }
        self.columns.insert(at as usize, RowMap::new(self.row_order));
        self.col_count += 1;
    }

    /// Remove column `at`, shifting later columns left.
    pub fn remove_column(&mut self, at: Index) {
        if at >= self.col_count {
            return;
        }
        if (at as usize) < self.columns.len() {
            self.columns.remove(at as usize);
        }
        self.col_count -= 1;
    }

    /// Strict comparison: sizes and every cell must match, and an absent cell
    /// never equals an empty one.
    pub fn is_content_and_sizes_identical_with(&self, other: &SparseTable) -> bool {
        self.compare(other, false)
    }

    /// Like [`is_content_and_sizes_identical_with`](Self::is_content_and_sizes_identical_with)
    /// but an absent cell equals an empty one. This is the relation preserved
    /// by a CSV write/read round trip, since absent cells are written as
    /// empty fields.
    pub fn is_equivalent_to(&self, other: &SparseTable) -> bool {
        self.compare(other, true)
    }

    fn compare(&self, other: &SparseTable, absent_as_empty: bool) -> bool {
        if self.row_count != other.row_count || self.col_count != other.col_count {
            return false;
        }
        (0..self.col_count).all(|col| {
            rows_match(self.column_entries(col), other.column_entries(col), absent_as_empty)
        })
    }
}

/// Table equality is strict: absent and empty cells differ.
impl PartialEq for SparseTable {
    fn eq(&self, other: &Self) -> bool {
        self.is_content_and_sizes_identical_with(other)
    }
}

impl Eq for SparseTable {}

fn rows_match<'a, 'b>(
    mut a: impl Iterator<Item = (Index, &'a str)>,
    mut b: impl Iterator<Item = (Index, &'b str)>,
    absent_as_empty: bool,
) -> bool {
    let absent_matches = |value: &str| absent_as_empty && value.is_empty();
    let mut next_a = a.next();
    let mut next_b = b.next();
    loop {
        match (next_a, next_b) {
            (None, None) => return true,
            (Some((row_a, value_a)), Some((row_b, value_b))) if row_a == row_b => {
                if value_a != value_b {
                    return false;
                }
                next_a = a.next();
                next_b = b.next();
            },
            (Some((row_a, value_a)), Some((row_b, _))) if row_a < row_b => {
                if !absent_matches(value_a) {
                    return false;
                }
                next_a = a.next();
            },
            (Some((_, value_a)), None) => {
                if !absent_matches(value_a) {
                    return false;
                }
                next_a = a.next();
            },
            (_, Some((_, value_b))) => {
                if !absent_matches(value_b) {
                    return false;
                }
                next_b = b.next();
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_element_grows_counts() {
        let mut table = SparseTable::new();
        assert!(table.set_element(5, 3, "x"));
        assert_eq!(table.row_count(), 6);
        assert_eq!(table.col_count(), 4);
        assert_eq!(table.cell_count(), 1);
        assert_eq!(table.element(5, 3), Some("x"));
        assert_eq!(table.element(0, 0), None);
    }

    #[test]
    fn test_columns_are_dense_rows_are_sparse() {
        let mut table = SparseTable::new();
        table.set_element(1_000_000, 3, "x");
        assert_eq!(table.columns().count(), 4);
        assert!(table.column(0).is_some_and(RowMap::is_empty));
        assert_eq!(table.column(3).map(RowMap::len), Some(1));
        assert_eq!(table.cell_count(), 1);
    }

    #[test]
    fn test_absent_and_empty_are_distinct() {
        let mut table = SparseTable::new();
        table.set_element(0, 1, "");
        assert_eq!(table.element(0, 1), Some(""));
        assert_eq!(table.element(0, 0), None);
    }

    #[test]
    fn test_overwrite_keeps_arity() {
        let mut table = SparseTable::new();
        table.set_element(1, 1, "a");
        table.set_element(1, 1, "b");
        assert_eq!(table.cell_count(), 1);
        assert_eq!(table.element(1, 1), Some("b"));
        assert_eq!((table.row_count(), table.col_count()), (2, 2));
    }

    #[test]
    fn test_reserved_index_is_rejected() {
        let mut table = SparseTable::new();
        assert!(!table.set_element(Index::MAX, 0, "x"));
        assert!(!table.set_element(0, Index::MAX, "x"));
        assert!(table.is_empty());
        assert!(table.set_element(MAX_INDEX, 0, "x"));
        assert_eq!(table.row_count(), Index::MAX);
    }

    #[test]
    fn test_linear_index_is_wide() {
        let mut table = SparseTable::new();
        table.set_element(MAX_INDEX, 2, "x");
        let expected = u64::from(MAX_INDEX) * 3 + 2;
        assert_eq!(table.linear_index(MAX_INDEX, 2), expected);
        assert_eq!(table.grid_size(), u64::from(Index::MAX) * 3);
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut table = SparseTable::new();
        table.set_element(2, 2, "x");
        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.col_count(), 0);
        assert_eq!(table.element(2, 2), None);
    }

    #[test]
    fn test_column_iteration_is_ascending() {
        for order in [Sortedness::Sorted, Sortedness::Unsorted] {
            let mut table = SparseTable::with_row_order(order);
            table.set_element(4, 0, "e");
            table.set_element(0, 0, "a");
            table.set_element(2, 0, "c");
            table.set_element(1, 2, "z");

            let mut seen = Vec::new();
            table.for_each_row_entry_in_column_ascending(0, |row, value| seen.push((row, value.to_string())));
            assert_eq!(seen, [(0, "a".to_string()), (2, "c".to_string()), (4, "e".to_string())]);

            let mut cols = Vec::new();
            table.for_each_column_ascending(|col, rows| cols.push((col, rows.len())));
            assert_eq!(cols, [(0, 3), (1, 0), (2, 1)]);
        }
    }

    #[test]
    fn test_set_row_order_converts_columns() {
        let mut table = SparseTable::with_row_order(Sortedness::Unsorted);
        table.set_element(3, 0, "d");
        table.set_element(1, 0, "b");
        table.set_row_order(Sortedness::Sorted);
        assert_eq!(table.column(0).map(RowMap::order), Some(Sortedness::Sorted));
        let rows: Vec<Index> = table.column(0).unwrap().iter().map(|(row, _)| row).collect();
        assert_eq!(rows, [1, 3]);
    }

    #[test]
    fn test_row_entries() {
        let mut table = SparseTable::new();
        table.set_element(1, 0, "a");
        table.set_element(1, 3, "d");
        table.set_element(0, 1, "x");
        let row: Vec<(Index, &str)> = table.row_entries(1).collect();
        assert_eq!(row, [(0, "a"), (3, "d")]);
    }

    #[test]
    fn test_insert_and_remove_rows() {
        let mut table = SparseTable::new();
        table.set_element(0, 0, "a");
        table.set_element(1, 0, "b");
        table.set_element(2, 1, "c");

        table.insert_row(1);
        assert_eq!(table.row_count(), 4);
        assert_eq!(table.element(1, 0), None);
        assert_eq!(table.element(2, 0), Some("b"));
        assert_eq!(table.element(3, 1), Some("c"));

        table.remove_row(0);
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.element(1, 0), Some("b"));
        assert_eq!(table.element(2, 1), Some("c"));

        // Out of range is a no-op
        table.remove_row(10);
        table.insert_row(10);
        assert_eq!(table.row_count(), 3);
    }

    #[test]
    fn test_insert_and_remove_columns() {
        let mut table = SparseTable::new();
        table.set_element(0, 0, "a");
        table.set_element(0, 1, "b");

        table.insert_column(0);
        assert_eq!(table.col_count(), 3);
        assert_eq!(table.element(0, 0), None);
        assert_eq!(table.element(0, 1), Some("a"));
        assert_eq!(table.element(0, 2), Some("b"));

        table.remove_column(1);
        assert_eq!(table.col_count(), 2);
        assert_eq!(table.element(0, 1), Some("b"));
    }

    #[test]
    fn test_strict_equality_distinguishes_absent_and_empty() {
        let mut with_empty = SparseTable::new();
        with_empty.set_element(0, 0, "");
        with_empty.set_element(0, 1, "x");

        let mut with_absent = SparseTable::new();
        with_absent.set_element(0, 1, "x");

        assert_ne!(with_empty, with_absent);
        assert!(!with_empty.is_content_and_sizes_identical_with(&with_absent));
        assert!(with_empty.is_equivalent_to(&with_absent));
        assert!(with_absent.is_equivalent_to(&with_empty));
    }

    #[test]
    fn test_equality_requires_same_sizes_and_values() {
        let mut a = SparseTable::new();
        a.set_element(0, 0, "x");
        let mut b = a.clone();
        assert_eq!(a, b);

        b.set_element(0, 0, "y");
        assert_ne!(a, b);
        assert!(!a.is_equivalent_to(&b));

        let mut c = a.clone();
        c.set_element(1, 0, "");
        assert!(!a.is_equivalent_to(&c));
    }

    #[test]
    fn test_equality_ignores_row_order_strategy() {
        let mut sorted = SparseTable::new();
        let mut unsorted = SparseTable::with_row_order(Sortedness::Unsorted);
        for (row, value) in [(3, "d"), (0, "a"), (1, "b")] {
            sorted.set_element(row, 0, value);
            unsorted.set_element(row, 0, value);
        }
        assert_eq!(sorted, unsorted);
    }
}
