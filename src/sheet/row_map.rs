//! Row containers backing a single table column.
//!
//! A [`RowMap`] maps row indices to owned cell strings. How rows are looked
//! up is chosen by a [`Sortedness`] tag:
//!
//! - `Sorted` keeps entries ordered by row. Lookups are binary searches and
//!   appending a row past the current last one is O(1), which is the access
//!   pattern of a CSV read.
//! - `Unsorted` keeps insertion order. Lookups are linear, inserts of new rows
//!   are O(1) appends. Ascending iteration sorts a view on the fly.
//!
//! The container hands out no positions or cursors. Values borrowed from it
//! cannot outlive the next mutation, so there are no invalidation rules
//! beyond the borrow checker's.

use super::types::Index;

/// Lookup strategy of a [`RowMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sortedness {
    #[default]
    Sorted,
    Unsorted,
}

/// Row index to cell value map of one column.
#[derive(Debug, Clone, Default)]
pub struct RowMap {
    order: Sortedness,
    entries: Vec<(Index, Box<str>)>,
}

impl RowMap {
    pub fn new(order: Sortedness) -> Self {
        Self {
            order,
            entries: Vec::new(),
        }
    }

    pub fn order(&self) -> Sortedness {
        self.order
    }

    /// Switch strategy. Converting to `Sorted` sorts the entries.
    pub fn set_order(&mut self, order: Sortedness) {
        if order == Sortedness::Sorted && self.order == Sortedness::Unsorted {
            self.entries.sort_unstable_by_key(|(row, _)| *row);
        }
        self.order = order;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn find(&self, row: Index) -> Option<usize> {
        match self.order {
            Sortedness::Sorted => self.entries.binary_search_by_key(&row, |(r, _)| *r).ok(),
            Sortedness::Unsorted => self.entries.iter().position(|(r, _)| *r == row),
        }
    }

    pub fn get(&self, row: Index) -> Option<&str> {
        self.find(row).map(|i| &*self.entries[i].1)
    }

    pub fn contains(&self, row: Index) -> bool {
        self.find(row).is_some()
    }

    /// Insert or overwrite the value at `row`. Returns `true` when a new
    /// entry was created.
    pub fn insert(&mut self, row: Index, value: Box<str>) -> bool {
        match self.order {
            Sortedness::Sorted => {
                if self.entries.last().is_none_or(|(last, _)| *last < row) {
                    self.entries.push((row, value));
                    return true;
                }
                match self.entries.binary_search_by_key(&row, |(r, _)| *r) {
                    Ok(i) => {
                        self.entries[i].1 = value;
                        false
                    },
                    Err(i) => {
                        self.entries.insert(i, (row, value));
                        true
                    },
                }
            },
            Sortedness::Unsorted => match self.find(row) {
                Some(i) => {
                    self.entries[i].1 = value;
                    false
                },
                None => {
                    self.entries.push((row, value));
                    true
                },
            },
        }
    }

    pub fn remove(&mut self, row: Index) -> Option<Box<str>> {
        let i = self.find(row)?;
        Some(self.entries.remove(i).1)
    }

    /// Largest row index present.
    pub fn last_row(&self) -> Option<Index> {
        match self.order {
            Sortedness::Sorted => self.entries.last().map(|(row, _)| *row),
            Sortedness::Unsorted => self.entries.iter().map(|(row, _)| *row).max(),
        }
    }

    /// Entries in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (Index, &str)> + '_ {
        self.entries.iter().map(|(row, value)| (*row, &**value))
    }

    /// Entries in ascending row order, regardless of strategy.
    pub fn iter_ascending(&self) -> AscendingRows<'_> {
        match self.order {
            Sortedness::Sorted => AscendingRows::Sorted(self.entries.iter()),
            Sortedness::Unsorted => {
                let mut view: Vec<&(Index, Box<str>)> = self.entries.iter().collect();
                view.sort_unstable_by_key(|(row, _)| *row);
                AscendingRows::Unsorted(view.into_iter())
            },
        }
    }

    /// Shift every row at or after `at` down by one. A row that would move
    /// past `max_row` is dropped.
    pub(crate) fn open_row(&mut self, at: Index, max_row: Index) {
        self.entries.retain(|(row, _)| *row < at || *row < max_row);
        for (row, _) in self.entries.iter_mut() {
            if *row >= at {
                *row += 1;
            }
        }
    }

    /// Remove `at` and shift every later row up by one.
    pub(crate) fn close_row(&mut self, at: Index) {
        self.remove(at);
        for (row, _) in self.entries.iter_mut() {
            if *row > at {
                *row -= 1;
            }
        }
    }
}

/// Iterator returned by [`RowMap::iter_ascending`].
pub enum AscendingRows<'a> {
    Sorted(std::slice::Iter<'a, (Index, Box<str>)>),
    Unsorted(std::vec::IntoIter<&'a (Index, Box<str>)>),
}

impl<'a> Iterator for AscendingRows<'a> {
    type Item = (Index, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        let (row, value) = match self {
            AscendingRows::Sorted(iter) => iter.next()?,
            AscendingRows::Unsorted(iter) => iter.next()?,
        };
        Some((*row, &**value))
    }
}
