//! Active index sets.
//!
//! An [`ActiveList`] selects which scalar elements of a payload take part in
//! one analysis round. The same instance must drive both the scatter into
//! the shared matrix and the gather back out; the iteration order is the row
//! order.

use std::iter::Copied;
use std::ops::Range;
use std::slice;

use ensnode_error::{EnsError, Result};
use hashbrown::HashSet;

/// Selection mode of an [`ActiveList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveMode {
    /// Every element, in index order.
    #[default]
    All,
    /// No element.
    Inactive,
    /// An explicit ordered subset.
    Partial,
}

/// Ordered selector over a payload's scalar elements.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActiveList {
    mode: ActiveMode,
    indices: Vec<usize>,
    // Membership of `indices`, for constant-time duplicate checks.
    seen: HashSet<usize>,
}

impl ActiveList {
    /// Select every element.
    #[must_use]
    pub fn all() -> Self {
        Self {
            mode: ActiveMode::All,
            indices: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Select nothing.
    #[must_use]
    pub fn inactive() -> Self {
        Self {
            mode: ActiveMode::Inactive,
            indices: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Explicit subset in the given order. Repeated indices are kept once,
    /// at their first position.
    #[must_use]
    pub fn from_indices<I>(indices: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        let mut list = Self::inactive();
        for index in indices {
            list.add_index(index);
        }
        list
    }

    /// Append one index, switching the list to partial mode.
    ///
    /// Adding to an `All` list is a no-op: it already covers every element.
    pub fn add_index(&mut self, index: usize) {
        match self.mode {
            ActiveMode::All => {}
            ActiveMode::Inactive | ActiveMode::Partial => {
                if self.seen.insert(index) {
                    self.mode = ActiveMode::Partial;
                    self.indices.push(index);
                }
            }
        }
    }

    #[must_use]
    pub const fn mode(&self) -> ActiveMode {
        self.mode
    }

    /// Explicit indices, or `None` in `All`/`Inactive` mode.
    #[must_use]
    pub fn indices(&self) -> Option<&[usize]> {
        match self.mode {
            ActiveMode::Partial => Some(&self.indices),
            ActiveMode::All | ActiveMode::Inactive => None,
        }
    }

    /// Number of selected elements for a payload of `data_size` elements.
    #[must_use]
    pub fn active_size(&self, data_size: usize) -> usize {
        match self.mode {
            ActiveMode::All => data_size,
            ActiveMode::Inactive => 0,
            ActiveMode::Partial => self.indices.len(),
        }
    }

    /// Check every index is below `data_size`.
    pub fn validate(&self, data_size: usize) -> Result<()> {
        if let Some(&bad) = self.indices().and_then(|idx| idx.iter().find(|&&i| i >= data_size)) {
            return Err(EnsError::dimension(format!(
                "active index {bad} out of range for {data_size} elements"
            )));
        }
        Ok(())
    }

    /// Iterate the selected element indices in row order.
    #[must_use]
    pub fn iter(&self, data_size: usize) -> ActiveIter<'_> {
        match self.mode {
            ActiveMode::All => ActiveIter::Range(0..data_size),
            ActiveMode::Inactive => ActiveIter::Range(0..0),
            ActiveMode::Partial => ActiveIter::Listed(self.indices.iter().copied()),
        }
    }
}

/// Iterator returned by [`ActiveList::iter`].
#[derive(Debug, Clone)]
pub enum ActiveIter<'a> {
    Range(Range<usize>),
    Listed(Copied<slice::Iter<'a, usize>>),
}

impl Iterator for ActiveIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        match self {
            Self::Range(range) => range.next(),
            Self::Listed(iter) => iter.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Self::Range(range) => range.size_hint(),
            Self::Listed(iter) => iter.size_hint(),
        }
    }
}

impl ExactSizeIterator for ActiveIter<'_> {}
