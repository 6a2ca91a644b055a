//! Windowed record reads.

use halotree_error::Result;
use halotree_types::{HaloIdRecord, HaloRecord, RecordLayout, decode_records};
use tracing::debug;

use crate::compound::CompoundLayout;
use crate::source::{RowWindow, TreeSource};

/// Read the contiguous rows of `window` from a compound dataset into typed
/// records. An empty window yields an empty vector without touching the
/// source.
pub fn read_records<T: RecordLayout, S: TreeSource + ?Sized>(
    source: &S,
    dataset: &str,
    layout: &CompoundLayout,
    window: RowWindow,
) -> Result<Vec<T>> {
    if window.is_empty() {
        return Ok(Vec::new());
    }
    debug!(
        file = source.name(),
        dataset,
        kind = %T::KIND,
        offset = window.start,
        count = window.count,
        "windowed read"
    );
    let bytes = source.read_compound_rows(dataset, layout, window)?;
    decode_records::<T>(&bytes)
}

/// The records of one tree.
///
/// Owns its buffers; dropping the window releases them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeWindow {
    pub tree: usize,
    /// Row of the tree's first halo in the file-wide halo dataset.
    pub first_row: usize,
    pub halos: Vec<HaloRecord>,
    /// Identifier records, row-aligned with `halos`, when identifiers are
    /// loaded.
    pub ids: Option<Vec<HaloIdRecord>>,
}

impl TreeWindow {
    #[must_use]
    pub fn len(&self) -> usize {
        self.halos.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.halos.is_empty()
    }

    /// File-wide row of a tree-local halo index.
    #[must_use]
    pub fn file_row(&self, local: usize) -> Option<usize> {
        (local < self.halos.len()).then(|| self.first_row + local)
    }
}
