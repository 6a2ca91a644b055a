//! Per-file tree index.
//!
//! A file stores every halo of every tree in one flat compound dataset,
//! tree after tree. The index turns the per-tree halo counts into starting
//! rows with an exclusive prefix sum:
//!
//! ```text
//! counts       [2, 0, 5]
//! first halo   [0, 2, 2]
//! ```

use halotree_error::{HaloTreeError, Result};
use halotree_types::FieldTag;
use serde::Serialize;
use tracing::info;

use crate::field_map::FieldMapping;
use crate::source::{RowWindow, TreeSource};

/// Halo counts and starting rows for every tree of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TreeIndex {
    total_halos: usize,
    halos_per_tree: Vec<usize>,
    first_halo: Vec<usize>,
}

impl TreeIndex {
    /// Build an index from the total-halo attribute and the per-tree count
    /// array.
    ///
    /// # Errors
    /// [`HaloTreeError::CorruptInput`] for a negative count or total;
    /// [`HaloTreeError::SizeMismatch`] when the counts do not sum to the
    /// declared total.
    pub fn from_counts(total_halos: i64, counts: &[i64]) -> Result<Self> {
        let total_halos = non_negative("total halo count", total_halos)?;

        let mut halos_per_tree = Vec::with_capacity(counts.len());
        let mut first_halo = Vec::with_capacity(counts.len());
        let mut next = 0_usize;
        for (tree, &count) in counts.iter().enumerate() {
            let count = usize::try_from(count).map_err(|_| {
                HaloTreeError::corrupt(format!("halo count of tree {tree} is negative: {count}"))
            })?;
            first_halo.push(next);
            halos_per_tree.push(count);
            next = next
                .checked_add(count)
                .ok_or_else(|| HaloTreeError::corrupt("per-tree halo counts overflow"))?;
        }

        if next != total_halos {
            return Err(HaloTreeError::SizeMismatch {
                what: "sum of per-tree halo counts vs NHalos attribute".to_owned(),
                declared: total_halos as u64,
                actual: next as u64,
            });
        }

        Ok(Self {
            total_halos,
            halos_per_tree,
            first_halo,
        })
    }

    #[must_use]
    pub fn tree_count(&self) -> usize {
        self.halos_per_tree.len()
    }

    #[must_use]
    pub const fn total_halos(&self) -> usize {
        self.total_halos
    }

    #[must_use]
    pub fn halos_per_tree(&self) -> &[usize] {
        &self.halos_per_tree
    }

    #[must_use]
    pub fn first_halo_offsets(&self) -> &[usize] {
        &self.first_halo
    }

    #[must_use]
    pub fn halos_in_tree(&self, tree: usize) -> Option<usize> {
        self.halos_per_tree.get(tree).copied()
    }

    #[must_use]
    pub fn first_halo(&self, tree: usize) -> Option<usize> {
        self.first_halo.get(tree).copied()
    }

    /// Row window of one tree.
    ///
    /// # Errors
    /// [`HaloTreeError::TreeOutOfRange`] if `tree >= tree_count()`.
    pub fn window(&self, tree: usize) -> Result<RowWindow> {
        match (self.first_halo(tree), self.halos_in_tree(tree)) {
            (Some(start), Some(count)) => Ok(RowWindow::new(start, count)),
            _ => Err(HaloTreeError::TreeOutOfRange {
                tree,
                tree_count: self.tree_count(),
            }),
        }
    }
}

fn non_negative(what: &str, value: i64) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| HaloTreeError::corrupt(format!("{what} is negative or too large: {value}")))
}

/// Read the tree index of an opened file.
///
/// Reads the tree-count and total-halo attributes from the merger-tree
/// group and the per-tree count array, and checks them against each other
/// and against the extent of the halo dataset.
pub fn load_tree_index<S: TreeSource>(source: &S, mapping: &FieldMapping) -> Result<TreeIndex> {
    let group = mapping.require(FieldTag::MergerTreeGroup)?;
    let tree_count = source.read_scalar_attribute(group, mapping.require(FieldTag::NTrees)?)?;
    let total_halos = source.read_scalar_attribute(group, mapping.require(FieldTag::NHalos)?)?;
    let tree_count_usize = non_negative("NTrees attribute", tree_count)?;
    let total_halos_usize = non_negative("NHalos attribute", total_halos)?;

    let counts_dataset = mapping.require(FieldTag::NHalosInTreeDataset)?;
    let counts_len = source.dataset_len(counts_dataset)?;
    if counts_len != tree_count_usize {
        return Err(HaloTreeError::SizeMismatch {
            what: format!("NTrees attribute vs length of {counts_dataset}"),
            declared: tree_count_usize as u64,
            actual: counts_len as u64,
        });
    }

    let halo_dataset = mapping.require(FieldTag::MergerTreeDataset)?;
    let halo_rows = source.dataset_len(halo_dataset)?;
    if halo_rows != total_halos_usize {
        return Err(HaloTreeError::SizeMismatch {
            what: format!("NHalos attribute vs rows of {halo_dataset}"),
            declared: total_halos_usize as u64,
            actual: halo_rows as u64,
        });
    }

    let counts = if tree_count_usize == 0 {
        Vec::new()
    } else {
        source.read_int_array(counts_dataset)?
    };
    if counts.len() != tree_count_usize {
        return Err(HaloTreeError::SizeMismatch {
            what: format!("NTrees attribute vs values read from {counts_dataset}"),
            declared: tree_count_usize as u64,
            actual: counts.len() as u64,
        });
    }

    let index = TreeIndex::from_counts(total_halos, &counts)?;
    info!(
        file = source.name(),
        trees = index.tree_count(),
        halos = index.total_halos(),
        "tree index built"
    );
    Ok(index)
}
