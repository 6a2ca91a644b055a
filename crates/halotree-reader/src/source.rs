//! The structured-file seam.
//!
//! Everything the reader needs from an opened merger-tree file goes through
//! [`TreeSource`]: scalar attributes on a group, dataset extents, the
//! integer per-tree count array, compound member inspection, and compound
//! row reads with a runtime descriptor. The HDF5 backend lives in its own
//! crate; [`crate::memory::MemoryTreeFile`] implements the same contract
//! in memory.
//!
//! Implementations are used from one thread at a time and do no locking.

use std::fmt;

use halotree_error::Result;
use halotree_types::PrimitiveType;
use serde::Serialize;

use crate::compound::CompoundLayout;

/// Declared type of an on-disk compound member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum OnDiskType {
    Primitive(PrimitiveType),
    /// Any type the record layouts never use, described for diagnostics.
    Other(String),
}

impl OnDiskType {
    #[must_use]
    pub fn is(&self, expected: PrimitiveType) -> bool {
        matches!(self, Self::Primitive(ty) if *ty == expected)
    }
}

impl fmt::Display for OnDiskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(ty) => ty.fmt(f),
            Self::Other(desc) => f.write_str(desc),
        }
    }
}

/// One member of an on-disk compound type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberInfo {
    pub name: String,
    pub ty: OnDiskType,
}

/// Contiguous run of rows `[start, start + count)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RowWindow {
    pub start: usize,
    pub count: usize,
}

impl RowWindow {
    #[must_use]
    pub const fn new(start: usize, count: usize) -> Self {
        Self { start, count }
    }

    /// One past the last row.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.start + self.count
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// An opened merger-tree file.
pub trait TreeSource {
    /// Name of the underlying file, for diagnostics.
    fn name(&self) -> &str;

    /// Read an integer scalar attribute attached to `group`.
    fn read_scalar_attribute(&self, group: &str, attribute: &str) -> Result<i64>;

    /// Number of rows in a one-dimensional dataset.
    fn dataset_len(&self, dataset: &str) -> Result<usize>;

    /// Read a whole one-dimensional integer dataset.
    fn read_int_array(&self, dataset: &str) -> Result<Vec<i64>>;

    /// Members of a compound dataset's row type, in on-disk order.
    fn compound_members(&self, dataset: &str) -> Result<Vec<MemberInfo>>;

    /// Read `window` rows of a compound dataset into a zeroed buffer of
    /// `layout.buffer_len(window.count)` bytes, placing each layout member
    /// at its offset. Members absent from the layout are left zero.
    fn read_compound_rows(
        &self,
        dataset: &str,
        layout: &CompoundLayout,
        window: RowWindow,
    ) -> Result<Vec<u8>>;
}

impl<S: TreeSource + ?Sized> TreeSource for &S {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn read_scalar_attribute(&self, group: &str, attribute: &str) -> Result<i64> {
        (**self).read_scalar_attribute(group, attribute)
    }

    fn dataset_len(&self, dataset: &str) -> Result<usize> {
        (**self).dataset_len(dataset)
    }

    fn read_int_array(&self, dataset: &str) -> Result<Vec<i64>> {
        (**self).read_int_array(dataset)
    }

    fn compound_members(&self, dataset: &str) -> Result<Vec<MemberInfo>> {
        (**self).compound_members(dataset)
    }

    fn read_compound_rows(
        &self,
        dataset: &str,
        layout: &CompoundLayout,
        window: RowWindow,
    ) -> Result<Vec<u8>> {
        (**self).read_compound_rows(dataset, layout, window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_window_bounds() {
        let window = RowWindow::new(2, 5);
        assert_eq!(window.end(), 7);
        assert!(!window.is_empty());
        assert!(RowWindow::new(2, 0).is_empty());
    }

    #[test]
    fn test_on_disk_type_matching() {
        let ty = OnDiskType::Primitive(PrimitiveType::Int64);
        assert!(ty.is(PrimitiveType::Int64));
        assert!(!ty.is(PrimitiveType::Int32));
        let other = OnDiskType::Other("uint16".to_owned());
        assert!(!other.is(PrimitiveType::Int32));
        assert_eq!(other.to_string(), "uint16");
        assert_eq!(ty.to_string(), "int64");
    }
}
