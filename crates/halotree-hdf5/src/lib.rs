//! HDF5 backend for the halo merger-tree reader.
//!
//! [`Hdf5TreeFile`] implements [`TreeSource`] over one `trees_<N>.hdf5`
//! file. Attributes, extents and integer arrays go through the safe `hdf5`
//! API; compound window reads use a runtime memory type (see [`raw`]).
//!
//! [`Hdf5TreeFile`] is neither `Send` nor `Sync`. The raw library calls in
//! this crate do not take the `hdf5` crate's global lock, so a file and every
//! session over it stay on the thread that opened them. Open one file per
//! thread to read several files concurrently.

mod members;
mod raw;

use std::marker::PhantomData;
use std::path::Path;

use halotree_error::{HaloTreeError, Result};
use halotree_reader::{
    CompoundLayout, FieldMapping, MemberInfo, ReaderConfig, RowWindow, TreeFileSession, TreeSource,
};
use hdf5::{Dataset, File};
use tracing::info;

/// An open merger-tree file.
///
/// Bound to the opening thread:
///
/// ```compile_fail
/// fn assert_send<T: Send>() {}
/// assert_send::<halotree_hdf5::Hdf5TreeFile>();
/// ```
#[derive(Debug)]
pub struct Hdf5TreeFile {
    name: String,
    file: File,
    /// Raw reads bypass the library lock.
    _unsync: PhantomData<*const ()>,
}

impl Hdf5TreeFile {
    /// Open a tree file read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let file = File::open(path).map_err(|err| HaloTreeError::resource("file", &name, err))?;
        info!(file = %name, "opened tree file");
        Ok(Self {
            name,
            file,
            _unsync: PhantomData,
        })
    }

    fn dataset(&self, path: &str) -> Result<Dataset> {
        self.file
            .dataset(path)
            .map_err(|err| HaloTreeError::resource("dataset", path, err))
    }

    fn one_dimensional(&self, path: &str) -> Result<(Dataset, usize)> {
        let dataset = self.dataset(path)?;
        match dataset.shape().as_slice() {
            [rows] => Ok((dataset, *rows)),
            shape => Err(HaloTreeError::resource(
                "dataset",
                path,
                format!("expected one dimension, found shape {shape:?}"),
            )),
        }
    }
}

impl TreeSource for Hdf5TreeFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_scalar_attribute(&self, group: &str, attribute: &str) -> Result<i64> {
        let location = format!("{group}:{attribute}");
        self.file
            .group(group)
            .map_err(|err| HaloTreeError::resource("group", group, err))?
            .attr(attribute)
            .and_then(|attr| attr.read_scalar::<i64>())
            .map_err(|err| HaloTreeError::resource("attribute", location, err))
    }

    fn dataset_len(&self, dataset: &str) -> Result<usize> {
        self.one_dimensional(dataset).map(|(_, rows)| rows)
    }

    fn read_int_array(&self, dataset: &str) -> Result<Vec<i64>> {
        let (handle, _) = self.one_dimensional(dataset)?;
        handle
            .read_raw::<i64>()
            .map_err(|err| HaloTreeError::resource("dataset", dataset, err))
    }

    fn compound_members(&self, dataset: &str) -> Result<Vec<MemberInfo>> {
        members::compound_members(&self.dataset(dataset)?, dataset)
    }

    fn read_compound_rows(
        &self,
        dataset: &str,
        layout: &CompoundLayout,
        window: RowWindow,
    ) -> Result<Vec<u8>> {
        let (handle, rows) = self.one_dimensional(dataset)?;
        if window.end() > rows {
            return Err(HaloTreeError::resource(
                "row window",
                dataset,
                format!(
                    "rows {}..{} exceed extent {rows}",
                    window.start,
                    window.end()
                ),
            ));
        }
        raw::read_window(&handle, dataset, layout, window)
    }
}

/// Open tree file `filenr` of the configured simulation and prepare it for
/// per-tree reads.
pub fn open_session(
    config: &ReaderConfig,
    mapping: &FieldMapping,
    filenr: u32,
) -> Result<TreeFileSession<Hdf5TreeFile>> {
    let file = Hdf5TreeFile::open(config.tree_file_path(filenr))?;
    TreeFileSession::open(file, mapping, config.load)
}
