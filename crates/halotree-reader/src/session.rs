//! One open merger-tree file.
//!
//! [`TreeFileSession::open`] runs the per-file pipeline once: schema
//! validation, descriptor construction, index loading and the optional
//! preload. After that, [`TreeFileSession::read_tree`] serves any tree in
//! any order. Schema problems surface before a single record is read.
//!
//! Every mapped member is validated whatever the load flags say: the flags
//! only choose which members the descriptors read.

use halotree_error::{HaloTreeError, Result};
use halotree_types::{FieldTag, HaloIdRecord, HaloRecord, TagKind};
use tracing::{debug, info};

use crate::compound::{CompoundLayout, CompoundRecordBuilder};
use crate::field_map::FieldMapping;
use crate::schema::{SchemaReport, SchemaValidator};
use crate::settings::LoadOptions;
use crate::source::{RowWindow, TreeSource};
use crate::tree_index::{TreeIndex, load_tree_index};
use crate::window::{TreeWindow, read_records};

#[derive(Debug)]
struct Preloaded {
    halos: Vec<HaloRecord>,
    ids: Option<Vec<HaloIdRecord>>,
}

/// Schema, descriptors, index and (optionally) preloaded records of one
/// input file, owning the file itself.
///
/// Not shareable across threads without external serialization; the
/// underlying source does no locking.
#[derive(Debug)]
pub struct TreeFileSession<S: TreeSource> {
    source: S,
    options: LoadOptions,
    halo_dataset: String,
    ids_dataset: String,
    halo_schema: SchemaReport,
    id_schema: SchemaReport,
    halo_layout: CompoundLayout,
    id_layout: Option<CompoundLayout>,
    index: TreeIndex,
    preloaded: Option<Preloaded>,
}

impl<S: TreeSource> TreeFileSession<S> {
    /// Validate `source` against `mapping` and build everything needed for
    /// per-tree reads.
    ///
    /// # Errors
    /// [`HaloTreeError::SchemaMismatch`] for a mapped member of the wrong
    /// type, [`HaloTreeError::SizeMismatch`] for inconsistent extents, and
    /// any resource error from the source.
    pub fn open(source: S, mapping: &FieldMapping, options: LoadOptions) -> Result<Self> {
        let builder = CompoundRecordBuilder::new(mapping, options);
        let validator = SchemaValidator::new(mapping);

        let halo_dataset = mapping.require(FieldTag::MergerTreeDataset)?.to_owned();
        let halo_tags: Vec<FieldTag> = FieldTag::of_kind(TagKind::HaloMember).collect();
        let halo_schema = validator.validate(&source, &halo_dataset, &halo_tags)?;

        let ids_dataset = mapping.ids_dataset_path()?.to_owned();
        let id_tags: Vec<FieldTag> = FieldTag::of_kind(TagKind::IdMember).collect();
        let id_schema = validator.validate(&source, &ids_dataset, &id_tags)?;

        let halo_layout = builder.halo_layout(&halo_schema)?;
        let id_layout = builder.id_layout(&id_schema)?;

        let index = load_tree_index(&source, mapping)?;

        if id_layout.is_some() && ids_dataset != halo_dataset {
            let dataset = ids_dataset.as_str();
            let rows = source.dataset_len(dataset)?;
            if rows != index.total_halos() {
                return Err(HaloTreeError::SizeMismatch {
                    what: format!("NHalos attribute vs rows of {dataset}"),
                    declared: index.total_halos() as u64,
                    actual: rows as u64,
                });
            }
        }

        let mut session = Self {
            source,
            options,
            halo_dataset,
            ids_dataset,
            halo_schema,
            id_schema,
            halo_layout,
            id_layout,
            index,
            preloaded: None,
        };

        if options.preload_trees {
            session.preload()?;
        }

        info!(
            file = session.source.name(),
            trees = session.index.tree_count(),
            halos = session.index.total_halos(),
            load_ids = options.load_ids,
            preload = options.preload_trees,
            "tree file opened"
        );
        Ok(session)
    }

    fn preload(&mut self) -> Result<()> {
        let all = RowWindow::new(0, self.index.total_halos());
        let halos = read_records::<HaloRecord, _>(
            &self.source,
            &self.halo_dataset,
            &self.halo_layout,
            all,
        )?;
        let ids = self.read_ids(all)?;
        info!(
            file = self.source.name(),
            halos = halos.len(),
            ids = ids.as_ref().map_or(0, Vec::len),
            "preloaded whole-file record arrays"
        );
        self.preloaded = Some(Preloaded { halos, ids });
        Ok(())
    }

    fn read_ids(&self, window: RowWindow) -> Result<Option<Vec<HaloIdRecord>>> {
        match &self.id_layout {
            Some(layout) => {
                read_records::<HaloIdRecord, _>(&self.source, &self.ids_dataset, layout, window)
                    .map(Some)
            }
            None => Ok(None),
        }
    }

    /// Records of tree `tree`.
    ///
    /// Trees may be requested in any order and more than once. A tree with
    /// no halos yields an empty window.
    ///
    /// # Errors
    /// [`HaloTreeError::TreeOutOfRange`] if `tree` is not below the tree
    /// count; any read error from the source.
    pub fn read_tree(&self, tree: usize) -> Result<TreeWindow> {
        let window = self.index.window(tree)?;
        debug!(
            file = self.source.name(),
            tree,
            offset = window.start,
            count = window.count,
            preloaded = self.preloaded.is_some(),
            "reading tree"
        );

        let (halos, ids) = match &self.preloaded {
            Some(preloaded) => (
                slice_window(&preloaded.halos, window)?.to_vec(),
                preloaded
                    .ids
                    .as_deref()
                    .map(|ids| slice_window(ids, window).map(<[HaloIdRecord]>::to_vec))
                    .transpose()?,
            ),
            None => (
                read_records::<HaloRecord, _>(
                    &self.source,
                    &self.halo_dataset,
                    &self.halo_layout,
                    window,
                )?,
                self.read_ids(window)?,
            ),
        };

        Ok(TreeWindow {
            tree,
            first_row: window.start,
            halos,
            ids,
        })
    }

    #[must_use]
    pub const fn index(&self) -> &TreeIndex {
        &self.index
    }

    #[must_use]
    pub const fn options(&self) -> LoadOptions {
        self.options
    }

    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    #[must_use]
    pub const fn halo_schema(&self) -> &SchemaReport {
        &self.halo_schema
    }

    /// Validation of the identifier members, run even when identifiers
    /// are not loaded.
    #[must_use]
    pub const fn id_schema(&self) -> &SchemaReport {
        &self.id_schema
    }

    #[must_use]
    pub const fn halo_layout(&self) -> &CompoundLayout {
        &self.halo_layout
    }

    #[must_use]
    pub const fn id_layout(&self) -> Option<&CompoundLayout> {
        self.id_layout.as_ref()
    }

    /// Whole-file halo array, when opened in preload mode.
    #[must_use]
    pub fn preloaded_halos(&self) -> Option<&[HaloRecord]> {
        self.preloaded.as_ref().map(|p| p.halos.as_slice())
    }

    /// Whole-file identifier array, when opened in preload mode with
    /// identifiers enabled.
    #[must_use]
    pub fn preloaded_ids(&self) -> Option<&[HaloIdRecord]> {
        self.preloaded.as_ref().and_then(|p| p.ids.as_deref())
    }

    /// Release the file and everything derived from it.
    pub fn close(self) {
        debug!(file = self.source.name(), "tree file closed");
    }
}

fn slice_window<T>(records: &[T], window: RowWindow) -> Result<&[T]> {
    records.get(window.start..window.end()).ok_or_else(|| {
        HaloTreeError::internal(format!(
            "window {}..{} outside preloaded array of {} records",
            window.start,
            window.end(),
            records.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_map::MILLENNIUM_FIELD_FORMAT;
    use crate::memory::{Column, CompoundData, MemoryTreeFile};

    fn mapping() -> FieldMapping {
        FieldMapping::parse(MILLENNIUM_FIELD_FORMAT, "fields.txt").unwrap()
    }

    fn halos(n: usize) -> Vec<HaloRecord> {
        (0..n)
            .map(|row| HaloRecord {
                len: row as i32 + 20,
                snap_num: 63,
                ..HaloRecord::default()
            })
            .collect()
    }

    fn file(counts: Vec<i64>) -> MemoryTreeFile {
        let mapping = mapping();
        let total: i64 = counts.iter().sum();
        MemoryTreeFile::new("trees_0.hdf5")
            .with_attribute("/MergerTrees", "NTrees", counts.len() as i64)
            .with_attribute("/MergerTrees", "NHalos", total)
            .with_int_array("/MergerTrees/NHalosInTree", counts)
            .with_compound(
                "/MergerTrees/Halos",
                CompoundData::from_halo_records(&mapping, &halos(total as usize)),
            )
    }

    #[test]
    fn test_open_and_read() {
        let session =
            TreeFileSession::open(file(vec![3, 1]), &mapping(), LoadOptions::default()).unwrap();
        assert!(session.halo_schema().is_complete());
        assert_eq!(session.halo_layout().members.len(), 19);
        // Identifier members are still validated; this file has none.
        assert_eq!(session.id_schema().missing.len(), 11);
        assert!(session.id_layout().is_none());
        assert!(session.preloaded_halos().is_none());

        let tree = session.read_tree(1).unwrap();
        assert_eq!(tree.first_row, 3);
        assert_eq!(tree.halos.len(), 1);
        assert_eq!(tree.halos[0].len, 23);
        assert!(tree.ids.is_none());
        session.close();
    }

    #[test]
    fn test_out_of_range_tree() {
        let session =
            TreeFileSession::open(file(vec![1]), &mapping(), LoadOptions::default()).unwrap();
        let err = session.read_tree(1).unwrap_err();
        assert!(matches!(
            err,
            HaloTreeError::TreeOutOfRange {
                tree: 1,
                tree_count: 1
            }
        ));
    }

    #[test]
    fn test_mismatch_fails_before_index_is_read() {
        // No attributes at all: a schema failure must win over index errors.
        let file = MemoryTreeFile::new("bad").with_compound(
            "/MergerTrees/Halos",
            CompoundData::new(1).column("SnapNum", Column::Float32(vec![1.0])),
        );
        let err = TreeFileSession::open(file, &mapping(), LoadOptions::default()).unwrap_err();
        assert!(err.is_schema_error());
    }

    #[test]
    fn test_main_leaf_is_validated_without_large_simulation() {
        let mapping = mapping();
        let file = file(vec![1]).with_compound(
            "/MergerTrees/Halos",
            CompoundData::from_halo_records(&mapping, &halos(1))
                .column("MainLeafID", Column::Int32(vec![0])),
        );
        let options = LoadOptions {
            load_ids: true,
            ..LoadOptions::default()
        };
        let err = TreeFileSession::open(file, &mapping, options).unwrap_err();
        match err {
            HaloTreeError::SchemaMismatch { tag, .. } => assert_eq!(tag, "HaloIDs_Data_MainLeafID"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_preload_keeps_whole_arrays() {
        let options = LoadOptions {
            preload_trees: true,
            ..LoadOptions::default()
        };
        let session = TreeFileSession::open(file(vec![2, 2]), &mapping(), options).unwrap();
        assert_eq!(session.preloaded_halos().map(<[HaloRecord]>::len), Some(4));
        assert!(session.preloaded_ids().is_none());
        assert_eq!(session.read_tree(1).unwrap().halos[1].len, 23);
    }

    #[test]
    fn test_schema_report_serializes_for_diagnostics() {
        let mapping = mapping();
        let halos = halos(2);
        let file = file(vec![2]).with_compound(
            "/MergerTrees/Halos",
            CompoundData::from_halo_records(&mapping, &halos).without("Vmax"),
        );
        let session = TreeFileSession::open(file, &mapping, LoadOptions::default()).unwrap();
        let json = serde_json::to_value(session.halo_schema()).unwrap();
        assert_eq!(json["dataset"], "/MergerTrees/Halos");
        assert_eq!(json["missing"], serde_json::json!(["HaloVmax"]));
        assert_eq!(json["found"].as_array().map(Vec::len), Some(18));
    }

    #[test]
    fn test_slice_window_bounds() {
        let values = [1, 2, 3];
        assert_eq!(slice_window(&values, RowWindow::new(1, 2)).unwrap(), &[2, 3]);
        assert!(slice_window(&values, RowWindow::new(2, 2)).is_err());
    }
}
