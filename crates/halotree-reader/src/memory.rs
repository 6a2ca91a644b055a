//! In-memory [`TreeSource`].
//!
//! Holds group attributes, integer arrays and column-stored compound
//! datasets. Compound reads follow the same rules as the native file
//! library: members are matched by name, each destination member is written
//! at its layout offset, and everything else in the buffer stays zero.
//! Used to craft inputs for tests and to feed synthetic trees to consumers.

use std::collections::HashMap;

use halotree_error::{HaloTreeError, Result};
use halotree_types::{FieldTag, HaloIdRecord, HaloRecord, PrimitiveType, TagKind};

use crate::compound::CompoundLayout;
use crate::field_map::FieldMapping;
use crate::source::{MemberInfo, OnDiskType, RowWindow, TreeSource};

/// Values of one compound member across all rows.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Int32(Vec<i32>),
    Float32(Vec<f32>),
    Int64(Vec<i64>),
    Float64(Vec<f64>),
    Float32x3(Vec<[f32; 3]>),
    /// A member of a type the reader never maps; carries no values.
    Other { type_name: String, rows: usize },
}

impl Column {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Int32(v) => v.len(),
            Self::Float32(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::Float32x3(v) => v.len(),
            Self::Other { rows, .. } => *rows,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn ty(&self) -> OnDiskType {
        match self {
            Self::Int32(_) => OnDiskType::Primitive(PrimitiveType::Int32),
            Self::Float32(_) => OnDiskType::Primitive(PrimitiveType::Float32),
            Self::Int64(_) => OnDiskType::Primitive(PrimitiveType::Int64),
            Self::Float64(_) => OnDiskType::Primitive(PrimitiveType::Float64),
            Self::Float32x3(_) => OnDiskType::Primitive(PrimitiveType::Float32x3),
            Self::Other { type_name, .. } => OnDiskType::Other(type_name.clone()),
        }
    }

    /// Write one value in native byte order. `out` is exactly the member
    /// width.
    fn write_native(&self, row: usize, out: &mut [u8]) {
        match self {
            Self::Int32(v) => out.copy_from_slice(&v[row].to_ne_bytes()),
            Self::Float32(v) => out.copy_from_slice(&v[row].to_ne_bytes()),
            Self::Int64(v) => out.copy_from_slice(&v[row].to_ne_bytes()),
            Self::Float64(v) => out.copy_from_slice(&v[row].to_ne_bytes()),
            Self::Float32x3(v) => {
                for (chunk, value) in out.chunks_exact_mut(4).zip(v[row]) {
                    chunk.copy_from_slice(&value.to_ne_bytes());
                }
            }
            Self::Other { .. } => {}
        }
    }
}

/// Column-stored compound dataset under construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompoundData {
    rows: usize,
    members: Vec<(String, Column)>,
}

impl CompoundData {
    #[must_use]
    pub const fn new(rows: usize) -> Self {
        Self {
            rows,
            members: Vec::new(),
        }
    }

    /// Add a member, or replace an existing member of the same name.
    #[must_use]
    pub fn column(mut self, name: impl Into<String>, column: Column) -> Self {
        let name = name.into();
        match self.members.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = column,
            None => self.members.push((name, column)),
        }
        self
    }

    /// Drop a member by on-disk name.
    #[must_use]
    pub fn without(mut self, name: &str) -> Self {
        self.members.retain(|(existing, _)| existing != name);
        self
    }

    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// One member per halo tag, named through `mapping`.
    #[must_use]
    pub fn from_halo_records(mapping: &FieldMapping, halos: &[HaloRecord]) -> Self {
        let mut data = Self::new(halos.len());
        for tag in FieldTag::ALL.into_iter().filter(|t| t.kind() == TagKind::HaloMember) {
            let Some(name) = mapping.path(tag) else {
                continue;
            };
            data = data.column(name, halo_column(tag, halos));
        }
        data
    }

    /// Append one member per identifier tag, named through `mapping`.
    #[must_use]
    pub fn with_id_records(mut self, mapping: &FieldMapping, ids: &[HaloIdRecord]) -> Self {
        for tag in FieldTag::ALL.into_iter().filter(|t| t.kind() == TagKind::IdMember) {
            let Some(name) = mapping.path(tag) else {
                continue;
            };
            self = self.column(name, id_column(tag, ids));
        }
        self
    }

    fn find(&self, name: &str) -> Option<&Column> {
        self.members
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, column)| column)
    }
}

fn halo_column(tag: FieldTag, halos: &[HaloRecord]) -> Column {
    let ints = |f: fn(&HaloRecord) -> i32| Column::Int32(halos.iter().map(f).collect());
    let floats = |f: fn(&HaloRecord) -> f32| Column::Float32(halos.iter().map(f).collect());
    let vecs = |f: fn(&HaloRecord) -> [f32; 3]| Column::Float32x3(halos.iter().map(f).collect());
    match tag {
        FieldTag::HaloDescendant => ints(|h| h.descendant),
        FieldTag::HaloFirstProgenitor => ints(|h| h.first_progenitor),
        FieldTag::HaloNextProgenitor => ints(|h| h.next_progenitor),
        FieldTag::HaloFirstHaloInFofGroup => ints(|h| h.first_halo_in_fof_group),
        FieldTag::HaloNextHaloInFofGroup => ints(|h| h.next_halo_in_fof_group),
        FieldTag::HaloLen => ints(|h| h.len),
        FieldTag::HaloMMean200 => floats(|h| h.m_mean200),
        FieldTag::HaloMCrit200 => floats(|h| h.m_crit200),
        FieldTag::HaloMTopHat => floats(|h| h.m_top_hat),
        FieldTag::HaloPos => vecs(|h| h.pos),
        FieldTag::HaloVel => vecs(|h| h.vel),
        FieldTag::HaloVelDisp => floats(|h| h.vel_disp),
        FieldTag::HaloVmax => floats(|h| h.vmax),
        FieldTag::HaloSpin => vecs(|h| h.spin),
        FieldTag::HaloMostBoundId => Column::Int64(halos.iter().map(|h| h.most_bound_id).collect()),
        FieldTag::HaloSnapNum => ints(|h| h.snap_num),
        FieldTag::HaloFileNr => ints(|h| h.file_nr),
        FieldTag::HaloSubhaloIndex => ints(|h| h.subhalo_index),
        FieldTag::HaloSubHalfMass => floats(|h| h.sub_half_mass),
        _ => Column::Other {
            type_name: "unmapped".to_owned(),
            rows: halos.len(),
        },
    }
}

fn id_column(tag: FieldTag, ids: &[HaloIdRecord]) -> Column {
    let longs = |f: fn(&HaloIdRecord) -> i64| Column::Int64(ids.iter().map(f).collect());
    match tag {
        FieldTag::IdHaloId => longs(|r| r.halo_id),
        FieldTag::IdFileTreeNr => longs(|r| r.file_tree_nr),
        FieldTag::IdFirstProgenitor => longs(|r| r.first_progenitor),
        FieldTag::IdLastProgenitor => longs(|r| r.last_progenitor),
        FieldTag::IdNextProgenitor => longs(|r| r.next_progenitor),
        FieldTag::IdDescendant => longs(|r| r.descendant),
        FieldTag::IdFirstHaloInFofGroup => longs(|r| r.first_halo_in_fof_group),
        FieldTag::IdNextHaloInFofGroup => longs(|r| r.next_halo_in_fof_group),
        FieldTag::IdMainLeafId => longs(|r| r.main_leaf_id),
        FieldTag::IdRedshift => Column::Float64(ids.iter().map(|r| r.redshift).collect()),
        FieldTag::IdPeanoKey => Column::Int32(ids.iter().map(|r| r.peano_key).collect()),
        _ => Column::Other {
            type_name: "unmapped".to_owned(),
            rows: ids.len(),
        },
    }
}

#[derive(Debug, Clone)]
enum Dataset {
    Ints(Vec<i64>),
    Compound(CompoundData),
}

/// A merger-tree file held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryTreeFile {
    name: String,
    attributes: HashMap<(String, String), i64>,
    datasets: HashMap<String, Dataset>,
}

impl MemoryTreeFile {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_attribute(
        mut self,
        group: impl Into<String>,
        attribute: impl Into<String>,
        value: i64,
    ) -> Self {
        self.attributes
            .insert((group.into(), attribute.into()), value);
        self
    }

    #[must_use]
    pub fn with_int_array(mut self, path: impl Into<String>, values: Vec<i64>) -> Self {
        self.datasets.insert(path.into(), Dataset::Ints(values));
        self
    }

    #[must_use]
    pub fn with_compound(mut self, path: impl Into<String>, data: CompoundData) -> Self {
        self.datasets.insert(path.into(), Dataset::Compound(data));
        self
    }

    fn dataset(&self, path: &str) -> Result<&Dataset> {
        self.datasets
            .get(path)
            .ok_or_else(|| HaloTreeError::resource("dataset", path, "no such dataset"))
    }

    fn compound(&self, path: &str) -> Result<&CompoundData> {
        match self.dataset(path)? {
            Dataset::Compound(data) => Ok(data),
            Dataset::Ints(_) => Err(HaloTreeError::resource(
                "dataset",
                path,
                "not a compound dataset",
            )),
        }
    }
}

impl TreeSource for MemoryTreeFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_scalar_attribute(&self, group: &str, attribute: &str) -> Result<i64> {
        self.attributes
            .get(&(group.to_owned(), attribute.to_owned()))
            .copied()
            .ok_or_else(|| {
                HaloTreeError::resource("attribute", format!("{group}:{attribute}"), "no such attribute")
            })
    }

    fn dataset_len(&self, dataset: &str) -> Result<usize> {
        Ok(match self.dataset(dataset)? {
            Dataset::Ints(values) => values.len(),
            Dataset::Compound(data) => data.rows,
        })
    }

    fn read_int_array(&self, dataset: &str) -> Result<Vec<i64>> {
        match self.dataset(dataset)? {
            Dataset::Ints(values) => Ok(values.clone()),
            Dataset::Compound(_) => Err(HaloTreeError::resource(
                "dataset",
                dataset,
                "not an integer dataset",
            )),
        }
    }

    fn compound_members(&self, dataset: &str) -> Result<Vec<MemberInfo>> {
        Ok(self
            .compound(dataset)?
            .members
            .iter()
            .map(|(name, column)| MemberInfo {
                name: name.clone(),
                ty: column.ty(),
            })
            .collect())
    }

    fn read_compound_rows(
        &self,
        dataset: &str,
        layout: &CompoundLayout,
        window: RowWindow,
    ) -> Result<Vec<u8>> {
        let data = self.compound(dataset)?;
        if window.end() > data.rows {
            return Err(HaloTreeError::resource(
                "row window",
                dataset,
                format!(
                    "rows {}..{} exceed extent {}",
                    window.start,
                    window.end(),
                    data.rows
                ),
            ));
        }

        let mut out = vec![0_u8; layout.buffer_len(window.count)];
        for member in &layout.members {
            let column = data.find(&member.name).ok_or_else(|| {
                HaloTreeError::resource("member", format!("{dataset}:{}", member.name), "no such member")
            })?;
            if !column.ty().is(member.ty) {
                return Err(HaloTreeError::SchemaMismatch {
                    tag: member.tag.name().to_owned(),
                    member: member.name.clone(),
                    expected: member.ty.to_string(),
                    found: column.ty().to_string(),
                });
            }
            if column.len() != data.rows {
                return Err(HaloTreeError::corrupt(format!(
                    "member '{}' of {dataset} holds {} rows, dataset declares {}",
                    member.name,
                    column.len(),
                    data.rows
                )));
            }

            let width = member.ty.size();
            for (i, row) in (window.start..window.end()).enumerate() {
                let at = i * layout.record_size + member.offset;
                column.write_native(row, &mut out[at..at + width]);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use halotree_types::{RecordKind, decode_records};

    use super::*;
    use crate::compound::CompoundMember;

    fn len_layout(name: &str) -> CompoundLayout {
        CompoundLayout {
            kind: RecordKind::Halo,
            record_size: 104,
            members: vec![CompoundMember {
                tag: FieldTag::HaloLen,
                name: name.to_owned(),
                offset: 20,
                ty: PrimitiveType::Int32,
            }],
        }
    }

    fn file() -> MemoryTreeFile {
        MemoryTreeFile::new("mem")
            .with_attribute("/Trees", "NTrees", 2)
            .with_int_array("/Trees/Counts", vec![1, 2])
            .with_compound(
                "/Trees/Halos",
                CompoundData::new(3)
                    .column("Len", Column::Int32(vec![10, 20, 30]))
                    .column("Flags", Column::Other {
                        type_name: "uint8".to_owned(),
                        rows: 3,
                    }),
            )
    }

    #[test]
    fn test_attributes_and_arrays() {
        let file = file();
        assert_eq!(file.name(), "mem");
        assert_eq!(file.read_scalar_attribute("/Trees", "NTrees").unwrap(), 2);
        assert!(file.read_scalar_attribute("/Trees", "NHalos").is_err());
        assert_eq!(file.read_int_array("/Trees/Counts").unwrap(), vec![1, 2]);
        assert_eq!(file.dataset_len("/Trees/Halos").unwrap(), 3);
        assert!(file.read_int_array("/Trees/Halos").is_err());
        assert!(file.compound_members("/Trees/Counts").is_err());
    }

    #[test]
    fn test_members_in_declaration_order() {
        let members = file().compound_members("/Trees/Halos").unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].name, "Len");
        assert_eq!(members[1].ty, OnDiskType::Other("uint8".to_owned()));
    }

    #[test]
    fn test_window_read_places_members_at_offsets() {
        let bytes = file()
            .read_compound_rows("/Trees/Halos", &len_layout("Len"), RowWindow::new(1, 2))
            .unwrap();
        let halos = decode_records::<HaloRecord>(&bytes).unwrap();
        assert_eq!(halos.len(), 2);
        assert_eq!(halos[0].len, 20);
        assert_eq!(halos[1].len, 30);
        assert_eq!(halos[1].snap_num, 0);
    }

    #[test]
    fn test_window_past_extent_fails() {
        let err = file()
            .read_compound_rows("/Trees/Halos", &len_layout("Len"), RowWindow::new(2, 2))
            .unwrap_err();
        assert!(matches!(err, HaloTreeError::Resource { what: "row window", .. }));
    }

    #[test]
    fn test_typed_read_of_wrong_member_type_fails() {
        let file = MemoryTreeFile::new("mem").with_compound(
            "/H",
            CompoundData::new(1).column("Len", Column::Int64(vec![5])),
        );
        let err = file
            .read_compound_rows("/H", &len_layout("Len"), RowWindow::new(0, 1))
            .unwrap_err();
        assert!(err.is_schema_error());
    }

    #[test]
    fn test_records_round_trip_through_columns() {
        let mapping =
            FieldMapping::parse(crate::field_map::MILLENNIUM_FIELD_FORMAT, "fields.txt").unwrap();
        let halo = HaloRecord {
            descendant: -1,
            len: 99,
            pos: [1.0, 2.0, 3.0],
            most_bound_id: 123_456_789_012,
            sub_half_mass: 0.5,
            ..HaloRecord::default()
        };
        let data = CompoundData::from_halo_records(&mapping, &[halo]);
        assert_eq!(data.rows(), 1);
        assert_eq!(data.find("Pos"), Some(&Column::Float32x3(vec![[1.0, 2.0, 3.0]])));
        assert_eq!(data.find("MostBoundID"), Some(&Column::Int64(vec![123_456_789_012])));

        let data = data.with_id_records(&mapping, &[HaloIdRecord {
            redshift: 0.25,
            ..HaloIdRecord::default()
        }]);
        assert_eq!(data.find("Redshift"), Some(&Column::Float64(vec![0.25])));
        assert!(data.clone().without("Redshift").find("Redshift").is_none());
    }
}
