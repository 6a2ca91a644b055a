//! On-disk schema validation.
//!
//! Cross-references the members of an on-disk compound type against the
//! field mapping. A mapped member with a different type is fatal. A mapped
//! member that is absent is only a warning: its record field stays zero for
//! every row of the file, since optional properties vary between
//! simulation families.

use std::collections::HashMap;

use halotree_error::{HaloTreeError, Result};
use halotree_types::FieldTag;
use serde::Serialize;
use tracing::{info, warn};

use crate::field_map::FieldMapping;
use crate::source::{OnDiskType, TreeSource};

/// Outcome of validating one compound dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaReport {
    pub dataset: String,
    /// Tags whose member exists with the expected type.
    pub found: Vec<FieldTag>,
    /// Tags whose member is absent on disk.
    pub missing: Vec<FieldTag>,
}

impl SchemaReport {
    #[must_use]
    pub fn is_found(&self, tag: FieldTag) -> bool {
        self.found.contains(&tag)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Checks on-disk compound members against a [`FieldMapping`].
#[derive(Debug, Clone, Copy)]
pub struct SchemaValidator<'a> {
    mapping: &'a FieldMapping,
}

impl<'a> SchemaValidator<'a> {
    #[must_use]
    pub const fn new(mapping: &'a FieldMapping) -> Self {
        Self { mapping }
    }

    /// Validate the members named by `tags` inside `dataset`.
    ///
    /// Location tags never name compound members and are skipped.
    ///
    /// # Errors
    /// [`HaloTreeError::SchemaMismatch`] on the first member whose on-disk
    /// type differs from the expected one; any error from the source while
    /// inspecting the dataset.
    pub fn validate<S: TreeSource>(
        &self,
        source: &S,
        dataset: &str,
        tags: &[FieldTag],
    ) -> Result<SchemaReport> {
        let members: HashMap<String, OnDiskType> = source
            .compound_members(dataset)?
            .into_iter()
            .map(|member| (member.name, member.ty))
            .collect();

        let mut report = SchemaReport {
            dataset: dataset.to_owned(),
            ..SchemaReport::default()
        };

        for &tag in tags.iter().filter(|tag| !tag.is_location()) {
            let Some(spec) = self.mapping.get(tag) else {
                continue;
            };
            let Some(expected) = spec.expected else {
                continue;
            };

            match members.get(&spec.path) {
                Some(found) if found.is(expected) => {
                    info!(tag = %tag, member = %spec.path, "schema member found");
                    report.found.push(tag);
                }
                Some(found) => {
                    return Err(HaloTreeError::SchemaMismatch {
                        tag: tag.name().to_owned(),
                        member: spec.path.clone(),
                        expected: expected.to_string(),
                        found: found.to_string(),
                    });
                }
                None => {
                    warn!(
                        tag = %tag,
                        member = %spec.path,
                        file = source.name(),
                        dataset,
                        "schema member missing, values will be zero"
                    );
                    report.missing.push(tag);
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use halotree_types::PrimitiveType;

    use super::*;
    use crate::field_map::MILLENNIUM_FIELD_FORMAT;
    use crate::memory::{Column, CompoundData, MemoryTreeFile};

    const HALOS: &str = "/MergerTrees/Halos";

    fn mapping() -> FieldMapping {
        FieldMapping::parse(MILLENNIUM_FIELD_FORMAT, "fields.txt").unwrap()
    }

    fn source(data: CompoundData) -> MemoryTreeFile {
        MemoryTreeFile::new("trees_0.hdf5").with_compound(HALOS, data)
    }

    #[test]
    fn test_found_and_missing_members() {
        let mapping = mapping();
        let file = source(
            CompoundData::new(1)
                .column("Len", Column::Int32(vec![1]))
                .column("Pos", Column::Float32x3(vec![[0.0; 3]]))
                .column("Unmapped", Column::Float64(vec![1.0])),
        );
        let report = SchemaValidator::new(&mapping)
            .validate(
                &file,
                HALOS,
                &[FieldTag::HaloLen, FieldTag::HaloPos, FieldTag::HaloVmax],
            )
            .unwrap();
        assert_eq!(report.found, vec![FieldTag::HaloLen, FieldTag::HaloPos]);
        assert_eq!(report.missing, vec![FieldTag::HaloVmax]);
        assert!(report.is_found(FieldTag::HaloPos));
        assert!(!report.is_complete());
    }

    #[test]
    fn test_wider_type_is_a_mismatch() {
        let mapping = mapping();
        let file = source(CompoundData::new(1).column("Len", Column::Int64(vec![1])));
        let err = SchemaValidator::new(&mapping)
            .validate(&file, HALOS, &[FieldTag::HaloLen])
            .unwrap_err();
        match err {
            HaloTreeError::SchemaMismatch {
                tag,
                member,
                expected,
                found,
            } => {
                assert_eq!(tag, "Halo_Data_Len");
                assert_eq!(member, "Len");
                assert_eq!(expected, PrimitiveType::Int32.to_string());
                assert_eq!(found, "int64");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unsupported_type_is_a_mismatch() {
        let mapping = mapping();
        let file = source(CompoundData::new(1).column("Spin", Column::Other {
            type_name: "float64[3]".to_owned(),
            rows: 1,
        }));
        let err = SchemaValidator::new(&mapping)
            .validate(&file, HALOS, &[FieldTag::HaloSpin])
            .unwrap_err();
        assert!(err.is_schema_error());
        assert!(err.to_string().contains("float64[3]"));
    }

    #[test]
    fn test_location_tags_are_never_validated() {
        let mapping = mapping();
        // "NTrees" is the attribute name; a same-named member of a different
        // type must not trip validation.
        let file = source(CompoundData::new(1).column("NTrees", Column::Float64(vec![0.0])));
        let report = SchemaValidator::new(&mapping)
            .validate(&file, HALOS, &[FieldTag::NTrees, FieldTag::MergerTreeGroup])
            .unwrap();
        assert!(report.found.is_empty());
        assert!(report.missing.is_empty());
    }

    #[test]
    fn test_unknown_dataset_is_a_resource_error() {
        let mapping = mapping();
        let err = SchemaValidator::new(&mapping)
            .validate(&MemoryTreeFile::new("empty"), HALOS, &[FieldTag::HaloLen])
            .unwrap_err();
        assert!(matches!(err, HaloTreeError::Resource { .. }));
    }
}
