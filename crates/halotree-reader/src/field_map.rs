//! Field-format file loading.
//!
//! The field-format file maps every [`FieldTag`] onto a path inside the
//! merger-tree file: a group, attribute or dataset for location tags, and
//! a compound member name for record tags. Lines look like
//!
//! ```text
//! % comment
//! Halo_Data_Len   Len   optional trailing words are ignored
//! ```
//!
//! Problems are collected over the whole file before failing so an operator
//! sees every bad or missing tag at once.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fs;
use std::path::{Path, PathBuf};

use halotree_error::{ConfigProblem, HaloTreeError, Result};
use halotree_types::{FieldTag, PrimitiveType};
use serde::Serialize;
use tracing::{error, info};

/// Field format for files written by the Millennium HDF5 converter.
pub const MILLENNIUM_FIELD_FORMAT: &str = include_str!("../data/hdf5_field_format.txt");

const COMMENT_MARKERS: [char; 2] = ['%', '#'];
const IN_MEMORY_ORIGIN: &str = "<in-memory>";

/// Where a tag lives on disk and what type it must have there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    /// Group/attribute/dataset path or compound member name.
    pub path: String,
    /// Expected member type; `None` for location tags.
    pub expected: Option<PrimitiveType>,
    /// 1-based line the tag was defined on (0 when built in memory).
    pub line: usize,
}

/// Immutable mapping from every tag to its on-disk location.
#[derive(Debug, Clone)]
pub struct FieldMapping {
    origin: PathBuf,
    entries: BTreeMap<FieldTag, FieldSpec>,
}

impl FieldMapping {
    /// Read and parse a field-format file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| {
            error!(origin = %path.display(), %source, "field format file not readable");
            HaloTreeError::MissingConfigFile {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Self::parse(&text, path)
    }

    /// Parse field-format text. `origin` is only used in diagnostics.
    pub fn parse(text: &str, origin: impl AsRef<Path>) -> Result<Self> {
        let origin = origin.as_ref();
        let mut entries: BTreeMap<FieldTag, FieldSpec> = BTreeMap::new();
        let mut problems = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let mut tokens = raw.split_whitespace();
            let (Some(name), Some(value)) = (tokens.next(), tokens.next()) else {
                continue;
            };
            if name.starts_with(COMMENT_MARKERS) {
                continue;
            }

            let Some(tag) = FieldTag::from_name(name) else {
                problems.push(ConfigProblem::UnknownTag {
                    line,
                    tag: name.to_owned(),
                });
                continue;
            };

            match entries.entry(tag) {
                Entry::Occupied(first) => problems.push(ConfigProblem::DuplicateTag {
                    line,
                    tag: name.to_owned(),
                    first_line: first.get().line,
                }),
                Entry::Vacant(slot) => {
                    slot.insert(FieldSpec {
                        path: value.to_owned(),
                        expected: tag.expected_type(),
                        line,
                    });
                }
            }
        }

        Self::finish(origin, entries, problems)
    }

    /// Build a mapping from explicit `(tag, path)` pairs, with the same
    /// completeness checks as a parsed file.
    pub fn from_entries<I, P>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (FieldTag, P)>,
        P: Into<String>,
    {
        let mut entries = BTreeMap::new();
        let mut problems = Vec::new();
        for (tag, path) in pairs {
            let spec = FieldSpec {
                path: path.into(),
                expected: tag.expected_type(),
                line: 0,
            };
            if entries.insert(tag, spec).is_some() {
                problems.push(ConfigProblem::DuplicateTag {
                    line: 0,
                    tag: tag.name().to_owned(),
                    first_line: 0,
                });
            }
        }
        Self::finish(Path::new(IN_MEMORY_ORIGIN), entries, problems)
    }

    fn finish(
        origin: &Path,
        entries: BTreeMap<FieldTag, FieldSpec>,
        mut problems: Vec<ConfigProblem>,
    ) -> Result<Self> {
        problems.extend(
            FieldTag::required()
                .filter(|tag| !entries.contains_key(tag))
                .map(|tag| ConfigProblem::MissingTag {
                    tag: tag.name().to_owned(),
                }),
        );

        if !problems.is_empty() {
            for problem in &problems {
                error!(origin = %origin.display(), %problem, "field format problem");
            }
            return Err(HaloTreeError::Config {
                path: origin.to_path_buf(),
                problems,
            });
        }

        info!(
            origin = %origin.display(),
            tags = entries.len(),
            "field format loaded"
        );
        Ok(Self {
            origin: origin.to_path_buf(),
            entries,
        })
    }

    /// File the mapping was read from.
    #[must_use]
    pub fn origin(&self) -> &Path {
        &self.origin
    }

    #[must_use]
    pub fn get(&self, tag: FieldTag) -> Option<&FieldSpec> {
        self.entries.get(&tag)
    }

    /// On-disk path for a tag, if defined.
    #[must_use]
    pub fn path(&self, tag: FieldTag) -> Option<&str> {
        self.get(tag).map(|spec| spec.path.as_str())
    }

    /// On-disk path for a tag that must be defined.
    pub fn require(&self, tag: FieldTag) -> Result<&str> {
        self.path(tag).ok_or_else(|| {
            HaloTreeError::internal(format!("field mapping has no entry for {tag}"))
        })
    }

    /// Dataset holding the identifier members: the dedicated identifier
    /// dataset when configured, the merger-tree dataset otherwise.
    pub fn ids_dataset_path(&self) -> Result<&str> {
        match self.path(FieldTag::HaloIdsDataset) {
            Some(path) => Ok(path),
            None => self.require(FieldTag::MergerTreeDataset),
        }
    }

    /// All entries in canonical tag order.
    pub fn iter(&self) -> impl Iterator<Item = (FieldTag, &FieldSpec)> {
        self.entries.iter().map(|(tag, spec)| (*tag, spec))
    }

    /// Entries naming compound members, i.e. everything except the
    /// container-level location tags.
    pub fn member_entries(&self) -> impl Iterator<Item = (FieldTag, &FieldSpec)> {
        self.iter().filter(|(tag, _)| !tag.is_location())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use proptest::prelude::*;

    use super::*;

    fn without_line(text: &str, tag: FieldTag) -> String {
        text.lines()
            .filter(|line| line.split_whitespace().next() != Some(tag.name()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_millennium_format_parses() {
        let mapping = FieldMapping::parse(MILLENNIUM_FIELD_FORMAT, "fields.txt").unwrap();
        assert_eq!(mapping.len(), 35);
        assert_eq!(mapping.path(FieldTag::MergerTreeGroup), Some("/MergerTrees"));
        assert_eq!(mapping.path(FieldTag::NTrees), Some("NTrees"));
        assert_eq!(mapping.path(FieldTag::HaloLen), Some("Len"));
        assert_eq!(
            mapping.get(FieldTag::HaloPos).unwrap().expected,
            Some(PrimitiveType::Float32x3)
        );
        assert_eq!(mapping.path(FieldTag::HaloIdsDataset), None);
        assert_eq!(mapping.ids_dataset_path().unwrap(), "/MergerTrees/Halos");
        assert_eq!(mapping.member_entries().count(), 30);
        assert_eq!(mapping.origin(), Path::new("fields.txt"));
    }

    #[test]
    fn test_trailing_words_and_short_lines_are_ignored() {
        let text = format!(
            "{}\nlonely_token\n\n   \nHaloIDs_dataset_loc /MergerTrees/HaloIDs extra words here\n",
            MILLENNIUM_FIELD_FORMAT
        );
        let mapping = FieldMapping::parse(&text, "fields.txt").unwrap();
        assert_eq!(mapping.ids_dataset_path().unwrap(), "/MergerTrees/HaloIDs");
    }

    #[test]
    fn test_comment_prefixes() {
        let text = format!("{MILLENNIUM_FIELD_FORMAT}\n#Bogus_Tag value\n%Other_Bogus value\n");
        assert!(FieldMapping::parse(&text, "fields.txt").is_ok());
    }

    #[test]
    fn test_unknown_tag_is_reported_with_line() {
        let text = format!("Halo_Data_Colour Colour\n{MILLENNIUM_FIELD_FORMAT}");
        let err = FieldMapping::parse(&text, "fields.txt").unwrap_err();
        assert_eq!(
            err.config_problems(),
            &[ConfigProblem::UnknownTag {
                line: 1,
                tag: "Halo_Data_Colour".to_owned(),
            }]
        );
    }

    #[test]
    fn test_duplicate_tag_is_an_error() {
        let text = format!("{MILLENNIUM_FIELD_FORMAT}\nHalo_Data_Len Npart\n");
        let err = FieldMapping::parse(&text, "fields.txt").unwrap_err();
        let problems = err.config_problems();
        assert_eq!(problems.len(), 1);
        assert!(matches!(
            &problems[0],
            ConfigProblem::DuplicateTag { tag, .. } if tag == "Halo_Data_Len"
        ));
    }

    #[test]
    fn test_problems_accumulate_across_the_file() {
        let text = without_line(MILLENNIUM_FIELD_FORMAT, FieldTag::NTrees);
        let text = without_line(&text, FieldTag::IdRedshift);
        let text = format!("Nope_Tag x\n{text}\nAlso_Nope y\n");
        let err = FieldMapping::parse(&text, "fields.txt").unwrap_err();
        let tags: Vec<&str> = err.config_problems().iter().map(ConfigProblem::tag).collect();
        assert_eq!(
            tags,
            vec!["Nope_Tag", "Also_Nope", "NTrees_loc", "HaloIDs_Data_Redshift"]
        );
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FieldMapping::load(dir.path().join("absent.txt")).unwrap_err();
        assert!(matches!(err, HaloTreeError::MissingConfigFile { .. }));
        assert!(err.is_config_error());
    }

    #[test]
    fn test_load_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MILLENNIUM_FIELD_FORMAT.as_bytes()).unwrap();
        let mapping = FieldMapping::load(file.path()).unwrap();
        assert_eq!(mapping.origin(), file.path());
        assert_eq!(mapping.path(FieldTag::IdPeanoKey), Some("PeanoKey"));
    }

    #[test]
    fn test_from_entries_checks_completeness() {
        let err = FieldMapping::from_entries([(FieldTag::HaloLen, "Len")]).unwrap_err();
        assert_eq!(err.config_problems().len(), 34);

        let full = FieldTag::required().map(|tag| (tag, tag.name()));
        let mapping = FieldMapping::from_entries(full).unwrap();
        assert_eq!(mapping.path(FieldTag::HaloLen), Some("Halo_Data_Len"));
    }

    proptest! {
        #[test]
        fn prop_dropping_one_required_tag_names_exactly_that_tag(
            index in 0usize..35,
        ) {
            let dropped = FieldTag::required().nth(index).unwrap();
            let text = without_line(MILLENNIUM_FIELD_FORMAT, dropped);
            let err = FieldMapping::parse(&text, "fields.txt").unwrap_err();
            prop_assert_eq!(
                err.config_problems(),
                &[ConfigProblem::MissingTag { tag: dropped.name().to_owned() }]
            );
        }
    }
}
