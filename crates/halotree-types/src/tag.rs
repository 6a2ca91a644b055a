//! The fixed set of field-format tags.
//!
//! Each tag names either a container-level location (the merger-tree group,
//! its two count attributes and the datasets) or one member of a compound
//! record. Member tags carry the primitive type the in-memory layout expects.

use std::fmt;

use serde::Serialize;

use crate::primitive::PrimitiveType;

/// What a tag points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    /// A group, attribute or dataset path.
    Location,
    /// A member of the halo compound record.
    HaloMember,
    /// A member of the halo-identifier compound record.
    IdMember,
}

/// Logical field-format tag.
///
/// Declaration order is the canonical order of the field-format file: the
/// five required location tags come first, then the halo members, then the
/// identifier members, then optional locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum FieldTag {
    MergerTreeGroup,
    NTrees,
    NHalos,
    MergerTreeDataset,
    NHalosInTreeDataset,

    HaloDescendant,
    HaloFirstProgenitor,
    HaloNextProgenitor,
    HaloFirstHaloInFofGroup,
    HaloNextHaloInFofGroup,
    HaloLen,
    HaloMMean200,
    HaloMCrit200,
    HaloMTopHat,
    HaloPos,
    HaloVel,
    HaloVelDisp,
    HaloVmax,
    HaloSpin,
    HaloMostBoundId,
    HaloSnapNum,
    HaloFileNr,
    HaloSubhaloIndex,
    HaloSubHalfMass,

    IdHaloId,
    IdFileTreeNr,
    IdFirstProgenitor,
    IdLastProgenitor,
    IdNextProgenitor,
    IdDescendant,
    IdFirstHaloInFofGroup,
    IdNextHaloInFofGroup,
    IdMainLeafId,
    IdRedshift,
    IdPeanoKey,

    /// Separate identifier dataset. When absent the identifier members are
    /// read from the merger-tree dataset.
    HaloIdsDataset,
}

impl FieldTag {
    /// Every tag, in canonical order.
    pub const ALL: [Self; 36] = [
        Self::MergerTreeGroup,
        Self::NTrees,
        Self::NHalos,
        Self::MergerTreeDataset,
        Self::NHalosInTreeDataset,
        Self::HaloDescendant,
        Self::HaloFirstProgenitor,
        Self::HaloNextProgenitor,
        Self::HaloFirstHaloInFofGroup,
        Self::HaloNextHaloInFofGroup,
        Self::HaloLen,
        Self::HaloMMean200,
        Self::HaloMCrit200,
        Self::HaloMTopHat,
        Self::HaloPos,
        Self::HaloVel,
        Self::HaloVelDisp,
        Self::HaloVmax,
        Self::HaloSpin,
        Self::HaloMostBoundId,
        Self::HaloSnapNum,
        Self::HaloFileNr,
        Self::HaloSubhaloIndex,
        Self::HaloSubHalfMass,
        Self::IdHaloId,
        Self::IdFileTreeNr,
        Self::IdFirstProgenitor,
        Self::IdLastProgenitor,
        Self::IdNextProgenitor,
        Self::IdDescendant,
        Self::IdFirstHaloInFofGroup,
        Self::IdNextHaloInFofGroup,
        Self::IdMainLeafId,
        Self::IdRedshift,
        Self::IdPeanoKey,
        Self::HaloIdsDataset,
    ];

    /// Name as written in the field-format file.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::MergerTreeGroup => "MergerTree_group_loc",
            Self::NTrees => "NTrees_loc",
            Self::NHalos => "NHalos_loc",
            Self::MergerTreeDataset => "MergerTree_dataset_loc",
            Self::NHalosInTreeDataset => "NHalosInTree_dataset_loc",
            Self::HaloDescendant => "Halo_Data_Descendant",
            Self::HaloFirstProgenitor => "Halo_Data_FirstProgenitor",
            Self::HaloNextProgenitor => "Halo_Data_NextProgenitor",
            Self::HaloFirstHaloInFofGroup => "Halo_Data_FirstHaloInFOFgroup",
            Self::HaloNextHaloInFofGroup => "Halo_Data_NextHaloInFOFgroup",
            Self::HaloLen => "Halo_Data_Len",
            Self::HaloMMean200 => "Halo_Data_M_Mean200",
            Self::HaloMCrit200 => "Halo_Data_M_Crit200",
            Self::HaloMTopHat => "Halo_Data_M_TopHat",
            Self::HaloPos => "Halo_Data_Pos",
            Self::HaloVel => "Halo_Data_Vel",
            Self::HaloVelDisp => "Halo_Data_VelDisp",
            Self::HaloVmax => "Halo_Data_Vmax",
            Self::HaloSpin => "Halo_Data_Spin",
            Self::HaloMostBoundId => "Halo_Data_MostBoundID",
            Self::HaloSnapNum => "Halo_Data_SnapNum",
            Self::HaloFileNr => "Halo_Data_FileNr",
            Self::HaloSubhaloIndex => "Halo_Data_SubhaloIndex",
            Self::HaloSubHalfMass => "Halo_Data_SubHalfMass",
            Self::IdHaloId => "HaloIDs_Data_HaloID",
            Self::IdFileTreeNr => "HaloIDs_Data_FileTreeNr",
            Self::IdFirstProgenitor => "HaloIDs_Data_FirstProgenitor",
            Self::IdLastProgenitor => "HaloIDs_Data_LastProgenitor",
            Self::IdNextProgenitor => "HaloIDs_Data_NextProgenitor",
            Self::IdDescendant => "HaloIDs_Data_Descendant",
            Self::IdFirstHaloInFofGroup => "HaloIDs_Data_FirstHaloInFOFgroup",
            Self::IdNextHaloInFofGroup => "HaloIDs_Data_NextHaloInFOFgroup",
            Self::IdMainLeafId => "HaloIDs_Data_MainLeafID",
            Self::IdRedshift => "HaloIDs_Data_Redshift",
            Self::IdPeanoKey => "HaloIDs_Data_PeanoKey",
            Self::HaloIdsDataset => "HaloIDs_dataset_loc",
        }
    }

    /// Look a tag up by its field-format name (case-sensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.name() == name)
    }

    #[must_use]
    pub const fn kind(self) -> TagKind {
        match self {
            Self::MergerTreeGroup
            | Self::NTrees
            | Self::NHalos
            | Self::MergerTreeDataset
            | Self::NHalosInTreeDataset
            | Self::HaloIdsDataset => TagKind::Location,
            Self::IdHaloId
            | Self::IdFileTreeNr
            | Self::IdFirstProgenitor
            | Self::IdLastProgenitor
            | Self::IdNextProgenitor
            | Self::IdDescendant
            | Self::IdFirstHaloInFofGroup
            | Self::IdNextHaloInFofGroup
            | Self::IdMainLeafId
            | Self::IdRedshift
            | Self::IdPeanoKey => TagKind::IdMember,
            _ => TagKind::HaloMember,
        }
    }

    #[must_use]
    pub const fn is_location(self) -> bool {
        matches!(self.kind(), TagKind::Location)
    }

    /// Whether the field-format file must define this tag.
    #[must_use]
    pub const fn is_required(self) -> bool {
        !matches!(self, Self::HaloIdsDataset)
    }

    /// Type the in-memory layout expects for this member. `None` for
    /// location tags.
    #[must_use]
    pub const fn expected_type(self) -> Option<PrimitiveType> {
        let ty = match self {
            Self::MergerTreeGroup
            | Self::NTrees
            | Self::NHalos
            | Self::MergerTreeDataset
            | Self::NHalosInTreeDataset
            | Self::HaloIdsDataset => return None,
            Self::HaloDescendant
            | Self::HaloFirstProgenitor
            | Self::HaloNextProgenitor
            | Self::HaloFirstHaloInFofGroup
            | Self::HaloNextHaloInFofGroup
            | Self::HaloLen
            | Self::HaloSnapNum
            | Self::HaloFileNr
            | Self::HaloSubhaloIndex
            | Self::IdPeanoKey => PrimitiveType::Int32,
            Self::HaloMMean200
            | Self::HaloMCrit200
            | Self::HaloMTopHat
            | Self::HaloVelDisp
            | Self::HaloVmax
            | Self::HaloSubHalfMass => PrimitiveType::Float32,
            Self::HaloPos | Self::HaloVel | Self::HaloSpin => PrimitiveType::Float32x3,
            Self::HaloMostBoundId
            | Self::IdHaloId
            | Self::IdFileTreeNr
            | Self::IdFirstProgenitor
            | Self::IdLastProgenitor
            | Self::IdNextProgenitor
            | Self::IdDescendant
            | Self::IdFirstHaloInFofGroup
            | Self::IdNextHaloInFofGroup
            | Self::IdMainLeafId => PrimitiveType::Int64,
            Self::IdRedshift => PrimitiveType::Float64,
        };
        Some(ty)
    }

    /// Required tags, in canonical order.
    pub fn required() -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().filter(|tag| tag.is_required())
    }

    /// Tags of one kind, in canonical order.
    pub fn of_kind(kind: TagKind) -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().filter(move |tag| tag.kind() == kind)
    }
}

impl fmt::Display for FieldTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_names_are_unique_and_round_trip() {
        let mut seen = HashSet::new();
        for tag in FieldTag::ALL {
            assert!(seen.insert(tag.name()), "duplicate name {}", tag.name());
            assert_eq!(FieldTag::from_name(tag.name()), Some(tag));
        }
        assert_eq!(FieldTag::from_name("halo_data_len"), None);
    }

    #[test]
    fn test_first_five_are_required_locations() {
        for tag in &FieldTag::ALL[..5] {
            assert!(tag.is_location());
            assert!(tag.is_required());
            assert_eq!(tag.expected_type(), None);
        }
        for tag in &FieldTag::ALL[5..35] {
            assert!(!tag.is_location(), "{tag}");
            assert!(tag.expected_type().is_some(), "{tag}");
        }
    }

    #[test]
    fn test_canonical_order_matches_ord() {
        let mut sorted = FieldTag::ALL;
        sorted.sort();
        assert_eq!(sorted, FieldTag::ALL);
    }

    #[test]
    fn test_tag_counts() {
        let count = |kind| FieldTag::ALL.iter().filter(|t| t.kind() == kind).count();
        assert_eq!(count(TagKind::Location), 6);
        assert_eq!(count(TagKind::HaloMember), 19);
        assert_eq!(count(TagKind::IdMember), 11);
        assert_eq!(FieldTag::required().count(), 35);
        assert_eq!(FieldTag::of_kind(TagKind::IdMember).count(), 11);
        assert_eq!(
            FieldTag::of_kind(TagKind::HaloMember).next(),
            Some(FieldTag::HaloDescendant)
        );
    }

    #[test]
    fn test_expected_types() {
        assert_eq!(FieldTag::HaloLen.expected_type(), Some(PrimitiveType::Int32));
        assert_eq!(FieldTag::HaloPos.expected_type(), Some(PrimitiveType::Float32x3));
        assert_eq!(FieldTag::HaloMostBoundId.expected_type(), Some(PrimitiveType::Int64));
        assert_eq!(FieldTag::IdRedshift.expected_type(), Some(PrimitiveType::Float64));
        assert_eq!(FieldTag::IdPeanoKey.expected_type(), Some(PrimitiveType::Int32));
        assert_eq!(FieldTag::HaloSubHalfMass.expected_type(), Some(PrimitiveType::Float32));
    }
}
