//! Compound record descriptors.
//!
//! A [`CompoundLayout`] tells the file backend "read the on-disk member named
//! X into byte offset Y of each destination record, as type Z". Offsets come
//! from the in-memory `#[repr(C)]` record, never from the file, so on-disk
//! member order and padding are irrelevant.

use halotree_error::{HaloTreeError, Result};
use halotree_types::{
    FieldTag, HaloIdRecord, HaloRecord, PrimitiveType, RecordKind, RecordLayout, TagKind,
};
use serde::Serialize;
use tracing::debug;

use crate::field_map::FieldMapping;
use crate::schema::SchemaReport;
use crate::settings::LoadOptions;

/// One member of a compound descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompoundMember {
    pub tag: FieldTag,
    /// On-disk member name.
    pub name: String,
    /// Byte offset inside the destination record.
    pub offset: usize,
    pub ty: PrimitiveType,
}

/// Ordered descriptor for one in-memory record kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompoundLayout {
    pub kind: RecordKind,
    /// Destination record stride in bytes.
    pub record_size: usize,
    pub members: Vec<CompoundMember>,
}

impl CompoundLayout {
    #[must_use]
    pub fn member(&self, tag: FieldTag) -> Option<&CompoundMember> {
        self.members.iter().find(|member| member.tag == tag)
    }

    /// Bytes needed to hold `rows` destination records.
    #[must_use]
    pub const fn buffer_len(&self, rows: usize) -> usize {
        rows * self.record_size
    }
}

/// Builds the halo and identifier descriptors for one input file.
#[derive(Debug, Clone, Copy)]
pub struct CompoundRecordBuilder<'a> {
    mapping: &'a FieldMapping,
    options: LoadOptions,
}

impl<'a> CompoundRecordBuilder<'a> {
    #[must_use]
    pub const fn new(mapping: &'a FieldMapping, options: LoadOptions) -> Self {
        Self { mapping, options }
    }

    /// Tags read into [`HaloRecord`], in layout order.
    #[must_use]
    pub fn halo_tags(&self) -> Vec<FieldTag> {
        FieldTag::of_kind(TagKind::HaloMember).collect()
    }

    /// Tags read into [`HaloIdRecord`]. Empty unless identifier loading is
    /// enabled; the main-leaf member is only part of large-simulation
    /// layouts.
    ///
    /// This only selects descriptor members. Schema validation always
    /// covers every identifier tag.
    #[must_use]
    pub fn id_tags(&self) -> Vec<FieldTag> {
        if !self.options.load_ids {
            return Vec::new();
        }
        FieldTag::of_kind(TagKind::IdMember)
            .filter(|tag| *tag != FieldTag::IdMainLeafId || self.options.large_simulation)
            .collect()
    }

    /// Descriptor for [`HaloRecord`], covering every member the schema
    /// report found on disk.
    pub fn halo_layout(&self, report: &SchemaReport) -> Result<CompoundLayout> {
        self.build::<HaloRecord>(&self.halo_tags(), report)
    }

    /// Descriptor for [`HaloIdRecord`], or `None` when identifiers are not
    /// loaded.
    pub fn id_layout(&self, report: &SchemaReport) -> Result<Option<CompoundLayout>> {
        if !self.options.load_ids {
            return Ok(None);
        }
        self.build::<HaloIdRecord>(&self.id_tags(), report).map(Some)
    }

    fn build<T: RecordLayout>(
        &self,
        tags: &[FieldTag],
        report: &SchemaReport,
    ) -> Result<CompoundLayout> {
        let mut members = Vec::with_capacity(tags.len());
        for &tag in tags {
            if !report.is_found(tag) {
                continue;
            }
            let offset = T::member_offset(tag).ok_or_else(|| {
                HaloTreeError::internal(format!("{tag} is not a member of the {} record", T::KIND))
            })?;
            let ty = tag
                .expected_type()
                .ok_or_else(|| HaloTreeError::internal(format!("{tag} has no member type")))?;
            members.push(CompoundMember {
                tag,
                name: self.mapping.require(tag)?.to_owned(),
                offset,
                ty,
            });
        }

        debug!(
            kind = %T::KIND,
            members = members.len(),
            record_size = T::SIZE,
            "compound layout built"
        );
        Ok(CompoundLayout {
            kind: T::KIND,
            record_size: T::SIZE,
            members,
        })
    }
}
