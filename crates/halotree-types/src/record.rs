//! In-memory record layouts.
//!
//! Both records are `#[repr(C)]` so member offsets are fixed at compile
//! time. A compound read fills a byte buffer laid out exactly like a slice
//! of these records; [`decode_records`] turns that buffer into typed values
//! without any unsafe reinterpretation.

use std::fmt;
use std::mem::offset_of;

use halotree_error::{HaloTreeError, Result};
use serde::Serialize;

use crate::tag::FieldTag;

/// Which compound record a layout describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Halo,
    HaloIds,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Halo => "halo",
            Self::HaloIds => "halo ids",
        })
    }
}

/// One halo of one tree.
///
/// Link members are indices into the owning tree's own window, `-1` meaning
/// none.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct HaloRecord {
    pub descendant: i32,
    pub first_progenitor: i32,
    pub next_progenitor: i32,
    pub first_halo_in_fof_group: i32,
    pub next_halo_in_fof_group: i32,
    /// Number of particles.
    pub len: i32,
    pub m_mean200: f32,
    pub m_crit200: f32,
    pub m_top_hat: f32,
    pub pos: [f32; 3],
    pub vel: [f32; 3],
    pub vel_disp: f32,
    pub vmax: f32,
    pub spin: [f32; 3],
    pub most_bound_id: i64,
    pub snap_num: i32,
    pub file_nr: i32,
    pub subhalo_index: i32,
    pub sub_half_mass: f32,
}

/// Simulation-wide identifiers for one halo, row-aligned with
/// [`HaloRecord`].
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct HaloIdRecord {
    pub halo_id: i64,
    pub file_tree_nr: i64,
    pub first_progenitor: i64,
    pub last_progenitor: i64,
    pub next_progenitor: i64,
    pub descendant: i64,
    pub first_halo_in_fof_group: i64,
    pub next_halo_in_fof_group: i64,
    /// Only populated for large-simulation inputs.
    pub main_leaf_id: i64,
    pub redshift: f64,
    /// Space-filling-curve key.
    pub peano_key: i32,
}

/// A fixed in-memory record that compound rows are read into.
pub trait RecordLayout: Copy + Default {
    const KIND: RecordKind;
    /// Record stride in bytes, padding included.
    const SIZE: usize = std::mem::size_of::<Self>();

    /// Byte offset of the member a tag maps onto, or `None` if the tag is
    /// not a member of this record.
    fn member_offset(tag: FieldTag) -> Option<usize>;

    /// Decode one record from exactly [`Self::SIZE`] native-endian bytes.
    fn decode(bytes: &[u8]) -> Self;
}

impl RecordLayout for HaloRecord {
    const KIND: RecordKind = RecordKind::Halo;

    fn member_offset(tag: FieldTag) -> Option<usize> {
        let offset = match tag {
            FieldTag::HaloDescendant => offset_of!(Self, descendant),
            FieldTag::HaloFirstProgenitor => offset_of!(Self, first_progenitor),
            FieldTag::HaloNextProgenitor => offset_of!(Self, next_progenitor),
            FieldTag::HaloFirstHaloInFofGroup => offset_of!(Self, first_halo_in_fof_group),
            FieldTag::HaloNextHaloInFofGroup => offset_of!(Self, next_halo_in_fof_group),
            FieldTag::HaloLen => offset_of!(Self, len),
            FieldTag::HaloMMean200 => offset_of!(Self, m_mean200),
            FieldTag::HaloMCrit200 => offset_of!(Self, m_crit200),
            FieldTag::HaloMTopHat => offset_of!(Self, m_top_hat),
            FieldTag::HaloPos => offset_of!(Self, pos),
            FieldTag::HaloVel => offset_of!(Self, vel),
            FieldTag::HaloVelDisp => offset_of!(Self, vel_disp),
            FieldTag::HaloVmax => offset_of!(Self, vmax),
            FieldTag::HaloSpin => offset_of!(Self, spin),
            FieldTag::HaloMostBoundId => offset_of!(Self, most_bound_id),
            FieldTag::HaloSnapNum => offset_of!(Self, snap_num),
            FieldTag::HaloFileNr => offset_of!(Self, file_nr),
            FieldTag::HaloSubhaloIndex => offset_of!(Self, subhalo_index),
            FieldTag::HaloSubHalfMass => offset_of!(Self, sub_half_mass),
            _ => return None,
        };
        Some(offset)
    }

    fn decode(bytes: &[u8]) -> Self {
        Self {
            descendant: i32_at(bytes, offset_of!(Self, descendant)),
            first_progenitor: i32_at(bytes, offset_of!(Self, first_progenitor)),
            next_progenitor: i32_at(bytes, offset_of!(Self, next_progenitor)),
            first_halo_in_fof_group: i32_at(bytes, offset_of!(Self, first_halo_in_fof_group)),
            next_halo_in_fof_group: i32_at(bytes, offset_of!(Self, next_halo_in_fof_group)),
            len: i32_at(bytes, offset_of!(Self, len)),
            m_mean200: f32_at(bytes, offset_of!(Self, m_mean200)),
            m_crit200: f32_at(bytes, offset_of!(Self, m_crit200)),
            m_top_hat: f32_at(bytes, offset_of!(Self, m_top_hat)),
            pos: vec3_at(bytes, offset_of!(Self, pos)),
            vel: vec3_at(bytes, offset_of!(Self, vel)),
            vel_disp: f32_at(bytes, offset_of!(Self, vel_disp)),
            vmax: f32_at(bytes, offset_of!(Self, vmax)),
            spin: vec3_at(bytes, offset_of!(Self, spin)),
            most_bound_id: i64_at(bytes, offset_of!(Self, most_bound_id)),
            snap_num: i32_at(bytes, offset_of!(Self, snap_num)),
            file_nr: i32_at(bytes, offset_of!(Self, file_nr)),
            subhalo_index: i32_at(bytes, offset_of!(Self, subhalo_index)),
            sub_half_mass: f32_at(bytes, offset_of!(Self, sub_half_mass)),
        }
    }
}

impl RecordLayout for HaloIdRecord {
    const KIND: RecordKind = RecordKind::HaloIds;

    fn member_offset(tag: FieldTag) -> Option<usize> {
        let offset = match tag {
            FieldTag::IdHaloId => offset_of!(Self, halo_id),
            FieldTag::IdFileTreeNr => offset_of!(Self, file_tree_nr),
            FieldTag::IdFirstProgenitor => offset_of!(Self, first_progenitor),
            FieldTag::IdLastProgenitor => offset_of!(Self, last_progenitor),
            FieldTag::IdNextProgenitor => offset_of!(Self, next_progenitor),
            FieldTag::IdDescendant => offset_of!(Self, descendant),
            FieldTag::IdFirstHaloInFofGroup => offset_of!(Self, first_halo_in_fof_group),
            FieldTag::IdNextHaloInFofGroup => offset_of!(Self, next_halo_in_fof_group),
            FieldTag::IdMainLeafId => offset_of!(Self, main_leaf_id),
            FieldTag::IdRedshift => offset_of!(Self, redshift),
            FieldTag::IdPeanoKey => offset_of!(Self, peano_key),
            _ => return None,
        };
        Some(offset)
    }

    fn decode(bytes: &[u8]) -> Self {
        Self {
            halo_id: i64_at(bytes, offset_of!(Self, halo_id)),
            file_tree_nr: i64_at(bytes, offset_of!(Self, file_tree_nr)),
            first_progenitor: i64_at(bytes, offset_of!(Self, first_progenitor)),
            last_progenitor: i64_at(bytes, offset_of!(Self, last_progenitor)),
            next_progenitor: i64_at(bytes, offset_of!(Self, next_progenitor)),
            descendant: i64_at(bytes, offset_of!(Self, descendant)),
            first_halo_in_fof_group: i64_at(bytes, offset_of!(Self, first_halo_in_fof_group)),
            next_halo_in_fof_group: i64_at(bytes, offset_of!(Self, next_halo_in_fof_group)),
            main_leaf_id: i64_at(bytes, offset_of!(Self, main_leaf_id)),
            redshift: f64_at(bytes, offset_of!(Self, redshift)),
            peano_key: i32_at(bytes, offset_of!(Self, peano_key)),
        }
    }
}

/// Decode a buffer of back-to-back records.
///
/// # Errors
/// Returns [`HaloTreeError::CorruptInput`] if the buffer length is not a
/// whole number of records.
pub fn decode_records<T: RecordLayout>(bytes: &[u8]) -> Result<Vec<T>> {
    if bytes.len() % T::SIZE != 0 {
        return Err(HaloTreeError::corrupt(format!(
            "{} buffer of {} bytes is not a multiple of the {}-byte record size",
            T::KIND,
            bytes.len(),
            T::SIZE
        )));
    }
    Ok(bytes.chunks_exact(T::SIZE).map(T::decode).collect())
}

fn ne_array<const N: usize>(bytes: &[u8], at: usize) -> [u8; N] {
    let mut out = [0_u8; N];
    out.copy_from_slice(&bytes[at..at + N]);
    out
}

fn i32_at(bytes: &[u8], at: usize) -> i32 {
    i32::from_ne_bytes(ne_array(bytes, at))
}

fn i64_at(bytes: &[u8], at: usize) -> i64 {
    i64::from_ne_bytes(ne_array(bytes, at))
}

fn f32_at(bytes: &[u8], at: usize) -> f32 {
    f32::from_ne_bytes(ne_array(bytes, at))
}

fn f64_at(bytes: &[u8], at: usize) -> f64 {
    f64::from_ne_bytes(ne_array(bytes, at))
}

fn vec3_at(bytes: &[u8], at: usize) -> [f32; 3] {
    [
        f32_at(bytes, at),
        f32_at(bytes, at + 4),
        f32_at(bytes, at + 8),
    ]
}
