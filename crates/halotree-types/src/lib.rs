//! Core type definitions for halo merger-tree records.

pub mod primitive;
pub mod record;
pub mod tag;

pub use primitive::PrimitiveType;
pub use record::{HaloIdRecord, HaloRecord, RecordKind, RecordLayout, decode_records};
pub use tag::{FieldTag, TagKind};
