//! Schema-checked, per-tree windowed reading of halo merger-tree files.
//!
//! The pipeline for one input file:
//!
//! 1. [`FieldMapping`] maps the fixed tag set to on-disk names.
//! 2. [`SchemaValidator`] checks mapped members against the file.
//! 3. [`CompoundRecordBuilder`] builds the in-memory record descriptors.
//! 4. [`load_tree_index`] derives per-tree starting rows.
//! 5. [`TreeFileSession::read_tree`] reads one tree's contiguous window.
//!
//! Files are reached through the [`TreeSource`] trait; the HDF5 backend is
//! a separate crate.

pub mod compound;
pub mod field_map;
pub mod memory;
pub mod schema;
pub mod session;
pub mod settings;
pub mod source;
pub mod tree_index;
pub mod window;

pub use compound::{CompoundLayout, CompoundMember, CompoundRecordBuilder};
pub use field_map::{FieldMapping, FieldSpec, MILLENNIUM_FIELD_FORMAT};
pub use memory::{Column, CompoundData, MemoryTreeFile};
pub use schema::{SchemaReport, SchemaValidator};
pub use session::TreeFileSession;
pub use settings::{LoadOptions, ReaderConfig};
pub use source::{MemberInfo, OnDiskType, RowWindow, TreeSource};
pub use tree_index::{TreeIndex, load_tree_index};
pub use window::{TreeWindow, read_records};
