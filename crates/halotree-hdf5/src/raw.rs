//! Hyperslab reads with a runtime compound memory type.
//!
//! The safe `hdf5` API only reads into statically typed buffers. Compound
//! descriptors here are built from the field mapping at runtime, so the
//! window read goes through `H5Dread` directly. Every identifier created in
//! this module is closed by a guard.

use std::ptr;

use halotree_error::{HaloTreeError, Result};
use halotree_reader::{CompoundLayout, RowWindow};
use halotree_types::PrimitiveType;
use hdf5::Dataset;
use hdf5::types::{CompoundField, CompoundType, FloatSize, IntSize, TypeDescriptor};
use hdf5_sys::h5::hsize_t;
use hdf5_sys::h5d::{H5Dget_space, H5Dread};
use hdf5_sys::h5i::hid_t;
use hdf5_sys::h5p::H5P_DEFAULT;
use hdf5_sys::h5s::{H5S_seloper_t, H5Sclose, H5Screate_simple, H5Sselect_hyperslab};

/// Closes a dataspace identifier on drop.
struct Space(hid_t);

impl Space {
    fn new(id: hid_t, dataset: &str, what: &str) -> Result<Self> {
        if id < 0 {
            return Err(HaloTreeError::resource(
                "dataspace",
                dataset,
                format!("{what} failed"),
            ));
        }
        Ok(Self(id))
    }
}

impl Drop for Space {
    fn drop(&mut self) {
        // SAFETY: the id came from a successful H5Dget_space/H5Screate_simple
        // and is closed exactly once.
        unsafe {
            H5Sclose(self.0);
        }
    }
}

/// Native descriptor of a record member type.
pub fn descriptor(ty: PrimitiveType) -> TypeDescriptor {
    match ty {
        PrimitiveType::Int32 => TypeDescriptor::Integer(IntSize::U4),
        PrimitiveType::Float32 => TypeDescriptor::Float(FloatSize::U4),
        PrimitiveType::Int64 => TypeDescriptor::Integer(IntSize::U8),
        PrimitiveType::Float64 => TypeDescriptor::Float(FloatSize::U8),
        PrimitiveType::Float32x3 => {
            TypeDescriptor::FixedArray(Box::new(TypeDescriptor::Float(FloatSize::U4)), 3)
        }
    }
}

/// Compound memory type laid out like the destination record.
pub fn memory_type(layout: &CompoundLayout) -> TypeDescriptor {
    TypeDescriptor::Compound(CompoundType {
        fields: layout
            .members
            .iter()
            .enumerate()
            .map(|(index, member)| CompoundField {
                name: member.name.clone(),
                ty: descriptor(member.ty),
                offset: member.offset,
                index,
            })
            .collect(),
        size: layout.record_size,
    })
}

/// Read `window` rows of `dataset` into a zeroed buffer shaped by `layout`.
///
/// HDF5 matches compound members by name, so members absent from the
/// layout are never touched and stay zero.
pub fn read_window(
    dataset: &Dataset,
    path: &str,
    layout: &CompoundLayout,
    window: RowWindow,
) -> Result<Vec<u8>> {
    let mut buf = vec![0_u8; layout.buffer_len(window.count)];
    if window.is_empty() || layout.members.is_empty() {
        return Ok(buf);
    }

    let memtype = hdf5::Datatype::from_descriptor(&memory_type(layout))
        .map_err(|err| HaloTreeError::resource("memory type", path, err))?;

    let start: [hsize_t; 1] = [window.start as hsize_t];
    let count: [hsize_t; 1] = [window.count as hsize_t];

    // SAFETY: `dataset` is an open dataset handle for the whole call.
    let file_space = Space::new(unsafe { H5Dget_space(dataset.id()) }, path, "H5Dget_space")?;
    // SAFETY: `start` and `count` are rank-1 arrays matching the dataset
    // rank; null stride and block mean 1.
    let selected = unsafe {
        H5Sselect_hyperslab(
            file_space.0,
            H5S_seloper_t::H5S_SELECT_SET,
            start.as_ptr(),
            ptr::null(),
            count.as_ptr(),
            ptr::null(),
        )
    };
    if selected < 0 {
        return Err(HaloTreeError::resource(
            "row window",
            path,
            format!("cannot select rows {}..{}", window.start, window.end()),
        ));
    }

    // SAFETY: `count` holds one dimension; null maxdims means fixed size.
    let mem_space = Space::new(
        unsafe { H5Screate_simple(1, count.as_ptr(), ptr::null()) },
        path,
        "H5Screate_simple",
    )?;

    // SAFETY: `buf` holds `window.count` records of `layout.record_size`
    // bytes, which is exactly what `memtype` over `mem_space` describes.
    let status = unsafe {
        H5Dread(
            dataset.id(),
            memtype.id(),
            mem_space.0,
            file_space.0,
            H5P_DEFAULT,
            buf.as_mut_ptr().cast(),
        )
    };
    if status < 0 {
        return Err(HaloTreeError::resource(
            "dataset",
            path,
            format!("H5Dread of rows {}..{} failed", window.start, window.end()),
        ));
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use halotree_reader::CompoundMember;
    use halotree_types::{FieldTag, RecordKind};

    use super::*;

    #[test]
    fn test_memory_type_mirrors_layout() {
        let layout = CompoundLayout {
            kind: RecordKind::Halo,
            record_size: 104,
            members: vec![
                CompoundMember {
                    tag: FieldTag::HaloPos,
                    name: "Pos".to_owned(),
                    offset: 36,
                    ty: PrimitiveType::Float32x3,
                },
                CompoundMember {
                    tag: FieldTag::HaloMostBoundId,
                    name: "MostBoundID".to_owned(),
                    offset: 80,
                    ty: PrimitiveType::Int64,
                },
            ],
        };
        let TypeDescriptor::Compound(compound) = memory_type(&layout) else {
            panic!("expected a compound descriptor");
        };
        assert_eq!(compound.size, 104);
        assert_eq!(compound.fields.len(), 2);
        assert_eq!(compound.fields[0].name, "Pos");
        assert_eq!(compound.fields[0].offset, 36);
        assert_eq!(
            compound.fields[0].ty,
            TypeDescriptor::FixedArray(Box::new(TypeDescriptor::Float(FloatSize::U4)), 3)
        );
        assert_eq!(compound.fields[1].index, 1);
        assert_eq!(compound.fields[1].ty, TypeDescriptor::Integer(IntSize::U8));
    }
}
