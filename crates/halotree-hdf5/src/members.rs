//! Compound member inspection.
//!
//! `Datatype::to_descriptor` rejects the whole compound as soon as one
//! member has a class it cannot describe (bitfield, opaque, time). Files
//! may carry such members next to the mapped ones, so the members are
//! walked one by one and anything outside the record types is reported as
//! [`OnDiskType::Other`].

use std::ffi::CStr;

use halotree_error::{HaloTreeError, Result};
use halotree_reader::{MemberInfo, OnDiskType};
use halotree_types::PrimitiveType;
use hdf5::Dataset;
use hdf5_sys::h5::{H5free_memory, hsize_t};
use hdf5_sys::h5i::hid_t;
use hdf5_sys::h5t::{
    H5T_class_t, H5T_sign_t, H5Tclose, H5Tget_array_dims2, H5Tget_array_ndims, H5Tget_class,
    H5Tget_member_name, H5Tget_member_type, H5Tget_nmembers, H5Tget_sign, H5Tget_size,
    H5Tget_super,
};

/// Closes a datatype identifier on drop.
struct Type(hid_t);

impl Type {
    fn new(id: hid_t, dataset: &str, what: &str) -> Result<Self> {
        if id < 0 {
            return Err(HaloTreeError::resource(
                "datatype",
                dataset,
                format!("{what} failed"),
            ));
        }
        Ok(Self(id))
    }
}

impl Drop for Type {
    fn drop(&mut self) {
        // SAFETY: the id came from a successful H5Tget_* call that hands out
        // a new identifier, and is closed exactly once.
        unsafe {
            H5Tclose(self.0);
        }
    }
}

/// Names and classified types of every member of a compound dataset, in
/// on-disk order.
pub fn compound_members(dataset: &Dataset, path: &str) -> Result<Vec<MemberInfo>> {
    let dtype = dataset
        .dtype()
        .map_err(|err| HaloTreeError::resource("datatype", path, err))?;
    let id = dtype.id();

    // SAFETY: `dtype` keeps `id` open for the rest of this function.
    let class = unsafe { H5Tget_class(id) };
    if !matches!(class, H5T_class_t::H5T_COMPOUND) {
        return Err(HaloTreeError::resource(
            "dataset",
            path,
            format!("not a compound dataset: {}", class_name(class)),
        ));
    }
    // SAFETY: as above.
    let count = unsafe { H5Tget_nmembers(id) };
    let count = u32::try_from(count)
        .map_err(|_| HaloTreeError::resource("datatype", path, "H5Tget_nmembers failed"))?;

    let mut members = Vec::with_capacity(count as usize);
    for index in 0..count {
        let name = member_name(id, index, path)?;
        // SAFETY: `index` is below the member count of the open compound.
        let member = Type::new(
            unsafe { H5Tget_member_type(id, index) },
            path,
            "H5Tget_member_type",
        )?;
        members.push(MemberInfo {
            name,
            ty: classify(&member, path)?,
        });
    }
    Ok(members)
}

fn member_name(id: hid_t, index: u32, path: &str) -> Result<String> {
    // SAFETY: `index` is below the member count of the open compound `id`.
    let raw = unsafe { H5Tget_member_name(id, index) };
    if raw.is_null() {
        return Err(HaloTreeError::resource(
            "datatype",
            path,
            format!("H5Tget_member_name({index}) failed"),
        ));
    }
    // SAFETY: a non-null result is a NUL-terminated string allocated by the
    // library. It is copied, then released with the library's allocator.
    let name = unsafe {
        let name = CStr::from_ptr(raw).to_string_lossy().into_owned();
        H5free_memory(raw.cast());
        name
    };
    Ok(name)
}

fn classify(ty: &Type, path: &str) -> Result<OnDiskType> {
    // SAFETY: `ty` owns an open datatype identifier.
    let (class, size) = unsafe { (H5Tget_class(ty.0), H5Tget_size(ty.0)) };
    let bits = size * 8;
    let classified = match class {
        H5T_class_t::H5T_INTEGER => {
            // SAFETY: `ty` is an open integer type.
            let signed = matches!(unsafe { H5Tget_sign(ty.0) }, H5T_sign_t::H5T_SGN_2);
            match (signed, size) {
                (true, 4) => OnDiskType::Primitive(PrimitiveType::Int32),
                (true, 8) => OnDiskType::Primitive(PrimitiveType::Int64),
                (true, _) => OnDiskType::Other(format!("int{bits}")),
                (false, _) => OnDiskType::Other(format!("uint{bits}")),
            }
        }
        H5T_class_t::H5T_FLOAT => match size {
            4 => OnDiskType::Primitive(PrimitiveType::Float32),
            8 => OnDiskType::Primitive(PrimitiveType::Float64),
            _ => OnDiskType::Other(format!("float{bits}")),
        },
        H5T_class_t::H5T_ARRAY => classify_array(ty, path)?,
        other => OnDiskType::Other(format!("{}{bits}", class_name(other))),
    };
    Ok(classified)
}

fn classify_array(ty: &Type, path: &str) -> Result<OnDiskType> {
    // SAFETY: `ty` is an open array type.
    let rank = unsafe { H5Tget_array_ndims(ty.0) };
    if rank != 1 {
        return Ok(OnDiskType::Other(format!("array of rank {rank}")));
    }
    let mut dims: [hsize_t; 1] = [0];
    // SAFETY: the array has rank 1, so one dimension is written.
    if unsafe { H5Tget_array_dims2(ty.0, dims.as_mut_ptr()) } != 1 {
        return Err(HaloTreeError::resource(
            "datatype",
            path,
            "H5Tget_array_dims2 failed",
        ));
    }
    // SAFETY: `ty` is an open array type.
    let base = Type::new(unsafe { H5Tget_super(ty.0) }, path, "H5Tget_super")?;
    let classified = match classify(&base, path)? {
        OnDiskType::Primitive(PrimitiveType::Float32) if dims[0] == 3 => {
            OnDiskType::Primitive(PrimitiveType::Float32x3)
        }
        base => OnDiskType::Other(format!("{base}[{}]", dims[0])),
    };
    Ok(classified)
}

const fn class_name(class: H5T_class_t) -> &'static str {
    match class {
        H5T_class_t::H5T_INTEGER => "int",
        H5T_class_t::H5T_FLOAT => "float",
        H5T_class_t::H5T_TIME => "time",
        H5T_class_t::H5T_STRING => "string",
        H5T_class_t::H5T_BITFIELD => "bitfield",
        H5T_class_t::H5T_OPAQUE => "opaque",
        H5T_class_t::H5T_COMPOUND => "compound",
        H5T_class_t::H5T_REFERENCE => "reference",
        H5T_class_t::H5T_ENUM => "enum",
        H5T_class_t::H5T_VLEN => "vlen",
        H5T_class_t::H5T_ARRAY => "array",
        _ => "unknown",
    }
}
