//! Primitive member types understood by the record layouts.

use std::fmt;

use serde::Serialize;

/// Type of a single compound member, both as expected by the in-memory
/// layout and as declared on disk.
///
/// All multi-byte values are little-endian on disk and native in memory;
/// conversion between the two is the file library's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveType {
    /// 32-bit signed integer.
    Int32,
    /// 32-bit IEEE float.
    Float32,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit IEEE float.
    Float64,
    /// Fixed-length array of three 32-bit floats.
    Float32x3,
}

impl PrimitiveType {
    /// Size of one value in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::Int32 | Self::Float32 => 4,
            Self::Int64 | Self::Float64 => 8,
            Self::Float32x3 => 12,
        }
    }

    /// Short lowercase name used in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int32 => "int32",
            Self::Float32 => "float32",
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::Float32x3 => "float32[3]",
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        assert_eq!(PrimitiveType::Int32.size(), 4);
        assert_eq!(PrimitiveType::Float32.size(), 4);
        assert_eq!(PrimitiveType::Int64.size(), 8);
        assert_eq!(PrimitiveType::Float64.size(), 8);
        assert_eq!(PrimitiveType::Float32x3.size(), 12);
    }

    #[test]
    fn test_display_and_serde_names() {
        assert_eq!(PrimitiveType::Float32x3.to_string(), "float32[3]");
        let json = serde_json::to_string(&PrimitiveType::Int64).unwrap();
        assert_eq!(json, "\"int64\"");
    }
}
