//! Options for reading and writing meshes.

use std::path::PathBuf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::number::NumberFormat;

/// Options for a read.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReadOptions {
    /// Load OBJ material libraries (`mtllib`) and honor `usemtl`.
    /// Default: true
    pub read_materials: bool,

    /// Directories searched, in order, for OBJ material libraries.
    /// Default: empty
    pub material_search_paths: Vec<PathBuf>,

    /// Numeric format of text formats. Default: invariant (`.` separator)
    pub number_format: NumberFormat,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            read_materials: true,
            material_search_paths: Vec::new(),
            number_format: NumberFormat::INVARIANT,
        }
    }
}

impl ReadOptions {
    /// Options that skip material libraries.
    #[must_use]
    pub fn without_materials() -> Self {
        Self {
            read_materials: false,
            ..Default::default()
        }
    }

    /// Set whether materials are read.
    #[must_use]
    pub const fn with_read_materials(mut self, read: bool) -> Self {
        self.read_materials = read;
        self
    }

    /// Append a material search directory.
    #[must_use]
    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.material_search_paths.push(path.into());
        self
    }

    /// Set the numeric format.
    #[must_use]
    pub const fn with_number_format(mut self, number_format: NumberFormat) -> Self {
        self.number_format = number_format;
        self
    }
}

/// Options for a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WriteOptions {
    /// Binary encoding for formats that have one (STL, PLY). Default: true
    pub binary: bool,

    /// Write vertex normals when the mesh has them. Default: true
    pub write_normals: bool,

    /// Write vertex colors when the mesh has them. Default: true
    pub write_colors: bool,

    /// Write texture coordinates when the mesh has them. Default: true
    pub write_uvs: bool,

    /// Numeric format of text formats. Default: invariant
    pub number_format: NumberFormat,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            binary: true,
            write_normals: true,
            write_colors: true,
            write_uvs: true,
            number_format: NumberFormat::INVARIANT,
        }
    }
}

impl WriteOptions {
    /// Text encoding with all attributes.
    #[must_use]
    pub fn ascii() -> Self {
        Self {
            binary: false,
            ..Default::default()
        }
    }

    /// Positions and faces only.
    #[must_use]
    pub fn geometry_only() -> Self {
        Self {
            write_normals: false,
            write_colors: false,
            write_uvs: false,
            ..Default::default()
        }
    }

    /// Set binary encoding.
    #[must_use]
    pub const fn with_binary(mut self, binary: bool) -> Self {
        self.binary = binary;
        self
    }
}
