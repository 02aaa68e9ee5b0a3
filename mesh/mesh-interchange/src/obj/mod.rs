//! Wavefront OBJ support.
//!
//! Reading is two passes. [`scan_obj`] tokenizes the file into attribute
//! arrays and triangles, resolving relative indices and loading any `mtllib`
//! libraries found in the material search paths. [`ObjScan::build`] then
//! replays the scan into a builder, either as one mesh whose vertices follow
//! the file, or as one mesh per material with corners deduplicated by their
//! `(position, normal, uv)` triple.
//!
//! Only triangular faces are read; other polygons are skipped.

mod build;
mod mtl;
mod scan;
mod writer;

pub use build::BuildStrategy;
pub use mtl::{MaterialLibrary, find_library};
pub use scan::{Corner, ObjScan, ObjTriangle, scan_obj};
pub use writer::write_obj;

use tracing::debug;

use crate::builder::MeshBuilder;
use crate::error::IoResult;
use crate::options::ReadOptions;
use crate::registry::{MeshFormatReader, MeshSource};
use crate::warnings::Warnings;

/// OBJ handler for the registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjFormatReader;

impl MeshFormatReader for ObjFormatReader {
    fn name(&self) -> &'static str {
        "obj"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["obj"]
    }

    fn read(
        &self,
        source: &mut dyn MeshSource,
        builder: &mut dyn MeshBuilder,
        options: &ReadOptions,
        warnings: &mut Warnings<'_>,
    ) -> IoResult<()> {
        let scan = scan_obj(source, options, warnings)?;
        debug!(
            positions = scan.position_count(),
            triangles = scan.triangles().len(),
            materials = scan.library().len(),
            "scanned OBJ"
        );
        scan.build(builder, warnings)
    }
}
