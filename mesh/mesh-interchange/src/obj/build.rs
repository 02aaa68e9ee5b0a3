//! Second OBJ pass: replay a scan into a [`MeshBuilder`].
//!
//! Two strategies:
//! - **simple**: attributes are aligned with positions. Every position is
//!   appended once in file order and triangles use position indices directly.
//! - **by material**: used when several materials are used or any corner is
//!   complex. One mesh per material group; corners are deduplicated by their
//!   `(position, normal, uv)` key within the group.

use hashbrown::HashMap;
use tracing::debug;

use super::scan::{Corner, ObjScan};
use crate::builder::{MeshBuilder, MeshHints, NewVertexInfo};
use crate::error::{IoError, IoResult};
use crate::warnings::Warnings;

/// Reconstruction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStrategy {
    /// One mesh, attributes aligned with positions.
    Simple,
    /// One mesh per material, corners deduplicated by index key.
    ByMaterial,
}

/// Identity of an output vertex within one mesh.
type VertexKey = (u32, Option<u32>, Option<u32>);

impl ObjScan {
    /// Strategy [`build`](Self::build) will use.
    #[must_use]
    pub fn strategy(&self) -> BuildStrategy {
        if self.used_materials.len() > 1 || self.has_complex_vertices() {
            BuildStrategy::ByMaterial
        } else {
            BuildStrategy::Simple
        }
    }

    /// Append the scanned geometry to `builder`.
    ///
    /// # Errors
    ///
    /// - [`IoError::GarbageData`] if no vertices or no triangles were read
    /// - [`IoError::FileParsing`] if a corner references a missing position;
    ///   nothing is appended in that case
    pub fn build(
        &self,
        builder: &mut dyn MeshBuilder,
        warnings: &mut Warnings<'_>,
    ) -> IoResult<()> {
        if self.positions.is_empty() {
            return Err(IoError::garbage("no vertices in file"));
        }
        if self.triangles.is_empty() {
            return Err(IoError::garbage("no triangles in file"));
        }
        let count = self.positions.len();
        if let Some(bad) = self
            .triangles
            .iter()
            .flat_map(|t| t.corners)
            .find(|c| c.position as usize >= count)
        {
            return Err(IoError::parsing(format!(
                "face references vertex {} but the file has {count}",
                u64::from(bad.position) + 1
            )));
        }

        let strategy = self.strategy();
        debug!(
            ?strategy,
            positions = count,
            triangles = self.triangles.len(),
            materials = self.used_materials.len(),
            "building OBJ meshes"
        );
        match strategy {
            BuildStrategy::Simple => self.build_simple(builder),
            BuildStrategy::ByMaterial => self.build_by_material(builder, warnings),
        }
        Ok(())
    }

    fn build_simple(&self, builder: &mut dyn MeshBuilder) {
        let count = self.positions.len();
        let hints = MeshHints {
            vertex_normals: self.normals.len() == count,
            vertex_colors: self.has_per_vertex_colors(),
            vertex_uvs: self.uvs.len() == count,
            face_groups: false,
        };

        let mesh_id = builder.begin_mesh(hints);
        let ids: Vec<u32> = (0..count)
            .map(|k| {
                let info = NewVertexInfo {
                    normal: hints.vertex_normals.then(|| self.normals[k]),
                    color: self.colors[k],
                    uv: hints.vertex_uvs.then(|| self.uvs[k]),
                    ..NewVertexInfo::at(self.positions[k])
                };
                append(builder, &info)
            })
            .collect();

        for t in &self.triangles {
            let [a, b, c] = t.corners.map(|c| ids[c.position as usize]);
            builder.append_triangle(a, b, c);
        }

        if let [(_, name)] = self.used_materials.as_slice() {
            if let Some(material) = self.library.get(name) {
                let material_id = builder.build_material(material);
                builder.assign_material(material_id, mesh_id);
            }
        }
    }

    fn build_by_material(&self, builder: &mut dyn MeshBuilder, warnings: &mut Warnings<'_>) {
        let hints = MeshHints {
            vertex_normals: !self.normals.is_empty(),
            vertex_colors: self.has_per_vertex_colors(),
            vertex_uvs: !self.uvs.is_empty(),
            face_groups: false,
        };

        // Material groups in order of first use; `None` collects faces read
        // while no material was active.
        let mut groups: Vec<Option<usize>> = Vec::new();
        for t in &self.triangles {
            if !groups.contains(&t.material) {
                groups.push(t.material);
            }
        }

        for group in groups {
            let material_id = group.and_then(|id| {
                let (_, name) = self.used_materials.iter().find(|(used, _)| *used == id)?;
                self.library.get(name).map(|m| builder.build_material(m))
            });
            let mesh_id = builder.begin_mesh(hints);

            let mut ids: HashMap<VertexKey, u32> = HashMap::new();
            for t in self.triangles.iter().filter(|t| t.material == group) {
                let [a, b, c] = t.corners.map(|corner| {
                    let key = self.vertex_key(corner, warnings);
                    *ids.entry(key)
                        .or_insert_with(|| append(builder, &self.vertex_info(key)))
                });
                builder.append_triangle(a, b, c);
            }

            if let Some(material_id) = material_id {
                builder.assign_material(material_id, mesh_id);
            }
            debug!(?group, vertices = ids.len(), "built OBJ material group");
        }
    }

    /// Key of a corner. Missing attribute indices fall back to the position
    /// index when the attribute array is aligned with positions; dangling ones
    /// are dropped with a warning.
    fn vertex_key(&self, corner: Corner, warnings: &mut Warnings<'_>) -> VertexKey {
        let count = self.positions.len();
        let normal = attribute_index(corner.normal, corner.position, self.normals.len(), count);
        let uv = attribute_index(corner.uv, corner.position, self.uvs.len(), count);
        if normal.is_none() && corner.normal.is_some() || uv.is_none() && corner.uv.is_some() {
            warnings.emit_repeated(
                "obj-attribute",
                format!("face corner {corner:?} references a missing normal or uv"),
                None,
            );
        }
        (corner.position, normal, uv)
    }

    fn vertex_info(&self, (position, normal, uv): VertexKey) -> NewVertexInfo {
        let p = position as usize;
        NewVertexInfo {
            normal: normal.and_then(|n| self.normals.get(n as usize).copied()),
            color: self.colors[p],
            uv: uv.and_then(|t| self.uvs.get(t as usize).copied()),
            ..NewVertexInfo::at(self.positions[p])
        }
    }
}

fn attribute_index(index: Option<u32>, position: u32, len: usize, positions: usize) -> Option<u32> {
    match index {
        Some(i) => ((i as usize) < len).then_some(i),
        None => (len == positions).then_some(position),
    }
}

/// Append with the cheaper overload when no attribute is set.
fn append(builder: &mut dyn MeshBuilder, info: &NewVertexInfo) -> u32 {
    if info.has_attributes() {
        builder.append_vertex_info(info)
    } else {
        let [x, y, z] = info.position;
        builder.append_vertex(x, y, z)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::super::scan::scan_obj;
    use super::*;
    use crate::builder::IndexedMeshBuilder;
    use crate::error::IoCode;
    use crate::options::ReadOptions;
    use mesh_types::MeshTopology;
    use std::io::Cursor;

    fn build(text: &str) -> IoResult<IndexedMeshBuilder> {
        let mut warnings = Warnings::silent();
        let scan = scan_obj(
            &mut Cursor::new(text.as_bytes()),
            &ReadOptions::without_materials(),
            &mut warnings,
        )?;
        let mut builder = IndexedMeshBuilder::new();
        scan.build(&mut builder, &mut warnings)?;
        Ok(builder)
    }

    #[test]
    fn simple_path_keeps_file_vertices() {
        let text = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nv 5 5 5\n\
                    vn 0 0 1\nvn 0 0 1\nvn 0 0 1\nvn 0 0 1\nvn 0 0 1\n\
                    f 1//1 2//2 3//3\nf 1//1 3//3 4//4\n";
        let builder = build(text).unwrap();
        assert_eq!(builder.meshes().len(), 1);
        let mesh = &builder.meshes()[0];
        assert_eq!(mesh.vertex_count(), 5);
        assert_eq!(mesh.faces, vec![[0, 1, 2], [0, 2, 3]]);
        assert!(mesh.vertices.iter().all(|v| v.normal().is_some()));
    }

    #[test]
    fn complex_corners_are_deduplicated() {
        // A quad whose diagonal corners carry two different uvs.
        let text = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
                    vt 0 0\nvt 1 0\nvt 1 1\nvt 0 1\nvt 0.5 0.5\n\
                    f 1/1 2/2 3/3\nf 1/5 3/3 4/4\n";
        let builder = build(text).unwrap();
        assert_eq!(builder.meshes().len(), 1);
        let mesh = &builder.meshes()[0];
        // Keys: (0,1) (1,2) (2,3) (0,5) (3,4); (2,3) is shared.
        assert_eq!(mesh.vertex_count(), 5);
        assert_eq!(mesh.faces, vec![[0, 1, 2], [3, 2, 4]]);
        assert_eq!(mesh.vertices[3].uv(), Some((0.5, 0.5)));
        assert_eq!(mesh.vertices[3].position, mesh.vertices[0].position);
    }

    #[test]
    fn empty_geometry_is_garbage() {
        assert_eq!(build("# nothing\n").unwrap_err().code(), IoCode::GarbageDataError);
        assert_eq!(
            build("v 0 0 0\nv 1 0 0\nv 0 1 0\n").unwrap_err().code(),
            IoCode::GarbageDataError
        );
    }

    #[test]
    fn dangling_position_fails_before_building() {
        let mut warnings = Warnings::silent();
        let scan = scan_obj(
            &mut Cursor::new("v 0 0 0\nv 1 0 0\nf 1 2 3\n".as_bytes()),
            &ReadOptions::default(),
            &mut warnings,
        )
        .unwrap();
        let mut builder = IndexedMeshBuilder::new();
        let err = scan.build(&mut builder, &mut warnings).unwrap_err();
        assert_eq!(err.code(), IoCode::FileParsingError);
        assert!(builder.meshes().is_empty());
    }

    #[test]
    fn mixed_color_lines_keep_their_own_colors() {
        // The uv index differs from the position index, forcing the
        // by-material path.
        let text = "v 0 0 0\nv 1 0 0 0 1 0\nv 0 1 0 0 0 1\nvt 0 0\nf 1/1 2/1 3/1\n";
        let builder = build(text).unwrap();
        let mesh = &builder.meshes()[0];
        assert_eq!(mesh.vertices[0].color(), None);
        assert_eq!(mesh.vertices[1].color().map(|c| c.to_array()), Some([0.0, 1.0, 0.0]));
        assert_eq!(mesh.vertices[2].color().map(|c| c.to_array()), Some([0.0, 0.0, 1.0]));
    }

    #[test]
    fn mixed_color_lines_on_the_simple_path() {
        let text = "v 0 0 0 1 0 0\nv 1 0 0\nv 0 1 0 0 0 1\nf 1 2 3\n";
        let builder = build(text).unwrap();
        let mesh = &builder.meshes()[0];
        assert_eq!(mesh.vertices[0].color().map(|c| c.to_array()), Some([1.0, 0.0, 0.0]));
        assert_eq!(mesh.vertices[1].color(), None);
        assert_eq!(mesh.vertices[2].color().map(|c| c.to_array()), Some([0.0, 0.0, 1.0]));
    }

    #[test]
    fn dangling_uv_is_dropped() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nf 1/1 2/9 3/1\n";
        let builder = build(text).unwrap();
        let mesh = &builder.meshes()[0];
        assert_eq!(mesh.vertices[0].uv(), Some((0.0, 0.0)));
        assert_eq!(mesh.vertices[1].uv(), None);
    }
}
