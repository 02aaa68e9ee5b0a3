//! PLY (Polygon File Format) support.
//!
//! Raw decoding of ASCII, binary little-endian and binary big-endian PLY is
//! done by `ply-rs`. This module adapts its output: every element is turned
//! into named property columns, then elements are replayed into the builder
//! in [`ElementKind`] order so vertices always precede the faces referencing
//! them.
//!
//! # Supported Properties
//!
//! - Vertex positions (x, y, z) - required, any scalar type
//! - Face vertex indices (`vertex_indices`, `vertex_index`, or else the first
//!   list property) - only the first three entries of each face are used
//!
//! The PLY handler is not part of the default registry; register
//! [`PlyFormatReader`] explicitly.

use std::io::Write;

use mesh_types::MeshTopology;
use ply_rs::parser::Parser;
use ply_rs::ply::{
    Addable, DefaultElement, ElementDef, Encoding, Ply, Property, PropertyDef, PropertyType,
    ScalarType,
};
use ply_rs::writer::Writer;
use tracing::debug;

use crate::builder::{MeshBuilder, MeshHints};
use crate::error::{IoError, IoResult};
use crate::options::{ReadOptions, WriteOptions};
use crate::registry::{MeshFormatReader, MeshSource};
use crate::warnings::Warnings;
use crate::writer::{single_mesh, validate_faces};

/// Processing order of PLY elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ElementKind {
    /// `vertex`
    Vertex,
    /// `face`
    Face,
    /// Anything else; ignored.
    Other,
}

impl ElementKind {
    fn of(name: &str) -> Self {
        match name {
            "vertex" => Self::Vertex,
            "face" => Self::Face,
            _ => Self::Other,
        }
    }
}

/// Values of one property over all rows of an element.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// Scalar property, widened to `f64`.
    Scalar(Vec<f64>),
    /// List property, widened to `i64`.
    List(Vec<Vec<i64>>),
}

/// A named property column.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyColumn {
    /// Property name.
    pub name: String,
    /// Values.
    pub data: ColumnData,
}

/// All columns of one element.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementColumns {
    /// Element name.
    pub name: String,
    /// Element kind.
    pub kind: ElementKind,
    /// Number of rows.
    pub rows: usize,
    /// Columns in header order.
    pub columns: Vec<PropertyColumn>,
}

impl ElementColumns {
    /// Column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.data)
    }

    fn scalar(&self, name: &str) -> IoResult<&[f64]> {
        match self.column(name) {
            Some(ColumnData::Scalar(values)) => Ok(values),
            Some(ColumnData::List(_)) => Err(IoError::parsing(format!(
                "PLY property {}.{name} is a list, expected a scalar",
                self.name
            ))),
            None => Err(IoError::parsing(format!(
                "PLY element {} has no {name} property",
                self.name
            ))),
        }
    }

    /// Face index list column.
    fn index_lists(&self) -> Option<&[Vec<i64>]> {
        let named = ["vertex_indices", "vertex_index"]
            .iter()
            .find_map(|name| match self.column(name) {
                Some(ColumnData::List(lists)) => Some(lists.as_slice()),
                _ => None,
            });
        named.or_else(|| {
            self.columns.iter().find_map(|c| match &c.data {
                ColumnData::List(lists) => Some(lists.as_slice()),
                ColumnData::Scalar(_) => None,
            })
        })
    }
}

/// Decode `source` into element columns, in file order.
///
/// # Errors
///
/// Returns [`IoError::FileParsing`] if `ply-rs` rejects the header or payload.
pub fn read_columns(source: &mut dyn MeshSource) -> IoResult<Vec<ElementColumns>> {
    let mut reader = source;
    // Use generic DefaultElement parser - works for all element types
    let parser = Parser::<DefaultElement>::new();
    let header = parser
        .read_header(&mut reader)
        .map_err(|e| IoError::parsing(format!("failed to parse PLY header: {e}")))?;
    let mut payload = parser
        .read_payload(&mut reader, &header)
        .map_err(|e| IoError::parsing(format!("failed to read PLY payload: {e}")))?;

    let mut elements = Vec::with_capacity(header.elements.len());
    for (name, def) in &header.elements {
        let rows = payload.remove(name).unwrap_or_default();
        let columns = def
            .properties
            .keys()
            .map(|property| PropertyColumn {
                name: property.clone(),
                data: column_of(&rows, property),
            })
            .collect();
        elements.push(ElementColumns {
            name: name.clone(),
            kind: ElementKind::of(name),
            rows: rows.len(),
            columns,
        });
    }
    Ok(elements)
}

fn column_of(rows: &[DefaultElement], property: &str) -> ColumnData {
    let first = rows.first().and_then(|row| row.get(property));
    if first.is_some_and(is_list) {
        ColumnData::List(
            rows.iter()
                .map(|row| row.get(property).map(list_value).unwrap_or_default())
                .collect(),
        )
    } else {
        ColumnData::Scalar(
            rows.iter()
                .map(|row| row.get(property).map_or(0.0, scalar_value))
                .collect(),
        )
    }
}

const fn is_list(property: &Property) -> bool {
    matches!(
        property,
        Property::ListChar(_)
            | Property::ListUChar(_)
            | Property::ListShort(_)
            | Property::ListUShort(_)
            | Property::ListInt(_)
            | Property::ListUInt(_)
            | Property::ListFloat(_)
            | Property::ListDouble(_)
    )
}

fn scalar_value(property: &Property) -> f64 {
    match property {
        Property::Char(v) => f64::from(*v),
        Property::UChar(v) => f64::from(*v),
        Property::Short(v) => f64::from(*v),
        Property::UShort(v) => f64::from(*v),
        Property::Int(v) => f64::from(*v),
        Property::UInt(v) => f64::from(*v),
        Property::Float(v) => f64::from(*v),
        Property::Double(v) => *v,
        _ => 0.0,
    }
}

#[allow(clippy::cast_possible_truncation)]
// Truncation: float index lists are non-standard, indices are whole numbers
fn list_value(property: &Property) -> Vec<i64> {
    match property {
        Property::ListChar(v) => v.iter().map(|&i| i64::from(i)).collect(),
        Property::ListUChar(v) => v.iter().map(|&i| i64::from(i)).collect(),
        Property::ListShort(v) => v.iter().map(|&i| i64::from(i)).collect(),
        Property::ListUShort(v) => v.iter().map(|&i| i64::from(i)).collect(),
        Property::ListInt(v) => v.iter().map(|&i| i64::from(i)).collect(),
        Property::ListUInt(v) => v.iter().map(|&i| i64::from(i)).collect(),
        Property::ListFloat(v) => v.iter().map(|&i| i as i64).collect(),
        Property::ListDouble(v) => v.iter().map(|&i| i as i64).collect(),
        _ => Vec::new(),
    }
}

/// PLY handler for the registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlyFormatReader;

impl MeshFormatReader for PlyFormatReader {
    fn name(&self) -> &'static str {
        "ply"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ply"]
    }

    fn read(
        &self,
        source: &mut dyn MeshSource,
        builder: &mut dyn MeshBuilder,
        _options: &ReadOptions,
        warnings: &mut Warnings<'_>,
    ) -> IoResult<()> {
        let mut elements = read_columns(source)?;
        elements.sort_by_key(|e| e.kind);

        let vertex_count: usize = elements
            .iter()
            .filter(|e| e.kind == ElementKind::Vertex)
            .map(|e| e.rows)
            .sum();
        if vertex_count == 0 {
            return Err(IoError::garbage("no vertices in PLY file"));
        }

        // Every axis column is looked up before the mesh is started.
        let positions = elements
            .iter()
            .filter(|e| e.kind == ElementKind::Vertex)
            .map(|e| Ok([e.scalar("x")?, e.scalar("y")?, e.scalar("z")?]))
            .collect::<IoResult<Vec<_>>>()?;

        builder.begin_mesh(MeshHints::NONE);
        for axes in &positions {
            append_vertices(builder, axes);
        }
        for element in &elements {
            match element.kind {
                ElementKind::Vertex => {}
                ElementKind::Face => append_faces(builder, element, vertex_count, warnings),
                ElementKind::Other => {
                    debug!(element = %element.name, rows = element.rows, "skipped PLY element");
                }
            }
        }
        Ok(())
    }
}

fn append_vertices(builder: &mut dyn MeshBuilder, [xs, ys, zs]: &[&[f64]; 3]) {
    for ((&x, &y), &z) in xs.iter().zip(*ys).zip(*zs) {
        builder.append_vertex(x, y, z);
    }
}

fn append_faces(
    builder: &mut dyn MeshBuilder,
    element: &ElementColumns,
    vertex_count: usize,
    warnings: &mut Warnings<'_>,
) {
    let Some(lists) = element.index_lists() else {
        warnings.emit(
            format!("PLY element {} has no index list, faces skipped", element.name),
            None,
        );
        return;
    };

    for (row, list) in lists.iter().enumerate() {
        let resolved = list
            .get(..3)
            .map(|corners| corners.iter().map(|&i| checked_index(i, vertex_count)));
        match resolved {
            Some(mut ids) => match (ids.next(), ids.next(), ids.next()) {
                (Some(Some(a)), Some(Some(b)), Some(Some(c))) => {
                    builder.append_triangle(a, b, c);
                }
                _ => warnings.emit_repeated(
                    "ply-index",
                    format!("PLY face {row} references a missing vertex, skipped"),
                    None,
                ),
            },
            None => warnings.emit_repeated(
                "ply-short",
                format!("PLY face {row} has {} indices, skipped", list.len()),
                None,
            ),
        }
    }
}

fn checked_index(index: i64, vertex_count: usize) -> Option<u32> {
    usize::try_from(index)
        .ok()
        .filter(|&i| i < vertex_count)
        .and_then(|i| u32::try_from(i).ok())
}

/// Write one mesh as PLY.
///
/// ASCII output goes through `ply-rs`; binary output is little-endian.
///
/// # Errors
///
/// Returns [`IoError::InvalidInput`] unless exactly one mesh is given, or a
/// face references a missing vertex.
pub fn write_ply<M: MeshTopology, W: Write>(
    writer: &mut W,
    meshes: &[M],
    options: &WriteOptions,
) -> IoResult<()> {
    let mesh = single_mesh(meshes, "PLY")?;
    validate_faces(mesh)?;
    if options.binary {
        write_ply_binary(mesh, writer)
    } else {
        write_ply_ascii(mesh, writer)
    }
}

/// Save mesh as binary PLY (little-endian).
///
/// Note: We implement this manually because ply-rs has a bug with binary list
/// property writing where it uses element count instead of list length.
fn write_ply_binary<M: MeshTopology, W: Write>(mesh: &M, writer: &mut W) -> IoResult<()> {
    writeln!(writer, "ply")?;
    writeln!(writer, "format binary_little_endian 1.0")?;
    writeln!(writer, "comment Generated by mesh-interchange")?;
    writeln!(writer, "element vertex {}", mesh.vertex_count())?;
    for axis in ["x", "y", "z"] {
        writeln!(writer, "property double {axis}")?;
    }
    writeln!(writer, "element face {}", mesh.face_count())?;
    writeln!(writer, "property list uchar int vertex_indices")?;
    writeln!(writer, "end_header")?;

    for v in mesh.vertices() {
        for c in [v.position.x, v.position.y, v.position.z] {
            writer.write_all(&c.to_le_bytes())?;
        }
    }

    for face in mesh.faces() {
        writer.write_all(&[3u8])?;
        for i in face {
            #[allow(clippy::cast_possible_wrap)]
            // Wrap: validated indices are below the vertex count
            writer.write_all(&(i as i32).to_le_bytes())?;
        }
    }
    Ok(())
}

/// Save mesh as ASCII PLY using ply-rs.
fn write_ply_ascii<M: MeshTopology, W: Write>(mesh: &M, writer: &mut W) -> IoResult<()> {
    let mut ply = Ply::<DefaultElement>::new();
    ply.header.encoding = Encoding::Ascii;
    ply.header
        .comments
        .push("Generated by mesh-interchange".to_string());

    let mut vertex_def = ElementDef::new("vertex".to_string());
    for axis in ["x", "y", "z"] {
        vertex_def.properties.add(PropertyDef::new(
            axis.to_string(),
            PropertyType::Scalar(ScalarType::Double),
        ));
    }
    vertex_def.count = mesh.vertex_count();
    ply.header.elements.add(vertex_def);

    let mut face_def = ElementDef::new("face".to_string());
    face_def.properties.add(PropertyDef::new(
        "vertex_indices".to_string(),
        PropertyType::List(ScalarType::UChar, ScalarType::Int),
    ));
    face_def.count = mesh.face_count();
    ply.header.elements.add(face_def);

    let vertex_elements = mesh
        .vertices()
        .map(|v| {
            let mut element = DefaultElement::new();
            element.insert("x".to_string(), Property::Double(v.position.x));
            element.insert("y".to_string(), Property::Double(v.position.y));
            element.insert("z".to_string(), Property::Double(v.position.z));
            element
        })
        .collect();
    ply.payload.insert("vertex".to_string(), vertex_elements);

    let face_elements = mesh
        .faces()
        .map(|face| {
            let mut element = DefaultElement::new();
            #[allow(clippy::cast_possible_wrap)]
            // Wrap: validated indices are below the vertex count
            let indices = face.iter().map(|&i| i as i32).collect();
            element.insert("vertex_indices".to_string(), Property::ListInt(indices));
            element
        })
        .collect();
    ply.payload.insert("face".to_string(), face_elements);

    Writer::new()
        .write_ply(writer, &mut ply)
        .map_err(|e| IoError::invalid_input(format!("failed to write PLY: {e}")))?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::builder::IndexedMeshBuilder;
    use crate::error::IoCode;
    use approx::assert_relative_eq;
    use mesh_types::{IndexedMesh, unit_cube};
    use std::io::Cursor;

    fn read_bytes(bytes: &[u8]) -> IoResult<(IndexedMeshBuilder, usize)> {
        let mut builder = IndexedMeshBuilder::new();
        let mut warnings = Warnings::silent();
        PlyFormatReader.read(
            &mut Cursor::new(bytes.to_vec()),
            &mut builder,
            &ReadOptions::default(),
            &mut warnings,
        )?;
        Ok((builder, warnings.emitted()))
    }

    #[test]
    fn faces_declared_before_vertices() {
        let text = "ply
format ascii 1.0
element face 1
property list uchar int vertex_index
element vertex 3
property float x
property float y
property float z
end_header
3 0 1 2
0 0 0
1 0 0
0 1 0
";
        let (builder, warnings) = read_bytes(text.as_bytes()).unwrap();
        let mesh = &builder.meshes()[0];
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.faces, vec![[0, 1, 2]]);
        assert_eq!(warnings, 0);
    }

    #[test]
    fn polygons_use_first_three_indices() {
        let text = "ply
format ascii 1.0
element vertex 4
property double x
property double y
property double z
property uchar red
element face 2
property list uchar uint corners
end_header
0 0 0 255
1 0 0 255
1 1 0 255
0 1 0 255
4 0 1 2 3
2 0 1
";
        let (builder, warnings) = read_bytes(text.as_bytes()).unwrap();
        let mesh = &builder.meshes()[0];
        assert_eq!(mesh.faces, vec![[0, 1, 2]]);
        assert_eq!(mesh.vertices[2].position.y, 1.0);
        assert_eq!(warnings, 1);
    }

    #[test]
    fn missing_axis_is_parsing_error() {
        let text = "ply
format ascii 1.0
element vertex 1
property float x
property float y
end_header
0 0
";
        let mut builder = IndexedMeshBuilder::new();
        let err = PlyFormatReader
            .read(
                &mut Cursor::new(text.as_bytes().to_vec()),
                &mut builder,
                &ReadOptions::default(),
                &mut Warnings::silent(),
            )
            .unwrap_err();
        assert_eq!(err.code(), IoCode::FileParsingError);
        assert!(builder.meshes().is_empty());
    }

    #[test]
    fn zero_vertices_is_garbage() {
        let text = "ply
format ascii 1.0
element vertex 0
property float x
property float y
property float z
end_header
";
        let err = read_bytes(text.as_bytes()).unwrap_err();
        assert_eq!(err.code(), IoCode::GarbageDataError);
    }

    #[test]
    fn bad_header() {
        let err = read_bytes(b"not a ply file\n").unwrap_err();
        assert_eq!(err.code(), IoCode::FileParsingError);
    }

    #[test]
    fn roundtrip_cube_binary() {
        let original = unit_cube();
        let mut out = Vec::new();
        write_ply(&mut out, std::slice::from_ref(&original), &WriteOptions::default()).unwrap();

        let (builder, _) = read_bytes(&out).unwrap();
        let loaded = &builder.meshes()[0];
        assert_eq!(loaded.face_count(), original.face_count());
        assert_eq!(loaded.faces, original.faces);
        for (orig, load) in original.vertices.iter().zip(&loaded.vertices) {
            assert_relative_eq!(orig.position, load.position, epsilon = 1e-9);
        }
    }

    #[test]
    fn roundtrip_ascii() {
        let original = unit_cube();
        let mut out = Vec::new();
        write_ply(&mut out, std::slice::from_ref(&original), &WriteOptions::ascii()).unwrap();
        assert!(out.starts_with(b"ply\nformat ascii 1.0"));

        let (builder, _) = read_bytes(&out).unwrap();
        assert_eq!(builder.meshes()[0].vertex_count(), 8);
        assert_eq!(builder.meshes()[0].faces, original.faces);
    }

    #[test]
    fn writer_needs_one_mesh() {
        let mut out = Vec::new();
        let err = write_ply::<IndexedMesh, _>(&mut out, &[], &WriteOptions::default()).unwrap_err();
        assert_eq!(err.code(), IoCode::InvalidInputError);
    }
}
