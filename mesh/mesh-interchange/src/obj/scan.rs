//! First OBJ pass: tokenize the file into attribute arrays and triangles.

use std::io::BufRead;

use tracing::debug;

use super::mtl::{MaterialLibrary, find_library};
use crate::error::{IoError, IoResult};
use crate::number::NumberFormat;
use crate::options::ReadOptions;
use crate::warnings::{WarningContext, Warnings};

/// One face corner, 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Corner {
    /// Position index.
    pub position: u32,
    /// Normal index.
    pub normal: Option<u32>,
    /// Texture coordinate index.
    pub uv: Option<u32>,
}

impl Corner {
    /// Whether the normal or UV index differs from the position index.
    #[must_use]
    pub fn is_complex(&self) -> bool {
        self.normal.is_some_and(|n| n != self.position) || self.uv.is_some_and(|t| t != self.position)
    }
}

/// A scanned triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjTriangle {
    /// Corners in file order.
    pub corners: [Corner; 3],
    /// Id of the material active when the face was read.
    pub material: Option<usize>,
}

/// Everything the scan pass collects.
#[derive(Debug, Clone, Default)]
pub struct ObjScan {
    pub(super) positions: Vec<[f64; 3]>,
    /// One entry per position; `None` for `v` statements without a color.
    pub(super) colors: Vec<Option<[f32; 3]>>,
    pub(super) normals: Vec<[f32; 3]>,
    pub(super) uvs: Vec<[f32; 2]>,
    pub(super) triangles: Vec<ObjTriangle>,
    pub(super) library: MaterialLibrary,
    /// Used materials as `(id, name)`, in first-use order.
    pub(super) used_materials: Vec<(usize, String)>,
    has_per_vertex_colors: bool,
    uv_dimension: usize,
    has_complex_vertices: bool,
}

impl ObjScan {
    /// Whether any `v` statement carried an RGB color.
    #[must_use]
    pub const fn has_per_vertex_colors(&self) -> bool {
        self.has_per_vertex_colors
    }

    /// Largest number of components seen on a `vt` statement.
    #[must_use]
    pub const fn uv_dimension(&self) -> usize {
        self.uv_dimension
    }

    /// Whether any face corner used a normal or UV index different from its
    /// position index.
    #[must_use]
    pub const fn has_complex_vertices(&self) -> bool {
        self.has_complex_vertices
    }

    /// Number of `v` statements read.
    #[must_use]
    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    /// Scanned triangles.
    #[must_use]
    pub fn triangles(&self) -> &[ObjTriangle] {
        &self.triangles
    }

    /// Materials loaded from material libraries.
    #[must_use]
    pub const fn library(&self) -> &MaterialLibrary {
        &self.library
    }

    /// Used materials as `(id, name)`, in first-use order.
    #[must_use]
    pub fn used_materials(&self) -> &[(usize, String)] {
        &self.used_materials
    }
}

/// Scan an OBJ stream.
///
/// # Errors
///
/// Returns an error if reading fails, a number is malformed, or a face
/// corner cannot be parsed.
pub fn scan_obj<R: BufRead + ?Sized>(
    source: &mut R,
    options: &ReadOptions,
    warnings: &mut Warnings<'_>,
) -> IoResult<ObjScan> {
    let mut scanner = Scanner {
        scan: ObjScan::default(),
        format: options.number_format,
        active_material: None,
        skipped_polygons: 0,
    };

    let mut line = String::new();
    let mut line_no = 0;
    loop {
        line.clear();
        if source.read_line(&mut line)? == 0 {
            break;
        }
        line_no += 1;
        scanner.statement(&line, line_no, options, warnings)?;
    }

    if scanner.skipped_polygons > 0 {
        debug!(count = scanner.skipped_polygons, "skipped non-triangle OBJ faces");
    }
    Ok(scanner.scan)
}

struct Scanner {
    scan: ObjScan,
    format: NumberFormat,
    active_material: Option<(usize, String)>,
    skipped_polygons: usize,
}

impl Scanner {
    fn statement(
        &mut self,
        line: &str,
        line_no: usize,
        options: &ReadOptions,
        warnings: &mut Warnings<'_>,
    ) -> IoResult<()> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&keyword) = tokens.first() else {
            return Ok(());
        };
        let context = || Some(WarningContext::line(line_no));
        let format = self.format;

        match keyword {
            "v" => match tokens.len() {
                4 | 5 => {
                    self.push_position(&tokens, format)?;
                    self.scan.colors.push(None);
                }
                7 => {
                    self.push_position(&tokens, format)?;
                    self.scan.colors.push(Some([
                        format.parse_f32(tokens[4])?,
                        format.parse_f32(tokens[5])?,
                        format.parse_f32(tokens[6])?,
                    ]));
                    self.scan.has_per_vertex_colors = true;
                }
                n => warnings.emit_repeated(
                    "obj-vertex",
                    format!("vertex with {} values ignored", n - 1),
                    context(),
                ),
            },
            "vn" => {
                if tokens.len() >= 4 {
                    self.scan.normals.push([
                        format.parse_f32(tokens[1])?,
                        format.parse_f32(tokens[2])?,
                        format.parse_f32(tokens[3])?,
                    ]);
                } else {
                    warnings.emit_repeated("obj-normal", "normal with missing values ignored", context());
                }
            }
            "vt" => {
                let components = tokens.len() - 1;
                self.scan.uv_dimension = self.scan.uv_dimension.max(components);
                if components == 2 {
                    self.scan
                        .uvs
                        .push([format.parse_f32(tokens[1])?, format.parse_f32(tokens[2])?]);
                } else {
                    warnings.emit_repeated(
                        "obj-uv",
                        format!("UV with {components} coordinates ignored, expected 2"),
                        context(),
                    );
                }
            }
            "f" => {
                if tokens.len() == 4 {
                    self.push_triangle(&tokens[1..])?;
                } else {
                    self.skipped_polygons += 1;
                }
            }
            "mtllib" if options.read_materials => {
                self.load_libraries(&tokens[1..], options, line_no, warnings);
            }
            "usemtl" if options.read_materials => {
                let name = tokens.get(1).copied().unwrap_or_default();
                match self.scan.library.get(name) {
                    Some(material) => {
                        self.active_material = Some((material.id, material.name.clone()));
                    }
                    None => warnings.emit_repeated(
                        "obj-usemtl",
                        format!("unknown material {name} referenced"),
                        context(),
                    ),
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn push_position(&mut self, tokens: &[&str], format: NumberFormat) -> IoResult<()> {
        self.scan.positions.push([
            format.parse_f64(tokens[1])?,
            format.parse_f64(tokens[2])?,
            format.parse_f64(tokens[3])?,
        ]);
        Ok(())
    }

    fn push_triangle(&mut self, corners: &[&str]) -> IoResult<()> {
        let mut parsed = [Corner {
            position: 0,
            normal: None,
            uv: None,
        }; 3];
        for (slot, token) in parsed.iter_mut().zip(corners) {
            *slot = self.parse_corner(token)?;
        }

        let material = self.active_material.as_ref().map(|(id, name)| {
            if !self.scan.used_materials.iter().any(|(used, _)| used == id) {
                self.scan.used_materials.push((*id, name.clone()));
            }
            *id
        });
        if parsed.iter().any(Corner::is_complex) {
            self.scan.has_complex_vertices = true;
        }
        self.scan.triangles.push(ObjTriangle {
            corners: parsed,
            material,
        });
        Ok(())
    }

    /// `v`, `v/t`, `v//n` or `v/t/n`.
    fn parse_corner(&self, token: &str) -> IoResult<Corner> {
        let parts: Vec<&str> = token.split('/').collect();
        let (position, uv, normal) = match parts[..] {
            [v] => (v, None, None),
            [v, t] => (v, Some(t), None),
            [v, "", n] => (v, None, Some(n)),
            [v, t, n] => (v, Some(t), Some(n)),
            _ => {
                return Err(IoError::parsing(format!(
                    "unexpected face component {token}"
                )));
            }
        };
        Ok(Corner {
            position: self.resolve(position, self.scan.positions.len())?,
            normal: normal
                .map(|n| self.resolve(n, self.scan.normals.len()))
                .transpose()?,
            uv: uv.map(|t| self.resolve(t, self.scan.uvs.len())).transpose()?,
        })
    }

    /// Convert a 1-based or negative (relative) index to 0-based.
    fn resolve(&self, token: &str, count: usize) -> IoResult<u32> {
        let index: i64 = self.format.parse_int(token)?;
        let resolved = match index {
            0 => None,
            i if i > 0 => Some(i - 1),
            i => i64::try_from(count).ok().map(|c| c + i).filter(|&r| r >= 0),
        };
        resolved
            .and_then(|r| u32::try_from(r).ok())
            .ok_or_else(|| IoError::parsing(format!("invalid face index {token}")))
    }

    fn load_libraries(
        &mut self,
        files: &[&str],
        options: &ReadOptions,
        line_no: usize,
        warnings: &mut Warnings<'_>,
    ) {
        if options.material_search_paths.is_empty() {
            warnings.emit(
                "materials requested but no material search paths are set",
                Some(WarningContext::line(line_no)),
            );
        }
        for file in files {
            let Some(path) = find_library(file, &options.material_search_paths) else {
                warnings.emit(
                    format!("material file {file} could not be found in material search paths"),
                    Some(WarningContext::line(line_no)),
                );
                continue;
            };
            if let Err(e) = self.scan.library.read_file(&path, self.format, warnings) {
                warnings.emit(
                    format!("error parsing material file: {e}"),
                    Some(WarningContext::path(&path)),
                );
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn scan(text: &str) -> (IoResult<ObjScan>, usize) {
        let mut warnings = Warnings::silent();
        let result = scan_obj(
            &mut Cursor::new(text.as_bytes()),
            &ReadOptions::default(),
            &mut warnings,
        );
        (result, warnings.emitted())
    }

    #[test]
    fn face_grammars() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvt 1 0\nvt 0 1\nvn 0 0 1\n\
                    f 1 2 3\nf 1//1 2//1 3//1\nf 1/1 2/2 3/3\nf 1/1/1 2/2/1 3/3/1\n";
        let (result, warnings) = scan(text);
        let scan = result.unwrap();
        assert_eq!(warnings, 0);
        let t = scan.triangles();
        assert_eq!(t.len(), 4);
        assert_eq!(t[0].corners[2], Corner { position: 2, normal: None, uv: None });
        assert_eq!(t[1].corners[1].normal, Some(0));
        assert_eq!(t[2].corners[1].uv, Some(1));
        assert_eq!(t[3].corners[2], Corner { position: 2, normal: Some(0), uv: Some(2) });
        assert!(scan.has_complex_vertices());
    }

    #[test]
    fn aligned_indices_are_not_complex() {
        let (result, _) = scan("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1/1/1 2/2/2 3/3/3\n");
        assert!(!result.unwrap().has_complex_vertices());
    }

    #[test]
    fn negative_indices_are_relative() {
        let (result, _) = scan("v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\nv 1 1 0\nf -3 -2 -1\n");
        let scan = result.unwrap();
        assert_eq!(scan.triangles()[0].corners.map(|c| c.position), [0, 1, 2]);
        assert_eq!(scan.triangles()[1].corners.map(|c| c.position), [1, 2, 3]);
    }

    #[test]
    fn zero_index_is_rejected() {
        let (result, _) = scan("v 0 0 0\nf 0 1 1\n");
        assert!(matches!(result.unwrap_err(), IoError::FileParsing { .. }));
        let (result, _) = scan("v 0 0 0\nf 1/2/3/4 1 1\n");
        assert!(matches!(result.unwrap_err(), IoError::FileParsing { .. }));
    }

    #[test]
    fn vertex_colors_and_uv_dimension() {
        let (result, warnings) =
            scan("v 0 0 0 1 0 0\nv 1 0 0 0 1 0\nv 0 1 0 0 0 1\nvt 0 0 0\nv 1 1\nf 1 2 3\nf 1 2 3 1\n");
        let scan = result.unwrap();
        assert!(scan.has_per_vertex_colors());
        assert_eq!(scan.uv_dimension(), 3);
        assert_eq!(scan.uvs.len(), 0);
        assert_eq!(scan.colors[1], Some([0.0, 1.0, 0.0]));
        assert_eq!(scan.triangles().len(), 1);
        assert_eq!(warnings, 2);
    }

    #[test]
    fn colors_stay_aligned_with_positions() {
        let (result, _) = scan("v 0 0 0\nv 1 0 0 0 1 0\nv 0 1 0 1.0\n");
        let scan = result.unwrap();
        assert_eq!(scan.colors, vec![None, Some([0.0, 1.0, 0.0]), None]);
    }

    #[test]
    fn unknown_material_keeps_active() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("m.mtl"), "newmtl red\nKd 1 0 0\n").unwrap();
        let options = ReadOptions::default().with_search_path(dir.path());
        let text = "mtllib m.mtl missing.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\n\
                    usemtl red\nf 1 2 3\nusemtl blue\nf 1 2 3\n";
        let mut warnings = Warnings::silent();
        let scan = scan_obj(&mut Cursor::new(text.as_bytes()), &options, &mut warnings).unwrap();
        assert_eq!(warnings.emitted(), 2);
        assert_eq!(scan.used_materials(), &[(0, "red".to_string())]);
        assert!(scan.triangles().iter().all(|t| t.material == Some(0)));
    }

    #[test]
    fn materials_disabled() {
        let options = ReadOptions::without_materials();
        let text = "mtllib m.mtl\nusemtl red\nv 0 0 0\nf 1 1 1\n";
        let mut warnings = Warnings::silent();
        let scan = scan_obj(&mut Cursor::new(text.as_bytes()), &options, &mut warnings).unwrap();
        assert_eq!(warnings.emitted(), 0);
        assert!(scan.used_materials().is_empty());
    }
}
