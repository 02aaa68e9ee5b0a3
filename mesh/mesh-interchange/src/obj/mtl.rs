//! Wavefront material library (`.mtl`) parsing.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use hashbrown::HashMap;
use tracing::debug;

use crate::error::{IoError, IoResult};
use crate::material::{Material, UNSUPPORTED_COLOR};
use crate::number::NumberFormat;
use crate::warnings::{WarningContext, Warnings};

/// Materials known to one OBJ read, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct MaterialLibrary {
    materials: HashMap<String, Material>,
    next_id: usize,
}

impl MaterialLibrary {
    /// Empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Material by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Material> {
        self.materials.get(name)
    }

    /// Number of materials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    /// Whether the library is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Start a new material record and return its name key.
    fn create(&mut self, name: &str, source: &Path, warnings: &mut Warnings<'_>) -> String {
        let material = Material::new(name, self.next_id);
        self.next_id += 1;
        if self.materials.insert(name.to_string(), material).is_some() {
            warnings.emit(
                format!("material {name} already exists in material set, replacing"),
                Some(WarningContext::path(source)),
            );
        }
        name.to_string()
    }

    /// Parse a material library from `reader` into this library.
    ///
    /// `source` only labels warnings.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or a numeric statement is malformed.
    pub fn parse<R: BufRead>(
        &mut self,
        reader: R,
        source: &Path,
        format: NumberFormat,
        warnings: &mut Warnings<'_>,
    ) -> IoResult<()> {
        let mut current: Option<String> = None;

        for line in reader.lines() {
            let line = line?;
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let Some(&keyword) = tokens.first() else {
                continue;
            };
            if keyword.starts_with('#') {
                continue;
            }

            if keyword == "newmtl" {
                let name = tokens.get(1).copied().unwrap_or_default();
                current = Some(self.create(name, source, warnings));
                continue;
            }

            // Statements before the first newmtl have no target.
            let Some(material) = current.as_ref().and_then(|n| self.materials.get_mut(n)) else {
                continue;
            };
            let arg = |i: usize| {
                tokens
                    .get(i)
                    .copied()
                    .ok_or_else(|| IoError::parsing(format!("{keyword} statement is missing a value")))
            };

            match keyword {
                "Ka" => material.ambient = Some(parse_color(&tokens, format, source, warnings)?),
                "Kd" => material.diffuse = Some(parse_color(&tokens, format, source, warnings)?),
                "Ks" => material.specular = Some(parse_color(&tokens, format, source, warnings)?),
                "Tf" => {
                    material.transmission = Some(parse_color(&tokens, format, source, warnings)?);
                }
                "illum" => material.illumination = Some(format.parse_int(arg(1)?)?),
                "d" => material.opacity = Some(format.parse_f32(arg(1)?)?),
                "Tr" => material.opacity = Some(1.0 - format.parse_f32(arg(1)?)?),
                "Ns" => material.shininess = Some(format.parse_f32(arg(1)?)?),
                "sharpness" => material.sharpness = Some(format.parse_f32(arg(1)?)?),
                "Ni" => material.refraction_index = Some(format.parse_f32(arg(1)?)?),
                "map_Ka" => material.maps.ambient = map_file(&tokens),
                "map_Kd" => material.maps.diffuse = map_file(&tokens),
                "map_Ks" => material.maps.specular = map_file(&tokens),
                "map_d" => material.maps.opacity = map_file(&tokens),
                "map_Ns" => material.maps.shininess = map_file(&tokens),
                "bump" | "map_bump" => material.maps.bump = map_file(&tokens),
                "disp" => material.maps.displacement = map_file(&tokens),
                "decal" => material.maps.decal = map_file(&tokens),
                _ => warnings.emit_repeated(
                    "mtl-command",
                    format!("unknown material command {keyword}"),
                    Some(WarningContext::path(source)),
                ),
            }
        }
        debug!(path = %source.display(), materials = self.len(), "read material library");
        Ok(())
    }

    /// Read the library file at `path`.
    ///
    /// # Errors
    ///
    /// [`IoError::FileAccess`] if the file cannot be opened, otherwise as
    /// [`parse`](Self::parse).
    pub fn read_file(
        &mut self,
        path: &Path,
        format: NumberFormat,
        warnings: &mut Warnings<'_>,
    ) -> IoResult<()> {
        let file = File::open(path).map_err(|e| IoError::access(path, &e))?;
        self.parse(BufReader::new(file), path, format, warnings)
    }
}

/// First existing `search_dir/file` in search order.
pub fn find_library(file: &str, search_paths: &[PathBuf]) -> Option<PathBuf> {
    search_paths
        .iter()
        .map(|dir| dir.join(file))
        .find(|candidate| candidate.is_file())
}

/// Parse `K? r g b`. A single component is grey. `spectral` and `xyz`
/// colors are not supported and read as [`UNSUPPORTED_COLOR`].
fn parse_color(
    tokens: &[&str],
    format: NumberFormat,
    source: &Path,
    warnings: &mut Warnings<'_>,
) -> IoResult<[f32; 3]> {
    match tokens.get(1..).unwrap_or_default() {
        [kind @ ("spectral" | "xyz"), ..] => {
            warnings.emit(
                format!("{kind} material colors are not supported"),
                Some(WarningContext::path(source)),
            );
            Ok(UNSUPPORTED_COLOR)
        }
        [r, g, b, ..] => Ok([
            format.parse_f32(r)?,
            format.parse_f32(g)?,
            format.parse_f32(b)?,
        ]),
        [grey] => {
            let grey = format.parse_f32(grey)?;
            Ok([grey; 3])
        }
        _ => Err(IoError::parsing(format!(
            "malformed color statement: {}",
            tokens.join(" ")
        ))),
    }
}

/// Texture file of a map statement; options precede it, so it is the last
/// token.
fn map_file(tokens: &[&str]) -> Option<String> {
    tokens.get(1..)?.last().map(|s| (*s).to_string())
}
