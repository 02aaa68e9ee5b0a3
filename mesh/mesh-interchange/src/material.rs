//! Material records read from OBJ material libraries.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Sentinel color substituted for unsupported color encodings.
pub const UNSUPPORTED_COLOR: [f32; 3] = [1.0, 0.0, 0.0];

/// A named bundle of shading attributes.
///
/// Unset attributes are `None`; nothing is defaulted on the reader side.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Material {
    /// Unique name within one material library set.
    pub name: String,
    /// Ordinal assigned when the record was created.
    pub id: usize,

    /// Ambient color (`Ka`).
    pub ambient: Option<[f32; 3]>,
    /// Diffuse color (`Kd`).
    pub diffuse: Option<[f32; 3]>,
    /// Specular color (`Ks`).
    pub specular: Option<[f32; 3]>,
    /// Transmission filter (`Tf`).
    pub transmission: Option<[f32; 3]>,
    /// Illumination model (`illum`).
    pub illumination: Option<i32>,
    /// Opacity (`d`, or `1 - Tr`).
    pub opacity: Option<f32>,
    /// Specular exponent (`Ns`).
    pub shininess: Option<f32>,
    /// Reflection sharpness (`sharpness`).
    pub sharpness: Option<f32>,
    /// Index of refraction (`Ni`).
    pub refraction_index: Option<f32>,

    /// Texture maps.
    pub maps: TextureMaps,
}

/// Texture file references of a material.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TextureMaps {
    /// `map_Ka`
    pub ambient: Option<String>,
    /// `map_Kd`
    pub diffuse: Option<String>,
    /// `map_Ks`
    pub specular: Option<String>,
    /// `map_d`
    pub opacity: Option<String>,
    /// `map_Ns`
    pub shininess: Option<String>,
    /// `bump` / `map_bump`
    pub bump: Option<String>,
    /// `disp`
    pub displacement: Option<String>,
    /// `decal`
    pub decal: Option<String>,
}

impl Material {
    /// Create an empty material.
    #[must_use]
    pub fn new(name: impl Into<String>, id: usize) -> Self {
        Self {
            name: name.into(),
            id,
            ..Self::default()
        }
    }
}
