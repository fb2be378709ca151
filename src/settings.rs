use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::renderer::vertex::MAX_TEXCOORDS;

pub const SETTINGS_FILE: &str = "deform_mesh.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeformMeshSettings {
    #[serde(default = "DeformMeshSettings::default_wireframe_color")]
    pub wireframe_color: [f32; 4],
    #[serde(default = "DeformMeshSettings::default_allow_debug_view_modes")]
    pub allow_debug_view_modes: bool,
    #[serde(default = "DeformMeshSettings::default_max_texcoords")]
    pub max_texcoords: u32,
    #[serde(default = "DeformMeshSettings::default_bounds_scale")]
    pub bounds_scale: f32,
}

impl Default for DeformMeshSettings {
    fn default() -> Self {
        Self {
            wireframe_color: Self::default_wireframe_color(),
            allow_debug_view_modes: Self::default_allow_debug_view_modes(),
            max_texcoords: Self::default_max_texcoords(),
            bounds_scale: Self::default_bounds_scale(),
        }
    }
}

impl DeformMeshSettings {
    pub fn load() -> Self {
        Self::load_from_path(SETTINGS_FILE)
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        use std::fs;

        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|err| {
                warn!(
                    "Failed to parse {:?} ({}). Falling back to default deform mesh settings.",
                    path, err
                );
                Self::default()
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Deform mesh settings file {:?} not found. Using default settings.",
                    path
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    "Failed to read {:?} ({}). Falling back to default deform mesh settings.",
                    path, err
                );
                Self::default()
            }
        }
    }

    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<DeformMeshSettings>(contents).map(Self::validate)
    }

    fn validate(mut self) -> Self {
        if self.max_texcoords == 0 || self.max_texcoords as usize > MAX_TEXCOORDS {
            let clamped = self.max_texcoords.clamp(1, MAX_TEXCOORDS as u32);
            warn!(
                "max_texcoords must be within 1..={}. Using {} instead.",
                MAX_TEXCOORDS, clamped
            );
            self.max_texcoords = clamped;
        }

        if !(self.bounds_scale.is_finite() && self.bounds_scale > 0.0) {
            warn!("bounds_scale must be positive. Using default value.");
            self.bounds_scale = Self::default_bounds_scale();
        }

        if self.wireframe_color.iter().any(|c| !c.is_finite()) {
            warn!("wireframe_color contains non-finite values. Using default colour.");
            self.wireframe_color = Self::default_wireframe_color();
        }

        self
    }

    const fn default_wireframe_color() -> [f32; 4] {
        [0.0, 0.5, 1.0, 1.0]
    }

    const fn default_allow_debug_view_modes() -> bool {
        true
    }

    const fn default_max_texcoords() -> u32 {
        4
    }

    const fn default_bounds_scale() -> f32 {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let settings = DeformMeshSettings::from_json("{}").unwrap();
        assert_eq!(settings, DeformMeshSettings::default());
    }

    #[test]
    fn validate_replaces_invalid_values() {
        let settings =
            DeformMeshSettings::from_json(r#"{ "max_texcoords": 32, "bounds_scale": -2.0 }"#)
                .unwrap();
        assert_eq!(settings.max_texcoords, MAX_TEXCOORDS as u32);
        assert_eq!(settings.bounds_scale, 1.0);

        let settings = DeformMeshSettings::from_json(r#"{ "max_texcoords": 0 }"#).unwrap();
        assert_eq!(settings.max_texcoords, 1);
    }

    #[test]
    fn validate_preserves_valid_values() {
        let settings = DeformMeshSettings::from_json(
            r#"{ "wireframe_color": [1.0, 0.0, 0.0, 1.0], "allow_debug_view_modes": false, "max_texcoords": 2, "bounds_scale": 1.5 }"#,
        )
        .unwrap();
        assert_eq!(settings.wireframe_color, [1.0, 0.0, 0.0, 1.0]);
        assert!(!settings.allow_debug_view_modes);
        assert_eq!(settings.max_texcoords, 2);
        assert_eq!(settings.bounds_scale, 1.5);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = DeformMeshSettings::load_from_path("does/not/exist.json");
        assert_eq!(settings, DeformMeshSettings::default());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(DeformMeshSettings::from_json("{ not json").is_err());
    }
}
