//! Per-frame renderer configuration
//!
//! Feature toggles and tuning knobs, passed into the frame scheduler every
//! tick rather than living as ambient globals. The viewer binary can load
//! them from a TOML file.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub culling_enabled: bool,
    pub lod_enabled: bool,
    pub occlusion_enabled: bool,
    pub cluster_occlusion_enabled: bool,
    pub cluster_backface_enabled: bool,

    /// Far cull distance in world units
    pub draw_distance: f32,
    /// Screen-space error budget for LOD selection, in pixels
    pub lod_target_pixels: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            culling_enabled: true,
            lod_enabled: true,
            occlusion_enabled: true,
            cluster_occlusion_enabled: true,
            cluster_backface_enabled: true,
            draw_distance: 200.0,
            lod_target_pixels: 1.0,
        }
    }
}

impl RenderSettings {
    pub fn from_toml_str(source: &str) -> EngineResult<Self> {
        toml::from_str(source).map_err(|e| EngineError::InvalidSettings {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_fills_defaults() {
        let settings = RenderSettings::from_toml_str("occlusion_enabled = false\n").unwrap();
        assert!(!settings.occlusion_enabled);
        assert!(settings.culling_enabled);
        assert_eq!(settings.draw_distance, 200.0);
    }

    #[test]
    fn bad_toml_is_an_error() {
        assert!(RenderSettings::from_toml_str("draw_distance = \"far\"").is_err());
    }
}
