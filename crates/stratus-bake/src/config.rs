//! RON scene files for the command-line driver.

use std::path::Path;

use serde::{Deserialize, Serialize};
use stratus_core::params::SceneParameterSnapshot;
use stratus_core::settings::RenderSettings;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read scene file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse scene RON: {0}")]
    Parse(String),
}

/// One scene plus the settings to render it with. Missing fields take the
/// defaults, so a file only needs the values it changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneFile {
    pub scene: SceneParameterSnapshot,
    pub render: RenderSettings,
}

pub fn parse_scene(ron_str: &str) -> Result<SceneFile, ConfigError> {
    let options = ron::Options::default();
    options
        .from_str(ron_str)
        .map_err(|e| ConfigError::Parse(e.to_string()))
}

pub fn load_scene(path: &Path) -> Result<SceneFile, ConfigError> {
    let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_scene(&source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_core::output::OutputFormat;
    use stratus_core::params::CloudLayer;

    const DEFAULT_SCENE: &str = include_str!("../../../data/scenes/default.ron");

    #[test]
    fn test_default_scene_parses() {
        let file = parse_scene(DEFAULT_SCENE).expect("default scene");
        assert!((file.scene.sun.elevation - 0.1745).abs() < 1e-6);
        assert!(!file.scene.moon.enabled.render);
        assert!(file.scene.moon.enabled.viewport);
        assert_eq!(file.render.frame_end, 24);
        assert_eq!(file.render.output.format, OutputFormat::OpenExr);
        assert!(file.render.validate().is_ok());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let file = parse_scene("(scene: (sun: (intensity: 3.0)))").expect("partial scene");
        assert_eq!(file.scene.sun.intensity, 3.0);
        assert_eq!(file.scene.sun.angular_size, 0.545f32.to_radians());
        assert_eq!(file.scene.clouds.layers[1], CloudLayer::low_deck());
        assert_eq!(file.render, RenderSettings::default());

        assert_eq!(parse_scene("()").expect("empty scene"), SceneFile::default());
    }

    #[test]
    fn test_bad_ron_is_parse_error() {
        let result = parse_scene("(scene: (sun: (intensity: \"bright\")))");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = load_scene(Path::new("/nonexistent/stratus/scene.ron"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
