use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::analysis::waveform::DEFAULT_COLUMNS;
use crate::render::ColorMap;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub visual: VisualConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlaybackConfig {
    /// Output device name; the host default when unset
    #[serde(default)]
    pub device: Option<String>,
    /// Fixed device buffer in frames; driver default when unset
    #[serde(default)]
    pub buffer_frames: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct VisualConfig {
    #[serde(default = "default_waveform_columns")]
    pub waveform_columns: usize,
    #[serde(default)]
    pub color_map: ColorMap,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            waveform_columns: default_waveform_columns(),
            color_map: ColorMap::default(),
        }
    }
}

fn default_waveform_columns() -> usize { DEFAULT_COLUMNS }

/// Explicit path, else `sonoscope.toml` in the working directory, else the
/// per-user config file.
pub fn find_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("sonoscope.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("sonoscope").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("sonoscope").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(err) => {
            log::warn!("Invalid config {}: {}", path.display(), err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_take_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.visual.waveform_columns, DEFAULT_COLUMNS);
        assert_eq!(config.visual.color_map, ColorMap::Heat);
        assert!(config.playback.device.is_none());
        assert!(config.playback.buffer_frames.is_none());
    }

    #[test]
    fn reads_all_keys() {
        let config: Config = toml::from_str(
            r#"
            [playback]
            device = "USB DAC"
            buffer_frames = 512

            [visual]
            waveform_columns = 800
            color_map = "grayscale"
            "#,
        )
        .unwrap();
        assert_eq!(config.playback.device.as_deref(), Some("USB DAC"));
        assert_eq!(config.playback.buffer_frames, Some(512));
        assert_eq!(config.visual.waveform_columns, 800);
        assert_eq!(config.visual.color_map, ColorMap::Grayscale);
    }

    #[test]
    fn load_config_rejects_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[visual]\nwaveform_columns = \"many\"\n").unwrap();
        assert!(load_config(&path).is_none());
        assert!(load_config(&dir.path().join("missing.toml")).is_none());
    }

    #[test]
    fn explicit_path_wins() {
        let explicit = Path::new("/tmp/custom.toml");
        assert_eq!(find_config_path(Some(explicit)), Some(explicit.to_path_buf()));
    }
}
