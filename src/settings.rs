use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::history::DEFAULT_UNDO_DEPTH;
use crate::timeline::DEFAULT_PIXELS_PER_SECOND;
use crate::tool::ToolSettings;

/// Environment variable overriding [`EditorSettings::store_dir`].
pub const STORE_DIR_ENV: &str = "STORYBOARD_STORE_DIR";

pub const DEFAULT_SAVE_DEBOUNCE_MS: f64 = 1500.0;

/// Editor configuration, restored from the eframe storage between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    pub undo_depth: usize,
    /// Quiet time after the last edit before a save is queued
    pub save_debounce_ms: f64,
    pub timeline_zoom: f32,
    pub tools: ToolSettings,
    pub onion_skin: bool,
    pub store_dir: PathBuf,
    pub scene_key: String,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            undo_depth: DEFAULT_UNDO_DEPTH,
            save_debounce_ms: DEFAULT_SAVE_DEBOUNCE_MS,
            timeline_zoom: DEFAULT_PIXELS_PER_SECOND,
            tools: ToolSettings::default(),
            onion_skin: false,
            store_dir: PathBuf::from("storyboards"),
            scene_key: "scene-1".to_string(),
        }
    }
}

impl EditorSettings {
    /// Applies environment overrides on top of stored values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var(STORE_DIR_ENV) {
            if !dir.trim().is_empty() {
                log::info!("Using store directory from {STORE_DIR_ENV}: {dir}");
                self.store_dir = PathBuf::from(dir);
            }
        }
        self.undo_depth = self.undo_depth.max(1);
        self.save_debounce_ms = self.save_debounce_ms.max(0.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_take_defaults() {
        let settings: EditorSettings = serde_json::from_str(r#"{ "undo_depth": 5 }"#).unwrap();
        assert_eq!(settings.undo_depth, 5);
        assert_eq!(settings.save_debounce_ms, DEFAULT_SAVE_DEBOUNCE_MS);
        assert_eq!(settings.tools, ToolSettings::default());
    }
}
