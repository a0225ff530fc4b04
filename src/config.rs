//! Game configuration
//!
//! Parsed from JSON handed over by the host page, or persisted in
//! LocalStorage between sessions.

use serde::{Deserialize, Serialize};

use crate::consts::{FIXED_STEP_MS, MAX_LOOP_DURATION_MS};
use crate::error::{EngineError, EngineResult};
use crate::scene::Camera;

/// A layer to create when the game starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerConfig {
    pub name: String,
    #[serde(default)]
    pub z_index: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GameConfig {
    /// Logical size of every layer, in pixels
    pub width: u32,
    pub height: u32,
    /// Pixel density divisor applied to layers
    pub scale: f32,
    /// Largest backlog the loop will catch up on after a stall
    pub max_loop_duration_ms: f64,
    pub fixed_step_ms: f64,
    pub layers: Vec<LayerConfig>,
    /// Outline hit bounds and show the FPS overlay
    pub debug: bool,
    pub camera: Camera,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            scale: 1.0,
            max_loop_duration_ms: MAX_LOOP_DURATION_MS,
            fixed_step_ms: FIXED_STEP_MS,
            layers: Vec::new(),
            debug: false,
            camera: Camera::default(),
        }
    }
}

impl GameConfig {
    /// LocalStorage key
    const STORAGE_KEY: &'static str = "blocks_canvas_config";

    pub fn from_json(json: &str) -> EngineResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(EngineError::config(format!(
                "game size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.scale <= 0.0 {
            return Err(EngineError::config(format!(
                "scale must be positive, got {}",
                self.scale
            )));
        }
        if self.fixed_step_ms <= 0.0 {
            return Err(EngineError::config("fixed step must be positive"));
        }
        if self.max_loop_duration_ms < self.fixed_step_ms {
            return Err(EngineError::config(format!(
                "max loop duration {}ms is shorter than one step ({}ms)",
                self.max_loop_duration_ms, self.fixed_step_ms
            )));
        }
        Ok(())
    }

    /// Load the config from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage
            && let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY)
        {
            match Self::from_json(&json) {
                Ok(config) => {
                    log::info!("Loaded config from LocalStorage");
                    return config;
                }
                Err(e) => log::warn!("Ignoring stored config: {e}"),
            }
        }

        log::info!("Using default config");
        Self::default()
    }

    /// Save the config to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage
            && let Ok(json) = self.to_json()
        {
            let _ = storage.set_item(Self::STORAGE_KEY, &json);
            log::info!("Config saved");
        }
    }

    /// Native stubs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        log::debug!("No storage for '{}' on native", Self::STORAGE_KEY);
        Self::default()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {
        // No-op for native
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = GameConfig::from_json(
            r#"{"width": 320, "height": 240, "layers": [{"name": "bg"}, {"name": "hud", "zIndex": 5}]}"#,
        )
        .unwrap();
        assert_eq!(config.width, 320);
        assert_eq!(config.max_loop_duration_ms, 500.0);
        assert_eq!(config.layers[1].z_index, 5);
        assert_eq!(config.layers[0].z_index, 0);
        assert!(!config.debug);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(matches!(
            GameConfig::from_json(r#"{"width": 0}"#),
            Err(EngineError::Config(_))
        ));
        assert!(matches!(
            GameConfig::from_json(r#"{"maxLoopDurationMs": 1.0}"#),
            Err(EngineError::Config(_))
        ));
        assert!(matches!(
            GameConfig::from_json("not json"),
            Err(EngineError::Serde(_))
        ));
    }

    #[test]
    fn test_round_trips_through_json() {
        let config = GameConfig {
            debug: true,
            ..Default::default()
        };
        let back = GameConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }
}
