//! Tunables for the renderer, the lifecycle coordinator and the control panel
//!
//! Every field has a default, so a config file only needs to name the values
//! it overrides.

use crate::error::{ExtensionError, ExtensionResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtensionConfig {
    pub renderer: RendererConfig,
    pub lifecycle: LifecycleConfig,
    pub panel: PanelConfig,
}

impl ExtensionConfig {
    /// Load a config from a JSON file
    pub fn load(path: &Path) -> ExtensionResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ExtensionResult<()> {
        self.renderer.validate()?;
        self.panel.validate()
    }
}

/// Drawing and timing parameters of the trail renderer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RendererConfig {
    /// Radius of each trail dot
    pub point_radius: f64,
    /// Blur of the glow drawn around each dot
    pub glow_blur: f64,
    /// Opacity of the glow colour
    pub glow_alpha: f64,
    /// Distance between interpolated points on fast movements
    pub point_spacing: f64,
    pub frame_interval_ms: u64,
    /// How often an active renderer checks that the extension is still alive
    pub liveness_interval_ms: u64,
    pub overlay_z_index: i32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            point_radius: 8.0,
            glow_blur: 15.0,
            glow_alpha: 0.8,
            point_spacing: 4.0,
            frame_interval_ms: 16,
            liveness_interval_ms: 3000,
            overlay_z_index: 999_999,
        }
    }
}

impl RendererConfig {
    pub fn validate(&self) -> ExtensionResult<()> {
        if self.point_spacing <= 0.0 {
            return Err(ExtensionError::ConfigurationError(format!(
                "pointSpacing must be positive, got {}",
                self.point_spacing
            )));
        }
        if self.frame_interval_ms == 0 || self.liveness_interval_ms == 0 {
            return Err(ExtensionError::ConfigurationError(
                "frame and liveness intervals must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn liveness_interval(&self) -> Duration {
        Duration::from_millis(self.liveness_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LifecycleConfig {
    /// How long a liveness probe may take before the page counts as bare
    pub probe_timeout_ms: u64,
    /// Wait after injection so the new content script can attach its listeners
    pub settling_delay_ms: u64,
    pub script_file: String,
    pub stylesheet_files: Vec<String>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 500,
            settling_delay_ms: 100,
            script_file: "content.js".to_string(),
            stylesheet_files: vec!["styles.css".to_string()],
        }
    }
}

impl LifecycleConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn settling_delay(&self) -> Duration {
        Duration::from_millis(self.settling_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PanelConfig {
    pub close_delay_ms: u64,
    pub min_trail_length: u32,
    pub max_trail_length: u32,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            close_delay_ms: 100,
            min_trail_length: 5,
            max_trail_length: 100,
        }
    }
}

impl PanelConfig {
    pub fn validate(&self) -> ExtensionResult<()> {
        if self.min_trail_length == 0 || self.min_trail_length > self.max_trail_length {
            return Err(ExtensionError::ConfigurationError(format!(
                "invalid trail length range {}..={}",
                self.min_trail_length, self.max_trail_length
            )));
        }
        Ok(())
    }

    /// Fit a length into the slider range without panicking on a bad range
    pub fn clamp_trail_length(&self, trail_length: u32) -> u32 {
        trail_length.max(self.min_trail_length).min(self.max_trail_length)
    }

    pub fn close_delay(&self) -> Duration {
        Duration::from_millis(self.close_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "renderer": {{ "pointRadius": 12.0 }}, "panel": {{ "closeDelayMs": 0 }} }}"#).unwrap();

        let config = ExtensionConfig::load(file.path()).unwrap();

        assert_eq!(config.renderer.point_radius, 12.0);
        assert_eq!(config.renderer.glow_blur, 15.0);
        assert_eq!(config.panel.close_delay_ms, 0);
        assert_eq!(config.panel.max_trail_length, 100);
        assert_eq!(config.lifecycle.script_file, "content.js");
    }

    #[test]
    fn test_rejects_non_positive_spacing() {
        let mut config = ExtensionConfig::default();
        config.renderer.point_spacing = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ExtensionError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_rejects_inverted_slider_range() {
        let mut config = ExtensionConfig::default();
        config.panel.min_trail_length = 50;
        config.panel.max_trail_length = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_intervals() {
        let mut renderer = RendererConfig::default();
        renderer.frame_interval_ms = 0;
        assert!(renderer.validate().is_err());

        let mut renderer = RendererConfig::default();
        renderer.liveness_interval_ms = 0;
        assert!(renderer.validate().is_err());
    }

    #[test]
    fn test_clamp_survives_inverted_range() {
        let panel = PanelConfig {
            close_delay_ms: 0,
            min_trail_length: 50,
            max_trail_length: 10,
        };
        assert_eq!(panel.clamp_trail_length(30), 10);
        assert_eq!(PanelConfig::default().clamp_trail_length(1), 5);
    }
}
