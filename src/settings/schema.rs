//! Persisted settings and their storage keys

use crate::error::{ExtensionError, ExtensionResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

pub const ENABLED_KEY: &str = "laserEnabled";
pub const COLOR_KEY: &str = "laserColor";
pub const TRAIL_LENGTH_KEY: &str = "trailLength";

pub const SETTINGS_KEYS: [&str; 3] = [ENABLED_KEY, COLOR_KEY, TRAIL_LENGTH_KEY];

pub const DEFAULT_TRAIL_LENGTH: u32 = 40;

/// Longer trails fade slower: fade rate is this divided by the trail length
pub const FADE_NUMERATOR: f64 = 0.8;

/// An opaque sRGB colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const RED: Rgb = Rgb { r: 255, g: 0, b: 0 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` (the `#` is optional, digits are case-insensitive)
    pub fn parse_hex(input: &str) -> ExtensionResult<Self> {
        let digits = input.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ExtensionError::InvalidColor(input.to_string()));
        }
        let value = u32::from_str_radix(digits, 16)
            .map_err(|_| ExtensionError::InvalidColor(input.to_string()))?;
        Ok(Self {
            r: ((value >> 16) & 0xff) as u8,
            g: ((value >> 8) & 0xff) as u8,
            b: (value & 0xff) as u8,
        })
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn with_alpha(self, alpha: f64) -> Rgba {
        Rgba { rgb: self, alpha }
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::RED
    }
}

impl FromStr for Rgb {
    type Err = ExtensionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_hex(s)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A colour with opacity, as used for fill and glow
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub rgb: Rgb,
    pub alpha: f64,
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rgba({}, {}, {}, {})",
            self.rgb.r, self.rgb.g, self.rgb.b, self.alpha
        )
    }
}

/// Per-frame alpha decrement for a given trail length
pub fn fade_rate(trail_length: u32) -> ExtensionResult<f64> {
    if trail_length == 0 {
        return Err(ExtensionError::InvalidTrailLength(trail_length));
    }
    Ok(FADE_NUMERATOR / trail_length as f64)
}

/// User settings as stored in the local storage area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub enabled: bool,
    pub color: Rgb,
    pub trail_length: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: false,
            color: Rgb::RED,
            trail_length: DEFAULT_TRAIL_LENGTH,
        }
    }
}

impl Settings {
    /// Build settings from raw storage values, falling back to defaults for
    /// anything missing or malformed
    pub fn from_values(values: &Map<String, Value>) -> Self {
        let defaults = Self::default();

        let enabled = values
            .get(ENABLED_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(defaults.enabled);

        let color = match values.get(COLOR_KEY).and_then(Value::as_str) {
            Some(hex) => Rgb::parse_hex(hex).unwrap_or_else(|e| {
                tracing::warn!("Ignoring stored color: {}", e);
                defaults.color
            }),
            None => defaults.color,
        };

        // Zero and non-integers fall back like a missing value
        let trail_length = values
            .get(TRAIL_LENGTH_KEY)
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.trail_length);

        Self {
            enabled,
            color,
            trail_length,
        }
    }

    pub fn to_values(&self) -> Map<String, Value> {
        let mut values = Map::new();
        values.insert(ENABLED_KEY.to_string(), Value::Bool(self.enabled));
        values.insert(COLOR_KEY.to_string(), Value::String(self.color.to_hex()));
        values.insert(TRAIL_LENGTH_KEY.to_string(), Value::from(self.trail_length));
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_hex_primaries() {
        assert_eq!(Rgb::parse_hex("#ff0000").unwrap(), Rgb::new(255, 0, 0));
        assert_eq!(Rgb::parse_hex("#00ff00").unwrap(), Rgb::new(0, 255, 0));
        assert_eq!(Rgb::parse_hex("0000FF").unwrap(), Rgb::new(0, 0, 255));
    }

    #[test]
    fn test_parse_hex_rejects_malformed() {
        for bad in ["", "#", "#fff", "#ff00000", "#gg0000", "red"] {
            assert!(
                matches!(Rgb::parse_hex(bad), Err(ExtensionError::InvalidColor(_))),
                "{:?} should not parse",
                bad
            );
        }
    }

    #[test]
    fn test_hex_formatting() {
        assert_eq!(Rgb::new(18, 52, 171).to_hex(), "#1234ab");
        assert_eq!("#1234AB".parse::<Rgb>().unwrap().to_string(), "#1234ab");
    }

    #[test]
    fn test_rgba_css() {
        assert_eq!(Rgb::RED.with_alpha(0.5).to_string(), "rgba(255, 0, 0, 0.5)");
    }

    #[test]
    fn test_fade_rate() {
        assert!((fade_rate(40).unwrap() - 0.02).abs() < 1e-12);
        assert!((fade_rate(10).unwrap() - 0.08).abs() < 1e-12);
        assert!(matches!(
            fade_rate(0),
            Err(ExtensionError::InvalidTrailLength(0))
        ));
    }

    #[test]
    fn test_settings_from_empty_store() {
        assert_eq!(Settings::from_values(&Map::new()), Settings::default());
    }

    #[test]
    fn test_settings_from_values_falls_back_on_garbage() {
        let values = json!({
            "laserEnabled": true,
            "laserColor": "not a colour",
            "trailLength": 0
        });
        let settings = Settings::from_values(values.as_object().unwrap());

        assert!(settings.enabled);
        assert_eq!(settings.color, Rgb::RED);
        assert_eq!(settings.trail_length, DEFAULT_TRAIL_LENGTH);
    }

    #[test]
    fn test_settings_value_keys() {
        let settings = Settings {
            enabled: true,
            color: Rgb::new(0, 128, 255),
            trail_length: 25,
        };
        let values = settings.to_values();

        assert_eq!(values[ENABLED_KEY], json!(true));
        assert_eq!(values[COLOR_KEY], json!("#0080ff"));
        assert_eq!(values[TRAIL_LENGTH_KEY], json!(25));
        assert_eq!(Settings::from_values(&values), settings);
    }
}
