use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use thiserror::Error;

pub const LOCATOR_PLACEHOLDER: &str = "{index}";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    pub page_count: usize,
    pub locator_pattern: String,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "transition_delay_ms")]
    pub transition_delay: Duration,
    /// Number of spreads on each side of the current one to decode ahead of time.
    pub prefetch_spreads: usize,
    /// Longest edge, in pixels, a decoded page is downsampled to.
    pub max_image_edge: u32,
    pub cache_capacity: usize,
    pub layout: LayoutConfig,
    pub zoom: ZoomConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            page_count: 91,
            locator_pattern: format!("/images/full-{}.jpg", LOCATOR_PLACEHOLDER),
            transition_delay: Duration::from_millis(600),
            prefetch_spreads: 1,
            max_image_edge: 1600,
            cache_capacity: 12,
            layout: LayoutConfig::default(),
            zoom: ZoomConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    pub max_width: f32,
    pub margin: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            max_width: 900.0,
            margin: 40.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ZoomConfig {
    pub step: f32,
    pub min: f32,
    pub max: f32,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            step: 1.25,
            min: 1.0,
            max: 8.0,
        }
    }
}

impl ViewerConfig {
    pub fn from_toml_str(raw: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: ViewerConfig = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw, path)
    }

    /// Loads `path` when it exists and falls back to defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.locator_pattern.contains(LOCATOR_PLACEHOLDER) {
            return Err(ConfigError::Invalid(format!(
                "locator_pattern {:?} must contain {}",
                self.locator_pattern, LOCATOR_PLACEHOLDER
            )));
        }
        if !(self.layout.max_width.is_finite() && self.layout.max_width > 0.0) {
            return Err(ConfigError::Invalid(
                "layout.max_width must be a positive number".into(),
            ));
        }
        if !(self.layout.margin.is_finite() && self.layout.margin >= 0.0) {
            return Err(ConfigError::Invalid(
                "layout.margin must not be negative".into(),
            ));
        }
        if !(self.zoom.step.is_finite() && self.zoom.step > 1.0) {
            return Err(ConfigError::Invalid("zoom.step must be above 1.0".into()));
        }
        if !(self.zoom.min > 0.0 && self.zoom.min <= self.zoom.max && self.zoom.max.is_finite()) {
            return Err(ConfigError::Invalid(
                "zoom.min must be positive and not above zoom.max".into(),
            ));
        }
        if self.max_image_edge == 0 {
            return Err(ConfigError::Invalid("max_image_edge must be non-zero".into()));
        }
        Ok(())
    }
}
