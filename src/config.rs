use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::detection::{TiltStrategy, MAX_TILT_LIMIT};
use crate::emit::STORE_ICON_SIZE;
use crate::error::{IconError, Result};
use crate::transform::DEFAULT_ROTATION_TOLERANCE;

/// A named launcher icon size matching a device pixel-density class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DensityBucket {
    pub label: String,
    pub size: u32,
}

impl DensityBucket {
    pub fn new(label: impl Into<String>, size: u32) -> Self {
        Self {
            label: label.into(),
            size,
        }
    }

    /// Standard Android launcher densities, mdpi through xxxhdpi
    pub fn android_defaults() -> Vec<Self> {
        vec![
            Self::new("mdpi", 48),
            Self::new("hdpi", 72),
            Self::new("xhdpi", 96),
            Self::new("xxhdpi", 144),
            Self::new("xxxhdpi", 192),
        ]
    }
}

impl FromStr for DensityBucket {
    type Err = String;

    /// Parse `label=size`, e.g. `xhdpi=96`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (label, size) = s
            .split_once('=')
            .ok_or_else(|| format!("Invalid bucket '{}', expected LABEL=SIZE", s))?;

        let label = label.trim();
        if label.is_empty() {
            return Err(format!("Invalid bucket '{}': label is empty", s));
        }

        let size: u32 = size
            .trim()
            .parse()
            .map_err(|_| format!("Invalid bucket size: {}", size))?;
        if size == 0 {
            return Err("Bucket size must be positive".to_string());
        }

        Ok(Self::new(label, size))
    }
}

/// Day or night theme variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Day,
    Night,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Day => "day",
            Theme::Night => "night",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One theme's source image and output naming
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeVariant {
    pub theme: Theme,
    pub source: PathBuf,
    /// Base name for the corrected and store images [default: ic_genesis_<theme>]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

impl ThemeVariant {
    pub fn new(theme: Theme, source: impl Into<PathBuf>) -> Self {
        Self {
            theme,
            source: source.into(),
            prefix: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn prefix(&self) -> String {
        self.prefix
            .clone()
            .unwrap_or_else(|| format!("ic_genesis_{}", self.theme))
    }
}

/// Everything the pipeline needs to know, passed in explicitly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Processed in order; each variant is independent of the others
    pub themes: Vec<ThemeVariant>,
    /// Corrected full-resolution images and per-theme density roots live here
    pub res_dir: PathBuf,
    /// Store icons are written here
    pub store_dir: PathBuf,
    pub buckets: Vec<DensityBucket>,
    /// File stem shared by every density bucket
    pub launcher_name: String,
    pub store_size: u32,
    pub tilt: TiltStrategy,
    /// Corrections smaller than this (degrees) are skipped
    pub rotation_tolerance: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            themes: Vec::new(),
            res_dir: PathBuf::from("res"),
            store_dir: PathBuf::from("."),
            buckets: DensityBucket::android_defaults(),
            launcher_name: "ic_launcher".to_string(),
            store_size: STORE_ICON_SIZE,
            tilt: TiltStrategy::default(),
            rotation_tolerance: DEFAULT_ROTATION_TOLERANCE,
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            IconError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            IconError::InvalidConfig(format!("cannot parse {}: {}", path.display(), e))
        })
    }

    /// Check the invariants the pipeline relies on
    pub fn validate(&self) -> Result<()> {
        let mut labels = HashSet::new();
        for bucket in &self.buckets {
            if bucket.label.is_empty() {
                return Err(IconError::InvalidConfig("bucket label is empty".into()));
            }
            if bucket.size == 0 {
                return Err(IconError::InvalidConfig(format!(
                    "bucket '{}' has zero size",
                    bucket.label
                )));
            }
            if !labels.insert(bucket.label.as_str()) {
                return Err(IconError::InvalidConfig(format!(
                    "duplicate bucket '{}'",
                    bucket.label
                )));
            }
        }

        if self.store_size == 0 {
            return Err(IconError::InvalidConfig("store size must be positive".into()));
        }
        if self.launcher_name.is_empty() {
            return Err(IconError::InvalidConfig("launcher name is empty".into()));
        }
        if self.rotation_tolerance.is_nan() || self.rotation_tolerance < 0.0 {
            return Err(IconError::InvalidConfig(
                "rotation tolerance must be non-negative".into(),
            ));
        }

        let (kind, degrees) = match self.tilt {
            TiltStrategy::Detect { max_degrees } => ("max detected tilt", max_degrees),
            TiltStrategy::Fixed { degrees } => ("fixed tilt", degrees),
        };
        if !degrees.is_finite() || degrees.abs() > MAX_TILT_LIMIT {
            return Err(IconError::InvalidConfig(format!(
                "{} must be within ±{} degrees, got {}",
                kind, MAX_TILT_LIMIT, degrees
            )));
        }

        let mut themes = HashSet::new();
        let mut prefixes = HashSet::new();
        for variant in &self.themes {
            if !themes.insert(variant.theme) {
                return Err(IconError::InvalidConfig(format!(
                    "theme '{}' configured twice",
                    variant.theme
                )));
            }
            if !prefixes.insert(variant.prefix()) {
                return Err(IconError::InvalidConfig(format!(
                    "themes share the output name '{}'",
                    variant.prefix()
                )));
            }
        }

        Ok(())
    }

    /// Full-resolution corrected image for a theme
    pub fn corrected_path(&self, variant: &ThemeVariant) -> PathBuf {
        self.res_dir.join(format!("{}.png", variant.prefix()))
    }

    /// Root of the `mipmap-<density>` tree for a theme
    pub fn density_root(&self, variant: &ThemeVariant) -> PathBuf {
        self.res_dir.join(format!("res-{}", variant.theme))
    }

    /// Store icon for a theme
    pub fn store_path(&self, variant: &ThemeVariant) -> PathBuf {
        self.store_dir
            .join(format!("{}_{}.png", variant.prefix(), self.store_size))
    }
}
