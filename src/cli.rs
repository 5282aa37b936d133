use clap::Parser;
use std::path::PathBuf;

use crate::config::{DensityBucket, PipelineConfig, Theme, ThemeVariant};
use crate::detection::TiltStrategy;
use crate::error::{IconError, Result};

#[derive(Parser, Debug)]
#[command(name = "mipmap-forge")]
#[command(
    version,
    about = "Straighten a logo and generate launcher and store icons for day/night themes"
)]
pub struct Cli {
    /// JSON config file; flags and environment override its values
    #[arg(short, long, env = "MIPMAP_FORGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Day theme source image
    #[arg(long, env = "MIPMAP_FORGE_DAY")]
    pub day: Option<PathBuf>,

    /// Night theme source image
    #[arg(long, env = "MIPMAP_FORGE_NIGHT")]
    pub night: Option<PathBuf>,

    /// Output name for the day theme [default: ic_genesis_day]
    #[arg(long)]
    pub day_prefix: Option<String>,

    /// Output name for the night theme [default: ic_genesis_night]
    #[arg(long)]
    pub night_prefix: Option<String>,

    /// Resource directory for corrected images and density trees [default: res]
    #[arg(long, env = "MIPMAP_FORGE_RES_DIR")]
    pub res_dir: Option<PathBuf>,

    /// Directory for store icons [default: .]
    #[arg(long, env = "MIPMAP_FORGE_STORE_DIR")]
    pub store_dir: Option<PathBuf>,

    /// Density bucket as LABEL=SIZE, repeatable [default: mdpi=48 hdpi=72 xhdpi=96 xxhdpi=144 xxxhdpi=192]
    #[arg(short, long = "bucket")]
    pub buckets: Vec<DensityBucket>,

    /// File stem for launcher icons [default: ic_launcher]
    #[arg(long)]
    pub launcher_name: Option<String>,

    /// Store icon size in pixels [default: 512]
    #[arg(long)]
    pub store_size: Option<u32>,

    /// Apply this correction in degrees (counter-clockwise, at most 10) instead of detecting tilt
    #[arg(long, allow_hyphen_values = true, conflicts_with = "max_tilt")]
    pub fixed_tilt: Option<f64>,

    /// Largest correction tilt detection may report, in degrees, at most 10 [default: 3]
    #[arg(long)]
    pub max_tilt: Option<f64>,

    /// Corrections smaller than this many degrees are skipped [default: 0.1]
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Show detection details
    #[arg(long)]
    pub verbose: bool,
}

impl Cli {
    /// Merge the config file (if any) with flags into a validated pipeline config
    pub fn to_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };

        set_theme(
            &mut config.themes,
            Theme::Night,
            self.night.as_ref(),
            self.night_prefix.as_ref(),
        );
        set_theme(
            &mut config.themes,
            Theme::Day,
            self.day.as_ref(),
            self.day_prefix.as_ref(),
        );

        if let Some(dir) = &self.res_dir {
            config.res_dir = dir.clone();
        }
        if let Some(dir) = &self.store_dir {
            config.store_dir = dir.clone();
        }
        if !self.buckets.is_empty() {
            config.buckets = self.buckets.clone();
        }
        if let Some(name) = &self.launcher_name {
            config.launcher_name = name.clone();
        }
        if let Some(size) = self.store_size {
            config.store_size = size;
        }
        if let Some(degrees) = self.fixed_tilt {
            config.tilt = TiltStrategy::Fixed { degrees };
        } else if let Some(max_degrees) = self.max_tilt {
            config.tilt = TiltStrategy::Detect { max_degrees };
        }
        if let Some(tolerance) = self.tolerance {
            config.rotation_tolerance = tolerance;
        }

        if config.themes.is_empty() {
            return Err(IconError::InvalidConfig(
                "no theme sources given (use --day/--night or a config file)".into(),
            ));
        }

        config.validate()?;
        Ok(config)
    }
}

/// Override or add the variant for `theme` from command-line values
fn set_theme(
    themes: &mut Vec<ThemeVariant>,
    theme: Theme,
    source: Option<&PathBuf>,
    prefix: Option<&String>,
) {
    let idx = match themes.iter().position(|v| v.theme == theme) {
        Some(idx) => idx,
        None => match source {
            Some(path) => {
                themes.push(ThemeVariant::new(theme, path.clone()));
                themes.len() - 1
            }
            None => return,
        },
    };

    let variant = &mut themes[idx];
    if let Some(path) = source {
        variant.source = path.clone();
    }
    if let Some(prefix) = prefix {
        variant.prefix = Some(prefix.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("mipmap-forge").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_flags_build_config() {
        let cli = parse(&[
            "--day",
            "day.png",
            "--night",
            "night.jpg",
            "--res-dir",
            "app/res",
            "-b",
            "mdpi=48",
            "-b",
            "hdpi=72",
            "--fixed-tilt",
            "-0.5",
        ]);
        let config = cli.to_config().unwrap();

        let order: Vec<Theme> = config.themes.iter().map(|v| v.theme).collect();
        assert_eq!(order, vec![Theme::Night, Theme::Day]);
        assert_eq!(config.res_dir, PathBuf::from("app/res"));
        assert_eq!(config.buckets.len(), 2);
        assert_eq!(config.tilt, TiltStrategy::Fixed { degrees: -0.5 });
    }

    #[test]
    fn test_defaults_apply() {
        let config = parse(&["--day", "day.png"]).to_config().unwrap();
        assert_eq!(config.buckets, DensityBucket::android_defaults());
        assert_eq!(config.store_size, 512);
        assert_eq!(config.tilt, TiltStrategy::default());
    }

    #[test]
    fn test_no_sources_is_an_error() {
        assert!(parse(&[]).to_config().is_err());
    }

    #[test]
    fn test_out_of_range_tilt_is_an_error() {
        assert!(parse(&["--day", "d.png", "--max-tilt", "90"]).to_config().is_err());
        assert!(parse(&["--day", "d.png", "--fixed-tilt", "NaN"]).to_config().is_err());
    }

    #[test]
    fn test_bad_bucket_is_rejected_by_parser() {
        let result = Cli::try_parse_from(["mipmap-forge", "--day", "d.png", "-b", "mdpi"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("icons.json");
        fs::write(
            &path,
            r#"{
                "res_dir": "from-file",
                "themes": [
                    { "theme": "day", "source": "file-day.png", "prefix": "ic_day" },
                    { "theme": "night", "source": "file-night.png" }
                ]
            }"#,
        )
        .unwrap();

        let config = parse(&[
            "--config",
            path.to_str().unwrap(),
            "--night",
            "flag-night.png",
            "--store-size",
            "256",
        ])
        .to_config()
        .unwrap();

        assert_eq!(config.res_dir, PathBuf::from("from-file"));
        assert_eq!(config.store_size, 256);
        assert_eq!(config.themes[0].prefix(), "ic_day");
        assert_eq!(config.themes[1].source, PathBuf::from("flag-night.png"));
    }
}
