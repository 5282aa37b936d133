use std::fmt;
use std::path::{Path, PathBuf};

use image::{ImageReader, RgbaImage};
use tracing::{info, info_span, warn};

use crate::config::{PipelineConfig, Theme, ThemeVariant};
use crate::detection::estimate_tilt;
use crate::emit::{emit_density_set, emit_store_icon, ensure_dir, save_png};
use crate::error::{IconError, Result};
use crate::transform::straighten;

/// Terminal state of one theme
#[derive(Debug)]
pub enum ThemeOutcome {
    /// Nothing was written; the source was missing or unreadable
    Skipped(IconError),
    /// Every asset was written
    Completed,
    /// Some assets were written, these were not
    PartiallyFailed(Vec<IconError>),
}

/// What happened to one theme variant
#[derive(Debug)]
pub struct ThemeReport {
    pub theme: Theme,
    pub outcome: ThemeOutcome,
    /// Correction applied in degrees, `None` when the source never loaded
    pub correction: Option<f64>,
    /// Whether the image was actually resampled
    pub rotated: bool,
    pub written: Vec<PathBuf>,
}

impl ThemeReport {
    fn skipped(theme: Theme, reason: IconError) -> Self {
        Self {
            theme,
            outcome: ThemeOutcome::Skipped(reason),
            correction: None,
            rotated: false,
            written: Vec::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, ThemeOutcome::Completed)
    }
}

/// Reports for every theme, in configuration order
#[derive(Debug, Default)]
pub struct RunReport {
    pub themes: Vec<ThemeReport>,
}

impl RunReport {
    pub fn completed(&self) -> usize {
        self.themes.iter().filter(|t| t.is_completed()).count()
    }

    pub fn any_completed(&self) -> bool {
        self.completed() > 0
    }

    pub fn get(&self, theme: Theme) -> Option<&ThemeReport> {
        self.themes.iter().find(|t| t.theme == theme)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for report in &self.themes {
            match &report.outcome {
                ThemeOutcome::Skipped(reason) => {
                    writeln!(f, "{}: skipped ({})", report.theme, reason)?;
                }
                ThemeOutcome::Completed => {
                    writeln!(
                        f,
                        "{}: completed, {} files written",
                        report.theme,
                        report.written.len()
                    )?;
                }
                ThemeOutcome::PartiallyFailed(failures) => {
                    writeln!(
                        f,
                        "{}: {} files written, {} failed",
                        report.theme,
                        report.written.len(),
                        failures.len()
                    )?;
                    for failure in failures {
                        writeln!(f, "  - {}", failure)?;
                    }
                }
            }
        }
        write!(
            f,
            "{}/{} themes completed",
            self.completed(),
            self.themes.len()
        )
    }
}

/// Decode a source image into RGBA, adding an opaque alpha channel if needed
pub fn load_source(path: &Path) -> Result<RgbaImage> {
    if !path.is_file() {
        return Err(IconError::SourceMissing {
            path: path.to_path_buf(),
        });
    }

    let decode_err = |source| IconError::Decode {
        path: path.to_path_buf(),
        source,
    };

    let img = ImageReader::open(path)
        .map_err(|e| decode_err(image::ImageError::IoError(e)))?
        .with_guessed_format()
        .map_err(|e| decode_err(image::ImageError::IoError(e)))?
        .decode()
        .map_err(decode_err)?;

    Ok(img.to_rgba8())
}

/// Collects written paths and failures while a theme runs
#[derive(Default)]
struct Progress {
    written: Vec<PathBuf>,
    failures: Vec<IconError>,
}

impl Progress {
    fn record(&mut self, path: PathBuf, result: Result<()>) {
        match result {
            Ok(()) => self.written.push(path),
            Err(e) => self.failures.push(e),
        }
    }
}

/// Run one theme variant to a terminal state
pub fn process_theme(config: &PipelineConfig, variant: &ThemeVariant) -> ThemeReport {
    let span = info_span!("theme", theme = %variant.theme);
    let _guard = span.enter();

    info!(source = %variant.source.display(), "processing theme");

    let source = match load_source(&variant.source) {
        Ok(img) => img,
        Err(e) => {
            warn!(error = %e, "skipping theme");
            return ThemeReport::skipped(variant.theme, e);
        }
    };
    info!(
        width = source.width(),
        height = source.height(),
        "loaded source"
    );

    let estimate = estimate_tilt(&source, &config.tilt);
    info!(
        correction = estimate.correction,
        edge_pixels = estimate.edge_pixels,
        "estimated tilt"
    );

    let (corrected, rotated) = straighten(&source, estimate.correction, config.rotation_tolerance);
    drop(source);
    if rotated {
        info!(
            width = corrected.width(),
            height = corrected.height(),
            "rotated to straighten"
        );
    } else {
        info!("no rotation needed");
    }

    let mut progress = Progress::default();

    let corrected_path = config.corrected_path(variant);
    let result = save_png(&corrected, &corrected_path);
    if result.is_ok() {
        info!(path = %corrected_path.display(), "saved corrected image");
    }
    progress.record(corrected_path, result);

    let density_root = config.density_root(variant);
    for write in emit_density_set(
        &corrected,
        &config.buckets,
        &density_root,
        &config.launcher_name,
    ) {
        progress.record(write.path, write.result);
    }

    let store_path = config.store_path(variant);
    let result = emit_store_icon(&corrected, config.store_size, &store_path);
    progress.record(store_path, result);

    let outcome = if progress.failures.is_empty() {
        ThemeOutcome::Completed
    } else {
        warn!(failures = progress.failures.len(), "theme finished with failures");
        ThemeOutcome::PartiallyFailed(progress.failures)
    };

    ThemeReport {
        theme: variant.theme,
        outcome,
        correction: Some(estimate.correction),
        rotated,
        written: progress.written,
    }
}

/// Process every configured theme
///
/// Fails only when the configuration is invalid or the output roots cannot be
/// created; everything else is reported per theme.
pub fn run(config: &PipelineConfig) -> Result<RunReport> {
    config.validate()?;
    ensure_dir(&config.res_dir)?;
    ensure_dir(&config.store_dir)?;

    let themes = config
        .themes
        .iter()
        .map(|variant| process_theme(config, variant))
        .collect();

    Ok(RunReport { themes })
}
