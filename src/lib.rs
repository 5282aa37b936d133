pub mod cli;
pub mod compose;
pub mod config;
pub mod detection;
pub mod emit;
pub mod error;
pub mod geometry;
pub mod pipeline;
pub mod transform;

pub use cli::Cli;
pub use compose::{compose_square, fit_within};
pub use config::{DensityBucket, PipelineConfig, Theme, ThemeVariant};
pub use detection::{detect_tilt, estimate_tilt, TiltEstimate, TiltStrategy};
pub use emit::{emit_density_set, emit_store_icon, save_png, BucketWrite, STORE_ICON_SIZE};
pub use error::{IconError, Result};
pub use pipeline::{load_source, process_theme, run, RunReport, ThemeOutcome, ThemeReport};
pub use transform::{crop_to_content, rotate_expanded, straighten};
