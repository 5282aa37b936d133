use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading sources and writing icon assets
#[derive(Debug, Error)]
pub enum IconError {
    #[error("source image not found: {}", path.display())]
    SourceMissing { path: PathBuf },

    #[error("failed to decode {}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to create directory {}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode PNG {}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, IconError>;
