use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use tracing::{info, warn};

use crate::compose::compose_square;
use crate::config::DensityBucket;
use crate::error::{IconError, Result};

/// Side length of the storefront icon
pub const STORE_ICON_SIZE: u32 = 512;

/// Create `path` and its parents if missing
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|source| IconError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `img` as a best-compression PNG, creating the parent directory if needed
///
/// Output bytes depend only on the pixels, so repeated runs are identical.
pub fn save_png(img: &RgbaImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }

    let write_err = |source| IconError::Write {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(write_err)?;
    let mut writer = BufWriter::new(file);

    let encoder = PngEncoder::new_with_quality(
        &mut writer,
        CompressionType::Best,
        PngFilterType::Adaptive,
    );
    encoder
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            ExtendedColorType::Rgba8,
        )
        .map_err(|source| IconError::Encode {
            path: path.to_path_buf(),
            source,
        })?;

    writer.flush().map_err(write_err)
}

/// Outcome of writing one density bucket
#[derive(Debug)]
pub struct BucketWrite {
    pub bucket: DensityBucket,
    pub path: PathBuf,
    pub result: Result<()>,
}

/// Directory holding the icon for one density bucket
pub fn bucket_dir(root: &Path, bucket: &DensityBucket) -> PathBuf {
    root.join(format!("mipmap-{}", bucket.label))
}

fn emit_bucket(img: &RgbaImage, bucket: &DensityBucket, path: &Path) -> Result<()> {
    let icon = compose_square(img, bucket.size);
    save_png(&icon, path)
}

/// Write one square icon per bucket to `root/mipmap-<label>/<file_name>.png`
///
/// A failure in one bucket does not stop the others; every bucket gets an entry.
pub fn emit_density_set(
    img: &RgbaImage,
    buckets: &[DensityBucket],
    root: &Path,
    file_name: &str,
) -> Vec<BucketWrite> {
    buckets
        .iter()
        .map(|bucket| {
            let path = bucket_dir(root, bucket).join(format!("{}.png", file_name));
            let result = emit_bucket(img, bucket, &path);

            match &result {
                Ok(()) => info!(
                    density = %bucket.label,
                    size = bucket.size,
                    path = %path.display(),
                    "wrote launcher icon"
                ),
                Err(e) => warn!(
                    density = %bucket.label,
                    size = bucket.size,
                    error = %e,
                    "launcher icon failed"
                ),
            }

            BucketWrite {
                bucket: bucket.clone(),
                path,
                result,
            }
        })
        .collect()
}

/// Write a single `size`x`size` store icon at `path`
pub fn emit_store_icon(img: &RgbaImage, size: u32, path: &Path) -> Result<()> {
    let icon = compose_square(img, size);
    save_png(&icon, path)?;
    info!(size, path = %path.display(), "wrote store icon");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::tempdir;

    fn sample() -> RgbaImage {
        RgbaImage::from_fn(90, 60, |x, y| Rgba([(x * 2) as u8, (y * 4) as u8, 128, 255]))
    }

    #[test]
    fn test_save_png_roundtrips_pixels() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/out.png");
        let img = sample();

        save_png(&img, &path).unwrap();
        let loaded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(loaded, img);
    }

    #[test]
    fn test_density_set_layout() {
        let dir = tempdir().unwrap();
        let buckets = DensityBucket::android_defaults();

        let writes = emit_density_set(&sample(), &buckets, dir.path(), "ic_launcher");
        assert_eq!(writes.len(), buckets.len());

        for write in &writes {
            assert!(write.result.is_ok());
            let expected = dir
                .path()
                .join(format!("mipmap-{}", write.bucket.label))
                .join("ic_launcher.png");
            assert_eq!(write.path, expected);

            let icon = image::open(&expected).unwrap();
            assert_eq!(icon.width(), write.bucket.size);
            assert_eq!(icon.height(), write.bucket.size);
        }
    }

    #[test]
    fn test_density_set_is_idempotent() {
        let dir = tempdir().unwrap();
        let buckets = vec![DensityBucket::new("hdpi", 72)];

        emit_density_set(&sample(), &buckets, dir.path(), "ic_launcher");
        let first = fs::read(dir.path().join("mipmap-hdpi/ic_launcher.png")).unwrap();
        emit_density_set(&sample(), &buckets, dir.path(), "ic_launcher");
        let second = fs::read(dir.path().join("mipmap-hdpi/ic_launcher.png")).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_failed_bucket_does_not_stop_siblings() {
        let dir = tempdir().unwrap();
        // A plain file where the mdpi directory should go
        fs::write(dir.path().join("mipmap-mdpi"), b"not a directory").unwrap();

        let buckets = vec![DensityBucket::new("mdpi", 48), DensityBucket::new("hdpi", 72)];
        let writes = emit_density_set(&sample(), &buckets, dir.path(), "ic_launcher");

        assert!(matches!(writes[0].result, Err(IconError::CreateDir { .. })));
        assert!(writes[1].result.is_ok());
        assert!(dir.path().join("mipmap-hdpi/ic_launcher.png").exists());
    }

    #[test]
    fn test_store_icon_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.png");

        emit_store_icon(&sample(), STORE_ICON_SIZE, &path).unwrap();
        let icon = image::open(&path).unwrap();
        assert_eq!((icon.width(), icon.height()), (512, 512));
    }
}
