use image::{imageops, GrayImage, RgbaImage};
use imageproc::edges::canny;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Largest correction the detector will ever report, in degrees
pub const DEFAULT_MAX_TILT: f64 = 3.0;

/// Upper bound on any configured tilt, detected or fixed, in degrees
pub const MAX_TILT_LIMIT: f64 = 10.0;

/// Resolution of the angle search, in degrees
const ANGLE_STEP: f64 = 0.1;

/// Longest side used for analysis; larger sources are downscaled first
const ANALYSIS_MAX_SIDE: u32 = 512;

/// Below this many edge pixels there is nothing to measure
const MIN_EDGE_PIXELS: usize = 32;

/// How the tilt correction for a source image is obtained
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TiltStrategy {
    /// Measure the dominant near-horizontal edge angle, bounded to `max_degrees`
    Detect { max_degrees: f64 },
    /// Apply a calibrated correction without looking at the pixels
    Fixed { degrees: f64 },
}

impl Default for TiltStrategy {
    fn default() -> Self {
        TiltStrategy::Detect {
            max_degrees: DEFAULT_MAX_TILT,
        }
    }
}

/// Result of tilt estimation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TiltEstimate {
    /// Rotation (degrees, counter-clockwise positive) that straightens the image
    pub correction: f64,
    /// Edge pixels that took part in the measurement (0 for a fixed correction)
    pub edge_pixels: usize,
}

impl TiltEstimate {
    fn none(edge_pixels: usize) -> Self {
        Self {
            correction: 0.0,
            edge_pixels,
        }
    }
}

/// Convert RGBA image to grayscale, using alpha to mask out transparent pixels
fn to_grayscale_masked(img: &RgbaImage, alpha_threshold: u8) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let pixel = img.get_pixel(x, y);
        if pixel[3] >= alpha_threshold {
            // Standard luminance conversion
            let luma =
                0.299 * pixel[0] as f64 + 0.587 * pixel[1] as f64 + 0.114 * pixel[2] as f64;
            image::Luma([luma as u8])
        } else {
            // Transparent pixels become white (background)
            image::Luma([255])
        }
    })
}

/// Shrink large images so the longer side is at most `max_side`; angles are unaffected
fn analysis_view(img: &RgbaImage, max_side: u32) -> RgbaImage {
    let (width, height) = img.dimensions();
    let longest = width.max(height);
    if longest <= max_side {
        return img.clone();
    }

    let scale = max_side as f64 / longest as f64;
    let new_width = ((width as f64 * scale).round() as u32).max(1);
    let new_height = ((height as f64 * scale).round() as u32).max(1);
    imageops::resize(img, new_width, new_height, imageops::FilterType::Triangle)
}

/// Collect edge pixel coordinates relative to the image center
fn edge_points(edges: &GrayImage) -> Vec<(f64, f64)> {
    let cx = edges.width() as f64 / 2.0;
    let cy = edges.height() as f64 / 2.0;

    edges
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] > 0)
        .map(|(x, y, _)| (x as f64 - cx, y as f64 - cy))
        .collect()
}

/// Sharpness of the edge projection along a line tilted by `tilt_degrees`
///
/// Points on a line tilted counter-clockwise by `t` satisfy `y + x * tan(t) = const`,
/// so the right angle concentrates edges into few histogram bins.
fn projection_score(points: &[(f64, f64)], tilt_degrees: f64, bins: &mut [u32]) -> u64 {
    let slope = tilt_degrees.to_radians().tan();
    let offset = (bins.len() / 2) as i64;

    bins.iter_mut().for_each(|b| *b = 0);
    for &(x, y) in points {
        let idx = (y + x * slope).round() as i64 + offset;
        if idx >= 0 && (idx as usize) < bins.len() {
            bins[idx as usize] += 1;
        }
    }

    bins.iter().map(|&c| c as u64 * c as u64).sum()
}

/// Candidate angles ordered by magnitude: 0, +s, -s, +2s, -2s, ...
fn candidate_angles(max_degrees: f64) -> impl Iterator<Item = f64> {
    let steps = (max_degrees / ANGLE_STEP).round() as i64;
    std::iter::once(0.0).chain((1..=steps).flat_map(|k| {
        let angle = k as f64 * ANGLE_STEP;
        [angle, -angle]
    }))
}

/// Measure the tilt of an image and return the correction that undoes it
///
/// The result is always within `±max_degrees`. Images without enough edges,
/// or whose edges are already horizontal, yield exactly zero.
pub fn detect_tilt(img: &RgbaImage, max_degrees: f64) -> TiltEstimate {
    let max_degrees = max_degrees.abs();
    let view = analysis_view(img, ANALYSIS_MAX_SIDE);

    let gray = to_grayscale_masked(&view, 10);
    let edges = canny(&gray, 30.0, 100.0);
    let points = edge_points(&edges);

    if points.len() < MIN_EDGE_PIXELS {
        debug!(edge_pixels = points.len(), "too few edges to measure tilt");
        return TiltEstimate::none(points.len());
    }

    let (width, height) = view.dimensions();
    let reach = (width + height) as usize + 2;
    let mut bins = vec![0u32; reach * 2 + 1];

    let mut best_tilt = 0.0_f64;
    let mut best_score = 0u64;
    for angle in candidate_angles(max_degrees) {
        let score = projection_score(&points, angle, &mut bins);
        // Strict comparison keeps the smallest-magnitude angle on ties
        if score > best_score {
            best_score = score;
            best_tilt = angle;
        }
    }

    let correction = (-best_tilt).clamp(-max_degrees, max_degrees);
    debug!(
        edge_pixels = points.len(),
        tilt = best_tilt,
        correction,
        "measured tilt"
    );

    TiltEstimate {
        correction,
        edge_pixels: points.len(),
    }
}

/// Produce the tilt correction for `img` under the given strategy
pub fn estimate_tilt(img: &RgbaImage, strategy: &TiltStrategy) -> TiltEstimate {
    match *strategy {
        TiltStrategy::Detect { max_degrees } => detect_tilt(img, max_degrees),
        TiltStrategy::Fixed { degrees } => TiltEstimate {
            correction: degrees,
            edge_pixels: 0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::rotate_expanded;
    use image::Rgba;

    /// White card with black horizontal bars
    fn create_striped_image(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |_, y| {
            if (y / 12) % 3 == 1 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        })
    }

    #[test]
    fn test_candidates_start_at_zero_and_alternate() {
        let angles: Vec<f64> = candidate_angles(0.2).collect();
        assert_eq!(angles.len(), 5);
        assert_eq!(angles[0], 0.0);
        assert!((angles[1] - 0.1).abs() < 1e-9);
        assert!((angles[2] + 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_aligned_image_needs_no_correction() {
        let img = create_striped_image(400, 240);
        let estimate = detect_tilt(&img, DEFAULT_MAX_TILT);
        assert!(estimate.edge_pixels >= MIN_EDGE_PIXELS);
        assert_eq!(estimate.correction, 0.0);
    }

    #[test]
    fn test_blank_image_needs_no_correction() {
        let img = RgbaImage::from_pixel(100, 100, Rgba([40, 90, 200, 255]));
        let estimate = detect_tilt(&img, DEFAULT_MAX_TILT);
        assert_eq!(estimate.correction, 0.0);
    }

    #[test]
    fn test_tilted_image_is_measured() {
        let tilted = rotate_expanded(&create_striped_image(400, 240), 1.5);
        let estimate = detect_tilt(&tilted, DEFAULT_MAX_TILT);
        assert!(
            (estimate.correction + 1.5).abs() <= 0.3,
            "correction {}",
            estimate.correction
        );
    }

    #[test]
    fn test_correction_is_bounded() {
        let tilted = rotate_expanded(&create_striped_image(400, 240), 2.5);
        let estimate = detect_tilt(&tilted, 1.0);
        assert!(estimate.correction.abs() <= 1.0);
    }

    #[test]
    fn test_fixed_strategy_ignores_pixels() {
        let img = create_striped_image(50, 50);
        let estimate = estimate_tilt(&img, &TiltStrategy::Fixed { degrees: 0.5 });
        assert_eq!(estimate.correction, 0.5);
        assert_eq!(estimate.edge_pixels, 0);
    }

    #[test]
    fn test_strategy_from_json() {
        let strategy: TiltStrategy =
            serde_json::from_str(r#"{"mode":"fixed","degrees":-0.5}"#).unwrap();
        assert_eq!(strategy, TiltStrategy::Fixed { degrees: -0.5 });
    }
}
