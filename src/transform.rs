use image::{imageops, Rgba, RgbaImage};
use nalgebra::Matrix3;
use tracing::debug;

use crate::geometry::{
    centered_offset, compute_rotation_matrix, expanded_canvas_size, transform_point,
};

/// Default magnitude below which a correction is treated as "already aligned"
pub const DEFAULT_ROTATION_TOLERANCE: f64 = 0.1;

/// Premultiply alpha: RGB values are multiplied by alpha
fn premultiply_alpha(img: &RgbaImage) -> Vec<[f64; 4]> {
    img.pixels()
        .map(|pixel| {
            let alpha = pixel[3] as f64 / 255.0;
            [
                pixel[0] as f64 * alpha,
                pixel[1] as f64 * alpha,
                pixel[2] as f64 * alpha,
                pixel[3] as f64,
            ]
        })
        .collect()
}

/// Unpremultiply alpha: divide RGB by alpha
fn unpremultiply_alpha(premultiplied: [f64; 4]) -> Rgba<u8> {
    let alpha = premultiplied[3];
    if alpha < 1.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let alpha_norm = alpha.min(255.0) / 255.0;
    let r = (premultiplied[0] / alpha_norm).clamp(0.0, 255.0).round() as u8;
    let g = (premultiplied[1] / alpha_norm).clamp(0.0, 255.0).round() as u8;
    let b = (premultiplied[2] / alpha_norm).clamp(0.0, 255.0).round() as u8;
    let a = alpha.clamp(0.0, 255.0).round() as u8;

    Rgba([r, g, b, a])
}

/// Cubic interpolation kernel (Catmull-Rom)
fn cubic_weight(t: f64) -> [f64; 4] {
    let t2 = t * t;
    let t3 = t2 * t;

    [
        -0.5 * t3 + t2 - 0.5 * t,
        1.5 * t3 - 2.5 * t2 + 1.0,
        -1.5 * t3 + 2.0 * t2 + 0.5 * t,
        0.5 * t3 - 0.5 * t2,
    ]
}

/// Bicubic interpolation at a given position
fn bicubic_interpolate(
    premultiplied: &[[f64; 4]],
    width: u32,
    height: u32,
    x: f64,
    y: f64,
) -> [f64; 4] {
    let x_floor = x.floor() as i32;
    let y_floor = y.floor() as i32;
    let x_frac = x - x.floor();
    let y_frac = y - y.floor();

    let wx = cubic_weight(x_frac);
    let wy = cubic_weight(y_frac);

    let mut result = [0.0; 4];

    for (j, weight_y) in wy.iter().enumerate() {
        for (i, weight_x) in wx.iter().enumerate() {
            let px = (x_floor + i as i32 - 1).clamp(0, width as i32 - 1) as u32;
            let py = (y_floor + j as i32 - 1).clamp(0, height as i32 - 1) as u32;
            let idx = (py * width + px) as usize;

            let weight = weight_x * weight_y;
            for (c, value) in result.iter_mut().enumerate() {
                *value += premultiplied[idx][c] * weight;
            }
        }
    }

    result
}

/// Resample `img` through a forward affine transform onto a canvas of the same size
fn resample_in_place(img: &RgbaImage, forward_matrix: &Matrix3<f64>) -> RgbaImage {
    let (width, height) = img.dimensions();

    let inverse_matrix = match forward_matrix.try_inverse() {
        Some(inv) => inv,
        None => {
            debug!("rotation matrix is singular, keeping canvas as is");
            return img.clone();
        }
    };

    // Pre-multiply alpha for correct interpolation
    let premultiplied = premultiply_alpha(img);

    RgbaImage::from_fn(width, height, |out_x, out_y| {
        let (src_x, src_y) = transform_point(&inverse_matrix, out_x as f64, out_y as f64);

        if src_x >= -1.0 && src_x <= width as f64 && src_y >= -1.0 && src_y <= height as f64 {
            let interpolated = bicubic_interpolate(&premultiplied, width, height, src_x, src_y);
            unpremultiply_alpha(interpolated)
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

/// Remove edge artifacts by cleaning up semi-transparent edge pixels
fn clean_edges(img: &RgbaImage) -> RgbaImage {
    let (width, height) = img.dimensions();
    let mut result = img.clone();

    if width < 3 || height < 3 {
        return result;
    }

    // A faint pixel mostly surrounded by transparency is resampling ringing
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let pixel = img.get_pixel(x, y);

            if pixel[3] > 0 && pixel[3] < 32 {
                let neighbors = [
                    img.get_pixel(x - 1, y),
                    img.get_pixel(x + 1, y),
                    img.get_pixel(x, y - 1),
                    img.get_pixel(x, y + 1),
                ];

                let transparent_count = neighbors.iter().filter(|p| p[3] == 0).count();

                if transparent_count >= 3 {
                    result.put_pixel(x, y, Rgba([0, 0, 0, 0]));
                }
            }
        }
    }

    result
}

/// Find the bounding box (x, y, width, height) of pixels with alpha >= `alpha_threshold`
pub fn find_content_bounds(img: &RgbaImage, alpha_threshold: u8) -> Option<(u32, u32, u32, u32)> {
    let (width, height) = img.dimensions();
    let mut min_x = width;
    let mut max_x = 0;
    let mut min_y = height;
    let mut max_y = 0;

    for (x, y, pixel) in img.enumerate_pixels() {
        if pixel[3] >= alpha_threshold {
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
    }

    if min_x <= max_x && min_y <= max_y {
        Some((min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
    } else {
        None
    }
}

/// Crop image to the bounding box of its non-fully-transparent pixels
///
/// Returns `None` when every pixel is fully transparent.
pub fn crop_to_content(img: &RgbaImage) -> Option<RgbaImage> {
    let (x, y, width, height) = find_content_bounds(img, 1)?;
    Some(imageops::crop_imm(img, x, y, width, height).to_image())
}

/// Rotate an image by `angle_degrees` (counter-clockwise positive) without losing its corners
///
/// The source is pasted centered on a transparent square canvas sized to its
/// diagonal, rotated about the canvas center, then cropped back to content.
pub fn rotate_expanded(img: &RgbaImage, angle_degrees: f64) -> RgbaImage {
    let (width, height) = img.dimensions();
    let side = expanded_canvas_size(width, height);

    let mut canvas = RgbaImage::new(side, side);
    imageops::replace(
        &mut canvas,
        img,
        centered_offset(side, width),
        centered_offset(side, height),
    );

    let center = ((side - 1) as f64 / 2.0, (side - 1) as f64 / 2.0);
    let matrix = compute_rotation_matrix(angle_degrees, center);
    let rotated = clean_edges(&resample_in_place(&canvas, &matrix));

    debug!(
        width,
        height,
        canvas = side,
        angle = angle_degrees,
        "rotated on expanded canvas"
    );

    match crop_to_content(&rotated) {
        Some(cropped) => cropped,
        None => img.clone(),
    }
}

/// Apply a tilt correction, skipping resampling when the angle is within `tolerance`
///
/// The flag is true only when the image was actually rotated.
pub fn straighten(img: &RgbaImage, angle_degrees: f64, tolerance: f64) -> (RgbaImage, bool) {
    if angle_degrees.abs() < tolerance {
        return (img.clone(), false);
    }
    (rotate_expanded(img, angle_degrees), true)
}
