use image::imageops::{self, FilterType};
use image::{Rgba, Rgba32FImage, RgbaImage};
use tracing::debug;

use crate::geometry::centered_offset;

/// Dimensions of `width`x`height` scaled to fit inside a `target` square
///
/// Never upscales: images already smaller than the target keep their size.
pub fn fit_within(width: u32, height: u32, target: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= target {
        return (width, height);
    }

    let scale = target as f64 / longest as f64;
    let new_width = ((width as f64 * scale).round() as u32).clamp(1, target);
    let new_height = ((height as f64 * scale).round() as u32).clamp(1, target);
    (new_width, new_height)
}

/// Convert to float RGBA with color multiplied by alpha
fn premultiply_alpha(img: &RgbaImage) -> Rgba32FImage {
    Rgba32FImage::from_fn(img.width(), img.height(), |x, y| {
        let pixel = img.get_pixel(x, y);
        let alpha = pixel[3] as f32 / 255.0;
        Rgba([
            pixel[0] as f32 / 255.0 * alpha,
            pixel[1] as f32 / 255.0 * alpha,
            pixel[2] as f32 / 255.0 * alpha,
            alpha,
        ])
    })
}

/// Divide color back out of a premultiplied float image
fn unpremultiply_alpha(img: &Rgba32FImage) -> RgbaImage {
    RgbaImage::from_fn(img.width(), img.height(), |x, y| {
        let pixel = img.get_pixel(x, y);
        let alpha = pixel[3].clamp(0.0, 1.0);
        let a = (alpha * 255.0).round();
        if a < 1.0 {
            return Rgba([0, 0, 0, 0]);
        }

        let channel = |c: f32| ((c / alpha).clamp(0.0, 1.0) * 255.0).round() as u8;
        Rgba([channel(pixel[0]), channel(pixel[1]), channel(pixel[2]), a as u8])
    })
}

/// Lanczos3 resize on premultiplied alpha so transparent pixels add no color
fn resize_premultiplied(img: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let premultiplied = premultiply_alpha(img);
    let scaled = imageops::resize(&premultiplied, width, height, FilterType::Lanczos3);
    unpremultiply_alpha(&scaled)
}

/// Render `img` centered on a transparent `size`x`size` canvas
pub fn compose_square(img: &RgbaImage, size: u32) -> RgbaImage {
    let mut canvas = RgbaImage::new(size, size);

    let (width, height) = img.dimensions();
    if width == 0 || height == 0 || size == 0 {
        return canvas;
    }

    let (fit_w, fit_h) = fit_within(width, height, size);
    let scaled = if (fit_w, fit_h) == (width, height) {
        img.clone()
    } else {
        resize_premultiplied(img, fit_w, fit_h)
    };

    let offset_x = centered_offset(size, fit_w);
    let offset_y = centered_offset(size, fit_h);
    imageops::replace(&mut canvas, &scaled, offset_x, offset_y);

    debug!(
        size,
        scaled_w = fit_w,
        scaled_h = fit_h,
        offset_x,
        offset_y,
        "composed square icon"
    );

    canvas
}
