use nalgebra::{Matrix2, Matrix3, Vector3};

/// Extra pixels added around the diagonal when expanding a canvas for rotation
pub const CANVAS_MARGIN: u32 = 10;

/// Side length of the square canvas that can hold a `width`x`height` image
/// at any rotation without clipping its corners
pub fn expanded_canvas_size(width: u32, height: u32) -> u32 {
    let w = width as f64;
    let h = height as f64;
    (w * w + h * h).sqrt().ceil() as u32 + CANVAS_MARGIN
}

/// Offset that centers a `inner`-sized span inside an `outer`-sized span
pub fn centered_offset(outer: u32, inner: u32) -> i64 {
    (outer as i64 - inner as i64) / 2
}

/// Compute the forward matrix rotating by `angle_degrees` about `center`
///
/// Positive angles rotate counter-clockwise as seen on screen. Image space has
/// y pointing down, so the 2x2 block is the transpose of the textbook rotation.
pub fn compute_rotation_matrix(angle_degrees: f64, center: (f64, f64)) -> Matrix3<f64> {
    let theta = angle_degrees.to_radians();
    let (sin, cos) = theta.sin_cos();

    let rotation = Matrix2::new(
        cos, sin,
        -sin, cos,
    );

    let (cx, cy) = center;

    // Translate to origin, rotate, translate back
    let translate_to_origin = Matrix3::new(
        1.0, 0.0, -cx,
        0.0, 1.0, -cy,
        0.0, 0.0, 1.0,
    );

    let transform = Matrix3::new(
        rotation[(0, 0)], rotation[(0, 1)], 0.0,
        rotation[(1, 0)], rotation[(1, 1)], 0.0,
        0.0, 0.0, 1.0,
    );

    let translate_back = Matrix3::new(
        1.0, 0.0, cx,
        0.0, 1.0, cy,
        0.0, 0.0, 1.0,
    );

    translate_back * transform * translate_to_origin
}

/// Transform a point using the affine matrix
pub fn transform_point(matrix: &Matrix3<f64>, x: f64, y: f64) -> (f64, f64) {
    let p = Vector3::new(x, y, 1.0);
    let result = matrix * p;
    (result.x / result.z, result.y / result.z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expanded_canvas_covers_diagonal() {
        // 3-4-5 triangle keeps the arithmetic exact
        assert_eq!(expanded_canvas_size(300, 400), 500 + CANVAS_MARGIN);
        assert_eq!(expanded_canvas_size(1, 1), 2 + CANVAS_MARGIN);
    }

    #[test]
    fn test_centered_offset_floors() {
        assert_eq!(centered_offset(48, 38), 5);
        assert_eq!(centered_offset(48, 37), 5);
        assert_eq!(centered_offset(48, 48), 0);
    }

    #[test]
    fn test_zero_rotation_is_identity() {
        let matrix = compute_rotation_matrix(0.0, (50.0, 50.0));
        let (x, y) = transform_point(&matrix, 12.0, 80.0);
        assert!((x - 12.0).abs() < 1e-9);
        assert!((y - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_positive_angle_is_counter_clockwise() {
        // A point right of center moves up (negative y) on screen
        let matrix = compute_rotation_matrix(90.0, (0.0, 0.0));
        let (x, y) = transform_point(&matrix, 10.0, 0.0);
        assert!(x.abs() < 1e-9);
        assert!((y + 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_rotation_keeps_center_fixed() {
        let matrix = compute_rotation_matrix(17.5, (33.0, 21.0));
        let (x, y) = transform_point(&matrix, 33.0, 21.0);
        assert!((x - 33.0).abs() < 1e-9);
        assert!((y - 21.0).abs() < 1e-9);
    }

    #[test]
    fn test_inverse_undoes_rotation() {
        let matrix = compute_rotation_matrix(-2.5, (40.0, 40.0));
        let inverse = matrix.try_inverse().unwrap();
        let (x, y) = transform_point(&matrix, 5.0, 70.0);
        let (bx, by) = transform_point(&inverse, x, y);
        assert!((bx - 5.0).abs() < 1e-9);
        assert!((by - 70.0).abs() < 1e-9);
    }
}
