//! Annotated-image rendering: ellipse outlines colored by denomination.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;
use rand::Rng;

use crate::classify::classify;
use crate::detect::CandidateShape;
use crate::ellipse::FittedEllipse;

/// Boundary samples per outline. Segments between consecutive samples are
/// short enough at coin scale to read as a smooth curve.
const OUTLINE_SAMPLES: usize = 90;

/// Draw every qualifying shape's outline on a copy of the canvas.
///
/// Shapes that classify to a denomination get that denomination's color;
/// out-of-band shapes get a random color so they stay visible in the
/// overlay without being counted.
pub fn annotate(canvas: &RgbImage, shapes: &[CandidateShape]) -> RgbImage {
    let mut out = canvas.clone();
    let mut rng = rand::thread_rng();

    for shape in shapes.iter().filter(|s| s.is_qualifying()) {
        let color = match classify(shape.ellipse.major_dim()) {
            Some(denom) => Rgb(denom.color()),
            None => Rgb([rng.gen(), rng.gen(), rng.gen()]),
        };
        draw_ellipse_outline(&mut out, &shape.ellipse, color);
    }

    out
}

/// Approximate a 2 px stroke with two concentric sampled polylines.
fn draw_ellipse_outline(canvas: &mut RgbImage, ellipse: &FittedEllipse, color: Rgb<u8>) {
    draw_closed_polyline(canvas, &ellipse.boundary_points(OUTLINE_SAMPLES), color);

    let inner = FittedEllipse {
        width: (ellipse.width - 2.0).max(1.0),
        height: (ellipse.height - 2.0).max(1.0),
        ..*ellipse
    };
    draw_closed_polyline(canvas, &inner.boundary_points(OUTLINE_SAMPLES), color);
}

fn draw_closed_polyline(canvas: &mut RgbImage, points: &[(f32, f32)], color: Rgb<u8>) {
    for i in 0..points.len() {
        let start = points[i];
        let end = points[(i + 1) % points.len()];
        draw_line_segment_mut(canvas, start, end, color);
    }
}
