//! Vision pipeline: canvas normalization, edge cleanup, and candidate
//! shape extraction.

use image::{imageops::FilterType, DynamicImage, GrayImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::morphology::{dilate, erode};

use crate::ellipse::{fit_ellipse, FittedEllipse, MIN_FIT_POINTS};

/// Fixed canvas the size bands are expressed against. Inputs are stretched
/// to this size regardless of aspect ratio so the pixel thresholds stay
/// meaningful across differently sized photos.
pub const CANVAS_WIDTH: u32 = 768;
pub const CANVAS_HEIGHT: u32 = 1024;

/// Canny hysteresis thresholds.
pub const CANNY_LOW: f32 = 100.0;
pub const CANNY_HIGH: f32 = 200.0;

/// L∞ radius for the dilate-then-erode pass that bridges broken edge
/// segments without changing net region size.
pub const MORPH_RADIUS: u8 = 5;

/// A contour must carry strictly more points than this to be classified.
pub const MIN_ELLIPSE_INLIERS: usize = 50;

/// One contour's fitted ellipse together with how many boundary points
/// supported the fit.
#[derive(Debug, Clone)]
pub struct CandidateShape {
    pub ellipse: FittedEllipse,
    pub point_count: usize,
}

impl CandidateShape {
    /// Whether the source contour had enough points to count as a coin
    /// candidate rather than edge noise.
    pub fn is_qualifying(&self) -> bool {
        self.point_count > MIN_ELLIPSE_INLIERS
    }
}

/// Stretch the decoded image onto the fixed RGB canvas with linear
/// interpolation.
pub fn normalize_canvas(img: &DynamicImage) -> DynamicImage {
    DynamicImage::ImageRgb8(img.to_rgb8()).resize_exact(
        CANVAS_WIDTH,
        CANVAS_HEIGHT,
        FilterType::Triangle,
    )
}

/// Edge map with small spurious fragments suppressed: Canny, then dilate
/// and erode back by the same radius.
pub fn clean_edge_map(gray: &GrayImage) -> GrayImage {
    let edges = canny(gray, CANNY_LOW, CANNY_HIGH);
    let dilated = dilate(&edges, Norm::LInf, MORPH_RADIUS);
    erode(&dilated, Norm::LInf, MORPH_RADIUS)
}

/// Fit an ellipse to every outer contour of the binary edge map that has
/// enough points for the fit to be defined.
pub fn extract_shapes(edges: &GrayImage) -> Vec<CandidateShape> {
    let contours = find_contours::<i32>(edges);

    contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter(|c| c.points.len() >= MIN_FIT_POINTS)
        .filter_map(|c| {
            let points: Vec<(f64, f64)> =
                c.points.iter().map(|p| (p.x as f64, p.y as f64)).collect();
            fit_ellipse(&points).map(|ellipse| CandidateShape {
                ellipse,
                point_count: c.points.len(),
            })
        })
        .collect()
}

/// Run the full detection pipeline on a normalized canvas image.
pub fn detect_shapes(canvas: &DynamicImage, verbose: bool) -> Vec<CandidateShape> {
    let gray = canvas.to_luma8();
    let edges = clean_edge_map(&gray);

    if verbose {
        eprintln!("Applied Canny edge detection ({}, {})", CANNY_LOW, CANNY_HIGH);
    }

    let shapes = extract_shapes(&edges);

    if verbose {
        eprintln!("Fitted {} candidate shapes", shapes.len());
        for (i, shape) in shapes.iter().enumerate() {
            eprintln!(
                "  shape[{}]: {:.1}x{:.1} px at ({:.0}, {:.0}), {} contour points{}",
                i,
                shape.ellipse.width,
                shape.ellipse.height,
                shape.ellipse.cx,
                shape.ellipse.cy,
                shape.point_count,
                if shape.is_qualifying() { "" } else { " (below inlier threshold)" },
            );
        }
    }

    shapes
}
