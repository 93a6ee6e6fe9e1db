//! Least-squares ellipse fitting over contour points.
//!
//! Pure-Rust replacement for the ellipse-of-best-fit primitive the pipeline
//! needs: a direct constrained fit (Fitzgibbon et al., 1999) that solves a
//! 3x3 generalized eigensystem with the ellipse discriminant constraint
//! 4AC − B² > 0, then converts the conic to geometric center/axes/angle form.

use nalgebra::{DMatrix, Matrix3, Vector3};

/// Ellipse fitting needs at least this many points to be well-posed.
pub const MIN_FIT_POINTS: usize = 6;

/// A fitted ellipse in image coordinates.
///
/// Axis lengths are full diameters rather than semi-axes, with
/// `width >= height`, so the classifier's measurement is just `width`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FittedEllipse {
    pub cx: f64,
    pub cy: f64,
    /// Full length of the major axis.
    pub width: f64,
    /// Full length of the minor axis.
    pub height: f64,
    /// Rotation of the major axis from +x, in radians, within (−π/2, π/2].
    pub angle: f64,
}

impl FittedEllipse {
    /// The larger of the two axis lengths, which is the size measurement
    /// the classifier consumes.
    pub fn major_dim(&self) -> f64 {
        self.width.max(self.height)
    }

    /// Sample `n` evenly spaced boundary points, ordered around the
    /// perimeter. Used for rendering the outline.
    pub fn boundary_points(&self, n: usize) -> Vec<(f32, f32)> {
        let (sin_a, cos_a) = self.angle.sin_cos();
        let ra = self.width / 2.0;
        let rb = self.height / 2.0;
        (0..n)
            .map(|i| {
                let t = std::f64::consts::TAU * i as f64 / n as f64;
                let ex = ra * t.cos();
                let ey = rb * t.sin();
                let x = self.cx + cos_a * ex - sin_a * ey;
                let y = self.cy + sin_a * ex + cos_a * ey;
                (x as f32, y as f32)
            })
            .collect()
    }
}

/// Fit the best ellipse through a set of boundary points.
///
/// Returns `None` for fewer than [`MIN_FIT_POINTS`] points and for
/// degenerate inputs (collinear or clustered points, conics that are not
/// ellipses), so callers can simply skip the contour.
pub fn fit_ellipse(points: &[(f64, f64)]) -> Option<FittedEllipse> {
    if points.len() < MIN_FIT_POINTS {
        return None;
    }

    // Condition the system: shift to the centroid and scale so the mean
    // distance from it is √2. Raw pixel coordinates make the scatter
    // matrix badly conditioned.
    let (mx, my, scale) = conditioning(points);

    // Design matrix rows are [x², xy, y², x, y, 1] in conditioned coords.
    let n = points.len();
    let mut design = DMatrix::<f64>::zeros(n, 6);
    for (i, &(px, py)) in points.iter().enumerate() {
        let x = (px - mx) * scale;
        let y = (py - my) * scale;
        design[(i, 0)] = x * x;
        design[(i, 1)] = x * y;
        design[(i, 2)] = y * y;
        design[(i, 3)] = x;
        design[(i, 4)] = y;
        design[(i, 5)] = 1.0;
    }

    // Scatter matrix S = DᵀD, partitioned into quadratic (S11), mixed
    // (S12) and linear (S22) 3x3 blocks.
    let scatter = design.transpose() * &design;
    let s11 = scatter.fixed_view::<3, 3>(0, 0).into_owned();
    let s12 = scatter.fixed_view::<3, 3>(0, 3).into_owned();
    let s22 = scatter.fixed_view::<3, 3>(3, 3).into_owned();

    let s22_inv = s22.try_inverse()?;
    let reduced = s11 - s12 * s22_inv * s12.transpose();

    // The ellipse constraint matrix C1 = [[0,0,2],[0,-1,0],[2,0,0]] and its
    // (fixed) inverse turn M a = λ C1 a into an ordinary eigenproblem of
    // C1⁻¹ M, which is not symmetric, so the eigenvalues come from the
    // characteristic cubic instead of a symmetric solver.
    let c1_inv = Matrix3::new(0.0, 0.0, 0.5, 0.0, -1.0, 0.0, 0.5, 0.0, 0.0);
    let system = c1_inv * reduced;

    let quad = constrained_eigenvector(&system)?;
    let lin = -s22_inv * s12.transpose() * quad;

    // Undo the conditioning and read off the geometry.
    let coeffs = decondition([quad[0], quad[1], quad[2], lin[0], lin[1], lin[2]], mx, my, scale);
    conic_to_geometry(coeffs)
}

/// Centroid and scale so that the mean distance from the centroid is √2.
fn conditioning(points: &[(f64, f64)]) -> (f64, f64, f64) {
    let n = points.len() as f64;
    let mx = points.iter().map(|p| p.0).sum::<f64>() / n;
    let my = points.iter().map(|p| p.1).sum::<f64>() / n;

    let mean_dist = points
        .iter()
        .map(|p| ((p.0 - mx).powi(2) + (p.1 - my).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    let scale = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    (mx, my, scale)
}

/// Find the eigenvector of `system` whose eigenvalue satisfies the ellipse
/// constraint 4·v₀·v₂ − v₁² > 0. There is exactly one such eigenvalue for a
/// proper fit; among numerically valid candidates the smallest magnitude
/// wins.
fn constrained_eigenvector(system: &Matrix3<f64>) -> Option<Vector3<f64>> {
    // Characteristic polynomial λ³ − tr·λ² + m·λ − det, where m is the sum
    // of the principal 2x2 minors.
    let a = system;
    let tr = a[(0, 0)] + a[(1, 1)] + a[(2, 2)];
    let minors = a[(0, 0)] * a[(1, 1)] - a[(0, 1)] * a[(1, 0)]
        + a[(0, 0)] * a[(2, 2)]
        - a[(0, 2)] * a[(2, 0)]
        + a[(1, 1)] * a[(2, 2)]
        - a[(1, 2)] * a[(2, 1)];
    let det = a.determinant();

    let mut chosen: Option<Vector3<f64>> = None;
    let mut chosen_mag = f64::MAX;

    for lambda in real_cubic_roots(-tr, minors, -det) {
        let shifted = system - Matrix3::identity() * lambda;
        let Some(v) = null_space_vector(&shifted) else {
            continue;
        };
        if 4.0 * v[0] * v[2] - v[1] * v[1] > 0.0 && lambda.abs() < chosen_mag {
            chosen_mag = lambda.abs();
            chosen = Some(v);
        }
    }

    chosen
}

/// Null vector of a near-singular 3x3 matrix, taken as the largest-norm row
/// of the adjugate. For a rank-2 matrix every nonzero adjugate row is
/// proportional to the null vector.
fn null_space_vector(m: &Matrix3<f64>) -> Option<Vector3<f64>> {
    let cof = |r1: usize, r2: usize, c1: usize, c2: usize| {
        m[(r1, c1)] * m[(r2, c2)] - m[(r1, c2)] * m[(r2, c1)]
    };

    let rows = [
        Vector3::new(cof(1, 2, 1, 2), -cof(1, 2, 0, 2), cof(1, 2, 0, 1)),
        Vector3::new(-cof(0, 2, 1, 2), cof(0, 2, 0, 2), -cof(0, 2, 0, 1)),
        Vector3::new(cof(0, 1, 1, 2), -cof(0, 1, 0, 2), cof(0, 1, 0, 1)),
    ];

    let best = *rows
        .iter()
        .max_by(|a, b| a.norm_squared().total_cmp(&b.norm_squared()))?;

    let norm_sq = best.norm_squared();
    if norm_sq < 1e-30 {
        return None;
    }
    Some(best / norm_sq.sqrt())
}

/// Real roots of the monic cubic x³ + px² + qx + r.
fn real_cubic_roots(p: f64, q: f64, r: f64) -> Vec<f64> {
    // Depressed form t³ + at + b with x = t − p/3.
    let a = q - p * p / 3.0;
    let b = 2.0 * p * p * p / 27.0 - p * q / 3.0 + r;
    let shift = -p / 3.0;

    let disc = -4.0 * a * a * a - 27.0 * b * b;
    if disc >= 0.0 {
        // Three real roots via the trigonometric method.
        let m = (-a / 3.0).sqrt();
        let cos_arg = if m.abs() < 1e-15 {
            0.0
        } else {
            (-b / (2.0 * m * m * m)).clamp(-1.0, 1.0)
        };
        let theta = cos_arg.acos();
        let tau = std::f64::consts::TAU;
        vec![
            2.0 * m * (theta / 3.0).cos() + shift,
            2.0 * m * ((theta + tau) / 3.0).cos() + shift,
            2.0 * m * ((theta + 2.0 * tau) / 3.0).cos() + shift,
        ]
    } else {
        // One real root, Cardano.
        let s = (b * b / 4.0 + a * a * a / 27.0).sqrt();
        vec![(-b / 2.0 + s).cbrt() + (-b / 2.0 - s).cbrt() + shift]
    }
}

/// Map conic coefficients found in conditioned coordinates back to image
/// coordinates. With x' = s(x − mx), y' = s(y − my), substitution gives the
/// image-frame coefficients directly.
fn decondition(c: [f64; 6], mx: f64, my: f64, s: f64) -> [f64; 6] {
    let [a, b, cc, d, e, f] = c;
    let s2 = s * s;
    [
        a * s2,
        b * s2,
        cc * s2,
        -2.0 * a * s2 * mx - b * s2 * my + d * s,
        -b * s2 * mx - 2.0 * cc * s2 * my + e * s,
        a * s2 * mx * mx + b * s2 * mx * my + cc * s2 * my * my - d * s * mx - e * s * my + f,
    ]
}

/// Convert conic coefficients A..F of Ax² + Bxy + Cy² + Dx + Ey + F = 0 to
/// geometric ellipse parameters. Returns `None` when the conic is not a
/// proper finite ellipse.
fn conic_to_geometry(coeffs: [f64; 6]) -> Option<FittedEllipse> {
    let [a, b, c, d, e, f] = coeffs;

    // Ellipse discriminant.
    let denom = 4.0 * a * c - b * b;
    if denom <= 0.0 {
        return None;
    }

    // Center from the gradient zero: 2A·cx + B·cy + D = 0, B·cx + 2C·cy + E = 0.
    let cx = (b * e - 2.0 * c * d) / denom;
    let cy = (b * d - 2.0 * a * e) / denom;

    let angle = if (a - c).abs() < 1e-15 {
        match b.partial_cmp(&0.0)? {
            std::cmp::Ordering::Greater => std::f64::consts::FRAC_PI_4,
            std::cmp::Ordering::Less => -std::f64::consts::FRAC_PI_4,
            std::cmp::Ordering::Equal => 0.0,
        }
    } else {
        0.5 * b.atan2(a - c)
    };

    // Eigenvalues of the quadratic part give the axis scales.
    let spread = ((a - c).powi(2) + b * b).sqrt();
    let lambda_hi = (a + c + spread) / 2.0;
    let lambda_lo = (a + c - spread) / 2.0;

    // Conic value at the center.
    let f_center = a * cx * cx + b * cx * cy + c * cy * cy + d * cx + e * cy + f;
    if f_center.abs() < 1e-15 {
        return None;
    }

    let semi_sq_hi = -f_center / lambda_hi;
    let semi_sq_lo = -f_center / lambda_lo;
    if semi_sq_hi <= 0.0 || semi_sq_lo <= 0.0 {
        return None;
    }

    let (mut semi_major, mut semi_minor) = (semi_sq_hi.sqrt(), semi_sq_lo.sqrt());
    let mut angle = angle;
    if semi_major < semi_minor {
        std::mem::swap(&mut semi_major, &mut semi_minor);
        angle += std::f64::consts::FRAC_PI_2;
    }

    // Fold the angle into (−π/2, π/2].
    while angle > std::f64::consts::FRAC_PI_2 {
        angle -= std::f64::consts::PI;
    }
    while angle <= -std::f64::consts::FRAC_PI_2 {
        angle += std::f64::consts::PI;
    }

    let out = FittedEllipse {
        cx,
        cy,
        width: 2.0 * semi_major,
        height: 2.0 * semi_minor,
        angle,
    };

    let finite = out.cx.is_finite()
        && out.cy.is_finite()
        && out.width.is_finite()
        && out.height.is_finite()
        && out.angle.is_finite();
    if !finite || out.width <= 0.0 || out.height <= 0.0 {
        return None;
    }

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(cx: f64, cy: f64, rx: f64, ry: f64, angle: f64, n: usize) -> Vec<(f64, f64)> {
        let (sin_a, cos_a) = angle.sin_cos();
        (0..n)
            .map(|i| {
                let t = std::f64::consts::TAU * i as f64 / n as f64;
                let ex = rx * t.cos();
                let ey = ry * t.sin();
                (cx + cos_a * ex - sin_a * ey, cy + sin_a * ex + cos_a * ey)
            })
            .collect()
    }

    #[test]
    fn test_fit_recovers_exact_ellipse() {
        let pts = sample(384.0, 512.0, 112.0, 100.0, 0.3, 60);
        let e = fit_ellipse(&pts).expect("fit should succeed");

        assert!((e.cx - 384.0).abs() < 1e-4, "cx = {}", e.cx);
        assert!((e.cy - 512.0).abs() < 1e-4, "cy = {}", e.cy);
        assert!((e.width - 224.0).abs() < 1e-3, "width = {}", e.width);
        assert!((e.height - 200.0).abs() < 1e-3, "height = {}", e.height);
        assert!((e.angle - 0.3).abs() < 1e-4, "angle = {}", e.angle);
        assert!((e.major_dim() - 224.0).abs() < 1e-3);
    }

    #[test]
    fn test_fit_circle() {
        // Circles have no preferred orientation but well-defined axes.
        let pts = sample(100.0, 80.0, 40.0, 40.0, 0.0, 48);
        let e = fit_ellipse(&pts).expect("circle fit should succeed");

        assert!((e.cx - 100.0).abs() < 1e-4);
        assert!((e.cy - 80.0).abs() < 1e-4);
        assert!((e.width - 80.0).abs() < 1e-3);
        assert!((e.height - 80.0).abs() < 1e-3);
    }

    #[test]
    fn test_fit_tilted_and_elongated() {
        let pts = sample(300.0, 100.0, 90.0, 30.0, -0.7, 120);
        let e = fit_ellipse(&pts).expect("fit should succeed");

        assert!((e.width - 180.0).abs() < 1e-3);
        assert!((e.height - 60.0).abs() < 1e-3);
        let angle_diff = (e.angle - (-0.7)).abs();
        let angle_diff = angle_diff.min((angle_diff - std::f64::consts::PI).abs());
        assert!(angle_diff < 1e-4, "angle = {}", e.angle);
    }

    #[test]
    fn test_too_few_points() {
        let pts = sample(50.0, 50.0, 20.0, 10.0, 0.0, 5);
        assert!(fit_ellipse(&pts).is_none());
        assert!(fit_ellipse(&[]).is_none());
    }

    #[test]
    fn test_degenerate_points_rejected() {
        // Collinear
        let line: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, 2.0 * i as f64)).collect();
        assert!(fit_ellipse(&line).is_none());

        // All identical
        let dup = vec![(7.0, 7.0); 12];
        assert!(fit_ellipse(&dup).is_none());
    }

    #[test]
    fn test_boundary_points_lie_on_ellipse() {
        let e = FittedEllipse {
            cx: 10.0,
            cy: 20.0,
            width: 60.0,
            height: 40.0,
            angle: 0.5,
        };
        for (x, y) in e.boundary_points(32) {
            // Each sampled point satisfies the implicit equation in the
            // ellipse's own frame.
            let dx = x as f64 - e.cx;
            let dy = y as f64 - e.cy;
            let (sin_a, cos_a) = e.angle.sin_cos();
            let u = cos_a * dx + sin_a * dy;
            let v = -sin_a * dx + cos_a * dy;
            let val = (u / 30.0).powi(2) + (v / 20.0).powi(2);
            assert!((val - 1.0).abs() < 1e-3, "val = {}", val);
        }
    }
}
