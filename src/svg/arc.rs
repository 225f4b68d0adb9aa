//! Elliptical arc to cubic Bezier conversion.
//!
//! SVG paths carry arcs in endpoint parameterization; PDF content streams
//! have no arc operator at all. The conversion goes through the center
//! parameterization of SVG 1.1 appendix F.6, then splits the arc into
//! sub-arcs of at most a quarter turn, each approximated by one cubic
//! whose control points run along the ellipse tangents.

use std::f64::consts::PI;

/// One cubic Bezier piece of a converted arc.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cubic {
    /// First control point x
    pub x1: f64,
    /// First control point y
    pub y1: f64,
    /// Second control point x
    pub x2: f64,
    /// Second control point y
    pub y2: f64,
    /// Endpoint x
    pub x: f64,
    /// Endpoint y
    pub y: f64,
}

/// Convert an endpoint-parameterized arc to cubics.
///
/// `(x1, y1)` is the current point, the rest matches the SVG `A` command
/// with absolute coordinates and the rotation in degrees. Degenerate
/// inputs follow F.6.2/F.6.6: coincident endpoints produce nothing and a
/// zero radius produces a single line-shaped cubic.
#[allow(clippy::too_many_arguments)]
pub fn arc_to_cubics(
    x1: f64,
    y1: f64,
    rx: f64,
    ry: f64,
    rotation_degrees: f64,
    large_arc: bool,
    sweep: bool,
    x2: f64,
    y2: f64,
) -> Vec<Cubic> {
    if x1 == x2 && y1 == y2 {
        return Vec::new();
    }

    let mut rx = rx.abs();
    let mut ry = ry.abs();
    if rx == 0.0 || ry == 0.0 {
        // A line dressed as a cubic, controls at the third points.
        return vec![Cubic {
            x1: x1 + (x2 - x1) / 3.0,
            y1: y1 + (y2 - y1) / 3.0,
            x2: x1 + 2.0 * (x2 - x1) / 3.0,
            y2: y1 + 2.0 * (y2 - y1) / 3.0,
            x: x2,
            y: y2,
        }];
    }

    let phi = rotation_degrees.to_radians();
    let (sin_phi, cos_phi) = phi.sin_cos();

    // F.6.5 step 1: midpoint frame rotated by -phi.
    let dx = (x1 - x2) / 2.0;
    let dy = (y1 - y2) / 2.0;
    let x1p = cos_phi * dx + sin_phi * dy;
    let y1p = -sin_phi * dx + cos_phi * dy;

    // F.6.6 step 3: scale radii that cannot span the endpoints.
    let lambda = (x1p * x1p) / (rx * rx) + (y1p * y1p) / (ry * ry);
    if lambda > 1.0 {
        let scale = lambda.sqrt();
        rx *= scale;
        ry *= scale;
    }

    // F.6.5 step 2: center in the rotated frame.
    let rx2 = rx * rx;
    let ry2 = ry * ry;
    let numerator = (rx2 * ry2 - rx2 * y1p * y1p - ry2 * x1p * x1p).max(0.0);
    let denominator = rx2 * y1p * y1p + ry2 * x1p * x1p;
    let sign = if large_arc == sweep { -1.0 } else { 1.0 };
    let factor = if denominator == 0.0 {
        0.0
    } else {
        sign * (numerator / denominator).sqrt()
    };
    let cxp = factor * rx * y1p / ry;
    let cyp = -factor * ry * x1p / rx;

    // F.6.5 step 3: center back in user space.
    let cx = cos_phi * cxp - sin_phi * cyp + (x1 + x2) / 2.0;
    let cy = sin_phi * cxp + cos_phi * cyp + (y1 + y2) / 2.0;

    // F.6.5 step 4: start angle and sweep.
    let theta1 = vector_angle(1.0, 0.0, (x1p - cxp) / rx, (y1p - cyp) / ry);
    let mut delta = vector_angle(
        (x1p - cxp) / rx,
        (y1p - cyp) / ry,
        (-x1p - cxp) / rx,
        (-y1p - cyp) / ry,
    );
    if !sweep && delta > 0.0 {
        delta -= 2.0 * PI;
    } else if sweep && delta < 0.0 {
        delta += 2.0 * PI;
    }

    // Split into sub-arcs of at most a quarter turn.
    let segments = (delta.abs() / (PI / 2.0)).ceil().max(1.0) as usize;
    let step = delta / segments as f64;
    let alpha = control_length(step);

    let mut cubics = Vec::with_capacity(segments);
    let mut theta = theta1;
    let mut from = (x1, y1);
    for i in 0..segments {
        let theta_next = theta + step;
        let to = if i == segments - 1 {
            // Land exactly on the endpoint the caller gave us.
            (x2, y2)
        } else {
            ellipse_point(cx, cy, rx, ry, sin_phi, cos_phi, theta_next)
        };
        let (t1x, t1y) = ellipse_tangent(rx, ry, sin_phi, cos_phi, theta);
        let (t2x, t2y) = ellipse_tangent(rx, ry, sin_phi, cos_phi, theta_next);

        cubics.push(Cubic {
            x1: from.0 + alpha * t1x,
            y1: from.1 + alpha * t1y,
            x2: to.0 - alpha * t2x,
            y2: to.1 - alpha * t2y,
            x: to.0,
            y: to.1,
        });

        theta = theta_next;
        from = to;
    }

    cubics
}

/// Control-point length for a sub-arc of angle `delta` along the unit
/// tangents at its endpoints.
fn control_length(delta: f64) -> f64 {
    let quarter_tan = (delta / 4.0).tan();
    delta.sin() * ((4.0 + 3.0 * quarter_tan * quarter_tan).sqrt() - 1.0) / 3.0
}

/// Point on the rotated ellipse at parameter angle `theta`.
fn ellipse_point(
    cx: f64,
    cy: f64,
    rx: f64,
    ry: f64,
    sin_phi: f64,
    cos_phi: f64,
    theta: f64,
) -> (f64, f64) {
    let (sin_t, cos_t) = theta.sin_cos();
    (
        cx + rx * cos_t * cos_phi - ry * sin_t * sin_phi,
        cy + rx * cos_t * sin_phi + ry * sin_t * cos_phi,
    )
}

/// Derivative of the ellipse with respect to the parameter angle.
fn ellipse_tangent(rx: f64, ry: f64, sin_phi: f64, cos_phi: f64, theta: f64) -> (f64, f64) {
    let (sin_t, cos_t) = theta.sin_cos();
    (
        -rx * sin_t * cos_phi - ry * cos_t * sin_phi,
        -rx * sin_t * sin_phi + ry * cos_t * cos_phi,
    )
}

/// Signed angle from vector `(ux, uy)` to `(vx, vy)` (F.6.5.4).
fn vector_angle(ux: f64, uy: f64, vx: f64, vy: f64) -> f64 {
    let dot = ux * vx + uy * vy;
    let len = (ux * ux + uy * uy).sqrt() * (vx * vx + vy * vy).sqrt();
    if len == 0.0 {
        return 0.0;
    }
    let mut cos = dot / len;
    cos = cos.clamp(-1.0, 1.0);
    let angle = cos.acos();
    if ux * vy - uy * vx < 0.0 {
        -angle
    } else {
        angle
    }
}
