//! SVG path executor.
//!
//! Walks parsed path segments and drives a [`PathSink`] - five operations
//! that map one-to-one onto a PDF content stream's path operators, except
//! the quadratic, which stays in the sink contract because the consumer
//! may prefer to upsample to cubic itself.
//!
//! The executor owns the coordinate mapping: absolute coordinates go
//! through scale, optional Y flip, and translation; relative deltas go
//! through scale and flip only, because the translation is already baked
//! into the current point. SVG's Y axis points down and PDF's points up,
//! so the flip defaults to on - and the arc sweep flag is inverted with
//! it, or every arc would bow to the wrong side.

use super::arc::arc_to_cubics;
use super::path_parser::{PathParser, PathSegment};
use crate::error::Result;

/// Receiver for executed path geometry.
pub trait PathSink {
    /// Begin a new subpath at `(x, y)`.
    fn move_to(&mut self, x: f64, y: f64);
    /// Straight segment to `(x, y)`.
    fn line_to(&mut self, x: f64, y: f64);
    /// Cubic Bezier to `(x, y)`.
    fn curve_to(&mut self, c1x: f64, c1y: f64, c2x: f64, c2y: f64, x: f64, y: f64);
    /// Quadratic Bezier to `(x, y)`.
    fn quadratic_curve_to(&mut self, cx: f64, cy: f64, x: f64, y: f64);
    /// Close the current subpath.
    fn close(&mut self);
}

/// Output-space options for path execution.
#[derive(Debug, Clone, Copy)]
pub struct PathOptions {
    /// Mirror the Y axis (SVG is y-down, PDF is y-up)
    pub flip_y: bool,
    /// Uniform scale applied to all coordinates
    pub scale: f64,
    /// Translation added to absolute X coordinates
    pub translate_x: f64,
    /// Translation added to absolute Y coordinates
    pub translate_y: f64,
}

impl Default for PathOptions {
    fn default() -> Self {
        Self {
            flip_y: true,
            scale: 1.0,
            translate_x: 0.0,
            translate_y: 0.0,
        }
    }
}

impl PathOptions {
    fn y_sign(&self) -> f64 {
        if self.flip_y { -1.0 } else { 1.0 }
    }

    /// Map an absolute input coordinate to output space.
    fn abs(&self, x: f64, y: f64) -> (f64, f64) {
        (
            x * self.scale + self.translate_x,
            y * self.y_sign() * self.scale + self.translate_y,
        )
    }

    /// Map a relative delta to output space (no translation).
    fn rel(&self, dx: f64, dy: f64) -> (f64, f64) {
        (dx * self.scale, dy * self.y_sign() * self.scale)
    }
}

/// Kind of the previously executed command, for smooth-curve reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PrevCommand {
    Cubic,
    Quadratic,
    Other,
}

/// Parse and execute a path `d` string against a sink.
///
/// Returns the final current point in output coordinates (the subpath
/// start when the path ends with a close). Inputs are programmatic;
/// syntax errors fail without recovery.
pub fn execute_path(d: &str, options: &PathOptions, sink: &mut dyn PathSink) -> Result<(f64, f64)> {
    let mut exec = Executor {
        options: *options,
        sink,
        current: (0.0, 0.0),
        subpath_start: (0.0, 0.0),
        last_cubic_control: (0.0, 0.0),
        last_quad_control: (0.0, 0.0),
        prev: PrevCommand::Other,
    };

    for segment in PathParser::new(d) {
        exec.apply(segment?);
    }
    Ok(exec.current)
}

struct Executor<'a> {
    options: PathOptions,
    sink: &'a mut dyn PathSink,
    /// Current point, output space
    current: (f64, f64),
    /// Start of the current subpath, output space
    subpath_start: (f64, f64),
    /// Second control point of the last cubic, output space
    last_cubic_control: (f64, f64),
    /// Control point of the last quadratic, output space
    last_quad_control: (f64, f64),
    prev: PrevCommand,
}

impl Executor<'_> {
    /// Resolve a target coordinate pair against the current point.
    fn target(&self, relative: bool, x: f64, y: f64) -> (f64, f64) {
        if relative {
            let (dx, dy) = self.options.rel(x, y);
            (self.current.0 + dx, self.current.1 + dy)
        } else {
            self.options.abs(x, y)
        }
    }

    fn apply(&mut self, segment: PathSegment) {
        match segment {
            PathSegment::MoveTo { relative, x, y } => {
                let p = self.target(relative, x, y);
                self.sink.move_to(p.0, p.1);
                self.current = p;
                self.subpath_start = p;
                self.prev = PrevCommand::Other;
            },
            PathSegment::LineTo { relative, x, y } => {
                let p = self.target(relative, x, y);
                self.sink.line_to(p.0, p.1);
                self.current = p;
                self.prev = PrevCommand::Other;
            },
            PathSegment::HorizontalTo { relative, x } => {
                let px = if relative {
                    self.current.0 + self.options.rel(x, 0.0).0
                } else {
                    self.options.abs(x, 0.0).0
                };
                let p = (px, self.current.1);
                self.sink.line_to(p.0, p.1);
                self.current = p;
                self.prev = PrevCommand::Other;
            },
            PathSegment::VerticalTo { relative, y } => {
                let py = if relative {
                    self.current.1 + self.options.rel(0.0, y).1
                } else {
                    self.options.abs(0.0, y).1
                };
                let p = (self.current.0, py);
                self.sink.line_to(p.0, p.1);
                self.current = p;
                self.prev = PrevCommand::Other;
            },
            PathSegment::CurveTo {
                relative,
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => {
                let c1 = self.target(relative, x1, y1);
                let c2 = self.target(relative, x2, y2);
                let p = self.target(relative, x, y);
                self.sink.curve_to(c1.0, c1.1, c2.0, c2.1, p.0, p.1);
                self.current = p;
                self.last_cubic_control = c2;
                self.prev = PrevCommand::Cubic;
            },
            PathSegment::SmoothCurveTo {
                relative,
                x2,
                y2,
                x,
                y,
            } => {
                // Reflect only when the previous command was a cubic;
                // otherwise the first control collapses onto the current
                // point (SVG 1.1, 8.3.6).
                let c1 = if self.prev == PrevCommand::Cubic {
                    reflect(self.last_cubic_control, self.current)
                } else {
                    self.current
                };
                let c2 = self.target(relative, x2, y2);
                let p = self.target(relative, x, y);
                self.sink.curve_to(c1.0, c1.1, c2.0, c2.1, p.0, p.1);
                self.current = p;
                self.last_cubic_control = c2;
                self.prev = PrevCommand::Cubic;
            },
            PathSegment::QuadTo {
                relative,
                x1,
                y1,
                x,
                y,
            } => {
                let c = self.target(relative, x1, y1);
                let p = self.target(relative, x, y);
                self.sink.quadratic_curve_to(c.0, c.1, p.0, p.1);
                self.current = p;
                self.last_quad_control = c;
                self.prev = PrevCommand::Quadratic;
            },
            PathSegment::SmoothQuadTo { relative, x, y } => {
                let c = if self.prev == PrevCommand::Quadratic {
                    reflect(self.last_quad_control, self.current)
                } else {
                    self.current
                };
                let p = self.target(relative, x, y);
                self.sink.quadratic_curve_to(c.0, c.1, p.0, p.1);
                self.current = p;
                self.last_quad_control = c;
                self.prev = PrevCommand::Quadratic;
            },
            PathSegment::Arc {
                relative,
                rx,
                ry,
                rotation,
                large_arc,
                sweep,
                x,
                y,
            } => {
                let p = self.target(relative, x, y);
                // Mirroring the Y axis reverses orientation; the sweep
                // flag flips with it so the visually correct side is
                // drawn.
                let sweep = if self.options.flip_y { !sweep } else { sweep };
                let scale = self.options.scale.abs();
                let cubics = arc_to_cubics(
                    self.current.0,
                    self.current.1,
                    rx * scale,
                    ry * scale,
                    rotation,
                    large_arc,
                    sweep,
                    p.0,
                    p.1,
                );
                for cubic in &cubics {
                    self.sink
                        .curve_to(cubic.x1, cubic.y1, cubic.x2, cubic.y2, cubic.x, cubic.y);
                }
                if let Some(last) = cubics.last() {
                    self.last_cubic_control = (last.x2, last.y2);
                }
                self.current = p;
                self.prev = PrevCommand::Other;
            },
            PathSegment::Close => {
                self.sink.close();
                self.current = self.subpath_start;
                self.prev = PrevCommand::Other;
            },
        }
    }
}

fn reflect(control: (f64, f64), around: (f64, f64)) -> (f64, f64) {
    (2.0 * around.0 - control.0, 2.0 * around.1 - control.1)
}
