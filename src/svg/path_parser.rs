//! SVG path data (`d` attribute) parser.
//!
//! Tokenizes numbers (sign, decimal point, scientific notation), command
//! letters, and the compact arc-flag form - the two flag parameters of an
//! arc are single `0`/`1` digits that need no separator, so
//! `a1 1 0 00.5.5` is five parameters and an endpoint.
//!
//! Implicit command repetition is resolved here: parameter sets following
//! a completed command repeat it, with `M` degrading to `L` (and `m` to
//! `l`) per SVG 1.1.

use crate::error::{Error, Result};

/// One parsed path segment. Coordinates are as written; the executor
/// resolves relative origins and output transforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSegment {
    /// `M`/`m`
    MoveTo {
        /// Relative origin (`m`)
        relative: bool,
        /// Target x
        x: f64,
        /// Target y
        y: f64,
    },
    /// `L`/`l`
    LineTo {
        /// Relative origin
        relative: bool,
        /// Target x
        x: f64,
        /// Target y
        y: f64,
    },
    /// `H`/`h`
    HorizontalTo {
        /// Relative origin
        relative: bool,
        /// Target x
        x: f64,
    },
    /// `V`/`v`
    VerticalTo {
        /// Relative origin
        relative: bool,
        /// Target y
        y: f64,
    },
    /// `C`/`c`
    CurveTo {
        /// Relative origin
        relative: bool,
        /// First control x
        x1: f64,
        /// First control y
        y1: f64,
        /// Second control x
        x2: f64,
        /// Second control y
        y2: f64,
        /// Target x
        x: f64,
        /// Target y
        y: f64,
    },
    /// `S`/`s`
    SmoothCurveTo {
        /// Relative origin
        relative: bool,
        /// Second control x
        x2: f64,
        /// Second control y
        y2: f64,
        /// Target x
        x: f64,
        /// Target y
        y: f64,
    },
    /// `Q`/`q`
    QuadTo {
        /// Relative origin
        relative: bool,
        /// Control x
        x1: f64,
        /// Control y
        y1: f64,
        /// Target x
        x: f64,
        /// Target y
        y: f64,
    },
    /// `T`/`t`
    SmoothQuadTo {
        /// Relative origin
        relative: bool,
        /// Target x
        x: f64,
        /// Target y
        y: f64,
    },
    /// `A`/`a`
    Arc {
        /// Relative origin
        relative: bool,
        /// X radius (non-negative)
        rx: f64,
        /// Y radius (non-negative)
        ry: f64,
        /// X-axis rotation in degrees
        rotation: f64,
        /// Large-arc flag
        large_arc: bool,
        /// Sweep flag
        sweep: bool,
        /// Target x
        x: f64,
        /// Target y
        y: f64,
    },
    /// `Z`/`z`
    Close,
}

/// Iterator over the segments of a path string.
///
/// Syntax errors end iteration with an `Err` item; segments before the
/// error are still rendered, which is the SVG error-handling model.
#[derive(Debug, Clone)]
pub struct PathParser<'a> {
    bytes: &'a [u8],
    pos: usize,
    /// Command to repeat for an implicit parameter set.
    repeat: Option<u8>,
    failed: bool,
}

impl<'a> PathParser<'a> {
    /// Parse the given `d` attribute string.
    pub fn new(d: &'a str) -> Self {
        Self {
            bytes: d.as_bytes(),
            pos: 0,
            repeat: None,
            failed: false,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r' | b',')) {
            self.pos += 1;
        }
    }

    fn error(&mut self, reason: &'static str) -> Error {
        self.failed = true;
        Error::SvgPath {
            offset: self.pos,
            reason,
        }
    }

    fn starts_number(byte: u8) -> bool {
        byte.is_ascii_digit() || matches!(byte, b'+' | b'-' | b'.')
    }

    /// Longest slice matching the SVG number grammar, parsed by the
    /// standard library (which handles the corner cases of float
    /// rounding far better than a hand-rolled accumulator).
    fn parse_number(&mut self) -> Result<f64> {
        let start = self.pos;

        if matches!(self.peek(), Some(b'+' | b'-')) {
            self.pos += 1;
        }
        let mut any_digit = false;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
            any_digit = true;
        }
        if self.peek() == Some(b'.') {
            self.pos += 1;
            while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                self.pos += 1;
                any_digit = true;
            }
        }
        if !any_digit {
            self.pos = start;
            return Err(self.error("expected number"));
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let mark = self.pos;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            if self.peek().is_some_and(|b| b.is_ascii_digit()) {
                while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                    self.pos += 1;
                }
            } else {
                // `e` belonged to something else; numbers never end here
                self.pos = mark;
            }
        }

        let text = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap_or("");
        text.parse().map_err(|_| self.error("malformed number"))
    }

    /// Arc flags are single digits with no separator required.
    fn parse_flag(&mut self) -> Result<bool> {
        self.skip_separators();
        match self.peek() {
            Some(b'0') => {
                self.pos += 1;
                Ok(false)
            },
            Some(b'1') => {
                self.pos += 1;
                Ok(true)
            },
            _ => Err(self.error("expected 0 or 1 flag")),
        }
    }

    fn number(&mut self) -> Result<f64> {
        self.skip_separators();
        self.parse_number()
    }

    fn pair(&mut self) -> Result<(f64, f64)> {
        let x = self.number()?;
        let y = self.number()?;
        Ok((x, y))
    }

    fn parse_segment(&mut self, command: u8) -> Result<PathSegment> {
        let relative = command.is_ascii_lowercase();
        // The command to repeat when parameters follow without a letter.
        self.repeat = Some(match command {
            b'M' => b'L',
            b'm' => b'l',
            other => other,
        });

        match command.to_ascii_uppercase() {
            b'M' => {
                let (x, y) = self.pair()?;
                Ok(PathSegment::MoveTo { relative, x, y })
            },
            b'L' => {
                let (x, y) = self.pair()?;
                Ok(PathSegment::LineTo { relative, x, y })
            },
            b'H' => Ok(PathSegment::HorizontalTo {
                relative,
                x: self.number()?,
            }),
            b'V' => Ok(PathSegment::VerticalTo {
                relative,
                y: self.number()?,
            }),
            b'C' => {
                let (x1, y1) = self.pair()?;
                let (x2, y2) = self.pair()?;
                let (x, y) = self.pair()?;
                Ok(PathSegment::CurveTo {
                    relative,
                    x1,
                    y1,
                    x2,
                    y2,
                    x,
                    y,
                })
            },
            b'S' => {
                let (x2, y2) = self.pair()?;
                let (x, y) = self.pair()?;
                Ok(PathSegment::SmoothCurveTo {
                    relative,
                    x2,
                    y2,
                    x,
                    y,
                })
            },
            b'Q' => {
                let (x1, y1) = self.pair()?;
                let (x, y) = self.pair()?;
                Ok(PathSegment::QuadTo {
                    relative,
                    x1,
                    y1,
                    x,
                    y,
                })
            },
            b'T' => {
                let (x, y) = self.pair()?;
                Ok(PathSegment::SmoothQuadTo { relative, x, y })
            },
            b'A' => {
                let rx = self.number()?.abs();
                let ry = self.number()?.abs();
                let rotation = self.number()?;
                let large_arc = self.parse_flag()?;
                let sweep = self.parse_flag()?;
                let (x, y) = self.pair()?;
                Ok(PathSegment::Arc {
                    relative,
                    rx,
                    ry,
                    rotation,
                    large_arc,
                    sweep,
                    x,
                    y,
                })
            },
            _ => Err(self.error("unknown path command")),
        }
    }
}

impl Iterator for PathParser<'_> {
    type Item = Result<PathSegment>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        self.skip_separators();
        let byte = self.peek()?;

        if byte.is_ascii_alphabetic() {
            self.pos += 1;
            if byte == b'Z' || byte == b'z' {
                self.repeat = None;
                return Some(Ok(PathSegment::Close));
            }
            return Some(self.parse_segment(byte));
        }

        if Self::starts_number(byte) {
            // Implicit repetition of the previous command.
            return match self.repeat {
                Some(command) => Some(self.parse_segment(command)),
                None => Some(Err(self.error("parameters without a command"))),
            };
        }

        Some(Err(self.error("unexpected byte in path data")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(d: &str) -> Vec<PathSegment> {
        PathParser::new(d).collect::<Result<Vec<_>>>().unwrap()
    }

    #[test]
    fn test_basic_commands() {
        let segments = parse_all("M 10 20 L 30 40 Z");
        assert_eq!(
            segments,
            vec![
                PathSegment::MoveTo {
                    relative: false,
                    x: 10.0,
                    y: 20.0
                },
                PathSegment::LineTo {
                    relative: false,
                    x: 30.0,
                    y: 40.0
                },
                PathSegment::Close,
            ]
        );
    }

    #[test]
    fn test_comma_and_whitespace_separators() {
        let segments = parse_all("M10,20L30,40");
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn test_scientific_notation() {
        let segments = parse_all("M 1e2 -2.5e-1");
        assert_eq!(
            segments[0],
            PathSegment::MoveTo {
                relative: false,
                x: 100.0,
                y: -0.25
            }
        );
    }

    #[test]
    fn test_compact_numbers() {
        // Dots begin new numbers when the previous one already has one
        let segments = parse_all("M.5.25");
        assert_eq!(
            segments[0],
            PathSegment::MoveTo {
                relative: false,
                x: 0.5,
                y: 0.25
            }
        );
    }

    #[test]
    fn test_compact_arc_flags() {
        // The scenario from the spec of SVG 1.1 compact form:
        // a1 1 0 00.5.5 == rx=1 ry=1 rot=0 large=0 sweep=0 x=.5 y=.5
        let segments = parse_all("M0 0 a1 1 0 00.5.5");
        assert_eq!(segments.len(), 2);
        assert_eq!(
            segments[0],
            PathSegment::MoveTo {
                relative: false,
                x: 0.0,
                y: 0.0
            }
        );
        assert_eq!(
            segments[1],
            PathSegment::Arc {
                relative: true,
                rx: 1.0,
                ry: 1.0,
                rotation: 0.0,
                large_arc: false,
                sweep: false,
                x: 0.5,
                y: 0.5
            }
        );
    }

    #[test]
    fn test_arc_flags_with_separators() {
        let segments = parse_all("M0 0 A 25 25 -30 0 1 50 -25");
        assert_eq!(
            segments[1],
            PathSegment::Arc {
                relative: false,
                rx: 25.0,
                ry: 25.0,
                rotation: -30.0,
                large_arc: false,
                sweep: true,
                x: 50.0,
                y: -25.0
            }
        );
    }

    #[test]
    fn test_implicit_repetition_becomes_line() {
        let segments = parse_all("M 0 0 10 10 20 20");
        assert_eq!(segments.len(), 3);
        assert!(matches!(segments[1], PathSegment::LineTo { relative: false, .. }));
        assert!(matches!(segments[2], PathSegment::LineTo { relative: false, .. }));

        let segments = parse_all("m 0 0 10 10");
        assert!(matches!(segments[1], PathSegment::LineTo { relative: true, .. }));
    }

    #[test]
    fn test_implicit_repetition_same_command() {
        let segments = parse_all("L 1 2 3 4");
        assert_eq!(segments.len(), 2);
        assert!(matches!(segments[1], PathSegment::LineTo { .. }));

        let segments = parse_all("C 1 2 3 4 5 6 7 8 9 10 11 12");
        assert_eq!(segments.len(), 2);
        assert!(matches!(segments[1], PathSegment::CurveTo { .. }));
    }

    #[test]
    fn test_curve_and_smooth() {
        let segments = parse_all("C 1 2 3 4 5 6 S 7 8 9 10 Q 1 1 2 2 T 3 3");
        assert_eq!(segments.len(), 4);
        assert!(matches!(segments[1], PathSegment::SmoothCurveTo { .. }));
        assert!(matches!(segments[3], PathSegment::SmoothQuadTo { .. }));
    }

    #[test]
    fn test_negative_radius_made_positive() {
        let segments = parse_all("M0 0 A -5 -5 0 0 0 1 1");
        match segments[1] {
            PathSegment::Arc { rx, ry, .. } => {
                assert_eq!(rx, 5.0);
                assert_eq!(ry, 5.0);
            },
            _ => panic!("expected arc"),
        }
    }

    #[test]
    fn test_error_stops_iteration() {
        let mut parser = PathParser::new("M 0 0 L x");
        assert!(parser.next().unwrap().is_ok());
        assert!(parser.next().unwrap().is_err());
        assert!(parser.next().is_none());
    }

    #[test]
    fn test_parameters_before_any_command() {
        let mut parser = PathParser::new("10 20");
        assert!(parser.next().unwrap().is_err());
    }

    #[test]
    fn test_empty_path() {
        assert!(PathParser::new("").next().is_none());
        assert!(PathParser::new("   ").next().is_none());
    }
}
