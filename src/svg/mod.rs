//! SVG path engine: `d` attribute parsing and execution.
//!
//! [`path_parser`] tokenizes the path grammar (including the compact
//! arc-flag form), [`arc`] converts elliptical arcs to cubics, and
//! [`executor`] runs segments against a [`executor::PathSink`] with the
//! Y-flip/scale/translate mapping a PDF content stream needs.

pub mod arc;
pub mod executor;
pub mod path_parser;

pub use arc::{Cubic, arc_to_cubics};
pub use executor::{PathOptions, PathSink, execute_path};
pub use path_parser::{PathParser, PathSegment};
