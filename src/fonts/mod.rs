//! Font machinery: CMaps, font program parsing, and embedding.
//!
//! The reading side lives in [`cmap`] and [`cmap_parser`] (byte codes to
//! Unicode and CIDs) and [`type1`] (legacy Type 1 programs). The writing
//! side is [`embedder`], which subsets a [`font_program::FontProgram`]
//! and assembles the PDF font object graph.

pub mod cff;
pub mod cmap;
pub mod cmap_parser;
pub mod eexec;
pub mod embedder;
pub mod font_program;
pub mod pfb;
pub mod type1;
pub mod type1_lexer;
pub mod truetype_subset;

#[cfg(test)]
pub(crate) mod test_font;

pub use cmap::{CMap, CidRange, CodespaceRange};
pub use cmap_parser::parse_cmap;
pub use embedder::{EmbeddedFont, FontFlags, FontObjects};
pub use font_program::{FontKind, FontProgram};
pub use pfb::{PfbSegments, read_pfb};
pub use type1::{Encoding, Type1Font};
pub use type1_lexer::{Type1Lexer, Type1Token};
