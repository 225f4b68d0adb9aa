//! Uniform view over the font program formats the embedder accepts.
//!
//! Sniffs TrueType/OpenType (SFNT), bare CFF (Type 1 and CID flavors),
//! and Type 1 (PFB/PFA), and exposes one metrics-and-glyphs surface so the
//! embedding pipeline never branches on format internals. SFNT parsing
//! rides on `ttf-parser`; CFF and Type 1 use the in-crate parsers.

use super::cff::CffFont;
use super::type1::{Encoding, Type1Font};
use crate::error::{Error, Result};
use std::collections::HashMap;
use ttf_parser::Face;

/// Concrete format behind a [`FontProgram`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontKind {
    /// SFNT with a `glyf` table
    TrueType,
    /// SFNT whose outlines live in a CFF table
    OpenTypeCff,
    /// Bare CFF, Type 1 flavor
    CffType1,
    /// Bare CFF, CID-keyed
    CffCid,
    /// Type 1 program (PFB or PFA)
    Type1,
}

/// A parsed font program with the metrics embedding needs.
#[derive(Debug, Clone)]
pub struct FontProgram {
    /// Concrete format
    pub kind: FontKind,
    data: Vec<u8>,
    num_glyphs: u16,
    units_per_em: u16,
    postscript_name: Option<String>,
    family_name: Option<String>,
    italic_angle: f32,
    ascent: i16,
    descent: i16,
    cap_height: i16,
    x_height: i16,
    stem_v: i16,
    bbox: (i16, i16, i16, i16),
    fixed_pitch: bool,
    cmap: HashMap<u32, u16>,
    advances: Vec<u16>,
}

impl FontProgram {
    /// Parse a font program, sniffing its container format.
    pub fn parse(data: Vec<u8>) -> Result<Self> {
        match data.get(..4) {
            Some([0x00, 0x01, 0x00, 0x00]) | Some(b"true") | Some(b"OTTO") => {
                Self::parse_sfnt(data)
            },
            Some([0x01, 0x00, ..]) => Self::parse_cff(data),
            Some([0x80, ..]) | Some([b'%', b'!', ..]) => Self::parse_type1(data),
            _ => Err(Error::Font("unrecognized font program format".to_string())),
        }
    }

    fn parse_sfnt(data: Vec<u8>) -> Result<Self> {
        let face = Face::parse(&data, 0)
            .map_err(|e| Error::Font(format!("SFNT parse failed: {}", e)))?;

        let kind = if face.tables().glyf.is_some() {
            FontKind::TrueType
        } else {
            FontKind::OpenTypeCff
        };

        // Unicode code point to glyph id, across every unicode subtable so
        // supplementary-plane glyphs (emoji) resolve too.
        let mut cmap = HashMap::new();
        if let Some(cmap_table) = face.tables().cmap {
            for subtable in cmap_table.subtables {
                if !subtable.is_unicode() {
                    continue;
                }
                subtable.codepoints(|cp| {
                    if let Some(glyph) = subtable.glyph_index(cp) {
                        cmap.entry(cp).or_insert(glyph.0);
                    }
                });
            }
        }

        let num_glyphs = face.number_of_glyphs();
        let advances = (0..num_glyphs)
            .map(|gid| {
                face.glyph_hor_advance(ttf_parser::GlyphId(gid))
                    .unwrap_or(0)
            })
            .collect();

        let name = |id: u16| {
            face.names()
                .into_iter()
                .find(|n| n.name_id == id)
                .and_then(|n| n.to_string())
        };
        let postscript_name = name(ttf_parser::name_id::POST_SCRIPT_NAME);
        let family_name = name(ttf_parser::name_id::FAMILY);

        let bbox = face.global_bounding_box();
        let ascent = face.ascender();
        let is_bold = face.is_bold();

        Ok(Self {
            kind,
            num_glyphs,
            units_per_em: face.units_per_em(),
            postscript_name,
            family_name,
            italic_angle: face.italic_angle().unwrap_or(0.0),
            ascent,
            descent: face.descender(),
            cap_height: face.capital_height().unwrap_or(ascent),
            x_height: face.x_height().unwrap_or(ascent / 2),
            stem_v: if is_bold { 140 } else { 80 },
            bbox: (bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max),
            fixed_pitch: face.is_monospaced(),
            cmap,
            advances,
            data,
        })
    }

    fn parse_cff(data: Vec<u8>) -> Result<Self> {
        let cff = CffFont::parse(&data)?;

        let kind = if cff.is_cid {
            FontKind::CffCid
        } else {
            FontKind::CffType1
        };

        let num_glyphs = cff.num_glyphs();
        let advances: Vec<u16> = (0..num_glyphs)
            .map(|gid| cff.advance_width(gid).round().max(0.0) as u16)
            .collect();

        // CID-keyed fonts address glyphs by CID; Type 1 flavor by its
        // single-byte encoding. Either way the map answers glyph_id().
        let mut cmap = HashMap::new();
        if cff.is_cid {
            for (gid, &cid) in cff.charset().iter().enumerate() {
                cmap.entry(cid as u32).or_insert(gid as u16);
            }
        } else {
            for (&code, &gid) in cff.encoding_map() {
                cmap.insert(code as u32, gid);
            }
        }

        let postscript_name = cff.postscript_name();
        let units_per_em = cff.units_per_em;
        let bbox = cff
            .font_bbox()
            .map(|b| (b[0] as i16, b[1] as i16, b[2] as i16, b[3] as i16))
            .unwrap_or((
                0,
                -((units_per_em / 4) as i16),
                units_per_em as i16,
                (units_per_em as i32 * 3 / 4) as i16,
            ));

        Ok(Self {
            kind,
            num_glyphs,
            units_per_em,
            postscript_name,
            family_name: None,
            italic_angle: 0.0,
            ascent: bbox.3,
            descent: bbox.1,
            cap_height: bbox.3,
            x_height: (bbox.3 as i32 / 2) as i16,
            stem_v: 80,
            bbox,
            fixed_pitch: false,
            cmap,
            advances,
            data,
        })
    }

    fn parse_type1(data: Vec<u8>) -> Result<Self> {
        let font = Type1Font::parse(&data)?;

        let num_glyphs = font.charstrings.len() as u16;
        let units_per_em = if font.font_matrix[0] > 0.0 {
            (1.0 / font.font_matrix[0]).round() as u16
        } else {
            1000
        };

        // Glyph ids are charstring positions; the encoding provides the
        // code-point route in.
        let glyph_index = |name: &str| -> Option<u16> {
            font.charstrings.get_index_of(name).map(|i| i as u16)
        };
        let mut cmap = HashMap::new();
        match &font.encoding {
            Encoding::Custom(table) => {
                for (&code, name) in table {
                    if let Some(gid) = glyph_index(name) {
                        cmap.insert(code as u32, gid);
                    }
                }
            },
            Encoding::Standard => {
                for (code, name) in standard_encoding_names() {
                    if let Some(gid) = glyph_index(name) {
                        cmap.insert(code as u32, gid);
                    }
                }
            },
        }

        let advances: Vec<u16> = font
            .charstrings
            .values()
            .map(|cs| type1_charstring_width(cs).unwrap_or(0.0).round().max(0.0) as u16)
            .collect();

        let bbox = (
            font.font_bbox[0] as i16,
            font.font_bbox[1] as i16,
            font.font_bbox[2] as i16,
            font.font_bbox[3] as i16,
        );

        Ok(Self {
            kind: FontKind::Type1,
            num_glyphs,
            units_per_em,
            postscript_name: font.font_name.clone(),
            family_name: font.font_info.family_name.clone(),
            italic_angle: font.font_info.italic_angle as f32,
            ascent: bbox.3,
            descent: bbox.1,
            cap_height: bbox.3,
            x_height: (bbox.3 as i32 / 2) as i16,
            stem_v: font.private.std_vw.map(|w| w as i16).unwrap_or(80),
            bbox,
            fixed_pitch: font.font_info.is_fixed_pitch,
            cmap,
            advances,
            data,
        })
    }

    /// The raw font program bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of glyphs.
    pub fn glyph_count(&self) -> u16 {
        self.num_glyphs
    }

    /// Units per em.
    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    /// Font bounding box in font units.
    pub fn bbox(&self) -> (i16, i16, i16, i16) {
        self.bbox
    }

    /// PostScript name.
    pub fn postscript_name(&self) -> &str {
        self.postscript_name.as_deref().unwrap_or("Unknown")
    }

    /// Family name, when the program records one.
    pub fn family_name(&self) -> Option<&str> {
        self.family_name.as_deref()
    }

    /// Italic angle in degrees.
    pub fn italic_angle(&self) -> f32 {
        self.italic_angle
    }

    /// Typographic ascent in font units.
    pub fn ascent(&self) -> i16 {
        self.ascent
    }

    /// Typographic descent in font units (negative).
    pub fn descent(&self) -> i16 {
        self.descent
    }

    /// Capital height in font units.
    pub fn cap_height(&self) -> i16 {
        self.cap_height
    }

    /// x-height in font units.
    pub fn x_height(&self) -> i16 {
        self.x_height
    }

    /// Dominant vertical stem width (heuristic for SFNT).
    pub fn stem_v(&self) -> i16 {
        self.stem_v
    }

    /// True for monospaced designs.
    pub fn is_fixed_pitch(&self) -> bool {
        self.fixed_pitch
    }

    /// Glyph id for a Unicode code point.
    pub fn glyph_id(&self, code_point: u32) -> Option<u16> {
        self.cmap.get(&code_point).copied()
    }

    /// Advance width of a glyph in font units.
    pub fn advance_width(&self, gid: u16) -> u16 {
        self.advances.get(gid as usize).copied().unwrap_or(0)
    }
}

/// Advance width from a decrypted Type 1 charstring.
///
/// The charstring opens with `sbx wx hsbw` (or `sbx sby wx wy sbw`);
/// the width is the second (or third) operand.
fn type1_charstring_width(cs: &[u8]) -> Option<f64> {
    let mut operands: Vec<f64> = Vec::new();
    let mut pos = 0;

    while pos < cs.len() && operands.len() <= 8 {
        let b0 = cs[pos];
        match b0 {
            32..=246 => {
                operands.push(b0 as f64 - 139.0);
                pos += 1;
            },
            247..=250 => {
                let b1 = *cs.get(pos + 1)? as f64;
                operands.push((b0 as f64 - 247.0) * 256.0 + b1 + 108.0);
                pos += 2;
            },
            251..=254 => {
                let b1 = *cs.get(pos + 1)? as f64;
                operands.push(-(b0 as f64 - 251.0) * 256.0 - b1 - 108.0);
                pos += 2;
            },
            255 => {
                let mut word = [0u8; 4];
                word.copy_from_slice(cs.get(pos + 1..pos + 5)?);
                operands.push(i32::from_be_bytes(word) as f64);
                pos += 5;
            },
            13 => {
                // hsbw: sbx wx
                return operands.get(1).copied();
            },
            12 => {
                let b1 = *cs.get(pos + 1)?;
                if b1 == 7 {
                    // sbw: sbx sby wx wy
                    return operands.get(2).copied();
                }
                pos += 2;
            },
            _ => return None,
        }
    }
    None
}

/// Adobe StandardEncoding, printable range: code point to glyph name.
fn standard_encoding_names() -> impl Iterator<Item = (u8, &'static str)> {
    const NAMES: [&str; 95] = [
        "space", "exclam", "quotedbl", "numbersign", "dollar", "percent", "ampersand",
        "quoteright", "parenleft", "parenright", "asterisk", "plus", "comma", "hyphen", "period",
        "slash", "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine",
        "colon", "semicolon", "less", "equal", "greater", "question", "at", "A", "B", "C", "D",
        "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P", "Q", "R", "S", "T", "U", "V",
        "W", "X", "Y", "Z", "bracketleft", "backslash", "bracketright", "asciicircum",
        "underscore", "quoteleft", "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l",
        "m", "n", "o", "p", "q", "r", "s", "t", "u", "v", "w", "x", "y", "z", "braceleft", "bar",
        "braceright", "asciitilde",
    ];
    NAMES
        .into_iter()
        .enumerate()
        .map(|(i, name)| (32 + i as u8, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::eexec;
    use crate::fonts::test_font::build_test_truetype;

    #[test]
    fn test_sfnt_kind_and_metrics() {
        let program = FontProgram::parse(build_test_truetype()).unwrap();
        assert_eq!(program.kind, FontKind::TrueType);
        assert_eq!(program.glyph_count(), 5);
        assert_eq!(program.units_per_em(), 1000);
        assert_eq!(program.postscript_name(), "TestFont");
        assert_eq!(program.ascent(), 800);
        assert_eq!(program.descent(), -200);
    }

    #[test]
    fn test_sfnt_glyph_lookup_and_widths() {
        let program = FontProgram::parse(build_test_truetype()).unwrap();
        assert_eq!(program.glyph_id('H' as u32), Some(1));
        assert_eq!(program.glyph_id('e' as u32), Some(2));
        assert_eq!(program.glyph_id('l' as u32), Some(3));
        assert_eq!(program.glyph_id('o' as u32), Some(4));
        assert_eq!(program.glyph_id('Z' as u32), None);

        // Fixture widths are 600 + 10 * gid
        assert_eq!(program.advance_width(0), 600);
        assert_eq!(program.advance_width(3), 630);
        assert_eq!(program.advance_width(99), 0);
    }

    #[test]
    fn test_type1_program() {
        // A tiny Type 1 with A and B charstrings carrying hsbw widths.
        let ascii = b"%!PS-AdobeFont-1.0\n\
            /FontName /TinyType1 def\n\
            /FontMatrix [0.001 0 0 0.001 0 0] def\n\
            /FontBBox {0 -200 800 800} def\n\
            /Encoding StandardEncoding def\n\
            currentfile eexec\n";

        // hsbw: sb=0 (139), wx=540 -> 247-encoding: 540-108 = 432 = 1*256+176
        let cs = [139u8, 248, 176, 13];
        let enc = eexec::encrypt(&cs, eexec::CHARSTRING_KEY, 4);
        let mut body = Vec::new();
        body.extend_from_slice(b"/Private 2 dict dup begin /lenIV 4 def end\n");
        body.extend_from_slice(b"/CharStrings 2 dict dup begin\n");
        body.extend_from_slice(format!("/.notdef {} RD ", enc.len()).as_bytes());
        body.extend_from_slice(&enc);
        body.extend_from_slice(b" ND\n");
        body.extend_from_slice(format!("/A {} RD ", enc.len()).as_bytes());
        body.extend_from_slice(&enc);
        body.extend_from_slice(b" ND\nend\n");
        let binary = eexec::encrypt(&body, eexec::EEXEC_KEY, 4);

        let mut data = ascii.to_vec();
        data.extend_from_slice(&binary);

        let program = FontProgram::parse(data).unwrap();
        assert_eq!(program.kind, FontKind::Type1);
        assert_eq!(program.postscript_name(), "TinyType1");
        assert_eq!(program.glyph_count(), 2);
        // 'A' resolves through standard encoding to the /A charstring
        assert_eq!(program.glyph_id('A' as u32), Some(1));
        assert_eq!(program.advance_width(1), 540);
    }

    #[test]
    fn test_unknown_format() {
        assert!(FontProgram::parse(b"GIF89a not a font".to_vec()).is_err());
    }

    #[test]
    fn test_type1_width_decoding() {
        // 255 full-int form
        let cs = [139u8, 255, 0x00, 0x00, 0x02, 0x58, 13];
        assert_eq!(type1_charstring_width(&cs), Some(600.0));
        // No hsbw
        assert_eq!(type1_charstring_width(&[14]), None);
    }
}
