//! Font embedding pipeline.
//!
//! An [`EmbeddedFont`] wraps a [`FontProgram`], records which glyphs the
//! document actually uses, and at build time produces everything a PDF
//! font object graph needs: the subsetted font stream, the `/W` width
//! array, the ToUnicode CMap, the CIDToGIDMap for renumbered TrueType
//! subsets, and the five dictionaries themselves. Cross-links between the
//! objects are established only at register time, so the caller controls
//! object numbering.
//!
//! Content streams are written with the font's *original* glyph ids
//! (Identity-H: CID = original GID). A TrueType subset renumbers glyphs,
//! and the CIDToGIDMap stream is what routes the original ids to the new
//! ones.

use super::font_program::{FontKind, FontProgram};
use super::truetype_subset;
use crate::error::Result;
use crate::object::{Dict, Object, ObjectRef, Stream};
use bitflags::bitflags;
use std::collections::{BTreeSet, HashMap};

bitflags! {
    /// Font descriptor flag word (subset the embedder sets).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FontFlags: u32 {
        /// Monospaced design
        const FIXED_PITCH = 1 << 0;
        /// Uses glyphs outside the Adobe standard set; always set so
        /// viewers never substitute an encoding
        const SYMBOLIC = 1 << 2;
        /// Slanted design
        const ITALIC = 1 << 6;
    }
}

/// Unicode ranges enumerated by the full-font (non-subset) variant.
const FULL_FONT_RANGES: [(u32, u32); 16] = [
    (0x0020, 0x007E), // Basic Latin
    (0x00A0, 0x00FF), // Latin-1 Supplement
    (0x0100, 0x017F), // Latin Extended-A
    (0x0180, 0x024F), // Latin Extended-B
    (0x0250, 0x02AF), // IPA Extensions
    (0x0370, 0x03FF), // Greek and Coptic
    (0x0400, 0x04FF), // Cyrillic
    (0x2000, 0x206F), // General Punctuation
    (0x20A0, 0x20CF), // Currency Symbols
    (0x2190, 0x21FF), // Arrows
    (0x2200, 0x22FF), // Mathematical Operators
    (0x2500, 0x257F), // Box Drawing
    (0x2600, 0x26FF), // Miscellaneous Symbols
    (0xFB00, 0xFB4F), // Alphabetic Presentation Forms (ligatures)
    (0xFEFF, 0xFEFF), // Byte order mark
    (0xFFFD, 0xFFFD), // Replacement character
];

/// A font being collected for embedding.
#[derive(Debug)]
pub struct EmbeddedFont {
    program: FontProgram,
    used_gids: BTreeSet<u32>,
    gid_to_code_point: HashMap<u32, u32>,
    subset_tag: Option<String>,
    subset: bool,
}

/// The assembled font object graph, cross-links still open.
#[derive(Debug)]
pub struct FontObjects {
    /// The Type0 (composite) font dictionary
    pub type0: Dict,
    /// The descendant CIDFont dictionary
    pub cid_font: Dict,
    /// The font descriptor dictionary
    pub descriptor: Dict,
    /// The embedded font program stream
    pub font_file: Stream,
    /// Descriptor key for the font file (`FontFile2` or `FontFile3`)
    pub font_file_key: &'static str,
    /// The ToUnicode CMap stream
    pub to_unicode: Stream,
    /// CIDToGIDMap stream (renumbered TrueType subsets only)
    pub cid_to_gid: Option<Stream>,
}

impl EmbeddedFont {
    /// Wrap a font program for subset embedding.
    ///
    /// `.notdef` (gid 0) is considered used from the start.
    pub fn new(program: FontProgram) -> Self {
        let mut used_gids = BTreeSet::new();
        used_gids.insert(0);
        Self {
            program,
            used_gids,
            gid_to_code_point: HashMap::new(),
            subset_tag: None,
            subset: true,
        }
    }

    /// Wrap a font program for full (non-subset) embedding.
    ///
    /// Instead of tracking usage, a fixed list of Unicode ranges is
    /// enumerated at build time; the first code point mapping to a glyph
    /// wins for that glyph.
    pub fn new_full(program: FontProgram) -> Self {
        let mut font = Self::new(program);
        font.subset = false;
        font
    }

    /// The wrapped program (may be shared across embedded fonts; each
    /// wrapper keeps its own usage tracking).
    pub fn program(&self) -> &FontProgram {
        &self.program
    }

    /// Encode a text run for an Identity-H content stream.
    ///
    /// Walks code points, resolves glyph ids (0 for unmapped), records
    /// usage and the first-seen code point per glyph, and returns the
    /// big-endian two-byte glyph string.
    pub fn encode_text(&mut self, text: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(text.len() * 2);
        for ch in text.chars() {
            let code_point = ch as u32;
            let gid = self.program.glyph_id(code_point).unwrap_or(0) as u32;
            self.used_gids.insert(gid);
            self.gid_to_code_point.entry(gid).or_insert(code_point);
            out.extend_from_slice(&(gid as u16).to_be_bytes());
        }
        out
    }

    /// Glyph ids recorded so far (gid 0 always present).
    pub fn used_gids(&self) -> &BTreeSet<u32> {
        &self.used_gids
    }

    /// Pin the subset tag (tests and reproducible builds).
    pub fn set_subset_tag(&mut self, tag: impl Into<String>) {
        self.subset_tag = Some(tag.into());
    }

    /// The six-uppercase-letter subset tag, assigned on first use.
    ///
    /// Derived from a hash of the used-glyph set, so identical subsets
    /// produce identical tags and tests can predict the value; callers
    /// needing different tags per embedding inject one via
    /// [`EmbeddedFont::set_subset_tag`].
    pub fn subset_tag(&mut self) -> &str {
        if self.subset_tag.is_none() {
            self.subset_tag = Some(hash_tag(&self.used_gids));
        }
        self.subset_tag.as_deref().unwrap()
    }

    /// `BaseFont` value: `TAG+PostScriptName` for subsets.
    pub fn base_font_name(&mut self) -> String {
        let ps_name = self.program.postscript_name().to_string();
        if self.subset {
            format!("{}+{}", self.subset_tag(), ps_name)
        } else {
            ps_name
        }
    }

    /// Run the pipeline and assemble the object graph.
    pub fn build(&mut self) -> Result<FontObjects> {
        if !self.subset {
            self.collect_full_font_ranges();
        }

        let base_font = self.base_font_name();

        // Subset (or pass through) the font program.
        let (font_file, font_file_key, cid_subtype, gid_map) = self.build_font_file()?;

        // CIDToGIDMap only exists for renumbered TrueType subsets.
        let cid_to_gid = gid_map.as_ref().map(|map| build_cid_to_gid(map));

        let widths = self.build_widths();
        let to_unicode = build_to_unicode(&self.gid_to_code_point);

        // Descriptor metrics scale into 1000-per-em glyph space.
        let program = &self.program;
        let scale = 1000.0 / program.units_per_em() as f64;
        let s = |v: i16| Object::Integer((v as f64 * scale).round() as i64);

        let mut flags = FontFlags::SYMBOLIC;
        if program.is_fixed_pitch() {
            flags |= FontFlags::FIXED_PITCH;
        }
        if program.italic_angle() != 0.0 {
            flags |= FontFlags::ITALIC;
        }

        let mut descriptor = Dict::new();
        descriptor.insert("Type".to_string(), Object::Name("FontDescriptor".to_string()));
        descriptor.insert("FontName".to_string(), Object::Name(base_font.clone()));
        descriptor.insert("Flags".to_string(), Object::Integer(flags.bits() as i64));
        let bbox = program.bbox();
        descriptor.insert(
            "FontBBox".to_string(),
            Object::Array(vec![s(bbox.0), s(bbox.1), s(bbox.2), s(bbox.3)]),
        );
        descriptor.insert(
            "ItalicAngle".to_string(),
            Object::Real(program.italic_angle() as f64),
        );
        descriptor.insert("Ascent".to_string(), s(program.ascent()));
        descriptor.insert("Descent".to_string(), s(program.descent()));
        descriptor.insert("CapHeight".to_string(), s(program.cap_height()));
        descriptor.insert("XHeight".to_string(), s(program.x_height()));
        descriptor.insert("StemV".to_string(), s(program.stem_v()));

        let mut cid_system_info = Dict::new();
        cid_system_info.insert("Registry".to_string(), Object::string_literal(&b"Adobe"[..]));
        cid_system_info.insert("Ordering".to_string(), Object::string_literal(&b"Identity"[..]));
        cid_system_info.insert("Supplement".to_string(), Object::Integer(0));

        let mut cid_font = Dict::new();
        cid_font.insert("Type".to_string(), Object::Name("Font".to_string()));
        cid_font.insert("Subtype".to_string(), Object::Name(cid_subtype.to_string()));
        cid_font.insert("BaseFont".to_string(), Object::Name(base_font.clone()));
        cid_font.insert("CIDSystemInfo".to_string(), Object::Dictionary(cid_system_info));
        cid_font.insert("DW".to_string(), Object::Integer(1000));
        cid_font.insert("W".to_string(), widths);

        let mut type0 = Dict::new();
        type0.insert("Type".to_string(), Object::Name("Font".to_string()));
        type0.insert("Subtype".to_string(), Object::Name("Type0".to_string()));
        type0.insert("BaseFont".to_string(), Object::Name(base_font));
        type0.insert("Encoding".to_string(), Object::Name("Identity-H".to_string()));

        Ok(FontObjects {
            type0,
            cid_font,
            descriptor,
            font_file,
            font_file_key,
            to_unicode,
            cid_to_gid,
        })
    }

    /// Enumerate the fixed Unicode ranges for full-font embedding.
    fn collect_full_font_ranges(&mut self) {
        for (start, end) in FULL_FONT_RANGES {
            for code_point in start..=end {
                if let Some(gid) = self.program.glyph_id(code_point) {
                    let gid = gid as u32;
                    self.used_gids.insert(gid);
                    // First code point wins when several map to one glyph.
                    self.gid_to_code_point.entry(gid).or_insert(code_point);
                }
            }
        }
    }

    /// Subset dispatch by font kind. Returns the font stream, the
    /// descriptor key it hangs from, the CIDFont subtype, and the
    /// old-to-new glyph map when renumbering happened.
    fn build_font_file(
        &self,
    ) -> Result<(Stream, &'static str, &'static str, Option<HashMap<u16, u16>>)> {
        match self.program.kind {
            FontKind::TrueType => {
                let output = truetype_subset::subset_truetype(self.program.data(), &self.used_gids)?;
                let stream = font_stream(output.data, None);
                Ok((stream, "FontFile2", "CIDFontType2", Some(output.gid_map)))
            },
            FontKind::OpenTypeCff => {
                // No glyf to subset: the original bytes go out whole.
                let stream = font_stream(self.program.data().to_vec(), Some("OpenType"));
                Ok((stream, "FontFile3", "CIDFontType0", None))
            },
            FontKind::CffType1 | FontKind::CffCid => {
                let cff = super::cff::CffFont::parse(self.program.data())?;
                let data = cff.subset(&self.used_gids)?;
                let stream = font_stream(data, Some("CIDFontType0C"));
                Ok((stream, "FontFile3", "CIDFontType0", None))
            },
            FontKind::Type1 => {
                // No Type 1 subsetting yet: full binary, flagged Type1C.
                let stream = font_stream(self.program.data().to_vec(), Some("Type1C"));
                Ok((stream, "FontFile3", "CIDFontType0", None))
            },
        }
    }

    /// The `/W` array, keyed by original glyph id.
    ///
    /// Two entry shapes: `start end w` when three or more consecutive
    /// CIDs share a width, `start [w0 w1 ...]` otherwise. A new entry
    /// starts at every discontinuity in the CID sequence regardless of
    /// width equality.
    fn build_widths(&self) -> Object {
        let upem = self.program.units_per_em() as f64;
        let width = |gid: u32| -> i64 {
            (self.program.advance_width(gid as u16) as f64 * 1000.0 / upem).round() as i64
        };

        let gids: Vec<u32> = self.used_gids.iter().copied().collect();
        let mut out: Vec<Object> = Vec::new();

        let mut run_start = 0;
        while run_start < gids.len() {
            // A run of consecutive CIDs.
            let mut run_end = run_start;
            while run_end + 1 < gids.len() && gids[run_end + 1] == gids[run_end] + 1 {
                run_end += 1;
            }
            let run = &gids[run_start..=run_end];
            let widths: Vec<i64> = run.iter().map(|&g| width(g)).collect();

            let mut i = 0;
            while i < run.len() {
                // Length of the equal-width stretch starting at i.
                let mut j = i;
                while j + 1 < run.len() && widths[j + 1] == widths[i] {
                    j += 1;
                }
                if j - i + 1 >= 3 {
                    out.push(Object::Integer(run[i] as i64));
                    out.push(Object::Integer(run[j] as i64));
                    out.push(Object::Integer(widths[i]));
                    i = j + 1;
                } else {
                    // Collect individuals until a >= 3 stretch begins.
                    let list_start = i;
                    let mut k = i;
                    while k < run.len() {
                        let mut m = k;
                        while m + 1 < run.len() && widths[m + 1] == widths[k] {
                            m += 1;
                        }
                        if m - k + 1 >= 3 {
                            break;
                        }
                        k = m + 1;
                    }
                    out.push(Object::Integer(run[list_start] as i64));
                    out.push(Object::Array(
                        widths[list_start..k].iter().map(|&w| Object::Integer(w)).collect(),
                    ));
                    i = k;
                }
            }

            run_start = run_end + 1;
        }

        Object::Array(out)
    }
}

/// Wrap font bytes in a stream with `/Length1` (and `/Subtype`).
fn font_stream(data: Vec<u8>, subtype: Option<&str>) -> Stream {
    let mut dict = Dict::new();
    dict.insert("Length".to_string(), Object::Integer(data.len() as i64));
    dict.insert("Length1".to_string(), Object::Integer(data.len() as i64));
    if let Some(subtype) = subtype {
        dict.insert("Subtype".to_string(), Object::Name(subtype.to_string()));
    }
    Stream::new(dict, data)
}

/// CIDToGIDMap: for every original gid up to the highest one kept, a
/// big-endian u16 with the renumbered gid; gaps are zero.
fn build_cid_to_gid(gid_map: &HashMap<u16, u16>) -> Stream {
    let max_old = gid_map.keys().copied().max().unwrap_or(0);
    let mut data = vec![0u8; 2 * (max_old as usize + 1)];
    for (&old, &new) in gid_map {
        data[old as usize * 2..old as usize * 2 + 2].copy_from_slice(&new.to_be_bytes());
    }

    let mut dict = Dict::new();
    dict.insert("Length".to_string(), Object::Integer(data.len() as i64));
    Stream::new(dict, data)
}

/// The ToUnicode CMap stream: fixed header, one `<0000> <FFFF>` codespace,
/// `bfchar` blocks of at most 100 entries, UTF-16 surrogate expansion
/// above U+FFFF.
fn build_to_unicode(gid_to_code_point: &HashMap<u32, u32>) -> Stream {
    let mut cmap = String::new();
    cmap.push_str("/CIDInit /ProcSet findresource begin\n");
    cmap.push_str("12 dict begin\n");
    cmap.push_str("begincmap\n");
    cmap.push_str("/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n");
    cmap.push_str("/CMapName /Adobe-Identity-UCS def\n");
    cmap.push_str("/CMapType 2 def\n");
    cmap.push_str("1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n");

    let mut mappings: Vec<(u32, u32)> = gid_to_code_point
        .iter()
        .map(|(&gid, &cp)| (gid, cp))
        .collect();
    mappings.sort_by_key(|&(gid, _)| gid);

    for chunk in mappings.chunks(100) {
        cmap.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for &(gid, code_point) in chunk {
            if code_point <= 0xFFFF {
                cmap.push_str(&format!("<{:04X}> <{:04X}>\n", gid, code_point));
            } else {
                let high = ((code_point - 0x10000) >> 10) + 0xD800;
                let low = ((code_point - 0x10000) & 0x3FF) + 0xDC00;
                cmap.push_str(&format!("<{:04X}> <{:04X}{:04X}>\n", gid, high, low));
            }
        }
        cmap.push_str("endbfchar\n");
    }

    cmap.push_str("endcmap\n");
    cmap.push_str("CMapName currentdict /CMap defineresource pop\n");
    cmap.push_str("end\nend\n");

    let bytes = cmap.into_bytes();
    let mut dict = Dict::new();
    dict.insert("Length".to_string(), Object::Integer(bytes.len() as i64));
    Stream::new(dict, bytes)
}

impl FontObjects {
    /// Allocate object numbers and wire the cross-links.
    ///
    /// Returns the Type0 font's reference plus every `(ref, object)` pair
    /// ready for the writer, in a stable order.
    pub fn register(
        mut self,
        alloc: &mut dyn FnMut() -> ObjectRef,
    ) -> (ObjectRef, Vec<(ObjectRef, Object)>) {
        let type0_ref = alloc();
        let cid_ref = alloc();
        let descriptor_ref = alloc();
        let font_file_ref = alloc();
        let to_unicode_ref = alloc();
        let cid_to_gid_ref = self.cid_to_gid.as_ref().map(|_| alloc());

        self.type0.insert(
            "DescendantFonts".to_string(),
            Object::Array(vec![Object::Reference(cid_ref)]),
        );
        self.type0
            .insert("ToUnicode".to_string(), Object::Reference(to_unicode_ref));

        self.cid_font
            .insert("FontDescriptor".to_string(), Object::Reference(descriptor_ref));
        match cid_to_gid_ref {
            Some(r) => {
                self.cid_font
                    .insert("CIDToGIDMap".to_string(), Object::Reference(r));
            },
            None => {
                self.cid_font
                    .insert("CIDToGIDMap".to_string(), Object::Name("Identity".to_string()));
            },
        }

        self.descriptor.insert(
            self.font_file_key.to_string(),
            Object::Reference(font_file_ref),
        );

        let mut objects = vec![
            (type0_ref, Object::Dictionary(self.type0)),
            (cid_ref, Object::Dictionary(self.cid_font)),
            (descriptor_ref, Object::Dictionary(self.descriptor)),
            (font_file_ref, Object::Stream(self.font_file)),
            (to_unicode_ref, Object::Stream(self.to_unicode)),
        ];
        if let (Some(r), Some(stream)) = (cid_to_gid_ref, self.cid_to_gid) {
            objects.push((r, Object::Stream(stream)));
        }

        (type0_ref, objects)
    }
}

/// Six uppercase letters from a hash of the used-glyph set.
fn hash_tag(used_gids: &BTreeSet<u32>) -> String {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    for gid in used_gids {
        gid.hash(&mut hasher);
    }
    let mut h = hasher.finish();
    let mut tag = String::with_capacity(6);
    for _ in 0..6 {
        tag.push((b'A' + (h % 26) as u8) as char);
        h /= 26;
    }
    tag
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::test_font::build_test_truetype;

    fn hello_font() -> EmbeddedFont {
        let program = FontProgram::parse(build_test_truetype()).unwrap();
        let mut font = EmbeddedFont::new(program);
        font.encode_text("Hello");
        font
    }

    #[test]
    fn test_encode_text_tracks_usage() {
        let mut font = hello_font();
        // H e l l o -> gids 1 2 3 3 4, plus .notdef
        let gids: Vec<u32> = font.used_gids().iter().copied().collect();
        assert_eq!(gids, vec![0, 1, 2, 3, 4]);

        let encoded = font.encode_text("He");
        assert_eq!(encoded, vec![0x00, 0x01, 0x00, 0x02]);
    }

    #[test]
    fn test_first_seen_code_point_wins() {
        let program = FontProgram::parse(build_test_truetype()).unwrap();
        let mut font = EmbeddedFont::new(program);
        font.encode_text("l");
        font.encode_text("l");
        assert_eq!(font.gid_to_code_point.get(&3), Some(&('l' as u32)));
    }

    #[test]
    fn test_unmapped_code_point_is_notdef() {
        let program = FontProgram::parse(build_test_truetype()).unwrap();
        let mut font = EmbeddedFont::new(program);
        let encoded = font.encode_text("Z");
        assert_eq!(encoded, vec![0x00, 0x00]);
    }

    #[test]
    fn test_subset_tag_shape_and_determinism() {
        let mut a = hello_font();
        let mut b = hello_font();
        let tag_a = a.subset_tag().to_string();
        let tag_b = b.subset_tag().to_string();
        assert_eq!(tag_a.len(), 6);
        assert!(tag_a.chars().all(|c| c.is_ascii_uppercase()));
        assert_eq!(tag_a, tag_b);
    }

    #[test]
    fn test_base_font_name() {
        let mut font = hello_font();
        font.set_subset_tag("ABCDEF");
        assert_eq!(font.base_font_name(), "ABCDEF+TestFont");
    }

    #[test]
    fn test_build_truetype_subset() {
        let mut font = hello_font();
        let objects = font.build().unwrap();

        assert_eq!(objects.font_file_key, "FontFile2");
        assert_eq!(
            objects.cid_font.get("Subtype").unwrap().as_name(),
            Some("CIDFontType2")
        );
        assert_eq!(
            objects.type0.get("Encoding").unwrap().as_name(),
            Some("Identity-H")
        );
        assert!(objects.cid_to_gid.is_some());

        // CIDToGIDMap covers gids 0..=4: 10 bytes.
        let map = objects.cid_to_gid.as_ref().unwrap();
        assert_eq!(map.data.len(), 2 * 5);
    }

    #[test]
    fn test_widths_reproduce_program_widths() {
        let mut font = hello_font();
        let objects = font.build().unwrap();

        // Fixture: upem 1000, advance 600 + 10 * gid, all gids 0..=4
        // consecutive with distinct widths: one individual-list entry.
        let w = objects.cid_font.get("W").unwrap().as_array().unwrap();
        assert_eq!(w.len(), 2);
        assert_eq!(w[0].as_integer(), Some(0));
        let list = w[1].as_array().unwrap();
        let widths: Vec<i64> = list.iter().filter_map(|o| o.as_integer()).collect();
        assert_eq!(widths, vec![600, 610, 620, 630, 640]);
    }

    #[test]
    fn test_widths_range_compression() {
        // Directly exercise the /W builder shapes with a synthetic set.
        let program = FontProgram::parse(build_test_truetype()).unwrap();
        let mut font = EmbeddedFont::new(program);
        // Gids 1..=3 share no widths in the fixture; fake equality by
        // checking structure on a font whose widths differ is covered
        // above, so here check the discontinuity rule: 0 and 2 are not
        // consecutive, forcing separate entries.
        font.used_gids.insert(2);
        font.used_gids.insert(4);
        let w = font.build_widths();
        let entries = w.as_array().unwrap();
        // Three entries: [0 [..]] [2 [..]] [4 [..]]
        assert_eq!(entries.len(), 6);
        assert_eq!(entries[0].as_integer(), Some(0));
        assert_eq!(entries[2].as_integer(), Some(2));
        assert_eq!(entries[4].as_integer(), Some(4));
    }

    #[test]
    fn test_to_unicode_round_trip() {
        use crate::fonts::cmap_parser::parse_cmap;
        use crate::options::ParseOptions;

        let mut font = hello_font();
        let objects = font.build().unwrap();

        let cmap = parse_cmap(&objects.to_unicode.data, &ParseOptions::lenient()).unwrap();
        assert_eq!(cmap.unicode_for_len(1, 2), Some("H"));
        assert_eq!(cmap.unicode_for_len(2, 2), Some("e"));
        assert_eq!(cmap.unicode_for_len(3, 2), Some("l"));
        assert_eq!(cmap.unicode_for_len(4, 2), Some("o"));
        assert_eq!(cmap.name.as_deref(), Some("Adobe-Identity-UCS"));
    }

    #[test]
    fn test_to_unicode_surrogate_expansion() {
        let mut map = HashMap::new();
        map.insert(7u32, 0x1F600u32); // emoji
        let stream = build_to_unicode(&map);
        let text = String::from_utf8(stream.data.to_vec()).unwrap();
        assert!(text.contains("<0007> <D83DDE00>"));
    }

    #[test]
    fn test_descriptor_flags() {
        let mut font = hello_font();
        let objects = font.build().unwrap();
        let flags = objects.descriptor.get("Flags").unwrap().as_integer().unwrap();
        // Fixture font: not fixed pitch, not italic; symbolic always set.
        assert_eq!(flags as u32, FontFlags::SYMBOLIC.bits());
    }

    #[test]
    fn test_register_wires_cross_links() {
        let mut font = hello_font();
        let objects = font.build().unwrap();

        let mut next = 10u32;
        let mut alloc = move || {
            let r = ObjectRef::new(next, 0);
            next += 1;
            r
        };
        let (type0_ref, all) = objects.register(&mut alloc);

        assert_eq!(type0_ref, ObjectRef::new(10, 0));
        assert_eq!(all.len(), 6); // five dicts/streams + CIDToGIDMap

        let type0 = all[0].1.as_dict().unwrap();
        let descendants = type0.get("DescendantFonts").unwrap().as_array().unwrap();
        assert_eq!(descendants[0].as_reference(), Some(ObjectRef::new(11, 0)));
        assert_eq!(
            type0.get("ToUnicode").unwrap().as_reference(),
            Some(ObjectRef::new(14, 0))
        );

        let cid_font = all[1].1.as_dict().unwrap();
        assert_eq!(
            cid_font.get("FontDescriptor").unwrap().as_reference(),
            Some(ObjectRef::new(12, 0))
        );
        assert_eq!(
            cid_font.get("CIDToGIDMap").unwrap().as_reference(),
            Some(ObjectRef::new(15, 0))
        );

        let descriptor = all[2].1.as_dict().unwrap();
        assert_eq!(
            descriptor.get("FontFile2").unwrap().as_reference(),
            Some(ObjectRef::new(13, 0))
        );
    }

    #[test]
    fn test_full_font_variant_collects_ranges() {
        let program = FontProgram::parse(build_test_truetype()).unwrap();
        let mut font = EmbeddedFont::new_full(program);
        let objects = font.build().unwrap();

        // The fixture maps H e l o within Basic Latin; all four glyphs
        // plus .notdef are collected without any encode_text call.
        assert_eq!(font.used_gids().len(), 5);
        let w = objects.cid_font.get("W").unwrap().as_array().unwrap();
        assert!(!w.is_empty());
    }
}
