//! In-memory TrueType fixture for the font tests.
//!
//! The repo carries no binary font files; tests that need a real SFNT
//! build this one. Five glyphs: `.notdef`, three simple triangles mapped
//! from 'H', 'e', 'l', and a composite (mapped from 'o') that references
//! glyph 1. Advance widths are `600 + 10 * gid` so width assertions can
//! compute their expectations.

/// Build the fixture font.
pub(crate) fn build_test_truetype() -> Vec<u8> {
    let glyphs: Vec<Vec<u8>> = vec![
        simple_glyph(),          // 0 .notdef
        simple_glyph(),          // 1 'H'
        simple_glyph(),          // 2 'e'
        simple_glyph(),          // 3 'l'
        composite_glyph(1),      // 4 'o', references glyph 1
    ];
    let num_glyphs = glyphs.len() as u16;

    // glyf + long loca
    let mut glyf = Vec::new();
    let mut loca = Vec::new();
    for glyph in &glyphs {
        loca.extend_from_slice(&(glyf.len() as u32).to_be_bytes());
        glyf.extend_from_slice(glyph);
        while glyf.len() % 2 != 0 {
            glyf.push(0);
        }
    }
    loca.extend_from_slice(&(glyf.len() as u32).to_be_bytes());

    let head = build_head();
    let hhea = build_hhea(num_glyphs);
    let maxp = build_maxp(num_glyphs);
    let hmtx = build_hmtx(num_glyphs);
    let cmap = build_cmap();
    let name = build_name();
    let post = build_post();

    assemble(vec![
        (*b"cmap", cmap),
        (*b"glyf", glyf),
        (*b"head", head),
        (*b"hhea", hhea),
        (*b"hmtx", hmtx),
        (*b"loca", loca),
        (*b"maxp", maxp),
        (*b"name", name),
        (*b"post", post),
    ])
}

/// A one-contour triangle.
fn simple_glyph() -> Vec<u8> {
    let mut g = Vec::new();
    g.extend_from_slice(&1i16.to_be_bytes()); // numberOfContours
    for v in [0i16, 0, 100, 100] {
        g.extend_from_slice(&v.to_be_bytes()); // bbox
    }
    g.extend_from_slice(&2u16.to_be_bytes()); // endPtsOfContours[0]
    g.extend_from_slice(&0u16.to_be_bytes()); // instructionLength
    // Three on-curve points with 16-bit deltas.
    g.extend_from_slice(&[0x01, 0x01, 0x01]);
    for dx in [0i16, 100, -50] {
        g.extend_from_slice(&dx.to_be_bytes());
    }
    for dy in [0i16, 0, 100] {
        g.extend_from_slice(&dy.to_be_bytes());
    }
    g
}

/// A composite glyph with one unscaled component.
fn composite_glyph(component: u16) -> Vec<u8> {
    let mut g = Vec::new();
    g.extend_from_slice(&(-1i16).to_be_bytes());
    for v in [0i16, 0, 100, 100] {
        g.extend_from_slice(&v.to_be_bytes());
    }
    g.extend_from_slice(&0x0003u16.to_be_bytes()); // words args | args-are-xy
    g.extend_from_slice(&component.to_be_bytes());
    g.extend_from_slice(&0i16.to_be_bytes()); // dx
    g.extend_from_slice(&0i16.to_be_bytes()); // dy
    g
}

fn build_head() -> Vec<u8> {
    let mut t = Vec::new();
    t.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // version
    t.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // fontRevision
    t.extend_from_slice(&0u32.to_be_bytes()); // checkSumAdjustment
    t.extend_from_slice(&0x5F0F_3CF5u32.to_be_bytes()); // magic
    t.extend_from_slice(&0u16.to_be_bytes()); // flags
    t.extend_from_slice(&1000u16.to_be_bytes()); // unitsPerEm
    t.extend_from_slice(&[0u8; 16]); // created + modified
    for v in [0i16, 0, 100, 100] {
        t.extend_from_slice(&v.to_be_bytes()); // bbox
    }
    t.extend_from_slice(&0u16.to_be_bytes()); // macStyle
    t.extend_from_slice(&8u16.to_be_bytes()); // lowestRecPPEM
    t.extend_from_slice(&2i16.to_be_bytes()); // fontDirectionHint
    t.extend_from_slice(&1i16.to_be_bytes()); // indexToLocFormat: long
    t.extend_from_slice(&0i16.to_be_bytes()); // glyphDataFormat
    t
}

fn build_hhea(num_glyphs: u16) -> Vec<u8> {
    let mut t = Vec::new();
    t.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    t.extend_from_slice(&800i16.to_be_bytes()); // ascender
    t.extend_from_slice(&(-200i16).to_be_bytes()); // descender
    t.extend_from_slice(&0i16.to_be_bytes()); // lineGap
    t.extend_from_slice(&700u16.to_be_bytes()); // advanceWidthMax
    t.extend_from_slice(&0i16.to_be_bytes()); // minLeftSideBearing
    t.extend_from_slice(&0i16.to_be_bytes()); // minRightSideBearing
    t.extend_from_slice(&100i16.to_be_bytes()); // xMaxExtent
    t.extend_from_slice(&1i16.to_be_bytes()); // caretSlopeRise
    t.extend_from_slice(&0i16.to_be_bytes()); // caretSlopeRun
    t.extend_from_slice(&0i16.to_be_bytes()); // caretOffset
    t.extend_from_slice(&[0u8; 8]); // reserved
    t.extend_from_slice(&0i16.to_be_bytes()); // metricDataFormat
    t.extend_from_slice(&num_glyphs.to_be_bytes()); // numberOfHMetrics
    t
}

fn build_maxp(num_glyphs: u16) -> Vec<u8> {
    let mut t = Vec::new();
    t.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    t.extend_from_slice(&num_glyphs.to_be_bytes());
    t.extend_from_slice(&[0u8; 26]); // limits, all zero is fine for parsing
    t
}

fn build_hmtx(num_glyphs: u16) -> Vec<u8> {
    let mut t = Vec::new();
    for gid in 0..num_glyphs {
        t.extend_from_slice(&(600 + 10 * gid).to_be_bytes()); // advance
        t.extend_from_slice(&0i16.to_be_bytes()); // lsb
    }
    t
}

/// cmap with a single (3,1) format 4 subtable:
/// H -> 1, e -> 2, l -> 3, o -> 4.
fn build_cmap() -> Vec<u8> {
    let mappings: [(u16, u16); 4] = [(0x48, 1), (0x65, 2), (0x6C, 3), (0x6F, 4)];
    let seg_count = mappings.len() as u16 + 1; // + terminator

    let mut sub = Vec::new();
    sub.extend_from_slice(&4u16.to_be_bytes()); // format
    let length = 16 + 8 * seg_count as usize;
    sub.extend_from_slice(&(length as u16).to_be_bytes());
    sub.extend_from_slice(&0u16.to_be_bytes()); // language
    sub.extend_from_slice(&(seg_count * 2).to_be_bytes());
    let entry_selector = (seg_count as f32).log2().floor() as u16;
    let search_range: u16 = 2 * (1 << entry_selector);
    sub.extend_from_slice(&search_range.to_be_bytes());
    sub.extend_from_slice(&entry_selector.to_be_bytes());
    sub.extend_from_slice(&(seg_count * 2 - search_range).to_be_bytes());
    for &(code, _) in &mappings {
        sub.extend_from_slice(&code.to_be_bytes()); // endCode
    }
    sub.extend_from_slice(&0xFFFFu16.to_be_bytes());
    sub.extend_from_slice(&0u16.to_be_bytes()); // reservedPad
    for &(code, _) in &mappings {
        sub.extend_from_slice(&code.to_be_bytes()); // startCode
    }
    sub.extend_from_slice(&0xFFFFu16.to_be_bytes());
    for &(code, gid) in &mappings {
        sub.extend_from_slice(&gid.wrapping_sub(code).to_be_bytes()); // idDelta
    }
    sub.extend_from_slice(&1u16.to_be_bytes()); // terminator delta
    for _ in 0..seg_count {
        sub.extend_from_slice(&0u16.to_be_bytes()); // idRangeOffset
    }

    let mut t = Vec::new();
    t.extend_from_slice(&0u16.to_be_bytes()); // version
    t.extend_from_slice(&1u16.to_be_bytes()); // numTables
    t.extend_from_slice(&3u16.to_be_bytes()); // platform: Windows
    t.extend_from_slice(&1u16.to_be_bytes()); // encoding: Unicode BMP
    t.extend_from_slice(&12u32.to_be_bytes()); // subtable offset
    t.extend_from_slice(&sub);
    t
}

/// name with a single Macintosh-platform PostScript name record.
fn build_name() -> Vec<u8> {
    let ps_name = b"TestFont";
    let mut t = Vec::new();
    t.extend_from_slice(&0u16.to_be_bytes()); // format
    t.extend_from_slice(&1u16.to_be_bytes()); // count
    t.extend_from_slice(&18u16.to_be_bytes()); // stringOffset
    t.extend_from_slice(&1u16.to_be_bytes()); // platformID: Macintosh
    t.extend_from_slice(&0u16.to_be_bytes()); // encodingID: Roman
    t.extend_from_slice(&0u16.to_be_bytes()); // languageID: English
    t.extend_from_slice(&6u16.to_be_bytes()); // nameID: PostScript name
    t.extend_from_slice(&(ps_name.len() as u16).to_be_bytes());
    t.extend_from_slice(&0u16.to_be_bytes()); // offset
    t.extend_from_slice(ps_name);
    t
}

fn build_post() -> Vec<u8> {
    let mut t = Vec::new();
    t.extend_from_slice(&0x0003_0000u32.to_be_bytes()); // version 3.0
    t.extend_from_slice(&0u32.to_be_bytes()); // italicAngle
    t.extend_from_slice(&(-100i16).to_be_bytes()); // underlinePosition
    t.extend_from_slice(&50i16.to_be_bytes()); // underlineThickness
    t.extend_from_slice(&0u32.to_be_bytes()); // isFixedPitch
    t.extend_from_slice(&[0u8; 16]); // memory hints
    t
}

/// Wrap tables in an SFNT shell (checksums left zero; parsers ignore them).
fn assemble(tables: Vec<([u8; 4], Vec<u8>)>) -> Vec<u8> {
    let num_tables = tables.len() as u16;
    let entry_selector = (num_tables as f32).log2().floor() as u16;
    let search_range = (1u16 << entry_selector) * 16;

    let mut out = Vec::new();
    out.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    out.extend_from_slice(&num_tables.to_be_bytes());
    out.extend_from_slice(&search_range.to_be_bytes());
    out.extend_from_slice(&entry_selector.to_be_bytes());
    out.extend_from_slice(&(num_tables * 16 - search_range).to_be_bytes());

    let mut offset = 12 + tables.len() * 16;
    let mut body = Vec::new();
    for (tag, table) in &tables {
        out.extend_from_slice(tag);
        out.extend_from_slice(&0u32.to_be_bytes()); // checksum
        out.extend_from_slice(&(offset as u32).to_be_bytes());
        out.extend_from_slice(&(table.len() as u32).to_be_bytes());
        body.extend_from_slice(table);
        let padded = table.len().div_ceil(4) * 4;
        body.resize(body.len() + (padded - table.len()), 0);
        offset += padded;
    }
    out.extend_from_slice(&body);
    out
}
