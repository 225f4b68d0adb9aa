//! Shared fixtures for the integration tests.
//!
//! The repository carries no binary fixtures; the TrueType font used by
//! the embedding tests is assembled here, in memory. Glyph map:
//! `.notdef` = 0, 'H' = 1, 'e' = 2, 'l' = 3, 'o' = 4 (a composite
//! referencing glyph 1). Advance widths are `600 + 10 * gid`.

/// Build the test TrueType font.
#[allow(dead_code)]
pub fn build_test_truetype() -> Vec<u8> {
    let glyphs: Vec<Vec<u8>> = vec![
        simple_glyph(),
        simple_glyph(),
        simple_glyph(),
        simple_glyph(),
        composite_glyph(1),
    ];
    let num_glyphs = glyphs.len() as u16;

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

    assemble(vec![
        (*b"cmap", build_cmap()),
        (*b"glyf", glyf),
        (*b"head", build_head()),
        (*b"hhea", build_hhea(num_glyphs)),
        (*b"hmtx", build_hmtx(num_glyphs)),
        (*b"loca", loca),
        (*b"maxp", build_maxp(num_glyphs)),
        (*b"name", build_name()),
        (*b"post", build_post()),
    ])
}

fn simple_glyph() -> Vec<u8> {
    let mut g = Vec::new();
    g.extend_from_slice(&1i16.to_be_bytes());
    for v in [0i16, 0, 100, 100] {
        g.extend_from_slice(&v.to_be_bytes());
    }
    g.extend_from_slice(&2u16.to_be_bytes());
    g.extend_from_slice(&0u16.to_be_bytes());
    g.extend_from_slice(&[0x01, 0x01, 0x01]);
    for dx in [0i16, 100, -50] {
        g.extend_from_slice(&dx.to_be_bytes());
    }
    for dy in [0i16, 0, 100] {
        g.extend_from_slice(&dy.to_be_bytes());
    }
    g
}

fn composite_glyph(component: u16) -> Vec<u8> {
    let mut g = Vec::new();
    g.extend_from_slice(&(-1i16).to_be_bytes());
    for v in [0i16, 0, 100, 100] {
        g.extend_from_slice(&v.to_be_bytes());
    }
    g.extend_from_slice(&0x0003u16.to_be_bytes());
    g.extend_from_slice(&component.to_be_bytes());
    g.extend_from_slice(&0i16.to_be_bytes());
    g.extend_from_slice(&0i16.to_be_bytes());
    g
}

fn build_head() -> Vec<u8> {
    let mut t = Vec::new();
    t.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    t.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    t.extend_from_slice(&0u32.to_be_bytes());
    t.extend_from_slice(&0x5F0F_3CF5u32.to_be_bytes());
    t.extend_from_slice(&0u16.to_be_bytes());
    t.extend_from_slice(&1000u16.to_be_bytes());
    t.extend_from_slice(&[0u8; 16]);
    for v in [0i16, 0, 100, 100] {
        t.extend_from_slice(&v.to_be_bytes());
    }
    t.extend_from_slice(&0u16.to_be_bytes());
    t.extend_from_slice(&8u16.to_be_bytes());
    t.extend_from_slice(&2i16.to_be_bytes());
    t.extend_from_slice(&1i16.to_be_bytes());
    t.extend_from_slice(&0i16.to_be_bytes());
    t
}

fn build_hhea(num_glyphs: u16) -> Vec<u8> {
    let mut t = Vec::new();
    t.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    t.extend_from_slice(&800i16.to_be_bytes());
    t.extend_from_slice(&(-200i16).to_be_bytes());
    t.extend_from_slice(&0i16.to_be_bytes());
    t.extend_from_slice(&700u16.to_be_bytes());
    t.extend_from_slice(&0i16.to_be_bytes());
    t.extend_from_slice(&0i16.to_be_bytes());
    t.extend_from_slice(&100i16.to_be_bytes());
    t.extend_from_slice(&1i16.to_be_bytes());
    t.extend_from_slice(&0i16.to_be_bytes());
    t.extend_from_slice(&0i16.to_be_bytes());
    t.extend_from_slice(&[0u8; 8]);
    t.extend_from_slice(&0i16.to_be_bytes());
    t.extend_from_slice(&num_glyphs.to_be_bytes());
    t
}

fn build_maxp(num_glyphs: u16) -> Vec<u8> {
    let mut t = Vec::new();
    t.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    t.extend_from_slice(&num_glyphs.to_be_bytes());
    t.extend_from_slice(&[0u8; 26]);
    t
}

fn build_hmtx(num_glyphs: u16) -> Vec<u8> {
    let mut t = Vec::new();
    for gid in 0..num_glyphs {
        t.extend_from_slice(&(600 + 10 * gid).to_be_bytes());
        t.extend_from_slice(&0i16.to_be_bytes());
    }
    t
}

fn build_cmap() -> Vec<u8> {
    let mappings: [(u16, u16); 4] = [(0x48, 1), (0x65, 2), (0x6C, 3), (0x6F, 4)];
    let seg_count = mappings.len() as u16 + 1;

    let mut sub = Vec::new();
    sub.extend_from_slice(&4u16.to_be_bytes());
    let length = 16 + 8 * seg_count as usize;
    sub.extend_from_slice(&(length as u16).to_be_bytes());
    sub.extend_from_slice(&0u16.to_be_bytes());
    sub.extend_from_slice(&(seg_count * 2).to_be_bytes());
    let entry_selector = (seg_count as f32).log2().floor() as u16;
    let search_range: u16 = 2 * (1 << entry_selector);
    sub.extend_from_slice(&search_range.to_be_bytes());
    sub.extend_from_slice(&entry_selector.to_be_bytes());
    sub.extend_from_slice(&(seg_count * 2 - search_range).to_be_bytes());
    for &(code, _) in &mappings {
        sub.extend_from_slice(&code.to_be_bytes());
    }
    sub.extend_from_slice(&0xFFFFu16.to_be_bytes());
    sub.extend_from_slice(&0u16.to_be_bytes());
    for &(code, _) in &mappings {
        sub.extend_from_slice(&code.to_be_bytes());
    }
    sub.extend_from_slice(&0xFFFFu16.to_be_bytes());
    for &(code, gid) in &mappings {
        sub.extend_from_slice(&gid.wrapping_sub(code).to_be_bytes());
    }
    sub.extend_from_slice(&1u16.to_be_bytes());
    for _ in 0..seg_count {
        sub.extend_from_slice(&0u16.to_be_bytes());
    }

    let mut t = Vec::new();
    t.extend_from_slice(&0u16.to_be_bytes());
    t.extend_from_slice(&1u16.to_be_bytes());
    t.extend_from_slice(&3u16.to_be_bytes());
    t.extend_from_slice(&1u16.to_be_bytes());
    t.extend_from_slice(&12u32.to_be_bytes());
    t.extend_from_slice(&sub);
    t
}

fn build_name() -> Vec<u8> {
    let ps_name = b"TestFont";
    let mut t = Vec::new();
    t.extend_from_slice(&0u16.to_be_bytes());
    t.extend_from_slice(&1u16.to_be_bytes());
    t.extend_from_slice(&18u16.to_be_bytes());
    t.extend_from_slice(&1u16.to_be_bytes());
    t.extend_from_slice(&0u16.to_be_bytes());
    t.extend_from_slice(&0u16.to_be_bytes());
    t.extend_from_slice(&6u16.to_be_bytes());
    t.extend_from_slice(&(ps_name.len() as u16).to_be_bytes());
    t.extend_from_slice(&0u16.to_be_bytes());
    t.extend_from_slice(ps_name);
    t
}

fn build_post() -> Vec<u8> {
    let mut t = Vec::new();
    t.extend_from_slice(&0x0003_0000u32.to_be_bytes());
    t.extend_from_slice(&0u32.to_be_bytes());
    t.extend_from_slice(&(-100i16).to_be_bytes());
    t.extend_from_slice(&50i16.to_be_bytes());
    t.extend_from_slice(&0u32.to_be_bytes());
    t.extend_from_slice(&[0u8; 16]);
    t
}

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
        out.extend_from_slice(&0u32.to_be_bytes());
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
