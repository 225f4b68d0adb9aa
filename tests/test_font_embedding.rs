//! End-to-end font embedding: record usage, subset, and verify the
//! pieces of the emitted object graph against the source font.

mod common;

use pdf_forge::fonts::{EmbeddedFont, FontProgram, parse_cmap};
use pdf_forge::object::ObjectRef;
use pdf_forge::options::ParseOptions;
use std::collections::BTreeSet;

fn embedded_hello() -> EmbeddedFont {
    let program = FontProgram::parse(common::build_test_truetype()).unwrap();
    let mut font = EmbeddedFont::new(program);
    font.encode_text("Hello");
    font
}

#[test]
fn test_subset_includes_notdef_plus_used_glyphs() {
    let font = embedded_hello();
    // {'H','e','l','o'} -> four glyphs plus .notdef
    let gids: Vec<u32> = font.used_gids().iter().copied().collect();
    assert_eq!(gids, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_cid_to_gid_map_length() {
    let mut font = embedded_hello();
    let objects = font.build().unwrap();

    // 2 * (max old gid + 1) bytes, big-endian u16 per original gid
    let map = objects.cid_to_gid.expect("TrueType subset must carry a CIDToGIDMap");
    assert_eq!(map.data.len(), 2 * (4 + 1));

    // Every used original gid routes to a valid new gid
    for old in 0u16..=4 {
        let at = old as usize * 2;
        let new = u16::from_be_bytes([map.data[at], map.data[at + 1]]);
        assert!(new <= 4, "gid {} mapped past the subset", new);
    }
}

#[test]
fn test_to_unicode_round_trips_used_code_points() {
    let mut font = embedded_hello();
    let objects = font.build().unwrap();

    let cmap = parse_cmap(&objects.to_unicode.data, &ParseOptions::lenient()).unwrap();

    // Decode every bfchar entry back; the set must equal {H, e, l, o}
    let mut decoded = BTreeSet::new();
    for gid in 1u32..=4 {
        if let Some(s) = cmap.unicode_for_len(gid, 2) {
            decoded.extend(s.chars());
        }
    }
    let expected: BTreeSet<char> = "Helo".chars().collect();
    assert_eq!(decoded, expected);
}

#[test]
fn test_widths_reproduce_source_advances() {
    let mut font = embedded_hello();
    let objects = font.build().unwrap();

    // Evaluate /W at every used gid and compare with the program.
    let w = objects.cid_font.get("W").unwrap().as_array().unwrap();
    let mut widths: std::collections::HashMap<i64, i64> = std::collections::HashMap::new();
    let mut i = 0;
    while i < w.len() {
        let start = w[i].as_integer().unwrap();
        match &w[i + 1] {
            pdf_forge::Object::Array(list) => {
                for (k, item) in list.iter().enumerate() {
                    widths.insert(start + k as i64, item.as_integer().unwrap());
                }
                i += 2;
            },
            _ => {
                let end = w[i + 1].as_integer().unwrap();
                let width = w[i + 2].as_integer().unwrap();
                for cid in start..=end {
                    widths.insert(cid, width);
                }
                i += 3;
            },
        }
    }

    let program = FontProgram::parse(common::build_test_truetype()).unwrap();
    for gid in 0u16..=4 {
        let expected =
            (program.advance_width(gid) as f64 * 1000.0 / program.units_per_em() as f64).round();
        assert_eq!(widths.get(&(gid as i64)).copied(), Some(expected as i64));
    }
}

#[test]
fn test_subset_font_file_parses_and_keeps_glyph_count() {
    let mut font = embedded_hello();
    let objects = font.build().unwrap();

    assert_eq!(objects.font_file_key, "FontFile2");
    let subset = FontProgram::parse(objects.font_file.data.to_vec()).unwrap();
    // .notdef + 4 used glyphs (the composite pulled its component, which
    // was already used)
    assert_eq!(subset.glyph_count(), 5);
}

#[test]
fn test_base_font_carries_subset_tag() {
    let mut font = embedded_hello();
    font.set_subset_tag("QWERTY");
    let objects = font.build().unwrap();

    assert_eq!(
        objects.type0.get("BaseFont").unwrap().as_name(),
        Some("QWERTY+TestFont")
    );
    assert_eq!(
        objects.descriptor.get("FontName").unwrap().as_name(),
        Some("QWERTY+TestFont")
    );
}

#[test]
fn test_object_graph_cross_links() {
    let mut font = embedded_hello();
    let objects = font.build().unwrap();

    let mut next = 1u32;
    let mut alloc = move || {
        let r = ObjectRef::new(next, 0);
        next += 1;
        r
    };
    let (type0_ref, all) = objects.register(&mut alloc);

    // Six objects: Type0, CIDFont, descriptor, font file, ToUnicode,
    // CIDToGIDMap.
    assert_eq!(all.len(), 6);
    assert_eq!(all[0].0, type0_ref);

    let type0 = all[0].1.as_dict().unwrap();
    let descendant = type0.get("DescendantFonts").unwrap().as_array().unwrap()[0]
        .as_reference()
        .unwrap();
    let cid_font = all
        .iter()
        .find(|(r, _)| *r == descendant)
        .map(|(_, o)| o.as_dict().unwrap())
        .expect("descendant font present");
    assert_eq!(cid_font.get("Subtype").unwrap().as_name(), Some("CIDFontType2"));

    let descriptor_ref = cid_font
        .get("FontDescriptor")
        .unwrap()
        .as_reference()
        .unwrap();
    let descriptor = all
        .iter()
        .find(|(r, _)| *r == descriptor_ref)
        .map(|(_, o)| o.as_dict().unwrap())
        .expect("descriptor present");
    assert!(descriptor.get("FontFile2").unwrap().as_reference().is_some());
}

#[test]
fn test_identity_h_content_encoding() {
    let mut font = embedded_hello();
    let encoded = font.encode_text("Hell");
    // Original gids, big-endian u16 each
    assert_eq!(encoded, vec![0, 1, 0, 2, 0, 3, 0, 3]);
}
