//! Brute-force cross-reference reconstruction for damaged files.
//!
//! When xref parsing fails (missing table, garbage offsets, truncated
//! trailer), the file is swept for `N G obj` markers and a replacement
//! table is built from what is found. Objects packed in object streams are
//! indexed too, so a document whose only damage is a broken xref loses
//! nothing.

use crate::error::{Error, Result, Warning};
use crate::object::{Dict, Object, ObjectRef};
use crate::objstm::ObjectStream;
use crate::options::ParseOptions;
use crate::parser::ObjectParser;
use crate::scanner::{self, Scanner};
use crate::xref::{XrefEntry, XrefTable};
use lazy_static::lazy_static;
use std::collections::HashMap;

lazy_static! {
    /// `N G obj` markers; the delimiter check after `obj` happens in code.
    static ref RE_OBJ_MARKER: regex::bytes::Regex =
        regex::bytes::Regex::new(r"(\d{1,8})\s+(\d{1,5})\s+obj").unwrap();

    /// `trailer <<` markers for salvaging an intact trailer dictionary.
    static ref RE_TRAILER: regex::bytes::Regex =
        regex::bytes::Regex::new(r"trailer\s*<<").unwrap();
}

/// Rebuild the xref by scanning the whole buffer for object markers.
///
/// Returns the reconstructed table and trailer plus the warnings raised
/// along the way. Fails only when no object or no root can be found.
pub fn reconstruct_xref(
    data: &[u8],
    options: &ParseOptions,
) -> Result<(XrefTable, Dict, Vec<Warning>)> {
    log::info!("reconstructing xref by scanning {} bytes", data.len());

    let mut warnings = Vec::new();
    let mut table = XrefTable::new();
    let mut parsed: HashMap<u32, Object> = HashMap::new();

    for capture in RE_OBJ_MARKER.captures_iter(data) {
        let full = capture.get(0).unwrap();
        let offset = full.start();

        // The object number must start the buffer or follow whitespace,
        // otherwise this is the tail of a longer number or binary noise.
        if offset > 0 && !scanner::is_whitespace(data[offset - 1]) {
            continue;
        }
        // `obj` must be followed by whitespace, a delimiter, or EOF.
        if let Some(&after) = data.get(full.end()) {
            if scanner::is_regular(after) {
                continue;
            }
        }

        let num: u32 = match parse_ascii_u64(&capture[1]) {
            Some(n) if n <= 10_000_000 => n as u32,
            _ => continue,
        };
        let gen: u16 = match parse_ascii_u64(&capture[2]) {
            Some(g) if g <= 65_535 => g as u16,
            _ => continue,
        };

        // Full parse; markers that do not parse to an object are dropped.
        let mut parser = ObjectParser::new(Scanner::at(data, offset), *options);
        let object = match parser.parse_indirect() {
            Ok(Some((_, object))) => object,
            _ => {
                log::debug!("marker at {} does not parse as an object; skipped", offset);
                continue;
            },
        };

        // Duplicates keep the latest definition by file offset; the sweep
        // runs front to back, so plain insertion does that.
        table.insert(num, XrefEntry::Uncompressed {
            offset: offset as u64,
            gen,
        });

        // Object streams contribute their packed objects as compressed
        // entries.
        if let Object::Stream(stream) = &object {
            if stream.type_name() == Some("ObjStm") {
                match ObjectStream::parse(stream, options) {
                    Ok(objstm) => {
                        for index in 0..objstm.len() {
                            if let Some(packed_num) = objstm.object_number(index) {
                                table.insert(packed_num, XrefEntry::Compressed {
                                    stream: num,
                                    index: index as u16,
                                });
                            }
                        }
                    },
                    Err(e) => {
                        warnings.push(Warning::new(
                            offset,
                            format!("object stream {} found but undecodable: {}", num, e),
                        ));
                    },
                }
            }
        }

        parsed.insert(num, object);
    }

    if table.is_empty() {
        return Err(Error::Structural(
            "no objects found during xref reconstruction".to_string(),
        ));
    }
    log::info!("reconstruction found {} objects", table.len());

    let trailer = build_trailer(data, &table, &parsed, options, &mut warnings)?;
    table.set_trailer(trailer.clone());

    Ok((table, trailer, warnings))
}

/// Produce a trailer: salvage an intact one from the bytes if possible,
/// otherwise synthesize `Root` and `Size` from the parsed objects.
fn build_trailer(
    data: &[u8],
    table: &XrefTable,
    parsed: &HashMap<u32, Object>,
    options: &ParseOptions,
    warnings: &mut Vec<Warning>,
) -> Result<Dict> {
    // Prefer the last trailer in the file (incremental updates append).
    if let Some(found) = RE_TRAILER.find_iter(data).last() {
        let dict_offset = found.start() + 7; // past "trailer"
        let mut parser = ObjectParser::new(Scanner::at(data, dict_offset), *options);
        if let Ok(Some(Object::Dictionary(dict))) = parser.parse_object() {
            if dict.contains_key("Root") {
                log::debug!("salvaged trailer dictionary at offset {}", found.start());
                return Ok(dict);
            }
        }
    }

    // Synthesize: the root is the catalog, or failing that a pages node.
    let root = find_root(parsed, warnings)?;

    let mut trailer = Dict::new();
    trailer.insert("Root".to_string(), Object::Reference(root));
    trailer.insert(
        "Size".to_string(),
        Object::Integer(table.max_object_number() as i64 + 1),
    );
    Ok(trailer)
}

/// Scan parsed dictionaries for `/Type /Catalog`, falling back to
/// `/Type /Pages` with a warning.
fn find_root(
    parsed: &HashMap<u32, Object>,
    warnings: &mut Vec<Warning>,
) -> Result<ObjectRef> {
    let mut pages_fallback = None;

    // HashMap order is arbitrary; prefer the lowest-numbered candidate so
    // reconstruction is deterministic.
    let mut numbered: Vec<(&u32, &Object)> = parsed.iter().collect();
    numbered.sort_by_key(|(num, _)| **num);

    for (&num, object) in numbered {
        let type_name = object
            .as_dict()
            .and_then(|d| d.get("Type"))
            .and_then(|t| t.as_name());
        match type_name {
            Some("Catalog") => return Ok(ObjectRef::new(num, 0)),
            Some("Pages") if pages_fallback.is_none() => pages_fallback = Some(num),
            _ => {},
        }
    }

    if let Some(num) = pages_fallback {
        warnings.push(Warning::new(
            0,
            format!("no catalog found; using pages object {} as root", num),
        ));
        return Ok(ObjectRef::new(num, 0));
    }

    Err(Error::Structural(
        "no catalog or page tree found in reconstructed objects".to_string(),
    ))
}

/// Parse ASCII digits; `None` on overflow past 20 digits.
fn parse_ascii_u64(digits: &[u8]) -> Option<u64> {
    std::str::from_utf8(digits).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconstruct_simple() {
        let data = b"%PDF-1.4\n\
            1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
            2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n\
            GARBAGE WHERE THE XREF SHOULD BE\n\
            startxref\n999999\n%%EOF";
        let opts = ParseOptions::lenient();
        let (table, trailer, _) = reconstruct_xref(data, &opts).unwrap();

        assert!(table.contains(1));
        assert!(table.contains(2));
        assert_eq!(
            trailer.get("Root").unwrap().as_reference(),
            Some(ObjectRef::new(1, 0))
        );
    }

    #[test]
    fn test_duplicate_keeps_latest() {
        let data = b"1 0 obj\n<< /Type /Catalog >>\nendobj\n\
            1 0 obj\n<< /Type /Catalog /Version /1.7 >>\nendobj\n";
        let opts = ParseOptions::lenient();
        let (table, _, _) = reconstruct_xref(data, &opts).unwrap();

        match table.entry(1) {
            Some(XrefEntry::Uncompressed { offset, .. }) => assert!(*offset > 0),
            other => panic!("expected uncompressed entry, got {:?}", other),
        }
    }

    #[test]
    fn test_marker_inside_token_rejected() {
        // "11 0 obj" appears at offset 1 inside "911 0 obj"; the prefix
        // digit is not whitespace, so only the full number is accepted.
        let data = b"911 0 obj\n<< /Type /Catalog >>\nendobj\n";
        let opts = ParseOptions::lenient();
        let (table, _, _) = reconstruct_xref(data, &opts).unwrap();

        assert!(table.contains(911));
        assert!(!table.contains(11));
    }

    #[test]
    fn test_object_number_bounds() {
        let data = b"99999999 0 obj\n<< /Type /Catalog >>\nendobj\n\
            1 0 obj\n<< /Type /Catalog >>\nendobj\n";
        let opts = ParseOptions::lenient();
        let (table, _, _) = reconstruct_xref(data, &opts).unwrap();

        // 99999999 > 10_000_000 is rejected
        assert!(!table.contains(99_999_999));
        assert!(table.contains(1));
    }

    #[test]
    fn test_objstm_contents_indexed() {
        // Object 3 is an ObjStm holding objects 10 and 11.
        let header = b"10 0 11 3 ";
        let body = b"42 /Test";
        let mut payload = header.to_vec();
        payload.extend_from_slice(body);

        let mut data = b"1 0 obj\n<< /Type /Catalog >>\nendobj\n3 0 obj\n<< /Type /ObjStm /N 2 /First 10 /Length ".to_vec();
        data.extend_from_slice(payload.len().to_string().as_bytes());
        data.extend_from_slice(b" >>\nstream\n");
        data.extend_from_slice(&payload);
        data.extend_from_slice(b"\nendstream\nendobj\n");

        let opts = ParseOptions::lenient();
        let (table, _, _) = reconstruct_xref(&data, &opts).unwrap();

        assert_eq!(table.entry(10), Some(&XrefEntry::Compressed { stream: 3, index: 0 }));
        assert_eq!(table.entry(11), Some(&XrefEntry::Compressed { stream: 3, index: 1 }));
    }

    #[test]
    fn test_pages_fallback_with_warning() {
        let data = b"2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n";
        let opts = ParseOptions::lenient();
        let (_, trailer, warnings) = reconstruct_xref(data, &opts).unwrap();

        assert_eq!(
            trailer.get("Root").unwrap().as_reference(),
            Some(ObjectRef::new(2, 0))
        );
        assert!(warnings.iter().any(|w| w.message.contains("no catalog")));
    }

    #[test]
    fn test_no_objects_fails() {
        let data = b"%PDF-1.4\nnothing object-like here\n%%EOF";
        let opts = ParseOptions::lenient();
        assert!(reconstruct_xref(data, &opts).is_err());
    }

    #[test]
    fn test_salvages_existing_trailer() {
        let data = b"1 0 obj\n<< /Type /Catalog >>\nendobj\n\
            trailer\n<< /Root 1 0 R /Size 2 /ID [(a)(b)] >>\n";
        let opts = ParseOptions::lenient();
        let (_, trailer, _) = reconstruct_xref(data, &opts).unwrap();
        assert!(trailer.contains_key("ID"));
    }
}
