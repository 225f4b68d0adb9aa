//! Cross-reference table parsing.
//!
//! The xref maps object numbers to byte offsets (or to slots inside object
//! streams), enabling random access into the file. Both classical tables
//! (PDF 1.0-1.4) and cross-reference streams (PDF 1.5+) are handled, and
//! `/Prev` chains from incremental updates are followed with cycle
//! protection.

use crate::error::{Error, Result, Warning};
use crate::object::{Dict, Object};
use crate::options::ParseOptions;
use crate::parser::ObjectParser;
use crate::scanner::Scanner;
use std::collections::{HashMap, HashSet};

/// One cross-reference entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefEntry {
    /// Free slot; `next` is the next free object number
    Free {
        /// Next free object number
        next: u32,
        /// Generation to use if the slot is reused
        gen: u16,
    },
    /// Object stored uncompressed at a byte offset
    Uncompressed {
        /// Byte offset of `N G obj`
        offset: u64,
        /// Generation number
        gen: u16,
    },
    /// Object packed inside an object stream
    Compressed {
        /// Object number of the containing `/Type /ObjStm` stream
        stream: u32,
        /// Index of the object within the stream
        index: u16,
    },
}

/// Cross-reference table: object number to entry, plus the trailer.
#[derive(Debug, Clone, Default)]
pub struct XrefTable {
    entries: HashMap<u32, XrefEntry>,
    trailer: Option<Dict>,
}

impl XrefTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, replacing any existing one for the number.
    pub fn insert(&mut self, num: u32, entry: XrefEntry) {
        self.entries.insert(num, entry);
    }

    /// Look up the entry for an object number.
    pub fn entry(&self, num: u32) -> Option<&XrefEntry> {
        self.entries.get(&num)
    }

    /// True when an entry exists for the number (free counts).
    pub fn contains(&self, num: u32) -> bool {
        self.entries.contains_key(&num)
    }

    /// All known object numbers.
    pub fn object_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.keys().copied()
    }

    /// Highest object number in the table.
    pub fn max_object_number(&self) -> u32 {
        self.entries.keys().copied().max().unwrap_or(0)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The trailer dictionary (for xref streams, the stream dictionary).
    pub fn trailer(&self) -> Option<&Dict> {
        self.trailer.as_ref()
    }

    /// Set the trailer dictionary.
    pub fn set_trailer(&mut self, trailer: Dict) {
        self.trailer = Some(trailer);
    }

    /// Merge an older table in: existing entries win (incremental updates
    /// are newest-first), and the newest trailer is kept.
    pub fn merge_older(&mut self, older: XrefTable) {
        for (num, entry) in older.entries {
            self.entries.entry(num).or_insert(entry);
        }
        if self.trailer.is_none() {
            self.trailer = older.trailer;
        }
    }
}

/// Locate the `startxref` offset by scanning backward from EOF.
///
/// Only the last 2 KiB are examined; trailers larger than that are not
/// produced by any writer we know of.
pub fn find_startxref(data: &[u8]) -> Result<u64> {
    let tail_start = data.len().saturating_sub(2048);
    let tail = &data[tail_start..];

    let keyword = b"startxref";
    let pos = tail
        .windows(keyword.len())
        .rposition(|w| w == keyword)
        .ok_or_else(|| Error::Structural("startxref keyword not found".to_string()))?;

    let mut scanner = Scanner::at(tail, pos + keyword.len());
    scanner.skip_whitespace();
    let mut digits = Vec::new();
    while let Some(b) = scanner.peek() {
        if b.is_ascii_digit() {
            digits.push(b);
            scanner.advance();
        } else {
            break;
        }
    }
    if digits.is_empty() {
        return Err(Error::Structural("no offset after startxref".to_string()));
    }

    std::str::from_utf8(&digits)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| Error::Structural("unparseable startxref offset".to_string()))
}

/// Parse the xref at `offset` and follow its `/Prev` chain.
///
/// Offsets already visited are skipped, so circular chains terminate.
/// Newer sections shadow older entries. Returns the merged table together
/// with the warnings produced along the way.
pub fn parse_xref_chain(
    data: &[u8],
    offset: u64,
    options: &ParseOptions,
) -> Result<(XrefTable, Vec<Warning>)> {
    let mut warnings = Vec::new();
    let mut visited: HashSet<u64> = HashSet::new();
    let mut merged = XrefTable::new();
    let mut next_offset = Some(offset);

    while let Some(offset) = next_offset {
        if !visited.insert(offset) {
            warnings.push(Warning::new(
                offset as usize,
                "circular /Prev chain in xref; stopping",
            ));
            break;
        }

        let section = parse_xref_section(data, offset, options, &mut warnings)?;

        next_offset = section
            .trailer()
            .and_then(|t| t.get("Prev"))
            .and_then(|o| o.as_integer())
            .and_then(|n| u64::try_from(n).ok());

        merged.merge_older(section);
    }

    Ok((merged, warnings))
}

/// Parse a single xref section, auto-detecting its format.
fn parse_xref_section(
    data: &[u8],
    offset: u64,
    options: &ParseOptions,
    warnings: &mut Vec<Warning>,
) -> Result<XrefTable> {
    if offset as usize >= data.len() {
        return Err(Error::Structural(format!(
            "xref offset {} is past the end of the file",
            offset
        )));
    }

    let mut scanner = Scanner::at(data, offset as usize);
    scanner.skip_whitespace();

    if scanner.remaining().starts_with(b"xref") {
        parse_classical_xref(data, scanner.position(), options, warnings)
    } else if scanner.peek().is_some_and(|b| b.is_ascii_digit()) {
        parse_xref_stream(data, scanner.position(), options, warnings)
    } else {
        Err(Error::Structural(format!(
            "no xref table or stream at offset {}",
            offset
        )))
    }
}

/// Parse a classical cross-reference table.
///
/// ```text
/// xref
/// 0 3
/// 0000000000 65535 f
/// 0000000017 00000 n
/// 0000000099 00000 n
/// trailer
/// << /Size 3 /Root 1 0 R >>
/// startxref
/// ...
/// ```
///
/// Each entry line is nominally exactly 20 bytes. In lenient mode a
/// malformed entry becomes a free placeholder so the subsection numbering
/// stays aligned.
fn parse_classical_xref(
    data: &[u8],
    offset: usize,
    options: &ParseOptions,
    warnings: &mut Vec<Warning>,
) -> Result<XrefTable> {
    let mut scanner = Scanner::at(data, offset);
    let mut table = XrefTable::new();

    // Consume the xref keyword line.
    match scanner.read_line() {
        Some(line) if line.trim_ascii().starts_with(b"xref") => {},
        _ => return Err(Error::Structural("expected xref keyword".to_string())),
    }

    // Offset of the byte after the trailer keyword (the dictionary may
    // share the keyword's line).
    let mut trailer_dict_offset = None;

    loop {
        let line_offset = scanner.position();
        let line = match scanner.read_line() {
            Some(line) => line.trim_ascii(),
            None => {
                return Err(Error::Structural("xref table ends before trailer".to_string()));
            },
        };

        if line.starts_with(b"trailer") {
            trailer_dict_offset = Some(after_trailer_keyword(data, line_offset));
            break;
        }
        if line.is_empty() || line.starts_with(b"%") {
            continue;
        }

        // Subsection header: "first count"
        let header = std::str::from_utf8(line).unwrap_or("");
        let mut parts = header.split_whitespace();
        let (first, count) = match (
            parts.next().and_then(|s| s.parse::<u32>().ok()),
            parts.next().and_then(|s| s.parse::<u32>().ok()),
        ) {
            (Some(f), Some(c)) if parts.next().is_none() => (f, c),
            _ => {
                if !options.lenient {
                    return Err(Error::Structural(format!(
                        "malformed xref subsection header {:?}",
                        header
                    )));
                }
                warnings.push(Warning::new(
                    line_offset,
                    format!("malformed xref subsection header {:?}; skipped", header),
                ));
                continue;
            },
        };

        if count > 1_000_000 {
            return Err(Error::Structural(format!(
                "xref subsection count {} exceeds limit",
                count
            )));
        }

        let mut parsed = 0;
        while parsed < count {
            let entry_offset = scanner.position();
            let raw = match scanner.read_line() {
                Some(raw) => raw,
                None => {
                    if !options.lenient {
                        return Err(Error::Structural("xref subsection truncated".to_string()));
                    }
                    warnings.push(Warning::new(entry_offset, "xref subsection truncated"));
                    break;
                },
            };
            let line = raw.trim_ascii();

            if line.is_empty() {
                continue;
            }
            if line.starts_with(b"trailer") {
                warnings.push(Warning::new(
                    entry_offset,
                    format!("xref subsection ended early at {} of {} entries", parsed, count),
                ));
                scanner.move_to(entry_offset);
                break;
            }

            let num = first + parsed;
            match parse_xref_entry_line(line) {
                Some(entry) => table.insert(num, entry),
                None => {
                    if !options.lenient {
                        return Err(Error::Structural(format!(
                            "malformed xref entry {:?}",
                            String::from_utf8_lossy(line)
                        )));
                    }
                    warnings.push(Warning::new(
                        entry_offset,
                        format!("malformed xref entry {:?}; marked free", String::from_utf8_lossy(line)),
                    ));
                    table.insert(num, XrefEntry::Free { next: 0, gen: 65535 });
                },
            }
            parsed += 1;
        }

        // A subsection that ended early means the trailer comes next.
        if parsed < count {
            let line_offset = scanner.position();
            let line = scanner.read_line().map(|l| l.trim_ascii().to_vec());
            if let Some(line) = line {
                if line.starts_with(b"trailer") {
                    trailer_dict_offset = Some(after_trailer_keyword(data, line_offset));
                    break;
                }
            }
            return Err(Error::Structural("xref table ends before trailer".to_string()));
        }
    }

    // Parse the trailer dictionary right after the keyword.
    let dict_offset = trailer_dict_offset
        .ok_or_else(|| Error::Structural("xref table has no trailer".to_string()))?;
    let mut parser = ObjectParser::new(Scanner::at(data, dict_offset), *options);
    let trailer = match parser.parse_object()? {
        Some(Object::Dictionary(dict)) => dict,
        other => {
            return Err(Error::Structural(format!(
                "trailer is not a dictionary (found {})",
                other.map(|o| o.type_name()).unwrap_or("EOF")
            )));
        },
    };
    warnings.extend(parser.take_warnings());
    table.set_trailer(trailer);

    Ok(table)
}

/// Offset just past the `trailer` keyword found at or after `line_offset`.
fn after_trailer_keyword(data: &[u8], line_offset: usize) -> usize {
    data[line_offset..]
        .windows(7)
        .position(|w| w == b"trailer")
        .map(|p| line_offset + p + 7)
        .unwrap_or(line_offset)
}

/// Parse one `offset generation flag` entry line.
fn parse_xref_entry_line(line: &[u8]) -> Option<XrefEntry> {
    let text = std::str::from_utf8(line).ok()?;
    let mut parts = text.split_whitespace();
    let offset: u64 = parts.next()?.parse().ok()?;
    let gen: u16 = parts.next()?.parse().ok()?;
    let flag = parts.next()?;

    match flag.as_bytes().first()?.to_ascii_lowercase() {
        b'n' => Some(XrefEntry::Uncompressed { offset, gen }),
        b'f' => Some(XrefEntry::Free {
            next: offset as u32,
            gen,
        }),
        _ => None,
    }
}

/// Parse a cross-reference stream (`/Type /XRef`, PDF 1.5+).
///
/// The decoded payload is an array of fixed-width big-endian records whose
/// field widths come from `/W`; `/Index` partitions them into subsections.
/// Record types: 0 free, 1 uncompressed (offset, generation), 2 compressed
/// (containing stream object number, index within the stream).
fn parse_xref_stream(
    data: &[u8],
    offset: usize,
    options: &ParseOptions,
    warnings: &mut Vec<Warning>,
) -> Result<XrefTable> {
    let mut parser = ObjectParser::new(Scanner::at(data, offset), *options);
    let (_, object) = parser
        .parse_indirect()?
        .ok_or_else(|| Error::Structural("no indirect object at xref stream offset".to_string()))?;
    warnings.extend(parser.take_warnings());

    let stream = object
        .as_stream()
        .ok_or_else(|| Error::Structural("xref stream offset holds a non-stream".to_string()))?;

    if let Some(type_name) = stream.type_name() {
        if type_name != "XRef" {
            return Err(Error::Structural(format!(
                "expected /Type /XRef, found /{}",
                type_name
            )));
        }
    }

    let dict = &stream.dict;
    let widths: Vec<usize> = dict
        .get("W")
        .and_then(|o| o.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|o| o.as_integer())
                .filter_map(|n| usize::try_from(n).ok())
                .collect()
        })
        .ok_or_else(|| Error::Structural("xref stream missing /W".to_string()))?;
    if widths.len() != 3 {
        return Err(Error::Structural(format!(
            "xref stream /W has {} fields, expected 3",
            widths.len()
        )));
    }
    let record_len: usize = widths.iter().sum();
    if record_len == 0 {
        return Err(Error::Structural("xref stream /W is all zeros".to_string()));
    }

    let size = dict
        .get("Size")
        .and_then(|o| o.as_integer())
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| Error::Structural("xref stream missing /Size".to_string()))?;

    let subsections: Vec<(u32, u32)> = match dict.get("Index").and_then(|o| o.as_array()) {
        Some(index) => {
            let nums: Vec<u32> = index
                .iter()
                .filter_map(|o| o.as_integer())
                .filter_map(|n| u32::try_from(n).ok())
                .collect();
            if !nums.len().is_multiple_of(2) {
                return Err(Error::Structural("xref stream /Index has odd length".to_string()));
            }
            nums.chunks(2).map(|pair| (pair[0], pair[1])).collect()
        },
        None => vec![(0, size)],
    };

    let payload = stream
        .decoded_data(options)
        .map_err(|e| Error::Structural(format!("xref stream payload: {}", e)))?;

    let mut table = XrefTable::new();
    let mut pos = 0;

    'outer: for (first, count) in subsections {
        for i in 0..count {
            if pos + record_len > payload.len() {
                warnings.push(Warning::new(
                    offset,
                    format!(
                        "xref stream data ends after {} of {} records",
                        table.len(),
                        size
                    ),
                ));
                break 'outer;
            }
            let record = &payload[pos..pos + record_len];
            pos += record_len;

            let (w1, w2, w3) = (widths[0], widths[1], widths[2]);
            // A zero-width type field defaults the record to type 1.
            let kind = if w1 > 0 { read_be(&record[..w1]) } else { 1 };
            let field2 = read_be(&record[w1..w1 + w2]);
            let field3 = read_be(&record[w1 + w2..]);

            let entry = match kind {
                0 => XrefEntry::Free {
                    next: field2 as u32,
                    gen: field3 as u16,
                },
                1 => XrefEntry::Uncompressed {
                    offset: field2,
                    gen: field3 as u16,
                },
                2 => XrefEntry::Compressed {
                    stream: field2 as u32,
                    index: field3 as u16,
                },
                other => {
                    return Err(Error::Structural(format!(
                        "invalid xref stream record type {}",
                        other
                    )));
                },
            };
            table.insert(first + i, entry);
        }
    }

    table.set_trailer(dict.clone());
    Ok(table)
}

/// Read a big-endian unsigned integer from up to 8 bytes.
fn read_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}
