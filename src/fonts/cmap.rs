//! CMap data structures and lookup engine.
//!
//! A CMap maps variable-length byte codes to Unicode strings and/or CIDs.
//! Codes are read through codespace ranges (shortest valid prefix wins),
//! Unicode lookups are partitioned by code length, and CID range mappings
//! are compressed by extending the previous range in place whenever a new
//! range continues it. That compression is what keeps memory bounded for
//! the two-byte Identity mappings every CJK document carries.

use crate::error::{Error, Result};
use std::collections::HashMap;

/// A contiguous range of valid byte sequences of one fixed length.
///
/// Matching is componentwise: byte `i` of a candidate code must lie within
/// `[low[i], high[i]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodespaceRange {
    low: Vec<u8>,
    high: Vec<u8>,
}

impl CodespaceRange {
    /// Build a range from the two hex-string bounds.
    ///
    /// A single zero byte on the low side is implicitly widened with
    /// zeros to the high side's length (a common shorthand in real
    /// CMaps); any other length mismatch is an error.
    pub fn new(low: &[u8], high: &[u8]) -> Result<Self> {
        let low = if low.len() != high.len() {
            if low == [0] {
                vec![0; high.len()]
            } else {
                return Err(Error::CMapSyntax(format!(
                    "codespace bounds have different lengths ({} vs {})",
                    low.len(),
                    high.len()
                )));
            }
        } else {
            low.to_vec()
        };

        if low.is_empty() || low.len() > 4 {
            return Err(Error::CMapSyntax(format!(
                "codespace range length {} out of range",
                low.len()
            )));
        }

        Ok(Self {
            low,
            high: high.to_vec(),
        })
    }

    /// Number of bytes in a code belonging to this range.
    pub fn code_length(&self) -> usize {
        self.high.len()
    }

    /// Componentwise containment test for an `n`-byte code.
    pub fn is_full_match(&self, code: u32, n: usize) -> bool {
        if n != self.code_length() {
            return false;
        }
        for i in 0..n {
            let byte = ((code >> (8 * (n - 1 - i))) & 0xFF) as u8;
            if byte < self.low[i] || byte > self.high[i] {
                return false;
            }
        }
        true
    }
}

/// A compressed run of consecutive code-to-CID assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CidRange {
    /// First code in the run
    pub low: u32,
    /// Last code in the run (inclusive)
    pub high: u32,
    /// Byte length of codes in this run
    pub code_length: usize,
    /// CID assigned to `low`; subsequent codes increment from here
    pub cid: u32,
}

/// Sentinel for "no space mapping recorded".
const NO_SPACE: i64 = -1;

/// A parsed CMap.
#[derive(Debug, Clone)]
pub struct CMap {
    /// Writing mode: 0 horizontal, 1 vertical
    pub writing_mode: u8,
    /// `/CMapName`, when present
    pub name: Option<String>,
    /// `/CIDSystemInfo /Registry`
    pub registry: Option<String>,
    /// `/CIDSystemInfo /Ordering`
    pub ordering: Option<String>,
    /// `/CIDSystemInfo /Supplement`
    pub supplement: Option<i64>,
    /// `/CMapType`
    pub cmap_type: Option<i64>,

    codespace_ranges: Vec<CodespaceRange>,

    // Unicode maps partitioned by code length. Three- and four-byte codes
    // share the last map; real CMaps do not mix those lengths ambiguously.
    single_byte: HashMap<u32, String>,
    double_byte: HashMap<u32, String>,
    multi_byte: HashMap<u32, String>,

    cid_chars: HashMap<usize, HashMap<u32, u32>>,
    cid_ranges: Vec<CidRange>,

    unicode_to_code: HashMap<String, Vec<u8>>,
    space_code: i64,

    min_code_length: usize,
    max_code_length: usize,
}

impl Default for CMap {
    fn default() -> Self {
        Self::new()
    }
}

impl CMap {
    /// Create an empty CMap.
    pub fn new() -> Self {
        Self {
            writing_mode: 0,
            name: None,
            registry: None,
            ordering: None,
            supplement: None,
            cmap_type: None,
            codespace_ranges: Vec::new(),
            single_byte: HashMap::new(),
            double_byte: HashMap::new(),
            multi_byte: HashMap::new(),
            cid_chars: HashMap::new(),
            cid_ranges: Vec::new(),
            unicode_to_code: HashMap::new(),
            space_code: NO_SPACE,
            min_code_length: 0,
            max_code_length: 0,
        }
    }

    /// Shortest code length observed (1 when nothing was recorded).
    pub fn min_code_length(&self) -> usize {
        if self.min_code_length == 0 {
            1
        } else {
            self.min_code_length
        }
    }

    /// Longest code length observed (1 when nothing was recorded).
    pub fn max_code_length(&self) -> usize {
        self.max_code_length.max(1)
    }

    fn note_code_length(&mut self, len: usize) {
        if self.min_code_length == 0 || len < self.min_code_length {
            self.min_code_length = len;
        }
        if len > self.max_code_length {
            self.max_code_length = len;
        }
    }

    /// The registered codespace ranges.
    pub fn codespace_ranges(&self) -> &[CodespaceRange] {
        &self.codespace_ranges
    }

    /// The compressed CID range list (insertion order).
    pub fn cid_ranges(&self) -> &[CidRange] {
        &self.cid_ranges
    }

    /// Byte code that maps to U+0020, when one was recorded.
    pub fn space_code(&self) -> Option<u32> {
        (self.space_code != NO_SPACE).then_some(self.space_code as u32)
    }

    /// Register a codespace range.
    pub fn add_codespace_range(&mut self, low: &[u8], high: &[u8]) -> Result<()> {
        let range = CodespaceRange::new(low, high)?;
        self.note_code_length(range.code_length());
        self.codespace_ranges.push(range);
        Ok(())
    }

    /// Read one code from `bytes` at `offset`.
    ///
    /// The minimum-length prefix whose value falls inside some codespace
    /// range wins; candidate lengths grow one byte at a time up to the
    /// maximum length. When nothing matches, exactly the minimum code
    /// length is consumed anyway - Adobe Reader behaves this way and a
    /// surprising number of real CMaps depend on it. Never reads past the
    /// end of input.
    pub fn read_code(&self, bytes: &[u8], offset: usize) -> (u32, usize) {
        let available = bytes.len().saturating_sub(offset);
        let min = self.min_code_length();
        let max = self.max_code_length().min(available);

        let mut code: u32 = 0;
        for n in 1..=max {
            code = (code << 8) | bytes[offset + n - 1] as u32;
            if n < min {
                continue;
            }
            for range in &self.codespace_ranges {
                if range.is_full_match(code, n) {
                    return (code, n);
                }
            }
        }

        // Fallback: consume exactly the minimum code length, clamped.
        let take = min.min(available);
        let mut code: u32 = 0;
        for i in 0..take {
            code = (code << 8) | bytes[offset + i] as u32;
        }
        (code, take)
    }

    /// Record a code-to-Unicode mapping.
    ///
    /// Maintains the forward map for the code's length class, the reverse
    /// Unicode-to-code map, and the cached space code.
    pub fn add_char_mapping(&mut self, code_bytes: &[u8], unicode: &str) {
        let len = code_bytes.len();
        let code = be_value(code_bytes);
        self.note_code_length(len);

        self.unicode_map_mut(len).insert(code, unicode.to_string());
        self.unicode_to_code
            .entry(unicode.to_string())
            .or_insert_with(|| code_bytes.to_vec());

        if unicode == " " {
            self.space_code = code as i64;
        }
    }

    fn unicode_map_mut(&mut self, len: usize) -> &mut HashMap<u32, String> {
        match len {
            1 => &mut self.single_byte,
            2 => &mut self.double_byte,
            _ => &mut self.multi_byte,
        }
    }

    fn unicode_map(&self, len: usize) -> &HashMap<u32, String> {
        match len {
            1 => &self.single_byte,
            2 => &self.double_byte,
            _ => &self.multi_byte,
        }
    }

    /// Unicode string for a code of known length.
    pub fn unicode_for_len(&self, code: u32, len: usize) -> Option<&str> {
        self.unicode_map(len).get(&code).map(|s| s.as_str())
    }

    /// Unicode string for a code of unknown length.
    ///
    /// Probes lengths 1, 2, 3, 4 in order and returns the first hit. A
    /// CMap with overlapping code lengths can return the shorter match
    /// here; that ambiguity is inherent to the probe order and callers
    /// that know the length should use [`CMap::unicode_for_len`].
    pub fn unicode(&self, code: u32) -> Option<&str> {
        for len in 1..=4 {
            if let Some(s) = self.unicode_for_len(code, len) {
                return Some(s);
            }
        }
        None
    }

    /// Code bytes previously recorded for a Unicode string.
    pub fn codes_for_unicode(&self, unicode: &str) -> Option<&[u8]> {
        self.unicode_to_code.get(unicode).map(|v| v.as_slice())
    }

    /// Record a single code-to-CID assignment.
    pub fn add_cid_char(&mut self, code_bytes: &[u8], cid: u32) {
        let len = code_bytes.len();
        self.note_code_length(len);
        self.cid_chars
            .entry(len)
            .or_default()
            .insert(be_value(code_bytes), cid);
    }

    /// Record a range of code-to-CID assignments.
    ///
    /// When the new range continues the previous one - same code length,
    /// codes and CIDs both consecutive - the previous range is extended in
    /// place instead of growing the list.
    pub fn add_cid_range(&mut self, low_bytes: &[u8], high_bytes: &[u8], cid: u32) -> Result<()> {
        if low_bytes.len() != high_bytes.len() {
            return Err(Error::CMapSyntax(format!(
                "cidrange bounds have different lengths ({} vs {})",
                low_bytes.len(),
                high_bytes.len()
            )));
        }
        let code_length = low_bytes.len();
        let low = be_value(low_bytes);
        let high = be_value(high_bytes);
        if high < low {
            return Err(Error::CMapSyntax(format!(
                "cidrange end {:#X} below start {:#X}",
                high, low
            )));
        }
        self.note_code_length(code_length);

        if let Some(last) = self.cid_ranges.last_mut() {
            let continues = last.code_length == code_length
                && low == last.high.wrapping_add(1)
                && cid == last.cid.wrapping_add(last.high - last.low).wrapping_add(1);
            if continues {
                last.high = high;
                return Ok(());
            }
        }

        self.cid_ranges.push(CidRange {
            low,
            high,
            code_length,
            cid,
        });
        Ok(())
    }

    /// CID for a code of known length; 0 (.notdef) when unmapped.
    ///
    /// The direct per-length map is consulted first, then the range list
    /// in insertion order; the first hit wins.
    pub fn cid_for_len(&self, code: u32, len: usize) -> u32 {
        if let Some(direct) = self.cid_chars.get(&len).and_then(|m| m.get(&code)) {
            return *direct;
        }
        for range in &self.cid_ranges {
            if range.code_length == len && range.low <= code && code <= range.high {
                return range.cid + (code - range.low);
            }
        }
        0
    }

    /// Import another CMap's tables (the `usecmap` operation).
    ///
    /// Codespace ranges, Unicode maps, and CID structures are copied;
    /// length bounds are recomputed across both sides.
    pub fn use_cmap(&mut self, other: &CMap) {
        self.codespace_ranges
            .extend(other.codespace_ranges.iter().cloned());
        for (code, s) in &other.single_byte {
            self.single_byte.entry(*code).or_insert_with(|| s.clone());
        }
        for (code, s) in &other.double_byte {
            self.double_byte.entry(*code).or_insert_with(|| s.clone());
        }
        for (code, s) in &other.multi_byte {
            self.multi_byte.entry(*code).or_insert_with(|| s.clone());
        }
        for (len, map) in &other.cid_chars {
            let target = self.cid_chars.entry(*len).or_default();
            for (code, cid) in map {
                target.entry(*code).or_insert(*cid);
            }
        }
        self.cid_ranges.extend(other.cid_ranges.iter().copied());
        for (s, bytes) in &other.unicode_to_code {
            self.unicode_to_code
                .entry(s.clone())
                .or_insert_with(|| bytes.clone());
        }

        if other.min_code_length != 0
            && (self.min_code_length == 0 || other.min_code_length < self.min_code_length)
        {
            self.min_code_length = other.min_code_length;
        }
        if other.max_code_length > self.max_code_length {
            self.max_code_length = other.max_code_length;
        }
        if self.space_code == NO_SPACE {
            self.space_code = other.space_code;
        }
    }

    /// True when no mapping of any kind was recorded.
    pub fn is_empty(&self) -> bool {
        self.codespace_ranges.is_empty()
            && self.single_byte.is_empty()
            && self.double_byte.is_empty()
            && self.multi_byte.is_empty()
            && self.cid_chars.is_empty()
            && self.cid_ranges.is_empty()
    }
}

/// Big-endian value of up to four code bytes.
fn be_value(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32)
}
