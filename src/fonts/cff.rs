//! CFF (Compact Font Format) tables.
//!
//! Covers what embedding needs: the INDEX and DICT container formats,
//! charset and encoding tables, per-glyph advance widths (the Type 2
//! width-prefix rule), and a subsetter that blanks unused charstrings.
//!
//! The subsetter keeps the glyph count and all glyph numbering intact -
//! unused charstrings become a bare `endchar` - so charset, encoding, and
//! FDSelect survive byte-for-byte and only the offsets recorded in the Top
//! DICT move. That is the cheapest rewrite that still sheds outline data,
//! and it emits valid `CIDFontType0C` output for both CFF flavors.

use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder};
use std::collections::HashMap;

/// Operator numbers used from the Top and Private DICTs. Two-byte
/// operators are encoded as `1200 + n`.
mod op {
    pub const CHARSET: u16 = 15;
    pub const ENCODING: u16 = 16;
    pub const CHARSTRINGS: u16 = 17;
    pub const PRIVATE: u16 = 18;
    pub const SUBRS: u16 = 19;
    pub const DEFAULT_WIDTH_X: u16 = 20;
    pub const NOMINAL_WIDTH_X: u16 = 21;
    pub const ROS: u16 = 1230;
    pub const FD_ARRAY: u16 = 1236;
    pub const FD_SELECT: u16 = 1237;
}

/// One operand in a DICT: integers and reals are enough for our keys.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DictValue {
    /// Integer operand
    Int(i64),
    /// Real operand (BCD-encoded in the file)
    Real(f64),
}

impl DictValue {
    fn as_i64(&self) -> i64 {
        match self {
            DictValue::Int(v) => *v,
            DictValue::Real(v) => *v as i64,
        }
    }

    fn as_f64(&self) -> f64 {
        match self {
            DictValue::Int(v) => *v as f64,
            DictValue::Real(v) => *v,
        }
    }
}

/// A parsed DICT: operator to operand list, file order preserved.
#[derive(Debug, Clone, Default)]
pub struct CffDict {
    entries: Vec<(u16, Vec<DictValue>)>,
}

impl CffDict {
    /// Parse DICT data.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut entries = Vec::new();
        let mut operands: Vec<DictValue> = Vec::new();
        let mut pos = 0;

        while pos < data.len() {
            let b0 = data[pos];
            match b0 {
                // Operators
                0..=11 | 13..=21 => {
                    entries.push((b0 as u16, std::mem::take(&mut operands)));
                    pos += 1;
                },
                12 => {
                    let b1 = *data
                        .get(pos + 1)
                        .ok_or_else(|| Error::Font("truncated CFF DICT operator".to_string()))?;
                    entries.push((1200 + b1 as u16, std::mem::take(&mut operands)));
                    pos += 2;
                },
                // Operands
                28 => {
                    if pos + 3 > data.len() {
                        return Err(Error::Font("truncated CFF DICT int16".to_string()));
                    }
                    operands.push(DictValue::Int(BigEndian::read_i16(&data[pos + 1..]) as i64));
                    pos += 3;
                },
                29 => {
                    if pos + 5 > data.len() {
                        return Err(Error::Font("truncated CFF DICT int32".to_string()));
                    }
                    operands.push(DictValue::Int(BigEndian::read_i32(&data[pos + 1..]) as i64));
                    pos += 5;
                },
                30 => {
                    let (value, consumed) = parse_real(&data[pos + 1..])?;
                    operands.push(DictValue::Real(value));
                    pos += 1 + consumed;
                },
                32..=246 => {
                    operands.push(DictValue::Int(b0 as i64 - 139));
                    pos += 1;
                },
                247..=250 => {
                    let b1 = *data
                        .get(pos + 1)
                        .ok_or_else(|| Error::Font("truncated CFF DICT operand".to_string()))?;
                    operands.push(DictValue::Int(
                        (b0 as i64 - 247) * 256 + b1 as i64 + 108,
                    ));
                    pos += 2;
                },
                251..=254 => {
                    let b1 = *data
                        .get(pos + 1)
                        .ok_or_else(|| Error::Font("truncated CFF DICT operand".to_string()))?;
                    operands.push(DictValue::Int(
                        -(b0 as i64 - 251) * 256 - b1 as i64 - 108,
                    ));
                    pos += 2;
                },
                other => {
                    return Err(Error::Font(format!("reserved CFF DICT byte {}", other)));
                },
            }
        }

        Ok(Self { entries })
    }

    /// Operands of the first occurrence of `operator`.
    pub fn get(&self, operator: u16) -> Option<&[DictValue]> {
        self.entries
            .iter()
            .find(|(o, _)| *o == operator)
            .map(|(_, v)| v.as_slice())
    }

    /// First operand of `operator` as an integer.
    pub fn get_i64(&self, operator: u16) -> Option<i64> {
        self.get(operator)?.first().map(|v| v.as_i64())
    }

    /// First operand of `operator` as a float.
    pub fn get_f64(&self, operator: u16) -> Option<f64> {
        self.get(operator)?.first().map(|v| v.as_f64())
    }

    /// Replace the operands of `operator` (first occurrence).
    fn set(&mut self, operator: u16, operands: Vec<DictValue>) {
        match self.entries.iter_mut().find(|(o, _)| *o == operator) {
            Some((_, v)) => *v = operands,
            None => self.entries.push((operator, operands)),
        }
    }

    /// Serialize with fixed-width integer operands so the encoded size
    /// does not depend on the operand values (offsets can be patched
    /// without shifting the layout).
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (operator, operands) in &self.entries {
            for operand in operands {
                match operand {
                    DictValue::Int(v) => {
                        out.push(29);
                        let mut buf = [0u8; 4];
                        BigEndian::write_i32(&mut buf, *v as i32);
                        out.extend_from_slice(&buf);
                    },
                    DictValue::Real(v) => encode_real(&mut out, *v),
                }
            }
            if *operator >= 1200 {
                out.push(12);
                out.push((*operator - 1200) as u8);
            } else {
                out.push(*operator as u8);
            }
        }
        out
    }
}

/// Parse a BCD real; returns (value, bytes consumed).
fn parse_real(data: &[u8]) -> Result<(f64, usize)> {
    let mut text = String::new();
    for (i, &byte) in data.iter().enumerate() {
        for nibble in [byte >> 4, byte & 0x0F] {
            match nibble {
                0..=9 => text.push((b'0' + nibble) as char),
                0xA => text.push('.'),
                0xB => text.push('E'),
                0xC => text.push_str("E-"),
                0xE => text.push('-'),
                0xF => {
                    let value = text.parse().unwrap_or(0.0);
                    return Ok((value, i + 1));
                },
                _ => return Err(Error::Font("reserved nibble in CFF real".to_string())),
            }
        }
    }
    Err(Error::Font("unterminated CFF real".to_string()))
}

/// Encode a real with the terminating nibble pair.
fn encode_real(out: &mut Vec<u8>, value: f64) {
    let text = format!("{}", value);
    let mut nibbles: Vec<u8> = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '0'..='9' => nibbles.push(c as u8 - b'0'),
            '.' => nibbles.push(0xA),
            '-' => nibbles.push(0xE),
            'e' | 'E' => {
                if chars.peek() == Some(&'-') {
                    chars.next();
                    nibbles.push(0xC);
                } else {
                    nibbles.push(0xB);
                }
            },
            _ => {},
        }
    }
    nibbles.push(0xF);
    if !nibbles.len().is_multiple_of(2) {
        nibbles.push(0xF);
    }
    out.push(30);
    for pair in nibbles.chunks(2) {
        out.push((pair[0] << 4) | pair[1]);
    }
}

/// An INDEX: a counted list of byte slices.
#[derive(Debug, Clone, Default)]
pub struct CffIndex {
    /// The contained items
    pub items: Vec<Vec<u8>>,
}

impl CffIndex {
    /// Parse an INDEX at `pos`; returns the index and the offset just
    /// past it.
    pub fn parse(data: &[u8], pos: usize) -> Result<(Self, usize)> {
        if pos + 2 > data.len() {
            return Err(Error::Font("truncated CFF INDEX header".to_string()));
        }
        let count = BigEndian::read_u16(&data[pos..]) as usize;
        if count == 0 {
            return Ok((Self::default(), pos + 2));
        }

        let off_size = *data
            .get(pos + 2)
            .ok_or_else(|| Error::Font("truncated CFF INDEX".to_string()))?
            as usize;
        if !(1..=4).contains(&off_size) {
            return Err(Error::Font(format!("CFF INDEX offSize {}", off_size)));
        }

        let offsets_start = pos + 3;
        let data_start = offsets_start + (count + 1) * off_size;
        if data_start > data.len() {
            return Err(Error::Font("truncated CFF INDEX offsets".to_string()));
        }

        let read_offset = |i: usize| -> usize {
            let slice = &data[offsets_start + i * off_size..];
            slice[..off_size]
                .iter()
                .fold(0usize, |acc, &b| (acc << 8) | b as usize)
        };

        let mut items = Vec::with_capacity(count);
        for i in 0..count {
            // Offsets are 1-based from the byte before the data region.
            let start = data_start + read_offset(i) - 1;
            let end = data_start + read_offset(i + 1) - 1;
            if start > end || end > data.len() {
                return Err(Error::Font("CFF INDEX item out of bounds".to_string()));
            }
            items.push(data[start..end].to_vec());
        }

        let end = data_start + read_offset(count) - 1;
        Ok((Self { items }, end))
    }

    /// Serialize, choosing the smallest sufficient offset size.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let count = self.items.len();
        out.extend_from_slice(&(count as u16).to_be_bytes());
        if count == 0 {
            return out;
        }

        let data_len: usize = self.items.iter().map(|i| i.len()).sum();
        let off_size: usize = match data_len + 1 {
            n if n <= 0xFF => 1,
            n if n <= 0xFFFF => 2,
            n if n <= 0xFF_FFFF => 3,
            _ => 4,
        };
        out.push(off_size as u8);

        let mut offset = 1usize;
        let mut write_offset = |out: &mut Vec<u8>, value: usize| {
            for shift in (0..off_size).rev() {
                out.push(((value >> (8 * shift)) & 0xFF) as u8);
            }
        };
        write_offset(&mut out, offset);
        for item in &self.items {
            offset += item.len();
            write_offset(&mut out, offset);
        }
        for item in &self.items {
            out.extend_from_slice(item);
        }
        out
    }

    /// Total encoded size.
    pub fn encoded_len(&self) -> usize {
        self.encode().len()
    }
}

/// A parsed CFF font.
#[derive(Debug, Clone)]
pub struct CffFont {
    data: Vec<u8>,
    header_size: usize,
    name_index: CffIndex,
    top_dict: CffDict,
    string_index: CffIndex,
    gsubr_index: CffIndex,
    /// Charstrings, one per glyph
    pub charstrings: CffIndex,
    /// gid -> SID (or CID for CID-keyed fonts)
    charset: Vec<u16>,
    /// code -> gid, from the encoding table
    code_to_gid: HashMap<u8, u16>,
    /// True for CID-keyed fonts (`/ROS` present)
    pub is_cid: bool,
    default_width_x: f64,
    nominal_width_x: f64,
    /// Units per em derived from the FontMatrix (1000 for the usual
    /// 0.001 matrix)
    pub units_per_em: u16,
}

impl CffFont {
    /// Parse a bare CFF font.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 4 || data[0] != 1 {
            return Err(Error::Font("not a CFF table (bad header)".to_string()));
        }
        let header_size = data[2] as usize;

        let (name_index, pos) = CffIndex::parse(data, header_size)?;
        let (top_dict_index, pos) = CffIndex::parse(data, pos)?;
        let (string_index, pos) = CffIndex::parse(data, pos)?;
        let (gsubr_index, _) = CffIndex::parse(data, pos)?;

        let top_dict_data = top_dict_index
            .items
            .first()
            .ok_or_else(|| Error::Font("CFF has no Top DICT".to_string()))?;
        let top_dict = CffDict::parse(top_dict_data)?;

        let is_cid = top_dict.get(op::ROS).is_some();

        let charstrings_offset = top_dict
            .get_i64(op::CHARSTRINGS)
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| Error::Font("CFF Top DICT has no CharStrings".to_string()))?;
        let (charstrings, _) = CffIndex::parse(data, charstrings_offset)?;
        let num_glyphs = charstrings.items.len();

        let charset = match top_dict.get_i64(op::CHARSET) {
            Some(offset) if offset > 2 => parse_charset(data, offset as usize, num_glyphs)?,
            // ISOAdobe (0) and the predefined charsets: identity is close
            // enough for the lookups we do.
            _ => (0..num_glyphs as u16).collect(),
        };

        let code_to_gid = match top_dict.get_i64(op::ENCODING) {
            Some(offset) if offset > 1 => parse_encoding(data, offset as usize)?,
            // Standard encoding: code c (32..126) carries SID c-31; invert
            // the charset to find the glyph.
            _ => standard_encoding_map(&charset),
        };

        let (default_width_x, nominal_width_x) = match top_dict.get(op::PRIVATE) {
            Some([size, offset]) => {
                let size = size.as_i64() as usize;
                let offset = offset.as_i64() as usize;
                if offset + size <= data.len() {
                    let private = CffDict::parse(&data[offset..offset + size])?;
                    (
                        private.get_f64(op::DEFAULT_WIDTH_X).unwrap_or(0.0),
                        private.get_f64(op::NOMINAL_WIDTH_X).unwrap_or(0.0),
                    )
                } else {
                    (0.0, 0.0)
                }
            },
            _ => (0.0, 0.0),
        };

        // FontMatrix [a b c d e f]: units per em is 1/a.
        let units_per_em = top_dict
            .get(1207)
            .and_then(|m| m.first())
            .map(|a| a.as_f64())
            .filter(|&a| a > 0.0)
            .map(|a| (1.0 / a).round() as u16)
            .unwrap_or(1000);

        Ok(Self {
            data: data.to_vec(),
            header_size,
            name_index,
            top_dict,
            string_index,
            gsubr_index,
            charstrings,
            charset,
            code_to_gid,
            is_cid,
            default_width_x,
            nominal_width_x,
            units_per_em,
        })
    }

    /// Number of glyphs.
    pub fn num_glyphs(&self) -> u16 {
        self.charstrings.items.len() as u16
    }

    /// The charset: SID (or CID for CID-keyed fonts) per glyph.
    pub fn charset(&self) -> &[u16] {
        &self.charset
    }

    /// Single-byte code to glyph id pairs from the encoding table.
    pub fn encoding_map(&self) -> &HashMap<u8, u16> {
        &self.code_to_gid
    }

    /// `/FontBBox` from the Top DICT, when present.
    pub fn font_bbox(&self) -> Option<[f64; 4]> {
        let operands = self.top_dict.get(5)?;
        if operands.len() != 4 {
            return None;
        }
        let mut bbox = [0.0; 4];
        for (slot, operand) in bbox.iter_mut().zip(operands) {
            *slot = operand.as_f64();
        }
        Some(bbox)
    }

    /// PostScript name from the Name INDEX.
    pub fn postscript_name(&self) -> Option<String> {
        self.name_index
            .items
            .first()
            .map(|n| String::from_utf8_lossy(n).into_owned())
    }

    /// Glyph for a code point.
    ///
    /// For CID-keyed fonts the charset maps CIDs; otherwise the encoding
    /// table (or standard encoding) maps single-byte codes.
    pub fn glyph_id(&self, code_point: u32) -> Option<u16> {
        if self.is_cid {
            // Identity lookup through the charset: find the gid whose CID
            // equals the code point.
            let target = u16::try_from(code_point).ok()?;
            return self
                .charset
                .iter()
                .position(|&cid| cid == target)
                .map(|gid| gid as u16);
        }
        u8::try_from(code_point)
            .ok()
            .and_then(|code| self.code_to_gid.get(&code).copied())
    }

    /// Advance width of a glyph in font units.
    ///
    /// Type 2 charstrings carry the width as an optional extra leading
    /// operand; absent means `defaultWidthX`.
    pub fn advance_width(&self, gid: u16) -> f64 {
        let Some(charstring) = self.charstrings.items.get(gid as usize) else {
            return self.default_width_x;
        };
        match charstring_width_delta(charstring) {
            Some(delta) => self.nominal_width_x + delta,
            None => self.default_width_x,
        }
    }

    /// Rewrite the font with every charstring outside `used_gids` replaced
    /// by a bare `endchar`.
    ///
    /// Glyph numbering, charset, encoding, and FDSelect are untouched, so
    /// consumers addressing glyphs by GID (a CIDFont with identity
    /// CIDToGID) keep working against the subset.
    pub fn subset(&self, used_gids: &std::collections::BTreeSet<u32>) -> Result<Vec<u8>> {
        let mut charstrings = CffIndex::default();
        for (gid, item) in self.charstrings.items.iter().enumerate() {
            if gid == 0 || used_gids.contains(&(gid as u32)) {
                charstrings.items.push(item.clone());
            } else {
                // Type 2 endchar
                charstrings.items.push(vec![0x0E]);
            }
        }
        self.rebuild(charstrings)
    }

    /// Re-emit the font with replacement charstrings.
    ///
    /// DICT operands are re-encoded fixed-width, so every section size is
    /// known before any offset is: one sizing pass lays the file out, a
    /// second encodes the Top DICT (and any FD DICTs) with final offsets.
    fn rebuild(&self, charstrings: CffIndex) -> Result<Vec<u8>> {
        let mut top_dict = self.top_dict.clone();

        // Sections carried over byte-for-byte from the source font.
        let charset_bytes = self.raw_section(op::CHARSET, charset_len(&self.data, &self.top_dict));
        let encoding_bytes =
            self.raw_section(op::ENCODING, encoding_len(&self.data, &self.top_dict));
        let fdselect_bytes =
            self.raw_section(op::FD_SELECT, fdselect_len(&self.data, &self.top_dict));
        let private_section = self.top_dict.get(op::PRIVATE).map(|operands| {
            let size = operands[0].as_i64() as usize;
            let offset = operands[1].as_i64() as usize;
            (size, self.private_blob(offset, size))
        });

        // CID fonts: FD DICTs and their private blobs.
        let mut fd_dicts: Vec<CffDict> = Vec::new();
        let mut fd_privates: Vec<(usize, Vec<u8>)> = Vec::new();
        if let Some(offset) = self.top_dict.get_i64(op::FD_ARRAY) {
            let (fd_index, _) = CffIndex::parse(&self.data, offset as usize)?;
            for item in &fd_index.items {
                let dict = CffDict::parse(item)?;
                let private = match dict.get(op::PRIVATE) {
                    Some([size, at]) => {
                        let size = size.as_i64() as usize;
                        (size, self.private_blob(at.as_i64() as usize, size))
                    },
                    _ => (0, Vec::new()),
                };
                fd_dicts.push(dict);
                fd_privates.push(private);
            }
        }

        // Pass 1: sizes. Fixed-width operands make dict sizes independent
        // of the offsets written into them.
        let header = &self.data[..self.header_size];
        let name_bytes = self.name_index.encode();
        let string_bytes = self.string_index.encode();
        let gsubr_bytes = self.gsubr_index.encode();
        let top_index_len = index_len_for(&[top_dict.encode().len()]);
        let charstrings_bytes = charstrings.encode();
        let fd_dict_sizes: Vec<usize> = fd_dicts.iter().map(|d| d.encode().len()).collect();
        let fd_index_len = (!fd_dicts.is_empty()).then(|| index_len_for(&fd_dict_sizes));

        let mut offset =
            header.len() + name_bytes.len() + top_index_len + string_bytes.len() + gsubr_bytes.len();
        let mut place = |len: usize| {
            let at = offset;
            offset += len;
            at
        };

        let charset_at = charset_bytes.as_ref().map(|b| place(b.len()));
        let encoding_at = encoding_bytes.as_ref().map(|b| place(b.len()));
        let fdselect_at = fdselect_bytes.as_ref().map(|b| place(b.len()));
        let charstrings_at = place(charstrings_bytes.len());
        let private_at = private_section.as_ref().map(|(_, blob)| place(blob.len()));
        let fdarray_at = fd_index_len.map(&mut place);
        let fd_private_ats: Vec<usize> = fd_privates
            .iter()
            .map(|(_, blob)| place(blob.len()))
            .collect();

        // Pass 2: patch offsets and encode.
        if let Some(at) = charset_at {
            top_dict.set(op::CHARSET, vec![DictValue::Int(at as i64)]);
        }
        if let Some(at) = encoding_at {
            top_dict.set(op::ENCODING, vec![DictValue::Int(at as i64)]);
        }
        if let Some(at) = fdselect_at {
            top_dict.set(op::FD_SELECT, vec![DictValue::Int(at as i64)]);
        }
        top_dict.set(op::CHARSTRINGS, vec![DictValue::Int(charstrings_at as i64)]);
        if let (Some(at), Some((size, _))) = (private_at, private_section.as_ref()) {
            top_dict.set(
                op::PRIVATE,
                vec![DictValue::Int(*size as i64), DictValue::Int(at as i64)],
            );
        }
        if let Some(at) = fdarray_at {
            top_dict.set(op::FD_ARRAY, vec![DictValue::Int(at as i64)]);
        }
        for (dict, ((size, blob), at)) in fd_dicts
            .iter_mut()
            .zip(fd_privates.iter().zip(fd_private_ats.iter()))
        {
            if !blob.is_empty() {
                dict.set(
                    op::PRIVATE,
                    vec![DictValue::Int(*size as i64), DictValue::Int(*at as i64)],
                );
            }
        }

        let top_index = CffIndex {
            items: vec![top_dict.encode()],
        };
        debug_assert_eq!(top_index.encoded_len(), top_index_len);

        let mut out = Vec::with_capacity(offset);
        out.extend_from_slice(header);
        out.extend_from_slice(&name_bytes);
        out.extend_from_slice(&top_index.encode());
        out.extend_from_slice(&string_bytes);
        out.extend_from_slice(&gsubr_bytes);
        for section in [&charset_bytes, &encoding_bytes, &fdselect_bytes]
            .into_iter()
            .flatten()
        {
            out.extend_from_slice(section);
        }
        out.extend_from_slice(&charstrings_bytes);
        if let Some((_, blob)) = &private_section {
            out.extend_from_slice(blob);
        }
        if !fd_dicts.is_empty() {
            let fd_index = CffIndex {
                items: fd_dicts.iter().map(|d| d.encode()).collect(),
            };
            out.extend_from_slice(&fd_index.encode());
            for (_, blob) in &fd_privates {
                out.extend_from_slice(blob);
            }
        }
        Ok(out)
    }

    /// Copy the raw bytes of a section addressed by a Top DICT offset.
    fn raw_section(&self, operator: u16, len: Option<usize>) -> Option<Vec<u8>> {
        let offset = self.top_dict.get_i64(operator)? as usize;
        if operator == op::CHARSET && offset <= 2 {
            return None;
        }
        if operator == op::ENCODING && offset <= 1 {
            return None;
        }
        let len = len?;
        self.data.get(offset..offset + len).map(|b| b.to_vec())
    }

    /// Private DICT bytes, with the local Subrs INDEX kept behind them
    /// when it already sits there (the layout every mainstream compiler
    /// emits). Non-adjacent subrs are dropped; the glyphs that called
    /// them are exactly the ones the subset blanks.
    fn private_blob(&self, offset: usize, size: usize) -> Vec<u8> {
        let Some(dict_bytes) = self.data.get(offset..offset + size) else {
            return Vec::new();
        };
        let mut blob = dict_bytes.to_vec();
        if let Ok(private) = CffDict::parse(&blob) {
            if let Some(subrs_rel) = private.get_i64(op::SUBRS) {
                if subrs_rel as usize == size {
                    if let Ok((_, end)) = CffIndex::parse(&self.data, offset + size) {
                        blob.extend_from_slice(&self.data[offset + size..end]);
                    }
                } else {
                    log::warn!("CFF local subrs not adjacent to Private dict; dropped");
                }
            }
        }
        blob
    }
}

/// Encoded length of an INDEX holding items of the given sizes.
fn index_len_for(item_sizes: &[usize]) -> usize {
    if item_sizes.is_empty() {
        return 2;
    }
    let data_len: usize = item_sizes.iter().sum();
    let off_size: usize = match data_len + 1 {
        n if n <= 0xFF => 1,
        n if n <= 0xFFFF => 2,
        n if n <= 0xFF_FFFF => 3,
        _ => 4,
    };
    2 + 1 + (item_sizes.len() + 1) * off_size + data_len
}

/// Byte length of a charset table for `num_glyphs` glyphs.
fn charset_len(data: &[u8], top_dict: &CffDict) -> Option<usize> {
    let offset = top_dict.get_i64(op::CHARSET)? as usize;
    if offset <= 2 {
        return None;
    }
    // Re-parse to learn the length.
    let charstrings_offset = top_dict.get_i64(op::CHARSTRINGS)? as usize;
    let (charstrings, _) = CffIndex::parse(data, charstrings_offset).ok()?;
    charset_parsed_len(data, offset, charstrings.items.len())
}

fn charset_parsed_len(data: &[u8], offset: usize, num_glyphs: usize) -> Option<usize> {
    let format = *data.get(offset)?;
    match format {
        0 => Some(1 + (num_glyphs.saturating_sub(1)) * 2),
        1 | 2 => {
            let range_size = if format == 1 { 3 } else { 4 };
            let mut covered = 1; // .notdef
            let mut pos = offset + 1;
            while covered < num_glyphs {
                let n_left = if format == 1 {
                    *data.get(pos + 2)? as usize
                } else {
                    BigEndian::read_u16(data.get(pos + 2..pos + 4)?) as usize
                };
                covered += n_left + 1;
                pos += range_size;
            }
            Some(pos - offset)
        },
        _ => None,
    }
}

/// Byte length of an encoding table.
fn encoding_len(data: &[u8], top_dict: &CffDict) -> Option<usize> {
    let offset = top_dict.get_i64(op::ENCODING)? as usize;
    if offset <= 1 {
        return None;
    }
    let format = *data.get(offset)?;
    match format & 0x7F {
        0 => {
            let n = *data.get(offset + 1)? as usize;
            Some(2 + n)
        },
        1 => {
            let n = *data.get(offset + 1)? as usize;
            Some(2 + n * 2)
        },
        _ => None,
    }
}

/// Byte length of an FDSelect table.
fn fdselect_len(data: &[u8], top_dict: &CffDict) -> Option<usize> {
    let offset = top_dict.get_i64(op::FD_SELECT)? as usize;
    let format = *data.get(offset)?;
    match format {
        0 => {
            let charstrings_offset = top_dict.get_i64(op::CHARSTRINGS)? as usize;
            let (charstrings, _) = CffIndex::parse(data, charstrings_offset).ok()?;
            Some(1 + charstrings.items.len())
        },
        3 => {
            let n_ranges = BigEndian::read_u16(data.get(offset + 1..offset + 3)?) as usize;
            Some(3 + n_ranges * 3 + 2)
        },
        _ => None,
    }
}

/// Parse a charset table into gid -> SID/CID.
fn parse_charset(data: &[u8], offset: usize, num_glyphs: usize) -> Result<Vec<u16>> {
    let format = *data
        .get(offset)
        .ok_or_else(|| Error::Font("charset offset out of bounds".to_string()))?;
    let mut charset = Vec::with_capacity(num_glyphs);
    charset.push(0); // .notdef

    match format {
        0 => {
            let mut pos = offset + 1;
            while charset.len() < num_glyphs {
                let sid = BigEndian::read_u16(
                    data.get(pos..pos + 2)
                        .ok_or_else(|| Error::Font("truncated charset".to_string()))?,
                );
                charset.push(sid);
                pos += 2;
            }
        },
        1 | 2 => {
            let mut pos = offset + 1;
            while charset.len() < num_glyphs {
                let first = BigEndian::read_u16(
                    data.get(pos..pos + 2)
                        .ok_or_else(|| Error::Font("truncated charset".to_string()))?,
                );
                let n_left = if format == 1 {
                    *data
                        .get(pos + 2)
                        .ok_or_else(|| Error::Font("truncated charset".to_string()))?
                        as usize
                } else {
                    BigEndian::read_u16(
                        data.get(pos + 2..pos + 4)
                            .ok_or_else(|| Error::Font("truncated charset".to_string()))?,
                    ) as usize
                };
                for i in 0..=n_left {
                    if charset.len() >= num_glyphs {
                        break;
                    }
                    charset.push(first + i as u16);
                }
                pos += if format == 1 { 3 } else { 4 };
            }
        },
        other => {
            return Err(Error::Font(format!("unsupported charset format {}", other)));
        },
    }

    Ok(charset)
}

/// Parse an encoding table (formats 0 and 1) into code -> gid.
fn parse_encoding(data: &[u8], offset: usize) -> Result<HashMap<u8, u16>> {
    let format = *data
        .get(offset)
        .ok_or_else(|| Error::Font("encoding offset out of bounds".to_string()))?;
    let mut map = HashMap::new();

    match format & 0x7F {
        0 => {
            let n_codes = *data
                .get(offset + 1)
                .ok_or_else(|| Error::Font("truncated encoding".to_string()))?
                as usize;
            for i in 0..n_codes {
                let code = *data
                    .get(offset + 2 + i)
                    .ok_or_else(|| Error::Font("truncated encoding".to_string()))?;
                map.insert(code, (i + 1) as u16);
            }
        },
        1 => {
            let n_ranges = *data
                .get(offset + 1)
                .ok_or_else(|| Error::Font("truncated encoding".to_string()))?
                as usize;
            let mut gid: u16 = 1;
            for r in 0..n_ranges {
                let at = offset + 2 + r * 2;
                let first = *data
                    .get(at)
                    .ok_or_else(|| Error::Font("truncated encoding".to_string()))?;
                let n_left = *data
                    .get(at + 1)
                    .ok_or_else(|| Error::Font("truncated encoding".to_string()))?;
                for i in 0..=n_left {
                    map.insert(first.saturating_add(i), gid);
                    gid += 1;
                }
            }
        },
        other => {
            return Err(Error::Font(format!("unsupported encoding format {}", other)));
        },
    }

    Ok(map)
}

/// Standard-encoding lookup: printable ASCII code `c` carries SID `c-31`;
/// the charset inversion turns that into a glyph id.
fn standard_encoding_map(charset: &[u16]) -> HashMap<u8, u16> {
    let mut sid_to_gid = HashMap::new();
    for (gid, &sid) in charset.iter().enumerate() {
        sid_to_gid.entry(sid).or_insert(gid as u16);
    }

    let mut map = HashMap::new();
    for code in 32u8..=126 {
        let sid = (code - 31) as u16;
        if let Some(&gid) = sid_to_gid.get(&sid) {
            map.insert(code, gid);
        }
    }
    map
}

/// Width prefix of a Type 2 charstring, if present.
///
/// The charstring's leading operands run up to the first stem/move/endchar
/// operator; when their count exceeds the operator's natural arity parity,
/// the first operand is the width delta from `nominalWidthX`.
fn charstring_width_delta(cs: &[u8]) -> Option<f64> {
    let mut operands: Vec<f64> = Vec::new();
    let mut pos = 0;

    while pos < cs.len() {
        let b0 = cs[pos];
        match b0 {
            28 => {
                let v = BigEndian::read_i16(cs.get(pos + 1..pos + 3)?);
                operands.push(v as f64);
                pos += 3;
            },
            32..=246 => {
                operands.push(b0 as f64 - 139.0);
                pos += 1;
            },
            247..=250 => {
                let b1 = *cs.get(pos + 1)?;
                operands.push((b0 as f64 - 247.0) * 256.0 + b1 as f64 + 108.0);
                pos += 2;
            },
            251..=254 => {
                let b1 = *cs.get(pos + 1)?;
                operands.push(-(b0 as f64 - 251.0) * 256.0 - b1 as f64 - 108.0);
                pos += 2;
            },
            255 => {
                let v = BigEndian::read_i32(cs.get(pos + 1..pos + 5)?);
                operands.push(v as f64 / 65536.0);
                pos += 5;
            },
            // First operator decides.
            1 | 3 | 18 | 23 => {
                // hstem/vstem/hstemhm/vstemhm: pairs, odd count means width
                return (!operands.len().is_multiple_of(2)).then(|| operands[0]);
            },
            19 | 20 => {
                // hintmask/cntrmask with implicit vstem operands
                return (!operands.len().is_multiple_of(2)).then(|| operands[0]);
            },
            21 => {
                // rmoveto: 2 args
                return (operands.len() > 2).then(|| operands[0]);
            },
            22 | 4 => {
                // hmoveto/vmoveto: 1 arg
                return (operands.len() > 1).then(|| operands[0]);
            },
            14 => {
                // endchar: 0 (or 4 for seac)
                return (operands.len() == 1 || operands.len() == 5).then(|| operands[0]);
            },
            _ => return None,
        }
    }
    None
}
