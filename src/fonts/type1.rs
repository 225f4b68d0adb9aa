//! Type 1 font program parser.
//!
//! Walks the cleartext PostScript dictionary for the font header
//! (`FontName`, `FontMatrix`, `FontBBox`, `Encoding`, `FontInfo`), then
//! eexec-decrypts the binary segment and walks `/Private`, `/Subrs`, and
//! `/CharStrings`, charstring-decrypting each glyph program.
//!
//! Only `StandardEncoding` is recognized by name; other named encodings
//! raise `DamagedFont` (a registry of built-in encodings lives above the
//! core).

use super::eexec;
use super::pfb::{self, PfbSegments};
use super::type1_lexer::{Type1Lexer, Type1Token};
use crate::error::{Error, Result};
use indexmap::IndexMap;

/// Glyph encoding of a Type 1 font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoding {
    /// Adobe StandardEncoding, referenced by name
    Standard,
    /// Inline encoding built from `dup <code> /<name> put` entries
    Custom(IndexMap<u8, String>),
}

/// `/FontInfo` entries the embedder cares about.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FontInfo {
    /// Italic angle in degrees
    pub italic_angle: f64,
    /// True for monospaced designs
    pub is_fixed_pitch: bool,
    /// Underline position in font units
    pub underline_position: f64,
    /// Underline thickness in font units
    pub underline_thickness: f64,
    /// Family name string
    pub family_name: Option<String>,
    /// Full name string
    pub full_name: Option<String>,
    /// Weight string
    pub weight: Option<String>,
}

/// `/Private` dictionary metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct PrivateDict {
    /// Charstring lead-in length; -1 marks unencrypted charstrings
    pub len_iv: i32,
    /// Alignment zone pairs
    pub blue_values: Vec<i32>,
    /// Bottom-zone pairs
    pub other_blues: Vec<i32>,
    /// Family alignment zones
    pub family_blues: Vec<i32>,
    /// Family bottom zones
    pub family_other_blues: Vec<i32>,
    /// Overshoot suppression threshold
    pub blue_scale: f64,
    /// Overshoot enforcement threshold
    pub blue_shift: i32,
    /// Fuzz applied to alignment zones
    pub blue_fuzz: i32,
    /// Dominant horizontal stem width
    pub std_hw: Option<f64>,
    /// Dominant vertical stem width
    pub std_vw: Option<f64>,
    /// Horizontal stem-width snap table
    pub stem_snap_h: Vec<f64>,
    /// Vertical stem-width snap table
    pub stem_snap_v: Vec<f64>,
    /// Force-bold flag
    pub force_bold: bool,
}

impl Default for PrivateDict {
    fn default() -> Self {
        Self {
            len_iv: eexec::DEFAULT_LEN_IV,
            blue_values: Vec::new(),
            other_blues: Vec::new(),
            family_blues: Vec::new(),
            family_other_blues: Vec::new(),
            blue_scale: 0.039625,
            blue_shift: 7,
            blue_fuzz: 1,
            std_hw: None,
            std_vw: None,
            stem_snap_h: Vec::new(),
            stem_snap_v: Vec::new(),
            force_bold: false,
        }
    }
}

/// A parsed Type 1 font program.
#[derive(Debug, Clone)]
pub struct Type1Font {
    /// `/FontName`
    pub font_name: Option<String>,
    /// `/FontType` (1 for well-formed programs)
    pub font_type: i32,
    /// `/FontMatrix`, row-major `[a b c d e f]`
    pub font_matrix: [f64; 6],
    /// `/FontBBox`
    pub font_bbox: [f64; 4],
    /// Glyph encoding
    pub encoding: Encoding,
    /// `/FontInfo` fields
    pub font_info: FontInfo,
    /// Decrypted charstrings by glyph name, in definition order
    pub charstrings: IndexMap<String, Vec<u8>>,
    /// Decrypted subroutines; holes stay `None`
    pub subrs: Vec<Option<Vec<u8>>>,
    /// `/Private` dictionary metrics
    pub private: PrivateDict,
}

impl Type1Font {
    /// Parse a PFB- or PFA-wrapped Type 1 program.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let PfbSegments { ascii, binary } = pfb::read_pfb(data)?;
        Self::from_segments(&ascii, &binary)
    }

    /// Parse from already-separated segments.
    ///
    /// `binary` is the still-encrypted eexec portion; it may be hex-coded
    /// (PFA style), which is detected and undone here.
    pub fn from_segments(ascii: &[u8], binary: &[u8]) -> Result<Self> {
        if !ascii.starts_with(b"%!") {
            return Err(Error::DamagedFont(
                "Type 1 ASCII segment does not start with %!".to_string(),
            ));
        }

        let mut font = Self {
            font_name: None,
            font_type: 1,
            font_matrix: [0.001, 0.0, 0.0, 0.001, 0.0, 0.0],
            font_bbox: [0.0; 4],
            encoding: Encoding::Standard,
            font_info: FontInfo::default(),
            charstrings: IndexMap::new(),
            subrs: Vec::new(),
            private: PrivateDict::default(),
        };

        font.parse_cleartext(ascii)?;

        let cipher = if looks_like_hex(binary) {
            decode_hex_segment(binary)
        } else {
            binary.to_vec()
        };
        // The eexec body always discards 4 lead-in bytes; the Private
        // dict's lenIV applies to charstrings only.
        let plain = eexec::decrypt(&cipher, eexec::EEXEC_KEY, eexec::DEFAULT_LEN_IV);
        font.parse_encrypted(&plain)?;

        Ok(font)
    }

    /// Walk the cleartext dictionary.
    fn parse_cleartext(&mut self, data: &[u8]) -> Result<()> {
        let mut lexer = Type1Lexer::new(data);
        while let Some(token) = lexer.next()? {
            let Type1Token::Name(key) = token else {
                continue;
            };
            match key.as_str() {
                "FontName" => {
                    if let Some(Type1Token::Name(name)) = lexer.next()? {
                        self.font_name = Some(name);
                    }
                },
                "FontType" => {
                    if let Some(Type1Token::Integer(t)) = lexer.next()? {
                        self.font_type = t;
                    }
                },
                "FontMatrix" => {
                    let values = read_number_array(&mut lexer)?;
                    if values.len() == 6 {
                        self.font_matrix.copy_from_slice(&values);
                    }
                },
                "FontBBox" => {
                    let values = read_number_array(&mut lexer)?;
                    if values.len() == 4 {
                        self.font_bbox.copy_from_slice(&values);
                    }
                },
                "Encoding" => {
                    self.encoding = parse_encoding(&mut lexer)?;
                },
                "FontInfo" => {
                    self.font_info = parse_font_info(&mut lexer)?;
                },
                "Metrics" => {
                    skip_until_end(&mut lexer)?;
                },
                _ => {},
            }
        }
        Ok(())
    }

    /// Walk the decrypted binary portion: Private, Subrs, CharStrings.
    fn parse_encrypted(&mut self, data: &[u8]) -> Result<()> {
        let mut lexer = Type1Lexer::new(data);
        while let Some(token) = lexer.next()? {
            let Type1Token::Name(key) = token else {
                continue;
            };
            match key.as_str() {
                "lenIV" => {
                    if let Some(Type1Token::Integer(v)) = lexer.next()? {
                        self.private.len_iv = v;
                    }
                },
                "BlueValues" => self.private.blue_values = read_int_array(&mut lexer)?,
                "OtherBlues" => self.private.other_blues = read_int_array(&mut lexer)?,
                "FamilyBlues" => self.private.family_blues = read_int_array(&mut lexer)?,
                "FamilyOtherBlues" => {
                    self.private.family_other_blues = read_int_array(&mut lexer)?;
                },
                "BlueScale" => {
                    if let Some(value) = read_number(&mut lexer)? {
                        self.private.blue_scale = value;
                    }
                },
                "BlueShift" => {
                    if let Some(value) = read_number(&mut lexer)? {
                        self.private.blue_shift = value as i32;
                    }
                },
                "BlueFuzz" => {
                    if let Some(value) = read_number(&mut lexer)? {
                        self.private.blue_fuzz = value as i32;
                    }
                },
                "StdHW" => self.private.std_hw = read_number_array(&mut lexer)?.first().copied(),
                "StdVW" => self.private.std_vw = read_number_array(&mut lexer)?.first().copied(),
                "StemSnapH" => self.private.stem_snap_h = read_number_array(&mut lexer)?,
                "StemSnapV" => self.private.stem_snap_v = read_number_array(&mut lexer)?,
                "ForceBold" => {
                    if let Some(Type1Token::ExecName(word)) = lexer.next()? {
                        self.private.force_bold = word == "true";
                    }
                },
                "Subrs" => self.parse_subrs(&mut lexer)?,
                "CharStrings" => self.parse_charstrings(&mut lexer)?,
                _ => {},
            }
        }
        Ok(())
    }

    /// `/Subrs N array` followed by `dup <i> <len> RD <bytes> NP` entries.
    fn parse_subrs(&mut self, lexer: &mut Type1Lexer<'_>) -> Result<()> {
        let count = match lexer.next()? {
            Some(Type1Token::Integer(n)) if n >= 0 => n as usize,
            _ => return Ok(()),
        };
        self.subrs.resize(count.max(self.subrs.len()), None);

        let mut remaining = count;
        while remaining > 0 {
            match lexer.next()? {
                Some(Type1Token::ExecName(word)) if word == "dup" => {
                    let index = match lexer.next()? {
                        Some(Type1Token::Integer(i)) if i >= 0 => i as usize,
                        _ => continue,
                    };
                    let bytes = match read_rd_payload(lexer)? {
                        Some(bytes) => bytes,
                        None => continue,
                    };
                    if index >= self.subrs.len() {
                        self.subrs.resize(index + 1, None);
                    }
                    self.subrs[index] = Some(eexec::decrypt(
                        &bytes,
                        eexec::CHARSTRING_KEY,
                        self.private.len_iv,
                    ));
                    remaining -= 1;
                },
                Some(Type1Token::ExecName(word)) if word == "ND" || word == "|-" || word == "def" => {
                    break;
                },
                Some(_) => {},
                None => break,
            }
        }
        Ok(())
    }

    /// `/CharStrings N dict dup begin` followed by
    /// `/<name> <len> RD <bytes> ND` entries up to `end`.
    fn parse_charstrings(&mut self, lexer: &mut Type1Lexer<'_>) -> Result<()> {
        loop {
            match lexer.next()? {
                Some(Type1Token::Name(glyph)) => {
                    let bytes = match read_rd_payload(lexer)? {
                        Some(bytes) => bytes,
                        None => continue,
                    };
                    let plain =
                        eexec::decrypt(&bytes, eexec::CHARSTRING_KEY, self.private.len_iv);
                    self.charstrings.insert(glyph, plain);
                },
                Some(Type1Token::ExecName(word)) if word == "end" => break,
                Some(_) => {},
                None => break,
            }
        }
        Ok(())
    }
}

/// Read a `<len> RD <bytes>` payload.
///
/// The lexer emits the length integer as its own token and folds it into
/// the charstring that follows, so this skips the integer and returns the
/// raw bytes. `None` when the entry is malformed.
fn read_rd_payload(lexer: &mut Type1Lexer<'_>) -> Result<Option<Vec<u8>>> {
    for _ in 0..2 {
        match lexer.next()? {
            Some(Type1Token::Integer(_)) => continue,
            Some(Type1Token::Charstring(bytes)) => return Ok(Some(bytes)),
            _ => break,
        }
    }
    Ok(None)
}

/// `/Encoding` value: `StandardEncoding def`, or an inline array filled
/// with `dup <code> /<name> put` entries.
fn parse_encoding(lexer: &mut Type1Lexer<'_>) -> Result<Encoding> {
    match lexer.next()? {
        Some(Type1Token::ExecName(word)) if word == "StandardEncoding" => Ok(Encoding::Standard),
        Some(Type1Token::ExecName(other)) if other != "def" => Err(Error::DamagedFont(format!(
            "unsupported named encoding {}",
            other
        ))),
        _ => {
            // Inline form: `256 array 0 1 255 {...} for` then dup/put pairs
            // terminated by `readonly def` (or bare `def`).
            let mut table = IndexMap::new();
            loop {
                match lexer.next()? {
                    Some(Type1Token::ExecName(word)) if word == "dup" => {
                        let code = match lexer.next()? {
                            Some(Type1Token::Integer(c)) if (0..=255).contains(&c) => c as u8,
                            _ => continue,
                        };
                        let name = match lexer.next()? {
                            Some(Type1Token::Name(name)) => name,
                            _ => continue,
                        };
                        match lexer.next()? {
                            Some(Type1Token::ExecName(word)) if word == "put" => {
                                table.insert(code, name);
                            },
                            _ => {},
                        }
                    },
                    Some(Type1Token::ExecName(word)) if word == "def" => break,
                    Some(_) => {},
                    None => break,
                }
            }
            Ok(Encoding::Custom(table))
        },
    }
}

/// `/FontInfo N dict dup begin ... end readonly def`.
fn parse_font_info(lexer: &mut Type1Lexer<'_>) -> Result<FontInfo> {
    let mut info = FontInfo::default();
    loop {
        match lexer.next()? {
            Some(Type1Token::Name(key)) => match key.as_str() {
                "ItalicAngle" => {
                    if let Some(value) = read_number(lexer)? {
                        info.italic_angle = value;
                    }
                },
                "isFixedPitch" => {
                    if let Some(Type1Token::ExecName(word)) = lexer.next()? {
                        info.is_fixed_pitch = word == "true";
                    }
                },
                "UnderlinePosition" => {
                    if let Some(value) = read_number(lexer)? {
                        info.underline_position = value;
                    }
                },
                "UnderlineThickness" => {
                    if let Some(value) = read_number(lexer)? {
                        info.underline_thickness = value;
                    }
                },
                "FamilyName" => {
                    if let Some(Type1Token::String(s)) = lexer.next()? {
                        info.family_name = Some(String::from_utf8_lossy(&s).into_owned());
                    }
                },
                "FullName" => {
                    if let Some(Type1Token::String(s)) = lexer.next()? {
                        info.full_name = Some(String::from_utf8_lossy(&s).into_owned());
                    }
                },
                "Weight" => {
                    if let Some(Type1Token::String(s)) = lexer.next()? {
                        info.weight = Some(String::from_utf8_lossy(&s).into_owned());
                    }
                },
                _ => {},
            },
            Some(Type1Token::ExecName(word)) if word == "end" => break,
            Some(_) => {},
            None => break,
        }
    }
    Ok(info)
}

/// Skip tokens through the matching `end`.
fn skip_until_end(lexer: &mut Type1Lexer<'_>) -> Result<()> {
    loop {
        match lexer.next()? {
            Some(Type1Token::ExecName(word)) if word == "end" => return Ok(()),
            Some(_) => {},
            None => return Ok(()),
        }
    }
}

/// Read a `[...]` or `{...}` of numbers.
fn read_number_array(lexer: &mut Type1Lexer<'_>) -> Result<Vec<f64>> {
    let mut values = Vec::new();
    match lexer.next()? {
        Some(Type1Token::ArrayStart) | Some(Type1Token::ProcStart) => loop {
            match lexer.next()? {
                Some(Type1Token::Integer(n)) => values.push(n as f64),
                Some(Type1Token::Real(r)) => values.push(r),
                Some(Type1Token::ArrayEnd) | Some(Type1Token::ProcEnd) => break,
                Some(_) => {},
                None => break,
            }
        },
        Some(Type1Token::Integer(n)) => values.push(n as f64),
        Some(Type1Token::Real(r)) => values.push(r),
        _ => {},
    }
    Ok(values)
}

fn read_int_array(lexer: &mut Type1Lexer<'_>) -> Result<Vec<i32>> {
    Ok(read_number_array(lexer)?
        .into_iter()
        .map(|v| v as i32)
        .collect())
}

/// Read one bare number token.
fn read_number(lexer: &mut Type1Lexer<'_>) -> Result<Option<f64>> {
    Ok(match lexer.next()? {
        Some(Type1Token::Integer(n)) => Some(n as f64),
        Some(Type1Token::Real(r)) => Some(r),
        _ => None,
    })
}

/// Hex-vs-binary detection: all of the first four non-whitespace bytes
/// must be ASCII hex digits for the segment to count as hex-coded.
fn looks_like_hex(data: &[u8]) -> bool {
    let mut seen = 0;
    for &b in data {
        if matches!(b, 0x00 | 0x09 | 0x0A | 0x0C | 0x0D | 0x20) {
            continue;
        }
        if !b.is_ascii_hexdigit() {
            return false;
        }
        seen += 1;
        if seen == 4 {
            return true;
        }
    }
    seen > 0
}

/// Undo PFA hex coding.
fn decode_hex_segment(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() / 2);
    let mut high: Option<u8> = None;
    for &b in data {
        let digit = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            b'A'..=b'F' => b - b'A' + 10,
            _ => continue,
        };
        match high.take() {
            Some(h) => out.push((h << 4) | digit),
            None => high = Some(digit),
        }
    }
    out
}
