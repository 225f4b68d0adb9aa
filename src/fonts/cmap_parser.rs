//! CMap stream parser.
//!
//! CMap programs are written in a small PostScript subset. The tokenizer
//! here recognizes just enough of it - names, operators, hex and literal
//! strings, numbers, array and dict delimiters - and the parser drives a
//! `previous token, operator` state machine: when an operator like
//! `beginbfrange` follows an integer `N`, exactly `N` entries of that
//! operator's shape are consumed.
//!
//! Corrupt entries are skipped, not fatal: a `bfrange` whose end precedes
//! its start, or a truncated section, costs only the affected mappings.

use super::cmap::CMap;
use crate::error::{Error, Result};
use crate::options::ParseOptions;
use crate::scanner::{self, Scanner};

/// Tokens of the CMap PostScript subset.
#[derive(Debug, Clone, PartialEq)]
enum CMapToken {
    /// Literal name `/Foo`
    Name(String),
    /// Executable name (operator)
    Operator(String),
    /// Hex string `<...>`
    Hex(Vec<u8>),
    /// Literal string `(...)`
    Literal(Vec<u8>),
    /// Integer number
    Integer(i64),
    /// Real number
    Real(f64),
    /// `[`
    ArrayStart,
    /// `]`
    ArrayEnd,
    /// `<<`
    DictStart,
    /// `>>`
    DictEnd,
}

/// Tokenizer over a CMap stream.
struct CMapLexer<'a> {
    scanner: Scanner<'a>,
}

impl<'a> CMapLexer<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            scanner: Scanner::new(data),
        }
    }

    fn position(&self) -> usize {
        self.scanner.position()
    }

    /// Next token, or `None` at end of input.
    fn next(&mut self) -> Result<Option<CMapToken>> {
        loop {
            self.scanner.skip_whitespace();
            match self.scanner.peek() {
                None => return Ok(None),
                Some(b'%') => {
                    self.scanner.read_line();
                },
                Some(_) => break,
            }
        }

        let byte = self.scanner.peek().unwrap();
        match byte {
            b'/' => {
                self.scanner.advance();
                Ok(Some(CMapToken::Name(self.read_regular_run())))
            },
            b'<' => {
                self.scanner.advance();
                if self.scanner.peek() == Some(b'<') {
                    self.scanner.advance();
                    return Ok(Some(CMapToken::DictStart));
                }
                self.read_hex().map(Some)
            },
            b'>' => {
                self.scanner.advance();
                if self.scanner.peek() == Some(b'>') {
                    self.scanner.advance();
                    Ok(Some(CMapToken::DictEnd))
                } else {
                    Err(Error::CMapSyntax(format!(
                        "stray > at byte {}",
                        self.position()
                    )))
                }
            },
            b'[' => {
                self.scanner.advance();
                Ok(Some(CMapToken::ArrayStart))
            },
            b']' => {
                self.scanner.advance();
                Ok(Some(CMapToken::ArrayEnd))
            },
            b'(' => {
                self.scanner.advance();
                self.read_literal().map(Some)
            },
            b'+' | b'-' | b'.' | b'0'..=b'9' => self.read_number().map(Some),
            b if scanner::is_regular(b) => Ok(Some(CMapToken::Operator(self.read_regular_run()))),
            other => Err(Error::CMapSyntax(format!(
                "unexpected byte 0x{:02X} at {}",
                other,
                self.position()
            ))),
        }
    }

    fn read_regular_run(&mut self) -> String {
        let mut out = Vec::new();
        while let Some(b) = self.scanner.peek() {
            if scanner::is_regular(b) {
                out.push(b);
                self.scanner.advance();
            } else {
                break;
            }
        }
        String::from_utf8_lossy(&out).into_owned()
    }

    fn read_hex(&mut self) -> Result<CMapToken> {
        let mut bytes = Vec::new();
        let mut high: Option<u8> = None;
        loop {
            match self.scanner.advance() {
                Some(b'>') => break,
                Some(b) if scanner::is_whitespace(b) => {},
                Some(b) if scanner::is_hex_digit(b) => {
                    let digit = hex_value(b);
                    match high.take() {
                        Some(h) => bytes.push((h << 4) | digit),
                        None => high = Some(digit),
                    }
                },
                Some(other) => {
                    return Err(Error::CMapSyntax(format!(
                        "invalid hex digit 0x{:02X} at {}",
                        other,
                        self.position()
                    )));
                },
                None => {
                    return Err(Error::CMapSyntax("unterminated hex string".to_string()));
                },
            }
        }
        if let Some(h) = high {
            bytes.push(h << 4);
        }
        Ok(CMapToken::Hex(bytes))
    }

    fn read_literal(&mut self) -> Result<CMapToken> {
        let mut out = Vec::new();
        let mut depth = 1;
        loop {
            match self.scanner.advance() {
                Some(b'\\') => {
                    if let Some(escaped) = self.scanner.advance() {
                        out.push(match escaped {
                            b'n' => b'\n',
                            b'r' => b'\r',
                            b't' => b'\t',
                            b'b' => 0x08,
                            b'f' => 0x0C,
                            other => other,
                        });
                    }
                },
                Some(b'(') => {
                    depth += 1;
                    out.push(b'(');
                },
                Some(b')') => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    out.push(b')');
                },
                Some(b) => out.push(b),
                None => {
                    return Err(Error::CMapSyntax("unterminated literal string".to_string()));
                },
            }
        }
        Ok(CMapToken::Literal(out))
    }

    fn read_number(&mut self) -> Result<CMapToken> {
        let mut text = Vec::new();
        let mut is_real = false;
        if matches!(self.scanner.peek(), Some(b'+') | Some(b'-')) {
            text.push(self.scanner.advance().unwrap());
        }
        while let Some(b) = self.scanner.peek() {
            match b {
                b'0'..=b'9' => {
                    text.push(b);
                    self.scanner.advance();
                },
                b'.' if !is_real => {
                    is_real = true;
                    text.push(b);
                    self.scanner.advance();
                },
                _ => break,
            }
        }
        let text = std::str::from_utf8(&text)
            .map_err(|_| Error::CMapSyntax("non-ASCII number".to_string()))?;
        if is_real {
            text.parse()
                .map(CMapToken::Real)
                .map_err(|_| Error::CMapSyntax(format!("bad number {:?}", text)))
        } else {
            text.parse()
                .map(CMapToken::Integer)
                .map_err(|_| Error::CMapSyntax(format!("bad number {:?}", text)))
        }
    }
}

fn hex_value(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        _ => b - b'A' + 10,
    }
}

/// Parse a CMap stream into a [`CMap`].
///
/// Lenient mode (the default) skips corrupt ranges with a log warning;
/// strict mode fails on them. The bfrange hex-increment overflow rule also
/// differs by mode, see [`increment_last_byte`].
pub fn parse_cmap(data: &[u8], options: &ParseOptions) -> Result<CMap> {
    let mut lexer = CMapLexer::new(data);
    let mut cmap = CMap::new();
    // The last two non-operator tokens: `prev` feeds integer-counted
    // sections and `usecmap`; the `(prev2, prev)` pair feeds
    // `/Key value def` metadata.
    let mut prev: Option<CMapToken> = None;
    let mut prev2: Option<CMapToken> = None;

    loop {
        let token = match lexer.next() {
            Ok(Some(token)) => token,
            Ok(None) => break,
            Err(e) => {
                if !options.lenient {
                    return Err(e);
                }
                log::warn!("cmap tokenizer: {}; skipping one byte", e);
                lexer.scanner.advance();
                continue;
            },
        };

        match token {
            CMapToken::Operator(op) => {
                let count = match prev {
                    Some(CMapToken::Integer(n)) if n > 0 => n as usize,
                    _ => 0,
                };
                let result = match op.as_str() {
                    "begincodespacerange" => {
                        parse_codespace_section(&mut lexer, &mut cmap, count, options)
                    },
                    "beginbfchar" => parse_bfchar_section(&mut lexer, &mut cmap, count, options),
                    "beginbfrange" => parse_bfrange_section(&mut lexer, &mut cmap, count, options),
                    "begincidchar" => parse_cidchar_section(&mut lexer, &mut cmap, count, options),
                    "begincidrange" => {
                        parse_cidrange_section(&mut lexer, &mut cmap, count, options)
                    },
                    "usecmap" => {
                        // Resolving named CMaps needs a registry the core
                        // does not carry; record and move on.
                        let name = match &prev {
                            Some(CMapToken::Name(name)) => name.as_str(),
                            _ => "?",
                        };
                        log::warn!("usecmap /{} ignored (no external CMap registry)", name);
                        Ok(())
                    },
                    "def" => {
                        apply_metadata(&mut cmap, prev2.take(), prev.take());
                        Ok(())
                    },
                    _ => Ok(()),
                };
                if let Err(e) = result {
                    if !options.lenient {
                        return Err(e);
                    }
                    log::warn!("cmap section skipped: {}", e);
                }
                prev2 = None;
                prev = None;
            },
            CMapToken::DictStart => {
                // The only dictionary the core reads is CIDSystemInfo.
                let is_system_info =
                    matches!(&prev, Some(CMapToken::Name(name)) if name == "CIDSystemInfo");
                let entries = parse_inline_dict(&mut lexer, options)?;
                if is_system_info {
                    for (key, value) in entries {
                        match (key.as_str(), value) {
                            ("Registry", CMapToken::Literal(bytes)) => {
                                cmap.registry = Some(String::from_utf8_lossy(&bytes).into_owned());
                            },
                            ("Ordering", CMapToken::Literal(bytes)) => {
                                cmap.ordering = Some(String::from_utf8_lossy(&bytes).into_owned());
                            },
                            ("Supplement", CMapToken::Integer(n)) => {
                                cmap.supplement = Some(n);
                            },
                            _ => {},
                        }
                    }
                }
                // The dict counts as the value slot for a following def.
                prev2 = prev.take();
                prev = Some(CMapToken::DictEnd);
            },
            other => {
                prev2 = prev.take();
                prev = Some(other);
            },
        }
    }

    Ok(cmap)
}

/// Apply `/Key value def` metadata from the two tokens before `def`.
fn apply_metadata(cmap: &mut CMap, key: Option<CMapToken>, value: Option<CMapToken>) {
    let Some(CMapToken::Name(key)) = key else {
        return;
    };
    match (key.as_str(), value) {
        ("WMode", Some(CMapToken::Integer(n))) => {
            cmap.writing_mode = if n == 1 { 1 } else { 0 };
        },
        ("CMapName", Some(CMapToken::Name(v))) => cmap.name = Some(v),
        ("CMapType", Some(CMapToken::Integer(n))) => cmap.cmap_type = Some(n),
        _ => {},
    }
}

/// Read entries until `end...` for a section whose count was corrupt, or
/// exactly `count` entries otherwise. Helper: pull the next token,
/// treating the section terminator as end-of-section.
fn section_token(
    lexer: &mut CMapLexer<'_>,
    terminator: &str,
) -> Result<Option<CMapToken>> {
    match lexer.next()? {
        Some(CMapToken::Operator(op)) if op == terminator => Ok(None),
        Some(token) => Ok(Some(token)),
        None => Ok(None),
    }
}

fn parse_codespace_section(
    lexer: &mut CMapLexer<'_>,
    cmap: &mut CMap,
    count: usize,
    options: &ParseOptions,
) -> Result<()> {
    for _ in 0..count {
        let low = match section_token(lexer, "endcodespacerange")? {
            Some(CMapToken::Hex(bytes)) => bytes,
            Some(other) => {
                return Err(Error::CMapSyntax(format!(
                    "codespacerange expects hex strings, found {:?}",
                    other
                )));
            },
            None => return Ok(()),
        };
        let high = match section_token(lexer, "endcodespacerange")? {
            Some(CMapToken::Hex(bytes)) => bytes,
            _ => {
                return Err(Error::CMapSyntax("codespacerange entry missing high bound".to_string()));
            },
        };
        if let Err(e) = cmap.add_codespace_range(&low, &high) {
            if !options.lenient {
                return Err(e);
            }
            log::warn!("codespace range skipped: {}", e);
        }
    }
    expect_terminator(lexer, "endcodespacerange")
}

fn parse_bfchar_section(
    lexer: &mut CMapLexer<'_>,
    cmap: &mut CMap,
    count: usize,
    options: &ParseOptions,
) -> Result<()> {
    for _ in 0..count {
        let src = match section_token(lexer, "endbfchar")? {
            Some(CMapToken::Hex(bytes)) => bytes,
            Some(other) => {
                return Err(Error::CMapSyntax(format!(
                    "bfchar expects a hex source code, found {:?}",
                    other
                )));
            },
            None => return Ok(()),
        };
        match section_token(lexer, "endbfchar")? {
            Some(CMapToken::Hex(dst)) => {
                cmap.add_char_mapping(&src, &utf16_be_to_string(&dst));
            },
            Some(CMapToken::Name(glyph)) => {
                // A literal-name destination carries a glyph name; store it
                // verbatim for the consumer to resolve.
                cmap.add_char_mapping(&src, &glyph);
            },
            Some(other) => {
                let e = Error::CMapSyntax(format!("bfchar destination {:?}", other));
                if !options.lenient {
                    return Err(e);
                }
                log::warn!("bfchar entry skipped: {}", e);
            },
            None => return Ok(()),
        }
    }
    expect_terminator(lexer, "endbfchar")
}

fn parse_bfrange_section(
    lexer: &mut CMapLexer<'_>,
    cmap: &mut CMap,
    count: usize,
    options: &ParseOptions,
) -> Result<()> {
    for _ in 0..count {
        let low = match section_token(lexer, "endbfrange")? {
            Some(CMapToken::Hex(bytes)) => bytes,
            Some(other) => {
                return Err(Error::CMapSyntax(format!(
                    "bfrange expects a hex start, found {:?}",
                    other
                )));
            },
            None => return Ok(()),
        };
        let high = match section_token(lexer, "endbfrange")? {
            Some(CMapToken::Hex(bytes)) => bytes,
            _ => return Err(Error::CMapSyntax("bfrange entry missing end".to_string())),
        };

        let low_value = be_value(&low);
        let high_value = be_value(&high);

        match section_token(lexer, "endbfrange")? {
            Some(CMapToken::ArrayStart) => {
                // Array form: pair the i-th code with the i-th element.
                let mut code = low_value;
                loop {
                    match lexer.next()? {
                        Some(CMapToken::ArrayEnd) => break,
                        Some(CMapToken::Hex(dst)) => {
                            if code <= high_value {
                                add_range_mapping(cmap, code, low.len(), &utf16_be_to_string(&dst));
                                code += 1;
                            }
                        },
                        Some(CMapToken::Name(glyph)) => {
                            if code <= high_value {
                                add_range_mapping(cmap, code, low.len(), &glyph);
                                code += 1;
                            }
                        },
                        Some(_) => {},
                        None => {
                            return Err(Error::CMapSyntax(
                                "bfrange array truncated".to_string(),
                            ));
                        },
                    }
                }
            },
            Some(CMapToken::Hex(dst)) => {
                if high_value < low_value {
                    // Corrupt range: skip, never throw.
                    log::warn!(
                        "bfrange end {:#06X} below start {:#06X}; skipped",
                        high_value,
                        low_value
                    );
                    continue;
                }

                // Identity special case: <0000> <FFFF> <....> is expanded
                // in 256-code chunks so the increment never needs to carry
                // across the last byte, which strict mode refuses.
                if low.len() == 2 && low_value == 0x0000 && high_value == 0xFFFF {
                    let base = be_value(&dst);
                    for hi in 0u32..=0xFF {
                        for lo in 0u32..=0xFF {
                            let code = (hi << 8) | lo;
                            if let Some(s) = code_point_string(base.wrapping_add(code)) {
                                add_range_mapping(cmap, code, 2, &s);
                            }
                        }
                    }
                    continue;
                }

                let mut dst = dst;
                for code in low_value..=high_value {
                    add_range_mapping(cmap, code, low.len(), &utf16_be_to_string(&dst));
                    if code < high_value && !increment_last_byte(&mut dst, options.lenient) {
                        // Strict mode: an increment that would overflow the
                        // last byte stops the expansion.
                        break;
                    }
                }
            },
            Some(other) => {
                let e = Error::CMapSyntax(format!("bfrange destination {:?}", other));
                if !options.lenient {
                    return Err(e);
                }
                log::warn!("bfrange entry skipped: {}", e);
            },
            None => return Ok(()),
        }
    }
    expect_terminator(lexer, "endbfrange")
}

fn parse_cidchar_section(
    lexer: &mut CMapLexer<'_>,
    cmap: &mut CMap,
    count: usize,
    options: &ParseOptions,
) -> Result<()> {
    for _ in 0..count {
        let src = match section_token(lexer, "endcidchar")? {
            Some(CMapToken::Hex(bytes)) => bytes,
            Some(other) => {
                return Err(Error::CMapSyntax(format!(
                    "cidchar expects a hex code, found {:?}",
                    other
                )));
            },
            None => return Ok(()),
        };
        match section_token(lexer, "endcidchar")? {
            Some(CMapToken::Integer(cid)) if cid >= 0 => {
                cmap.add_cid_char(&src, cid as u32);
            },
            Some(other) => {
                let e = Error::CMapSyntax(format!("cidchar CID {:?}", other));
                if !options.lenient {
                    return Err(e);
                }
                log::warn!("cidchar entry skipped: {}", e);
            },
            None => return Ok(()),
        }
    }
    expect_terminator(lexer, "endcidchar")
}

fn parse_cidrange_section(
    lexer: &mut CMapLexer<'_>,
    cmap: &mut CMap,
    count: usize,
    options: &ParseOptions,
) -> Result<()> {
    for _ in 0..count {
        let low = match section_token(lexer, "endcidrange")? {
            Some(CMapToken::Hex(bytes)) => bytes,
            Some(other) => {
                return Err(Error::CMapSyntax(format!(
                    "cidrange expects a hex start, found {:?}",
                    other
                )));
            },
            None => return Ok(()),
        };
        let high = match section_token(lexer, "endcidrange")? {
            Some(CMapToken::Hex(bytes)) => bytes,
            _ => return Err(Error::CMapSyntax("cidrange entry missing end".to_string())),
        };
        let cid = match section_token(lexer, "endcidrange")? {
            Some(CMapToken::Integer(cid)) if cid >= 0 => cid as u32,
            Some(other) => {
                return Err(Error::CMapSyntax(format!("cidrange CID {:?}", other)));
            },
            None => return Ok(()),
        };

        if let Err(e) = cmap.add_cid_range(&low, &high, cid) {
            if !options.lenient {
                return Err(e);
            }
            log::warn!("cidrange skipped: {}", e);
        }
    }
    expect_terminator(lexer, "endcidrange")
}

/// Consume tokens until the expected section terminator.
fn expect_terminator(lexer: &mut CMapLexer<'_>, terminator: &str) -> Result<()> {
    loop {
        match lexer.next()? {
            Some(CMapToken::Operator(op)) if op == terminator => return Ok(()),
            Some(_) => {},
            None => return Ok(()),
        }
    }
}

/// Skim an inline dictionary, collecting name-keyed scalar entries.
fn parse_inline_dict(
    lexer: &mut CMapLexer<'_>,
    _options: &ParseOptions,
) -> Result<Vec<(String, CMapToken)>> {
    let mut entries = Vec::new();
    let mut pending_key: Option<String> = None;
    let mut depth = 1;

    loop {
        match lexer.next()? {
            Some(CMapToken::DictStart) => depth += 1,
            Some(CMapToken::DictEnd) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(entries);
                }
            },
            Some(CMapToken::Name(name)) => {
                if let Some(key) = pending_key.take() {
                    entries.push((key, CMapToken::Name(name)));
                } else {
                    pending_key = Some(name);
                }
            },
            Some(value) => {
                if let Some(key) = pending_key.take() {
                    entries.push((key, value));
                }
            },
            None => return Ok(entries),
        }
    }
}

/// Record one expanded bfrange mapping, synthesizing the code bytes at the
/// range's code length.
fn add_range_mapping(cmap: &mut CMap, code: u32, code_length: usize, unicode: &str) {
    let mut bytes = vec![0u8; code_length];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = ((code >> (8 * (code_length - 1 - i))) & 0xFF) as u8;
    }
    cmap.add_char_mapping(&bytes, unicode);
}

/// Increment a destination hex string on its last byte.
///
/// Returns `false` when the last byte is 0xFF and carrying is not allowed
/// (strict mode); lenient mode carries into the preceding byte.
fn increment_last_byte(bytes: &mut [u8], lenient: bool) -> bool {
    if bytes.is_empty() {
        return false;
    }
    let last = bytes.len() - 1;
    if bytes[last] < 0xFF {
        bytes[last] += 1;
        return true;
    }
    if !lenient {
        return false;
    }
    // Carry leftward.
    let mut i = last;
    loop {
        if bytes[i] < 0xFF {
            bytes[i] += 1;
            for b in &mut bytes[i + 1..] {
                *b = 0;
            }
            return true;
        }
        if i == 0 {
            return false;
        }
        i -= 1;
    }
}

/// Interpret destination bytes as UTF-16BE text.
///
/// One-byte destinations are taken as direct code points; unpaired
/// surrogates fall back lossily so a damaged entry cannot poison the map.
fn utf16_be_to_string(bytes: &[u8]) -> String {
    if bytes.len() == 1 {
        return char::from(bytes[0]).to_string();
    }
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|pair| {
            if pair.len() == 2 {
                u16::from_be_bytes([pair[0], pair[1]])
            } else {
                pair[0] as u16
            }
        })
        .collect();
    String::from_utf16_lossy(&units)
}

/// A single code point to its string, rejecting surrogate values.
fn code_point_string(value: u32) -> Option<String> {
    char::from_u32(value).map(|c| c.to_string())
}

fn be_value(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32)
}
