//! PDF object parser.
//!
//! Builds [`Object`] values from the token stream by recursive descent.
//! Inputs are well-formed only by convention: under lenient options the
//! parser trades strictness for recovery and records every tolerated
//! defect as a [`Warning`].
//!
//! Recovery behaviors (each warns):
//! - truncated dictionary or array: the partial value is returned at EOF;
//! - unexpected token where a value was expected: skip one token, retry;
//! - unrecognizable byte where a token was expected: skip one byte, retry;
//! - stream `/Length` missing or wrong: scan for the literal `endstream`
//!   keyword from the claimed end, clamped to the end of the buffer.

use crate::error::{Error, Result, Warning};
use crate::lexer::{Token, TokenReader};
use crate::object::{Dict, Object, ObjectRef, Stream, StringFormat};
use crate::options::ParseOptions;
use crate::scanner::Scanner;

/// Resolves an indirect `/Length` value without re-entering the parser.
///
/// The document layer supplies a closure backed by its (immutable) xref so
/// stream bodies whose length lives in another object can be finalized.
pub type LengthResolver<'a> = &'a dyn Fn(ObjectRef) -> Option<i64>;

/// Recursive-descent parser over a token stream.
pub struct ObjectParser<'a> {
    reader: TokenReader<'a>,
    options: ParseOptions,
    warnings: Vec<Warning>,
    length_resolver: Option<LengthResolver<'a>>,
}

impl<'a> ObjectParser<'a> {
    /// Create a parser at the scanner's current position.
    pub fn new(scanner: Scanner<'a>, options: ParseOptions) -> Self {
        Self {
            reader: TokenReader::new(scanner),
            options,
            warnings: Vec::new(),
            length_resolver: None,
        }
    }

    /// Attach a resolver for indirect `/Length` entries.
    pub fn with_length_resolver(mut self, resolver: LengthResolver<'a>) -> Self {
        self.length_resolver = Some(resolver);
        self
    }

    /// Current byte offset.
    pub fn position(&self) -> usize {
        self.reader.position()
    }

    /// Move to an absolute byte offset.
    pub fn move_to(&mut self, offset: usize) {
        self.reader.move_to(offset);
    }

    /// Warnings recorded so far.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Drain the recorded warnings (the caller owns them from here).
    pub fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }

    fn warn(&mut self, offset: usize, message: impl Into<String>) {
        let warning = Warning::new(offset, message);
        log::warn!("{}", warning);
        self.warnings.push(warning);
    }

    /// Parse one object at the current position.
    ///
    /// Returns `Ok(None)` at end of input. In lenient mode, unparseable
    /// bytes and stray tokens are skipped with warnings until a value or
    /// EOF is reached.
    pub fn parse_object(&mut self) -> Result<Option<Object>> {
        self.parse_value(0)
    }

    fn parse_value(&mut self, depth: usize) -> Result<Option<Object>> {
        if depth > self.options.max_nesting {
            return Err(Error::Structural(format!(
                "object nesting exceeds {} levels",
                self.options.max_nesting
            )));
        }

        loop {
            let offset = self.position();
            let tok = match self.reader.next() {
                Ok(Some(tok)) => tok,
                Ok(None) => return Ok(None),
                Err(e) => {
                    if !self.options.lenient {
                        return Err(e);
                    }
                    self.warn(offset, format!("{}; skipping one byte", e));
                    self.reader.skip_byte();
                    continue;
                },
            };

            return match tok {
                Token::Null => Ok(Some(Object::Null)),
                Token::True => Ok(Some(Object::Boolean(true))),
                Token::False => Ok(Some(Object::Boolean(false))),
                Token::Real(r) => Ok(Some(Object::Real(r))),
                Token::Name(name) => Ok(Some(Object::Name(name))),

                Token::Integer(i) => Ok(Some(self.integer_or_reference(i))),

                Token::LiteralString(raw) => Ok(Some(Object::String(
                    decode_literal_string_escapes(raw),
                    StringFormat::Literal,
                ))),

                Token::HexString(raw) => {
                    Ok(Some(Object::String(decode_hex(raw), StringFormat::Hex)))
                },

                Token::ArrayStart => self.parse_array(depth + 1).map(Some),
                Token::DictStart => self.parse_dictionary_or_stream(depth + 1).map(Some),

                other => {
                    if !self.options.lenient {
                        return Err(Error::MalformedToken {
                            offset,
                            reason: format!("unexpected token {:?} where a value was expected", other),
                        });
                    }
                    self.warn(
                        offset,
                        format!("unexpected token {:?} where a value was expected; skipped", other),
                    );
                    continue;
                },
            };
        }
    }

    /// An integer may be the first token of `N G R`. Look ahead, restoring
    /// the cursor when the pattern does not complete.
    fn integer_or_reference(&mut self, i: i64) -> Object {
        let saved = self.position();
        if i >= 0 && i <= u32::MAX as i64 {
            if let Ok(Some(Token::Integer(gen))) = self.reader.next() {
                if (0..=u16::MAX as i64).contains(&gen)
                    && matches!(self.reader.next(), Ok(Some(Token::R)))
                {
                    return Object::Reference(ObjectRef::new(i as u32, gen as u16));
                }
            }
        }
        self.move_to(saved);
        Object::Integer(i)
    }

    fn parse_array(&mut self, depth: usize) -> Result<Object> {
        let mut items = Vec::new();

        loop {
            match self.reader.peek() {
                Ok(Some(Token::ArrayEnd)) => {
                    self.reader.next()?;
                    return Ok(Object::Array(items));
                },
                Ok(None) => {
                    let offset = self.position();
                    if !self.options.lenient {
                        return Err(Error::Structural("unterminated array".to_string()));
                    }
                    self.warn(offset, "unterminated array; returning partial value");
                    return Ok(Object::Array(items));
                },
                _ => match self.parse_value(depth)? {
                    Some(obj) => items.push(obj),
                    None => {
                        let offset = self.position();
                        if !self.options.lenient {
                            return Err(Error::Structural("unterminated array".to_string()));
                        }
                        self.warn(offset, "unterminated array; returning partial value");
                        return Ok(Object::Array(items));
                    },
                },
            }
        }
    }

    fn parse_dictionary_or_stream(&mut self, depth: usize) -> Result<Object> {
        let dict = self.parse_dictionary(depth)?;

        // A dictionary immediately followed by `stream` is a stream object.
        if matches!(self.reader.peek(), Ok(Some(Token::StreamStart))) {
            self.reader.next()?;
            let data = self.parse_stream_data(&dict)?;
            return Ok(Object::Stream(Stream::new(dict, data)));
        }

        Ok(Object::Dictionary(dict))
    }

    fn parse_dictionary(&mut self, depth: usize) -> Result<Dict> {
        let mut dict = Dict::new();

        loop {
            let offset = self.position();
            match self.reader.next() {
                Ok(Some(Token::DictEnd)) => return Ok(dict),
                Ok(Some(Token::Name(key))) => match self.parse_value(depth)? {
                    Some(value) => {
                        dict.insert(key, value);
                    },
                    None => {
                        if !self.options.lenient {
                            return Err(Error::Structural("unterminated dictionary".to_string()));
                        }
                        self.warn(offset, "dictionary truncated at EOF; returning partial value");
                        return Ok(dict);
                    },
                },
                Ok(Some(other)) => {
                    if !self.options.lenient {
                        return Err(Error::MalformedToken {
                            offset,
                            reason: format!("dictionary key must be a name, found {:?}", other),
                        });
                    }
                    self.warn(offset, format!("dictionary key must be a name, found {:?}; skipped", other));
                },
                Ok(None) => {
                    if !self.options.lenient {
                        return Err(Error::Structural("unterminated dictionary".to_string()));
                    }
                    self.warn(offset, "dictionary truncated at EOF; returning partial value");
                    return Ok(dict);
                },
                Err(e) => {
                    if !self.options.lenient {
                        return Err(e);
                    }
                    self.warn(offset, format!("{}; skipping one byte", e));
                    self.reader.skip_byte();
                },
            }
        }
    }

    /// Read the stream body following the `stream` keyword.
    ///
    /// The keyword must be followed by CRLF or LF (ISO 32000-1:2008,
    /// 7.3.8.1); a bare CR or nothing is tolerated with a warning.
    fn parse_stream_data(&mut self, dict: &Dict) -> Result<bytes::Bytes> {
        let data = self.reader.scanner().data();
        let mut start = self.reader.position();

        if data[start..].starts_with(b"\r\n") {
            start += 2;
        } else if data[start..].starts_with(b"\n") {
            start += 1;
        } else if data[start..].starts_with(b"\r") {
            start += 1;
            self.warn(start, "stream keyword followed by bare CR");
        } else {
            self.warn(start, "no EOL after stream keyword");
        }

        let length = match dict.get("Length") {
            Some(Object::Integer(n)) if *n >= 0 => Some(*n as usize),
            Some(Object::Reference(r)) => {
                let resolved = self
                    .length_resolver
                    .and_then(|resolve| resolve(*r))
                    .filter(|&n| n >= 0)
                    .map(|n| n as usize);
                if resolved.is_none() {
                    self.warn(start, format!("stream /Length {} is unresolvable", r));
                }
                resolved
            },
            _ => None,
        };

        // A claimed length must land on the endstream keyword to be trusted.
        if let Some(n) = length {
            let end = start.saturating_add(n);
            if end <= data.len() {
                let mut probe = TokenReader::new(Scanner::at(data, end));
                if matches!(probe.next(), Ok(Some(Token::StreamEnd))) {
                    self.move_to(probe.position());
                    return Ok(bytes::Bytes::copy_from_slice(&data[start..end]));
                }
            }
            if !self.options.lenient {
                return Err(Error::Structural(format!(
                    "stream /Length {} does not land on endstream",
                    n
                )));
            }
            self.warn(start, format!("stream /Length {} does not land on endstream", n));
        } else if !self.options.lenient {
            return Err(Error::Structural("stream without usable /Length".to_string()));
        }

        // Recovery: scan for the endstream keyword from the claimed offset,
        // clamped to the end of the buffer.
        let claimed = length
            .map(|n| start.saturating_add(n).min(data.len()))
            .unwrap_or(start);

        match find_keyword(&data[start..], b"endstream", claimed - start) {
            Some(rel) => {
                let end = start + rel;
                self.move_to(end);
                self.reader.next()?; // consume endstream
                Ok(bytes::Bytes::copy_from_slice(&data[start..end]))
            },
            None => {
                if !self.options.lenient {
                    return Err(Error::Structural("endstream keyword not found".to_string()));
                }
                self.warn(start, "endstream keyword not found; stream runs to EOF");
                self.move_to(data.len());
                Ok(bytes::Bytes::copy_from_slice(&data[start..]))
            },
        }
    }

    /// Parse an indirect object `N G obj ... endobj` at the current position.
    ///
    /// A missing `endobj` is tolerated with a warning in lenient mode.
    pub fn parse_indirect(&mut self) -> Result<Option<(ObjectRef, Object)>> {
        let offset = self.position();

        let num = match self.reader.next()? {
            Some(Token::Integer(n)) if (0..=u32::MAX as i64).contains(&n) => n as u32,
            Some(other) => {
                return Err(Error::MalformedToken {
                    offset,
                    reason: format!("expected object number, found {:?}", other),
                });
            },
            None => return Ok(None),
        };
        let gen = match self.reader.next()? {
            Some(Token::Integer(g)) if (0..=u16::MAX as i64).contains(&g) => g as u16,
            other => {
                return Err(Error::MalformedToken {
                    offset,
                    reason: format!("expected generation number, found {:?}", other),
                });
            },
        };
        match self.reader.next()? {
            Some(Token::ObjStart) => {},
            other => {
                return Err(Error::MalformedToken {
                    offset,
                    reason: format!("expected obj keyword, found {:?}", other),
                });
            },
        }

        let object = self.parse_object()?.unwrap_or(Object::Null);

        match self.reader.peek() {
            Ok(Some(Token::ObjEnd)) => {
                self.reader.next()?;
            },
            _ => {
                if !self.options.lenient {
                    return Err(Error::Structural(format!(
                        "object {} {} has no endobj",
                        num, gen
                    )));
                }
                self.warn(self.position(), format!("object {} {} has no endobj", num, gen));
            },
        }

        Ok(Some((ObjectRef::new(num, gen), object)))
    }
}

/// Find a keyword in `haystack` at or after `from`, searching forward.
fn find_keyword(haystack: &[u8], keyword: &[u8], from: usize) -> Option<usize> {
    let from = from.min(haystack.len());
    haystack[from..]
        .windows(keyword.len())
        .position(|w| w == keyword)
        .map(|p| p + from)
        .or_else(|| {
            // The claimed offset may overshoot the actual keyword; fall back
            // to a scan from the stream start.
            haystack.windows(keyword.len()).position(|w| w == keyword)
        })
}

/// Decode escape sequences in a PDF literal string
/// (ISO 32000-1:2008, 7.3.4.2).
///
/// Handles `\n \r \t \b \f \\ \( \)`, octal escapes of one to three
/// digits, and the `\<newline>` line continuation. An unknown escape keeps
/// the following byte literal and drops the backslash.
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] != b'\\' || i + 1 >= raw.len() {
            result.push(raw[i]);
            i += 1;
            continue;
        }

        match raw[i + 1] {
            b'n' => {
                result.push(b'\n');
                i += 2;
            },
            b'r' => {
                result.push(b'\r');
                i += 2;
            },
            b't' => {
                result.push(b'\t');
                i += 2;
            },
            b'b' => {
                result.push(0x08);
                i += 2;
            },
            b'f' => {
                result.push(0x0C);
                i += 2;
            },
            b'(' | b')' | b'\\' => {
                result.push(raw[i + 1]);
                i += 2;
            },
            // Line continuation: backslash-EOL vanishes.
            b'\n' => i += 2,
            b'\r' => {
                i += 2;
                if i < raw.len() && raw[i] == b'\n' {
                    i += 1;
                }
            },
            c @ b'0'..=b'7' => {
                let mut value = (c - b'0') as u32;
                let mut len = 1;
                while len < 3 {
                    match raw.get(i + 1 + len) {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + (d - b'0') as u32;
                            len += 1;
                        },
                        _ => break,
                    }
                }
                result.push((value & 0xFF) as u8);
                i += 1 + len;
            },
            other => {
                result.push(other);
                i += 2;
            },
        }
    }

    result
}

/// Decode hex-string content to bytes.
///
/// Whitespace between digits is ignored; character pairs reassemble
/// MSB-first; an odd trailing digit is padded with zero.
pub fn decode_hex(raw: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(raw.len() / 2 + 1);
    let mut high: Option<u8> = None;

    for &b in raw {
        let digit = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            b'A'..=b'F' => b - b'A' + 10,
            _ => continue,
        };
        match high.take() {
            Some(h) => result.push((h << 4) | digit),
            None => high = Some(digit),
        }
    }
    if let Some(h) = high {
        result.push(h << 4);
    }

    result
}
