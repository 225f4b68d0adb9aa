//! PDF lexer (tokenizer).
//!
//! Low-level tokenization of PDF byte streams: numbers, strings, names,
//! keywords, and delimiters. Whitespace and `%` comments are skipped
//! between tokens.
//!
//! The nom-based token functions operate on byte slices; [`TokenReader`]
//! binds them to a [`Scanner`] so that higher-level parsers see a single
//! cursor over the source buffer.
//!
//! Escape handling is split across layers: `#XX` escapes in names are
//! decoded here, while literal-string escape sequences are left raw and
//! decoded by the object parser.

use crate::error::{Error, Result};
use crate::scanner::{self, Scanner};
use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, digit1, one_of},
    combinator::{map, opt, value},
    sequence::{delimited, preceded},
};

/// Token kinds recognized by the PDF lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g. `42`, `-123`)
    Integer(i64),
    /// Real number (e.g. `3.14`, `-.002`, `5.`)
    Real(f64),
    /// Literal string content, escape sequences still raw
    LiteralString(&'a [u8]),
    /// Hex string content (digits and embedded whitespace, undecoded)
    HexString(&'a [u8]),
    /// Name with `#XX` escapes decoded
    Name(String),
    /// `true`
    True,
    /// `false`
    False,
    /// `null`
    Null,
    /// `[`
    ArrayStart,
    /// `]`
    ArrayEnd,
    /// `<<`
    DictStart,
    /// `>>`
    DictEnd,
    /// `obj`
    ObjStart,
    /// `endobj`
    ObjEnd,
    /// `stream`
    StreamStart,
    /// `endstream`
    StreamEnd,
    /// `R` reference marker
    R,
}

/// Skip whitespace and `%`-to-EOL comments.
fn skip_ws(input: &[u8]) -> &[u8] {
    let mut rest = input;
    loop {
        let ws_end = rest
            .iter()
            .position(|&b| !scanner::is_whitespace(b))
            .unwrap_or(rest.len());
        rest = &rest[ws_end..];

        if rest.first() == Some(&b'%') {
            let line_end = rest
                .iter()
                .position(|&b| b == b'\r' || b == b'\n')
                .unwrap_or(rest.len());
            rest = &rest[line_end..];
            continue;
        }

        if ws_end == 0 {
            break;
        }
    }
    rest
}

/// Parse an integer or real number.
///
/// PDF numbers allow a leading sign and a leading or trailing decimal
/// point (`.5`, `5.`); there is no exponent form.
fn parse_number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, _sign) = opt(one_of("+-"))(input)?;
    let (rest, int_part) = opt(digit1)(rest)?;
    let (rest, frac_part) = opt(preceded(char('.'), opt(digit1)))(rest)?;

    if int_part.is_none() && frac_part.is_none() {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit)));
    }

    let consumed = input.len() - rest.len();
    // Only ASCII digits, sign, and dot were matched, so this is valid UTF-8.
    let text = std::str::from_utf8(&input[..consumed]).map_err(|_| {
        nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
    })?;

    if frac_part.is_some() {
        // f64::from_str accepts `.5`, `5.`, and signed forms directly.
        let num: f64 = text.parse().map_err(|_| {
            nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
        })?;
        Ok((rest, Token::Real(num)))
    } else {
        let num: i64 = text.parse().map_err(|_| {
            nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
        })?;
        Ok((rest, Token::Integer(num)))
    }
}

/// Parse a literal string enclosed in balanced parentheses.
///
/// The string body is returned raw (escape sequences undecoded). Nested
/// parentheses are tracked with a depth counter, and escaped bytes are
/// skipped so `\(` and `\)` do not affect the depth.
fn parse_literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (remaining, _) = char('(')(input)?;
    let mut depth = 1;
    let mut pos = 0;

    while depth > 0 && pos < remaining.len() {
        match remaining[pos] {
            b'\\' => {
                pos += 1;
                if pos < remaining.len() {
                    pos += 1;
                }
            },
            b'(' => {
                depth += 1;
                pos += 1;
            },
            b')' => {
                depth -= 1;
                pos += 1;
            },
            _ => pos += 1,
        }
    }

    if depth != 0 {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }

    Ok((&remaining[pos..], Token::LiteralString(&remaining[..pos - 1])))
}

/// Parse a hexadecimal string enclosed in angle brackets.
///
/// Content is returned undecoded (pairs reassemble MSB-first at the parser
/// level, odd trailing digit padded with zero).
fn parse_hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    if input.len() >= 2 && input[0] == b'<' && input[1] == b'<' {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }

    delimited(
        char('<'),
        map(
            take_while(|c: u8| c.is_ascii_hexdigit() || scanner::is_whitespace(c)),
            Token::HexString,
        ),
        char('>'),
    )(input)
}

/// Decode `#XX` escape sequences in a PDF name (ISO 32000-1:2008, 7.3.5).
///
/// Invalid sequences keep the `#` and following characters literal, which
/// is what most readers do with malformed names.
pub fn decode_name_escapes(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut chars = name.chars();

    while let Some(ch) = chars.next() {
        if ch != '#' {
            result.push(ch);
            continue;
        }
        let hex: Vec<char> = chars.clone().take(2).collect();
        if hex.len() == 2 {
            let pair: String = hex.iter().collect();
            if let Ok(byte) = u8::from_str_radix(&pair, 16) {
                result.push(byte as char);
                chars.next();
                chars.next();
                continue;
            }
        }
        result.push('#');
    }

    result
}

/// Parse a name starting with `/`.
fn parse_name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    preceded(
        char('/'),
        map(take_while(scanner::is_regular), |bytes: &[u8]| {
            let raw = std::str::from_utf8(bytes).unwrap_or("");
            Token::Name(decode_name_escapes(raw))
        }),
    )(input)
}

/// Parse keywords and structural delimiters.
///
/// Multi-character keywords are checked before their prefixes
/// (`endstream` before `stream`, `<<` before `<`).
fn parse_keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    alt((
        value(Token::False, tag(b"false")),
        value(Token::True, tag(b"true")),
        value(Token::Null, tag(b"null")),
        value(Token::ObjEnd, tag(b"endobj")),
        value(Token::ObjStart, tag(b"obj")),
        value(Token::StreamEnd, tag(b"endstream")),
        value(Token::StreamStart, tag(b"stream")),
        value(Token::DictStart, tag(b"<<")),
        value(Token::DictEnd, tag(b">>")),
        value(Token::ArrayStart, tag(b"[")),
        value(Token::ArrayEnd, tag(b"]")),
        value(Token::R, tag(b"R")),
    ))(input)
}

/// Parse a single PDF token from a byte slice.
///
/// Ordering matters: keywords first (so `true` is not half a name),
/// then names, numbers, and the two string forms.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let input = skip_ws(input);
    alt((
        parse_keyword,
        parse_name,
        parse_number,
        parse_literal_string,
        parse_hex_string,
    ))(input)
}

/// Token cursor bound to a [`Scanner`].
///
/// Keeps the scanner position in sync with every consumed token so that
/// recovery code can mix token reads with raw byte operations (offset
/// scans, `endstream` searches) on the same cursor.
#[derive(Debug)]
pub struct TokenReader<'a> {
    scanner: Scanner<'a>,
}

impl<'a> TokenReader<'a> {
    /// Wrap a scanner.
    pub fn new(scanner: Scanner<'a>) -> Self {
        Self { scanner }
    }

    /// The wrapped scanner.
    pub fn scanner(&self) -> &Scanner<'a> {
        &self.scanner
    }

    /// Mutable access to the wrapped scanner.
    pub fn scanner_mut(&mut self) -> &mut Scanner<'a> {
        &mut self.scanner
    }

    /// Current byte offset in the source buffer.
    pub fn position(&self) -> usize {
        self.scanner.position()
    }

    /// Move to an absolute offset.
    pub fn move_to(&mut self, offset: usize) {
        self.scanner.move_to(offset);
    }

    /// Read the next token, or `None` at end of input.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedToken`] when the bytes at the cursor do
    /// not form any token. The cursor is left on the offending byte so a
    /// lenient caller can skip it and retry.
    pub fn next(&mut self) -> Result<Option<Token<'a>>> {
        let rest = skip_ws(self.scanner.remaining());
        let ws = self.scanner.remaining().len() - rest.len();
        if rest.is_empty() {
            self.scanner.move_to(self.scanner.position() + ws);
            return Ok(None);
        }

        match token(self.scanner.remaining()) {
            Ok((after, tok)) => {
                let consumed = self.scanner.remaining().len() - after.len();
                self.scanner.move_to(self.scanner.position() + consumed);
                Ok(Some(tok))
            },
            Err(_) => {
                self.scanner.move_to(self.scanner.position() + ws);
                Err(Error::MalformedToken {
                    offset: self.scanner.position(),
                    reason: format!("unexpected byte 0x{:02X}", rest[0]),
                })
            },
        }
    }

    /// Peek the next token without consuming it.
    pub fn peek(&mut self) -> Result<Option<Token<'a>>> {
        let saved = self.scanner.position();
        let result = self.next();
        self.scanner.move_to(saved);
        result
    }

    /// Skip one raw byte (lenient recovery for malformed tokens).
    pub fn skip_byte(&mut self) {
        self.scanner.advance();
    }
}
