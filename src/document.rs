//! Document parsing: header, xref loading, object resolution.
//!
//! [`Document`] owns the raw bytes of a PDF file and resolves indirect
//! references through its cross-reference table, caching every parsed
//! object by `(object number, generation)`. The cache is write-once per
//! key and is the only mutable state; callers wishing to parallelize must
//! shard by document.
//!
//! In lenient mode a document always loads: any structural failure in the
//! xref machinery falls through to brute-force reconstruction, and every
//! tolerated defect lands in the warning list.

use crate::error::{Error, Result, Warning};
use crate::object::{Dict, Object, ObjectRef};
use crate::objstm::ObjectStream;
use crate::options::ParseOptions;
use crate::parser::ObjectParser;
use crate::recovery;
use crate::scanner::Scanner;
use crate::xref::{self, XrefEntry, XrefTable};
use std::collections::HashMap;
use std::path::Path;

/// An open PDF document.
pub struct Document {
    data: Vec<u8>,
    version: (u8, u8),
    xref: XrefTable,
    trailer: Dict,
    cache: HashMap<ObjectRef, Object>,
    warnings: Vec<Warning>,
    options: ParseOptions,
    encrypted: bool,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("version", &self.version)
            .field("xref_entries", &self.xref.len())
            .field("cached_objects", &self.cache.len())
            .field("warnings", &self.warnings.len())
            .field("encrypted", &self.encrypted)
            .finish_non_exhaustive()
    }
}

impl Document {
    /// Parse a document from an in-memory buffer.
    ///
    /// # Errors
    ///
    /// In lenient mode this fails only when neither the xref chain nor
    /// brute-force reconstruction can locate any objects. In strict mode
    /// the first structural error is returned.
    pub fn load(data: impl Into<Vec<u8>>, options: ParseOptions) -> Result<Self> {
        let data = data.into();
        let mut warnings = Vec::new();

        let version = parse_header(&data, &options, &mut warnings)?;

        let (xref, trailer) = match load_xref(&data, &options, &mut warnings) {
            Ok(pair) => pair,
            Err(e) if options.lenient => {
                warnings.push(Warning::new(0, format!("xref parsing failed ({}); rebuilding", e)));
                let (table, trailer, recovery_warnings) =
                    recovery::reconstruct_xref(&data, &options)?;
                warnings.extend(recovery_warnings);
                (table, trailer)
            },
            Err(e) => return Err(e),
        };

        let encrypted = trailer.contains_key("Encrypt");
        if encrypted {
            warnings.push(Warning::new(
                0,
                "document is encrypted and no decryptor is registered",
            ));
        }

        Ok(Self {
            data,
            version,
            xref,
            trailer,
            cache: HashMap::new(),
            warnings,
            options,
            encrypted,
        })
    }

    /// Read a file and parse it (convenience wrapper over [`Document::load`]).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::load(data, ParseOptions::default())
    }

    /// PDF version as `(major, minor)`.
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// The trailer dictionary.
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    /// Warnings accumulated during parsing and object resolution.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Whether an `/Encrypt` dictionary was detected.
    ///
    /// The document still loads; stream payloads that would need
    /// decryption surface errors on access.
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Number of xref entries.
    pub fn object_count(&self) -> usize {
        self.xref.len()
    }

    /// Resolve an indirect reference to its object.
    ///
    /// Results are cached by `(num, gen)` and the cache is write-once:
    /// repeated calls return the same value, including the `Null` cached
    /// for dangling references (with a warning the first time).
    pub fn get_object(&mut self, r: ObjectRef) -> Result<Object> {
        if let Some(cached) = self.cache.get(&r) {
            return Ok(cached.clone());
        }

        let object = match self.load_uncached(r) {
            Ok(object) => object,
            Err(e) => {
                if !self.options.lenient {
                    return Err(e);
                }
                self.warnings
                    .push(Warning::new(0, format!("{}; resolved {} to null", e, r)));
                Object::Null
            },
        };

        self.cache.insert(r, object.clone());
        Ok(object)
    }

    fn load_uncached(&mut self, r: ObjectRef) -> Result<Object> {
        let entry = match self.xref.entry(r.num) {
            Some(entry) => *entry,
            None => return Err(Error::UnresolvedReference(r.num, r.gen)),
        };

        match entry {
            XrefEntry::Free { .. } => Err(Error::UnresolvedReference(r.num, r.gen)),
            XrefEntry::Uncompressed { offset, .. } => self.load_at_offset(r, offset),
            XrefEntry::Compressed { stream, index } => self.load_from_stream(r, stream, index),
        }
    }

    /// Parse an uncompressed object at a file offset, verifying that the
    /// offset actually leads to `r.num r.gen obj`.
    fn load_at_offset(&mut self, r: ObjectRef, offset: u64) -> Result<Object> {
        let offset = self.verified_offset(r, offset)?;

        let resolve_length = |length_ref: ObjectRef| self.resolve_length(length_ref);
        let mut parser = ObjectParser::new(Scanner::at(&self.data, offset), self.options)
            .with_length_resolver(&resolve_length);

        let result = parser.parse_indirect();
        let parser_warnings = parser.take_warnings();
        self.warnings.extend(parser_warnings);

        match result? {
            Some((found, object)) if found.num == r.num => Ok(object),
            Some((found, _)) => {
                log::warn!("offset {} holds object {} but {} was requested", offset, found, r);
                Err(Error::UnresolvedReference(r.num, r.gen))
            },
            None => Err(Error::UnresolvedReference(r.num, r.gen)),
        }
    }

    /// Check that `offset` points at `num gen obj`; when it does not,
    /// search a window of nearby bytes before giving up (reconstructed
    /// tables and sloppy writers are often off by a few bytes).
    fn verified_offset(&self, r: ObjectRef, offset: u64) -> Result<usize> {
        let offset = usize::try_from(offset)
            .ok()
            .filter(|&o| o < self.data.len())
            .ok_or(Error::UnresolvedReference(r.num, r.gen))?;

        if object_header_at(&self.data, offset, r.num) {
            return Ok(offset);
        }

        const WINDOW: usize = 1024;
        let start = offset.saturating_sub(WINDOW);
        let end = (offset + WINDOW).min(self.data.len());
        let marker = format!("{} ", r.num);
        let marker = marker.as_bytes();

        let mut probe = start;
        while probe + marker.len() <= end {
            if self.data[probe..].starts_with(marker)
                && (probe == 0 || crate::scanner::is_whitespace(self.data[probe - 1]))
                && object_header_at(&self.data, probe, r.num)
            {
                log::debug!("object {} found at {} (xref claimed {})", r, probe, offset);
                return Ok(probe);
            }
            probe += 1;
        }

        Err(Error::UnresolvedReference(r.num, r.gen))
    }

    /// Load an object packed inside an object stream.
    fn load_from_stream(&mut self, r: ObjectRef, container: u32, index: u16) -> Result<Object> {
        let container_obj = self.get_object(ObjectRef::new(container, 0))?;
        let stream = container_obj
            .as_stream()
            .ok_or_else(|| Error::Structural(format!("object {} is not an object stream", container)))?;

        if self.encrypted {
            return Err(Error::UnsupportedEncryption);
        }

        let objstm = ObjectStream::parse(stream, &self.options)?;
        objstm.get(index as usize)
    }

    /// Resolve an indirect `/Length` through the xref without touching the
    /// cache (streams are not allowed as length values, so one level of
    /// offset parsing suffices).
    fn resolve_length(&self, r: ObjectRef) -> Option<i64> {
        match self.xref.entry(r.num)? {
            XrefEntry::Uncompressed { offset, .. } => {
                let offset = usize::try_from(*offset).ok()?;
                let mut parser =
                    ObjectParser::new(Scanner::at(&self.data, offset), self.options);
                match parser.parse_indirect() {
                    Ok(Some((_, Object::Integer(n)))) => Some(n),
                    _ => None,
                }
            },
            _ => None,
        }
    }

    /// Dereference one level: a `Reference` resolves through the document,
    /// everything else passes through unchanged.
    pub fn resolve(&mut self, object: &Object) -> Result<Object> {
        match object {
            Object::Reference(r) => self.get_object(*r),
            other => Ok(other.clone()),
        }
    }

    /// The document catalog (`trailer.Root`, resolved).
    pub fn catalog(&mut self) -> Result<Object> {
        let root = self
            .trailer
            .get("Root")
            .and_then(|o| o.as_reference())
            .ok_or_else(|| Error::Structural("trailer has no /Root reference".to_string()))?;
        self.get_object(root)
    }

    /// Decoded payload of a stream object, honoring encryption detection.
    pub fn stream_data(&mut self, r: ObjectRef) -> Result<Vec<u8>> {
        if self.encrypted {
            return Err(Error::UnsupportedEncryption);
        }
        let object = self.get_object(r)?;
        let stream = object.as_stream().ok_or_else(|| Error::InvalidObjectType {
            expected: "Stream".to_string(),
            found: object.type_name().to_string(),
        })?;
        Ok(stream.decoded_data(&self.options)?.to_vec())
    }
}

/// Does `data[offset..]` begin with `num <ws> <digits> obj`?
fn object_header_at(data: &[u8], offset: usize, num: u32) -> bool {
    let mut parser = crate::lexer::TokenReader::new(Scanner::at(data, offset));
    matches!(
        (parser.next(), parser.next(), parser.next()),
        (
            Ok(Some(crate::lexer::Token::Integer(n))),
            Ok(Some(crate::lexer::Token::Integer(_))),
            Ok(Some(crate::lexer::Token::ObjStart)),
        ) if n == num as i64
    )
}

/// Find `%PDF-M.N` in the first 1024 bytes.
///
/// Lenient mode tolerates garbage before or after the version token and
/// defaults to 1.7 when none is found; strict mode raises
/// [`Error::HeaderMissing`].
fn parse_header(
    data: &[u8],
    options: &ParseOptions,
    warnings: &mut Vec<Warning>,
) -> Result<(u8, u8)> {
    let window = &data[..data.len().min(1024)];

    if let Some(pos) = window.windows(5).position(|w| w == b"%PDF-") {
        let rest = &window[pos + 5..];
        if let Some(version) = parse_version_digits(rest) {
            if pos != 0 {
                warnings.push(Warning::new(0, format!("{} bytes of junk before the header", pos)));
            }
            return Ok(version);
        }
    }

    if options.lenient {
        warnings.push(Warning::new(0, "no PDF header found; assuming version 1.7"));
        Ok((1, 7))
    } else {
        Err(Error::HeaderMissing)
    }
}

/// Parse `M.N` digits after `%PDF-`.
fn parse_version_digits(rest: &[u8]) -> Option<(u8, u8)> {
    let major = rest.first().copied().filter(|b| b.is_ascii_digit())? - b'0';
    if rest.get(1) != Some(&b'.') {
        return None;
    }
    let minor = rest.get(2).copied().filter(|b| b.is_ascii_digit())? - b'0';
    Some((major, minor))
}

/// Locate and parse the xref chain.
fn load_xref(
    data: &[u8],
    options: &ParseOptions,
    warnings: &mut Vec<Warning>,
) -> Result<(XrefTable, Dict)> {
    let startxref = xref::find_startxref(data)?;
    let (table, chain_warnings) = xref::parse_xref_chain(data, startxref, options)?;
    warnings.extend(chain_warnings);

    if table.is_empty() {
        return Err(Error::Structural("xref chain produced no entries".to_string()));
    }

    let trailer = table
        .trailer()
        .cloned()
        .ok_or_else(|| Error::Structural("xref chain has no trailer".to_string()))?;

    Ok((table, trailer))
}
