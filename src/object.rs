//! PDF object model.
//!
//! A PDF object is a tagged sum of eight kinds. Every consumer
//! pattern-matches on [`Object`] and fails closed on unexpected kinds;
//! there is no inheritance-style dispatch anywhere in the crate.
//!
//! Strings are kept as raw bytes with an encoding hint - the core never
//! materializes them into Rust strings, the consumer decides between
//! PDFDocEncoding and UTF-16BE above this layer.

use crate::decoders::{self, DecodeParams};
use crate::error::{Error, Result};
use crate::options::ParseOptions;
use std::cell::OnceCell;

/// Dictionary type used throughout the crate.
///
/// Insertion order is preserved so a writer can reproduce signed documents
/// byte-exact.
pub type Dict = indexmap::IndexMap<String, Object>;

/// Origin hint for a PDF string: written as `(...)` or `<...>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    /// Literal string `(...)`
    Literal,
    /// Hexadecimal string `<...>`
    Hex,
}

/// PDF object representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Real (floating-point) value
    Real(f64),
    /// String: raw bytes plus the literal/hex origin hint
    String(Vec<u8>, StringFormat),
    /// Name (written with a leading `/`, `#XX` escapes already decoded)
    Name(String),
    /// Array of objects
    Array(Vec<Object>),
    /// Dictionary (insertion-order preserving)
    Dictionary(Dict),
    /// Stream (dictionary + lazily decoded byte payload)
    Stream(Stream),
    /// Indirect object reference
    Reference(ObjectRef),
}

/// Reference to an indirect object.
///
/// A weak handle; it resolves through the owning document's xref, or to
/// `Null` when dangling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    /// Object number
    pub num: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjectRef {
    /// Create a new object reference.
    pub fn new(num: u32, gen: u16) -> Self {
        Self { num, gen }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.num, self.gen)
    }
}

/// A stream object: dictionary plus raw payload.
///
/// The raw bytes and the filter chain description are owned; the decoded
/// payload is produced on first [`Stream::decoded_data`] call and memoized.
#[derive(Debug, Clone)]
pub struct Stream {
    /// Stream dictionary
    pub dict: Dict,
    /// Raw (still encoded) stream payload
    pub data: bytes::Bytes,
    decoded: OnceCell<bytes::Bytes>,
}

impl PartialEq for Stream {
    fn eq(&self, other: &Self) -> bool {
        // The memoized decode is derived state and does not affect identity.
        self.dict == other.dict && self.data == other.data
    }
}

impl Stream {
    /// Create a stream from a dictionary and raw payload.
    pub fn new(dict: Dict, data: impl Into<bytes::Bytes>) -> Self {
        Self {
            dict,
            data: data.into(),
            decoded: OnceCell::new(),
        }
    }

    /// The `/Type` name of the stream dictionary, if any.
    pub fn type_name(&self) -> Option<&str> {
        self.dict.get("Type").and_then(|o| o.as_name())
    }

    /// Decode the payload through the `/Filter` chain, memoizing the result.
    ///
    /// An absent `/Filter` returns the raw bytes unchanged.
    pub fn decoded_data(&self, options: &ParseOptions) -> Result<&[u8]> {
        if let Some(cached) = self.decoded.get() {
            return Ok(cached);
        }
        let decoded = self.decode_uncached(options)?;
        Ok(self.decoded.get_or_init(|| bytes::Bytes::from(decoded)))
    }

    fn decode_uncached(&self, options: &ParseOptions) -> Result<Vec<u8>> {
        let filters = self
            .dict
            .get("Filter")
            .map(filter_names)
            .unwrap_or_default();

        if filters.is_empty() {
            return Ok(self.data.to_vec());
        }

        let params = decode_params(self.dict.get("DecodeParms"));
        decoders::decode_chain(&self.data, &filters, params.as_ref(), options)
    }
}

impl Object {
    /// Human-readable type name of this object, without its data.
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::String(..) => "String",
            Object::Name(_) => "Name",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream(_) => "Stream",
            Object::Reference(_) => "Reference",
        }
    }

    /// Try to cast to integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to cast to either numeric kind, widened to f64.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to real number.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to dictionary. Works for both dictionaries and streams.
    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&[Object]> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to cast to string bytes.
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s, _) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to cast to reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to stream.
    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Object::Stream(s) => Some(s),
            _ => None,
        }
    }

    /// Check if object is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// Convenience constructor for literal strings.
    pub fn string_literal(bytes: impl Into<Vec<u8>>) -> Self {
        Object::String(bytes.into(), StringFormat::Literal)
    }
}

/// Extract filter names from a `/Filter` entry.
///
/// The entry is either a single name or an array of names applied in order.
fn filter_names(filter_obj: &Object) -> Vec<String> {
    match filter_obj {
        Object::Name(name) => vec![name.clone()],
        Object::Array(arr) => arr
            .iter()
            .filter_map(|obj| obj.as_name().map(|s| s.to_string()))
            .collect(),
        _ => vec![],
    }
}

/// Extract predictor parameters from a `/DecodeParms` entry.
///
/// The entry can be a dictionary, an array of dictionaries (one per
/// filter), or absent. Only the first dictionary is consulted.
fn decode_params(params_obj: Option<&Object>) -> Option<DecodeParams> {
    let dict = match params_obj? {
        Object::Dictionary(d) => d,
        Object::Array(arr) => arr.iter().find_map(|obj| obj.as_dict())?,
        _ => return None,
    };

    Some(DecodeParams {
        predictor: dict
            .get("Predictor")
            .and_then(|o| o.as_integer())
            .unwrap_or(1),
        columns: dict.get("Columns").and_then(|o| o.as_integer()).unwrap_or(1) as usize,
        colors: dict.get("Colors").and_then(|o| o.as_integer()).unwrap_or(1) as usize,
        bits_per_component: dict
            .get("BitsPerComponent")
            .and_then(|o| o.as_integer())
            .unwrap_or(8) as usize,
    })
}
