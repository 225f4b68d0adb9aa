//! Object stream decoding (`/Type /ObjStm`, PDF 1.5+).
//!
//! An object stream packs several indirect objects into one compressed
//! payload. The decoded payload starts with `N` pairs of integers
//! `objNum offsetWithinBody`; `/First` is where the body begins. Objects
//! inside an object stream always have generation 0 and must not
//! themselves be streams.
//!
//! ```text
//! 12 0 obj
//! << /Type /ObjStm /N 3 /First 14 /Filter /FlateDecode >>
//! stream
//! 10 0 11 6 12 10
//! << ... >> 42 /Name
//! endstream
//! endobj
//! ```

use crate::error::{Error, Result, Warning};
use crate::object::{Object, Stream};
use crate::options::ParseOptions;
use crate::parser::ObjectParser;
use crate::scanner::{self, Scanner};

/// A decoded object stream with lazy per-object parsing.
///
/// The header pairs are read eagerly (they are tiny); each contained
/// object is parsed on the first [`ObjectStream::get`] for its index.
#[derive(Debug)]
pub struct ObjectStream {
    payload: Vec<u8>,
    first: usize,
    pairs: Vec<(u32, usize)>,
    options: ParseOptions,
}

impl ObjectStream {
    /// Decode an object stream and read its header pairs.
    pub fn parse(stream: &Stream, options: &ParseOptions) -> Result<Self> {
        if let Some(type_name) = stream.type_name() {
            if type_name != "ObjStm" {
                return Err(Error::Structural(format!(
                    "expected /Type /ObjStm, found /{}",
                    type_name
                )));
            }
        }

        let n = stream
            .dict
            .get("N")
            .and_then(|o| o.as_integer())
            .ok_or_else(|| Error::Structural("object stream missing /N".to_string()))?;
        let first = stream
            .dict
            .get("First")
            .and_then(|o| o.as_integer())
            .ok_or_else(|| Error::Structural("object stream missing /First".to_string()))?;

        if !(0..=1_000_000).contains(&n) {
            return Err(Error::Structural(format!("object stream /N {} out of range", n)));
        }
        if !(0..=10_000_000).contains(&first) {
            return Err(Error::Structural(format!(
                "object stream /First {} out of range",
                first
            )));
        }
        let n = n as usize;
        let first = first as usize;

        let payload = stream.decoded_data(options)?.to_vec();
        if payload.len() < first {
            return Err(Error::Structural(format!(
                "object stream payload is {} bytes, /First claims {}",
                payload.len(),
                first
            )));
        }

        let pairs = parse_header_pairs(&payload[..first], n)?;

        Ok(Self {
            payload,
            first,
            pairs,
            options: *options,
        })
    }

    /// Number of objects in the stream (`/N`).
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True when the stream holds no objects.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Object number stored at `index`.
    pub fn object_number(&self, index: usize) -> Option<u32> {
        self.pairs.get(index).map(|&(num, _)| num)
    }

    /// Parse the object at `index` (random access, generation always 0).
    pub fn get(&self, index: usize) -> Result<Object> {
        let &(num, offset) = self.pairs.get(index).ok_or_else(|| {
            Error::Structural(format!(
                "object stream index {} out of range (N = {})",
                index,
                self.pairs.len()
            ))
        })?;

        let body = &self.payload[self.first..];
        if offset >= body.len() {
            return Err(Error::Structural(format!(
                "object {} offset {} is past the stream body ({} bytes)",
                num,
                offset,
                body.len()
            )));
        }

        let mut parser = ObjectParser::new(Scanner::at(body, offset), self.options);
        let object = parser.parse_object()?.unwrap_or(Object::Null);

        // Streams may not nest inside object streams.
        if matches!(object, Object::Stream(_)) {
            if !self.options.lenient {
                return Err(Error::Structural(format!(
                    "object {} inside an object stream is itself a stream",
                    num
                )));
            }
            log::warn!(
                "{}",
                Warning::new(offset, format!("object {} inside an object stream is a stream; replaced with null", num))
            );
            return Ok(Object::Null);
        }

        Ok(object)
    }

    /// Parse every contained object, in header order.
    pub fn objects(&self) -> Result<Vec<(u32, Object)>> {
        let mut result = Vec::with_capacity(self.pairs.len());
        for index in 0..self.pairs.len() {
            let num = self.pairs[index].0;
            match self.get(index) {
                Ok(obj) => result.push((num, obj)),
                Err(e) => {
                    if !self.options.lenient {
                        return Err(e);
                    }
                    log::warn!("skipping object {} in object stream: {}", num, e);
                },
            }
        }
        Ok(result)
    }
}

/// Read the `N` pairs of `objNum offset` integers from the header section.
fn parse_header_pairs(header: &[u8], n: usize) -> Result<Vec<(u32, usize)>> {
    let mut scanner = Scanner::new(header);
    let mut pairs = Vec::with_capacity(n);

    for i in 0..n {
        let num = read_uint(&mut scanner).ok_or_else(|| {
            Error::Structural(format!("object stream header pair {} is truncated", i))
        })?;
        let offset = read_uint(&mut scanner).ok_or_else(|| {
            Error::Structural(format!("object stream header pair {} has no offset", i))
        })?;
        pairs.push((num as u32, offset as usize));
    }

    Ok(pairs)
}

/// Read one whitespace-delimited unsigned integer.
fn read_uint(scanner: &mut Scanner<'_>) -> Option<u64> {
    scanner.skip_whitespace();
    let mut value: u64 = 0;
    let mut any = false;
    while let Some(b) = scanner.peek() {
        if scanner::is_digit(b) {
            value = value.saturating_mul(10).saturating_add((b - b'0') as u64);
            scanner.advance();
            any = true;
        } else {
            break;
        }
    }
    any.then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Dict;

    fn objstm(n: i64, first: i64, payload: &[u8]) -> Stream {
        let mut dict = Dict::new();
        dict.insert("Type".to_string(), Object::Name("ObjStm".to_string()));
        dict.insert("N".to_string(), Object::Integer(n));
        dict.insert("First".to_string(), Object::Integer(first));
        dict.insert("Length".to_string(), Object::Integer(payload.len() as i64));
        Stream::new(dict, payload.to_vec())
    }

    #[test]
    fn test_parse_and_random_access() {
        // Objects: 10 -> 42, 11 -> /Test, 12 -> << /A 1 >>
        let body = b"42 /Test << /A 1 >>";
        let header = b"10 0 11 3 12 9 ";
        let mut payload = header.to_vec();
        payload.extend_from_slice(body);

        let stream = objstm(3, header.len() as i64, &payload);
        let opts = ParseOptions::lenient();
        let objstm = ObjectStream::parse(&stream, &opts).unwrap();

        assert_eq!(objstm.len(), 3);
        assert_eq!(objstm.object_number(0), Some(10));

        // Out-of-order access works (random access by index)
        assert_eq!(objstm.get(2).unwrap().as_dict().unwrap().get("A").unwrap().as_integer(), Some(1));
        assert_eq!(objstm.get(0).unwrap().as_integer(), Some(42));
        assert_eq!(objstm.get(1).unwrap().as_name(), Some("Test"));
    }

    #[test]
    fn test_objects_in_order() {
        let body = b"1 2";
        let header = b"5 0 6 2 ";
        let mut payload = header.to_vec();
        payload.extend_from_slice(body);

        let stream = objstm(2, header.len() as i64, &payload);
        let opts = ParseOptions::lenient();
        let objstm = ObjectStream::parse(&stream, &opts).unwrap();

        let objects = objstm.objects().unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0], (5, Object::Integer(1)));
        assert_eq!(objects[1], (6, Object::Integer(2)));
    }

    #[test]
    fn test_missing_n_fails() {
        let mut dict = Dict::new();
        dict.insert("Type".to_string(), Object::Name("ObjStm".to_string()));
        dict.insert("First".to_string(), Object::Integer(4));
        let stream = Stream::new(dict, &b"1 0 42"[..]);
        assert!(ObjectStream::parse(&stream, &ParseOptions::lenient()).is_err());
    }

    #[test]
    fn test_wrong_type_fails() {
        let mut dict = Dict::new();
        dict.insert("Type".to_string(), Object::Name("XRef".to_string()));
        dict.insert("N".to_string(), Object::Integer(1));
        dict.insert("First".to_string(), Object::Integer(4));
        let stream = Stream::new(dict, &b"1 0 42"[..]);
        assert!(ObjectStream::parse(&stream, &ParseOptions::lenient()).is_err());
    }

    #[test]
    fn test_first_past_payload_fails() {
        let stream = objstm(1, 100, b"1 0 42");
        assert!(ObjectStream::parse(&stream, &ParseOptions::lenient()).is_err());
    }

    #[test]
    fn test_offset_past_body() {
        let header = b"5 99 ";
        let mut payload = header.to_vec();
        payload.extend_from_slice(b"42");
        let stream = objstm(1, header.len() as i64, &payload);
        let objstm = ObjectStream::parse(&stream, &ParseOptions::lenient()).unwrap();
        assert!(objstm.get(0).is_err());
    }

    #[test]
    fn test_header_pairs_with_extra_whitespace() {
        let pairs = parse_header_pairs(b"  10   0\n11\t15 ", 2).unwrap();
        assert_eq!(pairs, vec![(10, 0), (11, 15)]);
    }

    #[test]
    fn test_truncated_header_fails() {
        assert!(parse_header_pairs(b"10 0 11", 2).is_err());
    }
}
