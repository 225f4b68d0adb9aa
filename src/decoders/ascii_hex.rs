//! ASCIIHexDecode filter.

use crate::error::{Error, Result};

/// Decode ASCII hex data (ISO 32000-1:2008, 7.4.2).
///
/// Whitespace is ignored; `>` terminates the data; an odd trailing digit
/// is padded with zero.
pub fn ascii_hex_decode(input: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(input.len() / 2);
    let mut high: Option<u8> = None;

    for &byte in input {
        let digit = match byte {
            b'0'..=b'9' => byte - b'0',
            b'a'..=b'f' => byte - b'a' + 10,
            b'A'..=b'F' => byte - b'A' + 10,
            b'>' => break,
            b if crate::scanner::is_whitespace(b) => continue,
            other => {
                return Err(Error::Decode(format!(
                    "ASCIIHexDecode: invalid byte 0x{:02X}",
                    other
                )));
            },
        };
        match high.take() {
            Some(h) => output.push((h << 4) | digit),
            None => high = Some(digit),
        }
    }
    if let Some(h) = high {
        output.push(h << 4);
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic() {
        assert_eq!(ascii_hex_decode(b"48656C6C6F>").unwrap(), b"Hello");
    }

    #[test]
    fn test_whitespace_ignored() {
        assert_eq!(ascii_hex_decode(b"48 65 6C\n6C 6F>").unwrap(), b"Hello");
    }

    #[test]
    fn test_odd_digit_padded() {
        assert_eq!(ascii_hex_decode(b"ABC>").unwrap(), vec![0xAB, 0xC0]);
    }

    #[test]
    fn test_missing_terminator_tolerated() {
        assert_eq!(ascii_hex_decode(b"4142").unwrap(), b"AB");
    }

    #[test]
    fn test_invalid_byte() {
        assert!(ascii_hex_decode(b"41ZZ>").is_err());
    }
}
