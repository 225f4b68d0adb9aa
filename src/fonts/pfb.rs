//! PFB (Printer Font Binary) segmentation.
//!
//! A PFB file wraps a Type 1 program in records of `0x80`, a type byte
//! (1 ASCII, 2 binary, 3 EOF), and a little-endian u32 length. All ASCII
//! records concatenate into the cleartext segment and all binary records
//! into the encrypted segment - except the final `cleartomark` trailer
//! (512 zeros plus the mark), which is dropped.

use crate::error::{Error, Result};
use byteorder::{ByteOrder, LittleEndian};

/// The two segments of a Type 1 program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PfbSegments {
    /// Cleartext PostScript up to `eexec`
    pub ascii: Vec<u8>,
    /// Encrypted binary portion (still ciphered)
    pub binary: Vec<u8>,
}

/// Split a PFB file into its ASCII and binary segments.
///
/// Raw PFA/PT1 data (no `0x80` record markers) is split at the `eexec`
/// keyword instead, so callers can feed either wrapper.
pub fn read_pfb(data: &[u8]) -> Result<PfbSegments> {
    if data.first() != Some(&0x80) {
        return split_raw(data);
    }

    let mut ascii = Vec::new();
    let mut binary = Vec::new();
    let mut pos = 0;

    while pos < data.len() {
        if data[pos] != 0x80 {
            return Err(Error::DamagedFont(format!(
                "PFB record at {} does not start with 0x80",
                pos
            )));
        }
        let kind = *data
            .get(pos + 1)
            .ok_or_else(|| Error::DamagedFont("truncated PFB record header".to_string()))?;

        if kind == 3 {
            break;
        }

        let header_end = pos + 6;
        if header_end > data.len() {
            return Err(Error::DamagedFont("truncated PFB record header".to_string()));
        }
        let len = LittleEndian::read_u32(&data[pos + 2..header_end]) as usize;
        let body_end = header_end + len;
        if body_end > data.len() {
            return Err(Error::DamagedFont(format!(
                "PFB record at {} claims {} bytes past EOF",
                pos, len
            )));
        }
        let body = &data[header_end..body_end];

        match kind {
            1 => {
                // The final ASCII record is the cleartomark trailer; it is
                // not part of the cleartext program.
                let is_trailer = len < 600 && contains(body, b"cleartomark");
                if !is_trailer {
                    ascii.extend_from_slice(body);
                }
            },
            2 => binary.extend_from_slice(body),
            other => {
                return Err(Error::DamagedFont(format!(
                    "unknown PFB record type {}",
                    other
                )));
            },
        }

        pos = body_end;
    }

    validate_prologue(&ascii)?;
    Ok(PfbSegments { ascii, binary })
}

/// Split unwrapped Type 1 data at the `eexec` keyword.
fn split_raw(data: &[u8]) -> Result<PfbSegments> {
    validate_prologue(data)?;

    let keyword = b"eexec";
    let pos = data
        .windows(keyword.len())
        .position(|w| w == keyword)
        .ok_or_else(|| Error::DamagedFont("no eexec keyword in Type 1 data".to_string()))?;

    let ascii = data[..pos + keyword.len()].to_vec();
    let mut rest = &data[pos + keyword.len()..];
    // A single EOL separates eexec from the cipher bytes.
    if rest.starts_with(b"\r\n") {
        rest = &rest[2..];
    } else if rest.starts_with(b"\r") || rest.starts_with(b"\n") {
        rest = &rest[1..];
    }

    Ok(PfbSegments {
        ascii,
        binary: rest.to_vec(),
    })
}

/// The ASCII prologue of a Type 1 font must start with `%!`.
fn validate_prologue(ascii: &[u8]) -> Result<()> {
    if !ascii.starts_with(b"%!") {
        return Err(Error::DamagedFont(
            "Type 1 ASCII segment does not start with %!".to_string(),
        ));
    }
    Ok(())
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: u8, body: &[u8]) -> Vec<u8> {
        let mut out = vec![0x80, kind];
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn test_basic_pfb() {
        let mut data = record(1, b"%!PS-AdobeFont-1.0\n/FontName /Test def\neexec\n");
        data.extend(record(2, &[0xDE, 0xAD, 0xBE, 0xEF]));
        data.extend(record(1, b"0000000000000000\ncleartomark\n"));
        data.extend([0x80, 3]);

        let segments = read_pfb(&data).unwrap();
        assert!(segments.ascii.starts_with(b"%!PS-AdobeFont"));
        assert_eq!(segments.binary, vec![0xDE, 0xAD, 0xBE, 0xEF]);
        // Trailer excluded
        assert!(!contains(&segments.ascii, b"cleartomark"));
    }

    #[test]
    fn test_multiple_binary_records_concatenate() {
        let mut data = record(1, b"%!PS\neexec\n");
        data.extend(record(2, &[1, 2]));
        data.extend(record(2, &[3, 4]));
        data.extend([0x80, 3]);

        let segments = read_pfb(&data).unwrap();
        assert_eq!(segments.binary, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_large_ascii_tail_kept() {
        // An ASCII record >= 600 bytes is part of the program even if it
        // happens to mention cleartomark.
        let mut tail = vec![b' '; 700];
        tail.extend_from_slice(b"cleartomark");
        let mut data = record(1, b"%!PS\neexec\n");
        data.extend(record(2, &[9]));
        data.extend(record(1, &tail));
        data.extend([0x80, 3]);

        let segments = read_pfb(&data).unwrap();
        assert!(contains(&segments.ascii, b"cleartomark"));
    }

    #[test]
    fn test_raw_pfa_split_at_eexec() {
        let data = b"%!PS-AdobeFont-1.0\n/FontName /Raw def\neexec\n\xAB\xCD\xEF";
        let segments = read_pfb(data).unwrap();
        assert!(segments.ascii.ends_with(b"eexec"));
        assert_eq!(segments.binary, vec![0xAB, 0xCD, 0xEF]);
    }

    #[test]
    fn test_missing_prologue_is_damaged_font() {
        let data = record(1, b"PS without the magic\neexec\n");
        let mut data = data;
        data.extend([0x80, 3]);
        assert!(matches!(read_pfb(&data), Err(Error::DamagedFont(_))));

        assert!(matches!(read_pfb(b"plain junk"), Err(Error::DamagedFont(_))));
    }

    #[test]
    fn test_record_past_eof() {
        let mut data = vec![0x80, 2];
        data.extend_from_slice(&100u32.to_le_bytes());
        data.extend_from_slice(&[1, 2, 3]);
        assert!(matches!(read_pfb(&data), Err(Error::DamagedFont(_))));
    }

    #[test]
    fn test_unknown_record_type() {
        let mut data = record(1, b"%!PS\neexec\n");
        data.extend([0x80, 9, 0, 0, 0, 0]);
        assert!(matches!(read_pfb(&data), Err(Error::DamagedFont(_))));
    }
}
