//! FlateDecode (zlib/deflate) filter.
//!
//! The workhorse filter: nearly every xref stream and object stream in a
//! modern PDF is Flate-compressed.

use crate::error::{Error, Result};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use std::io::Read;

/// Decompress zlib-wrapped deflate data.
///
/// Real-world PDFs sometimes carry corrupt zlib headers over valid deflate
/// streams, or truncate the stream mid-block. Recovery order:
///
/// 1. zlib as written;
/// 2. partial zlib output, if any bytes decoded before the error;
/// 3. raw deflate (no zlib wrapper);
/// 4. raw deflate after skipping the two header bytes.
pub fn flate_decode(input: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    match ZlibDecoder::new(input).read_to_end(&mut output) {
        Ok(_) => return Ok(output),
        Err(e) => {
            if !output.is_empty() {
                log::warn!(
                    "FlateDecode partial recovery: {} bytes before corruption: {}",
                    output.len(),
                    e
                );
                return Ok(output);
            }
        },
    }

    output.clear();
    if DeflateDecoder::new(input).read_to_end(&mut output).is_ok() && !output.is_empty() {
        log::info!("FlateDecode raw-deflate recovery: {} bytes", output.len());
        return Ok(output);
    }

    if input.len() > 2 {
        output.clear();
        if DeflateDecoder::new(&input[2..])
            .read_to_end(&mut output)
            .is_ok()
            && !output.is_empty()
        {
            log::info!("FlateDecode header-skip recovery: {} bytes", output.len());
            return Ok(output);
        }
    }

    Err(Error::Decode("FlateDecode: corrupt deflate stream".to_string()))
}
