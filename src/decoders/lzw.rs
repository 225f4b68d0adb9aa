//! LZWDecode filter.
//!
//! PDF's LZW variant (ISO 32000-1:2008, 7.4.4): MSB-first bit order,
//! 9-bit initial codes, clear code 256, EOD 257, and EarlyChange=1 (the
//! code width grows one code earlier than in GIF). `weezl`'s TIFF mode
//! implements exactly the EarlyChange=1 behavior.

use crate::error::{Error, Result};
use weezl::{BitOrder, decode::Decoder as WeezlDecoder};

/// Decompress PDF LZW data.
pub fn lzw_decode(input: &[u8]) -> Result<Vec<u8>> {
    // EarlyChange=1 is the PDF default and matches TIFF's size switch.
    let mut decoder = WeezlDecoder::with_tiff_size_switch(BitOrder::Msb, 8);
    match decoder.decode(input) {
        Ok(output) => Ok(output),
        Err(_) => {
            // A minority of writers emit EarlyChange=0 without saying so.
            let mut late = WeezlDecoder::new(BitOrder::Msb, 8);
            late.decode(input)
                .map_err(|e| Error::Decode(format!("LZWDecode: {:?}", e)))
        },
    }
}
