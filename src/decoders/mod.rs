//! Stream filter implementations.
//!
//! The core treats filters as pluggable: the dispatch here covers the
//! filters the document machinery itself depends on (xref streams and
//! object streams are almost always Flate-compressed, occasionally LZW or
//! hex), plus the PNG/TIFF predictor pass they layer on top. Anything else
//! surfaces [`Error::UnsupportedFilter`] so an outer layer can take over.

use crate::error::{Error, Result};
use crate::options::ParseOptions;

mod ascii_hex;
mod flate;
mod lzw;
mod predictor;

pub use ascii_hex::ascii_hex_decode;
pub use flate::flate_decode;
pub use lzw::lzw_decode;
pub use predictor::{DecodeParams, decode_predictor};

/// Decode data through a filter pipeline.
///
/// Filters apply in order; the predictor (if any) applies after the last
/// filter. Decompression-bomb limits from `options` are enforced after
/// every stage.
pub fn decode_chain(
    data: &[u8],
    filters: &[String],
    params: Option<&DecodeParams>,
    options: &ParseOptions,
) -> Result<Vec<u8>> {
    let compressed_size = data.len().max(1);
    let mut current = data.to_vec();

    for filter in filters {
        current = match filter.as_str() {
            "FlateDecode" | "Fl" => flate_decode(&current)?,
            "LZWDecode" | "LZW" => lzw_decode(&current)?,
            "ASCIIHexDecode" | "AHx" => ascii_hex_decode(&current)?,
            other => return Err(Error::UnsupportedFilter(other.to_string())),
        };

        let max_ratio = options.max_decompression_ratio as u64;
        if max_ratio > 0 && (current.len() as u64 / compressed_size as u64) > max_ratio {
            return Err(Error::Decode(format!(
                "decompression ratio exceeds {}:1 ({} -> {} bytes)",
                max_ratio,
                compressed_size,
                current.len()
            )));
        }
        if options.max_decompressed_size > 0 && current.len() > options.max_decompressed_size {
            return Err(Error::Decode(format!(
                "decompressed size {} exceeds limit {}",
                current.len(),
                options.max_decompressed_size
            )));
        }
    }

    if let Some(params) = params {
        if params.predictor != 1 {
            current = decode_predictor(&current, params)?;
        }
    }

    Ok(current)
}
