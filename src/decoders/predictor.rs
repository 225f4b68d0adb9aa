//! Predictor post-processing for Flate/LZW streams.
//!
//! Xref streams almost always pair FlateDecode with PNG predictor 12 (Up),
//! so the predictor pass is part of the core even though image filters are
//! not.

use crate::error::{Error, Result};

/// Decode parameters from a `/DecodeParms` dictionary.
#[derive(Debug, Clone)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 2 = TIFF, 10-15 = PNG)
    pub predictor: i64,
    /// Number of columns (samples per row)
    pub columns: usize,
    /// Color components per sample
    pub colors: usize,
    /// Bits per component
    pub bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl DecodeParams {
    /// Bytes of pixel data per row, excluding any predictor tag byte.
    pub fn pixel_bytes_per_row(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }

    /// Bytes per sample, rounded up to at least one.
    fn bytes_per_sample(&self) -> usize {
        (self.colors * self.bits_per_component).div_ceil(8).max(1)
    }
}

/// Reverse the predictor encoding on decoded stream data.
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => decode_tiff(data, params),
        10..=15 => decode_png(data, params),
        other => Err(Error::Decode(format!("unsupported predictor {}", other))),
    }
}

/// TIFF predictor 2: each sample is a delta from its left neighbor.
fn decode_tiff(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row_len = params.pixel_bytes_per_row();
    if row_len == 0 || !data.len().is_multiple_of(row_len) {
        return Err(Error::Decode(format!(
            "predictor row size {} does not divide data length {}",
            row_len,
            data.len()
        )));
    }

    let stride = params.bytes_per_sample();
    let mut output = Vec::with_capacity(data.len());
    for row in data.chunks(row_len) {
        let row_start = output.len();
        for (i, &byte) in row.iter().enumerate() {
            if i < stride {
                output.push(byte);
            } else {
                let left = output[row_start + i - stride];
                output.push(byte.wrapping_add(left));
            }
        }
    }
    Ok(output)
}

/// PNG predictors 10-15: each row carries a filter-type tag byte.
fn decode_png(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let pixel_row = params.pixel_bytes_per_row();
    let tagged_row = pixel_row + 1;
    if pixel_row == 0 || !data.len().is_multiple_of(tagged_row) {
        return Err(Error::Decode(format!(
            "PNG predictor row size {} does not divide data length {}",
            tagged_row,
            data.len()
        )));
    }

    let stride = params.bytes_per_sample();
    let mut output: Vec<u8> = Vec::with_capacity(data.len());
    let mut prev_row = vec![0u8; pixel_row];

    for row in data.chunks(tagged_row) {
        let tag = row[0];
        let row = &row[1..];
        let mut decoded = vec![0u8; pixel_row];

        for i in 0..pixel_row {
            let raw = row[i];
            let left = if i >= stride { decoded[i - stride] } else { 0 };
            let up = prev_row[i];
            let up_left = if i >= stride { prev_row[i - stride] } else { 0 };

            decoded[i] = match tag {
                0 => raw,
                1 => raw.wrapping_add(left),
                2 => raw.wrapping_add(up),
                3 => raw.wrapping_add(((left as u16 + up as u16) / 2) as u8),
                4 => raw.wrapping_add(paeth(left, up, up_left)),
                other => {
                    return Err(Error::Decode(format!("invalid PNG filter type {}", other)));
                },
            };
        }

        output.extend_from_slice(&decoded);
        prev_row = decoded;
    }

    Ok(output)
}

/// Paeth predictor function (PNG specification, 9.4).
fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
