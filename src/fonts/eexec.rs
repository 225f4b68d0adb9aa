//! The eexec stream cipher used by Type 1 fonts.
//!
//! Both the binary portion of a Type 1 program (key 55665) and the
//! individual charstrings (key 4330) are encrypted with the same running
//! cipher. Decryption discards `lenIV` leading plaintext bytes (default 4).

const C1: u16 = 52845;
const C2: u16 = 22719;

/// Cipher key for the eexec-encrypted font body.
pub const EEXEC_KEY: u16 = 55665;

/// Cipher key for individual charstrings.
pub const CHARSTRING_KEY: u16 = 4330;

/// Default number of random lead-in bytes discarded after decryption.
pub const DEFAULT_LEN_IV: i32 = 4;

/// Decrypt an eexec-ciphered byte stream.
///
/// `len_iv` leading plaintext bytes are discarded. A `len_iv` of -1 marks
/// data that was never encrypted (undocumented, but fonts in the wild use
/// it): the input is returned unchanged.
pub fn decrypt(data: &[u8], key: u16, len_iv: i32) -> Vec<u8> {
    if len_iv < 0 {
        return data.to_vec();
    }

    let mut r = key;
    let mut output = Vec::with_capacity(data.len());
    for &cipher in data {
        output.push(cipher ^ (r >> 8) as u8);
        r = (cipher as u16).wrapping_add(r).wrapping_mul(C1).wrapping_add(C2);
    }

    let skip = (len_iv as usize).min(output.len());
    output.drain(..skip);
    output
}

/// Encrypt plaintext with the eexec cipher, prepending `pad` lead-in bytes.
///
/// The inverse of [`decrypt`]; a writer embedding Type 1 data needs it,
/// and the involution property anchors the cipher tests.
pub fn encrypt(data: &[u8], key: u16, pad: usize) -> Vec<u8> {
    let mut r = key;
    let mut output = Vec::with_capacity(data.len() + pad);
    for &plain in std::iter::repeat_n(&0u8, pad).chain(data.iter()) {
        let cipher = plain ^ (r >> 8) as u8;
        output.push(cipher);
        r = (cipher as u16).wrapping_add(r).wrapping_mul(C1).wrapping_add(C2);
    }
    output
}
