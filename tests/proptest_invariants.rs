//! Property tests for the core invariants.

use pdf_forge::fonts::CMap;
use pdf_forge::fonts::eexec;
use proptest::prelude::*;

proptest! {
    /// Decrypt is an involution under encrypt for any key and pad.
    #[test]
    fn eexec_involution(
        data in proptest::collection::vec(any::<u8>(), 0..512),
        key in any::<u16>(),
        pad in 0usize..16,
    ) {
        let cipher = eexec::encrypt(&data, key, pad);
        prop_assert_eq!(eexec::decrypt(&cipher, key, pad as i32), data);
    }

    /// Every code inside an added CID range maps to cid + (code - from).
    #[test]
    fn cid_range_arithmetic(
        from in 0u16..0xFF00,
        span in 0u16..0xFF,
        cid in 0u32..100_000,
    ) {
        let to = from.saturating_add(span);
        let mut cmap = CMap::new();
        cmap.add_codespace_range(&[0x00, 0x00], &[0xFF, 0xFF]).unwrap();
        cmap.add_cid_range(&from.to_be_bytes(), &to.to_be_bytes(), cid).unwrap();

        for code in (from..=to).step_by(17.max(span as usize / 8).max(1)) {
            prop_assert_eq!(
                cmap.cid_for_len(code as u32, 2),
                cid + (code - from) as u32
            );
        }
        prop_assert_eq!(cmap.cid_for_len(to as u32, 2), cid + (to - from) as u32);
    }

    /// The stored range count is at most one greater than the number of
    /// non-consecutive transitions in the input sequence.
    #[test]
    fn cid_range_compression_bound(
        runs in proptest::collection::vec((0u8..0xFF, 1u8..32), 1..12),
    ) {
        let mut cmap = CMap::new();
        cmap.add_codespace_range(&[0x00, 0x00], &[0xFF, 0xFF]).unwrap();

        // Lay the runs out: some continue exactly (code and cid both
        // consecutive), others jump.
        let mut code: u32 = 0;
        let mut cid: u32 = 0;
        let mut breaks = 0usize;
        for (i, &(gap, len)) in runs.iter().enumerate() {
            if i > 0 {
                if gap > 0 {
                    code += gap as u32;
                    breaks += 1;
                }
                // cid stays consecutive; only the code may jump
            }
            let high = code + len as u32 - 1;
            if high > 0xFFFF {
                break;
            }
            cmap.add_cid_range(
                &(code as u16).to_be_bytes(),
                &(high as u16).to_be_bytes(),
                cid,
            )
            .unwrap();
            cid += len as u32;
            code = high + 1;
        }

        prop_assert!(cmap.cid_ranges().len() <= breaks + 1);
    }

    /// read_code consumes within [min, max] code length and never reads
    /// past the end of input.
    #[test]
    fn read_code_bounds(
        bytes in proptest::collection::vec(any::<u8>(), 1..64),
        offset_seed in any::<usize>(),
    ) {
        let mut cmap = CMap::new();
        cmap.add_codespace_range(&[0x00], &[0x7F]).unwrap();
        cmap.add_codespace_range(&[0x81, 0x40], &[0x9F, 0xFC]).unwrap();
        cmap.add_codespace_range(&[0x00, 0x00, 0x00], &[0xFF, 0xFF, 0xFF]).unwrap();

        let offset = offset_seed % bytes.len();
        let (_, consumed) = cmap.read_code(&bytes, offset);

        let available = bytes.len() - offset;
        prop_assert!(consumed >= 1);
        prop_assert!(consumed <= cmap.max_code_length());
        prop_assert!(consumed <= available);
    }

    /// Char mappings round-trip through both directions.
    #[test]
    fn char_mapping_round_trip(codes in proptest::collection::btree_set(1u16..0xFFFF, 1..64)) {
        let mut cmap = CMap::new();
        cmap.add_codespace_range(&[0x00, 0x00], &[0xFF, 0xFF]).unwrap();

        // Map each code to a distinct private-use character.
        let entries: Vec<(u16, String)> = codes
            .iter()
            .enumerate()
            .map(|(i, &code)| {
                let ch = char::from_u32(0xE000 + i as u32).unwrap();
                (code, ch.to_string())
            })
            .collect();

        for (code, s) in &entries {
            cmap.add_char_mapping(&code.to_be_bytes(), s);
        }
        for (code, s) in &entries {
            prop_assert_eq!(cmap.unicode_for_len(*code as u32, 2), Some(s.as_str()));
            prop_assert_eq!(cmap.codes_for_unicode(s), Some(&code.to_be_bytes()[..]));
        }
    }
}
