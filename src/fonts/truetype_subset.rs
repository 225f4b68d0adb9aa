//! TrueType subsetting.
//!
//! Rebuilds an SFNT with only the used glyphs. Glyphs renumber into a
//! compact range starting at 0 (`.notdef` stays first), composite
//! components are pulled into the subset and their component ids
//! rewritten, and `glyf`/`loca`/`maxp`/`hmtx`/`hhea`/`head` are
//! regenerated. Every other table on the allow-list copies through
//! verbatim; the rest are dropped.
//!
//! The old-to-new glyph id map is part of the output: a PDF content
//! stream addresses glyphs by their original ids, and the CIDToGIDMap
//! stream built from this map is what reconnects them.

use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder};
use std::collections::{BTreeSet, HashMap};

/// Tables kept in a subset when present.
const KEEP_TABLES: [&[u8; 4]; 14] = [
    b"cmap", b"glyf", b"head", b"hhea", b"hmtx", b"loca", b"maxp", b"name", b"post", b"OS/2",
    b"cvt ", b"fpgm", b"prep", b"gasp",
];

/// Result of subsetting: the rebuilt font and the glyph renumbering.
#[derive(Debug)]
pub struct SubsetOutput {
    /// The subsetted SFNT bytes
    pub data: Vec<u8>,
    /// Old glyph id to new glyph id
    pub gid_map: HashMap<u16, u16>,
}

struct SfntTables<'a> {
    tables: HashMap<[u8; 4], &'a [u8]>,
}

impl<'a> SfntTables<'a> {
    fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < 12 {
            return Err(Error::Font("SFNT too short".to_string()));
        }
        let version = BigEndian::read_u32(data);
        if version != 0x0001_0000 && &data[..4] != b"true" {
            return Err(Error::Font(format!("not a TrueType font (version {:#X})", version)));
        }
        let num_tables = BigEndian::read_u16(&data[4..]) as usize;

        let mut tables = HashMap::new();
        for i in 0..num_tables {
            let record = data
                .get(12 + i * 16..12 + (i + 1) * 16)
                .ok_or_else(|| Error::Font("truncated SFNT table directory".to_string()))?;
            let mut tag = [0u8; 4];
            tag.copy_from_slice(&record[..4]);
            let offset = BigEndian::read_u32(&record[8..]) as usize;
            let length = BigEndian::read_u32(&record[12..]) as usize;
            let table = data
                .get(offset..offset + length)
                .ok_or_else(|| Error::Font(format!("table {:?} out of bounds", tag)))?;
            tables.insert(tag, table);
        }
        Ok(Self { tables })
    }

    fn get(&self, tag: &[u8; 4]) -> Option<&'a [u8]> {
        self.tables.get(tag).copied()
    }

    fn require(&self, tag: &[u8; 4]) -> Result<&'a [u8]> {
        self.get(tag).ok_or_else(|| {
            Error::Font(format!("font has no {} table", String::from_utf8_lossy(tag)))
        })
    }
}

/// Subset a TrueType font to the used glyph set.
///
/// `.notdef` (glyph 0) is always included. Fails when the font lacks a
/// `glyf` table (an OTF-with-CFF must be handled by the caller).
pub fn subset_truetype(data: &[u8], used_gids: &BTreeSet<u32>) -> Result<SubsetOutput> {
    let sfnt = SfntTables::parse(data)?;

    let head = sfnt.require(b"head")?;
    let maxp = sfnt.require(b"maxp")?;
    let hhea = sfnt.require(b"hhea")?;
    let hmtx = sfnt.require(b"hmtx")?;
    let glyf = sfnt.require(b"glyf")?;
    let loca_table = sfnt.require(b"loca")?;

    if head.len() < 54 || maxp.len() < 6 || hhea.len() < 36 {
        return Err(Error::Font("core table too short".to_string()));
    }

    let num_glyphs = BigEndian::read_u16(&maxp[4..]);
    let long_loca = BigEndian::read_i16(&head[50..]) == 1;
    let loca = parse_loca(loca_table, num_glyphs, long_loca)?;
    let num_h_metrics = BigEndian::read_u16(&hhea[34..]);

    // Glyph closure: the used set, .notdef, and every composite component.
    let mut closure: BTreeSet<u16> = BTreeSet::new();
    closure.insert(0);
    let mut worklist: Vec<u16> = used_gids
        .iter()
        .filter_map(|&g| u16::try_from(g).ok())
        .filter(|&g| g < num_glyphs)
        .collect();
    while let Some(gid) = worklist.pop() {
        if !closure.insert(gid) {
            continue;
        }
        for component in composite_components(glyph_data(glyf, &loca, gid)?) {
            if component < num_glyphs && !closure.contains(&component) {
                worklist.push(component);
            }
        }
    }

    // Compact renumbering; BTreeSet order keeps .notdef at 0.
    let gid_map: HashMap<u16, u16> = closure
        .iter()
        .enumerate()
        .map(|(new, &old)| (old, new as u16))
        .collect();

    // Rebuild glyf and loca (long format).
    let mut new_glyf: Vec<u8> = Vec::new();
    let mut new_loca: Vec<u8> = Vec::new();
    for &old in &closure {
        new_loca.extend_from_slice(&(new_glyf.len() as u32).to_be_bytes());
        let mut glyph = glyph_data(glyf, &loca, old)?.to_vec();
        rewrite_components(&mut glyph, &gid_map)?;
        new_glyf.extend_from_slice(&glyph);
        // Glyph data is u16-aligned.
        if !new_glyf.len().is_multiple_of(2) {
            new_glyf.push(0);
        }
    }
    new_loca.extend_from_slice(&(new_glyf.len() as u32).to_be_bytes());

    // Rebuild hmtx with a full metric per kept glyph.
    let mut new_hmtx: Vec<u8> = Vec::new();
    for &old in &closure {
        let (advance, lsb) = h_metric(hmtx, num_h_metrics, old);
        new_hmtx.extend_from_slice(&advance.to_be_bytes());
        new_hmtx.extend_from_slice(&lsb.to_be_bytes());
    }

    // Patch the counted tables.
    let mut new_head = head.to_vec();
    BigEndian::write_i16(&mut new_head[50..], 1); // long loca
    BigEndian::write_u32(&mut new_head[8..], 0); // checkSumAdjustment, fixed later

    let mut new_maxp = maxp.to_vec();
    BigEndian::write_u16(&mut new_maxp[4..], closure.len() as u16);

    let mut new_hhea = hhea.to_vec();
    BigEndian::write_u16(&mut new_hhea[34..], closure.len() as u16);

    // Assemble the output table set.
    let mut out_tables: Vec<([u8; 4], Vec<u8>)> = vec![
        (*b"head", new_head),
        (*b"hhea", new_hhea),
        (*b"maxp", new_maxp),
        (*b"hmtx", new_hmtx),
        (*b"loca", new_loca),
        (*b"glyf", new_glyf),
    ];
    for tag in KEEP_TABLES {
        if out_tables.iter().any(|(t, _)| t == tag) {
            continue;
        }
        if let Some(table) = sfnt.get(tag) {
            out_tables.push((*tag, table.to_vec()));
        }
    }

    let data = assemble_sfnt(out_tables)?;
    Ok(SubsetOutput { data, gid_map })
}

/// Parse loca into glyph offsets (numGlyphs + 1 entries).
fn parse_loca(loca: &[u8], num_glyphs: u16, long: bool) -> Result<Vec<u32>> {
    let count = num_glyphs as usize + 1;
    let entry = if long { 4 } else { 2 };
    if loca.len() < count * entry {
        return Err(Error::Font("loca table too short".to_string()));
    }
    Ok((0..count)
        .map(|i| {
            if long {
                BigEndian::read_u32(&loca[i * 4..])
            } else {
                BigEndian::read_u16(&loca[i * 2..]) as u32 * 2
            }
        })
        .collect())
}

/// Slice of glyf belonging to one glyph (may be empty).
fn glyph_data<'a>(glyf: &'a [u8], loca: &[u32], gid: u16) -> Result<&'a [u8]> {
    let start = loca[gid as usize] as usize;
    let end = loca[gid as usize + 1] as usize;
    if start > end || end > glyf.len() {
        return Err(Error::Font(format!("glyph {} outside the glyf table", gid)));
    }
    Ok(&glyf[start..end])
}

/// Advance width and left side bearing for a glyph.
fn h_metric(hmtx: &[u8], num_h_metrics: u16, gid: u16) -> (u16, i16) {
    let n = num_h_metrics.max(1);
    if gid < n {
        let at = gid as usize * 4;
        if at + 4 <= hmtx.len() {
            return (
                BigEndian::read_u16(&hmtx[at..]),
                BigEndian::read_i16(&hmtx[at + 2..]),
            );
        }
        return (0, 0);
    }
    // Monospace tail: last advance, lsb from the trailing array.
    let last_at = (n as usize - 1) * 4;
    let advance = if last_at + 2 <= hmtx.len() {
        BigEndian::read_u16(&hmtx[last_at..])
    } else {
        0
    };
    let lsb_at = n as usize * 4 + (gid - n) as usize * 2;
    let lsb = if lsb_at + 2 <= hmtx.len() {
        BigEndian::read_i16(&hmtx[lsb_at..])
    } else {
        0
    };
    (advance, lsb)
}

// Composite glyph flag bits.
const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
const WE_HAVE_A_SCALE: u16 = 0x0008;
const MORE_COMPONENTS: u16 = 0x0020;
const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;

/// Walk a glyph's component records, yielding `(flags_offset, glyph_index)`.
fn component_records(glyph: &[u8]) -> Vec<(usize, u16)> {
    let mut records = Vec::new();
    if glyph.len() < 10 || BigEndian::read_i16(glyph) >= 0 {
        return records; // simple glyph or empty
    }

    let mut pos = 10;
    loop {
        if pos + 4 > glyph.len() {
            break;
        }
        let flags = BigEndian::read_u16(&glyph[pos..]);
        let component = BigEndian::read_u16(&glyph[pos + 2..]);
        records.push((pos, component));

        pos += 4;
        pos += if flags & ARG_1_AND_2_ARE_WORDS != 0 { 4 } else { 2 };
        if flags & WE_HAVE_A_SCALE != 0 {
            pos += 2;
        } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            pos += 4;
        } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
            pos += 8;
        }
        if flags & MORE_COMPONENTS == 0 {
            break;
        }
    }
    records
}

/// Component glyph ids referenced by a (possibly composite) glyph.
fn composite_components(glyph: &[u8]) -> Vec<u16> {
    component_records(glyph).into_iter().map(|(_, g)| g).collect()
}

/// Rewrite the component glyph ids of a composite glyph in place.
fn rewrite_components(glyph: &mut [u8], gid_map: &HashMap<u16, u16>) -> Result<()> {
    for (flags_at, old) in component_records(glyph) {
        let new = *gid_map
            .get(&old)
            .ok_or_else(|| Error::Font(format!("component glyph {} missing from closure", old)))?;
        BigEndian::write_u16(&mut glyph[flags_at + 2..], new);
    }
    Ok(())
}

/// Assemble tables into an SFNT with directory checksums and the head
/// checkSumAdjustment.
fn assemble_sfnt(mut tables: Vec<([u8; 4], Vec<u8>)>) -> Result<Vec<u8>> {
    tables.sort_by_key(|(tag, _)| *tag);
    let num_tables = tables.len() as u16;

    let entry_selector = (num_tables as f32).log2().floor() as u16;
    let search_range = (1u16 << entry_selector) * 16;
    let range_shift = num_tables * 16 - search_range;

    let mut header = Vec::new();
    header.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    header.extend_from_slice(&num_tables.to_be_bytes());
    header.extend_from_slice(&search_range.to_be_bytes());
    header.extend_from_slice(&entry_selector.to_be_bytes());
    header.extend_from_slice(&range_shift.to_be_bytes());

    let mut offset = 12 + tables.len() * 16;
    let mut body: Vec<u8> = Vec::new();
    let mut head_offset = None;

    for (tag, table) in &tables {
        let checksum = table_checksum(table);
        header.extend_from_slice(tag);
        header.extend_from_slice(&checksum.to_be_bytes());
        header.extend_from_slice(&(offset as u32).to_be_bytes());
        header.extend_from_slice(&(table.len() as u32).to_be_bytes());

        if tag == b"head" {
            head_offset = Some(offset);
        }

        body.extend_from_slice(table);
        let padded = table.len().div_ceil(4) * 4;
        body.resize(body.len() + (padded - table.len()), 0);
        offset += padded;
    }

    let mut out = header;
    out.extend_from_slice(&body);

    // checkSumAdjustment: 0xB1B0AFBA minus the whole-file checksum.
    if let Some(head_at) = head_offset {
        let file_sum = table_checksum(&out);
        let adjustment = 0xB1B0_AFBAu32.wrapping_sub(file_sum);
        BigEndian::write_u32(&mut out[head_at + 8..], adjustment);
    }

    Ok(out)
}

/// Sum of big-endian u32 words, zero-padded at the tail.
fn table_checksum(data: &[u8]) -> u32 {
    let mut sum = 0u32;
    for chunk in data.chunks(4) {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum = sum.wrapping_add(u32::from_be_bytes(word));
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::test_font::build_test_truetype;

    #[test]
    fn test_subset_keeps_notdef_and_used() {
        let font = build_test_truetype();
        let used: BTreeSet<u32> = [1u32, 3].into_iter().collect();
        let subset = subset_truetype(&font, &used).unwrap();

        // .notdef + glyphs 1 and 3
        assert_eq!(subset.gid_map.len(), 3);
        assert_eq!(subset.gid_map[&0], 0);
        assert_eq!(subset.gid_map[&1], 1);
        assert_eq!(subset.gid_map[&3], 2);
    }

    #[test]
    fn test_subset_is_reparseable() {
        let font = build_test_truetype();
        let used: BTreeSet<u32> = [1u32, 2].into_iter().collect();
        let subset = subset_truetype(&font, &used).unwrap();

        let sfnt = SfntTables::parse(&subset.data).unwrap();
        let maxp = sfnt.require(b"maxp").unwrap();
        assert_eq!(BigEndian::read_u16(&maxp[4..]), 3);

        // Long loca after subsetting
        let head = sfnt.require(b"head").unwrap();
        assert_eq!(BigEndian::read_i16(&head[50..]), 1);

        // hmtx has one full metric per glyph
        let hmtx = sfnt.require(b"hmtx").unwrap();
        assert_eq!(hmtx.len(), 3 * 4);

        // cmap copied through
        assert!(sfnt.get(b"cmap").is_some());
    }

    #[test]
    fn test_subset_preserves_widths() {
        let font = build_test_truetype();
        let used: BTreeSet<u32> = [2u32].into_iter().collect();
        let subset = subset_truetype(&font, &used).unwrap();

        let sfnt = SfntTables::parse(&subset.data).unwrap();
        let hmtx = sfnt.require(b"hmtx").unwrap();
        // Glyph 2 renumbered to 1; its advance (600 + 2*10 per builder) moves with it
        let new_gid = subset.gid_map[&2];
        let advance = BigEndian::read_u16(&hmtx[new_gid as usize * 4..]);
        assert_eq!(advance, 620);
    }

    #[test]
    fn test_composite_component_pulled_in() {
        // Glyph 4 in the test font is a composite referencing glyph 1.
        let font = build_test_truetype();
        let used: BTreeSet<u32> = [4u32].into_iter().collect();
        let subset = subset_truetype(&font, &used).unwrap();

        // Closure: 0, 1 (component), 4
        assert_eq!(subset.gid_map.len(), 3);
        assert!(subset.gid_map.contains_key(&1));

        // The rewritten composite must reference the renumbered component.
        let sfnt = SfntTables::parse(&subset.data).unwrap();
        let glyf = sfnt.require(b"glyf").unwrap();
        let head = sfnt.require(b"head").unwrap();
        assert_eq!(BigEndian::read_i16(&head[50..]), 1);
        let maxp = sfnt.require(b"maxp").unwrap();
        let n = BigEndian::read_u16(&maxp[4..]);
        let loca = parse_loca(sfnt.require(b"loca").unwrap(), n, true).unwrap();

        let new_composite = subset.gid_map[&4];
        let glyph = glyph_data(glyf, &loca, new_composite).unwrap();
        let components = composite_components(glyph);
        assert_eq!(components, vec![subset.gid_map[&1]]);
    }

    #[test]
    fn test_checksums_balance() {
        let font = build_test_truetype();
        let used: BTreeSet<u32> = [1u32].into_iter().collect();
        let subset = subset_truetype(&font, &used).unwrap();

        // With checkSumAdjustment in place the whole file sums to the
        // magic constant.
        assert_eq!(table_checksum(&subset.data), 0xB1B0_AFBA);
    }

    #[test]
    fn test_not_truetype_rejected() {
        let used = BTreeSet::new();
        assert!(subset_truetype(b"OTTO\x00\x00\x00\x00", &used).is_err());
        assert!(subset_truetype(&[], &used).is_err());
    }
}
