//! Importer-specific post-copy derivations (SPEC_FULL.md §4.4): populate
//! `imei_norm`/`virt_imei_shard` from a raw `imei` column, and derive
//! GSMA's `rat_bitmask` from its pipe-separated `bands` column.

use crate::row::ImportRow;
use dirbs_core_normalize::normalize_imei_unchecked;
use dirbs_core_shard::virt_shard;

/// Radio access technology bits, ordered to match the bit positions the
/// GSMA TAC directory's `bands` column encodes.
const KNOWN_BANDS: &[(&str, u32)] = &[
    ("GSM", 1 << 0),
    ("UMTS", 1 << 1),
    ("LTE", 1 << 2),
    ("NR", 1 << 3),
];

/// Adds `imei_norm` and `virt_imei_shard` columns derived from `imei_column`.
/// A no-op if `imei_column` is absent or already invalid (the schema
/// validator rejects malformed IMEIs before staging is ever loaded).
pub fn derive_imei_shard(row: &mut ImportRow, imei_column: &str) {
    let Some(raw) = row.get(imei_column) else { return };
    let imei_norm = normalize_imei_unchecked(raw);
    let shard = virt_shard(&imei_norm);
    row.set("imei_norm", imei_norm);
    row.set("virt_imei_shard", shard.to_string());
}

/// Adds a `rat_bitmask` column computed from a pipe-separated `bands`
/// column (e.g. `"GSM|LTE"` -> bit 0 | bit 2).
pub fn derive_rat_bitmask(row: &mut ImportRow) {
    let Some(bands) = row.get("bands") else { return };
    let mask = bands
        .split('|')
        .filter_map(|band| {
            KNOWN_BANDS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(band.trim()))
                .map(|(_, bit)| *bit)
        })
        .fold(0u32, |acc, bit| acc | bit);
    row.set("rat_bitmask", mask.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_imei_norm_and_shard() {
        let mut row = ImportRow::default();
        row.set("imei", "64220297727231".to_string());
        derive_imei_shard(&mut row, "imei");
        assert_eq!(row.get("imei_norm"), Some("64220297727231"));
        assert!(row.get("virt_imei_shard").is_some());
    }

    #[test]
    fn derives_rat_bitmask_from_bands() {
        let mut row = ImportRow::default();
        row.set("bands", "GSM|LTE".to_string());
        derive_rat_bitmask(&mut row);
        assert_eq!(row.get("rat_bitmask"), Some("5"));
    }

    #[test]
    fn unknown_band_contributes_no_bits() {
        let mut row = ImportRow::default();
        row.set("bands", "CDMA".to_string());
        derive_rat_bitmask(&mut row);
        assert_eq!(row.get("rat_bitmask"), Some("0"));
    }
}
