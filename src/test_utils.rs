use crate::lookup::{LookupResult, SpoolId, SpoolRecord};

/// UID bytes of a 7-byte NTAG213 used across unit tests.
pub const TEST_UID: [u8; 7] = [0x04, 0xA2, 0x3B, 0x11, 0x00, 0x00, 0x07];

/// Build a `SpoolRecord` with only the fields most tests look at.
pub fn spool(id: u64, material: &str, remaining: f64, total: f64) -> SpoolRecord {
    SpoolRecord {
        id: SpoolId::Number(id),
        uuid: None,
        material: Some(material.to_string()),
        filament_type: None,
        color_name: None,
        remaining_weight: remaining,
        total_weight: total,
        location: None,
    }
}

pub fn found(id: u64, material: &str, remaining: f64, total: f64) -> LookupResult {
    LookupResult::Found {
        spool: spool(id, material, remaining, total),
        nfc_info: None,
    }
}
