//! Well-known GPT partition type GUIDs.

use uuid::Uuid;

pub const GPT_ESP: Uuid = Uuid::from_u128(0xc12a7328_f81f_11d2_ba4b_00a0c93ec93b);
pub const GPT_SWAP: Uuid = Uuid::from_u128(0x0657fd6d_a4ab_43c4_84e5_0933c84b4f4f);
pub const GPT_HOME: Uuid = Uuid::from_u128(0x933ac7e1_2eb4_4f13_b844_0e14e2aef915);
pub const GPT_SRV: Uuid = Uuid::from_u128(0x3b8f8425_20e0_4f3b_907f_1a25a76f98e8);

/// EFI vendor GUID under which the boot loader publishes its variables.
pub const LOADER_VENDOR: Uuid = Uuid::from_u128(0x4a67b082_0a4c_41cf_b6c7_440b29bb8c4f);

/// Parse a GUID in any of the common textual forms, case-insensitively.
pub fn parse_guid(s: &str) -> Option<Uuid> {
    Uuid::parse_str(s.trim()).ok()
}
