use core::fmt::{Display, Formatter};

/// Bluetooth SIG base UUID (`00000000-0000-1000-8000-00805F9B34FB`) that short UUIDs are
/// relative to.
pub const BLUETOOTH_BASE_UUID: u128 = 0x00000000_0000_1000_8000_00805F9B34FB;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UUID {
  /// For use only with SIG defined services (i.e. registered and publicly well known services).
  Short(u16),

  /// All other BLE UUIDs must be 128-bit
  Long(u128),
}

impl UUID {
  /// Raw numeric value as carried on the wire, without expanding short UUIDs.
  pub fn as_u128(&self) -> u128 {
    match *self {
      UUID::Short(u) => u.into(),
      UUID::Long(u) => u,
    }
  }

  /// Full 128-bit value, expanding short UUIDs against [BLUETOOTH_BASE_UUID].
  pub fn to_u128(&self) -> u128 {
    match *self {
      UUID::Short(u) => expand(u.into()),
      UUID::Long(u) => u,
    }
  }

  /// Decode a little-endian UUID as found in advertisement records.  Accepts 2, 4 or 16 byte
  /// inputs; 32-bit UUIDs are expanded against the base UUID since they have no short form.
  pub fn from_le_bytes(bytes: &[u8]) -> Option<UUID> {
    match bytes.len() {
      2 => Some(UUID::Short(u16::from_le_bytes([bytes[0], bytes[1]]))),
      4 => {
        let value = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        Some(UUID::Long(expand(value)))
      }
      16 => {
        let mut raw = [0u8; 16];
        raw.copy_from_slice(bytes);
        Some(UUID::Long(u128::from_le_bytes(raw)))
      }
      _ => None,
    }
  }
}

fn expand(value: u32) -> u128 {
  (u128::from(value) << 96) | BLUETOOTH_BASE_UUID
}

impl Display for UUID {
  fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
    Display::fmt(&::uuid::Uuid::from_u128(self.to_u128()).hyphenated(), f)
  }
}

impl From<UUID> for ::uuid::Uuid {
  fn from(value: UUID) -> Self {
    ::uuid::Uuid::from_u128(value.to_u128())
  }
}

impl From<::uuid::Uuid> for UUID {
  fn from(value: ::uuid::Uuid) -> Self {
    UUID::Long(value.as_u128())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn short_uuid_displays_expanded() {
    assert_eq!(UUID::Short(0x180f).to_string(), "0000180f-0000-1000-8000-00805f9b34fb");
  }

  #[test]
  fn decodes_little_endian_widths() {
    assert_eq!(UUID::from_le_bytes(&[0x0f, 0x18]), Some(UUID::Short(0x180f)));
    assert_eq!(
      UUID::from_le_bytes(&[0x78, 0x56, 0x34, 0x12]).map(|u| u.to_u128() >> 96),
      Some(0x12345678)
    );
    assert_eq!(UUID::from_le_bytes(&[0x01, 0x02, 0x03]), None);
  }
}
