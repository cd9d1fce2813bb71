use crate::descriptors::attribute_handle::AttributeHandle;
use crate::descriptors::uuid::UUID;
use enumset::EnumSet;

/// A characteristic discovered on the remote device along with its last known value.
///
/// Instances live inside the session's [crate::descriptors::GattService] list.  Whatever is
/// handed out to callers is a clone, so the `value` of a snapshot never changes after the fact
/// even though the session keeps updating its own copy on reads and notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattCharacteristic {
  pub handle: AttributeHandle,
  pub uuid: UUID,
  pub properties: EnumSet<GattCharacteristicProperty>,
  pub value: Option<Vec<u8>>,
}

impl GattCharacteristic {
  pub fn new(handle: AttributeHandle, uuid: UUID, properties: EnumSet<GattCharacteristicProperty>) -> Self {
    Self {
      handle,
      uuid,
      properties,
      value: None,
    }
  }

  pub fn can_notify(&self) -> bool {
    self.properties.contains(GattCharacteristicProperty::Notify)
        || self.properties.contains(GattCharacteristicProperty::Indicate)
  }
}

#[derive(Debug, enumset::EnumSetType)]
pub enum GattCharacteristicProperty {
  Broadcast,
  ExtendedProps,
  Indicate,
  Notify,
  Read,
  Write,
  WriteSigned,
  WriteNoResponse,
}

impl GattCharacteristicProperty {
  /// Decode the properties bit field from a characteristic declaration (Core Spec Vol 3,
  /// Part G, 3.3.1.1).  Transport backends use this to fill in
  /// [crate::transport::DiscoveredCharacteristic::properties].
  pub fn from_bits(bits: u8) -> EnumSet<GattCharacteristicProperty> {
    let mut set = EnumSet::new();
    for (mask, prop) in [
      (0x01, GattCharacteristicProperty::Broadcast),
      (0x02, GattCharacteristicProperty::Read),
      (0x04, GattCharacteristicProperty::WriteNoResponse),
      (0x08, GattCharacteristicProperty::Write),
      (0x10, GattCharacteristicProperty::Notify),
      (0x20, GattCharacteristicProperty::Indicate),
      (0x40, GattCharacteristicProperty::WriteSigned),
      (0x80, GattCharacteristicProperty::ExtendedProps),
    ] {
      if bits & mask != 0 {
        set.insert(prop);
      }
    }
    set
  }
}

#[cfg(test)]
mod tests {
  use enumset::enum_set;
  use super::*;

  #[test]
  fn decodes_declaration_bits() {
    assert_eq!(
      GattCharacteristicProperty::from_bits(0x1a),
      enum_set!(GattCharacteristicProperty::Read | GattCharacteristicProperty::Write | GattCharacteristicProperty::Notify)
    );
    assert!(GattCharacteristicProperty::from_bits(0).is_empty());
  }
}
