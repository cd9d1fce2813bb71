use crate::descriptors::attribute_handle::AttributeHandle;
use crate::descriptors::gatt_characteristic::GattCharacteristic;
use crate::descriptors::uuid::UUID;

/// A discovered service.  The whole list is built in one go when discovery completes and is
/// swapped out wholesale by the next discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
  pub handle: AttributeHandle,
  pub uuid: UUID,
  pub service_type: GattServiceType,
  pub characteristics: Vec<GattCharacteristic>,
}

impl GattService {
  pub fn characteristic(&self, handle: AttributeHandle) -> Option<&GattCharacteristic> {
    self.characteristics.iter().find(|c| c.handle == handle)
  }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GattServiceType {
  Primary,
  Secondary,
}
