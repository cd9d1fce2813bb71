use crate::advertisement::AdvertisementRecord;
use crate::bluetooth_address::BluetoothAddress;
use crate::descriptors::UUID;

/// Who we are talking to, as produced by the scanning collaborator.  Immutable once the
/// session owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
  address: BluetoothAddress,
  name: Option<String>,
  cached_uuids: Option<Vec<UUID>>,
  advertisement: Option<AdvertisementRecord>,
}

impl DeviceIdentity {
  pub fn new(address: BluetoothAddress) -> Self {
    Self {
      address,
      name: None,
      cached_uuids: None,
      advertisement: None,
    }
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  /// Service UUIDs the OS already knows for this device (e.g. from a previous SDP or GATT
  /// cache).  Takes precedence over the advertisement.
  pub fn with_cached_uuids(mut self, uuids: Vec<UUID>) -> Self {
    self.cached_uuids = Some(uuids);
    self
  }

  pub fn with_advertisement(mut self, advertisement: AdvertisementRecord) -> Self {
    self.advertisement = Some(advertisement);
    self
  }

  pub fn address(&self) -> BluetoothAddress {
    self.address
  }

  /// Explicit name if one was supplied, otherwise the advertised local name.
  pub fn name(&self) -> Option<String> {
    self.name.clone()
        .or_else(|| self.advertisement.as_ref().and_then(AdvertisementRecord::local_name))
  }

  pub fn advertisement(&self) -> Option<&AdvertisementRecord> {
    self.advertisement.as_ref()
  }

  /// The OS cached UUIDs when known, otherwise the UUIDs the advertisement attached service
  /// data to.
  pub fn advertised_service_uuids(&self) -> Vec<UUID> {
    match (&self.cached_uuids, &self.advertisement) {
      (Some(uuids), _) => uuids.clone(),
      (None, Some(adv)) => adv.service_data_uuids(),
      (None, None) => Vec::new(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn address() -> BluetoothAddress {
    BluetoothAddress([0xc0, 0xff, 0xee, 0x00, 0x00, 0x01])
  }

  #[test]
  fn cached_uuids_win_over_advertisement() {
    // Service data record for 0xfeaa with one byte of payload.
    let adv = AdvertisementRecord::new(&[0x04, 0x16, 0xaa, 0xfe, 0x00], None).unwrap();

    let with_cache = DeviceIdentity::new(address())
        .with_cached_uuids(vec![UUID::Short(0x180f)])
        .with_advertisement(adv.clone());
    assert_eq!(with_cache.advertised_service_uuids(), vec![UUID::Short(0x180f)]);

    let without_cache = DeviceIdentity::new(address()).with_advertisement(adv);
    assert_eq!(without_cache.advertised_service_uuids(), vec![UUID::Short(0xfeaa)]);

    assert!(DeviceIdentity::new(address()).advertised_service_uuids().is_empty());
  }

  #[test]
  fn name_falls_back_to_advertised_local_name() {
    let adv = AdvertisementRecord::new(&[0x04, 0x09, b'h', b'r', b'm'], None).unwrap();
    let identity = DeviceIdentity::new(address()).with_advertisement(adv);
    assert_eq!(identity.name().as_deref(), Some("hrm"));
    assert_eq!(identity.with_name("strap").name().as_deref(), Some("strap"));
  }
}
