use std::collections::BTreeMap;
use core::ops::Deref;

use crate::descriptors::UUID;

/// Legacy advertising PDUs carry at most 31 bytes of AD data, as do scan responses.
pub const MAX_LEGACY_PAYLOAD: usize = 31;

/// Advertisement as handed over by the scanning collaborator: the advertising payload plus the
/// scan response, if an active scan produced one.  Parsing is lazy; accessors walk the raw
/// AD records each time.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AdvertisementRecord {
  pub payload: AdvertisementPayload,
  pub scan_response: Option<ScanResponsePayload>,
}

impl AdvertisementRecord {
  pub fn new(payload: &[u8], scan_response: Option<&[u8]>) -> Result<Self, AdvertisementError> {
    Ok(Self {
      payload: AdvertisementPayload::try_from(payload)?,
      scan_response: scan_response.map(ScanResponsePayload::try_from).transpose()?,
    })
  }

  /// All AD records, advertising payload first.
  pub fn records(&self) -> impl Iterator<Item = AdRecord<'_>> {
    let scan_response: &[u8] = self.scan_response.as_deref().unwrap_or(&[]);
    AdRecordIter::new(&self.payload).chain(AdRecordIter::new(scan_response))
  }

  /// Complete local name if present, otherwise the shortened one.
  pub fn local_name(&self) -> Option<String> {
    let mut short = None;
    for record in self.records() {
      if record.ad_type == AdType::LongLocalName as u8 {
        return Some(String::from_utf8_lossy(record.data).into_owned());
      }
      if record.ad_type == AdType::ShortLocalName as u8 && short.is_none() {
        short = Some(String::from_utf8_lossy(record.data).into_owned());
      }
    }
    short
  }

  /// UUIDs from the (partial or complete) service class UUID lists.
  pub fn service_uuids(&self) -> Vec<UUID> {
    let mut uuids = Vec::new();
    for record in self.records() {
      let width = match AdType::from_u8(record.ad_type) {
        Some(AdType::PartialServiceUuids16 | AdType::CompleteServiceUuids16) => 2,
        Some(AdType::PartialServiceUuids32 | AdType::CompleteServiceUuids32) => 4,
        Some(AdType::PartialServiceUuids128 | AdType::CompleteServiceUuids128) => 16,
        _ => continue,
      };
      uuids.extend(record.data.chunks_exact(width).filter_map(UUID::from_le_bytes));
    }
    uuids
  }

  /// UUIDs that have service data attached, in the order they were advertised.
  pub fn service_data_uuids(&self) -> Vec<UUID> {
    self.records()
        .filter_map(|record| {
          let width = match AdType::from_u8(record.ad_type)? {
            AdType::ServiceData16 => 2,
            AdType::ServiceData32 => 4,
            AdType::ServiceData128 => 16,
            _ => return None,
          };
          record.data.get(..width).and_then(UUID::from_le_bytes)
        })
        .collect()
  }

  pub fn manufacturer_data(&self) -> BTreeMap<u16, Vec<u8>> {
    self.records()
        .filter(|r| r.ad_type == AdType::ManufacturerData as u8 && r.data.len() >= 2)
        .map(|r| (u16::from_le_bytes([r.data[0], r.data[1]]), r.data[2..].to_vec()))
        .collect()
  }
}

/// Advertisements consist of one or more ad type units in a TLV-style format (but actually it's
/// LTV).  Note that this list is not exhaustive but is provided as a convenience.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum AdType {
  Flags = 0x01,
  PartialServiceUuids16 = 0x02,
  CompleteServiceUuids16 = 0x03,
  PartialServiceUuids32 = 0x04,
  CompleteServiceUuids32 = 0x05,
  PartialServiceUuids128 = 0x06,
  CompleteServiceUuids128 = 0x07,
  ShortLocalName = 0x08,
  LongLocalName = 0x09,
  TxPowerLevel = 0x0a,
  ServiceData16 = 0x16,
  Appearance = 0x19,
  ServiceData32 = 0x20,
  ServiceData128 = 0x21,
  ManufacturerData = 0xff,
}

impl AdType {
  pub fn from_u8(value: u8) -> Option<AdType> {
    Some(match value {
      0x01 => AdType::Flags,
      0x02 => AdType::PartialServiceUuids16,
      0x03 => AdType::CompleteServiceUuids16,
      0x04 => AdType::PartialServiceUuids32,
      0x05 => AdType::CompleteServiceUuids32,
      0x06 => AdType::PartialServiceUuids128,
      0x07 => AdType::CompleteServiceUuids128,
      0x08 => AdType::ShortLocalName,
      0x09 => AdType::LongLocalName,
      0x0a => AdType::TxPowerLevel,
      0x16 => AdType::ServiceData16,
      0x19 => AdType::Appearance,
      0x20 => AdType::ServiceData32,
      0x21 => AdType::ServiceData128,
      0xff => AdType::ManufacturerData,
      _ => return None,
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdvertisementError {
  #[error("advertisement payload exceeds 31 bytes")]
  CapacityExceeded,
}

/// Represents the raw payload for an advertisement.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RawAdvertisement<const N: usize>(pub heapless::Vec<u8, N>);

impl<const N: usize> Deref for RawAdvertisement<N> {
  type Target = [u8];

  fn deref(&self) -> &Self::Target {
    &self.0
  }
}

impl<const N: usize> TryFrom<&[u8]> for RawAdvertisement<N> {
  type Error = AdvertisementError;

  fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
    heapless::Vec::from_slice(value)
        .map(RawAdvertisement)
        .map_err(|_| AdvertisementError::CapacityExceeded)
  }
}

pub type AdvertisementPayload = RawAdvertisement<MAX_LEGACY_PAYLOAD>;
pub type ScanResponsePayload = RawAdvertisement<MAX_LEGACY_PAYLOAD>;

/// One AD structure borrowed from a raw payload.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AdRecord<'a> {
  pub ad_type: u8,
  pub data: &'a [u8],
}

/// Walks AD structures.  A zero length terminates (the rest is padding) and a record running
/// past the end of the buffer is treated as the end of the payload.
#[derive(Debug, Clone)]
pub struct AdRecordIter<'a> {
  remaining: &'a [u8],
}

impl<'a> AdRecordIter<'a> {
  pub fn new(data: &'a [u8]) -> Self {
    Self { remaining: data }
  }
}

impl<'a> Iterator for AdRecordIter<'a> {
  type Item = AdRecord<'a>;

  fn next(&mut self) -> Option<Self::Item> {
    let (&length, rest) = self.remaining.split_first()?;
    let length = usize::from(length);
    if length < 1 || rest.len() < length {
      self.remaining = &[];
      return None;
    }
    let (record, rest) = rest.split_at(length);
    self.remaining = rest;
    Some(AdRecord { ad_type: record[0], data: &record[1..] })
  }
}

#[cfg(test)]
mod tests {
  use byteorder::{LittleEndian, WriteBytesExt};

  use super::*;

  fn push_record(buf: &mut Vec<u8>, ad_type: AdType, data: &[u8]) {
    buf.push(u8::try_from(data.len() + 1).unwrap());
    buf.push(ad_type as u8);
    buf.extend_from_slice(data);
  }

  #[test]
  fn parses_service_uuid_lists() {
    let mut uuids16 = Vec::new();
    uuids16.write_u16::<LittleEndian>(0x180f).unwrap();
    uuids16.write_u16::<LittleEndian>(0x180a).unwrap();

    let mut payload = Vec::new();
    push_record(&mut payload, AdType::Flags, &[0x06]);
    push_record(&mut payload, AdType::CompleteServiceUuids16, &uuids16);

    let adv = AdvertisementRecord::new(&payload, None).unwrap();
    assert_eq!(adv.service_uuids(), vec![UUID::Short(0x180f), UUID::Short(0x180a)]);
    assert!(adv.service_data_uuids().is_empty());
  }

  #[test]
  fn service_data_keys_and_manufacturer_data() {
    let mut service_data = Vec::new();
    service_data.write_u16::<LittleEndian>(0xfeaa).unwrap();
    service_data.extend_from_slice(&[0x10, 0x20]);

    let mut mfg = Vec::new();
    mfg.write_u16::<LittleEndian>(0xf00d).unwrap();
    mfg.extend_from_slice(&[0x21, 0x22]);

    let mut payload = Vec::new();
    push_record(&mut payload, AdType::ServiceData16, &service_data);
    let mut scan_response = Vec::new();
    push_record(&mut scan_response, AdType::ManufacturerData, &mfg);

    let adv = AdvertisementRecord::new(&payload, Some(scan_response.as_slice())).unwrap();
    assert_eq!(adv.service_data_uuids(), vec![UUID::Short(0xfeaa)]);
    assert_eq!(adv.manufacturer_data().get(&0xf00d), Some(&vec![0x21, 0x22]));
  }

  #[test]
  fn prefers_complete_local_name() {
    let mut payload = Vec::new();
    push_record(&mut payload, AdType::ShortLocalName, b"therm");
    push_record(&mut payload, AdType::LongLocalName, b"thermostat");

    let adv = AdvertisementRecord::new(&payload, None).unwrap();
    assert_eq!(adv.local_name().as_deref(), Some("thermostat"));
  }

  #[test]
  fn truncated_record_ends_iteration() {
    let payload = [0x02, 0x01, 0x06, 0x05, 0x09, b'a'];
    let records: Vec<_> = AdRecordIter::new(&payload).collect();
    assert_eq!(records, vec![AdRecord { ad_type: 0x01, data: &[0x06] }]);
  }

  #[test]
  fn rejects_oversized_payload() {
    assert_eq!(
      AdvertisementRecord::new(&[0u8; 32], None),
      Err(AdvertisementError::CapacityExceeded)
    );
  }
}
