use core::fmt::{Display, Formatter};

/// ATT protocol error codes returned by reads and writes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum AttError {
  InvalidHandle = 0x01,
  ReadNotPermitted = 0x02,
  WriteNotPermitted = 0x03,
  InvalidPdu = 0x04,
  InsufficientAuthentication = 0x05,
  RequestNotSupported = 0x06,
  InvalidOffset = 0x07,
  InsufficientAuthorization = 0x08,
  PrepareQueueFull = 0x09,
  AttributeNotFound = 0x0A,
  AttributeTooLong = 0x0B,
  InsufficientKeySize = 0x0C,
  InvalidAttributeValueLength = 0x0D,
  Unlikely = 0x0E,
  InsufficientEncryption = 0x0F,
  UnsupportedGroupType = 0x10,
  InsufficientResources = 0x11,
}

impl TryFrom<u8> for AttError {
  type Error = u8;

  fn try_from(value: u8) -> Result<Self, Self::Error> {
    Ok(match value {
      0x01 => AttError::InvalidHandle,
      0x02 => AttError::ReadNotPermitted,
      0x03 => AttError::WriteNotPermitted,
      0x04 => AttError::InvalidPdu,
      0x05 => AttError::InsufficientAuthentication,
      0x06 => AttError::RequestNotSupported,
      0x07 => AttError::InvalidOffset,
      0x08 => AttError::InsufficientAuthorization,
      0x09 => AttError::PrepareQueueFull,
      0x0A => AttError::AttributeNotFound,
      0x0B => AttError::AttributeTooLong,
      0x0C => AttError::InsufficientKeySize,
      0x0D => AttError::InvalidAttributeValueLength,
      0x0E => AttError::Unlikely,
      0x0F => AttError::InsufficientEncryption,
      0x10 => AttError::UnsupportedGroupType,
      0x11 => AttError::InsufficientResources,
      o => return Err(o),
    })
  }
}

impl Display for AttError {
  fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
    write!(f, "{self:?} ({:#04x})", *self as u8)
  }
}

/// Map a raw GATT operation status where zero means success.  Stack specific codes outside the
/// ATT range (Android's 133 `GATT_ERROR` being the usual suspect) collapse to
/// [AttError::Unlikely].  Meant for transport backends filling in read and write results.
pub fn att_status(code: u8) -> Result<(), AttError> {
  match code {
    0 => Ok(()),
    o => Err(AttError::try_from(o).unwrap_or(AttError::Unlikely)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn maps_known_and_unknown_codes() {
    assert_eq!(att_status(0), Ok(()));
    assert_eq!(att_status(0x02), Err(AttError::ReadNotPermitted));
    assert_eq!(att_status(133), Err(AttError::Unlikely));
    assert_eq!(AttError::try_from(0x12), Err(0x12));
  }
}
