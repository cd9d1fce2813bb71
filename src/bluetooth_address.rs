use core::fmt::{Display, Formatter};
use core::str::FromStr;

/// 48-bit device address, stored most significant octet first (the order it is printed in).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BluetoothAddress(pub [u8; 6]);

impl Display for BluetoothAddress {
  fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
    let [a, b, c, d, e, g] = self.0;
    write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid bluetooth address: {0:?}")]
pub struct ParseAddressError(pub String);

impl FromStr for BluetoothAddress {
  type Err = ParseAddressError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let err = || ParseAddressError(s.to_owned());
    let mut octets = [0u8; 6];
    let mut parts = s.split(':');
    for octet in octets.iter_mut() {
      let part = parts.next().filter(|p| p.len() == 2).ok_or_else(err)?;
      *octet = u8::from_str_radix(part, 16).map_err(|_| err())?;
    }
    if parts.next().is_some() {
      return Err(err());
    }
    Ok(BluetoothAddress(octets))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_and_prints_colon_form() {
    let addr: BluetoothAddress = "c0:ff:ee:00:12:ab".parse().unwrap();
    assert_eq!(addr.0, [0xc0, 0xff, 0xee, 0x00, 0x12, 0xab]);
    assert_eq!(addr.to_string(), "C0:FF:EE:00:12:AB");
  }

  #[test]
  fn rejects_malformed() {
    assert!("C0:FF:EE:00:12".parse::<BluetoothAddress>().is_err());
    assert!("C0:FF:EE:00:12:AB:01".parse::<BluetoothAddress>().is_err());
    assert!("C0-FF-EE-00-12-AB".parse::<BluetoothAddress>().is_err());
  }
}
