use core::fmt::{Display, Formatter};

/// ATT MTU of a connection.  The session never negotiates it; a preferred value is passed
/// through to the transport on connect and whatever the transport reports back is recorded.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Mtu {
  negotiated_mtu: u16,
}

impl Mtu {
  /// Minimum ATT MTU for LE, in effect until an exchange happens.
  pub const DEFAULT: Mtu = Mtu { negotiated_mtu: 23 };

  /// Largest MTU an ATT exchange can settle on.
  pub const MAX: Mtu = Mtu { negotiated_mtu: 517 };

  pub fn new(negotiated_mtu: u16) -> Self {
    Self { negotiated_mtu }
  }

  pub fn negotiated_value(&self) -> u16 {
    self.negotiated_mtu
  }

  /// Largest attribute value that fits in one write or notification, i.e. the MTU minus the
  /// 3 byte ATT header.
  pub fn usable_value(&self) -> u16 {
    self.negotiated_mtu.saturating_sub(3)
  }
}

impl Default for Mtu {
  fn default() -> Self {
    Self::DEFAULT
  }
}

impl Display for Mtu {
  fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
    write!(f, "{}", self.negotiated_mtu)
  }
}
