use core::num::NonZeroU16;
use core::fmt::Display;
use core::fmt::Formatter;

/// ATT handle of a discovered service or characteristic.  The session uses it as the stable
/// reference callers pass back in, since UUIDs are not unique within a GATT database.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttributeHandle(pub NonZeroU16);

impl AttributeHandle {
  pub fn new(raw: u16) -> Option<Self> {
    NonZeroU16::new(raw).map(AttributeHandle)
  }
}

impl Display for AttributeHandle {
  fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
    write!(f, "{:#06x}", self.0.get())
  }
}
