use core::fmt::Debug;

use enumset::EnumSet;

use crate::att_error::AttError;
use crate::bluetooth_error::BluetoothError;
use crate::descriptors::{AttributeHandle, GattCharacteristic, GattCharacteristicProperty, GattService, GattServiceType, UUID};
use crate::device_identity::DeviceIdentity;
use crate::mtu::Mtu;
use crate::peripheral_session::ConnectOptions;

/// Low-level mapping onto the OS (or embedded) BLE central stack.  Every method only *issues* a
/// request; outcomes come back later as [TransportEvent]s which the owner of the
/// [crate::peripheral_session::PeripheralSession] must feed into
/// [crate::peripheral_session::PeripheralSession::handle_event].  Completion events are expected
/// on whatever context the stack uses, which is why they are plain owned values.
///
/// An `Err` from any of these methods means the request was never issued (there will be no
/// matching event), not that the remote operation failed.
///
/// Note that this trait is not meant to be ergonomic.  It is the seam a platform backend
/// implements, and the session is what callers use.
pub trait GattTransport {
  type SystemError: Debug;

  /// Identity of one connection attempt.  Every event is tagged with it so completions for a
  /// connection the session has already let go of can be told apart from current ones.
  type Handle: Debug + Clone + PartialEq;

  /// Start connecting.  The returned handle is live immediately (much like Android's
  /// `connectGatt`) and the outcome arrives as [TransportEvent::ConnectionStateChanged].
  fn connect(
      &mut self,
      identity: &DeviceIdentity,
      options: &ConnectOptions,
  ) -> Result<Self::Handle, Self::SystemError>;

  /// Disconnect and release everything associated with `handle`.  Fire-and-forget; the
  /// session considers the handle gone as soon as this returns.
  fn disconnect(&mut self, handle: &Self::Handle);

  /// Discover the entire service and characteristic graph in one round trip, answered by
  /// [TransportEvent::ServicesDiscovered].
  fn discover_services(&mut self, handle: &Self::Handle) -> Result<(), Self::SystemError>;

  fn read_characteristic(
      &mut self,
      handle: &Self::Handle,
      characteristic: AttributeHandle,
  ) -> Result<(), Self::SystemError>;

  fn write_characteristic(
      &mut self,
      handle: &Self::Handle,
      characteristic: AttributeHandle,
      value: &[u8],
      write_type: WriteType,
  ) -> Result<(), Self::SystemError>;

  /// Arm or disarm local delivery of [TransportEvent::CharacteristicChanged].  Takes effect
  /// immediately and has no completion event.
  fn set_notification(
      &mut self,
      handle: &Self::Handle,
      characteristic: AttributeHandle,
      enabled: bool,
  ) -> Result<(), Self::SystemError>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WriteType {
  /// The peripheral acknowledges the write with an ATT write response.
  WithResponse,

  /// Write command, no acknowledgment.
  WithoutResponse,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LinkState {
  Connected,
  Disconnected,
}

/// Asynchronous results and unsolicited pushes from the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent<H> {
  /// Link came up or went down.  `status` is the link status reported with the change; any
  /// error is treated as terminal regardless of `state`.
  ConnectionStateChanged {
    handle: H,
    status: Result<(), BluetoothError>,
    state: LinkState,
  },

  /// Discovery finished.  There is no failure channel; a failed discovery simply reports
  /// whatever (possibly nothing) the stack found.
  ServicesDiscovered {
    handle: H,
    services: Vec<DiscoveredService>,
  },

  MtuChanged {
    handle: H,
    mtu: Mtu,
  },

  CharacteristicRead {
    handle: H,
    characteristic: AttributeHandle,
    result: Result<Vec<u8>, AttError>,
  },

  CharacteristicWritten {
    handle: H,
    characteristic: AttributeHandle,
    result: Result<(), AttError>,
  },

  /// Notification or indication received.
  CharacteristicChanged {
    handle: H,
    characteristic: AttributeHandle,
    value: Vec<u8>,
  },
}

impl<H> TransportEvent<H> {
  pub fn handle(&self) -> &H {
    match self {
      TransportEvent::ConnectionStateChanged { handle, .. }
      | TransportEvent::ServicesDiscovered { handle, .. }
      | TransportEvent::MtuChanged { handle, .. }
      | TransportEvent::CharacteristicRead { handle, .. }
      | TransportEvent::CharacteristicWritten { handle, .. }
      | TransportEvent::CharacteristicChanged { handle, .. } => handle,
    }
  }
}

/// Service as reported by the transport, before the session turns it into a
/// [GattService].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredService {
  pub handle: AttributeHandle,
  pub uuid: UUID,
  pub service_type: GattServiceType,
  pub characteristics: Vec<DiscoveredCharacteristic>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredCharacteristic {
  pub handle: AttributeHandle,
  pub uuid: UUID,
  pub properties: EnumSet<GattCharacteristicProperty>,
}

impl From<DiscoveredService> for GattService {
  fn from(value: DiscoveredService) -> Self {
    GattService {
      handle: value.handle,
      uuid: value.uuid,
      service_type: value.service_type,
      characteristics: value.characteristics
          .into_iter()
          .map(|c| GattCharacteristic::new(c.handle, c.uuid, c.properties))
          .collect(),
    }
  }
}
