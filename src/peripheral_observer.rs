use crate::att_error::AttError;
use crate::bluetooth_error::BluetoothError;
use crate::descriptors::{GattCharacteristic, GattService, UUID};
use crate::device_identity::DeviceIdentity;
use crate::mtu::Mtu;

/// Receives everything a [crate::peripheral_session::PeripheralSession] has to report.  Events
/// are delivered synchronously from whichever context drove the session, so implementations
/// must not block.
pub trait PeripheralObserver {
  fn on_event(&mut self, event: PeripheralEvent<'_>);
}

impl<F> PeripheralObserver for F
where
  F: FnMut(PeripheralEvent<'_>),
{
  fn on_event(&mut self, event: PeripheralEvent<'_>) {
    (self)(event)
  }
}

#[derive(Debug)]
pub enum PeripheralEvent<'a> {
  /// Link is up.  Only emitted when [crate::peripheral_session::ConnectOptions::notify_on_connect]
  /// was set.
  Connected { peripheral: &'a DeviceIdentity },

  /// Link went down cleanly.  Only emitted when
  /// [crate::peripheral_session::ConnectOptions::notify_on_disconnect] was set, and never for a
  /// local [crate::peripheral_session::PeripheralSession::disconnect_peripheral].
  Disconnected { peripheral: &'a DeviceIdentity },

  /// Connecting failed or an established link dropped with an error status.  Always emitted;
  /// the session is back in `Disconnected` by the time this arrives.
  ConnectionError {
    peripheral: &'a DeviceIdentity,
    error: ConnectionError,
  },

  /// Discovery completed and `services` replaced whatever was known before.
  ServicesDiscovered {
    peripheral: &'a DeviceIdentity,
    services: &'a [GattService],
  },

  CharacteristicsDiscoveredForService {
    peripheral: &'a DeviceIdentity,
    service: &'a GattService,
  },

  /// A read finished.  On success the characteristic's cached value already holds `value`.
  CharacteristicRead {
    peripheral: &'a DeviceIdentity,
    service: &'a GattService,
    characteristic: &'a GattCharacteristic,
    result: Result<&'a [u8], AttError>,
  },

  CharacteristicWritten {
    peripheral: &'a DeviceIdentity,
    service: &'a GattService,
    characteristic: &'a GattCharacteristic,
    result: Result<(), AttError>,
  },

  /// The peripheral pushed a new value.  The characteristic's cached value is already updated.
  CharacteristicChanged {
    peripheral: &'a DeviceIdentity,
    service: &'a GattService,
    characteristic: &'a GattCharacteristic,
  },

  /// Same push as [PeripheralEvent::CharacteristicChanged] for consumers that only want the
  /// wire bytes: uppercase hex, two digits per byte, no separator.  Not emitted for empty
  /// payloads.
  CharacteristicChangedRaw {
    peripheral: &'a DeviceIdentity,
    hex: &'a str,
  },

  MtuChanged {
    peripheral: &'a DeviceIdentity,
    mtu: Mtu,
  },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConnectionError {
  /// The connect attempt was answered with an error status.
  ConnectFailure(BluetoothError),

  /// An established link reported an error status.  Observably the same as
  /// [ConnectionError::ConnectFailure]; kept apart only for logging.
  UnexpectedDisconnect(BluetoothError),
}

impl ConnectionError {
  pub fn status(&self) -> BluetoothError {
    match *self {
      ConnectionError::ConnectFailure(e) | ConnectionError::UnexpectedDisconnect(e) => e,
    }
  }
}

/// Owned copy of a [PeripheralEvent], for observers that forward events somewhere else (a
/// channel, another thread) and cannot hold on to the borrowed form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnedPeripheralEvent {
  Connected,
  Disconnected,
  ConnectionError(ConnectionError),
  ServicesDiscovered(Vec<GattService>),
  CharacteristicsDiscoveredForService(GattService),
  CharacteristicRead {
    service: UUID,
    characteristic: GattCharacteristic,
    result: Result<Vec<u8>, AttError>,
  },
  CharacteristicWritten {
    service: UUID,
    characteristic: GattCharacteristic,
    result: Result<(), AttError>,
  },
  CharacteristicChanged {
    service: UUID,
    characteristic: GattCharacteristic,
  },
  CharacteristicChangedRaw(String),
  MtuChanged(Mtu),
}

impl PeripheralEvent<'_> {
  pub fn to_owned_event(&self) -> OwnedPeripheralEvent {
    match self {
      PeripheralEvent::Connected { .. } => OwnedPeripheralEvent::Connected,
      PeripheralEvent::Disconnected { .. } => OwnedPeripheralEvent::Disconnected,
      PeripheralEvent::ConnectionError { error, .. } => OwnedPeripheralEvent::ConnectionError(*error),
      PeripheralEvent::ServicesDiscovered { services, .. } => {
        OwnedPeripheralEvent::ServicesDiscovered(services.to_vec())
      }
      PeripheralEvent::CharacteristicsDiscoveredForService { service, .. } => {
        OwnedPeripheralEvent::CharacteristicsDiscoveredForService((*service).clone())
      }
      PeripheralEvent::CharacteristicRead { service, characteristic, result, .. } => {
        OwnedPeripheralEvent::CharacteristicRead {
          service: service.uuid,
          characteristic: (*characteristic).clone(),
          result: result.map(<[u8]>::to_vec),
        }
      }
      PeripheralEvent::CharacteristicWritten { service, characteristic, result, .. } => {
        OwnedPeripheralEvent::CharacteristicWritten {
          service: service.uuid,
          characteristic: (*characteristic).clone(),
          result: *result,
        }
      }
      PeripheralEvent::CharacteristicChanged { service, characteristic, .. } => {
        OwnedPeripheralEvent::CharacteristicChanged {
          service: service.uuid,
          characteristic: (*characteristic).clone(),
        }
      }
      PeripheralEvent::CharacteristicChangedRaw { hex, .. } => {
        OwnedPeripheralEvent::CharacteristicChangedRaw((*hex).to_owned())
      }
      PeripheralEvent::MtuChanged { mtu, .. } => OwnedPeripheralEvent::MtuChanged(*mtu),
    }
  }
}
