use std::time::Instant;

use log::{debug, error, info, trace, warn};

use crate::bluetooth_address::BluetoothAddress;
use crate::bluetooth_error::BluetoothError;
use crate::descriptors::{AttributeHandle, GattService, UUID};
use crate::device_identity::DeviceIdentity;
use crate::mtu::Mtu;
use crate::peripheral_observer::{ConnectionError, PeripheralEvent, PeripheralObserver};
use crate::session_error::SessionError;
use crate::transport::{GattTransport, LinkState, TransportEvent, WriteType};

/// Client side session with one remote peripheral: drives a [GattTransport] through
/// connect, discovery and characteristic operations and reports the outcomes to a
/// [PeripheralObserver].
///
/// All public operations only issue a request and return; results surface later through the
/// observer once the owner feeds the matching [TransportEvent] into [Self::handle_event].  The
/// session is a plain `&mut self` state machine, so whoever owns it is the single logical task
/// that serializes caller requests and transport callbacks (see [crate::session_task] for a
/// ready made one).
///
/// At most one GATT request (discovery, read or write) is outstanding at a time.  Issuing
/// another one before the first completes fails with [SessionError::OperationPending].
pub struct PeripheralSession<T: GattTransport, O: PeripheralObserver> {
  identity: DeviceIdentity,
  config: SessionConfig,
  transport: T,
  observer: O,
  state: ConnectionState,
  options: ConnectOptions,
  link: Option<T::Handle>,
  services: Vec<GattService>,
  pending: Option<PendingOperation>,
  mtu: Option<Mtu>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConnectionState {
  Disconnected,
  Connecting,
  Connected,
  Discovering,
  Ready,

  /// Transient state while the link is being torn down.  Teardown completes before control
  /// returns to the caller, so this is only visible to the transport's `disconnect`.
  Disconnecting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::manual_non_exhaustive)]
pub struct ConnectOptions {
  /// Emit [PeripheralEvent::Connected] once the link is up.
  pub notify_on_connect: bool,

  /// Emit [PeripheralEvent::Disconnected] when the link goes down cleanly.
  pub notify_on_disconnect: bool,

  /// Passed through to the transport: let the stack connect whenever the device shows up
  /// rather than failing the attempt when it is not in range.
  pub auto_connect: bool,

  /// Passed through to the transport, which may or may not request it.
  pub preferred_mtu: Option<Mtu>,

  // Not using #[non_exhaustive] because it doesn't support construction using
  // `..Default::default()`.
  #[doc(hidden)]
  pub _non_exhaustive: (),
}

impl Default for ConnectOptions {
  fn default() -> Self {
    Self {
      notify_on_connect: true,
      notify_on_disconnect: true,
      auto_connect: false,
      preferred_mtu: None,
      _non_exhaustive: (),
    }
  }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[allow(clippy::manual_non_exhaustive)]
pub struct SessionConfig {
  pub write_type_policy: WriteTypePolicy,

  #[doc(hidden)]
  pub _non_exhaustive: (),
}

/// Which write type actually reaches the transport.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum WriteTypePolicy {
  /// Every write goes out as [WriteType::WithoutResponse] whatever the caller asked for.  This
  /// is the long standing behaviour existing integrations depend on.
  #[default]
  ForceWithoutResponse,

  /// Use the write type passed to [PeripheralSession::write_value].
  HonorCaller,
}

impl WriteTypePolicy {
  fn apply(self, requested: WriteType) -> WriteType {
    match self {
      WriteTypePolicy::ForceWithoutResponse => WriteType::WithoutResponse,
      WriteTypePolicy::HonorCaller => requested,
    }
  }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OperationKind {
  DiscoverServices,
  Read,
  Write,
}

/// The single in-flight GATT request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
  pub kind: OperationKind,
  pub characteristic: Option<AttributeHandle>,
  pub payload: Option<Vec<u8>>,
  pub issued_at: Instant,
}

impl PendingOperation {
  fn new(kind: OperationKind, characteristic: Option<AttributeHandle>, payload: Option<Vec<u8>>) -> Self {
    Self {
      kind,
      characteristic,
      payload,
      issued_at: Instant::now(),
    }
  }

  fn completes(&self, kind: OperationKind, characteristic: AttributeHandle) -> bool {
    self.kind == kind && self.characteristic == Some(characteristic)
  }
}

type SessionResult<T, E> = Result<T, SessionError<E>>;

impl<T: GattTransport, O: PeripheralObserver> PeripheralSession<T, O> {
  pub fn new(identity: DeviceIdentity, transport: T, observer: O) -> Self {
    Self::with_config(identity, SessionConfig::default(), transport, observer)
  }

  pub fn with_config(identity: DeviceIdentity, config: SessionConfig, transport: T, observer: O) -> Self {
    Self {
      identity,
      config,
      transport,
      observer,
      state: ConnectionState::Disconnected,
      options: ConnectOptions::default(),
      link: None,
      services: Vec::new(),
      pending: None,
      mtu: None,
    }
  }

  pub fn identity(&self) -> &DeviceIdentity {
    &self.identity
  }

  pub fn name(&self) -> Option<String> {
    self.identity.name()
  }

  pub fn address(&self) -> BluetoothAddress {
    self.identity.address()
  }

  pub fn advertised_service_uuids(&self) -> Vec<UUID> {
    self.identity.advertised_service_uuids()
  }

  pub fn state(&self) -> ConnectionState {
    self.state
  }

  pub fn pending_operation(&self) -> Option<&PendingOperation> {
    self.pending.as_ref()
  }

  /// MTU last reported by the transport for the current connection.
  pub fn mtu(&self) -> Option<Mtu> {
    self.mtu
  }

  /// Copy of the discovered topology.  Later reads and notifications do not show up in the
  /// returned value.
  pub fn services(&self) -> Vec<GattService> {
    self.services.clone()
  }

  /// Copy of the cached value of a characteristic, if it has been read or notified yet.
  pub fn characteristic_value(&self, characteristic: AttributeHandle) -> Option<Vec<u8>> {
    self.services
        .iter()
        .find_map(|s| s.characteristic(characteristic))
        .and_then(|c| c.value.clone())
  }

  pub fn connect(&mut self, options: ConnectOptions) -> SessionResult<(), T::SystemError> {
    if self.state != ConnectionState::Disconnected {
      return Err(SessionError::InvalidState { operation: "connect", state: self.state });
    }

    info!("Connecting to {}", self.identity.address());
    let link = self.transport.connect(&self.identity, &options).map_err(|e| {
      error!("Transport refused connect: {e:?}");
      SessionError::Transport(e)
    })?;
    debug!("Connection attempt handle={link:?}");

    self.options = options;
    self.link = Some(link);
    self.state = ConnectionState::Connecting;
    Ok(())
  }

  /// Tear down the connection.  Effective immediately: the session is `Disconnected` when this
  /// returns and any callback still in flight for the old connection is ignored.  No event is
  /// emitted.
  pub fn disconnect_peripheral(&mut self) -> SessionResult<(), T::SystemError> {
    if self.link.is_none() {
      return Err(SessionError::InvalidState { operation: "disconnect", state: self.state });
    }
    info!("Disconnecting from {}", self.identity.address());
    self.teardown();
    Ok(())
  }

  pub fn discover_services(&mut self) -> SessionResult<(), T::SystemError> {
    let link = match (self.state, &self.link) {
      (ConnectionState::Connected | ConnectionState::Ready, Some(link)) => link,
      _ => return Err(SessionError::InvalidState { operation: "discover services", state: self.state }),
    };
    if let Some(pending) = &self.pending {
      return Err(SessionError::OperationPending(pending.kind));
    }

    self.transport.discover_services(link).map_err(|e| {
      error!("Transport refused service discovery: {e:?}");
      SessionError::Transport(e)
    })?;
    debug!("Discovering services");
    self.pending = Some(PendingOperation::new(OperationKind::DiscoverServices, None, None));
    self.state = ConnectionState::Discovering;
    Ok(())
  }

  /// Purely local: reports the characteristics already cached for `service`.  Emits
  /// [PeripheralEvent::CharacteristicsDiscoveredForService] if there is at least one and
  /// nothing otherwise.
  pub fn discover_characteristics_for_service(&mut self, service: AttributeHandle) -> SessionResult<(), T::SystemError> {
    let service = self.services
        .iter()
        .find(|s| s.handle == service)
        .ok_or(SessionError::UnknownService(service))?;

    if service.characteristics.is_empty() {
      debug!("Service {} has no characteristics", service.uuid);
      return Ok(());
    }
    self.observer.on_event(PeripheralEvent::CharacteristicsDiscoveredForService {
      peripheral: &self.identity,
      service,
    });
    Ok(())
  }

  /// Arm or disarm value-changed delivery for `characteristic`.  Immediate and silent; does
  /// not occupy the in-flight slot.
  pub fn set_notify(&mut self, enabled: bool, characteristic: AttributeHandle) -> SessionResult<(), T::SystemError> {
    let link = self.ready_link("set notify", characteristic)?;
    if let Some((s, c)) = self.locate(characteristic) {
      if !self.services[s].characteristics[c].can_notify() {
        warn!("{characteristic} does not advertise notify or indicate");
      }
    }
    self.transport.set_notification(&link, characteristic, enabled).map_err(|e| {
      error!("Transport refused notification toggle: {e:?}");
      SessionError::Transport(e)
    })?;
    debug!("Notifications for {characteristic} enabled={enabled}");
    Ok(())
  }

  pub fn read_value(&mut self, characteristic: AttributeHandle) -> SessionResult<(), T::SystemError> {
    let link = self.idle_ready_link("read", characteristic)?;
    self.transport.read_characteristic(&link, characteristic).map_err(|e| {
      error!("Transport refused read: {e:?}");
      SessionError::Transport(e)
    })?;
    debug!("Reading {characteristic}");
    self.pending = Some(PendingOperation::new(OperationKind::Read, Some(characteristic), None));
    Ok(())
  }

  /// Write `value` to `characteristic`.  Unless the session was configured with
  /// [WriteTypePolicy::HonorCaller], `write_type` is ignored and the write goes out without
  /// response.
  pub fn write_value(
      &mut self,
      value: &[u8],
      characteristic: AttributeHandle,
      write_type: WriteType,
  ) -> SessionResult<(), T::SystemError> {
    let effective = self.config.write_type_policy.apply(write_type);
    if effective != write_type {
      debug!("Overriding requested {write_type:?} with {effective:?}");
    }

    let link = self.idle_ready_link("write", characteristic)?;
    self.transport.write_characteristic(&link, characteristic, value, effective).map_err(|e| {
      error!("Transport refused write: {e:?}");
      SessionError::Transport(e)
    })?;
    debug!("Writing {} bytes to {characteristic}", value.len());
    self.pending = Some(PendingOperation::new(OperationKind::Write, Some(characteristic), Some(value.to_vec())));
    Ok(())
  }

  /// [Self::write_value] for a base64 encoded payload.  Trailing `=` padding is optional.
  /// Nothing is sent if `encoded` does not decode.
  pub fn write_value_from_encoded_text(
      &mut self,
      encoded: &str,
      characteristic: AttributeHandle,
  ) -> SessionResult<(), T::SystemError> {
    let value = decode_base64(encoded).map_err(SessionError::Decode)?;
    self.write_value(&value, characteristic, WriteType::WithoutResponse)
  }

  /// Single entry point for everything the transport reports.  Events tagged with a handle
  /// other than the current connection's are dropped without touching any state.
  pub fn handle_event(&mut self, event: TransportEvent<T::Handle>) {
    trace!("event: {event:?}");
    if self.link.as_ref() != Some(event.handle()) {
      debug!("Dropping stale callback for handle={:?}", event.handle());
      return;
    }

    match event {
      TransportEvent::ConnectionStateChanged { status, state, .. } => {
        self.on_connection_state_changed(status, state);
      }
      TransportEvent::ServicesDiscovered { services, .. } => {
        if self.state != ConnectionState::Discovering {
          warn!("Ignoring service discovery result while {:?}", self.state);
          return;
        }
        self.pending = None;
        self.services = services.into_iter().map(GattService::from).collect();
        self.state = ConnectionState::Ready;
        info!("Discovered {} services", self.services.len());
        self.observer.on_event(PeripheralEvent::ServicesDiscovered {
          peripheral: &self.identity,
          services: &self.services,
        });
      }
      TransportEvent::MtuChanged { mtu, .. } => {
        info!("MTU changed: mtu={mtu}");
        self.mtu = Some(mtu);
        self.observer.on_event(PeripheralEvent::MtuChanged { peripheral: &self.identity, mtu });
      }
      TransportEvent::CharacteristicRead { characteristic, result, .. } => {
        if !self.take_pending(OperationKind::Read, characteristic) {
          return;
        }
        let Some((s, c)) = self.locate(characteristic) else {
          warn!("Read completed for unknown characteristic {characteristic}");
          return;
        };
        if let Ok(value) = &result {
          self.services[s].characteristics[c].value = Some(value.clone());
        } else {
          debug!("Read of {characteristic} failed: {result:?}");
        }
        let service = &self.services[s];
        self.observer.on_event(PeripheralEvent::CharacteristicRead {
          peripheral: &self.identity,
          service,
          characteristic: &service.characteristics[c],
          result: result.as_deref().map_err(|e| *e),
        });
      }
      TransportEvent::CharacteristicWritten { characteristic, result, .. } => {
        if !self.take_pending(OperationKind::Write, characteristic) {
          return;
        }
        let Some((s, c)) = self.locate(characteristic) else {
          warn!("Write completed for unknown characteristic {characteristic}");
          return;
        };
        if let Err(e) = &result {
          debug!("Write to {characteristic} failed: {e}");
        }
        let service = &self.services[s];
        self.observer.on_event(PeripheralEvent::CharacteristicWritten {
          peripheral: &self.identity,
          service,
          characteristic: &service.characteristics[c],
          result,
        });
      }
      TransportEvent::CharacteristicChanged { characteristic, value, .. } => {
        let Some((s, c)) = self.locate(characteristic) else {
          warn!("Value changed for unknown characteristic {characteristic}");
          return;
        };
        let hex = data_encoding::HEXUPPER.encode(&value);
        self.services[s].characteristics[c].value = Some(value);

        let service = &self.services[s];
        self.observer.on_event(PeripheralEvent::CharacteristicChanged {
          peripheral: &self.identity,
          service,
          characteristic: &service.characteristics[c],
        });
        if !hex.is_empty() {
          self.observer.on_event(PeripheralEvent::CharacteristicChangedRaw {
            peripheral: &self.identity,
            hex: &hex,
          });
        }
      }
    }
  }

  fn on_connection_state_changed(&mut self, status: Result<(), BluetoothError>, state: LinkState) {
    match (status, state) {
      (Ok(()), LinkState::Connected) => {
        if self.state != ConnectionState::Connecting {
          warn!("Ignoring connected report while {:?}", self.state);
          return;
        }
        info!("Connected to {}", self.identity.address());
        self.state = ConnectionState::Connected;
        if self.options.notify_on_connect {
          self.observer.on_event(PeripheralEvent::Connected { peripheral: &self.identity });
        }
      }
      (Ok(()), LinkState::Disconnected) => {
        info!("Disconnected from {}", self.identity.address());
        self.teardown();
        if self.options.notify_on_disconnect {
          self.observer.on_event(PeripheralEvent::Disconnected { peripheral: &self.identity });
        }
      }
      (Err(status), _) => {
        let error = if self.state == ConnectionState::Connecting {
          ConnectionError::ConnectFailure(status)
        } else {
          ConnectionError::UnexpectedDisconnect(status)
        };
        warn!("Connection to {} failed: {error:?}", self.identity.address());
        self.teardown();
        self.observer.on_event(PeripheralEvent::ConnectionError { peripheral: &self.identity, error });
      }
    }
  }

  /// The one way back to `Disconnected`, for local and remote disconnects alike.
  fn teardown(&mut self) {
    self.state = ConnectionState::Disconnecting;
    if let Some(link) = self.link.take() {
      self.transport.disconnect(&link);
    }
    if let Some(pending) = self.pending.take() {
      debug!("Abandoning in-flight {:?}", pending.kind);
    }
    self.services.clear();
    self.mtu = None;
    self.state = ConnectionState::Disconnected;
  }

  fn take_pending(&mut self, kind: OperationKind, characteristic: AttributeHandle) -> bool {
    if !matches!(&self.pending, Some(pending) if pending.completes(kind, characteristic)) {
      warn!("Unexpected {kind:?} completion for {characteristic}, pending={:?}", self.pending);
      return false;
    }
    if let Some(pending) = self.pending.take() {
      trace!("{kind:?} completed after {:?}", pending.issued_at.elapsed());
    }
    true
  }

  fn locate(&self, characteristic: AttributeHandle) -> Option<(usize, usize)> {
    self.services.iter().enumerate().find_map(|(s, service)| {
      service.characteristics
          .iter()
          .position(|c| c.handle == characteristic)
          .map(|c| (s, c))
    })
  }

  fn ready_link(&self, operation: &'static str, characteristic: AttributeHandle) -> SessionResult<T::Handle, T::SystemError> {
    let link = match (self.state, &self.link) {
      (ConnectionState::Ready, Some(link)) => link.clone(),
      _ => return Err(SessionError::InvalidState { operation, state: self.state }),
    };
    if self.locate(characteristic).is_none() {
      return Err(SessionError::UnknownCharacteristic(characteristic));
    }
    Ok(link)
  }

  fn idle_ready_link(&self, operation: &'static str, characteristic: AttributeHandle) -> SessionResult<T::Handle, T::SystemError> {
    let link = self.ready_link(operation, characteristic)?;
    if let Some(pending) = &self.pending {
      return Err(SessionError::OperationPending(pending.kind));
    }
    Ok(link)
  }
}

fn decode_base64(encoded: &str) -> Result<Vec<u8>, data_encoding::DecodeError> {
  data_encoding::BASE64.decode(encoded.as_bytes()).or_else(|e| match e.kind {
    data_encoding::DecodeKind::Length => data_encoding::BASE64_NOPAD.decode(encoded.as_bytes()),
    _ => Err(e),
  })
}
