//! Runs a [PeripheralSession] inside its own tokio task so callers and the transport's callback
//! context never touch it directly.  Caller requests and transport events share one channel,
//! which is what keeps the single in-flight operation and stale callback checks sound when the
//! BLE stack calls back from another thread.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::{mpsc, oneshot};

use crate::bluetooth_address::BluetoothAddress;
use crate::descriptors::{AttributeHandle, GattService, UUID};
use crate::device_identity::DeviceIdentity;
use crate::mtu::Mtu;
use crate::peripheral_observer::{OwnedPeripheralEvent, PeripheralEvent, PeripheralObserver};
use crate::peripheral_session::{ConnectOptions, ConnectionState, OperationKind, PeripheralSession, SessionConfig};
use crate::session_error::SessionError;
use crate::transport::{GattTransport, TransportEvent, WriteType};

/// Build the transport (handing it the sink it reports through), wrap it in a session and
/// start driving that session on a new task.  The task runs until every [SessionHandle] clone
/// is dropped, disconnecting first if a link is still up.
///
/// Must be called from within a tokio runtime.
pub fn spawn<T, O, F>(
    identity: DeviceIdentity,
    config: SessionConfig,
    observer: O,
    make_transport: F,
) -> SessionHandle<T::Handle, T::SystemError>
where
    T: GattTransport + Send + 'static,
    T::Handle: Send + 'static,
    T::SystemError: Send + 'static,
    O: PeripheralObserver + Send + 'static,
    F: FnOnce(TransportSink<T::Handle, T::SystemError>) -> T,
{
  let (tx, rx) = mpsc::unbounded_channel();
  let transport = make_transport(TransportSink { tx: tx.clone() });
  let session = PeripheralSession::with_config(identity.clone(), config, transport, observer);
  tokio::spawn(run_event_loop(session, rx));

  SessionHandle {
    inner: Arc::new(HandleInner { tx }),
    identity: Arc::new(identity),
  }
}

/// Forwards events as [OwnedPeripheralEvent]s, which is usually what a task-driven session
/// wants for an observer.
impl PeripheralObserver for mpsc::UnboundedSender<OwnedPeripheralEvent> {
  fn on_event(&mut self, event: PeripheralEvent<'_>) {
    if self.send(event.to_owned_event()).is_err() {
      warn!("Observer channel closed, dropping event");
    }
  }
}

type Reply<E> = oneshot::Sender<Result<(), SessionError<E>>>;

enum Event<H, E> {
  Transport(TransportEvent<H>),
  Connect(ConnectOptions, Reply<E>),
  Disconnect(Reply<E>),
  DiscoverServices(Reply<E>),
  DiscoverCharacteristics(AttributeHandle, Reply<E>),
  SetNotify(bool, AttributeHandle, Reply<E>),
  Read(AttributeHandle, Reply<E>),
  Write(Vec<u8>, AttributeHandle, WriteType, Reply<E>),
  WriteEncoded(String, AttributeHandle, Reply<E>),
  Snapshot(oneshot::Sender<SessionSnapshot>),
  OnHandleDrop,
}

/// Where the transport delivers completions and notifications.  Cheap to clone and safe to
/// use from any thread.
pub struct TransportSink<H, E> {
  tx: mpsc::UnboundedSender<Event<H, E>>,
}

impl<H, E> TransportSink<H, E> {
  /// Queue `event` for the session.  Returns false once the session task is gone.
  pub fn deliver(&self, event: TransportEvent<H>) -> bool {
    self.tx.send(Event::Transport(event)).is_ok()
  }
}

impl<H, E> Clone for TransportSink<H, E> {
  fn clone(&self) -> Self {
    Self { tx: self.tx.clone() }
  }
}

impl<H, E> Debug for TransportSink<H, E> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TransportSink").finish_non_exhaustive()
  }
}

struct HandleInner<H, E> {
  tx: mpsc::UnboundedSender<Event<H, E>>,
}

impl<H, E> Drop for HandleInner<H, E> {
  fn drop(&mut self) {
    let _ = self.tx.send(Event::OnHandleDrop);
  }
}

/// Caller side of a task-driven session.  Each method resolves once the session has accepted
/// or rejected the request; outcomes still arrive through the observer.
pub struct SessionHandle<H, E> {
  inner: Arc<HandleInner<H, E>>,
  identity: Arc<DeviceIdentity>,
}

impl<H, E> Clone for SessionHandle<H, E> {
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
      identity: self.identity.clone(),
    }
  }
}

impl<H, E> Debug for SessionHandle<H, E> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SessionHandle")
        .field("identity", &self.identity)
        .finish_non_exhaustive()
  }
}

impl<H, E> SessionHandle<H, E> {
  pub fn name(&self) -> Option<String> {
    self.identity.name()
  }

  pub fn address(&self) -> BluetoothAddress {
    self.identity.address()
  }

  pub fn advertised_service_uuids(&self) -> Vec<UUID> {
    self.identity.advertised_service_uuids()
  }

  pub async fn connect(&self, options: ConnectOptions) -> Result<(), SessionError<E>> {
    self.request(|reply| Event::Connect(options, reply)).await
  }

  pub async fn disconnect_peripheral(&self) -> Result<(), SessionError<E>> {
    self.request(Event::Disconnect).await
  }

  pub async fn discover_services(&self) -> Result<(), SessionError<E>> {
    self.request(Event::DiscoverServices).await
  }

  pub async fn discover_characteristics_for_service(&self, service: AttributeHandle) -> Result<(), SessionError<E>> {
    self.request(|reply| Event::DiscoverCharacteristics(service, reply)).await
  }

  pub async fn set_notify(&self, enabled: bool, characteristic: AttributeHandle) -> Result<(), SessionError<E>> {
    self.request(|reply| Event::SetNotify(enabled, characteristic, reply)).await
  }

  pub async fn read_value(&self, characteristic: AttributeHandle) -> Result<(), SessionError<E>> {
    self.request(|reply| Event::Read(characteristic, reply)).await
  }

  pub async fn write_value(
      &self,
      value: Vec<u8>,
      characteristic: AttributeHandle,
      write_type: WriteType,
  ) -> Result<(), SessionError<E>> {
    self.request(|reply| Event::Write(value, characteristic, write_type, reply)).await
  }

  pub async fn write_value_from_encoded_text(
      &self,
      encoded: impl Into<String>,
      characteristic: AttributeHandle,
  ) -> Result<(), SessionError<E>> {
    let encoded = encoded.into();
    self.request(|reply| Event::WriteEncoded(encoded, characteristic, reply)).await
  }

  /// Point-in-time copy of the session's state and topology.
  pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError<E>> {
    let (tx, rx) = oneshot::channel();
    self.inner.tx.send(Event::Snapshot(tx)).map_err(|_| SessionError::Closed)?;
    rx.await.map_err(|_| SessionError::Closed)
  }

  async fn request(&self, make: impl FnOnce(Reply<E>) -> Event<H, E>) -> Result<(), SessionError<E>> {
    let (tx, rx) = oneshot::channel();
    self.inner.tx.send(make(tx)).map_err(|_| SessionError::Closed)?;
    rx.await.map_err(|_| SessionError::Closed)?
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
  pub state: ConnectionState,
  pub services: Vec<GattService>,
  pub pending: Option<OperationKind>,
  pub mtu: Option<Mtu>,
}

impl SessionSnapshot {
  fn of<T: GattTransport, O: PeripheralObserver>(session: &PeripheralSession<T, O>) -> Self {
    Self {
      state: session.state(),
      services: session.services(),
      pending: session.pending_operation().map(|p| p.kind),
      mtu: session.mtu(),
    }
  }

  pub fn characteristic_value(&self, characteristic: AttributeHandle) -> Option<&[u8]> {
    self.services
        .iter()
        .find_map(|s| s.characteristic(characteristic))
        .and_then(|c| c.value.as_deref())
  }
}

async fn run_event_loop<T, O>(
    mut session: PeripheralSession<T, O>,
    mut rx: mpsc::UnboundedReceiver<Event<T::Handle, T::SystemError>>,
)
where
    T: GattTransport,
    O: PeripheralObserver,
{
  while let Some(event) = rx.recv().await {
    match event {
      Event::Transport(event) => session.handle_event(event),
      Event::Connect(options, reply) => {
        let _ = reply.send(session.connect(options));
      }
      Event::Disconnect(reply) => {
        let _ = reply.send(session.disconnect_peripheral());
      }
      Event::DiscoverServices(reply) => {
        let _ = reply.send(session.discover_services());
      }
      Event::DiscoverCharacteristics(service, reply) => {
        let _ = reply.send(session.discover_characteristics_for_service(service));
      }
      Event::SetNotify(enabled, characteristic, reply) => {
        let _ = reply.send(session.set_notify(enabled, characteristic));
      }
      Event::Read(characteristic, reply) => {
        let _ = reply.send(session.read_value(characteristic));
      }
      Event::Write(value, characteristic, write_type, reply) => {
        let _ = reply.send(session.write_value(&value, characteristic, write_type));
      }
      Event::WriteEncoded(encoded, characteristic, reply) => {
        let _ = reply.send(session.write_value_from_encoded_text(&encoded, characteristic));
      }
      Event::Snapshot(reply) => {
        let _ = reply.send(SessionSnapshot::of(&session));
      }
      Event::OnHandleDrop => {
        debug!("Session handle dropped, shutting down!");
        break;
      }
    }
  }

  if session.state() != ConnectionState::Disconnected {
    let _ = session.disconnect_peripheral();
  }
}
