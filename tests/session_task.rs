#![cfg(feature = "tokio")]

use std::sync::{Arc, Mutex};

use ble_central_session::prelude::*;
use ble_central_session::session_task::{self, SessionHandle, TransportSink};
use tokio::sync::mpsc;

const SERVICE: u16 = 0x0001;
const ECHO: u16 = 0x0003;

/// Android's catch-all `GATT_ERROR`.
const GATT_ERROR: u8 = 133;

fn handle(raw: u16) -> AttributeHandle {
  AttributeHandle::new(raw).unwrap()
}

#[derive(Debug, Clone, PartialEq)]
enum Request {
  Connect,
  Disconnect(u32),
  Write(AttributeHandle, Vec<u8>, WriteType),
}

/// Pretends to be a stack that answers every request straight away from "another context" by
/// pushing into the sink, and echoes the last written value back on reads.
struct EchoTransport {
  sink: TransportSink<u32, String>,
  log: Arc<Mutex<Vec<Request>>>,
  next: u32,
  last_value: Vec<u8>,
}

impl GattTransport for EchoTransport {
  type SystemError = String;
  type Handle = u32;

  fn connect(&mut self, _identity: &DeviceIdentity, _options: &ConnectOptions) -> Result<u32, String> {
    self.next += 1;
    self.log.lock().unwrap().push(Request::Connect);
    self.sink.deliver(TransportEvent::ConnectionStateChanged {
      handle: self.next,
      status: link_status(0x00),
      state: LinkState::Connected,
    });
    Ok(self.next)
  }

  fn disconnect(&mut self, handle: &u32) {
    self.log.lock().unwrap().push(Request::Disconnect(*handle));
  }

  fn discover_services(&mut self, link: &u32) -> Result<(), String> {
    self.sink.deliver(TransportEvent::ServicesDiscovered {
      handle: *link,
      services: vec![DiscoveredService {
        handle: handle(SERVICE),
        uuid: UUID::Long(0xFEEDC0DE),
        service_type: GattServiceType::Primary,
        characteristics: vec![DiscoveredCharacteristic {
          handle: handle(ECHO),
          uuid: UUID::Long(0xF00DC0DE00001),
          // Read | WriteNoResponse | Notify
          properties: GattCharacteristicProperty::from_bits(0x16),
        }],
      }],
    });
    Ok(())
  }

  fn read_characteristic(&mut self, handle: &u32, characteristic: AttributeHandle) -> Result<(), String> {
    let status = if self.last_value.is_empty() { GATT_ERROR } else { 0x00 };
    self.sink.deliver(TransportEvent::CharacteristicRead {
      handle: *handle,
      characteristic,
      result: att_status(status).map(|()| self.last_value.clone()),
    });
    Ok(())
  }

  fn write_characteristic(
      &mut self,
      handle: &u32,
      characteristic: AttributeHandle,
      value: &[u8],
      write_type: WriteType,
  ) -> Result<(), String> {
    self.log.lock().unwrap().push(Request::Write(characteristic, value.to_vec(), write_type));
    self.last_value = value.to_vec();
    self.sink.deliver(TransportEvent::CharacteristicWritten {
      handle: *handle,
      characteristic,
      result: att_status(0x00),
    });
    Ok(())
  }

  fn set_notification(&mut self, _handle: &u32, _characteristic: AttributeHandle, _enabled: bool) -> Result<(), String> {
    Ok(())
  }
}

struct Fixture {
  session: SessionHandle<u32, String>,
  sink: TransportSink<u32, String>,
  events: mpsc::UnboundedReceiver<OwnedPeripheralEvent>,
  log: Arc<Mutex<Vec<Request>>>,
}

fn start() -> Fixture {
  let _ = env_logger::builder().is_test(true).try_init();
  let (events_tx, events) = mpsc::unbounded_channel();
  let log = Arc::new(Mutex::new(Vec::new()));
  let transport_log = log.clone();
  let mut captured = None;

  let identity = DeviceIdentity::new("C0:FF:EE:00:00:02".parse().unwrap()).with_name("echo");
  let session = session_task::spawn(identity, SessionConfig::default(), events_tx, |sink: TransportSink<u32, String>| {
    captured = Some(sink.clone());
    EchoTransport { sink, log: transport_log, next: 0, last_value: Vec::new() }
  });

  Fixture { session, sink: captured.unwrap(), events, log }
}

async fn ready(fixture: &mut Fixture) {
  fixture.session.connect(ConnectOptions::default()).await.unwrap();
  assert_eq!(fixture.events.recv().await, Some(OwnedPeripheralEvent::Connected));
  fixture.session.discover_services().await.unwrap();
  assert!(matches!(
    fixture.events.recv().await,
    Some(OwnedPeripheralEvent::ServicesDiscovered(services)) if services.len() == 1
  ));
}

#[tokio::test]
async fn write_then_read_round_trip() {
  let mut fixture = start();
  ready(&mut fixture).await;

  fixture.session.write_value_from_encoded_text("AQID", handle(ECHO)).await.unwrap();
  assert!(matches!(
    fixture.events.recv().await,
    Some(OwnedPeripheralEvent::CharacteristicWritten { result: Ok(()), .. })
  ));
  assert!(fixture.log.lock().unwrap().contains(&Request::Write(
    handle(ECHO),
    vec![0x01, 0x02, 0x03],
    WriteType::WithoutResponse
  )));

  fixture.session.read_value(handle(ECHO)).await.unwrap();
  assert!(matches!(
    fixture.events.recv().await,
    Some(OwnedPeripheralEvent::CharacteristicRead { result: Ok(value), .. }) if value == vec![0x01, 0x02, 0x03]
  ));

  let snapshot = fixture.session.snapshot().await.unwrap();
  assert_eq!(snapshot.state, ConnectionState::Ready);
  assert_eq!(snapshot.pending, None);
  assert_eq!(snapshot.characteristic_value(handle(ECHO)), Some(&[0x01, 0x02, 0x03][..]));
}

#[tokio::test]
async fn stack_read_failure_is_reported_without_caching() {
  let mut fixture = start();
  ready(&mut fixture).await;

  fixture.session.read_value(handle(ECHO)).await.unwrap();
  assert!(matches!(
    fixture.events.recv().await,
    Some(OwnedPeripheralEvent::CharacteristicRead { result: Err(AttError::Unlikely), .. })
  ));

  let snapshot = fixture.session.snapshot().await.unwrap();
  assert_eq!(snapshot.pending, None);
  assert_eq!(snapshot.characteristic_value(handle(ECHO)), None);
}

#[tokio::test]
async fn precondition_errors_come_back_to_the_caller() {
  let fixture = start();
  assert!(matches!(
    fixture.session.read_value(handle(ECHO)).await,
    Err(SessionError::InvalidState { state: ConnectionState::Disconnected, .. })
  ));
  assert!(matches!(
    fixture.session.disconnect_peripheral().await,
    Err(SessionError::InvalidState { .. })
  ));
  assert_eq!(fixture.session.name().as_deref(), Some("echo"));
  assert_eq!(fixture.session.address().to_string(), "C0:FF:EE:00:00:02");
}

#[tokio::test]
async fn notifications_are_forwarded_as_hex() {
  let mut fixture = start();
  ready(&mut fixture).await;

  let snapshot = fixture.session.snapshot().await.unwrap();
  assert!(snapshot.services[0].characteristic(handle(ECHO)).is_some_and(|c| c.can_notify()));
  fixture.session.set_notify(true, handle(ECHO)).await.unwrap();

  assert!(fixture.sink.deliver(TransportEvent::CharacteristicChanged {
    handle: 1,
    characteristic: handle(ECHO),
    value: vec![0xde, 0xad],
  }));
  assert!(matches!(fixture.events.recv().await, Some(OwnedPeripheralEvent::CharacteristicChanged { .. })));
  assert_eq!(
    fixture.events.recv().await,
    Some(OwnedPeripheralEvent::CharacteristicChangedRaw("DEAD".to_owned()))
  );
}

#[tokio::test]
async fn stale_callbacks_after_disconnect_are_dropped() {
  let mut fixture = start();
  ready(&mut fixture).await;

  fixture.session.disconnect_peripheral().await.unwrap();
  fixture.sink.deliver(TransportEvent::CharacteristicRead {
    handle: 1,
    characteristic: handle(ECHO),
    result: Ok(vec![0xff]),
  });
  fixture.sink.deliver(TransportEvent::ConnectionStateChanged {
    handle: 1,
    status: Err(BluetoothError::ClosedLocally),
    state: LinkState::Disconnected,
  });

  // Processed in order, so by the time the snapshot answers both callbacks have been seen.
  let snapshot = fixture.session.snapshot().await.unwrap();
  assert_eq!(snapshot.state, ConnectionState::Disconnected);
  assert!(snapshot.services.is_empty());
  assert!(fixture.events.try_recv().is_err());
}

#[tokio::test]
async fn dropping_the_handle_disconnects() {
  let mut fixture = start();
  ready(&mut fixture).await;

  drop(fixture.session);
  // The observer is dropped with the task, which closes the event channel.
  while fixture.events.recv().await.is_some() {}

  assert_eq!(fixture.log.lock().unwrap().last(), Some(&Request::Disconnect(1)));
  assert!(!fixture.sink.deliver(TransportEvent::MtuChanged { handle: 1, mtu: Mtu::DEFAULT }));
}
