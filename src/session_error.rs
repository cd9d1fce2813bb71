use crate::descriptors::AttributeHandle;
use crate::peripheral_session::{ConnectionState, OperationKind};

/// Synchronous failures returned straight to the caller.  Anything that goes wrong on the radio
/// after a request was issued is reported through the observer instead.
#[derive(Debug, thiserror::Error)]
pub enum SessionError<E> {
  #[error("{operation} is not allowed while {state:?}")]
  InvalidState {
    operation: &'static str,
    state: ConnectionState,
  },

  /// Only one GATT request may be outstanding per connection.
  #[error("a {0:?} operation is already in flight")]
  OperationPending(OperationKind),

  #[error("no discovered service with handle {0}")]
  UnknownService(AttributeHandle),

  #[error("no discovered characteristic with handle {0}")]
  UnknownCharacteristic(AttributeHandle),

  #[error("invalid base64 payload: {0}")]
  Decode(data_encoding::DecodeError),

  /// The transport refused to issue the request.
  #[error("transport error: {0:?}")]
  Transport(E),

  /// The task driving the session is gone.
  #[error("session task has shut down")]
  Closed,
}
