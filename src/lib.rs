pub mod advertisement;
pub mod att_error;
pub mod bluetooth_address;
pub mod bluetooth_error;
pub mod descriptors;
pub mod device_identity;
pub mod mtu;
pub mod peripheral_observer;
pub mod peripheral_session;
pub mod session_error;
#[cfg(feature = "tokio")]
pub mod session_task;
pub mod transport;

pub mod prelude {
  pub use crate::advertisement::*;
  pub use crate::att_error::*;
  pub use crate::bluetooth_address::*;
  pub use crate::bluetooth_error::*;
  pub use crate::descriptors::*;
  pub use crate::device_identity::*;
  pub use crate::mtu::*;
  pub use crate::peripheral_observer::*;
  pub use crate::peripheral_session::*;
  pub use crate::session_error::*;
  pub use crate::transport::*;
}
