//! Actuator server client: wire protocol, capabilities, session and
//! connection task.

pub mod capabilities;
pub mod connection;
pub mod protocol;
pub mod session;

pub use capabilities::{Capability, CapabilitySet, select_device};
pub use connection::{ConnectionHandle, spawn_connection};
pub use protocol::{ClientMessage, DeviceInfo, ServerMessage};
pub use session::{ActuatorSession, ConnectionState, Dispatch, ProtocolMode, SelectedDevice};
