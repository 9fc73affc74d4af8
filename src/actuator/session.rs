//! Actuator session: device selection, capability checks and motion
//! primitives.
//!
//! The session never touches the socket. Outbound messages go to the sender
//! the connection task attaches; while detached they are dropped, the same as
//! writing to a closed socket.

use super::capabilities::{Capability, CapabilitySet, select_device};
use super::protocol::{
    ClientMessage, DeviceInfo, RotationCommand, ScalarCommand, ServerMessage, SpeedCommand,
    VectorCommand,
};
use crate::defaults::MESSAGE_VERSION;
use crate::error::HapticError;
use crate::pipeline::error::{Notifier, Severity};
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

/// Actuator type sent with oscillation scalar commands.
pub const OSCILLATE_ACTUATOR: &str = "Oscillate";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    AwaitingServerInfo,
    Ready,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::AwaitingServerInfo | Self::Ready)
    }
}

/// The default device and what it can do.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedDevice {
    pub index: u32,
    pub name: Option<String>,
    pub capabilities: CapabilitySet,
}

/// Which message family continuous levels currently go through.
///
/// Remembered so repeated updates and the final stop use the same encoding.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProtocolMode {
    #[default]
    None,
    Vibrate,
    Scalar { actuator_type: Option<String> },
}

/// Outcome of a motion primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Sent,
    /// No device is selected.
    NoDevice,
    /// The selected device lacks the capability.
    Unsupported(Capability),
}

#[derive(Debug, Default)]
struct SessionState {
    device: Option<SelectedDevice>,
    mode: ProtocolMode,
}

pub struct ActuatorSession {
    client_name: String,
    next_id: AtomicU32,
    state: Mutex<SessionState>,
    outbound: Mutex<Option<mpsc::UnboundedSender<ClientMessage>>>,
    connection: watch::Sender<ConnectionState>,
    notifier: Arc<dyn Notifier>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn clamp01(level: f64) -> f64 {
    if level.is_nan() {
        0.0
    } else {
        level.clamp(0.0, 1.0)
    }
}

impl ActuatorSession {
    pub fn new(client_name: impl Into<String>, notifier: Arc<dyn Notifier>) -> Self {
        let (connection, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            client_name: client_name.into(),
            next_id: AtomicU32::new(1),
            state: Mutex::new(SessionState::default()),
            outbound: Mutex::new(None),
            connection,
            notifier,
        }
    }

    // --- connection lifecycle ---

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    pub(crate) fn set_connecting(&self) {
        self.connection.send_replace(ConnectionState::Connecting);
    }

    /// A socket opened: route outbound messages to `sender` and greet the server.
    pub fn attach(&self, sender: mpsc::UnboundedSender<ClientMessage>) {
        *lock(&self.outbound) = Some(sender);
        self.connection
            .send_replace(ConnectionState::AwaitingServerInfo);
        let id = self.next_id();
        self.send(ClientMessage::RequestServerInfo {
            id,
            client_name: self.client_name.clone(),
            message_version: MESSAGE_VERSION,
        });
    }

    /// The socket closed or failed.
    pub fn detach(&self) {
        *lock(&self.outbound) = None;
        self.connection.send_replace(ConnectionState::Disconnected);
    }

    /// React to a message from the server.
    pub fn handle(&self, message: ServerMessage) {
        match message {
            ServerMessage::ServerInfo { server_name, .. } => {
                info!(
                    "Connected to actuator server {}",
                    server_name.as_deref().unwrap_or("(unnamed)")
                );
                self.connection.send_replace(ConnectionState::Ready);
                let id = self.next_id();
                self.send(ClientMessage::StartScanning { id });
                let id = self.next_id();
                self.send(ClientMessage::RequestDeviceList { id });
            }
            ServerMessage::DeviceList { devices } => {
                self.select_from(&devices);
            }
            ServerMessage::DeviceChanged => {
                let id = self.next_id();
                self.send(ClientMessage::RequestDeviceList { id });
            }
            ServerMessage::Error { message, code } => {
                error!("Actuator server error (code {:?}): {}", code, message);
            }
            ServerMessage::Ok { .. } => {}
            ServerMessage::Other(key) => debug!("Ignoring server message {}", key),
        }
    }

    /// Run device selection over a device list, replacing the current choice.
    pub fn select_from(&self, devices: &[DeviceInfo]) -> Option<SelectedDevice> {
        let selected = select_device(devices).map(|d| SelectedDevice {
            index: d.device_index,
            name: d.device_name.clone(),
            capabilities: CapabilitySet::from_message_names(&d.message_names),
        });

        match &selected {
            Some(device) => info!(
                "Selected device {} ({}): capabilities [{}]",
                device.index,
                device.name.as_deref().unwrap_or("unnamed"),
                device.capabilities
            ),
            None => info!("No actuator devices reported"),
        }

        let mut state = lock(&self.state);
        state.device = selected.clone();
        state.mode = ProtocolMode::None;
        selected
    }

    pub fn selected_device(&self) -> Option<SelectedDevice> {
        lock(&self.state).device.clone()
    }

    pub fn protocol_mode(&self) -> ProtocolMode {
        lock(&self.state).mode.clone()
    }

    // --- motion primitives ---

    pub fn vibrate(&self, level: f64) -> Dispatch {
        self.dispatch(Capability::Vibrate, "vibrate", |state, device, id| {
            state.mode = ProtocolMode::Vibrate;
            ClientMessage::VibrateCmd {
                id,
                device_index: device,
                speeds: vec![SpeedCommand {
                    index: 0,
                    speed: clamp01(level),
                }],
            }
        })
    }

    pub fn oscillate(&self, level: f64, actuator_index: u32) -> Dispatch {
        self.dispatch(Capability::Oscillate, "oscillate", |state, device, id| {
            state.mode = ProtocolMode::Scalar {
                actuator_type: Some(OSCILLATE_ACTUATOR.to_string()),
            };
            ClientMessage::ScalarCmd {
                id,
                device_index: device,
                scalars: vec![ScalarCommand {
                    index: actuator_index,
                    scalar: clamp01(level),
                    actuator_type: Some(OSCILLATE_ACTUATOR.to_string()),
                }],
            }
        })
    }

    /// Move to `position` over `duration_secs`.
    pub fn linear(&self, position: f64, duration_secs: f64) -> Dispatch {
        let millis = if duration_secs.is_finite() {
            (duration_secs.max(0.0) * 1000.0).round().min(f64::from(u32::MAX)) as u32
        } else {
            0
        };
        self.dispatch(Capability::Linear, "linear", |_, device, id| {
            ClientMessage::LinearCmd {
                id,
                device_index: device,
                vectors: vec![VectorCommand {
                    index: 0,
                    position: clamp01(position),
                    duration: millis,
                }],
            }
        })
    }

    pub fn rotate(&self, speed: f64, clockwise: bool) -> Dispatch {
        self.dispatch(Capability::Rotate, "rotate", |_, device, id| {
            ClientMessage::RotateCmd {
                id,
                device_index: device,
                rotations: vec![RotationCommand {
                    index: 0,
                    speed: clamp01(speed),
                    clockwise,
                }],
            }
        })
    }

    pub fn scalar(&self, level: f64, actuator_index: u32) -> Dispatch {
        self.dispatch(Capability::Scalar, "scalar", |_, device, id| {
            ClientMessage::ScalarCmd {
                id,
                device_index: device,
                scalars: vec![ScalarCommand {
                    index: actuator_index,
                    scalar: clamp01(level),
                    actuator_type: None,
                }],
            }
        })
    }

    /// Continuous level through whichever protocol is active.
    ///
    /// Stays on vibrate once chosen; otherwise prefers oscillation when the
    /// device takes scalar commands.
    pub fn apply_continuous(&self, level: f64) -> Dispatch {
        let use_vibrate = {
            let state = lock(&self.state);
            let Some(device) = &state.device else {
                return Dispatch::NoDevice;
            };
            state.mode == ProtocolMode::Vibrate
                || !device.capabilities.contains(Capability::Scalar)
        };
        if use_vibrate {
            self.vibrate(level)
        } else {
            self.oscillate(level, 0)
        }
    }

    /// Zero every output the device has and forget the protocol mode.
    pub fn stop_all(&self) -> Dispatch {
        let messages = {
            let mut state = lock(&self.state);
            let Some(device) = state.device.clone() else {
                return Dispatch::NoDevice;
            };
            let caps = device.capabilities;
            let mut messages = Vec::new();

            if caps.contains(Capability::Scalar) {
                let actuator_type = match &state.mode {
                    ProtocolMode::Scalar { actuator_type } => actuator_type.clone(),
                    _ => None,
                };
                messages.push(ClientMessage::ScalarCmd {
                    id: self.next_id(),
                    device_index: device.index,
                    scalars: vec![ScalarCommand {
                        index: 0,
                        scalar: 0.0,
                        actuator_type,
                    }],
                });
            }
            if caps.contains(Capability::Vibrate) {
                messages.push(ClientMessage::VibrateCmd {
                    id: self.next_id(),
                    device_index: device.index,
                    speeds: vec![SpeedCommand {
                        index: 0,
                        speed: 0.0,
                    }],
                });
            }
            if caps.contains(Capability::Stop) {
                messages.push(ClientMessage::StopDeviceCmd {
                    id: self.next_id(),
                    device_index: device.index,
                });
            }

            state.mode = ProtocolMode::None;
            messages
        };

        for message in messages {
            self.send(message);
        }
        Dispatch::Sent
    }

    fn dispatch<F>(&self, required: Capability, action: &str, build: F) -> Dispatch
    where
        F: FnOnce(&mut SessionState, u32, u32) -> ClientMessage,
    {
        let message = {
            let mut state = lock(&self.state);
            let Some(device) = &state.device else {
                return Dispatch::NoDevice;
            };
            if !device.capabilities.contains(required) {
                drop(state);
                let warning = HapticError::CapabilityMissing {
                    action: action.to_string(),
                };
                self.notifier.notify(Severity::Warning, &warning.to_string());
                return Dispatch::Unsupported(required);
            }
            let index = device.index;
            let id = self.next_id();
            build(&mut *state, index, id)
        };
        self.send(message);
        Dispatch::Sent
    }

    fn next_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn send(&self, message: ClientMessage) {
        let outbound = lock(&self.outbound);
        match outbound.as_ref() {
            Some(sender) if sender.send(message.clone()).is_ok() => {}
            _ => debug!("Not connected, dropping message {}", message.id()),
        }
    }
}
