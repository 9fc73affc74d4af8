//! Actuator server wire format.
//!
//! Every frame is a JSON array of single-key envelopes, e.g.
//! `[{"VibrateCmd":{"Id":4,"DeviceIndex":0,"Speeds":[{"Index":0,"Speed":0.5}]}}]`.
//! Field names are PascalCase.

use crate::error::{HapticError, Result};
use serde::Serialize;
use serde_json::{Map, Value};

/// Messages the client sends.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all_fields = "PascalCase")]
pub enum ClientMessage {
    RequestServerInfo {
        id: u32,
        client_name: String,
        message_version: u32,
    },
    StartScanning {
        id: u32,
    },
    RequestDeviceList {
        id: u32,
    },
    VibrateCmd {
        id: u32,
        device_index: u32,
        speeds: Vec<SpeedCommand>,
    },
    ScalarCmd {
        id: u32,
        device_index: u32,
        scalars: Vec<ScalarCommand>,
    },
    LinearCmd {
        id: u32,
        device_index: u32,
        vectors: Vec<VectorCommand>,
    },
    RotateCmd {
        id: u32,
        device_index: u32,
        rotations: Vec<RotationCommand>,
    },
    StopDeviceCmd {
        id: u32,
        device_index: u32,
    },
}

impl ClientMessage {
    pub fn id(&self) -> u32 {
        match self {
            Self::RequestServerInfo { id, .. }
            | Self::StartScanning { id }
            | Self::RequestDeviceList { id }
            | Self::VibrateCmd { id, .. }
            | Self::ScalarCmd { id, .. }
            | Self::LinearCmd { id, .. }
            | Self::RotateCmd { id, .. }
            | Self::StopDeviceCmd { id, .. } => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SpeedCommand {
    pub index: u32,
    pub speed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScalarCommand {
    pub index: u32,
    pub scalar: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actuator_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct VectorCommand {
    pub index: u32,
    pub position: f64,
    /// Milliseconds.
    pub duration: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RotationCommand {
    pub index: u32,
    pub speed: f64,
    pub clockwise: bool,
}

/// Encode one message as a frame.
pub fn encode(message: &ClientMessage) -> Result<String> {
    Ok(serde_json::to_string(&[message])?)
}

/// A device as reported in a device list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceInfo {
    pub device_index: u32,
    pub device_name: Option<String>,
    pub is_sensor: bool,
    /// Names of the messages the device accepts.
    pub message_names: Vec<String>,
}

/// Messages the server sends that the session reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    ServerInfo {
        server_name: Option<String>,
        message_version: Option<u32>,
    },
    DeviceList {
        devices: Vec<DeviceInfo>,
    },
    /// A device appeared or disappeared; the list should be requested again.
    DeviceChanged,
    Ok {
        id: Option<u32>,
    },
    Error {
        message: String,
        code: Option<i64>,
    },
    /// Anything else, by envelope key.
    Other(String),
}

/// Decode a frame into its messages.
///
/// A frame that is not a JSON array is a protocol error. Envelopes that are
/// not objects are skipped.
pub fn decode(frame: &str) -> Result<Vec<ServerMessage>> {
    let value: Value = serde_json::from_str(frame)?;
    let Value::Array(envelopes) = value else {
        return Err(HapticError::Protocol {
            message: "frame is not a JSON array".to_string(),
        });
    };

    Ok(envelopes
        .iter()
        .filter_map(Value::as_object)
        .flat_map(|envelope| envelope.iter().map(|(key, body)| decode_envelope(key, body)))
        .collect())
}

fn decode_envelope(key: &str, body: &Value) -> ServerMessage {
    match key {
        "ServerInfo" => ServerMessage::ServerInfo {
            server_name: body
                .get("ServerName")
                .and_then(Value::as_str)
                .map(str::to_string),
            message_version: body
                .get("MessageVersion")
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok()),
        },
        "DeviceList" => ServerMessage::DeviceList {
            devices: body
                .get("Devices")
                .and_then(Value::as_array)
                .map(|list| list.iter().filter_map(decode_device).collect())
                .unwrap_or_default(),
        },
        "DeviceAdded" | "DeviceRemoved" => ServerMessage::DeviceChanged,
        "Ok" => ServerMessage::Ok {
            id: body
                .get("Id")
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok()),
        },
        "Error" => ServerMessage::Error {
            message: body
                .get("ErrorMessage")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| body.to_string()),
            code: body.get("ErrorCode").and_then(Value::as_i64),
        },
        other => ServerMessage::Other(other.to_string()),
    }
}

fn decode_device(value: &Value) -> Option<DeviceInfo> {
    let device_index = value
        .get("DeviceIndex")
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())?;

    Some(DeviceInfo {
        device_index,
        device_name: value
            .get("DeviceName")
            .and_then(Value::as_str)
            .map(str::to_string),
        is_sensor: value
            .get("IsSensor")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        message_names: value
            .get("DeviceMessages")
            .map(message_names)
            .unwrap_or_default(),
    })
}

/// Flatten the `DeviceMessages` shapes into a list of message names.
///
/// Accepts an object keyed by message name, or an array of names and/or
/// objects keyed by message name.
pub fn message_names(value: &Value) -> Vec<String> {
    fn keys(map: &Map<String, Value>) -> impl Iterator<Item = String> + '_ {
        map.keys().cloned()
    }

    match value {
        Value::Object(map) => keys(map).collect(),
        Value::Array(items) => items
            .iter()
            .flat_map(|item| match item {
                Value::String(name) => vec![name.clone()],
                Value::Object(map) => keys(map).collect(),
                _ => Vec::new(),
            })
            .collect(),
        _ => Vec::new(),
    }
}
