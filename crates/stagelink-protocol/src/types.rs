//! Envelope, payload, and command types for the stagelink protocol.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use stagelink_core::DeviceId;

use crate::error::{CommandError, ProtocolError, ProtocolResult};

/// Type tags carried in [`Envelope::kind`].
pub mod message_type {
    /// Client request to set a device's state.
    pub const CONTROL_DEVICE: &str = "control-device";
    /// Answer to `control-device`, including logical failures.
    pub const CONTROL_SUCCESS: &str = "control-success";
    /// Protocol-level error answer.
    pub const ERROR: &str = "error";
    /// Server broadcast: the operator selected a device.
    pub const DEVICE_SELECTED: &str = "device-selected";
    /// Server broadcast: free-form operator notice.
    pub const INFO: &str = "info";
}

/// Top-level message exchanged over the control connection.
///
/// The payload stays opaque JSON until [`Command::from_envelope`] decodes it
/// into the variant selected by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Type tag selecting the payload shape. Missing on input means unknown.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Type-specific payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Human readable message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Envelope {
    /// Creates an envelope with only a type tag.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: None,
            message: None,
        }
    }

    /// Creates an envelope whose payload is the JSON form of `payload`.
    pub fn with_payload<T: Serialize>(kind: impl Into<String>, payload: &T) -> ProtocolResult<Self> {
        Ok(Self {
            payload: Some(serde_json::to_value(payload)?),
            ..Self::new(kind)
        })
    }

    /// Builder: set the message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Creates an `error` envelope.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message_type::ERROR).message(message)
    }

    /// Creates an `info` envelope.
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(message_type::INFO).message(message)
    }

    /// Creates a `control-device` request.
    pub fn control_device(device_id: impl Into<String>, desired_state: bool) -> ProtocolResult<Self> {
        let request = DeviceStateRequest {
            device_id: Some(device_id.into()),
            desired_state,
        };
        Self::with_payload(message_type::CONTROL_DEVICE, &request)
    }

    /// Creates a `control-success` answer.
    pub fn control_success(response: &DeviceStateResponse) -> ProtocolResult<Self> {
        Self::with_payload(message_type::CONTROL_SUCCESS, response)
    }

    /// Creates a `device-selected` broadcast.
    pub fn device_selected(device_id: &DeviceId) -> ProtocolResult<Self> {
        let payload = DeviceSelected {
            device_id: device_id.to_string(),
            desired_state: true,
        };
        Ok(Self::with_payload(message_type::DEVICE_SELECTED, &payload)?.message("Device selected"))
    }

    /// Parses one decoded frame.
    ///
    /// Surrounding whitespace is ignored. Text that does not open a JSON
    /// object is [`ProtocolError::NotAnObject`]; anything else that fails
    /// to parse is [`ProtocolError::Serialization`].
    pub fn from_frame(text: &str) -> ProtocolResult<Self> {
        let text = text.trim();
        if !text.starts_with('{') {
            return Err(ProtocolError::NotAnObject);
        }
        Ok(serde_json::from_str(text)?)
    }

    /// Returns true if this envelope has the given type tag.
    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }

    /// Decodes the payload into `T`, if present.
    pub fn payload_as<T: serde::de::DeserializeOwned>(&self) -> Option<ProtocolResult<T>> {
        self.payload
            .as_ref()
            .map(|payload| T::deserialize(payload).map_err(Into::into))
    }
}

/// Payload of `control-device`.
///
/// Earlier clients sent `EntityId`/`State`; those names are still accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStateRequest {
    /// Target device.
    #[serde(default, alias = "entityId", alias = "EntityId")]
    pub device_id: Option<String>,
    /// Requested on/off state.
    #[serde(default, alias = "state", alias = "State")]
    pub desired_state: bool,
}

/// Payload of `control-success`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStateResponse {
    /// Device the request addressed.
    pub device_id: String,
    /// Whether the requested state was applied.
    pub success: bool,
    /// Outcome description.
    pub message: String,
    /// Device state after the attempt.
    pub current_state: bool,
}

/// Payload of `device-selected`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSelected {
    /// Selected device.
    pub device_id: String,
    /// Always true: selection proposes switching the device on.
    pub desired_state: bool,
}

/// A request decoded from an [`Envelope`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Set a device's on/off state.
    ControlDevice {
        device_id: DeviceId,
        desired_state: bool,
    },
    /// A type tag this server does not handle.
    Unknown(String),
}

impl Command {
    /// Decodes the envelope's payload according to its type tag.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] when a known type carries a payload that is
    /// missing, malformed, or lacks its device identifier.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, CommandError> {
        match envelope.kind.as_str() {
            message_type::CONTROL_DEVICE => {
                let request: DeviceStateRequest = envelope
                    .payload_as()
                    .ok_or(CommandError::InvalidPayload)?
                    .map_err(|_| CommandError::InvalidPayload)?;

                match request.device_id {
                    Some(id) if !id.is_empty() => Ok(Self::ControlDevice {
                        device_id: DeviceId::new(id),
                        desired_state: request.desired_state,
                    }),
                    _ => Err(CommandError::MissingDeviceId),
                }
            }
            other => Ok(Self::Unknown(other.to_string())),
        }
    }

    /// Type tag this command was decoded from.
    pub fn kind(&self) -> &str {
        match self {
            Self::ControlDevice { .. } => message_type::CONTROL_DEVICE,
            Self::Unknown(kind) => kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(value: Value) -> Envelope {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn envelope_omits_absent_fields() {
        let value = serde_json::to_value(Envelope::error("Unknown request type")).unwrap();
        assert_eq!(value, json!({"type": "error", "message": "Unknown request type"}));
    }

    #[test]
    fn from_frame_classifies_input() {
        let env = Envelope::from_frame("\r\n {\"type\":\"info\"} ").unwrap();
        assert!(env.is(message_type::INFO));

        assert!(matches!(
            Envelope::from_frame("hello"),
            Err(ProtocolError::NotAnObject)
        ));
        assert!(matches!(
            Envelope::from_frame("[1,2]"),
            Err(ProtocolError::NotAnObject)
        ));
        assert!(matches!(
            Envelope::from_frame("{not json"),
            Err(ProtocolError::Serialization(_))
        ));
    }

    #[test]
    fn envelope_without_type_is_unknown() {
        let env = envelope(json!({"payload": {"deviceId": "1"}}));
        assert_eq!(Command::from_envelope(&env), Ok(Command::Unknown(String::new())));
    }

    #[test]
    fn control_device_decodes() {
        let env = envelope(json!({
            "type": "control-device",
            "payload": {"deviceId": "4711", "desiredState": true}
        }));

        assert_eq!(
            Command::from_envelope(&env),
            Ok(Command::ControlDevice {
                device_id: DeviceId::new("4711"),
                desired_state: true,
            })
        );
    }

    #[test]
    fn control_device_accepts_legacy_field_names() {
        let env = envelope(json!({
            "type": "control-device",
            "payload": {"EntityId": "12", "State": true}
        }));

        assert_eq!(
            Command::from_envelope(&env),
            Ok(Command::ControlDevice {
                device_id: DeviceId::new("12"),
                desired_state: true,
            })
        );
    }

    #[test]
    fn control_device_defaults_desired_state_to_off() {
        let env = envelope(json!({"type": "control-device", "payload": {"deviceId": "7"}}));
        assert!(matches!(
            Command::from_envelope(&env),
            Ok(Command::ControlDevice {
                desired_state: false,
                ..
            })
        ));
    }

    #[test]
    fn missing_payload_is_invalid() {
        let env = envelope(json!({"type": "control-device"}));
        assert_eq!(Command::from_envelope(&env), Err(CommandError::InvalidPayload));

        let env = envelope(json!({"type": "control-device", "payload": null}));
        assert_eq!(Command::from_envelope(&env), Err(CommandError::InvalidPayload));
    }

    #[test]
    fn malformed_payload_is_invalid() {
        let env = envelope(json!({"type": "control-device", "payload": "on"}));
        assert_eq!(Command::from_envelope(&env), Err(CommandError::InvalidPayload));

        let env = envelope(json!({
            "type": "control-device",
            "payload": {"deviceId": "1", "desiredState": "yes"}
        }));
        assert_eq!(Command::from_envelope(&env), Err(CommandError::InvalidPayload));
    }

    #[test]
    fn null_or_empty_device_id_is_distinct_error() {
        for payload in [
            json!({"deviceId": null, "desiredState": true}),
            json!({"deviceId": "", "desiredState": true}),
            json!({"desiredState": true}),
        ] {
            let env = envelope(json!({"type": "control-device", "payload": payload}));
            assert_eq!(Command::from_envelope(&env), Err(CommandError::MissingDeviceId));
        }
        assert_eq!(CommandError::MissingDeviceId.to_string(), "EntityId is null");
        assert_eq!(CommandError::InvalidPayload.to_string(), "Invalid request payload");
    }

    #[test]
    fn control_success_wire_shape() {
        let response = DeviceStateResponse {
            device_id: "999".into(),
            success: false,
            message: "Error while setting switch state".into(),
            current_state: false,
        };
        let value = serde_json::to_value(Envelope::control_success(&response).unwrap()).unwrap();

        assert_eq!(
            value,
            json!({
                "type": "control-success",
                "payload": {
                    "deviceId": "999",
                    "success": false,
                    "message": "Error while setting switch state",
                    "currentState": false
                }
            })
        );
    }

    #[test]
    fn device_selected_wire_shape() {
        let env = Envelope::device_selected(&DeviceId::new("55")).unwrap();
        assert!(env.is(message_type::DEVICE_SELECTED));
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({
                "type": "device-selected",
                "payload": {"deviceId": "55", "desiredState": true},
                "message": "Device selected"
            })
        );
    }

    #[test]
    fn control_device_request_round_trips_through_command() {
        let env = Envelope::control_device("31", false).unwrap();
        let command = Command::from_envelope(&env).unwrap();
        assert_eq!(command.kind(), message_type::CONTROL_DEVICE);
    }
}
