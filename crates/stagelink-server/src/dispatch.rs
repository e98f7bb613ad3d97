//! Request dispatch.
//!
//! Turns one decoded request [`Envelope`] into exactly one response envelope.

use std::sync::Arc;

use stagelink_core::{DeviceController, DeviceId, SetStateOutcome};
use stagelink_protocol::{Command, DeviceStateResponse, Envelope};
use tracing::{debug, warn};

const UNKNOWN_REQUEST: &str = "Unknown request type";
const STATE_UPDATED: &str = "State updated successfully";
const STATE_FAILED: &str = "Error while setting switch state";
const RESPONSE_FAILED: &str = "Failed to build response";

/// Routes requests to the device controller.
#[derive(Clone)]
pub struct CommandDispatcher {
    controller: Arc<dyn DeviceController>,
}

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher").finish_non_exhaustive()
    }
}

impl CommandDispatcher {
    /// Creates a dispatcher backed by `controller`.
    pub fn new(controller: Arc<dyn DeviceController>) -> Self {
        Self { controller }
    }

    /// Handles a request envelope and returns the response to send back.
    ///
    /// `control-device` always answers with `control-success`, even when the
    /// controller could not apply the state; `success` carries the outcome.
    #[tracing::instrument(skip_all, fields(request_type = %request.kind))]
    pub async fn dispatch(&self, request: &Envelope) -> Envelope {
        let command = match Command::from_envelope(request) {
            Ok(command) => command,
            Err(e) => {
                debug!(error = %e, "Rejected request");
                return Envelope::error(e.to_string());
            }
        };

        match command {
            Command::ControlDevice {
                device_id,
                desired_state,
            } => self.control_device(device_id, desired_state).await,
            Command::Unknown(kind) => {
                debug!(request_type = %kind, "Unknown request type");
                Envelope::error(UNKNOWN_REQUEST)
            }
        }
    }

    async fn control_device(&self, device_id: DeviceId, desired_state: bool) -> Envelope {
        let outcome = match self.controller.set_state(&device_id, desired_state).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(device_id = %device_id, error = %e, "Device controller error");
                SetStateOutcome::failed(false)
            }
        };

        debug!(
            device_id = %device_id,
            desired_state,
            success = outcome.success,
            current_state = outcome.current_state,
            "Handled control-device"
        );

        let response = DeviceStateResponse {
            device_id: device_id.into_inner(),
            success: outcome.success,
            message: if outcome.success {
                STATE_UPDATED
            } else {
                STATE_FAILED
            }
            .to_string(),
            current_state: outcome.current_state,
        };

        Envelope::control_success(&response).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to encode control-success payload");
            Envelope::error(RESPONSE_FAILED)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stagelink_core::{Device, DeviceError, DeviceFuture, DeviceTable};
    use stagelink_protocol::message_type;

    struct Broken;

    impl DeviceController for Broken {
        fn set_state(&self, device_id: &DeviceId, _desired_state: bool) -> DeviceFuture<'_> {
            let id = device_id.clone();
            Box::pin(async move { Err(DeviceError::failed(id, "bus offline")) })
        }
    }

    fn dispatcher() -> CommandDispatcher {
        let table = DeviceTable::with_devices([Device::new("4711"), Device::new("12")]);
        CommandDispatcher::new(Arc::new(table))
    }

    fn request(value: serde_json::Value) -> Envelope {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn control_device_success() {
        let response = dispatcher()
            .dispatch(&Envelope::control_device("4711", true).unwrap())
            .await;

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "type": "control-success",
                "payload": {
                    "deviceId": "4711",
                    "success": true,
                    "message": "State updated successfully",
                    "currentState": true
                }
            })
        );
    }

    #[tokio::test]
    async fn control_device_failure_still_control_success() {
        let response = dispatcher()
            .dispatch(&Envelope::control_device("999", true).unwrap())
            .await;

        assert!(response.is(message_type::CONTROL_SUCCESS));
        let payload: DeviceStateResponse = response.payload_as().unwrap().unwrap();
        assert_eq!(
            payload,
            DeviceStateResponse {
                device_id: "999".into(),
                success: false,
                message: "Error while setting switch state".into(),
                current_state: false,
            }
        );
    }

    #[tokio::test]
    async fn controller_error_maps_to_failed_outcome() {
        let dispatcher = CommandDispatcher::new(Arc::new(Broken));
        let response = dispatcher
            .dispatch(&Envelope::control_device("1", true).unwrap())
            .await;

        let payload: DeviceStateResponse = response.payload_as().unwrap().unwrap();
        assert!(!payload.success);
        assert!(!payload.current_state);
        assert_eq!(payload.message, "Error while setting switch state");
    }

    #[tokio::test]
    async fn legacy_request_fields() {
        let response = dispatcher()
            .dispatch(&request(json!({
                "type": "control-device",
                "payload": {"EntityId": "12", "State": true}
            })))
            .await;

        let payload: DeviceStateResponse = response.payload_as().unwrap().unwrap();
        assert_eq!(payload.device_id, "12");
        assert!(payload.success);
    }

    #[tokio::test]
    async fn unknown_type_is_error() {
        for value in [
            json!({"type": "frobnicate"}),
            json!({"payload": {"deviceId": "1"}}),
        ] {
            let response = dispatcher().dispatch(&request(value)).await;
            assert_eq!(response, Envelope::error("Unknown request type"));
        }
    }

    #[tokio::test]
    async fn invalid_payload_is_error() {
        let response = dispatcher()
            .dispatch(&request(json!({"type": "control-device"})))
            .await;
        assert_eq!(response, Envelope::error("Invalid request payload"));
    }

    #[tokio::test]
    async fn null_device_id_is_error() {
        let response = dispatcher()
            .dispatch(&request(json!({
                "type": "control-device",
                "payload": {"deviceId": null, "desiredState": true}
            })))
            .await;
        assert_eq!(response, Envelope::error("EntityId is null"));
    }
}
