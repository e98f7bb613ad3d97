//! One-shot device control.

use stagelink_protocol::{DeviceStateResponse, Envelope, message_type};

use crate::error::{ClientError, ClientResult};
use crate::socket::ControlClient;

/// Sends one `control-device` request and prints the answer as JSON.
///
/// Fails if the server answers with `error` or reports that the state could
/// not be applied.
pub async fn run(client: &ControlClient, device_id: &str, on: bool) -> ClientResult<()> {
    let response = client.control_device(device_id, on).await?;
    let pretty = serde_json::to_string_pretty(&response)
        .map_err(stagelink_protocol::ProtocolError::from)?;
    println!("{pretty}");
    check(&response)
}

fn check(response: &Envelope) -> ClientResult<()> {
    if response.is(message_type::ERROR) {
        return Err(ClientError::Rejected(
            response
                .message
                .clone()
                .unwrap_or_else(|| "no message".to_string()),
        ));
    }

    let payload: DeviceStateResponse = response
        .payload_as()
        .ok_or_else(|| ClientError::Rejected("answer without payload".into()))??;
    if payload.success {
        Ok(())
    } else {
        Err(ClientError::Rejected(format!(
            "device {}: {}",
            payload.device_id, payload.message
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_accepts_success() {
        let response = Envelope::control_success(&DeviceStateResponse {
            device_id: "1".into(),
            success: true,
            message: "State updated successfully".into(),
            current_state: true,
        })
        .unwrap();
        assert!(check(&response).is_ok());
    }

    #[test]
    fn check_rejects_failure_and_error() {
        let failed = Envelope::control_success(&DeviceStateResponse {
            device_id: "999".into(),
            success: false,
            message: "Error while setting switch state".into(),
            current_state: false,
        })
        .unwrap();
        let err = check(&failed).unwrap_err();
        assert!(matches!(&err, ClientError::Rejected(m) if m.starts_with("device 999")));
        assert_eq!(
            err.to_string(),
            "request rejected: device 999: Error while setting switch state"
        );

        let err = check(&Envelope::error("EntityId is null")).unwrap_err();
        assert!(matches!(&err, ClientError::Rejected(m) if m == "EntityId is null"));
        assert_eq!(err.to_string(), "request rejected: EntityId is null");
    }
}
