//! Smart home handler of the daemon.
//!
//! No entity is exposed to the voice assistant yet, so every directive is
//! answered with an error response.

use hublink_adapter_cloud::SmartHomeHandler;
use serde_json::{Value, json};

pub struct UnsupportedDirectives;

impl SmartHomeHandler for UnsupportedDirectives {
    async fn handle(&self, message: Value) -> Value {
        let name = message
            .pointer("/header/name")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        tracing::debug!(directive = name, "rejecting smart home directive");
        json!({
            "header": {
                "namespace": "Alexa",
                "name": "ErrorResponse",
                "messageId": uuid::Uuid::new_v4().to_string(),
                "payloadVersion": "3",
            },
            "payload": {
                "type": "INVALID_DIRECTIVE",
                "message": format!("directive {name} is not supported"),
            }
        })
    }
}
