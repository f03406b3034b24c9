//! Inbound cloud messages: handler lookup and dispatch.

use std::future::Future;
use std::str::FromStr;

use serde_json::Value;

use crate::error::CloudError;

/// Topic, relative to the outbound prefix, of an Alexa reply.
fn alexa_reply_topic(message_id: &str) -> String {
    format!("alexa/{message_id}")
}

/// Handlers reachable from the cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Alexa,
}

impl HandlerKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alexa => "alexa",
        }
    }
}

impl FromStr for HandlerKind {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alexa" => Ok(Self::Alexa),
            other => Err(CloudError::UnknownHandler(other.to_string())),
        }
    }
}

/// Handler name of an inbound topic: the part after `<thing>/i/`.
#[must_use]
pub fn handler_name(topic: &str) -> Option<&str> {
    topic.splitn(3, '/').nth(2).filter(|name| !name.is_empty())
}

/// Smart home directive processor (Alexa-style request/response JSON).
pub trait SmartHomeHandler: Send + Sync {
    fn handle(&self, message: Value) -> impl Future<Output = Value> + Send;
}

/// Message to publish in answer to an inbound one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Topic relative to `<thing>/o/`.
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Routes inbound publishes to their handler.
pub struct MessageRouter<H> {
    smart_home: H,
}

impl<H: SmartHomeHandler> MessageRouter<H> {
    pub fn new(smart_home: H) -> Self {
        Self { smart_home }
    }

    /// Handle one inbound message.
    ///
    /// Returns `Ok(None)` when nothing has to be sent back, including for
    /// topics naming no known handler.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::PayloadParse`] or [`CloudError::InvalidMessage`]
    /// when the payload is not a valid directive.
    pub async fn route(&self, topic: &str, payload: &[u8]) -> Result<Option<Reply>, CloudError> {
        let Some(name) = handler_name(topic) else {
            tracing::warn!(topic, "unable to handle message without handler name");
            return Ok(None);
        };
        let kind = match name.parse::<HandlerKind>() {
            Ok(kind) => kind,
            Err(err) => {
                tracing::warn!(topic, error = %err, "unable to handle message");
                return Ok(None);
            }
        };

        match kind {
            HandlerKind::Alexa => self.handle_alexa(payload).await.map(Some),
        }
    }

    async fn handle_alexa(&self, payload: &[u8]) -> Result<Reply, CloudError> {
        let message: Value = serde_json::from_slice(payload).map_err(CloudError::PayloadParse)?;
        let message_id = message
            .pointer("/header/messageId")
            .and_then(Value::as_str)
            .ok_or(CloudError::InvalidMessage("header.messageId"))?
            .to_string();

        tracing::debug!(%message_id, "handling Alexa directive");
        let response = self.smart_home.handle(message).await;
        let payload = serde_json::to_vec(&response).map_err(CloudError::PayloadParse)?;
        Ok(Reply {
            topic: alexa_reply_topic(&message_id),
            payload,
        })
    }
}
