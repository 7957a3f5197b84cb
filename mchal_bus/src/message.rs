//! Bus messages.

use mchal_types::topic::Topic;
use mchal_types::value::Value;

/// A message in flight on the bus: topic, payload, retained flag, and
/// optional reply-to topic / correlation id used by request/reply.
#[derive(Debug, Clone)]
pub struct Message {
    topic: Topic,
    payload: Value,
    retained: bool,
    reply_to: Option<Topic>,
    correlation_id: Option<u64>,
}

impl Message {
    pub(crate) fn new(topic: Topic, payload: Value, retained: bool) -> Self {
        Message {
            topic,
            payload,
            retained,
            reply_to: None,
            correlation_id: None,
        }
    }

    /// The message's topic.
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// The message's payload.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Take ownership of the payload, consuming the message.
    pub fn into_payload(self) -> Value {
        self.payload
    }

    /// `true` if this message was published (or is being constructed) as
    /// retained.
    pub fn is_retained(&self) -> bool {
        self.retained
    }

    /// The reply-to topic, if any (set by `Connection::request`).
    pub fn reply_to(&self) -> Option<&Topic> {
        self.reply_to.as_ref()
    }

    /// The correlation id, if any (set by `Connection::request`).
    pub fn correlation_id(&self) -> Option<u64> {
        self.correlation_id
    }

    pub(crate) fn with_reply_to(mut self, topic: Topic, correlation_id: u64) -> Self {
        self.reply_to = Some(topic);
        self.correlation_id = Some(correlation_id);
        self
    }
}
