//! Named publishing/subscribing endpoints.

use std::sync::Mutex;
use std::time::Duration;

use mchal_types::token::Token;
use mchal_types::topic::{Topic, TopicFilter};
use mchal_types::value::Value;

use crate::bus::Bus;
use crate::error::BusError;
use crate::message::Message;
use crate::subscription::Subscription;

/// A named publishing/subscribing endpoint. Groups subscriptions and
/// provides request/reply correlation; dropping (or explicitly
/// [`Connection::close`]ing) a connection removes all subscriptions it
/// created.
pub struct Connection {
    id: u64,
    name: String,
    bus: Bus,
    owned_subs: Mutex<Vec<u64>>,
}

impl Connection {
    pub(crate) fn new(id: u64, name: String, bus: Bus) -> Self {
        Connection {
            id,
            name,
            bus,
            owned_subs: Mutex::new(Vec::new()),
        }
    }

    /// The connection's debug name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Build a message on this bus. Constructing with a wildcard topic
    /// and `retained = true` fails with [`BusError::InvalidTopic`].
    pub fn new_message(&self, topic: Topic, payload: Value, retained: bool) -> Result<Message, BusError> {
        self.bus.new_message(topic, payload, retained)
    }

    /// Publish a message: deliver to every matching subscription and, if
    /// retained, update (or clear) the retained store.
    pub fn publish(&self, message: Message) -> Result<(), BusError> {
        self.bus.publish(message)
    }

    /// Subscribe to a topic pattern, replaying any currently-matching
    /// retained messages before the subscription observes any live
    /// message.
    pub fn subscribe(&self, pattern: TopicFilter) -> Subscription {
        let sub = self.bus.subscribe(pattern);
        self.owned_subs.lock().unwrap().push(sub.id());
        sub
    }

    /// Subscribe using plain string segments, validated against this
    /// bus's configured wildcard tokens.
    pub fn subscribe_str<'a>(
        &self,
        segments: impl IntoIterator<Item = &'a str>,
    ) -> Result<Subscription, BusError> {
        let filter = self.bus.filter_from_strs(segments)?;
        Ok(self.subscribe(filter))
    }

    /// Remove a subscription from the index and stop delivering to it.
    pub fn unsubscribe(&self, subscription: Subscription) {
        let id = subscription.id();
        subscription.bus().unsubscribe(id);
        self.owned_subs.lock().unwrap().retain(|&s| s != id);
    }

    /// Allocate an ephemeral reply topic, attach it to `message`'s
    /// `reply_to`, subscribe to it, publish `message`, and return the
    /// reply subscription.
    pub fn request(&self, message: Message) -> Result<Subscription, BusError> {
        let corr_id = self.bus.alloc_corr_id();
        let reply_topic = Topic::from_strs(["$reply", self.name.as_str()]).join([
            Token::uint(self.id),
            Token::uint(corr_id),
        ]);
        let filter = TopicFilter::new(
            reply_topic.tokens().to_vec(),
            self.bus.single_wildcard(),
            self.bus.multi_wildcard(),
        )?;
        let sub = self.subscribe(filter);
        let with_reply = message.with_reply_to(reply_topic, corr_id);
        self.publish(with_reply)?;
        Ok(sub)
    }

    /// [`Connection::request`], then block on the reply subscription
    /// until a reply arrives or `deadline` elapses.
    pub async fn request_wait(&self, deadline: Duration, message: Message) -> Result<Message, BusError> {
        let mut sub = self.request(message)?;
        let result = self.bus.wait_reply(&mut sub, deadline).await;
        self.unsubscribe(sub);
        result
    }

    /// Publish `payload` on `original`'s reply-to topic; a no-op if
    /// `original` carries no reply-to.
    pub fn reply(&self, original: &Message, payload: Value, retained: bool) -> Result<(), BusError> {
        let Some(reply_topic) = original.reply_to() else {
            return Ok(());
        };
        let msg = self.new_message(reply_topic.clone(), payload, retained)?;
        self.publish(msg)
    }

    /// Remove every subscription this connection created. Called
    /// automatically on drop.
    pub fn close(&self) {
        let ids: Vec<u64> = std::mem::take(&mut *self.owned_subs.lock().unwrap());
        for id in ids {
            self.bus.unsubscribe(id);
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
