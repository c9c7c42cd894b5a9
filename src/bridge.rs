//! Joins the two event sources (Twitch chat and the local Smash Soda socket)
//! into one render path.
//!
//! A [`Bridge`] is the unconfigured state. [`Bridge::start`] consumes it and
//! returns the active [`Session`], so a session can only be started once and
//! never goes back.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{RelayError, SocketClosed};
use crate::models::{BridgeConfig, ChatMessage, ChatUser};
use crate::render::RenderSink;

pub const CHAT_MESSAGE_EVENT: &str = "chat:message";
pub const CHAT_EXTERNAL_EVENT: &str = "chat:external";
pub const DEFAULT_EXTERNAL_LABEL: &str = "soda-arcade.com";

/// Where forwarded chat goes.
pub trait Outbound {
    fn is_open(&self) -> bool;
    fn send_text(&self, text: String) -> Result<(), SocketClosed>;
}

/// A chat message as delivered by the chat transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatEvent {
    /// Channel name including its leading `#`.
    pub channel: String,
    pub user: ChatUser,
    pub message: String,
    /// Set when the message is our own, echoed back.
    pub is_self: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    SelfEcho,
    UnknownEvent,
}

/// What the session did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Rendered { seq: u64, forwarded: bool },
    Ignored(IgnoreReason),
    Dropped,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct ExternalChat {
    user: ExternalUser,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ExternalUser {
    name: String,
}

#[derive(Debug, Serialize)]
struct Outgoing<'a> {
    event: &'static str,
    data: OutgoingChat<'a>,
}

#[derive(Debug, Serialize)]
struct OutgoingChat<'a> {
    user: &'a ChatUser,
    message: &'a str,
}

fn parse_envelope(text: &str) -> Result<Envelope, RelayError> {
    Ok(serde_json::from_str(text)?)
}

pub struct Bridge {
    sink: RenderSink,
    external_label: String,
}

impl Bridge {
    pub fn new(sink: RenderSink) -> Self {
        Self {
            sink,
            external_label: DEFAULT_EXTERNAL_LABEL.to_string(),
        }
    }

    /// Channel label shown on messages from the local socket.
    pub fn with_external_label(mut self, label: impl Into<String>) -> Self {
        self.external_label = label.into();
        self
    }

    pub fn start<O: Outbound>(self, config: BridgeConfig, outbound: O) -> Session<O> {
        debug!(channel = %config.channel, broadcast = config.broadcast, "session started");
        Session {
            config,
            sink: self.sink,
            outbound,
            external_label: self.external_label,
        }
    }
}

pub struct Session<O> {
    config: BridgeConfig,
    sink: RenderSink,
    outbound: O,
    external_label: String,
}

impl<O: Outbound> Session<O> {
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn sink(&self) -> &RenderSink {
        &self.sink
    }

    pub fn outbound(&self) -> &O {
        &self.outbound
    }

    pub fn on_chat_event(&mut self, event: ChatEvent) -> Dispatch {
        if event.is_self {
            return Dispatch::Ignored(IgnoreReason::SelfEcho);
        }

        let channel = event.channel.strip_prefix('#').unwrap_or(&event.channel);
        let entry = self
            .sink
            .render(ChatMessage::twitch(channel, &event.user, event.message.as_str()));

        let forwarded = self.config.broadcast && self.forward(&event.user, &event.message);
        Dispatch::Rendered {
            seq: entry.seq,
            forwarded,
        }
    }

    pub fn on_socket_text(&mut self, text: &str) -> Dispatch {
        let envelope = match parse_envelope(text) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(error = %err, "dropping socket message");
                return Dispatch::Dropped;
            }
        };

        if envelope.event != CHAT_MESSAGE_EVENT {
            debug!(event = %envelope.event, "ignoring socket event");
            return Dispatch::Ignored(IgnoreReason::UnknownEvent);
        }

        let chat: ExternalChat = match serde_json::from_value(envelope.data) {
            Ok(chat) => chat,
            Err(err) => {
                warn!(error = %err, "dropping chat:message without user name or message");
                return Dispatch::Dropped;
            }
        };

        let entry = self.sink.render(ChatMessage::external(
            &self.external_label,
            chat.user.name,
            chat.message,
        ));
        Dispatch::Rendered {
            seq: entry.seq,
            forwarded: false,
        }
    }

    /// Sends the message on when the socket is open. Failures are not retried.
    fn forward(&self, user: &ChatUser, message: &str) -> bool {
        if !self.outbound.is_open() {
            return false;
        }
        let payload = Outgoing {
            event: CHAT_EXTERNAL_EVENT,
            data: OutgoingChat { user, message },
        };
        let text = match serde_json::to_string(&payload) {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "failed to encode forwarded chat");
                return false;
            }
        };
        match self.outbound.send_text(text) {
            Ok(()) => true,
            Err(err) => {
                debug!(error = %err, "forward skipped");
                false
            }
        }
    }
}
