use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use twitch_irc::login::StaticLoginCredentials;
use twitch_irc::message::{PrivmsgMessage, ServerMessage};
use twitch_irc::{ClientConfig, SecureTCPTransport, TwitchIRCClient};

use crate::bridge::ChatEvent;
use crate::error::{RelayError, Result};
use crate::models::{ChatUser, EmoteMap, EmoteSpan, MessageType};

/// Login used by the library when no credentials are given.
pub const ANONYMOUS_LOGIN: &str = "justinfan12345";

#[derive(Debug, Clone, Default)]
pub struct TwitchOptions {
    pub channel: String,
    pub username: Option<String>,
    pub oauth_token: Option<String>,
}

impl TwitchOptions {
    fn login(&self) -> &str {
        match (&self.username, &self.oauth_token) {
            (Some(username), Some(_)) => username,
            _ => ANONYMOUS_LOGIN,
        }
    }

    fn client_config(&self) -> ClientConfig<StaticLoginCredentials> {
        match (&self.username, &self.oauth_token) {
            (Some(username), Some(token)) => {
                let token = token.trim().trim_start_matches("oauth:").to_string();
                ClientConfig::new_simple(StaticLoginCredentials::new(
                    username.trim().to_lowercase(),
                    Some(token),
                ))
            }
            _ => ClientConfig::default(),
        }
    }
}

/// `#Vedal987 ` -> `vedal987`
pub fn channel_login(channel: &str) -> String {
    channel.trim().trim_start_matches('#').to_lowercase()
}

/// Converts a library PRIVMSG into the bridge's chat event.
pub fn chat_event(msg: PrivmsgMessage, own_login: &str) -> ChatEvent {
    let emotes: EmoteMap = msg
        .emotes
        .iter()
        .map(|e| EmoteSpan {
            emote_id: e.id.clone(),
            start: e.char_range.start,
            end: e.char_range.end,
        })
        .collect();

    let user = ChatUser {
        username: msg.sender.login.clone(),
        display_name: Some(msg.sender.name),
        color: msg
            .name_color
            .map(|c| format!("#{:02X}{:02X}{:02X}", c.r, c.g, c.b)),
        user_id: Some(msg.sender.id),
        badges: msg
            .badges
            .into_iter()
            .map(|b| (b.name, b.version))
            .collect(),
        emotes,
        message_type: if msg.is_action {
            MessageType::Action
        } else {
            MessageType::Chat
        },
    };

    ChatEvent {
        channel: format!("#{}", msg.channel_login),
        is_self: msg.sender.login.eq_ignore_ascii_case(own_login),
        user,
        message: msg.message_text,
    }
}

/// Joins the channel and streams its chat messages.
///
/// Connection management and reconnects are left to `twitch-irc`. The
/// returned task ends when the event receiver is dropped.
pub fn connect(options: &TwitchOptions) -> Result<(mpsc::UnboundedReceiver<ChatEvent>, JoinHandle<()>)> {
    let channel = channel_login(&options.channel);
    let own_login = options.login().to_lowercase();

    let (mut incoming_messages, client) =
        TwitchIRCClient::<SecureTCPTransport, StaticLoginCredentials>::new(options.client_config());

    info!(channel = %channel, login = %own_login, "joining twitch channel");
    client.join(channel.clone()).map_err(|source| RelayError::Join {
        channel: channel.clone(),
        source,
    })?;

    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(async move {
        // The client stops once every handle is dropped.
        let _keep_alive = client;

        while let Some(message) = incoming_messages.recv().await {
            match message {
                ServerMessage::Privmsg(msg) => {
                    debug!(channel = %msg.channel_login, sender = %msg.sender.login, "twitch message");
                    if tx.send(chat_event(msg, &own_login)).is_err() {
                        break;
                    }
                }
                ServerMessage::Notice(msg) => {
                    warn!(notice = %msg.message_text, "twitch notice");
                }
                ServerMessage::Join(msg) => {
                    info!(channel = %msg.channel_login, "joined twitch channel");
                }
                ServerMessage::RoomState(msg) => {
                    debug!(channel = %msg.channel_login, room_id = %msg.channel_id, "twitch room state");
                }
                _ => {}
            }
        }
    });

    Ok((rx, handle))
}
