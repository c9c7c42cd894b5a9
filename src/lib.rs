//! Twitch chat relay for Smash Soda.
//!
//! Chat from a Twitch channel and from the local Smash Soda websocket is
//! normalized by the [`bridge`], rendered (emotes, escaping, sanitizing) into a
//! bounded [`render::RenderList`], and shown through the [`viewport`]. With
//! broadcasting on, Twitch chat is also forwarded to the local socket.

pub mod bridge;
pub mod config;
pub mod emotes;
pub mod entities;
pub mod error;
pub mod local_socket;
pub mod models;
pub mod relay;
pub mod render;
pub mod sanitize;
pub mod twitch;
pub mod viewport;

pub use bridge::{Bridge, ChatEvent, Dispatch, IgnoreReason, Outbound, Session};
pub use config::{Args, RelayConfig, SessionParams};
pub use error::{RelayError, Result};
pub use models::{BridgeConfig, ChatMessage, ChatUser, EmoteMap, EmoteSpan, MessageSource};
