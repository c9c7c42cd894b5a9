use std::collections::BTreeMap;
use std::ops::Range;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

pub const DEFAULT_COLOR: &str = "inherit";

/// Where a rendered message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSource {
    Twitch,
    External,
}

impl MessageSource {
    /// Class used on the channel label of the rendered page.
    pub fn css_class(self) -> &'static str {
        match self {
            MessageSource::Twitch => "twitch",
            MessageSource::External => "parsec",
        }
    }
}

/// A single emote occurrence, `start..end` over the raw body in chars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmoteSpan {
    pub emote_id: String,
    pub start: usize,
    pub end: usize,
}

impl EmoteSpan {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Emote ranges keyed by emote id, in the order the ids were first seen.
///
/// Serialized in the chat library's user-object form, where each range is
/// written inclusively: `{"25": ["0-4", "12-16"]}`. Nothing reads that form
/// back; inbound emotes arrive already parsed from `twitch-irc`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmoteMap {
    entries: Vec<(String, Vec<Range<usize>>)>,
}

impl EmoteMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, emote_id: impl Into<String>, range: Range<usize>) {
        let emote_id = emote_id.into();
        match self.entries.iter_mut().find(|(id, _)| *id == emote_id) {
            Some((_, ranges)) => ranges.push(range),
            None => self.entries.push((emote_id, vec![range])),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every span, ids in insertion order and ranges in the order given.
    pub fn spans(&self) -> impl Iterator<Item = EmoteSpan> + '_ {
        self.entries.iter().flat_map(|(id, ranges)| {
            ranges.iter().map(move |range| EmoteSpan {
                emote_id: id.clone(),
                start: range.start,
                end: range.end,
            })
        })
    }
}

impl FromIterator<EmoteSpan> for EmoteMap {
    fn from_iter<I: IntoIterator<Item = EmoteSpan>>(iter: I) -> Self {
        let mut map = EmoteMap::new();
        for span in iter {
            map.insert(span.emote_id, span.start..span.end);
        }
        map
    }
}

impl Serialize for EmoteMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, ranges) in &self.entries {
            let ranges: Vec<String> = ranges
                .iter()
                .map(|r| format!("{}-{}", r.start, r.end.saturating_sub(1)))
                .collect();
            map.serialize_entry(id, &ranges)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Chat,
    Action,
}

/// The chat library's view of a sender, forwarded as-is to the local peer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChatUser {
    pub username: String,
    #[serde(rename = "display-name", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(rename = "user-id", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub badges: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "EmoteMap::is_empty")]
    pub emotes: EmoteMap,
    #[serde(rename = "message-type")]
    pub message_type: MessageType,
}

impl ChatUser {
    pub fn shown_name(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.username,
        }
    }
}

/// One message on its way to the render sink.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub source: MessageSource,
    pub channel_label: String,
    pub display_name: String,
    pub color: String,
    pub body: String,
    pub emotes: EmoteMap,
}

impl ChatMessage {
    /// `channel` is expected without its sigil.
    pub fn twitch(channel: &str, user: &ChatUser, body: impl Into<String>) -> Self {
        Self {
            source: MessageSource::Twitch,
            channel_label: format!("twitch.tv/{}", channel),
            display_name: user.shown_name().to_string(),
            color: css_color(user.color.as_deref()),
            body: body.into(),
            emotes: user.emotes.clone(),
        }
    }

    pub fn external(label: &str, name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            source: MessageSource::External,
            channel_label: label.to_string(),
            display_name: name.into(),
            color: DEFAULT_COLOR.to_string(),
            body: body.into(),
            emotes: EmoteMap::new(),
        }
    }
}

/// Session settings captured once when the relay starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub channel: String,
    pub broadcast: bool,
}

/// Accepts `#rgb` / `#rrggbb`, anything else falls back to `inherit`.
pub fn css_color(color: Option<&str>) -> String {
    match color.map(str::trim) {
        Some(c)
            if c.starts_with('#')
                && matches!(c.len(), 4 | 7)
                && c[1..].chars().all(|ch| ch.is_ascii_hexdigit()) =>
        {
            c.to_string()
        }
        _ => DEFAULT_COLOR.to_string(),
    }
}
