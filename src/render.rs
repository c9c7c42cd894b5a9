use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Local};
use tokio::sync::watch;
use tracing::debug;

use crate::emotes::EmoteFormatter;
use crate::entities::EntityEncoder;
use crate::models::{ChatMessage, MessageSource};
use crate::sanitize::{sanitize, strip_terminal_controls};

pub const DEFAULT_LIMIT: usize = 100;

/// A message as it is displayed.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderEntry {
    pub seq: u64,
    pub source: MessageSource,
    /// Label for plain-text output, control sequences removed.
    pub channel_label: String,
    /// Entity-encoded label.
    pub label_html: String,
    /// Sanitized, entity-encoded display name.
    pub display_name: String,
    /// Sanitized display name for plain-text output.
    pub name_text: String,
    pub color: String,
    /// Sanitized, emote-formatted, entity-encoded body.
    pub body_html: String,
    /// Sanitized raw body for plain-text output.
    pub body_text: String,
    pub received_at: DateTime<Local>,
}

impl RenderEntry {
    /// Local receive time, `HH:MM:SS`.
    pub fn timestamp(&self) -> String {
        self.received_at.format("%H:%M:%S").to_string()
    }

    pub fn to_html(&self) -> String {
        format!(
            concat!(
                r#"<div class="message-container">"#,
                r#"<span class="message-time">{time}</span>"#,
                r#"<span class="message-user" style="color: {color}">{name}</span>"#,
                r#"<span class="message-channel {class}">[{label}]</span>"#,
                r#"<span class="message-body">{body}</span>"#,
                "</div>"
            ),
            time = self.timestamp(),
            color = self.color,
            name = self.display_name,
            class = self.source.css_class(),
            label = self.label_html,
            body = self.body_html,
        )
    }
}

/// Bounded, insertion-ordered list of rendered entries.
#[derive(Debug, Clone)]
pub struct RenderList {
    entries: VecDeque<Arc<RenderEntry>>,
    limit: usize,
}

impl RenderList {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            entries: VecDeque::with_capacity(limit),
            limit,
        }
    }

    /// Appends `entry`, returning the evicted oldest entry if the list was full.
    pub fn push(&mut self, entry: Arc<RenderEntry>) -> Option<Arc<RenderEntry>> {
        self.entries.push_back(entry);
        if self.entries.len() > self.limit {
            self.entries.pop_front()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<RenderEntry>> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&Arc<RenderEntry>> {
        self.entries.back()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            entries: self.entries.iter().cloned().collect(),
        }
    }
}

/// Immutable copy of the render list handed to the viewport.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub entries: Vec<Arc<RenderEntry>>,
}

impl Snapshot {
    pub fn latest_seq(&self) -> Option<u64> {
        self.entries.last().map(|e| e.seq)
    }
}

/// Turns chat messages into entries and keeps the bounded list.
pub struct RenderSink {
    list: RenderList,
    formatter: EmoteFormatter,
    encoder: EntityEncoder,
    next_seq: u64,
    scroll: Option<watch::Sender<Snapshot>>,
}

impl RenderSink {
    pub fn new(limit: usize, encoder: EntityEncoder) -> Self {
        Self {
            list: RenderList::new(limit),
            formatter: EmoteFormatter::new(encoder),
            encoder,
            next_seq: 0,
            scroll: None,
        }
    }

    /// Publishes a snapshot after every render; see [`crate::viewport`].
    pub fn with_scroll(mut self, scroll: watch::Sender<Snapshot>) -> Self {
        self.scroll = Some(scroll);
        self
    }

    pub fn list(&self) -> &RenderList {
        &self.list
    }

    pub fn render(&mut self, message: ChatMessage) -> Arc<RenderEntry> {
        let name = sanitize(&message.display_name);
        let display_name = self.encoder.encode(&name);
        let body_html = sanitize(&self.formatter.format(&message.body, &message.emotes));

        let entry = Arc::new(RenderEntry {
            seq: self.next_seq,
            source: message.source,
            channel_label: strip_terminal_controls(&message.channel_label),
            label_html: self.encoder.encode(&message.channel_label),
            display_name,
            name_text: strip_terminal_controls(&name),
            color: message.color,
            body_html,
            body_text: strip_terminal_controls(&sanitize(&message.body)),
            received_at: Local::now(),
        });
        self.next_seq += 1;

        if let Some(evicted) = self.list.push(entry.clone()) {
            debug!(seq = evicted.seq, "evicted oldest message");
        }

        // Nobody watching is fine; the next render publishes again.
        if let Some(scroll) = &self.scroll {
            scroll.send_replace(self.list.snapshot());
        }

        entry
    }
}
