use tracing::warn;

use crate::entities::{EntityEncoder, EscapeMode, Segment};
use crate::models::{EmoteMap, EmoteSpan};

pub const EMOTE_CDN: &str = "https://static-cdn.jtvnw.net/emoticons/v2";

pub fn emote_url(emote_id: &str) -> String {
    let id = EntityEncoder::new(EscapeMode::Html).encode(emote_id);
    format!("{}/{}/default/dark/1.0", EMOTE_CDN, id)
}

fn emote_markup(emote_id: &str) -> String {
    format!(r#"<img class="emoticon" src="{}">"#, emote_url(emote_id))
}

/// Replaces emote ranges in a message body with image markup and escapes the
/// rest of the text.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmoteFormatter {
    encoder: EntityEncoder,
}

impl EmoteFormatter {
    pub fn new(encoder: EntityEncoder) -> Self {
        Self { encoder }
    }

    pub fn format(&self, body: &str, emotes: &EmoteMap) -> String {
        let mut segments = self.segments(body, emotes);
        self.encoder.encode_segments(&mut segments);
        segments.iter().map(Segment::as_str).collect()
    }

    /// Splits `body` into literal text and emote markup, in display order.
    pub fn segments(&self, body: &str, emotes: &EmoteMap) -> Vec<Segment> {
        // Byte offset of every char boundary, including the end of the string.
        let offsets: Vec<usize> = body
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(body.len()))
            .collect();
        let char_count = offsets.len() - 1;

        let mut segments = Vec::new();
        let mut cursor = 0;
        for span in accepted_spans(emotes, char_count) {
            if span.start > cursor {
                segments.push(Segment::Text(
                    body[offsets[cursor]..offsets[span.start]].to_string(),
                ));
            }
            segments.push(Segment::Markup(emote_markup(&span.emote_id)));
            cursor = span.end;
        }
        if cursor < char_count {
            segments.push(Segment::Text(body[offsets[cursor]..].to_string()));
        }
        segments
    }
}

/// Spans sorted by start, minus any that are empty, run past the body, or
/// overlap a span already accepted.
fn accepted_spans(emotes: &EmoteMap, char_count: usize) -> Vec<EmoteSpan> {
    let mut spans: Vec<EmoteSpan> = emotes.spans().collect();
    spans.sort_by_key(|s| s.start);

    let mut accepted: Vec<EmoteSpan> = Vec::with_capacity(spans.len());
    let mut last_end = 0;
    for span in spans {
        let reason = if span.start >= span.end {
            Some("empty range")
        } else if span.end > char_count {
            Some("range past end of message")
        } else if span.start < last_end {
            Some("overlaps previous emote")
        } else {
            None
        };
        match reason {
            Some(reason) => {
                warn!(emote_id = %span.emote_id, start = span.start, end = span.end, reason, "dropping emote span");
            }
            None => {
                last_end = span.end;
                accepted.push(span);
            }
        }
    }
    accepted
}
