use std::fmt::Write;
use std::str::FromStr;

/// Which characters get turned into numeric references.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EscapeMode {
    /// `<`, `>`, `&` and the U+00A0..=U+9999 band, matching existing widget output.
    #[default]
    Legacy,
    /// The five HTML-significant characters `& < > " '`.
    Html,
}

impl FromStr for EscapeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "legacy" => Ok(EscapeMode::Legacy),
            "html" => Ok(EscapeMode::Html),
            other => Err(format!("unknown escape mode '{other}' (expected legacy or html)")),
        }
    }
}

/// A piece of a message being assembled for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal chat text, still to be escaped.
    Text(String),
    /// Markup we produced ourselves; never escaped again.
    Markup(String),
}

impl Segment {
    pub fn as_str(&self) -> &str {
        match self {
            Segment::Text(s) | Segment::Markup(s) => s,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EntityEncoder {
    mode: EscapeMode,
}

impl EntityEncoder {
    pub fn new(mode: EscapeMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> EscapeMode {
        self.mode
    }

    fn needs_escape(&self, c: char) -> bool {
        match self.mode {
            EscapeMode::Legacy => matches!(c, '<' | '>' | '&' | '\u{A0}'..='\u{9999}'),
            EscapeMode::Html => matches!(c, '<' | '>' | '&' | '"' | '\''),
        }
    }

    /// Escapes a whole string.
    pub fn encode(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        for c in input.chars() {
            if self.needs_escape(c) {
                // Writing to a String cannot fail.
                let _ = write!(out, "&#{};", c as u32);
            } else {
                out.push(c);
            }
        }
        out
    }

    /// Escapes the text segments in place, leaving markup segments as they are.
    pub fn encode_segments(&self, segments: &mut [Segment]) {
        for segment in segments.iter_mut() {
            if let Segment::Text(text) = segment {
                *text = self.encode(text);
            }
        }
    }
}
