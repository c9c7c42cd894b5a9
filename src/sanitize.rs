//! Strips `<script>` and `<style>` blocks from chat text, and terminal control
//! sequences from the plain-text copy printed to the console.
//!
//! The block strip is a regex pass, not an HTML parser. Malformed or nested markup
//! (an unclosed tag, a block split across lines, a closing tag hidden inside an
//! attribute) gets through untouched, so it must never be treated as a security
//! boundary. Message bodies are entity-encoded before they reach here, which is
//! what actually keeps them inert.

use std::sync::OnceLock;

use regex::Regex;

fn script_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<script.*?>.*?</script>").expect("script pattern"))
}

fn style_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<style.*?>.*?</style>").expect("style pattern"))
}

/// Removes every script block, then every style block. Returns the input
/// unchanged when neither occurs.
pub fn sanitize(raw: &str) -> String {
    let stripped = script_block().replace_all(raw, "");
    style_block().replace_all(&stripped, "").into_owned()
}

/// Drops ANSI escape sequences and other control characters so peer text can
/// not move the cursor, retitle the window or clear the screen. Tabs and line
/// breaks become spaces; a chat line stays one line.
pub fn strip_terminal_controls(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\u{1b}' => skip_escape_sequence(&mut chars),
            // 8-bit CSI
            '\u{9b}' => skip_until_final_byte(&mut chars),
            '\t' | '\n' | '\r' => out.push(' '),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }

    out
}

fn skip_escape_sequence<I: Iterator<Item = char>>(chars: &mut std::iter::Peekable<I>) {
    match chars.next() {
        Some('[') => skip_until_final_byte(chars),
        // OSC, ended by BEL or ST
        Some(']') => skip_until_string_terminator(chars, true),
        // DCS, SOS, PM, APC, ended by ST
        Some('P' | 'X' | '^' | '_') => skip_until_string_terminator(chars, false),
        // Two-char escapes: the introducer already consumed the second char.
        _ => {}
    }
}

fn skip_until_final_byte<I: Iterator<Item = char>>(chars: &mut std::iter::Peekable<I>) {
    for c in chars.by_ref() {
        if ('\u{40}'..='\u{7e}').contains(&c) {
            break;
        }
    }
}

fn skip_until_string_terminator<I: Iterator<Item = char>>(
    chars: &mut std::iter::Peekable<I>,
    bel_ends: bool,
) {
    while let Some(c) = chars.next() {
        match c {
            '\u{7}' if bel_ends => break,
            '\u{9c}' => break,
            '\u{1b}' if chars.peek() == Some(&'\\') => {
                chars.next();
                break;
            }
            _ => {}
        }
    }
}
