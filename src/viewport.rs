//! Deferred presentation of the render list.
//!
//! The render sink publishes a [`Snapshot`] after every message and moves on.
//! The viewport task wakes on the change, waits out the scroll delay, and
//! presents whatever snapshot is newest at that point, so bursts of messages
//! collapse into one presentation that still ends on the latest entry.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use colored::Colorize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::render::{RenderEntry, Snapshot};

pub const DEFAULT_SCROLL_DELAY_MS: u64 = 100;
pub const DEFAULT_SCROLL_DELAY: Duration = Duration::from_millis(DEFAULT_SCROLL_DELAY_MS);

pub trait Presenter: Send {
    fn present(&mut self, snapshot: &Snapshot);
}

/// Prints entries newer than the last one printed.
pub struct TerminalPresenter<W: Write + Send> {
    out: W,
    last_seq: Option<u64>,
}

impl TerminalPresenter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> TerminalPresenter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last_seq: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(entry: &RenderEntry) -> String {
        let name = match hex_rgb(&entry.color) {
            Some((r, g, b)) => entry.name_text.truecolor(r, g, b).bold().to_string(),
            None => entry.name_text.bold().to_string(),
        };
        format!(
            "{} [{}] {}: {}",
            entry.timestamp().dimmed(),
            entry.channel_label,
            name,
            entry.body_text
        )
    }
}

impl<W: Write + Send> Presenter for TerminalPresenter<W> {
    fn present(&mut self, snapshot: &Snapshot) {
        let last = self.last_seq;
        let fresh = snapshot
            .entries
            .iter()
            .filter(|e| last.map_or(true, |last| e.seq > last));
        for entry in fresh {
            if let Err(err) = writeln!(self.out, "{}", Self::line(entry)) {
                warn!(error = %err, "failed to write chat line");
                return;
            }
            self.last_seq = Some(entry.seq);
        }
        let _ = self.out.flush();
    }
}

/// Rewrites a standalone HTML page holding the whole list.
pub struct HtmlPresenter {
    path: PathBuf,
}

impl HtmlPresenter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn page(snapshot: &Snapshot) -> String {
        let mut page = String::from(concat!(
            "<!DOCTYPE html>\n<html>\n<head>\n",
            "<meta charset=\"utf-8\">\n",
            "<meta http-equiv=\"refresh\" content=\"2\">\n",
            "<title>Chat</title>\n",
            "<style>",
            "body{font-family:sans-serif;margin:0}",
            ".message-container{padding:2px 6px}",
            ".message-user{font-weight:bold;margin-right:4px}",
            ".message-channel{opacity:.6;margin-right:4px}",
            ".emoticon{vertical-align:middle}",
            "</style>\n</head>\n<body>\n<div id=\"chat\">\n"
        ));
        for entry in &snapshot.entries {
            page.push_str(&entry.to_html());
            page.push('\n');
        }
        page.push_str(concat!(
            "</div>\n",
            "<script>window.scrollTo({top: document.body.scrollHeight, behavior: 'smooth'});</script>\n",
            "</body>\n</html>\n"
        ));
        page
    }

    fn write(&self, snapshot: &Snapshot) -> std::io::Result<()> {
        let tmp = self.path.with_extension("html.tmp");
        std::fs::write(&tmp, Self::page(snapshot))?;
        std::fs::rename(&tmp, &self.path)
    }
}

impl Presenter for HtmlPresenter {
    fn present(&mut self, snapshot: &Snapshot) {
        if let Err(err) = self.write(snapshot) {
            warn!(path = %self.path.display(), error = %err, "failed to write chat page");
        }
    }
}

/// Runs until the render sink's sender is dropped.
pub fn spawn(
    mut rx: watch::Receiver<Snapshot>,
    delay: Duration,
    mut presenters: Vec<Box<dyn Presenter>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            tokio::time::sleep(delay).await;
            let snapshot = rx.borrow_and_update().clone();
            debug!(latest = ?snapshot.latest_seq(), "presenting chat");
            for presenter in presenters.iter_mut() {
                presenter.present(&snapshot);
            }
        }
    })
}

fn hex_rgb(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.strip_prefix('#').filter(|h| h.is_ascii())?;
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        6 => Some((channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?)),
        3 => {
            let mut it = hex.chars().map(|c| c.to_digit(16).map(|d| (d * 17) as u8));
            Some((it.next()??, it.next()??, it.next()??))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};

    use crate::entities::EntityEncoder;
    use crate::models::{ChatMessage, MessageSource};
    use crate::render::RenderSink;

    fn snapshot_of(bodies: &[&str]) -> Snapshot {
        let mut sink = RenderSink::new(10, EntityEncoder::default());
        for body in bodies {
            sink.render(ChatMessage::external("soda-arcade.com", "Bob", *body));
        }
        sink.list().snapshot()
    }

    #[test]
    fn terminal_prints_only_new_entries() {
        let mut presenter = TerminalPresenter::new(Vec::new());
        presenter.present(&snapshot_of(&["one"]));
        presenter.present(&snapshot_of(&["one", "two"]));
        let out = String::from_utf8(presenter.into_inner()).unwrap();
        assert_eq!(out.lines().count(), 2);
        assert!(out.lines().next().unwrap().contains(" [soda-arcade.com] "));
        assert!(out.lines().nth(1).unwrap().ends_with(": two"));
    }

    #[test]
    fn terminal_line_starts_with_receive_time() {
        colored::control::set_override(false);
        let entry = RenderEntry {
            seq: 0,
            source: MessageSource::External,
            channel_label: "soda-arcade.com".into(),
            label_html: "soda-arcade.com".into(),
            display_name: "Bob".into(),
            name_text: "Bob".into(),
            color: "inherit".into(),
            body_html: "hi".into(),
            body_text: "hi".into(),
            received_at: Local.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap(),
        };
        let line = TerminalPresenter::<Vec<u8>>::line(&entry);
        assert_eq!(line, "07:08:09 [soda-arcade.com] Bob: hi");
    }

    #[test]
    fn terminal_never_echoes_peer_escape_sequences() {
        let mut sink = RenderSink::new(10, EntityEncoder::default());
        sink.render(ChatMessage::external(
            "soda-arcade.com",
            "\u{1b}]0;pwned\u{7}Bob",
            "hi\u{1b}[2J\u{1b}[31mFAKE",
        ));
        let mut presenter = TerminalPresenter::new(Vec::new());
        presenter.present(&sink.list().snapshot());
        let out = String::from_utf8(presenter.into_inner()).unwrap();

        assert!(!out.contains("]0;pwned"));
        assert!(!out.contains("[2J"));
        assert!(!out.contains("[31mFAKE"));
        assert!(!out.contains('\u{7}'));
        assert!(out.trim_end().ends_with(": hiFAKE"));
    }

    #[test]
    fn page_contains_every_entry_and_scrolls() {
        let page = HtmlPresenter::page(&snapshot_of(&["a", "b"]));
        assert_eq!(page.matches("message-container\"").count(), 2);
        assert!(page.contains("message-channel parsec"));
        assert!(page.contains("scrollTo"));
    }

    #[test]
    fn hex_colors() {
        assert_eq!(hex_rgb("#FF8000"), Some((255, 128, 0)));
        assert_eq!(hex_rgb("#f00"), Some((255, 0, 0)));
        assert_eq!(hex_rgb("inherit"), None);
    }
}
