use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::bridge::DEFAULT_EXTERNAL_LABEL;
use crate::entities::EscapeMode;
use crate::error::{RelayError, Result};
use crate::local_socket::DEFAULT_SOCKET_URL;
use crate::models::BridgeConfig;
use crate::render::DEFAULT_LIMIT;
use crate::twitch::TwitchOptions;
use crate::viewport::DEFAULT_SCROLL_DELAY_MS;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Relays Twitch chat to the terminal, an HTML page and Smash Soda")]
pub struct Args {
    /// Twitch channel to join (prompted for when missing)
    #[arg(long, env = "RELAY_CHANNEL")]
    pub channel: Option<String>,

    /// Forward Twitch chat to the local socket as chat:external
    #[arg(long, env = "RELAY_BROADCAST")]
    pub broadcast: bool,

    /// Session settings in URL query form, e.g. "?channel=vedal987&broadcast=on"
    #[arg(long)]
    pub query: Option<String>,

    /// Maximum number of messages kept on screen
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    pub limit: usize,

    #[arg(long, env = "RELAY_SOCKET_URL", default_value = DEFAULT_SOCKET_URL)]
    pub socket_url: String,

    /// Also keep an HTML page of the chat at this path
    #[arg(long)]
    pub html_out: Option<PathBuf>,

    /// Character escaping: legacy or html
    #[arg(long, default_value = "legacy")]
    pub escape: EscapeMode,

    /// Channel label for messages coming from the local socket
    #[arg(long, default_value = DEFAULT_EXTERNAL_LABEL)]
    pub external_label: String,

    #[arg(long, env = "TWITCH_USERNAME")]
    pub username: Option<String>,

    #[arg(long, env = "TWITCH_OAUTH_TOKEN", hide_env_values = true)]
    pub oauth_token: Option<String>,

    #[arg(long, default_value_t = DEFAULT_SCROLL_DELAY_MS)]
    pub scroll_delay_ms: u64,
}

/// Everything the relay needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bridge: BridgeConfig,
    pub limit: usize,
    pub socket_url: String,
    pub html_out: Option<PathBuf>,
    pub escape: EscapeMode,
    pub external_label: String,
    pub twitch: TwitchOptions,
    pub scroll_delay: Duration,
}

/// Channel and broadcast settings as a form or URL would carry them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionParams {
    pub channel: Option<String>,
    pub broadcast: Option<bool>,
}

fn truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "on" | "true" | "1" | "yes" | "y"
    )
}

impl SessionParams {
    /// Reads `channel` and `broadcast` from a query string or a full URL.
    /// `+` decodes to a space and percent escapes are decoded.
    pub fn from_query(input: &str) -> Self {
        let query = match input.split_once('?') {
            Some((_, rest)) => rest,
            None => input,
        };
        let query = query.split('#').next().unwrap_or_default();

        let mut params = SessionParams::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "channel" if params.channel.is_none() => {
                    let channel = value.trim();
                    if !channel.is_empty() {
                        params.channel = Some(channel.to_string());
                    }
                }
                "broadcast" if params.broadcast.is_none() => {
                    params.broadcast = Some(truthy(&value));
                }
                _ => {}
            }
        }
        params
    }

    /// Asks for the channel and broadcast toggle on a terminal.
    pub fn prompt<R: BufRead, W: Write>(mut input: R, mut output: W) -> Result<Self> {
        let mut ask = |question: &str| -> Result<String> {
            write!(output, "{question}").map_err(RelayError::Prompt)?;
            output.flush().map_err(RelayError::Prompt)?;
            let mut line = String::new();
            input.read_line(&mut line).map_err(RelayError::Prompt)?;
            Ok(line.trim().to_string())
        };

        let channel = ask("Twitch channel: ")?;
        let broadcast = ask("Broadcast chat to Smash Soda? [y/N]: ")?;
        Ok(SessionParams {
            channel: (!channel.is_empty()).then_some(channel),
            broadcast: Some(truthy(&broadcast)),
        })
    }
}

impl Args {
    /// Flags win over `--query`; the prompt is only used when neither names a
    /// channel.
    pub fn resolve<R: BufRead, W: Write>(self, input: R, output: W) -> Result<RelayConfig> {
        if self.limit == 0 {
            return Err(RelayError::InvalidLimit);
        }

        let from_query = self
            .query
            .as_deref()
            .map(SessionParams::from_query)
            .unwrap_or_default();

        let flag_channel = self
            .channel
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        let (channel, broadcast) = match flag_channel.or(from_query.channel) {
            Some(channel) => (channel, self.broadcast || from_query.broadcast.unwrap_or(false)),
            None => {
                let prompted = SessionParams::prompt(input, output)?;
                let channel = prompted.channel.ok_or(RelayError::MissingChannel)?;
                (
                    channel,
                    self.broadcast || prompted.broadcast.unwrap_or(false),
                )
            }
        };

        Ok(RelayConfig {
            twitch: TwitchOptions {
                channel: channel.clone(),
                username: self.username,
                oauth_token: self.oauth_token,
            },
            bridge: BridgeConfig { channel, broadcast },
            limit: self.limit,
            socket_url: self.socket_url,
            html_out: self.html_out,
            escape: self.escape,
            external_label: self.external_label,
            scroll_delay: Duration::from_millis(self.scroll_delay_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["twitch-soda-relay"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn query_params_decode_like_a_form() {
        let params = SessionParams::from_query("https://example.test/chat?channel=ved+al%39&broadcast=on#top");
        assert_eq!(params.channel.as_deref(), Some("ved al9"));
        assert_eq!(params.broadcast, Some(true));

        let params = SessionParams::from_query("channel=vedal987");
        assert_eq!(params.channel.as_deref(), Some("vedal987"));
        assert_eq!(params.broadcast, None);
    }

    #[test]
    fn flags_take_precedence_over_query() {
        let config = args(&["--channel", "flagged", "--query", "?channel=queried&broadcast=on"])
            .resolve(&b""[..], Vec::new())
            .unwrap();
        assert_eq!(config.bridge.channel, "flagged");
        assert!(config.bridge.broadcast);
    }

    #[test]
    fn prompts_when_no_channel_given() {
        let mut out = Vec::new();
        let config = args(&[])
            .resolve(&b"vedal987\ny\n"[..], &mut out)
            .unwrap();
        assert_eq!(config.bridge.channel, "vedal987");
        assert!(config.bridge.broadcast);
        assert!(String::from_utf8(out).unwrap().contains("Twitch channel"));
    }

    #[test]
    fn empty_prompt_is_an_error() {
        let err = args(&[]).resolve(&b"\n\n"[..], Vec::new()).unwrap_err();
        assert!(matches!(err, RelayError::MissingChannel));
    }

    #[test]
    fn defaults() {
        let config = args(&["--channel", "x"]).resolve(&b""[..], Vec::new()).unwrap();
        assert_eq!(config.limit, 100);
        assert_eq!(config.socket_url, "ws://localhost:9002");
        assert_eq!(config.escape, EscapeMode::Legacy);
        assert_eq!(config.external_label, "soda-arcade.com");
        assert_eq!(config.scroll_delay, Duration::from_millis(100));
        assert_eq!(config.scroll_delay, crate::viewport::DEFAULT_SCROLL_DELAY);
        assert!(!config.bridge.broadcast);
    }

    #[test]
    fn scroll_delay_flag_overrides_default() {
        let config = args(&["--channel", "x", "--scroll-delay-ms", "250"])
            .resolve(&b""[..], Vec::new())
            .unwrap();
        assert_eq!(config.scroll_delay, Duration::from_millis(250));
    }

    #[test]
    fn zero_limit_is_rejected() {
        let err = args(&["--channel", "x", "--limit", "0"])
            .resolve(&b""[..], Vec::new())
            .unwrap_err();
        assert!(matches!(err, RelayError::InvalidLimit));
    }
}
