use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("no channel given (use --channel, --query or answer the prompt)")]
    MissingChannel,

    #[error("message limit must be at least 1")]
    InvalidLimit,

    #[error("failed to read session settings from stdin: {0}")]
    Prompt(#[source] std::io::Error),

    #[error("failed to join twitch channel {channel}: {source}")]
    Join {
        channel: String,
        #[source]
        source: twitch_irc::validate::Error,
    },

    #[error("malformed socket envelope: {0}")]
    Envelope(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;

/// Returned when a frame cannot be queued for the local peer.
#[derive(Debug, Error)]
#[error("local socket is not open")]
pub struct SocketClosed;
