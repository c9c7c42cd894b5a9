use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

use crate::bridge::Outbound;
use crate::error::SocketClosed;

pub const DEFAULT_SOCKET_URL: &str = "ws://localhost:9002";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Connecting,
    Open,
    Closed,
}

/// Handle to the connection with the local peer.
#[derive(Debug, Clone)]
pub struct LocalSocket {
    state: watch::Receiver<SocketState>,
    outgoing: mpsc::UnboundedSender<String>,
}

impl LocalSocket {
    pub fn state(&self) -> SocketState {
        *self.state.borrow()
    }

    /// Waits until the connection attempt has either succeeded or failed.
    pub async fn settled(&self) -> SocketState {
        let mut state = self.state.clone();
        let settled = match state.wait_for(|s| *s != SocketState::Connecting).await {
            Ok(s) => *s,
            Err(_) => SocketState::Closed,
        };
        settled
    }
}

impl Outbound for LocalSocket {
    fn is_open(&self) -> bool {
        self.state() == SocketState::Open
    }

    fn send_text(&self, text: String) -> Result<(), SocketClosed> {
        if !self.is_open() {
            return Err(SocketClosed);
        }
        self.outgoing.send(text).map_err(|_| SocketClosed)
    }
}

/// Starts connecting to `url` in the background.
///
/// Returns the handle used for forwarding and a receiver of inbound text
/// frames. There is no reconnect: once the peer goes away the handle stays
/// closed and forwarding is skipped.
pub fn connect(url: impl Into<String>) -> (LocalSocket, mpsc::UnboundedReceiver<String>) {
    let url = url.into();
    let (state_tx, state_rx) = watch::channel(SocketState::Connecting);
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (in_tx, in_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        run_connection(&url, &state_tx, out_rx, in_tx).await;
        state_tx.send_replace(SocketState::Closed);
        info!(url = %url, "local socket closed");
    });

    (
        LocalSocket {
            state: state_rx,
            outgoing: out_tx,
        },
        in_rx,
    )
}

async fn run_connection(
    url: &str,
    state: &watch::Sender<SocketState>,
    mut outgoing: mpsc::UnboundedReceiver<String>,
    incoming: mpsc::UnboundedSender<String>,
) {
    let (ws_stream, _) = match connect_async(url).await {
        Ok(s) => s,
        Err(e) => {
            warn!(url = %url, error = %e, "failed to connect to local socket");
            return;
        }
    };
    state.send_replace(SocketState::Open);
    info!(url = %url, "connected to local socket");

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if incoming.send(text.to_string()).is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "local socket sent close");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "local socket read failed");
                    break;
                }
                None => break,
            },
            text = outgoing.recv() => match text {
                Some(text) => {
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        warn!(error = %e, "local socket send failed");
                        break;
                    }
                }
                None => {
                    let _ = write.close().await;
                    break;
                }
            },
        }
    }
}
