use std::future::Future;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace};

use crate::bridge::{Bridge, ChatEvent, Outbound, Session};
use crate::config::RelayConfig;
use crate::entities::EntityEncoder;
use crate::error::Result;
use crate::render::{RenderSink, Snapshot};
use crate::viewport::{self, HtmlPresenter, Presenter, TerminalPresenter};
use crate::{local_socket, twitch};

/// Feeds both event streams into the session, one event at a time, until
/// `shutdown` resolves or both streams have ended.
pub async fn drive<O, S>(
    mut session: Session<O>,
    mut chat: mpsc::UnboundedReceiver<ChatEvent>,
    mut socket: mpsc::UnboundedReceiver<String>,
    shutdown: S,
) -> Session<O>
where
    O: Outbound,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut chat_open = true;
    let mut socket_open = true;

    while chat_open || socket_open {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutting down relay");
                break;
            }
            event = chat.recv(), if chat_open => match event {
                Some(event) => {
                    let dispatch = session.on_chat_event(event);
                    trace!(?dispatch, "chat event");
                }
                None => {
                    debug!("chat stream ended");
                    chat_open = false;
                }
            },
            text = socket.recv(), if socket_open => match text {
                Some(text) => {
                    let dispatch = session.on_socket_text(&text);
                    trace!(?dispatch, "socket event");
                }
                None => {
                    debug!("socket stream ended");
                    socket_open = false;
                }
            },
        }
    }

    session
}

/// Starts every component from `config` and relays until `shutdown`.
pub async fn run<S>(config: RelayConfig, shutdown: S) -> Result<()>
where
    S: Future<Output = ()>,
{
    let (scroll_tx, scroll_rx) = watch::channel(Snapshot::default());
    let mut presenters: Vec<Box<dyn Presenter>> = vec![Box::new(TerminalPresenter::stdout())];
    if let Some(path) = &config.html_out {
        presenters.push(Box::new(HtmlPresenter::new(path.clone())));
    }
    let viewport = viewport::spawn(scroll_rx, config.scroll_delay, presenters);

    let sink = RenderSink::new(config.limit, EntityEncoder::new(config.escape)).with_scroll(scroll_tx);

    let (chat_rx, twitch_task) = twitch::connect(&config.twitch)?;
    let (socket, socket_rx) = local_socket::connect(config.socket_url.clone());

    let session = Bridge::new(sink)
        .with_external_label(config.external_label.clone())
        .start(config.bridge.clone(), socket);

    let session = drive(session, chat_rx, socket_rx, shutdown).await;
    info!(rendered = session.sink().list().len(), "relay stopped");

    // Dropping the session closes the socket and lets the viewport finish.
    drop(session);
    twitch_task.abort();
    let _ = viewport.await;
    Ok(())
}
