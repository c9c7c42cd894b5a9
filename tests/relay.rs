use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tempfile::tempdir;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;

use twitch_soda_relay::entities::EntityEncoder;
use twitch_soda_relay::local_socket::{self, SocketState};
use twitch_soda_relay::models::{ChatUser, MessageSource};
use twitch_soda_relay::relay::drive;
use twitch_soda_relay::render::{RenderSink, Snapshot};
use twitch_soda_relay::viewport::{self, HtmlPresenter, Presenter};
use twitch_soda_relay::{Bridge, BridgeConfig, ChatEvent, Outbound};

fn localhost_socket(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}

fn chat_event(message: &str) -> ChatEvent {
    ChatEvent {
        channel: "#vedal987".into(),
        user: ChatUser {
            username: "alice".into(),
            display_name: Some("Alice".into()),
            ..ChatUser::default()
        },
        message: message.into(),
        is_self: false,
    }
}

fn bridge() -> Bridge {
    Bridge::new(RenderSink::new(100, EntityEncoder::default()))
}

/// Accepts one websocket client, sends `frames`, optionally waits for one
/// text frame back, then closes. Resolves to the frame received, if any.
async fn spawn_peer(
    frames: Vec<&'static str>,
    expect_reply: bool,
) -> (SocketAddr, oneshot::Receiver<Option<String>>) {
    let listener = TcpListener::bind(localhost_socket(0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (done_tx, done_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        for frame in frames {
            ws.send(WsMessage::Text(frame.into())).await.unwrap();
        }
        let mut reply = None;
        if expect_reply {
            while let Some(Ok(msg)) = ws.next().await {
                if let WsMessage::Text(text) = msg {
                    reply = Some(text.to_string());
                    break;
                }
            }
        }
        let _ = ws.close(None).await;
        let _ = done_tx.send(reply);
    });

    (addr, done_rx)
}

#[tokio::test(flavor = "multi_thread")]
async fn relays_both_directions_over_local_socket() {
    let (addr, done_rx) = spawn_peer(
        vec![r#"{"event":"chat:message","data":{"user":{"name":"Bob"},"message":"hi from soda"}}"#],
        true,
    )
    .await;

    let (socket, socket_rx) = local_socket::connect(format!("ws://{}", addr));
    assert_eq!(socket.settled().await, SocketState::Open);

    let session = bridge().start(
        BridgeConfig {
            channel: "vedal987".into(),
            broadcast: true,
        },
        socket,
    );

    let (chat_tx, chat_rx) = mpsc::unbounded_channel();
    chat_tx.send(chat_event("hello soda")).unwrap();
    drop(chat_tx);

    let session = timeout(
        Duration::from_secs(5),
        drive(session, chat_rx, socket_rx, std::future::pending()),
    )
    .await
    .unwrap();

    let forwarded = done_rx.await.unwrap().expect("peer got a forwarded frame");
    let value: Value = serde_json::from_str(&forwarded).unwrap();
    assert_eq!(value["event"], "chat:external");
    assert_eq!(value["data"]["message"], "hello soda");
    assert_eq!(value["data"]["user"]["username"], "alice");

    let list = session.sink().list();
    assert_eq!(list.len(), 2);
    let external = list
        .iter()
        .find(|e| e.source == MessageSource::External)
        .unwrap();
    assert_eq!(external.display_name, "Bob");
    assert_eq!(external.color, "inherit");
    assert!(list.iter().any(|e| e.source == MessageSource::Twitch));
}

#[tokio::test(flavor = "multi_thread")]
async fn bad_and_unknown_frames_do_not_stop_the_stream() {
    let (addr, done_rx) = spawn_peer(
        vec![
            "{not json",
            r#"{"event":"unknown:thing","data":{}}"#,
            r#"{"event":"chat:message","data":{"user":{"name":"Bob"},"message":"survived"}}"#,
        ],
        false,
    )
    .await;

    let (socket, socket_rx) = local_socket::connect(format!("ws://{}", addr));
    let session = bridge().start(
        BridgeConfig {
            channel: "vedal987".into(),
            broadcast: false,
        },
        socket,
    );

    let (chat_tx, chat_rx) = mpsc::unbounded_channel::<ChatEvent>();
    drop(chat_tx);

    let session = timeout(
        Duration::from_secs(5),
        drive(session, chat_rx, socket_rx, std::future::pending()),
    )
    .await
    .unwrap();
    done_rx.await.unwrap();

    let list = session.sink().list();
    assert_eq!(list.len(), 1);
    assert_eq!(list.latest().unwrap().body_text, "survived");
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_peer_leaves_socket_closed() {
    let listener = TcpListener::bind(localhost_socket(0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (socket, _socket_rx) = local_socket::connect(format!("ws://{}", addr));
    assert_eq!(socket.settled().await, SocketState::Closed);
    assert!(!socket.is_open());
    assert!(socket.send_text("dropped".into()).is_err());

    // Broadcasting with a closed socket still renders.
    let mut session = bridge().start(
        BridgeConfig {
            channel: "vedal987".into(),
            broadcast: true,
        },
        socket,
    );
    let dispatch = session.on_chat_event(chat_event("still shown"));
    assert_eq!(
        dispatch,
        twitch_soda_relay::Dispatch::Rendered {
            seq: 0,
            forwarded: false
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_stops_the_loop() {
    let (_chat_tx, chat_rx) = mpsc::unbounded_channel::<ChatEvent>();
    let (_socket_tx, socket_rx) = mpsc::unbounded_channel::<String>();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let (socket, _rx) = local_socket::connect("ws://127.0.0.1:1");
    let session = bridge().start(
        BridgeConfig {
            channel: "vedal987".into(),
            broadcast: false,
        },
        socket,
    );

    let handle = tokio::spawn(async move {
        let session = drive(session, chat_rx, socket_rx, async move {
            let _ = stop_rx.await;
        })
        .await;
        session.sink().list().len()
    });

    stop_tx.send(()).unwrap();
    let rendered = timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    assert_eq!(rendered, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn viewport_writes_latest_page() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("chat.html");

    let (scroll_tx, scroll_rx) = watch::channel(Snapshot::default());
    let presenters: Vec<Box<dyn Presenter>> = vec![Box::new(HtmlPresenter::new(path.clone()))];
    let handle = viewport::spawn(scroll_rx, Duration::from_millis(10), presenters);

    let mut sink = RenderSink::new(2, EntityEncoder::default()).with_scroll(scroll_tx);
    for body in ["first", "second", "third"] {
        sink.render(twitch_soda_relay::ChatMessage::external("soda-arcade.com", "Bob", body));
    }
    drop(sink);

    timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();

    let page = std::fs::read_to_string(&path).unwrap();
    assert!(!page.contains(">first<"));
    assert!(page.contains(">second<"));
    assert!(page.contains(">third<"));
    assert!(page.find(">second<").unwrap() < page.find(">third<").unwrap());
}
