// src/connectors/socketio.rs
use crate::connectors::messages::{
    decode_engine_frame, EnginePacket, SocketPacket, ENGINE_PONG, SOCKET_CONNECT,
};
use crate::connectors::traits::StreamClient;
use crate::types::Trigger;
use anyhow::Result;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use url::Url;

type Subscribers = Arc<RwLock<HashMap<String, Vec<mpsc::UnboundedSender<()>>>>>;

/// One shared Socket.IO connection fanning named events out to per-topic
/// subscribers. The connection task starts on the first subscription.
pub struct SocketIoClient {
    endpoint: Url,
    reconnect_delay: Duration,
    subscribers: Subscribers,
    started: bool,
}

impl SocketIoClient {
    pub fn new(push_url: &str, reconnect_delay: Duration) -> Result<Self> {
        Ok(Self {
            endpoint: socket_io_endpoint(push_url)?,
            reconnect_delay,
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            started: false,
        })
    }

    fn spawn_connection(&self) {
        let endpoint = self.endpoint.clone();
        let delay = self.reconnect_delay;
        let subscribers = Arc::clone(&self.subscribers);

        info!("Starting Socket.IO task for {}", endpoint);
        tokio::spawn(async move {
            loop {
                match run_session(&endpoint, &subscribers).await {
                    Ok(()) => warn!("Socket.IO connection closed, reconnecting"),
                    Err(e) => error!("Socket.IO connection error: {:#}", e),
                }
                // Stop once every engine has gone away.
                if all_closed(&subscribers).await {
                    info!("No live subscribers left, Socket.IO task finished");
                    break;
                }
                tokio::time::sleep(delay).await;
            }
        });
    }
}

#[async_trait]
impl StreamClient for SocketIoClient {
    async fn subscribe_topic(&mut self, topic: &str, sender: mpsc::Sender<Trigger>) -> Result<()> {
        let forwarder = spawn_forwarder(topic.to_string(), sender);
        self.subscribers
            .write()
            .await
            .entry(topic.to_string())
            .or_default()
            .push(forwarder);
        info!("Subscribed to push topic {}", topic);

        if !self.started {
            self.started = true;
            self.spawn_connection();
        }
        Ok(())
    }
}

fn socket_io_endpoint(push_url: &str) -> Result<Url> {
    let mut url = Url::parse(push_url)?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => anyhow::bail!("unsupported push url scheme {other}"),
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow::anyhow!("cannot switch {push_url} to {scheme}"))?;
    url.set_path("/socket.io/");
    url.set_query(Some("EIO=4&transport=websocket"));
    Ok(url)
}

async fn run_session(endpoint: &Url, subscribers: &Subscribers) -> Result<()> {
    let (ws_stream, _) = connect_async(endpoint.as_str()).await?;
    let (mut write, mut read) = ws_stream.split();
    info!("Socket.IO websocket connected to {}", endpoint);

    while let Some(message) = read.next().await {
        let text = match message? {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        match decode_engine_frame(&text) {
            Some(EnginePacket::Open(handshake)) => {
                debug!("Engine.IO handshake: {}", handshake);
                write.send(Message::Text(SOCKET_CONNECT.to_string())).await?;
            }
            Some(EnginePacket::Ping) => {
                write.send(Message::Text(ENGINE_PONG.to_string())).await?;
            }
            Some(EnginePacket::Close) => break,
            Some(EnginePacket::Message(SocketPacket::Connect)) => {
                info!("Socket.IO namespace connected");
            }
            Some(EnginePacket::Message(SocketPacket::Event { name })) => {
                dispatch(subscribers, &name).await;
            }
            Some(EnginePacket::Message(SocketPacket::ConnectError(reason))) => {
                anyhow::bail!("namespace connect refused: {reason}");
            }
            Some(EnginePacket::Message(SocketPacket::Disconnect)) => break,
            Some(_) => {}
            None => debug!("Ignoring unknown frame {:?}", text),
        }
    }
    Ok(())
}

/// Moves signals for one subscriber from the socket into its engine queue.
/// Waiting on a full engine queue happens here, never in the read loop, so
/// pings keep getting answered. Exits once the engine is gone.
fn spawn_forwarder(topic: String, sender: mpsc::Sender<Trigger>) -> mpsc::UnboundedSender<()> {
    let (signal_tx, mut signal_rx) = mpsc::unbounded_channel::<()>();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                signal = signal_rx.recv() => match signal {
                    Some(()) => {
                        if sender.send(Trigger::DataChanged).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                _ = sender.closed() => break,
            }
        }
        warn!("Subscriber for {} is gone", topic);
    });
    signal_tx
}

/// Queues one signal per subscriber of `topic`. Never waits on an engine.
async fn dispatch(subscribers: &Subscribers, topic: &str) {
    let guard = subscribers.read().await;
    let Some(forwarders) = guard.get(topic) else {
        debug!("No subscriber for event {}", topic);
        return;
    };
    for forwarder in forwarders {
        if forwarder.send(()).is_err() {
            debug!("Dropping {} signal for a closed subscriber", topic);
        }
    }
}

async fn all_closed(subscribers: &Subscribers) -> bool {
    subscribers
        .read()
        .await
        .values()
        .flatten()
        .all(|forwarder| forwarder.is_closed())
}
