//! Push-channel client.
//!
//! Holds a Socket.IO connection to the backend over the WebSocket transport and forwards
//! `bot_log` / `bot_finished` notifications to the panel. The connection is re-established
//! after a fixed delay whenever it drops.

pub mod frame;

use crate::model::PanelConfig;
use crate::panel::PanelEvent;
use anyhow::{Context, Result};
use frame::{EnginePacket, SocketPacket};
use futures::{SinkExt, StreamExt};
use reqwest::Url;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Connection transitions reported alongside pushed notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Connected,
    Disconnected(String),
}

/// Resolve the WebSocket URL: an explicit override, or `<base>/socket.io/` with the
/// scheme switched to `ws`/`wss`.
pub fn events_url(cfg: &PanelConfig) -> Result<Url> {
    if let Some(explicit) = cfg.events_url.as_deref() {
        return Url::parse(explicit).with_context(|| format!("invalid events URL {explicit:?}"));
    }
    let mut url = Url::parse(&cfg.base_url)
        .with_context(|| format!("invalid base URL {:?}", cfg.base_url))?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow::anyhow!("cannot derive a WebSocket URL from {}", cfg.base_url))?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("base URL {} cannot carry a path", cfg.base_url))?
        .pop_if_empty()
        .push("socket.io")
        .push("");
    url.set_query(Some("EIO=4&transport=websocket"));
    Ok(url)
}

/// Keep the push channel alive until the receiving side goes away.
pub async fn run_push_channel(cfg: PanelConfig, tx: UnboundedSender<PanelEvent>) {
    let url = match events_url(&cfg) {
        Ok(url) => url,
        Err(e) => {
            let _ = tx.send(PanelEvent::Channel(ChannelEvent::Disconnected(format!(
                "{e:#}"
            ))));
            return;
        }
    };

    loop {
        info!(%url, "connecting push channel");
        let reason = match session(url.as_str(), cfg.connect_timeout, &tx).await {
            Ok(()) => "closed by server".to_string(),
            Err(e) => format!("{e:#}"),
        };
        if tx.is_closed() {
            break;
        }
        warn!(%reason, "push channel disconnected");
        if tx
            .send(PanelEvent::Channel(ChannelEvent::Disconnected(reason)))
            .is_err()
        {
            break;
        }
        tokio::time::sleep(cfg.reconnect_delay).await;
    }
}

/// One connection lifetime. Returns `Ok` when the server closes cleanly or the panel is gone,
/// and an error when the server misses its ping deadline.
async fn session(
    url: &str,
    connect_timeout: Duration,
    tx: &UnboundedSender<PanelEvent>,
) -> Result<()> {
    let (ws, _) = tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(url))
        .await
        .map_err(|_| anyhow::anyhow!("connect timed out after {connect_timeout:?}"))?
        .context("connect push channel")?;
    let (mut sink, mut stream) = ws.split();

    // Armed by the handshake; every server ping pushes the deadline out again.
    let mut liveness: Option<Duration> = None;
    let mut deadline: Option<Instant> = None;

    loop {
        let next = match deadline {
            Some(at) => tokio::time::timeout_at(at, stream.next())
                .await
                .map_err(|_| anyhow::anyhow!("ping timeout"))?,
            None => stream.next().await,
        };
        let Some(msg) = next else {
            return Ok(());
        };
        let text = match msg.context("read push channel")? {
            Message::Text(text) => text,
            Message::Close(_) => return Ok(()),
            _ => continue,
        };
        match frame::decode(&text) {
            Ok(EnginePacket::Open(handshake)) => {
                debug!(
                    sid = %handshake.sid,
                    ping_interval = handshake.ping_interval,
                    ping_timeout = handshake.ping_timeout,
                    "engine.io open"
                );
                liveness = handshake.liveness_window();
                deadline = liveness.map(|window| Instant::now() + window);
                sink.send(Message::Text(frame::encode_connect(frame::DEFAULT_NAMESPACE)))
                    .await
                    .context("send namespace connect")?;
            }
            Ok(EnginePacket::Ping(payload)) => {
                deadline = liveness.map(|window| Instant::now() + window);
                sink.send(Message::Text(frame::encode_pong(&payload)))
                    .await
                    .context("send pong")?;
            }
            Ok(EnginePacket::Message(SocketPacket::Connect { .. })) => {
                if tx.send(PanelEvent::Channel(ChannelEvent::Connected)).is_err() {
                    return Ok(());
                }
            }
            Ok(EnginePacket::Message(SocketPacket::ConnectError { data, .. })) => {
                anyhow::bail!("namespace connect refused: {data}");
            }
            Ok(EnginePacket::Message(SocketPacket::Disconnect { .. }))
            | Ok(EnginePacket::Close) => {
                return Ok(());
            }
            Ok(EnginePacket::Message(SocketPacket::Event { name, data, .. })) => {
                match frame::to_push_event(&name, &data) {
                    Some(ev) => {
                        if tx.send(PanelEvent::Push(ev)).is_err() {
                            return Ok(());
                        }
                    }
                    None => debug!(event = %name, "ignoring push event"),
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, frame = %text, "malformed push frame"),
        }
    }
}
