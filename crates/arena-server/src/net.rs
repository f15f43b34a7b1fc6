//! Websocket transport.
//!
//! Each accepted socket gets its own task. The first text frame must be a
//! `join`; after that every text frame is forwarded to the session verbatim,
//! and a writer task drains the connection's outgoing queue. Connection ids
//! are assigned here and double as player entity ids.

use std::net::SocketAddr;

use arena_engine::prelude::*;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use tracing::{debug, info, warn};

use crate::session::SessionHandle;
use crate::ServerError;

/// Accept connections forever, handing each to its own task.
pub async fn accept_loop(listener: TcpListener, session: SessionHandle) -> Result<(), ServerError> {
    let mut next_id = 0u64;
    loop {
        let (stream, addr) = listener.accept().await.map_err(ServerError::Accept)?;
        next_id += 1;
        let id = EntityId::new(format!("conn-{next_id}"));
        debug!(%addr, player = %id, "accepted");
        let session = session.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, addr, id.clone(), session).await {
                warn!(player = %id, error = %err, "connection ended with an error");
            }
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    id: EntityId,
    session: SessionHandle,
) -> Result<(), ServerError> {
    let ws = accept_async(stream).await.map_err(ServerError::Handshake)?;
    let (mut write, mut read) = ws.split();

    let Some(name) = await_join(&mut read, &id).await? else {
        debug!(player = %id, "closed before joining");
        return Ok(());
    };
    info!(%addr, player = %id, %name, "joined");

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    if !session.connect(id.clone(), name, tx) {
        return Ok(());
    }

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if write.send(Message::text(frame)).await.is_err() {
                break;
            }
        }
        let _ = write.close().await;
    });

    while let Some(message) = read.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if !session.frame(id.clone(), text.as_str().to_owned()) {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                debug!(player = %id, error = %err, "read failed");
                break;
            }
        }
    }

    session.disconnect(id);
    // The session drops our sender on disconnect, which ends the writer.
    let _ = writer.await;
    Ok(())
}

/// Read frames until a `join` arrives. `None` if the socket closes first.
async fn await_join(
    read: &mut futures_util::stream::SplitStream<WebSocketStream<TcpStream>>,
    id: &EntityId,
) -> Result<Option<String>, ServerError> {
    while let Some(message) = read.next().await {
        let text = match message.map_err(ServerError::WebSocket)? {
            Message::Text(text) => text,
            Message::Close(_) => return Ok(None),
            _ => continue,
        };
        match ClientFrame::parse(text.as_str()) {
            Ok(ClientFrame::Join { name }) => return Ok(Some(name)),
            Ok(ClientFrame::Dispatch(_)) => debug!(player = %id, "dispatch before join, ignoring"),
            Err(err) => warn!(player = %id, error = %err, "malformed frame before join"),
        }
    }
    Ok(None)
}
