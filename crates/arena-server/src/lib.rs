//! Arena Server -- the authoritative websocket host for the arena shooter.
//!
//! The server owns one [`Session`](session::Session) running the authority's
//! fixed-rate tick loop, accepts websocket clients, and relays frames between
//! them. All game semantics live in [`arena_engine`]; this crate only deals
//! with sockets, tasks and configuration.

#![deny(unsafe_code)]

pub mod config;
pub mod net;
pub mod session;

use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arena_engine::prelude::*;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::info;

use crate::config::ServerConfig;
use crate::session::Session;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration file: {0}")]
    Config(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to load map {}: {source}", path.display())]
    Map { path: PathBuf, source: MapError },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    #[error("websocket handshake failed: {0}")]
    Handshake(tokio_tungstenite::tungstenite::Error),

    #[error("websocket error: {0}")]
    WebSocket(tokio_tungstenite::tungstenite::Error),

    #[error("session task failed: {0}")]
    Session(#[from] tokio::task::JoinError),

    #[error("failed to write action log to {}: {source}", path.display())]
    Record {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to encode action log: {0}")]
    Encode(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Bind the configured address and serve until `shutdown` resolves.
pub async fn run(
    config: ServerConfig,
    shutdown: impl Future<Output = ()>,
) -> Result<(), ServerError> {
    let listener = TcpListener::bind(config.bind)
        .await
        .map_err(|source| ServerError::Bind {
            addr: config.bind,
            source,
        })?;
    info!(addr = %config.bind, "listening");
    serve(listener, config, shutdown).await
}

/// Serve on an already bound listener until `shutdown` resolves, then write
/// the action log if recording is configured.
pub async fn serve(
    listener: TcpListener,
    config: ServerConfig,
    shutdown: impl Future<Output = ()>,
) -> Result<(), ServerError> {
    let map = Arc::new(config.load_map()?);
    let (session, handle) = Session::new(map, config.tick.clone(), config.rules.clone());
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let session_task = tokio::spawn(session.run(async move {
        let _ = stop_rx.await;
    }));

    let accepted = tokio::select! {
        result = net::accept_loop(listener, handle) => result,
        () = shutdown => {
            info!("shutting down");
            Ok(())
        }
    };

    let _ = stop_tx.send(());
    let authority = session_task.await?;
    accepted?;

    if let Some(path) = &config.record {
        write_log(authority.log(), path)?;
        info!(path = %path.display(), actions = authority.log().len(), "action log written");
    }
    Ok(())
}

fn write_log(log: &ActionLog, path: &Path) -> Result<(), ServerError> {
    let text = log.to_json()?;
    std::fs::write(path, text).map_err(|source| ServerError::Record {
        path: path.to_owned(),
        source,
    })
}
