//! The authoritative game session.
//!
//! A [`Session`] owns the [`Authority`] and is driven from a single task: a
//! fixed-period timer (or, headless, a bare loop) calls [`Authority::tick`],
//! and connection tasks feed it [`Event`]s over an unbounded channel. Nothing
//! else touches the game state, so dispatch order is the order in which the
//! session task handles work.
//!
//! After every tick or event the outbox is flushed: broadcasts are encoded
//! once and queued to every connection, direct messages to one.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use arena_engine::prelude::*;
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Frames queued to one connection's writer task.
pub type Outgoing = mpsc::UnboundedSender<String>;

/// Work for the session task.
#[derive(Debug)]
pub enum Event {
    /// A client finished its `join` handshake.
    Connect {
        id: EntityId,
        name: String,
        outgoing: Outgoing,
    },
    /// A text frame from a joined client.
    Frame { id: EntityId, text: String },
    /// The connection closed.
    Disconnect { id: EntityId },
}

/// Cloneable sender side of a session's event channel.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    events: mpsc::UnboundedSender<Event>,
}

impl SessionHandle {
    /// Returns `false` when the session has stopped.
    pub fn connect(&self, id: EntityId, name: String, outgoing: Outgoing) -> bool {
        self.send(Event::Connect { id, name, outgoing })
    }

    pub fn frame(&self, id: EntityId, text: String) -> bool {
        self.send(Event::Frame { id, text })
    }

    pub fn disconnect(&self, id: EntityId) -> bool {
        self.send(Event::Disconnect { id })
    }

    fn send(&self, event: Event) -> bool {
        self.events.send(event).is_ok()
    }
}

pub struct Session {
    authority: Authority,
    clients: HashMap<EntityId, Outgoing>,
    events: mpsc::UnboundedReceiver<Event>,
}

impl Session {
    pub fn new(map: Arc<TileMap>, tick: TickConfig, rules: RulesConfig) -> (Self, SessionHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Self {
            authority: Authority::new(map, tick, rules),
            clients: HashMap::new(),
            events: rx,
        };
        (session, SessionHandle { events: tx })
    }

    /// Load the map and dispatch `INIT_GAME`.
    pub fn start(&mut self) {
        let started_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64);
        self.authority.start(started_at_ms);
        self.flush();
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Connect { id, name, outgoing } => {
                if self.clients.contains_key(&id) {
                    warn!(player = %id, "connection id already in use");
                    return;
                }
                match (ServerFrame::Welcome { id: id.clone() }).to_json() {
                    Ok(frame) => {
                        let _ = outgoing.send(frame);
                    }
                    Err(err) => warn!(player = %id, error = %err, "failed to encode welcome"),
                }
                self.clients.insert(id.clone(), outgoing);
                self.authority.connect(id, name);
            }
            Event::Frame { id, text } => {
                if !self.clients.contains_key(&id) {
                    debug!(player = %id, "frame from unknown connection");
                    return;
                }
                self.authority.receive_frame(&id, &text);
            }
            Event::Disconnect { id } => {
                if self.clients.remove(&id).is_some() {
                    self.authority.disconnect(&id);
                }
            }
        }
        self.flush();
    }

    pub fn tick(&mut self) {
        self.authority.tick();
        self.flush();
    }

    /// Route the authority's outbox to the connections.
    ///
    /// A failed send means the writer task is gone; its `Disconnect` event is
    /// already on the way.
    fn flush(&mut self) {
        for envelope in self.authority.drain_outbox() {
            let (to, action) = match envelope {
                Envelope::Broadcast(action) => (None, action),
                Envelope::To(id, action) => (Some(id), action),
            };
            let frame = match ServerFrame::Dispatch(action).to_json() {
                Ok(frame) => frame,
                Err(err) => {
                    warn!(error = %err, "failed to encode action, dropping");
                    continue;
                }
            };
            match to {
                None => {
                    for outgoing in self.clients.values() {
                        let _ = outgoing.send(frame.clone());
                    }
                }
                Some(id) => {
                    if let Some(outgoing) = self.clients.get(&id) {
                        let _ = outgoing.send(frame);
                    }
                }
            }
        }
    }

    /// Run until `shutdown` resolves or every [`SessionHandle`] is dropped,
    /// then hand back the authority (and with it the action log).
    ///
    /// Ticks follow the configured period, or run back to back in headless
    /// mode, yielding to connection events between ticks.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Authority {
        self.start();
        let config = self.authority.tick_loop().config().clone();
        let mut interval = (!config.headless).then(|| {
            let mut interval = tokio::time::interval(config.period());
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });
        info!(period = ?config.period(), headless = config.headless, "session running");

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = next_tick(&mut interval) => self.tick(),
                event = self.events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                () = &mut shutdown => break,
            }
        }

        info!(
            ticks = self.authority.tick_count(),
            logged = self.authority.log().len(),
            "session stopped"
        );
        self.authority
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => tokio::task::yield_now().await,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
