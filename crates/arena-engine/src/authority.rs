//! The authoritative replication role.
//!
//! An [`Authority`] owns the canonical [`Game`], the tick loop and the
//! [`Referee`]. Every action it applies, whatever its origin (client, system,
//! schedule or reaction), goes through [`Authority::dispatch`]: augmented,
//! applied, logged and broadcast, in that order, one at a time. Mirrors that
//! apply the broadcast stream in order therefore reach the same state.
//!
//! The authority does no I/O. Outgoing messages collect in an outbox of
//! [`Envelope`]s that the transport drains after each call.

use std::collections::VecDeque;
use std::sync::Arc;

use arena_ecs::prelude::*;
use tracing::{debug, info, warn};

use crate::action::{Action, PlayerDescriptor};
use crate::config::RulesConfig;
use crate::game::Game;
use crate::log::ActionLog;
use crate::map::TileMap;
use crate::protocol::{self, ClientFrame};
use crate::reducer;
use crate::rules::{self, Referee};
use crate::state::GameState;
use crate::tick::{ActionBuffer, TickConfig, TickLoop};

/// An outgoing action and who should receive it.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Every connected mirror, including the originator.
    Broadcast(Action),
    /// A single connection.
    To(EntityId, Action),
}

pub struct Authority {
    game: Game,
    tick_loop: TickLoop,
    referee: Referee,
    connections: Vec<EntityId>,
    outbox: Vec<Envelope>,
    log: ActionLog,
}

impl Authority {
    /// A new authority with the standard rule systems installed. Call
    /// [`start`](Self::start) to load the map.
    pub fn new(map: Arc<TileMap>, tick: TickConfig, rules: RulesConfig) -> Self {
        let mut tick_loop = TickLoop::new(tick);
        rules::install_systems(&mut tick_loop);
        let log = ActionLog::new(rules.checkpoint_interval_ticks);
        Self {
            game: Game::new(map),
            tick_loop,
            referee: Referee::new(rules),
            connections: Vec::new(),
            outbox: Vec::new(),
            log,
        }
    }

    /// Replace the action log, e.g. with [`ActionLog::disabled`].
    pub fn with_log(mut self, log: ActionLog) -> Self {
        self.log = log;
        self
    }

    /// Begin a game: dispatch `INIT_GAME` for everyone currently connected.
    pub fn start(&mut self, started_at_ms: u64) {
        info!(players = self.connections.len(), "starting game");
        self.dispatch(Action::InitGame {
            players: self.connections.clone(),
            started_at_ms: Some(started_at_ms),
        });
    }

    // -- connection lifecycle ----------------------------------------------

    /// A mirror connected as `id` with display name `name`.
    ///
    /// The newcomer first gets a direct `INIT_GAME` carrying the current
    /// roster and start time (plus removals for map pickups already taken),
    /// then everyone gets the `PLAYER_JOIN` and a `SYNC_ALL_PLAYERS`, and
    /// finally the newcomer gets the positions, held inputs and health of live
    /// players.
    /// Other players' ammunition is not replayed and may differ on the
    /// newcomer until they respawn.
    pub fn connect(&mut self, id: EntityId, name: impl Into<String>) {
        let name = name.into();
        if self.connections.contains(&id) {
            warn!(player = %id, "duplicate connection id, ignoring");
            return;
        }
        info!(player = %id, %name, "player connected");
        self.connections.push(id.clone());

        let state = self.game.state();
        let bootstrap = Action::InitGame {
            players: state.roster.clone(),
            started_at_ms: Some(state.started_at_ms),
        };
        let fresh = reducer::reduce(GameState::new(), &bootstrap, self.game.map());
        let taken: Vec<EntityId> = fresh
            .entities
            .group(ComponentKind::Pickup)
            .filter(|p| !state.entities.contains(p.id.as_str()))
            .map(|p| p.id.clone())
            .collect();
        self.outbox.push(Envelope::To(id.clone(), bootstrap));
        for pickup in taken {
            self.outbox
                .push(Envelope::To(id.clone(), Action::RemoveEntity { id: pickup }));
        }

        self.dispatch(Action::PlayerJoin {
            player: PlayerDescriptor::new(id.clone(), name),
        });
        let resync = self.game.state().sync_all_players();
        self.dispatch(resync);

        // The roster sync spawns live players at the origin with idle input on
        // the newcomer; replay where they are, what they hold and their health.
        let mut catch_up = Vec::new();
        for e in self.game.state().entities.group(ComponentKind::Player) {
            if e.ghost.is_some() || e.id == id {
                continue;
            }
            if let Some(health) = e.health.filter(|h| h.hp < h.max_hp) {
                catch_up.push(Action::HitPlayer {
                    id: e.id.clone(),
                    hp: health.hp,
                });
            }
            if let Some(controller) = &e.controller {
                for (input, value) in &controller.input {
                    if value.is_active() {
                        catch_up.push(Action::SetInput {
                            id: e.id.clone(),
                            input: input.clone(),
                            value: *value,
                        });
                    }
                }
            }
            catch_up.push(Action::sync_player(e));
        }
        for action in catch_up {
            self.outbox.push(Envelope::To(id.clone(), action));
        }
    }

    /// The connection `id` is gone.
    pub fn disconnect(&mut self, id: &EntityId) {
        if !self.connections.contains(id) {
            return;
        }
        info!(player = %id, "player disconnected");
        self.connections.retain(|c| c != id);
        self.dispatch(Action::PlayerLeave { id: id.clone() });
    }

    /// An action submitted by connection `sender`.
    pub fn receive(&mut self, sender: &EntityId, action: Action) {
        if let Some(admitted) = self.referee.admit(self.game.state(), sender, action) {
            self.dispatch(admitted);
        }
    }

    /// A raw client frame from `sender`. Malformed input is logged and dropped.
    pub fn receive_frame(&mut self, sender: &EntityId, text: &str) {
        let frame = match ClientFrame::parse(text) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(player = %sender, error = %err, "dropping malformed frame");
                return;
            }
        };
        match frame {
            ClientFrame::Join { .. } => {
                debug!(player = %sender, "join frame after connect, ignoring");
            }
            ClientFrame::Dispatch(payload) => match protocol::decode_value(payload) {
                Ok(Some(action)) => self.receive(sender, action),
                Ok(None) => {}
                Err(err) => warn!(player = %sender, error = %err, "dropping malformed action"),
            },
        }
    }

    // -- simulation --------------------------------------------------------

    /// Run one fixed tick: scheduled actions, then systems.
    pub fn tick(&mut self) {
        let tick = self.tick_loop.tick_count();
        let actions = self
            .tick_loop
            .tick(self.game.state(), self.referee.rules());
        for action in actions {
            if self.referee.confirm(self.game.state(), &action) {
                self.dispatch(action);
            } else {
                debug!(kind = action.kind(), "dropping outdated action");
            }
        }
        self.log.checkpoint(tick + 1, self.game.state());
    }

    /// Apply and broadcast `action` plus any immediate reactions, in order.
    pub fn dispatch(&mut self, action: Action) {
        let mut queue = VecDeque::from([action]);
        while let Some(action) = queue.pop_front() {
            let action = self.referee.augment(self.game.state(), action);
            if matches!(action, Action::InitGame { .. }) {
                self.tick_loop.clear_schedule();
            }
            self.game.dispatch(&action);
            self.log.record(self.tick_loop.tick_count(), &action);

            let mut reactions = ActionBuffer::new();
            self.referee.react(
                self.game.state(),
                &action,
                self.tick_loop.fixed_dt(),
                &mut reactions,
            );
            self.outbox.push(Envelope::Broadcast(action));

            let (now, later) = reactions.into_parts();
            for (delay, deferred) in later {
                self.tick_loop.schedule_after(delay, deferred);
            }
            queue.extend(now);
        }
    }

    /// Take every message queued since the last call, in send order.
    pub fn drain_outbox(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.outbox)
    }

    // -- accessors ----------------------------------------------------------

    pub fn state(&self) -> &GameState {
        self.game.state()
    }

    pub fn connections(&self) -> &[EntityId] {
        &self.connections
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_loop.tick_count()
    }

    pub fn tick_loop(&self) -> &TickLoop {
        &self.tick_loop
    }

    pub fn log(&self) -> &ActionLog {
        &self.log
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
