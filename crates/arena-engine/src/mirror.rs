//! The mirror replication role.
//!
//! A [`Mirror`] reconstructs the authority's state by applying the broadcast
//! action stream in order. Local intents are never applied optimistically:
//! [`Mirror::submit`] only queues them for sending, and the authority's
//! rebroadcast copy is what eventually changes the mirror's state.

use std::sync::Arc;

use arena_ecs::prelude::*;
use tracing::{debug, warn};

use crate::action::Action;
use crate::game::Game;
use crate::map::TileMap;
use crate::protocol::{ClientFrame, ProtocolError, ServerFrame};
use crate::scene::SceneDirective;
use crate::state::GameState;

pub struct Mirror {
    id: Option<EntityId>,
    game: Game,
    pending: Vec<Action>,
    received: u64,
}

impl Mirror {
    pub fn new(map: Arc<TileMap>) -> Self {
        Self {
            id: None,
            game: Game::new(map),
            pending: Vec::new(),
            received: 0,
        }
    }

    /// The connection id the authority assigned, once known.
    pub fn id(&self) -> Option<&EntityId> {
        self.id.as_ref()
    }

    pub fn set_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    /// Queue a local intent for the authority. State is untouched.
    pub fn submit(&mut self, action: Action) {
        if !action.is_client_submittable() {
            debug!(kind = action.kind(), "authority will ignore this kind");
        }
        self.pending.push(action);
    }

    /// Take the queued intents, in submission order.
    pub fn drain_outgoing(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.pending)
    }

    /// Encode and take the queued intents as client frames.
    pub fn drain_frames(&mut self) -> Result<Vec<String>, ProtocolError> {
        self.drain_outgoing()
            .iter()
            .map(|action| ClientFrame::dispatch(action)?.to_json())
            .collect()
    }

    /// Apply one action from the authority.
    pub fn receive(&mut self, action: &Action) {
        self.game.dispatch(action);
        self.received += 1;
    }

    /// Apply one server frame. Malformed frames are logged and dropped.
    pub fn receive_frame(&mut self, text: &str) {
        match ServerFrame::parse(text) {
            Ok(ServerFrame::Welcome { id }) => {
                debug!(player = %id, "welcomed");
                self.set_id(id);
            }
            Ok(ServerFrame::Dispatch(action)) => self.receive(&action),
            Err(err) => warn!(error = %err, "dropping malformed server frame"),
        }
    }

    pub fn state(&self) -> &GameState {
        self.game.state()
    }

    pub fn state_hash(&self) -> String {
        self.game.state_hash()
    }

    /// Presentation directives produced since the last call.
    pub fn drain_scene(&mut self) -> Vec<SceneDirective> {
        self.game.drain_scene()
    }

    /// Number of authority actions applied.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// This mirror's own player entity, live or ghost.
    pub fn own_entity(&self) -> Option<&Entity> {
        let id = self.id.as_ref()?;
        self.game.state().entities.get(id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_does_not_touch_state() {
        let mut m = Mirror::new(Arc::new(TileMap::default_arena()));
        let before = m.state_hash();
        m.submit(Action::shoot_bullet("p1"));
        assert_eq!(m.state_hash(), before);
        assert_eq!(m.drain_outgoing(), vec![Action::shoot_bullet("p1")]);
        assert!(m.drain_outgoing().is_empty());
    }

    #[test]
    fn receive_frame_applies_dispatches() {
        let mut m = Mirror::new(Arc::new(TileMap::default_arena()));
        m.set_id("p1".into());
        let frame = ServerFrame::Dispatch(Action::player_join("p1", "ann"))
            .to_json()
            .unwrap();
        m.receive_frame(&frame);
        m.receive_frame("garbage");
        assert_eq!(m.received(), 1);
        assert!(m.own_entity().is_some_and(|e| e.ghost.is_some()));
    }

    #[test]
    fn welcome_frame_sets_id() {
        let mut m = Mirror::new(Arc::new(TileMap::empty()));
        assert!(m.id().is_none());
        m.receive_frame(r#"{"event":"welcome","payload":{"id":"conn-3"}}"#);
        assert_eq!(m.id().map(EntityId::as_str), Some("conn-3"));
        assert_eq!(m.received(), 0);
    }

    #[test]
    fn frames_wrap_intents() {
        let mut m = Mirror::new(Arc::new(TileMap::empty()));
        m.submit(Action::ReloadStart { id: "p1".into() });
        let frames = m.drain_frames().unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].starts_with(r#"{"event":"dispatch""#));
    }
}
