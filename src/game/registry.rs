use super::math::ease_toward;
use super::types::{PeerId, Rgb, Vec2};
use crate::protocol::{Message, StateUpdate};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerState {
  pub id: PeerId,
  pub position: Vec2,
  pub target_position: Vec2,
  pub size: u32,
  pub color: Rgb,
}

/// What applying one inbound message did to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
  Stop,
  Inserted(PeerId),
  Updated(PeerId),
  Removed(PeerId),
  Ignored,
}

#[derive(Debug)]
pub struct PeerRegistry {
  local_id: PeerId,
  peers: HashMap<PeerId, PeerState>,
}

impl PeerRegistry {
  pub fn new(local_id: PeerId) -> Self {
    Self {
      local_id,
      peers: HashMap::new(),
    }
  }

  pub fn local_id(&self) -> &PeerId {
    &self.local_id
  }

  pub fn apply(&mut self, message: Message) -> Applied {
    match message {
      Message::GameStop => Applied::Stop,
      Message::Remove { id } => {
        if self.peers.remove(&id).is_some() {
          tracing::debug!(peer_id = %id, "peer removed");
          Applied::Removed(id)
        } else {
          Applied::Ignored
        }
      }
      Message::State(update) => self.apply_state(update),
    }
  }

  fn apply_state(&mut self, update: StateUpdate) -> Applied {
    if update.id == self.local_id {
      return Applied::Ignored;
    }
    match self.peers.get_mut(&update.id) {
      Some(peer) => {
        peer.target_position = update.position;
        peer.size = update.size;
        Applied::Updated(update.id)
      }
      None => {
        tracing::debug!(peer_id = %update.id, size = update.size, "peer arrived");
        let id = update.id.clone();
        self.peers.insert(
          update.id.clone(),
          PeerState {
            id: update.id,
            position: update.position,
            target_position: update.position,
            size: update.size,
            color: update.color,
          },
        );
        Applied::Inserted(id)
      }
    }
  }

  pub fn smooth(&mut self, factor: f64) {
    for peer in self.peers.values_mut() {
      peer.position = ease_toward(peer.position, peer.target_position, factor);
    }
  }

  pub fn get(&self, id: &PeerId) -> Option<&PeerState> {
    self.peers.get(id)
  }

  pub fn iter(&self) -> impl Iterator<Item = &PeerState> {
    self.peers.values()
  }

  pub fn len(&self) -> usize {
    self.peers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.peers.is_empty()
  }

  pub fn clear(&mut self) {
    self.peers.clear();
  }

  /// Peers ordered by id so presentation output is stable between frames.
  pub fn snapshot(&self) -> Vec<PeerState> {
    let mut peers: Vec<PeerState> = self.peers.values().cloned().collect();
    peers.sort_by(|a, b| a.id.cmp(&b.id));
    peers
  }
}
