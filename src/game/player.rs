use super::constants::{
  ARENA_HEIGHT, ARENA_WIDTH, BASE_RADIUS, BASE_SPEED, ELIMINATION_MARGIN, FOOD_GROWTH,
  MIN_COLOR_CHANNEL, MIN_SPEED, SPAWN_MARGIN, SPEED_SIZE_DIVISOR,
};
use super::math::{clamp, distance};
use super::registry::PeerState;
use super::types::{PeerId, Rgb, Vec2};
use super::world::FoodSet;
use crate::protocol::StateUpdate;
use rand::Rng;
use serde::Serialize;

/// Directional intents for one frame. Opposite directions cancel out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputIntent {
  pub left: bool,
  pub right: bool,
  pub up: bool,
  pub down: bool,
}

impl InputIntent {
  pub fn is_idle(&self) -> bool {
    !(self.left || self.right || self.up || self.down)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepOutcome {
  pub moved: bool,
  pub eaten: usize,
  /// The first peer in reach this frame that the local player can swallow.
  pub eliminated: Option<PeerId>,
}

impl StepOutcome {
  pub fn changed(&self) -> bool {
    self.moved || self.eaten > 0
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalState {
  pub id: PeerId,
  pub position: Vec2,
  pub size: u32,
  pub color: Rgb,
}

impl LocalState {
  pub fn spawn(id: PeerId, color: Rgb) -> Self {
    let mut state = Self {
      id,
      position: Vec2::default(),
      size: BASE_RADIUS,
      color,
    };
    state.reset();
    state
  }

  pub fn reset(&mut self) {
    let mut rng = rand::thread_rng();
    self.position = Vec2::new(
      rng.gen_range(SPAWN_MARGIN..=ARENA_WIDTH as i64 - SPAWN_MARGIN) as f64,
      rng.gen_range(SPAWN_MARGIN..=ARENA_HEIGHT as i64 - SPAWN_MARGIN) as f64,
    );
    self.size = BASE_RADIUS;
  }

  pub fn speed(&self) -> u32 {
    BASE_SPEED
      .saturating_sub(self.size / SPEED_SIZE_DIVISOR)
      .max(MIN_SPEED)
  }

  /// Moves, clamps, eats and looks for a peer this player can swallow.
  pub fn step<'a>(
    &mut self,
    input: InputIntent,
    food: &mut FoodSet,
    peers: impl IntoIterator<Item = &'a PeerState>,
  ) -> StepOutcome {
    let mut outcome = StepOutcome::default();
    let speed = self.speed() as f64;
    if input.left {
      self.position.x -= speed;
      outcome.moved = true;
    }
    if input.right {
      self.position.x += speed;
      outcome.moved = true;
    }
    if input.up {
      self.position.y -= speed;
      outcome.moved = true;
    }
    if input.down {
      self.position.y += speed;
      outcome.moved = true;
    }
    self.clamp_to_arena();

    outcome.eaten = food.consume_growing(self.position, &mut self.size, FOOD_GROWTH);

    outcome.eliminated = peers
      .into_iter()
      .find(|peer| self.can_eliminate(peer))
      .map(|peer| peer.id.clone());
    outcome
  }

  pub fn can_eliminate(&self, peer: &PeerState) -> bool {
    distance(self.position, peer.position) < self.size as f64
      && self.size > peer.size.saturating_add(ELIMINATION_MARGIN)
  }

  fn clamp_to_arena(&mut self) {
    let radius = self.size as f64;
    self.position.x = clamp(self.position.x, radius, (ARENA_WIDTH - radius).max(radius));
    self.position.y = clamp(self.position.y, radius, (ARENA_HEIGHT - radius).max(radius));
  }

  pub fn to_update(&self) -> StateUpdate {
    StateUpdate {
      id: self.id.clone(),
      position: self.position,
      size: self.size,
      color: self.color,
    }
  }
}

pub fn random_color() -> Rgb {
  let mut rng = rand::thread_rng();
  Rgb::new(
    rng.gen_range(MIN_COLOR_CHANNEL..=u8::MAX),
    rng.gen_range(MIN_COLOR_CHANNEL..=u8::MAX),
    rng.gen_range(MIN_COLOR_CHANNEL..=u8::MAX),
  )
}
