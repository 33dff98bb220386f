use super::math::distance;
use super::player::{InputIntent, LocalState};
use super::world::FoodSet;

const DEAD_ZONE: f64 = 2.0;

/// Steers toward the nearest food item. Drives the headless peer in place of
/// keyboard input.
pub fn steer_to_nearest_food(local: &LocalState, food: &FoodSet) -> InputIntent {
  let mut nearest = None;
  for item in &food.items {
    let dist = distance(local.position, *item);
    match nearest {
      Some((_, best)) if dist >= best => {}
      _ => nearest = Some((*item, dist)),
    }
  }

  let Some((target, _)) = nearest else { return InputIntent::default() };
  let dx = target.x - local.position.x;
  let dy = target.y - local.position.y;
  InputIntent {
    left: dx < -DEAD_ZONE,
    right: dx > DEAD_ZONE,
    up: dy < -DEAD_ZONE,
    down: dy > DEAD_ZONE,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::game::types::{PeerId, Rgb, Vec2};

  fn local_at(x: f64, y: f64) -> LocalState {
    LocalState {
      id: PeerId::parse("a001").expect("id"),
      position: Vec2::new(x, y),
      size: 20,
      color: Rgb::new(80, 80, 80),
    }
  }

  #[test]
  fn heads_for_closest_item() {
    let food = FoodSet {
      bucket: 0,
      items: vec![Vec2::new(700.0, 500.0), Vec2::new(150.0, 90.0)],
    };
    let input = steer_to_nearest_food(&local_at(200.0, 100.0), &food);
    assert_eq!(
      input,
      InputIntent {
        left: true,
        up: true,
        ..InputIntent::default()
      }
    );
  }

  #[test]
  fn idles_without_food() {
    let food = FoodSet {
      bucket: 0,
      items: Vec::new(),
    };
    assert!(steer_to_nearest_food(&local_at(200.0, 100.0), &food).is_idle());
  }
}
