use super::constants::{ARENA_HEIGHT, ARENA_WIDTH, FOOD_MARGIN};
use super::math::distance;
use super::types::Vec2;
use crate::config::Variant;
use crate::shared::room_token::room_hash;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionSeed(pub u64);

impl SessionSeed {
  pub fn for_room(room_token: &str) -> Self {
    Self(room_hash(room_token))
  }

  pub fn global() -> Self {
    Self(0)
  }

  pub fn for_variant(variant: Variant, room_token: &str) -> Self {
    match variant {
      Variant::Rooms => Self::for_room(room_token),
      Variant::Global => Self::global(),
    }
  }
}

pub fn time_bucket(now: SystemTime, bucket_duration: Duration) -> u64 {
  let secs = now.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64();
  (secs / bucket_duration.as_secs_f64()).floor() as u64
}

/// Food visible to this peer during one time bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoodSet {
  pub bucket: u64,
  pub items: Vec<Vec2>,
}

impl FoodSet {
  /// Eats items in list order. Each item strictly within the current `size`
  /// of `center` is removed and grows `size` by `growth` before the next item
  /// is checked. Returns how many were eaten.
  pub fn consume_growing(&mut self, center: Vec2, size: &mut u32, growth: u32) -> usize {
    let before = self.items.len();
    self.items.retain(|item| {
      if distance(center, *item) < *size as f64 {
        *size = size.saturating_add(growth);
        false
      } else {
        true
      }
    });
    before - self.items.len()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}

pub fn generate(bucket: u64, seed: SessionSeed, count: usize) -> FoodSet {
  let mut rng = ChaCha8Rng::seed_from_u64(bucket.wrapping_add(seed.0));
  let max_x = ARENA_WIDTH as i64 - FOOD_MARGIN;
  let max_y = ARENA_HEIGHT as i64 - FOOD_MARGIN;
  let items = (0..count)
    .map(|_| {
      let x = rng.gen_range(FOOD_MARGIN..=max_x);
      let y = rng.gen_range(FOOD_MARGIN..=max_y);
      Vec2::new(x as f64, y as f64)
    })
    .collect();
  FoodSet { bucket, items }
}

/// Tracks the current bucket and regenerates the food set when it rolls over.
#[derive(Debug, Clone)]
pub struct World {
  seed: SessionSeed,
  bucket_duration: Duration,
  food_count: usize,
  food: FoodSet,
}

impl World {
  pub fn new(variant: Variant, room_token: &str, now: SystemTime) -> Self {
    let seed = SessionSeed::for_variant(variant, room_token);
    let bucket_duration = variant.bucket_duration();
    let food_count = variant.food_count();
    let bucket = time_bucket(now, bucket_duration);
    Self {
      seed,
      bucket_duration,
      food_count,
      food: generate(bucket, seed, food_count),
    }
  }

  /// Returns true when a new bucket replaced the food set.
  pub fn refresh(&mut self, now: SystemTime) -> bool {
    let bucket = time_bucket(now, self.bucket_duration);
    if bucket == self.food.bucket {
      return false;
    }
    self.food = generate(bucket, self.seed, self.food_count);
    tracing::debug!(bucket, items = self.food.len(), "food regenerated");
    true
  }

  pub fn food(&self) -> &FoodSet {
    &self.food
  }

  pub fn food_mut(&mut self) -> &mut FoodSet {
    &mut self.food
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;

  #[test]
  fn same_bucket_and_room_give_identical_food() {
    let seed = SessionSeed::for_room("ABCD");
    let first = generate(100, seed, 12);
    let second = generate(100, seed, 12);
    assert_eq!(first, second);
    assert_eq!(first.len(), 12);
  }

  #[test]
  fn different_rooms_or_buckets_diverge() {
    let abcd = generate(100, SessionSeed::for_room("ABCD"), 12);
    let wxyz = generate(100, SessionSeed::for_room("WXYZ"), 12);
    let later = generate(101, SessionSeed::for_room("ABCD"), 12);
    assert_ne!(abcd.items, wxyz.items);
    assert_ne!(abcd.items, later.items);
  }

  #[test]
  fn food_stays_inside_margin() {
    let food = generate(7, SessionSeed::global(), 500);
    for item in &food.items {
      assert!(item.x >= 30.0 && item.x <= 770.0);
      assert!(item.y >= 30.0 && item.y <= 570.0);
      assert_eq!(item.x.fract(), 0.0);
    }
  }

  #[test]
  fn bucket_is_floor_of_elapsed_time() {
    let now = UNIX_EPOCH + Duration::from_millis(29_999);
    assert_eq!(time_bucket(now, Duration::from_secs(15)), 1);
    let now = UNIX_EPOCH + Duration::from_secs(30);
    assert_eq!(time_bucket(now, Duration::from_secs(15)), 2);
  }

  #[test]
  fn consume_removes_only_items_in_reach() {
    let mut food = FoodSet {
      bucket: 0,
      items: vec![
        Vec2::new(50.0, 50.0),
        Vec2::new(60.0, 50.0),
        Vec2::new(300.0, 300.0),
      ],
    };
    let mut size = 10;
    let eaten = food.consume_growing(Vec2::new(50.0, 50.0), &mut size, 0);
    assert_eq!(eaten, 1);
    assert_eq!(size, 10);
    assert_eq!(food.items, vec![Vec2::new(60.0, 50.0), Vec2::new(300.0, 300.0)]);
  }

  #[test]
  fn growth_extends_reach_for_later_items() {
    let mut food = FoodSet {
      bucket: 0,
      items: vec![Vec2::new(119.0, 100.0), Vec2::new(122.0, 100.0)],
    };
    let mut size = 20;
    let eaten = food.consume_growing(Vec2::new(100.0, 100.0), &mut size, 3);
    assert_eq!(eaten, 2);
    assert_eq!(size, 26);
    assert!(food.is_empty());
  }

  #[test]
  fn refresh_regenerates_only_on_new_bucket() {
    let start = UNIX_EPOCH + Duration::from_secs(15 * 1000);
    let mut world = World::new(Variant::Rooms, "ABCD", start);
    world.food_mut().items.clear();
    assert!(!world.refresh(start + Duration::from_secs(14)));
    assert!(world.food().is_empty());
    assert!(world.refresh(start + Duration::from_secs(15)));
    assert_eq!(world.food().len(), 12);
    assert_eq!(world.food().bucket, 1001);
  }

  #[test]
  fn global_variant_ignores_room_token() {
    let now = UNIX_EPOCH + Duration::from_secs(20 * 5);
    let a = World::new(Variant::Global, "ABCD", now);
    let b = World::new(Variant::Global, "WXYZ", now);
    assert_eq!(a.food(), b.food());
    assert_eq!(a.food().len(), 10);
  }

  proptest! {
    #[test]
    fn generation_is_deterministic(bucket in any::<u64>(), seed in any::<u64>()) {
      let first = generate(bucket, SessionSeed(seed), 12);
      let second = generate(bucket, SessionSeed(seed), 12);
      prop_assert_eq!(first, second);
    }
  }
}
