use super::types::Vec2;

pub fn distance(a: Vec2, b: Vec2) -> f64 {
  (a.x - b.x).hypot(a.y - b.y)
}

pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
  value.min(max).max(min)
}

pub fn ease_toward(current: Vec2, target: Vec2, factor: f64) -> Vec2 {
  Vec2 {
    x: current.x + (target.x - current.x) * factor,
    y: current.y + (target.y - current.y) * factor,
  }
}
