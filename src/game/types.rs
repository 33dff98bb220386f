use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
  pub x: f64,
  pub y: f64,
}

impl Vec2 {
  pub const fn new(x: f64, y: f64) -> Self {
    Self { x, y }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
  pub r: u8,
  pub g: u8,
  pub b: u8,
}

impl Rgb {
  pub const fn new(r: u8, g: u8, b: u8) -> Self {
    Self { r, g, b }
  }
}

/// Short per-process peer identifier carried in every state update.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
  pub const LEN: usize = 8;

  pub fn generate() -> Self {
    let simple = uuid::Uuid::new_v4().simple().to_string();
    Self(simple[..Self::LEN].to_string())
  }

  /// Accepts any non-empty id that cannot collide with the wire separators.
  pub fn parse(value: &str) -> Option<Self> {
    if value.is_empty()
      || value.contains(&[':', ','][..])
      || value.chars().any(char::is_whitespace)
    {
      return None;
    }
    Some(Self(value.to_string()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for PeerId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}
