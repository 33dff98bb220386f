use crate::game::types::{PeerId, Rgb, Vec2};
use std::fmt::Write;

pub const GAME_STOP: &str = "GAME_STOP";
pub const REMOVE_PREFIX: &str = "REMOVE:";

const FIELD_SEPARATOR: char = ':';
const COLOR_SEPARATOR: char = ',';

#[derive(Debug, Clone, PartialEq)]
pub struct StateUpdate {
  pub id: PeerId,
  pub position: Vec2,
  pub size: u32,
  pub color: Rgb,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
  GameStop,
  Remove { id: PeerId },
  State(StateUpdate),
}

/// Decodes a payload, checking `GAME_STOP`, then `REMOVE:`, then the state
/// update shape. Anything that does not match exactly is rejected.
pub fn decode_message(payload: &[u8]) -> Option<Message> {
  let text = std::str::from_utf8(payload).ok()?;
  if text == GAME_STOP {
    return Some(Message::GameStop);
  }
  if let Some(rest) = text.strip_prefix(REMOVE_PREFIX) {
    let id = PeerId::parse(rest)?;
    return Some(Message::Remove { id });
  }
  decode_state(text).map(Message::State)
}

fn decode_state(text: &str) -> Option<StateUpdate> {
  let mut fields = text.split(FIELD_SEPARATOR);
  let id = PeerId::parse(fields.next()?)?;
  let x = parse_coordinate(fields.next()?)?;
  let y = parse_coordinate(fields.next()?)?;
  let size = fields.next()?.parse::<u32>().ok()?;
  let color = parse_color(fields.next()?)?;
  if fields.next().is_some() {
    return None;
  }
  Some(StateUpdate {
    id,
    position: Vec2::new(x, y),
    size,
    color,
  })
}

fn parse_coordinate(field: &str) -> Option<f64> {
  field.parse::<f64>().ok().filter(|value| value.is_finite())
}

fn parse_color(field: &str) -> Option<Rgb> {
  let mut channels = field.split(COLOR_SEPARATOR);
  let r = channels.next()?.parse::<u8>().ok()?;
  let g = channels.next()?.parse::<u8>().ok()?;
  let b = channels.next()?.parse::<u8>().ok()?;
  if channels.next().is_some() {
    return None;
  }
  Some(Rgb::new(r, g, b))
}

pub fn encode_message(message: &Message) -> String {
  match message {
    Message::GameStop => GAME_STOP.to_string(),
    Message::Remove { id } => format!("{REMOVE_PREFIX}{id}"),
    Message::State(update) => encode_state(update),
  }
}

pub fn encode_state(update: &StateUpdate) -> String {
  let mut out = String::with_capacity(40);
  let _ = write!(
    out,
    "{}:{}:{}:{}:{},{},{}",
    update.id,
    update.position.x,
    update.position.y,
    update.size,
    update.color.r,
    update.color.g,
    update.color.b
  );
  out
}

pub fn encode_remove(id: &PeerId) -> String {
  encode_message(&Message::Remove { id: id.clone() })
}
