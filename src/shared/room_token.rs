use crate::config::{Variant, GLOBAL_TOPIC_SUFFIX};
use rand::Rng;
use sha2::{Digest, Sha256};

pub const MAX_ROOM_TOKEN_LENGTH: usize = 8;

/// Uppercases and strips a user-typed room token down to the characters a
/// topic segment can carry safely.
pub fn sanitize_room_token(value: &str) -> Option<String> {
    let mut cleaned = String::with_capacity(MAX_ROOM_TOKEN_LENGTH);
    for ch in value.trim().chars() {
        if cleaned.len() >= MAX_ROOM_TOKEN_LENGTH {
            break;
        }
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
            cleaned.push(ch.to_ascii_uppercase());
        }
    }
    if cleaned.is_empty() {
        return None;
    }
    Some(cleaned)
}

pub fn generate_room_token() -> String {
    rand::thread_rng().gen_range(1000..=9999).to_string()
}

pub fn topic_for(prefix: &str, variant: Variant, room_token: &str) -> String {
    match variant {
        Variant::Rooms => format!("{prefix}{room_token}"),
        Variant::Global => format!("{prefix}{GLOBAL_TOPIC_SUFFIX}"),
    }
}

/// Stable across processes and platforms, unlike `std`'s hasher.
pub fn room_hash(room_token: &str) -> u64 {
    let digest = Sha256::digest(room_token.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}
