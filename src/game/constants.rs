pub const ARENA_WIDTH: f64 = 800.0;
pub const ARENA_HEIGHT: f64 = 600.0;
pub const FRAME_RATE: u64 = 60;
pub const BASE_RADIUS: u32 = 20;
pub const FOOD_GROWTH: u32 = 3;
pub const FOOD_MARGIN: i64 = 30;
pub const SPAWN_MARGIN: i64 = 100;
pub const BASE_SPEED: u32 = 5;
pub const SPEED_SIZE_DIVISOR: u32 = 60;
pub const MIN_SPEED: u32 = 1;
pub const ELIMINATION_MARGIN: u32 = 10;
pub const BROADCAST_INTERVAL_MS: u64 = 40;

pub const ROOM_BUCKET_SECS: u64 = 15;
pub const ROOM_FOOD_COUNT: usize = 12;
pub const ROOM_SMOOTHING: f64 = 0.15;

pub const GLOBAL_BUCKET_SECS: u64 = 20;
pub const GLOBAL_FOOD_COUNT: usize = 10;
pub const GLOBAL_SMOOTHING: f64 = 0.1;

pub const MIN_COLOR_CHANNEL: u8 = 50;
