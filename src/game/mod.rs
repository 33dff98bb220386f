pub mod autopilot;
pub mod constants;
pub mod math;
pub mod player;
pub mod registry;
pub mod types;
pub mod world;
