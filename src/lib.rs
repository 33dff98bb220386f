pub mod config;
pub mod game;
pub mod protocol;
pub mod session;
pub mod shared;
pub mod transport;
