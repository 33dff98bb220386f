pub mod room_token;
