pub mod constants;
pub mod profanity;
pub mod shared_wheel_game;
pub mod validation;
