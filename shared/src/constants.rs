pub const API_BANNER: &str = "🎉 Lucky Wheel API is running!";

pub const DEFAULT_DAILY_SPIN_QUOTA: i32 = 2;
pub const DEFAULT_MIN_NAME_LENGTH: usize = 3;
pub const DEFAULT_MAX_NAME_LENGTH: usize = 32;
pub const DEFAULT_LEADERBOARD_LIMIT: u32 = 10;
pub const MAX_LEADERBOARD_LIMIT: u32 = 100;

pub const EMPTY_NAME_ERROR: &str = "Name must not be empty";
pub const INVALID_NAME_ERROR: &str = "Name contains invalid characters";
pub const NEGATIVE_PRIZE_ERROR: &str = "Prize must be a non-negative integer";
pub const PLAYER_NOT_FOUND_ERROR: &str = "Player not found";
pub const QUOTA_EXCEEDED_ERROR: &str = "No spins left today. Come back tomorrow!";
pub const STORAGE_UNAVAILABLE_ERROR: &str = "Storage temporarily unavailable, please try again";
