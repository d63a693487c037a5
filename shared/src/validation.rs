use std::borrow::Cow;
use validator::ValidationError;

use crate::constants::*;
use crate::profanity::ProfanityFilter;

/// Rules a player name must satisfy before it reaches the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamePolicy {
    pub min_length: usize,
    pub max_length: usize,
    pub filter_profanity: bool,
}

impl Default for NamePolicy {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_NAME_LENGTH,
            max_length: DEFAULT_MAX_NAME_LENGTH,
            filter_profanity: true,
        }
    }
}

fn rejection(code: &'static str, message: String) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Owned(message));
    err
}

impl NamePolicy {
    /// Validates `raw` and returns the trimmed name the ledger keys on.
    pub fn validate(&self, raw: &str) -> Result<String, ValidationError> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(rejection("empty_name", EMPTY_NAME_ERROR.to_string()));
        }

        let length = name.chars().count();
        if length < self.min_length.max(1) {
            return Err(rejection(
                "name_too_short",
                format!("Name must be at least {} characters", self.min_length),
            ));
        }
        if length > self.max_length {
            return Err(rejection(
                "name_too_long",
                format!("Name must be at most {} characters", self.max_length),
            ));
        }
        if name.chars().any(char::is_control) {
            return Err(rejection("invalid_name", INVALID_NAME_ERROR.to_string()));
        }
        if self.filter_profanity {
            ProfanityFilter::validate_player_name(name)
                .map_err(|msg| rejection("inappropriate_name", msg))?;
        }

        Ok(name.to_string())
    }
}

/// Prizes are caller-supplied; the ledger only insists they are non-negative and, when a
/// ceiling is configured, no larger than it.
pub fn validate_prize(prize: i64, max_prize: Option<i64>) -> Result<(), ValidationError> {
    if prize < 0 {
        return Err(rejection("negative_prize", NEGATIVE_PRIZE_ERROR.to_string()));
    }
    if let Some(max) = max_prize {
        if prize > max {
            return Err(rejection(
                "prize_too_large",
                format!("Prize must not exceed {}", max),
            ));
        }
    }
    Ok(())
}

/// Human-readable text for a validation failure.
pub fn describe(err: &ValidationError) -> String {
    err.message
        .as_ref()
        .map(|m| m.to_string())
        .unwrap_or_else(|| err.code.to_string())
}
