use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, TAU};
use time::OffsetDateTime;

/// Prize values printed on the wheel, in drawing order starting at angle 0.
pub const WHEEL_PRIZES: [i64; 8] = [100, 200, 300, 400, 500, 600, 700, 800];

pub const WHEEL_SEGMENTS: usize = WHEEL_PRIZES.len();

/// Maps the wheel's resting rotation (radians, any sign or magnitude) to the index of the
/// segment under the pointer at the top of the wheel.
pub fn segment_for_angle(final_angle: f64) -> usize {
    let segment_angle = TAU / WHEEL_SEGMENTS as f64;
    let adjusted = (final_angle + FRAC_PI_2).rem_euclid(TAU);
    let normalized = (TAU - adjusted).rem_euclid(TAU);
    // Float rounding can land exactly on TAU for tiny negative inputs.
    ((normalized / segment_angle) as usize).min(WHEEL_SEGMENTS - 1)
}

/// Prize won for a wheel that came to rest at `final_angle`.
pub fn prize_for_angle(final_angle: f64) -> i64 {
    WHEEL_PRIZES[segment_for_angle(final_angle)]
}

// === API Types ===

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SpinRequest {
    pub name: String,
    pub prize: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub name: String,
    pub score: i64,
    pub spins_remaining: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinResponse {
    pub score: i64,
    pub spins_remaining: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerResponse {
    pub name: String,
    pub score: i64,
    pub spins_remaining: i32,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_spin_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub name: String,
    pub score: i64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_spin_at: Option<OffsetDateTime>,
}

/// Body of every non-2xx response from the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: ErrorCode,
    pub retryable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ValidationError,
    PlayerNotFound,
    QuotaExceeded,
    StorageUnavailable,
}
