use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use shared::constants::API_BANNER;
use shared::shared_wheel_game::{
    LeaderboardEntry, LeaderboardQuery, PlayerResponse, RegisterRequest, RegisterResponse,
    SpinRequest, SpinResponse,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::error::LedgerError;
use crate::services::{LedgerService, PlayerView};

#[derive(Clone)]
pub struct AppState {
    pub ledger: LedgerService,
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(banner))
        .route("/api/health_check", get(health_check))
        .route("/register", post(register_handler))
        .route("/spin", post(spin_handler))
        .route("/leaderboard", get(leaderboard_handler))
        .route("/player/:name", get(player_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn banner() -> &'static str {
    API_BANNER
}

pub async fn health_check() -> &'static str {
    "OK"
}

fn bad_body(rejection: JsonRejection) -> LedgerError {
    LedgerError::Validation(rejection.body_text())
}

/// Handler to register a player, or return the existing one unchanged
pub async fn register_handler(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<RegisterResponse>, LedgerError> {
    let Json(request) = payload.map_err(bad_body)?;
    let player = state.ledger.register(&request.name).await?;
    Ok(Json(RegisterResponse {
        name: player.name,
        score: player.score,
        spins_remaining: player.spins_remaining,
    }))
}

/// Handler to settle one wheel spin
pub async fn spin_handler(
    State(state): State<AppState>,
    payload: Result<Json<SpinRequest>, JsonRejection>,
) -> Result<Json<SpinResponse>, LedgerError> {
    let Json(request) = payload.map_err(bad_body)?;
    let player = state.ledger.spin(&request.name, request.prize).await?;
    Ok(Json(SpinResponse {
        score: player.score,
        spins_remaining: player.spins_remaining,
    }))
}

pub async fn leaderboard_handler(
    State(state): State<AppState>,
    query: Result<Query<LeaderboardQuery>, QueryRejection>,
) -> Result<Json<Vec<LeaderboardEntry>>, LedgerError> {
    let Query(query) = query.map_err(|e| LedgerError::Validation(e.body_text()))?;
    let players = state.ledger.leaderboard(query.limit).await?;
    debug!("Serving {} leaderboard entries", players.len());

    Ok(Json(
        players
            .into_iter()
            .map(|p| LeaderboardEntry {
                name: p.name,
                score: p.score,
                last_spin_at: p.last_spin_at,
            })
            .collect(),
    ))
}

pub async fn player_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<PlayerResponse>, LedgerError> {
    let PlayerView {
        name,
        score,
        spins_remaining,
        last_spin_at,
        ..
    } = state.ledger.get_player(&name).await?;
    Ok(Json(PlayerResponse {
        name,
        score,
        spins_remaining,
        last_spin_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::LedgerPolicy;
    use crate::store::MemoryPlayerStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use time::macros::datetime;
    use time::Duration;
    use tower::ServiceExt;

    fn app() -> (Router, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(datetime!(2024-06-03 09:30 UTC)));
        let ledger = LedgerService::new(
            Arc::new(MemoryPlayerStore::default()),
            clock.clone(),
            LedgerPolicy::default(),
        );
        (create_router(AppState { ledger }), clock)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_banner_and_health_check() {
        let (app, _) = app();
        assert_eq!(send(&app, get_req("/")).await, (StatusCode::OK, json!(API_BANNER)));
        assert_eq!(
            send(&app, get_req("/api/health_check")).await,
            (StatusCode::OK, json!("OK"))
        );
    }

    #[tokio::test]
    async fn test_register_spin_and_quota_over_http() {
        let (app, clock) = app();

        let (status, body) = send(&app, post_json("/register", json!({ "name": "alice" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "name": "alice", "score": 0, "spinsRemaining": 2 }));

        let (_, body) = send(&app, post_json("/spin", json!({ "name": "alice", "prize": 100 }))).await;
        assert_eq!(body, json!({ "score": 100, "spinsRemaining": 1 }));
        let (_, body) = send(&app, post_json("/spin", json!({ "name": "alice", "prize": 50 }))).await;
        assert_eq!(body, json!({ "score": 150, "spinsRemaining": 0 }));

        let (status, body) = send(&app, post_json("/spin", json!({ "name": "alice", "prize": 75 }))).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["code"], "quota_exceeded");
        assert_eq!(body["retryable"], false);

        clock.advance(Duration::days(1));
        let (_, body) = send(&app, post_json("/spin", json!({ "name": "alice", "prize": 200 }))).await;
        assert_eq!(body, json!({ "score": 350, "spinsRemaining": 1 }));
    }

    #[tokio::test]
    async fn test_register_existing_name_succeeds() {
        let (app, _) = app();
        send(&app, post_json("/register", json!({ "name": "alice" }))).await;
        send(&app, post_json("/spin", json!({ "name": "alice", "prize": 300 }))).await;

        let (status, body) = send(&app, post_json("/register", json!({ "name": "alice" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "name": "alice", "score": 300, "spinsRemaining": 1 }));
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let (app, _) = app();
        let (status, body) = send(&app, post_json("/register", json!({ "name": "  " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "validation_error");

        send(&app, post_json("/register", json!({ "name": "alice" }))).await;
        let (status, body) = send(&app, post_json("/spin", json!({ "name": "alice", "prize": -5 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "validation_error");

        let (status, body) = send(&app, post_json("/spin", json!({ "name": "alice", "prize": "lots" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "validation_error");
    }

    #[tokio::test]
    async fn test_unknown_player() {
        let (app, _) = app();
        let (status, body) = send(&app, get_req("/player/ghost")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "player_not_found");

        let (status, _) = send(&app, post_json("/spin", json!({ "name": "ghost", "prize": 1 }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_player_reports_last_spin() {
        let (app, _) = app();
        send(&app, post_json("/register", json!({ "name": "alice" }))).await;

        let (_, body) = send(&app, get_req("/player/alice")).await;
        assert_eq!(body["lastSpinAt"], Value::Null);

        send(&app, post_json("/spin", json!({ "name": "alice", "prize": 100 }))).await;
        let (status, body) = send(&app, get_req("/player/alice")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["score"], 100);
        assert_eq!(body["spinsRemaining"], 1);
        assert_eq!(body["lastSpinAt"], "2024-06-03T09:30:00Z");
    }

    #[tokio::test]
    async fn test_leaderboard_over_http() {
        let (app, clock) = app();
        let (status, body) = send(&app, get_req("/leaderboard")).await;
        assert_eq!((status, body), (StatusCode::OK, json!([])));

        for (name, prize) in [("alice", 100), ("bob", 400), ("carol", 250)] {
            send(&app, post_json("/register", json!({ "name": name }))).await;
            send(&app, post_json("/spin", json!({ "name": name, "prize": prize }))).await;
            clock.advance(Duration::seconds(1));
        }

        let (_, body) = send(&app, get_req("/leaderboard?limit=2")).await;
        let names: Vec<_> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["bob", "carol"]);
        assert_eq!(body[0]["score"], 400);
        assert!(body[0]["lastSpinAt"].is_string());
        assert!(body[0].get("spinsRemaining").is_none());

        let (status, _) = send(&app, get_req("/leaderboard?limit=many")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
