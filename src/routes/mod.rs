use std::net::SocketAddr;

use axum::{
    Router,
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, Method, header},
    middleware::{self, Next},
    response::Response,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::{error::AppError, state::SharedState};

pub mod docs;
pub mod health;
pub mod profile;
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
///
/// Only the profile routes are rate limited; health and the duel channel are not.
pub fn router(state: SharedState) -> Router<()> {
    let limited = profile::router().route_layer(middleware::from_fn_with_state(
        state.clone(),
        rate_limit,
    ));

    health::router()
        .merge(websocket::router())
        .merge(limited)
        .merge(docs::router())
        .with_state(state)
}

/// Build the top-level router and attach cross-cutting middleware layers.
pub fn build_router(state: SharedState) -> Router<()> {
    let cors = cors_layer(&state.config().cors_allowed_origins);
    router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Reject requests once the client address has spent its budget for the window.
async fn rate_limit(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".into());

    if !state.rate_limiter().check(&client) {
        warn!(client = %client, path = %request.uri().path(), "rate limit exceeded");
        return Err(AppError::TooManyRequests);
    }

    Ok(next.run(request).await)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(origin = %origin, error = %err, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use futures::{SinkExt, StreamExt};
    use serde_json::{Value, json};
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite};
    use tower::ServiceExt;

    use super::*;
    use crate::{
        config::{AppConfig, MatchPolicy, RateLimitConfig},
        dao::{
            models::ProfileEntity,
            profile_store::{ProfileStore, memory::InMemoryProfileStore},
        },
        services::settlement_worker,
        state::AppState,
    };

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    fn test_config() -> AppConfig {
        AppConfig {
            matchmaking: MatchPolicy::FirstAvailable,
            ..AppConfig::default()
        }
    }

    async fn ready_state(config: AppConfig) -> (SharedState, InMemoryProfileStore) {
        let (state, settlements) = AppState::new(config);
        let store = InMemoryProfileStore::new();
        state.set_profile_store(Arc::new(store.clone())).await;
        tokio::spawn(settlement_worker::run(state.clone(), settlements));
        (state, store)
    }

    async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn send_json(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn profile_lifecycle_over_rest() {
        let (state, _store) = ready_state(test_config()).await;
        let app = router(state);

        let (status, body) = call(&app, get("/check-profile?profile-name=Mania")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"message": "notTaken"}));

        let (status, body) = call(
            &app,
            send_json(
                Method::POST,
                "/create-profile",
                json!({"profileName": "Mania", "country": "FR"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["totalTrophies"], 0);

        let (status, _) = call(
            &app,
            send_json(Method::POST, "/create-profile", json!({"profileName": "Mania"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = call(
            &app,
            send_json(
                Method::PATCH,
                "/update-profile-data",
                json!({"profileName": "Mania", "status": "ready"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = call(&app, get("/check-profile?profileName=Mania")).await;
        assert_eq!(body["message"], "taken");
        assert_eq!(body["status"], "ready");
        assert_eq!(body["country"], "FR");

        let (status, body) = call(&app, get("/get-achievement-data?profileName=Mania")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"achievements": [false, false, false, false, false]}));
    }

    #[tokio::test]
    async fn unknown_and_invalid_profiles_are_rejected() {
        let (state, _store) = ready_state(test_config()).await;
        let app = router(state);

        let (status, _) = call(&app, get("/get-history-data?profileName=ghost")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(
            &app,
            send_json(
                Method::PATCH,
                "/update-profile-data",
                json!({"profileName": "ghost", "country": "FR"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let long_name = "x".repeat(40);
        let (status, _) = call(
            &app,
            send_json(Method::POST, "/create-profile", json!({"profileName": long_name})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn degraded_storage_answers_503_but_health_stays_up() {
        let (state, _settlements) = AppState::new(test_config());
        let app = router(state);

        let (status, _) = call(&app, get("/leaderboard-data")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, body) = call(&app, get("/healthcheck")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "degraded", "openRooms": 0}));
    }

    #[tokio::test]
    async fn openapi_document_lists_duel_and_profile_routes() {
        let (state, _settlements) = AppState::new(test_config());
        let app = router(state);

        let (status, body) = call(&app, get(docs::OPENAPI_JSON_PATH)).await;
        assert_eq!(status, StatusCode::OK);
        let paths = body["paths"].as_object().unwrap();
        assert!(paths.contains_key("/ws"));
        assert!(paths.contains_key("/leaderboard-data"));
    }

    #[tokio::test]
    async fn rest_routes_are_rate_limited_per_client() {
        let config = AppConfig {
            rate_limit: RateLimitConfig {
                max_requests: 2,
                window_secs: 60,
            },
            ..test_config()
        };
        let (state, _store) = ready_state(config).await;
        let app = router(state);

        for _ in 0..2 {
            let (status, _) = call(&app, get("/leaderboard-data")).await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, body) = call(&app, get("/leaderboard-data")).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["message"], "too many requests");

        let (status, _) = call(&app, get("/healthcheck")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn leaderboard_is_sorted_by_trophies() {
        let (state, store) = ready_state(test_config()).await;
        for (name, trophies) in [("low", 3), ("high", 40), ("mid", 12)] {
            store
                .create_profile(ProfileEntity::new(name, String::new(), String::new()))
                .await
                .unwrap();
            store.apply_trophy_delta(name.into(), trophies).await.unwrap();
        }
        let app = router(state);

        let (_, body) = call(&app, get("/leaderboard-data")).await;
        let names: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|entry| entry["profileName"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["high", "mid", "low"]);
    }

    async fn serve(state: SharedState) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = build_router(state);
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });
        addr
    }

    async fn client(addr: SocketAddr) -> Client {
        let (socket, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
        socket
    }

    async fn send(client: &mut Client, frame: Value) {
        client
            .send(tungstenite::Message::Text(frame.to_string().into()))
            .await
            .unwrap();
    }

    async fn next_json(client: &mut Client) -> Value {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
                .await
                .expect("frame before timeout")
                .expect("stream open")
                .unwrap();
            if let tungstenite::Message::Text(text) = frame {
                return serde_json::from_str(text.as_str()).unwrap();
            }
        }
    }

    async fn eventually<F, Fut>(mut check: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..100 {
            if check().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn duel_over_websocket_settles_both_profiles() {
        let (state, store) = ready_state(test_config()).await;
        for name in ["ada", "bob"] {
            store
                .create_profile(ProfileEntity::new(name, String::new(), String::new()))
                .await
                .unwrap();
        }
        let addr = serve(state.clone()).await;
        let mut ada = client(addr).await;
        let mut bob = client(addr).await;

        send(&mut ada, json!({"action": "connect", "displayName": "ada", "trophies": 10})).await;
        send(&mut bob, json!({"action": "connect", "playerName": "bob", "totalTrophies": 50})).await;

        let ada_notice = next_json(&mut ada).await;
        let bob_notice = next_json(&mut bob).await;
        assert_eq!(ada_notice["message"], "Match found!");
        assert_eq!(ada_notice["opponentName"], "bob");
        assert_eq!(bob_notice["opponentName"], "ada");
        assert_eq!(ada_notice["roomId"], bob_notice["roomId"]);
        let room_id = ada_notice["roomId"].as_str().unwrap().to_owned();

        send(
            &mut ada,
            json!({"action": "player_completed", "roomId": room_id, "displayName": "ada", "scores": [0, 20]}),
        )
        .await;
        assert_eq!(next_json(&mut bob).await, json!({"opponentTotalPoints": [0, 20]}));

        send(
            &mut bob,
            json!({
                "action": "match_completed",
                "roomId": room_id,
                "scores": [0, 20, 100],
                "opponentName": "ada",
                "opponentScores": [60, 80, 85],
                "isPerfectScore": true,
                "isFastReflex": false
            }),
        )
        .await;

        eventually(|| {
            let store = store.clone();
            async move {
                let ada = store.find_profile("ada".into()).await.unwrap().unwrap();
                let bob = store.find_profile("bob".into()).await.unwrap().unwrap();
                ada.history.len() == 1 && bob.history.len() == 1
            }
        })
        .await;

        let bob_profile = store.find_profile("bob".into()).await.unwrap().unwrap();
        let ada_profile = store.find_profile("ada".into()).await.unwrap().unwrap();
        assert_eq!(bob_profile.total_trophies, 5);
        assert_eq!(bob_profile.wins, 1);
        assert!(bob_profile.achievements.first_victory);
        assert!(bob_profile.achievements.perfect_round);
        assert!(bob_profile.achievements.clutch_performer);
        assert_eq!(ada_profile.total_trophies, 0);
        assert_eq!(ada_profile.wins, 0);
        assert_eq!(state.rooms().room_count().await, 0);
    }

    #[tokio::test]
    async fn closing_the_socket_abandons_the_room() {
        let (state, _store) = ready_state(test_config()).await;
        let addr = serve(state.clone()).await;
        let mut ada = client(addr).await;
        let mut bob = client(addr).await;

        send(&mut ada, json!({"action": "connect", "displayName": "ada"})).await;
        send(&mut bob, json!({"action": "connect", "displayName": "bob"})).await;
        next_json(&mut ada).await;
        next_json(&mut bob).await;
        assert_eq!(state.rooms().room_count().await, 1);

        ada.close(None).await.unwrap();

        eventually(|| {
            let state = state.clone();
            async move { state.rooms().room_count().await == 0 }
        })
        .await;
        assert_eq!(state.rooms().room_of("bob").await, None);
    }

    #[tokio::test]
    async fn malformed_frames_keep_the_connection_open() {
        let (state, _store) = ready_state(test_config()).await;
        let addr = serve(state.clone()).await;
        let mut ada = client(addr).await;

        ada.send(tungstenite::Message::Text("{not json".into()))
            .await
            .unwrap();
        send(&mut ada, json!({"action": "dance"})).await;
        send(&mut ada, json!({"action": "connect", "displayName": "ada"})).await;

        eventually(|| {
            let state = state.clone();
            async move { state.rooms().room_of("ada").await.is_some() }
        })
        .await;
    }
}
