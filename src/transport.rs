//! transport - the axum router: websocket upgrades plus the HTTP adapters
//!
//! everything here is a thin shim; the only state it holds is the shared
//! [`AppState`] handed to every route.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;

use crate::auth::{self, AuthError};
use crate::config::Config;
use crate::games::GameTable;
use crate::peer;
use crate::registry::Registries;

/// state shared across every connection and request.
#[derive(Clone)]
pub struct AppState {
    pub registries: Arc<Registries>,
    pub games: Arc<GameTable>,
    pub db: PgPool,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> AppState {
        AppState { registries: Registries::new(), games: Arc::new(GameTable::new()), db, config: Arc::new(config) }
    }
}

/// builds the full router: `/lobby`, `/reversi`, `/create_session`,
/// `/login`, `/register`, all under a permissive CORS layer matching the
/// prototype's handwritten `Access-Control-Allow-*` headers.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/lobby", get(lobby_ws))
        .route("/reversi", get(game_ws))
        .route("/create_session", get(create_session))
        .route("/login", post(login))
        .route("/register", post(register))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn lobby_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| peer::handle_lobby_socket(socket, state.registries))
}

async fn game_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| peer::handle_game_socket(socket, state.registries, state.games))
}

async fn create_session(State(state): State<AppState>) -> impl IntoResponse {
    let code = state
        .registries
        .lobby
        .create_session(None)
        .await
        .expect("a freshly generated code never already exists");
    let link = state.config.lobby_link(&code);
    Json(json!({"status": 200, "data": {"code": code, "link": link}}))
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    username: String,
    password: String,
}

async fn login(State(state): State<AppState>, Form(form): Form<Credentials>) -> impl IntoResponse {
    match auth::login(&state.db, &form.username, &form.password).await {
        Ok(success) => Json(json!({"status": 200, "message": "Login successful", "token": success.token})),
        Err(AuthError::InvalidCredentials) => {
            Json(json!({"status": 400, "message": "Username or password is incorrect"}))
        }
        Err(other) => Json(json!({"status": 400, "message": other.to_string()})),
    }
}

async fn register(State(state): State<AppState>, Form(form): Form<Credentials>) -> impl IntoResponse {
    match auth::register(&state.db, &form.username, &form.password).await {
        Ok(success) => Json(json!({"status": 200, "token": success.token, "username": form.username})),
        Err(AuthError::UsernameTaken) => Json(json!({"status": 400, "message": "Username already exists"})),
        Err(other) => Json(json!({"status": 400, "message": other.to_string()})),
    }
}
