/*
 *  tests/common/mod.rs
 *
 *  Shared fixtures: sessions, a stand-in matrix, scripted sources and a
 *  local Spotify lookalike.
 *
 *  spotify-ish - now playing, on the wall
 *  (c) 2020-26 Stuart Hunter
 */
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use spotify_ish::artwork::ArtworkError;
use spotify_ish::display::{DisplayHandle, MatrixDisplay, StandInDisplay, StandInState};
use spotify_ish::spotify::{ClientError, Endpoints, Image, ItemKind, PlaybackItem, PlaybackSnapshot};
use spotify_ish::store::UserSession;
use spotify_ish::sync_loop::{ArtworkSource, PlaybackSource};

pub fn session(id: &str) -> UserSession {
    UserSession {
        id: id.to_string(),
        email: format!("{id}@example.com"),
        access_token: format!("access-{id}"),
        refresh_token: format!("refresh-{id}"),
        expires: Utc::now() + ChronoDuration::hours(1),
        scope: "user-read-email".to_string(),
    }
}

pub fn stand_in(width: u32, height: u32) -> (DisplayHandle, Arc<Mutex<StandInState>>) {
    let display = StandInDisplay::new(width, height);
    let state = display.state();
    let handle: DisplayHandle = Arc::new(tokio::sync::Mutex::new(Box::new(display) as Box<dyn MatrixDisplay>));
    (handle, state)
}

pub fn playing(id: &str) -> PlaybackSnapshot {
    PlaybackSnapshot {
        is_playing: true,
        item: Some(PlaybackItem {
            id: id.to_string(),
            name: format!("Track {id}"),
            kind: ItemKind::Track,
            artists: vec!["Someone".to_string()],
            images: vec![Image { url: format!("https://img/{id}"), height: Some(640), width: Some(640) }],
        }),
        device_id: Some("kitchen".to_string()),
    }
}

pub fn paused(id: &str) -> PlaybackSnapshot {
    PlaybackSnapshot { is_playing: false, ..playing(id) }
}

pub fn ended() -> PlaybackSnapshot {
    PlaybackSnapshot { is_playing: true, item: None, device_id: None }
}

/// Always answers with whatever snapshot was set last.
pub struct FakePlayback {
    current: Mutex<PlaybackSnapshot>,
    pub calls: AtomicUsize,
}

impl FakePlayback {
    pub fn new(initial: PlaybackSnapshot) -> Arc<Self> {
        Arc::new(Self { current: Mutex::new(initial), calls: AtomicUsize::new(0) })
    }

    pub fn set(&self, snapshot: PlaybackSnapshot) {
        *self.current.lock().unwrap() = snapshot;
    }
}

#[async_trait]
impl PlaybackSource for FakePlayback {
    async fn now_playing(&self) -> Result<PlaybackSnapshot, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.current.lock().unwrap().clone())
    }
}

/// Every URL becomes a solid, lit frame.
pub struct SolidArtwork {
    pub fetches: AtomicUsize,
}

impl SolidArtwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { fetches: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl ArtworkSource for SolidArtwork {
    async fn fetch_rgb(&self, _url: &str, width: u32, height: u32) -> Result<Vec<u8>, ArtworkError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(vec![200; width as usize * height as usize * 3])
    }
}

// ---- local Spotify lookalike ----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerMode {
    Playing,
    Nothing,
    RateLimited,
}

pub struct FakeSpotify {
    pub mode: Mutex<PlayerMode>,
    pub token_calls: AtomicUsize,
    pub playing_calls: AtomicUsize,
}

impl FakeSpotify {
    pub fn set_mode(&self, mode: PlayerMode) {
        *self.mode.lock().unwrap() = mode;
    }
}

pub struct SpotifyServer {
    pub addr: SocketAddr,
    pub state: Arc<FakeSpotify>,
}

impl SpotifyServer {
    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            authorize_url: format!("http://{}/authorize", self.addr),
            token_url: format!("http://{}/api/token", self.addr),
            api_base: format!("http://{}/v1", self.addr),
        }
    }
}

fn bearer(headers: &HeaderMap) -> String {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default()
        .to_string()
}

async fn token(State(state): State<Arc<FakeSpotify>>, Form(form): Form<HashMap<String, String>>) -> Response {
    let n = state.token_calls.fetch_add(1, Ordering::SeqCst) + 1;
    let grant = form.get("grant_type").map(String::as_str).unwrap_or_default();
    match grant {
        "refresh_token" if form.get("refresh_token").map(String::as_str) == Some("revoked") => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant", "error_description": "Refresh token revoked" })),
        )
            .into_response(),
        "refresh_token" => Json(json!({
            "access_token": format!("fresh-{n}"),
            "token_type": "Bearer",
            "expires_in": 3600,
        }))
        .into_response(),
        "authorization_code" if form.get("code").map(String::as_str) == Some("good") => Json(json!({
            "access_token": "at-1",
            "token_type": "Bearer",
            "refresh_token": "rt-1",
            "expires_in": 3600,
            "scope": "user-read-email user-read-currently-playing",
        }))
        .into_response(),
        _ => (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid_grant" }))).into_response(),
    }
}

async fn me(headers: HeaderMap) -> Response {
    if bearer(&headers).is_empty() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({ "id": "u1", "email": "u1@example.com", "display_name": "User One" })).into_response()
}

async fn currently_playing(State(state): State<Arc<FakeSpotify>>, headers: HeaderMap) -> Response {
    state.playing_calls.fetch_add(1, Ordering::SeqCst);
    let token = bearer(&headers);
    if token.is_empty() || token == "stale" {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mode = *state.mode.lock().unwrap();
    match mode {
        PlayerMode::Nothing => StatusCode::NO_CONTENT.into_response(),
        PlayerMode::RateLimited => (StatusCode::TOO_MANY_REQUESTS, [(header::RETRY_AFTER, "7")]).into_response(),
        PlayerMode::Playing => Json(json!({
            "is_playing": true,
            "device": { "id": "dev-1" },
            "item": {
                "id": "track-1",
                "uri": "spotify:track:track-1",
                "name": "Song",
                "type": "track",
                "artists": [{ "name": "Artist One" }, { "name": "Artist Two" }],
                "album": {
                    "images": [
                        { "url": "https://i.scdn.co/64", "height": 64, "width": 64 },
                        { "url": "https://i.scdn.co/640", "height": 640, "width": 640 },
                        { "url": "https://i.scdn.co/300", "height": 300, "width": 300 }
                    ]
                }
            }
        }))
        .into_response(),
    }
}

pub async fn spawn_fake_spotify() -> SpotifyServer {
    let state = Arc::new(FakeSpotify {
        mode: Mutex::new(PlayerMode::Playing),
        token_calls: AtomicUsize::new(0),
        playing_calls: AtomicUsize::new(0),
    });
    let app = Router::new()
        .route("/api/token", post(token))
        .route("/v1/me", get(me))
        .route("/v1/me/player/currently-playing", get(currently_playing))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    SpotifyServer { addr, state }
}
