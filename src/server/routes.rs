/*
 *  server/routes.rs
 *
 *  spotify-ish - now playing, on the wall
 *	(c) 2020-26 Stuart Hunter
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use log::{error, info, warn};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::constants::{BRIGHTNESS_MAX, OAUTH_SCOPES};
use crate::display::DisplayHandle;
use crate::spotify::oauth::expires_at;
use crate::spotify::PlaybackSnapshot;
use crate::store::UserSession;
use crate::sync_loop::PlaybackSource;
use super::ServerState;

#[derive(Debug, Serialize)]
pub struct DisplayConfig {
    pub brightness: u8,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigBody {
    brightness: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    #[serde(rename = "redirectTo")]
    redirect_to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    error: Option<String>,
    state: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LoginState {
    #[serde(rename = "redirectTo", skip_serializing_if = "Option::is_none")]
    redirect_to: Option<String>,
}

fn to_base64_json(value: &impl Serialize) -> String {
    STANDARD.encode(serde_json::to_vec(value).unwrap_or_default())
}

fn from_base64_json(encoded: &str) -> Option<LoginState> {
    let bytes = STANDARD.decode(encoded).ok()?;
    serde_json::from_slice(&bytes).ok()
}

async fn display_config(display: &DisplayHandle) -> DisplayConfig {
    let display = display.lock().await;
    DisplayConfig {
        brightness: display.brightness(),
        width: display.width(),
        height: display.height(),
    }
}

fn now_playing_json(snapshot: &PlaybackSnapshot) -> Value {
    match &snapshot.item {
        Some(item) => json!({
            "state": if snapshot.is_playing { "playing" } else { "paused" },
            "artist": item.artist_names(),
            "title": item.name,
            "image": item.largest_image().map(|i| i.url.clone()),
        }),
        None => Value::Bool(false),
    }
}

pub async fn status(State(state): State<ServerState>) -> Response {
    let user = match state.store().get() {
        Some(session) => Value::String(session.email),
        None => Value::Bool(false),
    };

    let now_playing = if user.is_string() {
        match state.factory.now_playing().await {
            Ok(snapshot) => now_playing_json(&snapshot),
            Err(e) => {
                warn!("Status: playback unavailable: {}", e);
                Value::Bool(false)
            }
        }
    } else {
        Value::Bool(false)
    };

    let config = display_config(&state.display).await;
    Json(json!({
        "user": user,
        "nowPlaying": now_playing,
        "config": config,
    }))
    .into_response()
}

pub async fn login(State(state): State<ServerState>, Query(query): Query<LoginQuery>) -> Response {
    let login_state = to_base64_json(&LoginState { redirect_to: query.redirect_to });
    match state
        .factory
        .oauth()
        .authorize_url(&state.redirect_uri(), &OAUTH_SCOPES, &login_state)
    {
        Ok(url) => Redirect::to(url.as_str()).into_response(),
        Err(e) => {
            error!("Login: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Where to send the browser once the session is stored.
fn post_login_target(base_url: &str, login_state: Option<&str>, email: &str) -> String {
    let home = format!("{}/", base_url);
    let Some(redirect_to) = login_state.and_then(from_base64_json).and_then(|s| s.redirect_to) else {
        return home;
    };
    match Url::parse(&redirect_to) {
        Ok(mut url) => {
            let uid = STANDARD.encode(json!({ "uid": email }).to_string());
            url.query_pairs_mut().append_pair("state", &uid);
            url.into()
        }
        Err(e) => {
            warn!("Ignoring unusable redirectTo {:?}: {}", redirect_to, e);
            home
        }
    }
}

pub async fn callback(State(state): State<ServerState>, Query(query): Query<CallbackQuery>) -> Response {
    let Some(code) = query.code else {
        return match query.error {
            Some(reason) => (StatusCode::BAD_REQUEST, reason).into_response(),
            None => (StatusCode::INTERNAL_SERVER_ERROR, "missing authorization code").into_response(),
        };
    };

    let token = match state.factory.oauth().exchange_code(&code, &state.redirect_uri()).await {
        Ok(token) => token,
        Err(e) => {
            error!("Login callback: code exchange failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };
    let Some(refresh_token) = token.refresh_token else {
        error!("Login callback: token response carried no refresh token");
        return (StatusCode::INTERNAL_SERVER_ERROR, "no refresh token").into_response();
    };

    let user = match state.factory.client_for_token(token.access_token.clone()).me().await {
        Ok(user) => user,
        Err(e) => {
            error!("Login callback: /me failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    let email = user.email.unwrap_or_else(|| user.id.clone());
    let session = UserSession {
        id: user.id,
        email: email.clone(),
        access_token: token.access_token,
        refresh_token,
        expires: expires_at(Utc::now(), token.expires_in),
        scope: token.scope.unwrap_or_else(|| OAUTH_SCOPES.join(" ")),
    };
    if let Err(e) = state.store().set(session) {
        error!("Login callback: could not store session: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }
    info!("Logged in as {}", email);

    Redirect::to(&post_login_target(&state.base_url, query.state.as_deref(), &email)).into_response()
}

pub async fn logout(State(state): State<ServerState>) -> Response {
    if let Err(e) = state.store().delete() {
        error!("Logout: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }
    Redirect::to("/").into_response()
}

pub async fn get_config(State(display): State<DisplayHandle>) -> Json<DisplayConfig> {
    Json(display_config(&display).await)
}

pub async fn post_config(State(display): State<DisplayHandle>, Json(body): Json<ConfigBody>) -> Response {
    if let Some(brightness) = body.brightness {
        if brightness > BRIGHTNESS_MAX {
            return (
                StatusCode::BAD_REQUEST,
                format!("brightness must be 0..={}", BRIGHTNESS_MAX),
            )
                .into_response();
        }
        let committed = {
            let mut panel = display.lock().await;
            panel.set_brightness(brightness);
            panel.sync()
        };
        if let Err(e) = committed {
            error!("Config: brightness commit failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
        info!("Brightness set to {}", brightness);
    }
    Json(display_config(&display).await).into_response()
}
