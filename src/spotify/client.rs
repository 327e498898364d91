/*
 *  spotify/client.rs
 *
 *  spotify-ish - now playing, on the wall
 *	(c) 2020-26 Stuart Hunter
 *
 *  Thin Spotify Web API client - only the calls the display needs
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

use log::debug;
use reqwest::{header, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use crate::constants::{DEFAULT_RETRY_AFTER_SECS, USER_AGENT};
use super::error::ClientError;
use super::models::{CurrentlyPlaying, PlaybackSnapshot, SpotifyUser};
use super::oauth::OAuthClient;

/// Shared reqwest client with our headers and timeouts.
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    let mut headers = header::HeaderMap::new();
    headers.insert(header::USER_AGENT, header::HeaderValue::from_static(USER_AGENT));
    headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

    Client::builder()
        .connect_timeout(Duration::from_secs(3))
        .default_headers(headers)
        .timeout(Duration::from_secs(8))
        .build()
}

/// Maps a non-2xx reply onto `ClientError`.
pub(crate) async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status {
        StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            Err(ClientError::RateLimited { retry_after: Duration::from_secs(retry_after) })
        }
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(ClientError::Status { status, body })
        }
    }
}

pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let text = response.text().await?;
    Ok(serde_json::from_str(&text)?)
}

/// A client either bound to one user's access token, or anonymous.
#[derive(Clone)]
pub struct SpotifyClient {
    http: Client,
    api_base: String,
    oauth: Arc<OAuthClient>,
    access_token: Option<String>,
}

impl SpotifyClient {
    pub fn new(http: Client, api_base: String, oauth: Arc<OAuthClient>, access_token: Option<String>) -> Self {
        Self { http, api_base, oauth, access_token }
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// The OAuth half, the only thing an anonymous client is good for.
    pub fn oauth(&self) -> &OAuthClient {
        &self.oauth
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Response, ClientError> {
        let token = self.access_token.as_deref().ok_or(ClientError::NoSession)?;
        let url = format!("{}{}", self.api_base, path);
        let response = self.http.get(&url).query(query).bearer_auth(token).send().await?;
        check_status(response).await
    }

    /// `GET /me/player/currently-playing`; 204 means nothing is playing.
    pub async fn current_playback(&self) -> Result<PlaybackSnapshot, ClientError> {
        let response = self
            .get("/me/player/currently-playing", &[("additional_types", "track,episode")])
            .await?;
        if response.status() == StatusCode::NO_CONTENT {
            debug!("currently-playing: 204, nothing active");
            return Ok(PlaybackSnapshot::nothing());
        }
        let raw: CurrentlyPlaying = decode(response).await?;
        Ok(raw.into())
    }

    /// `GET /me`
    pub async fn me(&self) -> Result<SpotifyUser, ClientError> {
        let response = self.get("/me", &[]).await?;
        decode(response).await
    }
}
