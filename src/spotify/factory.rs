/*
 *  spotify/factory.rs
 *
 *  spotify-ish - now playing, on the wall
 *	(c) 2020-26 Stuart Hunter
 *
 *  Hands out Spotify clients bound to fresh credentials
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

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info};
use reqwest::Client;
use std::sync::Arc;

use crate::store::{CredentialStore, UserSession};
use crate::sync_loop::PlaybackSource;
use super::client::SpotifyClient;
use super::error::ClientError;
use super::models::PlaybackSnapshot;
use super::oauth::{expires_at, OAuthClient};
use super::Endpoints;

pub struct ClientFactory {
    http: Client,
    api_base: String,
    oauth: Arc<OAuthClient>,
    store: Arc<CredentialStore>,
}

impl ClientFactory {
    pub fn new(
        http: Client,
        client_id: String,
        client_secret: String,
        endpoints: Endpoints,
        store: Arc<CredentialStore>,
    ) -> Self {
        let oauth = Arc::new(OAuthClient::new(
            http.clone(),
            client_id,
            client_secret,
            endpoints.authorize_url,
            endpoints.token_url,
        ));
        Self { http, api_base: endpoints.api_base, oauth, store }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn oauth(&self) -> &OAuthClient {
        &self.oauth
    }

    /// A client bound to an access token that is not (yet) in the store.
    pub fn client_for_token(&self, access_token: String) -> SpotifyClient {
        self.client_with(Some(access_token))
    }

    fn client_with(&self, access_token: Option<String>) -> SpotifyClient {
        SpotifyClient::new(self.http.clone(), self.api_base.clone(), self.oauth.clone(), access_token)
    }

    /// A client for `identity` (user id or email), refreshing the stored
    /// access token first when it has expired. Without an identity the
    /// client is anonymous.
    pub async fn get_client(&self, identity: Option<&str>) -> Result<SpotifyClient, ClientError> {
        let Some(identity) = identity else {
            return Ok(self.client_with(None));
        };

        let session = self
            .store
            .get()
            .filter(|s| s.id == identity || s.email == identity)
            .ok_or(ClientError::NoSession)?;

        if session.expires <= Utc::now() {
            let refreshed = self.refresh(&session).await?;
            return Ok(self.client_with(Some(refreshed.access_token)));
        }

        Ok(self.client_with(Some(session.access_token)))
    }

    /// Refreshes `session`'s access token and writes it back to the store.
    pub async fn refresh(&self, session: &UserSession) -> Result<UserSession, ClientError> {
        debug!("Refreshing access token for {}", session.id);
        let token = self.oauth.refresh(&session.refresh_token).await?;
        let expires = expires_at(Utc::now(), token.expires_in);
        let updated = self
            .store
            .update_access_token(&session.id, token.access_token, expires)?
            // logged out while we were refreshing
            .ok_or(ClientError::NoSession)?;
        info!("Refreshed access token for user {}", updated.id);
        Ok(updated)
    }
}

#[async_trait]
impl PlaybackSource for ClientFactory {
    async fn now_playing(&self) -> Result<PlaybackSnapshot, ClientError> {
        let session = self.store.get().ok_or(ClientError::NoSession)?;
        let client = self.get_client(Some(&session.id)).await?;
        match client.current_playback().await {
            Err(ClientError::Unauthorized) => {
                // token revoked early, one refresh then give up for this tick
                let session = self.store.get().ok_or(ClientError::NoSession)?;
                let refreshed = self.refresh(&session).await?;
                self.client_with(Some(refreshed.access_token)).current_playback().await
            }
            other => other,
        }
    }
}
