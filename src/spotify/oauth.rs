/*
 *  spotify/oauth.rs
 *
 *  spotify-ish - now playing, on the wall
 *	(c) 2020-26 Stuart Hunter
 *
 *  OAuth2 authorization code grant and refresh against accounts.spotify.com
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

use chrono::{DateTime, Duration, Utc};
use log::warn;
use reqwest::{Client, StatusCode, Url};

use super::client::{check_status, decode};
use super::error::ClientError;
use super::models::{TokenErrorResponse, TokenResponse};

/// Absolute expiry for a token that lives `expires_in` seconds from `now`.
pub fn expires_at(now: DateTime<Utc>, expires_in: i64) -> DateTime<Utc> {
    now + Duration::seconds(expires_in.max(0))
}

pub struct OAuthClient {
    http: Client,
    client_id: String,
    client_secret: String,
    authorize_url: String,
    token_url: String,
}

impl OAuthClient {
    pub fn new(
        http: Client,
        client_id: String,
        client_secret: String,
        authorize_url: String,
        token_url: String,
    ) -> Self {
        Self { http, client_id, client_secret, authorize_url, token_url }
    }

    /// Where to send the browser to start a login.
    pub fn authorize_url(&self, redirect_uri: &str, scopes: &[&str], state: &str) -> Result<Url, ClientError> {
        let scope = scopes.join(" ");
        Url::parse_with_params(
            &self.authorize_url,
            &[
                ("client_id", self.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", redirect_uri),
                ("scope", scope.as_str()),
                ("state", state),
                // always ask, so switching accounts is possible
                ("show_dialog", "true"),
            ],
        )
        .map_err(|e| ClientError::InvalidUrl(e.to_string()))
    }

    /// Exchanges an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenResponse, ClientError> {
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await?;
        decode(check_status(response).await?).await
    }

    /// Exchanges a refresh token for a new access token.
    /// A 400/401 from the token endpoint means the grant is gone.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, ClientError> {
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            let reason = serde_json::from_str::<TokenErrorResponse>(&body)
                .map(|e| match e.error_description {
                    Some(d) => format!("{}: {}", e.error, d),
                    None => e.error,
                })
                .unwrap_or_else(|_| status.to_string());
            warn!("Token refresh rejected: {}", reason);
            return Err(ClientError::AuthExpired(reason));
        }
        decode(check_status(response).await?).await
    }
}
