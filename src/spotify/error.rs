/*
 *  spotify/error.rs
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

use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Nobody is logged in (or a different user is).
    #[error("no user session available")]
    NoSession,

    /// The refresh token was rejected; the user has to log in again.
    #[error("authorization expired or revoked: {0}")]
    AuthExpired(String),

    /// The access token was rejected before its recorded expiry.
    #[error("access token rejected by upstream")]
    Unauthorized,

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("JSON deserialization error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("credential store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// Worth retrying on the next poll without user involvement.
    pub fn is_transient(&self) -> bool {
        !matches!(self, ClientError::NoSession | ClientError::AuthExpired(_))
    }
}
