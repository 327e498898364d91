pub mod client;
pub mod error;
pub mod factory;
pub mod models;
pub mod oauth;

pub use client::{build_http_client, SpotifyClient};
pub use error::ClientError;
pub use factory::ClientFactory;
pub use models::{Image, ItemKind, PlaybackItem, PlaybackSnapshot, SpotifyUser, TokenResponse};
pub use oauth::OAuthClient;

use crate::constants::{SPOTIFY_API_BASE, SPOTIFY_AUTHORIZE_URL, SPOTIFY_TOKEN_URL};

/// Upstream URLs, overridable so tests can point at a local server.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub authorize_url: String,
    pub token_url: String,
    pub api_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            authorize_url: SPOTIFY_AUTHORIZE_URL.to_string(),
            token_url: SPOTIFY_TOKEN_URL.to_string(),
            api_base: SPOTIFY_API_BASE.to_string(),
        }
    }
}
