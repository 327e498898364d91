/*
 *  server/mod.rs
 *
 *  spotify-ish - now playing, on the wall
 *	(c) 2020-26 Stuart Hunter
 *
 *  Local HTTPS shell: login, logout, status and brightness
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

pub mod certs;
mod routes;

use axum::{
    extract::FromRef,
    routing::get,
    Router,
};
use axum_server::{tls_rustls::RustlsConfig, Handle};
use chrono::Utc;
use log::info;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::constants::{OAUTH_CALLBACK_ROUTE, OAUTH_LOGIN_ROUTE, SHUTDOWN_TIMEOUT_SECS};
use crate::display::DisplayHandle;
use crate::spotify::ClientFactory;
use crate::store::{CredentialStore, StoreError};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("certificate generation failed: {0}")]
    Certificate(#[from] rcgen::Error),
    #[error("certificate cache: {0}")]
    Store(#[from] StoreError),
    #[error("HTTPS listener: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone)]
pub struct ServerState {
    pub factory: Arc<ClientFactory>,
    pub display: DisplayHandle,
    /// `https://host:port`, the address browsers reach us on
    pub base_url: String,
}

impl ServerState {
    pub fn new(factory: Arc<ClientFactory>, display: DisplayHandle, hostname: &str, port: u16) -> Self {
        Self { factory, display, base_url: base_url(hostname, port) }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        self.factory.store()
    }

    fn redirect_uri(&self) -> String {
        format!("{}{}", self.base_url, OAUTH_CALLBACK_ROUTE)
    }
}

impl FromRef<ServerState> for DisplayHandle {
    fn from_ref(input: &ServerState) -> Self {
        input.display.clone()
    }
}

pub fn base_url(hostname: &str, port: u16) -> String {
    format!("https://{}:{}", hostname, port)
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/", get(routes::status))
        .route(OAUTH_LOGIN_ROUTE, get(routes::login))
        .route(OAUTH_CALLBACK_ROUTE, get(routes::callback))
        .route("/logout", get(routes::logout))
        .route("/config", get(routes::get_config).post(routes::post_config))
        .with_state(state)
}

/// Serves the shell over TLS on all interfaces until `shutdown` fires,
/// then gives open connections a bounded grace period.
pub async fn serve(
    state: ServerState,
    hostname: &str,
    port: u16,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let record = certs::load_or_generate(state.store(), hostname, Utc::now())?;
    let tls = RustlsConfig::from_pem(record.cert.into_bytes(), record.key.into_bytes()).await?;

    let handle = Handle::new();
    let graceful = handle.clone();
    tokio::spawn(async move {
        shutdown.cancelled().await;
        info!("Closing HTTPS listener");
        graceful.graceful_shutdown(Some(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS)));
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", state.base_url);
    let app = router(state);
    axum_server::bind_rustls(addr, tls)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
