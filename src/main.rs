/*
 *  main.rs
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

use anyhow::{anyhow, Result};
use env_logger::Env;
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use spotify_ish::artwork::ArtworkFetcher;
use spotify_ish::config;
use spotify_ish::constants::OAUTH_LOGIN_ROUTE;
use spotify_ish::display::DisplayFactory;
use spotify_ish::events::spawn_session_events;
use spotify_ish::location::{get_location, Coordinates, LocationError};
use spotify_ish::server::{self, ServerState};
use spotify_ish::spotify::{build_http_client, ClientFactory, Endpoints};
use spotify_ish::store::CredentialStore;
use spotify_ish::sync_loop::{LoopEvent, SyncLoop};

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// Waits for SIGINT, SIGTERM or SIGHUP.
async fn signal_handler() -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

/// The matrix driver needs root for GPIO timing.
fn preflight() {
    // SAFETY: geteuid has no preconditions and cannot fail
    let euid = unsafe { libc::geteuid() };
    if euid != 0 {
        warn!("Not running as root (euid {}), the LED matrix may fail to initialize", euid);
    }
}

async fn resolve_coordinates(settings: &config::Settings) -> Option<Coordinates> {
    match get_location(settings.coordinates, settings.auto_locate).await {
        Ok(location) => {
            info!("Sun schedule for {}", location);
            Some(location.coordinates)
        }
        Err(LocationError::NotConfigured) => {
            info!("No location configured, brightness is manual");
            None
        }
        Err(e) => {
            warn!("{}, brightness is manual", e);
            None
        }
    }
}

fn log_loop_events(mut events: tokio::sync::broadcast::Receiver<LoopEvent>) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(LoopEvent::ArtworkUpdatesStarted) => debug!("event: artwork updates started"),
                Ok(LoopEvent::ArtworkUpdatesSuspended) => debug!("event: artwork updates suspended"),
                Ok(LoopEvent::ArtworkUpdateError(message)) => warn!("Artwork update error: {}", message),
                Err(RecvError::Lagged(n)) => debug!("Skipped {} loop events", n),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = config::load()?;

    env_logger::Builder::from_env(Env::default().default_filter_or(settings.log_level.as_str()))
        .format_timestamp_secs()
        .init();

    info!("{} - now playing, on the wall", env!("CARGO_PKG_NAME"));
    info!("v.{} built {} ({})", env!("CARGO_PKG_VERSION"), BUILD_DATE, BUILD_PROFILE);

    preflight();

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        debug!("TLS crypto provider already installed");
    }

    let store = Arc::new(CredentialStore::open(&settings.store_path)?);
    info!("Credentials in {}", store.path().display());

    let bound = DisplayFactory::initialize(&settings.matrix)?;
    if bound.is_stand_in() {
        warn!("Running without a panel, nothing will be visible");
    }
    let display = bound.into_handle();

    let http = build_http_client()?;
    let factory = Arc::new(ClientFactory::new(
        http.clone(),
        settings.client_id.clone(),
        settings.client_secret.clone(),
        Endpoints::default(),
        store.clone(),
    ));
    let artwork = Arc::new(ArtworkFetcher::new(http));
    let coordinates = resolve_coordinates(&settings).await;

    let shutdown = CancellationToken::new();

    let (session_events, session_task) = spawn_session_events(&store);
    let mut sync_loop = SyncLoop::new(settings.sync.clone(), display.clone(), factory.clone(), artwork, coordinates);
    log_loop_events(sync_loop.subscribe());
    match store.get() {
        Some(session) => {
            info!("Resuming session for {}", session.email);
            sync_loop.start();
        }
        None => match local_ip_address::local_ip() {
            Ok(ip) => info!("Not logged in, visit https://{}:{}{}", ip, settings.port, OAUTH_LOGIN_ROUTE),
            Err(_) => info!("Not logged in, visit {}", server::base_url(&settings.hostname, settings.port)),
        },
    }
    let loop_task = tokio::spawn(sync_loop.run(session_events, shutdown.clone()));

    let state = ServerState::new(factory, display, &settings.hostname, settings.port);
    let server_shutdown = shutdown.clone();
    let hostname = settings.hostname.clone();
    let port = settings.port;
    let mut server_task =
        tokio::spawn(async move { server::serve(state, &hostname, port, server_shutdown).await });

    let outcome = tokio::select! {
        signalled = signal_handler() => signalled,
        served = &mut server_task => match served {
            Ok(Ok(())) => Err(anyhow!("HTTPS listener stopped unexpectedly")),
            Ok(Err(e)) => Err(e.into()),
            Err(e) => Err(e.into()),
        },
    };

    // blank the matrix and drain the listener side by side
    shutdown.cancel();
    if server_task.is_finished() {
        if let Err(e) = loop_task.await {
            error!("Sync loop task failed: {}", e);
        }
    } else {
        let (looped, served) = tokio::join!(loop_task, server_task);
        if let Err(e) = looped {
            error!("Sync loop task failed: {}", e);
        }
        match served {
            Ok(Err(e)) => error!("HTTPS listener: {}", e),
            Err(e) => error!("HTTPS listener task failed: {}", e),
            Ok(Ok(())) => {}
        }
    }
    session_task.abort();

    if let Err(e) = &outcome {
        error!("{}", e);
    }
    info!("Bye");
    outcome
}
