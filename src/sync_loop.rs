/*
 *  sync_loop.rs
 *
 *  spotify-ish - now playing, on the wall
 *	(c) 2020-26 Stuart Hunter
 *
 *  Playback to display synchronization - polls now playing, decides what
 *  the matrix shows, follows login/logout
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
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, sleep_until, timeout, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::artwork::ArtworkError;
use crate::brightness::brightness;
use crate::constants::{DEFAULT_INACTIVITY_MS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_TICK_TIMEOUT_MS};

// roughly thirty years
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);
use crate::display::{DisplayError, DisplayHandle};
use crate::events::SessionEvent;
use crate::location::Coordinates;
use crate::pacer::Pacer;
use crate::spotify::{ClientError, PlaybackSnapshot};

/// Where playback state comes from (the Spotify client factory in production)
#[async_trait]
pub trait PlaybackSource: Send + Sync {
    /// Playback of the stored user. `ClientError::NoSession` when logged out.
    async fn now_playing(&self) -> Result<PlaybackSnapshot, ClientError>;
}

/// Turns an artwork URL into a frame sized for the matrix
#[async_trait]
pub trait ArtworkSource: Send + Sync {
    async fn fetch_rgb(&self, url: &str, width: u32, height: u32) -> Result<Vec<u8>, ArtworkError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    pub poll_interval: Duration,
    pub inactivity_window: Duration,
    /// upper bound on the playback half of one tick
    pub tick_timeout: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            inactivity_window: Duration::from_millis(DEFAULT_INACTIVITY_MS),
            tick_timeout: Duration::from_millis(DEFAULT_TICK_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// nobody logged in, not polling
    Idle,
    /// polling, playback seen
    Active,
    /// polling, player paused, a delayed clear is armed (or has fired)
    InactivityPending,
    /// stopped by logout, expired auth or shutdown
    Suspended,
}

/// Published for operators and the HTTP shell
#[derive(Debug, Clone, PartialEq)]
pub enum LoopEvent {
    ArtworkUpdatesStarted,
    ArtworkUpdatesSuspended,
    ArtworkUpdateError(String),
}

/// What the last commit put on the matrix
#[derive(Debug, Clone, PartialEq, Eq)]
enum Frame {
    /// blanked
    Blank,
    /// still showing art, but playback paused so it no longer counts
    Stale,
    Item(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InactivityTimer {
    Disarmed,
    Armed(Instant),
    /// fired for this pause; re-armed only after playback resumes
    Elapsed,
}

#[derive(Debug, Error)]
enum TickError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Artwork(#[from] ArtworkError),
    #[error(transparent)]
    Display(#[from] DisplayError),
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct SyncLoop {
    settings: SyncSettings,
    display: DisplayHandle,
    playback: Arc<dyn PlaybackSource>,
    artwork: Arc<dyn ArtworkSource>,
    coordinates: Option<Coordinates>,
    clock: Clock,
    events: broadcast::Sender<LoopEvent>,

    state: LoopState,
    frame: Frame,
    timer: InactivityTimer,
    ticker: Option<Interval>,
    pacer: Pacer,
}

impl SyncLoop {
    pub fn new(
        settings: SyncSettings,
        display: DisplayHandle,
        playback: Arc<dyn PlaybackSource>,
        artwork: Arc<dyn ArtworkSource>,
        coordinates: Option<Coordinates>,
    ) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            settings,
            display,
            playback,
            artwork,
            coordinates,
            clock: Arc::new(Utc::now),
            events,
            state: LoopState::Idle,
            frame: Frame::Blank,
            timer: InactivityTimer::Disarmed,
            ticker: None,
            pacer: Pacer::new(),
        }
    }

    /// Wall clock used for the sun position
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LoopEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    /// When the pending inactivity clear fires, if one is armed
    pub fn inactivity_deadline(&self) -> Option<Instant> {
        match self.timer {
            InactivityTimer::Armed(at) => Some(at),
            _ => None,
        }
    }

    fn emit(&self, event: LoopEvent) {
        // nobody listening is fine
        let _ = self.events.send(event);
    }

    /// Drives the loop until `shutdown` fires. Session events start and stop
    /// polling; ticks run inline so two never overlap.
    pub async fn run(mut self, mut sessions: mpsc::Receiver<SessionEvent>, shutdown: CancellationToken) {
        let mut sessions_open = true;
        loop {
            let deadline = self.inactivity_deadline();
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    self.suspend("shutdown").await;
                    break;
                }

                event = sessions.recv(), if sessions_open => match event {
                    Some(SessionEvent::LoggedIn { session }) => {
                        info!("User {} logged in", session.email);
                        self.start();
                    }
                    Some(SessionEvent::LoggedOut { previous }) => {
                        if let Some(previous) = previous {
                            info!("User {} logged out", previous.email);
                        }
                        self.suspend("logged out").await;
                    }
                    None => {
                        debug!("Session event stream closed");
                        sessions_open = false;
                    }
                },

                _ = sleep_until_deadline(deadline) => {
                    self.inactivity_elapsed().await;
                }

                _ = next_tick(&mut self.ticker) => {
                    self.tick().await;
                }
            }
        }
        debug!("Sync loop stopped");
    }

    /// Begin (or re-begin) polling. The first tick fires immediately.
    pub fn start(&mut self) {
        self.frame = Frame::Stale;
        self.timer = InactivityTimer::Disarmed;
        self.pacer.reset();
        if self.ticker.is_some() {
            // another user logged in over the top, just re-render
            debug!("Sync loop already running, forcing a re-render");
            return;
        }
        let mut ticker = interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.ticker = Some(ticker);
        self.state = LoopState::Active;
        info!("Artwork updates started (every {:?})", self.settings.poll_interval);
        self.emit(LoopEvent::ArtworkUpdatesStarted);
    }

    /// Stop polling, drop any pending inactivity clear, and blank the matrix.
    /// The blank is the last write: any tick has already finished by now.
    pub async fn suspend(&mut self, reason: &str) {
        let was_running = self.ticker.take().is_some();
        self.timer = InactivityTimer::Disarmed;
        self.state = LoopState::Suspended;

        if let Err(e) = self.blank().await {
            error!("Failed to clear display on suspend: {}", e);
        }

        if was_running {
            info!("Artwork updates suspended: {}", reason);
            self.emit(LoopEvent::ArtworkUpdatesSuspended);
        }
    }

    async fn blank(&mut self) -> Result<(), DisplayError> {
        let mut display = self.display.lock().await;
        display.clear();
        display.sync()?;
        self.frame = Frame::Blank;
        Ok(())
    }

    /// Marks the pause handled only once the blank is committed. A failed
    /// commit is retried one poll interval later.
    async fn inactivity_elapsed(&mut self) {
        debug!("Clearing display due to inactivity");
        match self.blank().await {
            Ok(()) => self.timer = InactivityTimer::Elapsed,
            Err(e) => {
                error!("Failed to clear display after inactivity: {}", e);
                self.timer = InactivityTimer::Armed(deadline_after(self.settings.poll_interval));
            }
        }
    }

    /// One poll: sun-driven brightness, then the playback half. Nothing in
    /// here escapes; failures are logged and the next tick tries again.
    pub async fn tick(&mut self) {
        self.adjust_brightness().await;

        if !self.pacer.ready() {
            debug!("Rate limited, {:?} to go", self.pacer.remaining());
            return;
        }

        let limit = self.settings.tick_timeout;
        match timeout(limit, self.sync_playback()).await {
            Ok(Ok(())) => {}
            Ok(Err(TickError::Client(e))) => self.client_failure(e).await,
            Ok(Err(e)) => {
                error!("Artwork update failed: {}", e);
                self.emit(LoopEvent::ArtworkUpdateError(e.to_string()));
            }
            Err(_) => {
                error!("Artwork update timed out after {:?}", limit);
                self.emit(LoopEvent::ArtworkUpdateError(format!("timed out after {limit:?}")));
            }
        }
    }

    async fn client_failure(&mut self, e: ClientError) {
        match e {
            ClientError::RateLimited { retry_after } => {
                warn!("Rate limited by Spotify, backing off {:?}", retry_after);
                self.pacer.back_off(retry_after);
                self.emit(LoopEvent::ArtworkUpdateError(format!("rate limited for {retry_after:?}")));
            }
            e if e.is_transient() => {
                error!("Artwork update failed: {}", e);
                self.emit(LoopEvent::ArtworkUpdateError(e.to_string()));
            }
            ClientError::AuthExpired(reason) => {
                warn!("Spotify authorization expired ({}), log in again", reason);
                self.emit(LoopEvent::ArtworkUpdateError(format!("authorization expired: {reason}")));
                self.suspend("authorization expired").await;
            }
            _ => debug!("No user session, nothing to poll"),
        }
    }

    async fn adjust_brightness(&mut self) {
        let Some(coords) = self.coordinates else { return };
        let target = match brightness(coords.latitude, coords.longitude, (self.clock)()) {
            Ok(value) => value,
            Err(e) => {
                warn!("Skipping brightness adjustment: {}", e);
                return;
            }
        };

        let mut display = self.display.lock().await;
        if display.brightness() == target {
            return;
        }
        let previous = display.brightness();
        display.set_brightness(target);
        match display.sync() {
            Ok(()) => info!("Brightness set to {}", target),
            Err(e) => {
                // uncommitted, retried next tick
                display.set_brightness(previous);
                error!("Failed to apply brightness {}: {}", target, e);
            }
        }
    }

    async fn sync_playback(&mut self) -> Result<(), TickError> {
        let snapshot = self.playback.now_playing().await?;

        // paused: never render, clear later if it stays that way
        if !snapshot.is_playing {
            if self.timer == InactivityTimer::Disarmed {
                debug!("Player is paused, clearing in {:?}", self.settings.inactivity_window);
                self.timer = InactivityTimer::Armed(deadline_after(self.settings.inactivity_window));
            }
            if matches!(self.frame, Frame::Item(_)) {
                self.frame = Frame::Stale;
            }
            self.state = LoopState::InactivityPending;
            return Ok(());
        }

        self.timer = InactivityTimer::Disarmed;
        self.state = LoopState::Active;

        let Some(item) = snapshot.item else {
            if self.frame != Frame::Blank {
                debug!("Nothing is playing");
                self.blank().await?;
            }
            return Ok(());
        };

        if self.frame == Frame::Item(item.id.clone()) {
            return Ok(());
        }

        let Some(image) = item.largest_image() else {
            warn!("No artwork for {} ({})", item.name, item.id);
            self.blank().await?;
            self.frame = Frame::Item(item.id);
            return Ok(());
        };

        let (width, height) = {
            let display = self.display.lock().await;
            (display.width(), display.height())
        };
        let rgb = self.artwork.fetch_rgb(&image.url, width, height).await?;

        {
            let mut display = self.display.lock().await;
            display.draw_image_buffer(&rgb)?;
            display.sync()?;
        }

        info!("Now showing: {} - {}", item.artist_names(), item.name);
        self.frame = Frame::Item(item.id);
        Ok(())
    }
}

/// `now + after`, saturating far in the future instead of overflowing
fn deadline_after(after: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(after).unwrap_or_else(|| now + FAR_FUTURE)
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
