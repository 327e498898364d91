/*
 *  events.rs
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
//! Login/logout events derived from credential store changes.

use log::{debug, warn};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, mpsc};

use crate::store::{CredentialStore, StoreChange, UserSession};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    LoggedIn { session: UserSession },
    LoggedOut { previous: Option<UserSession> },
}

impl SessionEvent {
    /// Classifies a store change. A token refresh (same user id, same refresh
    /// token) is not a login and yields `None`. Logging in again as the same
    /// user brings a new refresh token, so that still counts.
    pub fn from_change(change: StoreChange) -> Option<SessionEvent> {
        match (change.new, change.old) {
            (None, previous) => Some(SessionEvent::LoggedOut { previous }),
            (Some(new), Some(old)) if new.id == old.id && new.refresh_token == old.refresh_token => None,
            (Some(session), _) => Some(SessionEvent::LoggedIn { session }),
        }
    }
}

/// Forwards classified store changes onto an mpsc channel for the sync loop.
/// Ends when the store is dropped or the receiver goes away.
pub fn spawn_session_events(
    store: &Arc<CredentialStore>,
) -> (mpsc::Receiver<SessionEvent>, tokio::task::JoinHandle<()>) {
    let weak: Weak<CredentialStore> = Arc::downgrade(store);
    forward_changes(store.subscribe(), move || weak.upgrade().and_then(|store| store.get()))
}

/// After falling behind the store, the missed changes are gone; `current`
/// reads what is stored now and that becomes the next event.
fn forward_changes<F>(
    mut changes: broadcast::Receiver<StoreChange>,
    current: F,
) -> (mpsc::Receiver<SessionEvent>, tokio::task::JoinHandle<()>)
where
    F: Fn() -> Option<UserSession> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(8);
    let handle = tokio::spawn(async move {
        loop {
            let event = match changes.recv().await {
                Ok(change) => match SessionEvent::from_change(change) {
                    Some(event) => event,
                    None => {
                        debug!("Session refreshed, not a new login");
                        continue;
                    }
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Missed {} credential store notifications, resyncing", n);
                    match current() {
                        Some(session) => SessionEvent::LoggedIn { session },
                        None => SessionEvent::LoggedOut { previous: None },
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            if tx.send(event).await.is_err() {
                break;
            }
        }
    });
    (rx, handle)
}
