/*
 *  pacer.rs
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
use std::time::Duration;
use tokio::time::Instant;

/// Holds upstream calls back until a rate-limit window has passed.
#[derive(Debug, Default)]
pub struct Pacer {
    not_before: Option<Instant>,
}

impl Pacer {
    pub fn new() -> Self {
        Self { not_before: None }
    }

    /// Push the next allowed call out by `delay` (never pulls it in).
    pub fn back_off(&mut self, delay: Duration) {
        let until = Instant::now() + delay;
        self.not_before = Some(match self.not_before {
            Some(current) if current > until => current,
            _ => until,
        });
    }

    /// True if we may call upstream now; clears an expired window.
    #[inline]
    pub fn ready(&mut self) -> bool {
        match self.not_before {
            Some(deadline) if Instant::now() < deadline => false,
            Some(_) => {
                self.not_before = None;
                true
            }
            None => true,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.not_before
            .map(|d| d.saturating_duration_since(Instant::now()))
            .unwrap_or_default()
    }

    pub fn reset(&mut self) {
        self.not_before = None;
    }
}
