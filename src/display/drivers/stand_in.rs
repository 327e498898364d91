/*
 *  display/drivers/stand_in.rs
 *
 *  spotify-ish - now playing, on the wall
 *  (c) 2020-26 Stuart Hunter
 *
 *  Software stand-in for when no LED matrix is attached
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::constants::BRIGHTNESS_MAX;
use crate::display::error::DisplayError;
use crate::display::traits::{check_frame, clamp_brightness, rgb_frame_len, DisplayKind, MatrixDisplay};

/// In-memory display surface.
///
/// Keeps the staged and committed frame plus brightness so the rest of the
/// program behaves the same without hardware. Everything it does is
/// recorded in a shared [`StandInState`] that tests can inspect.
#[derive(Debug, Clone)]
pub struct StandInDisplay {
    width: u32,
    height: u32,
    brightness: u8,
    staged: Vec<u8>,
    state: Arc<Mutex<StandInState>>,
}

/// What has been committed so far (shared for inspection)
#[derive(Debug, Default)]
pub struct StandInState {
    /// Number of successful sync() calls
    pub sync_count: usize,

    /// Number of clear() calls
    pub clear_count: usize,

    /// Number of frames staged via draw_image_buffer
    pub frames_drawn: usize,

    /// Brightness at the last sync
    pub committed_brightness: Option<u8>,

    /// Frame at the last sync
    pub committed_frame: Option<Vec<u8>>,

    /// Simulate failures (for error testing)
    pub simulate_sync_failure: bool,
}

impl StandInState {
    /// True when the last committed frame has any lit pixel
    pub fn is_lit(&self) -> bool {
        self.committed_frame
            .as_ref()
            .is_some_and(|f| f.iter().any(|b| *b != 0))
    }
}

impl StandInDisplay {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            brightness: BRIGHTNESS_MAX,
            staged: vec![0; rgb_frame_len(width, height)],
            state: Arc::new(Mutex::new(StandInState::default())),
        }
    }

    /// Get reference to state for inspection
    pub fn state(&self) -> Arc<Mutex<StandInState>> {
        Arc::clone(&self.state)
    }

    fn lock(&self) -> MutexGuard<'_, StandInState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MatrixDisplay for StandInDisplay {
    fn kind(&self) -> DisplayKind {
        DisplayKind::StandIn
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn brightness(&self) -> u8 {
        self.brightness
    }

    fn set_brightness(&mut self, value: u8) {
        self.brightness = clamp_brightness(value);
    }

    fn clear(&mut self) {
        self.staged.fill(0);
        self.lock().clear_count += 1;
    }

    fn draw_image_buffer(&mut self, rgb: &[u8]) -> Result<(), DisplayError> {
        check_frame(self.frame_len(), rgb)?;
        self.staged.copy_from_slice(rgb);
        self.lock().frames_drawn += 1;
        Ok(())
    }

    fn sync(&mut self) -> Result<(), DisplayError> {
        let mut state = self.lock();
        if state.simulate_sync_failure {
            return Err(DisplayError::SyncFailed("Simulated sync failure".to_string()));
        }
        state.sync_count += 1;
        state.committed_brightness = Some(self.brightness);
        state.committed_frame = Some(self.staged.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_getters_report_initial_values() {
        let display = StandInDisplay::new(64, 32);
        assert_eq!(display.width(), 64);
        assert_eq!(display.height(), 32);
        assert_eq!(display.brightness(), 100);
        assert_eq!(display.kind(), DisplayKind::StandIn);
        assert_eq!(display.frame_len(), 64 * 32 * 3);
    }

    #[test]
    fn test_brightness_clamped_and_not_committed() {
        let mut display = StandInDisplay::new(8, 8);
        display.set_brightness(250);
        assert_eq!(display.brightness(), 100);
        display.set_brightness(30);
        assert_eq!(display.brightness(), 30);

        let state = display.state();
        assert_eq!(state.lock().unwrap().sync_count, 0);
        assert_eq!(state.lock().unwrap().committed_brightness, None);

        display.sync().unwrap();
        assert_eq!(state.lock().unwrap().committed_brightness, Some(30));
    }

    #[test]
    fn test_staged_until_sync() {
        let mut display = StandInDisplay::new(2, 2);
        let state = display.state();

        display.draw_image_buffer(&[255; 12]).unwrap();
        assert!(!state.lock().unwrap().is_lit());

        display.sync().unwrap();
        assert!(state.lock().unwrap().is_lit());

        display.clear();
        assert!(state.lock().unwrap().is_lit());
        display.sync().unwrap();
        assert!(!state.lock().unwrap().is_lit());
        assert_eq!(state.lock().unwrap().clear_count, 1);
    }

    #[test]
    fn test_buffer_size_mismatch() {
        let mut display = StandInDisplay::new(4, 4);
        let result = display.draw_image_buffer(&[0; 10]);
        assert!(matches!(
            result,
            Err(DisplayError::BufferSizeMismatch { expected: 48, actual: 10 })
        ));
    }

    #[test]
    fn test_simulated_sync_failure() {
        let mut display = StandInDisplay::new(4, 4);
        display.state().lock().unwrap().simulate_sync_failure = true;
        assert!(display.sync().is_err());
        assert_eq!(display.state().lock().unwrap().sync_count, 0);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_frame_len_past_u32() {
        // 70000 * 70000 * 3 wraps in u32
        assert_eq!(rgb_frame_len(70_000, 70_000), 14_700_000_000);
    }
}
