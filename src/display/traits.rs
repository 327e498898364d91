/*
 *  display/traits.rs
 *
 *  spotify-ish - now playing, on the wall
 *  (c) 2020-26 Stuart Hunter
 *
 *  Core trait definition for the matrix drawing surface
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

use crate::constants::{BRIGHTNESS_MAX, BRIGHTNESS_MIN};
use crate::display::error::DisplayError;

/// Which implementation sits behind a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayKind {
    /// hzeller rpi-rgb-led-matrix on real GPIO
    Hardware,
    /// In-memory surface used when no matrix is attached
    StandIn,
}

/// Uniform drawing surface, hardware or not.
///
/// Drawing is staged: `clear`, `draw_image_buffer` and `set_brightness` only
/// change what the next `sync` commits. Nothing is visible until then.
pub trait MatrixDisplay: Send {
    fn kind(&self) -> DisplayKind;

    /// Fixed at initialization
    fn width(&self) -> u32;

    /// Fixed at initialization
    fn height(&self) -> u32;

    /// Bytes in one full RGB frame
    fn frame_len(&self) -> usize {
        rgb_frame_len(self.width(), self.height())
    }

    /// Current brightness, 0-100
    fn brightness(&self) -> u8;

    /// Stage a new brightness, clamped to 0-100. Does not sync.
    fn set_brightness(&mut self, value: u8);

    /// Stage a blank frame
    fn clear(&mut self);

    /// Stage a full frame: row-major RGB, one byte per channel,
    /// exactly `frame_len()` bytes.
    fn draw_image_buffer(&mut self, rgb: &[u8]) -> Result<(), DisplayError>;

    /// Commit everything staged to the surface
    fn sync(&mut self) -> Result<(), DisplayError>;
}

#[inline]
pub fn clamp_brightness(value: u8) -> u8 {
    value.clamp(BRIGHTNESS_MIN, BRIGHTNESS_MAX)
}

/// Bytes in a `width` x `height` RGB frame, computed in `usize`
pub fn rgb_frame_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3
}

/// Length check shared by the drivers
pub(crate) fn check_frame(expected: usize, rgb: &[u8]) -> Result<(), DisplayError> {
    if rgb.len() != expected {
        return Err(DisplayError::BufferSizeMismatch {
            expected,
            actual: rgb.len(),
        });
    }
    Ok(())
}
