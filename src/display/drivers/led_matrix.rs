/*
 *  display/drivers/led_matrix.rs
 *
 *  spotify-ish - now playing, on the wall
 *  (c) 2020-26 Stuart Hunter
 *
 *  HUB75 RGB matrix via the hzeller rpi-rgb-led-matrix library
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

use log::info;
use rpi_led_matrix::{LedCanvas, LedColor, LedMatrix, LedMatrixOptions, LedRuntimeOptions};

use crate::config::MatrixSettings;
use crate::constants::BRIGHTNESS_MAX;
use crate::display::error::DisplayError;
use crate::display::traits::{check_frame, clamp_brightness, rgb_frame_len, DisplayKind, MatrixDisplay};

/// Double-buffered matrix: frames are painted onto the offscreen canvas at
/// sync time and swapped in on the next vsync.
pub struct LedMatrixDisplay {
    matrix: LedMatrix,
    canvas: Option<LedCanvas>,
    width: u32,
    height: u32,
    brightness: u8,
    staged: Vec<u8>,
}

// SAFETY: the matrix and canvas wrap raw pointers into the C library. The
// library's refresh thread is internal; we only touch the handles from
// whichever task holds the display mutex, one at a time.
unsafe impl Send for LedMatrixDisplay {}

impl LedMatrixDisplay {
    pub fn new(settings: &MatrixSettings) -> Result<Self, DisplayError> {
        let mut options = LedMatrixOptions::new();
        options.set_rows(settings.height);
        options.set_cols(settings.width);
        options.set_hardware_mapping(&settings.hardware_mapping);
        options.set_limit_refresh(settings.limit_refresh_hz);

        let mut runtime = LedRuntimeOptions::new();
        runtime.set_gpio_slowdown(settings.gpio_slowdown);

        let matrix = LedMatrix::new(Some(options), Some(runtime))
            .map_err(|e| DisplayError::InitializationFailed(e.to_string()))?;
        let canvas = matrix.offscreen_canvas();

        info!(
            "LED matrix bound: {}x{} mapping={} slowdown={}",
            settings.width, settings.height, settings.hardware_mapping, settings.gpio_slowdown
        );

        Ok(Self {
            matrix,
            canvas: Some(canvas),
            width: settings.width,
            height: settings.height,
            brightness: BRIGHTNESS_MAX,
            staged: vec![0; rgb_frame_len(settings.width, settings.height)],
        })
    }

    #[inline]
    fn scale(&self, channel: u8) -> u8 {
        ((channel as u16 * self.brightness as u16) / BRIGHTNESS_MAX as u16) as u8
    }
}

impl MatrixDisplay for LedMatrixDisplay {
    fn kind(&self) -> DisplayKind {
        DisplayKind::Hardware
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
    }

    fn draw_image_buffer(&mut self, rgb: &[u8]) -> Result<(), DisplayError> {
        check_frame(self.frame_len(), rgb)?;
        self.staged.copy_from_slice(rgb);
        Ok(())
    }

    fn sync(&mut self) -> Result<(), DisplayError> {
        let mut canvas = self
            .canvas
            .take()
            .ok_or_else(|| DisplayError::SyncFailed("offscreen canvas lost".to_string()))?;

        canvas.clear();
        let width = self.width as usize;
        for (i, px) in self.staged.chunks_exact(3).enumerate() {
            if px == [0, 0, 0] {
                continue;
            }
            let color = LedColor {
                red: self.scale(px[0]),
                green: self.scale(px[1]),
                blue: self.scale(px[2]),
            };
            canvas.set((i % width) as i32, (i / width) as i32, &color);
        }

        self.canvas = Some(self.matrix.swap(canvas));
        Ok(())
    }
}
