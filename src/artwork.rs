/*
 *  artwork.rs
 *
 *  spotify-ish - now playing, on the wall
 *	(c) 2020-26 Stuart Hunter
 *
 *  Cover art download, decode and resize to a raw RGB frame
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
use image::imageops::FilterType;
use log::debug;
use mini_moka::sync::Cache;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::display::rgb_frame_len;
use crate::sync_loop::ArtworkSource;

#[derive(Debug, Error)]
pub enum ArtworkError {
    #[error("artwork download failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("artwork decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("artwork worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Decodes `bytes` and scales to exactly `width` x `height`, returning
/// row-major RGB, 3 bytes per pixel. A 1x1 image is the upstream's
/// "no art" placeholder and becomes a black frame.
pub fn to_rgb_frame(bytes: &[u8], width: u32, height: u32) -> Result<Vec<u8>, ArtworkError> {
    let img = image::load_from_memory(bytes)?;
    if img.width() == 1 && img.height() == 1 {
        return Ok(vec![0u8; rgb_frame_len(width, height)]);
    }
    let resized = img.resize_exact(width, height, FilterType::Triangle);
    Ok(resized.to_rgb8().into_raw())
}

pub struct ArtworkFetcher {
    http: Client,
    cache: Arc<Cache<String, Arc<Vec<u8>>>>,
}

impl ArtworkFetcher {
    pub fn new(http: Client) -> Self {
        let cache = Cache::builder()
            .max_capacity(16) // a handful of albums back and forth
            .time_to_live(Duration::from_secs(600))
            .build();
        Self { http, cache: Arc::new(cache) }
    }
}

#[async_trait]
impl ArtworkSource for ArtworkFetcher {
    async fn fetch_rgb(&self, url: &str, width: u32, height: u32) -> Result<Vec<u8>, ArtworkError> {
        let key = format!("{}x{}-{}", width, height, url);
        if let Some(frame) = self.cache.get(&key) {
            debug!("Artwork cache hit for {}", url);
            return Ok(frame.as_ref().clone());
        }

        let bytes = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()? // none 2xx raise
            .bytes()
            .await?;

        let frame = tokio::task::spawn_blocking(move || to_rgb_frame(&bytes, width, height)).await??;
        self.cache.insert(key, Arc::new(frame.clone()));
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb(color));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_resize_to_matrix() {
        let frame = to_rgb_frame(&png(300, 300, [200, 10, 10]), 64, 32).unwrap();
        assert_eq!(frame.len(), 64 * 32 * 3);
        for (got, want) in frame[..3].iter().zip([200u8, 10, 10]) {
            assert!(got.abs_diff(want) <= 1, "{got} vs {want}");
        }
    }

    #[test]
    fn test_single_pixel_is_black() {
        let frame = to_rgb_frame(&png(1, 1, [255, 255, 255]), 16, 16).unwrap();
        assert_eq!(frame.len(), 16 * 16 * 3);
        assert!(frame.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let err = to_rgb_frame(b"definitely not an image", 16, 16).unwrap_err();
        assert!(matches!(err, ArtworkError::Decode(_)));
    }
}
