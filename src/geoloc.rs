/*
 *  geoloc.rs
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
use reqwest::{header, Client, Error};
use serde::Deserialize;
use std::time::Duration;

use crate::constants::USER_AGENT;

const GEOIP_URL: &str = "https://ipapi.co/json/";

#[derive(Debug, Deserialize)]
pub struct GeoLocation {
    pub city: String,
    pub region_code: String,
    pub latitude: f64,
    pub longitude: f64,
}

pub async fn fetch_location() -> Result<GeoLocation, Error> {
    let mut headers = header::HeaderMap::new();
    headers.insert(header::USER_AGENT, header::HeaderValue::from_static(USER_AGENT));
    headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
    headers.insert(header::CONNECTION, header::HeaderValue::from_static("close"));

    let client = Client::builder()
        .connect_timeout(Duration::from_millis(500))
        .default_headers(headers)
        .timeout(Duration::from_secs(2))
        .build()?;

    let geo = client
        .get(GEOIP_URL)
        .send()
        .await?
        .error_for_status()? // none 2xx raise
        .json::<GeoLocation>()
        .await?;

    Ok(geo)
}
