/*
 *  location.rs
 *
 *  spotify-ish - now playing, on the wall
 *	(c) 2020-26 Stuart Hunter
 *
 *  Location service - provides lat/lng from config or an opt-in geolocation lookup
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

use log::{info, warn};
use std::fmt;

/// A point on the globe, decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Location information with coordinates
#[derive(Debug, Clone)]
pub struct Location {
    pub coordinates: Coordinates,
    pub city: Option<String>,
    pub region: Option<String>,
    pub source: LocationSource,
}

/// Source of location data
#[derive(Debug, Clone, PartialEq)]
pub enum LocationSource {
    UserConfig,
    GeoIP,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match self.source {
            LocationSource::UserConfig => "config",
            LocationSource::GeoIP => "geoip",
        };
        if let (Some(city), Some(region)) = (&self.city, &self.region) {
            write!(f, "{}, {} ({:.4}, {:.4}) [{}]",
                city, region, self.coordinates.latitude, self.coordinates.longitude, source)
        } else {
            write!(f, "({:.4}, {:.4}) [{}]",
                self.coordinates.latitude, self.coordinates.longitude, source)
        }
    }
}

#[derive(Debug)]
pub enum LocationError {
    NotConfigured,
    GeoIPFailed(String),
    InvalidCoordinates,
}

impl fmt::Display for LocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationError::NotConfigured => write!(f, "No location configured"),
            LocationError::GeoIPFailed(e) => write!(f, "GeoIP lookup failed: {}", e),
            LocationError::InvalidCoordinates => write!(f, "Invalid coordinates"),
        }
    }
}

impl std::error::Error for LocationError {}

/// Get location from config, falling back to GeoIP only when `auto_locate` is set.
pub async fn get_location(
    configured: Option<Coordinates>,
    auto_locate: bool,
) -> Result<Location, LocationError> {
    if let Some(coords) = configured {
        if !coords.is_valid() {
            warn!("Invalid coordinates in config: {}, {}", coords.latitude, coords.longitude);
            return Err(LocationError::InvalidCoordinates);
        }
        info!("Using location from config: {:.4}, {:.4}", coords.latitude, coords.longitude);
        return Ok(Location {
            coordinates: coords,
            city: None,
            region: None,
            source: LocationSource::UserConfig,
        });
    }

    if !auto_locate {
        return Err(LocationError::NotConfigured);
    }

    info!("No location in config, attempting GeoIP lookup...");
    match crate::geoloc::fetch_location().await {
        Ok(geo) => {
            let coordinates = Coordinates { latitude: geo.latitude, longitude: geo.longitude };
            if !coordinates.is_valid() {
                return Err(LocationError::InvalidCoordinates);
            }
            info!("GeoIP lookup successful: {}, {} ({:.4}, {:.4})",
                geo.city, geo.region_code, geo.latitude, geo.longitude);
            Ok(Location {
                coordinates,
                city: Some(geo.city),
                region: Some(geo.region_code),
                source: LocationSource::GeoIP,
            })
        }
        Err(e) => {
            warn!("GeoIP lookup failed: {}", e);
            Err(LocationError::GeoIPFailed(e.to_string()))
        }
    }
}
