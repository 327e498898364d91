/*
 *  brightness.rs
 *
 *  spotify-ish - now playing, on the wall
 *	(c) 2020-26 Stuart Hunter
 *
 *  Sun position to display brightness
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

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::sun::{sun_phases, SunPhase};

#[derive(Debug, Error, PartialEq)]
pub enum CalculationError {
    #[error("coordinates must be finite, got ({latitude}, {longitude})")]
    NonFinite { latitude: f64, longitude: f64 },
    #[error("unable to calculate current sun phase")]
    NoPhase,
}

/// Brightness (percent) for each phase of the solar day.
pub fn phase_brightness(phase: SunPhase) -> u8 {
    match phase {
        // darkest moment of the night
        SunPhase::Nadir => 40,
        SunPhase::NightEnd => 40,
        SunPhase::NauticalDawn => 50,
        SunPhase::Dawn => 60,
        SunPhase::Sunrise => 70,
        SunPhase::SunriseEnd => 80,
        SunPhase::GoldenHourEnd => 100,
        SunPhase::SolarNoon => 100,
        SunPhase::GoldenHour => 100,
        SunPhase::SunsetStart => 80,
        SunPhase::Sunset => 70,
        SunPhase::Dusk => 60,
        SunPhase::NauticalDusk => 50,
        // dark enough for astronomical observations
        SunPhase::Night => 40,
    }
}

/// The phase in effect at `now`, with the instant it started.
///
/// Looks at the solar day nearest `now` first; when `now` precedes every
/// transition of that day, the previous days are consulted. Solar noon and
/// nadir exist at every latitude so a polar day or night still resolves.
pub fn current_phase(
    latitude: f64,
    longitude: f64,
    now: DateTime<Utc>,
) -> Result<(SunPhase, DateTime<Utc>), CalculationError> {
    if !latitude.is_finite() || !longitude.is_finite() {
        return Err(CalculationError::NonFinite { latitude, longitude });
    }

    for days_back in 0..=2 {
        let probe = now - Duration::days(days_back);
        let phase = sun_phases(latitude, longitude, probe)
            .into_iter()
            .take_while(|(_, start)| *start <= now)
            .last();
        if let Some(found) = phase {
            return Ok(found);
        }
    }

    Err(CalculationError::NoPhase)
}

/// Target display brightness in [0,100] for the given place and time.
pub fn brightness(latitude: f64, longitude: f64, now: DateTime<Utc>) -> Result<u8, CalculationError> {
    let (phase, _) = current_phase(latitude, longitude, now)?;
    Ok(phase_brightness(phase))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_midday_is_full_brightness() {
        // 17:00 UTC is just after solar noon in New York
        let now = Utc.with_ymd_and_hms(2024, 6, 21, 17, 30, 0).unwrap();
        assert_eq!(brightness(40.7128, -74.0060, now), Ok(100));
    }

    #[test]
    fn test_middle_of_the_night_is_dim() {
        let now = Utc.with_ymd_and_hms(2024, 12, 21, 6, 0, 0).unwrap();
        assert_eq!(brightness(40.7128, -74.0060, now), Ok(40));
    }

    #[test]
    fn test_twilight_steps() {
        let lat = 40.7128;
        let lon = -74.0060;
        let day = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        for (phase, start) in sun_phases(lat, lon, day) {
            let just_after = start + Duration::seconds(1);
            let (found, _) = current_phase(lat, lon, just_after).unwrap();
            assert_eq!(found, phase, "one second into {phase}");
        }
    }

    #[test]
    fn test_always_in_range_for_valid_inputs() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for lat in (-90..=90).step_by(15) {
            for lon in (-180..=180).step_by(45) {
                for step in 0..48 {
                    // walk across the year in ~8 day, 5 hour strides
                    let now = start + Duration::hours(step * 197);
                    let value = brightness(lat as f64, lon as f64, now)
                        .unwrap_or_else(|e| panic!("({lat}, {lon}) at {now}: {e}"));
                    assert!(value <= 100);
                }
            }
        }
    }

    #[test]
    fn test_non_finite_input_fails() {
        let now = Utc::now();
        assert!(brightness(f64::NAN, 0.0, now).is_err());
        assert!(brightness(0.0, f64::INFINITY, now).is_err());
    }
}
