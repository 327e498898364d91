/*
 *  sun.rs
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
//! Solar phase transition instants for a given lat/lon around a given moment
//! (the SunCalc formulation, after Astronomy Answers).
//! All times are UTC. Phases the sun never reaches on that day are omitted.

use chrono::{DateTime, Utc};
use std::f64::consts::PI;
use std::fmt;

const DEG_TO_RAD: f64 = PI / 180.0;
const DAY_MS: f64 = 86_400_000.0;
const J1970: f64 = 2_440_588.0;
const J2000: f64 = 2_451_545.0;
const J0: f64 = 0.0009;
const OBLIQUITY: f64 = DEG_TO_RAD * 23.4397; // obliquity of the Earth

/// Named moments of the solar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SunPhase {
    Nadir,
    NightEnd,
    NauticalDawn,
    Dawn,
    Sunrise,
    SunriseEnd,
    GoldenHourEnd,
    SolarNoon,
    GoldenHour,
    SunsetStart,
    Sunset,
    Dusk,
    NauticalDusk,
    Night,
}

impl SunPhase {
    pub fn name(&self) -> &'static str {
        match self {
            SunPhase::Nadir => "nadir",
            SunPhase::NightEnd => "nightEnd",
            SunPhase::NauticalDawn => "nauticalDawn",
            SunPhase::Dawn => "dawn",
            SunPhase::Sunrise => "sunrise",
            SunPhase::SunriseEnd => "sunriseEnd",
            SunPhase::GoldenHourEnd => "goldenHourEnd",
            SunPhase::SolarNoon => "solarNoon",
            SunPhase::GoldenHour => "goldenHour",
            SunPhase::SunsetStart => "sunsetStart",
            SunPhase::Sunset => "sunset",
            SunPhase::Dusk => "dusk",
            SunPhase::NauticalDusk => "nauticalDusk",
            SunPhase::Night => "night",
        }
    }
}

impl fmt::Display for SunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// sun altitude (degrees) -> (morning phase, evening phase)
const ALTITUDE_PHASES: [(f64, SunPhase, SunPhase); 6] = [
    (-0.833, SunPhase::Sunrise, SunPhase::Sunset),
    (-0.3, SunPhase::SunriseEnd, SunPhase::SunsetStart),
    (-6.0, SunPhase::Dawn, SunPhase::Dusk),
    (-12.0, SunPhase::NauticalDawn, SunPhase::NauticalDusk),
    (-18.0, SunPhase::NightEnd, SunPhase::Night),
    (6.0, SunPhase::GoldenHourEnd, SunPhase::GoldenHour),
];

#[inline]
fn to_julian(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / DAY_MS - 0.5 + J1970
}

#[inline]
fn from_julian(j: f64) -> Option<DateTime<Utc>> {
    let ms = (j + 0.5 - J1970) * DAY_MS;
    if !ms.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis(ms.round() as i64)
}

#[inline]
fn to_days(at: DateTime<Utc>) -> f64 {
    to_julian(at) - J2000
}

fn declination(l: f64, b: f64) -> f64 {
    (b.sin() * OBLIQUITY.cos() + b.cos() * OBLIQUITY.sin() * l.sin()).asin()
}

fn solar_mean_anomaly(d: f64) -> f64 {
    DEG_TO_RAD * (357.5291 + 0.985_600_28 * d)
}

fn ecliptic_longitude(m: f64) -> f64 {
    // equation of center
    let c = DEG_TO_RAD * (1.9148 * m.sin() + 0.02 * (2.0 * m).sin() + 0.0003 * (3.0 * m).sin());
    let perihelion = DEG_TO_RAD * 102.9372;
    m + c + perihelion + PI
}

fn julian_cycle(d: f64, lw: f64) -> f64 {
    (d - J0 - lw / (2.0 * PI)).round()
}

fn approx_transit(ht: f64, lw: f64, n: f64) -> f64 {
    J0 + (ht + lw) / (2.0 * PI) + n
}

fn solar_transit_j(ds: f64, m: f64, l: f64) -> f64 {
    J2000 + ds + 0.0053 * m.sin() - 0.0069 * (2.0 * l).sin()
}

/// NaN when the sun never reaches altitude `h` at this latitude on this day.
fn hour_angle(h: f64, phi: f64, dec: f64) -> f64 {
    ((h.sin() - phi.sin() * dec.sin()) / (phi.cos() * dec.cos())).acos()
}

/// All phase transitions of the solar day nearest `at`, sorted ascending.
pub fn sun_phases(lat_deg: f64, lon_deg: f64, at: DateTime<Utc>) -> Vec<(SunPhase, DateTime<Utc>)> {
    let lw = DEG_TO_RAD * -lon_deg;
    let phi = DEG_TO_RAD * lat_deg;

    let d = to_days(at);
    let n = julian_cycle(d, lw);
    let ds = approx_transit(0.0, lw, n);

    let m = solar_mean_anomaly(ds);
    let l = ecliptic_longitude(m);
    let dec = declination(l, 0.0);

    let j_noon = solar_transit_j(ds, m, l);

    let mut phases: Vec<(SunPhase, DateTime<Utc>)> = Vec::with_capacity(14);
    phases.extend(from_julian(j_noon).map(|t| (SunPhase::SolarNoon, t)));
    phases.extend(from_julian(j_noon - 0.5).map(|t| (SunPhase::Nadir, t)));

    for (altitude, rise, set) in ALTITUDE_PHASES {
        let w = hour_angle(altitude * DEG_TO_RAD, phi, dec);
        if w.is_nan() {
            continue;
        }
        let j_set = solar_transit_j(approx_transit(w, lw, n), m, l);
        let j_rise = j_noon - (j_set - j_noon);
        phases.extend(from_julian(j_rise).map(|t| (rise, t)));
        phases.extend(from_julian(j_set).map(|t| (set, t)));
    }

    phases.sort_by_key(|(_, t)| *t);
    phases
}
