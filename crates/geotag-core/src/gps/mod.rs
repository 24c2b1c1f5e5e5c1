//! Coordinate helpers: degrees-minutes-seconds encoding for the EXIF GPS
//! block, range checks and great-circle distance.

pub mod tags;

use serde::Serialize;

use crate::error::{GeotagError, Result};

/// Fixed denominator for the seconds rational (1/1000 arc-second).
pub const SECONDS_DENOMINATOR: u32 = 1000;

/// Mean Earth radius used by the Haversine distance.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Hemisphere {
    North,
    South,
    East,
    West,
}

impl Hemisphere {
    /// EXIF reference letter (`N`, `S`, `E`, `W`).
    pub fn as_char(self) -> char {
        match self {
            Hemisphere::North => 'N',
            Hemisphere::South => 'S',
            Hemisphere::East => 'E',
            Hemisphere::West => 'W',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'N' => Some(Hemisphere::North),
            'S' => Some(Hemisphere::South),
            'E' => Some(Hemisphere::East),
            'W' => Some(Hemisphere::West),
            _ => None,
        }
    }

    fn sign(self) -> f64 {
        match self {
            Hemisphere::North | Hemisphere::East => 1.0,
            Hemisphere::South | Hemisphere::West => -1.0,
        }
    }
}

/// One axis of a coordinate in EXIF form: integer degrees and minutes,
/// seconds as `seconds_num / seconds_den`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dms {
    pub reference: Hemisphere,
    pub degrees: u32,
    pub minutes: u32,
    pub seconds_num: u32,
    pub seconds_den: u32,
}

impl Dms {
    /// Truncates degrees and minutes, rounds seconds to the nearest
    /// 1/[`SECONDS_DENOMINATOR`], carrying into minutes and degrees when the
    /// rounding reaches 60.
    fn encode(magnitude: f64, reference: Hemisphere) -> Self {
        let mut degrees = magnitude.trunc() as u32;
        let minutes_f = (magnitude - degrees as f64) * 60.0;
        let mut minutes = minutes_f.trunc() as u32;
        let mut seconds_num =
            ((minutes_f - minutes as f64) * 60.0 * SECONDS_DENOMINATOR as f64).round() as u32;

        if seconds_num >= 60 * SECONDS_DENOMINATOR {
            seconds_num -= 60 * SECONDS_DENOMINATOR;
            minutes += 1;
        }
        if minutes >= 60 {
            minutes -= 60;
            degrees += 1;
        }

        Self {
            reference,
            degrees,
            minutes,
            seconds_num,
            seconds_den: SECONDS_DENOMINATOR,
        }
    }

    pub fn seconds(&self) -> f64 {
        self.seconds_num as f64 / self.seconds_den as f64
    }

    /// Signed decimal degrees.
    pub fn to_decimal(&self) -> f64 {
        let magnitude = self.degrees as f64 + self.minutes as f64 / 60.0 + self.seconds() / 3600.0;
        self.reference.sign() * magnitude
    }

    /// The three EXIF rationals (degrees, minutes, seconds).
    pub fn rationals(&self) -> Vec<exif::Rational> {
        vec![
            exif::Rational { num: self.degrees, denom: 1 },
            exif::Rational { num: self.minutes, denom: 1 },
            exif::Rational { num: self.seconds_num, denom: self.seconds_den },
        ]
    }
}

pub fn is_valid_lat(lat: f64) -> bool {
    (-90.0..=90.0).contains(&lat)
}

pub fn is_valid_lon(lon: f64) -> bool {
    (-180.0..=180.0).contains(&lon)
}

/// Rejects NaN and values outside [-90, 90] / [-180, 180].
pub fn check_range(lat: f64, lon: f64) -> Result<()> {
    if is_valid_lat(lat) && is_valid_lon(lon) {
        Ok(())
    } else {
        Err(GeotagError::OutOfRange { lat, lon })
    }
}

/// Encode a decimal coordinate pair as (latitude, longitude) DMS.
pub fn to_dms(lat: f64, lon: f64) -> Result<(Dms, Dms)> {
    check_range(lat, lon)?;
    let lat_ref = if lat >= 0.0 { Hemisphere::North } else { Hemisphere::South };
    let lon_ref = if lon >= 0.0 { Hemisphere::East } else { Hemisphere::West };
    Ok((Dms::encode(lat.abs(), lat_ref), Dms::encode(lon.abs(), lon_ref)))
}

/// Decode a (latitude, longitude) DMS pair back to decimal degrees.
pub fn from_dms(lat: &Dms, lon: &Dms) -> (f64, f64) {
    (lat.to_decimal(), lon.to_decimal())
}

/// Great-circle distance in meters (Haversine).
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lat2) = (lat1.to_radians(), lat2.to_radians());
    let dlat = lat2 - lat1;
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();
    EARTH_RADIUS_M * c
}
