//! Great-circle math between the observer and a site.
//!
//! Inputs are decimal degrees; conversion to radians happens inside each
//! function. Formulas follow https://www.movable-type.co.uk/scripts/latlong.html

use serde::{Deserialize, Serialize};

use crate::error::PositionError;

// ---------- Constants ----------
pub const EARTH_RADIUS_MI: f64 = 3958.8;

/// Number of 2° bearing buckets in a coverage contour.
pub const CONTOUR_BUCKETS: usize = 180;
pub const BUCKET_WIDTH_DEG: f64 = 360.0 / CONTOUR_BUCKETS as f64;

/// A point on the earth, decimal degrees. No altitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Reject samples the provider should never have produced.
    pub fn validated(latitude: f64, longitude: f64) -> Result<Self, PositionError> {
        if !is_valid_coordinate(latitude, longitude) {
            return Err(PositionError::InvalidCoordinate { latitude, longitude });
        }
        Ok(Self::new(latitude, longitude))
    }
}

pub(crate) fn is_valid_coordinate(lat: f64, lon: f64) -> bool {
    lat.is_finite() && lon.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
}

// ---------- Distance ----------

/// Haversine great-circle distance in miles.
pub fn distance_miles(observer: Position, site: Position) -> f64 {
    let site_phi = site.latitude.to_radians();
    let obs_phi = observer.latitude.to_radians();
    let delta_phi = (site.latitude - observer.latitude).to_radians();
    let delta_lambda = (site.longitude - observer.longitude).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + site_phi.cos() * obs_phi.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_MI * c
}

/// Flat-earth distance treating degrees of latitude and longitude as equal
/// arcs. Never less than [`distance_miles`], since a meridian-parallel path
/// on the sphere is no longer than the same path in the lat/lon plane.
pub fn fast_overestimate_distance(observer: Position, site: Position) -> f64 {
    let delta_phi = (site.latitude - observer.latitude).to_radians();
    let delta_lambda = (site.longitude - observer.longitude).to_radians();
    EARTH_RADIUS_MI * (delta_phi * delta_phi + delta_lambda * delta_lambda).sqrt()
}

/// Meridian arc between the two latitudes. Never more than
/// [`distance_miles`]; used to prune sites without trig.
pub fn latitude_lower_bound(observer: Position, site: Position) -> f64 {
    EARTH_RADIUS_MI * (site.latitude - observer.latitude).abs().to_radians()
}

// ---------- Bearing ----------

fn initial_bearing(from: Position, to: Position) -> f64 {
    let from_phi = from.latitude.to_radians();
    let to_phi = to.latitude.to_radians();
    let delta_lambda = (to.longitude - from.longitude).to_radians();

    let y = delta_lambda.sin() * to_phi.cos();
    let x = from_phi.cos() * to_phi.sin() - from_phi.sin() * to_phi.cos() * delta_lambda.cos();
    unwind_deg(y.atan2(x).to_degrees())
}

/// Azimuth at the site pointing toward the observer, [0, 360). Not rounded.
pub fn bearing_from_site_to_observer(observer: Position, site: Position) -> f64 {
    initial_bearing(site, observer)
}

/// Azimuth at the observer pointing toward the site, rounded to a whole
/// degree for display.
pub fn bearing_from_observer_to_site(observer: Position, site: Position) -> u16 {
    (initial_bearing(observer, site).round() as u16) % 360
}

fn unwind_deg(x: f64) -> f64 {
    let x = (x + 360.0) % 360.0;
    // -1e-17 + 360 rounds to 360.0 in f64
    if x >= 360.0 { 0.0 } else { x }
}

// ---------- Contour lookup ----------

/// Bucket index for a continuous bearing: `round(bearing / 2) mod 180`.
pub fn contour_bucket(bearing_deg: f64) -> usize {
    let index = (bearing_deg / BUCKET_WIDTH_DEG).round().rem_euclid(CONTOUR_BUCKETS as f64);
    index as usize % CONTOUR_BUCKETS
}

/// Range in miles the contour predicts along `bearing_deg` from the site.
pub fn contour_lookup(contour: &[f64], bearing_deg: f64) -> f64 {
    contour[contour_bucket(bearing_deg)]
}
