//! Per-site score for one observer position.
//!
//! Score is `distance / range`, where `range` is the site's contour value in
//! the observer's direction. Lower is better; sites above the visibility
//! cutoff are hidden.

use log::trace;

use crate::error::ScoringError;
use crate::geodesy::{
    bearing_from_observer_to_site, bearing_from_site_to_observer, contour_lookup, distance_miles,
    fast_overestimate_distance, latitude_lower_bound, Position,
};
use crate::site::Site;

/// Score assigned to sites that cannot be within range this cycle.
pub const OUT_OF_RANGE: f64 = f64::INFINITY;

pub fn is_visible(score: f64, cutoff: f64) -> bool {
    score <= cutoff
}

fn mark_out_of_range(site: &mut Site, observer: Position) {
    site.derived.distance = fast_overestimate_distance(observer, site.location());
    site.derived.score = OUT_OF_RANGE;
    site.derived.visible = false;
}

/// Recompute one site's derived fields in place.
///
/// Two pruning stages short-circuit sites farther than their pruning radius:
/// a trig-free latitude bound first, then the exact distance. Pruned sites
/// keep last cycle's bearings and range.
pub fn score_site(site: &mut Site, observer: Position, cutoff: f64) -> Result<(), ScoringError> {
    let location = site.location();
    let max_distance = site.max_distance(cutoff);

    if latitude_lower_bound(observer, location) > max_distance {
        mark_out_of_range(site, observer);
        return Ok(());
    }

    let distance = distance_miles(observer, location);
    if distance > max_distance {
        trace!("[score_site] {} pruned at {:.2} mi", site.callsign(), distance);
        mark_out_of_range(site, observer);
        return Ok(());
    }

    let bearing_from = bearing_from_site_to_observer(observer, location);
    let range = contour_lookup(site.contour(), bearing_from);
    let score = distance / range;
    if !score.is_finite() {
        return Err(ScoringError::Degenerate {
            callsign: site.callsign().to_string(),
            distance,
            range,
        });
    }

    let derived = &mut site.derived;
    derived.distance = distance;
    derived.bearing_from = bearing_from;
    derived.range = range;
    derived.score = score;
    derived.visible = is_visible(score, cutoff);
    if derived.visible {
        derived.bearing_to = bearing_from_observer_to_site(observer, location);
    }
    Ok(())
}

/// Score every site in catalog order. Stops at the first degenerate site.
pub fn score_all(sites: &mut [Site], observer: Position, cutoff: f64) -> Result<(), ScoringError> {
    for site in sites.iter_mut() {
        score_site(site, observer, cutoff)?;
    }
    Ok(())
}
