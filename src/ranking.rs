//! Orders scored sites for display.

use crate::config::RankingConfig;
use crate::error::ScoringError;
use crate::geodesy::Position;
use crate::scoring::score_all;
use crate::site::{Catalog, Site};

/// Visible sites, best score first. Hidden sites are left out entirely.
///
/// `sort_by` is stable, so equal scores keep catalog order.
pub fn order_visible(sites: &[Site]) -> Vec<&Site> {
    let mut ranked: Vec<&Site> = sites.iter().filter(|s| s.derived.visible).collect();
    ranked.sort_by(|a, b| a.derived.score.total_cmp(&b.derived.score));
    ranked
}

/// One full scoring pass followed by ordering.
pub fn rank<'a>(
    catalog: &'a mut Catalog,
    observer: Position,
    config: &RankingConfig,
) -> Result<Vec<&'a Site>, ScoringError> {
    score_all(catalog.sites_mut(), observer, config.visibility_cutoff)?;
    Ok(order_visible(catalog.sites()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::tests::record;

    fn catalog(records: Vec<crate::site::SiteRecord>) -> Catalog {
        Catalog::from_records(records).unwrap()
    }

    #[test]
    fn ties_keep_catalog_order() {
        // co-located sites with identical contours score identically
        let mut cat = catalog(vec![
            record("FIRST", 35.0, -97.0, 20.0),
            record("SECOND", 35.0, -97.0, 20.0),
            record("THIRD", 35.0, -97.0, 20.0),
        ]);
        let ranked = rank(&mut cat, Position::new(35.2, -97.1), &RankingConfig::default()).unwrap();
        let names: Vec<&str> = ranked.iter().map(|s| s.callsign()).collect();
        assert_eq!(names, ["FIRST", "SECOND", "THIRD"]);
        assert_eq!(ranked[0].derived.score, ranked[2].derived.score);
    }

    #[test]
    fn orders_by_ascending_score_and_drops_hidden() {
        let mut cat = catalog(vec![
            record("FAR", 36.0, -97.0, 20.0),
            record("NEAR", 35.1, -97.0, 20.0),
            record("GONE", 40.0, -97.0, 20.0),
            record("MID", 35.5, -97.0, 20.0),
        ]);
        let ranked = rank(&mut cat, Position::new(35.0, -97.0), &RankingConfig::default()).unwrap();
        let names: Vec<&str> = ranked.iter().map(|s| s.callsign()).collect();
        // FAR is ~69 mi out: score ~3.45, hidden
        assert_eq!(names, ["NEAR", "MID"]);
        assert!(ranked.windows(2).all(|w| w[0].derived.score <= w[1].derived.score));
        assert!(cat.sites().iter().any(|s| s.callsign() == "GONE" && s.derived.score.is_infinite()));
    }

    #[test]
    fn empty_catalog_ranks_nothing() {
        let mut cat = Catalog::default();
        assert!(rank(&mut cat, Position::new(0.0, 0.0), &RankingConfig::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn each_cycle_reflects_the_latest_position() {
        let mut cat = catalog(vec![
            record("WEST", 35.0, -98.0, 20.0),
            record("EAST", 35.0, -96.0, 20.0),
        ]);
        let config = RankingConfig::default();

        let names: Vec<String> = rank(&mut cat, Position::new(35.0, -97.9), &config)
            .unwrap()
            .iter()
            .map(|s| s.callsign().to_string())
            .collect();
        assert_eq!(names, ["WEST"]);

        let names: Vec<String> = rank(&mut cat, Position::new(35.0, -96.1), &config)
            .unwrap()
            .iter()
            .map(|s| s.callsign().to_string())
            .collect();
        assert_eq!(names, ["EAST"]);
    }

    #[test]
    fn site_scoring_exactly_at_cutoff_is_ranked() {
        let observer = Position::new(0.0, 1.0);
        let d = crate::geodesy::distance_miles(observer, Position::new(0.0, 0.0));
        let mut cat = catalog(vec![
            record("EDGE", 0.0, 0.0, d / 3.0),
            record("OVER", 0.0, 0.0, d / 3.0001),
        ]);

        let ranked = rank(&mut cat, observer, &RankingConfig::default()).unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].callsign(), "EDGE");
        assert_eq!(ranked[0].derived.score, 3.0);
    }
}
