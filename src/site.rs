//! Site catalog: static transmitter records plus the fields each update
//! cycle overwrites.

use std::path::Path;

use log::{debug, info};
use serde::Deserialize;

use crate::error::CatalogError;
use crate::geodesy::{is_valid_coordinate, Position, CONTOUR_BUCKETS};

/// One entry of `sites.json` as the loader hands it over.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteRecord {
    pub site_lat: f64,
    pub site_lon: f64,
    pub frequency: f64,
    pub callsign: String,
    #[serde(default)]
    pub parent_callsign: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    pub contour: Vec<f64>,
}

/// Values written by a scoring pass. Stale values survive a pruned cycle;
/// only read them when `visible` is set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Derived {
    pub distance: f64,
    pub bearing_from: f64,
    pub bearing_to: u16,
    pub range: f64,
    pub score: f64,
    pub visible: bool,
}

impl Default for Derived {
    fn default() -> Self {
        Self {
            distance: f64::INFINITY,
            bearing_from: 0.0,
            bearing_to: 0,
            range: 0.0,
            score: f64::INFINITY,
            visible: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Site {
    record: SiteRecord,
    max_range: f64,
    pub derived: Derived,
}

impl Site {
    /// Validate a record and precompute its largest contour range.
    pub fn new(record: SiteRecord) -> Result<Self, CatalogError> {
        if !is_valid_coordinate(record.site_lat, record.site_lon) {
            return Err(CatalogError::InvalidCoordinate {
                callsign: record.callsign,
                lat: record.site_lat,
                lon: record.site_lon,
            });
        }
        if record.contour.len() != CONTOUR_BUCKETS {
            return Err(CatalogError::ContourLength {
                len: record.contour.len(),
                callsign: record.callsign,
            });
        }
        // rejects NaN and infinite buckets too
        if let Some((index, &value)) = record
            .contour
            .iter()
            .enumerate()
            .find(|(_, v)| !(v.is_finite() && **v > 0.0))
        {
            return Err(CatalogError::NonPositiveContour {
                callsign: record.callsign,
                index,
                value,
            });
        }

        let max_range = record.contour.iter().copied().fold(0.0_f64, f64::max);
        Ok(Self {
            max_range,
            record,
            derived: Derived::default(),
        })
    }

    pub fn location(&self) -> Position {
        Position::new(self.record.site_lat, self.record.site_lon)
    }

    pub fn contour(&self) -> &[f64] {
        &self.record.contour
    }

    pub fn max_range(&self) -> f64 {
        self.max_range
    }

    /// Beyond this many miles the site cannot score within `cutoff` in any
    /// direction.
    pub fn max_distance(&self, cutoff: f64) -> f64 {
        cutoff * self.max_range
    }

    pub fn callsign(&self) -> &str {
        &self.record.callsign
    }

    pub fn parent_callsign(&self) -> Option<&str> {
        self.record.parent_callsign.as_deref()
    }

    pub fn frequency(&self) -> f64 {
        self.record.frequency
    }

    pub fn city(&self) -> &str {
        &self.record.city
    }

    pub fn state(&self) -> &str {
        &self.record.state
    }
}

/// The fixed, ordered site list for a session.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    sites: Vec<Site>,
}

impl Catalog {
    pub fn from_records(records: Vec<SiteRecord>) -> Result<Self, CatalogError> {
        let sites = records
            .into_iter()
            .map(Site::new)
            .collect::<Result<Vec<_>, _>>()?;
        debug!("[catalog] validated {} sites", sites.len());
        Ok(Self { sites })
    }

    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let records: Vec<SiteRecord> = serde_json::from_str(json)?;
        Self::from_records(records)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let catalog = Self::from_json_str(&json)?;
        info!("[catalog] loaded {} sites from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn sites_mut(&mut self) -> &mut [Site] {
        &mut self.sites
    }
}
