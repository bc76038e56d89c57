use thiserror::Error;

/// Reasons a site catalog is rejected at load time.
///
/// A single malformed entry rejects the whole catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to parse catalog JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("site {callsign}: contour has {len} buckets, expected 180")]
    ContourLength { callsign: String, len: usize },

    #[error("site {callsign}: contour bucket {index} is {value}, must be positive")]
    NonPositiveContour {
        callsign: String,
        index: usize,
        value: f64,
    },

    #[error("site {callsign}: invalid coordinate ({lat}, {lon})")]
    InvalidCoordinate { callsign: String, lat: f64, lon: f64 },
}

/// The geolocation provider could not deliver a usable sample.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PositionError {
    #[error("position unavailable: {0}")]
    Unavailable(String),

    #[error("invalid position ({latitude}, {longitude})")]
    InvalidCoordinate { latitude: f64, longitude: f64 },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    #[error("site {callsign}: degenerate score (distance {distance}, range {range})")]
    Degenerate {
        callsign: String,
        distance: f64,
        range: f64,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to parse config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("visibility cutoff must be finite and positive, got {0}")]
    InvalidCutoff(f64),
}
