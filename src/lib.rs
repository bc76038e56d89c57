use std::collections::BTreeMap;
use std::ffi::{CStr, CString, c_char};
use std::sync::{Arc, Mutex, Once, PoisonError};

use log::{info, debug, warn, error};

pub mod config;
pub mod controller;
pub mod error;
pub mod geodesy;
pub mod ranking;
pub mod scoring;
pub mod site;
pub mod view;

pub use config::RankingConfig;
pub use controller::{
    ControllerState, CycleReport, CycleTiming, LocationProvider, PositionSample, RankingSink,
    SampleHandler, Subscription, UpdateController, UpdateOutcome, WatchId,
};
pub use error::{CatalogError, ConfigError, PositionError, ScoringError};
pub use geodesy::{
    bearing_from_observer_to_site, bearing_from_site_to_observer, contour_bucket, contour_lookup,
    distance_miles, fast_overestimate_distance, latitude_lower_bound, Position, CONTOUR_BUCKETS,
    EARTH_RADIUS_MI,
};
pub use ranking::{order_visible, rank};
pub use scoring::{score_all, score_site};
pub use site::{Catalog, Derived, Site, SiteRecord};
pub use view::{views, ScoreColor, SiteView};

// ---------- Logging ----------

static INIT_LOGGER: Once = Once::new();

#[cfg(target_os = "android")]
fn init_logger() {
    use android_logger::Config;
    use log::LevelFilter;
    INIT_LOGGER.call_once(|| {
        android_logger::init_once(
            Config::default()
                .with_max_level(LevelFilter::Debug)
                .with_tag("sitescore")
        );
    });
}

#[cfg(not(target_os = "android"))]
fn init_logger() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .try_init();
    });
}

// ---------- C ABI ----------

fn read_c_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

fn into_c_json(json: String) -> *mut c_char {
    // serde_json escapes interior NULs, so this only fails on a bug
    CString::new(json)
        .unwrap_or_else(|_| CString::from(c"[]"))
        .into_raw()
}

fn empty_json() -> *mut c_char {
    into_c_json("[]".to_string())
}

fn views_json(ranked: &[&Site]) -> String {
    serde_json::to_string(&views(ranked)).unwrap_or_else(|e| {
        error!("[views_json] failed to serialize views: {}", e);
        "[]".to_string()
    })
}

#[no_mangle]
pub extern "C" fn free_json(ptr: *mut c_char) {
    if ptr.is_null() { return; }
    unsafe { let _ = CString::from_raw(ptr); }
}

/// One-shot ranking of `catalog_json` for a single position. Returns a JSON
/// array of site views, `[]` on any failure. Free with [`free_json`].
#[no_mangle]
pub extern "C" fn sitescore_rank(
    catalog_json: *const c_char,
    lat: f64, lon: f64,
) -> *mut c_char {
    init_logger();
    debug!("[sitescore_rank] called with lat: {}, lon: {}", lat, lon);

    let Some(json) = read_c_str(catalog_json) else {
        error!("[sitescore_rank] catalog pointer is null");
        return empty_json();
    };
    let config = RankingConfig::default();
    let mut catalog = match Catalog::from_json_str(&json) {
        Ok(c) => c,
        Err(e) => {
            error!("[sitescore_rank] rejected catalog: {}", e);
            return empty_json();
        }
    };
    let position = match Position::validated(lat, lon) {
        Ok(p) => p,
        Err(e) => {
            warn!("[sitescore_rank] {}", e);
            return empty_json();
        }
    };

    let total = catalog.len();
    match rank(&mut catalog, position, &config) {
        Ok(ranked) => {
            info!("[sitescore_rank] {} of {} sites visible", ranked.len(), total);
            into_c_json(views_json(&ranked))
        }
        Err(e) => {
            error!("[sitescore_rank] {}", e);
            empty_json()
        }
    }
}

/// Rendered JSON waiting for the caller whose cycle produced it, keyed by
/// cycle number.
type Pending = Arc<Mutex<BTreeMap<u64, String>>>;

/// Renders each cycle's ranking to JSON. The sink renders exactly once per
/// completed cycle, so its own count matches `CycleReport::cycle`.
pub struct JsonSink {
    rendered: u64,
    pending: Pending,
}

impl RankingSink for JsonSink {
    fn render(&mut self, ranked: &[&Site]) {
        self.rendered += 1;
        let json = views_json(ranked);
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(self.rendered, json);
    }
}

/// A host-side ranking session: one catalog, one observer. Safe to feed
/// from several threads; each caller gets the JSON of its own cycle.
pub struct Session {
    controller: UpdateController<JsonSink>,
    pending: Pending,
}

impl Session {
    pub fn new(catalog: Catalog, config: RankingConfig) -> Self {
        let pending = Pending::default();
        let sink = JsonSink { rendered: 0, pending: Arc::clone(&pending) };
        Self {
            controller: UpdateController::new(catalog, config, sink),
            pending,
        }
    }

    /// JSON for the cycle this sample triggered, `None` if it was dropped or
    /// carried no usable position.
    pub fn update(&self, sample: PositionSample) -> Option<String> {
        match self.controller.on_sample(sample) {
            UpdateOutcome::Completed(report) => {
                let json = self
                    .pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&report.cycle);
                if json.is_none() {
                    error!("[Session::update] no rendered JSON for cycle {}", report.cycle);
                }
                json
            }
            _ => None,
        }
    }

    pub fn controller(&self) -> &UpdateController<JsonSink> {
        &self.controller
    }
}

/// Build a session from `sites.json` content and an optional config object
/// (`null` pointer for defaults). Returns null if either is rejected.
#[no_mangle]
pub extern "C" fn sitescore_session_new(
    catalog_json: *const c_char,
    config_json: *const c_char,
) -> *mut Session {
    init_logger();
    info!("[sitescore_session_new] Starting session");

    let config = match read_c_str(config_json) {
        None => RankingConfig::default(),
        Some(json) => match RankingConfig::from_json_str(&json) {
            Ok(c) => c,
            Err(e) => {
                error!("[sitescore_session_new] rejected config: {}", e);
                return std::ptr::null_mut();
            }
        },
    };
    let Some(json) = read_c_str(catalog_json) else {
        error!("[sitescore_session_new] catalog pointer is null");
        return std::ptr::null_mut();
    };
    match Catalog::from_json_str(&json) {
        Ok(catalog) => {
            info!("[sitescore_session_new] loaded {} sites", catalog.len());
            Box::into_raw(Box::new(Session::new(catalog, config)))
        }
        Err(e) => {
            error!("[sitescore_session_new] rejected catalog: {}", e);
            std::ptr::null_mut()
        }
    }
}

/// Feed one position sample. Returns the ranked JSON, or null when the
/// sample was dropped because a cycle is already running.
#[no_mangle]
pub extern "C" fn sitescore_session_update(
    session: *const Session,
    lat: f64, lon: f64,
) -> *mut c_char {
    if session.is_null() {
        error!("[sitescore_session_update] session pointer is null");
        return std::ptr::null_mut();
    }
    let session = unsafe { &*session };
    match session.update(Ok(Position::new(lat, lon))) {
        Some(json) => into_c_json(json),
        None => std::ptr::null_mut(),
    }
}

/// The platform failed to produce a position. Nothing is recomputed.
#[no_mangle]
pub extern "C" fn sitescore_session_position_error(
    session: *const Session,
    message: *const c_char,
) {
    if session.is_null() { return; }
    let session = unsafe { &*session };
    let message = read_c_str(message).unwrap_or_else(|| "unknown".to_string());
    session.update(Err(PositionError::Unavailable(message)));
}

#[no_mangle]
pub extern "C" fn sitescore_session_free(session: *mut Session) {
    if session.is_null() { return; }
    unsafe { drop(Box::from_raw(session)); }
}
