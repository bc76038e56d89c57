//! Drives one ranking cycle per accepted position sample.
//!
//! The controller is either idle or updating. A sample that arrives while a
//! cycle is in flight is dropped outright; the next sample after the cycle
//! finishes supersedes it. Cycles never suspend, so the flag is a plain
//! atomic rather than a wait queue.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use log::{debug, error, info, warn};

use crate::config::RankingConfig;
use crate::error::{PositionError, ScoringError};
use crate::geodesy::Position;
use crate::ranking::rank;
use crate::site::{Catalog, Site};

/// What the geolocation provider delivers: a fix, or the reason it has none.
pub type PositionSample = Result<Position, PositionError>;

pub type SampleHandler = Arc<dyn Fn(PositionSample) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

/// Capability exposed by the platform's location service.
pub trait LocationProvider {
    /// Deliver one sample to `handler`, once.
    fn get_current_position(&mut self, handler: SampleHandler);
    /// Deliver every subsequent sample to `handler` until cleared.
    fn watch_position(&mut self, handler: SampleHandler) -> WatchId;
    fn clear_watch(&mut self, id: WatchId);
}

/// Consumer of each completed cycle's ordered, visible sites.
pub trait RankingSink: Send {
    fn render(&mut self, ranked: &[&Site]);
}

impl<F> RankingSink for F
where
    F: FnMut(&[&Site]) + Send,
{
    fn render(&mut self, ranked: &[&Site]) {
        self(ranked)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Updating,
}

#[derive(Debug, Clone, Copy)]
pub struct CycleTiming {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CycleTiming {
    pub fn elapsed(&self) -> Duration {
        self.finished_at - self.started_at
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed().num_microseconds().unwrap_or(i64::MAX) as f64 / 1000.0
    }
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    pub position: Position,
    pub visible: usize,
    pub timing: CycleTiming,
}

#[derive(Debug)]
pub enum UpdateOutcome {
    Completed(CycleReport),
    /// A cycle was already in flight.
    Dropped,
    /// The provider reported a failure; nothing was recomputed.
    NoSample(PositionError),
    Failed(ScoringError),
}

struct Inner<S> {
    catalog: Catalog,
    sink: S,
}

/// Resets the updating flag even if the sink panics.
struct UpdatingGuard<'a>(&'a AtomicBool);

impl Drop for UpdatingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct UpdateController<S: RankingSink> {
    config: RankingConfig,
    updating: AtomicBool,
    completed: AtomicU64,
    dropped: AtomicU64,
    inner: Mutex<Inner<S>>,
}

impl<S: RankingSink> UpdateController<S> {
    pub fn new(catalog: Catalog, config: RankingConfig, sink: S) -> Self {
        Self {
            config,
            updating: AtomicBool::new(false),
            completed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            inner: Mutex::new(Inner { catalog, sink }),
        }
    }

    pub fn state(&self) -> ControllerState {
        if self.updating.load(Ordering::Acquire) {
            ControllerState::Updating
        } else {
            ControllerState::Idle
        }
    }

    pub fn cycles_completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn samples_dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Read the catalog between cycles.
    pub fn with_catalog<R>(&self, f: impl FnOnce(&Catalog) -> R) -> R {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&inner.catalog)
    }

    /// Entry point for every sample, whichever subscription produced it.
    pub fn on_sample(&self, sample: PositionSample) -> UpdateOutcome {
        let position = match sample.and_then(|p| Position::validated(p.latitude, p.longitude)) {
            Ok(p) => p,
            Err(e) => {
                warn!("[on_sample] no position: {}", e);
                return UpdateOutcome::NoSample(e);
            }
        };

        if self
            .updating
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            debug!(
                "[on_sample] update in flight, dropping ({:.5}, {:.5})",
                position.latitude, position.longitude
            );
            return UpdateOutcome::Dropped;
        }
        let _guard = UpdatingGuard(&self.updating);

        let started_at = Utc::now();
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let Inner { catalog, sink } = &mut *inner;

        let visible = match rank(catalog, position, &self.config) {
            Ok(ranked) => {
                sink.render(&ranked);
                ranked.len()
            }
            Err(e) => {
                error!("[on_sample] scoring failed: {}", e);
                return UpdateOutcome::Failed(e);
            }
        };

        let timing = CycleTiming {
            started_at,
            finished_at: Utc::now(),
        };
        let cycle = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            "[on_sample] finished updating in {:.3} ms ({} of {} sites visible)",
            timing.elapsed_ms(),
            visible,
            catalog.len()
        );

        UpdateOutcome::Completed(CycleReport {
            cycle,
            position,
            visible,
            timing,
        })
    }
}

impl<S: RankingSink + 'static> UpdateController<S> {
    /// Feed both the one-shot and the continuous position stream into
    /// [`UpdateController::on_sample`].
    pub fn subscribe(self: &Arc<Self>, provider: &mut dyn LocationProvider) -> Subscription {
        let controller = Arc::clone(self);
        let handler: SampleHandler = Arc::new(move |sample| {
            controller.on_sample(sample);
        });

        info!("[subscribe] requesting location");
        provider.get_current_position(Arc::clone(&handler));
        let watch = provider.watch_position(handler);
        Subscription { watch }
    }
}

/// Handle for the continuous stream; cancel on teardown.
#[derive(Debug)]
pub struct Subscription {
    watch: WatchId,
}

impl Subscription {
    pub fn watch_id(&self) -> WatchId {
        self.watch
    }

    pub fn cancel(self, provider: &mut dyn LocationProvider) {
        provider.clear_watch(self.watch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::tests::record;
    use std::collections::HashMap;
    use std::sync::{OnceLock, Weak};

    fn catalog() -> Catalog {
        Catalog::from_records(vec![
            record("NORTH", 36.0, -97.0, 30.0),
            record("SOUTH", 34.0, -97.0, 30.0),
        ])
        .unwrap()
    }

    type Renders = Arc<Mutex<Vec<Vec<String>>>>;

    fn recording_sink(renders: Renders) -> impl FnMut(&[&Site]) + Send {
        move |ranked: &[&Site]| {
            let names = ranked.iter().map(|s| s.callsign().to_string()).collect();
            renders.lock().unwrap().push(names);
        }
    }

    #[test]
    fn completes_a_cycle_and_returns_to_idle() {
        let renders: Renders = Arc::default();
        let controller = UpdateController::new(catalog(), RankingConfig::default(), recording_sink(renders.clone()));

        let outcome = controller.on_sample(Ok(Position::new(35.9, -97.0)));
        match outcome {
            UpdateOutcome::Completed(report) => {
                assert_eq!(report.cycle, 1);
                assert_eq!(report.visible, 1);
                assert!(report.timing.elapsed() >= Duration::zero());
            }
            other => panic!("expected a completed cycle, got {other:?}"),
        }
        assert_eq!(controller.state(), ControllerState::Idle);
        assert_eq!(*renders.lock().unwrap(), vec![vec!["NORTH".to_string()]]);
    }

    #[test]
    fn controller_cutoff_sets_the_pruning_radius() {
        // ~69 mi from a 20 mi range: score ~3.45, visible only under cutoff 5
        let catalog = Catalog::from_records(vec![record("WIDE", 0.0, 0.0, 20.0)]).unwrap();
        let renders: Renders = Arc::default();
        let config = RankingConfig { visibility_cutoff: 5.0 };
        let controller = UpdateController::new(catalog, config, recording_sink(renders.clone()));

        let outcome = controller.on_sample(Ok(Position::new(0.0, 1.0)));
        assert!(matches!(outcome, UpdateOutcome::Completed(ref r) if r.visible == 1));
        assert_eq!(*renders.lock().unwrap(), vec![vec!["WIDE".to_string()]]);
    }

    #[test]
    fn position_error_runs_no_cycle() {
        let renders: Renders = Arc::default();
        let controller = UpdateController::new(catalog(), RankingConfig::default(), recording_sink(renders.clone()));

        let outcome = controller.on_sample(Err(PositionError::Unavailable("denied".into())));
        assert!(matches!(outcome, UpdateOutcome::NoSample(_)));
        let outcome = controller.on_sample(Ok(Position::new(f64::NAN, 0.0)));
        assert!(matches!(outcome, UpdateOutcome::NoSample(PositionError::InvalidCoordinate { .. })));

        assert!(renders.lock().unwrap().is_empty());
        assert_eq!(controller.cycles_completed(), 0);
    }

    /// Sink that delivers a second sample from inside the first render, the
    /// way a fast provider would while a cycle is still running.
    struct ReentrantSink {
        controller: Arc<OnceLock<Weak<UpdateController<ReentrantSink>>>>,
        nested: Arc<Mutex<Vec<UpdateOutcome>>>,
        renders: Renders,
    }

    impl RankingSink for ReentrantSink {
        fn render(&mut self, ranked: &[&Site]) {
            let names = ranked.iter().map(|s| s.callsign().to_string()).collect();
            self.renders.lock().unwrap().push(names);

            if self.nested.lock().unwrap().is_empty() {
                let controller = self.controller.get().and_then(Weak::upgrade).unwrap();
                assert_eq!(controller.state(), ControllerState::Updating);
                let outcome = controller.on_sample(Ok(Position::new(34.1, -97.0)));
                self.nested.lock().unwrap().push(outcome);
            }
        }
    }

    #[test]
    fn overlapping_sample_is_dropped_not_queued() {
        let slot = Arc::new(OnceLock::new());
        let nested = Arc::new(Mutex::new(Vec::new()));
        let renders: Renders = Arc::default();
        let sink = ReentrantSink {
            controller: slot.clone(),
            nested: nested.clone(),
            renders: renders.clone(),
        };
        let controller = Arc::new(UpdateController::new(catalog(), RankingConfig::default(), sink));
        slot.set(Arc::downgrade(&controller)).unwrap();

        let first = controller.on_sample(Ok(Position::new(35.9, -97.0)));
        assert!(matches!(first, UpdateOutcome::Completed(_)));
        assert!(matches!(nested.lock().unwrap()[0], UpdateOutcome::Dropped));
        assert_eq!(controller.cycles_completed(), 1);
        assert_eq!(controller.samples_dropped(), 1);
        // only the first sample's ranking was rendered
        assert_eq!(*renders.lock().unwrap(), vec![vec!["NORTH".to_string()]]);

        let third = controller.on_sample(Ok(Position::new(34.1, -97.0)));
        assert!(matches!(third, UpdateOutcome::Completed(ref r) if r.cycle == 2));
        assert_eq!(renders.lock().unwrap().last().unwrap(), &vec!["SOUTH".to_string()]);
    }

    #[derive(Default)]
    struct ManualProvider {
        pending: Vec<SampleHandler>,
        watches: HashMap<WatchId, SampleHandler>,
        next_id: u64,
    }

    impl ManualProvider {
        fn resolve_current(&mut self, sample: PositionSample) {
            for handler in self.pending.drain(..) {
                handler(sample.clone());
            }
        }

        fn emit(&self, sample: PositionSample) {
            for handler in self.watches.values() {
                handler(sample.clone());
            }
        }
    }

    impl LocationProvider for ManualProvider {
        fn get_current_position(&mut self, handler: SampleHandler) {
            self.pending.push(handler);
        }

        fn watch_position(&mut self, handler: SampleHandler) -> WatchId {
            self.next_id += 1;
            let id = WatchId(self.next_id);
            self.watches.insert(id, handler);
            id
        }

        fn clear_watch(&mut self, id: WatchId) {
            self.watches.remove(&id);
        }
    }

    #[test]
    fn one_shot_and_watch_feed_the_same_entry_point() {
        let renders: Renders = Arc::default();
        let controller = Arc::new(UpdateController::new(
            catalog(),
            RankingConfig::default(),
            recording_sink(renders.clone()),
        ));
        let mut provider = ManualProvider::default();
        let subscription = controller.subscribe(&mut provider);

        provider.resolve_current(Ok(Position::new(35.9, -97.0)));
        provider.emit(Ok(Position::new(34.1, -97.0)));
        provider.emit(Err(PositionError::Unavailable("timeout".into())));
        assert_eq!(controller.cycles_completed(), 2);

        subscription.cancel(&mut provider);
        provider.emit(Ok(Position::new(35.9, -97.0)));
        assert_eq!(controller.cycles_completed(), 2);
        assert_eq!(renders.lock().unwrap().len(), 2);
    }
}
