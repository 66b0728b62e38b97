//! Freshness aware "current truth".
//!
//! One PVT slot and one sample per channel. Entries older than the TTL are
//! never reported; stale channels are evicted by the readers that observe
//! them, there is no background sweep. A single mutex covers the whole
//! store and is never held across an await point.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use itertools::Itertools;
use log::trace;
use parking_lot::Mutex;

use crate::{
    decoder::Telemetry,
    record::{ObservableSample, PvtFix},
    settings::LivenessPolicy,
};

mod health;

pub use health::HealthSummary;

#[derive(Debug, Default)]
struct Inner {
    /// Latest fix, kept past its TTL to report its age
    pvt: Option<PvtFix>,

    /// Latest sample per channel id
    channels: HashMap<i32, ObservableSample>,

    /// Latest observables write
    last_observables: Option<Instant>,
}

#[derive(Debug)]
pub struct StateStore {
    inner: Mutex<Inner>,
    ttl: Duration,
    liveness: LivenessPolicy,
}

impl StateStore {
    pub fn new(ttl: Duration, liveness: LivenessPolicy) -> Self {
        Self {
            ttl,
            liveness,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_fresh(&self, received: Instant, now: Instant) -> bool {
        now.saturating_duration_since(received) < self.ttl
    }

    /// Records a decoded datagram
    pub fn record(&self, telemetry: &Telemetry) {
        match telemetry {
            Telemetry::Pvt(fix) => self.record_pvt(fix.clone()),
            Telemetry::Observables { observables } => self.record_observables(observables),
        }
    }

    /// Replaces the PVT slot
    pub fn record_pvt(&self, fix: PvtFix) {
        trace!("pvt: {}", fix);
        self.inner.lock().pvt = Some(fix);
    }

    /// Upserts one sample per channel. Last write wins, including within
    /// a single batch.
    pub fn record_observables(&self, samples: &[ObservableSample]) {
        let latest = match samples.iter().map(|sample| sample.received).max() {
            Some(latest) => latest,
            None => return,
        };

        let mut inner = self.inner.lock();

        for sample in samples {
            trace!("observable: {}", sample);
            inner.channels.insert(sample.channel_id, sample.clone());
        }

        inner.last_observables = Some(latest);
    }

    /// Latest fix, None when absent or stale
    pub fn current_pvt(&self) -> Option<PvtFix> {
        self.current_pvt_at(Instant::now())
    }

    fn current_pvt_at(&self, now: Instant) -> Option<PvtFix> {
        let inner = self.inner.lock();
        inner
            .pvt
            .as_ref()
            .filter(|fix| self.is_fresh(fix.received, now))
            .cloned()
    }

    /// Fresh channels, strongest first, at most `limit` of them
    pub fn current_observables(&self, limit: Option<usize>) -> Vec<ObservableSample> {
        self.current_observables_at(Instant::now(), limit)
    }

    fn current_observables_at(&self, now: Instant, limit: Option<usize>) -> Vec<ObservableSample> {
        let mut inner = self.inner.lock();
        self.evict_stale(&mut inner, now);
        Self::strongest_first(&inner, limit)
    }

    /// [HealthSummary] of the feed
    pub fn health_summary(&self) -> HealthSummary {
        self.health_summary_at(Instant::now())
    }

    fn health_summary_at(&self, now: Instant) -> HealthSummary {
        let mut inner = self.inner.lock();
        self.evict_stale(&mut inner, now);
        self.summarize(&inner, now)
    }

    /// Observables and [HealthSummary] observed under the same lock
    pub fn snapshot(&self, limit: Option<usize>) -> (Vec<ObservableSample>, HealthSummary) {
        self.snapshot_at(Instant::now(), limit)
    }

    fn snapshot_at(
        &self,
        now: Instant,
        limit: Option<usize>,
    ) -> (Vec<ObservableSample>, HealthSummary) {
        let mut inner = self.inner.lock();
        self.evict_stale(&mut inner, now);
        (
            Self::strongest_first(&inner, limit),
            self.summarize(&inner, now),
        )
    }

    fn evict_stale(&self, inner: &mut Inner, now: Instant) {
        let before = inner.channels.len();

        inner
            .channels
            .retain(|_, sample| self.is_fresh(sample.received, now));

        let evicted = before - inner.channels.len();
        if evicted > 0 {
            trace!("evicted {} stale channel(s)", evicted);
        }
    }

    fn strongest_first(inner: &Inner, limit: Option<usize>) -> Vec<ObservableSample> {
        inner
            .channels
            .values()
            .sorted_by(|a, b| {
                b.cn0_db_hz
                    .total_cmp(&a.cn0_db_hz)
                    .then(a.channel_id.cmp(&b.channel_id))
            })
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    fn summarize(&self, inner: &Inner, now: Instant) -> HealthSummary {
        let is_live = inner
            .pvt
            .as_ref()
            .is_some_and(|fix| self.is_fresh(fix.received, now) && self.liveness.accepts(fix));

        HealthSummary {
            is_live,
            fresh_channels: inner.channels.len(),
            pvt_age_ms: inner
                .pvt
                .as_ref()
                .map(|fix| health::age_ms(now, fix.received)),
            observables_age_ms: inner.last_observables.map(|t| health::age_ms(now, t)),
            ttl_ms: health::ttl_ms(self.ttl),
            constellations: health::constellations(inner.channels.values()),
        }
    }
}
