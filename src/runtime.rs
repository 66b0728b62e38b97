use std::sync::atomic::{AtomicU64, Ordering};

use hifitime::prelude::{Duration, Epoch};
use serde::Serialize;

use crate::decoder::Category;

#[derive(Debug, Default)]
struct Counters {
    datagrams: AtomicU64,
    decode_errors: AtomicU64,
    published: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> CountersStatus {
        CountersStatus {
            datagrams: self.datagrams.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountersStatus {
    pub datagrams: u64,
    pub decode_errors: u64,
    pub published: u64,
}

/// Process wide status, as reported by the health endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuntimeStatus {
    /// Deployment [Epoch] (UTC)
    pub deployed: String,
    pub uptime_s: f64,
    pub subscribers: usize,
    pub observables: CountersStatus,
    pub pvt: CountersStatus,
}

#[derive(Debug)]
pub struct Runtime {
    /// Epoch of deployment
    deploy_time: Option<Epoch>,

    observables: Counters,
    pvt: Counters,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            deploy_time: Epoch::now().ok(),
            observables: Default::default(),
            pvt: Default::default(),
        }
    }

    fn counters(&self, category: Category) -> &Counters {
        match category {
            Category::Observables => &self.observables,
            Category::Pvt => &self.pvt,
        }
    }

    /// Uptime as [Duration]
    pub fn uptime(&self) -> Duration {
        match (self.deploy_time, Epoch::now()) {
            (Some(deployed), Ok(now)) => now - deployed,
            _ => Duration::ZERO,
        }
    }

    pub fn new_datagram(&self, category: Category) {
        self.counters(category)
            .datagrams
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn decode_error(&self, category: Category) {
        self.counters(category)
            .decode_errors
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn published(&self, category: Category) {
        self.counters(category)
            .published
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn status(&self, subscribers: usize) -> RuntimeStatus {
        RuntimeStatus {
            subscribers,
            deployed: self
                .deploy_time
                .map(|t| t.to_string())
                .unwrap_or_default(),
            uptime_s: self.uptime().to_seconds(),
            observables: self.observables.snapshot(),
            pvt: self.pvt.snapshot(),
        }
    }
}
