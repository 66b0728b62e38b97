use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

use serde::Serialize;

use crate::{record::ObservableSample, utils::to_constellation};

/// Feed health, as reported next to every observables snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSummary {
    /// Channels currently fresh
    pub fresh_channels: usize,

    /// Age of the PVT slot, even when stale. None: never received.
    pub pvt_age_ms: Option<u64>,

    /// Age of the latest observables write. None: never written.
    pub observables_age_ms: Option<u64>,

    /// Fresh PVT accepted by the liveness policy
    pub is_live: bool,

    pub ttl_ms: u64,

    /// Fresh channels per constellation
    pub constellations: BTreeMap<String, usize>,
}

pub(crate) fn age_ms(now: Instant, then: Instant) -> u64 {
    now.saturating_duration_since(then).as_millis() as u64
}

pub(crate) fn ttl_ms(ttl: Duration) -> u64 {
    ttl.as_millis() as u64
}

/// Counts channels per constellation. Unknown system tags are kept verbatim.
pub(crate) fn constellations<'a>(
    samples: impl Iterator<Item = &'a ObservableSample>,
) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for sample in samples {
        let key = match to_constellation(&sample.system) {
            Some(constellation) => constellation.to_string(),
            None => sample.system.clone(),
        };
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}
