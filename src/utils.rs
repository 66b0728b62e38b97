use gnss::prelude::{Constellation, SV};
use hifitime::prelude::{Epoch, TimeScale};

const SBAS_PRN_OFFSET: u32 = 100;

/// Maps the receiver's one-letter system tag to a [Constellation]
pub fn to_constellation(system: &str) -> Option<Constellation> {
    match system.trim() {
        "G" => Some(Constellation::GPS),
        "R" => Some(Constellation::Glonass),
        "E" => Some(Constellation::Galileo),
        "C" => Some(Constellation::BeiDou),
        "J" => Some(Constellation::QZSS),
        "I" => Some(Constellation::IRNSS),
        "S" => Some(Constellation::SBAS),
        _ => None,
    }
}

/// Builds the [SV] a channel is tracking, when the system tag is known
pub fn to_sv(system: &str, prn: u32) -> Option<SV> {
    let constellation = to_constellation(system)?;

    let prn = if constellation.is_sbas() && prn >= SBAS_PRN_OFFSET {
        prn - SBAS_PRN_OFFSET
    } else {
        prn
    };

    let prn = u8::try_from(prn).ok()?;
    Some(SV::new(constellation, prn))
}

/// GPST [Epoch] from week counter and time of week (ms)
pub fn gpst_epoch(week: u32, tow_ms: u32) -> Option<Epoch> {
    if week == 0 {
        return None;
    }
    let nanos = tow_ms as u64 * 1_000_000;
    Some(Epoch::from_time_of_week(week, nanos, TimeScale::GPST))
}

/// Current wall clock as Unix milliseconds
pub fn unix_millis_now() -> u64 {
    match Epoch::now() {
        Ok(t) => t.to_unix_milliseconds().max(0.0) as u64,
        Err(_) => 0,
    }
}
