use std::time::Instant;

use serde::Serialize;

use crate::{
    proto::{GnssSynchro, MonitorPvt},
    utils::{gpst_epoch, to_sv, unix_millis_now},
};

/// When a datagram reached this process
#[derive(Debug, Copy, Clone)]
pub struct Arrival {
    /// Monotonic instant, drives freshness
    pub instant: Instant,

    /// Wall clock (Unix ms), reported to consumers
    pub unix_ms: u64,
}

impl Arrival {
    pub fn now() -> Self {
        Self {
            instant: Instant::now(),
            unix_ms: unix_millis_now(),
        }
    }
}

/// One channel's tracking state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservableSample {
    pub channel_id: i32,
    pub system: String,
    pub signal: String,
    pub prn: u32,

    /// Tracked satellite, when the system tag is known
    pub sv: Option<String>,

    pub cn0_db_hz: f64,
    pub doppler_hz: f64,
    pub pseudorange_m: f64,
    pub carrier_phase_rads: f64,
    pub valid_pseudorange: bool,

    /// Sampling rate reported by the channel
    pub fs: i64,

    /// Unix ms
    pub arrival_time: u64,

    #[serde(skip)]
    pub received: Instant,
}

impl ObservableSample {
    pub fn from_proto(synchro: GnssSynchro, arrival: &Arrival) -> Self {
        let sv = to_sv(&synchro.system, synchro.prn).map(|sv| sv.to_string());
        Self {
            sv,
            channel_id: synchro.channel_id,
            system: synchro.system,
            signal: synchro.signal,
            prn: synchro.prn,
            cn0_db_hz: synchro.cn0_db_hz,
            doppler_hz: synchro.carrier_doppler_hz,
            pseudorange_m: synchro.pseudorange_m,
            carrier_phase_rads: synchro.carrier_phase_rads,
            valid_pseudorange: synchro.flag_valid_pseudorange,
            fs: synchro.fs,
            arrival_time: arrival.unix_ms,
            received: arrival.instant,
        }
    }
}

impl std::fmt::Display for ObservableSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ch#{} {}{:02}({}) cn0={:.1} dop={:.1}",
            self.channel_id, self.system, self.prn, self.signal, self.cn0_db_hz, self.doppler_hz,
        )
    }
}

/// One navigation solution epoch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PvtFix {
    pub week: u32,
    pub tow_ms: u32,

    /// GPST epoch rebuilt from week and time of week
    pub epoch: Option<String>,

    pub rx_time: f64,
    pub user_clk_offset: f64,
    pub utc_time: String,

    pub lat: f64,
    pub lon: f64,
    pub height: f64,
    pub geohash: String,

    pub pos_x: f64,
    pub pos_y: f64,
    pub pos_z: f64,

    pub vel_e: f64,
    pub vel_n: f64,
    pub vel_u: f64,

    pub vel_x: f64,
    pub vel_y: f64,
    pub vel_z: f64,

    /// Course over ground (deg)
    pub cog: f64,

    pub valid_sats: u32,
    pub solution_status: u32,
    pub solution_type: u32,

    /// Galileo HAS corrections status (0: not used)
    pub galhas_status: u32,

    pub gdop: f64,
    pub pdop: f64,
    pub hdop: f64,
    pub vdop: f64,

    /// Unix ms
    pub arrival_time: u64,

    #[serde(skip)]
    pub received: Instant,
}

impl PvtFix {
    pub fn from_proto(pvt: MonitorPvt, arrival: &Arrival) -> Self {
        Self {
            week: pvt.week,
            tow_ms: pvt.tow_at_current_symbol_ms,
            epoch: gpst_epoch(pvt.week, pvt.tow_at_current_symbol_ms).map(|t| t.to_string()),
            rx_time: pvt.rx_time,
            user_clk_offset: pvt.user_clk_offset,
            utc_time: pvt.utc_time,
            lat: pvt.latitude,
            lon: pvt.longitude,
            height: pvt.height,
            geohash: pvt.geohash,
            pos_x: pvt.pos_x,
            pos_y: pvt.pos_y,
            pos_z: pvt.pos_z,
            vel_e: pvt.vel_e,
            vel_n: pvt.vel_n,
            vel_u: pvt.vel_u,
            vel_x: pvt.vel_x,
            vel_y: pvt.vel_y,
            vel_z: pvt.vel_z,
            cog: pvt.cog,
            valid_sats: pvt.valid_sats,
            solution_status: pvt.solution_status,
            solution_type: pvt.solution_type,
            galhas_status: pvt.galhas_status,
            gdop: pvt.gdop,
            pdop: pvt.pdop,
            hdop: pvt.hdop,
            vdop: pvt.vdop,
            arrival_time: arrival.unix_ms,
            received: arrival.instant,
        }
    }
}

impl std::fmt::Display for PvtFix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "wk={} tow={}ms lat={:.7} lon={:.7} h={:.2} sats={} status={}",
            self.week,
            self.tow_ms,
            self.lat,
            self.lon,
            self.height,
            self.valid_sats,
            self.solution_status,
        )
    }
}
