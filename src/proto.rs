//! Receiver monitoring schema.
//!
//! The receiver serializes one message per datagram:
//! [Observables] on the observables port, [MonitorPvt] on the PVT port.
//! Only the fields this relay consumes are declared, other tags
//! are skipped on decoding.

/// Tracking state of one receiver channel
#[derive(Clone, PartialEq, prost::Message)]
pub struct GnssSynchro {
    /// Constellation tag ("G", "E", ..)
    #[prost(string, tag = "1")]
    pub system: String,

    /// Band/code tag ("1C", "1B", "5X", ..)
    #[prost(string, tag = "2")]
    pub signal: String,

    #[prost(uint32, tag = "3")]
    pub prn: u32,

    #[prost(int32, tag = "4")]
    pub channel_id: i32,

    /// Sampling rate. Zero on inactive or unassigned channels.
    #[prost(int64, tag = "10")]
    pub fs: i64,

    #[prost(double, tag = "13")]
    pub cn0_db_hz: f64,

    #[prost(double, tag = "14")]
    pub carrier_doppler_hz: f64,

    #[prost(double, tag = "15")]
    pub carrier_phase_rads: f64,

    #[prost(double, tag = "22")]
    pub pseudorange_m: f64,

    #[prost(bool, tag = "24")]
    pub flag_valid_pseudorange: bool,
}

/// One observables epoch: all channels
#[derive(Clone, PartialEq, prost::Message)]
pub struct Observables {
    #[prost(message, repeated, tag = "1")]
    pub observable: Vec<GnssSynchro>,
}

/// Navigation solution epoch
#[derive(Clone, PartialEq, prost::Message)]
pub struct MonitorPvt {
    #[prost(uint32, tag = "1")]
    pub tow_at_current_symbol_ms: u32,

    #[prost(uint32, tag = "2")]
    pub week: u32,

    #[prost(double, tag = "3")]
    pub rx_time: f64,

    #[prost(double, tag = "4")]
    pub user_clk_offset: f64,

    #[prost(double, tag = "5")]
    pub pos_x: f64,

    #[prost(double, tag = "6")]
    pub pos_y: f64,

    #[prost(double, tag = "7")]
    pub pos_z: f64,

    #[prost(double, tag = "8")]
    pub vel_x: f64,

    #[prost(double, tag = "9")]
    pub vel_y: f64,

    #[prost(double, tag = "10")]
    pub vel_z: f64,

    #[prost(double, tag = "17")]
    pub latitude: f64,

    #[prost(double, tag = "18")]
    pub longitude: f64,

    #[prost(double, tag = "19")]
    pub height: f64,

    #[prost(uint32, tag = "20")]
    pub valid_sats: u32,

    #[prost(uint32, tag = "21")]
    pub solution_status: u32,

    #[prost(uint32, tag = "22")]
    pub solution_type: u32,

    #[prost(double, tag = "25")]
    pub gdop: f64,

    #[prost(double, tag = "26")]
    pub pdop: f64,

    #[prost(double, tag = "27")]
    pub hdop: f64,

    #[prost(double, tag = "28")]
    pub vdop: f64,

    #[prost(string, tag = "30")]
    pub utc_time: String,

    #[prost(double, tag = "31")]
    pub vel_e: f64,

    #[prost(double, tag = "32")]
    pub vel_n: f64,

    #[prost(double, tag = "33")]
    pub vel_u: f64,

    #[prost(double, tag = "34")]
    pub cog: f64,

    /// Galileo HAS corrections status
    #[prost(uint32, tag = "35")]
    pub galhas_status: u32,

    #[prost(string, tag = "36")]
    pub geohash: String,
}
