use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

use crate::{decoder::Category, record::PvtFix};

pub const DEFAULT_OBS_PORT: u16 = 1234;
pub const DEFAULT_PVT_PORT: u16 = 1235;
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_TTL: Duration = Duration::from_secs(5);
pub const DEFAULT_LIMIT: usize = 64;
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;
pub const DEFAULT_MAX_SUBSCRIBERS: usize = 100;

/// Decides whether a (fresh) [PvtFix] counts as a live navigation solution
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LivenessPolicy {
    /// Minimal number of satellites used in the solution
    pub min_valid_sats: u32,

    /// Minimal solution status code (0 means "no solution")
    pub min_solution_status: u32,
}

impl Default for LivenessPolicy {
    fn default() -> Self {
        Self {
            min_valid_sats: 4,
            min_solution_status: 1,
        }
    }
}

impl LivenessPolicy {
    pub fn accepts(&self, fix: &PvtFix) -> bool {
        fix.valid_sats >= self.min_valid_sats && fix.solution_status >= self.min_solution_status
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Address the datagram listeners bind to
    pub bind: IpAddr,

    pub obs_port: u16,
    pub pvt_port: u16,

    /// HTTP / WebSocket listen address
    pub http: SocketAddr,

    /// Staleness threshold, shared by both categories
    pub ttl: Duration,

    /// Default observables result count
    pub limit: usize,

    /// Per subscriber send timeout
    pub send_timeout: Duration,

    /// Per subscriber queue capacity
    pub queue_capacity: usize,

    pub max_subscribers: usize,

    pub liveness: LivenessPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            obs_port: DEFAULT_OBS_PORT,
            pvt_port: DEFAULT_PVT_PORT,
            http: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_HTTP_PORT),
            ttl: DEFAULT_TTL,
            limit: DEFAULT_LIMIT,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_subscribers: DEFAULT_MAX_SUBSCRIBERS,
            liveness: LivenessPolicy::default(),
        }
    }
}

impl Settings {
    /// Datagram listener address for given [Category]
    pub fn listener_addr(&self, category: Category) -> SocketAddr {
        match category {
            Category::Observables => SocketAddr::new(self.bind, self.obs_port),
            Category::Pvt => SocketAddr::new(self.bind, self.pvt_port),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        decoder::{Telemetry, decode, test::pvt_datagram},
        record::Arrival,
    };

    fn fix(valid_sats: u32, solution_status: u32) -> PvtFix {
        match decode(
            Category::Pvt,
            &pvt_datagram(valid_sats, solution_status),
            &Arrival::now(),
        ) {
            Ok(Telemetry::Pvt(fix)) => fix,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn default_liveness() {
        let policy = LivenessPolicy::default();
        assert!(!policy.accepts(&fix(3, 0)));
        assert!(!policy.accepts(&fix(6, 0)));
        assert!(!policy.accepts(&fix(3, 4)));
        assert!(policy.accepts(&fix(4, 1)));
        assert!(policy.accepts(&fix(6, 4)));
    }

    #[test]
    fn custom_liveness() {
        let policy = LivenessPolicy {
            min_valid_sats: 6,
            min_solution_status: 4,
        };
        assert!(!policy.accepts(&fix(5, 4)));
        assert!(!policy.accepts(&fix(6, 3)));
        assert!(policy.accepts(&fix(6, 4)));
    }

    #[test]
    fn listener_addresses() {
        let settings = Settings::default();
        assert_eq!(
            settings.listener_addr(Category::Observables),
            "0.0.0.0:1234".parse().unwrap()
        );
        assert_eq!(
            settings.listener_addr(Category::Pvt),
            "0.0.0.0:1235".parse().unwrap()
        );
    }
}
