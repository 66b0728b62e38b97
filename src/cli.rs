use clap::{Arg, ArgMatches, ColorChoice, Command};
use hifitime::prelude::Duration as HifiDuration;

use crate::{
    error::Error,
    settings::{LivenessPolicy, Settings},
};

use std::{fmt::Display, str::FromStr, time::Duration};

pub struct Cli {
    /// Arguments passed by user
    matches: ArgMatches,
}

impl Cli {
    /// Build new command line interface
    pub fn new() -> Self {
        Self {
            matches: Self::command().get_matches(),
        }
    }

    fn command() -> Command {
        Command::new("gnss-monitor")
            .version(env!("CARGO_PKG_VERSION"))
            .about("GNSS receiver telemetry relay")
            .color(ColorChoice::Always)
            .next_help_heading("Receiver streams")
            .arg(
                Arg::new("bind")
                    .long("bind")
                    .value_name("ADDR")
                    .help("Address the datagram listeners bind to. Default is 0.0.0.0"),
            )
            .arg(
                Arg::new("obs-port")
                    .long("obs-port")
                    .value_name("PORT")
                    .help("Observables datagram port. Default is 1234"),
            )
            .arg(
                Arg::new("pvt-port")
                    .long("pvt-port")
                    .value_name("PORT")
                    .help("PVT datagram port. Default is 1235"),
            )
            .next_help_heading("Snapshot")
            .arg(
                Arg::new("ttl")
                    .long("ttl")
                    .value_name("DURATION")
                    .help("Staleness threshold, for example \"5 s\" (default) or \"1500 ms\".
Older data is never reported as current."),
            )
            .arg(
                Arg::new("limit")
                    .long("limit")
                    .value_name("COUNT")
                    .help("Default number of observables per snapshot. Default is 64"),
            )
            .arg(
                Arg::new("min-sats")
                    .long("min-sats")
                    .value_name("COUNT")
                    .help("Minimal number of satellites for the feed to be declared live. Default is 4"),
            )
            .arg(
                Arg::new("min-status")
                    .long("min-status")
                    .value_name("CODE")
                    .help("Minimal solution status code for the feed to be declared live. Default is 1"),
            )
            .next_help_heading("HTTP / real-time feed")
            .arg(
                Arg::new("http")
                    .long("http")
                    .value_name("ADDR:PORT")
                    .help("HTTP and WebSocket listen address. Default is 0.0.0.0:8080"),
            )
            .arg(
                Arg::new("send-timeout")
                    .long("send-timeout")
                    .value_name("DURATION")
                    .help("Subscribers that cannot absorb a record within this duration are dropped. Default is \"1 s\""),
            )
            .arg(
                Arg::new("queue")
                    .long("queue")
                    .value_name("COUNT")
                    .help("Records queued per subscriber before it is considered lagging. Default is 64"),
            )
            .arg(
                Arg::new("max-subscribers")
                    .long("max-subscribers")
                    .value_name("COUNT")
                    .help("Maximal number of real-time subscribers. Default is 100"),
            )
    }

    #[cfg(test)]
    fn from_args(args: &[&str]) -> Self {
        let mut argv = vec!["gnss-monitor"];
        argv.extend_from_slice(args);
        Self {
            matches: Self::command().get_matches_from(argv),
        }
    }

    fn parse<T>(&self, id: &str, default: T) -> Result<T, Error>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.matches.get_one::<String>(id) {
            Some(value) => value
                .trim()
                .parse::<T>()
                .map_err(|e| Error::Config(format!("--{} \"{}\": {}", id, value, e))),
            None => Ok(default),
        }
    }

    fn duration(&self, id: &str, default: Duration) -> Result<Duration, Error> {
        let value = match self.matches.get_one::<String>(id) {
            Some(value) => value,
            None => return Ok(default),
        };

        let dt = value
            .trim()
            .parse::<HifiDuration>()
            .map_err(|e| Error::Config(format!("--{} \"{}\": {}", id, value, e)))?;

        let nanos = dt.total_nanoseconds();
        if nanos <= 0 {
            return Err(Error::Config(format!("--{} must be positive", id)));
        }

        let nanos = u64::try_from(nanos)
            .map_err(|_| Error::Config(format!("--{} \"{}\": too large", id, value)))?;

        Ok(Duration::from_nanos(nanos))
    }

    /// Runtime [Settings]
    pub fn settings(&self) -> Result<Settings, Error> {
        let defaults = Settings::default();

        let queue_capacity = self.parse("queue", defaults.queue_capacity)?;
        if queue_capacity == 0 {
            return Err(Error::Config("--queue must be positive".to_string()));
        }

        Ok(Settings {
            bind: self.parse("bind", defaults.bind)?,
            obs_port: self.parse("obs-port", defaults.obs_port)?,
            pvt_port: self.parse("pvt-port", defaults.pvt_port)?,
            http: self.parse("http", defaults.http)?,
            ttl: self.duration("ttl", defaults.ttl)?,
            limit: self.parse("limit", defaults.limit)?,
            send_timeout: self.duration("send-timeout", defaults.send_timeout)?,
            queue_capacity,
            max_subscribers: self.parse("max-subscribers", defaults.max_subscribers)?,
            liveness: LivenessPolicy {
                min_valid_sats: self.parse("min-sats", defaults.liveness.min_valid_sats)?,
                min_solution_status: self
                    .parse("min-status", defaults.liveness.min_solution_status)?,
            },
        })
    }
}
