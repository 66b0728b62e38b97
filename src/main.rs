#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

/*
 * gnss-monitor: GNSS receiver telemetry relay.
 * Decodes the receiver's observables and PVT datagrams, serves the latest
 * state over HTTP and streams every record over WebSocket.
 * This program is shipped under Mozilla Public V2 license.
 */

extern crate gnss_rs as gnss;

use std::{sync::Arc, time::Duration};

use env_logger::{Builder, Target};
use log::{debug, error, info};

use tokio::{signal, time::interval};

mod api;
mod broadcast;
mod cli;
mod decoder;
mod error;
mod ingress;
mod proto;
mod record;
mod runtime;
mod settings;
mod store;
mod utils;

use crate::{
    api::AppState,
    broadcast::Broadcaster,
    cli::Cli,
    decoder::Category,
    error::Error,
    ingress::{Listener, Pipeline},
    runtime::Runtime,
    settings::Settings,
    store::StateStore,
};

/// Period of the disconnected subscribers sweep
const CLEANUP_PERIOD: Duration = Duration::from_secs(10);

async fn run(settings: Settings) -> Result<(), Error> {
    // bind everything first: partial start is not an option
    let mut listeners = Vec::with_capacity(Category::ALL.len());
    for category in Category::ALL {
        listeners.push(Listener::bind(category, settings.listener_addr(category)).await?);
    }

    let http = api::bind(settings.http).await?;

    let pipeline = Pipeline {
        store: Arc::new(StateStore::new(settings.ttl, settings.liveness)),
        broadcaster: Arc::new(Broadcaster::new(
            settings.queue_capacity,
            settings.max_subscribers,
            settings.send_timeout,
        )),
        runtime: Arc::new(Runtime::new()),
    };

    info!(
        "staleness threshold: {:?} - live with {} sats / status >= {}",
        pipeline.store.ttl(),
        settings.liveness.min_valid_sats,
        settings.liveness.min_solution_status,
    );

    for listener in listeners {
        debug!("spawning {} listener", listener.category());
        tokio::spawn(listener.run(pipeline.clone()));
    }

    let broadcaster = Arc::clone(&pipeline.broadcaster);
    tokio::spawn(async move {
        let mut period = interval(CLEANUP_PERIOD);
        loop {
            period.tick().await;
            let removed = broadcaster.cleanup_disconnected();
            if removed > 0 {
                debug!("removed {} disconnected subscriber(s)", removed);
            }
        }
    });

    let state = AppState {
        pipeline,
        limit: settings.limit,
    };

    tokio::select! {
        served = api::serve(http, state) => served,
        _ = signal::ctrl_c() => {
            info!("interrupted: shutting down");
            Ok(())
        },
    }
}

#[tokio::main]
pub async fn main() {
    let mut builder = Builder::from_default_env();

    builder
        .target(Target::Stdout)
        .format_timestamp_secs()
        .format_module_path(false)
        .init();

    let settings = match Cli::new().settings() {
        Ok(settings) => settings,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        },
    };

    if let Err(e) = run(settings).await {
        error!("{}", e);
        std::process::exit(1);
    }
}
