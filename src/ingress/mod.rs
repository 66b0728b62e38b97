//! Datagram listeners, one per [Category].
//!
//! Each datagram is processed exactly once, in arrival order:
//! decode, then record and publish. Nothing is buffered nor retried,
//! a datagram that fails to decode is logged and dropped.

use std::{net::SocketAddr, sync::Arc};

use log::{error, info, trace, warn};
use tokio::net::UdpSocket;

use crate::{
    broadcast::Broadcaster,
    decoder::{Category, Telemetry, decode},
    error::{DecodeError, Error},
    record::Arrival,
    runtime::Runtime,
    store::StateStore,
};

/// Largest datagram we accept
const MAX_DATAGRAM_SIZE: usize = 65536;

/// Decoded datagrams flow from here into the store and the broadcaster,
/// neither of which knows about the other.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub store: Arc<StateStore>,
    pub broadcaster: Arc<Broadcaster>,
    pub runtime: Arc<Runtime>,
}

impl Pipeline {
    /// Handles one datagram. Returns the number of subscribers reached.
    pub fn dispatch(
        &self,
        category: Category,
        bytes: &[u8],
        arrival: &Arrival,
    ) -> Result<usize, DecodeError> {
        self.runtime.new_datagram(category);

        let telemetry = match decode(category, bytes, arrival) {
            Ok(telemetry) => telemetry,
            Err(e) => {
                self.runtime.decode_error(category);
                return Err(e);
            },
        };

        if telemetry.is_empty() {
            trace!("{} - no active channel", category);
            return Ok(0);
        }

        self.store.record(&telemetry);

        let reached = self.broadcaster.publish(&telemetry);
        self.runtime.published(category);

        if let Telemetry::Observables { observables } = &telemetry {
            trace!(
                "{} - {} channel(s) to {} subscriber(s)",
                category,
                observables.len(),
                reached
            );
        }

        Ok(reached)
    }
}

pub struct Listener {
    category: Category,
    socket: UdpSocket,
}

impl Listener {
    /// Binds the listener. Failure is fatal to the caller.
    pub async fn bind(category: Category, addr: SocketAddr) -> Result<Self, Error> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| Error::Bind {
                category,
                addr,
                source,
            })?;

        info!("{} listener bound to {}", category, addr);
        Ok(Self { category, socket })
    }

    pub fn category(&self) -> Category {
        self.category
    }

    #[cfg(test)]
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive loop, runs for the process lifetime
    pub async fn run(self, pipeline: Pipeline) {
        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            let (size, peer) = match self.socket.recv_from(&mut buffer).await {
                Ok(received) => received,
                Err(e) => {
                    error!("{} - recv error: {}", self.category, e);
                    continue;
                },
            };

            let arrival = Arrival::now();

            match pipeline.dispatch(self.category, &buffer[..size], &arrival) {
                Ok(_) => {},
                Err(e) => {
                    warn!(
                        "{} - dropped {} byte datagram from {}: {}",
                        self.category, size, peer, e
                    );
                },
            }
        }
    }
}
