use std::future::Future;

use tokio::sync::mpsc;

use crate::{broadcast::Payload, error::TransportSendError};

/// Transport end of one subscriber
pub trait SubscriberSink: Send {
    /// Delivers one serialized record. May block as long as the transport
    /// applies backpressure, the caller bounds it with a timeout.
    fn deliver(
        &mut self,
        payload: Payload,
    ) -> impl Future<Output = Result<(), TransportSendError>> + Send;
}

impl SubscriberSink for mpsc::Sender<Payload> {
    async fn deliver(&mut self, payload: Payload) -> Result<(), TransportSendError> {
        self.send(payload)
            .await
            .map_err(|_| TransportSendError::Closed)
    }
}
