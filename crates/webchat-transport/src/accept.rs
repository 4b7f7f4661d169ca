//! Accept loop tying a [`Transport`] to the hub.

use crate::pump::{run_connection, PumpConfig};
use crate::traits::{Transport, TransportError, WireMessage};
use futures_util::{Sink, Stream};
use std::fmt::Display;
use std::time::Duration;
use tracing::{debug, info, warn};
use webchat_core::HubHandle;

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accept connections forever, running each one on its own task.
///
/// Failed handshakes and accept errors are logged and skipped.
pub async fn serve<T, M, E>(transport: T, hub: HubHandle, config: PumpConfig)
where
    T: Transport,
    T::Socket: Stream<Item = Result<M, E>> + Sink<M>,
    <T::Socket as Sink<M>>::Error: Display + Send,
    M: WireMessage,
    E: Display + Send + 'static,
{
    info!(
        transport = transport.name(),
        addr = ?transport.local_addr(),
        "Accepting connections"
    );

    loop {
        match transport.accept().await {
            Ok((socket, addr)) => {
                debug!(transport = transport.name(), remote = %addr, "Accepted connection");
                tokio::spawn(run_connection(
                    hub.clone(),
                    socket,
                    Some(addr.to_string()),
                    config.clone(),
                ));
            }
            Err(TransportError::Handshake(e)) => {
                debug!(transport = transport.name(), error = %e, "Handshake failed");
            }
            Err(e) => {
                warn!(transport = transport.name(), error = %e, "Accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}
