//! Per-connection read and write pumps.

use crate::traits::{Incoming, TransportError, WireMessage};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::time::Duration;
use tokio::time::{interval_at, timeout, Instant};
use tracing::{debug, trace, warn};
use webchat_core::connection::DEFAULT_SEND_QUEUE_CAPACITY;
use webchat_core::{ConnectionHandle, ConnectionId, HubHandle, Outbound};
use webchat_protocol::codec::{self, MAX_FRAME_SIZE};

/// Pump configuration.
#[derive(Debug, Clone)]
pub struct PumpConfig {
    /// Outbound queue capacity per connection.
    pub send_queue_capacity: usize,
    /// Largest accepted incoming frame in bytes.
    pub max_message_size: usize,
    /// Interval between keepalive pings.
    pub ping_interval: Duration,
    /// Close the connection if nothing arrives for this long.
    pub idle_timeout: Duration,
    /// Give up on a single write after this long.
    pub write_timeout: Duration,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            send_queue_capacity: DEFAULT_SEND_QUEUE_CAPACITY,
            max_message_size: MAX_FRAME_SIZE,
            ping_interval: Duration::from_secs(54),
            idle_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
        }
    }
}

/// Serve one client socket until either side hangs up.
///
/// Registers a new connection with the hub, drains its outbound queue to the
/// socket on a separate task, and forwards incoming frames to the hub. The
/// connection is unregistered when the read side ends.
pub async fn run_connection<S, M, E>(
    hub: HubHandle,
    socket: S,
    remote: Option<String>,
    config: PumpConfig,
) where
    S: Stream<Item = Result<M, E>> + Sink<M> + Send + 'static,
    <S as Sink<M>>::Error: Display + Send,
    M: WireMessage,
    E: Display + Send + 'static,
{
    let (conn, outbound) =
        ConnectionHandle::new(ConnectionId::next(), remote, config.send_queue_capacity);
    let id = conn.id();

    if let Err(e) = hub.register(conn).await {
        warn!(connection = %id, error = %e, "Failed to register connection");
        return;
    }

    let (sink, stream) = socket.split::<M>();
    let mut writer = tokio::spawn(write_pump::<_, M>(sink, outbound, id, config.clone()));

    let writer_done = tokio::select! {
        result = read_pump(stream, &hub, id, &config) => {
            match result {
                Ok(()) => debug!(connection = %id, "Peer closed connection"),
                Err(e) => debug!(connection = %id, error = %e, "Read pump stopped"),
            }
            false
        }
        joined = &mut writer => {
            if let Err(e) = joined {
                warn!(connection = %id, error = %e, "Write pump failed");
            }
            true
        }
    };

    if let Err(e) = hub.unregister(id).await {
        debug!(connection = %id, error = %e, "Unregister after hub stopped");
    }

    // The writer flushes what is left and exits once the hub closes the queue.
    if !writer_done {
        if let Err(e) = writer.await {
            warn!(connection = %id, error = %e, "Write pump failed");
        }
    }

    debug!(connection = %id, "Connection finished");
}

/// Forward incoming frames to the hub until the peer closes.
async fn read_pump<R, M, E>(
    mut stream: R,
    hub: &HubHandle,
    id: ConnectionId,
    config: &PumpConfig,
) -> Result<(), TransportError>
where
    R: Stream<Item = Result<M, E>> + Unpin,
    M: WireMessage,
    E: Display,
{
    loop {
        let next = timeout(config.idle_timeout, stream.next())
            .await
            .map_err(|_| TransportError::Timeout)?;

        let message = match next {
            Some(Ok(message)) => message,
            Some(Err(e)) => return Err(TransportError::ReceiveFailed(e.to_string())),
            None => return Ok(()),
        };

        match message.classify() {
            Incoming::Frame(data) => {
                if data.len() > config.max_message_size {
                    warn!(
                        connection = %id,
                        size = data.len(),
                        max = config.max_message_size,
                        "Message too large"
                    );
                    return Err(TransportError::MessageTooLarge(data.len()));
                }
                trace!(connection = %id, bytes = data.len(), "Frame received");
                hub.inbound(id, data).await?;
            }
            Incoming::Control => {}
            Incoming::Close => return Ok(()),
        }
    }
}

/// Drain the outbound queue to the socket, pinging periodically.
async fn write_pump<W, M>(mut sink: W, mut outbound: Outbound, id: ConnectionId, config: PumpConfig)
where
    W: Sink<M> + Unpin,
    W::Error: Display,
    M: WireMessage,
{
    let start = Instant::now() + config.ping_interval;
    let mut ping = interval_at(start, config.ping_interval);

    loop {
        tokio::select! {
            next = outbound.recv() => {
                let Some(message) = next else {
                    debug!(connection = %id, "Outbound queue closed");
                    if timeout(config.write_timeout, sink.close()).await.is_err() {
                        debug!(connection = %id, "Close timed out");
                    }
                    return;
                };

                let text = match codec::encode_text(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(connection = %id, error = %e, "Failed to encode message");
                        continue;
                    }
                };

                if let Err(e) = write(&mut sink, M::text(text), config.write_timeout).await {
                    debug!(connection = %id, error = %e, "Write pump stopped");
                    return;
                }
            }
            _ = ping.tick() => {
                if let Err(e) = write(&mut sink, M::ping(), config.write_timeout).await {
                    debug!(connection = %id, error = %e, "Ping failed");
                    return;
                }
            }
        }
    }
}

async fn write<W, M>(sink: &mut W, message: M, limit: Duration) -> Result<(), TransportError>
where
    W: Sink<M> + Unpin,
    W::Error: Display,
{
    match timeout(limit, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(TransportError::SendFailed(e.to_string())),
        Err(_) => Err(TransportError::Timeout),
    }
}
