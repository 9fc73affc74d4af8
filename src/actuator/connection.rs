//! WebSocket connection task for the actuator server.
//!
//! Owns the socket and nothing else: inbound frames are decoded and handed to
//! the [`ActuatorSession`], outbound messages arrive from the session over an
//! unbounded channel. When the socket closes or fails the task waits a fixed
//! delay and reconnects until it is shut down.

use super::protocol;
use super::session::ActuatorSession;
use crate::error::HapticError;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Handle to a running connection task.
pub struct ConnectionHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ConnectionHandle {
    /// Close the socket and stop reconnecting.
    pub async fn close(self) {
        self.shutdown.send_replace(true);
        if let Err(e) = self.task.await {
            warn!("Actuator connection task ended abnormally: {}", e);
        }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

/// Spawn the connect/reconnect loop for `address`.
pub fn spawn_connection(
    session: Arc<ActuatorSession>,
    address: String,
    reconnect_delay: Duration,
) -> ConnectionHandle {
    let (shutdown, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(run(session, address, reconnect_delay, shutdown_rx));
    ConnectionHandle { shutdown, task }
}

async fn run(
    session: Arc<ActuatorSession>,
    address: String,
    reconnect_delay: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        session.set_connecting();
        info!("Connecting to actuator server at {}", address);

        let stop_requested = match connect_async(address.as_str()).await {
            Ok((socket, _)) => pump(&session, socket, &mut shutdown).await,
            Err(e) => {
                let error = HapticError::Transport {
                    message: format!("connection to {} failed: {}", address, e),
                };
                warn!("{}", error);
                false
            }
        };
        session.detach();

        if stop_requested || *shutdown.borrow() {
            break;
        }

        debug!("Reconnecting in {:?}", reconnect_delay);
        tokio::select! {
            _ = tokio::time::sleep(reconnect_delay) => {}
            _ = shutdown.changed() => break,
        }
    }
    debug!("Actuator connection task stopped");
}

/// Relay frames until the socket closes. Returns true on shutdown.
async fn pump(
    session: &ActuatorSession,
    socket: Socket,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    let (mut write, mut read) = socket.split();
    let (tx, mut outbound) = mpsc::unbounded_channel();
    session.attach(tx);

    loop {
        tokio::select! {
            message = outbound.recv() => {
                let Some(message) = message else {
                    return false;
                };
                match protocol::encode(&message) {
                    Ok(frame) => {
                        if let Err(e) = write.send(Message::Text(frame)).await {
                            warn!("Actuator send failed: {}", e);
                            return false;
                        }
                    }
                    Err(e) => warn!("Failed to encode actuator message: {}", e),
                }
            }

            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => match protocol::decode(&text) {
                        Ok(messages) => {
                            for message in messages {
                                session.handle(message);
                            }
                        }
                        Err(e) => debug!("Ignoring malformed frame: {}", e),
                    },
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            debug!("Pong failed: {}", e);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Actuator server closed the connection");
                        return false;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Actuator connection error: {}", e);
                        return false;
                    }
                }
            }

            _ = shutdown.changed() => {
                if let Err(e) = write.send(Message::Close(None)).await {
                    debug!("Close frame failed: {}", e);
                }
                return true;
            }
        }
    }
}
