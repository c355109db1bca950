// src/server/listener.rs

//! Contains the accept loop that admits connections and spawns their handlers.

use crate::connection::ConnectionHandler;
use crate::core::metrics;
use crate::core::sink::{ConnectionPool, IngestSink};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Pause after a failed `accept` so a persistent error does not spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Cloneable handle used to stop a running [`Listener`].
#[derive(Debug, Clone)]
pub struct StopHandle {
    shutdown_tx: broadcast::Sender<()>,
    kill_tx: broadcast::Sender<()>,
}

impl StopHandle {
    /// Stops admitting connections. Handlers that are already running are left alone.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Tells every live connection handler to close its connection.
    pub fn close_connections(&self) {
        let _ = self.kill_tx.send(());
    }

    /// A receiver that fires when [`StopHandle::stop`] is called.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }
}

/// Accepts connections on a bound socket and runs one handler task per connection.
///
/// No limit is placed on the number of open connections; the connection pool is the
/// only admission control and it applies per insert, not per connection.
pub struct Listener<S: IngestSink> {
    listener: TcpListener,
    pool: ConnectionPool<S>,
    max_line_bytes: usize,
    stop: StopHandle,
    shutdown_rx: broadcast::Receiver<()>,
}

impl<S: IngestSink> Listener<S> {
    /// Binds the listening socket.
    pub async fn bind<A: ToSocketAddrs>(
        addr: A,
        pool: ConnectionPool<S>,
        max_line_bytes: usize,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let (kill_tx, _) = broadcast::channel(1);
        Ok(Self {
            listener,
            pool,
            max_line_bytes,
            stop: StopHandle {
                shutdown_tx,
                kill_tx,
            },
            shutdown_rx,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Accepts connections until [`StopHandle::stop`] is called, then closes the socket.
    ///
    /// Spawned handlers are detached: they are neither cancelled nor awaited here.
    pub async fn run(mut self) {
        let addr = self.local_addr().ok();
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown_rx.recv() => {
                    info!("Stop requested, no longer accepting connections.");
                    break;
                }
                res = self.listener.accept() => {
                    match res {
                        Ok((socket, peer)) => self.spawn_handler(socket, peer),
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        }
                    }
                }
            }
        }
        drop(self.listener);
        if let Some(addr) = addr {
            info!("Listener on {} closed.", addr);
        }
    }

    fn spawn_handler(&self, socket: TcpStream, peer: SocketAddr) {
        info!("Accepted new connection from: {}", peer);
        metrics::CONNECTIONS_RECEIVED_TOTAL.inc();

        let pool = self.pool.clone();
        let kill_rx = self.stop.kill_tx.subscribe();
        let max_line_bytes = self.max_line_bytes;
        tokio::spawn(async move {
            let mut handler = ConnectionHandler::new(socket, peer, pool, max_line_bytes, kill_rx);
            if let Err(e) = handler.run().await {
                warn!("Connection from {} terminated unexpectedly: {}", peer, e);
            }
        });
    }
}
