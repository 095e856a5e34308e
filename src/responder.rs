//! Server side: one shared socket, `threads` workers racing to answer on it.

use log::{debug, info, trace, warn};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::proto;
use crate::shutdown::{Shutdown, ShutdownListener};

/// How long `close()` waits for workers before dropping them.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// A running echo server.
///
/// Workers run in the background from [`Responder::start`] until
/// [`Responder::close`] (or drop). Both are blocking calls and must not be
/// made from inside an async runtime.
pub struct Responder {
    local_addr: SocketAddr,
    served: Arc<AtomicU64>,
    running: Option<Running>,
}

struct Running {
    runtime: Runtime,
    socket: Arc<UdpSocket>,
    shutdown: Shutdown,
    workers: Vec<JoinHandle<()>>,
}

impl Responder {
    /// Bind `0.0.0.0:port` and launch `threads` workers on it.
    ///
    /// Returns as soon as the workers are spawned. Port 0 picks an ephemeral
    /// port, see [`Responder::local_addr`].
    pub fn start(port: u16, threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(Error::invalid("thread count must be positive"));
        }
        let runtime = crate::worker_runtime("hello-udp-responder", threads)?;
        let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        let socket = runtime
            .block_on(UdpSocket::bind(bind_addr))
            .map_err(|source| Error::Bind { port, source })?;
        let local_addr = socket.local_addr().map_err(|source| Error::Bind { port, source })?;
        let socket = Arc::new(socket);
        let served = Arc::new(AtomicU64::new(0));
        let (shutdown, listener) = Shutdown::new();
        let workers = (0..threads)
            .map(|id| {
                runtime.spawn(respond(id, socket.clone(), served.clone(), listener.clone()))
            })
            .collect();
        info!("Responder started on {} with {} workers", local_addr, threads);
        Ok(Self {
            local_addr,
            served,
            running: Some(Running {
                runtime,
                socket,
                shutdown,
                workers,
            }),
        })
    }

    /// The address the shared socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of responses sent so far.
    pub fn served(&self) -> u64 {
        self.served.load(Ordering::Relaxed)
    }

    /// Whether [`Responder::close`] has already run.
    pub fn is_closed(&self) -> bool {
        self.running.is_none()
    }

    /// Stop every worker, then release the socket and the worker pool.
    ///
    /// Blocks until shutdown completes. Never fails; later calls do nothing.
    pub fn close(&mut self) {
        let Running {
            runtime,
            socket,
            shutdown,
            workers,
        } = match self.running.take() {
            Some(x) => x,
            None => return,
        };
        shutdown.trigger();
        let stopped = runtime.block_on(async {
            tokio::time::timeout(CLOSE_TIMEOUT, futures::future::join_all(workers))
                .await
                .is_ok()
        });
        if !stopped {
            warn!("Responder workers on {} did not stop in time, dropping them", self.local_addr);
        }
        drop(socket);
        runtime.shutdown_timeout(Duration::from_millis(100));
        info!("Responder on {} closed ({} responses sent)", self.local_addr, self.served());
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder")
            .field("local_addr", &self.local_addr)
            .field("served", &self.served())
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn respond(
    id: usize,
    socket: Arc<UdpSocket>,
    served: Arc<AtomicU64>,
    mut shutdown: ShutdownListener,
) {
    let mut buf = vec![0; proto::MAX_DATAGRAM];
    while !shutdown.is_triggered() {
        let (len, peer) = tokio::select! {
            _ = shutdown.triggered() => break,
            ret = socket.recv_from(&mut buf) => match ret {
                Ok(x) => x,
                Err(err) => {
                    warn!("Responder worker {} failed to receive: {}", id, err);
                    continue;
                }
            },
        };
        trace!("Worker {} received {:?} from {}", id, proto::decode(&buf[..len]), peer);
        let response = proto::response_payload(&buf[..len]);
        match socket.send_to(&response, peer).await {
            Ok(_) => {
                served.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                warn!("Responder worker {} failed to answer {}: {}", id, peer, err);
            }
        }
    }
    debug!("Responder worker {} stopped", id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_threads_is_rejected() {
        let err = Responder::start(0, 0).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn ephemeral_port_is_reported() {
        let mut responder = Responder::start(0, 2).unwrap();
        assert_ne!(responder.local_addr().port(), 0);
        assert!(!responder.is_closed());
        responder.close();
        assert!(responder.is_closed());
        responder.close();
        assert_eq!(responder.served(), 0);
    }
}
