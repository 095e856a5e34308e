//! Client side: `threads` workers, each with a private socket, each sending
//! its numbered requests one at a time until they are answered.

use log::{debug, error, info, trace, warn};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::UdpSocket;

use crate::error::{Error, Result};
use crate::proto;
use crate::shutdown::{Shutdown, ShutdownListener};

/// Time given to workers to notice the stop signal after the deadline.
const STOP_GRACE: Duration = Duration::from_millis(500);

/// Retry policy of a [`Requester`].
#[derive(Debug, Clone, Copy)]
pub struct RequesterConfig {
    /// How long to wait for a response before sending the request again.
    pub attempt_timeout: Duration,
    /// Sends per request before the worker gives up. `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Overall bound of a run. `None` means `threads * msg_count` seconds.
    pub deadline: Option<Duration>,
}

impl Default for RequesterConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: proto::DEFAULT_ATTEMPT_TIMEOUT,
            max_attempts: None,
            deadline: None,
        }
    }
}

impl RequesterConfig {
    fn deadline_for(&self, threads: usize, msg_count: usize) -> Duration {
        self.deadline
            .unwrap_or_else(|| Duration::from_secs(threads as u64 * msg_count as u64))
    }
}

/// What one worker achieved during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker: usize,
    /// Accepted responses, in request order.
    pub accepted: Vec<String>,
    /// Datagrams sent, retries included.
    pub attempts: u64,
    /// Every request of this worker was answered.
    pub completed: bool,
}

/// Outcome of [`Requester::run`], one entry per worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub workers: Vec<WorkerReport>,
}

impl RunReport {
    pub fn total_accepted(&self) -> usize {
        self.workers.iter().map(|x| x.accepted.len()).sum()
    }

    pub fn all_completed(&self) -> bool {
        self.workers.iter().all(|x| x.completed)
    }
}

/// Runs probe workers against a responder.
#[derive(Debug, Clone, Default)]
pub struct Requester {
    config: RequesterConfig,
}

/// Run with the default retry policy. See [`Requester::run`].
pub fn run(
    host: &str,
    port: u16,
    prefix: &str,
    threads: usize,
    msg_count: usize,
) -> Result<RunReport> {
    Requester::default().run(host, port, prefix, threads, msg_count)
}

impl Requester {
    pub fn new(config: RequesterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RequesterConfig {
        &self.config
    }

    /// Send `msg_count` requests from each of `threads` workers to `host:port`.
    ///
    /// Blocks until every worker is done or the deadline passes, whichever
    /// comes first. Workers still retrying at the deadline are stopped and
    /// their partial progress is reported. Only configuration problems are
    /// returned as errors; an unresponsive peer just yields an incomplete
    /// report. Must not be called from inside an async runtime.
    pub fn run(
        &self,
        host: &str,
        port: u16,
        prefix: &str,
        threads: usize,
        msg_count: usize,
    ) -> Result<RunReport> {
        if threads == 0 {
            return Err(Error::invalid("thread count must be positive"));
        }
        if port == 0 {
            return Err(Error::invalid("port must be positive"));
        }
        if self.config.max_attempts == Some(0) {
            return Err(Error::invalid("attempt limit must be positive"));
        }
        let endpoint = resolve(host, port)?;
        let runtime = crate::worker_runtime("hello-udp-requester", threads)?;
        let deadline = self.config.deadline_for(threads, msg_count);
        info!(
            "Sending {} requests from each of {} workers to {} (deadline {:?})",
            msg_count, threads, endpoint, deadline
        );

        let (shutdown, listener) = Shutdown::new();
        let prefix: Arc<str> = prefix.into();
        let slots = (0..threads)
            .map(|worker| {
                Arc::new(Mutex::new(WorkerReport {
                    worker,
                    ..Default::default()
                }))
            })
            .collect::<Vec<_>>();
        let workers = slots
            .iter()
            .enumerate()
            .map(|(worker, slot)| {
                let slot_worker = WorkerSlot {
                    worker,
                    endpoint,
                    prefix: prefix.clone(),
                    msg_count,
                    config: self.config,
                    report: slot.clone(),
                };
                runtime.spawn(slot_worker.run(listener.clone()))
            })
            .collect::<Vec<_>>();

        runtime.block_on(async {
            let all = futures::future::join_all(workers);
            tokio::pin!(all);
            let results = match tokio::time::timeout(deadline, all.as_mut()).await {
                Ok(x) => x,
                Err(_) => {
                    warn!("Deadline of {:?} elapsed, stopping remaining workers", deadline);
                    shutdown.trigger();
                    match tokio::time::timeout(STOP_GRACE, all.as_mut()).await {
                        Ok(x) => x,
                        Err(_) => {
                            warn!("Some workers did not stop, abandoning them");
                            Vec::new()
                        }
                    }
                }
            };
            for ret in results {
                if let Err(err) = ret {
                    error!("A requester worker ended abnormally: {}", err);
                }
            }
        });
        shutdown.trigger();
        runtime.shutdown_timeout(Duration::from_millis(100));

        let report = RunReport {
            workers: slots
                .iter()
                .map(|slot| slot.lock().unwrap().clone())
                .collect(),
        };
        info!(
            "Run finished: {} of {} responses accepted",
            report.total_accepted(),
            threads * msg_count
        );
        Ok(report)
    }
}

/// Resolve `host`, preferring an IPv4 address.
fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| Error::Resolve {
            host: host.into(),
            source,
        })?
        .collect::<Vec<_>>();
    addrs
        .iter()
        .find(|x| x.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| Error::NoAddress { host: host.into() })
}

/// Ephemeral local address in the same family as `endpoint`.
fn local_bind_addr(endpoint: SocketAddr) -> SocketAddr {
    match endpoint {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    }
}

enum Attempt {
    Accepted(String),
    Mismatch(String),
    TimedOut,
    Failed(std::io::Error),
    Shutdown,
}

struct WorkerSlot {
    worker: usize,
    endpoint: SocketAddr,
    prefix: Arc<str>,
    msg_count: usize,
    config: RequesterConfig,
    report: Arc<Mutex<WorkerReport>>,
}

impl WorkerSlot {
    async fn run(self, mut shutdown: ShutdownListener) {
        let worker = self.worker;
        let socket = match UdpSocket::bind(local_bind_addr(self.endpoint)).await {
            Ok(x) => x,
            Err(err) => {
                error!("Requester worker {} cannot bind a socket: {}", worker, err);
                return;
            }
        };
        let mut buf = vec![0; proto::MAX_DATAGRAM];
        for index in 0..self.msg_count {
            let request = proto::request_payload(&self.prefix, worker, index);
            let mut attempts = 0;
            loop {
                if shutdown.is_triggered() {
                    debug!("Requester worker {} stopped while sending {:?}", worker, request);
                    return;
                }
                if self.config.max_attempts.map_or(false, |max| attempts >= max) {
                    warn!(
                        "Requester worker {} gave up on {:?} after {} attempts",
                        worker, request, attempts
                    );
                    return;
                }
                attempts += 1;
                self.report.lock().unwrap().attempts += 1;
                match self.attempt(&socket, &request, &mut buf, &mut shutdown).await {
                    Attempt::Accepted(response) => {
                        debug!("Worker {} received {:?}", worker, response);
                        self.report.lock().unwrap().accepted.push(response);
                        break;
                    }
                    Attempt::Mismatch(response) => {
                        debug!(
                            "Worker {} received unknown response {:?} while waiting for {:?}",
                            worker, response, request
                        );
                    }
                    Attempt::TimedOut => {
                        debug!("Worker {} got no response to {:?}, resending", worker, request);
                    }
                    Attempt::Failed(err) => {
                        warn!("Worker {} failed to exchange {:?}: {}", worker, request, err);
                    }
                    Attempt::Shutdown => {
                        debug!(
                            "Requester worker {} stopped while waiting for {:?}",
                            worker, request
                        );
                        return;
                    }
                }
            }
        }
        self.report.lock().unwrap().completed = true;
        debug!("Requester worker {} done", worker);
    }

    async fn attempt(
        &self,
        socket: &UdpSocket,
        request: &str,
        buf: &mut [u8],
        shutdown: &mut ShutdownListener,
    ) -> Attempt {
        tokio::select! {
            _ = shutdown.triggered() => Attempt::Shutdown,
            ret = self.exchange(socket, request, buf) => ret,
        }
    }

    async fn exchange(&self, socket: &UdpSocket, request: &str, buf: &mut [u8]) -> Attempt {
        if let Err(err) = socket.send_to(request.as_bytes(), self.endpoint).await {
            return Attempt::Failed(err);
        }
        trace!("Sent request {:?} to {}", request, self.endpoint);
        let received = tokio::time::timeout(self.config.attempt_timeout, socket.recv_from(buf));
        let len = match received.await {
            Err(_) => return Attempt::TimedOut,
            Ok(Err(err)) => return Attempt::Failed(err),
            Ok(Ok((len, _))) => len,
        };
        let response = proto::decode(&buf[..len]).into_owned();
        if proto::is_response_to(&response, request) {
            Attempt::Accepted(response)
        } else {
            Attempt::Mismatch(response)
        }
    }
}
