//! `hello-udp` — a numbered probe protocol over plain UDP.
//!
//! A [`Requester`] runs a fixed number of workers, each sending numbered
//! requests from its own socket and retrying until the matching response
//! arrives. A [`Responder`] binds one socket and lets a fixed number of
//! workers race on it, answering every datagram with `"Hello, "` prepended.
//!
//! - [`proto`]     — payload formatting and response matching
//! - [`requester`] — client side worker pool
//! - [`responder`] — server side worker pool
//! - [`error`]     — startup and configuration errors

pub mod error;
pub mod proto;
pub mod requester;
pub mod responder;
mod shutdown;

pub use error::{Error, Result};
pub use requester::{Requester, RequesterConfig, RunReport, WorkerReport};
pub use responder::Responder;

/// Build the multi-thread runtime backing one worker pool.
///
/// The pool has exactly `threads` OS threads for the lifetime of the component.
pub(crate) fn worker_runtime(name: &str, threads: usize) -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(threads)
        .thread_name(name)
        .enable_all()
        .build()
        .map_err(Error::Runtime)
}
