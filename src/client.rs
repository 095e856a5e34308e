use log::{error, info, warn};
use clap::Parser;
use std::time::Duration;

use hello_udp::{Requester, RequesterConfig};

/// Start hello-udp requester
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct AppConfig {
    /// The responder host name or address
    host: String,
    /// The responder UDP port
    port: u16,
    /// The text put in front of every request
    prefix: String,
    /// The number of workers, each with its own socket
    threads: usize,
    /// The number of requests sent by each worker
    count: usize,
    /// Milliseconds to wait for a response before resending
    #[clap(long, default_value_t = 400)]
    timeout_ms: u64,
    /// Give up on a request after this many sends (retry forever if absent)
    #[clap(long)]
    max_attempts: Option<u32>,
    /// Overall time bound in seconds (defaults to threads * count)
    #[clap(long)]
    deadline_secs: Option<u64>,
}

impl From<&AppConfig> for RequesterConfig {
    fn from(v: &AppConfig) -> Self {
        Self {
            attempt_timeout: Duration::from_millis(v.timeout_ms),
            max_attempts: v.max_attempts,
            deadline: v.deadline_secs.map(Duration::from_secs),
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let app_config = AppConfig::parse();
    let requester = Requester::new((&app_config).into());
    let report = match requester.run(
        &app_config.host,
        app_config.port,
        &app_config.prefix,
        app_config.threads,
        app_config.count,
    ) {
        Ok(x) => x,
        Err(err) => {
            error!("{}", err);
            std::process::exit(1);
        }
    };
    for worker in report.workers.iter() {
        if worker.completed {
            info!("Worker {} done after {} attempts", worker.worker, worker.attempts);
        } else {
            warn!(
                "Worker {} incomplete: {} of {} accepted after {} attempts",
                worker.worker,
                worker.accepted.len(),
                app_config.count,
                worker.attempts
            );
        }
    }
}
