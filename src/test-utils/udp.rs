use clap::Parser;

use hello_udp::{requester, Responder};

/// Loopback smoke test: a responder and a requester in one process
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct AppConfig {
    /// Workers on each side
    #[clap(short, long, default_value_t = 4)]
    threads: usize,
    /// Requests per requester worker
    #[clap(short, long, default_value_t = 3)]
    count: usize,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let app_config = AppConfig::parse();
    let mut responder = Responder::start(0, app_config.threads).unwrap();
    let port = responder.local_addr().port();
    println!("responder on port {}", port);
    let total = app_config.threads * app_config.count;
    let report = requester::run("127.0.0.1", port, "smoke", app_config.threads, app_config.count)
        .unwrap();
    for worker in report.workers.iter() {
        for response in worker.accepted.iter() {
            println!("worker {}: {:?}", worker.worker, response);
        }
    }
    responder.close();
    println!("accepted {} of {}, served {}", report.total_accepted(), total, responder.served());
}
