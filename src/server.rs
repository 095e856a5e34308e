use log::{error, info};
use clap::Parser;

use hello_udp::Responder;

/// Start hello-udp responder
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct AppConfig {
    /// The UDP port to bind
    port: u16,
    /// The number of worker threads answering on the port
    threads: usize,
}

fn wait_for_interrupt() -> std::io::Result<()> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(tokio::signal::ctrl_c())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let app_config = AppConfig::parse();
    let mut responder = match Responder::start(app_config.port, app_config.threads) {
        Ok(x) => x,
        Err(err) => {
            error!("{}", err);
            std::process::exit(1);
        }
    };
    if let Err(err) = wait_for_interrupt() {
        error!("Cannot wait for the interrupt signal: {}", err);
    }
    info!("Interrupted, shutting down");
    responder.close();
}
