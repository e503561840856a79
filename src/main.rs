mod catalog;
mod config;
mod conflict;
mod data;
mod error;
mod interpret;
mod model;
mod qualification;
mod report;
mod schedule;
mod server;
mod solver;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = server::run_server().await {
        log::error!("Server stopped: {e}");
        std::process::exit(1);
    }
}
