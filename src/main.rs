mod config;
mod error;
mod gesture;
mod pipeline;
mod sim;
mod types;

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use rand::{SeedableRng, rngs::StdRng};

use config::{Config, Mode};
use pipeline::{
    Catalog, CatalogSource, HandSource, IdleSource, ReplaySource, Runner, TcpBroadcastSink,
    snapshot_queue, start_publisher,
};
use sim::Simulation;

fn main() -> Result<()> {
    env_logger::init();

    let config = Config::from_args(std::env::args().skip(1))?;

    let catalog = match config.mode {
        Mode::Garden => Catalog::load(&CatalogSource {
            path: config.catalog_path.clone(),
            limit: config.catalog_limit,
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
        }),
        Mode::Puppets => Catalog::placeholder(),
    };

    let source: Box<dyn HandSource> = match &config.replay_path {
        Some(path) => Box::new(
            ReplaySource::open(path)
                .with_context(|| format!("failed to open replay {}", path.display()))?,
        ),
        None => Box::new(IdleSource::new(config.frame_width, config.frame_height)),
    };

    let sink = TcpBroadcastSink::bind(&config.listen_addr)
        .with_context(|| format!("failed to listen on {}", config.listen_addr))?;
    let (queue, queue_rx) = snapshot_queue(config.queue_capacity);
    let publisher = start_publisher(queue_rx, sink, config.jpeg_quality())
        .context("failed to start publisher thread")?;

    let sim = Simulation::new(&config, catalog.len(), Instant::now(), StdRng::from_os_rng());
    Runner::new(source, sim, catalog, queue, config.tick_interval()).run();

    if publisher.join().is_err() {
        log::error!("publisher thread panicked");
    }
    Ok(())
}
